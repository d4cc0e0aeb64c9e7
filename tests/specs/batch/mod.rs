mod parallel_trials;
