mod dag_aggregation;
mod single_step;
