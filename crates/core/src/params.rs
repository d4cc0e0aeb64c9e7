//! Parameter and metric value models shared across the workspace.

use std::collections::BTreeMap;

/// A parameter value.
///
/// Parameters a job runs with are always JSON scalars — never nested
/// objects or arrays. The one exception is `Json`: a `MultiStepsJob`'s
/// `all2one` fan-in aggregation (§4.3) injects a nested
/// `{metric_name: {parent_key: value}}` mapping into a single parameter
/// slot, which has no scalar representation. `Json` is declared last so
/// `#[serde(untagged)]` only falls back to it once every scalar variant
/// has failed to match — `serde_json::Value`'s `Deserialize` impl
/// accepts anything, so it must be tried last.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(untagged)]
pub enum ParamValue {
    Integer(i64),
    Number(f64),
    Str(String),
    Bool(bool),
    Null,
    Json(serde_json::Value),
}

impl ParamValue {
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            ParamValue::Integer(i) => Some(*i as f64),
            ParamValue::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            ParamValue::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, ParamValue::Null)
    }
}

impl From<i64> for ParamValue {
    fn from(v: i64) -> Self {
        ParamValue::Integer(v)
    }
}

impl From<f64> for ParamValue {
    fn from(v: f64) -> Self {
        ParamValue::Number(v)
    }
}

impl From<&str> for ParamValue {
    fn from(v: &str) -> Self {
        ParamValue::Str(v.to_string())
    }
}

impl From<String> for ParamValue {
    fn from(v: String) -> Self {
        ParamValue::Str(v)
    }
}

impl From<bool> for ParamValue {
    fn from(v: bool) -> Self {
        ParamValue::Bool(v)
    }
}

impl std::fmt::Display for ParamValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ParamValue::Integer(i) => write!(f, "{i}"),
            ParamValue::Number(n) => write!(f, "{n}"),
            ParamValue::Str(s) => write!(f, "{s}"),
            ParamValue::Bool(b) => write!(f, "{b}"),
            ParamValue::Null => write!(f, "None"),
            ParamValue::Json(v) => write!(f, "{v}"),
        }
    }
}

impl TryFrom<serde_json::Value> for ParamValue {
    type Error = serde_json::Error;

    fn try_from(value: serde_json::Value) -> Result<Self, Self::Error> {
        serde_json::from_value(value)
    }
}

impl From<ParamValue> for serde_json::Value {
    fn from(value: ParamValue) -> Self {
        match value {
            ParamValue::Integer(i) => serde_json::Value::from(i),
            ParamValue::Number(n) => serde_json::Value::from(n),
            ParamValue::Str(s) => serde_json::Value::from(s),
            ParamValue::Bool(b) => serde_json::Value::from(b),
            ParamValue::Null => serde_json::Value::Null,
            ParamValue::Json(v) => v,
        }
    }
}

/// An ordered mapping of parameter name to value.
///
/// `BTreeMap` rather than `HashMap`: global-parameter keys must iterate
/// in lexicographic order for the cartesian product and for the
/// serialised-key sanitisation used in dataset name expansion.
pub type ParamMap = BTreeMap<String, ParamValue>;

/// A metric value reported back to the optimizer.
///
/// Either a bare scalar or a scalar with an optional standard error of
/// the mean, matching the `number | {value, sem?}` shape the original
/// scheduler accepts from a trial's raw results.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(untagged)]
pub enum MetricValue {
    Scalar(f64),
    WithSem { value: f64, sem: Option<f64> },
}

impl MetricValue {
    pub fn value(&self) -> f64 {
        match self {
            MetricValue::Scalar(v) => *v,
            MetricValue::WithSem { value, .. } => *value,
        }
    }

    pub fn sem(&self) -> Option<f64> {
        match self {
            MetricValue::Scalar(_) => None,
            MetricValue::WithSem { sem, .. } => *sem,
        }
    }
}

impl From<f64> for MetricValue {
    fn from(v: f64) -> Self {
        MetricValue::Scalar(v)
    }
}

#[cfg(test)]
#[path = "params_tests.rs"]
mod tests;
