//! Typed accessors over default-filled step configs.
//!
//! Configs reaching a step's `run` have been validated and default-filled,
//! so a missing key here is a wiring bug, not user input. These lookups
//! fall back to zero values instead of panicking.

use serde_json::Value;
use ymir_core::schema::DEFAULT_STRATEGY;

pub(crate) static NULL: Value = Value::Null;

pub(crate) fn int(config: &Value, key: &str) -> i64 {
    config.get(key).and_then(Value::as_i64).unwrap_or(0)
}

pub(crate) fn float(config: &Value, key: &str) -> f64 {
    config.get(key).and_then(Value::as_f64).unwrap_or(0.0)
}

pub(crate) fn flag(config: &Value, key: &str) -> bool {
    config.get(key).and_then(Value::as_bool).unwrap_or(false)
}

pub(crate) fn text<'v>(config: &'v Value, key: &str) -> &'v str {
    config.get(key).and_then(Value::as_str).unwrap_or("")
}

pub(crate) fn int_list(config: &Value, key: &str) -> Vec<i64> {
    config
        .get(key)
        .and_then(Value::as_array)
        .map(|items| items.iter().filter_map(Value::as_i64).collect())
        .unwrap_or_default()
}

/// Splits an op envelope into `(strategy id, strategy config)`.
pub(crate) fn envelope<'v>(config: &'v Value, key: &str) -> (&'v str, &'v Value) {
    let node = config.get(key).unwrap_or(&NULL);
    let strategy = node
        .get("strategy")
        .and_then(Value::as_str)
        .unwrap_or(DEFAULT_STRATEGY);
    (strategy, node.get("config").unwrap_or(&NULL))
}
