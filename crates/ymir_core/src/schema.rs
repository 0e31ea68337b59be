//! # Config Schema Layer
//!
//! Closed, typed schemas over [`serde_json::Value`].
//!
//! Every op and step declares its config shape as a [`Schema`] tree. Schemas
//! are closed: unknown keys are compile errors, never silently ignored. Every
//! leaf carries a typed default, so a fully-defaulted config can always be
//! materialized from an empty user config.
//!
//! Validation appends to an issue list instead of returning on the first
//! problem; the compiler reports every violation in one pass.

use indexmap::IndexMap;
use serde_json::{Map, Value};

use crate::error::{CompileIssue, CompileIssueCode};

/// Strategy id every op envelope falls back to.
pub const DEFAULT_STRATEGY: &str = "default";

/// One node in a config schema tree.
#[derive(Clone, Debug)]
pub enum Schema {
    /// Boolean flag.
    Bool {
        /// Value used when the key is omitted.
        default: bool,
    },
    /// Integer, optionally bounded.
    Int {
        /// Value used when the key is omitted.
        default: i64,
        /// Inclusive lower bound.
        min: Option<i64>,
        /// Inclusive upper bound.
        max: Option<i64>,
    },
    /// Float, optionally bounded. Integer literals are accepted.
    Float {
        /// Value used when the key is omitted.
        default: f64,
        /// Inclusive lower bound.
        min: Option<f64>,
        /// Inclusive upper bound.
        max: Option<f64>,
    },
    /// String, optionally restricted to a closed set.
    Str {
        /// Value used when the key is omitted.
        default: &'static str,
        /// When present, the only accepted values.
        one_of: Option<&'static [&'static str]>,
    },
    /// List of integers (threshold tables and the like).
    IntList {
        /// Value used when the key is omitted.
        default: &'static [i64],
    },
    /// Nested object with its own closed field set.
    Object(ObjectSchema),
    /// Op envelope: a `{ strategy, config }` discriminated union.
    Envelope(EnvelopeSchema),
}

impl Schema {
    /// Unbounded integer.
    #[must_use]
    pub const fn int(default: i64) -> Self {
        Self::Int { default, min: None, max: None }
    }

    /// Integer clamped to `[min, max]` at validation time.
    #[must_use]
    pub const fn int_range(default: i64, min: i64, max: i64) -> Self {
        Self::Int { default, min: Some(min), max: Some(max) }
    }

    /// Unbounded float.
    #[must_use]
    pub const fn float(default: f64) -> Self {
        Self::Float { default, min: None, max: None }
    }

    /// Float restricted to `[min, max]`.
    #[must_use]
    pub const fn float_range(default: f64, min: f64, max: f64) -> Self {
        Self::Float { default, min: Some(min), max: Some(max) }
    }

    /// Boolean flag.
    #[must_use]
    pub const fn flag(default: bool) -> Self {
        Self::Bool { default }
    }

    /// Free-form string.
    #[must_use]
    pub const fn string(default: &'static str) -> Self {
        Self::Str { default, one_of: None }
    }

    /// String restricted to a closed set. `default` must be in `allowed`.
    #[must_use]
    pub const fn string_one_of(default: &'static str, allowed: &'static [&'static str]) -> Self {
        Self::Str { default, one_of: Some(allowed) }
    }

    /// Integer list.
    #[must_use]
    pub const fn int_list(default: &'static [i64]) -> Self {
        Self::IntList { default }
    }

    /// Short type name used in validation messages.
    #[must_use]
    pub const fn type_name(&self) -> &'static str {
        match self {
            Self::Bool { .. } => "boolean",
            Self::Int { .. } => "integer",
            Self::Float { .. } => "number",
            Self::Str { .. } => "string",
            Self::IntList { .. } => "integer list",
            Self::Object(_) => "object",
            Self::Envelope(_) => "op envelope",
        }
    }

    /// Checks `value` against this schema, appending one issue per
    /// violation. Never stops early: sibling problems are all reported.
    pub fn validate(&self, value: &Value, path: &str, issues: &mut Vec<CompileIssue>) {
        match self {
            Self::Bool { .. } => {
                if !value.is_boolean() {
                    push_type_issue(issues, path, self, value);
                }
            }
            Self::Int { min, max, .. } => match value.as_i64() {
                Some(n) => {
                    if let Some(lo) = min {
                        if n < *lo {
                            push_issue(issues, path, format!("must be >= {lo} (got {n})"));
                        }
                    }
                    if let Some(hi) = max {
                        if n > *hi {
                            push_issue(issues, path, format!("must be <= {hi} (got {n})"));
                        }
                    }
                }
                None => push_type_issue(issues, path, self, value),
            },
            Self::Float { min, max, .. } => match value.as_f64() {
                Some(n) => {
                    if let Some(lo) = min {
                        if n < *lo {
                            push_issue(issues, path, format!("must be >= {lo} (got {n})"));
                        }
                    }
                    if let Some(hi) = max {
                        if n > *hi {
                            push_issue(issues, path, format!("must be <= {hi} (got {n})"));
                        }
                    }
                }
                None => push_type_issue(issues, path, self, value),
            },
            Self::Str { one_of, .. } => match value.as_str() {
                Some(s) => {
                    if let Some(allowed) = one_of {
                        if !allowed.contains(&s) {
                            push_issue(
                                issues,
                                path,
                                format!("must be one of {allowed:?} (got '{s}')"),
                            );
                        }
                    }
                }
                None => push_type_issue(issues, path, self, value),
            },
            Self::IntList { .. } => match value.as_array() {
                Some(items) => {
                    for (i, item) in items.iter().enumerate() {
                        if item.as_i64().is_none() {
                            push_issue(
                                issues,
                                &format!("{path}/{i}"),
                                format!("expected integer (got {})", kind_of(item)),
                            );
                        }
                    }
                }
                None => push_type_issue(issues, path, self, value),
            },
            Self::Object(object) => object.validate(value, path, issues),
            Self::Envelope(envelope) => envelope.validate(value, path, issues),
        }
    }

    /// Materializes a complete config from an optional partial one.
    ///
    /// Assumes `provided` already validated; provided keys win, omitted keys
    /// take their schema defaults.
    #[must_use]
    pub fn fill_defaults(&self, provided: Option<&Value>) -> Value {
        match self {
            Self::Bool { default } => {
                provided.cloned().unwrap_or_else(|| Value::Bool(*default))
            }
            Self::Int { default, .. } => {
                provided.cloned().unwrap_or_else(|| Value::from(*default))
            }
            Self::Float { default, .. } => {
                provided.cloned().unwrap_or_else(|| Value::from(*default))
            }
            Self::Str { default, .. } => {
                provided.cloned().unwrap_or_else(|| Value::from(*default))
            }
            Self::IntList { default } => provided
                .cloned()
                .unwrap_or_else(|| Value::from(default.to_vec())),
            Self::Object(object) => object.fill_defaults(provided),
            Self::Envelope(envelope) => envelope.fill_defaults(provided),
        }
    }

    /// The fully-defaulted config for this schema.
    #[must_use]
    pub fn default_value(&self) -> Value {
        self.fill_defaults(None)
    }
}

pub(crate) fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

fn push_issue(issues: &mut Vec<CompileIssue>, path: &str, message: String) {
    issues.push(CompileIssue::new(CompileIssueCode::ConfigInvalid, path, message));
}

fn push_type_issue(issues: &mut Vec<CompileIssue>, path: &str, schema: &Schema, value: &Value) {
    push_issue(
        issues,
        path,
        format!("expected {} (got {})", schema.type_name(), kind_of(value)),
    );
}

/// Closed object schema: a fixed field set, each with its own [`Schema`].
#[derive(Clone, Debug, Default)]
pub struct ObjectSchema {
    fields: IndexMap<&'static str, Schema>,
}

impl ObjectSchema {
    /// Empty object schema.
    #[must_use]
    pub fn new() -> Self {
        Self { fields: IndexMap::new() }
    }

    /// Adds a field, builder style. Later fields keep declaration order.
    #[must_use]
    pub fn field(mut self, name: &'static str, schema: Schema) -> Self {
        self.fields.insert(name, schema);
        self
    }

    /// True when `name` is a declared field.
    #[must_use]
    pub fn has_field(&self, name: &str) -> bool {
        self.fields.contains_key(name)
    }

    /// Declared fields in declaration order.
    pub fn fields(&self) -> impl Iterator<Item = (&'static str, &Schema)> {
        self.fields.iter().map(|(name, schema)| (*name, schema))
    }

    /// Validates an object value: unknown keys are issues, known keys
    /// recurse into their field schemas.
    pub fn validate(&self, value: &Value, path: &str, issues: &mut Vec<CompileIssue>) {
        let Some(map) = value.as_object() else {
            push_issue(issues, path, format!("expected object (got {})", kind_of(value)));
            return;
        };
        for (key, field_value) in map {
            let field_path = format!("{path}/{key}");
            match self.fields.get(key.as_str()) {
                Some(field_schema) => field_schema.validate(field_value, &field_path, issues),
                None => push_issue(issues, &field_path, "unknown config key".to_owned()),
            }
        }
    }

    /// Materializes a complete object; provided keys win, the rest default.
    #[must_use]
    pub fn fill_defaults(&self, provided: Option<&Value>) -> Value {
        let provided_map = provided.and_then(Value::as_object);
        let mut out = Map::new();
        for (name, schema) in &self.fields {
            let given = provided_map.and_then(|m| m.get(*name));
            out.insert((*name).to_owned(), schema.fill_defaults(given));
        }
        Value::Object(out)
    }

    /// The fully-defaulted object.
    #[must_use]
    pub fn default_value(&self) -> Value {
        self.fill_defaults(None)
    }
}

/// Schema of one op envelope: `{ strategy: <id>, config: <per-strategy> }`.
///
/// The discriminated union the compiler validates strategy selections
/// against. The strategy table always contains [`DEFAULT_STRATEGY`];
/// construction enforces that in [`crate::contract::OpContract`].
#[derive(Clone, Debug)]
pub struct EnvelopeSchema {
    /// Id of the op this envelope selects a strategy for.
    pub op: &'static str,
    /// Config schema per strategy id.
    pub strategies: IndexMap<&'static str, ObjectSchema>,
}

impl EnvelopeSchema {
    /// Validates a `{ strategy, config }` value.
    pub fn validate(&self, value: &Value, path: &str, issues: &mut Vec<CompileIssue>) {
        let Some(map) = value.as_object() else {
            push_issue(issues, path, format!("expected op envelope (got {})", kind_of(value)));
            return;
        };
        for key in map.keys() {
            if key != "strategy" && key != "config" {
                push_issue(issues, &format!("{path}/{key}"), "unknown envelope key".to_owned());
            }
        }
        let strategy = match map.get("strategy") {
            None => DEFAULT_STRATEGY,
            Some(Value::String(s)) => s.as_str(),
            Some(other) => {
                push_issue(
                    issues,
                    &format!("{path}/strategy"),
                    format!("expected string (got {})", kind_of(other)),
                );
                return;
            }
        };
        let Some(config_schema) = self.strategies.get(strategy) else {
            let known: Vec<&str> = self.strategies.keys().copied().collect();
            push_issue(
                issues,
                &format!("{path}/strategy"),
                format!("unknown strategy '{strategy}' for op '{}' (known: {known:?})", self.op),
            );
            return;
        };
        if let Some(config) = map.get("config") {
            config_schema.validate(config, &format!("{path}/config"), issues);
        }
    }

    /// Materializes a complete envelope; the selected strategy's config is
    /// default-filled around whatever the caller provided.
    #[must_use]
    pub fn fill_defaults(&self, provided: Option<&Value>) -> Value {
        let provided_map = provided.and_then(Value::as_object);
        let strategy = provided_map
            .and_then(|m| m.get("strategy"))
            .and_then(Value::as_str)
            .unwrap_or(DEFAULT_STRATEGY);
        let config_schema = self
            .strategies
            .get(strategy)
            .or_else(|| self.strategies.get(DEFAULT_STRATEGY));
        let config = match config_schema {
            Some(schema) => schema.fill_defaults(provided_map.and_then(|m| m.get("config"))),
            None => Value::Object(Map::new()),
        };
        let mut out = Map::new();
        out.insert("strategy".to_owned(), Value::from(strategy));
        out.insert("config".to_owned(), config);
        Value::Object(out)
    }
}
