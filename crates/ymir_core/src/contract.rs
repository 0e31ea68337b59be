//! # Op & Step Contracts
//!
//! Contracts are pure data built once at recipe assembly. An op contract
//! names its strategies and their config schemas; a step contract names its
//! dependency tags and its (possibly envelope-extended) config schema.
//! Construction is where wiring defects surface, long before any user
//! config is seen.

use indexmap::IndexMap;

use crate::error::ContractError;
use crate::schema::{EnvelopeSchema, ObjectSchema, Schema, DEFAULT_STRATEGY};
use crate::tags::DependencyTag;

/// True for ids of the form `^[a-z0-9]+(-[a-z0-9]+)*$`.
#[must_use]
pub fn is_kebab_case(id: &str) -> bool {
    !id.is_empty()
        && id.split('-').all(|segment| {
            !segment.is_empty()
                && segment
                    .bytes()
                    .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit())
        })
}

/// An op: a family of interchangeable strategies behind one id.
///
/// A strategy is data, not a subclass: an id plus a config schema here, and
/// a match arm wherever the op is run.
#[derive(Clone, Debug)]
pub struct OpContract {
    /// Op id, e.g. `op.flow-routing`.
    pub id: &'static str,
    /// Config schema per strategy id.
    pub strategies: IndexMap<&'static str, ObjectSchema>,
}

impl OpContract {
    /// Defines an op contract.
    ///
    /// # Errors
    ///
    /// [`ContractError::MissingDefaultStrategy`] unless a
    /// [`DEFAULT_STRATEGY`] entry is present.
    pub fn define(
        id: &'static str,
        strategies: impl IntoIterator<Item = (&'static str, ObjectSchema)>,
    ) -> Result<Self, ContractError> {
        let strategies: IndexMap<&'static str, ObjectSchema> = strategies.into_iter().collect();
        if !strategies.contains_key(DEFAULT_STRATEGY) {
            return Err(ContractError::MissingDefaultStrategy { op: id.to_owned() });
        }
        Ok(Self { id, strategies })
    }

    /// The `{ strategy, config }` envelope schema for this op.
    #[must_use]
    pub fn envelope(&self) -> EnvelopeSchema {
        EnvelopeSchema { op: self.id, strategies: self.strategies.clone() }
    }
}

/// A step: the unit of pipeline work the executor schedules.
#[derive(Clone, Debug)]
pub struct StepContract {
    /// Kebab-case step id.
    pub id: &'static str,
    /// Phase the step belongs to (diagnostic grouping only).
    pub phase: &'static str,
    /// Tags that must be satisfied before this step runs.
    pub requires: Vec<DependencyTag>,
    /// Tags this step satisfies by running.
    pub provides: Vec<DependencyTag>,
    /// Closed config schema, including any merged op envelopes.
    pub schema: ObjectSchema,
}

impl StepContract {
    /// Defines a step contract, merging op envelopes into the hand-authored
    /// schema.
    ///
    /// # Errors
    ///
    /// [`ContractError::InvalidStepId`] for non-kebab-case ids,
    /// [`ContractError::SchemaKeyCollision`] when an envelope key is already
    /// a schema field.
    pub fn define(
        id: &'static str,
        phase: &'static str,
        requires: Vec<DependencyTag>,
        provides: Vec<DependencyTag>,
        schema: ObjectSchema,
        ops: &[(&'static str, &OpContract)],
    ) -> Result<Self, ContractError> {
        if !is_kebab_case(id) {
            return Err(ContractError::InvalidStepId { id: id.to_owned() });
        }
        let mut schema = schema;
        for (key, op) in ops {
            if schema.has_field(key) {
                return Err(ContractError::SchemaKeyCollision {
                    step: id.to_owned(),
                    key: (*key).to_owned(),
                });
            }
            schema = schema.field(key, Schema::Envelope(op.envelope()));
        }
        Ok(Self { id, phase, requires, provides, schema })
    }
}
