//! # Steps, Stages, Recipes
//!
//! A [`Step`] is the executable behind a [`StepContract`]. A [`Stage`]
//! groups steps behind one public config block and knows how to distribute
//! that block across its steps. A [`Recipe`] is the ordered stage list plus
//! the tag registry everything was checked against.

use serde_json::Value;

use crate::context::{MapContext, MapEnv};
use crate::contract::StepContract;
use crate::error::{ExecuteError, TagError};
use crate::schema::ObjectSchema;
use crate::tags::TagRegistry;

/// One unit of pipeline work.
pub trait Step {
    /// The step's contract: id, tags, config schema.
    fn contract(&self) -> &StepContract;

    /// Optional config rewrite from environment and knobs, applied by the
    /// executor just before [`Step::run`]. The output is re-validated
    /// against the contract schema, so a normalize defect cannot smuggle an
    /// invalid config into the step.
    fn normalize(&self, config: Value, env: &MapEnv, knobs: &Value) -> Value {
        let _ = (env, knobs);
        config
    }

    /// Runs the step against the shared context.
    ///
    /// # Errors
    ///
    /// Any [`ExecuteError`]; the executor aborts the run on the first one.
    fn run(&self, ctx: &mut MapContext<'_>, config: &Value) -> Result<(), ExecuteError>;
}

/// Distributes a validated, default-filled stage config across the stage's
/// steps. Returns `(step id, partial step config)` pairs; steps not named
/// fall back to their schema defaults.
pub type StageCompileFn = fn(&Value) -> Vec<(&'static str, Value)>;

/// An ordered group of steps configured by one public config block.
pub struct Stage {
    /// Stage id; the key users configure under.
    pub id: &'static str,
    /// Public config schema for this stage.
    pub schema: ObjectSchema,
    /// Steps in declaration order.
    pub steps: Vec<Box<dyn Step>>,
    /// Stage config distributor.
    pub compile: StageCompileFn,
}

impl Stage {
    /// Builds a stage.
    #[must_use]
    pub fn new(
        id: &'static str,
        schema: ObjectSchema,
        steps: Vec<Box<dyn Step>>,
        compile: StageCompileFn,
    ) -> Self {
        Self { id, schema, steps, compile }
    }

    /// Finds a step by contract id.
    #[must_use]
    pub fn step(&self, id: &str) -> Option<&dyn Step> {
        self.steps
            .iter()
            .find(|s| s.contract().id == id)
            .map(AsRef::as_ref)
    }
}

/// The full ordered set of stages plus the tag registry they were checked
/// against.
pub struct Recipe {
    /// Stages in execution order.
    pub stages: Vec<Stage>,
    /// Registry every step tag was validated against.
    pub registry: TagRegistry,
}

impl Recipe {
    /// Assembles a recipe, validating every step's requires/provides
    /// against the registry.
    ///
    /// # Errors
    ///
    /// [`TagError::Unknown`] when a step references an unregistered tag.
    pub fn new(stages: Vec<Stage>, registry: TagRegistry) -> Result<Self, TagError> {
        for stage in &stages {
            for step in &stage.steps {
                let contract = step.contract();
                registry.validate_all(contract.requires.iter().map(|t| t.id))?;
                registry.validate_all(contract.provides.iter().map(|t| t.id))?;
            }
        }
        Ok(Self { stages, registry })
    }

    /// Total number of steps across all stages.
    #[must_use]
    pub fn step_count(&self) -> usize {
        self.stages.iter().map(|s| s.steps.len()).sum()
    }
}
