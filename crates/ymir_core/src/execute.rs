//! # Executor
//!
//! Walks a compiled recipe over one [`MapContext`]. Each step runs exactly
//! once: its requires are gated against the satisfied-set, its config goes
//! through the optional normalize hook (then re-validation), and its
//! provides are verified after it returns. The first error aborts the whole
//! run; steps are never retried.

use std::time::Instant;

use serde_json::Value;

use crate::compile::CompiledRecipe;
use crate::context::MapContext;
use crate::error::ExecuteError;
use crate::tags::TagKind;

/// Timing record for one executed step.
#[derive(Clone, Debug)]
pub struct StepRunRecord {
    /// Owning stage id.
    pub stage: &'static str,
    /// Step id.
    pub step: &'static str,
    /// Wall-clock execution time.
    pub elapsed_micros: u128,
}

/// What ran, in order, and how long it took.
#[derive(Clone, Debug, Default)]
pub struct RunReport {
    /// One record per executed step, in execution order.
    pub steps: Vec<StepRunRecord>,
}

impl RunReport {
    /// Step ids in execution order.
    #[must_use]
    pub fn step_ids(&self) -> Vec<&'static str> {
        self.steps.iter().map(|s| s.step).collect()
    }

    /// Total wall-clock time across all steps.
    #[must_use]
    pub fn total_micros(&self) -> u128 {
        self.steps.iter().map(|s| s.elapsed_micros).sum()
    }
}

/// Runs every step of a compiled recipe against `ctx`.
///
/// `knobs` is the opaque user-dial object handed to each step's normalize
/// hook alongside the run environment.
///
/// # Errors
///
/// [`ExecuteError::MissingDependency`] when a step is reached before its
/// requires are satisfied, [`ExecuteError::UnsatisfiedProvides`] when a step
/// returns without publishing a declared artifact,
/// [`ExecuteError::NormalizedConfigInvalid`] when a normalize hook corrupts
/// a config, or whatever the step itself raises.
pub fn execute(
    compiled: &CompiledRecipe<'_>,
    ctx: &mut MapContext<'_>,
    knobs: &Value,
) -> Result<RunReport, ExecuteError> {
    let mut report = RunReport::default();
    for entry in &compiled.steps {
        let contract = entry.step.contract();

        for tag in &contract.requires {
            if !tag.is_satisfied(ctx) {
                return Err(ExecuteError::MissingDependency {
                    step: contract.id.to_owned(),
                    tag: tag.id.to_owned(),
                    satisfied: ctx.satisfied.sorted_ids(),
                });
            }
        }

        // Normalize may rescale the config from env/knobs; re-validate so a
        // defective hook cannot hand the step an invalid config.
        let normalized = entry.step.normalize(entry.config.clone(), &ctx.env, knobs);
        let mut issues = Vec::new();
        contract.schema.validate(&normalized, "/", &mut issues);
        if let Some(first) = issues.first() {
            return Err(ExecuteError::NormalizedConfigInvalid {
                step: contract.id.to_owned(),
                message: first.to_string(),
            });
        }
        let config = contract.schema.fill_defaults(Some(&normalized));

        tracing::debug!(
            target: "ymir::execute",
            stage = entry.stage,
            step = contract.id,
            "step start"
        );
        let started = Instant::now();
        entry.step.run(ctx, &config)?;
        let elapsed_micros = started.elapsed().as_micros();
        tracing::debug!(
            target: "ymir::execute",
            step = contract.id,
            elapsed_micros = elapsed_micros as u64,
            "step done"
        );

        for tag in &contract.provides {
            if tag.kind == TagKind::Artifact && !ctx.artifacts.contains(tag.id) {
                return Err(ExecuteError::UnsatisfiedProvides {
                    step: contract.id.to_owned(),
                    tag: tag.id.to_owned(),
                });
            }
            ctx.satisfied.mark(tag.id);
        }

        report.steps.push(StepRunRecord {
            stage: entry.stage,
            step: contract.id,
            elapsed_micros,
        });
    }
    Ok(report)
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;

    use serde_json::json;
    use ymir_adapter::{LatitudeBounds, MockAdapter, MockAdapterConfig};

    use super::*;
    use crate::artifact::{expect_len, ArtifactHandle};
    use crate::compile::CompiledStep;
    use crate::context::MapEnv;
    use crate::contract::StepContract;
    use crate::rng::WorldSeed;
    use crate::schema::{ObjectSchema, Schema};
    use crate::step::Step;
    use crate::tags::DependencyTag;
    use crate::trace::TraceSink;

    const MASK: ArtifactHandle<Vec<u8>> =
        ArtifactHandle::new("artifact:test.mask", |mask, dims| {
            expect_len("mask", dims.size(), mask)
        });

    struct PublishStep {
        contract: StepContract,
        runs: Cell<u32>,
    }

    impl PublishStep {
        fn new() -> Self {
            Self {
                contract: StepContract::define(
                    "make-mask",
                    "test",
                    vec![],
                    vec![DependencyTag::artifact(MASK.tag)],
                    ObjectSchema::new().field("fill", Schema::int_range(1, 0, 255)),
                    &[],
                )
                .unwrap(),
                runs: Cell::new(0),
            }
        }
    }

    impl Step for PublishStep {
        fn contract(&self) -> &StepContract {
            &self.contract
        }

        fn run(&self, ctx: &mut MapContext<'_>, config: &Value) -> Result<(), ExecuteError> {
            self.runs.set(self.runs.get() + 1);
            let fill = u8::try_from(config["fill"].as_i64().unwrap_or(0)).unwrap_or(0);
            ctx.publish(MASK, vec![fill; ctx.size()])?;
            Ok(())
        }
    }

    struct LiarStep {
        contract: StepContract,
    }

    impl LiarStep {
        fn new() -> Self {
            Self {
                contract: StepContract::define(
                    "claims-mask",
                    "test",
                    vec![],
                    vec![DependencyTag::artifact(MASK.tag)],
                    ObjectSchema::new(),
                    &[],
                )
                .unwrap(),
            }
        }
    }

    impl Step for LiarStep {
        fn contract(&self) -> &StepContract {
            &self.contract
        }

        fn run(&self, _ctx: &mut MapContext<'_>, _config: &Value) -> Result<(), ExecuteError> {
            Ok(())
        }
    }

    struct NeedsMask {
        contract: StepContract,
    }

    impl NeedsMask {
        fn new() -> Self {
            Self {
                contract: StepContract::define(
                    "use-mask",
                    "test",
                    vec![DependencyTag::artifact(MASK.tag)],
                    vec![DependencyTag::effect("effect:test.done")],
                    ObjectSchema::new(),
                    &[],
                )
                .unwrap(),
            }
        }
    }

    impl Step for NeedsMask {
        fn contract(&self) -> &StepContract {
            &self.contract
        }

        fn run(&self, ctx: &mut MapContext<'_>, _config: &Value) -> Result<(), ExecuteError> {
            let mask = ctx.read(MASK)?;
            assert_eq!(mask.len(), ctx.size());
            Ok(())
        }
    }

    struct DoublingStep {
        contract: StepContract,
    }

    impl DoublingStep {
        fn new() -> Self {
            Self {
                contract: StepContract::define(
                    "scale-count",
                    "test",
                    vec![],
                    vec![],
                    ObjectSchema::new().field("count", Schema::int_range(4, 2, 16)),
                    &[],
                )
                .unwrap(),
            }
        }
    }

    impl Step for DoublingStep {
        fn contract(&self) -> &StepContract {
            &self.contract
        }

        fn normalize(&self, config: Value, _env: &MapEnv, knobs: &Value) -> Value {
            let mut config = config;
            if knobs["double"].as_bool() == Some(true) {
                let count = config["count"].as_i64().unwrap_or(4);
                config["count"] = json!((count * 2).min(16));
            }
            config
        }

        fn run(&self, _ctx: &mut MapContext<'_>, config: &Value) -> Result<(), ExecuteError> {
            assert_eq!(config["count"], json!(8));
            Ok(())
        }
    }

    fn context(adapter: &mut MockAdapter) -> MapContext<'_> {
        MapContext::new(
            adapter,
            LatitudeBounds::symmetric(60.0),
            WorldSeed::new(3),
            TraceSink::disabled(),
        )
    }

    #[test]
    fn steps_run_once_in_order_and_mark_provides() {
        let publish = PublishStep::new();
        let consume = NeedsMask::new();
        let compiled = CompiledRecipe {
            steps: vec![
                CompiledStep {
                    stage: "test",
                    step: &publish,
                    config: json!({ "fill": 7 }),
                },
                CompiledStep { stage: "test", step: &consume, config: json!({}) },
            ],
        };
        let mut adapter = MockAdapter::new(MockAdapterConfig::ocean(4, 4, 3));
        let mut ctx = context(&mut adapter);
        let report = execute(&compiled, &mut ctx, &Value::Null).unwrap();
        assert_eq!(report.step_ids(), vec!["make-mask", "use-mask"]);
        assert_eq!(publish.runs.get(), 1);
        assert!(ctx.satisfied.contains("artifact:test.mask"));
        assert!(ctx.satisfied.contains("effect:test.done"));
    }

    #[test]
    fn unsatisfied_requires_abort_with_sorted_satisfied_set() {
        let consume = NeedsMask::new();
        let compiled = CompiledRecipe {
            steps: vec![CompiledStep { stage: "test", step: &consume, config: json!({}) }],
        };
        let mut adapter = MockAdapter::new(MockAdapterConfig::ocean(4, 4, 3));
        let mut ctx = context(&mut adapter);
        let err = execute(&compiled, &mut ctx, &Value::Null).unwrap_err();
        assert_eq!(
            err,
            ExecuteError::MissingDependency {
                step: "use-mask".to_owned(),
                tag: "artifact:test.mask".to_owned(),
                satisfied: vec![],
            }
        );
    }

    #[test]
    fn declared_but_unpublished_artifact_is_rejected() {
        let liar = LiarStep::new();
        let compiled = CompiledRecipe {
            steps: vec![CompiledStep { stage: "test", step: &liar, config: json!({}) }],
        };
        let mut adapter = MockAdapter::new(MockAdapterConfig::ocean(4, 4, 3));
        let mut ctx = context(&mut adapter);
        let err = execute(&compiled, &mut ctx, &Value::Null).unwrap_err();
        assert_eq!(
            err,
            ExecuteError::UnsatisfiedProvides {
                step: "claims-mask".to_owned(),
                tag: "artifact:test.mask".to_owned(),
            }
        );
    }

    #[test]
    fn normalize_rewrites_are_applied_and_revalidated() {
        let step = DoublingStep::new();
        let compiled = CompiledRecipe {
            steps: vec![CompiledStep {
                stage: "test",
                step: &step,
                config: json!({ "count": 4 }),
            }],
        };
        let mut adapter = MockAdapter::new(MockAdapterConfig::ocean(4, 4, 3));
        let mut ctx = context(&mut adapter);
        execute(&compiled, &mut ctx, &json!({ "double": true })).unwrap();
    }

    #[test]
    fn normalize_that_breaks_schema_is_fatal() {
        struct Corrupting {
            contract: StepContract,
        }
        impl Step for Corrupting {
            fn contract(&self) -> &StepContract {
                &self.contract
            }
            fn normalize(&self, _config: Value, _env: &MapEnv, _knobs: &Value) -> Value {
                json!({ "count": "many" })
            }
            fn run(&self, _ctx: &mut MapContext<'_>, _config: &Value) -> Result<(), ExecuteError> {
                Ok(())
            }
        }
        let step = Corrupting {
            contract: StepContract::define(
                "scale-count",
                "test",
                vec![],
                vec![],
                ObjectSchema::new().field("count", Schema::int(4)),
                &[],
            )
            .unwrap(),
        };
        let compiled = CompiledRecipe {
            steps: vec![CompiledStep { stage: "test", step: &step, config: json!({}) }],
        };
        let mut adapter = MockAdapter::new(MockAdapterConfig::ocean(4, 4, 3));
        let mut ctx = context(&mut adapter);
        let err = execute(&compiled, &mut ctx, &Value::Null).unwrap_err();
        assert!(matches!(err, ExecuteError::NormalizedConfigInvalid { .. }));
    }
}
