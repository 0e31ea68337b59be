//! # Recipe Compiler
//!
//! Turns a nested, partially-specified user config into a flat, ordered
//! list of per-step validated configs. Compilation is pure: the same
//! `(recipe, config)` pair always yields the same compiled recipe or the
//! same issue list.
//!
//! The compiler never stops at the first problem. Every schema violation,
//! unknown key, undeclared step id, and unsatisfiable dependency in the
//! whole config is collected into one [`RecipeCompileError`].

use std::collections::BTreeSet;

use serde_json::Value;

use crate::error::{CompileIssue, CompileIssueCode, RecipeCompileError};
use crate::schema::kind_of;
use crate::step::{Recipe, Stage, Step};

/// One step, scheduled and fully configured.
pub struct CompiledStep<'r> {
    /// Owning stage id.
    pub stage: &'static str,
    /// The step to run.
    pub step: &'r dyn Step,
    /// Validated, default-filled config.
    pub config: Value,
}

impl std::fmt::Debug for CompiledStep<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompiledStep")
            .field("stage", &self.stage)
            .field("step", &self.step.contract().id)
            .field("config", &self.config)
            .finish()
    }
}

/// The executable form of a recipe: steps in execution order.
#[derive(Debug)]
pub struct CompiledRecipe<'r> {
    /// Steps in the order the executor will run them.
    pub steps: Vec<CompiledStep<'r>>,
}

impl CompiledRecipe<'_> {
    /// Step ids in execution order.
    #[must_use]
    pub fn step_ids(&self) -> Vec<&'static str> {
        self.steps.iter().map(|s| s.step.contract().id).collect()
    }
}

/// Compiles a user config against a recipe.
///
/// `config` is the nested per-stage user config; `Value::Null` means "all
/// defaults". Steps are ordered topologically by their dependency tags,
/// ties broken by declaration order; stages keep their recipe order.
///
/// # Errors
///
/// [`RecipeCompileError`] carrying every issue found in one pass.
pub fn compile_recipe<'r>(
    recipe: &'r Recipe,
    config: &Value,
) -> Result<CompiledRecipe<'r>, RecipeCompileError> {
    let mut issues: Vec<CompileIssue> = Vec::new();

    let user = match config {
        Value::Null => None,
        Value::Object(map) => Some(map),
        other => {
            issues.push(CompileIssue::new(
                CompileIssueCode::ConfigInvalid,
                "/config",
                format!("expected object (got {})", kind_of(other)),
            ));
            None
        }
    };

    if let Some(map) = user {
        for key in map.keys() {
            if !recipe.stages.iter().any(|s| s.id == key.as_str()) {
                issues.push(CompileIssue::new(
                    CompileIssueCode::ConfigInvalid,
                    format!("/config/{key}"),
                    "unknown stage".to_owned(),
                ));
            }
        }
    }

    // Per stage: validate the public block, distribute it, validate the
    // distributed per-step configs, then fill defaults.
    let mut staged: Vec<(&'r Stage, Vec<(&'r dyn Step, Value)>)> = Vec::new();
    for stage in &recipe.stages {
        let raw = user.and_then(|m| m.get(stage.id));
        let mut stage_issues = Vec::new();
        if let Some(raw_value) = raw {
            stage
                .schema
                .validate(raw_value, &format!("/config/{}", stage.id), &mut stage_issues);
        }
        // A rejected stage block distributes from defaults instead, so one
        // bad value is reported once rather than echoed by every step schema
        // downstream of the distributor.
        let filled = if stage_issues.is_empty() {
            stage.schema.fill_defaults(raw)
        } else {
            issues.append(&mut stage_issues);
            stage.schema.default_value()
        };

        let mut slots: Vec<(&'r dyn Step, Option<Value>)> =
            stage.steps.iter().map(|s| (s.as_ref(), None)).collect();
        for (step_id, step_config) in (stage.compile)(&filled) {
            let path = format!("/config/{}/{step_id}", stage.id);
            match slots.iter_mut().find(|(s, _)| s.contract().id == step_id) {
                Some(slot) => {
                    slot.0.contract().schema.validate(&step_config, &path, &mut issues);
                    slot.1 = Some(step_config);
                }
                None => issues.push(CompileIssue::new(
                    CompileIssueCode::UnknownStepId,
                    path,
                    format!(
                        "stage '{}' compiled config for undeclared step '{step_id}'",
                        stage.id
                    ),
                )),
            }
        }

        let configured = slots
            .into_iter()
            .map(|(step, partial)| {
                let config = step.contract().schema.fill_defaults(partial.as_ref());
                (step, config)
            })
            .collect();
        staged.push((stage, configured));
    }

    // Topological order: within each stage, repeatedly take the first step
    // (declaration order) whose requires are all satisfied. A deadlock means
    // genuinely missing dependencies; report them and fall back to
    // declaration order so later issues still surface.
    let mut satisfied: BTreeSet<&'static str> = BTreeSet::new();
    let mut ordered: Vec<CompiledStep<'r>> = Vec::new();
    for (stage, mut remaining) in staged {
        loop {
            if remaining.is_empty() {
                break;
            }
            let ready = remaining.iter().position(|(step, _)| {
                step.contract().requires.iter().all(|tag| satisfied.contains(tag.id))
            });
            match ready {
                Some(i) => {
                    let (step, config) = remaining.remove(i);
                    for tag in &step.contract().provides {
                        satisfied.insert(tag.id);
                    }
                    ordered.push(CompiledStep { stage: stage.id, step, config });
                }
                None => {
                    for (step, config) in remaining.drain(..) {
                        for tag in &step.contract().requires {
                            if !satisfied.contains(tag.id) {
                                let hint = recipe
                                    .registry
                                    .get(tag.id)
                                    .and_then(|known| known.owner)
                                    .map_or_else(String::new, |owner| {
                                        format!(
                                            " (normally provided by {} step '{}')",
                                            owner.phase, owner.step_id
                                        )
                                    });
                                issues.push(CompileIssue::new(
                                    CompileIssueCode::MissingDependency,
                                    format!("/config/{}/{}", stage.id, step.contract().id),
                                    format!(
                                        "requires '{}' which no earlier step provides{hint}",
                                        tag.id
                                    ),
                                ));
                            }
                        }
                        for tag in &step.contract().provides {
                            satisfied.insert(tag.id);
                        }
                        ordered.push(CompiledStep { stage: stage.id, step, config });
                    }
                    break;
                }
            }
        }
    }

    if issues.is_empty() {
        Ok(CompiledRecipe { steps: ordered })
    } else {
        Err(RecipeCompileError::new(issues))
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::context::MapContext;
    use crate::contract::StepContract;
    use crate::error::ExecuteError;
    use crate::schema::{ObjectSchema, Schema};
    use crate::step::Stage;
    use crate::tags::{DependencyTag, TagOwner, TagRegistry};

    struct NullStep {
        contract: StepContract,
    }

    impl NullStep {
        fn boxed(
            id: &'static str,
            requires: Vec<DependencyTag>,
            provides: Vec<DependencyTag>,
            schema: ObjectSchema,
        ) -> Box<dyn Step> {
            Box::new(Self {
                contract: StepContract::define(id, "test", requires, provides, schema, &[])
                    .unwrap(),
            })
        }
    }

    impl Step for NullStep {
        fn contract(&self) -> &StepContract {
            &self.contract
        }

        fn run(&self, _ctx: &mut MapContext<'_>, _config: &Value) -> Result<(), ExecuteError> {
            Ok(())
        }
    }

    fn pass_through(_config: &Value) -> Vec<(&'static str, Value)> {
        Vec::new()
    }

    fn registry() -> TagRegistry {
        let mut registry = TagRegistry::new();
        registry
            .register_all([
                DependencyTag::artifact("artifact:test.mesh").with_owner(TagOwner {
                    pkg: "ymir_core",
                    phase: "alpha",
                    step_id: "make-mesh",
                }),
                DependencyTag::artifact("artifact:test.mask"),
                DependencyTag::effect("effect:test.done"),
            ])
            .unwrap();
        registry
    }

    fn two_stage_recipe() -> Recipe {
        let alpha = Stage::new(
            "alpha",
            ObjectSchema::new().field("count", Schema::int_range(4, 1, 10)),
            vec![NullStep::boxed(
                "make-mesh",
                vec![],
                vec![DependencyTag::artifact("artifact:test.mesh")],
                ObjectSchema::new().field("count", Schema::int_range(4, 1, 10)),
            )],
            |config| vec![("make-mesh", json!({ "count": config["count"] }))],
        );
        let beta = Stage::new(
            "beta",
            ObjectSchema::new(),
            vec![NullStep::boxed(
                "use-mesh",
                vec![DependencyTag::artifact("artifact:test.mesh")],
                vec![DependencyTag::effect("effect:test.done")],
                ObjectSchema::new(),
            )],
            pass_through,
        );
        Recipe::new(vec![alpha, beta], registry()).unwrap()
    }

    #[test]
    fn null_config_compiles_to_defaults() {
        let recipe = two_stage_recipe();
        let compiled = compile_recipe(&recipe, &Value::Null).unwrap();
        assert_eq!(compiled.step_ids(), vec!["make-mesh", "use-mesh"]);
        assert_eq!(compiled.steps[0].config, json!({ "count": 4 }));
    }

    #[test]
    fn independent_violations_are_all_reported() {
        let recipe = two_stage_recipe();
        let err = compile_recipe(
            &recipe,
            &json!({
                "alpha": { "count": 99 },
                "gamma": {},
            }),
        )
        .unwrap_err();
        assert_eq!(err.issues.len(), 2);
        assert!(err.issues.iter().any(|i| i.code == CompileIssueCode::ConfigInvalid
            && i.path == "/config/gamma"
            && i.message == "unknown stage"));
        assert!(err.issues.iter().any(|i| i.code == CompileIssueCode::ConfigInvalid
            && i.path == "/config/alpha/count"));
    }

    #[test]
    fn stage_compiling_for_undeclared_step_is_reported() {
        let stage = Stage::new(
            "alpha",
            ObjectSchema::new(),
            vec![NullStep::boxed("make-mesh", vec![], vec![], ObjectSchema::new())],
            |_| vec![("no-such-step", json!({}))],
        );
        let recipe = Recipe::new(vec![stage], registry()).unwrap();
        let err = compile_recipe(&recipe, &Value::Null).unwrap_err();
        assert_eq!(err.issues.len(), 1);
        assert_eq!(err.issues[0].code, CompileIssueCode::UnknownStepId);
        assert_eq!(err.issues[0].path, "/config/alpha/no-such-step");
    }

    #[test]
    fn unsatisfiable_requires_are_reported() {
        let stage = Stage::new(
            "beta",
            ObjectSchema::new(),
            vec![NullStep::boxed(
                "use-mesh",
                vec![DependencyTag::artifact("artifact:test.mesh")],
                vec![],
                ObjectSchema::new(),
            )],
            pass_through,
        );
        let recipe = Recipe::new(vec![stage], registry()).unwrap();
        let err = compile_recipe(&recipe, &Value::Null).unwrap_err();
        assert_eq!(err.issues.len(), 1);
        assert_eq!(err.issues[0].code, CompileIssueCode::MissingDependency);
        assert!(err.issues[0].message.contains("artifact:test.mesh"));
        assert!(err.issues[0].message.contains("normally provided by alpha step 'make-mesh'"));
    }

    #[test]
    fn steps_reorder_topologically_with_declaration_ties() {
        // Declared out of order: the consumer first.
        let stage = Stage::new(
            "alpha",
            ObjectSchema::new(),
            vec![
                NullStep::boxed(
                    "use-mesh",
                    vec![DependencyTag::artifact("artifact:test.mesh")],
                    vec![],
                    ObjectSchema::new(),
                ),
                NullStep::boxed(
                    "make-mesh",
                    vec![],
                    vec![DependencyTag::artifact("artifact:test.mesh")],
                    ObjectSchema::new(),
                ),
                NullStep::boxed("make-mask", vec![], vec![], ObjectSchema::new()),
            ],
            pass_through,
        );
        let recipe = Recipe::new(vec![stage], registry()).unwrap();
        let compiled = compile_recipe(&recipe, &Value::Null).unwrap();
        // make-mesh unblocks use-mesh; make-mask waits its declared turn.
        assert_eq!(compiled.step_ids(), vec!["make-mesh", "use-mesh", "make-mask"]);
    }
}
