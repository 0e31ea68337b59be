//! # The Standard Recipe
//!
//! Six stages, eleven steps: tectonics, morphology, hydrology, climate,
//! biomes, features. [`generate`] is the one-call entry point a host engine
//! uses; callers that want to inspect or rewrite configs in between use
//! [`standard_recipe`] with [`ymir_core::compile`] and [`ymir_core::execute`]
//! directly.

pub mod stages;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::info;
use ymir_adapter::{EngineAdapter, LatitudeBounds};
use ymir_core::artifact::ArtifactStore;
use ymir_core::compile::compile_recipe;
use ymir_core::context::MapContext;
use ymir_core::execute::{execute, RunReport};
use ymir_core::rng::WorldSeed;
use ymir_core::step::Recipe;
use ymir_core::trace::TraceSink;

use crate::artifacts;
use crate::error::GenerationResult;

/// Rainfall lean of the generated world.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Dryness {
    /// Scale latitude-band rainfall targets up.
    Wet,
    /// Leave the band targets alone.
    #[default]
    Mix,
    /// Scale latitude-band rainfall targets down.
    Dry,
}

/// Temperature lean of the generated world.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Temperature {
    /// Shift the global temperature offset down.
    Cold,
    /// Leave the offset alone.
    #[default]
    Temperate,
    /// Shift the global temperature offset up.
    Hot,
}

/// Player-facing generation knobs.
///
/// Knobs are folded into op configs by the climate steps' `normalize`
/// hooks; a knob never overrides a value the caller set explicitly.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Knobs {
    /// Rainfall lean, applied to the band scale.
    #[serde(default)]
    pub dryness: Dryness,
    /// Temperature lean, applied to the global offset.
    #[serde(default)]
    pub temperature: Temperature,
}

/// Everything one generation run needs beside the adapter.
#[derive(Clone, Debug)]
pub struct GenerationOptions {
    /// World seed; equal seeds reproduce equal maps.
    pub seed: u64,
    /// Nested per-stage config; [`Value::Null`] means all defaults.
    pub config: Value,
    /// Player-facing knobs.
    pub knobs: Knobs,
    /// Latitude extent mapped across rows.
    pub latitude: LatitudeBounds,
    /// Record trace events and grid dumps for offline inspection.
    pub trace: bool,
}

impl GenerationOptions {
    /// Options for `seed` with every other setting at its default.
    #[must_use]
    pub fn new(seed: u64) -> Self {
        Self {
            seed,
            config: Value::Null,
            knobs: Knobs::default(),
            latitude: LatitudeBounds::symmetric(80.0),
            trace: false,
        }
    }
}

/// What a finished run hands back.
pub struct GenerationOutput {
    /// Per-step timing in execution order.
    pub report: RunReport,
    /// Every buffer the run published.
    pub artifacts: ArtifactStore,
    /// Trace events; empty unless tracing was requested.
    pub trace: TraceSink,
}

/// Assembles the standard six-stage recipe.
///
/// # Errors
///
/// [`GenerationError`](crate::error::GenerationError) when a step contract
/// or the tag inventory is defective; reaching that from here is a bug in
/// this crate.
pub fn standard_recipe() -> GenerationResult<Recipe> {
    let stage_list = vec![
        stages::tectonics()?,
        stages::morphology()?,
        stages::hydrology()?,
        stages::climate()?,
        stages::biomes()?,
        stages::features()?,
    ];
    Ok(Recipe::new(stage_list, artifacts::register_tags()?)?)
}

/// Parses a TOML recipe config into the nested [`Value`] form
/// [`compile_recipe`] consumes.
///
/// # Errors
///
/// [`GenerationError::ConfigFormat`](crate::error::GenerationError) when
/// the text is not valid TOML.
pub fn config_from_toml(text: &str) -> GenerationResult<Value> {
    let parsed: toml::Value = toml::from_str(text)?;
    Ok(serde_json::to_value(parsed)?)
}

/// Runs the standard recipe against `adapter`.
///
/// Compiles `options.config`, executes every step once, and hands back the
/// run report, the artifact store, and the trace sink.
///
/// # Errors
///
/// [`GenerationError`](crate::error::GenerationError): an aggregated config
/// rejection before any step runs, or the first invariant violation after.
pub fn generate(
    adapter: &mut dyn EngineAdapter,
    options: &GenerationOptions,
) -> GenerationResult<GenerationOutput> {
    let recipe = standard_recipe()?;
    let compiled = compile_recipe(&recipe, &options.config)?;
    let knobs = serde_json::to_value(options.knobs)?;
    let sink = if options.trace { TraceSink::enabled() } else { TraceSink::disabled() };
    let dims = adapter.dimensions();
    info!(
        target: "ymir::recipe",
        seed = options.seed,
        width = dims.width,
        height = dims.height,
        steps = compiled.steps.len(),
        "generation started"
    );
    let mut ctx =
        MapContext::new(adapter, options.latitude, WorldSeed::new(options.seed), sink);
    let report = execute(&compiled, &mut ctx, &knobs)?;
    info!(
        target: "ymir::recipe",
        micros = report.total_micros() as u64,
        "generation finished"
    );
    let MapContext { artifacts, trace, .. } = ctx;
    Ok(GenerationOutput { report, artifacts, trace })
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use ymir_adapter::{MockAdapter, MockAdapterConfig};

    use super::*;

    const STANDARD_ORDER: [&str; 11] = [
        "plate-mesh",
        "classify-boundaries",
        "build-topography",
        "shape-coastlines",
        "route-flow",
        "model-rivers",
        "climate-baseline",
        "climate-refine",
        "cryosphere",
        "classify-biomes",
        "place-features",
    ];

    #[test]
    fn null_config_compiles_in_dependency_order() {
        let recipe = standard_recipe().unwrap();
        let compiled = compile_recipe(&recipe, &Value::Null).unwrap();
        assert_eq!(compiled.step_ids(), STANDARD_ORDER);
    }

    #[test]
    fn stage_blocks_distribute_to_their_steps() {
        let recipe = standard_recipe().unwrap();
        let config = json!({
            "tectonics": { "plates": 16, "activity": 2.0 },
            "climate": { "jets": { "count": 3 } },
        });
        let compiled = compile_recipe(&recipe, &config).unwrap();
        let step = |id: &str| {
            compiled
                .steps
                .iter()
                .find(|s| s.step.contract().id == id)
                .unwrap_or_else(|| panic!("no step '{id}'"))
        };
        assert_eq!(step("plate-mesh").config.pointer("/mesh/config/count"), Some(&json!(16)));
        assert_eq!(step("classify-boundaries").config["convergence_threshold"], json!(0.125));
        assert_eq!(step("climate-baseline").config["jet_count"], json!(3));
        // Untouched stages still compile to complete defaults.
        assert_eq!(step("place-features").config["density"], json!(1.0));
    }

    #[test]
    fn sea_level_strategy_selection_reaches_the_coastline_step() {
        let recipe = standard_recipe().unwrap();
        let config = json!({
            "morphology": {
                "sea_level": { "strategy": "fixed", "config": { "level": 120 } },
            },
        });
        let compiled = compile_recipe(&recipe, &config).unwrap();
        let coastlines = compiled
            .steps
            .iter()
            .find(|s| s.step.contract().id == "shape-coastlines")
            .unwrap();
        assert_eq!(coastlines.config.pointer("/sea_level/strategy"), Some(&json!("fixed")));
        assert_eq!(coastlines.config.pointer("/sea_level/config/level"), Some(&json!(120)));
    }

    #[test]
    fn unknown_strategy_is_rejected_at_compile_time() {
        let recipe = standard_recipe().unwrap();
        let err = compile_recipe(
            &recipe,
            &json!({ "hydrology": { "routing": { "strategy": "uphill" } } }),
        )
        .unwrap_err();
        assert_eq!(err.issues.len(), 1);
        assert_eq!(err.issues[0].path, "/config/hydrology/routing/strategy");
        assert!(err.issues[0].message.contains("unknown strategy 'uphill'"));
    }

    #[test]
    fn independent_violations_surface_together() {
        let recipe = standard_recipe().unwrap();
        let err = compile_recipe(
            &recipe,
            &json!({
                "cartography": {},
                "morphology": { "octaves": 99 },
            }),
        )
        .unwrap_err();
        assert_eq!(err.issues.len(), 2);
        assert!(err
            .issues
            .iter()
            .any(|i| i.path == "/config/cartography" && i.message == "unknown stage"));
        assert!(err.issues.iter().any(|i| i.path == "/config/morphology/octaves"));
    }

    #[test]
    fn knobs_serialize_to_the_normalize_wire_form() {
        let knobs = Knobs { dryness: Dryness::Dry, temperature: Temperature::Hot };
        assert_eq!(
            serde_json::to_value(knobs).unwrap(),
            json!({ "dryness": "dry", "temperature": "hot" })
        );
        assert_eq!(
            serde_json::to_value(Knobs::default()).unwrap(),
            json!({ "dryness": "mix", "temperature": "temperate" })
        );
    }

    #[test]
    fn toml_configs_convert_to_the_nested_value_form() {
        let config = config_from_toml(
            "[tectonics]\nplates = 12\n\n[morphology.sea_level]\nstrategy = \"fixed\"\n\n[morphology.sea_level.config]\nlevel = 40\n",
        )
        .unwrap();
        assert_eq!(config["tectonics"]["plates"], json!(12));
        assert_eq!(config["morphology"]["sea_level"]["strategy"], json!("fixed"));
        assert_eq!(config["morphology"]["sea_level"]["config"]["level"], json!(40));
        assert!(config_from_toml("plates = [unclosed").is_err());
    }

    #[test]
    fn generate_runs_the_standard_recipe_end_to_end() {
        let mut adapter = MockAdapter::new(MockAdapterConfig::ocean(16, 12, 99));
        let output = generate(&mut adapter, &GenerationOptions::new(99)).unwrap();
        assert_eq!(output.report.step_ids(), STANDARD_ORDER);
        assert!(artifacts::RAINFALL.read(&output.artifacts).is_ok());
        assert!(artifacts::BIOMES.read(&output.artifacts).is_ok());
        assert!(output.trace.events().is_empty());
    }

    #[test]
    fn tracing_runs_collect_events_and_dumps() {
        let mut adapter = MockAdapter::new(MockAdapterConfig::ocean(16, 12, 5));
        let mut options = GenerationOptions::new(5);
        options.trace = true;
        let output = generate(&mut adapter, &options).unwrap();
        assert!(!output.trace.events().is_empty());
    }
}
