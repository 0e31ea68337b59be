//! # Standard Recipe Stages
//!
//! The six public stage contracts. Each stage exposes one curated config
//! block and a distributor that maps it onto the stage's step configs. Step
//! schemas stay the source of truth for bounds: everything a distributor
//! emits is validated again against the receiving step.

use indexmap::IndexMap;
use serde_json::{json, Value};
use ymir_core::error::ContractError;
use ymir_core::schema::{EnvelopeSchema, ObjectSchema, Schema, DEFAULT_STRATEGY};
use ymir_core::step::{Stage, Step};

use crate::biomes::ClassifyBiomesStep;
use crate::climate::{ClimateBaselineStep, ClimateRefineStep};
use crate::cryosphere::CryosphereStep;
use crate::features::PlaceFeaturesStep;
use crate::hydrology::{ModelRiversStep, RouteFlowStep};
use crate::mesh::PlateMeshStep;
use crate::morphology::{BuildTopographyStep, ShapeCoastlinesStep};
use crate::tectonics::ClassifyBoundariesStep;

fn edge_band_schema() -> ObjectSchema {
    ObjectSchema::new()
        .field("rows", Schema::int_range(1, 0, 16))
        .field(
            "regime",
            Schema::string_one_of("divergent", &["none", "convergent", "divergent", "transform"]),
        )
        .field("intensity", Schema::int_range(160, 0, 255))
}

/// Stage `tectonics`: plate mesh, then boundary classification.
///
/// The public block trades the three regime thresholds for one `activity`
/// dial; raising it lowers every threshold together, so more of the map
/// reads as active boundary.
///
/// # Errors
///
/// [`ContractError`] when a step contract is defective.
pub fn tectonics() -> Result<Stage, ContractError> {
    let schema = ObjectSchema::new()
        .field("plates", Schema::int_range(8, 2, 256))
        .field("reference_area", Schema::float_range(4000.0, 1.0, 1_000_000.0))
        .field("scaling_power", Schema::float_range(0.5, 0.0, 1.0))
        .field("activity", Schema::float_range(1.0, 0.25, 2.0))
        .field("north_edge", Schema::Object(edge_band_schema()))
        .field("south_edge", Schema::Object(edge_band_schema()));
    Ok(Stage::new(
        "tectonics",
        schema,
        vec![
            Box::new(PlateMeshStep::define()?),
            Box::new(ClassifyBoundariesStep::define()?),
        ],
        distribute_tectonics,
    ))
}

fn distribute_tectonics(config: &Value) -> Vec<(&'static str, Value)> {
    let activity = config["activity"].as_f64().unwrap_or(1.0).max(0.25);
    vec![
        (
            "plate-mesh",
            json!({
                "mesh": { "config": {
                    "count": config["plates"],
                    "reference_area": config["reference_area"],
                    "power": config["scaling_power"],
                } },
            }),
        ),
        (
            "classify-boundaries",
            json!({
                "convergence_threshold": 0.25 / activity,
                "divergence_threshold": -0.15 / activity,
                "transform_threshold": 0.4 / activity,
                "north_edge": config["north_edge"],
                "south_edge": config["south_edge"],
            }),
        ),
    ]
}

fn sea_level_envelope() -> EnvelopeSchema {
    EnvelopeSchema {
        op: "op.sea-level",
        strategies: IndexMap::from([
            (
                DEFAULT_STRATEGY,
                ObjectSchema::new().field("water_percent", Schema::float_range(65.0, 10.0, 90.0)),
            ),
            ("fixed", ObjectSchema::new().field("level", Schema::int_range(0, -1000, 1000))),
        ]),
    }
}

/// Stage `morphology`: elevation synthesis, then coastline shaping.
///
/// # Errors
///
/// [`ContractError`] when a step contract is defective.
pub fn morphology() -> Result<Stage, ContractError> {
    let schema = ObjectSchema::new()
        .field("base_level", Schema::float_range(-320.0, -3000.0, 3000.0))
        .field("uplift_gain", Schema::float_range(2300.0, 0.0, 5000.0))
        .field("rift_gain", Schema::float_range(1050.0, 0.0, 5000.0))
        .field("shield_gain", Schema::float_range(320.0, 0.0, 5000.0))
        .field("noise_amplitude", Schema::float_range(350.0, 0.0, 2000.0))
        .field("ridge_amplitude", Schema::float_range(600.0, 0.0, 2000.0))
        .field("noise_scale", Schema::float_range(0.08, 0.005, 1.0))
        .field("octaves", Schema::int_range(4, 1, 8))
        .field("sea_level", Schema::Envelope(sea_level_envelope()))
        .field("hill_elevation", Schema::int_range(450, 0, 5000))
        .field("mountain_elevation", Schema::int_range(1400, 0, 5000))
        .field("remove_isolated", Schema::flag(true));
    Ok(Stage::new(
        "morphology",
        schema,
        vec![
            Box::new(BuildTopographyStep::define()?),
            Box::new(ShapeCoastlinesStep::define()?),
        ],
        distribute_morphology,
    ))
}

fn distribute_morphology(config: &Value) -> Vec<(&'static str, Value)> {
    vec![
        (
            "build-topography",
            json!({
                "base_level": config["base_level"],
                "uplift_gain": config["uplift_gain"],
                "rift_gain": config["rift_gain"],
                "shield_gain": config["shield_gain"],
                "noise_amplitude": config["noise_amplitude"],
                "ridge_amplitude": config["ridge_amplitude"],
                "noise_scale": config["noise_scale"],
                "octaves": config["octaves"],
            }),
        ),
        (
            "shape-coastlines",
            json!({
                "sea_level": config["sea_level"],
                "hill_elevation": config["hill_elevation"],
                "mountain_elevation": config["mountain_elevation"],
                "remove_isolated": config["remove_isolated"],
            }),
        ),
    ]
}

fn routing_envelope() -> EnvelopeSchema {
    EnvelopeSchema {
        op: "op.flow-routing",
        strategies: IndexMap::from([
            (
                DEFAULT_STRATEGY,
                ObjectSchema::new().field("epsilon", Schema::float_range(0.001, 0.000_001, 1.0)),
            ),
            ("steepest-descent", ObjectSchema::new()),
        ]),
    }
}

/// Stage `hydrology`: flow routing, then river and lake modelling.
///
/// # Errors
///
/// [`ContractError`] when a step contract is defective.
pub fn hydrology() -> Result<Stage, ContractError> {
    let schema = ObjectSchema::new()
        .field("routing", Schema::Envelope(routing_envelope()))
        .field("river_thresholds", Schema::int_list(&[40, 18, 8]))
        .field("lake_chance", Schema::int_range(25, 0, 100));
    Ok(Stage::new(
        "hydrology",
        schema,
        vec![Box::new(RouteFlowStep::define()?), Box::new(ModelRiversStep::define()?)],
        distribute_hydrology,
    ))
}

fn distribute_hydrology(config: &Value) -> Vec<(&'static str, Value)> {
    vec![
        (
            "route-flow",
            json!({
                "routing": config["routing"],
                "river_thresholds": config["river_thresholds"],
            }),
        ),
        ("model-rivers", json!({ "lake_chance": config["lake_chance"] })),
    ]
}

/// Stage `climate`: rainfall baseline, refinement passes, cryosphere.
///
/// # Errors
///
/// [`ContractError`] when a step contract is defective.
pub fn climate() -> Result<Stage, ContractError> {
    let schema = ObjectSchema::new()
        .field("band_blend", Schema::float_range(0.6, 0.0, 1.0))
        .field("band_scale", Schema::float_range(1.0, 0.5, 1.5))
        .field("coastal_bonus", Schema::int_range(24, 0, 60))
        .field("river_bonus", Schema::int_range(16, 0, 60))
        .field("noise_amplitude", Schema::int_range(6, 0, 30))
        .field(
            "jets",
            Schema::Object(
                ObjectSchema::new()
                    .field("count", Schema::int_range(2, 1, 4))
                    .field("strength", Schema::float_range(1.0, 0.0, 3.0)),
            ),
        )
        .field("offset_c", Schema::float_range(0.0, -20.0, 20.0))
        .field(
            "shadow",
            Schema::Object(
                ObjectSchema::new()
                    .field("barrier_m", Schema::int_range(500, 0, 5000))
                    .field("window", Schema::int_range(6, 1, 12)),
            ),
        )
        .field(
            "cryosphere",
            Schema::Object(
                ObjectSchema::new()
                    .field("iterations", Schema::int_range(3, 1, 8))
                    .field("snow_start_c", Schema::float_range(2.0, -10.0, 10.0))
                    .field("snow_full_c", Schema::float_range(-8.0, -30.0, 0.0))
                    .field("ice_start_c", Schema::float_range(-1.8, -10.0, 5.0))
                    .field("ice_full_c", Schema::float_range(-12.0, -40.0, -2.0))
                    .field("feedback_c", Schema::float_range(4.0, 0.0, 10.0))
                    .field("min_c", Schema::float_range(-60.0, -90.0, 0.0))
                    .field("max_c", Schema::float_range(50.0, 0.0, 90.0)),
            ),
        );
    Ok(Stage::new(
        "climate",
        schema,
        vec![
            Box::new(ClimateBaselineStep::define()?),
            Box::new(ClimateRefineStep::define()?),
            Box::new(CryosphereStep::define()?),
        ],
        distribute_climate,
    ))
}

fn distribute_climate(config: &Value) -> Vec<(&'static str, Value)> {
    vec![
        (
            "climate-baseline",
            json!({
                "band_blend": config["band_blend"],
                "band_scale": config["band_scale"],
                "coastal_bonus": config["coastal_bonus"],
                "river_bonus": config["river_bonus"],
                "noise_amplitude": config["noise_amplitude"],
                "jet_count": config["jets"]["count"],
                "jet_strength": config["jets"]["strength"],
            }),
        ),
        (
            "climate-refine",
            json!({
                "offset_c": config["offset_c"],
                "shadow_barrier_m": config["shadow"]["barrier_m"],
                "shadow_window": config["shadow"]["window"],
            }),
        ),
        ("cryosphere", config["cryosphere"].clone()),
    ]
}

/// Stage `biomes`: one step, so the stage block is the step block.
///
/// # Errors
///
/// [`ContractError`] when the step contract is defective.
pub fn biomes() -> Result<Stage, ContractError> {
    let step = ClassifyBiomesStep::define()?;
    let schema = step.contract().schema.clone();
    Ok(Stage::new("biomes", schema, vec![Box::new(step)], distribute_biomes))
}

fn distribute_biomes(config: &Value) -> Vec<(&'static str, Value)> {
    vec![("classify-biomes", config.clone())]
}

/// Stage `features`: one step, so the stage block is the step block.
///
/// # Errors
///
/// [`ContractError`] when the step contract is defective.
pub fn features() -> Result<Stage, ContractError> {
    let step = PlaceFeaturesStep::define()?;
    let schema = step.contract().schema.clone();
    Ok(Stage::new("features", schema, vec![Box::new(step)], distribute_features))
}

fn distribute_features(config: &Value) -> Vec<(&'static str, Value)> {
    vec![("place-features", config.clone())]
}
