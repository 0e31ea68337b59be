//! # Standard Recipe Integration Tests
//!
//! Whole-pipeline runs against the mock engine, checking the properties
//! individual step tests cannot see:
//!
//! 1. **Determinism**: identical seed and config reproduce every artifact
//!    and every engine-visible tile byte for byte.
//! 2. **Engine mirroring**: the published land mask, rainfall and biome
//!    artifacts agree with what the adapter was told.
//! 3. **Drainage**: every land tile reaches an outlet under the default
//!    priority-flood routing, with no sinks and no cycles.
//! 4. **Range discipline**: rainfall and cryosphere temperatures stay
//!    inside their declared bounds no matter the knob settings.

use serde_json::json;
use ymir_adapter::mock::{feature, WATER_FEATURES};
use ymir_adapter::{EngineAdapter, MockAdapter, MockAdapterConfig, NO_FEATURE};
use ymir_worldgen::artifacts::{
    self, BIOMES, CRYOSPHERE, ELEVATION, FLOW, LAND_MASK, RAINFALL,
};
use ymir_worldgen::recipe::{Dryness, Temperature};
use ymir_worldgen::{generate, GenerationOptions, GenerationOutput};

const WIDTH: u32 = 24;
const HEIGHT: u32 = 18;

fn run(seed: u64, options: &GenerationOptions) -> (MockAdapter, GenerationOutput) {
    let mut adapter = MockAdapter::new(MockAdapterConfig::ocean(WIDTH, HEIGHT, seed));
    let output = generate(&mut adapter, options).unwrap();
    (adapter, output)
}

fn adapter_snapshot(adapter: &MockAdapter) -> Vec<(i32, i32, i32, i32)> {
    let mut tiles = Vec::new();
    for y in 0..HEIGHT as i32 {
        for x in 0..WIDTH as i32 {
            tiles.push((
                adapter.get_terrain_type(x, y),
                adapter.get_elevation(x, y),
                adapter.get_rainfall(x, y),
                adapter.get_biome_type(x, y),
            ));
        }
    }
    tiles
}

#[test]
fn same_seed_reproduces_the_whole_world() {
    let options = GenerationOptions::new(20_260_401);
    let (adapter_a, output_a) = run(20_260_401, &options);
    let (adapter_b, output_b) = run(20_260_401, &options);

    assert_eq!(
        ELEVATION.read(&output_a.artifacts).unwrap(),
        ELEVATION.read(&output_b.artifacts).unwrap()
    );
    assert_eq!(
        RAINFALL.read(&output_a.artifacts).unwrap(),
        RAINFALL.read(&output_b.artifacts).unwrap()
    );
    assert_eq!(
        BIOMES.read(&output_a.artifacts).unwrap(),
        BIOMES.read(&output_b.artifacts).unwrap()
    );
    assert_eq!(adapter_snapshot(&adapter_a), adapter_snapshot(&adapter_b));
    assert_eq!(output_a.report.step_ids(), output_b.report.step_ids());
}

#[test]
fn different_seeds_diverge() {
    let (_, output_a) = run(1, &GenerationOptions::new(1));
    let (_, output_b) = run(2, &GenerationOptions::new(2));

    assert_ne!(
        ELEVATION.read(&output_a.artifacts).unwrap(),
        ELEVATION.read(&output_b.artifacts).unwrap()
    );
}

#[test]
fn land_mask_agrees_with_engine_water() {
    let (adapter, output) = run(7, &GenerationOptions::new(7));
    let mask = LAND_MASK.read(&output.artifacts).unwrap();

    for y in 0..HEIGHT as i32 {
        for x in 0..WIDTH as i32 {
            let land = mask[(y * WIDTH as i32 + x) as usize] == 1;
            assert_eq!(
                land,
                !adapter.is_water(x, y),
                "mask and engine disagree at ({x}, {y})"
            );
        }
    }
    assert!(mask.iter().any(|&m| m == 1), "default sea level left no land");
    assert!(mask.iter().any(|&m| m == 0), "default sea level left no water");
}

#[test]
fn every_land_tile_drains_to_an_outlet() {
    let (_, output) = run(11, &GenerationOptions::new(11));
    let mask = LAND_MASK.read(&output.artifacts).unwrap();
    let flow = FLOW.read(&output.artifacts).unwrap();
    let hop_cap = mask.len();

    for start in 0..mask.len() {
        if mask[start] == 0 {
            continue;
        }
        let mut current = start;
        let mut hops = 0;
        loop {
            let next = flow.flow_dir[current];
            assert_ne!(
                next,
                artifacts::FLOW_SINK,
                "priority flood left a sink at {current}"
            );
            if next == artifacts::FLOW_OUTLET {
                break;
            }
            current = usize::try_from(next).unwrap();
            hops += 1;
            assert!(hops <= hop_cap, "flow from {start} cycles");
        }
    }
}

#[test]
fn rainfall_respects_the_engine_range_everywhere() {
    let (adapter, output) = run(13, &GenerationOptions::new(13));
    let rain = RAINFALL.read(&output.artifacts).unwrap();

    assert!(rain.iter().all(|&r| r <= 200));
    for y in 0..HEIGHT as i32 {
        for x in 0..WIDTH as i32 {
            let engine_rain = adapter.get_rainfall(x, y);
            assert!((0..=200).contains(&engine_rain));
            assert_eq!(engine_rain, i32::from(rain[(y * WIDTH as i32 + x) as usize]));
        }
    }
}

#[test]
fn cryosphere_temperatures_stay_clamped() {
    let (_, output) = run(17, &GenerationOptions::new(17));
    let cryo = CRYOSPHERE.read(&output.artifacts).unwrap();

    assert!(cryo
        .surface_temperature_c
        .iter()
        .all(|&t| (-60.0..=50.0).contains(&t)));
}

#[test]
fn water_features_only_land_on_water() {
    let (adapter, _) = run(23, &GenerationOptions::new(23));
    let mut placed = 0;

    for y in 0..HEIGHT as i32 {
        for x in 0..WIDTH as i32 {
            let feature = adapter.get_feature_type(x, y);
            if feature == NO_FEATURE {
                continue;
            }
            placed += 1;
            assert_eq!(
                WATER_FEATURES.contains(&feature),
                adapter.is_water(x, y),
                "feature {feature} on the wrong surface at ({x}, {y})"
            );
        }
    }
    assert!(placed > 0, "no features placed at default density");
}

#[test]
fn cold_polar_water_freezes_into_pack_ice() {
    // A high fixed sea level floods the rift-lowered polar rows, and the
    // cold knob pushes 80 degree water well past the full-ice ramp.
    let mut options = GenerationOptions::new(29);
    options.knobs.temperature = Temperature::Cold;
    options.config = json!({
        "morphology": { "sea_level": { "strategy": "fixed", "config": { "level": 1000 } } }
    });
    let (adapter, _) = run(29, &options);

    let mut polar_water = 0;
    for x in 0..WIDTH as i32 {
        for y in [0, HEIGHT as i32 - 1] {
            if !adapter.is_water(x, y) {
                continue;
            }
            polar_water += 1;
            assert_eq!(
                adapter.get_feature_type(x, y),
                feature::ICE,
                "open polar water at ({x}, {y})"
            );
        }
    }
    assert!(polar_water > 0, "fixed sea level at 1000 left no polar water");
}

#[test]
fn river_and_lake_effects_reach_the_engine_once() {
    let (adapter, output) = run(31, &GenerationOptions::new(31));

    assert_eq!(adapter.model_rivers_calls, 1);
    assert_eq!(adapter.generate_lakes_calls, 1);
    assert!(adapter.recalculate_areas_calls >= 1);
    assert_eq!(output.report.step_ids().len(), 11);
}

#[test]
fn dry_knob_yields_less_rain_than_wet() {
    let mut dry = GenerationOptions::new(37);
    dry.knobs.dryness = Dryness::Dry;
    let mut wet = GenerationOptions::new(37);
    wet.knobs.dryness = Dryness::Wet;

    let (_, dry_output) = run(37, &dry);
    let (_, wet_output) = run(37, &wet);
    let total = |output: &GenerationOutput| -> u64 {
        RAINFALL
            .read(&output.artifacts)
            .unwrap()
            .iter()
            .map(|&r| u64::from(r))
            .sum()
    };

    assert!(
        total(&dry_output) < total(&wet_output),
        "dry world should be drier than wet world"
    );
}

#[test]
fn config_overrides_change_the_outcome() {
    let base = GenerationOptions::new(41);
    let mut flooded = GenerationOptions::new(41);
    flooded.config = json!({
        "morphology": { "sea_level": { "config": { "water_percent": 85.0 } } }
    });

    let (_, base_output) = run(41, &base);
    let (_, flooded_output) = run(41, &flooded);
    let land = |output: &GenerationOutput| -> usize {
        LAND_MASK
            .read(&output.artifacts)
            .unwrap()
            .iter()
            .filter(|&&m| m == 1)
            .count()
    };

    assert!(
        land(&flooded_output) < land(&base_output),
        "raising water percent should drown land"
    );
}
