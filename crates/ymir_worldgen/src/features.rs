//! # Feature Placement
//!
//! Seeded per-tile chance draws over the classified map. Land and water
//! run as separate passes with separate feature tables; every placement
//! re-checks `can_have_feature`, so a land feature can never land on water
//! even if the engine and the mask disagree. Occupied tiles are skipped.
//!
//! Sea ice is the one unconditional placement: solid pack ice is a state,
//! not a decoration, so it ignores the density knob.

use serde_json::Value;
use tracing::debug;
use ymir_adapter::{EngineAdapter, FeaturePlacement, NO_FEATURE};
use ymir_core::context::MapContext;
use ymir_core::contract::StepContract;
use ymir_core::error::{ContractError, ExecuteError};
use ymir_core::grid::HexGrid;
use ymir_core::schema::{ObjectSchema, Schema};
use ymir_core::step::Step;
use ymir_core::tags::DependencyTag;

use crate::artifacts::{tag, BIOMES, BOUNDARIES, CRYOSPHERE, FLOW, LAND_MASK, RAINFALL};
use crate::biomes::BiomeIds;
use crate::cfg;
use crate::engine;

/// Sea-ice cover at which a water tile freezes solid.
const PACK_ICE_COVER: u8 = 128;
/// Latitude band for warm-water reefs and atolls.
const REEF_LATITUDE: f64 = 23.0;

struct FeatureIds {
    forest: i32,
    rainforest: i32,
    taiga: i32,
    marsh: i32,
    oasis: i32,
    savanna: i32,
    sagebrush: i32,
    reef: i32,
    cold_reef: i32,
    ice: i32,
    atoll: i32,
    volcano: i32,
}

fn roll(adapter: &mut dyn EngineAdapter, label: &str, chance_pct: u32) -> bool {
    chance_pct > 0 && adapter.get_random_number(100, label) < chance_pct
}

/// Step `place-features`: chance-based vegetation, wetlands, reefs, ice.
pub struct PlaceFeaturesStep {
    contract: StepContract,
}

impl PlaceFeaturesStep {
    /// Defines the step.
    ///
    /// # Errors
    ///
    /// [`ContractError`] when the contract wiring is defective.
    pub fn define() -> Result<Self, ContractError> {
        let contract = StepContract::define(
            "place-features",
            "features",
            vec![
                DependencyTag::artifact(tag::BIOMES),
                DependencyTag::artifact(tag::CRYOSPHERE),
                DependencyTag::artifact(tag::FLOW),
                DependencyTag::artifact(tag::RAINFALL),
                DependencyTag::artifact(tag::LAND_MASK),
                DependencyTag::artifact(tag::BOUNDARIES),
                DependencyTag::field(tag::ENGINE_BIOMES),
            ],
            vec![DependencyTag::effect(tag::FEATURES_PLACED)],
            ObjectSchema::new().field("density", Schema::float_range(1.0, 0.0, 2.0)),
            &[],
        )?;
        Ok(Self { contract })
    }
}

impl Step for PlaceFeaturesStep {
    fn contract(&self) -> &StepContract {
        &self.contract
    }

    fn run(&self, ctx: &mut MapContext<'_>, config: &Value) -> Result<(), ExecuteError> {
        let density = cfg::float(config, "density");
        let scale = |base: u32| ((f64::from(base) * density).round() as u32).min(100);

        let step_id = self.contract.id;
        let ids = FeatureIds {
            forest: engine::feature_id(ctx.adapter, step_id, "FEATURE_FOREST")?,
            rainforest: engine::feature_id(ctx.adapter, step_id, "FEATURE_RAINFOREST")?,
            taiga: engine::feature_id(ctx.adapter, step_id, "FEATURE_TAIGA")?,
            marsh: engine::feature_id(ctx.adapter, step_id, "FEATURE_MARSH")?,
            oasis: engine::feature_id(ctx.adapter, step_id, "FEATURE_OASIS")?,
            savanna: engine::feature_id(ctx.adapter, step_id, "FEATURE_SAVANNA_WOODLAND")?,
            sagebrush: engine::feature_id(ctx.adapter, step_id, "FEATURE_SAGEBRUSH_STEPPE")?,
            reef: engine::feature_id(ctx.adapter, step_id, "FEATURE_REEF")?,
            cold_reef: engine::feature_id(ctx.adapter, step_id, "FEATURE_COLD_REEF")?,
            ice: engine::feature_id(ctx.adapter, step_id, "FEATURE_ICE")?,
            atoll: engine::feature_id(ctx.adapter, step_id, "FEATURE_ATOLL")?,
            volcano: engine::feature_id(ctx.adapter, step_id, "FEATURE_VOLCANO")?,
        };
        let bid = BiomeIds {
            snow: engine::biome_id(ctx.adapter, step_id, "BIOME_SNOW")?,
            tundra: engine::biome_id(ctx.adapter, step_id, "BIOME_TUNDRA")?,
            desert: engine::biome_id(ctx.adapter, step_id, "BIOME_DESERT")?,
            tropical: engine::biome_id(ctx.adapter, step_id, "BIOME_TROPICAL")?,
            grassland: engine::biome_id(ctx.adapter, step_id, "BIOME_GRASSLAND")?,
            plains: engine::biome_id(ctx.adapter, step_id, "BIOME_PLAINS")?,
            marine: engine::biome_id(ctx.adapter, step_id, "BIOME_MARINE")?,
        };

        let grid = HexGrid::from_dims(ctx.dims());
        let latitudes = ctx.env.row_latitudes();
        let land = LAND_MASK.read(&ctx.artifacts)?;
        let rainfall = RAINFALL.read(&ctx.artifacts)?;
        let biomes = BIOMES.read(&ctx.artifacts)?;
        let cryo = CRYOSPHERE.read(&ctx.artifacts)?;
        let flow = FLOW.read(&ctx.artifacts)?;
        let boundaries = BOUNDARIES.read(&ctx.artifacts)?;

        let mut on_land = 0_u32;
        let mut on_water = 0_u32;
        for index in 0..grid.len() {
            let (x, y) = grid.coords(index);
            if ctx.adapter.get_feature_type(x, y) != NO_FEATURE {
                continue;
            }
            let biome = biomes[index];
            let rain = rainfall[index];
            let temp = f64::from(cryo.surface_temperature_c[index]);

            if land[index] == 1 {
                let uplift = boundaries.uplift_potential[index];
                let wet_corridor = flow.river_adjacency[index] == 1;
                let candidates: [(i32, &str, u32, bool); 8] = [
                    (ids.volcano, "features.volcano", 4, uplift >= 200),
                    (
                        ids.rainforest,
                        "features.rainforest",
                        55,
                        biome == bid.tropical && rain >= 140,
                    ),
                    (
                        ids.forest,
                        "features.forest",
                        if uplift >= 150 { 36 } else { 30 },
                        biome == bid.grassland && rain >= 90,
                    ),
                    (
                        ids.taiga,
                        "features.taiga",
                        if uplift >= 150 { 40 } else { 35 },
                        biome == bid.tundra && temp >= -12.0 && rain >= 55,
                    ),
                    (
                        ids.marsh,
                        "features.marsh",
                        12,
                        wet_corridor && rain >= 120 && biome != bid.desert && biome != bid.snow,
                    ),
                    (
                        ids.savanna,
                        "features.savanna",
                        18,
                        biome == bid.plains && rain >= 70,
                    ),
                    (
                        ids.sagebrush,
                        "features.sagebrush",
                        14,
                        biome == bid.desert && rain >= 30,
                    ),
                    (ids.oasis, "features.oasis", 3, biome == bid.desert),
                ];
                for (feature, label, base, eligible) in candidates {
                    if !eligible || !ctx.adapter.can_have_feature(x, y, feature) {
                        continue;
                    }
                    if roll(ctx.adapter, label, scale(base)) {
                        ctx.adapter.add_features(x, y, FeaturePlacement::of(feature));
                        on_land += 1;
                        break;
                    }
                }
            } else {
                if cryo.sea_ice_cover[index] >= PACK_ICE_COVER
                    && ctx.adapter.can_have_feature(x, y, ids.ice)
                {
                    ctx.adapter.add_features(x, y, FeaturePlacement::of(ids.ice));
                    on_water += 1;
                    continue;
                }
                let tropical_water = latitudes[y as usize].abs() <= REEF_LATITUDE && temp >= 20.0;
                let candidates: [(i32, &str, u32, bool); 3] = [
                    (ids.reef, "features.reef", 18, tropical_water),
                    (ids.atoll, "features.atoll", 5, tropical_water),
                    (
                        ids.cold_reef,
                        "features.cold-reef",
                        8,
                        (2.0..14.0).contains(&temp),
                    ),
                ];
                for (feature, label, base, eligible) in candidates {
                    if !eligible || !ctx.adapter.can_have_feature(x, y, feature) {
                        continue;
                    }
                    if roll(ctx.adapter, label, scale(base)) {
                        ctx.adapter.add_features(x, y, FeaturePlacement::of(feature));
                        on_water += 1;
                        break;
                    }
                }
            }
        }
        debug!(target: "ymir::features", density, on_land, on_water, "features placed");
        if ctx.trace.is_enabled() {
            ctx.trace.event(
                "feature coverage",
                format!("{on_land} land placements, {on_water} water placements"),
            );
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use ymir_adapter::{
        mock::{biome, feature, terrain, WATER_FEATURES},
        LatitudeBounds, MockAdapter, MockAdapterConfig,
    };
    use ymir_core::rng::WorldSeed;
    use ymir_core::trace::TraceSink;

    use super::*;
    use crate::artifacts::{BoundaryField, Cryosphere, FlowField, FLOW_OUTLET};

    const W: u32 = 6;
    const H: u32 = 4;
    const LEN: usize = 24;

    /// West half tropical land, east half warm water, every gate wide open.
    fn seeded_adapter() -> (MockAdapter, Vec<u8>) {
        let mut adapter = MockAdapter::new(MockAdapterConfig::ocean(W, H, 9));
        let grid = HexGrid::new(W, H);
        let mut land = vec![0_u8; LEN];
        for (index, slot) in land.iter_mut().enumerate() {
            let (x, _) = grid.coords(index);
            if x < 3 {
                *slot = 1;
            }
        }
        for index in 0..LEN {
            let (x, y) = grid.coords(index);
            if land[index] == 1 {
                adapter.set_terrain_type(x, y, terrain::FLAT);
            }
        }
        (adapter, land)
    }

    fn publish_world(ctx: &mut MapContext<'_>, land: &[u8], sea_ice: u8, temp: f32) {
        ctx.publish(LAND_MASK, land.to_vec()).unwrap();
        ctx.publish(RAINFALL, vec![160_u8; LEN]).unwrap();
        let biomes: Vec<i32> = land
            .iter()
            .map(|&m| if m == 1 { biome::TROPICAL } else { biome::MARINE })
            .collect();
        ctx.publish(BIOMES, biomes).unwrap();
        ctx.publish(
            CRYOSPHERE,
            Cryosphere {
                snow_cover: vec![0; LEN],
                sea_ice_cover: vec![sea_ice; LEN],
                albedo: vec![76; LEN],
                surface_temperature_c: vec![temp; LEN],
            },
        )
        .unwrap();
        ctx.publish(
            FLOW,
            FlowField {
                flow_dir: vec![FLOW_OUTLET; LEN],
                discharge: vec![0.0; LEN],
                river_class: vec![0; LEN],
                river_adjacency: vec![0; LEN],
                basin_mask: vec![0; LEN],
            },
        )
        .unwrap();
        ctx.publish(
            BOUNDARIES,
            BoundaryField {
                boundary_type: vec![0; LEN],
                uplift_potential: vec![0; LEN],
                rift_potential: vec![0; LEN],
                shield_stability: vec![255; LEN],
            },
        )
        .unwrap();
    }

    fn dense_config(step: &PlaceFeaturesStep, density: f64) -> Value {
        let mut config = step.contract().schema.default_value();
        config["density"] = json!(density);
        config
    }

    #[test]
    fn land_and_water_features_never_cross() {
        let (mut adapter, land) = seeded_adapter();
        let mut ctx = MapContext::new(
            &mut adapter,
            LatitudeBounds::symmetric(60.0),
            WorldSeed::new(9),
            TraceSink::disabled(),
        );
        publish_world(&mut ctx, &land, 0, 25.0);
        let step = PlaceFeaturesStep::define().unwrap();
        step.run(&mut ctx, &dense_config(&step, 2.0)).unwrap();

        let grid = HexGrid::new(W, H);
        for index in 0..LEN {
            let (x, y) = grid.coords(index);
            let placed = adapter.get_feature_type(x, y);
            if placed == NO_FEATURE {
                continue;
            }
            assert_eq!(
                WATER_FEATURES.contains(&placed),
                adapter.is_water(x, y),
                "feature {placed} on the wrong surface at ({x}, {y})"
            );
        }
        // Density 2.0 makes the rainforest roll a certainty on every
        // tropical land tile.
        for index in 0..LEN {
            let (x, y) = grid.coords(index);
            if land[index] == 1 {
                assert_eq!(adapter.get_feature_type(x, y), feature::RAINFOREST);
            }
        }
    }

    #[test]
    fn pack_ice_ignores_the_density_knob() {
        let (mut adapter, land) = seeded_adapter();
        let mut ctx = MapContext::new(
            &mut adapter,
            LatitudeBounds::symmetric(60.0),
            WorldSeed::new(9),
            TraceSink::disabled(),
        );
        publish_world(&mut ctx, &land, 255, -15.0);
        let step = PlaceFeaturesStep::define().unwrap();
        step.run(&mut ctx, &dense_config(&step, 0.0)).unwrap();

        let grid = HexGrid::new(W, H);
        for index in 0..LEN {
            let (x, y) = grid.coords(index);
            let expected = if land[index] == 1 { NO_FEATURE } else { feature::ICE };
            assert_eq!(adapter.get_feature_type(x, y), expected);
        }
    }

    #[test]
    fn occupied_tiles_are_left_alone() {
        let (mut adapter, land) = seeded_adapter();
        adapter.add_features(0, 0, FeaturePlacement::of(feature::FOREST));
        let mut ctx = MapContext::new(
            &mut adapter,
            LatitudeBounds::symmetric(60.0),
            WorldSeed::new(9),
            TraceSink::disabled(),
        );
        publish_world(&mut ctx, &land, 0, 25.0);
        let step = PlaceFeaturesStep::define().unwrap();
        step.run(&mut ctx, &dense_config(&step, 2.0)).unwrap();
        assert_eq!(adapter.get_feature_type(0, 0), feature::FOREST);
    }
}
