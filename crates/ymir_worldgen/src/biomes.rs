//! # Biome Classification
//!
//! Holdridge-flavored scoring of temperature, aridity, and moisture into
//! the engine's closed biome set. The rules fire in a fixed order: snow,
//! tundra, desert, tropical, then the grassland/plains moisture fallback.
//! Temperature comes from the cryosphere so feedback cooling shifts the
//! cold-edge biomes the same way it shifts the ice.

use serde_json::Value;
use tracing::debug;
use ymir_core::context::MapContext;
use ymir_core::contract::StepContract;
use ymir_core::error::{ContractError, ExecuteError};
use ymir_core::grid::HexGrid;
use ymir_core::schema::{ObjectSchema, Schema};
use ymir_core::step::Step;
use ymir_core::tags::DependencyTag;

use crate::artifacts::{tag, BIOMES, CLIMATE_INDICES, CRYOSPHERE, LAND_MASK, RAINFALL};
use crate::cfg;
use crate::engine;

/// Warm-enough floor for the very-wet tropical path.
const WET_TROPICAL_TEMP_C: f64 = 14.0;

/// Engine biome ids resolved once per run.
#[derive(Clone, Copy, Debug)]
pub struct BiomeIds {
    /// Permanent snow.
    pub snow: i32,
    /// Tundra.
    pub tundra: i32,
    /// Desert.
    pub desert: i32,
    /// Tropical.
    pub tropical: i32,
    /// Grassland.
    pub grassland: i32,
    /// Plains.
    pub plains: i32,
    /// Open water.
    pub marine: i32,
}

/// Classification thresholds.
#[derive(Clone, Copy, Debug)]
pub struct BiomeRules {
    /// Freeze index at or above which a tile reads as snow.
    pub snow_freeze: f64,
    /// Temperature at or below which a tile reads as snow.
    pub snow_temp_c: f64,
    /// Temperature at or below which a tile reads as tundra.
    pub tundra_temp_c: f64,
    /// Aridity index at or above which a tile reads as desert.
    pub desert_aridity: f64,
    /// Temperature floor for the tropical belt.
    pub tropical_temp_c: f64,
    /// Rainfall floor for desert (below it, always desert).
    pub desert_rain: u8,
    /// Rainfall floor for grassland.
    pub grassland_rain: u8,
    /// Rainfall floor for tropical.
    pub tropical_rain: u8,
    /// Rainfall at which warm subtropics read tropical anyway.
    pub wet_tropical_rain: u8,
}

/// Read-only fields the classifier samples.
pub struct BiomeInputs<'a> {
    /// Land mask, 1 for land.
    pub land: &'a [u8],
    /// Refined rainfall.
    pub rainfall: &'a [u8],
    /// Cryosphere-cooled surface temperature.
    pub temperature_c: &'a [f32],
    /// Aridity index.
    pub aridity: &'a [f32],
    /// Freeze index.
    pub freeze: &'a [f32],
}

/// Scores every tile into a biome id. Rule order is load-bearing.
#[must_use]
pub fn classify(inputs: &BiomeInputs<'_>, rules: &BiomeRules, ids: &BiomeIds) -> Vec<i32> {
    (0..inputs.land.len())
        .map(|index| {
            if inputs.land[index] == 0 {
                return ids.marine;
            }
            let temp = f64::from(inputs.temperature_c[index]);
            let rain = inputs.rainfall[index];
            if f64::from(inputs.freeze[index]) >= rules.snow_freeze || temp <= rules.snow_temp_c
            {
                return ids.snow;
            }
            if temp <= rules.tundra_temp_c {
                return ids.tundra;
            }
            if f64::from(inputs.aridity[index]) >= rules.desert_aridity
                || rain < rules.desert_rain
            {
                return ids.desert;
            }
            if temp >= rules.tropical_temp_c && rain >= rules.tropical_rain {
                return ids.tropical;
            }
            if temp >= WET_TROPICAL_TEMP_C && rain >= rules.wet_tropical_rain {
                return ids.tropical;
            }
            if rain >= rules.grassland_rain {
                ids.grassland
            } else {
                ids.plains
            }
        })
        .collect()
}

/// Step `classify-biomes`: indices in, engine biome ids out.
pub struct ClassifyBiomesStep {
    contract: StepContract,
}

impl ClassifyBiomesStep {
    /// Defines the step.
    ///
    /// # Errors
    ///
    /// [`ContractError`] when the contract wiring is defective.
    pub fn define() -> Result<Self, ContractError> {
        let contract = StepContract::define(
            "classify-biomes",
            "biomes",
            vec![
                DependencyTag::artifact(tag::CRYOSPHERE),
                DependencyTag::artifact(tag::CLIMATE_INDICES),
                DependencyTag::artifact(tag::RAINFALL),
                DependencyTag::artifact(tag::LAND_MASK),
            ],
            vec![
                DependencyTag::artifact(tag::BIOMES),
                DependencyTag::field(tag::ENGINE_BIOMES),
            ],
            ObjectSchema::new()
                .field("moisture_bands", Schema::int_list(&[45, 90, 140, 190]))
                .field("snow_freeze", Schema::float_range(0.65, 0.0, 1.0))
                .field("snow_temp_c", Schema::float_range(-8.0, -30.0, 0.0))
                .field("tundra_temp_c", Schema::float_range(0.5, -10.0, 10.0))
                .field("desert_aridity", Schema::float_range(2.4, 1.0, 10.0))
                .field("tropical_temp_c", Schema::float_range(22.0, 10.0, 30.0)),
            &[],
        )?;
        Ok(Self { contract })
    }
}

fn rules_from(config: &Value) -> BiomeRules {
    let bands = cfg::int_list(config, "moisture_bands");
    let band = |i: usize, fallback: u8| {
        bands
            .get(i)
            .copied()
            .and_then(|v| u8::try_from(v).ok())
            .unwrap_or(fallback)
    };
    BiomeRules {
        snow_freeze: cfg::float(config, "snow_freeze"),
        snow_temp_c: cfg::float(config, "snow_temp_c"),
        tundra_temp_c: cfg::float(config, "tundra_temp_c"),
        desert_aridity: cfg::float(config, "desert_aridity"),
        tropical_temp_c: cfg::float(config, "tropical_temp_c"),
        desert_rain: band(0, 45),
        grassland_rain: band(1, 90),
        tropical_rain: band(2, 140),
        wet_tropical_rain: band(3, 190),
    }
}

impl Step for ClassifyBiomesStep {
    fn contract(&self) -> &StepContract {
        &self.contract
    }

    fn run(&self, ctx: &mut MapContext<'_>, config: &Value) -> Result<(), ExecuteError> {
        let rules = rules_from(config);
        let step_id = self.contract.id;
        let ids = BiomeIds {
            snow: engine::biome_id(ctx.adapter, step_id, "BIOME_SNOW")?,
            tundra: engine::biome_id(ctx.adapter, step_id, "BIOME_TUNDRA")?,
            desert: engine::biome_id(ctx.adapter, step_id, "BIOME_DESERT")?,
            tropical: engine::biome_id(ctx.adapter, step_id, "BIOME_TROPICAL")?,
            grassland: engine::biome_id(ctx.adapter, step_id, "BIOME_GRASSLAND")?,
            plains: engine::biome_id(ctx.adapter, step_id, "BIOME_PLAINS")?,
            marine: engine::biome_id(ctx.adapter, step_id, "BIOME_MARINE")?,
        };
        let grid = HexGrid::from_dims(ctx.dims());
        let land = LAND_MASK.read(&ctx.artifacts)?;
        let rainfall = RAINFALL.read(&ctx.artifacts)?;
        let indices = CLIMATE_INDICES.read(&ctx.artifacts)?;
        let cryo = CRYOSPHERE.read(&ctx.artifacts)?;
        let inputs = BiomeInputs {
            land,
            rainfall,
            temperature_c: &cryo.surface_temperature_c,
            aridity: &indices.aridity_index,
            freeze: &indices.freeze_index,
        };
        let biomes = classify(&inputs, &rules, &ids);
        for index in 0..grid.len() {
            let (x, y) = grid.coords(index);
            ctx.adapter.set_biome_type(x, y, biomes[index]);
        }

        let on_land = |id: i32| {
            biomes
                .iter()
                .zip(land.iter())
                .filter(|&(&b, &m)| m == 1 && b == id)
                .count()
        };
        debug!(
            target: "ymir::biomes",
            snow = on_land(ids.snow),
            tundra = on_land(ids.tundra),
            desert = on_land(ids.desert),
            tropical = on_land(ids.tropical),
            grassland = on_land(ids.grassland),
            plains = on_land(ids.plains),
            "biomes classified"
        );
        if ctx.trace.is_enabled() {
            let ramp: Vec<u8> = biomes
                .iter()
                .map(|&b| u8::try_from(b).unwrap_or(u8::MAX))
                .collect();
            ctx.trace.dump_bytes("biomes", grid.width, &ramp, 6);
        }
        ctx.publish(BIOMES, biomes)?;
        Ok(())
    }
}
