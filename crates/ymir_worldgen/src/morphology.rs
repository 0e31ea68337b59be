//! # Topography & Coastlines
//!
//! `build-topography` synthesizes the elevation field from the tectonic
//! potentials plus seamless fractal noise. `shape-coastlines` floods the
//! map up to a sea level chosen by elevation quantile (or a fixed level),
//! derives the land mask, pushes terrain and elevation through the engine
//! boundary, and lets the engine run its own shoreline fixup.

use serde_json::Value;
use tracing::debug;
use ymir_core::context::MapContext;
use ymir_core::contract::{OpContract, StepContract};
use ymir_core::error::{ContractError, ExecuteError};
use ymir_core::grid::HexGrid;
use ymir_core::rng::WorldSeed;
use ymir_core::schema::{ObjectSchema, Schema, DEFAULT_STRATEGY};
use ymir_core::step::Step;
use ymir_core::tags::DependencyTag;

use crate::artifacts::{tag, BoundaryField, BOUNDARIES, ELEVATION, LAND_MASK};
use crate::cfg;
use crate::engine;
use crate::noise::CylinderNoise;

/// Tunables for elevation synthesis. Gains are meters at full potential.
#[derive(Clone, Copy, Debug)]
pub struct TopographyParams {
    /// Elevation floor every contribution builds on.
    pub base_level: f64,
    /// Meters added at full uplift potential.
    pub uplift_gain: f64,
    /// Meters removed at full rift potential.
    pub rift_gain: f64,
    /// Meters added at full shield stability.
    pub shield_gain: f64,
    /// Rolling-noise amplitude in meters.
    pub noise_amplitude: f64,
    /// Ridge-noise amplitude in meters, applied along uplift belts.
    pub ridge_amplitude: f64,
    /// Noise frequency per pixel.
    pub noise_scale: f64,
    /// Rolling-noise octave count.
    pub octaves: u32,
}

/// Synthesizes per-tile elevation in meters, clamped to `[-5000, 5000]`.
///
/// Shields damp the rolling noise so cratons read as flats; ridges only
/// appear where uplift potential carries them.
#[must_use]
pub fn build_elevation(
    grid: HexGrid,
    boundaries: &BoundaryField,
    seed: WorldSeed,
    params: &TopographyParams,
) -> Vec<i16> {
    let period = grid.pixel_width() * params.noise_scale;
    let base = CylinderNoise::new(seed, "morphology.base-noise", period);
    let ridge = CylinderNoise::new(seed, "morphology.ridge-noise", period * 2.0);
    (0..grid.len())
        .map(|index| {
            let (x, y) = grid.coords(index);
            let (px, py) = grid.pixel(x, y);
            let uplift = f64::from(boundaries.uplift_potential[index]) / 255.0;
            let rift = f64::from(boundaries.rift_potential[index]) / 255.0;
            let shield = f64::from(boundaries.shield_stability[index]) / 255.0;
            let sx = px * params.noise_scale;
            let sy = py * params.noise_scale;
            let rolling = base.fbm(sx, sy, params.octaves, 0.5, 2.0) * params.noise_amplitude;
            let ridges = ridge.ridged(sx * 2.0, sy * 2.0, 3, 0.5, 2.0)
                * params.ridge_amplitude
                * uplift;
            let elev = params.base_level + uplift * params.uplift_gain + ridges
                - rift * params.rift_gain
                + shield * params.shield_gain
                + rolling * (1.0 - 0.5 * shield);
            elev.round().clamp(-5000.0, 5000.0) as i16
        })
        .collect()
}

/// Step `build-topography`: tectonic potentials plus noise into meters.
pub struct BuildTopographyStep {
    contract: StepContract,
}

impl BuildTopographyStep {
    /// Defines the step.
    ///
    /// # Errors
    ///
    /// [`ContractError`] when the contract wiring is defective.
    pub fn define() -> Result<Self, ContractError> {
        let contract = StepContract::define(
            "build-topography",
            "morphology",
            vec![DependencyTag::artifact(tag::BOUNDARIES)],
            vec![DependencyTag::artifact(tag::ELEVATION)],
            ObjectSchema::new()
                .field("base_level", Schema::float_range(-320.0, -3000.0, 3000.0))
                .field("uplift_gain", Schema::float_range(2300.0, 0.0, 5000.0))
                .field("rift_gain", Schema::float_range(1050.0, 0.0, 5000.0))
                .field("shield_gain", Schema::float_range(320.0, 0.0, 5000.0))
                .field("noise_amplitude", Schema::float_range(350.0, 0.0, 2000.0))
                .field("ridge_amplitude", Schema::float_range(600.0, 0.0, 2000.0))
                .field("noise_scale", Schema::float_range(0.08, 0.005, 1.0))
                .field("octaves", Schema::int_range(4, 1, 8)),
            &[],
        )?;
        Ok(Self { contract })
    }
}

impl Step for BuildTopographyStep {
    fn contract(&self) -> &StepContract {
        &self.contract
    }

    fn run(&self, ctx: &mut MapContext<'_>, config: &Value) -> Result<(), ExecuteError> {
        let params = TopographyParams {
            base_level: cfg::float(config, "base_level"),
            uplift_gain: cfg::float(config, "uplift_gain"),
            rift_gain: cfg::float(config, "rift_gain"),
            shield_gain: cfg::float(config, "shield_gain"),
            noise_amplitude: cfg::float(config, "noise_amplitude"),
            ridge_amplitude: cfg::float(config, "ridge_amplitude"),
            noise_scale: cfg::float(config, "noise_scale"),
            octaves: u32::try_from(cfg::int(config, "octaves")).unwrap_or(4),
        };
        let grid = HexGrid::from_dims(ctx.dims());
        let boundaries = ctx.read(BOUNDARIES)?;
        let elevation = build_elevation(grid, boundaries, ctx.env.seed, &params);
        let lo = elevation.iter().copied().min().unwrap_or(0);
        let hi = elevation.iter().copied().max().unwrap_or(0);
        debug!(
            target: "ymir::morphology",
            min_m = i32::from(lo),
            max_m = i32::from(hi),
            "topography built"
        );
        if ctx.trace.is_enabled() {
            let mean = elevation.iter().map(|&e| i64::from(e)).sum::<i64>()
                / elevation.len().max(1) as i64;
            ctx.trace.event(
                "elevation summary",
                format!("min {lo} m, max {hi} m, mean {mean} m"),
            );
            ctx.trace.dump_signed("elevation", grid.width, &elevation);
        }
        ctx.publish(ELEVATION, elevation)?;
        Ok(())
    }
}

/// Picks the sea level whose flood lands closest to the target water
/// percent. Ties in a flat hypsometric curve can overshoot; the achieved
/// percent is logged, not enforced.
#[must_use]
pub fn quantile_sea_level(elevation: &[i16], water_percent: f64) -> i64 {
    if elevation.is_empty() {
        return 0;
    }
    let mut sorted = elevation.to_vec();
    sorted.sort_unstable();
    let len = sorted.len();
    let rank = (len as f64 * water_percent / 100.0).round() as usize;
    i64::from(sorted[rank.clamp(1, len) - 1])
}

/// Step `shape-coastlines`: sea level, land mask, engine terrain write.
pub struct ShapeCoastlinesStep {
    contract: StepContract,
}

impl ShapeCoastlinesStep {
    /// Defines the step and its `op.sea-level` contract.
    ///
    /// # Errors
    ///
    /// [`ContractError`] when the contract wiring is defective.
    pub fn define() -> Result<Self, ContractError> {
        let op = OpContract::define(
            "op.sea-level",
            [
                (
                    DEFAULT_STRATEGY,
                    ObjectSchema::new()
                        .field("water_percent", Schema::float_range(65.0, 10.0, 90.0)),
                ),
                (
                    "fixed",
                    ObjectSchema::new().field("level", Schema::int_range(0, -1000, 1000)),
                ),
            ],
        )?;
        let contract = StepContract::define(
            "shape-coastlines",
            "morphology",
            vec![DependencyTag::artifact(tag::ELEVATION)],
            vec![
                DependencyTag::artifact(tag::LAND_MASK),
                DependencyTag::field(tag::ENGINE_TERRAIN),
                DependencyTag::field(tag::ENGINE_ELEVATION),
                DependencyTag::effect(tag::TERRAIN_VALIDATED),
                DependencyTag::effect(tag::AREAS_RECALCULATED),
            ],
            ObjectSchema::new()
                .field("hill_elevation", Schema::int_range(450, 0, 5000))
                .field("mountain_elevation", Schema::int_range(1400, 0, 5000))
                .field("remove_isolated", Schema::flag(true)),
            &[("sea_level", &op)],
        )?;
        Ok(Self { contract })
    }
}

impl Step for ShapeCoastlinesStep {
    fn contract(&self) -> &StepContract {
        &self.contract
    }

    fn run(&self, ctx: &mut MapContext<'_>, config: &Value) -> Result<(), ExecuteError> {
        let hill_elevation = cfg::int(config, "hill_elevation");
        let mountain_elevation = cfg::int(config, "mountain_elevation");
        let remove_isolated = cfg::flag(config, "remove_isolated");

        let step_id = self.contract.id;
        let mountain = engine::terrain_id(ctx.adapter, step_id, "TERRAIN_MOUNTAIN")?;
        let hill = engine::terrain_id(ctx.adapter, step_id, "TERRAIN_HILL")?;
        let flat = engine::terrain_id(ctx.adapter, step_id, "TERRAIN_FLAT")?;
        let ocean = engine::terrain_id(ctx.adapter, step_id, "TERRAIN_OCEAN")?;

        let grid = HexGrid::from_dims(ctx.dims());
        let elevation = ELEVATION.read(&ctx.artifacts)?;
        let (strategy, op_config) = cfg::envelope(config, "sea_level");
        let sea_level = match strategy {
            "fixed" => cfg::int(op_config, "level"),
            _ => quantile_sea_level(elevation, cfg::float(op_config, "water_percent")),
        };
        let mut mask: Vec<u8> = elevation
            .iter()
            .map(|&e| u8::from(i64::from(e) > sea_level))
            .collect();
        if remove_isolated {
            // One-tile islands become water; judged against the pre-pass
            // mask so erosion cannot cascade.
            let frozen = mask.clone();
            for (index, slot) in mask.iter_mut().enumerate() {
                if *slot == 0 {
                    continue;
                }
                let (x, y) = grid.coords(index);
                let lonely = grid
                    .neighbors(x, y)
                    .all(|(nx, ny)| frozen[grid.index(nx, ny)] == 0);
                if lonely {
                    *slot = 0;
                }
            }
        }

        for index in 0..grid.len() {
            let (x, y) = grid.coords(index);
            let elev = i64::from(elevation[index]);
            let (terrain, engine_elev) = if mask[index] == 0 {
                (ocean, elev.min(sea_level))
            } else if elev >= mountain_elevation {
                (mountain, elev)
            } else if elev >= hill_elevation {
                (hill, elev)
            } else {
                (flat, elev)
            };
            ctx.adapter.set_terrain_type(x, y, terrain);
            ctx.adapter.set_elevation(x, y, engine_elev as i32);
        }
        ctx.adapter.validate_and_fix_terrain();
        ctx.adapter.recalculate_areas();

        let land = mask.iter().filter(|&&m| m == 1).count();
        let water_pct = 100.0 * (mask.len() - land) as f64 / mask.len() as f64;
        debug!(
            target: "ymir::morphology",
            strategy,
            sea_level,
            land,
            water_pct,
            "coastlines shaped"
        );
        if ctx.trace.is_enabled() {
            ctx.trace.event(
                "hypsometry",
                format!("sea level {sea_level} m floods {water_pct:.1}% of the map"),
            );
            ctx.trace.dump_bytes("land mask", grid.width, &mask, 1);
        }
        ctx.publish(LAND_MASK, mask)?;
        Ok(())
    }
}
