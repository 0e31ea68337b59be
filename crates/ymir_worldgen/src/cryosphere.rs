//! # Snow, Sea Ice & Albedo Feedback
//!
//! A bounded feedback loop over the climate indices: cover fractions come
//! from temperature ramps, cover raises albedo, albedo cools the surface,
//! and the loop reruns a fixed number of iterations. Cooling is recomputed
//! from the pre-feedback temperature every pass, so it can never exceed
//! one full `feedback_c` regardless of iteration count.

use serde_json::Value;
use tracing::debug;
use ymir_core::context::MapContext;
use ymir_core::contract::StepContract;
use ymir_core::error::{ContractError, ExecuteError};
use ymir_core::grid::HexGrid;
use ymir_core::schema::{ObjectSchema, Schema};
use ymir_core::step::Step;
use ymir_core::tags::DependencyTag;

use crate::artifacts::{tag, Cryosphere, CLIMATE_INDICES, CRYOSPHERE, LAND_MASK, RAINFALL};
use crate::cfg;

/// Albedo of bare ground and open water, on the byte scale.
const ALBEDO_BASE: f64 = 76.0;
/// Albedo added by full snow cover.
const ALBEDO_SNOW: f64 = 100.0;
/// Albedo added by full sea ice.
const ALBEDO_ICE: f64 = 90.0;
/// Rainfall at which snow cover stops being moisture-limited.
const SNOW_MOISTURE_CAP: f64 = 60.0;

/// Tunables for the feedback loop.
#[derive(Clone, Copy, Debug)]
pub struct CryoParams {
    /// Feedback iterations; fixed, never data-dependent.
    pub iterations: u32,
    /// Temperature where land snow begins.
    pub snow_start_c: f64,
    /// Temperature of full land snow cover.
    pub snow_full_c: f64,
    /// Temperature where sea ice begins.
    pub ice_start_c: f64,
    /// Temperature of full sea ice cover.
    pub ice_full_c: f64,
    /// Cooling at full cover, per the whole loop.
    pub feedback_c: f64,
    /// Lower clamp on the final temperature.
    pub min_c: f64,
    /// Upper clamp on the final temperature.
    pub max_c: f64,
}

/// Linear 0 to 1 ramp from `start` down to `full`.
fn ramp(t: f64, start: f64, full: f64) -> f64 {
    if start - full < f64::EPSILON {
        if t < start {
            1.0
        } else {
            0.0
        }
    } else {
        ((start - t) / (start - full)).clamp(0.0, 1.0)
    }
}

fn cover_at(t: f64, land: u8, rain: u8, params: &CryoParams) -> f64 {
    if land == 1 {
        // Snow needs moisture to accumulate; deserts stay thin even when cold.
        let moisture = (f64::from(rain) / SNOW_MOISTURE_CAP).min(1.0);
        ramp(t, params.snow_start_c, params.snow_full_c) * (0.4 + 0.6 * moisture)
    } else {
        ramp(t, params.ice_start_c, params.ice_full_c)
    }
}

/// Runs the feedback loop and returns the settled cryosphere state.
///
/// `temps` is the pre-feedback surface temperature; the returned state
/// carries the cooled and clamped field alongside the cover bytes.
#[must_use]
pub fn run_feedback(
    land: &[u8],
    rainfall: &[u8],
    temps: &[f32],
    params: &CryoParams,
) -> Cryosphere {
    let len = land.len();
    let base: Vec<f64> = temps.iter().map(|&t| f64::from(t)).collect();
    let mut cooled = base.clone();
    let mut cover = vec![0.0_f64; len];
    for _ in 0..params.iterations {
        for index in 0..len {
            cover[index] = cover_at(cooled[index], land[index], rainfall[index], params);
        }
        for index in 0..len {
            cooled[index] = base[index] - params.feedback_c * cover[index];
        }
    }
    let mut out = Cryosphere {
        snow_cover: vec![0; len],
        sea_ice_cover: vec![0; len],
        albedo: vec![0; len],
        surface_temperature_c: Vec::with_capacity(len),
    };
    for index in 0..len {
        let fraction = cover[index];
        let boost = if land[index] == 1 {
            out.snow_cover[index] = (fraction * 255.0).round() as u8;
            ALBEDO_SNOW
        } else {
            out.sea_ice_cover[index] = (fraction * 255.0).round() as u8;
            ALBEDO_ICE
        };
        out.albedo[index] = (ALBEDO_BASE + boost * fraction).min(255.0).round() as u8;
        let final_t = cooled[index].clamp(params.min_c, params.max_c);
        out.surface_temperature_c.push(final_t as f32);
    }
    out
}

/// Step `cryosphere`: snow, sea ice, albedo, and the cooled temperature.
pub struct CryosphereStep {
    contract: StepContract,
}

impl CryosphereStep {
    /// Defines the step.
    ///
    /// # Errors
    ///
    /// [`ContractError`] when the contract wiring is defective.
    pub fn define() -> Result<Self, ContractError> {
        let contract = StepContract::define(
            "cryosphere",
            "climate",
            vec![
                DependencyTag::artifact(tag::RAINFALL),
                DependencyTag::artifact(tag::CLIMATE_INDICES),
                DependencyTag::artifact(tag::LAND_MASK),
            ],
            vec![DependencyTag::artifact(tag::CRYOSPHERE)],
            ObjectSchema::new()
                .field("iterations", Schema::int_range(3, 1, 8))
                .field("snow_start_c", Schema::float_range(2.0, -10.0, 10.0))
                .field("snow_full_c", Schema::float_range(-8.0, -30.0, 0.0))
                .field("ice_start_c", Schema::float_range(-1.8, -10.0, 5.0))
                .field("ice_full_c", Schema::float_range(-12.0, -40.0, -2.0))
                .field("feedback_c", Schema::float_range(4.0, 0.0, 10.0))
                .field("min_c", Schema::float_range(-60.0, -90.0, 0.0))
                .field("max_c", Schema::float_range(50.0, 0.0, 90.0)),
            &[],
        )?;
        Ok(Self { contract })
    }
}

impl Step for CryosphereStep {
    fn contract(&self) -> &StepContract {
        &self.contract
    }

    fn run(&self, ctx: &mut MapContext<'_>, config: &Value) -> Result<(), ExecuteError> {
        let params = CryoParams {
            iterations: u32::try_from(cfg::int(config, "iterations")).unwrap_or(3),
            snow_start_c: cfg::float(config, "snow_start_c"),
            snow_full_c: cfg::float(config, "snow_full_c"),
            ice_start_c: cfg::float(config, "ice_start_c"),
            ice_full_c: cfg::float(config, "ice_full_c"),
            feedback_c: cfg::float(config, "feedback_c"),
            min_c: cfg::float(config, "min_c"),
            max_c: cfg::float(config, "max_c"),
        };
        let grid = HexGrid::from_dims(ctx.dims());
        let land = LAND_MASK.read(&ctx.artifacts)?;
        let rainfall = RAINFALL.read(&ctx.artifacts)?;
        let indices = CLIMATE_INDICES.read(&ctx.artifacts)?;
        let cryo = run_feedback(land, rainfall, &indices.surface_temperature_c, &params);

        let snowy = cryo.snow_cover.iter().filter(|&&c| c >= 128).count();
        let icy = cryo.sea_ice_cover.iter().filter(|&&c| c >= 128).count();
        debug!(
            target: "ymir::climate",
            iterations = params.iterations,
            snowy,
            icy,
            "cryosphere settled"
        );
        if ctx.trace.is_enabled() {
            ctx.trace.dump_bytes("snow cover", grid.width, &cryo.snow_cover, 255);
            ctx.trace.dump_bytes("sea ice", grid.width, &cryo.sea_ice_cover, 255);
        }
        ctx.publish(CRYOSPHERE, cryo)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use ymir_adapter::{LatitudeBounds, MockAdapter, MockAdapterConfig};
    use ymir_core::rng::WorldSeed;
    use ymir_core::trace::TraceSink;

    use super::*;
    use crate::artifacts::ClimateIndices;

    fn default_params() -> CryoParams {
        CryoParams {
            iterations: 3,
            snow_start_c: 2.0,
            snow_full_c: -8.0,
            ice_start_c: -1.8,
            ice_full_c: -12.0,
            feedback_c: 4.0,
            min_c: -60.0,
            max_c: 50.0,
        }
    }

    #[test]
    fn snow_follows_the_temperature_ramp() {
        let params = default_params();
        let land = [1_u8, 1, 1];
        let rain = [100_u8, 100, 100];
        let temps = [10.0_f32, -3.0, -20.0];
        let cryo = run_feedback(&land, &rain, &temps, &params);
        assert_eq!(cryo.snow_cover[0], 0);
        assert!(cryo.snow_cover[1] > 100 && cryo.snow_cover[1] < 255);
        assert_eq!(cryo.snow_cover[2], 255);
        assert!(cryo.sea_ice_cover.iter().all(|&c| c == 0));
    }

    #[test]
    fn dry_cold_land_holds_less_snow() {
        let params = default_params();
        let land = [1_u8, 1];
        let rain = [0_u8, 120];
        let temps = [-20.0_f32, -20.0];
        let cryo = run_feedback(&land, &rain, &temps, &params);
        assert_eq!(cryo.snow_cover[0], 102, "moisture floor is 0.4 of full");
        assert_eq!(cryo.snow_cover[1], 255);
    }

    #[test]
    fn sea_ice_uses_its_own_ramp() {
        let params = default_params();
        let land = [0_u8, 0, 0];
        let rain = [0_u8, 0, 0];
        let temps = [0.0_f32, -2.0, -15.0];
        let cryo = run_feedback(&land, &rain, &temps, &params);
        assert_eq!(cryo.sea_ice_cover[0], 0, "above the freezing point of brine");
        assert!(cryo.sea_ice_cover[1] > 0 && cryo.sea_ice_cover[1] < 64);
        assert_eq!(cryo.sea_ice_cover[2], 255);
        assert!(cryo.snow_cover.iter().all(|&c| c == 0));
    }

    #[test]
    fn feedback_cooling_is_bounded_by_one_feedback_step() {
        let params = default_params();
        let land = [1_u8];
        let rain = [120_u8];
        let temps = [-20.0_f32];
        let cryo = run_feedback(&land, &rain, &temps, &params);
        let cooled = cryo.surface_temperature_c[0];
        assert!((cooled - (-24.0)).abs() < 0.001, "full cover cools exactly feedback_c");
    }

    #[test]
    fn final_temperature_clamps_to_the_configured_range() {
        let params = default_params();
        let cold = run_feedback(&[0_u8], &[0_u8], &[-90.0_f32], &params);
        assert_eq!(cold.surface_temperature_c[0], -60.0);
        let hot = run_feedback(&[1_u8], &[0_u8], &[70.0_f32], &params);
        assert_eq!(hot.surface_temperature_c[0], 50.0);
    }

    #[test]
    fn albedo_rises_with_cover() {
        let params = default_params();
        let land = [1_u8, 1];
        let rain = [120_u8, 120];
        let temps = [20.0_f32, -20.0];
        let cryo = run_feedback(&land, &rain, &temps, &params);
        assert_eq!(cryo.albedo[0], 76);
        assert_eq!(cryo.albedo[1], 176);
    }

    #[test]
    fn step_publishes_the_settled_state() {
        let mut adapter = MockAdapter::new(MockAdapterConfig::ocean(6, 4, 1));
        let mut ctx = MapContext::new(
            &mut adapter,
            LatitudeBounds::symmetric(85.0),
            WorldSeed::new(1),
            TraceSink::disabled(),
        );
        let len = 24;
        let mut land = vec![0_u8; len];
        land[0] = 1;
        ctx.publish(LAND_MASK, land).unwrap();
        ctx.publish(RAINFALL, vec![80_u8; len]).unwrap();
        let temps = vec![-10.0_f32; len];
        ctx.publish(
            CLIMATE_INDICES,
            ClimateIndices {
                surface_temperature_c: temps,
                pet: vec![0.0; len],
                aridity_index: vec![1.0; len],
                freeze_index: vec![1.0; len],
            },
        )
        .unwrap();

        let step = CryosphereStep::define().unwrap();
        let config = step.contract().schema.default_value();
        step.run(&mut ctx, &config).unwrap();

        let cryo = ctx.read(CRYOSPHERE).unwrap();
        assert!(cryo.snow_cover[0] > 0);
        assert!(cryo.sea_ice_cover[1] > 128);
        assert!(cryo
            .surface_temperature_c
            .iter()
            .all(|&t| (-60.0..=50.0).contains(&t)));
    }
}
