//! # Rainfall, Winds & Currents
//!
//! `climate-baseline` blends latitude-band rainfall with the engine's own
//! hints and lays down zonal winds and surface currents. `climate-refine`
//! then runs a fixed sequence of local passes over the baseline (coastal
//! humidity, rain shadows, river corridors, basins, rifts, hotspots) and
//! derives the continuous climate indices every later stage reads.

use rand::Rng;
use rand_chacha::ChaCha8Rng;
use serde_json::Value;
use tracing::debug;
use ymir_core::context::{MapContext, MapEnv};
use ymir_core::contract::StepContract;
use ymir_core::error::{ContractError, ExecuteError};
use ymir_core::grid::HexGrid;
use ymir_core::schema::{ObjectSchema, Schema};
use ymir_core::step::Step;
use ymir_core::tags::DependencyTag;

use crate::artifacts::{
    tag, BoundaryField, ClimateIndices, FlowField, BOUNDARIES, CLIMATE_INDICES, CURRENTS,
    ELEVATION, FLOW, LAND_MASK, RAINFALL, RAINFALL_BASELINE, WINDS,
};
use crate::cfg;

/// Annual rainfall by absolute latitude, as `(upper_bound, rainfall)` rows.
/// Tiles at or past the last bound fall through to [`RAIN_POLAR`].
const RAIN_BANDS: [(f64, f64); 5] = [
    (10.0, 120.0),
    (20.0, 104.0),
    (35.0, 75.0),
    (55.0, 70.0),
    (70.0, 60.0),
];

/// Rainfall poleward of the last band.
const RAIN_POLAR: f64 = 45.0;

/// Elevation where orographic lift starts adding rain.
const OROGRAPHIC_FIRST_M: i16 = 800;
/// Second lift threshold; stacks on the first.
const OROGRAPHIC_SECOND_M: i16 = 1500;

fn band_rainfall(abs_lat: f64) -> f64 {
    for &(bound, rain) in &RAIN_BANDS {
        if abs_lat < bound {
            return rain;
        }
    }
    RAIN_POLAR
}

/// Background zonal wind by latitude band. Positive blows east; trades and
/// polar easterlies come out negative.
fn background_wind(abs_lat: f64) -> f64 {
    if abs_lat < 30.0 {
        -80.0
    } else if abs_lat < 60.0 {
        80.0
    } else {
        -40.0
    }
}

/// Draws jet-stream center latitudes, northern hemisphere first.
///
/// With one jet per hemisphere it sits near 45 degrees; more jets spread
/// between 30 and 60 before jitter. Centers clamp to `[15, 75]`.
fn jet_centers(count: u32, rng: &mut ChaCha8Rng) -> Vec<f64> {
    let mut centers = Vec::with_capacity(count as usize * 2);
    for hemisphere in [1.0_f64, -1.0] {
        for slot in 0..count {
            let base = if count == 1 {
                45.0
            } else {
                30.0 + f64::from(slot) * 30.0 / f64::from(count - 1)
            };
            let jitter = rng.gen_range(-6.0..=6.0);
            centers.push(hemisphere * (base + jitter).clamp(15.0, 75.0));
        }
    }
    centers
}

/// Per-tile zonal wind: banded background plus a boost near each jet center.
#[must_use]
pub fn zonal_winds(grid: HexGrid, latitudes: &[f64], jets: &[f64], jet_strength: f64) -> Vec<i16> {
    (0..grid.len())
        .map(|index| {
            let (_, y) = grid.coords(index);
            let lat = latitudes[y as usize];
            let mut wind = background_wind(lat.abs());
            for &jet in jets {
                let dist = (lat - jet).abs();
                if dist < 12.0 {
                    wind += 32.0 * jet_strength * (1.0 - dist / 12.0);
                }
            }
            wind.round() as i16
        })
        .collect()
}

/// Per-tile zonal surface current. Land tiles carry zero.
#[must_use]
pub fn zonal_currents(grid: HexGrid, latitudes: &[f64], land: &[u8]) -> Vec<i16> {
    (0..grid.len())
        .map(|index| {
            if land[index] == 1 {
                return 0;
            }
            let (_, y) = grid.coords(index);
            let abs_lat = latitudes[y as usize].abs();
            if abs_lat < 12.0 {
                -50
            } else if abs_lat >= 60.0 {
                -15
            } else if abs_lat >= 45.0 {
                20
            } else {
                0
            }
        })
        .collect()
}

/// Read-only fields the baseline samples.
pub struct BaselineInputs<'a> {
    /// Land mask, 1 for land.
    pub land: &'a [u8],
    /// Elevation in meters.
    pub elevation: &'a [i16],
    /// River adjacency from flow routing.
    pub river_adjacency: &'a [u8],
    /// The engine's own rainfall hint per tile.
    pub engine_rainfall: &'a [i32],
}

/// Tunables for the rainfall baseline.
#[derive(Clone, Copy, Debug)]
pub struct BaselineParams {
    /// Weight of the latitude band against the engine hint, 0 to 1.
    pub band_blend: f64,
    /// Multiplier on the band contribution.
    pub band_scale: f64,
    /// Rain added to land touching water.
    pub coastal_bonus: f64,
    /// Rain added to river-adjacent land that is not coastal.
    pub river_bonus: f64,
    /// Half-width of the per-tile jitter.
    pub noise_amplitude: i64,
}

/// Blends banded rainfall with the engine hint and applies terrain bonuses.
///
/// One jitter value is drawn per tile, water included, so the stream stays
/// aligned regardless of the mask.
#[must_use]
pub fn rainfall_baseline(
    grid: HexGrid,
    latitudes: &[f64],
    inputs: &BaselineInputs<'_>,
    params: &BaselineParams,
    rng: &mut ChaCha8Rng,
) -> Vec<u8> {
    (0..grid.len())
        .map(|index| {
            let (x, y) = grid.coords(index);
            let band = band_rainfall(latitudes[y as usize].abs()) * params.band_scale;
            let hint = f64::from(inputs.engine_rainfall[index]);
            let mut rain = params.band_blend * band + (1.0 - params.band_blend) * hint;
            if inputs.land[index] == 1 {
                let elev = inputs.elevation[index];
                if elev >= OROGRAPHIC_FIRST_M {
                    rain += 8.0;
                }
                if elev >= OROGRAPHIC_SECOND_M {
                    rain += 7.0;
                }
                let coastal = grid
                    .neighbors(x, y)
                    .any(|(nx, ny)| inputs.land[grid.index(nx, ny)] == 0);
                if coastal {
                    rain += params.coastal_bonus;
                } else if inputs.river_adjacency[index] == 1 {
                    rain += params.river_bonus;
                }
            }
            let jitter = rng.gen_range(-params.noise_amplitude..=params.noise_amplitude);
            rain += jitter as f64;
            rain.round().clamp(0.0, 200.0) as u8
        })
        .collect()
}

/// Step `climate-baseline`: banded rainfall, zonal winds, surface currents.
pub struct ClimateBaselineStep {
    contract: StepContract,
}

impl ClimateBaselineStep {
    /// Defines the step.
    ///
    /// # Errors
    ///
    /// [`ContractError`] when the contract wiring is defective.
    pub fn define() -> Result<Self, ContractError> {
        let contract = StepContract::define(
            "climate-baseline",
            "climate",
            vec![
                DependencyTag::artifact(tag::LAND_MASK),
                DependencyTag::artifact(tag::ELEVATION),
                DependencyTag::artifact(tag::FLOW),
            ],
            vec![
                DependencyTag::artifact(tag::RAINFALL_BASELINE),
                DependencyTag::artifact(tag::WINDS),
                DependencyTag::artifact(tag::CURRENTS),
            ],
            ObjectSchema::new()
                .field("band_blend", Schema::float_range(0.6, 0.0, 1.0))
                .field("band_scale", Schema::float_range(1.0, 0.5, 1.5))
                .field("coastal_bonus", Schema::int_range(24, 0, 60))
                .field("river_bonus", Schema::int_range(16, 0, 60))
                .field("noise_amplitude", Schema::int_range(6, 0, 30))
                .field("jet_count", Schema::int_range(2, 1, 4))
                .field("jet_strength", Schema::float_range(1.0, 0.0, 3.0)),
            &[],
        )?;
        Ok(Self { contract })
    }
}

impl Step for ClimateBaselineStep {
    fn contract(&self) -> &StepContract {
        &self.contract
    }

    fn normalize(&self, mut config: Value, _env: &MapEnv, knobs: &Value) -> Value {
        let scale = match knobs.get("dryness").and_then(Value::as_str) {
            Some("dry") => 0.85,
            Some("wet") => 1.15,
            _ => return config,
        };
        // The knob only moves fields the caller left alone.
        let current = config
            .get("band_scale")
            .and_then(Value::as_f64)
            .unwrap_or(1.0);
        if (current - 1.0).abs() < f64::EPSILON {
            if let Some(slot) = config.get_mut("band_scale") {
                *slot = Value::from(scale);
            }
        }
        config
    }

    fn run(&self, ctx: &mut MapContext<'_>, config: &Value) -> Result<(), ExecuteError> {
        let params = BaselineParams {
            band_blend: cfg::float(config, "band_blend"),
            band_scale: cfg::float(config, "band_scale"),
            coastal_bonus: cfg::int(config, "coastal_bonus") as f64,
            river_bonus: cfg::int(config, "river_bonus") as f64,
            noise_amplitude: cfg::int(config, "noise_amplitude"),
        };
        let jet_count = u32::try_from(cfg::int(config, "jet_count")).unwrap_or(2);
        let jet_strength = cfg::float(config, "jet_strength");

        let grid = HexGrid::from_dims(ctx.dims());
        let latitudes = ctx.env.row_latitudes();
        let jets = jet_centers(jet_count, &mut ctx.rng("climate.jet-jitter"));
        let winds = zonal_winds(grid, &latitudes, &jets, jet_strength);

        let engine_rainfall: Vec<i32> = (0..grid.len())
            .map(|index| {
                let (x, y) = grid.coords(index);
                ctx.adapter.get_rainfall(x, y)
            })
            .collect();
        let land = LAND_MASK.read(&ctx.artifacts)?;
        let elevation = ELEVATION.read(&ctx.artifacts)?;
        let flow = FLOW.read(&ctx.artifacts)?;
        let currents = zonal_currents(grid, &latitudes, land);
        let inputs = BaselineInputs {
            land,
            elevation,
            river_adjacency: &flow.river_adjacency,
            engine_rainfall: &engine_rainfall,
        };
        let mut rain_rng = ctx.rng("climate.rain-noise");
        let baseline = rainfall_baseline(grid, &latitudes, &inputs, &params, &mut rain_rng);

        debug!(
            target: "ymir::climate",
            jets = jets.len(),
            mean = baseline.iter().map(|&r| u32::from(r)).sum::<u32>() / grid.len() as u32,
            "rainfall baseline laid down"
        );
        if ctx.trace.is_enabled() {
            ctx.trace.dump_bytes("rainfall baseline", grid.width, &baseline, 200);
            ctx.trace.dump_signed("zonal winds", grid.width, &winds);
        }
        ctx.publish(RAINFALL_BASELINE, baseline)?;
        ctx.publish(WINDS, winds)?;
        ctx.publish(CURRENTS, currents)?;
        Ok(())
    }
}

/// Read-only fields the refinement passes sample.
pub struct RefineInputs<'a> {
    /// Land mask, 1 for land.
    pub land: &'a [u8],
    /// Elevation in meters.
    pub elevation: &'a [i16],
    /// Zonal winds from the baseline.
    pub winds: &'a [i16],
    /// Flow routing output.
    pub flow: &'a FlowField,
    /// Tectonic boundary field.
    pub boundaries: &'a BoundaryField,
    /// Latitude per row.
    pub latitudes: &'a [f64],
}

/// Tunables for the refinement passes.
#[derive(Clone, Copy, Debug)]
pub struct RefineParams {
    /// Elevation that counts as a rain-shadow barrier.
    pub shadow_barrier_m: i16,
    /// How many tiles upwind the shadow scan looks.
    pub shadow_window: u32,
}

fn adjust(rain: &mut [f64], index: usize, delta: f64) {
    rain[index] = (rain[index] + delta).clamp(0.0, 200.0);
}

/// Runs the local refinement passes over the baseline, in a fixed order:
/// coastal humidity gradient, orographic rain shadow, river corridors,
/// closed basins, rift valleys, volcanic hotspots. Rainfall re-clamps to
/// `[0, 200]` after every adjustment.
#[must_use]
pub fn refine_rainfall(
    grid: HexGrid,
    baseline: &[u8],
    inputs: &RefineInputs<'_>,
    params: &RefineParams,
) -> Vec<u8> {
    let len = grid.len();
    let mut rain: Vec<f64> = baseline.iter().map(|&r| f64::from(r)).collect();

    // Humidity bleeds inland, two points per ring out to five rings.
    let water_distance = grid.distance_field(
        (0..len).filter(|&index| inputs.land[index] == 0),
    );
    for index in 0..len {
        if inputs.land[index] == 1 {
            let dist = water_distance[index];
            if (1..=5).contains(&dist) {
                adjust(&mut rain, index, f64::from(6 - dist) * 2.0);
            }
        }
    }

    // Rain shadow: count barrier tiles in the upwind fetch along the row.
    // Tiles at barrier height keep their orographic rain.
    for index in 0..len {
        if inputs.land[index] != 1 || inputs.elevation[index] >= params.shadow_barrier_m {
            continue;
        }
        let (x, y) = grid.coords(index);
        let wind = inputs.winds[index];
        let upwind_dx = if wind > 0 {
            -1
        } else if wind < 0 {
            1
        } else {
            // Calm tiles fall back to the band direction for their latitude.
            let abs_lat = inputs.latitudes[y as usize].abs();
            if (30.0..60.0).contains(&abs_lat) {
                -1
            } else {
                1
            }
        };
        let mut barriers = 0_u32;
        for step in 1..=params.shadow_window {
            let bx = grid.wrap_x(x + upwind_dx * step as i32);
            if inputs.elevation[grid.index(bx, y)] >= params.shadow_barrier_m {
                barriers += 1;
            }
        }
        if barriers > 0 {
            adjust(&mut rain, index, -(8.0 + 6.0 * f64::from(barriers - 1)));
        }
    }

    // River corridors stay lush; adjacency alone earns a smaller bonus.
    for index in 0..len {
        if inputs.land[index] != 1 {
            continue;
        }
        if inputs.flow.river_class[index] > 0 {
            adjust(&mut rain, index, 14.0);
        } else if inputs.flow.river_adjacency[index] == 1 {
            adjust(&mut rain, index, 10.0);
        }
    }

    // Closed basins hold evaporating water; dampen two rings around them.
    let basin_distance = grid.distance_field(
        (0..len).filter(|&index| inputs.flow.basin_mask[index] == 1),
    );
    for index in 0..len {
        if inputs.land[index] == 1 && basin_distance[index] <= 2 {
            adjust(&mut rain, index, 6.0);
        }
    }

    // Rift valleys collect lake chains.
    let rift_distance = grid.distance_field(
        (0..len).filter(|&index| inputs.boundaries.rift_potential[index] >= 64),
    );
    for index in 0..len {
        if inputs.land[index] == 1 && rift_distance[index] <= 2 {
            adjust(&mut rain, index, 8.0);
        }
    }

    // Hotspot islands run wet, doubly so on their windward coasts.
    for index in 0..len {
        if inputs.land[index] != 1 || inputs.boundaries.uplift_potential[index] < 176 {
            continue;
        }
        adjust(&mut rain, index, 6.0);
        let (x, y) = grid.coords(index);
        let coastal = grid
            .neighbors(x, y)
            .any(|(nx, ny)| inputs.land[grid.index(nx, ny)] == 0);
        if coastal {
            adjust(&mut rain, index, 8.0);
        }
    }

    rain.iter().map(|&r| r.round().clamp(0.0, 200.0) as u8).collect()
}

/// Derives the continuous climate indices from rainfall, latitude, and
/// elevation. Temperature runs a linear equator-pole ramp with a 6.5 C/km
/// lapse rate; aridity is PET over precipitation with rainfall read as
/// tens of millimeters.
#[must_use]
pub fn climate_indices(
    grid: HexGrid,
    latitudes: &[f64],
    elevation: &[i16],
    rainfall: &[u8],
    offset_c: f64,
) -> ClimateIndices {
    let len = grid.len();
    let mut out = ClimateIndices {
        surface_temperature_c: Vec::with_capacity(len),
        pet: Vec::with_capacity(len),
        aridity_index: Vec::with_capacity(len),
        freeze_index: Vec::with_capacity(len),
    };
    for index in 0..len {
        let (_, y) = grid.coords(index);
        let abs_lat = latitudes[y as usize].abs();
        let lapse = f64::from(elevation[index].max(0)) / 1000.0 * 6.5;
        let temp = 28.0 - 36.0 * abs_lat / 90.0 - lapse + offset_c;
        let pet = temp.max(0.0) * 60.0;
        let precip_mm = (f64::from(rainfall[index]) * 10.0).max(30.0);
        let freeze = ((2.0 - temp) / 12.0).clamp(0.0, 1.0);
        out.surface_temperature_c.push(temp as f32);
        out.pet.push(pet as f32);
        out.aridity_index.push((pet / precip_mm) as f32);
        out.freeze_index.push(freeze as f32);
    }
    out
}

/// Step `climate-refine`: local rainfall passes, engine write-back, indices.
pub struct ClimateRefineStep {
    contract: StepContract,
}

impl ClimateRefineStep {
    /// Defines the step.
    ///
    /// # Errors
    ///
    /// [`ContractError`] when the contract wiring is defective.
    pub fn define() -> Result<Self, ContractError> {
        let contract = StepContract::define(
            "climate-refine",
            "climate",
            vec![
                DependencyTag::artifact(tag::RAINFALL_BASELINE),
                DependencyTag::artifact(tag::WINDS),
                DependencyTag::artifact(tag::LAND_MASK),
                DependencyTag::artifact(tag::ELEVATION),
                DependencyTag::artifact(tag::FLOW),
                DependencyTag::artifact(tag::BOUNDARIES),
            ],
            vec![
                DependencyTag::artifact(tag::RAINFALL),
                DependencyTag::artifact(tag::CLIMATE_INDICES),
                DependencyTag::field(tag::ENGINE_RAINFALL),
            ],
            ObjectSchema::new()
                .field("offset_c", Schema::float_range(0.0, -20.0, 20.0))
                .field("shadow_barrier_m", Schema::int_range(500, 0, 5000))
                .field("shadow_window", Schema::int_range(6, 1, 12)),
            &[],
        )?;
        Ok(Self { contract })
    }
}

impl Step for ClimateRefineStep {
    fn contract(&self) -> &StepContract {
        &self.contract
    }

    fn normalize(&self, mut config: Value, _env: &MapEnv, knobs: &Value) -> Value {
        let offset = match knobs.get("temperature").and_then(Value::as_str) {
            Some("cold") => -6.0,
            Some("hot") => 6.0,
            _ => return config,
        };
        let current = config
            .get("offset_c")
            .and_then(Value::as_f64)
            .unwrap_or(0.0);
        if current.abs() < f64::EPSILON {
            if let Some(slot) = config.get_mut("offset_c") {
                *slot = Value::from(offset);
            }
        }
        config
    }

    fn run(&self, ctx: &mut MapContext<'_>, config: &Value) -> Result<(), ExecuteError> {
        let params = RefineParams {
            shadow_barrier_m: cfg::int(config, "shadow_barrier_m") as i16,
            shadow_window: u32::try_from(cfg::int(config, "shadow_window")).unwrap_or(6),
        };
        let offset_c = cfg::float(config, "offset_c");

        let grid = HexGrid::from_dims(ctx.dims());
        let latitudes = ctx.env.row_latitudes();
        let baseline = RAINFALL_BASELINE.read(&ctx.artifacts)?;
        let winds = WINDS.read(&ctx.artifacts)?;
        let land = LAND_MASK.read(&ctx.artifacts)?;
        let elevation = ELEVATION.read(&ctx.artifacts)?;
        let flow = FLOW.read(&ctx.artifacts)?;
        let boundaries = BOUNDARIES.read(&ctx.artifacts)?;
        let inputs = RefineInputs {
            land,
            elevation,
            winds,
            flow,
            boundaries,
            latitudes: &latitudes,
        };
        let rainfall = refine_rainfall(grid, baseline, &inputs, &params);
        for index in 0..grid.len() {
            let (x, y) = grid.coords(index);
            ctx.adapter.set_rainfall(x, y, i32::from(rainfall[index]));
        }
        let indices = climate_indices(grid, &latitudes, elevation, &rainfall, offset_c);

        debug!(
            target: "ymir::climate",
            offset_c,
            mean = rainfall.iter().map(|&r| u32::from(r)).sum::<u32>() / grid.len() as u32,
            "rainfall refined"
        );
        if ctx.trace.is_enabled() {
            ctx.trace.dump_bytes("rainfall", grid.width, &rainfall, 200);
        }
        ctx.publish(RAINFALL, rainfall)?;
        ctx.publish(CLIMATE_INDICES, indices)?;
        Ok(())
    }
}
