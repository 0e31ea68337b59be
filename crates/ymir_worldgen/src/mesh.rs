//! # Plate Mesh
//!
//! Splits the map into tectonic plates: uniform random Voronoi sites in
//! pixel space, one motion vector per plate, nearest-site assignment per
//! tile measured the short way around the cylinder seam.

use rand::Rng;
use rand_chacha::ChaCha8Rng;
use serde_json::Value;
use tracing::debug;
use ymir_core::context::{MapContext, MapEnv};
use ymir_core::contract::{OpContract, StepContract};
use ymir_core::error::{ContractError, ExecuteError};
use ymir_core::grid::HexGrid;
use ymir_core::schema::{ObjectSchema, Schema, DEFAULT_STRATEGY};
use ymir_core::step::Step;
use ymir_core::tags::DependencyTag;
use ymir_core::trace::Segment;

use crate::artifacts::{tag, PlateMesh, PLATE_MESH};
use crate::cfg;

const RNG_LABEL: &str = "tectonics.plate-mesh";

/// Scales a requested plate count by map area relative to a reference
/// area: `round(count * (area / reference_area) ^ power)`, clamped to
/// `[2, 256]`.
#[must_use]
pub fn scaled_plate_count(requested: i64, area: f64, reference_area: f64, power: f64) -> u16 {
    let scale = if reference_area > 0.0 {
        (area / reference_area).powf(power)
    } else {
        1.0
    };
    let scaled = ((requested as f64) * scale).round();
    scaled.clamp(2.0, 256.0) as u16
}

/// Builds a plate mesh with `plate_count` plates over `grid`.
///
/// Draw order per plate is site x, site y, motion angle, motion speed;
/// nearest-site ties break toward the lower plate id. Both matter for
/// reproducibility.
#[must_use]
pub fn generate_plate_mesh(grid: HexGrid, rng: &mut ChaCha8Rng, plate_count: u16) -> PlateMesh {
    let plates = usize::from(plate_count);
    let mut site_px = Vec::with_capacity(plates);
    let mut site_py = Vec::with_capacity(plates);
    let mut motion_x = Vec::with_capacity(plates);
    let mut motion_y = Vec::with_capacity(plates);
    let max_py = f64::from(grid.height) * 1.5;
    for _ in 0..plates {
        site_px.push(rng.gen_range(0.0..grid.pixel_width()));
        site_py.push(rng.gen_range(0.0..max_py));
        let angle = rng.gen_range(0.0..std::f64::consts::TAU);
        let speed = rng.gen_range(0.4..1.0);
        motion_x.push((angle.cos() * speed) as f32);
        motion_y.push((angle.sin() * speed) as f32);
    }

    let mut cell_to_plate = vec![0_i16; grid.len()];
    for (index, slot) in cell_to_plate.iter_mut().enumerate() {
        let (x, y) = grid.coords(index);
        let center = grid.pixel(x, y);
        let mut best = 0_usize;
        let mut best_d2 = f64::INFINITY;
        for plate in 0..plates {
            let d2 = grid.wrapped_distance2(center, (site_px[plate], site_py[plate]));
            if d2 < best_d2 {
                best_d2 = d2;
                best = plate;
            }
        }
        *slot = best as i16;
    }

    PlateMesh { plate_count, site_px, site_py, motion_x, motion_y, cell_to_plate }
}

/// Step `plate-mesh`: publishes the plate partition every later tectonic
/// field derives from.
pub struct PlateMeshStep {
    contract: StepContract,
}

impl PlateMeshStep {
    /// Defines the step and its `op.plate-mesh` contract.
    ///
    /// # Errors
    ///
    /// [`ContractError`] when the contract wiring is defective.
    pub fn define() -> Result<Self, ContractError> {
        let op = OpContract::define(
            "op.plate-mesh",
            [(
                DEFAULT_STRATEGY,
                ObjectSchema::new()
                    .field("count", Schema::int_range(8, 2, 256))
                    .field("reference_area", Schema::float_range(4000.0, 1.0, 1_000_000.0))
                    .field("power", Schema::float_range(0.5, 0.0, 1.0)),
            )],
        )?;
        let contract = StepContract::define(
            "plate-mesh",
            "tectonics",
            vec![],
            vec![DependencyTag::artifact(tag::PLATE_MESH)],
            ObjectSchema::new(),
            &[("mesh", &op)],
        )?;
        Ok(Self { contract })
    }
}

impl Step for PlateMeshStep {
    fn contract(&self) -> &StepContract {
        &self.contract
    }

    // The count users configure is for the reference map; actual plate
    // count scales with map area.
    fn normalize(&self, mut config: Value, env: &MapEnv, _knobs: &Value) -> Value {
        let requested = config
            .pointer("/mesh/config/count")
            .and_then(Value::as_i64)
            .unwrap_or(8);
        let reference = config
            .pointer("/mesh/config/reference_area")
            .and_then(Value::as_f64)
            .unwrap_or(4000.0);
        let power = config
            .pointer("/mesh/config/power")
            .and_then(Value::as_f64)
            .unwrap_or(0.5);
        let scaled = scaled_plate_count(requested, env.dims.area(), reference, power);
        if let Some(slot) = config.pointer_mut("/mesh/config/count") {
            *slot = Value::from(i64::from(scaled));
        }
        config
    }

    fn run(&self, ctx: &mut MapContext<'_>, config: &Value) -> Result<(), ExecuteError> {
        let (_, op_config) = cfg::envelope(config, "mesh");
        let count = u16::try_from(cfg::int(op_config, "count")).unwrap_or(2).max(2);
        let grid = HexGrid::from_dims(ctx.dims());
        let mut rng = ctx.rng(RNG_LABEL);
        let mesh = generate_plate_mesh(grid, &mut rng, count);
        debug!(target: "ymir::tectonics", plates = usize::from(mesh.plate_count), "plate mesh built");
        if ctx.trace.is_enabled() {
            let ids: Vec<u8> = mesh.cell_to_plate.iter().map(|&p| p as u8).collect();
            let max = (mesh.plate_count - 1).min(255) as u8;
            ctx.trace.dump_bytes("plate mesh", grid.width, &ids, max);
            let sites: Vec<(i32, i32)> = mesh
                .site_px
                .iter()
                .zip(&mesh.site_py)
                .map(|(&px, &py)| (px.round() as i32, py.round() as i32))
                .collect();
            ctx.trace.points("plate sites", sites);
            let motion: Vec<Segment> = (0..usize::from(mesh.plate_count))
                .map(|p| Segment {
                    from: (mesh.site_px[p], mesh.site_py[p]),
                    to: (
                        mesh.site_px[p] + f64::from(mesh.motion_x[p]) * 4.0,
                        mesh.site_py[p] + f64::from(mesh.motion_y[p]) * 4.0,
                    ),
                })
                .collect();
            ctx.trace.segments("plate motion", motion);
        }
        ctx.publish(PLATE_MESH, mesh)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use ymir_adapter::{LatitudeBounds, MapDimensions};
    use ymir_core::rng::WorldSeed;

    use super::*;

    #[test]
    fn plate_count_scales_with_area() {
        // Four times the reference area at power 0.5 doubles the count.
        assert_eq!(scaled_plate_count(8, 16_000.0, 4000.0, 0.5), 16);
        assert_eq!(scaled_plate_count(8, 4000.0, 4000.0, 0.5), 8);
    }

    #[test]
    fn plate_count_clamps_to_its_bounds() {
        assert_eq!(scaled_plate_count(8, 1.0, 4000.0, 1.0), 2);
        assert_eq!(scaled_plate_count(200, 4_000_000.0, 4000.0, 0.5), 256);
    }

    #[test]
    fn mesh_is_deterministic_and_total() {
        let grid = HexGrid::new(24, 18);
        let seed = WorldSeed::new(77);
        let a = generate_plate_mesh(grid, &mut seed.rng(RNG_LABEL), 12);
        let b = generate_plate_mesh(grid, &mut seed.rng(RNG_LABEL), 12);
        assert_eq!(a, b);
        assert_eq!(a.cell_to_plate.len(), grid.len());
        assert!(a.cell_to_plate.iter().all(|&p| (0..12).contains(&p)));
        let first = a.cell_to_plate[0];
        assert!(a.cell_to_plate.iter().any(|&p| p != first));
    }

    #[test]
    fn normalize_rewrites_count_from_map_area() {
        let step = PlateMeshStep::define().unwrap();
        let config = step.contract().schema.default_value();
        let env = MapEnv::new(
            MapDimensions::new(160, 100),
            LatitudeBounds::symmetric(80.0),
            WorldSeed::new(1),
        );
        let normalized = step.normalize(config, &env, &Value::Null);
        assert_eq!(normalized.pointer("/mesh/config/count"), Some(&json!(16)));
    }
}
