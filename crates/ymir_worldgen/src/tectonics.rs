//! # Boundary Classification
//!
//! Turns the plate mesh into regimes and influence fields. A tile sits on a
//! boundary when any hex neighbor belongs to another plate; the regime
//! comes from the relative motion of the pair, projected on the
//! site-to-site normal. Influence fields fall off exponentially with hex
//! distance from the nearest boundary of each regime.

use serde_json::Value;
use tracing::debug;
use ymir_core::context::MapContext;
use ymir_core::contract::StepContract;
use ymir_core::error::{ContractError, ExecuteError};
use ymir_core::grid::HexGrid;
use ymir_core::schema::{ObjectSchema, Schema};
use ymir_core::step::Step;
use ymir_core::tags::DependencyTag;

use crate::artifacts::{boundary, tag, BoundaryField, PlateMesh, BOUNDARIES, PLATE_MESH};
use crate::cfg;

const UNREACHED: u32 = u32::MAX;

/// A forced-regime band along a map edge.
///
/// Bands are synthetic: they overwrite the regime and floor the matching
/// potential after classification, and never feed the distance fields.
#[derive(Clone, Copy, Debug)]
pub struct EdgeBand {
    /// Rows the band covers, counted from the edge.
    pub rows: u32,
    /// Regime code to force, or `None` to leave the rows alone.
    pub regime: Option<u8>,
    /// Floor for the forced regime's potential inside the band.
    pub intensity: u8,
}

/// Tunables for boundary classification.
#[derive(Clone, Copy, Debug)]
pub struct BoundaryParams {
    /// Closing speed above which a boundary is convergent.
    pub convergence_threshold: f64,
    /// Closing speed below which a boundary is divergent.
    pub divergence_threshold: f64,
    /// Tangential speed above which a non-closing boundary is transform.
    pub transform_threshold: f64,
    /// Exponential falloff per hex step for boundary influence.
    pub influence_decay: f64,
    /// Forced band along the north edge.
    pub north_edge: EdgeBand,
    /// Forced band along the south edge.
    pub south_edge: EdgeBand,
}

/// Closing and tangential speed of the plate pair `(mine, other)`.
///
/// The normal points from my site toward the other site, the short way
/// around the seam, so positive closing means the plates approach.
fn pair_motion(grid: HexGrid, mesh: &PlateMesh, mine: i16, other: i16) -> (f64, f64) {
    let m = usize::try_from(mine).unwrap_or(0);
    let o = usize::try_from(other).unwrap_or(0);
    let dx = grid.wrapped_dx(mesh.site_px[m], mesh.site_px[o]);
    let dy = mesh.site_py[o] - mesh.site_py[m];
    let norm = (dx * dx + dy * dy).sqrt();
    if norm < f64::EPSILON {
        return (0.0, 0.0);
    }
    let (nx, ny) = (dx / norm, dy / norm);
    let rvx = f64::from(mesh.motion_x[m] - mesh.motion_x[o]);
    let rvy = f64::from(mesh.motion_y[m] - mesh.motion_y[o]);
    let closing = rvx * nx + rvy * ny;
    let tangential = rvx * -ny + rvy * nx;
    (closing, tangential)
}

fn closeness(dist: u32, decay: f64) -> f64 {
    if dist == UNREACHED {
        0.0
    } else {
        (-decay * f64::from(dist)).exp()
    }
}

fn band_rows(grid: HexGrid, band: EdgeBand, from_north: bool) -> impl Iterator<Item = usize> {
    let height = grid.height;
    let rows = band.rows.min(height);
    let range = if from_north { 0..rows } else { height - rows..height };
    range.flat_map(move |y| {
        let start = (y as usize) * (grid.width as usize);
        start..start + grid.width as usize
    })
}

/// Classifies every tile's boundary regime and derives the uplift, rift,
/// and shield fields from it.
#[must_use]
pub fn classify_plate_boundaries(
    grid: HexGrid,
    mesh: &PlateMesh,
    params: &BoundaryParams,
) -> BoundaryField {
    let len = grid.len();
    let mut boundary_type = vec![boundary::NONE; len];
    for (index, slot) in boundary_type.iter_mut().enumerate() {
        let (x, y) = grid.coords(index);
        let mine = mesh.cell_to_plate[index];
        // Of all differing neighbor plates, the strongest-closing pair
        // decides the regime.
        let mut best: Option<(f64, f64)> = None;
        for (nx, ny) in grid.neighbors(x, y) {
            let other = mesh.cell_to_plate[grid.index(nx, ny)];
            if other == mine {
                continue;
            }
            let motion = pair_motion(grid, mesh, mine, other);
            if best.map_or(true, |(closing, _)| motion.0.abs() > closing.abs()) {
                best = Some(motion);
            }
        }
        if let Some((closing, tangential)) = best {
            *slot = if closing > params.convergence_threshold {
                boundary::CONVERGENT
            } else if closing < params.divergence_threshold {
                boundary::DIVERGENT
            } else if tangential.abs() > params.transform_threshold {
                boundary::TRANSFORM
            } else {
                boundary::NONE
            };
        }
    }

    let sources = |regime: u8| {
        boundary_type
            .iter()
            .enumerate()
            .filter(move |&(_, &t)| t == regime)
            .map(|(i, _)| i)
    };
    let dist_convergent = grid.distance_field(sources(boundary::CONVERGENT));
    let dist_divergent = grid.distance_field(sources(boundary::DIVERGENT));
    let dist_any = grid.distance_field(
        boundary_type
            .iter()
            .enumerate()
            .filter(|&(_, &t)| t != boundary::NONE)
            .map(|(i, _)| i),
    );

    let decay = params.influence_decay;
    let byte = |v: f64| (255.0 * v).round().clamp(0.0, 255.0) as u8;
    let mut uplift_potential: Vec<u8> = dist_convergent
        .iter()
        .map(|&d| byte(closeness(d, decay)))
        .collect();
    let mut rift_potential: Vec<u8> = dist_divergent
        .iter()
        .map(|&d| byte(closeness(d, decay)))
        .collect();
    let shield_stability: Vec<u8> = dist_any
        .iter()
        .map(|&d| byte(1.0 - closeness(d, decay)))
        .collect();

    for (band, from_north) in [(params.north_edge, true), (params.south_edge, false)] {
        let Some(regime) = band.regime else { continue };
        for index in band_rows(grid, band, from_north) {
            boundary_type[index] = regime;
            let field = match regime {
                boundary::CONVERGENT => &mut uplift_potential,
                boundary::DIVERGENT => &mut rift_potential,
                _ => continue,
            };
            field[index] = field[index].max(band.intensity);
        }
    }

    BoundaryField { boundary_type, uplift_potential, rift_potential, shield_stability }
}

/// Step `classify-boundaries`: regimes and influence fields from the mesh.
pub struct ClassifyBoundariesStep {
    contract: StepContract,
}

impl ClassifyBoundariesStep {
    /// Defines the step.
    ///
    /// # Errors
    ///
    /// [`ContractError`] when the contract wiring is defective.
    pub fn define() -> Result<Self, ContractError> {
        let edge_schema = || {
            ObjectSchema::new()
                .field("rows", Schema::int_range(1, 0, 16))
                .field(
                    "regime",
                    Schema::string_one_of(
                        "divergent",
                        &["none", "convergent", "divergent", "transform"],
                    ),
                )
                .field("intensity", Schema::int_range(160, 0, 255))
        };
        let contract = StepContract::define(
            "classify-boundaries",
            "tectonics",
            vec![DependencyTag::artifact(tag::PLATE_MESH)],
            vec![DependencyTag::artifact(tag::BOUNDARIES)],
            ObjectSchema::new()
                .field("convergence_threshold", Schema::float_range(0.25, 0.0, 4.0))
                .field("divergence_threshold", Schema::float_range(-0.15, -4.0, 0.0))
                .field("transform_threshold", Schema::float_range(0.4, 0.0, 4.0))
                .field("influence_decay", Schema::float_range(0.3, 0.01, 2.0))
                .field("north_edge", Schema::Object(edge_schema()))
                .field("south_edge", Schema::Object(edge_schema())),
            &[],
        )?;
        Ok(Self { contract })
    }
}

fn edge_band(config: &Value, key: &str) -> EdgeBand {
    let node = config.get(key).unwrap_or(&cfg::NULL);
    let regime = match cfg::text(node, "regime") {
        "convergent" => Some(boundary::CONVERGENT),
        "divergent" => Some(boundary::DIVERGENT),
        "transform" => Some(boundary::TRANSFORM),
        _ => None,
    };
    EdgeBand {
        rows: u32::try_from(cfg::int(node, "rows")).unwrap_or(0),
        regime,
        intensity: u8::try_from(cfg::int(node, "intensity")).unwrap_or(0),
    }
}

impl Step for ClassifyBoundariesStep {
    fn contract(&self) -> &StepContract {
        &self.contract
    }

    fn run(&self, ctx: &mut MapContext<'_>, config: &Value) -> Result<(), ExecuteError> {
        let params = BoundaryParams {
            convergence_threshold: cfg::float(config, "convergence_threshold"),
            divergence_threshold: cfg::float(config, "divergence_threshold"),
            transform_threshold: cfg::float(config, "transform_threshold"),
            influence_decay: cfg::float(config, "influence_decay"),
            north_edge: edge_band(config, "north_edge"),
            south_edge: edge_band(config, "south_edge"),
        };
        let grid = HexGrid::from_dims(ctx.dims());
        let mesh = ctx.read(PLATE_MESH)?;
        let field = classify_plate_boundaries(grid, mesh, &params);
        let count = |regime: u8| field.boundary_type.iter().filter(|&&t| t == regime).count();
        debug!(
            target: "ymir::tectonics",
            convergent = count(boundary::CONVERGENT),
            divergent = count(boundary::DIVERGENT),
            transform = count(boundary::TRANSFORM),
            "boundaries classified"
        );
        if ctx.trace.is_enabled() {
            let active = field.boundary_type.iter().filter(|&&t| t != boundary::NONE).count();
            let saturation = 100.0 * active as f64 / field.boundary_type.len() as f64;
            let mean_uplift = field.uplift_potential.iter().map(|&u| u32::from(u)).sum::<u32>()
                / field.uplift_potential.len() as u32;
            ctx.trace.event(
                "boundary coverage",
                format!("{saturation:.1}% of tiles on a boundary, mean uplift {mean_uplift}"),
            );
            ctx.trace.dump_bytes("boundary regimes", grid.width, &field.boundary_type, 3);
            ctx.trace.dump_bytes("uplift potential", grid.width, &field.uplift_potential, 255);
        }
        ctx.publish(BOUNDARIES, field)?;
        Ok(())
    }
}
