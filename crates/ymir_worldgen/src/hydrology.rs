//! # Flow Routing & Rivers
//!
//! Drainage over the elevation field. The default strategy is a
//! priority-flood fill: it conceptually raises depressions to their spill
//! level while assigning receivers, so every land tile drains to water or
//! off a polar edge and no sink survives. The `steepest-descent` strategy
//! is the naive baseline that strands flow in any local minimum; it exists
//! for comparison and for engines that want raw descent.
//!
//! Discharge accumulates one unit per land tile downstream; river classes
//! come from fixed discharge thresholds.

use std::cmp::Ordering;
use std::collections::BinaryHeap;

use serde_json::Value;
use tracing::debug;
use ymir_core::context::MapContext;
use ymir_core::contract::{OpContract, StepContract};
use ymir_core::error::{ContractError, ExecuteError};
use ymir_core::grid::HexGrid;
use ymir_core::schema::{ObjectSchema, Schema, DEFAULT_STRATEGY};
use ymir_core::step::Step;
use ymir_core::tags::DependencyTag;

use crate::artifacts::{
    river, tag, FlowField, ELEVATION, FLOW, FLOW_OUTLET, FLOW_SINK, LAND_MASK,
};
use crate::cfg;

/// Discharge levels at which a tile becomes each river class.
#[derive(Clone, Copy, Debug)]
pub struct RiverThresholds {
    /// Discharge for a navigable river.
    pub navigable: f32,
    /// Discharge for a major river.
    pub major: f32,
    /// Discharge for a minor stream.
    pub minor: f32,
}

/// Heap entry for the flood frontier. `BinaryHeap` is a max-heap, so the
/// ordering is inverted: lowest spill pops first, oldest insertion breaks
/// ties. Both matter for determinism.
#[derive(Clone, Copy, Debug)]
struct Frontier {
    spill: f64,
    seq: u64,
    index: usize,
}

impl PartialEq for Frontier {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Frontier {}

impl PartialOrd for Frontier {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Frontier {
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .spill
            .total_cmp(&self.spill)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

/// Priority-flood routing.
///
/// Outlets are every water tile and every land tile on a polar edge row.
/// The frontier grows from the lowest spill level outward; each tile first
/// reached drains toward the tile that reached it, at a spill level at
/// least `epsilon` above its receiver. Depressions end up raised to their
/// rim, so the receiver graph has no sinks by construction.
#[must_use]
pub fn route_priority_flood(
    grid: HexGrid,
    elevation: &[i16],
    land: &[u8],
    epsilon: f64,
    thresholds: RiverThresholds,
) -> FlowField {
    let len = grid.len();
    let last_row = grid.height as i32 - 1;
    let mut flow_dir = vec![FLOW_OUTLET; len];
    let mut filled: Vec<f64> = elevation.iter().map(|&e| f64::from(e)).collect();
    let mut visited = vec![false; len];
    let mut heap: BinaryHeap<Frontier> = BinaryHeap::new();
    let mut seq = 0_u64;

    for index in 0..len {
        let (_, y) = grid.coords(index);
        if land[index] == 0 || y == 0 || y == last_row {
            visited[index] = true;
            heap.push(Frontier { spill: filled[index], seq, index });
            seq += 1;
        }
    }
    while let Some(Frontier { index, .. }) = heap.pop() {
        let (x, y) = grid.coords(index);
        for (nx, ny) in grid.neighbors(x, y) {
            let neighbor = grid.index(nx, ny);
            if visited[neighbor] {
                continue;
            }
            visited[neighbor] = true;
            filled[neighbor] = f64::from(elevation[neighbor]).max(filled[index] + epsilon);
            flow_dir[neighbor] = index as i32;
            heap.push(Frontier { spill: filled[neighbor], seq, index: neighbor });
            seq += 1;
        }
    }

    let basin_mask: Vec<u8> = (0..len)
        .map(|i| u8::from(land[i] == 1 && filled[i] > f64::from(elevation[i])))
        .collect();
    assemble(grid, land, flow_dir, &filled, basin_mask, thresholds)
}

/// Steepest-descent routing: each land tile drains to its strictly lowest
/// neighbor, ties toward the earlier neighbor in table order. Local minima
/// become sinks and keep their drainage.
#[must_use]
pub fn route_steepest_descent(
    grid: HexGrid,
    elevation: &[i16],
    land: &[u8],
    thresholds: RiverThresholds,
) -> FlowField {
    let len = grid.len();
    let mut flow_dir = vec![FLOW_OUTLET; len];
    for index in 0..len {
        if land[index] == 0 {
            continue;
        }
        let (x, y) = grid.coords(index);
        let mut best: Option<(usize, i16)> = None;
        for (nx, ny) in grid.neighbors(x, y) {
            let neighbor = grid.index(nx, ny);
            let e = elevation[neighbor];
            if best.map_or(true, |(_, lowest)| e < lowest) {
                best = Some((neighbor, e));
            }
        }
        flow_dir[index] = match best {
            Some((neighbor, e)) if e < elevation[index] => neighbor as i32,
            _ => FLOW_SINK,
        };
    }
    let spill: Vec<f64> = elevation.iter().map(|&e| f64::from(e)).collect();
    let basin_mask: Vec<u8> = flow_dir.iter().map(|&d| u8::from(d == FLOW_SINK)).collect();
    assemble(grid, land, flow_dir, &spill, basin_mask, thresholds)
}

/// Discharge, river classes, and adjacency from a receiver graph.
///
/// Tiles are processed in descending spill order; along every flow edge the
/// receiver's spill is strictly lower, so upstream discharge is complete
/// before it is handed down.
fn assemble(
    grid: HexGrid,
    land: &[u8],
    flow_dir: Vec<i32>,
    spill: &[f64],
    basin_mask: Vec<u8>,
    thresholds: RiverThresholds,
) -> FlowField {
    let len = flow_dir.len();
    let mut order: Vec<usize> = (0..len).collect();
    order.sort_unstable_by(|&a, &b| spill[b].total_cmp(&spill[a]).then_with(|| a.cmp(&b)));

    let mut discharge = vec![0.0_f32; len];
    for &index in &order {
        if land[index] == 1 {
            discharge[index] += 1.0;
        }
        let receiver = flow_dir[index];
        if receiver >= 0 {
            discharge[receiver as usize] += discharge[index];
        }
    }

    let mut river_class = vec![river::NONE; len];
    for (index, class) in river_class.iter_mut().enumerate() {
        if land[index] != 1 {
            continue;
        }
        let d = discharge[index];
        *class = if d >= thresholds.navigable {
            river::NAVIGABLE
        } else if d >= thresholds.major {
            river::MAJOR
        } else if d >= thresholds.minor {
            river::MINOR
        } else {
            river::NONE
        };
    }

    let mut river_adjacency = vec![0_u8; len];
    for index in 0..len {
        if river_class[index] > river::NONE {
            river_adjacency[index] = 1;
            continue;
        }
        let (x, y) = grid.coords(index);
        if grid
            .neighbors(x, y)
            .any(|(nx, ny)| river_class[grid.index(nx, ny)] > river::NONE)
        {
            river_adjacency[index] = 1;
        }
    }

    FlowField { flow_dir, discharge, river_class, river_adjacency, basin_mask }
}

/// Step `route-flow`: receiver graph, discharge, and river classes.
pub struct RouteFlowStep {
    contract: StepContract,
}

impl RouteFlowStep {
    /// Defines the step and its `op.flow-routing` contract.
    ///
    /// # Errors
    ///
    /// [`ContractError`] when the contract wiring is defective.
    pub fn define() -> Result<Self, ContractError> {
        let op = OpContract::define(
            "op.flow-routing",
            [
                (
                    DEFAULT_STRATEGY,
                    ObjectSchema::new()
                        .field("epsilon", Schema::float_range(0.001, 0.000_001, 1.0)),
                ),
                ("steepest-descent", ObjectSchema::new()),
            ],
        )?;
        let contract = StepContract::define(
            "route-flow",
            "hydrology",
            vec![
                DependencyTag::artifact(tag::ELEVATION),
                DependencyTag::artifact(tag::LAND_MASK),
            ],
            vec![DependencyTag::artifact(tag::FLOW)],
            ObjectSchema::new().field("river_thresholds", Schema::int_list(&[40, 18, 8])),
            &[("routing", &op)],
        )?;
        Ok(Self { contract })
    }
}

fn thresholds_from(config: &Value) -> RiverThresholds {
    let t = cfg::int_list(config, "river_thresholds");
    RiverThresholds {
        navigable: t.first().copied().unwrap_or(40) as f32,
        major: t.get(1).copied().unwrap_or(18) as f32,
        minor: t.get(2).copied().unwrap_or(8) as f32,
    }
}

impl Step for RouteFlowStep {
    fn contract(&self) -> &StepContract {
        &self.contract
    }

    fn run(&self, ctx: &mut MapContext<'_>, config: &Value) -> Result<(), ExecuteError> {
        let thresholds = thresholds_from(config);
        let (strategy, op_config) = cfg::envelope(config, "routing");
        let grid = HexGrid::from_dims(ctx.dims());
        let elevation = ELEVATION.read(&ctx.artifacts)?;
        let land = LAND_MASK.read(&ctx.artifacts)?;
        let flow = match strategy {
            "steepest-descent" => route_steepest_descent(grid, elevation, land, thresholds),
            _ => route_priority_flood(
                grid,
                elevation,
                land,
                cfg::float(op_config, "epsilon"),
                thresholds,
            ),
        };
        let sinks = flow.flow_dir.iter().filter(|&&d| d == FLOW_SINK).count();
        let rivers = flow.river_class.iter().filter(|&&c| c > river::NONE).count();
        let basins = flow.basin_mask.iter().filter(|&&b| b == 1).count();
        debug!(target: "ymir::hydrology", strategy, sinks, rivers, basins, "flow routed");
        if ctx.trace.is_enabled() {
            ctx.trace.dump_bytes("river class", grid.width, &flow.river_class, 3);
        }
        ctx.publish(FLOW, flow)?;
        Ok(())
    }
}

/// Step `model-rivers`: hands the drainage result to the engine's own
/// river and lake carving.
pub struct ModelRiversStep {
    contract: StepContract,
}

impl ModelRiversStep {
    /// Defines the step.
    ///
    /// # Errors
    ///
    /// [`ContractError`] when the contract wiring is defective.
    pub fn define() -> Result<Self, ContractError> {
        let contract = StepContract::define(
            "model-rivers",
            "hydrology",
            vec![
                DependencyTag::artifact(tag::FLOW),
                DependencyTag::field(tag::ENGINE_TERRAIN),
                DependencyTag::field(tag::ENGINE_ELEVATION),
            ],
            vec![
                DependencyTag::effect(tag::RIVERS_MODELED),
                DependencyTag::effect(tag::LAKES_GENERATED),
            ],
            ObjectSchema::new().field("lake_chance", Schema::int_range(25, 0, 100)),
            &[],
        )?;
        Ok(Self { contract })
    }
}

impl Step for ModelRiversStep {
    fn contract(&self) -> &StepContract {
        &self.contract
    }

    fn run(&self, ctx: &mut MapContext<'_>, config: &Value) -> Result<(), ExecuteError> {
        let lake_chance = u32::try_from(cfg::int(config, "lake_chance")).unwrap_or(25);
        ctx.adapter.model_rivers();
        ctx.adapter.generate_lakes(lake_chance);
        debug!(target: "ymir::hydrology", lake_chance, "engine river pass done");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const THRESHOLDS: RiverThresholds =
        RiverThresholds { navigable: 40.0, major: 18.0, minor: 8.0 };

    /// Flat 7x7 plain, water border, 25 land tiles, every elevation zero.
    fn flat_plain() -> (HexGrid, Vec<i16>, Vec<u8>) {
        let grid = HexGrid::new(7, 7);
        let elevation = vec![0_i16; grid.len()];
        let mut land = vec![1_u8; grid.len()];
        for (index, slot) in land.iter_mut().enumerate() {
            let (x, y) = grid.coords(index);
            if x == 0 || x == 6 || y == 0 || y == 6 {
                *slot = 0;
            }
        }
        (grid, elevation, land)
    }

    #[test]
    fn steepest_descent_strands_every_flat_interior_tile() {
        let (grid, elevation, land) = flat_plain();
        let flow = route_steepest_descent(grid, &elevation, &land, THRESHOLDS);
        let sinks = flow.flow_dir.iter().filter(|&&d| d == FLOW_SINK).count();
        assert_eq!(sinks, 25);
        assert_eq!(flow.basin_mask.iter().map(|&b| usize::from(b)).sum::<usize>(), 25);
    }

    #[test]
    fn priority_flood_drains_the_same_plain_completely() {
        let (grid, elevation, land) = flat_plain();
        let flow = route_priority_flood(grid, &elevation, &land, 0.001, THRESHOLDS);
        assert!(flow.flow_dir.iter().all(|&d| d != FLOW_SINK));

        // Every land tile's receiver chain ends in a water tile.
        for start in 0..grid.len() {
            if land[start] == 0 {
                continue;
            }
            let mut current = start;
            let mut steps = 0;
            loop {
                let receiver = flow.flow_dir[current];
                assert!(receiver >= 0, "tile {current} should drain toward water");
                current = receiver as usize;
                if land[current] == 0 {
                    break;
                }
                steps += 1;
                assert!(steps <= grid.len(), "receiver chain must not cycle");
            }
        }
    }

    #[test]
    fn priority_flood_is_deterministic() {
        let (grid, elevation, land) = flat_plain();
        let a = route_priority_flood(grid, &elevation, &land, 0.001, THRESHOLDS);
        let b = route_priority_flood(grid, &elevation, &land, 0.001, THRESHOLDS);
        assert_eq!(a, b);
    }

    /// A walled channel descending eastward into water at x = 6.
    fn walled_channel() -> (HexGrid, Vec<i16>, Vec<u8>) {
        let grid = HexGrid::new(7, 3);
        let mut elevation = vec![100_i16; grid.len()];
        let mut land = vec![1_u8; grid.len()];
        for y in 0..3 {
            for x in [0, 6] {
                elevation[grid.index(x, y)] = -10;
                land[grid.index(x, y)] = 0;
            }
        }
        for (x, e) in (1..6).zip([60_i16, 50, 40, 30, 20]) {
            elevation[grid.index(x, 1)] = e;
        }
        (grid, elevation, land)
    }

    #[test]
    fn discharge_grows_downstream_along_a_channel() {
        let (grid, elevation, land) = walled_channel();
        let flow = route_priority_flood(grid, &elevation, &land, 0.001, THRESHOLDS);
        let channel: Vec<f32> = (1..6).map(|x| flow.discharge[grid.index(x, 1)]).collect();
        for pair in channel.windows(2) {
            assert!(pair[1] > pair[0], "discharge must grow downstream: {channel:?}");
        }
        assert_eq!(flow.flow_dir[grid.index(5, 1)], grid.index(6, 1) as i32);
    }

    #[test]
    fn river_classes_follow_the_thresholds() {
        let (grid, elevation, land) = walled_channel();
        let close = RiverThresholds { navigable: 8.0, major: 5.0, minor: 3.0 };
        let flow = route_priority_flood(grid, &elevation, &land, 0.001, close);
        let mouth = grid.index(5, 1);
        assert!(flow.river_class[mouth] >= river::MINOR);
        assert!(flow.river_class[mouth] >= flow.river_class[grid.index(2, 1)]);
        // A tile beside the river counts as river-adjacent.
        assert_eq!(flow.river_adjacency[grid.index(5, 0)], 1);
        // Water tiles never carry a class.
        assert_eq!(flow.river_class[grid.index(6, 1)], river::NONE);
    }

    #[test]
    fn depressions_are_raised_and_flagged_as_basins() {
        let grid = HexGrid::new(6, 5);
        let mut elevation = vec![50_i16; grid.len()];
        let mut land = vec![1_u8; grid.len()];
        for y in 0..5 {
            elevation[grid.index(5, y)] = -10;
            land[grid.index(5, y)] = 0;
        }
        let pit = grid.index(2, 2);
        elevation[pit] = 10;

        let steepest = route_steepest_descent(grid, &elevation, &land, THRESHOLDS);
        assert_eq!(steepest.flow_dir[pit], FLOW_SINK);

        let flood = route_priority_flood(grid, &elevation, &land, 0.001, THRESHOLDS);
        assert!(flood.flow_dir[pit] >= 0);
        assert_eq!(flood.basin_mask[pit], 1);
        assert!(flood.flow_dir.iter().all(|&d| d != FLOW_SINK));
    }
}
