//! # Artifact & Tag Inventory
//!
//! Every buffer the standard recipe publishes, with its handle and
//! validator, plus the full dependency tag registry. Publishers and readers
//! share these declarations; nothing else in the crate names a tag id
//! directly.

use ymir_adapter::MapDimensions;
use ymir_core::artifact::{expect_len, ArtifactHandle};
use ymir_core::error::TagError;
use ymir_core::tags::{DependencyTag, TagOwner, TagRegistry};

/// Tag ids used by the standard recipe.
pub mod tag {
    /// Plate sites, motions, and the cell-to-plate map.
    pub const PLATE_MESH: &str = "artifact:tectonics.plate-mesh";
    /// Boundary regimes and the uplift/rift/shield byte fields.
    pub const BOUNDARIES: &str = "artifact:tectonics.boundaries";
    /// Per-tile elevation in meters.
    pub const ELEVATION: &str = "artifact:topography.elevation";
    /// Per-tile land flag (1 land, 0 water).
    pub const LAND_MASK: &str = "artifact:topography.land-mask";
    /// Flow directions, discharge, river classes, basin mask.
    pub const FLOW: &str = "artifact:hydrology.flow";
    /// Rainfall before the refinement passes.
    pub const RAINFALL_BASELINE: &str = "artifact:climate.rainfall-baseline";
    /// Final rainfall, 0-200.
    pub const RAINFALL: &str = "artifact:climate.rainfall";
    /// Per-tile zonal wind strength (positive eastward).
    pub const WINDS: &str = "artifact:climate.winds";
    /// Per-tile zonal current strength, water tiles only.
    pub const CURRENTS: &str = "artifact:climate.currents";
    /// Surface temperature, PET, aridity, freeze index.
    pub const CLIMATE_INDICES: &str = "artifact:climate.indices";
    /// Snow cover, sea ice, albedo, adjusted temperature.
    pub const CRYOSPHERE: &str = "artifact:climate.cryosphere";
    /// Engine biome index per tile.
    pub const BIOMES: &str = "artifact:biomes.classification";

    /// Engine-side terrain indices, written through the adapter.
    pub const ENGINE_TERRAIN: &str = "field:engine.terrain";
    /// Engine-side elevation, written through the adapter.
    pub const ENGINE_ELEVATION: &str = "field:engine.elevation";
    /// Engine-side rainfall, written through the adapter.
    pub const ENGINE_RAINFALL: &str = "field:engine.rainfall";
    /// Engine-side biome indices, written through the adapter.
    pub const ENGINE_BIOMES: &str = "field:engine.biomes";

    /// The engine carved its river network.
    pub const RIVERS_MODELED: &str = "effect:rivers.modeled";
    /// The engine filled lake depressions.
    pub const LAKES_GENERATED: &str = "effect:lakes.generated";
    /// The engine's terrain sanity pass ran.
    pub const TERRAIN_VALIDATED: &str = "effect:terrain.validated";
    /// The engine rebuilt its area bookkeeping.
    pub const AREAS_RECALCULATED: &str = "effect:areas.recalculated";
    /// Features were placed.
    pub const FEATURES_PLACED: &str = "effect:features.placed";
}

/// Boundary regime codes stored in [`BoundaryField::boundary_type`].
pub mod boundary {
    /// Plate interior.
    pub const NONE: u8 = 0;
    /// Plates moving together.
    pub const CONVERGENT: u8 = 1;
    /// Plates moving apart.
    pub const DIVERGENT: u8 = 2;
    /// Plates sliding past each other.
    pub const TRANSFORM: u8 = 3;
}

/// River class codes stored in [`FlowField::river_class`].
pub mod river {
    /// No river.
    pub const NONE: u8 = 0;
    /// Minor stream.
    pub const MINOR: u8 = 1;
    /// Major river.
    pub const MAJOR: u8 = 2;
    /// Navigable river.
    pub const NAVIGABLE: u8 = 3;
}

/// Receiver meaning "this tile drains off the map or into water".
pub const FLOW_OUTLET: i32 = -1;

/// Receiver meaning "this tile is a stranded sink" (steepest-descent only;
/// priority-flood never produces one).
pub const FLOW_SINK: i32 = -2;

/// Plate sites, per-plate motion vectors, and the cell-to-plate map.
#[derive(Clone, Debug, PartialEq)]
pub struct PlateMesh {
    /// Number of plates.
    pub plate_count: u16,
    /// Site x in pixel space, one per plate.
    pub site_px: Vec<f64>,
    /// Site y in pixel space, one per plate.
    pub site_py: Vec<f64>,
    /// Plate motion x component, one per plate.
    pub motion_x: Vec<f32>,
    /// Plate motion y component, one per plate.
    pub motion_y: Vec<f32>,
    /// Owning plate per tile.
    pub cell_to_plate: Vec<i16>,
}

fn validate_plate_mesh(mesh: &PlateMesh, dims: MapDimensions) -> Result<(), String> {
    let plates = usize::from(mesh.plate_count);
    if plates == 0 {
        return Err("Expected plate mesh with at least one plate.".to_owned());
    }
    expect_len("site_px", plates, &mesh.site_px)?;
    expect_len("site_py", plates, &mesh.site_py)?;
    expect_len("motion_x", plates, &mesh.motion_x)?;
    expect_len("motion_y", plates, &mesh.motion_y)?;
    expect_len("cell_to_plate", dims.size(), &mesh.cell_to_plate)?;
    for &plate in &mesh.cell_to_plate {
        if plate < 0 || usize::try_from(plate).is_ok_and(|p| p >= plates) {
            return Err(format!("Plate id {plate} out of range (plates {plates})."));
        }
    }
    Ok(())
}

/// Handle for [`PlateMesh`].
pub const PLATE_MESH: ArtifactHandle<PlateMesh> =
    ArtifactHandle::new(tag::PLATE_MESH, validate_plate_mesh);

/// Boundary classification plus the derived byte fields.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BoundaryField {
    /// Regime per tile, one of the [`boundary`] codes.
    pub boundary_type: Vec<u8>,
    /// Mountain-building potential, 0-255.
    pub uplift_potential: Vec<u8>,
    /// Rift/lowland potential, 0-255.
    pub rift_potential: Vec<u8>,
    /// Craton stability, 0-255; high far from boundaries.
    pub shield_stability: Vec<u8>,
}

fn validate_boundaries(field: &BoundaryField, dims: MapDimensions) -> Result<(), String> {
    let size = dims.size();
    expect_len("boundary_type", size, &field.boundary_type)?;
    expect_len("uplift_potential", size, &field.uplift_potential)?;
    expect_len("rift_potential", size, &field.rift_potential)?;
    expect_len("shield_stability", size, &field.shield_stability)
}

/// Handle for [`BoundaryField`].
pub const BOUNDARIES: ArtifactHandle<BoundaryField> =
    ArtifactHandle::new(tag::BOUNDARIES, validate_boundaries);

/// Handle for the per-tile elevation buffer, meters.
pub const ELEVATION: ArtifactHandle<Vec<i16>> =
    ArtifactHandle::new(tag::ELEVATION, |elevation, dims| {
        expect_len("elevation", dims.size(), elevation)
    });

fn validate_land_mask(mask: &[u8], dims: MapDimensions) -> Result<(), String> {
    expect_len("land_mask", dims.size(), mask)?;
    for &v in mask {
        if v > 1 {
            return Err(format!("Expected land_mask values in {{0, 1}} (received {v})."));
        }
    }
    Ok(())
}

/// Handle for the land mask (1 land, 0 water).
pub const LAND_MASK: ArtifactHandle<Vec<u8>> =
    ArtifactHandle::new(tag::LAND_MASK, |mask, dims| validate_land_mask(mask, dims));

/// Flow routing output.
#[derive(Clone, Debug, PartialEq)]
pub struct FlowField {
    /// Receiver tile index per tile, or [`FLOW_OUTLET`] / [`FLOW_SINK`].
    pub flow_dir: Vec<i32>,
    /// Accumulated drainage per tile.
    pub discharge: Vec<f32>,
    /// River class per tile, one of the [`river`] codes.
    pub river_class: Vec<u8>,
    /// 1 when the tile is a river or touches one.
    pub river_adjacency: Vec<u8>,
    /// 1 when priority-flood had to raise the tile out of a depression.
    pub basin_mask: Vec<u8>,
}

fn validate_flow(flow: &FlowField, dims: MapDimensions) -> Result<(), String> {
    let size = dims.size();
    expect_len("flow_dir", size, &flow.flow_dir)?;
    expect_len("discharge", size, &flow.discharge)?;
    expect_len("river_class", size, &flow.river_class)?;
    expect_len("river_adjacency", size, &flow.river_adjacency)?;
    expect_len("basin_mask", size, &flow.basin_mask)
}

/// Handle for [`FlowField`].
pub const FLOW: ArtifactHandle<FlowField> = ArtifactHandle::new(tag::FLOW, validate_flow);

fn validate_rainfall(rain: &[u8], dims: MapDimensions) -> Result<(), String> {
    expect_len("rainfall", dims.size(), rain)?;
    for &v in rain {
        if v > 200 {
            return Err(format!("Expected rainfall values in [0, 200] (received {v})."));
        }
    }
    Ok(())
}

/// Handle for the pre-refinement rainfall buffer.
pub const RAINFALL_BASELINE: ArtifactHandle<Vec<u8>> =
    ArtifactHandle::new(tag::RAINFALL_BASELINE, |rain, dims| validate_rainfall(rain, dims));

/// Handle for the final rainfall buffer.
pub const RAINFALL: ArtifactHandle<Vec<u8>> =
    ArtifactHandle::new(tag::RAINFALL, |rain, dims| validate_rainfall(rain, dims));

/// Handle for zonal wind strength per tile.
pub const WINDS: ArtifactHandle<Vec<i16>> =
    ArtifactHandle::new(tag::WINDS, |zonal, dims| expect_len("zonal", dims.size(), zonal));

/// Handle for zonal current strength per tile (water only).
pub const CURRENTS: ArtifactHandle<Vec<i16>> =
    ArtifactHandle::new(tag::CURRENTS, |zonal, dims| expect_len("zonal", dims.size(), zonal));

/// Continuous climate fields derived from rainfall, latitude, elevation.
#[derive(Clone, Debug, PartialEq)]
pub struct ClimateIndices {
    /// Surface temperature, Celsius.
    pub surface_temperature_c: Vec<f32>,
    /// Potential evapotranspiration, mm/year.
    pub pet: Vec<f32>,
    /// PET over precipitation; high means dry.
    pub aridity_index: Vec<f32>,
    /// 0 (never frozen) to 1 (permanently frozen).
    pub freeze_index: Vec<f32>,
}

fn validate_indices(indices: &ClimateIndices, dims: MapDimensions) -> Result<(), String> {
    let size = dims.size();
    expect_len("surface_temperature_c", size, &indices.surface_temperature_c)?;
    expect_len("pet", size, &indices.pet)?;
    expect_len("aridity_index", size, &indices.aridity_index)?;
    expect_len("freeze_index", size, &indices.freeze_index)
}

/// Handle for [`ClimateIndices`].
pub const CLIMATE_INDICES: ArtifactHandle<ClimateIndices> =
    ArtifactHandle::new(tag::CLIMATE_INDICES, validate_indices);

/// Cryosphere state after the albedo feedback iterations.
#[derive(Clone, Debug, PartialEq)]
pub struct Cryosphere {
    /// Land snow cover, 0-255.
    pub snow_cover: Vec<u8>,
    /// Sea ice cover, 0-255.
    pub sea_ice_cover: Vec<u8>,
    /// Surface albedo, 0-255.
    pub albedo: Vec<u8>,
    /// Temperature after feedback, clamped to the configured range.
    pub surface_temperature_c: Vec<f32>,
}

fn validate_cryosphere(cryo: &Cryosphere, dims: MapDimensions) -> Result<(), String> {
    let size = dims.size();
    expect_len("snow_cover", size, &cryo.snow_cover)?;
    expect_len("sea_ice_cover", size, &cryo.sea_ice_cover)?;
    expect_len("albedo", size, &cryo.albedo)?;
    expect_len("surface_temperature_c", size, &cryo.surface_temperature_c)
}

/// Handle for [`Cryosphere`].
pub const CRYOSPHERE: ArtifactHandle<Cryosphere> =
    ArtifactHandle::new(tag::CRYOSPHERE, validate_cryosphere);

/// Handle for the engine biome index per tile.
pub const BIOMES: ArtifactHandle<Vec<i32>> =
    ArtifactHandle::new(tag::BIOMES, |biomes, dims| expect_len("biomes", dims.size(), biomes));

/// Owner stamp for a tag provided by one of this crate's steps.
const fn provided_by(phase: &'static str, step_id: &'static str) -> TagOwner {
    TagOwner { pkg: "ymir_worldgen", phase, step_id }
}

/// Registers every tag the standard recipe uses.
///
/// # Errors
///
/// [`TagError`] when the inventory itself is defective; reaching that from
/// here is a bug in this module.
pub fn register_tags() -> Result<TagRegistry, TagError> {
    let mut registry = TagRegistry::new();
    registry.register_all([
        DependencyTag::artifact(tag::PLATE_MESH)
            .with_owner(provided_by("tectonics", "plate-mesh")),
        DependencyTag::artifact(tag::BOUNDARIES)
            .with_owner(provided_by("tectonics", "classify-boundaries")),
        DependencyTag::artifact(tag::ELEVATION)
            .with_owner(provided_by("morphology", "build-topography"))
            .with_demo(|| {
                let dims = MapDimensions::new(4, 4);
                (ELEVATION.validate)(&vec![0; dims.size()], dims)
            }),
        DependencyTag::artifact(tag::LAND_MASK)
            .with_owner(provided_by("morphology", "shape-coastlines"))
            .with_demo(|| {
                let dims = MapDimensions::new(4, 4);
                (LAND_MASK.validate)(&vec![0; dims.size()], dims)
            }),
        DependencyTag::artifact(tag::FLOW).with_owner(provided_by("hydrology", "route-flow")),
        DependencyTag::artifact(tag::RAINFALL_BASELINE)
            .with_owner(provided_by("climate", "climate-baseline")),
        DependencyTag::artifact(tag::RAINFALL)
            .with_owner(provided_by("climate", "climate-refine"))
            .with_demo(|| {
                let dims = MapDimensions::new(4, 4);
                (RAINFALL.validate)(&vec![0; dims.size()], dims)
            }),
        DependencyTag::artifact(tag::WINDS)
            .with_owner(provided_by("climate", "climate-baseline")),
        DependencyTag::artifact(tag::CURRENTS)
            .with_owner(provided_by("climate", "climate-baseline")),
        DependencyTag::artifact(tag::CLIMATE_INDICES)
            .with_owner(provided_by("climate", "climate-refine")),
        DependencyTag::artifact(tag::CRYOSPHERE)
            .with_owner(provided_by("climate", "cryosphere")),
        DependencyTag::artifact(tag::BIOMES)
            .with_owner(provided_by("biomes", "classify-biomes")),
        DependencyTag::field(tag::ENGINE_TERRAIN)
            .with_owner(provided_by("morphology", "shape-coastlines")),
        DependencyTag::field(tag::ENGINE_ELEVATION)
            .with_owner(provided_by("morphology", "shape-coastlines")),
        DependencyTag::field(tag::ENGINE_RAINFALL)
            .with_owner(provided_by("climate", "climate-refine")),
        DependencyTag::field(tag::ENGINE_BIOMES)
            .with_owner(provided_by("biomes", "classify-biomes")),
        DependencyTag::effect(tag::RIVERS_MODELED)
            .with_owner(provided_by("hydrology", "model-rivers")),
        DependencyTag::effect(tag::LAKES_GENERATED)
            .with_owner(provided_by("hydrology", "model-rivers")),
        DependencyTag::effect(tag::TERRAIN_VALIDATED)
            .with_owner(provided_by("morphology", "shape-coastlines")),
        DependencyTag::effect(tag::AREAS_RECALCULATED)
            .with_owner(provided_by("morphology", "shape-coastlines")),
        DependencyTag::effect(tag::FEATURES_PLACED)
            .with_owner(provided_by("features", "place-features")),
    ])?;
    Ok(registry)
}

#[cfg(test)]
mod tests {
    use ymir_core::artifact::ArtifactStore;

    use super::*;

    #[test]
    fn registry_covers_every_tag_once() {
        let registry = register_tags().unwrap();
        assert_eq!(registry.len(), 21);
        assert!(registry.validate(tag::FLOW).is_ok());
        assert!(registry.validate("artifact:unheard-of").is_err());
    }

    #[test]
    fn every_tag_names_its_providing_step() {
        let registry = register_tags().unwrap();
        let flow_owner = registry.get(tag::FLOW).and_then(|t| t.owner).unwrap();
        assert_eq!(flow_owner.step_id, "route-flow");
        assert_eq!(flow_owner.phase, "hydrology");
        let ice_owner = registry.get(tag::CRYOSPHERE).and_then(|t| t.owner).unwrap();
        assert_eq!(ice_owner.step_id, "cryosphere");
    }

    #[test]
    fn plate_mesh_validator_rejects_out_of_range_ids() {
        let dims = MapDimensions::new(2, 2);
        let mut store = ArtifactStore::new();
        let mesh = PlateMesh {
            plate_count: 2,
            site_px: vec![0.0, 1.0],
            site_py: vec![0.0, 1.0],
            motion_x: vec![0.0, 0.0],
            motion_y: vec![0.0, 0.0],
            cell_to_plate: vec![0, 1, 2, 0],
        };
        let err = PLATE_MESH.publish(&mut store, dims, mesh).unwrap_err();
        assert!(err.to_string().contains("Plate id 2 out of range"));
    }

    #[test]
    fn rainfall_validator_enforces_the_clamp_range() {
        let dims = MapDimensions::new(2, 2);
        let mut store = ArtifactStore::new();
        let err = RAINFALL.publish(&mut store, dims, vec![0, 100, 201, 5]).unwrap_err();
        assert!(err.to_string().contains("[0, 200]"));
        RAINFALL.publish(&mut store, dims, vec![0, 100, 200, 5]).unwrap();
    }

    #[test]
    fn length_mismatches_use_the_expected_received_form() {
        let dims = MapDimensions::new(4, 4);
        let mut store = ArtifactStore::new();
        let err = ELEVATION.publish(&mut store, dims, vec![0_i16; 15]).unwrap_err();
        assert!(err
            .to_string()
            .contains("Expected elevation length 16 (received 15)."));
    }
}
