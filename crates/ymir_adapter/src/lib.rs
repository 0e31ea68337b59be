//! # YMIR Engine Adapter
//!
//! The boundary between the generation pipeline and whatever host engine
//! ultimately renders the map.
//!
//! ## Design Principles
//!
//! 1. **Narrow**: deterministic tile queries, seeded randomness, mutators.
//!    Nothing else crosses the boundary.
//! 2. **Swappable**: the pipeline depends only on [`EngineAdapter`]; tests
//!    run against [`MockAdapter`] with no host engine present.
//! 3. **Deterministic**: `get_random_number` is keyed by a caller-supplied
//!    label so identical call sequences replay identically.

#![deny(missing_docs)]
#![deny(unsafe_code)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]

pub mod mock;

pub use mock::{MockAdapter, MockAdapterConfig};

/// Grid dimensions of the map under generation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct MapDimensions {
    /// Columns in the grid.
    pub width: u32,
    /// Rows in the grid.
    pub height: u32,
}

impl MapDimensions {
    /// Creates dimensions from a width and height.
    #[inline]
    #[must_use]
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Total tile count (`width * height`).
    #[inline]
    #[must_use]
    pub const fn size(self) -> usize {
        (self.width as usize) * (self.height as usize)
    }

    /// Map area used by area-scaled tuning (same quantity as [`Self::size`],
    /// as a float).
    #[inline]
    #[must_use]
    pub fn area(self) -> f64 {
        f64::from(self.width) * f64::from(self.height)
    }
}

/// Latitude extent of the map, in degrees; rows interpolate between the two.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct LatitudeBounds {
    /// Latitude of the top row (north edge).
    pub top_deg: f64,
    /// Latitude of the bottom row (south edge).
    pub bottom_deg: f64,
}

impl LatitudeBounds {
    /// Symmetric bounds `[-deg, +deg]`.
    #[inline]
    #[must_use]
    pub fn symmetric(deg: f64) -> Self {
        Self { top_deg: deg, bottom_deg: -deg }
    }

    /// Latitude at a row center, linear between bottom and top.
    #[must_use]
    pub fn latitude_for_row(&self, y: u32, height: u32) -> f64 {
        if height == 0 {
            return 0.0;
        }
        let t = (f64::from(y) + 0.5) / f64::from(height);
        // Row 0 is the top of the grid.
        self.top_deg + (self.bottom_deg - self.top_deg) * t
    }
}

/// Feature placement request handed to the host engine.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FeaturePlacement {
    /// Engine feature index.
    pub feature: i32,
    /// Facing direction, `-1` when the feature has none.
    pub direction: i32,
}

impl FeaturePlacement {
    /// A directionless placement of `feature`.
    #[inline]
    #[must_use]
    pub const fn of(feature: i32) -> Self {
        Self { feature, direction: -1 }
    }
}

/// Sentinel for "no feature on this tile".
pub const NO_FEATURE: i32 = -1;

/// Sentinel for "no biome assigned".
pub const NO_BIOME: i32 = -1;

/// The narrow surface the pipeline consumes.
///
/// Queries must be deterministic for a fixed adapter state; the seeded
/// `get_random_number` must replay identically for identical label call
/// sequences. Mutators may update derived adapter state (area tallies,
/// water flags) but must never consult outside randomness.
pub trait EngineAdapter {
    /// Grid dimensions.
    fn dimensions(&self) -> MapDimensions;

    /// True when the tile is water (ocean or coast).
    fn is_water(&self, x: i32, y: i32) -> bool;

    /// Tile elevation in meters.
    fn get_elevation(&self, x: i32, y: i32) -> i32;

    /// Engine terrain index of the tile.
    fn get_terrain_type(&self, x: i32, y: i32) -> i32;

    /// Engine feature index of the tile, [`NO_FEATURE`] when empty.
    fn get_feature_type(&self, x: i32, y: i32) -> i32;

    /// Engine biome index of the tile, [`NO_BIOME`] when unassigned.
    fn get_biome_type(&self, x: i32, y: i32) -> i32;

    /// Engine rainfall of the tile (0-200 scale).
    fn get_rainfall(&self, x: i32, y: i32) -> i32;

    /// Latitude of the tile in degrees.
    fn get_latitude(&self, x: i32, y: i32) -> f64;

    /// Seeded random draw in `[0, max)`. Keyed by `label`: the n-th draw for
    /// a given label is the same in every run with the same seed.
    fn get_random_number(&mut self, max: u32, label: &str) -> u32;

    /// Resolves an engine terrain index by name (`"TERRAIN_MOUNTAIN"`).
    fn terrain_id(&self, name: &str) -> Option<i32>;

    /// Resolves an engine biome index by name (`"BIOME_TUNDRA"`).
    fn biome_id(&self, name: &str) -> Option<i32>;

    /// Resolves an engine feature index by name (`"FEATURE_REEF"`).
    fn feature_id(&self, name: &str) -> Option<i32>;

    /// True when the engine would accept `feature` on this tile.
    fn can_have_feature(&self, x: i32, y: i32, feature: i32) -> bool;

    /// Writes the terrain index of a tile.
    fn set_terrain_type(&mut self, x: i32, y: i32, terrain: i32);

    /// Writes the elevation of a tile, in meters.
    fn set_elevation(&mut self, x: i32, y: i32, elevation: i32);

    /// Writes the engine rainfall of a tile.
    fn set_rainfall(&mut self, x: i32, y: i32, rainfall: i32);

    /// Writes the biome index of a tile.
    fn set_biome_type(&mut self, x: i32, y: i32, biome: i32);

    /// Places a feature on a tile.
    fn add_features(&mut self, x: i32, y: i32, placement: FeaturePlacement);

    /// Asks the engine to carve its river network from current terrain.
    fn model_rivers(&mut self);

    /// Asks the engine to fill plausible lake depressions.
    fn generate_lakes(&mut self, chance_percent: u32);

    /// Recomputes engine-side area bookkeeping (landmass/water tallies).
    fn recalculate_areas(&mut self);

    /// Engine-side terrain sanity pass (e.g. ocean touching land becomes
    /// coast).
    fn validate_and_fix_terrain(&mut self);
}
