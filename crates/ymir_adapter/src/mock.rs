//! # Mock Adapter
//!
//! Test implementation with configurable behavior and no host engine.
//!
//! Every query reads plain in-memory grids; every mutator writes them.
//! Randomness is label-seeded so a test that replays the same labels gets
//! the same answers, run after run.

use std::collections::HashMap;

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

use crate::{
    EngineAdapter, FeaturePlacement, LatitudeBounds, MapDimensions, NO_BIOME, NO_FEATURE,
};

/// Engine terrain indices used by the mock.
pub mod terrain {
    /// Impassable mountain.
    pub const MOUNTAIN: i32 = 0;
    /// Rough hill.
    pub const HILL: i32 = 1;
    /// Open flat land.
    pub const FLAT: i32 = 2;
    /// Shallow coastal water.
    pub const COAST: i32 = 3;
    /// Deep ocean.
    pub const OCEAN: i32 = 4;
    /// Navigable river tile.
    pub const NAVIGABLE_RIVER: i32 = 5;
}

/// Engine biome indices used by the mock.
pub mod biome {
    /// Cold tundra.
    pub const TUNDRA: i32 = 0;
    /// Temperate grassland.
    pub const GRASSLAND: i32 = 1;
    /// Dry plains.
    pub const PLAINS: i32 = 2;
    /// Tropical belt.
    pub const TROPICAL: i32 = 3;
    /// Desert.
    pub const DESERT: i32 = 4;
    /// Open water.
    pub const MARINE: i32 = 5;
    /// Permanent snow and ice sheet.
    pub const SNOW: i32 = 6;
}

/// Engine feature indices used by the mock.
pub mod feature {
    /// Broadleaf forest.
    pub const FOREST: i32 = 0;
    /// Tropical rainforest.
    pub const RAINFOREST: i32 = 1;
    /// Boreal taiga.
    pub const TAIGA: i32 = 2;
    /// Wetland marsh.
    pub const MARSH: i32 = 3;
    /// Desert oasis.
    pub const OASIS: i32 = 4;
    /// Savanna woodland.
    pub const SAVANNA_WOODLAND: i32 = 5;
    /// Sagebrush steppe.
    pub const SAGEBRUSH_STEPPE: i32 = 6;
    /// Warm-water reef.
    pub const REEF: i32 = 7;
    /// Cold-water reef.
    pub const COLD_REEF: i32 = 8;
    /// Sea ice.
    pub const ICE: i32 = 9;
    /// Atoll ring.
    pub const ATOLL: i32 = 10;
    /// Volcano cone.
    pub const VOLCANO: i32 = 11;
}

const TERRAIN_NAMES: [(&str, i32); 6] = [
    ("TERRAIN_MOUNTAIN", terrain::MOUNTAIN),
    ("TERRAIN_HILL", terrain::HILL),
    ("TERRAIN_FLAT", terrain::FLAT),
    ("TERRAIN_COAST", terrain::COAST),
    ("TERRAIN_OCEAN", terrain::OCEAN),
    ("TERRAIN_NAVIGABLE_RIVER", terrain::NAVIGABLE_RIVER),
];

const BIOME_NAMES: [(&str, i32); 7] = [
    ("BIOME_TUNDRA", biome::TUNDRA),
    ("BIOME_GRASSLAND", biome::GRASSLAND),
    ("BIOME_PLAINS", biome::PLAINS),
    ("BIOME_TROPICAL", biome::TROPICAL),
    ("BIOME_DESERT", biome::DESERT),
    ("BIOME_MARINE", biome::MARINE),
    ("BIOME_SNOW", biome::SNOW),
];

const FEATURE_NAMES: [(&str, i32); 12] = [
    ("FEATURE_FOREST", feature::FOREST),
    ("FEATURE_RAINFOREST", feature::RAINFOREST),
    ("FEATURE_TAIGA", feature::TAIGA),
    ("FEATURE_MARSH", feature::MARSH),
    ("FEATURE_OASIS", feature::OASIS),
    ("FEATURE_SAVANNA_WOODLAND", feature::SAVANNA_WOODLAND),
    ("FEATURE_SAGEBRUSH_STEPPE", feature::SAGEBRUSH_STEPPE),
    ("FEATURE_REEF", feature::REEF),
    ("FEATURE_COLD_REEF", feature::COLD_REEF),
    ("FEATURE_ICE", feature::ICE),
    ("FEATURE_ATOLL", feature::ATOLL),
    ("FEATURE_VOLCANO", feature::VOLCANO),
];

/// Features the mock only accepts on water tiles.
pub const WATER_FEATURES: [i32; 4] =
    [feature::REEF, feature::COLD_REEF, feature::ICE, feature::ATOLL];

/// Configuration options for [`MockAdapter`].
#[derive(Clone, Copy, Debug)]
pub struct MockAdapterConfig {
    /// Grid dimensions.
    pub dims: MapDimensions,
    /// Latitude extent mapped across rows.
    pub latitude: LatitudeBounds,
    /// Seed for label-keyed randomness.
    pub seed: u64,
    /// Terrain index every tile starts with.
    pub default_terrain: i32,
    /// Elevation every tile starts with.
    pub default_elevation: i32,
    /// Engine rainfall every tile starts with.
    pub default_rainfall: i32,
}

impl MockAdapterConfig {
    /// An all-ocean map of the given size, the usual starting state.
    #[must_use]
    pub fn ocean(width: u32, height: u32, seed: u64) -> Self {
        Self {
            dims: MapDimensions::new(width, height),
            latitude: LatitudeBounds::symmetric(60.0),
            seed,
            default_terrain: terrain::OCEAN,
            default_elevation: 0,
            default_rainfall: 0,
        }
    }
}

/// Deterministic in-memory [`EngineAdapter`] double.
pub struct MockAdapter {
    dims: MapDimensions,
    latitude: LatitudeBounds,
    seed: u64,
    terrain: Vec<i32>,
    elevation: Vec<i32>,
    rainfall: Vec<i32>,
    biome: Vec<i32>,
    feature: Vec<i32>,
    streams: HashMap<String, ChaCha8Rng>,
    /// How many times `model_rivers` ran.
    pub model_rivers_calls: u32,
    /// How many times `generate_lakes` ran.
    pub generate_lakes_calls: u32,
    /// How many times `recalculate_areas` ran.
    pub recalculate_areas_calls: u32,
    /// Land tiles counted by the last `recalculate_areas`.
    pub land_tiles: u32,
    /// Water tiles counted by the last `recalculate_areas`.
    pub water_tiles: u32,
}

impl MockAdapter {
    /// Builds a mock from a config.
    #[must_use]
    pub fn new(config: MockAdapterConfig) -> Self {
        let size = config.dims.size();
        Self {
            dims: config.dims,
            latitude: config.latitude,
            seed: config.seed,
            terrain: vec![config.default_terrain; size],
            elevation: vec![config.default_elevation; size],
            rainfall: vec![config.default_rainfall; size],
            biome: vec![NO_BIOME; size],
            feature: vec![NO_FEATURE; size],
            streams: HashMap::new(),
            model_rivers_calls: 0,
            generate_lakes_calls: 0,
            recalculate_areas_calls: 0,
            land_tiles: 0,
            water_tiles: 0,
        }
    }

    fn index(&self, x: i32, y: i32) -> usize {
        debug_assert!(self.in_bounds(x, y), "tile ({x}, {y}) out of bounds");
        (y as usize) * (self.dims.width as usize) + (x as usize)
    }

    fn in_bounds(&self, x: i32, y: i32) -> bool {
        x >= 0
            && y >= 0
            && (x as u32) < self.dims.width
            && (y as u32) < self.dims.height
    }

    fn stream_seed(seed: u64, label: &str) -> u64 {
        // FNV-1a over the label bytes, folded into the run seed.
        let mut hash = 0xcbf2_9ce4_8422_2325_u64 ^ seed;
        for byte in label.bytes() {
            hash ^= u64::from(byte);
            hash = hash.wrapping_mul(0x0000_0100_0000_01b3);
        }
        hash ^= hash >> 32;
        hash.wrapping_mul(0x517c_c1b7_2722_0a95)
    }
}

impl EngineAdapter for MockAdapter {
    fn dimensions(&self) -> MapDimensions {
        self.dims
    }

    fn is_water(&self, x: i32, y: i32) -> bool {
        let t = self.terrain[self.index(x, y)];
        t == terrain::COAST || t == terrain::OCEAN
    }

    fn get_elevation(&self, x: i32, y: i32) -> i32 {
        self.elevation[self.index(x, y)]
    }

    fn get_terrain_type(&self, x: i32, y: i32) -> i32 {
        self.terrain[self.index(x, y)]
    }

    fn get_feature_type(&self, x: i32, y: i32) -> i32 {
        self.feature[self.index(x, y)]
    }

    fn get_biome_type(&self, x: i32, y: i32) -> i32 {
        self.biome[self.index(x, y)]
    }

    fn get_rainfall(&self, x: i32, y: i32) -> i32 {
        self.rainfall[self.index(x, y)]
    }

    fn get_latitude(&self, _x: i32, y: i32) -> f64 {
        self.latitude.latitude_for_row(y.max(0) as u32, self.dims.height)
    }

    fn get_random_number(&mut self, max: u32, label: &str) -> u32 {
        if max <= 1 {
            return 0;
        }
        let seed = self.seed;
        let stream = self
            .streams
            .entry(label.to_owned())
            .or_insert_with(|| ChaCha8Rng::seed_from_u64(Self::stream_seed(seed, label)));
        stream.gen_range(0..max)
    }

    fn terrain_id(&self, name: &str) -> Option<i32> {
        TERRAIN_NAMES.iter().find(|(n, _)| *n == name).map(|(_, id)| *id)
    }

    fn biome_id(&self, name: &str) -> Option<i32> {
        BIOME_NAMES.iter().find(|(n, _)| *n == name).map(|(_, id)| *id)
    }

    fn feature_id(&self, name: &str) -> Option<i32> {
        FEATURE_NAMES.iter().find(|(n, _)| *n == name).map(|(_, id)| *id)
    }

    fn can_have_feature(&self, x: i32, y: i32, feature_index: i32) -> bool {
        if !self.in_bounds(x, y) {
            return false;
        }
        let wants_water = WATER_FEATURES.contains(&feature_index);
        wants_water == self.is_water(x, y)
    }

    fn set_terrain_type(&mut self, x: i32, y: i32, terrain: i32) {
        let i = self.index(x, y);
        self.terrain[i] = terrain;
    }

    fn set_elevation(&mut self, x: i32, y: i32, elevation: i32) {
        let i = self.index(x, y);
        self.elevation[i] = elevation;
    }

    fn set_rainfall(&mut self, x: i32, y: i32, rainfall: i32) {
        let i = self.index(x, y);
        self.rainfall[i] = rainfall.clamp(0, 200);
    }

    fn set_biome_type(&mut self, x: i32, y: i32, biome: i32) {
        let i = self.index(x, y);
        self.biome[i] = biome;
    }

    fn add_features(&mut self, x: i32, y: i32, placement: FeaturePlacement) {
        let i = self.index(x, y);
        self.feature[i] = placement.feature;
    }

    fn model_rivers(&mut self) {
        self.model_rivers_calls += 1;
    }

    fn generate_lakes(&mut self, _chance_percent: u32) {
        self.generate_lakes_calls += 1;
    }

    fn recalculate_areas(&mut self) {
        self.recalculate_areas_calls += 1;
        let mut land = 0;
        let mut water = 0;
        for &t in &self.terrain {
            if t == terrain::COAST || t == terrain::OCEAN {
                water += 1;
            } else {
                land += 1;
            }
        }
        self.land_tiles = land;
        self.water_tiles = water;
    }

    fn validate_and_fix_terrain(&mut self) {
        // Ocean touching land shallows out into coast.
        let width = self.dims.width as i32;
        let height = self.dims.height as i32;
        let mut to_coast = Vec::new();
        for y in 0..height {
            for x in 0..width {
                if self.terrain[self.index(x, y)] != terrain::OCEAN {
                    continue;
                }
                'scan: for dy in -1..=1 {
                    for dx in -1..=1 {
                        if dx == 0 && dy == 0 {
                            continue;
                        }
                        let (nx, ny) = (x + dx, y + dy);
                        if self.in_bounds(nx, ny) && !self.is_water(nx, ny) {
                            to_coast.push(self.index(x, y));
                            break 'scan;
                        }
                    }
                }
            }
        }
        for i in to_coast {
            self.terrain[i] = terrain::COAST;
        }
    }
}
