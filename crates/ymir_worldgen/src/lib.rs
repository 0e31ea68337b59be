//! # YMIR Worldgen
//!
//! The domain half of the pipeline: plate tectonics, morphology, hydrology,
//! climate, cryosphere, biomes, and feature placement, wired into the
//! standard six-stage recipe.
//!
//! ## Design Principles
//!
//! 1. **Pure ops**: `(tensors, config)` in, tensors out; no hidden state
//! 2. **Deterministic**: seed + label keyed RNG streams, never a global
//! 3. **Clamped, never erroring**: numeric fields saturate to their ranges
//! 4. **Engine behind the adapter**: every host write goes through
//!    [`ymir_adapter::EngineAdapter`]
//!
//! ## Example
//!
//! ```rust,ignore
//! use ymir_worldgen::{generate, GenerationOptions};
//!
//! let mut options = GenerationOptions::new(42);
//! options.config = ymir_worldgen::config_from_toml(&config_text)?;
//! let output = generate(&mut adapter, &options)?;
//! println!("{:?}", output.report.step_ids());
//! ```

#![deny(missing_docs)]
#![deny(unsafe_code)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![deny(clippy::perf)]

pub mod artifacts;
pub mod biomes;
mod cfg;
pub mod climate;
pub mod cryosphere;
mod engine;
pub mod error;
pub mod features;
pub mod hydrology;
pub mod mesh;
pub mod morphology;
pub mod noise;
pub mod recipe;
pub mod tectonics;

pub use artifacts::{
    register_tags, BoundaryField, ClimateIndices, Cryosphere, FlowField, PlateMesh,
};
pub use biomes::ClassifyBiomesStep;
pub use climate::{ClimateBaselineStep, ClimateRefineStep};
pub use cryosphere::CryosphereStep;
pub use error::{GenerationError, GenerationResult};
pub use features::PlaceFeaturesStep;
pub use hydrology::{ModelRiversStep, RouteFlowStep};
pub use mesh::PlateMeshStep;
pub use morphology::{BuildTopographyStep, ShapeCoastlinesStep};
pub use recipe::{
    config_from_toml, generate, standard_recipe, Dryness, GenerationOptions, GenerationOutput,
    Knobs, Temperature,
};
pub use tectonics::ClassifyBoundariesStep;
