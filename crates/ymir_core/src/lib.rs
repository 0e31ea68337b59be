//! # YMIR Core
//!
//! The pipeline engine behind deterministic map generation: contracts,
//! dependency tags, artifacts, the recipe compiler, and the executor.
//!
//! ## Design Principles
//!
//! 1. **Deterministic**: Same seed always produces the same map
//! 2. **Fail slow at compile time**: every config problem in one report
//! 3. **Fail fast at runtime**: the first invariant violation aborts the run
//! 4. **No domain knowledge**: ops and recipes live in `ymir_worldgen`
//!
//! ## Core Components
//!
//! - `Schema` / `OpContract` / `StepContract`: closed config shapes with
//!   typed defaults and op envelopes
//! - `TagRegistry`: `artifact:` / `field:` / `effect:` dependency tags
//! - `ArtifactStore`: typed, length-validated buffers
//! - `compile_recipe`: nested user config to ordered per-step configs
//! - `execute`: one topological pass over a `MapContext`
//!
//! ## Example
//!
//! ```rust,ignore
//! use ymir_core::{compile_recipe, execute, MapContext, TraceSink, WorldSeed};
//!
//! let recipe = my_recipe()?;
//! let compiled = compile_recipe(&recipe, &user_config)?;
//!
//! let mut ctx = MapContext::new(&mut adapter, latitude, WorldSeed::new(42), TraceSink::disabled());
//! let report = execute(&compiled, &mut ctx, &knobs)?;
//! assert_eq!(report.step_ids().len(), recipe.step_count());
//! ```

#![deny(missing_docs)]
#![deny(unsafe_code)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![deny(clippy::perf)]

pub mod artifact;
pub mod compile;
pub mod context;
pub mod contract;
pub mod error;
pub mod execute;
pub mod grid;
pub mod rng;
pub mod schema;
pub mod step;
pub mod tags;
pub mod trace;

pub use artifact::{expect_len, ArtifactHandle, ArtifactStore, ValidateFn};
pub use compile::{compile_recipe, CompiledRecipe, CompiledStep};
pub use context::{MapContext, MapEnv};
pub use contract::{is_kebab_case, OpContract, StepContract};
pub use error::{
    ArtifactError, CompileIssue, CompileIssueCode, ContractError, ExecuteError,
    RecipeCompileError, TagError,
};
pub use execute::{execute, RunReport, StepRunRecord};
pub use grid::HexGrid;
pub use rng::WorldSeed;
pub use schema::{EnvelopeSchema, ObjectSchema, Schema, DEFAULT_STRATEGY};
pub use step::{Recipe, Stage, StageCompileFn, Step};
pub use tags::{DependencyTag, SatisfiedTags, SatisfiesFn, TagKind, TagRegistry};
pub use trace::{Segment, TraceEvent, TraceSink};
