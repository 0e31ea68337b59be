//! # Generation Error Types
//!
//! Everything that can stop a generation run, from recipe assembly through
//! execution.

use thiserror::Error;
use ymir_core::error::{ContractError, ExecuteError, RecipeCompileError, TagError};

/// Errors from assembling, compiling, or running the standard recipe.
#[derive(Error, Debug)]
pub enum GenerationError {
    /// A defect in the recipe definition itself.
    #[error(transparent)]
    Contract(#[from] ContractError),

    /// A defect in the dependency tag wiring.
    #[error(transparent)]
    Tag(#[from] TagError),

    /// The user config was rejected; every issue is inside.
    #[error(transparent)]
    Compile(#[from] RecipeCompileError),

    /// The run aborted on an invariant violation.
    #[error(transparent)]
    Execute(#[from] ExecuteError),

    /// A TOML config file could not be parsed.
    #[error("config file rejected: {0}")]
    ConfigFormat(#[from] toml::de::Error),

    /// A config or knob value could not be converted to the dynamic form.
    #[error("config conversion failed: {0}")]
    ConfigValue(#[from] serde_json::Error),
}

/// Result type for generation operations.
pub type GenerationResult<T> = Result<T, GenerationError>;
