//! Engine id lookups with step-attributed errors.

use ymir_adapter::EngineAdapter;
use ymir_core::error::ExecuteError;

fn missing(step: &str, kind: &str, name: &str) -> ExecuteError {
    ExecuteError::Step {
        step: step.to_owned(),
        message: format!("engine has no {kind} named '{name}'"),
    }
}

pub(crate) fn terrain_id(
    adapter: &dyn EngineAdapter,
    step: &str,
    name: &str,
) -> Result<i32, ExecuteError> {
    adapter.terrain_id(name).ok_or_else(|| missing(step, "terrain", name))
}

pub(crate) fn biome_id(
    adapter: &dyn EngineAdapter,
    step: &str,
    name: &str,
) -> Result<i32, ExecuteError> {
    adapter.biome_id(name).ok_or_else(|| missing(step, "biome", name))
}

pub(crate) fn feature_id(
    adapter: &dyn EngineAdapter,
    step: &str,
    name: &str,
) -> Result<i32, ExecuteError> {
    adapter.feature_id(name).ok_or_else(|| missing(step, "feature", name))
}
