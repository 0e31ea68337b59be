//! # Pipeline Error Types
//!
//! Two regimes, kept deliberately separate:
//!
//! - **Compile-time** problems are aggregated: [`RecipeCompileError`] carries
//!   every issue found in one pass so a user fixes their config once, not
//!   once per error.
//! - **Runtime** problems are fatal: a wrong buffer length, an unsatisfied
//!   dependency tag, or a step failure aborts the run immediately. They
//!   indicate wiring defects, not recoverable conditions.

use std::fmt;

use thiserror::Error;

/// Machine-readable category of a single compile issue.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum CompileIssueCode {
    /// A config value failed schema validation (bad type, unknown key,
    /// out-of-range value, unknown strategy).
    ConfigInvalid,
    /// A stage's compile hook produced a step id the stage never declared.
    UnknownStepId,
    /// A step requires a dependency tag that nothing earlier provides.
    MissingDependency,
}

impl CompileIssueCode {
    /// Stable string form used in tooling and tests.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::ConfigInvalid => "config.invalid",
            Self::UnknownStepId => "stage.unknown-step-id",
            Self::MissingDependency => "step.missing-dependency",
        }
    }
}

impl fmt::Display for CompileIssueCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One problem found while compiling a recipe config.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CompileIssue {
    /// Issue category.
    pub code: CompileIssueCode,
    /// Config path, e.g. `/config/climate/rainfall/blend`.
    pub path: String,
    /// Human-readable description.
    pub message: String,
}

impl CompileIssue {
    /// Builds an issue from its parts.
    #[must_use]
    pub fn new(
        code: CompileIssueCode,
        path: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self { code, path: path.into(), message: message.into() }
    }
}

impl fmt::Display for CompileIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} at {}: {}", self.code, self.path, self.message)
    }
}

/// Aggregate of every problem found while compiling a recipe config.
///
/// Compilation never stops at the first issue; tests and tooling can assert
/// on several simultaneous problems.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
#[error("recipe config rejected ({} issues)", issues.len())]
pub struct RecipeCompileError {
    /// Every issue found, in config walk order.
    pub issues: Vec<CompileIssue>,
}

impl RecipeCompileError {
    /// Wraps a non-empty issue list.
    #[must_use]
    pub fn new(issues: Vec<CompileIssue>) -> Self {
        Self { issues }
    }

    /// Multi-line listing, one issue per line.
    #[must_use]
    pub fn render(&self) -> String {
        let mut out = String::new();
        for issue in &self.issues {
            out.push_str(&issue.to_string());
            out.push('\n');
        }
        out
    }
}

/// Errors raised while constructing op and step contracts.
///
/// These fire at recipe assembly, before any config is seen; they are
/// programming defects in the recipe definition itself.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ContractError {
    /// Every op contract must carry a `default` strategy.
    #[error("op '{op}' defines no 'default' strategy")]
    MissingDefaultStrategy {
        /// The offending op id.
        op: String,
    },

    /// Step ids are kebab-case: `^[a-z0-9]+(-[a-z0-9]+)*$`.
    #[error("step id '{id}' is not kebab-case")]
    InvalidStepId {
        /// The offending id.
        id: String,
    },

    /// An op envelope key collides with a hand-authored schema key.
    #[error("step '{step}' already defines schema key '{key}'")]
    SchemaKeyCollision {
        /// The step whose schema was being extended.
        step: String,
        /// The colliding key.
        key: String,
    },
}

/// Errors raised by the dependency tag registry.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TagError {
    /// A tag id was registered twice.
    #[error("dependency tag '{id}' registered twice")]
    Duplicate {
        /// The duplicated id.
        id: String,
    },

    /// A tag id does not start with its kind's prefix.
    #[error("dependency tag '{id}' must start with '{expected_prefix}'")]
    KindMismatch {
        /// The offending id.
        id: String,
        /// Prefix required by the tag's declared kind.
        expected_prefix: &'static str,
    },

    /// A tag id was referenced but never registered.
    #[error("unknown dependency tag '{id}'")]
    Unknown {
        /// The unregistered id.
        id: String,
    },

    /// A tag's demo payload failed its own validator at registration.
    #[error("dependency tag '{id}' demo payload rejected: {message}")]
    RejectedDemo {
        /// The offending id.
        id: String,
        /// Validator message.
        message: String,
    },
}

/// Errors raised by the artifact store.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ArtifactError {
    /// Read of an artifact that was never published.
    #[error("artifact '{tag}' was never published")]
    Missing {
        /// The artifact tag.
        tag: String,
    },

    /// A published value failed its validator.
    #[error("artifact '{tag}' rejected: {message}")]
    Rejected {
        /// The artifact tag.
        tag: String,
        /// Validator message, e.g. `Expected elevation length 432 (received 431).`
        message: String,
    },

    /// A stored value was read back as the wrong type.
    #[error("artifact '{tag}' holds a different type than requested")]
    TypeMismatch {
        /// The artifact tag.
        tag: String,
    },
}

/// Fatal errors raised while executing a compiled recipe.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ExecuteError {
    /// A step was reached before one of its required tags was satisfied.
    #[error("step '{step}' requires '{tag}' which is not satisfied (satisfied: {satisfied:?})")]
    MissingDependency {
        /// The step that was about to run.
        step: String,
        /// The unsatisfied tag.
        tag: String,
        /// Sorted ids of every tag satisfied so far.
        satisfied: Vec<String>,
    },

    /// A step finished without actually providing a tag it declared.
    #[error("step '{step}' declared '{tag}' but never published it")]
    UnsatisfiedProvides {
        /// The step that just ran.
        step: String,
        /// The unpublished tag.
        tag: String,
    },

    /// A step's normalize hook produced a config its own schema rejects.
    #[error("step '{step}' normalized its config into an invalid shape: {message}")]
    NormalizedConfigInvalid {
        /// The offending step.
        step: String,
        /// First schema violation found.
        message: String,
    },

    /// An artifact store failure inside a step.
    #[error(transparent)]
    Artifact(#[from] ArtifactError),

    /// A tag registry failure inside a step.
    #[error(transparent)]
    Tag(#[from] TagError),

    /// A step failed for a domain-specific reason.
    #[error("step '{step}' failed: {message}")]
    Step {
        /// The failing step.
        step: String,
        /// What went wrong.
        message: String,
    },
}
