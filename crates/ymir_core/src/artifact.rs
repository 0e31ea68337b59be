//! # Artifact Store
//!
//! Published buffers live here, keyed by their `artifact:` tag id. Handles
//! pair a tag with a validator; `publish` runs the validator before storing,
//! `read` fails loudly when nothing was published. Downstream ops index
//! these buffers unchecked, so a wrong length is a fatal wiring defect, not
//! a warning.

use std::any::Any;
use std::fmt;

use indexmap::IndexMap;
use ymir_adapter::MapDimensions;

use crate::error::ArtifactError;

/// Validator run on every publish; returns a message on rejection.
pub type ValidateFn<T> = fn(&T, MapDimensions) -> Result<(), String>;

/// Length assertion used by buffer validators.
///
/// # Errors
///
/// `Expected {label} length {expected} (received {actual}).` on mismatch.
pub fn expect_len<T>(label: &str, expected: usize, actual: &[T]) -> Result<(), String> {
    if actual.len() == expected {
        Ok(())
    } else {
        Err(format!(
            "Expected {label} length {expected} (received {}).",
            actual.len()
        ))
    }
}

/// Owns every published buffer for one run.
///
/// Single writer via [`ArtifactHandle::publish`], many readers via
/// [`ArtifactHandle::read`]; sequential step execution is what makes that
/// safe, not locking.
#[derive(Default)]
pub struct ArtifactStore {
    values: IndexMap<String, Box<dyn Any>>,
}

impl ArtifactStore {
    /// Empty store.
    #[must_use]
    pub fn new() -> Self {
        Self { values: IndexMap::new() }
    }

    /// Stores a value under a tag, replacing any previous value.
    pub fn set<T: 'static>(&mut self, tag: &str, value: T) {
        self.values.insert(tag.to_owned(), Box::new(value));
    }

    /// Reads a value back by tag.
    ///
    /// # Errors
    ///
    /// [`ArtifactError::Missing`] when nothing was stored,
    /// [`ArtifactError::TypeMismatch`] when the stored value is not a `T`.
    pub fn get<T: 'static>(&self, tag: &str) -> Result<&T, ArtifactError> {
        let boxed = self
            .values
            .get(tag)
            .ok_or_else(|| ArtifactError::Missing { tag: tag.to_owned() })?;
        boxed
            .downcast_ref::<T>()
            .ok_or_else(|| ArtifactError::TypeMismatch { tag: tag.to_owned() })
    }

    /// True when something was published under `tag`.
    #[must_use]
    pub fn contains(&self, tag: &str) -> bool {
        self.values.contains_key(tag)
    }

    /// Tags currently in the store, in publish order.
    pub fn tags(&self) -> impl Iterator<Item = &str> {
        self.values.keys().map(String::as_str)
    }

    /// Number of stored artifacts.
    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// True when nothing has been published.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl fmt::Debug for ArtifactStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.values.keys()).finish()
    }
}

/// A typed artifact declaration: tag id plus validator.
///
/// Declared `const` next to the buffer type it stores, so publishers and
/// readers share one definition.
pub struct ArtifactHandle<T: 'static> {
    /// The `artifact:` tag this handle stores under.
    pub tag: &'static str,
    /// Validator run on every publish.
    pub validate: ValidateFn<T>,
}

impl<T: 'static> ArtifactHandle<T> {
    /// Pairs a tag with its validator.
    #[must_use]
    pub const fn new(tag: &'static str, validate: ValidateFn<T>) -> Self {
        Self { tag, validate }
    }

    /// Validates `value` against the run's dimensions, then stores it.
    ///
    /// # Errors
    ///
    /// [`ArtifactError::Rejected`] with the validator's message.
    pub fn publish(
        &self,
        store: &mut ArtifactStore,
        dims: MapDimensions,
        value: T,
    ) -> Result<(), ArtifactError> {
        (self.validate)(&value, dims).map_err(|message| ArtifactError::Rejected {
            tag: self.tag.to_owned(),
            message,
        })?;
        store.set(self.tag, value);
        Ok(())
    }

    /// Borrows the published value.
    ///
    /// # Errors
    ///
    /// [`ArtifactError::Missing`] when this handle never published.
    pub fn read<'s>(&self, store: &'s ArtifactStore) -> Result<&'s T, ArtifactError> {
        store.get(self.tag)
    }
}

impl<T: 'static> Clone for ArtifactHandle<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T: 'static> Copy for ArtifactHandle<T> {}

impl<T: 'static> fmt::Debug for ArtifactHandle<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ArtifactHandle").field("tag", &self.tag).finish()
    }
}
