//! # Dependency Tag Registry
//!
//! Tags are typed identifiers (`artifact:`, `field:`, `effect:`) that
//! express what a step consumes and produces. The registry catches wiring
//! defects at registration time; the satisfied-set tracks what has actually
//! been produced during one run.
//!
//! The satisfied-set starts empty every run. Nothing is implicitly
//! available.

use std::collections::BTreeSet;

use indexmap::IndexMap;

use crate::context::MapContext;
use crate::error::TagError;

/// What a dependency tag refers to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TagKind {
    /// A buffer in the artifact store.
    Artifact,
    /// A per-tile field maintained by the engine adapter.
    Field,
    /// A side effect with no stored value (rivers modeled, areas rebuilt).
    Effect,
}

impl TagKind {
    /// Id prefix required for tags of this kind.
    #[must_use]
    pub const fn prefix(self) -> &'static str {
        match self {
            Self::Artifact => "artifact:",
            Self::Field => "field:",
            Self::Effect => "effect:",
        }
    }
}

/// Extra satisfaction predicate consulted after a tag has been provided.
pub type SatisfiesFn = for<'ctx, 'run> fn(&'ctx MapContext<'run>) -> bool;

/// Self-check run at registration: builds a demo payload and validates it.
pub type DemoFn = fn() -> Result<(), String>;

/// Where a tag normally comes from. Diagnostics only.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TagOwner {
    /// Declaring package or crate.
    pub pkg: &'static str,
    /// Pipeline phase of the providing step.
    pub phase: &'static str,
    /// The step that provides the tag.
    pub step_id: &'static str,
}

/// A typed dependency identifier.
#[derive(Clone, Copy, Debug)]
pub struct DependencyTag {
    /// Unique id; must start with the kind's prefix.
    pub id: &'static str,
    /// What the id refers to.
    pub kind: TagKind,
    /// Provenance surfaced in compile diagnostics.
    pub owner: Option<TagOwner>,
    /// Optional predicate; when present the tag is satisfied only if it has
    /// been provided AND the predicate holds.
    pub satisfies: Option<SatisfiesFn>,
    /// Optional demo payload check, run once when the tag is registered.
    pub demo: Option<DemoFn>,
}

impl DependencyTag {
    /// An `artifact:` tag.
    #[must_use]
    pub const fn artifact(id: &'static str) -> Self {
        Self { id, kind: TagKind::Artifact, owner: None, satisfies: None, demo: None }
    }

    /// A `field:` tag.
    #[must_use]
    pub const fn field(id: &'static str) -> Self {
        Self { id, kind: TagKind::Field, owner: None, satisfies: None, demo: None }
    }

    /// An `effect:` tag.
    #[must_use]
    pub const fn effect(id: &'static str) -> Self {
        Self { id, kind: TagKind::Effect, owner: None, satisfies: None, demo: None }
    }

    /// Records which step normally provides this tag.
    #[must_use]
    pub const fn with_owner(mut self, owner: TagOwner) -> Self {
        self.owner = Some(owner);
        self
    }

    /// Attaches a satisfaction predicate.
    #[must_use]
    pub const fn with_satisfies(mut self, predicate: SatisfiesFn) -> Self {
        self.satisfies = Some(predicate);
        self
    }

    /// Attaches a demo payload check.
    #[must_use]
    pub const fn with_demo(mut self, demo: DemoFn) -> Self {
        self.demo = Some(demo);
        self
    }

    /// True when this tag is satisfied in `ctx`: provided at least once, and
    /// the optional predicate (if any) holds.
    #[must_use]
    pub fn is_satisfied(&self, ctx: &MapContext<'_>) -> bool {
        ctx.satisfied.contains(self.id) && self.satisfies.map_or(true, |pred| pred(ctx))
    }
}

/// Registry of every tag the recipe may reference.
///
/// Tags are registered once, at recipe assembly. Duplicates and
/// kind/prefix mismatches are rejected there rather than surfacing as
/// confusing compile or runtime failures later.
#[derive(Debug, Default)]
pub struct TagRegistry {
    tags: IndexMap<&'static str, DependencyTag>,
}

impl TagRegistry {
    /// Empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self { tags: IndexMap::new() }
    }

    /// Registers one tag.
    ///
    /// # Errors
    ///
    /// [`TagError::KindMismatch`] when the id does not carry its kind's
    /// prefix, [`TagError::Duplicate`] when the id is already registered,
    /// [`TagError::RejectedDemo`] when an attached demo payload fails its
    /// own validator.
    pub fn register(&mut self, tag: DependencyTag) -> Result<(), TagError> {
        let expected_prefix = tag.kind.prefix();
        if !tag.id.starts_with(expected_prefix) {
            return Err(TagError::KindMismatch { id: tag.id.to_owned(), expected_prefix });
        }
        if self.tags.contains_key(tag.id) {
            return Err(TagError::Duplicate { id: tag.id.to_owned() });
        }
        if let Some(demo) = tag.demo {
            demo().map_err(|message| TagError::RejectedDemo {
                id: tag.id.to_owned(),
                message,
            })?;
        }
        self.tags.insert(tag.id, tag);
        Ok(())
    }

    /// Registers a batch of tags, stopping at the first defect.
    ///
    /// # Errors
    ///
    /// Same as [`Self::register`].
    pub fn register_all(
        &mut self,
        tags: impl IntoIterator<Item = DependencyTag>,
    ) -> Result<(), TagError> {
        for tag in tags {
            self.register(tag)?;
        }
        Ok(())
    }

    /// Looks a tag up by id.
    #[must_use]
    pub fn get(&self, id: &str) -> Option<&DependencyTag> {
        self.tags.get(id)
    }

    /// Looks a tag up, failing on unregistered ids.
    ///
    /// # Errors
    ///
    /// [`TagError::Unknown`] when the id was never registered.
    pub fn validate(&self, id: &str) -> Result<&DependencyTag, TagError> {
        self.tags.get(id).ok_or_else(|| TagError::Unknown { id: id.to_owned() })
    }

    /// Validates a batch of ids.
    ///
    /// # Errors
    ///
    /// [`TagError::Unknown`] for the first unregistered id.
    pub fn validate_all<'a>(
        &self,
        ids: impl IntoIterator<Item = &'a str>,
    ) -> Result<(), TagError> {
        for id in ids {
            self.validate(id)?;
        }
        Ok(())
    }

    /// Number of registered tags.
    #[must_use]
    pub fn len(&self) -> usize {
        self.tags.len()
    }

    /// True when nothing is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tags.is_empty()
    }
}

/// The set of tags provided so far in one run.
#[derive(Clone, Debug, Default)]
pub struct SatisfiedTags {
    ids: BTreeSet<String>,
}

impl SatisfiedTags {
    /// The initial satisfied-set: empty.
    #[must_use]
    pub fn new() -> Self {
        Self { ids: BTreeSet::new() }
    }

    /// Marks a tag as provided.
    pub fn mark(&mut self, id: &str) {
        self.ids.insert(id.to_owned());
    }

    /// True when the tag has been provided.
    #[must_use]
    pub fn contains(&self, id: &str) -> bool {
        self.ids.contains(id)
    }

    /// Every satisfied id, sorted. Used in diagnostics.
    #[must_use]
    pub fn sorted_ids(&self) -> Vec<String> {
        self.ids.iter().cloned().collect()
    }

    /// Number of satisfied tags.
    #[must_use]
    pub fn len(&self) -> usize {
        self.ids.len()
    }

    /// True when nothing has been provided yet.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}
