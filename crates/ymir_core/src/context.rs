//! # Map Context
//!
//! The shared execution environment. Exactly one [`MapContext`] exists per
//! generation run; the executor owns it, steps mutate it in place, and it
//! is dropped when the run ends. There is no module-level state anywhere in
//! the pipeline.

use rand_chacha::ChaCha8Rng;
use ymir_adapter::{EngineAdapter, LatitudeBounds, MapDimensions};

use crate::artifact::{ArtifactHandle, ArtifactStore};
use crate::error::ArtifactError;
use crate::rng::WorldSeed;
use crate::tags::SatisfiedTags;
use crate::trace::TraceSink;

/// Immutable facts about one run: grid size, latitude extent, seed.
#[derive(Clone, Copy, Debug)]
pub struct MapEnv {
    /// Grid dimensions.
    pub dims: MapDimensions,
    /// Latitude extent mapped across rows.
    pub latitude: LatitudeBounds,
    /// Run seed.
    pub seed: WorldSeed,
}

impl MapEnv {
    /// Builds an environment.
    #[must_use]
    pub const fn new(dims: MapDimensions, latitude: LatitudeBounds, seed: WorldSeed) -> Self {
        Self { dims, latitude, seed }
    }

    /// Total tile count.
    #[must_use]
    pub const fn size(&self) -> usize {
        self.dims.size()
    }

    /// Latitude at a row center, in degrees.
    #[must_use]
    pub fn latitude_at(&self, y: u32) -> f64 {
        self.latitude.latitude_for_row(y, self.dims.height)
    }

    /// Latitude of every row, north to south.
    #[must_use]
    pub fn row_latitudes(&self) -> Vec<f64> {
        (0..self.dims.height).map(|y| self.latitude_at(y)).collect()
    }
}

/// The one-per-run execution context.
///
/// Owns the artifact store, the satisfied-tag state, and the trace sink;
/// borrows the engine adapter for the duration of the run.
pub struct MapContext<'run> {
    /// Immutable run facts.
    pub env: MapEnv,
    /// The engine boundary.
    pub adapter: &'run mut dyn EngineAdapter,
    /// Published buffers.
    pub artifacts: ArtifactStore,
    /// Tags provided so far.
    pub satisfied: SatisfiedTags,
    /// Observability channel.
    pub trace: TraceSink,
}

impl<'run> MapContext<'run> {
    /// Builds a context around an adapter. Dimensions come from the
    /// adapter; everything else starts empty.
    pub fn new(
        adapter: &'run mut dyn EngineAdapter,
        latitude: LatitudeBounds,
        seed: WorldSeed,
        trace: TraceSink,
    ) -> Self {
        let env = MapEnv::new(adapter.dimensions(), latitude, seed);
        Self {
            env,
            adapter,
            artifacts: ArtifactStore::new(),
            satisfied: SatisfiedTags::new(),
            trace,
        }
    }

    /// A fresh generator for a named purpose, keyed by `(seed, label)`.
    #[must_use]
    pub fn rng(&self, label: &str) -> ChaCha8Rng {
        self.env.seed.rng(label)
    }

    /// Grid dimensions of this run.
    #[must_use]
    pub fn dims(&self) -> MapDimensions {
        self.env.dims
    }

    /// Total tile count of this run.
    #[must_use]
    pub fn size(&self) -> usize {
        self.env.size()
    }

    /// Validates and stores a buffer under its handle's tag.
    ///
    /// # Errors
    ///
    /// [`ArtifactError::Rejected`] when the handle's validator refuses the
    /// value.
    pub fn publish<T: 'static>(
        &mut self,
        handle: ArtifactHandle<T>,
        value: T,
    ) -> Result<(), ArtifactError> {
        handle.publish(&mut self.artifacts, self.env.dims, value)
    }

    /// Borrows a published buffer.
    ///
    /// # Errors
    ///
    /// [`ArtifactError::Missing`] when nothing was published under the
    /// handle's tag.
    pub fn read<T: 'static>(&self, handle: ArtifactHandle<T>) -> Result<&T, ArtifactError> {
        handle.read(&self.artifacts)
    }
}

#[cfg(test)]
mod tests {
    use rand::Rng;
    use ymir_adapter::{MockAdapter, MockAdapterConfig};

    use super::*;
    use crate::artifact::expect_len;

    const COUNTS: ArtifactHandle<Vec<u32>> =
        ArtifactHandle::new("artifact:test.counts", |counts, dims| {
            expect_len("counts", dims.size(), counts)
        });

    #[test]
    fn context_rng_is_label_keyed_and_stateless() {
        let mut adapter = MockAdapter::new(MockAdapterConfig::ocean(4, 4, 9));
        let ctx = MapContext::new(
            &mut adapter,
            LatitudeBounds::symmetric(60.0),
            WorldSeed::new(9),
            TraceSink::disabled(),
        );
        let a: u64 = ctx.rng("mesh").gen();
        let b: u64 = ctx.rng("mesh").gen();
        assert_eq!(a, b);
    }

    #[test]
    fn publish_and_read_go_through_the_store() {
        let mut adapter = MockAdapter::new(MockAdapterConfig::ocean(4, 4, 9));
        let mut ctx = MapContext::new(
            &mut adapter,
            LatitudeBounds::symmetric(60.0),
            WorldSeed::new(9),
            TraceSink::disabled(),
        );
        assert!(ctx.read(COUNTS).is_err());
        ctx.publish(COUNTS, vec![0; 16]).unwrap();
        assert_eq!(ctx.read(COUNTS).unwrap().len(), 16);
    }
}
