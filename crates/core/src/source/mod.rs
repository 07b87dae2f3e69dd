//! Scene data sources
//!
//! The pipeline only needs one query: scenes over a region, inside a date
//! range, below a cloud-cover threshold. Storage and transport live behind
//! [`SceneSource`].

mod catalog;

pub use catalog::{CatalogEntry, CatalogSource, SceneCatalog};

use crate::error::Result;
use crate::region::Region;
use crate::scene::{DateRange, ImageSequence, SceneImage};

/// Provider of quality-tagged multi-band scenes.
pub trait SceneSource: Send + Sync {
    /// Scenes intersecting `region`, acquired inside `range`, with cloud
    /// cover strictly below `max_cloud_percent`.
    fn query_images(
        &self,
        region: &Region,
        range: &DateRange,
        max_cloud_percent: f64,
    ) -> Result<ImageSequence>;
}

/// Scenes held in memory.
#[derive(Debug, Clone, Default)]
pub struct MemorySource {
    scenes: ImageSequence,
}

impl MemorySource {
    pub fn new(scenes: Vec<SceneImage>) -> Self {
        Self {
            scenes: ImageSequence::new(scenes),
        }
    }

    pub fn len(&self) -> usize {
        self.scenes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scenes.is_empty()
    }
}

impl SceneSource for MemorySource {
    fn query_images(
        &self,
        region: &Region,
        range: &DateRange,
        max_cloud_percent: f64,
    ) -> Result<ImageSequence> {
        Ok(self
            .scenes
            .filter_bounds(region.bbox())
            .filter_date(range)
            .filter_cloud_cover(max_cloud_percent))
    }
}
