//! Ordered, non-destructively filterable scene collections

use super::{DateRange, SceneImage};
use std::sync::Arc;

/// Scenes over a common area, ordered by acquisition date.
///
/// Every filter returns a new sequence sharing the underlying scenes.
#[derive(Debug, Clone, Default)]
pub struct ImageSequence {
    scenes: Vec<Arc<SceneImage>>,
}

impl ImageSequence {
    pub fn new(scenes: Vec<SceneImage>) -> Self {
        Self::from_shared(scenes.into_iter().map(Arc::new).collect())
    }

    pub fn from_shared(mut scenes: Vec<Arc<SceneImage>>) -> Self {
        scenes.sort_by(|a, b| a.timestamp().cmp(&b.timestamp()).then_with(|| a.id().cmp(b.id())));
        Self { scenes }
    }

    pub fn len(&self) -> usize {
        self.scenes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scenes.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<SceneImage>> {
        self.scenes.iter()
    }

    pub fn scenes(&self) -> &[Arc<SceneImage>] {
        &self.scenes
    }

    fn retain(&self, keep: impl Fn(&SceneImage) -> bool) -> Self {
        Self {
            scenes: self.scenes.iter().filter(|s| keep(s)).cloned().collect(),
        }
    }

    /// Scenes acquired inside `range` (both ends included)
    pub fn filter_date(&self, range: &DateRange) -> Self {
        self.retain(|s| range.contains(s.timestamp()))
    }

    /// Scenes whose cloud cover is strictly below `max_percent`
    pub fn filter_cloud_cover(&self, max_percent: f64) -> Self {
        self.retain(|s| s.cloud_cover() < max_percent)
    }

    /// Scenes whose footprint intersects the box (min_x, min_y, max_x, max_y)
    pub fn filter_bounds(&self, bbox: (f64, f64, f64, f64)) -> Self {
        let (qx0, qy0, qx1, qy1) = bbox;
        self.retain(|s| {
            let (x0, y0, x1, y1) = s.bounds();
            x0 < qx1 && qx0 < x1 && y0 < qy1 && qy0 < y1
        })
    }
}

impl FromIterator<Arc<SceneImage>> for ImageSequence {
    fn from_iter<I: IntoIterator<Item = Arc<SceneImage>>>(iter: I) -> Self {
        Self::from_shared(iter.into_iter().collect())
    }
}
