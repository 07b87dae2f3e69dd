//! Multi-temporal scene model
//!
//! A scene is one acquisition: several reflectance bands on a shared grid,
//! a bit-encoded quality band, an acquisition date and a scene-level cloud
//! cover. Sequences of scenes are filtered non-destructively.

mod band;
mod date_range;
mod image;
mod sequence;

pub use band::Band;
pub use date_range::DateRange;
pub use image::SceneImage;
pub use sequence::ImageSequence;
