//! Vector operations on the region of interest

mod simplify;

pub use simplify::simplify_region;
