//! Region simplification
//!
//! Douglas-Peucker on the region outline with a tolerance in metres. A
//! simpler outline keeps the containment tests of zonal reductions cheap.

use crate::statistics::metres_per_degree;
use geo::Simplify;
use geo_types::{LineString, Polygon};
use landdelta_core::region::Region;
use landdelta_core::{Error, Result};
use tracing::debug;

/// Simplify `region` with a Douglas-Peucker tolerance of `tolerance_m` metres.
///
/// Geographic regions convert the tolerance to degrees at the centroid
/// latitude using the finer of the two axes. An exterior ring that would
/// collapse below a valid ring is kept as is; collapsing holes are dropped.
pub fn simplify_region(region: &Region, tolerance_m: f64) -> Result<Region> {
    if !(tolerance_m.is_finite() && tolerance_m >= 0.0) {
        return Err(Error::InvalidParameter {
            name: "simplify_tolerance_m",
            value: tolerance_m.to_string(),
            reason: "must be a non-negative number of metres".into(),
        });
    }
    if tolerance_m == 0.0 {
        return Ok(region.clone());
    }

    let tolerance = if region.is_geographic() {
        let (_, lat) = region.centroid();
        let (mx, my) = metres_per_degree(lat);
        tolerance_m / mx.max(my)
    } else {
        tolerance_m
    };

    let polygon = region.polygon();
    let mut exterior = polygon.exterior().simplify(&tolerance);
    if exterior.0.len() < 4 {
        exterior = polygon.exterior().clone();
    }
    let interiors: Vec<LineString<f64>> = polygon
        .interiors()
        .iter()
        .map(|ring| ring.simplify(&tolerance))
        .filter(|ring| ring.0.len() >= 4)
        .collect();

    let simplified = region.with_polygon(Polygon::new(exterior, interiors))?;
    debug!(
        "Simplified region at {} m: {} -> {} vertices",
        tolerance_m,
        region.vertex_count(),
        simplified.vertex_count()
    );
    Ok(simplified)
}
