//! Area-of-interest polygon

use crate::crs::CRS;
use crate::error::{Error, Result};
use geo::{BoundingRect, Centroid, Contains};
use geo_types::{coord, LineString, Point, Polygon, Rect};

/// WGS84 mean radius used for the rough area of geographic regions
const MEAN_EARTH_RADIUS_M: f64 = 6_371_008.8;

/// A polygon area of interest together with the CRS of its coordinates.
///
/// Used both as clipping boundary for composites and as the aggregation
/// zone for area totals and spatial means.
#[derive(Debug, Clone, PartialEq)]
pub struct Region {
    polygon: Polygon<f64>,
    crs: CRS,
}

impl Region {
    /// Axis-aligned rectangle `[west, south, east, north]`
    pub fn from_bbox(west: f64, south: f64, east: f64, north: f64, crs: CRS) -> Result<Self> {
        let finite = [west, south, east, north].iter().all(|v| v.is_finite());
        if !finite || west >= east || south >= north {
            return Err(Error::InvalidRegion(format!(
                "degenerate bounding box [{}, {}, {}, {}]",
                west, south, east, north
            )));
        }
        let rect = Rect::new(coord! { x: west, y: south }, coord! { x: east, y: north });
        Ok(Self {
            polygon: rect.to_polygon(),
            crs,
        })
    }

    pub fn from_polygon(polygon: Polygon<f64>, crs: CRS) -> Result<Self> {
        // A closed ring needs at least three distinct vertices plus closure.
        if polygon.exterior().0.len() < 4 {
            return Err(Error::InvalidRegion(format!(
                "exterior ring has only {} vertices",
                polygon.exterior().0.len()
            )));
        }
        Ok(Self { polygon, crs })
    }

    pub fn polygon(&self) -> &Polygon<f64> {
        &self.polygon
    }

    pub fn crs(&self) -> &CRS {
        &self.crs
    }

    pub fn is_geographic(&self) -> bool {
        self.crs.is_geographic()
    }

    /// Same CRS, different outline (used by simplification)
    pub fn with_polygon(&self, polygon: Polygon<f64>) -> Result<Self> {
        Self::from_polygon(polygon, self.crs.clone())
    }

    /// Bounding box (min_x, min_y, max_x, max_y)
    pub fn bbox(&self) -> (f64, f64, f64, f64) {
        match self.polygon.bounding_rect() {
            Some(r) => (r.min().x, r.min().y, r.max().x, r.max().y),
            None => (f64::NAN, f64::NAN, f64::NAN, f64::NAN),
        }
    }

    /// Whether the point lies strictly inside the polygon
    pub fn contains(&self, x: f64, y: f64) -> bool {
        self.polygon.contains(&Point::new(x, y))
    }

    pub fn centroid(&self) -> (f64, f64) {
        match self.polygon.centroid() {
            Some(p) => (p.x(), p.y()),
            None => {
                let (x0, y0, x1, y1) = self.bbox();
                ((x0 + x1) / 2.0, (y0 + y1) / 2.0)
            }
        }
    }

    pub fn vertex_count(&self) -> usize {
        self.polygon.exterior().0.len()
            + self.polygon.interiors().iter().map(|r| r.0.len()).sum::<usize>()
    }

    /// Approximate area in km².
    ///
    /// Projected regions use planar area; geographic regions scale square
    /// degrees by the spherical metres-per-degree at the centroid latitude.
    pub fn area_km2(&self) -> f64 {
        use geo::Area;
        let planar = self.polygon.unsigned_area();
        if !self.is_geographic() {
            return planar / 1e6;
        }
        let (_, lat) = self.centroid();
        let m_per_deg = MEAN_EARTH_RADIUS_M.to_radians();
        planar * m_per_deg * m_per_deg * lat.to_radians().cos() / 1e6
    }

    pub fn exterior(&self) -> &LineString<f64> {
        self.polygon.exterior()
    }
}
