//! Ground area of grid cells
//!
//! Cell dimensions on a geographic grid vary with latitude:
//! - `dx = N·cos(φ)·Δλ` (prime-vertical radius of curvature N)
//! - `dy = M·Δφ` (meridional radius of curvature M)
//!
//! Projected grids have constant cells of `resolution²`.

use serde::{Deserialize, Serialize};

/// WGS84 ellipsoid parameters
const WGS84_A: f64 = 6_378_137.0; // semi-major axis (m)
const WGS84_F: f64 = 1.0 / 298.257_223_563; // flattening

/// Reference ellipsoid
#[derive(Debug, Clone, Copy)]
pub struct SpheroidalParams {
    /// Semi-major axis in meters. Default: WGS84 (6378137.0)
    pub semi_major: f64,
    /// Flattening. Default: WGS84 (1/298.257223563)
    pub flattening: f64,
}

impl Default for SpheroidalParams {
    fn default() -> Self {
        Self {
            semi_major: WGS84_A,
            flattening: WGS84_F,
        }
    }
}

/// Grid cell dimensions at a given latitude on the spheroid
#[derive(Debug, Clone, Copy)]
pub struct CellDimensions {
    /// East-West cell size in meters
    pub dx: f64,
    /// North-South cell size in meters
    pub dy: f64,
    /// Cell area in m²
    pub area: f64,
}

/// Cell dimensions at `latitude_deg` for a `d_lon` x `d_lat` degree cell.
pub fn cell_dimensions(
    latitude_deg: f64,
    d_lon: f64,
    d_lat: f64,
    params: &SpheroidalParams,
) -> CellDimensions {
    let lat = latitude_deg.to_radians();
    let a = params.semi_major;
    let f = params.flattening;
    let e2 = 2.0 * f - f * f; // first eccentricity squared

    let sin_lat = lat.sin();
    let w2 = 1.0 - e2 * sin_lat * sin_lat;

    let n = a / w2.sqrt();
    let m = a * (1.0 - e2) / w2.powf(1.5);

    let dx = (n * lat.cos() * d_lon.to_radians()).abs();
    let dy = (m * d_lat.to_radians()).abs();

    CellDimensions {
        dx,
        dy,
        area: dx * dy,
    }
}

/// Metres per degree of longitude and latitude at `latitude_deg`.
pub fn metres_per_degree(latitude_deg: f64) -> (f64, f64) {
    let d = cell_dimensions(latitude_deg, 1.0, 1.0, &SpheroidalParams::default());
    (d.dx, d.dy)
}

/// How the ground area of a sampling cell is computed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AreaModel {
    /// Flat earth: every cell is `resolution²`
    Planar,
    /// WGS84 cell area at the cell's latitude (geographic grids only;
    /// projected grids fall back to planar)
    #[default]
    Ellipsoidal,
}

impl AreaModel {
    /// Area in m² of a cell centred at `latitude_deg`.
    ///
    /// `cell_deg` is the cell size in degrees (`None` for projected grids);
    /// `resolution_m` is the nominal side length.
    pub fn cell_area_m2(&self, resolution_m: f64, cell_deg: Option<(f64, f64)>, latitude_deg: f64) -> f64 {
        match (self, cell_deg) {
            (AreaModel::Ellipsoidal, Some((d_lon, d_lat))) => {
                cell_dimensions(latitude_deg, d_lon, d_lat, &SpheroidalParams::default()).area
            }
            _ => resolution_m * resolution_m,
        }
    }
}
