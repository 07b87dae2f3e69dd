//! Coordinate Reference System handling

use serde::{Deserialize, Serialize};
use std::fmt;

/// EPSG codes of geographic (lon/lat degree) systems we recognise.
const GEOGRAPHIC_EPSG: [u32; 4] = [4326, 4269, 4258, 4283];

/// Coordinate Reference System representation
///
/// Only the identity of the system is tracked. Whether coordinates are
/// degrees or metres is what the aggregation grid and pixel-area model need.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CRS {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    wkt: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    epsg: Option<u32>,
}

impl CRS {
    /// Create a CRS from an EPSG code
    pub fn from_epsg(code: u32) -> Self {
        Self {
            wkt: None,
            epsg: Some(code),
        }
    }

    /// Create a CRS from a WKT string
    pub fn from_wkt(wkt: impl Into<String>) -> Self {
        Self {
            wkt: Some(wkt.into()),
            epsg: None,
        }
    }

    /// WGS84 geographic CRS (EPSG:4326)
    pub fn wgs84() -> Self {
        Self::from_epsg(4326)
    }

    /// UTM zone on WGS84 (EPSG:326xx north, 327xx south)
    pub fn utm(zone: u8, north: bool) -> Self {
        let base = if north { 32600 } else { 32700 };
        Self::from_epsg(base + zone as u32)
    }

    pub fn epsg(&self) -> Option<u32> {
        self.epsg
    }

    pub fn wkt(&self) -> Option<&str> {
        self.wkt.as_deref()
    }

    /// Whether coordinates are longitude/latitude in degrees.
    pub fn is_geographic(&self) -> bool {
        if let Some(code) = self.epsg {
            return GEOGRAPHIC_EPSG.contains(&code);
        }
        match &self.wkt {
            Some(wkt) => {
                let head = wkt.trim_start();
                head.starts_with("GEOGCS") || head.starts_with("GEOGCRS")
            }
            None => false,
        }
    }

    /// Check if two CRS are equivalent
    pub fn is_equivalent(&self, other: &CRS) -> bool {
        if let (Some(a), Some(b)) = (self.epsg, other.epsg) {
            return a == b;
        }
        if let (Some(a), Some(b)) = (&self.wkt, &other.wkt) {
            return a == b;
        }
        false
    }

    /// Get a string identifier for this CRS
    pub fn identifier(&self) -> String {
        if let Some(code) = self.epsg {
            return format!("EPSG:{}", code);
        }
        if let Some(wkt) = &self.wkt {
            return format!("WKT:{}", wkt.chars().take(50).collect::<String>());
        }
        "Unknown".to_string()
    }
}

impl fmt::Display for CRS {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.identifier())
    }
}

impl Default for CRS {
    fn default() -> Self {
        Self::wgs84()
    }
}
