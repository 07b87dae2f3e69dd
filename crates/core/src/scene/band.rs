//! Reflectance band identifiers

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A reflectance band of an optical scene.
///
/// Parsed from generic names (`"nir"`, `"swir1"`) or Landsat 8/9
/// Collection 2 surface reflectance names (`"SR_B5"`). Unknown names are
/// rejected when configuration is read, not when a raster is found empty.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Band {
    Coastal,
    Blue,
    Green,
    Red,
    Nir,
    Swir1,
    Swir2,
}

impl Band {
    pub const ALL: [Band; 7] = [
        Band::Coastal,
        Band::Blue,
        Band::Green,
        Band::Red,
        Band::Nir,
        Band::Swir1,
        Band::Swir2,
    ];

    /// Generic lower-case name
    pub fn name(&self) -> &'static str {
        match self {
            Band::Coastal => "coastal",
            Band::Blue => "blue",
            Band::Green => "green",
            Band::Red => "red",
            Band::Nir => "nir",
            Band::Swir1 => "swir1",
            Band::Swir2 => "swir2",
        }
    }

    /// Landsat 8/9 Collection 2 Level-2 band name
    pub fn landsat_name(&self) -> &'static str {
        match self {
            Band::Coastal => "SR_B1",
            Band::Blue => "SR_B2",
            Band::Green => "SR_B3",
            Band::Red => "SR_B4",
            Band::Nir => "SR_B5",
            Band::Swir1 => "SR_B6",
            Band::Swir2 => "SR_B7",
        }
    }
}

impl FromStr for Band {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let key = s.trim();
        Band::ALL
            .iter()
            .copied()
            .find(|b| b.name().eq_ignore_ascii_case(key) || b.landsat_name().eq_ignore_ascii_case(key))
            .ok_or_else(|| Error::UnknownBand(s.to_string()))
    }
}

impl TryFrom<String> for Band {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<Band> for String {
    fn from(band: Band) -> Self {
        band.landsat_name().to_string()
    }
}

impl fmt::Display for Band {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.landsat_name())
    }
}
