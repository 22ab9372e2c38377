use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::error::GeoError;

/// Closed set of geography kinds the engine can key a table by.
/// Deserialises through `FromStr`, so config files accept the same aliases
/// as the API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", try_from = "String")]
pub enum GeoType {
    Zip,    // 5-digit ZIP code
    Fips,   // 5-digit county FIPS
    #[serde(rename = "chng-fips")]
    ChngFips, // county or county group, e.g. "01001" or "02g01"
    State,  // 2-letter postal code
    Msa,    // Metropolitan statistical area
    Hrr,    // Hospital referral region
    Hsa,    // Hospital service area
    Hhs,    // HHS region 1-10
    Uid,    // External reporting identifier
    Nation, // "us"
}

impl GeoType {
    pub const ALL: [GeoType; 10] = [
        GeoType::Zip,
        GeoType::Fips,
        GeoType::ChngFips,
        GeoType::State,
        GeoType::Msa,
        GeoType::Hrr,
        GeoType::Hsa,
        GeoType::Hhs,
        GeoType::Uid,
        GeoType::Nation,
    ];

    pub fn to_str(&self) -> &'static str {
        match self {
            GeoType::Zip => "zip",
            GeoType::Fips => "fips",
            GeoType::ChngFips => "chng-fips",
            GeoType::State => "state",
            GeoType::Msa => "msa",
            GeoType::Hrr => "hrr",
            GeoType::Hsa => "hsa",
            GeoType::Hhs => "hhs",
            GeoType::Uid => "uid",
            GeoType::Nation => "nation",
        }
    }

    /// Dense index into `ALL`, used for fixed-size per-kind caches.
    #[inline]
    pub(crate) fn index(&self) -> usize {
        *self as usize
    }

    /// Fixed code width for kinds stored zero-padded, `None` otherwise.
    pub fn fixed_width(&self) -> Option<usize> {
        match self {
            GeoType::Zip | GeoType::Fips | GeoType::ChngFips | GeoType::Msa => Some(5),
            GeoType::State | GeoType::Hrr | GeoType::Hsa | GeoType::Hhs | GeoType::Uid | GeoType::Nation => None,
        }
    }
}

impl fmt::Display for GeoType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.to_str())
    }
}

impl FromStr for GeoType {
    type Err = GeoError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "zip" | "zip5" => Ok(GeoType::Zip),
            "fips" | "county" => Ok(GeoType::Fips),
            "chng-fips" | "chng_fips" => Ok(GeoType::ChngFips),
            "state" | "state_id" | "state_code" => Ok(GeoType::State),
            "msa" => Ok(GeoType::Msa),
            "hrr" => Ok(GeoType::Hrr),
            "hsa" => Ok(GeoType::Hsa),
            "hhs" => Ok(GeoType::Hhs),
            "uid" => Ok(GeoType::Uid),
            "nation" => Ok(GeoType::Nation),
            _ => Err(GeoError::InvalidGeoCode {
                kind: s.to_string(),
                value: String::new(),
                reason: "unknown geography kind",
            }),
        }
    }
}

impl TryFrom<String> for GeoType {
    type Error = GeoError;

    fn try_from(s: String) -> Result<Self, Self::Error> { s.parse() }
}
