use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::ParseEnumError;

/// External source a lead can be discovered on or enriched from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Platform {
    GoogleMaps,
    GoogleBusiness,
    Linkedin,
    Facebook,
    Instagram,
    GoogleSearch,
}

impl Platform {
    /// The platform every job discovers from first.
    pub const PRIMARY: Platform = Platform::GoogleMaps;

    pub const ALL: [Platform; 6] = [
        Platform::GoogleMaps,
        Platform::GoogleBusiness,
        Platform::Linkedin,
        Platform::Facebook,
        Platform::Instagram,
        Platform::GoogleSearch,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Platform::GoogleMaps => "google_maps",
            Platform::GoogleBusiness => "google_business",
            Platform::Linkedin => "linkedin",
            Platform::Facebook => "facebook",
            Platform::Instagram => "instagram",
            Platform::GoogleSearch => "google_search",
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Platform {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Platform::ALL
            .into_iter()
            .find(|p| p.as_str() == s.trim())
            .ok_or_else(|| ParseEnumError::new("platform", s))
    }
}

/// Named bundle controlling enrichment depth, breadth and concurrency.
///
/// Variants are ordered: `Basic` is the minimum level.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum Intensity {
    Basic,
    #[default]
    Standard,
    Premium,
}

impl Intensity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Intensity::Basic => "basic",
            Intensity::Standard => "standard",
            Intensity::Premium => "premium",
        }
    }

    /// Multiplier used by the duration estimate.
    pub fn duration_multiplier(&self) -> f64 {
        match self {
            Intensity::Basic => 1.0,
            Intensity::Standard => 2.0,
            Intensity::Premium => 4.0,
        }
    }
}

impl fmt::Display for Intensity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Intensity {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "basic" => Ok(Intensity::Basic),
            "standard" => Ok(Intensity::Standard),
            "premium" => Ok(Intensity::Premium),
            other => Err(ParseEnumError::new("intensity", other)),
        }
    }
}
