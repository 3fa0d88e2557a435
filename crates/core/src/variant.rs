//! Simulator variants
//!
//! `FlamMap`, MTT, TOM and Farsite ship as one family of command line
//! executables. The variant decides which input-file header is written,
//! which variant-specific keys are legal and which binary is launched.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// One of the four supported simulator variants
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub enum ModelVariant {
    /// Landscape-wide fire behavior under constant conditions
    #[default]
    FlamMap,
    /// Minimum travel time fire growth
    #[serde(rename = "MTT")]
    Mtt,
    /// Treatment optimization model (runs on the MTT binary)
    #[serde(rename = "TOM")]
    Tom,
    /// Time-dependent perimeter growth
    Farsite,
}

impl ModelVariant {
    /// All variants in declaration order
    pub const ALL: [ModelVariant; 4] = [
        ModelVariant::FlamMap,
        ModelVariant::Mtt,
        ModelVariant::Tom,
        ModelVariant::Farsite,
    ];

    /// Version line that must open the inputs file
    pub fn header(self) -> &'static str {
        match self {
            ModelVariant::FlamMap => "FlamMap-Inputs-File-Version-1",
            ModelVariant::Mtt | ModelVariant::Tom => "ShortTerm-Inputs-File-Version-1",
            ModelVariant::Farsite => "FARSITE INPUTS FILE VERSION 1.0",
        }
    }

    /// Name of the bundled executable (and of the processes it leaves behind)
    pub fn binary_name(self) -> &'static str {
        match self {
            ModelVariant::FlamMap => "TestFlamMap",
            ModelVariant::Mtt | ModelVariant::Tom => "TestMTT",
            ModelVariant::Farsite => "TestFARSITE",
        }
    }

    /// Name used in logs and configuration files
    pub fn as_str(self) -> &'static str {
        match self {
            ModelVariant::FlamMap => "FlamMap",
            ModelVariant::Mtt => "MTT",
            ModelVariant::Tom => "TOM",
            ModelVariant::Farsite => "Farsite",
        }
    }
}

impl fmt::Display for ModelVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ModelVariant {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "flammap" => Ok(ModelVariant::FlamMap),
            "mtt" => Ok(ModelVariant::Mtt),
            "tom" => Ok(ModelVariant::Tom),
            "farsite" => Ok(ModelVariant::Farsite),
            _ => Err(format!(
                "Unknown fire model '{s}', expected one of: FlamMap, MTT, TOM, Farsite"
            )),
        }
    }
}
