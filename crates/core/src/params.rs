//! Simulator parameter set
//!
//! A sparse bag of every switch the inputs file understands. `None` means
//! "leave the key out": several switches change simulator defaults merely by
//! being present, so an unset field is never written with an empty value.

use crate::error::{FireModelError, Result};
use crate::records::WeatherRecordBlock;
use crate::variant::ModelVariant;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

/// Crown fire transition/spread algorithm
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CrownFireMethod {
    /// Finney (the simulators' default when the switch is absent)
    Finney,
    /// Scott and Reinhardt
    ScottReinhardt,
}

impl fmt::Display for CrownFireMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            CrownFireMethod::Finney => "Finney",
            CrownFireMethod::ScottReinhardt => "ScottReinhardt",
        })
    }
}

/// Unit system of embedded weather, RAWS and wind records
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum UnitSystem {
    /// Fahrenheit, MPH, feet, hundredths of an inch
    English,
    /// Celsius, KPH, meters, millimeters
    Metric,
}

impl fmt::Display for UnitSystem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            UnitSystem::English => "English",
            UnitSystem::Metric => "Metric",
        })
    }
}

/// Units of the constant (global) and gridded wind speeds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WindSpeedUnits {
    /// Miles per hour (code 0)
    Mph,
    /// Kilometers per hour (code 1)
    Kph,
    /// Meters per second (code 2)
    MetersPerSecond,
    /// Feet per minute (code 3)
    FeetPerMinute,
}

impl WindSpeedUnits {
    /// Integer code written to the inputs file
    pub fn code(self) -> u8 {
        match self {
            WindSpeedUnits::Mph => 0,
            WindSpeedUnits::Kph => 1,
            WindSpeedUnits::MetersPerSecond => 2,
            WindSpeedUnits::FeetPerMinute => 3,
        }
    }
}

/// Seed for the spotting random number generator (0 - 999999)
///
/// Two runs with identical settings and seed produce identical spotting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "u32", into = "u32")]
pub struct SpottingSeed(u32);

impl SpottingSeed {
    /// Largest seed the simulators accept
    pub const MAX: u32 = 999_999;

    /// Validated seed, `None` when above [`SpottingSeed::MAX`]
    pub fn new(seed: u32) -> Option<Self> {
        (seed <= Self::MAX).then_some(Self(seed))
    }

    /// Fresh seed, as the desktop applications generate for new analyses
    pub fn random() -> Self {
        Self(rand::rng().random_range(0..=Self::MAX))
    }

    /// Raw seed value
    pub fn value(self) -> u32 {
        self.0
    }
}

impl TryFrom<u32> for SpottingSeed {
    type Error = String;

    fn try_from(seed: u32) -> std::result::Result<Self, Self::Error> {
        Self::new(seed).ok_or_else(|| format!("spotting seed {seed} exceeds {}", Self::MAX))
    }
}

impl From<SpottingSeed> for u32 {
    fn from(seed: SpottingSeed) -> Self {
        seed.0
    }
}

impl fmt::Display for SpottingSeed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Requested output layer
///
/// Legality per variant is checked by the simulator, not here.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum OutputRequest {
    // All variants
    FlameLength,
    SpreadRate,
    Intensity,
    HeatArea,
    CrownState,
    // FlamMap, MTT and TOM
    Midflame,
    HorizRate,
    MaxSpreadDir,
    EllipseDimA,
    EllipseDimB,
    EllipseDimC,
    MaxSpot,
    MaxSpotDir,
    MaxSpotDx,
    CrownFractionBurned,
    SolarRadiation,
    FuelMoisture1,
    FuelMoisture10,
    FuelMoisture100,
    FuelMoisture1000,
    WindDirGrid,
    WindSpeedGrid,
    WindVector,
    // MTT
    MttRos,
    MttArrival,
    MttContour,
    MttIntensity,
    MttMajorPaths,
    MttFlowPaths,
    MttEmbers,
    // Farsite
    ArrivalTime,
    SpreadDir,
    RxIntensity,
    Ignition,
    FarsitePerimeters,
    FarsiteSpotFires,
    FarsiteTimings,
    /// Any other switch, written verbatim
    Custom(String),
}

impl OutputRequest {
    /// Outputs written when the caller requests none
    pub const DEFAULTS: [OutputRequest; 5] = [
        OutputRequest::FlameLength,
        OutputRequest::SpreadRate,
        OutputRequest::Intensity,
        OutputRequest::HeatArea,
        OutputRequest::CrownState,
    ];

    /// Switch name as written to the inputs file
    pub fn key(&self) -> &str {
        match self {
            OutputRequest::FlameLength => "FLAMELENGTH",
            OutputRequest::SpreadRate => "SPREADRATE",
            OutputRequest::Intensity => "INTENSITY",
            OutputRequest::HeatArea => "HEATAREA",
            OutputRequest::CrownState => "CROWNSTATE",
            OutputRequest::Midflame => "MIDFLAME",
            OutputRequest::HorizRate => "HORIZRATE",
            OutputRequest::MaxSpreadDir => "MAXSPREADDIR",
            OutputRequest::EllipseDimA => "ELLIPSEDIM_A",
            OutputRequest::EllipseDimB => "ELLIPSEDIM_B",
            OutputRequest::EllipseDimC => "ELLIPSEDIM_C",
            OutputRequest::MaxSpot => "MAXSPOT",
            OutputRequest::MaxSpotDir => "MAXSPOT_DIR",
            OutputRequest::MaxSpotDx => "MAXSPOT_DX",
            OutputRequest::CrownFractionBurned => "CROWNFRACTIONBURNED",
            OutputRequest::SolarRadiation => "SOLARRADIATION",
            OutputRequest::FuelMoisture1 => "FUELMOISTURE1",
            OutputRequest::FuelMoisture10 => "FUELMOISTURE10",
            OutputRequest::FuelMoisture100 => "FUELMOISTURE100",
            OutputRequest::FuelMoisture1000 => "FUELMOISTURE1000",
            OutputRequest::WindDirGrid => "WINDDIRGRID",
            OutputRequest::WindSpeedGrid => "WINDSPEEDGRID",
            OutputRequest::WindVector => "WINDVECTOR",
            OutputRequest::MttRos => "MTT_ROS",
            OutputRequest::MttArrival => "MTT_ARRIVAL",
            OutputRequest::MttContour => "MTT_CONTOUR",
            OutputRequest::MttIntensity => "MTT_INTENSITY",
            OutputRequest::MttMajorPaths => "MTT_MAJORPATHS",
            OutputRequest::MttFlowPaths => "MTT_FLOWPATHS",
            OutputRequest::MttEmbers => "MTT_EMBERS",
            OutputRequest::ArrivalTime => "ARRIVALTIME",
            OutputRequest::SpreadDir => "SPREADDIR",
            OutputRequest::RxIntensity => "RXINTENSITY",
            OutputRequest::Ignition => "IGNITION",
            OutputRequest::FarsitePerimeters => "FARSITEPERIMETERS",
            OutputRequest::FarsiteSpotFires => "FARSITESPOTFIRES",
            OutputRequest::FarsiteTimings => "FARSITETIMINGS",
            OutputRequest::Custom(key) => key,
        }
    }

    const NAMED: [OutputRequest; 37] = [
        OutputRequest::FlameLength,
        OutputRequest::SpreadRate,
        OutputRequest::Intensity,
        OutputRequest::HeatArea,
        OutputRequest::CrownState,
        OutputRequest::Midflame,
        OutputRequest::HorizRate,
        OutputRequest::MaxSpreadDir,
        OutputRequest::EllipseDimA,
        OutputRequest::EllipseDimB,
        OutputRequest::EllipseDimC,
        OutputRequest::MaxSpot,
        OutputRequest::MaxSpotDir,
        OutputRequest::MaxSpotDx,
        OutputRequest::CrownFractionBurned,
        OutputRequest::SolarRadiation,
        OutputRequest::FuelMoisture1,
        OutputRequest::FuelMoisture10,
        OutputRequest::FuelMoisture100,
        OutputRequest::FuelMoisture1000,
        OutputRequest::WindDirGrid,
        OutputRequest::WindSpeedGrid,
        OutputRequest::WindVector,
        OutputRequest::MttRos,
        OutputRequest::MttArrival,
        OutputRequest::MttContour,
        OutputRequest::MttIntensity,
        OutputRequest::MttMajorPaths,
        OutputRequest::MttFlowPaths,
        OutputRequest::MttEmbers,
        OutputRequest::ArrivalTime,
        OutputRequest::SpreadDir,
        OutputRequest::RxIntensity,
        OutputRequest::Ignition,
        OutputRequest::FarsitePerimeters,
        OutputRequest::FarsiteSpotFires,
        OutputRequest::FarsiteTimings,
    ];
}

impl From<String> for OutputRequest {
    fn from(key: String) -> Self {
        let trimmed = key.trim().trim_end_matches(':');
        OutputRequest::NAMED
            .into_iter()
            .find(|o| o.key().eq_ignore_ascii_case(trimmed))
            .unwrap_or_else(|| OutputRequest::Custom(trimmed.to_string()))
    }
}

impl From<&str> for OutputRequest {
    fn from(key: &str) -> Self {
        OutputRequest::from(key.to_string())
    }
}

impl From<OutputRequest> for String {
    fn from(output: OutputRequest) -> Self {
        output.key().to_string()
    }
}

/// Minimum travel time switches
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MttParameters {
    pub resolution: Option<f64>,
    /// Minutes to burn; 0 burns the whole landscape
    pub sim_time: Option<u32>,
    pub travel_path_interval: Option<f64>,
    pub spot_probability: Option<f64>,
    pub spot_delay: Option<u32>,
    pub ignition_file: Option<PathBuf>,
    pub barrier_file: Option<PathBuf>,
    pub fill_barriers: Option<bool>,
    pub spotting_seed: Option<SpottingSeed>,
    pub node_spread_num_lat: Option<u32>,
    pub node_spread_num_vert: Option<u32>,
}

/// Treatment optimization switches. TOM needs all of them.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TomParameters {
    pub resolution: Option<f64>,
    pub ignition_file: Option<PathBuf>,
    pub ideal_landscape: Option<PathBuf>,
    /// Iterations per treatment level (1 - 5)
    pub iterations: Option<u32>,
    /// Treatment size in meters
    pub dimension: Option<f64>,
    /// Treatable share of the landscape (0.10 - 0.30)
    pub fraction: Option<f64>,
    pub opportunities_only: Option<bool>,
}

/// Farsite switches
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FarsiteParameters {
    /// `MM DD HHmm`
    pub start_time: Option<String>,
    /// `MM DD HHmm`
    pub end_time: Option<String>,
    /// Minutes
    pub timestep: Option<u32>,
    pub distance_res: Option<f64>,
    pub perimeter_res: Option<f64>,
    pub spot_grid_resolution: Option<f64>,
    pub spot_probability: Option<f64>,
    pub spot_ignition_delay: Option<u32>,
    pub min_ignition_vertex_distance: Option<f64>,
    pub minimum_spot_distance: Option<f64>,
    pub spotting_seed: Option<SpottingSeed>,
    pub acceleration_on: Option<bool>,
    pub ignition_file: Option<PathBuf>,
    /// `MM DD HHmm HHmm` records
    pub burn_periods: Option<WeatherRecordBlock>,
    pub barrier_file: Option<PathBuf>,
    pub fill_barriers: Option<bool>,
    pub ros_adjust_file: Option<PathBuf>,
}

/// Every switch of one simulator run
///
/// In TOML the `variant` key is required; every other key may be left out.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ParameterSet {
    pub variant: ModelVariant,

    // Fuel moisture / conditioning
    /// `MM DD HHmm` end of the fuel conditioning period
    pub conditioning_period_end: Option<String>,
    /// `Model FM1 FM10 FM100 FMLiveHerb FMLiveWoody` records, model 0 required
    pub fuel_moistures: Option<WeatherRecordBlock>,
    pub custom_fuels_file: Option<PathBuf>,

    // Weather / wind streams
    pub raws_units: Option<UnitSystem>,
    pub raws_elevation: Option<f64>,
    /// `Year Mth Day HHMM Temp RH Pcp WS WDir CC` records
    pub raws: Option<WeatherRecordBlock>,
    pub weather_data_units: Option<UnitSystem>,
    pub weather_data: Option<WeatherRecordBlock>,
    pub wind_data_units: Option<UnitSystem>,
    pub wind_data: Option<WeatherRecordBlock>,

    // Spread direction and gridded winds
    pub spread_direction_from_north: Option<f64>,
    pub spread_direction_from_max: Option<f64>,
    pub gridded_wind_speed_file: Option<PathBuf>,
    pub gridded_wind_direction_file: Option<PathBuf>,
    pub gridded_winds_generate: Option<bool>,
    pub gridded_winds_resolution: Option<f64>,
    pub gridded_winds_diurnal: Option<bool>,
    pub gridded_winds_diurnal_airtemp: Option<f64>,
    pub gridded_winds_diurnal_cloudcover: Option<f64>,
    pub gridded_winds_diurnal_longitude: Option<f64>,
    /// `mm dd yyyy`
    pub gridded_winds_diurnal_date: Option<String>,
    /// `ss mm hh tz`
    pub gridded_winds_diurnal_time: Option<String>,

    // Global wind, crown fire and processors
    pub wind_speed_units: Option<WindSpeedUnits>,
    pub wind_speed: Option<f64>,
    /// Azimuth, or -1 uphill / -2 downhill
    pub wind_direction: Option<f64>,
    pub foliar_moisture_content: Option<f64>,
    pub crown_fire_method: Option<CrownFireMethod>,
    pub number_processors: Option<u32>,

    // Variant specific
    #[serde(default)]
    pub mtt: MttParameters,
    #[serde(default)]
    pub tom: TomParameters,
    #[serde(default)]
    pub farsite: FarsiteParameters,

    /// `None` or an empty list requests [`OutputRequest::DEFAULTS`]
    pub outputs: Option<Vec<OutputRequest>>,
}

impl ParameterSet {
    /// Empty parameter set: nothing but the header and default outputs
    pub fn new(variant: ModelVariant) -> Self {
        Self {
            variant,
            ..Self::default()
        }
    }

    /// Parameter set pre-filled with the values the command line tools
    /// are normally run with.
    pub fn recommended(variant: ModelVariant) -> Self {
        let mut params = Self {
            wind_speed_units: Some(WindSpeedUnits::Mph),
            wind_speed: Some(0.0),
            wind_direction: Some(0.0),
            foliar_moisture_content: Some(100.0),
            crown_fire_method: Some(CrownFireMethod::Finney),
            number_processors: Some(1),
            ..Self::new(variant)
        };
        if variant == ModelVariant::Mtt {
            params.mtt = MttParameters {
                resolution: Some(100.0),
                sim_time: Some(0),
                travel_path_interval: Some(500.0),
                spot_probability: Some(0.0),
                spot_delay: Some(0),
                node_spread_num_lat: Some(6),
                node_spread_num_vert: Some(4),
                ..MttParameters::default()
            };
        }
        params
    }

    /// Requested outputs, falling back to the defaults when none are given
    /// or the list is empty
    pub fn effective_outputs(&self) -> &[OutputRequest] {
        match self.outputs.as_deref() {
            Some(list) if !list.is_empty() => list,
            _ => &DEFAULT_OUTPUTS,
        }
    }

    /// Parse a parameter set from TOML
    ///
    /// # Errors
    /// Returns [`FireModelError::Config`] on invalid TOML or values.
    pub fn from_toml_str(text: &str) -> Result<Self> {
        toml::from_str(text).map_err(|e| FireModelError::Config(e.to_string()))
    }

    /// Read a parameter set from a TOML file
    ///
    /// # Errors
    /// Returns [`FireModelError::Config`] if the file cannot be read or
    /// parsed.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path)
            .map_err(|e| FireModelError::Config(format!("{}: {e}", path.display())))?;
        Self::from_toml_str(&text)
    }
}

static DEFAULT_OUTPUTS: [OutputRequest; 5] = OutputRequest::DEFAULTS;
