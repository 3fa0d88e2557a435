//! Inputs file encoder
//!
//! Serializes a [`ParameterSet`] into the line-oriented inputs file read by
//! the simulators. The layout is fixed:
//!
//! 1. comment title and the variant's version header
//! 2. fuel moisture and conditioning
//! 3. weather and wind streams
//! 4. spread direction and gridded winds
//! 5. global wind, crown fire and processors
//! 6. variant-specific switches (MTT, TOM or Farsite only)
//! 7. requested outputs
//!
//! Which key goes where, and for which variants, is a single table
//! ([`FIELD_RULES`]). Unset fields are skipped entirely; the simulators
//! treat a present-but-empty switch differently from an absent one.

use crate::error::Result;
use crate::helpers;
use crate::params::{ParameterSet, WindSpeedUnits};
use crate::records::WeatherRecordBlock;
use crate::variant::ModelVariant;
use std::fmt::{Display, Write as _};
use std::path::{Path, PathBuf};
use tracing::info;

/// File extension the simulators expect for inputs files
pub const INPUT_FILE_EXTENSION: &str = "input";

/// Block of the inputs file a switch belongs to, in emission order
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Section {
    FuelMoisture,
    Weather,
    SpreadAndGriddedWinds,
    GlobalWindCrownFire,
    VariantSpecific,
    Outputs,
}

impl Section {
    const ORDER: [Section; 6] = [
        Section::FuelMoisture,
        Section::Weather,
        Section::SpreadAndGriddedWinds,
        Section::GlobalWindCrownFire,
        Section::VariantSpecific,
        Section::Outputs,
    ];

    /// Comment line introducing the section, `None` when the section does
    /// not exist for `variant`
    fn header(self, variant: ModelVariant) -> Option<&'static str> {
        match self {
            Section::FuelMoisture => Some("# FUEL MOISTURE AND CONDITIONING"),
            Section::Weather => Some("# WEATHER AND WIND STREAMS"),
            Section::SpreadAndGriddedWinds => Some("# SPREAD DIRECTION AND GRIDDED WINDS"),
            Section::GlobalWindCrownFire => Some("# GLOBAL WIND, CROWN FIRE AND PROCESSORS"),
            Section::VariantSpecific => match variant {
                ModelVariant::FlamMap => None,
                ModelVariant::Mtt => Some("# MINIMUM TRAVEL TIME"),
                ModelVariant::Tom => Some("# TREATMENT OPTIMIZATION"),
                ModelVariant::Farsite => Some("# FARSITE"),
            },
            Section::Outputs => Some("# REQUESTED OUTPUTS"),
        }
    }
}

/// Section comment lines written for `variant`, in order
pub fn section_headers(variant: ModelVariant) -> Vec<&'static str> {
    Section::ORDER
        .iter()
        .filter_map(|s| s.header(variant))
        .collect()
}

/// How a set field is written
pub enum Emission<'a> {
    /// `KEY: value`
    Scalar(String),
    /// `KEY: count`, the records, then a blank line
    Records(&'a WeatherRecordBlock),
}

/// One row of the field table
pub struct FieldRule {
    pub key: &'static str,
    pub variants: &'static [ModelVariant],
    pub section: Section,
    pub emit: fn(&ParameterSet) -> Option<Emission<'_>>,
}

const ALL: &[ModelVariant] = &ModelVariant::ALL;
const NOT_FARSITE: &[ModelVariant] = &[ModelVariant::FlamMap, ModelVariant::Mtt, ModelVariant::Tom];
const MTT: &[ModelVariant] = &[ModelVariant::Mtt];
const TOM: &[ModelVariant] = &[ModelVariant::Tom];
const FARSITE: &[ModelVariant] = &[ModelVariant::Farsite];

fn value<T: Display>(v: Option<&T>) -> Option<Emission<'static>> {
    v.map(|v| Emission::Scalar(v.to_string()))
}

fn path(v: Option<&PathBuf>) -> Option<Emission<'static>> {
    v.map(|p| Emission::Scalar(p.display().to_string()))
}

fn one_zero(v: Option<bool>) -> Option<Emission<'static>> {
    v.map(|b| Emission::Scalar(if b { "1" } else { "0" }.to_string()))
}

fn yes_no(v: Option<bool>) -> Option<Emission<'static>> {
    v.map(|b| Emission::Scalar(if b { "Yes" } else { "No" }.to_string()))
}

fn records(v: Option<&WeatherRecordBlock>) -> Option<Emission<'_>> {
    v.map(Emission::Records)
}

/// Every switch the encoder knows, in emission order within its section
pub const FIELD_RULES: &[FieldRule] = &[
    // Fuel moisture and conditioning
    FieldRule {
        key: "CONDITIONING_PERIOD_END",
        variants: NOT_FARSITE,
        section: Section::FuelMoisture,
        emit: |p| value(p.conditioning_period_end.as_ref()),
    },
    FieldRule {
        key: "FUEL_MOISTURES_DATA",
        variants: ALL,
        section: Section::FuelMoisture,
        emit: |p| records(p.fuel_moistures.as_ref()),
    },
    FieldRule {
        key: "CUSTOM_FUELS_FILE",
        variants: ALL,
        section: Section::FuelMoisture,
        emit: |p| path(p.custom_fuels_file.as_ref()),
    },
    // Weather and wind streams
    FieldRule {
        key: "RAWS_UNITS",
        variants: ALL,
        section: Section::Weather,
        emit: |p| value(p.raws_units.as_ref()),
    },
    FieldRule {
        key: "RAWS_ELEVATION",
        variants: ALL,
        section: Section::Weather,
        emit: |p| value(p.raws_elevation.as_ref()),
    },
    FieldRule {
        key: "RAWS",
        variants: ALL,
        section: Section::Weather,
        emit: |p| records(p.raws.as_ref()),
    },
    FieldRule {
        key: "WEATHER_DATA_UNITS",
        variants: ALL,
        section: Section::Weather,
        emit: |p| value(p.weather_data_units.as_ref()),
    },
    FieldRule {
        key: "WEATHER_DATA",
        variants: ALL,
        section: Section::Weather,
        emit: |p| records(p.weather_data.as_ref()),
    },
    FieldRule {
        key: "WIND_DATA_UNITS",
        variants: ALL,
        section: Section::Weather,
        emit: |p| value(p.wind_data_units.as_ref()),
    },
    FieldRule {
        key: "WIND_DATA",
        variants: ALL,
        section: Section::Weather,
        emit: |p| records(p.wind_data.as_ref()),
    },
    // Spread direction and gridded winds
    FieldRule {
        key: "SPREAD_DIRECTION_FROM_NORTH",
        variants: ALL,
        section: Section::SpreadAndGriddedWinds,
        emit: |p| value(p.spread_direction_from_north.as_ref()),
    },
    FieldRule {
        key: "SPREAD_DIRECTION_FROM_MAX",
        variants: ALL,
        section: Section::SpreadAndGriddedWinds,
        emit: |p| value(p.spread_direction_from_max.as_ref()),
    },
    FieldRule {
        key: "GRIDDED_WIND_SPEED_FILE",
        variants: ALL,
        section: Section::SpreadAndGriddedWinds,
        emit: |p| path(p.gridded_wind_speed_file.as_ref()),
    },
    FieldRule {
        key: "GRIDDED_WINDS_DIRECTION_FILE",
        variants: ALL,
        section: Section::SpreadAndGriddedWinds,
        emit: |p| path(p.gridded_wind_direction_file.as_ref()),
    },
    FieldRule {
        key: "GRIDDED_WINDS_GENERATE",
        variants: ALL,
        section: Section::SpreadAndGriddedWinds,
        emit: |p| yes_no(p.gridded_winds_generate),
    },
    FieldRule {
        key: "GRIDDED_WINDS_RESOLUTION",
        variants: ALL,
        section: Section::SpreadAndGriddedWinds,
        emit: |p| value(p.gridded_winds_resolution.as_ref()),
    },
    FieldRule {
        key: "GRIDDED_WINDS_DIURNAL",
        variants: ALL,
        section: Section::SpreadAndGriddedWinds,
        emit: |p| yes_no(p.gridded_winds_diurnal),
    },
    FieldRule {
        key: "GRIDDED_WINDS_DIURNAL_AIRTEMP",
        variants: ALL,
        section: Section::SpreadAndGriddedWinds,
        emit: |p| value(p.gridded_winds_diurnal_airtemp.as_ref()),
    },
    FieldRule {
        key: "GRIDDED_WINDS_DIURNAL_CLOUDCOVER",
        variants: ALL,
        section: Section::SpreadAndGriddedWinds,
        emit: |p| value(p.gridded_winds_diurnal_cloudcover.as_ref()),
    },
    FieldRule {
        key: "GRIDDED_WINDS_DIURNAL_LONGITUDE",
        variants: ALL,
        section: Section::SpreadAndGriddedWinds,
        emit: |p| value(p.gridded_winds_diurnal_longitude.as_ref()),
    },
    FieldRule {
        key: "GRIDDED_WINDS_DIURNAL_DATE",
        variants: ALL,
        section: Section::SpreadAndGriddedWinds,
        emit: |p| value(p.gridded_winds_diurnal_date.as_ref()),
    },
    FieldRule {
        key: "GRIDDED_WINDS_DIURNAL_TIME",
        variants: ALL,
        section: Section::SpreadAndGriddedWinds,
        emit: |p| value(p.gridded_winds_diurnal_time.as_ref()),
    },
    // Global wind, crown fire and processors
    FieldRule {
        key: "WIND_SPEED_UNITS",
        variants: ALL,
        section: Section::GlobalWindCrownFire,
        emit: |p| value(p.wind_speed_units.map(WindSpeedUnits::code).as_ref()),
    },
    FieldRule {
        key: "WIND_SPEED",
        variants: ALL,
        section: Section::GlobalWindCrownFire,
        emit: |p| value(p.wind_speed.as_ref()),
    },
    FieldRule {
        key: "WIND_DIRECTION",
        variants: ALL,
        section: Section::GlobalWindCrownFire,
        emit: |p| value(p.wind_direction.as_ref()),
    },
    FieldRule {
        key: "FOLIAR_MOISTURE_CONTENT",
        variants: ALL,
        section: Section::GlobalWindCrownFire,
        emit: |p| value(p.foliar_moisture_content.as_ref()),
    },
    FieldRule {
        key: "CROWN_FIRE_METHOD",
        variants: ALL,
        section: Section::GlobalWindCrownFire,
        emit: |p| value(p.crown_fire_method.as_ref()),
    },
    FieldRule {
        key: "NUMBER_PROCESSORS",
        variants: ALL,
        section: Section::GlobalWindCrownFire,
        emit: |p| value(p.number_processors.as_ref()),
    },
    // Minimum travel time
    FieldRule {
        key: "MTT_RESOLUTION",
        variants: MTT,
        section: Section::VariantSpecific,
        emit: |p| value(p.mtt.resolution.as_ref()),
    },
    FieldRule {
        key: "MTT_SIM_TIME",
        variants: MTT,
        section: Section::VariantSpecific,
        emit: |p| value(p.mtt.sim_time.as_ref()),
    },
    FieldRule {
        key: "MTT_TRAVEL_PATH_INTERVAL",
        variants: MTT,
        section: Section::VariantSpecific,
        emit: |p| value(p.mtt.travel_path_interval.as_ref()),
    },
    FieldRule {
        key: "MTT_SPOT_PROBABILITY",
        variants: MTT,
        section: Section::VariantSpecific,
        emit: |p| value(p.mtt.spot_probability.as_ref()),
    },
    FieldRule {
        key: "MTT_SPOT_DELAY",
        variants: MTT,
        section: Section::VariantSpecific,
        emit: |p| value(p.mtt.spot_delay.as_ref()),
    },
    FieldRule {
        key: "MTT_IGNITION_FILE",
        variants: MTT,
        section: Section::VariantSpecific,
        emit: |p| path(p.mtt.ignition_file.as_ref()),
    },
    FieldRule {
        key: "MTT_BARRIER_FILE",
        variants: MTT,
        section: Section::VariantSpecific,
        emit: |p| path(p.mtt.barrier_file.as_ref()),
    },
    FieldRule {
        key: "MTT_FILL_BARRIERS",
        variants: MTT,
        section: Section::VariantSpecific,
        emit: |p| one_zero(p.mtt.fill_barriers),
    },
    FieldRule {
        key: "SPOTTING_SEED",
        variants: MTT,
        section: Section::VariantSpecific,
        emit: |p| value(p.mtt.spotting_seed.as_ref()),
    },
    FieldRule {
        key: "NodeSpreadNumLat",
        variants: MTT,
        section: Section::VariantSpecific,
        emit: |p| value(p.mtt.node_spread_num_lat.as_ref()),
    },
    FieldRule {
        key: "NodeSpreadNumVert",
        variants: MTT,
        section: Section::VariantSpecific,
        emit: |p| value(p.mtt.node_spread_num_vert.as_ref()),
    },
    // Treatment optimization
    FieldRule {
        key: "TREAT_RESOLUTION",
        variants: TOM,
        section: Section::VariantSpecific,
        emit: |p| value(p.tom.resolution.as_ref()),
    },
    FieldRule {
        key: "TREAT_IGNITION_FILE",
        variants: TOM,
        section: Section::VariantSpecific,
        emit: |p| path(p.tom.ignition_file.as_ref()),
    },
    FieldRule {
        key: "TREAT_IDEAL_LANDSCAPE",
        variants: TOM,
        section: Section::VariantSpecific,
        emit: |p| path(p.tom.ideal_landscape.as_ref()),
    },
    FieldRule {
        key: "TREAT_ITERATIONS",
        variants: TOM,
        section: Section::VariantSpecific,
        emit: |p| value(p.tom.iterations.as_ref()),
    },
    FieldRule {
        key: "TREAT_DIMENSION",
        variants: TOM,
        section: Section::VariantSpecific,
        emit: |p| value(p.tom.dimension.as_ref()),
    },
    FieldRule {
        key: "TREAT_FRACTION",
        variants: TOM,
        section: Section::VariantSpecific,
        emit: |p| value(p.tom.fraction.as_ref()),
    },
    FieldRule {
        key: "TREAT_OPPORTUNITIES_ONLY",
        variants: TOM,
        section: Section::VariantSpecific,
        emit: |p| one_zero(p.tom.opportunities_only),
    },
    // Farsite
    FieldRule {
        key: "FARSITE_START_TIME",
        variants: FARSITE,
        section: Section::VariantSpecific,
        emit: |p| value(p.farsite.start_time.as_ref()),
    },
    FieldRule {
        key: "FARSITE_END_TIME",
        variants: FARSITE,
        section: Section::VariantSpecific,
        emit: |p| value(p.farsite.end_time.as_ref()),
    },
    FieldRule {
        key: "FARSITE_TIMESTEP",
        variants: FARSITE,
        section: Section::VariantSpecific,
        emit: |p| value(p.farsite.timestep.as_ref()),
    },
    FieldRule {
        key: "FARSITE_DISTANCE_RES",
        variants: FARSITE,
        section: Section::VariantSpecific,
        emit: |p| value(p.farsite.distance_res.as_ref()),
    },
    FieldRule {
        key: "FARSITE_PERIMETER_RES",
        variants: FARSITE,
        section: Section::VariantSpecific,
        emit: |p| value(p.farsite.perimeter_res.as_ref()),
    },
    FieldRule {
        key: "FARSITE_SPOT_GRID_RESOLUTION",
        variants: FARSITE,
        section: Section::VariantSpecific,
        emit: |p| value(p.farsite.spot_grid_resolution.as_ref()),
    },
    FieldRule {
        key: "FARSITE_SPOT_PROBABILITY",
        variants: FARSITE,
        section: Section::VariantSpecific,
        emit: |p| value(p.farsite.spot_probability.as_ref()),
    },
    FieldRule {
        key: "FARSITE_SPOT_IGNITION_DELAY",
        variants: FARSITE,
        section: Section::VariantSpecific,
        emit: |p| value(p.farsite.spot_ignition_delay.as_ref()),
    },
    FieldRule {
        key: "FARSITE_MIN_IGNITION_VERTEX_DISTANCE",
        variants: FARSITE,
        section: Section::VariantSpecific,
        emit: |p| value(p.farsite.min_ignition_vertex_distance.as_ref()),
    },
    FieldRule {
        key: "FARSITE_MINIMUM_SPOT_DISTANCE",
        variants: FARSITE,
        section: Section::VariantSpecific,
        emit: |p| value(p.farsite.minimum_spot_distance.as_ref()),
    },
    FieldRule {
        key: "SPOTTING_SEED",
        variants: FARSITE,
        section: Section::VariantSpecific,
        emit: |p| value(p.farsite.spotting_seed.as_ref()),
    },
    FieldRule {
        key: "FARSITE_ACCELERATION_ON",
        variants: FARSITE,
        section: Section::VariantSpecific,
        emit: |p| one_zero(p.farsite.acceleration_on),
    },
    FieldRule {
        key: "FARSITE_IGNITION_FILE",
        variants: FARSITE,
        section: Section::VariantSpecific,
        emit: |p| path(p.farsite.ignition_file.as_ref()),
    },
    FieldRule {
        key: "FARSITE_BURN_PERIODS",
        variants: FARSITE,
        section: Section::VariantSpecific,
        emit: |p| records(p.farsite.burn_periods.as_ref()),
    },
    FieldRule {
        key: "FARSITE_BARRIER_FILE",
        variants: FARSITE,
        section: Section::VariantSpecific,
        emit: |p| path(p.farsite.barrier_file.as_ref()),
    },
    FieldRule {
        key: "FARSITE_FILL_BARRIERS",
        variants: FARSITE,
        section: Section::VariantSpecific,
        emit: |p| one_zero(p.farsite.fill_barriers),
    },
    FieldRule {
        key: "ROS_ADJUST_FILE",
        variants: FARSITE,
        section: Section::VariantSpecific,
        emit: |p| path(p.farsite.ros_adjust_file.as_ref()),
    },
];

/// Keys that may appear in an inputs file for `variant`
pub fn keys_for(variant: ModelVariant) -> impl Iterator<Item = &'static str> {
    FIELD_RULES
        .iter()
        .filter(move |rule| rule.variants.contains(&variant))
        .map(|rule| rule.key)
}

/// Render the inputs file for `params`. `title` only appears in the opening
/// comment line.
pub fn encode_input(params: &ParameterSet, title: &str) -> String {
    let variant = params.variant;
    let mut out = String::new();

    // `fmt::Write` into a String cannot fail
    let _ = writeln!(out, "# {} INPUT FILE FOR {title}", variant.as_str().to_uppercase());
    let _ = writeln!(out, "{}", variant.header());
    out.push('\n');

    for section in Section::ORDER {
        let Some(header) = section.header(variant) else {
            continue;
        };
        let _ = writeln!(out, "{header}");

        if section == Section::Outputs {
            for output in params.effective_outputs() {
                let _ = writeln!(out, "{}:", output.key());
            }
            continue;
        }

        for rule in FIELD_RULES
            .iter()
            .filter(|r| r.section == section && r.variants.contains(&variant))
        {
            match (rule.emit)(params) {
                Some(Emission::Scalar(v)) => {
                    let _ = writeln!(out, "{}: {v}", rule.key);
                }
                Some(Emission::Records(block)) => {
                    let _ = writeln!(out, "{}: {}", rule.key, block.count());
                    for row in block.rows() {
                        let _ = writeln!(out, "{row}");
                    }
                    out.push('\n');
                }
                None => {}
            }
        }
        out.push('\n');
    }

    out
}

/// `<out_dir>/<name>.input`
pub fn input_file_path(out_dir: impl AsRef<Path>, name: &str) -> PathBuf {
    out_dir
        .as_ref()
        .join(format!("{name}.{INPUT_FILE_EXTENSION}"))
}

/// Write the inputs file for `params` to `path`, replacing any existing
/// file, and return its absolute path.
///
/// # Errors
/// Returns [`crate::FireModelError::WriteError`] if the old file cannot be
/// removed or the new one cannot be written.
pub fn write_input_file(params: &ParameterSet, path: impl AsRef<Path>) -> Result<PathBuf> {
    let path = path.as_ref();
    let title = path
        .file_stem()
        .map_or_else(String::new, |s| s.to_string_lossy().into_owned());
    let written = helpers::overwrite(path, &encode_input(params, &title))?;
    info!(
        "Wrote {} inputs file to {}",
        params.variant,
        written.display()
    );
    Ok(written)
}
