//! Fire Model Runner Core Library
//!
//! Automates the `FlamMap` family of command line fire behavior simulators
//! (`FlamMap`, MTT, TOM and Farsite). The simulators themselves are opaque
//! executables; this crate produces the files they read and supervises
//! their execution:
//!
//! - [`landscape`] stacks eight terrain and fuel rasters into the landscape
//!   container
//! - [`records`] formats weather, wind, fuel moisture and burn period tables
//!   into inline record blocks
//! - [`encoder`] writes the variant-specific inputs file
//! - [`command`] writes the command file binding a run's inputs together
//! - [`supervisor`] launches a simulator, captures its output and cleans up
//!   the processes it leaves behind
//! - [`run`] strings the above together for one scenario

// Shared types
pub mod error;
pub mod variant;

// Configuration
pub mod config;
pub mod params;

// File formats
pub mod command;
pub mod encoder;
pub mod landscape;
pub mod records;

// Execution
pub mod run;
pub mod supervisor;

mod helpers;

pub use config::{SimulatorBinary, SimulatorRegistry};
pub use error::{FireModelError, Result};
pub use variant::ModelVariant;

pub use command::{write_command_file, CommandRecord, OutputFormat};
pub use encoder::{encode_input, input_file_path, section_headers, write_input_file};
pub use landscape::{
    build_landscape, landscape_resolution, BandRole, BandSource, LandscapeInfo, LandscapeSources,
    RasterBand, NODATA,
};
pub use params::{
    CrownFireMethod, FarsiteParameters, MttParameters, OutputRequest, ParameterSet,
    SpottingSeed, TomParameters, UnitSystem, WindSpeedUnits,
};
pub use records::{format_records, RecordOrder, RecordTable, RecordValue, WeatherRecordBlock};
pub use run::{execute_run, RunDefinition, RunOutcome};
pub use supervisor::{ProcessResult, ProcessSupervisor};
