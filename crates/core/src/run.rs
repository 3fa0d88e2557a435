//! End-to-end run of one simulator scenario
//!
//! A [`RunDefinition`] (usually read from TOML) names the landscape, the
//! parameter set and the ignition/barrier inputs. [`execute_run`] builds the
//! landscape when it does not exist yet, writes the inputs and command
//! files into the working directory and hands the command file to the
//! supervisor.

use crate::command::{write_command_file, CommandRecord, OutputFormat};
use crate::encoder::{input_file_path, write_input_file};
use crate::error::{FireModelError, Result};
use crate::landscape::{build_landscape, landscape_resolution, LandscapeSources};
use crate::params::ParameterSet;
use crate::supervisor::{ProcessResult, ProcessSupervisor};
use crate::variant::ModelVariant;
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

/// Paths of the eight landscape source rasters
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SourcePaths {
    pub elevation: PathBuf,
    pub slope: PathBuf,
    pub aspect: PathBuf,
    pub fuel_model: PathBuf,
    pub canopy_cover: PathBuf,
    pub canopy_height: PathBuf,
    pub canopy_base_height: PathBuf,
    pub canopy_bulk_density: PathBuf,
}

impl SourcePaths {
    fn each_mut(&mut self) -> [&mut PathBuf; 8] {
        [
            &mut self.elevation,
            &mut self.slope,
            &mut self.aspect,
            &mut self.fuel_model,
            &mut self.canopy_cover,
            &mut self.canopy_height,
            &mut self.canopy_base_height,
            &mut self.canopy_bulk_density,
        ]
    }
}

impl From<SourcePaths> for LandscapeSources {
    fn from(paths: SourcePaths) -> Self {
        LandscapeSources::from_ordered([
            paths.elevation,
            paths.slope,
            paths.aspect,
            paths.fuel_model,
            paths.canopy_cover,
            paths.canopy_height,
            paths.canopy_base_height,
            paths.canopy_bulk_density,
        ])
    }
}

/// Landscape container of a run, optionally with the rasters to build it
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct LandscapeDefinition {
    pub path: PathBuf,
    #[serde(default)]
    pub sources: Option<SourcePaths>,
}

/// Everything needed to run one scenario
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RunDefinition {
    /// Base name of the inputs and command files
    pub name: String,
    /// Directory receiving the inputs and command files
    pub work_dir: PathBuf,
    pub landscape: LandscapeDefinition,
    pub ignition: PathBuf,
    #[serde(default)]
    pub barrier: Option<PathBuf>,
    /// Defaults to `<work_dir>/<name>`
    #[serde(default)]
    pub output_base: Option<PathBuf>,
    #[serde(default)]
    pub output_format: OutputFormat,
    pub parameters: ParameterSet,
}

impl RunDefinition {
    /// Parse a TOML run definition. Relative paths are kept as written.
    ///
    /// # Errors
    /// Returns [`FireModelError::Config`] on invalid TOML.
    pub fn from_toml_str(text: &str) -> Result<Self> {
        toml::from_str(text).map_err(|e| FireModelError::Config(e.to_string()))
    }

    /// Read a TOML run definition; relative paths resolve against the
    /// file's directory.
    ///
    /// # Errors
    /// Returns [`FireModelError::Config`] if the file cannot be read or
    /// parsed.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path)
            .map_err(|e| FireModelError::Config(format!("{}: {e}", path.display())))?;
        let mut definition = Self::from_toml_str(&text)?;
        if let Some(base) = path.parent() {
            definition.resolve_against(base);
        }
        Ok(definition)
    }

    fn resolve_against(&mut self, base: &Path) {
        let resolve = |p: &mut PathBuf| {
            if p.is_relative() {
                *p = base.join(&*p);
            }
        };
        resolve(&mut self.work_dir);
        resolve(&mut self.landscape.path);
        resolve(&mut self.ignition);
        if let Some(sources) = &mut self.landscape.sources {
            sources.each_mut().into_iter().for_each(resolve);
        }
        if let Some(barrier) = &mut self.barrier {
            resolve(barrier);
        }
        if let Some(output_base) = &mut self.output_base {
            resolve(output_base);
        }
    }

    pub fn variant(&self) -> ModelVariant {
        self.parameters.variant
    }
}

/// Files produced by a run and the simulator's output
#[derive(Debug, Clone)]
pub struct RunOutcome {
    pub landscape: PathBuf,
    pub input_file: PathBuf,
    pub command_file: PathBuf,
    pub result: ProcessResult,
}

/// Write a run's files and execute it.
///
/// For MTT runs without an explicit resolution, the landscape's pixel size is
/// used.
///
/// # Errors
/// Any error of the landscape codec, the encoder, the command file writer
/// or the supervisor. A missing landscape without sources is
/// [`FireModelError::SourceNotFound`].
pub fn execute_run(definition: RunDefinition, supervisor: &ProcessSupervisor) -> Result<RunOutcome> {
    let RunDefinition {
        name,
        work_dir,
        landscape,
        ignition,
        barrier,
        output_base,
        output_format,
        mut parameters,
    } = definition;

    let landscape_path = if landscape.path.exists() {
        info!("Reusing landscape {}", landscape.path.display());
        std::path::absolute(&landscape.path)
            .map_err(|_| FireModelError::SourceNotFound(landscape.path.clone()))?
    } else if let Some(sources) = landscape.sources {
        build_landscape(sources.into(), &landscape.path)?.path
    } else {
        return Err(FireModelError::SourceNotFound(landscape.path));
    };

    if parameters.variant == ModelVariant::Mtt && parameters.mtt.resolution.is_none() {
        parameters.mtt.resolution = Some(landscape_resolution(&landscape_path)?);
    }

    fs::create_dir_all(&work_dir).map_err(|e| FireModelError::write(&work_dir, e))?;
    let input_file = write_input_file(&parameters, input_file_path(&work_dir, &name))?;

    let record = CommandRecord {
        landscape: landscape_path.clone(),
        input: input_file.clone(),
        ignition,
        barrier,
        output_base: output_base.unwrap_or_else(|| work_dir.join(&name)),
        format: output_format,
    };
    let command_file = write_command_file(work_dir.join(format!("{name}Cmd.txt")), &[record])?;

    let result = supervisor.run(parameters.variant, &command_file)?;
    Ok(RunOutcome {
        landscape: landscape_path,
        input_file,
        command_file,
        result,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SimulatorRegistry;
    use crate::records::WeatherRecordBlock;

    const DEFINITION: &str = r#"
        name = "scenario"
        work_dir = "runs"
        ignition = "ign.shp"
        output_format = "GeoTiff"

        [landscape]
        path = "lcp.tif"

        [parameters]
        variant = "Farsite"
        wind_speed = 12.0

        [parameters.farsite]
        start_time = "08 07 1000"
        burn_periods = ["08 07 1000 1800"]
    "#;

    #[test]
    fn test_parse_definition() {
        let definition = RunDefinition::from_toml_str(DEFINITION).unwrap();
        assert_eq!(definition.variant(), ModelVariant::Farsite);
        assert_eq!(definition.output_format, OutputFormat::GeoTiff);
        assert_eq!(definition.parameters.wind_speed, Some(12.0));
        assert_eq!(
            definition
                .parameters
                .farsite
                .burn_periods
                .as_ref()
                .map(WeatherRecordBlock::count),
            Some(1)
        );
        assert!(definition.landscape.sources.is_none());
    }

    #[test]
    fn test_relative_paths_resolve_against_file() {
        let mut definition = RunDefinition::from_toml_str(DEFINITION).unwrap();
        definition.resolve_against(Path::new("/data/project"));
        assert_eq!(definition.work_dir, PathBuf::from("/data/project/runs"));
        assert_eq!(definition.ignition, PathBuf::from("/data/project/ign.shp"));
    }

    #[test]
    fn test_missing_landscape_without_sources() {
        let dir = tempfile::tempdir().unwrap();
        let mut definition = RunDefinition::from_toml_str(DEFINITION).unwrap();
        definition.resolve_against(dir.path());

        let supervisor = ProcessSupervisor::new(SimulatorRegistry::new());
        let err = execute_run(definition, &supervisor).unwrap_err();
        assert!(matches!(err, FireModelError::SourceNotFound(p) if p.ends_with("lcp.tif")));
    }
}
