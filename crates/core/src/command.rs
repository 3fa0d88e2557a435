//! Command file writer
//!
//! A command file binds a landscape, an inputs file, ignition and barrier
//! files and an output location into one line per run. One file can drive
//! several batched runs.

use crate::error::Result;
use crate::helpers;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use tracing::info;

/// Raster format(s) the simulator writes outputs in
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum OutputFormat {
    /// ASCII grid and `GeoTIFF`
    #[default]
    Both,
    AsciiGrid,
    GeoTiff,
}

impl OutputFormat {
    /// Integer code used in the command file
    pub fn code(self) -> u8 {
        match self {
            OutputFormat::Both => 0,
            OutputFormat::AsciiGrid => 1,
            OutputFormat::GeoTiff => 2,
        }
    }
}

/// One run of a command file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommandRecord {
    pub landscape: PathBuf,
    pub input: PathBuf,
    pub ignition: PathBuf,
    /// Written as `0` when absent
    #[serde(default)]
    pub barrier: Option<PathBuf>,
    /// Directory and name prefix of the output layers
    pub output_base: PathBuf,
    #[serde(default)]
    pub format: OutputFormat,
}

impl fmt::Display for CommandRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} {} ",
            self.landscape.display(),
            self.input.display(),
            self.ignition.display()
        )?;
        match &self.barrier {
            Some(barrier) => write!(f, "{}", barrier.display())?,
            None => f.write_str("0")?,
        }
        write!(f, " {} {}", self.output_base.display(), self.format.code())
    }
}

/// Write `records`, one per line, to `path`, replacing any existing file.
/// Returns the absolute path of the command file.
///
/// # Errors
/// Returns [`crate::FireModelError::WriteError`] when the file cannot be
/// replaced.
pub fn write_command_file(path: impl AsRef<Path>, records: &[CommandRecord]) -> Result<PathBuf> {
    let mut contents = String::new();
    for record in records {
        contents.push_str(&record.to_string());
        contents.push('\n');
    }
    let written = helpers::overwrite(path.as_ref(), &contents)?;
    info!(
        "Wrote command file with {} run(s) to {}",
        records.len(),
        written.display()
    );
    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(barrier: Option<&str>, format: OutputFormat) -> CommandRecord {
        CommandRecord {
            landscape: PathBuf::from("/data/lcp.tif"),
            input: PathBuf::from("/data/run.input"),
            ignition: PathBuf::from("/data/ign.shp"),
            barrier: barrier.map(PathBuf::from),
            output_base: PathBuf::from("/data/out/run"),
            format,
        }
    }

    #[test]
    fn test_line_without_barrier() {
        assert_eq!(
            record(None, OutputFormat::GeoTiff).to_string(),
            "/data/lcp.tif /data/run.input /data/ign.shp 0 /data/out/run 2"
        );
    }

    #[test]
    fn test_line_with_barrier() {
        assert_eq!(
            record(Some("/data/bar.shp"), OutputFormat::Both).to_string(),
            "/data/lcp.tif /data/run.input /data/ign.shp /data/bar.shp /data/out/run 0"
        );
    }

    #[test]
    fn test_write_one_line_per_record() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("runCmd.txt");
        std::fs::write(&path, "previous\ncontents\nthat\nare\nlonger\n").unwrap();

        let records = [
            record(None, OutputFormat::AsciiGrid),
            record(Some("/b.shp"), OutputFormat::GeoTiff),
        ];
        let written = write_command_file(&path, &records).unwrap();

        let text = std::fs::read_to_string(written).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].ends_with(" 0 /data/out/run 1"));
        assert!(lines[1].ends_with(" /b.shp /data/out/run 2"));
    }
}
