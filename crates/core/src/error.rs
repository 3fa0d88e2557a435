//! Error type shared by the landscape codec, the input-file encoder and the
//! process supervisor.

use crate::variant::ModelVariant;
use std::fmt;
use std::io;
use std::path::PathBuf;

/// Convenience alias used across the crate.
pub type Result<T> = std::result::Result<T, FireModelError>;

/// Errors surfaced by the fire model runner.
///
/// Every failure is reported synchronously. Writers make no atomicity promise:
/// a failed write may leave no file or a stale one behind.
#[derive(Debug)]
pub enum FireModelError {
    /// A raster source does not exist on disk.
    SourceNotFound(PathBuf),
    /// A raster source exists but could not be opened or decoded.
    SourceRead {
        /// Path of the offending raster
        path: PathBuf,
        /// Decoder message
        message: String,
    },
    /// A band's grid does not match the reference (first) band.
    ShapeMismatch {
        /// Short name of the offending band (e.g. `"slope"`)
        band: &'static str,
        /// Description of the reference grid
        expected: String,
        /// Description of the offending grid
        found: String,
    },
    /// A record table is not a uniform table of equal-arity rows.
    MalformedTable {
        /// Zero-based index of the first bad row
        row: usize,
        /// What is wrong with it
        message: String,
    },
    /// Writing an output file failed.
    WriteError {
        /// Target path
        path: PathBuf,
        /// Underlying I/O error
        source: io::Error,
    },
    /// No executable is registered for the requested variant.
    UnknownVariant(ModelVariant),
    /// The simulator executable could not be launched.
    ProcessSpawnError {
        /// Program that failed to start
        program: PathBuf,
        /// Underlying I/O error
        source: io::Error,
    },
    /// Enumerating or terminating leftover simulator processes failed for a
    /// reason other than the process already being gone.
    OrphanSweep(io::Error),
    /// A configuration or run definition document is invalid.
    Config(String),
}

impl FireModelError {
    pub(crate) fn write(path: impl Into<PathBuf>, source: io::Error) -> Self {
        FireModelError::WriteError {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn source_read(path: impl Into<PathBuf>, message: impl fmt::Display) -> Self {
        FireModelError::SourceRead {
            path: path.into(),
            message: message.to_string(),
        }
    }
}

impl fmt::Display for FireModelError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FireModelError::SourceNotFound(path) => {
                write!(f, "Raster source not found: {}", path.display())
            }
            FireModelError::SourceRead { path, message } => {
                write!(f, "Failed to read raster {}: {message}", path.display())
            }
            FireModelError::ShapeMismatch {
                band,
                expected,
                found,
            } => write!(
                f,
                "Raster size mismatch in band '{band}': expected {expected}, got {found}"
            ),
            FireModelError::MalformedTable { row, message } => {
                write!(f, "Malformed record table at row {row}: {message}")
            }
            FireModelError::WriteError { path, source } => {
                write!(f, "Failed to write {}: {source}", path.display())
            }
            FireModelError::UnknownVariant(variant) => {
                write!(f, "No simulator executable registered for {variant}")
            }
            FireModelError::ProcessSpawnError { program, source } => {
                write!(f, "Failed to launch {}: {source}", program.display())
            }
            FireModelError::OrphanSweep(source) => {
                write!(f, "Failed to clean up simulator processes: {source}")
            }
            FireModelError::Config(msg) => write!(f, "Invalid configuration: {msg}"),
        }
    }
}

impl std::error::Error for FireModelError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            FireModelError::WriteError { source, .. }
            | FireModelError::ProcessSpawnError { source, .. }
            | FireModelError::OrphanSweep(source) => Some(source),
            _ => None,
        }
    }
}
