//! Simulator registry
//!
//! Maps each [`ModelVariant`] to the executable that runs it. The registry is
//! built once and handed to the supervisor; nothing here is global.
//!
//! TOML layout:
//!
//! ```toml
//! [simulators]
//! FlamMap = "/opt/fire/bin/TestFlamMap"
//! MTT = { executable = "/opt/fire/bin/TestMTT", process_name = "TestMTT" }
//! ```

use crate::error::{FireModelError, Result};
use crate::variant::ModelVariant;
use rustc_hash::FxHashMap;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

/// One registered simulator executable
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SimulatorBinary {
    /// Program launched by the supervisor
    pub executable: PathBuf,
    /// Name the leftover worker processes run under
    pub process_name: String,
}

impl SimulatorBinary {
    /// Binary whose process name is the executable's file stem
    pub fn new(executable: impl Into<PathBuf>) -> Self {
        let executable = executable.into();
        let process_name = process_name_of(&executable);
        Self {
            executable,
            process_name,
        }
    }

    /// Override the process name used by the orphan sweep
    #[must_use]
    pub fn with_process_name(mut self, name: impl Into<String>) -> Self {
        self.process_name = name.into();
        self
    }
}

pub(crate) fn process_name_of(executable: &Path) -> String {
    executable
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// Immutable variant to executable lookup
#[derive(Debug, Clone, Default)]
pub struct SimulatorRegistry {
    binaries: FxHashMap<ModelVariant, SimulatorBinary>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum BinaryEntry {
    Path(PathBuf),
    Full {
        executable: PathBuf,
        process_name: Option<String>,
    },
}

#[derive(Deserialize)]
struct RegistryFile {
    #[serde(default)]
    simulators: BTreeMap<String, BinaryEntry>,
}

impl SimulatorRegistry {
    /// Empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `binary` for `variant`, replacing any previous entry
    #[must_use]
    pub fn with_binary(mut self, variant: ModelVariant, binary: SimulatorBinary) -> Self {
        self.binaries.insert(variant, binary);
        self
    }

    /// Registry for the standard executable names inside `dir`.
    ///
    /// TOM runs on the MTT executable.
    pub fn from_bin_dir(dir: impl AsRef<Path>) -> Self {
        let dir = dir.as_ref();
        ModelVariant::ALL
            .into_iter()
            .fold(Self::new(), |registry, variant| {
                let file = format!("{}{}", variant.binary_name(), std::env::consts::EXE_SUFFIX);
                registry.with_binary(
                    variant,
                    SimulatorBinary::new(dir.join(file)).with_process_name(variant.binary_name()),
                )
            })
    }

    /// Parse a registry from a TOML document
    ///
    /// # Errors
    /// Returns [`FireModelError::Config`] on invalid TOML or an unknown
    /// variant name.
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let file: RegistryFile =
            toml::from_str(text).map_err(|e| FireModelError::Config(e.to_string()))?;

        let mut registry = Self::new();
        for (name, entry) in file.simulators {
            let variant: ModelVariant = name.parse().map_err(FireModelError::Config)?;
            let binary = match entry {
                BinaryEntry::Path(executable) => SimulatorBinary::new(executable),
                BinaryEntry::Full {
                    executable,
                    process_name,
                } => {
                    let binary = SimulatorBinary::new(executable);
                    match process_name {
                        Some(name) => binary.with_process_name(name),
                        None => binary,
                    }
                }
            };
            registry = registry.with_binary(variant, binary);
        }
        Ok(registry)
    }

    /// Read a registry TOML file
    ///
    /// # Errors
    /// Returns [`FireModelError::Config`] when the file cannot be read or
    /// parsed.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path)
            .map_err(|e| FireModelError::Config(format!("{}: {e}", path.display())))?;
        Self::from_toml_str(&text)
    }

    pub fn get(&self, variant: ModelVariant) -> Option<&SimulatorBinary> {
        self.binaries.get(&variant)
    }

    pub fn len(&self) -> usize {
        self.binaries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.binaries.is_empty()
    }
}
