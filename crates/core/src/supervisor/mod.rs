//! Simulator process supervision
//!
//! Runs a simulator executable on a command file, blocks until it exits and
//! returns what it printed. The executable is looked up in a
//! [`SimulatorRegistry`] handed in at construction. After every run the
//! processes the simulator left behind are swept up (see [`sweep`]).
//!
//! There is no timeout: the caller blocks until the simulator exits. If the
//! supervising process is killed first, the sweep never runs.

pub mod sweep;

use crate::config::{process_name_of, SimulatorBinary, SimulatorRegistry};
use crate::error::{FireModelError, Result};
use crate::variant::ModelVariant;
use std::fs;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::thread::{self, JoinHandle};
use tracing::{debug, info, warn};

/// Captured output of one simulator run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProcessResult {
    pub stdout: String,
    pub stderr: String,
    /// `None` when the simulator was terminated by a signal
    pub exit_code: Option<i32>,
}

impl ProcessResult {
    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }
}

/// Launches simulators registered in a [`SimulatorRegistry`]
#[derive(Debug, Clone)]
pub struct ProcessSupervisor {
    registry: SimulatorRegistry,
}

impl ProcessSupervisor {
    pub fn new(registry: SimulatorRegistry) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &SimulatorRegistry {
        &self.registry
    }

    /// Run the simulator registered for `variant` on `command_file`.
    ///
    /// The exit status is reported, not interpreted.
    ///
    /// # Errors
    /// - [`FireModelError::UnknownVariant`] if no executable is registered;
    ///   nothing is spawned
    /// - [`FireModelError::ProcessSpawnError`] if the executable cannot be
    ///   started or waited on
    /// - [`FireModelError::OrphanSweep`] if cleaning up leftover processes
    ///   fails
    pub fn run(&self, variant: ModelVariant, command_file: impl AsRef<Path>) -> Result<ProcessResult> {
        let binary = self
            .registry
            .get(variant)
            .ok_or(FireModelError::UnknownVariant(variant))?;
        execute(binary, command_file.as_ref())
    }

    /// Run `executable` instead of the registered one. The sweep still uses
    /// the registered process name for `variant` when there is one.
    ///
    /// # Errors
    /// Same as [`ProcessSupervisor::run`], minus `UnknownVariant`.
    pub fn run_with_executable(
        &self,
        variant: ModelVariant,
        executable: impl Into<PathBuf>,
        command_file: impl AsRef<Path>,
    ) -> Result<ProcessResult> {
        let executable = executable.into();
        let process_name = self
            .registry
            .get(variant)
            .map_or_else(|| process_name_of(&executable), |b| b.process_name.clone());
        let binary = SimulatorBinary::new(executable).with_process_name(process_name);
        execute(&binary, command_file.as_ref())
    }

    /// Run the first `*Cmd.txt` (by name) found in a simulator's sample
    /// data directory.
    ///
    /// # Errors
    /// Returns [`FireModelError::SourceNotFound`] if the directory holds no
    /// command file, otherwise as [`ProcessSupervisor::run`].
    pub fn run_sample(&self, variant: ModelVariant, sample_dir: impl AsRef<Path>) -> Result<ProcessResult> {
        let sample_dir = sample_dir.as_ref();
        let command_file = find_sample_command(sample_dir)?;
        info!("Running {variant} sample {}", command_file.display());
        self.run(variant, command_file)
    }
}

fn find_sample_command(dir: &Path) -> Result<PathBuf> {
    let entries =
        fs::read_dir(dir).map_err(|_| FireModelError::SourceNotFound(dir.to_path_buf()))?;
    let mut candidates: Vec<PathBuf> = entries
        .filter_map(|e| e.ok().map(|e| e.path()))
        .filter(|p| {
            p.is_file()
                && p.file_name()
                    .is_some_and(|n| n.to_string_lossy().ends_with("Cmd.txt"))
        })
        .collect();
    candidates.sort();
    candidates
        .into_iter()
        .next()
        .ok_or_else(|| FireModelError::SourceNotFound(dir.join("*Cmd.txt")))
}

fn execute(binary: &SimulatorBinary, command_file: &Path) -> Result<ProcessResult> {
    let spawn_error = |source| FireModelError::ProcessSpawnError {
        program: binary.executable.clone(),
        source,
    };
    let command_file = std::path::absolute(command_file).map_err(spawn_error)?;
    let working_dir = command_file
        .parent()
        .map_or_else(|| PathBuf::from("."), Path::to_path_buf);

    let mut command = Command::new(&binary.executable);
    command
        .arg(&command_file)
        .current_dir(&working_dir)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());
    #[cfg(unix)]
    {
        use std::os::unix::process::CommandExt;
        command.process_group(0);
    }

    info!(
        "Launching {} {}",
        binary.executable.display(),
        command_file.display()
    );
    let mut child = command.spawn().map_err(spawn_error)?;
    let pid = child.id();

    // Leftover workers inherit these pipes; drain them off-thread so the
    // exit can be observed and the sweep can close them.
    let stdout = child.stdout.take().map(drain);
    let stderr = child.stderr.take().map(drain);
    let status = child.wait().map_err(spawn_error)?;

    let swept = sweep::sweep(pid, &binary.process_name);
    let stdout = collect(stdout).map_err(spawn_error)?;
    let stderr = collect(stderr).map_err(spawn_error)?;
    let report = swept?;
    debug!(
        "Sweep after pid {pid}: group killed {}, {} descendant(s) killed",
        report.group_killed, report.descendants_killed
    );

    let result = ProcessResult {
        stdout: String::from_utf8_lossy(&stdout).into_owned(),
        stderr: String::from_utf8_lossy(&stderr).into_owned(),
        exit_code: status.code(),
    };
    if result.success() {
        info!("{} (pid {pid}) finished", binary.process_name);
    } else {
        warn!(
            "{} (pid {pid}) exited with {:?}",
            binary.process_name, result.exit_code
        );
    }

    Ok(result)
}

type Drain = JoinHandle<io::Result<Vec<u8>>>;

fn drain(mut pipe: impl Read + Send + 'static) -> Drain {
    thread::spawn(move || {
        let mut buf = Vec::new();
        pipe.read_to_end(&mut buf)?;
        Ok(buf)
    })
}

fn collect(reader: Option<Drain>) -> io::Result<Vec<u8>> {
    match reader {
        Some(handle) => handle
            .join()
            .map_err(|_| io::Error::other("output reader panicked"))?,
        None => Ok(Vec::new()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_variant_fails_before_spawning() {
        let supervisor = ProcessSupervisor::new(SimulatorRegistry::new());
        let err = supervisor
            .run(ModelVariant::Farsite, "/nonexistent/runCmd.txt")
            .unwrap_err();
        assert!(matches!(err, FireModelError::UnknownVariant(ModelVariant::Farsite)));
    }

    #[test]
    fn test_missing_executable_is_spawn_error() {
        let registry = SimulatorRegistry::new().with_binary(
            ModelVariant::FlamMap,
            SimulatorBinary::new("/nonexistent/bin/TestFlamMap"),
        );
        let dir = tempfile::tempdir().unwrap();
        let err = ProcessSupervisor::new(registry)
            .run(ModelVariant::FlamMap, dir.path().join("runCmd.txt"))
            .unwrap_err();
        assert!(matches!(err, FireModelError::ProcessSpawnError { .. }));
    }

    #[test]
    fn test_sample_command_is_first_by_name() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("b_Cmd.txt"), "").unwrap();
        fs::write(dir.path().join("a_Cmd.txt"), "").unwrap();
        fs::write(dir.path().join("notes.txt"), "").unwrap();
        assert_eq!(
            find_sample_command(dir.path()).unwrap(),
            dir.path().join("a_Cmd.txt")
        );
    }

    #[test]
    fn test_sample_dir_without_command_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = find_sample_command(dir.path()).unwrap_err();
        assert!(matches!(err, FireModelError::SourceNotFound(_)));
    }

    #[cfg(unix)]
    #[test]
    fn test_captures_output_and_exit_code() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let stub = dir.path().join("stub.sh");
        fs::write(
            &stub,
            "#!/bin/sh\necho \"cmd=$1\"\necho \"cwd=$(pwd)\"\necho oops >&2\nexit 3\n",
        )
        .unwrap();
        fs::set_permissions(&stub, fs::Permissions::from_mode(0o755)).unwrap();
        let cmd = dir.path().join("runCmd.txt");
        fs::write(&cmd, "").unwrap();

        let registry =
            SimulatorRegistry::new().with_binary(ModelVariant::Mtt, SimulatorBinary::new(&stub));
        let result = ProcessSupervisor::new(registry)
            .run(ModelVariant::Mtt, &cmd)
            .unwrap();

        assert_eq!(result.exit_code, Some(3));
        assert!(result.stdout.contains(&format!("cmd={}", cmd.display())));
        assert_eq!(result.stderr, "oops\n");
    }
}
