//! Cleanup of simulator processes left running after the main binary exits
//!
//! Two passes:
//! 1. the simulator was started as the leader of its own process group, so
//!    the whole group is killed
//! 2. on Linux, descendants of this process whose command name matches the
//!    simulator's process name are killed as well (workers that moved to
//!    another group)
//!
//! A process that is already gone is not an error.

#[cfg(unix)]
use crate::error::FireModelError;
use crate::error::Result;
#[cfg(target_os = "linux")]
use rustc_hash::FxHashMap;
#[cfg(target_os = "linux")]
use std::path::Path;
#[cfg(unix)]
use std::io;
#[cfg(unix)]
use tracing::{debug, warn};

/// What a sweep found and terminated
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepReport {
    /// Whether the simulator's process group still had members
    pub group_killed: bool,
    /// Matching descendants terminated by name
    pub descendants_killed: usize,
}

#[cfg(unix)]
fn is_gone(err: &io::Error) -> bool {
    err.raw_os_error() == Some(libc::ESRCH)
}

#[cfg(unix)]
fn pid_t(pid: u32) -> Result<libc::pid_t> {
    libc::pid_t::try_from(pid).map_err(|_| {
        FireModelError::OrphanSweep(io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("pid {pid} out of range"),
        ))
    })
}

/// Kill the process group led by `leader`
#[cfg(unix)]
fn kill_group(leader: u32) -> Result<bool> {
    let pgid = pid_t(leader)?;
    // SAFETY: killpg only reads its integer arguments
    let rc = unsafe { libc::killpg(pgid, libc::SIGKILL) };
    if rc == 0 {
        warn!("Killed leftover processes in group {leader}");
        return Ok(true);
    }
    let err = io::Error::last_os_error();
    if is_gone(&err) {
        debug!("Process group {leader} already gone");
        return Ok(false);
    }
    Err(FireModelError::OrphanSweep(err))
}

#[cfg(target_os = "linux")]
fn kill_pid(pid: u32, name: &str) -> Result<bool> {
    let target = pid_t(pid)?;
    // SAFETY: kill only reads its integer arguments
    let rc = unsafe { libc::kill(target, libc::SIGKILL) };
    if rc == 0 {
        warn!("Killed leftover {name} process {pid}");
        return Ok(true);
    }
    let err = io::Error::last_os_error();
    if is_gone(&err) {
        debug!("{name} process {pid} exited before it could be killed");
        return Ok(false);
    }
    Err(FireModelError::OrphanSweep(err))
}

/// `(pid, ppid, comm)` parsed from one `/proc/<pid>/stat` line
#[cfg(target_os = "linux")]
pub(crate) fn parse_stat(line: &str) -> Option<(u32, u32, String)> {
    let open = line.find('(')?;
    let close = line.rfind(')')?;
    let pid = line[..open].trim().parse().ok()?;
    let comm = line.get(open + 1..close)?.to_string();
    let mut rest = line.get(close + 1..)?.split_whitespace();
    let _state = rest.next()?;
    let ppid = rest.next()?.parse().ok()?;
    Some((pid, ppid, comm))
}

/// Descendants of `root` whose command name contains `name`
#[cfg(target_os = "linux")]
fn matching_descendants(proc_root: &Path, root: u32, name: &str) -> Result<Vec<u32>> {
    let entries = std::fs::read_dir(proc_root).map_err(FireModelError::OrphanSweep)?;

    let mut children: FxHashMap<u32, Vec<(u32, String)>> = FxHashMap::default();
    for entry in entries {
        let entry = entry.map_err(FireModelError::OrphanSweep)?;
        let file_name = entry.file_name();
        if !file_name.to_string_lossy().bytes().all(|b| b.is_ascii_digit()) {
            continue;
        }
        // Processes can exit between listing and reading
        let Ok(stat) = std::fs::read_to_string(entry.path().join("stat")) else {
            continue;
        };
        if let Some((pid, ppid, comm)) = parse_stat(&stat) {
            children.entry(ppid).or_default().push((pid, comm));
        }
    }

    let mut found = Vec::new();
    let mut stack = vec![root];
    while let Some(parent) = stack.pop() {
        for (pid, comm) in children.get(&parent).into_iter().flatten() {
            if !name.is_empty() && comm.contains(name) {
                found.push(*pid);
            }
            stack.push(*pid);
        }
    }
    Ok(found)
}

/// Terminate what the simulator started as `leader` left behind.
///
/// # Errors
/// Returns [`FireModelError::OrphanSweep`] when enumerating or killing
/// processes fails for any reason other than the process being gone.
#[cfg(unix)]
pub fn sweep(leader: u32, process_name: &str) -> Result<SweepReport> {
    debug!("Sweeping leftovers of {process_name} (group {leader})");
    let group_killed = kill_group(leader)?;

    #[cfg(target_os = "linux")]
    let descendants_killed = {
        let mut killed = 0;
        for pid in matching_descendants(Path::new("/proc"), std::process::id(), process_name)? {
            if kill_pid(pid, process_name)? {
                killed += 1;
            }
        }
        killed
    };
    #[cfg(not(target_os = "linux"))]
    let descendants_killed = 0;

    Ok(SweepReport {
        group_killed,
        descendants_killed,
    })
}

/// Process groups and `/proc` are not available; nothing to sweep.
///
/// # Errors
/// Never fails on this platform.
#[cfg(not(unix))]
pub fn sweep(_leader: u32, _process_name: &str) -> Result<SweepReport> {
    Ok(SweepReport::default())
}
