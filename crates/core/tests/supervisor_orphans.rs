//! A simulator that leaves a background process behind, still holding the
//! simulator's stdout and stderr. The supervisor must return as soon as the
//! simulator itself exits, with its own output untouched, and kill the
//! leftover.

#![cfg(target_os = "linux")]

use fire_model_core::{ModelVariant, ProcessSupervisor, SimulatorBinary, SimulatorRegistry};
use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::Path;
use std::time::{Duration, Instant};

#[ctor::ctor]
fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

const STUB: &str = r#"#!/bin/sh
dir=$(dirname "$0")
cp /bin/sleep "$dir/TestFlamMap"
"$dir/TestFlamMap" 300 &
echo $! > "$dir/orphan.pid"
echo "simulated $1"
echo "warning: stub" >&2
exit 0
"#;

fn is_gone(pid: &str) -> bool {
    match fs::read_to_string(Path::new("/proc").join(pid).join("stat")) {
        Err(_) => true,
        Ok(stat) => stat
            .rsplit_once(')')
            .is_some_and(|(_, rest)| rest.trim_start().starts_with('Z')),
    }
}

#[test]
fn test_leftover_holding_pipes_is_swept() {
    let dir = tempfile::tempdir().unwrap();
    let stub = dir.path().join("flammap_stub.sh");
    fs::write(&stub, STUB).unwrap();
    fs::set_permissions(&stub, fs::Permissions::from_mode(0o755)).unwrap();
    let cmd = dir.path().join("sampleCmd.txt");
    fs::write(&cmd, "").unwrap();

    let registry = SimulatorRegistry::new().with_binary(
        ModelVariant::FlamMap,
        SimulatorBinary::new(&stub).with_process_name("TestFlamMap"),
    );
    let started = Instant::now();
    let result = ProcessSupervisor::new(registry)
        .run(ModelVariant::FlamMap, &cmd)
        .unwrap();
    let elapsed = started.elapsed();

    assert!(
        elapsed < Duration::from_secs(60),
        "run waited {elapsed:?} on the leftover's pipes"
    );
    assert!(result.success());
    assert_eq!(result.stdout, format!("simulated {}\n", cmd.display()));
    assert_eq!(result.stderr, "warning: stub\n");

    let pid = fs::read_to_string(dir.path().join("orphan.pid")).unwrap();
    let pid = pid.trim();
    let deadline = Instant::now() + Duration::from_secs(5);
    while !is_gone(pid) {
        assert!(Instant::now() < deadline, "leftover {pid} still running");
        std::thread::sleep(Duration::from_millis(50));
    }
}

#[test]
fn test_sweep_without_leftovers_is_quiet() {
    let dir = tempfile::tempdir().unwrap();
    let stub = dir.path().join("quiet.sh");
    fs::write(&stub, "#!/bin/sh\necho done\n").unwrap();
    fs::set_permissions(&stub, fs::Permissions::from_mode(0o755)).unwrap();
    let cmd = dir.path().join("quietCmd.txt");
    fs::write(&cmd, "").unwrap();

    let registry =
        SimulatorRegistry::new().with_binary(ModelVariant::Tom, SimulatorBinary::new(&stub));
    let result = ProcessSupervisor::new(registry)
        .run(ModelVariant::Tom, &cmd)
        .unwrap();
    assert_eq!(result.stdout, "done\n");
    assert!(result.stderr.is_empty());
}
