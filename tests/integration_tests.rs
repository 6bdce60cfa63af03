use std::fs;
use std::path::Path;
use std::process::{Command, Output};
use tempfile::TempDir;

const BIN: &str = env!("CARGO_BIN_EXE_darshan-mounts");

/// Run the binary with `cat` standing in for darshan-parser
fn run_scan(files: &[&Path], extra_env: &[(&str, &str)]) -> Output {
    let mut cmd = Command::new(BIN);
    cmd.args(files)
        .env("RUST_LOG", "darshan_mounts=info")
        .env("DARSHAN_PARSER", "cat")
        .env_remove("DARSHAN_TARGET_MOUNT")
        .env_remove("DARSHAN_POOL_SIZE")
        .env_remove("DARSHAN_JOB_TIMEOUT")
        .env_remove("DARSHAN_DECOMPRESSOR");
    for (key, value) in extra_env {
        cmd.env(key, value);
    }
    cmd.output().expect("Failed to execute darshan-mounts")
}

fn combined_output(output: &Output) -> String {
    format!(
        "{}{}",
        String::from_utf8_lossy(&output.stdout),
        String::from_utf8_lossy(&output.stderr)
    )
}

/// Write a text trace and gzip it in place, producing `<name>.gz`
fn write_gzipped(dir: &Path, name: &str, content: &str) -> std::path::PathBuf {
    let path = dir.join(name);
    fs::write(&path, content).unwrap();
    let status = Command::new("gzip")
        .arg("-f")
        .arg(&path)
        .status()
        .expect("Failed to run gzip");
    assert!(status.success(), "gzip failed");
    dir.join(format!("{name}.gz"))
}

/// The compressed trace has one burst-buffer mount; the binary log has none
#[test]
fn test_reports_only_matching_files() {
    let temp_dir = TempDir::new().unwrap();
    let temp_path = temp_dir.path();

    let a = write_gzipped(
        temp_path,
        "a.txt",
        "# mount entry: 111 /var/opt/cray/dws/mounts/batch/x lustre\n\
         # mount entry: 112 /other/mount y\n",
    );
    let b = temp_path.join("b.darshan");
    fs::write(&b, "# darshan log version: 3.10\n# nprocs: 4\n").unwrap();

    let output = run_scan(&[a.as_path(), b.as_path()], &[]);
    let text = combined_output(&output);

    assert!(output.status.success(), "Scan failed: {text}");
    assert!(text.contains("Got 2 files to process"), "{text}");
    assert!(
        text.contains(&format!("{} contains 1 relevant mounts", a.display())),
        "Expected a.txt.gz to be reported, got: {text}"
    );
    assert!(
        !text.contains(&format!("{} contains", b.display())),
        "b.darshan has no matches and should stay quiet, got: {text}"
    );
    assert!(text.contains("1 with matching mounts"), "{text}");
}

/// Every collected result gets a line, matching or not
#[test]
fn test_logs_every_result() {
    let temp_dir = TempDir::new().unwrap();
    let hit = temp_dir.path().join("hit.darshan");
    let quiet = temp_dir.path().join("quiet.darshan");
    let broken = temp_dir.path().join("broken.darshan");
    fs::write(&hit, "# mount entry: 1 /var/opt/cray/dws/mounts/batch/j lustre\n").unwrap();
    fs::write(&quiet, "# mount entry: 2 /home lustre\n").unwrap();

    let output = run_scan(&[hit.as_path(), quiet.as_path(), broken.as_path()], &[]);
    let text = combined_output(&output);

    assert!(output.status.success(), "{text}");
    for path in [&hit, &quiet, &broken] {
        assert!(
            text.contains(&format!("Got result from {}", path.display())),
            "Missing result line for {}: {text}",
            path.display()
        );
    }
    assert_eq!(text.matches("Got result from").count(), 3, "{text}");
}

/// Per-file failures are reported but do not change the exit status
#[test]
fn test_failed_file_keeps_exit_status_zero() {
    let temp_dir = TempDir::new().unwrap();
    let broken = temp_dir.path().join("broken.darshan");

    let output = run_scan(&[broken.as_path()], &[]);
    let text = combined_output(&output);

    assert!(output.status.success(), "Exit status should stay 0: {text}");
    assert!(text.contains("broken.darshan"), "{text}");
    assert!(text.contains("1 failed"), "{text}");
}

#[test]
fn test_target_mount_from_env() {
    let temp_dir = TempDir::new().unwrap();
    let trace = temp_dir.path().join("scratch.darshan");
    fs::write(
        &trace,
        "# mount entry: 1 /scratch2/a lustre\n# mount entry: 2 /scratch2/b lustre\n",
    )
    .unwrap();

    let output = run_scan(
        &[trace.as_path()],
        &[("DARSHAN_TARGET_MOUNT", "/scratch2"), ("DARSHAN_POOL_SIZE", "1")],
    );
    let text = combined_output(&output);

    assert!(output.status.success(), "{text}");
    assert!(text.contains("contains 2 relevant mounts"), "{text}");
    assert!(text.contains("with 1 workers"), "{text}");
}

#[test]
fn test_no_files() {
    let output = run_scan(&[], &[]);
    let text = combined_output(&output);

    assert!(output.status.success(), "{text}");
    assert!(text.contains("Got 0 files to process"), "{text}");
}

#[test]
fn test_help() {
    let output = Command::new(BIN)
        .arg("--help")
        .output()
        .expect("Failed to execute help command");

    assert!(output.status.success(), "Help command failed");
    let help = String::from_utf8_lossy(&output.stdout);
    assert!(help.contains("darshan-mounts"), "Help should contain program name");
    assert!(help.contains("FILES"), "Help should list the file arguments");
}
