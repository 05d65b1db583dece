//! End-to-end tests for the `beacon-agent` binary.
//!
//! Records are piped through stdin with no endpoint configured, so everything
//! lands in fallback files under a temp directory.

use std::io::Write;
use std::path::Path;
use std::process::{Command, Output, Stdio};

use beacon_engine::Batch;

/// Run the agent to EOF on `input`, writing into `out`.
fn run_agent(out: &Path, input: &[u8]) -> Output {
    let mut child = Command::new(env!("CARGO_BIN_EXE_beacon-agent"))
        .current_dir(out)
        .env_remove("BEACON_ENDPOINT")
        .env("BEACON_OUTPUT_DIR", out)
        .env("RUST_LOG", "beacon_agent=debug")
        .stdin(Stdio::piped())
        .stdout(Stdio::null())
        .stderr(Stdio::piped())
        .spawn()
        .unwrap();

    let mut stdin = child.stdin.take().unwrap();
    stdin.write_all(input).unwrap();
    drop(stdin);

    child.wait_with_output().unwrap()
}

/// Ids of every written record, in file order.
fn written_ids(dir: &Path) -> Vec<String> {
    let mut files: Vec<_> = std::fs::read_dir(dir)
        .unwrap()
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| p.extension().is_some_and(|ext| ext == "json"))
        .collect();
    files.sort();

    files
        .iter()
        .flat_map(|path| {
            let batch = Batch::from_json(&std::fs::read_to_string(path).unwrap()).unwrap();
            batch.ids().into_iter().map(String::from).collect::<Vec<_>>()
        })
        .collect()
}

#[test]
fn bad_lines_are_skipped_and_the_rest_is_written() {
    let dir = tempfile::tempdir().unwrap();

    let mut input = Vec::new();
    input.extend_from_slice(b"{\"record_id\":\"a\"}\n");
    input.extend_from_slice(b"{\"record_id\":\"b\",\"record_data\":{\"level\":2}}\n");
    input.extend_from_slice(b"\xff\xfe\n");
    input.extend_from_slice(b"\n");
    input.extend_from_slice(b"[1, 2, 3]\n");
    input.extend_from_slice(b"{\"record_id\":\"\"}\n");
    input.extend_from_slice(b"{\"record_id\":\"c\"}\n");
    input.extend_from_slice(b"{\"record_id\":\"d\"}\n");
    input.extend_from_slice(b"{\"record_id\":\"e\"}\n");
    input.extend_from_slice(b"{\"record_id\":\"f\"}\n");
    // Last line without a trailing newline
    input.extend_from_slice(b"{\"record_id\":\"g\"}");

    let output = run_agent(dir.path(), &input);
    let stderr = String::from_utf8_lossy(&output.stderr);

    assert!(output.status.success(), "agent failed: {}", stderr);
    assert_eq!(written_ids(dir.path()), vec!["a", "b", "c", "d", "e", "f", "g"]);
    assert!(stderr.contains("Skipping line that is not UTF-8"));
    assert_eq!(stderr.matches("Skipping record").count(), 2);
}

#[test]
fn records_below_threshold_are_written_on_eof() {
    let dir = tempfile::tempdir().unwrap();

    let output = run_agent(dir.path(), b"{\"record_id\":\"only\"}\n\xc3\x28\n");

    assert!(output.status.success());
    assert_eq!(written_ids(dir.path()), vec!["only"]);
}
