use std::path::Path;

use assert_cmd::Command;
use image::{GrayImage, Luma};
use predicates::prelude::*;
use tempfile::TempDir;

/// `tabgrid` with its config directory isolated under `home`.
fn tabgrid(home: &Path) -> Command {
    let mut cmd = Command::cargo_bin("tabgrid").unwrap();
    cmd.env("XDG_CONFIG_HOME", home).env_remove("RUST_LOG");
    cmd
}

fn write_blank_page(path: &Path) {
    GrayImage::from_pixel(320, 240, Luma([255])).save(path).unwrap();
}

#[test]
fn help_lists_commands() {
    let home = TempDir::new().unwrap();
    tabgrid(home.path())
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("extract"))
        .stdout(predicate::str::contains("serve"));
}

#[test]
fn extract_blank_page_prints_empty_result() {
    let home = TempDir::new().unwrap();
    let page = home.path().join("blank.png");
    write_blank_page(&page);

    tabgrid(home.path())
        .arg("extract")
        .arg(&page)
        .assert()
        .success()
        .stdout(predicate::str::contains("\"total_tables\": 0"))
        .stdout(predicate::str::contains("\"tables\": []"));
}

#[test]
fn extract_writes_output_file() {
    let home = TempDir::new().unwrap();
    let page = home.path().join("blank.png");
    let out = home.path().join("out.txt");
    write_blank_page(&page);

    tabgrid(home.path())
        .args(["extract", "-f", "text", "-o"])
        .arg(&out)
        .arg(&page)
        .assert()
        .success();

    let written = std::fs::read_to_string(&out).unwrap();
    assert!(written.starts_with("Tables found: 0"));
}

#[test]
fn extract_rejects_unsupported_format() {
    let home = TempDir::new().unwrap();
    let notes = home.path().join("notes.txt");
    std::fs::write(&notes, "not a table").unwrap();

    tabgrid(home.path())
        .arg("extract")
        .arg(&notes)
        .assert()
        .failure()
        .stderr(predicate::str::contains("unsupported format"));
}

#[test]
fn extract_rejects_unknown_psm() {
    let home = TempDir::new().unwrap();
    let page = home.path().join("blank.png");
    write_blank_page(&page);

    tabgrid(home.path())
        .args(["extract", "--psm", "42"])
        .arg(&page)
        .assert()
        .failure()
        .stderr(predicate::str::contains("page segmentation mode"));
}

#[test]
fn batch_writes_outputs_and_summary() {
    let home = TempDir::new().unwrap();
    let input = home.path().join("scans");
    let output = home.path().join("results");
    std::fs::create_dir_all(&input).unwrap();
    write_blank_page(&input.join("a.png"));
    write_blank_page(&input.join("b.png"));

    tabgrid(home.path())
        .arg("batch")
        .arg(input.join("*.png").to_str().unwrap())
        .arg("-o")
        .arg(&output)
        .arg("--summary")
        .assert()
        .success()
        .stdout(predicate::str::contains("Processed 2 files"));

    assert!(output.join("a.json").exists());
    assert!(output.join("b.json").exists());

    let summary = std::fs::read_to_string(output.join("summary.csv")).unwrap();
    let mut lines = summary.lines();
    assert_eq!(
        lines.next(),
        Some("filename,status,total_tables,processing_time_ms,error")
    );
    assert!(lines.next().unwrap().starts_with("a.png,success,0,"));
    assert!(lines.next().unwrap().starts_with("b.png,success,0,"));
}

#[test]
fn batch_stops_on_first_failure_unless_told_to_continue() {
    let home = TempDir::new().unwrap();
    let input = home.path().join("scans");
    let output = home.path().join("results");
    std::fs::create_dir_all(&input).unwrap();
    write_blank_page(&input.join("a.png"));
    std::fs::write(input.join("b.png"), b"not an image").unwrap();
    let pattern = input.join("*.png");

    tabgrid(home.path())
        .arg("batch")
        .arg(pattern.to_str().unwrap())
        .args(["-j", "1"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Processing failed"));

    tabgrid(home.path())
        .arg("batch")
        .arg(pattern.to_str().unwrap())
        .arg("-o")
        .arg(&output)
        .args(["--summary", "--continue-on-error"])
        .assert()
        .success();

    let summary = std::fs::read_to_string(output.join("summary.csv")).unwrap();
    assert!(summary.lines().any(|l| l.starts_with("a.png,success,0,")));
    assert!(summary.lines().any(|l| l.starts_with("b.png,error,,")));
}

#[cfg(target_os = "linux")]
#[test]
fn config_init_set_get() {
    let home = TempDir::new().unwrap();

    tabgrid(home.path())
        .args(["config", "path"])
        .assert()
        .success()
        .stdout(predicate::str::contains("not created"));

    tabgrid(home.path())
        .args(["config", "init"])
        .assert()
        .success();
    assert!(home.path().join("tabgrid").join("config.json").exists());

    tabgrid(home.path())
        .args(["config", "set", "validation.min_rows", "3"])
        .assert()
        .success();

    tabgrid(home.path())
        .args(["config", "get", "validation.min_rows"])
        .assert()
        .success()
        .stdout(predicate::str::diff("3\n"));

    tabgrid(home.path())
        .args(["config", "get", "validation.nope"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Configuration key not found"));
}
