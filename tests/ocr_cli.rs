//! Runs the `grars-ocr` binary against a fake per-user installation.
#![cfg(target_os = "linux")]

mod common;

use std::{path::Path, process::Command};

use common::write_executable;

/// Interpreter standing in for the runtime environment's Python. It gets
/// the helper script as `$1` and the image as `$2`.
const FAKE_PYTHON: &str = r#"#!/bin/sh
case "$2" in
    *blank*) exit 1 ;;
    *broken*) echo "cannot identify image file" >&2; exit 2 ;;
esac
echo "  Hello from $(basename "$2")  "
"#;

fn install_fake_backend(home: &Path) {
    let data_dir = home.join(".local/share/grars");
    write_executable(&data_dir.join("venv/bin/python"), FAKE_PYTHON);
    std::fs::create_dir_all(data_dir.join("bin")).unwrap();
    std::fs::write(
        data_dir.join("bin/extract_text_from_image.py"),
        "import sys\n",
    )
    .unwrap();
}

fn grars_ocr(home: &Path, image: &Path) -> std::process::Output {
    Command::new(env!("CARGO_BIN_EXE_grars-ocr"))
        .arg(image)
        .env("HOME", home)
        .env_remove("XDG_DATA_HOME")
        .env_remove("XDG_CONFIG_HOME")
        .output()
        .unwrap()
}

fn image(dir: &Path, name: &str) -> std::path::PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, b"\x89PNG").unwrap();
    path
}

#[test]
fn test_text_found() {
    let home = tempfile::tempdir().unwrap();
    install_fake_backend(home.path());
    let image = image(home.path(), "page.png");

    let output = grars_ocr(home.path(), &image);

    assert!(output.status.success());
    assert_eq!(String::from_utf8_lossy(&output.stdout), "Hello from page.png\n");
    assert!(output.stderr.is_empty());
}

#[test]
fn test_no_text() {
    let home = tempfile::tempdir().unwrap();
    install_fake_backend(home.path());
    let image = image(home.path(), "blank.png");

    let output = grars_ocr(home.path(), &image);

    assert_eq!(output.status.code(), Some(1));
    assert!(output.stdout.is_empty());
    assert!(output.stderr.is_empty());
}

#[test]
fn test_backend_failure() {
    let home = tempfile::tempdir().unwrap();
    install_fake_backend(home.path());
    let image = image(home.path(), "broken.png");

    let output = grars_ocr(home.path(), &image);

    assert_eq!(output.status.code(), Some(1));
    assert!(output.stdout.is_empty());
    assert!(String::from_utf8_lossy(&output.stderr).contains("cannot identify image file"));
}

#[test]
fn test_not_installed() {
    let home = tempfile::tempdir().unwrap();
    let image = image(home.path(), "page.png");

    let output = grars_ocr(home.path(), &image);

    assert_eq!(output.status.code(), Some(1));
    assert!(output.stdout.is_empty());
    assert!(!output.stderr.is_empty());
}

#[test]
fn test_missing_image() {
    let home = tempfile::tempdir().unwrap();
    install_fake_backend(home.path());

    let output = grars_ocr(home.path(), &home.path().join("missing.png"));

    assert_eq!(output.status.code(), Some(1));
    assert!(String::from_utf8_lossy(&output.stderr).contains("missing.png"));
}
