use std::path::Path;

use fsp_core::errors::{ErrorInfo, FspError};

fn sample_info(code: &str, message: &str) -> ErrorInfo {
    ErrorInfo::new(code, message)
        .with_context("dataset", "MyProtein-MyLibrary-1")
        .with_context("stage", "cad")
}

#[test]
fn execution_error_surface() {
    let err = FspError::Execution(sample_info("E001", "cad exited with status 1"));
    assert_eq!(err.info().code, "E001");
    assert_eq!(err.family(), "execution");
    assert!(err.info().context.contains_key("stage"));
}

#[test]
fn file_not_ready_error_surface() {
    let err = FspError::FileNotReady(sample_info("R001", "PHASER.pdb never appeared"));
    assert_eq!(err.info().code, "R001");
    assert_eq!(err.family(), "file-not-ready");
}

#[test]
fn file_not_found_error_surface() {
    let err = FspError::FileNotFound(sample_info("F001", "missing input.pdb"));
    assert_eq!(err.info().code, "F001");
}

#[test]
fn io_helper_records_path() {
    let err = FspError::io("patch_read", Path::new("/tmp/PHASER.pdb"), "permission denied");
    assert_eq!(err.family(), "io");
    assert_eq!(
        err.info().context.get("path").map(String::as_str),
        Some("/tmp/PHASER.pdb")
    );
}

#[test]
fn with_context_keeps_family() {
    let err = FspError::Config(ErrorInfo::new("C001", "empty prefix")).with_context("field", "prefix");
    assert!(matches!(err, FspError::Config(_)));
    assert_eq!(
        err.info().context.get("field").map(String::as_str),
        Some("prefix")
    );
}

#[test]
fn display_renders_context_and_hint() {
    let err = FspError::Serde(
        ErrorInfo::new("S001", "schema mismatch")
            .with_context("file", "fsp.yaml")
            .with_hint("regenerate with `fsp init`"),
    );
    let rendered = err.to_string();
    assert!(rendered.starts_with("serde error: schema mismatch (code: S001)"));
    assert!(rendered.contains("file=fsp.yaml"));
    assert!(rendered.contains("hint: regenerate"));
}

#[test]
fn errors_roundtrip_through_json() {
    let err = FspError::Execution(sample_info("E002", "signal 9"));
    let json = serde_json::to_string(&err).expect("serialize");
    assert!(json.contains("\"family\":\"Execution\""));
    let back: FspError = serde_json::from_str(&json).expect("deserialize");
    assert_eq!(back, err);
}
