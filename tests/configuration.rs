//! Configuration loading and BatchOptions tests.

use std::fs;
use std::path::{Path, PathBuf};

use labelclip::{BatchOptions, ConfigFormat, ExecutionMode, LabelClipError, load_config};

fn write(directory: &Path, name: &str, contents: &str) -> PathBuf {
    let path = directory.join(name);
    fs::write(&path, contents).expect("Failed to write config");
    path
}

// ── Loading ──────────────────────────────────────────────────────

#[test]
fn yaml_file_with_two_entries() {
    let directory = tempfile::tempdir().expect("Failed to create temp dir");
    let path = write(
        directory.path(),
        "config.yaml",
        r#"
- video_dataset: "20241123_194318"
  video_paths:
    - data/input/20241123_194318/cam1.mp4
    - data/input/20241123_194318/cam2.mp4
  frame_offsets: [0, -12]
  json_path: data/input/20241123_194318/annotations.json
  output_dir: data/output/20241123_194318
  codec: libx265
  fps: 29.97
  execution_mode: sequential
- video_paths: [data/input/other/cam1.mp4]
  frame_offsets: [5]
  annotation_path: data/input/other/annotations.json
  output_dir: data/output/other
  fps: 60
"#,
    );

    let entries = load_config(&path).expect("Config should load");
    assert_eq!(entries.len(), 2);

    let first = &entries[0];
    assert_eq!(first.video_dataset, "20241123_194318");
    assert_eq!(first.video_paths.len(), 2);
    assert_eq!(first.frame_offsets, [0, -12]);
    assert_eq!(first.codec, "libx265");
    assert_eq!(first.fps, 29.97);
    assert_eq!(first.execution_mode, ExecutionMode::Sequential);

    let second = &entries[1];
    assert_eq!(
        second.annotation_path,
        PathBuf::from("data/input/other/annotations.json")
    );
    assert_eq!(second.codec, "libx264");
    assert_eq!(second.execution_mode, ExecutionMode::Parallel);
    assert_eq!(second.display_name(), "data/output/other");
}

#[test]
fn json_file_loads_the_same_shape() {
    let directory = tempfile::tempdir().expect("Failed to create temp dir");
    let path = write(
        directory.path(),
        "config.json",
        r#"[{"video_paths": ["cam1.mp4"], "frame_offsets": [0], "json_path": "a.json",
             "output_dir": "out", "codec": "libvpx-vp9", "fps": 25}]"#,
    );

    let entries = load_config(&path).unwrap();
    assert_eq!(entries[0].codec, "libvpx-vp9");
    assert_eq!(entries[0].fps, 25.0);
}

#[test]
fn validation_error_names_entry_and_field() {
    let directory = tempfile::tempdir().expect("Failed to create temp dir");
    let path = write(
        directory.path(),
        "config.yml",
        r#"
- {video_paths: [a.mp4], frame_offsets: [0], json_path: a.json, output_dir: o, fps: 30}
- {video_paths: [a.mp4, b.mp4], frame_offsets: [0], json_path: a.json, output_dir: o, fps: 30}
"#,
    );

    let error = load_config(&path).unwrap_err();
    assert!(matches!(
        error,
        LabelClipError::InvalidConfig {
            entry: 1,
            field: "frame_offsets",
            ..
        }
    ));
    let message = error.to_string();
    assert!(message.contains("entry 1"), "{message}");
    assert!(message.contains("frame_offsets"), "{message}");
}

#[test]
fn parse_errors_carry_the_path() {
    let directory = tempfile::tempdir().expect("Failed to create temp dir");
    let path = write(directory.path(), "config.json", "{ not json");

    let error = load_config(&path).unwrap_err();
    assert!(matches!(error, LabelClipError::ConfigParse { .. }));
    assert!(error.to_string().contains("config.json"));
    assert!(error.is_fatal());
}

#[test]
fn a_single_mapping_is_not_a_list() {
    let directory = tempfile::tempdir().expect("Failed to create temp dir");
    let path = write(
        directory.path(),
        "config.yaml",
        "video_paths: [a.mp4]\nframe_offsets: [0]\njson_path: a.json\noutput_dir: o\nfps: 30\n",
    );

    assert!(matches!(
        load_config(&path),
        Err(LabelClipError::ConfigParse { .. })
    ));
}

#[test]
fn missing_and_unsupported_files() {
    assert!(matches!(
        load_config("does/not/exist.yaml"),
        Err(LabelClipError::ConfigOpen { .. })
    ));
    assert!(matches!(
        load_config("config.toml"),
        Err(LabelClipError::UnsupportedConfigFormat(_))
    ));
}

#[test]
fn empty_list_is_valid() {
    assert!(ConfigFormat::Yaml.parse("[]").unwrap().is_empty());
    assert!(ConfigFormat::Json.parse("[]").unwrap().is_empty());
}

// ── BatchOptions builder ─────────────────────────────────────────

#[test]
fn options_defaults() {
    let options = BatchOptions::new();
    let debug = format!("{options:?}");
    assert!(debug.contains("BatchOptions"));
    assert!(debug.contains("has_cancellation: false"));
    assert!(debug.contains("workers: None"));
    assert!(debug.contains("mode_override: None"));
}

#[test]
fn options_builder_chain() {
    let options = BatchOptions::default()
        .with_workers(3)
        .with_execution_mode(ExecutionMode::Sequential)
        .with_cancellation(labelclip::CancellationToken::new());
    let debug = format!("{options:?}");
    assert!(debug.contains("workers: Some(3)"));
    assert!(debug.contains("mode_override: Some(Sequential)"));
    assert!(debug.contains("has_cancellation: true"));
}
