//! End-to-end batch runs against an in-process media backend.
//!
//! The fake backend reports fixed source information per camera path and
//! writes a small text file in place of each clip, so these tests exercise
//! configuration loading, annotation translation, job planning, dispatch and
//! the output layout without FFmpeg.

use std::{
    collections::{BTreeSet, HashMap},
    fs,
    path::{Path, PathBuf},
    sync::{
        Arc, Mutex,
        atomic::{AtomicUsize, Ordering},
    },
};

use labelclip::{
    BatchExtractor, BatchObserver, BatchOptions, CancellationToken, ClipRequest, ClipWindow,
    ExecutionMode, GroupInfo, JobReport, LabelClipError, MediaBackend, SourceInfo,
};
use serde_json::json;

// ── Fixtures ─────────────────────────────────────────────────────

#[derive(Default)]
struct FakeBackend {
    sources: HashMap<PathBuf, SourceInfo>,
    failing_starts: Vec<f64>,
    windows: Mutex<Vec<(PathBuf, ClipWindow)>>,
}

impl FakeBackend {
    fn with_source(mut self, path: &str, duration: f64) -> Self {
        self.sources.insert(
            PathBuf::from(path),
            SourceInfo {
                frames_per_second: 30.0,
                start_offset: 0.0,
                duration,
            },
        );
        self
    }

    fn failing_at(mut self, start: f64) -> Self {
        self.failing_starts.push(start);
        self
    }

    fn windows_for(&self, path: &str) -> Vec<ClipWindow> {
        let mut windows: Vec<ClipWindow> = self
            .windows
            .lock()
            .unwrap()
            .iter()
            .filter(|(source, _)| source == Path::new(path))
            .map(|(_, window)| *window)
            .collect();
        windows.sort_by(|a, b| a.start.total_cmp(&b.start));
        windows
    }
}

impl MediaBackend for FakeBackend {
    fn probe(&self, path: &Path) -> Result<SourceInfo, LabelClipError> {
        self.sources
            .get(path)
            .copied()
            .ok_or_else(|| LabelClipError::FileOpen {
                path: path.to_path_buf(),
                reason: "no such camera".to_string(),
            })
    }

    fn write_clip(&self, request: &ClipRequest<'_>) -> Result<(), LabelClipError> {
        if self.failing_starts.contains(&request.window.start) {
            return Err(LabelClipError::TranscodeError("injected failure".to_string()));
        }

        fs::write(
            request.output,
            format!(
                "{} {:.3} {:.3}",
                request.source.display(),
                request.window.start,
                request.window.end
            ),
        )?;

        self.windows
            .lock()
            .unwrap()
            .push((request.source.to_path_buf(), request.window));
        Ok(())
    }
}

/// Scratch directory holding an annotation document and a configuration.
struct Workspace {
    directory: tempfile::TempDir,
}

impl Workspace {
    fn new(labels: &[(&str, &[(i64, i64)])]) -> Self {
        let directory = tempfile::tempdir().expect("Failed to create temp dir");

        let video_labels: Vec<_> = labels
            .iter()
            .map(|(label, ranges)| {
                json!({
                    "timelinelabels": [label],
                    "ranges": ranges
                        .iter()
                        .map(|(start, end)| json!({"start": start, "end": end}))
                        .collect::<Vec<_>>(),
                })
            })
            .collect();
        let document = json!([{ "id": 1, "videoLabels": video_labels }]);
        fs::write(
            directory.path().join("annotations.json"),
            document.to_string(),
        )
        .expect("Failed to write annotations");

        Self { directory }
    }

    fn output(&self) -> PathBuf {
        self.directory.path().join("out")
    }

    fn config(&self, cameras: &[(&str, i64)], mode: &str) -> PathBuf {
        let entry = json!([{
            "video_dataset": "session",
            "video_paths": cameras.iter().map(|(path, _)| *path).collect::<Vec<_>>(),
            "frame_offsets": cameras.iter().map(|(_, offset)| *offset).collect::<Vec<_>>(),
            "json_path": self.directory.path().join("annotations.json"),
            "output_dir": self.output(),
            "fps": 30.0,
            "execution_mode": mode,
        }]);
        let path = self.directory.path().join("config.json");
        fs::write(&path, entry.to_string()).expect("Failed to write config");
        path
    }
}

fn files_under(root: &Path) -> BTreeSet<PathBuf> {
    fn walk(root: &Path, directory: &Path, files: &mut BTreeSet<PathBuf>) {
        let Ok(entries) = fs::read_dir(directory) else {
            return;
        };
        for entry in entries.flatten() {
            let path = entry.path();
            if path.is_dir() {
                walk(root, &path, files);
            } else {
                files.insert(path.strip_prefix(root).unwrap().to_path_buf());
            }
        }
    }

    let mut files = BTreeSet::new();
    walk(root, root, &mut files);
    files
}

fn set(paths: &[&str]) -> BTreeSet<PathBuf> {
    paths.iter().map(PathBuf::from).collect()
}

fn extractor(backend: Arc<FakeBackend>, options: BatchOptions) -> BatchExtractor {
    BatchExtractor::new(backend, options.with_workers(4)).expect("Failed to build extractor")
}

// ── Scenarios ────────────────────────────────────────────────────

#[test]
fn two_ranges_become_two_numbered_clips() {
    let workspace = Workspace::new(&[("Age-Uke", &[(0, 30), (60, 90)])]);
    let config = workspace.config(&[("cam1.mp4", 0)], "sequential");
    let backend = Arc::new(FakeBackend::default().with_source("cam1.mp4", 10.0));

    let summary = extractor(backend.clone(), BatchOptions::new())
        .run(&config)
        .expect("Batch should succeed");

    assert_eq!(summary.entries, 1);
    assert_eq!(summary.written, 2);
    assert_eq!(summary.skipped + summary.failed + summary.cameras_failed, 0);
    assert_eq!(
        files_under(&workspace.output()),
        set(&["elements/Age-Uke/1/cam1_1.mp4", "elements/Age-Uke/2/cam1_2.mp4"])
    );
    assert_eq!(
        backend.windows_for("cam1.mp4"),
        [
            ClipWindow { start: 0.0, end: 1.0 },
            ClipWindow { start: 2.0, end: 3.0 }
        ]
    );
}

#[test]
fn camera_offsets_shift_each_camera() {
    let workspace = Workspace::new(&[("Mae-Geri", &[(30, 60)])]);
    let config = workspace.config(&[("cam1.mp4", 0), ("cam2.mp4", 30)], "parallel");
    let backend = Arc::new(
        FakeBackend::default()
            .with_source("cam1.mp4", 10.0)
            .with_source("cam2.mp4", 10.0),
    );

    let summary = extractor(backend.clone(), BatchOptions::new())
        .run(&config)
        .unwrap();

    assert_eq!(summary.written, 2);
    assert_eq!(
        files_under(&workspace.output()),
        set(&["elements/Mae-Geri/1/cam1_1.mp4", "elements/Mae-Geri/1/cam2_1.mp4"])
    );
    assert_eq!(backend.windows_for("cam1.mp4"), [ClipWindow { start: 1.0, end: 2.0 }]);
    assert_eq!(backend.windows_for("cam2.mp4"), [ClipWindow { start: 2.0, end: 3.0 }]);
}

#[test]
fn categories_pick_the_top_level_directory() {
    let workspace = Workspace::new(&[
        ("Heian-Nidan", &[(0, 30)]),
        ("2+Gedan-Barai", &[(30, 60)]),
        ("Oi-Zuki", &[(60, 90)]),
    ]);
    let config = workspace.config(&[("cam1.mp4", 0)], "sequential");
    let backend = Arc::new(FakeBackend::default().with_source("cam1.mp4", 10.0));

    extractor(backend, BatchOptions::new()).run(&config).unwrap();

    assert_eq!(
        files_under(&workspace.output()),
        set(&[
            "combinations/2+Gedan-Barai/1/cam1_1.mp4",
            "elements/Oi-Zuki/1/cam1_1.mp4",
            "kata/Heian-Nidan/1/cam1_1.mp4",
        ])
    );
}

#[test]
fn one_failing_segment_does_not_affect_siblings() {
    let ranges: &[(i64, i64)] = &[(0, 15), (30, 45), (60, 75), (90, 105), (120, 135)];
    let workspace = Workspace::new(&[("Oi-Zuki", ranges)]);

    for mode in ["parallel", "sequential"] {
        let config = workspace.config(&[("cam1.mp4", 0)], mode);
        let backend = Arc::new(
            FakeBackend::default()
                .with_source("cam1.mp4", 10.0)
                .failing_at(2.0),
        );
        fs::remove_dir_all(workspace.output()).ok();

        let summary = extractor(backend, BatchOptions::new()).run(&config).unwrap();

        assert_eq!((summary.written, summary.failed), (4, 1), "{mode}");
        let files = files_under(&workspace.output());
        assert_eq!(files.len(), 4, "{mode}: {files:?}");
        assert!(!files.contains(Path::new("elements/Oi-Zuki/3/cam1_3.mp4")));
    }
}

#[test]
fn parallel_and_sequential_write_identical_trees() {
    let labels: &[(&str, &[(i64, i64)])] = &[
        ("Age-Uke", &[(0, 30), (60, 90), (120, 150)]),
        ("1+Oi-Zuki", &[(30, 45), (200, 230)]),
    ];
    let cameras = [("cam1.mp4", 0), ("cam2.mp4", 15)];

    let run = |mode: &str| {
        let workspace = Workspace::new(labels);
        let config = workspace.config(&cameras, mode);
        let backend = Arc::new(
            FakeBackend::default()
                .with_source("cam1.mp4", 10.0)
                .with_source("cam2.mp4", 10.0),
        );
        extractor(backend, BatchOptions::new()).run(&config).unwrap();

        files_under(&workspace.output())
            .into_iter()
            .map(|relative| {
                let contents = fs::read_to_string(workspace.output().join(&relative)).unwrap();
                (relative, contents)
            })
            .collect::<Vec<_>>()
    };

    let sequential = run("sequential");
    assert_eq!(sequential.len(), 10);
    assert_eq!(sequential, run("parallel"));
}

#[test]
fn rerun_overwrites_without_leftovers() {
    let workspace = Workspace::new(&[("Age-Uke", &[(0, 30), (60, 90)])]);
    let config = workspace.config(&[("cam1.mp4", 0)], "parallel");
    let backend = Arc::new(FakeBackend::default().with_source("cam1.mp4", 10.0));
    let extractor = extractor(backend, BatchOptions::new());

    let first = extractor.run(&config).unwrap();
    let after_first = files_under(&workspace.output());
    let second = extractor.run(&config).unwrap();
    let after_second = files_under(&workspace.output());

    assert_eq!(first.written, 2);
    assert_eq!(second.written, 2);
    assert_eq!(after_first, after_second);
    assert!(
        after_second
            .iter()
            .all(|path| !path.to_string_lossy().ends_with(".partial"))
    );
}

#[test]
fn segments_past_the_end_are_skipped() {
    let workspace = Workspace::new(&[("Age-Uke", &[(0, 30), (60, 90)])]);
    let config = workspace.config(&[("cam1.mp4", 0)], "sequential");
    let backend = Arc::new(FakeBackend::default().with_source("cam1.mp4", 1.5));

    let summary = extractor(backend, BatchOptions::new()).run(&config).unwrap();

    assert_eq!((summary.written, summary.skipped), (1, 1));
    assert_eq!(
        files_under(&workspace.output()),
        set(&["elements/Age-Uke/1/cam1_1.mp4"])
    );
    assert!(!workspace.output().join("elements/Age-Uke/2").exists());
}

#[test]
fn unreadable_camera_is_counted_and_skipped() {
    let workspace = Workspace::new(&[("Age-Uke", &[(0, 30)])]);
    let config = workspace.config(&[("missing.mp4", 0), ("cam2.mp4", 0)], "parallel");
    let backend = Arc::new(FakeBackend::default().with_source("cam2.mp4", 10.0));

    let summary = extractor(backend, BatchOptions::new()).run(&config).unwrap();

    assert_eq!(summary.cameras_failed, 1);
    assert_eq!(summary.written, 1);
    assert_eq!(
        files_under(&workspace.output()),
        set(&["elements/Age-Uke/1/cam2_1.mp4"])
    );
}

#[test]
fn malformed_annotation_aborts_the_batch() {
    let workspace = Workspace::new(&[]);
    fs::write(
        workspace.directory.path().join("annotations.json"),
        r#"[{"id": 1}]"#,
    )
    .unwrap();
    let config = workspace.config(&[("cam1.mp4", 0)], "parallel");
    let backend = Arc::new(FakeBackend::default().with_source("cam1.mp4", 10.0));

    let error = extractor(backend.clone(), BatchOptions::new())
        .run(&config)
        .unwrap_err();

    assert!(matches!(error, LabelClipError::MalformedAnnotation(_)), "{error}");
    assert!(error.is_fatal());
    assert!(backend.windows.lock().unwrap().is_empty());
}

#[test]
fn unusable_label_aborts_before_any_output() {
    let workspace = Workspace::new(&[("../../outside", &[(0, 30)])]);
    let config = workspace.config(&[("cam1.mp4", 0)], "parallel");
    let backend = Arc::new(FakeBackend::default().with_source("cam1.mp4", 10.0));

    let error = extractor(backend.clone(), BatchOptions::new())
        .run(&config)
        .unwrap_err();

    assert!(matches!(error, LabelClipError::MalformedAnnotation(_)), "{error}");
    assert!(backend.windows.lock().unwrap().is_empty());
    assert!(files_under(workspace.directory.path()).iter().all(|path| {
        path == Path::new("annotations.json") || path == Path::new("config.json")
    }));
}

#[test]
fn output_root_that_cannot_be_created_is_fatal() {
    let workspace = Workspace::new(&[("Age-Uke", &[(0, 30)])]);
    let config = workspace.config(&[("cam1.mp4", 0)], "parallel");
    fs::write(workspace.output(), b"a file, not a directory").unwrap();
    let backend = Arc::new(FakeBackend::default().with_source("cam1.mp4", 10.0));

    let error = extractor(backend.clone(), BatchOptions::new())
        .run(&config)
        .unwrap_err();

    assert!(
        matches!(error, LabelClipError::OutputRootCreation { .. }),
        "{error}"
    );
    assert!(error.is_fatal());
    assert!(backend.windows.lock().unwrap().is_empty());
}

#[test]
fn overflowing_offset_fails_only_that_camera() {
    let workspace = Workspace::new(&[("Age-Uke", &[(0, 30)])]);
    let config = workspace.config(&[("cam1.mp4", i64::MAX), ("cam2.mp4", 0)], "sequential");
    let backend = Arc::new(
        FakeBackend::default()
            .with_source("cam1.mp4", 10.0)
            .with_source("cam2.mp4", 10.0),
    );

    let summary = extractor(backend, BatchOptions::new()).run(&config).unwrap();

    assert_eq!(summary.cameras_failed, 1);
    assert_eq!(
        files_under(&workspace.output()),
        set(&["elements/Age-Uke/1/cam2_1.mp4"])
    );
}

#[test]
fn mode_override_and_observer_see_every_job() {
    #[derive(Default)]
    struct Counting {
        groups: Mutex<Vec<(usize, String, ExecutionMode, usize)>>,
        jobs: AtomicUsize,
    }

    impl BatchObserver for Counting {
        fn on_group_started(&self, group: &GroupInfo<'_>) {
            self.groups.lock().unwrap().push((
                group.camera_index,
                group.label.to_string(),
                group.mode,
                group.job_count,
            ));
        }

        fn on_job_finished(&self, _report: &JobReport<'_>) {
            self.jobs.fetch_add(1, Ordering::SeqCst);
        }
    }

    let workspace = Workspace::new(&[("Age-Uke", &[(0, 30), (60, 90)]), ("Oi-Zuki", &[(90, 120)])]);
    let config = workspace.config(&[("cam1.mp4", 0)], "parallel");
    let backend = Arc::new(FakeBackend::default().with_source("cam1.mp4", 10.0));
    let observer = Arc::new(Counting::default());

    let options = BatchOptions::new()
        .with_observer(observer.clone())
        .with_execution_mode(ExecutionMode::Sequential);
    extractor(backend, options).run(&config).unwrap();

    assert_eq!(observer.jobs.load(Ordering::SeqCst), 3);
    assert_eq!(
        *observer.groups.lock().unwrap(),
        [
            (1, "Age-Uke".to_string(), ExecutionMode::Sequential, 2),
            (1, "Oi-Zuki".to_string(), ExecutionMode::Sequential, 1),
        ]
    );
}

#[test]
fn cancelled_batch_writes_nothing() {
    let workspace = Workspace::new(&[("Age-Uke", &[(0, 30)])]);
    let config = workspace.config(&[("cam1.mp4", 0)], "parallel");
    let backend = Arc::new(FakeBackend::default().with_source("cam1.mp4", 10.0));
    let token = CancellationToken::new();
    token.cancel();

    let summary = extractor(backend, BatchOptions::new().with_cancellation(token))
        .run(&config)
        .unwrap();

    assert_eq!(summary.entries, 0);
    assert_eq!(summary.written, 0);
    assert!(files_under(&workspace.output()).is_empty());
}
