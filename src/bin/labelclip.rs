use std::{
    path::PathBuf,
    sync::{Arc, Mutex},
};

use clap::Parser;
use colored::Colorize;
use ffmpeg_next::util::log::Level;
use indicatif::{ProgressBar, ProgressStyle};
use labelclip::{
    BatchExtractor, BatchObserver, BatchOptions, BatchSummary, CancellationToken, ExecutionMode,
    FfmpegBackend, GroupInfo, JobReport, format_elapsed,
};
use serde_json::json;

const CLI_AFTER_HELP: &str = "Examples:\n  labelclip configs/config.yaml\n  labelclip configs/config.json --mode sequential --progress\n  labelclip configs/config.yaml --threads 4 --json";

#[derive(Debug, Parser)]
#[command(
    name = "labelclip",
    version,
    about = "Cut labelled segments out of multi-camera recordings",
    after_help = CLI_AFTER_HELP
)]
struct Cli {
    /// Configuration file (.json, .yaml or .yml).
    config: PathBuf,

    /// Show debug logging output.
    #[arg(long)]
    verbose: bool,

    /// Show a progress bar for each label group.
    #[arg(long)]
    progress: bool,

    /// Worker thread count for parallel mode.
    #[arg(long)]
    threads: Option<usize>,

    /// Execution mode for every entry (parallel, sequential), overriding the configuration.
    #[arg(long)]
    mode: Option<ExecutionMode>,

    /// FFmpeg log level (quiet, panic, fatal, error, warning, info, verbose, debug, trace).
    #[arg(long, default_value = "error")]
    ffmpeg_log_level: String,

    /// Interpret segment times on the container timeline instead of from the first frame.
    #[arg(long)]
    container_timeline: bool,

    /// Print the batch summary as machine-readable JSON.
    #[arg(long)]
    json: bool,
}

fn parse_log_level(value: &str) -> Option<Level> {
    match value.to_ascii_lowercase().as_str() {
        "quiet" => Some(Level::Quiet),
        "panic" => Some(Level::Panic),
        "fatal" => Some(Level::Fatal),
        "error" => Some(Level::Error),
        "warning" | "warn" => Some(Level::Warning),
        "info" => Some(Level::Info),
        "verbose" => Some(Level::Verbose),
        "debug" => Some(Level::Debug),
        "trace" => Some(Level::Trace),
        _ => None,
    }
}

/// One progress bar per label group; the previous bar is finished when the
/// next group starts.
struct TerminalProgress {
    style: ProgressStyle,
    current: Mutex<Option<ProgressBar>>,
}

impl TerminalProgress {
    fn new() -> Result<Self, Box<dyn std::error::Error>> {
        let style = ProgressStyle::with_template(
            "{spinner:.green} {bar:40.cyan/blue} {pos}/{len} {msg}",
        )?
        .progress_chars("##-");

        Ok(Self {
            style,
            current: Mutex::new(None),
        })
    }

    fn finish(&self) {
        if let Ok(mut current) = self.current.lock()
            && let Some(bar) = current.take()
        {
            bar.finish();
        }
    }
}

impl BatchObserver for TerminalProgress {
    fn on_group_started(&self, group: &GroupInfo<'_>) {
        let bar = ProgressBar::new(group.job_count as u64);
        bar.set_style(self.style.clone());
        bar.set_message(format!(
            "{} cam{} {}/{}",
            group.dataset, group.camera_index, group.category, group.label
        ));

        if let Ok(mut current) = self.current.lock()
            && let Some(previous) = current.replace(bar)
        {
            previous.finish();
        }
    }

    fn on_job_finished(&self, report: &JobReport<'_>) {
        let Ok(current) = self.current.lock() else {
            return;
        };
        if let Some(bar) = current.as_ref() {
            if report.outcome.is_failed() {
                bar.println(format!(
                    "{} cam{} {}#{} {}",
                    "failed".red().bold(),
                    report.camera_index,
                    report.label,
                    report.segment_index,
                    report.outcome
                ));
            }
            bar.inc(1);
        }
    }
}

fn print_summary(summary: &BatchSummary, json: bool) {
    if json {
        let payload = json!({
            "entries": summary.entries,
            "cameras_failed": summary.cameras_failed,
            "written": summary.written,
            "skipped": summary.skipped,
            "failed": summary.failed,
            "elapsed_seconds": summary.elapsed.as_secs_f64(),
        });
        println!("{payload:#}");
        return;
    }

    println!(
        "{} {}",
        "success:".green().bold(),
        format!(
            "Wrote {} clip(s) from {} configuration(s) in {}",
            summary.written,
            summary.entries,
            format_elapsed(summary.elapsed)
        )
        .green()
    );

    if summary.skipped > 0 {
        eprintln!(
            "{} {}",
            "warning:".yellow().bold(),
            format!("{} segment(s) skipped", summary.skipped).yellow()
        );
    }
    if summary.failed > 0 || summary.cameras_failed > 0 {
        eprintln!(
            "{} {}",
            "warning:".yellow().bold(),
            format!(
                "{} segment(s) failed, {} camera(s) unreadable; see the log for details",
                summary.failed, summary.cameras_failed
            )
            .yellow()
        );
    }
}

fn run() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let default_filter = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter))
        .init();

    let level = parse_log_level(&cli.ffmpeg_log_level).ok_or(format!(
        "unsupported --ffmpeg-log-level: {}",
        cli.ffmpeg_log_level
    ))?;
    ffmpeg_next::util::log::set_level(level);

    let token = CancellationToken::new();
    let handler_token = token.clone();
    ctrlc::set_handler(move || {
        eprintln!(
            "{} {}",
            "warning:".yellow().bold(),
            "interrupted; finishing running clips".yellow()
        );
        handler_token.cancel();
    })?;

    let mut options = BatchOptions::new().with_cancellation(token.clone());
    if let Some(threads) = cli.threads {
        options = options.with_workers(threads);
    }
    if let Some(mode) = cli.mode {
        options = options.with_execution_mode(mode);
    }

    let progress = if cli.progress {
        let progress = Arc::new(TerminalProgress::new()?);
        options = options.with_observer(progress.clone());
        Some(progress)
    } else {
        None
    };

    let backend = FfmpegBackend::new().with_container_timeline(cli.container_timeline);
    let extractor = BatchExtractor::new(Arc::new(backend), options)?;
    let summary = extractor.run(&cli.config)?;

    if let Some(progress) = progress {
        progress.finish();
    }

    if token.is_cancelled() {
        eprintln!(
            "{} {}",
            "warning:".yellow().bold(),
            "batch was interrupted before all segments were processed".yellow()
        );
    }

    print_summary(&summary, cli.json);
    Ok(())
}

fn main() {
    if let Err(error) = run() {
        eprintln!("error: {error}");
        std::process::exit(1);
    }
}
