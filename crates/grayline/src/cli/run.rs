//! The `grayline run` command: push images through the pipeline.

use anyhow::Context;
use clap::{Args, ValueEnum};
use grayline_core::{
    Config, FileDiscovery, ItemOutcome, OutputFormat as CoreOutputFormat, OutputRecord,
    OutputWriter, Pipeline, ProcessingStats, RunReport, RunSummary,
};
use std::io::{self, Write};
use std::path::PathBuf;

/// Arguments for the `run` command.
#[derive(Args, Debug, Default)]
pub struct RunArgs {
    /// Image files or directories to process (defaults to `input.paths` from config)
    pub paths: Vec<PathBuf>,

    /// Config file to use instead of the default location
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Per-item output format
    #[arg(short, long, value_enum, default_value = "text")]
    pub format: OutputFormat,

    /// Comma-separated stage list, e.g. `resize,grayscale`
    #[arg(long, value_delimiter = ',')]
    pub stages: Option<Vec<String>>,

    /// Resize target width in pixels
    #[arg(long)]
    pub width: Option<u32>,

    /// Resize target height in pixels
    #[arg(long)]
    pub height: Option<u32>,

    /// Capacity of each channel between stages
    #[arg(long)]
    pub buffer_size: Option<usize>,

    /// Create missing output directories instead of failing
    #[arg(long)]
    pub create_dirs: bool,
}

/// Supported per-item output formats.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// `Success!` or `Failed!` per item
    #[default]
    Text,
    /// One JSON array with every item and the summary
    Json,
    /// One JSON object per line
    Jsonl,
}

/// Execute the run command.
pub async fn execute(args: RunArgs) -> anyhow::Result<()> {
    let config = load_config(&args)?;

    let inputs = collect_inputs(&args, &config);
    if inputs.is_empty() {
        tracing::warn!("No input images given. Pass paths or set `input.paths` in the config.");
        return Ok(());
    }

    let pipeline = Pipeline::from_config(&config)?;
    tracing::info!(
        "Processing {} image(s) through {} worker(s)",
        inputs.len(),
        pipeline.worker_count()
    );

    let progress = create_progress_bar(inputs.len() as u64);
    let mut emitter = Emitter::new(args.format, io::stdout());
    let start_time = std::time::Instant::now();

    let report = pipeline
        .start(inputs)
        .finish(|outcome| {
            progress.suspend(|| emitter.item(outcome));
            progress.inc(1);
            let elapsed = start_time.elapsed().as_secs_f64();
            if elapsed > 0.0 {
                progress.set_message(format!("{:.1} img/sec", progress.position() as f64 / elapsed));
            }
        })
        .await;
    progress.finish_and_clear();

    emitter.finish(report.summary())?;
    print_summary(&report);

    report.into_result().context("Pipeline aborted")?;
    Ok(())
}

/// Load the config file, apply command-line overrides, and re-validate.
fn load_config(args: &RunArgs) -> anyhow::Result<Config> {
    let mut config = match &args.config {
        Some(path) => {
            let path = PathBuf::from(shellexpand::tilde(&path.to_string_lossy()).as_ref());
            Config::load_from(&path)
                .with_context(|| format!("Failed to load config from {:?}", path))?
        }
        None => Config::load()?,
    };
    apply_overrides(&mut config, args);
    config.validate()?;
    Ok(config)
}

fn apply_overrides(config: &mut Config, args: &RunArgs) {
    if let Some(stages) = &args.stages {
        config.pipeline.stages = stages
            .iter()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();
    }
    if let Some(width) = args.width {
        config.resize.width = width;
    }
    if let Some(height) = args.height {
        config.resize.height = height;
    }
    if let Some(size) = args.buffer_size {
        config.pipeline.buffer_size = size;
    }
    if args.create_dirs {
        config.output.create_dirs = true;
    }
}

/// Expand directory arguments into the ordered list of pipeline inputs.
fn collect_inputs(args: &RunArgs, config: &Config) -> Vec<PathBuf> {
    let requested = if args.paths.is_empty() {
        config.input_paths()
    } else {
        args.paths.clone()
    };
    FileDiscovery::new(config.processing.clone())
        .skip_containing(config.output.with.clone())
        .expand(&requested)
}

/// Writes per-item results and the final summary to stdout.
///
/// The first write error is kept and reported by `finish`; later items are
/// not written.
struct Emitter<W: Write> {
    format: OutputFormat,
    out: W,
    records: Vec<OutputRecord>,
    error: Option<io::Error>,
}

impl<W: Write> Emitter<W> {
    fn new(format: OutputFormat, out: W) -> Self {
        Self {
            format,
            out,
            records: Vec::new(),
            error: None,
        }
    }

    fn item(&mut self, outcome: &ItemOutcome) {
        if self.error.is_some() {
            return;
        }
        let result = match self.format {
            OutputFormat::Text => {
                let line = if outcome.success { "Success!" } else { "Failed!" };
                writeln!(self.out, "{}", line)
            }
            OutputFormat::Jsonl => {
                OutputWriter::new(&mut self.out, CoreOutputFormat::JsonLines, false)
                    .write(&OutputRecord::Item(outcome.clone()))
            }
            OutputFormat::Json => {
                self.records.push(OutputRecord::Item(outcome.clone()));
                Ok(())
            }
        };
        if let Err(e) = result {
            self.error = Some(e);
        }
    }

    fn finish(mut self, summary: RunSummary) -> io::Result<W> {
        if let Some(e) = self.error.take() {
            return Err(e);
        }
        match self.format {
            OutputFormat::Text => {}
            OutputFormat::Jsonl => {
                OutputWriter::new(&mut self.out, CoreOutputFormat::JsonLines, false)
                    .write(&OutputRecord::Summary(summary))?;
            }
            OutputFormat::Json => {
                self.records.push(OutputRecord::Summary(summary));
                OutputWriter::new(&mut self.out, CoreOutputFormat::Json, true)
                    .write_all(&self.records)?;
            }
        }
        self.out.flush()?;
        Ok(self.out)
    }
}

/// Create a progress bar for the run, drawn on stderr.
fn create_progress_bar(total: u64) -> indicatif::ProgressBar {
    use indicatif::{ProgressBar, ProgressStyle};

    let pb = ProgressBar::new(total);
    match ProgressStyle::default_bar().template(
        "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({percent}%) {msg}",
    ) {
        Ok(style) => pb.set_style(style.progress_chars("##-")),
        Err(e) => tracing::debug!("Falling back to default progress style: {e}"),
    }
    pb.set_message("starting...");
    pb
}

/// Print a formatted summary table after the run.
fn print_summary(report: &RunReport) {
    let ProcessingStats {
        succeeded,
        failed,
        not_reached,
        images_per_second,
        total_seconds,
    } = report.stats();

    eprintln!();
    eprintln!("  ====================================");
    eprintln!("               Summary");
    eprintln!("  ====================================");
    eprintln!("    Succeeded:    {:>8}", succeeded);
    if failed > 0 {
        eprintln!("    Failed:       {:>8}", failed);
    }
    if not_reached > 0 {
        eprintln!("    Not reached:  {:>8}", not_reached);
    }
    eprintln!("  ------------------------------------");
    eprintln!("    Total:        {:>8}", report.total_inputs);
    eprintln!("    Duration:     {:>7.1}s", total_seconds);
    eprintln!("    Rate:         {:>7.1} img/sec", images_per_second);
    if let Some(fault) = &report.fault {
        eprintln!("  ------------------------------------");
        eprintln!("    Aborted by:   {:>8}", fault.origin);
    }
    eprintln!("  ====================================");
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[derive(Parser)]
    struct TestCli {
        #[command(flatten)]
        args: RunArgs,
    }

    fn parse(argv: &[&str]) -> RunArgs {
        TestCli::try_parse_from(std::iter::once("run").chain(argv.iter().copied()))
            .unwrap()
            .args
    }

    fn outcome(index: usize, success: bool) -> ItemOutcome {
        ItemOutcome {
            index,
            source: PathBuf::from(format!("images/{index}.jpg")),
            success,
        }
    }

    fn summary(succeeded: usize) -> RunSummary {
        RunSummary {
            stats: ProcessingStats {
                succeeded,
                ..Default::default()
            },
            failed_stage: None,
            failed_input: None,
            error: None,
        }
    }

    #[test]
    fn run_args_defaults() {
        let args = parse(&[]);
        assert!(args.paths.is_empty());
        assert_eq!(args.format, OutputFormat::Text);
        assert!(args.stages.is_none());
        assert!(!args.create_dirs);
    }

    #[test]
    fn run_args_parse_stage_list_and_overrides() {
        let args = parse(&[
            "a.jpg",
            "photos",
            "--stages",
            "grayscale,resize",
            "--width",
            "64",
            "--buffer-size",
            "4",
            "--format",
            "jsonl",
        ]);
        assert_eq!(args.paths, vec![PathBuf::from("a.jpg"), PathBuf::from("photos")]);
        assert_eq!(
            args.stages,
            Some(vec!["grayscale".to_string(), "resize".to_string()])
        );
        assert_eq!(args.width, Some(64));
        assert_eq!(args.buffer_size, Some(4));
        assert_eq!(args.format, OutputFormat::Jsonl);
    }

    #[test]
    fn overrides_replace_config_values() {
        let mut config = Config::default();
        let args = RunArgs {
            stages: Some(vec![" grayscale ".into(), "".into()]),
            width: Some(32),
            height: Some(16),
            buffer_size: Some(3),
            create_dirs: true,
            ..Default::default()
        };
        apply_overrides(&mut config, &args);

        assert_eq!(config.pipeline.stages, vec!["grayscale"]);
        assert_eq!((config.resize.width, config.resize.height), (32, 16));
        assert_eq!(config.pipeline.buffer_size, 3);
        assert!(config.output.create_dirs);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn overrides_are_revalidated() {
        let mut config = Config::default();
        let args = RunArgs {
            buffer_size: Some(0),
            ..Default::default()
        };
        apply_overrides(&mut config, &args);
        assert!(config.validate().is_err());
    }

    #[test]
    fn collect_inputs_expands_directories_and_keeps_files() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("b.png"), b"").unwrap();
        std::fs::write(dir.path().join("a.jpg"), b"").unwrap();
        std::fs::write(dir.path().join("notes.txt"), b"").unwrap();
        let explicit = PathBuf::from("missing.jpg");

        let args = RunArgs {
            paths: vec![explicit.clone(), dir.path().to_path_buf()],
            ..Default::default()
        };
        let inputs = collect_inputs(&args, &Config::default());

        assert_eq!(
            inputs,
            vec![explicit, dir.path().join("a.jpg"), dir.path().join("b.png")]
        );
    }

    #[test]
    fn text_emitter_prints_one_line_per_item() {
        let mut emitter = Emitter::new(OutputFormat::Text, Vec::new());
        emitter.item(&outcome(0, true));
        emitter.item(&outcome(1, false));
        let out = String::from_utf8(emitter.finish(summary(1)).unwrap()).unwrap();
        assert_eq!(out, "Success!\nFailed!\n");
    }

    #[test]
    fn jsonl_emitter_ends_with_summary() {
        let mut emitter = Emitter::new(OutputFormat::Jsonl, Vec::new());
        emitter.item(&outcome(0, true));
        let out = String::from_utf8(emitter.finish(summary(1)).unwrap()).unwrap();

        let lines: Vec<&str> = out.lines().collect();
        assert_eq!(lines.len(), 2);
        let first: OutputRecord = serde_json::from_str(lines[0]).unwrap();
        assert!(matches!(first, OutputRecord::Item(o) if o.success && o.index == 0));
        assert!(lines[1].contains("\"type\":\"summary\""));
    }

    #[test]
    fn json_emitter_writes_a_single_array() {
        let mut emitter = Emitter::new(OutputFormat::Json, Vec::new());
        emitter.item(&outcome(0, true));
        emitter.item(&outcome(1, true));
        let out = String::from_utf8(emitter.finish(summary(2)).unwrap()).unwrap();

        let records: Vec<OutputRecord> = serde_json::from_str(&out).unwrap();
        assert_eq!(records.len(), 3);
        assert!(matches!(records[2], OutputRecord::Summary(ref s) if s.stats.succeeded == 2));
    }
}
