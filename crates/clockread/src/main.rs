//! clockread: read the time from analog clock images.
//!
//! Subcommands:
//!
//! - `read`: run the pipeline on an image file and print the time, with
//!   optional debug overlays, JSON output and per-stage diagnostics.
//! - `render`: draw a synthetic clock face at a given (or random) time.
//! - `self-test`: render a fixed set of times, read them back and report
//!   how many came out right.
//!
//! # Usage
//!
//! ```text
//! cargo run --release --bin clockread -- read clock.png --debug-dir debug/
//! cargo run --release --bin clockread -- render --time 02:35 -o clock.png
//! cargo run --release --bin clockread -- self-test
//! ```
//!
//! Log verbosity follows `RUST_LOG` (default `info`).

#![allow(clippy::print_stdout, clippy::print_stderr)]

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use clap::{Args, Parser, Subcommand};
use clockread_pipeline::diagnostics::{Clock, read_time_with_diagnostics};
use clockread_pipeline::{
    Circle, ClassifiedHands, GrayImage, NoopObserver, PipelineConfig, Segment, StageObserver,
    TimeReading, overlay,
};
use clockread_render::{ClockFace, ClockTime};
use rand::SeedableRng;
use rand::rngs::StdRng;

type CliError = Box<dyn std::error::Error>;
type CliResult<T> = Result<T, CliError>;

/// Read the time from analog clock images.
#[derive(Parser)]
#[command(name = "clockread", version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Read the time shown on a clock image.
    Read(ReadArgs),
    /// Render a synthetic clock face.
    Render(RenderArgs),
    /// Render known times, read them back and report mismatches.
    SelfTest(SelfTestArgs),
}

#[derive(Args)]
struct ReadArgs {
    /// Path to the input image (PNG, JPEG, BMP, WebP).
    image_path: PathBuf,

    /// Write stage overlays (circle.png, segments.png, hands.png) here.
    #[arg(long)]
    debug_dir: Option<PathBuf>,

    /// Print the reading as JSON.
    #[arg(long)]
    json: bool,

    /// Print per-stage timing and counts.
    #[arg(long)]
    diagnostics: bool,

    #[command(flatten)]
    tuning: TuningArgs,
}

/// Detector parameters exposed on the command line.
#[derive(Args)]
struct TuningArgs {
    /// Minimum center votes for the face circle.
    #[arg(long, default_value_t = PipelineConfig::DEFAULT_CIRCLE_VOTE_THRESHOLD)]
    circle_vote_threshold: u32,

    /// Minimum Hough votes before a line is walked.
    #[arg(long, default_value_t = PipelineConfig::DEFAULT_LINE_VOTE_THRESHOLD)]
    line_vote_threshold: u32,

    /// Minimum segment length in pixels.
    #[arg(long, default_value_t = PipelineConfig::DEFAULT_MIN_LINE_LENGTH)]
    min_line_length: f64,

    /// Largest gap bridged while walking a line, in pixels.
    #[arg(long, default_value_t = PipelineConfig::DEFAULT_MAX_LINE_GAP)]
    max_line_gap: u32,

    /// Anchor window as a fraction of the center coordinates.
    #[arg(long, default_value_t = PipelineConfig::DEFAULT_ANCHOR_TOLERANCE)]
    anchor_tolerance: f64,

    /// Full pipeline config as a JSON string.
    ///
    /// When provided, the individual tuning flags are ignored. Missing
    /// fields take their defaults.
    #[arg(long)]
    config_json: Option<String>,
}

#[derive(Args)]
struct RenderArgs {
    /// Time to draw as HH:MM. Invalid or missing means a random time.
    #[arg(long)]
    time: Option<String>,

    /// Output path. Defaults to clock_<unix-seconds>.png.
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Seed for the random time and face jitter.
    #[arg(long)]
    seed: Option<u64>,

    /// Jitter the face center and radius.
    #[arg(long)]
    randomize: bool,
}

#[derive(Args)]
struct SelfTestArgs {
    /// Save every rendered case into this directory.
    #[arg(long)]
    keep: Option<PathBuf>,

    /// Jitter each face with this seed instead of using the default face.
    #[arg(long)]
    seed: Option<u64>,
}

/// Built-in self-test cases: label and `HH:MM` time.
const SELF_TEST_CASES: [(&str, &str); 7] = [
    ("straight line", "01:37"),
    ("overlap", "01:05"),
    ("just before twelve", "11:59"),
    ("midnight", "00:00"),
    ("afternoon", "02:35"),
    ("24-hour input", "17:27"),
    ("single-digit hour", "7:14"),
];

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Read(args) => run_read(&args),
        Commands::Render(args) => run_render(&args),
        Commands::SelfTest(args) => run_self_test(&args),
    };
    result.unwrap_or_else(|e| {
        eprintln!("Error: {e}");
        ExitCode::FAILURE
    })
}

// ── read ───────────────────────────────────────────────────────────────

/// Build a [`PipelineConfig`] from CLI arguments.
///
/// If `--config-json` is provided, the JSON is parsed directly and the
/// individual flags are ignored.
fn config_from_args(args: &TuningArgs) -> CliResult<PipelineConfig> {
    if let Some(ref json) = args.config_json {
        let config = serde_json::from_str(json)
            .map_err(|e| format!("Error parsing --config-json: {e}"))?;
        return Ok(config);
    }
    Ok(PipelineConfig {
        circle_vote_threshold: args.circle_vote_threshold,
        line_vote_threshold: args.line_vote_threshold,
        min_line_length: args.min_line_length,
        max_line_gap: args.max_line_gap,
        anchor_tolerance: args.anchor_tolerance,
        ..PipelineConfig::default()
    })
}

fn run_read(args: &ReadArgs) -> CliResult<ExitCode> {
    let config = config_from_args(&args.tuning)?;
    let bytes = std::fs::read(&args.image_path)
        .map_err(|e| format!("Error reading {}: {e}", args.image_path.display()))?;
    let image = clockread_pipeline::grayscale::decode_and_grayscale(&bytes)?;
    tracing::info!(
        path = %args.image_path.display(),
        width = image.width(),
        height = image.height(),
        "loaded image"
    );

    let mut debug_observer = match &args.debug_dir {
        Some(dir) => {
            std::fs::create_dir_all(dir)
                .map_err(|e| format!("Error creating {}: {e}", dir.display()))?;
            Some(OverlayWriter::new(dir.clone()))
        }
        None => None,
    };
    let mut noop = NoopObserver;
    let observer: &mut dyn StageObserver = match debug_observer.as_mut() {
        Some(writer) => writer,
        None => &mut noop,
    };

    let outcome = if args.diagnostics {
        read_time_with_diagnostics(&image, &config, &StdClock, observer)
            .map(|(reading, diagnostics)| (reading, Some(diagnostics)))
    } else {
        clockread_pipeline::read_time_with_observer(&image, &config, observer)
            .map(|reading| (reading, None))
    };

    if let Some(writer) = &debug_observer {
        writer.report();
    }

    let (reading, diagnostics) = match outcome {
        Ok(result) => result,
        Err(e) => {
            eprintln!("Could not read the time: {e}");
            return Ok(ExitCode::FAILURE);
        }
    };

    if args.json {
        let value = serde_json::json!({
            "reading": reading,
            "diagnostics": diagnostics,
        });
        println!("{}", serde_json::to_string_pretty(&value)?);
    } else {
        print_reading(&reading);
        if let Some(diagnostics) = diagnostics {
            println!();
            println!("{}", diagnostics.report());
        }
    }
    Ok(ExitCode::SUCCESS)
}

fn print_reading(reading: &TimeReading) {
    if let Some(warning) = reading.warning {
        tracing::warn!("{warning}");
    }
    println!("the time is {}", reading.time);
}

/// Observer that saves an overlay image per stage into a directory.
///
/// Callbacks cannot fail, so save errors are collected and reported once
/// the read finishes.
struct OverlayWriter {
    dir: PathBuf,
    written: Vec<PathBuf>,
    errors: Vec<String>,
}

impl OverlayWriter {
    const fn new(dir: PathBuf) -> Self {
        Self {
            dir,
            written: Vec::new(),
            errors: Vec::new(),
        }
    }

    fn save(&mut self, name: &str, image: &clockread_pipeline::RgbImage) {
        let path = self.dir.join(name);
        match image.save(&path) {
            Ok(()) => self.written.push(path),
            Err(e) => self.errors.push(format!("{}: {e}", path.display())),
        }
    }

    fn report(&self) {
        for path in &self.written {
            tracing::info!(path = %path.display(), "wrote overlay");
        }
        for error in &self.errors {
            tracing::warn!("failed to write overlay {error}");
        }
    }
}

impl StageObserver for OverlayWriter {
    fn circle_located(&mut self, denoised: &GrayImage, circle: &Circle) {
        self.save("circle.png", &overlay::draw_circle(denoised, circle));
    }

    fn segments_extracted(&mut self, edges: &GrayImage, segments: &[Segment]) {
        self.save("segments.png", &overlay::draw_segments(edges, segments));
    }

    fn hands_classified(&mut self, image: &GrayImage, circle: &Circle, hands: &ClassifiedHands) {
        self.save("hands.png", &overlay::draw_hands(image, circle, hands));
    }
}

/// [`Clock`] implementation backed by [`std::time::Instant`].
struct StdClock;

impl Clock for StdClock {
    type Instant = Instant;

    fn now(&self) -> Instant {
        Instant::now()
    }

    fn elapsed(&self, since: &Instant) -> Duration {
        since.elapsed()
    }
}

// ── render ─────────────────────────────────────────────────────────────

fn rng_from_seed(seed: Option<u64>) -> StdRng {
    seed.map_or_else(StdRng::from_os_rng, StdRng::seed_from_u64)
}

fn run_render(args: &RenderArgs) -> CliResult<ExitCode> {
    let mut rng = rng_from_seed(args.seed);

    let time = match args.time.as_deref().map(ClockTime::parse) {
        Some(Ok(time)) => time,
        Some(Err(e)) => {
            let time = ClockTime::random(&mut rng);
            tracing::warn!("{e}; drawing random time {time}");
            time
        }
        None => {
            let time = ClockTime::random(&mut rng);
            tracing::info!("no time given; drawing random time {time}");
            time
        }
    };

    let face = if args.randomize {
        ClockFace::randomized(&mut rng)
    } else {
        ClockFace::default()
    };

    let output = match &args.output {
        Some(path) => path.clone(),
        None => default_output_name()?,
    };
    save_render(&face, time, &output)?;
    println!("{time} -> {}", output.display());
    Ok(ExitCode::SUCCESS)
}

/// `clock_<unix-seconds>.png` in the working directory.
fn default_output_name() -> CliResult<PathBuf> {
    let seconds = SystemTime::now().duration_since(UNIX_EPOCH)?.as_secs();
    Ok(PathBuf::from(format!("clock_{seconds}.png")))
}

fn save_render(face: &ClockFace, time: ClockTime, path: &Path) -> CliResult<()> {
    let image = clockread_render::render(face, time)?;
    image
        .save(path)
        .map_err(|e| format!("Error writing {}: {e}", path.display()))?;
    Ok(())
}

// ── self-test ──────────────────────────────────────────────────────────

/// Whether two minutes are within one of each other around the hour.
const fn minutes_match(a: u8, b: u8) -> bool {
    let diff = a.abs_diff(b) % 60;
    diff <= 1 || diff == 59
}

fn run_self_test(args: &SelfTestArgs) -> CliResult<ExitCode> {
    if let Some(dir) = &args.keep {
        std::fs::create_dir_all(dir)
            .map_err(|e| format!("Error creating {}: {e}", dir.display()))?;
    }
    let mut rng = args.seed.map(StdRng::seed_from_u64);
    let config = PipelineConfig::default();
    let mut passed = 0usize;

    for (label, input) in SELF_TEST_CASES {
        let time = ClockTime::parse(input)?;
        let face = rng
            .as_mut()
            .map_or_else(ClockFace::default, ClockFace::randomized);
        let rgba = clockread_render::render(&face, time)?;
        if let Some(dir) = &args.keep {
            let path = dir.join(format!("selftest_{:02}{:02}.png", time.hour(), time.minute()));
            rgba.save(&path)
                .map_err(|e| format!("Error writing {}: {e}", path.display()))?;
        }

        let gray = clockread_pipeline::grayscale::rgba_to_gray(&rgba);
        let outcome = clockread_pipeline::read_time_from_image(&gray, &config);
        let (ok, detail) = match outcome {
            Ok(reading) => {
                let ok = reading.time.hour == time.hour()
                    && minutes_match(reading.time.minute, time.minute());
                let flag = if reading.warning.is_some() {
                    " (low confidence)"
                } else {
                    ""
                };
                (ok, format!("{}{flag}", reading.time))
            }
            Err(e) => (false, e.to_string()),
        };
        if ok {
            passed += 1;
        }
        let status = if ok { "PASS" } else { "FAIL" };
        println!("{status}  {input:>5}  {label:<20} read {detail}");
    }

    let total = SELF_TEST_CASES.len();
    println!();
    println!("{passed}/{total} passed");
    Ok(if passed == total {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}
