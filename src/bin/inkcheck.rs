//! inkcheck CLI - Command-line interface for inkcheck
//!
//! Commands:
//! - build: Replay a capture log into a session record
//! - score: Score a session (or capture log) and print the verdict report
//! - inspect: Print per-stroke kinematic metrics
//! - validate: Validate a capture log
//! - algorithms: List the built-in scoring algorithms

use clap::{Args, Parser, Subcommand, ValueEnum};
use std::fs;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use inkcheck::capture::{CaptureLog, CAPTURE_LOG_VERSION};
use inkcheck::pipeline::CaptchaProcessor;
use inkcheck::scoring::{builtin_algorithm, ScoringEngine, BUILTIN_ALGORITHMS};
use inkcheck::session::{parse_session, session_to_json};
use inkcheck::types::{CanvasSize, CaptchaSession};
use inkcheck::{INKCHECK_VERSION, PRODUCER_NAME};

/// inkcheck - Pointer-motion capture and risk scoring for drawing challenges
#[derive(Parser)]
#[command(name = "inkcheck")]
#[command(author = "Synheart AI Inc")]
#[command(version = INKCHECK_VERSION)]
#[command(about = "Turn drawing-challenge pointer input into risk verdicts", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Replay a capture log into a session record
    Build {
        /// Input capture log path (use - for stdin)
        #[arg(short, long)]
        input: PathBuf,

        /// Output session path (use - for stdout)
        #[arg(short, long, default_value = "-")]
        output: PathBuf,

        #[command(flatten)]
        canvas: CanvasArgs,

        /// Output format
        #[arg(long, default_value = "json")]
        output_format: OutputFormat,
    },

    /// Score a session or capture log
    Score {
        /// Input path (use - for stdin)
        #[arg(short, long)]
        input: PathBuf,

        /// Output verdict path (use - for stdout)
        #[arg(short, long, default_value = "-")]
        output: PathBuf,

        /// Kind of input document
        #[arg(long, default_value = "auto")]
        input_kind: InputKind,

        /// Built-in algorithms to disable (repeatable)
        #[arg(long)]
        disable: Vec<String>,

        /// Run only these built-in algorithms (repeatable)
        #[arg(long)]
        only: Vec<String>,

        #[command(flatten)]
        canvas: CanvasArgs,

        /// Output format
        #[arg(long, default_value = "json")]
        output_format: OutputFormat,
    },

    /// Print per-stroke kinematic metrics
    Inspect {
        /// Input path (use - for stdin)
        #[arg(short, long)]
        input: PathBuf,

        /// Kind of input document
        #[arg(long, default_value = "auto")]
        input_kind: InputKind,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Validate a capture log
    Validate {
        /// Input capture log path (use - for stdin)
        #[arg(short, long)]
        input: PathBuf,

        /// Output validation report as JSON
        #[arg(long)]
        json: bool,
    },

    /// List the built-in scoring algorithms
    Algorithms {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

/// Logical canvas override applied when replaying capture logs
#[derive(Args, Clone, Copy)]
struct CanvasArgs {
    /// Logical canvas width
    #[arg(long)]
    canvas_width: Option<f64>,

    /// Logical canvas height
    #[arg(long)]
    canvas_height: Option<f64>,
}

impl CanvasArgs {
    fn apply(self, processor: CaptchaProcessor) -> CaptchaProcessor {
        if self.canvas_width.is_none() && self.canvas_height.is_none() {
            return processor;
        }
        let default = CanvasSize::default();
        processor.with_canvas(CanvasSize {
            width: self.canvas_width.unwrap_or(default.width),
            height: self.canvas_height.unwrap_or(default.height),
        })
    }
}

#[derive(Clone, Copy, ValueEnum)]
enum InputKind {
    /// Detect from the document shape
    Auto,
    /// Capture log (inkcheck.capture_log.v1)
    CaptureLog,
    /// Session record
    Session,
}

#[derive(Clone, Copy, ValueEnum)]
enum OutputFormat {
    /// Compact JSON
    Json,
    /// Pretty-printed JSON
    JsonPretty,
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let cli = Cli::parse();

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!(
                "{}",
                serde_json::to_string(&CliError::from(e))
                    .unwrap_or_else(|_| "Unknown error".to_string())
            );
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<(), InkcheckCliError> {
    match cli.command {
        Commands::Build {
            input,
            output,
            canvas,
            output_format,
        } => cmd_build(&input, &output, canvas, output_format),

        Commands::Score {
            input,
            output,
            input_kind,
            disable,
            only,
            canvas,
            output_format,
        } => cmd_score(&input, &output, input_kind, &disable, &only, canvas, output_format),

        Commands::Inspect {
            input,
            input_kind,
            json,
        } => cmd_inspect(&input, input_kind, json),

        Commands::Validate { input, json } => cmd_validate(&input, json),

        Commands::Algorithms { json } => cmd_algorithms(json),
    }
}

fn cmd_build(
    input: &Path,
    output: &Path,
    canvas: CanvasArgs,
    output_format: OutputFormat,
) -> Result<(), InkcheckCliError> {
    let processor = canvas.apply(CaptchaProcessor::new());
    let session = processor.build_session(&read_input(input)?)?;
    log::info!(
        "built session {} ({} strokes)",
        session.session_id,
        session.stroke_count
    );

    let output_data = match output_format {
        OutputFormat::Json => session_to_json(&session)?,
        OutputFormat::JsonPretty => serde_json::to_string_pretty(&session)?,
    };
    write_output(output, &output_data)
}

fn cmd_score(
    input: &Path,
    output: &Path,
    input_kind: InputKind,
    disable: &[String],
    only: &[String],
    canvas: CanvasArgs,
    output_format: OutputFormat,
) -> Result<(), InkcheckCliError> {
    let engine = build_engine(disable, only)?;
    let processor = canvas.apply(CaptchaProcessor::with_engine(engine));

    let session = load_session(&processor, input, input_kind)?;
    let report = processor.score(&session);
    log::info!(
        "session {} scored {:.3} ({:?})",
        report.session_id,
        report.combined_score,
        report.verdict
    );

    let output_data = match output_format {
        OutputFormat::Json => report.to_json()?,
        OutputFormat::JsonPretty => serde_json::to_string_pretty(&report)?,
    };
    write_output(output, &output_data)
}

fn cmd_inspect(input: &Path, input_kind: InputKind, json: bool) -> Result<(), InkcheckCliError> {
    let session = load_session(&CaptchaProcessor::new(), input, input_kind)?;

    if json {
        let strokes: Vec<serde_json::Value> = session
            .strokes
            .iter()
            .map(|s| {
                serde_json::json!({
                    "id": s.id,
                    "points": s.points.len(),
                    "start_time": s.start_time,
                    "end_time": s.end_time,
                    "metrics": s.metrics,
                })
            })
            .collect();
        let summary = serde_json::json!({
            "session_id": session.session_id,
            "prompt": session.prompt,
            "stroke_count": session.stroke_count,
            "total_duration": session.total_duration,
            "total_path_length": session.total_path_length,
            "avg_velocity": session.avg_velocity,
            "pauses": session.pauses,
            "strokes": strokes,
        });
        println!("{}", serde_json::to_string_pretty(&summary)?);
        return Ok(());
    }

    println!("Session {}", session.session_id);
    println!("==============================================");
    println!("Prompt:            {}", session.prompt);
    println!("Strokes:           {}", session.stroke_count);
    println!("Duration (ms):     {:.1}", session.total_duration);
    println!("Path length:       {:.1}", session.total_path_length);
    println!("Avg velocity:      {:.4}", session.avg_velocity);
    println!(
        "Pauses (ms):       {}",
        session
            .pauses
            .iter()
            .map(|p| format!("{:.1}", p))
            .collect::<Vec<_>>()
            .join(", ")
    );

    if !session.strokes.is_empty() {
        println!();
        println!(
            "{:>4} {:>6} {:>10} {:>10} {:>9} {:>9} {:>9} {:>9} {:>5}",
            "id", "points", "length", "duration", "avg_v", "max_v", "avg_a", "max_a", "turns"
        );
        for stroke in &session.strokes {
            let m = &stroke.metrics;
            println!(
                "{:>4} {:>6} {:>10.2} {:>10.2} {:>9.4} {:>9.4} {:>9.5} {:>9.5} {:>5}",
                stroke.id,
                stroke.points.len(),
                m.length,
                m.duration,
                m.avg_velocity,
                m.max_velocity,
                m.avg_acceleration,
                m.max_acceleration,
                m.direction_changes
            );
        }
    }

    Ok(())
}

fn cmd_validate(input: &Path, json: bool) -> Result<(), InkcheckCliError> {
    let log = CaptureLog::from_json(&read_input(input)?)?;

    let header_error = log.validate().err().map(|e| e.to_string());
    let failures = log.validate_events();

    let report = ValidationReport {
        schema_version: log.schema_version.clone(),
        header_error,
        total_events: log.events.len(),
        valid_events: log.events.len() - failures.len(),
        invalid_events: failures.len(),
        errors: failures
            .iter()
            .map(|f| ValidationErrorDetail {
                index: f.index,
                error: f.error.to_string(),
            })
            .collect(),
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("Validation Report");
        println!("=================");
        println!("Schema:         {} (expected {})", report.schema_version, CAPTURE_LOG_VERSION);
        if let Some(err) = &report.header_error {
            println!("Header:         {}", err);
        }
        println!("Total events:   {}", report.total_events);
        println!("Valid events:   {}", report.valid_events);
        println!("Invalid events: {}", report.invalid_events);

        if !report.errors.is_empty() {
            println!("\nErrors:");
            for err in &report.errors {
                println!("  - Event {}: {}", err.index, err.error);
            }
        }
    }

    if report.header_error.is_some() || report.invalid_events > 0 {
        Err(InkcheckCliError::ValidationFailed(
            report.invalid_events + usize::from(report.header_error.is_some()),
        ))
    } else {
        Ok(())
    }
}

fn cmd_algorithms(json: bool) -> Result<(), InkcheckCliError> {
    let listing: Vec<AlgorithmInfo> = BUILTIN_ALGORITHMS
        .iter()
        .filter_map(|name| builtin_algorithm(name))
        .map(|a| AlgorithmInfo {
            name: a.name().to_string(),
            version: a.version().to_string(),
        })
        .collect();

    if json {
        println!("{}", serde_json::to_string_pretty(&listing)?);
    } else {
        println!("{} {} built-in algorithms:", PRODUCER_NAME, INKCHECK_VERSION);
        for info in &listing {
            println!("  - {} v{}", info.name, info.version);
        }
    }

    Ok(())
}

// Helper functions

fn read_input(input: &Path) -> Result<String, InkcheckCliError> {
    if input.to_string_lossy() == "-" {
        if atty::is(atty::Stream::Stdin) {
            log::warn!("reading from an interactive terminal; end input with Ctrl-D");
        }
        let mut buffer = String::new();
        io::stdin().read_to_string(&mut buffer)?;
        Ok(buffer)
    } else {
        Ok(fs::read_to_string(input)?)
    }
}

fn write_output(output: &Path, data: &str) -> Result<(), InkcheckCliError> {
    if output.to_string_lossy() == "-" {
        println!("{}", data);
    } else {
        fs::write(output, data)?;
    }
    Ok(())
}

fn load_session(
    processor: &CaptchaProcessor,
    input: &Path,
    input_kind: InputKind,
) -> Result<CaptchaSession, InkcheckCliError> {
    let data = read_input(input)?;

    let kind = match input_kind {
        InputKind::Auto => detect_input_kind(&data)?,
        other => other,
    };

    match kind {
        InputKind::Session => Ok(parse_session(&data)?),
        _ => Ok(processor.build_session(&data)?),
    }
}

fn detect_input_kind(data: &str) -> Result<InputKind, InkcheckCliError> {
    let value: serde_json::Value = serde_json::from_str(data)?;
    if value.get("events").is_some() {
        Ok(InputKind::CaptureLog)
    } else if value.get("strokes").is_some() {
        Ok(InputKind::Session)
    } else {
        Err(InkcheckCliError::UnknownInput)
    }
}

fn build_engine(disable: &[String], only: &[String]) -> Result<ScoringEngine, InkcheckCliError> {
    let selected: Vec<&str> = if only.is_empty() {
        BUILTIN_ALGORITHMS.to_vec()
    } else {
        only.iter().map(String::as_str).collect()
    };

    let mut engine = ScoringEngine::new();
    for name in selected {
        let algorithm = builtin_algorithm(name)
            .ok_or_else(|| InkcheckCliError::UnknownAlgorithm(name.to_string()))?;
        engine.register_shared(algorithm);
    }

    for name in disable {
        if engine.unregister(name) == 0 && builtin_algorithm(name).is_none() {
            return Err(InkcheckCliError::UnknownAlgorithm(name.clone()));
        }
    }

    Ok(engine)
}

// Error types

#[derive(Debug)]
enum InkcheckCliError {
    Io(io::Error),
    Capture(inkcheck::CaptureError),
    Json(serde_json::Error),
    UnknownInput,
    UnknownAlgorithm(String),
    ValidationFailed(usize),
}

impl From<io::Error> for InkcheckCliError {
    fn from(e: io::Error) -> Self {
        InkcheckCliError::Io(e)
    }
}

impl From<inkcheck::CaptureError> for InkcheckCliError {
    fn from(e: inkcheck::CaptureError) -> Self {
        InkcheckCliError::Capture(e)
    }
}

impl From<serde_json::Error> for InkcheckCliError {
    fn from(e: serde_json::Error) -> Self {
        InkcheckCliError::Json(e)
    }
}

#[derive(serde::Serialize)]
struct CliError {
    code: String,
    message: String,
    hint: Option<String>,
}

impl From<InkcheckCliError> for CliError {
    fn from(e: InkcheckCliError) -> Self {
        match e {
            InkcheckCliError::Io(e) => CliError {
                code: "IO_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Check file paths and permissions".to_string()),
            },
            InkcheckCliError::Capture(e) => CliError {
                code: "CAPTURE_ERROR".to_string(),
                message: e.to_string(),
                hint: Some(format!(
                    "Ensure input is a session record or a {} document",
                    CAPTURE_LOG_VERSION
                )),
            },
            InkcheckCliError::Json(e) => CliError {
                code: "JSON_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Check JSON syntax".to_string()),
            },
            InkcheckCliError::UnknownInput => CliError {
                code: "UNKNOWN_INPUT".to_string(),
                message: "Input is neither a capture log nor a session".to_string(),
                hint: Some("Pass --input-kind explicitly".to_string()),
            },
            InkcheckCliError::UnknownAlgorithm(name) => CliError {
                code: "UNKNOWN_ALGORITHM".to_string(),
                message: format!("No built-in algorithm named {}", name),
                hint: Some("Run 'inkcheck algorithms' for the list".to_string()),
            },
            InkcheckCliError::ValidationFailed(count) => CliError {
                code: "VALIDATION_FAILED".to_string(),
                message: format!("{} validation error(s)", count),
                hint: Some("Fix validation errors and retry".to_string()),
            },
        }
    }
}

// Report types

#[derive(serde::Serialize)]
struct ValidationReport {
    schema_version: String,
    header_error: Option<String>,
    total_events: usize,
    valid_events: usize,
    invalid_events: usize,
    errors: Vec<ValidationErrorDetail>,
}

#[derive(serde::Serialize)]
struct ValidationErrorDetail {
    index: usize,
    error: String,
}

#[derive(serde::Serialize)]
struct AlgorithmInfo {
    name: String,
    version: String,
}
