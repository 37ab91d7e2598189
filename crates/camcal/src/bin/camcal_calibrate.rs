use std::error::Error;
use std::path::PathBuf;
use std::time::Duration;

use camcal::{
    watch_stdin, CalibrationConfig, CalibrationPipeline, CalibrationReport, CancelToken,
    ConsoleFeedback, CornerDetector, DeviceOpener, ImageSequenceOpener, PipelineError,
    PlanarSolver, SubPixRefiner,
};
use clap::Parser;
use log::LevelFilter;

/// Collect checkerboard samples from a camera and solve its intrinsics.
#[derive(Debug, Parser)]
#[command(author, version, about = "Checkerboard camera calibration")]
struct Args {
    /// JSON file overlaying the built-in configuration.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Print the effective configuration as JSON and exit.
    #[arg(long)]
    print_config: bool,

    /// Replay image files from a directory instead of opening a camera.
    #[arg(long, value_name = "DIR")]
    images: Option<PathBuf>,

    /// Simulated time between replayed images, milliseconds.
    #[arg(long, default_value_t = 500)]
    frame_interval_ms: u64,

    /// Print the report as JSON.
    #[arg(long)]
    json: bool,

    #[arg(short, long, conflicts_with = "quiet")]
    verbose: bool,

    #[arg(short, long)]
    quiet: bool,
}

const EXIT_CANCELLED: i32 = 2;

fn main() {
    let args = Args::parse();
    init_logging(&args);

    match try_main(&args) {
        Ok(()) => {}
        Err(err) => {
            eprintln!("error: {err}");
            let cancelled = matches!(
                err.downcast_ref::<PipelineError>(),
                Some(PipelineError::Cancelled { .. })
            );
            std::process::exit(if cancelled { EXIT_CANCELLED } else { 1 });
        }
    }
}

fn init_logging(args: &Args) {
    let level = if args.verbose {
        LevelFilter::Debug
    } else if args.quiet {
        LevelFilter::Warn
    } else {
        LevelFilter::Info
    };

    #[cfg(feature = "tracing")]
    {
        let _ = level;
        if let Err(e) = camcal::init_tracing(false) {
            eprintln!("warning: tracing subscriber not installed: {e}");
        }
    }
    #[cfg(not(feature = "tracing"))]
    {
        if let Err(e) = camcal::init_with_level(level) {
            eprintln!("warning: logger not installed: {e}");
        }
    }
}

fn load_config(args: &Args) -> Result<CalibrationConfig, Box<dyn Error>> {
    let cfg = match &args.config {
        Some(path) => CalibrationConfig::from_json_file(path)?,
        None => CalibrationConfig::default(),
    };
    Ok(cfg)
}

fn try_main(args: &Args) -> Result<(), Box<dyn Error>> {
    let config = load_config(args)?;
    if args.print_config {
        println!("{}", serde_json::to_string_pretty(&config)?);
        return Ok(());
    }
    config.validate()?;

    let report = match &args.images {
        Some(dir) => {
            let opener =
                ImageSequenceOpener::new(dir, Duration::from_millis(args.frame_interval_ms));
            calibrate(config, opener)?
        }
        None => calibrate_live(config)?,
    };

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("\n{report}");
    }
    Ok(())
}

#[cfg(feature = "camera")]
fn calibrate_live(config: CalibrationConfig) -> Result<CalibrationReport, Box<dyn Error>> {
    calibrate(config, camcal::CameraOpener)
}

#[cfg(not(feature = "camera"))]
fn calibrate_live(_config: CalibrationConfig) -> Result<CalibrationReport, Box<dyn Error>> {
    Err("built without camera support; rebuild with `--features camera` or pass --images".into())
}

#[cfg(feature = "chessboard")]
fn detector() -> Result<Box<dyn CornerDetector>, Box<dyn Error>> {
    Ok(Box::new(camcal::ChessboardCornerDetector::default()))
}

#[cfg(not(feature = "chessboard"))]
fn detector() -> Result<Box<dyn CornerDetector>, Box<dyn Error>> {
    Err("built without a corner detector; rebuild with `--features chessboard`".into())
}

fn calibrate<O: DeviceOpener>(
    config: CalibrationConfig,
    opener: O,
) -> Result<CalibrationReport, Box<dyn Error>> {
    let solver = PlanarSolver::new(config.solver);
    let pipeline = CalibrationPipeline::new(config, opener, detector()?, SubPixRefiner, solver);

    let cancel = CancelToken::new();
    watch_stdin(cancel.clone(), false);

    let mut feedback = ConsoleFeedback::stdout();
    Ok(pipeline.run(&cancel, &mut feedback)?)
}
