//! Checkerboard camera calibration.
//!
//! [`CalibrationPipeline`] turns a frame stream into a curated set of board
//! observations and hands it to a solver:
//!
//! - a [`DeviceOpener`] yields a [`FrameSource`] that owns the device,
//! - a [`CornerDetector`] and [`CornerRefiner`] find the board per frame,
//! - the [`SampleCollector`] accepts detections no closer than the debounce
//!   interval until the target count is reached,
//! - a [`CalibrationSolver`] produces the camera model, summarised by a
//!   [`CalibrationReport`] with a pass/recalibrate verdict.
//!
//! [`run_probe`] is the companion connectivity check.
//!
//! ```no_run
//! use camcal::{
//!     CalibrationConfig, CalibrationPipeline, CancelToken, ConsoleFeedback,
//!     ImageSequenceOpener, PlanarSolver, SubPixRefiner,
//! };
//! # use camcal_core::{GrayImageView, GridSize, Pt2};
//! # struct MyDetector;
//! # impl camcal::CornerDetector for MyDetector {
//! #     fn detect(&self, _: &GrayImageView<'_>, _: GridSize) -> Option<Vec<Pt2>> { None }
//! # }
//! use std::time::Duration;
//!
//! let config = CalibrationConfig::default();
//! let pipeline = CalibrationPipeline::new(
//!     config,
//!     ImageSequenceOpener::new("captures/", Duration::from_millis(500)),
//!     MyDetector,
//!     SubPixRefiner,
//!     PlanarSolver::default(),
//! );
//! let report = pipeline.run(&CancelToken::new(), &mut ConsoleFeedback::stdout())?;
//! println!("{report}");
//! # Ok::<(), camcal::PipelineError>(())
//! ```

mod cancel;
mod collector;
mod config;
mod feedback;
mod pipeline;
mod probe;
mod report;
mod source;

pub use cancel::{watch_stdin, CancelToken};
pub use collector::{CollectError, Offer, Phase, SampleCollector};
pub use config::{CalibrationConfig, ConfigError, SubPixConfig};
pub use feedback::{ConsoleFeedback, FeedbackSink, NullFeedback, MISS_HINT_AFTER};
pub use pipeline::{CalibrationPipeline, PipelineError};
pub use probe::{run_probe, PreviewSink, ProbeError, ProbeReport};
pub use report::{CalibrationReport, Verdict};
pub use source::{
    DeviceOpener, Frame, FrameSource, ImageSequenceOpener, ImageSequenceSource, SourceError,
};

#[cfg(feature = "camera")]
pub use source::{CameraOpener, CameraSource};

pub use camcal_core::{
    init_with_level, CalibrationResult, Distortion, GridSize, Intrinsics, Observation,
    ReferencePattern, Resolution, SampleSet,
};
pub use camcal_detect::{
    detect_and_refine, CornerDetector, CornerRefiner, NoRefinement, SubPixParams, SubPixRefiner,
};
pub use camcal_solve::{CalibrationSolver, PlanarSolver, SolveError, SolverOptions};

#[cfg(feature = "chessboard")]
pub use camcal_detect::ChessboardCornerDetector;

#[cfg(feature = "tracing")]
pub use camcal_core::init_tracing;
