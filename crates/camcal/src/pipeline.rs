//! Calibration run: open the device, collect samples, solve, report.

use std::sync::Arc;
use std::time::Duration;

use camcal_core::{ReferencePattern, Resolution};
use camcal_detect::{detect_and_refine, CornerDetector, CornerRefiner};
use camcal_solve::{CalibrationSolver, SolveError};

#[cfg(feature = "tracing")]
use tracing::instrument;

use crate::collector::{CollectError, Offer, SampleCollector};
use crate::config::{CalibrationConfig, ConfigError};
use crate::feedback::FeedbackSink;
use crate::report::CalibrationReport;
use crate::source::{DeviceOpener, FrameSource, SourceError};
use crate::CancelToken;

#[derive(thiserror::Error, Debug)]
pub enum PipelineError {
    #[error(transparent)]
    InvalidConfig(#[from] ConfigError),
    #[error("device unavailable: {0}")]
    DeviceUnavailable(#[source] SourceError),
    #[error("stream ended after {collected} of {target} samples")]
    StreamEnded { collected: usize, target: usize },
    #[error("cancelled after {collected} of {target} samples")]
    Cancelled { collected: usize, target: usize },
    #[error("calibration failed: {0}; recollect with more pose variety")]
    NumericalDivergence(#[from] SolveError),
    #[error(transparent)]
    Source(SourceError),
    #[error(transparent)]
    Collect(#[from] CollectError),
}

/// Wires the collaborators for one calibration run.
pub struct CalibrationPipeline<O, D, R, S> {
    pub config: CalibrationConfig,
    pub opener: O,
    pub detector: D,
    pub refiner: R,
    pub solver: S,
}

impl<O, D, R, S> CalibrationPipeline<O, D, R, S>
where
    O: DeviceOpener,
    D: CornerDetector,
    R: CornerRefiner,
    S: CalibrationSolver,
{
    pub fn new(config: CalibrationConfig, opener: O, detector: D, refiner: R, solver: S) -> Self {
        Self {
            config,
            opener,
            detector,
            refiner,
            solver,
        }
    }

    /// Blocks until the target is collected and solved, the stream ends, or
    /// `cancel` is raised. The device is released before solving and on
    /// every early return.
    #[cfg_attr(
        feature = "tracing",
        instrument(
            level = "info",
            skip_all,
            fields(target = self.config.target_samples, device = self.config.device_index)
        )
    )]
    pub fn run(
        &self,
        cancel: &CancelToken,
        feedback: &mut dyn FeedbackSink,
    ) -> Result<CalibrationReport, PipelineError> {
        let cfg = &self.config;
        cfg.validate()?;
        let pattern = ReferencePattern::new(cfg.grid, cfg.square_size)
            .map_err(|e| ConfigError::Invalid(e.to_string()))?;
        let pattern = Arc::new(pattern);

        let mut source = self
            .opener
            .open(cfg.device_index, cfg.resolution)
            .map_err(PipelineError::DeviceUnavailable)?;
        let resolution = source.resolution();
        if resolution.is_empty() {
            return Err(PipelineError::DeviceUnavailable(SourceError::Open {
                index: cfg.device_index,
                reason: format!("device reports an empty {resolution} stream"),
            }));
        }
        if resolution != cfg.resolution {
            log::warn!("requested {}, using negotiated {resolution}", cfg.resolution);
        }

        let samples = self.collect(&mut source, pattern, resolution, cancel, feedback)?;
        drop(source);
        log::debug!("device {} released", cfg.device_index);

        let result = self.solver.solve(&samples, resolution).map_err(|e| {
            log::error!("solve over {} samples failed: {e}", samples.len());
            PipelineError::NumericalDivergence(e)
        })?;
        let report = CalibrationReport::new(result, cfg.quality_threshold_rms);
        if !report.passed() {
            log::warn!(
                "rms {:.4} is not below {:.2}",
                report.result.rms,
                report.threshold
            );
        }
        Ok(report)
    }

    fn collect(
        &self,
        source: &mut O::Source,
        pattern: Arc<ReferencePattern>,
        resolution: Resolution,
        cancel: &CancelToken,
        feedback: &mut dyn FeedbackSink,
    ) -> Result<camcal_core::SampleSet, PipelineError> {
        let cfg = &self.config;
        let params = cfg.subpix.params();
        let target = cfg.target_samples;
        let mut collector = SampleCollector::new(pattern, target, cfg.debounce());
        collector.begin(Duration::ZERO)?;
        feedback.on_start(target, cfg.grid, resolution);
        log::info!(
            "collecting {target} samples of a {} board, {:?} apart",
            cfg.grid,
            cfg.debounce()
        );

        let mut frames_seen = 0u64;
        while !collector.is_satisfied() {
            if cancel.is_cancelled() {
                let collected = collector.cancel();
                feedback.on_finished(collected, target);
                log::warn!("collection cancelled at {collected}/{target}");
                return Err(PipelineError::Cancelled { collected, target });
            }

            let frame = match source.next_frame() {
                Ok(Some(frame)) => frame,
                Ok(None) if frames_seen == 0 => {
                    return Err(PipelineError::DeviceUnavailable(SourceError::Read(
                        "stream delivered no frames".into(),
                    )));
                }
                Ok(None) => {
                    let collected = collector.count();
                    feedback.on_finished(collected, target);
                    return Err(PipelineError::StreamEnded { collected, target });
                }
                Err(e) if frames_seen == 0 => return Err(PipelineError::DeviceUnavailable(e)),
                Err(e) => return Err(PipelineError::Source(e)),
            };
            frames_seen += 1;

            let observation = detect_and_refine(
                &self.detector,
                &self.refiner,
                &frame.image.view(),
                cfg.grid,
                &params,
            );
            let Some(observation) = observation else {
                let misses = collector.record_miss();
                log::trace!("frame {}: no board ({misses} in a row)", frame.index);
                feedback.on_frame(&frame, false);
                feedback.on_miss(misses);
                continue;
            };

            feedback.on_frame(&frame, true);
            match collector.offer(observation, frame.timestamp)? {
                Offer::Accepted { count, target } => {
                    log::info!(
                        "sample {count}/{target} accepted at frame {} ({:.2}s)",
                        frame.index,
                        frame.timestamp.as_secs_f64()
                    );
                    feedback.on_sample_accepted(count, target);
                }
                Offer::Debounced { remaining } => {
                    log::trace!("frame {}: debounced, {remaining:?} to go", frame.index);
                }
            }
        }

        feedback.on_finished(collector.count(), target);
        Ok(collector.into_samples()?)
    }
}
