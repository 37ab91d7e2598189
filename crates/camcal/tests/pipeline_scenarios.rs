mod common;

use std::time::Duration;

use camcal::{
    CalibrationConfig, CalibrationPipeline, CancelToken, FeedbackSink, GridSize, NoRefinement,
    NullFeedback, PipelineError, Resolution, SolveError, Verdict,
};
use common::{FixedSolver, PixelFlagDetector, Probe, ScriptedOpener};

fn config(target: usize) -> CalibrationConfig {
    CalibrationConfig {
        grid: GridSize::new(4, 3),
        target_samples: target,
        debounce_secs: 1.5,
        ..CalibrationConfig::default()
    }
}

fn pipeline(
    cfg: CalibrationConfig,
    opener: ScriptedOpener,
    rms: f64,
    probe: &Probe,
) -> CalibrationPipeline<ScriptedOpener, PixelFlagDetector, NoRefinement, FixedSolver> {
    CalibrationPipeline::new(
        cfg,
        opener,
        PixelFlagDetector {
            probe: probe.clone(),
        },
        NoRefinement,
        FixedSolver {
            rms,
            fail: None,
            probe: probe.clone(),
        },
    )
}

fn secs(v: f64) -> Duration {
    Duration::from_secs_f64(v)
}

#[derive(Default)]
struct Recorder {
    accepted: Vec<(usize, usize)>,
    longest_miss_run: usize,
    detected_frames: usize,
    finished: Option<(usize, usize)>,
    cancel_after: Option<(usize, CancelToken)>,
}

impl FeedbackSink for Recorder {
    fn on_frame(&mut self, _frame: &camcal::Frame, detected: bool) {
        if detected {
            self.detected_frames += 1;
        }
    }

    fn on_sample_accepted(&mut self, count: usize, target: usize) {
        self.accepted.push((count, target));
        if let Some((after, token)) = &self.cancel_after {
            if count == *after {
                token.cancel();
            }
        }
    }

    fn on_miss(&mut self, consecutive: usize) {
        self.longest_miss_run = self.longest_miss_run.max(consecutive);
    }

    fn on_finished(&mut self, collected: usize, target: usize) {
        self.finished = Some((collected, target));
    }
}

#[test]
fn one_sample_per_debounce_interval() {
    let probe = Probe::default();
    let opener = ScriptedOpener::every_frame(40, secs(0.5), &probe);
    let mut rec = Recorder::default();

    let report = pipeline(config(5), opener, 0.42, &probe)
        .run(&CancelToken::new(), &mut rec)
        .expect("run");

    // frames arrive at 0.5 s steps; acceptances land on frames 3, 6, 9, 12, 15
    assert_eq!(
        *probe.solved_stamps.borrow(),
        vec![secs(1.5), secs(3.0), secs(4.5), secs(6.0), secs(7.5)]
    );
    assert_eq!(probe.frames_read.get(), 15);
    assert_eq!(
        rec.accepted,
        vec![(1, 5), (2, 5), (3, 5), (4, 5), (5, 5)]
    );
    assert_eq!(rec.detected_frames, 15);
    assert_eq!(rec.finished, Some((5, 5)));
    assert_eq!(probe.solve_calls.get(), 1);
    assert_eq!(report.verdict, Verdict::Pass);
}

#[test]
fn device_open_failure_does_no_work() {
    let probe = Probe::default();
    let mut opener = ScriptedOpener::every_frame(10, secs(0.5), &probe);
    opener.fail = true;

    let err = pipeline(config(5), opener, 0.42, &probe)
        .run(&CancelToken::new(), &mut NullFeedback)
        .expect_err("open fails");

    assert!(matches!(err, PipelineError::DeviceUnavailable(_)), "{err}");
    assert_eq!(probe.detect_calls.get(), 0);
    assert_eq!(probe.frames_read.get(), 0);
    assert_eq!(probe.solve_calls.get(), 0);
}

#[test]
fn stream_without_frames_is_device_unavailable() {
    let probe = Probe::default();
    let opener = ScriptedOpener::every_frame(0, secs(0.5), &probe);

    let err = pipeline(config(5), opener, 0.42, &probe)
        .run(&CancelToken::new(), &mut NullFeedback)
        .expect_err("no frames");

    assert!(matches!(err, PipelineError::DeviceUnavailable(_)), "{err}");
    assert_eq!(probe.released.get(), 1);
}

#[test]
fn cancellation_skips_the_solver_and_releases_the_device() {
    let probe = Probe::default();
    let opener = ScriptedOpener::every_frame(100, secs(0.5), &probe);
    let token = CancelToken::new();
    let mut rec = Recorder {
        cancel_after: Some((2, token.clone())),
        ..Recorder::default()
    };

    let err = pipeline(config(5), opener, 0.42, &probe)
        .run(&token, &mut rec)
        .expect_err("cancelled");

    match err {
        PipelineError::Cancelled { collected, target } => assert_eq!((collected, target), (2, 5)),
        other => panic!("unexpected {other}"),
    }
    assert_eq!(probe.solve_calls.get(), 0);
    assert_eq!(probe.released.get(), 1);
    // cancellation is seen on the iteration after the second acceptance
    assert_eq!(probe.frames_read.get(), 6);
    assert_eq!(rec.finished, Some((2, 5)));
}

#[test]
fn cancelled_before_start_reads_nothing() {
    let probe = Probe::default();
    let opener = ScriptedOpener::every_frame(10, secs(0.5), &probe);
    let token = CancelToken::new();
    token.cancel();

    let err = pipeline(config(5), opener, 0.42, &probe)
        .run(&token, &mut NullFeedback)
        .expect_err("cancelled");

    assert!(matches!(
        err,
        PipelineError::Cancelled {
            collected: 0,
            target: 5
        }
    ));
    assert_eq!(probe.frames_read.get(), 0);
}

#[test]
fn stream_end_before_target_produces_no_result() {
    let probe = Probe::default();
    let opener = ScriptedOpener::every_frame(4, secs(0.5), &probe);

    let err = pipeline(config(5), opener, 0.42, &probe)
        .run(&CancelToken::new(), &mut NullFeedback)
        .expect_err("stream ends");

    assert!(matches!(
        err,
        PipelineError::StreamEnded {
            collected: 1,
            target: 5
        }
    ));
    assert_eq!(probe.solve_calls.get(), 0);
    assert_eq!(probe.released.get(), 1);
}

#[test]
fn misses_withhold_progress_and_are_reported() {
    let probe = Probe::default();
    let mut opener = ScriptedOpener::every_frame(0, secs(0.5), &probe);
    // 6 misses, then the board stays in view
    opener.visible = [vec![false; 6], vec![true; 30]].concat();
    let mut rec = Recorder::default();

    pipeline(config(3), opener, 0.42, &probe)
        .run(&CancelToken::new(), &mut rec)
        .expect("run");

    assert_eq!(rec.longest_miss_run, 6);
    // debounce counts from collection start, so the first detected frame is accepted
    assert_eq!(
        *probe.solved_stamps.borrow(),
        vec![secs(3.5), secs(5.0), secs(6.5)]
    );
}

#[test]
fn solver_failure_is_numerical_divergence() {
    let probe = Probe::default();
    let opener = ScriptedOpener::every_frame(40, secs(0.5), &probe);
    let mut p = pipeline(config(3), opener, 0.42, &probe);
    p.solver.fail = Some(SolveError::Degenerate("views too similar"));

    let err = p
        .run(&CancelToken::new(), &mut NullFeedback)
        .expect_err("solver fails");

    assert!(matches!(
        err,
        PipelineError::NumericalDivergence(SolveError::Degenerate(_))
    ));
    assert!(err.to_string().contains("views too similar"));
    assert_eq!(probe.released_at_solve.get(), Some(1));
}

#[test]
fn verdicts_follow_the_rms_threshold() {
    for (rms, verdict) in [(0.42, Verdict::Pass), (1.37, Verdict::Recalibrate)] {
        let probe = Probe::default();
        let opener = ScriptedOpener::every_frame(40, secs(0.5), &probe);
        let report = pipeline(config(3), opener, rms, &probe)
            .run(&CancelToken::new(), &mut NullFeedback)
            .expect("run");
        assert_eq!(report.verdict, verdict, "rms {rms}");
        assert_eq!(report.threshold, 1.0);
    }
}

#[test]
fn negotiated_resolution_reaches_the_solver() {
    let probe = Probe::default();
    let mut opener = ScriptedOpener::every_frame(40, secs(0.5), &probe);
    opener.resolution = Resolution::new(320, 240);

    let report = pipeline(config(3), opener, 0.42, &probe)
        .run(&CancelToken::new(), &mut NullFeedback)
        .expect("run");

    assert_eq!(report.result.image_size, Resolution::new(320, 240));
}

#[test]
fn invalid_config_never_opens_the_device() {
    // 2 samples could be collected but never solved
    for target in [0, 2] {
        let probe = Probe::default();
        let opener = ScriptedOpener::every_frame(40, secs(0.5), &probe);

        let err = pipeline(config(target), opener, 0.42, &probe)
            .run(&CancelToken::new(), &mut NullFeedback)
            .expect_err("invalid");

        assert!(matches!(err, PipelineError::InvalidConfig(_)), "{err}");
        assert_eq!(probe.opened.get(), 0);
        assert_eq!(probe.frames_read.get(), 0);
    }
}
