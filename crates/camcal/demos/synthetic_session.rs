//! Full calibration session against a simulated camera.
//!
//! A known lens is moved around a 10x7 board; the "detector" replays the
//! exact projections with a little pixel jitter. Run with
//! `cargo run -p camcal --example synthetic_session`.

use std::cell::RefCell;
use std::sync::Arc;
use std::time::Duration;

use camcal::{
    init_with_level, CalibrationConfig, CalibrationPipeline, CancelToken, ConsoleFeedback,
    CornerDetector, DeviceOpener, Distortion, Frame, FrameSource, GridSize, Intrinsics,
    NoRefinement, PlanarSolver, ReferencePattern, Resolution, SourceError,
};
use camcal_core::{GrayImage, GrayImageView, Pt2};
use camcal_solve::synthetic::{orbit_poses, project_pattern};

const FRAME_INTERVAL: Duration = Duration::from_millis(100);

struct SimulatedCamera {
    next: u64,
}

impl FrameSource for SimulatedCamera {
    fn resolution(&self) -> Resolution {
        Resolution::new(640, 480)
    }

    fn next_frame(&mut self) -> Result<Option<Frame>, SourceError> {
        let index = self.next;
        self.next += 1;
        Ok(Some(Frame {
            image: GrayImage::new(16, 12),
            index,
            timestamp: FRAME_INTERVAL * (index as u32 + 1),
        }))
    }
}

struct SimulatedOpener;

impl DeviceOpener for SimulatedOpener {
    type Source = SimulatedCamera;

    fn open(&self, _: u32, _: Resolution) -> Result<SimulatedCamera, SourceError> {
        Ok(SimulatedCamera { next: 0 })
    }
}

/// Projects the board through the true camera; the pose changes every
/// `hold` frames and every fifth frame the board is "lost".
struct SimulatedDetector {
    views: Vec<Vec<Pt2>>,
    hold: usize,
    frame: RefCell<usize>,
}

impl CornerDetector for SimulatedDetector {
    fn detect(&self, _: &GrayImageView<'_>, _: GridSize) -> Option<Vec<Pt2>> {
        let mut frame = self.frame.borrow_mut();
        let k = *frame;
        *frame += 1;
        if k % 5 == 4 {
            return None;
        }
        let view = &self.views[(k / self.hold) % self.views.len()];
        // deterministic sub-pixel jitter
        let jittered = view
            .iter()
            .enumerate()
            .map(|(n, p)| {
                let phase = (n * 7 + k * 13) as f64;
                Pt2::new(p.x + 0.15 * phase.sin(), p.y + 0.15 * phase.cos())
            })
            .collect();
        Some(jittered)
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_with_level(log::LevelFilter::Info)?;

    let config = CalibrationConfig {
        target_samples: 12,
        ..CalibrationConfig::default()
    };
    let truth = Intrinsics::new(615.0, 612.0, 318.5, 241.0);
    let lens = Distortion {
        k1: -0.12,
        k2: 0.03,
        ..Distortion::zero()
    };

    let pattern = Arc::new(ReferencePattern::new(config.grid, config.square_size)?);
    let views = orbit_poses(&pattern, 12, 0.65, 0.5)
        .iter()
        .map(|pose| project_pattern(&pattern, &truth, &lens, pose).ok_or("board behind camera"))
        .collect::<Result<Vec<_>, _>>()?;

    let detector = SimulatedDetector {
        views,
        hold: 20,
        frame: RefCell::new(0),
    };
    let solver = PlanarSolver::new(config.solver);
    let pipeline = CalibrationPipeline::new(config, SimulatedOpener, detector, NoRefinement, solver);

    let report = pipeline.run(&CancelToken::new(), &mut ConsoleFeedback::stdout())?;
    println!("\n{report}");
    println!(
        "true: fx {:.1} fy {:.1} cx {:.1} cy {:.1} k1 {:.3} k2 {:.3}",
        truth.fx, truth.fy, truth.cx, truth.cy, lens.k1, lens.k2
    );
    Ok(())
}
