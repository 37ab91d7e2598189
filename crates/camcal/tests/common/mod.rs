//! Scripted collaborators for deterministic pipeline runs.

#![allow(dead_code)]

use std::cell::{Cell, RefCell};
use std::rc::Rc;
use std::time::Duration;

use camcal::{
    CalibrationResult, CalibrationSolver, CornerDetector, DeviceOpener, Distortion, Frame,
    FrameSource, Intrinsics, Resolution, SampleSet, SolveError, SourceError,
};
use camcal_core::{GrayImage, GrayImageView, GridSize, Pt2};

/// Shared counters the tests inspect after a run.
#[derive(Clone, Default)]
pub struct Probe {
    pub opened: Rc<Cell<usize>>,
    pub released: Rc<Cell<usize>>,
    pub frames_read: Rc<Cell<usize>>,
    pub detect_calls: Rc<Cell<usize>>,
    pub solve_calls: Rc<Cell<usize>>,
    /// `released` as seen by the solver.
    pub released_at_solve: Rc<Cell<Option<usize>>>,
    /// Frame timestamps of every sample the solver received.
    pub solved_stamps: Rc<RefCell<Vec<Duration>>>,
}

/// `frames` frames `interval` apart, the first at `interval`. Pixel 0 of
/// frame `k` is 1 when the board is "visible" in it.
pub struct ScriptedSource {
    resolution: Resolution,
    interval: Duration,
    visible: Vec<bool>,
    next: usize,
    probe: Probe,
}

impl FrameSource for ScriptedSource {
    fn resolution(&self) -> Resolution {
        self.resolution
    }

    fn next_frame(&mut self) -> Result<Option<Frame>, SourceError> {
        let Some(&visible) = self.visible.get(self.next) else {
            return Ok(None);
        };
        let k = self.next as u64;
        self.next += 1;
        self.probe.frames_read.set(self.probe.frames_read.get() + 1);

        let mut image = GrayImage::new(4, 4);
        image.data[0] = u8::from(visible);
        Ok(Some(Frame {
            image,
            index: k,
            timestamp: self.interval * (k as u32 + 1),
        }))
    }
}

impl Drop for ScriptedSource {
    fn drop(&mut self) {
        self.probe.released.set(self.probe.released.get() + 1);
    }
}

pub struct ScriptedOpener {
    pub resolution: Resolution,
    pub interval: Duration,
    pub visible: Vec<bool>,
    pub fail: bool,
    pub probe: Probe,
}

impl ScriptedOpener {
    pub fn every_frame(count: usize, interval: Duration, probe: &Probe) -> Self {
        Self {
            resolution: Resolution::new(640, 480),
            interval,
            visible: vec![true; count],
            fail: false,
            probe: probe.clone(),
        }
    }
}

impl DeviceOpener for ScriptedOpener {
    type Source = ScriptedSource;

    fn open(
        &self,
        device_index: u32,
        _requested: Resolution,
    ) -> Result<ScriptedSource, SourceError> {
        if self.fail {
            return Err(SourceError::Open {
                index: device_index,
                reason: "no such device".into(),
            });
        }
        self.probe.opened.set(self.probe.opened.get() + 1);
        Ok(ScriptedSource {
            resolution: self.resolution,
            interval: self.interval,
            visible: self.visible.clone(),
            next: 0,
            probe: self.probe.clone(),
        })
    }
}

/// Reports a full grid whenever pixel 0 is set.
pub struct PixelFlagDetector {
    pub probe: Probe,
}

impl CornerDetector for PixelFlagDetector {
    fn detect(&self, image: &GrayImageView<'_>, grid: GridSize) -> Option<Vec<Pt2>> {
        self.probe.detect_calls.set(self.probe.detect_calls.get() + 1);
        if image.data[0] == 0 {
            return None;
        }
        let corners = (0..grid.rows)
            .flat_map(|j| (0..grid.cols).map(move |i| (i, j)))
            .map(|(i, j)| Pt2::new(i as f64 * 10.0, j as f64 * 10.0))
            .collect();
        Some(corners)
    }
}

/// Returns a fixed result, or a fixed error.
pub struct FixedSolver {
    pub rms: f64,
    pub fail: Option<SolveError>,
    pub probe: Probe,
}

impl CalibrationSolver for FixedSolver {
    fn solve(
        &self,
        samples: &SampleSet,
        image_size: Resolution,
    ) -> Result<CalibrationResult, SolveError> {
        self.probe.solve_calls.set(self.probe.solve_calls.get() + 1);
        self.probe
            .released_at_solve
            .set(Some(self.probe.released.get()));
        self.probe
            .solved_stamps
            .borrow_mut()
            .extend(samples.iter().map(|s| s.captured_at()));
        if let Some(e) = &self.fail {
            return Err(e.clone());
        }
        Ok(CalibrationResult {
            intrinsics: Intrinsics::new(600.0, 600.0, 320.0, 240.0),
            distortion: Distortion::zero(),
            poses: Vec::new(),
            rms: self.rms,
            image_size,
        })
    }
}
