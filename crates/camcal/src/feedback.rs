//! Operator feedback.
//!
//! Sinks are best-effort side channels. Write failures are logged and
//! ignored; collection never depends on a sink.

use std::io::Write;

use camcal_core::{GridSize, Resolution};

use crate::source::Frame;

pub trait FeedbackSink {
    fn on_start(&mut self, _target: usize, _grid: GridSize, _resolution: Resolution) {}

    /// Every frame, with whether a complete board was found.
    fn on_frame(&mut self, _frame: &Frame, _detected: bool) {}

    fn on_sample_accepted(&mut self, _count: usize, _target: usize) {}

    /// `consecutive` frames in a row without a board.
    fn on_miss(&mut self, _consecutive: usize) {}

    fn on_finished(&mut self, _collected: usize, _target: usize) {}
}

/// Discards everything.
#[derive(Clone, Copy, Debug, Default)]
pub struct NullFeedback;

impl FeedbackSink for NullFeedback {}

/// Misses in a row before the console suggests checking the board.
pub const MISS_HINT_AFTER: usize = 30;

/// Text progress: `.` per detected frame, a line per accepted sample.
#[derive(Debug)]
pub struct ConsoleFeedback<W: Write> {
    out: W,
    /// Whether the cursor sits after a run of dots.
    mid_line: bool,
}

impl ConsoleFeedback<std::io::Stdout> {
    pub fn stdout() -> Self {
        Self::new(std::io::stdout())
    }
}

impl<W: Write> ConsoleFeedback<W> {
    pub fn new(out: W) -> Self {
        Self {
            out,
            mid_line: false,
        }
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    fn line(&mut self, text: &str) {
        let prefix = if self.mid_line { "\n" } else { "" };
        self.mid_line = false;
        if let Err(e) = writeln!(self.out, "{prefix}{text}") {
            log::debug!("console feedback dropped: {e}");
        }
    }
}

impl<W: Write> FeedbackSink for ConsoleFeedback<W> {
    fn on_start(&mut self, target: usize, grid: GridSize, resolution: Resolution) {
        self.line(&format!(
            "Collecting {target} samples of a {grid} checkerboard at {resolution}."
        ));
        self.line("Move the board between captures: near, far, tilted left/right/up/down.");
        self.line("Type q + Enter to abort.");
    }

    fn on_frame(&mut self, _frame: &Frame, detected: bool) {
        if detected {
            let res = write!(self.out, ".").and_then(|_| self.out.flush());
            if let Err(e) = res {
                log::debug!("console feedback dropped: {e}");
            }
            self.mid_line = true;
        }
    }

    fn on_sample_accepted(&mut self, count: usize, target: usize) {
        self.line(&format!("sample {count}/{target} captured, move the board"));
    }

    fn on_miss(&mut self, consecutive: usize) {
        if consecutive > 0 && consecutive % MISS_HINT_AFTER == 0 {
            self.line("board not detected; check lighting and keep the whole board in view");
        }
    }

    fn on_finished(&mut self, collected: usize, target: usize) {
        if collected >= target {
            self.line("Enough samples, solving...");
        } else {
            self.line(&format!("Stopped with {collected}/{target} samples."));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use camcal_core::GrayImage;
    use std::time::Duration;

    fn frame() -> Frame {
        Frame {
            image: GrayImage::new(4, 4),
            index: 0,
            timestamp: Duration::ZERO,
        }
    }

    #[test]
    fn prints_dots_and_progress_lines() {
        let mut fb = ConsoleFeedback::new(Vec::new());
        fb.on_frame(&frame(), true);
        fb.on_frame(&frame(), false);
        fb.on_frame(&frame(), true);
        fb.on_sample_accepted(1, 20);
        let text = String::from_utf8(fb.into_inner()).expect("utf8");
        assert_eq!(text, "..\nsample 1/20 captured, move the board\n");
    }

    #[test]
    fn miss_hint_repeats_every_run() {
        let mut fb = ConsoleFeedback::new(Vec::new());
        for n in 1..=2 * MISS_HINT_AFTER {
            fb.on_miss(n);
        }
        let text = String::from_utf8(fb.into_inner()).expect("utf8");
        assert_eq!(text.matches("board not detected").count(), 2);
    }
}
