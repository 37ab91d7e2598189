//! Connectivity probe: open, confirm a frame arrives, preview until stopped.

use camcal_core::Resolution;
use serde::Serialize;

use crate::source::{DeviceOpener, Frame, FrameSource, SourceError};
use crate::CancelToken;

#[derive(thiserror::Error, Debug)]
pub enum ProbeError {
    #[error("device unavailable: {0}")]
    DeviceUnavailable(#[source] SourceError),
    #[error(transparent)]
    Source(SourceError),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct ProbeReport {
    pub resolution: Resolution,
    /// The first read delivered a non-blank frame.
    pub first_frame_ok: bool,
    /// Frames shown after the first one.
    pub frames_previewed: u64,
}

/// Receives preview frames. Display backends may fail silently.
pub trait PreviewSink {
    fn show(&mut self, frame: &Frame);
}

impl<F: FnMut(&Frame)> PreviewSink for F {
    fn show(&mut self, frame: &Frame) {
        self(frame)
    }
}

fn is_blank(frame: &Frame) -> bool {
    frame.image.is_empty() || frame.image.data.iter().all(|&v| v == 0)
}

pub fn run_probe<O: DeviceOpener>(
    opener: &O,
    device_index: u32,
    requested: Resolution,
    cancel: &CancelToken,
    preview: &mut dyn PreviewSink,
) -> Result<ProbeReport, ProbeError> {
    let mut source = opener
        .open(device_index, requested)
        .map_err(ProbeError::DeviceUnavailable)?;
    let resolution = source.resolution();
    log::info!("device {device_index} open, effective resolution {resolution}");

    let first_frame_ok = match source.next_frame() {
        Ok(Some(frame)) if !is_blank(&frame) => {
            log::info!("first frame captured, stream OK");
            true
        }
        Ok(Some(_)) => {
            log::warn!("device is open but the first frame is blank");
            false
        }
        Ok(None) => {
            log::warn!("device is open but delivered no frame");
            false
        }
        Err(e) => {
            log::warn!("device is open but the first read failed: {e}");
            false
        }
    };

    let mut frames_previewed = 0u64;
    while !cancel.is_cancelled() {
        match source.next_frame().map_err(ProbeError::Source)? {
            Some(frame) => {
                preview.show(&frame);
                frames_previewed += 1;
            }
            None => break,
        }
    }
    log::info!("probe stopped after {frames_previewed} preview frames");

    Ok(ProbeReport {
        resolution,
        first_frame_ok,
        frames_previewed,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use camcal_core::GrayImage;
    use std::cell::Cell;
    use std::collections::VecDeque;
    use std::rc::Rc;
    use std::time::Duration;

    struct Frames {
        queue: VecDeque<GrayImage>,
        released: Rc<Cell<u32>>,
    }

    impl FrameSource for Frames {
        fn resolution(&self) -> Resolution {
            Resolution::new(4, 3)
        }

        fn next_frame(&mut self) -> Result<Option<Frame>, SourceError> {
            Ok(self.queue.pop_front().map(|image| Frame {
                image,
                index: 0,
                timestamp: Duration::ZERO,
            }))
        }
    }

    impl Drop for Frames {
        fn drop(&mut self) {
            self.released.set(self.released.get() + 1);
        }
    }

    struct Opener {
        first: u8,
        frames: usize,
        released: Rc<Cell<u32>>,
        fail: bool,
    }

    impl DeviceOpener for Opener {
        type Source = Frames;

        fn open(&self, index: u32, _: Resolution) -> Result<Frames, SourceError> {
            if self.fail {
                return Err(SourceError::Open {
                    index,
                    reason: "busy".into(),
                });
            }
            let mut queue = VecDeque::new();
            queue.push_back(GrayImage::from_fn(4, 3, |_, _| self.first));
            for _ in 1..self.frames {
                queue.push_back(GrayImage::from_fn(4, 3, |x, _| x as u8));
            }
            Ok(Frames {
                queue,
                released: self.released.clone(),
            })
        }
    }

    fn opener(first: u8, frames: usize) -> Opener {
        Opener {
            first,
            frames,
            released: Rc::default(),
            fail: false,
        }
    }

    #[test]
    fn previews_until_end_of_stream() {
        let opener = opener(90, 5);
        let mut shown = 0;
        let report = run_probe(
            &opener,
            0,
            Resolution::new(640, 480),
            &CancelToken::new(),
            &mut |_: &Frame| shown += 1,
        )
        .expect("probe");

        assert_eq!(report.resolution, Resolution::new(4, 3));
        assert!(report.first_frame_ok);
        assert_eq!(report.frames_previewed, 4);
        assert_eq!(shown, 4);
        assert_eq!(opener.released.get(), 1);
    }

    #[test]
    fn blank_first_frame_is_flagged() {
        let opener = opener(0, 2);
        let report = run_probe(
            &opener,
            0,
            Resolution::new(640, 480),
            &CancelToken::new(),
            &mut |_: &Frame| {},
        )
        .expect("probe");
        assert!(!report.first_frame_ok);
        assert_eq!(report.frames_previewed, 1);
    }

    #[test]
    fn cancellation_stops_the_preview() {
        let opener = opener(90, 100);
        let token = CancelToken::new();
        let stop = token.clone();
        let mut shown = 0;
        let report = run_probe(
            &opener,
            0,
            Resolution::new(640, 480),
            &token,
            &mut |_: &Frame| {
                shown += 1;
                if shown == 3 {
                    stop.cancel();
                }
            },
        )
        .expect("probe");
        assert_eq!(report.frames_previewed, 3);
        assert_eq!(opener.released.get(), 1);
    }

    #[test]
    fn open_failure_is_device_unavailable() {
        let mut opener = opener(90, 1);
        opener.fail = true;
        let err = run_probe(
            &opener,
            2,
            Resolution::new(640, 480),
            &CancelToken::new(),
            &mut |_: &Frame| {},
        )
        .expect_err("open fails");
        assert!(matches!(err, ProbeError::DeviceUnavailable(_)));
        assert!(err.to_string().starts_with("device unavailable"));
    }
}
