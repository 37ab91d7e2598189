//! Frame acquisition.
//!
//! A [`DeviceOpener`] opens a [`FrameSource`] that owns the capture device
//! until it is dropped. Callers must read the effective resolution back from
//! the source; it may differ from the requested one.

use std::path::{Path, PathBuf};
use std::time::Duration;

use camcal_core::{GrayImage, Resolution};

#[cfg(feature = "camera")]
mod camera;
#[cfg(feature = "camera")]
pub use camera::{CameraOpener, CameraSource};

/// One grayscale frame. `timestamp` is measured from stream open.
#[derive(Clone, Debug)]
pub struct Frame {
    pub image: GrayImage,
    pub index: u64,
    pub timestamp: Duration,
}

#[derive(thiserror::Error, Debug)]
pub enum SourceError {
    #[error("cannot open device {index}: {reason}")]
    Open { index: u32, reason: String },
    #[error("frame read failed: {0}")]
    Read(String),
    #[error("failed to decode {path}: {source}")]
    Decode {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },
    #[error("frame {index} is {got}, stream is {expected}")]
    SizeMismatch {
        index: u64,
        expected: Resolution,
        got: Resolution,
    },
}

/// Reject a frame whose size differs from the stream's resolution.
pub(crate) fn check_frame_size(
    index: u64,
    expected: Resolution,
    image: &GrayImage,
) -> Result<(), SourceError> {
    let got = Resolution::new(image.width as u32, image.height as u32);
    if got != expected {
        return Err(SourceError::SizeMismatch {
            index,
            expected,
            got,
        });
    }
    Ok(())
}

/// A stream of frames from an opened device.
pub trait FrameSource {
    /// Negotiated frame size.
    fn resolution(&self) -> Resolution;

    /// Next frame, or `Ok(None)` at end of stream. Blocks until the device
    /// delivers.
    fn next_frame(&mut self) -> Result<Option<Frame>, SourceError>;
}

impl<T: FrameSource + ?Sized> FrameSource for &mut T {
    fn resolution(&self) -> Resolution {
        (**self).resolution()
    }

    fn next_frame(&mut self) -> Result<Option<Frame>, SourceError> {
        (**self).next_frame()
    }
}

impl<T: FrameSource + ?Sized> FrameSource for Box<T> {
    fn resolution(&self) -> Resolution {
        (**self).resolution()
    }

    fn next_frame(&mut self) -> Result<Option<Frame>, SourceError> {
        (**self).next_frame()
    }
}

/// Opens capture devices by index.
pub trait DeviceOpener {
    type Source: FrameSource;

    fn open(&self, device_index: u32, requested: Resolution)
        -> Result<Self::Source, SourceError>;
}

/// Replays image files as a stream with a fixed frame interval.
///
/// All images must share the size of the first one.
#[derive(Debug)]
pub struct ImageSequenceSource {
    paths: std::vec::IntoIter<PathBuf>,
    /// Decoded first frame, handed out by the first `next_frame`.
    pending: Option<GrayImage>,
    resolution: Resolution,
    interval: Duration,
    next_index: u64,
}

const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "bmp", "tif", "tiff", "pgm", "ppm"];

fn is_image_file(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| IMAGE_EXTENSIONS.contains(&e.to_ascii_lowercase().as_str()))
        .unwrap_or(false)
}

fn load_gray(path: &Path) -> Result<GrayImage, SourceError> {
    let img = image::open(path)
        .map_err(|source| SourceError::Decode {
            path: path.to_path_buf(),
            source,
        })?
        .to_luma8();
    let (w, h) = img.dimensions();
    GrayImage::from_raw(w as usize, h as usize, img.into_raw())
        .ok_or_else(|| SourceError::Read(format!("{} has an inconsistent buffer", path.display())))
}

impl ImageSequenceSource {
    /// Every image file in `dir`, sorted by file name.
    pub fn from_dir(dir: impl AsRef<Path>, interval: Duration) -> Result<Self, SourceError> {
        let dir = dir.as_ref();
        let open_err = |reason: String| SourceError::Open { index: 0, reason };
        let entries = std::fs::read_dir(dir)
            .map_err(|e| open_err(format!("{}: {e}", dir.display())))?;

        let mut paths = Vec::new();
        for entry in entries {
            let path = entry
                .map_err(|e| open_err(format!("{}: {e}", dir.display())))?
                .path();
            if path.is_file() && is_image_file(&path) {
                paths.push(path);
            }
        }
        paths.sort();
        Self::from_paths(paths, interval)
    }

    pub fn from_paths(paths: Vec<PathBuf>, interval: Duration) -> Result<Self, SourceError> {
        let mut paths = paths.into_iter();
        let first_path = paths.next().ok_or_else(|| SourceError::Open {
            index: 0,
            reason: "image sequence is empty".into(),
        })?;
        let first = load_gray(&first_path)?;
        let resolution = Resolution::new(first.width as u32, first.height as u32);
        log::debug!(
            "image sequence opened at {} ({} more files), {:?} per frame",
            resolution,
            paths.len(),
            interval
        );
        Ok(Self {
            paths,
            pending: Some(first),
            resolution,
            interval,
            next_index: 0,
        })
    }
}

impl FrameSource for ImageSequenceSource {
    fn resolution(&self) -> Resolution {
        self.resolution
    }

    fn next_frame(&mut self) -> Result<Option<Frame>, SourceError> {
        let image = match self.pending.take() {
            Some(img) => img,
            None => match self.paths.next() {
                Some(path) => load_gray(&path)?,
                None => return Ok(None),
            },
        };

        let index = self.next_index;
        check_frame_size(index, self.resolution, &image)?;
        self.next_index += 1;
        let timestamp = self.interval.saturating_mul(index as u32);
        Ok(Some(Frame {
            image,
            index,
            timestamp,
        }))
    }
}

/// Opens an [`ImageSequenceSource`] over a directory. The device index and
/// requested resolution are ignored.
#[derive(Clone, Debug)]
pub struct ImageSequenceOpener {
    pub dir: PathBuf,
    pub interval: Duration,
}

impl ImageSequenceOpener {
    pub fn new(dir: impl Into<PathBuf>, interval: Duration) -> Self {
        Self {
            dir: dir.into(),
            interval,
        }
    }
}

impl DeviceOpener for ImageSequenceOpener {
    type Source = ImageSequenceSource;

    fn open(
        &self,
        device_index: u32,
        requested: Resolution,
    ) -> Result<Self::Source, SourceError> {
        log::debug!(
            "replaying {} in place of device {device_index} ({requested} requested)",
            self.dir.display()
        );
        ImageSequenceSource::from_dir(&self.dir, self.interval)
    }
}
