use std::time::Instant;

use camcal_core::{GrayImage, Resolution};
use nokhwa::pixel_format::RgbFormat;
use nokhwa::utils::{CameraIndex, RequestedFormat, RequestedFormatType};
use nokhwa::Camera;

use super::{check_frame_size, DeviceOpener, Frame, FrameSource, SourceError};

/// Live capture device. The stream is stopped when the source is dropped.
pub struct CameraSource {
    camera: Camera,
    index: u32,
    resolution: Resolution,
    opened_at: Instant,
    next_index: u64,
}

impl CameraSource {
    pub fn open(index: u32, requested: Resolution) -> Result<Self, SourceError> {
        let open_err = |reason: String| SourceError::Open { index, reason };

        let format = RequestedFormat::new::<RgbFormat>(RequestedFormatType::HighestResolution(
            nokhwa::utils::Resolution::new(requested.width, requested.height),
        ));
        let mut camera = Camera::new(CameraIndex::Index(index), format)
            .map_err(|e| open_err(e.to_string()))?;
        camera.open_stream().map_err(|e| open_err(e.to_string()))?;

        let negotiated = camera.resolution();
        let resolution = Resolution::new(negotiated.width(), negotiated.height());
        if resolution != requested {
            log::warn!("requested {requested}, device {index} negotiated {resolution}");
        }
        log::info!(
            "camera {index} opened: {} at {resolution}",
            camera.info().human_name()
        );

        Ok(Self {
            camera,
            index,
            resolution,
            opened_at: Instant::now(),
            next_index: 0,
        })
    }
}

impl FrameSource for CameraSource {
    fn resolution(&self) -> Resolution {
        self.resolution
    }

    fn next_frame(&mut self) -> Result<Option<Frame>, SourceError> {
        let buffer = self
            .camera
            .frame()
            .map_err(|e| SourceError::Read(e.to_string()))?;
        let timestamp = self.opened_at.elapsed();
        let rgb = buffer
            .decode_image::<RgbFormat>()
            .map_err(|e| SourceError::Read(e.to_string()))?;
        let (w, h) = (rgb.width(), rgb.height());
        let image = GrayImage::from_rgb8(w as usize, h as usize, rgb.as_raw())
            .ok_or_else(|| SourceError::Read(format!("short {w}x{h} rgb buffer")))?;

        let index = self.next_index;
        // frames must keep the negotiated resolution
        check_frame_size(index, self.resolution, &image)?;
        self.next_index += 1;
        Ok(Some(Frame {
            image,
            index,
            timestamp,
        }))
    }
}

impl Drop for CameraSource {
    fn drop(&mut self) {
        if let Err(e) = self.camera.stop_stream() {
            log::warn!("camera {} did not stop cleanly: {e}", self.index);
        } else {
            log::debug!("camera {} released", self.index);
        }
    }
}

/// Opens [`CameraSource`]s through the platform's native backend.
#[derive(Clone, Copy, Debug, Default)]
pub struct CameraOpener;

impl DeviceOpener for CameraOpener {
    type Source = CameraSource;

    fn open(
        &self,
        device_index: u32,
        requested: Resolution,
    ) -> Result<Self::Source, SourceError> {
        CameraSource::open(device_index, requested)
    }
}
