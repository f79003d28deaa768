use super::FrameSource;
use anyhow::{Context, Result};
use image::RgbImage;
use nokhwa::pixel_format::RgbFormat;
use nokhwa::utils::{CameraIndex, RequestedFormat, RequestedFormatType};
use nokhwa::Camera;

/// Live dashcam feed. Never runs out of frames.
pub struct WebcamCapture {
    camera: Camera,
    width: u32,
    height: u32,
}

impl WebcamCapture {
    pub fn new(device_index: u32) -> Result<Self> {
        tracing::info!("Connecting to dashcam {}", device_index);

        let index = CameraIndex::Index(device_index);
        let requested =
            RequestedFormat::new::<RgbFormat>(RequestedFormatType::AbsoluteHighestResolution);

        let mut camera = Camera::new(index, requested)
            .with_context(|| format!("Dashcam {} unavailable", device_index))?;

        camera
            .open_stream()
            .with_context(|| format!("Dashcam {} refused to stream", device_index))?;

        let resolution = camera.resolution();
        tracing::info!("Dashcam delivers {}x{} frames", resolution.width(), resolution.height());

        Ok(Self {
            camera,
            width: resolution.width(),
            height: resolution.height(),
        })
    }
}

impl FrameSource for WebcamCapture {
    fn next_frame(&mut self) -> Result<Option<RgbImage>> {
        let buffer = self.camera.frame().context("Dashcam frame grab failed")?;
        let frame = buffer
            .decode_image::<RgbFormat>()
            .context("Dashcam frame could not be decoded to RGB")?;

        Ok(Some(frame))
    }

    fn resolution(&self) -> (u32, u32) {
        (self.width, self.height)
    }
}
