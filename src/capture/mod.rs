mod image_dir;
#[cfg(feature = "webcam")]
mod webcam;

pub use image_dir::ImageSequenceSource;
#[cfg(feature = "webcam")]
pub use webcam::WebcamCapture;

use anyhow::Result;
use image::RgbImage;

/// Trait for ordered frame sources
pub trait FrameSource {
    /// Pull the next frame, or `None` once a finite source is exhausted
    fn next_frame(&mut self) -> Result<Option<RgbImage>>;

    /// Get the resolution of produced frames
    fn resolution(&self) -> (u32, u32);
}
