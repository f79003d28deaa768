mod image_dir;
mod loopback;

pub use image_dir::ImageSequenceSink;
pub use loopback::LoopbackSink;

use anyhow::Result;
use image::RgbImage;

/// Trait for output destinations
pub trait FrameSink {
    /// Write a frame to the output
    fn write_frame(&mut self, frame: &RgbImage) -> Result<()>;

    /// Get the expected output resolution, if the sink imposes one
    fn resolution(&self) -> Option<(u32, u32)>;
}
