use super::FrameSink;
use crate::resample;
use anyhow::{Context, Result};
use image::RgbImage;
use std::fs::File;
use std::io::Write;
use std::path::Path;

/// Live preview through a v4l2loopback device.
///
/// v4l2loopback accepts raw frames written to the device file; frames are
/// scaled to the device size and packed as YUYV 4:2:2.
pub struct LoopbackSink {
    device: File,
    width: u32,
    height: u32,
}

impl LoopbackSink {
    pub fn new<P: AsRef<Path>>(device_path: P, width: u32, height: u32) -> Result<Self> {
        let path = device_path.as_ref();
        tracing::info!("Lane preview on {} at {}x{}", path.display(), width, height);

        let device = File::options()
            .write(true)
            .open(path)
            .with_context(|| format!("Cannot open loopback device {}", path.display()))?;

        Ok(Self {
            device,
            width,
            height,
        })
    }
}

/// Pack RGB as YUYV 4:2:2, one macropixel per horizontal pixel pair.
/// A lone pixel at the end of an odd row fills both halves.
fn pack_yuyv(frame: &RgbImage) -> Vec<u8> {
    let (width, height) = frame.dimensions();
    let row_len = width as usize * 3;
    let mut packed = Vec::with_capacity((width.div_ceil(2) * 4 * height) as usize);

    if row_len == 0 {
        return packed;
    }

    for row in frame.as_raw().chunks_exact(row_len) {
        for pair in row.chunks(6) {
            let (first, second) = pair.split_at(3);
            let second = if second.is_empty() { first } else { second };

            let (y0, u0, v0) = luma_chroma(first);
            let (y1, u1, v1) = luma_chroma(second);
            packed.extend_from_slice(&[y0, avg(u0, u1), y1, avg(v0, v1)]);
        }
    }

    packed
}

fn avg(a: u8, b: u8) -> u8 {
    ((a as u16 + b as u16) / 2) as u8
}

/// Full-range BT.601 in 8.8 fixed point (JPEG/JFIF weights)
fn luma_chroma(rgb: &[u8]) -> (u8, u8, u8) {
    let (r, g, b) = (rgb[0] as i32, rgb[1] as i32, rgb[2] as i32);

    let y = (77 * r + 150 * g + 29 * b) >> 8;
    let u = ((-43 * r - 85 * g + 128 * b) >> 8) + 128;
    let v = ((128 * r - 107 * g - 21 * b) >> 8) + 128;

    (
        y.clamp(0, 255) as u8,
        u.clamp(0, 255) as u8,
        v.clamp(0, 255) as u8,
    )
}

impl FrameSink for LoopbackSink {
    fn write_frame(&mut self, frame: &RgbImage) -> Result<()> {
        let frame = resample::resize(frame, self.width, self.height)?;

        self.device
            .write_all(&pack_yuyv(&frame))
            .context("Loopback device rejected frame")?;

        Ok(())
    }

    fn resolution(&self) -> Option<(u32, u32)> {
        Some((self.width, self.height))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    #[test]
    fn test_yuyv_is_two_bytes_per_pixel() {
        let frame = RgbImage::new(6, 3);
        assert_eq!(pack_yuyv(&frame).len(), 6 * 3 * 2);

        // Odd width rounds up to a whole macropixel
        let frame = RgbImage::new(5, 2);
        assert_eq!(pack_yuyv(&frame).len(), 3 * 4 * 2);
    }

    #[test]
    fn test_grey_has_neutral_chroma() {
        let frame = RgbImage::from_pixel(2, 1, Rgb([128, 128, 128]));
        assert_eq!(pack_yuyv(&frame), vec![128, 128, 128, 128]);
    }

    #[test]
    fn test_lane_green_is_bright_and_low_chroma() {
        let (y, u, v) = luma_chroma(&[0, 255, 0]);
        assert_eq!(y, 149);
        assert!(u < 128);
        assert!(v < 128);
    }

    #[test]
    fn test_odd_column_pairs_with_itself() {
        let mut frame = RgbImage::from_pixel(3, 1, Rgb([0, 0, 0]));
        frame.put_pixel(2, 0, Rgb([255, 255, 255]));

        let packed = pack_yuyv(&frame);
        assert_eq!(&packed[..4], &[0, 128, 0, 128]);
        assert_eq!(&packed[4..], &[255, 128, 255, 128]);
    }
}
