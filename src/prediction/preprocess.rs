use super::types::NormalizedImage;
use crate::error::Result;
use crate::resample;
use image::RgbImage;
use ndarray::{Array2, Array3};

/// Preprocessor for converting frames to model input
pub struct Preprocessor {
    target_width: u32,
    target_height: u32,
}

impl Preprocessor {
    pub fn new(target_width: u32, target_height: u32) -> Self {
        Self {
            target_width,
            target_height,
        }
    }

    pub fn target_size(&self) -> (u32, u32) {
        (self.target_width, self.target_height)
    }

    /// Preprocess an RGB frame into a normalized HWC image
    ///
    /// Steps:
    /// 1. Resize to target dimensions (Lanczos3, aspect ratio not kept)
    /// 2. Convert to float and normalize to [0, 1]
    pub fn normalize(&self, frame: &RgbImage) -> Result<NormalizedImage> {
        let _span = tracing::debug_span!("preprocess").entered();

        let resized = resample::resize(frame, self.target_width, self.target_height)?;

        let (width, height) = resized.dimensions();
        let data = Array3::from_shape_fn((height as usize, width as usize, 3), |(y, x, c)| {
            resized.get_pixel(x as u32, y as u32)[c] as f32 / 255.0
        });

        Ok(NormalizedImage::new(data))
    }

    /// Rescale raw model output from [0, 1] to the [0, 255] mask range
    pub fn scale_prediction(raw: Array2<f32>) -> Array2<f32> {
        raw.mapv_into(|v| v * 255.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    #[test]
    fn test_normalize_shape_and_range() {
        let frame = RgbImage::from_pixel(1280, 720, Rgb([255, 0, 51]));
        let preprocessor = Preprocessor::new(160, 80);

        let image = preprocessor.normalize(&frame).unwrap();
        assert_eq!((image.width(), image.height(), image.channels()), (160, 80, 3));

        let view = image.view();
        assert!((view[[0, 0, 0]] - 1.0).abs() < 1e-6);
        assert_eq!(view[[40, 80, 1]], 0.0);
        assert!((view[[79, 159, 2]] - 0.2).abs() < 1e-6);
    }

    #[test]
    fn test_normalize_keeps_pixel_positions() {
        // Already at model size: no resampling, values map 1:1
        let frame = RgbImage::from_fn(4, 2, |x, y| Rgb([(x * 50) as u8, (y * 255) as u8, 0]));
        let image = Preprocessor::new(4, 2).normalize(&frame).unwrap();

        let view = image.view();
        assert!((view[[0, 3, 0]] - 150.0 / 255.0).abs() < 1e-6);
        assert_eq!(view[[1, 0, 1]], 1.0);
        assert_eq!(view[[0, 0, 1]], 0.0);
    }

    #[test]
    fn test_scale_prediction() {
        let raw = Array2::from_shape_vec((1, 3), vec![0.0, 0.5, 1.0]).unwrap();
        let scaled = Preprocessor::scale_prediction(raw);
        assert_eq!(scaled, Array2::from_shape_vec((1, 3), vec![0.0, 127.5, 255.0]).unwrap());
    }
}
