use crate::error::{LaneError, Result};
use crate::resample;
use crate::temporal::{mask_dimensions, Mask};
use image::{Rgb, RgbImage};

/// Channel that carries the lane mask in the overlay (green)
const LANE_CHANNEL: usize = 1;

/// Convert an averaged mask into a green-only RGB overlay of the same size.
///
/// Values are clipped to [0, 255] and truncated; anything above 255 saturates.
pub fn build_overlay(mask: &Mask) -> RgbImage {
    let (width, height) = mask_dimensions(mask);

    RgbImage::from_fn(width, height, |x, y| {
        let mut pixel = Rgb([0u8; 3]);
        pixel[LANE_CHANNEL] = to_u8(mask[[y as usize, x as usize]]);
        pixel
    })
}

/// Resize `overlay` to the frame and add it channel by channel, saturating at 255.
///
/// Pixels where the overlay is zero come out unchanged.
pub fn composite_onto(frame: &RgbImage, overlay: &RgbImage) -> Result<RgbImage> {
    let _span = tracing::debug_span!("composite").entered();

    let (width, height) = frame.dimensions();
    let overlay = resample::resize(overlay, width, height)?;

    if overlay.dimensions() != frame.dimensions() {
        return Err(LaneError::DimensionMismatch {
            expected: frame.dimensions(),
            actual: overlay.dimensions(),
        });
    }

    let blended: Vec<u8> = frame
        .as_raw()
        .iter()
        .zip(overlay.as_raw())
        .map(|(base, lane)| base.saturating_add(*lane))
        .collect();

    RgbImage::from_raw(width, height, blended).ok_or(LaneError::DimensionMismatch {
        expected: frame.dimensions(),
        actual: overlay.dimensions(),
    })
}

/// Saturating float-to-byte cast; NaN maps to 0
fn to_u8(value: f32) -> u8 {
    value.clamp(0.0, 255.0) as u8
}
