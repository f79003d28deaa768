use crate::error::{LaneError, Result};
use image::{imageops, ImageBuffer, Pixel};

/// Resize `image` to exactly `target_width` x `target_height` with a Lanczos3 filter.
///
/// Width and height scale independently, so the aspect ratio is not preserved.
/// A request for the image's own size returns a copy.
pub fn resize<P>(
    image: &ImageBuffer<P, Vec<P::Subpixel>>,
    target_width: u32,
    target_height: u32,
) -> Result<ImageBuffer<P, Vec<P::Subpixel>>>
where
    P: Pixel + 'static,
    P::Subpixel: 'static,
{
    if target_width == 0 || target_height == 0 {
        return Err(LaneError::InvalidDimensions {
            width: target_width,
            height: target_height,
        });
    }

    // Nothing to sample from
    let (width, height) = image.dimensions();
    if width == 0 || height == 0 {
        return Err(LaneError::InvalidDimensions { width, height });
    }

    if image.dimensions() == (target_width, target_height) {
        return Ok(image.clone());
    }

    let _span = tracing::debug_span!("resize", target_width, target_height).entered();

    Ok(imageops::resize(
        image,
        target_width,
        target_height,
        imageops::FilterType::Lanczos3,
    ))
}
