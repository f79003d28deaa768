//! Per-stream lane overlay pipeline.
//!
//! For each frame: resize to model input and normalize, predict, scale the
//! mask to [0, 255], fold it into the temporal window, turn the average into a
//! green overlay and add it onto the original frame.

use crate::error::{LaneError, Result};
use crate::overlay;
use crate::prediction::{MaskPredictor, Preprocessor};
use crate::resample;
use crate::temporal::{mask_dimensions, Mask, TemporalAverager, HISTORY_CAPACITY};
use anyhow::anyhow;
use image::RgbImage;

/// What the pipeline emits for an enriched frame
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RenderMode {
    /// Original frame with the lane overlay added
    #[default]
    Composite,
    /// Overlay alone, scaled to the frame (debug view of the smoothed mask)
    Mask,
}

#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub history_capacity: usize,
    pub render: RenderMode,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            history_capacity: HISTORY_CAPACITY,
            render: RenderMode::Composite,
        }
    }
}

/// Result of pushing one frame through the pipeline.
///
/// A failed frame is never dropped: the original is passed through unchanged
/// and the error travels with it.
#[derive(Debug)]
pub enum FrameOutcome {
    Enriched(RgbImage),
    PassedThrough { frame: RgbImage, error: LaneError },
}

impl FrameOutcome {
    pub fn frame(&self) -> &RgbImage {
        match self {
            Self::Enriched(frame) | Self::PassedThrough { frame, .. } => frame,
        }
    }

    pub fn into_frame(self) -> RgbImage {
        match self {
            Self::Enriched(frame) | Self::PassedThrough { frame, .. } => frame,
        }
    }

    pub fn error(&self) -> Option<&LaneError> {
        match self {
            Self::Enriched(_) => None,
            Self::PassedThrough { error, .. } => Some(error),
        }
    }

    pub fn is_enriched(&self) -> bool {
        matches!(self, Self::Enriched(_))
    }
}

/// Lane overlay pipeline for one stream.
///
/// Owns the stream's mask history. `process` takes `&mut self`, so one stream
/// can never have two frames in flight.
pub struct LaneOverlayPipeline<P> {
    predictor: P,
    preprocessor: Preprocessor,
    averager: TemporalAverager,
    render: RenderMode,
}

impl<P: MaskPredictor> LaneOverlayPipeline<P> {
    pub fn new(predictor: P, config: PipelineConfig) -> Self {
        let (width, height) = predictor.input_size();

        Self {
            predictor,
            preprocessor: Preprocessor::new(width, height),
            averager: TemporalAverager::with_capacity(config.history_capacity),
            render: config.render,
        }
    }

    /// Run one frame through the pipeline.
    ///
    /// The frame's mask is committed to the history only after the output
    /// frame has been fully built, so a failed frame leaves the history as the
    /// previous frame left it.
    pub fn process(&mut self, frame: &RgbImage) -> Result<RgbImage> {
        let _span = tracing::debug_span!("lane_overlay").entered();

        let input = self.preprocessor.normalize(frame)?;

        let raw = self
            .predictor
            .predict(&input)
            .map_err(LaneError::PredictionFailed)?;
        let mask = self.checked_mask(raw)?;

        let averaged = self.averager.mean_with(&mask)?;
        let lane_overlay = overlay::build_overlay(&averaged);

        let output = match self.render {
            RenderMode::Composite => overlay::composite_onto(frame, &lane_overlay)?,
            RenderMode::Mask => resample::resize(&lane_overlay, frame.width(), frame.height())?,
        };

        self.averager.append(mask)?;

        Ok(output)
    }

    /// Run one frame, passing the original through if any step fails.
    pub fn process_frame(&mut self, frame: RgbImage) -> FrameOutcome {
        match self.process(&frame) {
            Ok(output) => FrameOutcome::Enriched(output),
            Err(error) => {
                tracing::warn!(kind = error.kind(), "Passing frame through: {}", error);
                FrameOutcome::PassedThrough { frame, error }
            }
        }
    }

    /// Scale raw model output to [0, 255] after checking it has the declared shape
    fn checked_mask(&self, raw: Mask) -> Result<Mask> {
        let expected = self.predictor.output_size();
        let actual = mask_dimensions(&raw);

        if actual != expected {
            return Err(LaneError::PredictionFailed(anyhow!(
                "Predictor returned a {}x{} mask, expected {}x{}",
                actual.0,
                actual.1,
                expected.0,
                expected.1
            )));
        }

        Ok(Preprocessor::scale_prediction(raw))
    }

    /// Resolution frames are resampled to before prediction, (width, height)
    pub fn model_size(&self) -> (u32, u32) {
        self.preprocessor.target_size()
    }

    /// Current smoothed mask, `None` before the first successful frame
    pub fn averaged_mask(&self) -> Option<Mask> {
        self.averager.current()
    }

    pub fn history_len(&self) -> usize {
        self.averager.len()
    }

    /// Drop the temporal state (scene cut, stream restart)
    pub fn reset(&mut self) {
        tracing::info!("Resetting lane history");
        self.averager.reset();
        self.predictor.reset_state();
    }
}
