//! Error kinds raised by the frame pipeline.
//!
//! Every kind is fatal for the frame that raised it and for nothing else:
//! the pipeline reports it, passes the original frame through and moves on.

/// Errors originating from one pipeline step.
#[derive(Debug, thiserror::Error)]
pub enum LaneError {
    #[error("invalid resize target {width}x{height}")]
    InvalidDimensions { width: u32, height: u32 },

    #[error("mask prediction failed: {0:#}")]
    PredictionFailed(#[source] anyhow::Error),

    #[error("no predictor for stream: {0:#}")]
    PredictorUnavailable(#[source] anyhow::Error),

    #[error("dimension mismatch: expected {expected:?}, got {actual:?}")]
    DimensionMismatch {
        expected: (u32, u32),
        actual: (u32, u32),
    },
}

impl LaneError {
    /// Short label used in logs and stream summaries.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::InvalidDimensions { .. } => "invalid_dimensions",
            Self::PredictionFailed(_) => "prediction_failed",
            Self::PredictorUnavailable(_) => "predictor_unavailable",
            Self::DimensionMismatch { .. } => "dimension_mismatch",
        }
    }
}

pub type Result<T, E = LaneError> = std::result::Result<T, E>;
