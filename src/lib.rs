//! Temporally smoothed lane-marking overlays for dashcam video.
//!
//! Each frame is shrunk to the lane model's input size, the predicted mask is
//! averaged over the last few frames of its stream, and the average is added
//! back onto the full-size frame as a green overlay.

pub mod capture;
pub mod error;
pub mod output;
pub mod overlay;
pub mod pipeline;
pub mod prediction;
pub mod resample;
pub mod runner;
pub mod streams;
pub mod temporal;

pub use error::LaneError;
pub use pipeline::{FrameOutcome, LaneOverlayPipeline, PipelineConfig, RenderMode};
pub use prediction::{MaskPredictor, NormalizedImage};
pub use runner::{run_stream, CancellationToken, RunOptions, StreamSummary};
pub use streams::{run_streams, StreamId, StreamJob, StreamRegistry};
pub use temporal::{Mask, TemporalAverager, HISTORY_CAPACITY};
