#[cfg(feature = "onnx")]
mod onnx;
mod preprocess;
pub mod types;

#[cfg(feature = "onnx")]
pub use onnx::OnnxLanePredictor;
pub use preprocess::Preprocessor;
pub use types::{FnPredictor, MaskPredictor, NormalizedImage, TensorLayout};

/// Model input resolution of the stock lane CNN (width, height)
pub const DEFAULT_MODEL_SIZE: (u32, u32) = (160, 80);
