use super::types::{MaskPredictor, NormalizedImage, TensorLayout};
use anyhow::{bail, Context, Result};
use ndarray::Array2;
use ort::session::{builder::GraphOptimizationLevel, Session};
use ort::value::Tensor;
use std::path::Path;

/// Fully convolutional lane-marking model loaded from an ONNX file
///
/// Stateless: every frame is predicted independently, smoothing happens
/// downstream in the pipeline.
pub struct OnnxLanePredictor {
    session: Session,
    layout: TensorLayout,
    width: u32,
    height: u32,
}

impl OnnxLanePredictor {
    /// Create a new predictor from an ONNX file
    ///
    /// # Arguments
    /// * `model_path` - Path to the ONNX model file
    /// * `width`, `height` - Model input (and output) resolution, 160x80 for the stock model
    /// * `layout` - Input tensor layout
    pub fn new<P: AsRef<Path>>(
        model_path: P,
        width: u32,
        height: u32,
        layout: TensorLayout,
    ) -> Result<Self> {
        let path = model_path.as_ref();

        tracing::info!("Loading lane model from {}", path.display());

        let session = Session::builder()?
            .with_optimization_level(GraphOptimizationLevel::Level3)?
            .with_intra_threads(4)?
            .commit_from_file(path)
            .with_context(|| format!("Failed to load model from {}", path.display()))?;

        tracing::info!(
            "Lane model loaded: {}x{} input, {:?} layout",
            width,
            height,
            layout
        );

        Ok(Self {
            session,
            layout,
            width,
            height,
        })
    }

    fn input_tensor(&self, image: &NormalizedImage) -> Result<Tensor<f32>> {
        let (shape, data) = self.layout.pack(image);
        Ok(Tensor::from_array((shape, data))?)
    }
}

/// Reject inputs that were not resampled to the model's resolution
fn check_input_size(image: &NormalizedImage, expected: (u32, u32)) -> Result<()> {
    let actual = (image.width(), image.height());
    if actual != expected {
        bail!(
            "Input is {}x{}, model expects {}x{}",
            actual.0,
            actual.1,
            expected.0,
            expected.1
        );
    }
    Ok(())
}

/// Collapse the singleton axes of a model output into (height, width)
fn mask_shape(shape: &[i64]) -> Result<(usize, usize)> {
    let dims: Vec<usize> = shape
        .iter()
        .filter(|&&d| d != 1)
        .map(|&d| d as usize)
        .collect();

    match dims.as_slice() {
        [h, w] => Ok((*h, *w)),
        _ => bail!("Unexpected mask output shape {:?}", shape),
    }
}

impl MaskPredictor for OnnxLanePredictor {
    fn predict(&mut self, image: &NormalizedImage) -> Result<Array2<f32>> {
        let _span = tracing::debug_span!("onnx_predict").entered();

        check_input_size(image, (self.width, self.height))?;

        let input = self.input_tensor(image)?;

        let _infer_span = tracing::debug_span!("inference").entered();
        let outputs = self
            .session
            .run(ort::inputs![input])
            .context("Failed to run inference")?;
        drop(_infer_span);

        let (shape, values) = outputs[0].try_extract_tensor::<f32>()?;
        let (height, width) = mask_shape(shape)?;

        Array2::from_shape_vec((height, width), values.to_vec())
            .context("Mask output does not match its declared shape")
    }

    fn input_size(&self) -> (u32, u32) {
        (self.width, self.height)
    }
}
