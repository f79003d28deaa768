use anyhow::Result;
use ndarray::{Array2, Array3};

/// Memory layout the model expects for its image input
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum TensorLayout {
    /// [1, H, W, 3], as exported from Keras
    #[default]
    Nhwc,
    /// [1, 3, H, W]
    Nchw,
}

impl TensorLayout {
    /// Flatten `image` into a batch of one in this layout.
    ///
    /// Returns the tensor shape and its row-major data.
    pub fn pack(self, image: &NormalizedImage) -> ([usize; 4], Vec<f32>) {
        let (h, w, c) = image.view().dim();
        match self {
            Self::Nhwc => ([1, h, w, c], image.view().iter().copied().collect()),
            Self::Nchw => (
                [1, c, h, w],
                image.view().permuted_axes([2, 0, 1]).iter().copied().collect(),
            ),
        }
    }
}

/// Frame resampled to the model's input resolution.
///
/// Stored HWC with shape `(height, width, 3)` and values in [0, 1].
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedImage {
    data: Array3<f32>,
}

impl NormalizedImage {
    pub fn new(data: Array3<f32>) -> Self {
        Self { data }
    }

    pub fn width(&self) -> u32 {
        self.data.dim().1 as u32
    }

    pub fn height(&self) -> u32 {
        self.data.dim().0 as u32
    }

    pub fn channels(&self) -> usize {
        self.data.dim().2
    }

    pub fn view(&self) -> ndarray::ArrayView3<'_, f32> {
        self.data.view()
    }
}

/// Trait for lane-marking predictors
/// Allows swapping between backends (ONNX, remote service, test stubs)
pub trait MaskPredictor {
    /// Predict a lane mask for one normalized frame
    ///
    /// # Returns
    /// * Raw mask of shape `(height, width)` matching `output_size()`, values
    ///   usually in [0, 1]; the pipeline rescales it to [0, 255]
    fn predict(&mut self, image: &NormalizedImage) -> Result<Array2<f32>>;

    /// Reset internal state (for models with temporal/recurrent components)
    fn reset_state(&mut self) {}

    /// Get the model's input dimensions
    ///
    /// Returns (width, height)
    fn input_size(&self) -> (u32, u32);

    /// Get the output dimensions (usually matches input)
    ///
    /// Returns (width, height)
    fn output_size(&self) -> (u32, u32) {
        self.input_size()
    }
}

impl<P: MaskPredictor + ?Sized> MaskPredictor for Box<P> {
    fn predict(&mut self, image: &NormalizedImage) -> Result<Array2<f32>> {
        (**self).predict(image)
    }

    fn reset_state(&mut self) {
        (**self).reset_state()
    }

    fn input_size(&self) -> (u32, u32) {
        (**self).input_size()
    }

    fn output_size(&self) -> (u32, u32) {
        (**self).output_size()
    }
}

/// Predictor backed by a closure. Used for deterministic stubs.
pub struct FnPredictor<F> {
    predict_fn: F,
    width: u32,
    height: u32,
}

impl<F> FnPredictor<F>
where
    F: FnMut(&NormalizedImage) -> Result<Array2<f32>>,
{
    pub fn new(width: u32, height: u32, predict_fn: F) -> Self {
        Self {
            predict_fn,
            width,
            height,
        }
    }
}

impl<F> MaskPredictor for FnPredictor<F>
where
    F: FnMut(&NormalizedImage) -> Result<Array2<f32>>,
{
    fn predict(&mut self, image: &NormalizedImage) -> Result<Array2<f32>> {
        (self.predict_fn)(image)
    }

    fn input_size(&self) -> (u32, u32) {
        (self.width, self.height)
    }
}
