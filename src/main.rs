use anyhow::{bail, Context, Result};
use clap::Parser;
use lanify::capture::{FrameSource, ImageSequenceSource};
use lanify::output::{FrameSink, ImageSequenceSink, LoopbackSink};
use lanify::prediction::{FnPredictor, MaskPredictor, TensorLayout, DEFAULT_MODEL_SIZE};
use lanify::{
    run_streams, CancellationToken, LaneOverlayPipeline, PipelineConfig, RenderMode, RunOptions,
    StreamId, StreamJob,
};
use ndarray::Array2;
use std::path::{Path, PathBuf};

type BoxedPredictor = Box<dyn MaskPredictor + Send>;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Directory of frames to process; repeat for several independent streams
    #[arg(short, long)]
    input: Vec<PathBuf>,

    /// Live dashcam device index (instead of --input)
    #[cfg(feature = "webcam")]
    #[arg(long)]
    webcam: Option<u32>,

    /// Output directory; each stream writes to its own subdirectory
    #[arg(short, long, default_value = "lanify-out")]
    output: PathBuf,

    /// Also preview through this v4l2loopback device (single stream only)
    #[arg(long)]
    loopback: Option<PathBuf>,

    /// Loopback resolution width
    #[arg(long, default_value_t = 1280)]
    loopback_width: u32,

    /// Loopback resolution height
    #[arg(long, default_value_t = 720)]
    loopback_height: u32,

    /// Path to lane model (ONNX file)
    /// If not provided, runs in passthrough mode and frames are copied unchanged
    #[arg(long)]
    model: Option<PathBuf>,

    /// Model input width
    #[arg(long, default_value_t = DEFAULT_MODEL_SIZE.0)]
    model_width: u32,

    /// Model input height
    #[arg(long, default_value_t = DEFAULT_MODEL_SIZE.1)]
    model_height: u32,

    /// Model input tensor layout
    #[arg(long, value_enum, default_value_t = TensorLayout::Nhwc)]
    layout: TensorLayout,

    /// Number of recent masks averaged per stream
    #[arg(long, default_value_t = lanify::HISTORY_CAPACITY)]
    history: usize,

    /// Emit the smoothed lane mask instead of the composited frame
    #[arg(long)]
    show_mask: bool,

    /// Stop each stream after this many frames
    #[arg(long)]
    max_frames: Option<u64>,

    /// Pace each stream to this many frames per second
    #[arg(long)]
    fps: Option<u32>,

    /// Enable debug logging
    #[arg(long)]
    debug: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging
    let log_level = if args.debug {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };

    tracing_subscriber::fmt()
        .with_max_level(log_level)
        .with_target(false)
        .init();

    tracing::info!("Lanify starting");
    tracing::info!("Model input: {}x{}", args.model_width, args.model_height);
    tracing::info!("History: {} frames", args.history);

    let config = PipelineConfig {
        history_capacity: args.history,
        render: if args.show_mask {
            RenderMode::Mask
        } else {
            RenderMode::Composite
        },
    };

    let sources = open_sources(&args)?;
    if args.loopback.is_some() && sources.len() > 1 {
        bail!("--loopback supports a single stream");
    }

    if args.model.is_none() {
        tracing::info!("Running in passthrough mode (no lane model)");
    }

    let mut jobs = Vec::with_capacity(sources.len());
    for (id, source) in sources {
        let predictor = create_predictor(&args)
            .with_context(|| format!("Failed to load lane model for stream {}", id))?;
        let sink = open_sink(&args, &id)?;

        jobs.push(StreamJob {
            id,
            pipeline: LaneOverlayPipeline::new(predictor, config.clone()),
            source,
            sink,
        });
    }

    let options = RunOptions {
        max_frames: args.max_frames,
        target_fps: args.fps,
    };

    let token = CancellationToken::new();
    let handler_token = token.clone();
    ctrlc::set_handler(move || {
        tracing::info!("Interrupt received, finishing current frames");
        handler_token.cancel();
    })
    .context("Failed to install Ctrl-C handler")?;

    let results = run_streams(jobs, &token, options)?;

    let mut failed = 0;
    for (id, result) in &results {
        match result {
            Ok(summary) => tracing::info!(
                "{}: {} frames ({} enriched, {} passed through)",
                id,
                summary.frames,
                summary.enriched,
                summary.passed_through
            ),
            Err(e) => {
                failed += 1;
                tracing::error!("{}: {:#}", id, e);
            }
        }
    }

    if failed > 0 {
        bail!("{} of {} streams failed", failed, results.len());
    }

    Ok(())
}

type Source = Box<dyn FrameSource + Send>;

fn open_sources(args: &Args) -> Result<Vec<(StreamId, Source)>> {
    #[cfg(feature = "webcam")]
    {
        if let Some(index) = args.webcam {
            let capture = lanify::capture::WebcamCapture::new(index)
                .context("Failed to initialize dashcam capture")?;
            let id = StreamId::new(format!("webcam{}", index));
            return Ok(vec![(id, Box::new(capture) as Source)]);
        }
    }

    if args.input.is_empty() {
        bail!("No input given; pass --input <DIR> at least once");
    }

    args.input
        .iter()
        .map(|dir| {
            let source = ImageSequenceSource::new(dir)
                .with_context(|| format!("Failed to open frames in {}", dir.display()))?;
            Ok((stream_id_for(dir), Box::new(source) as Source))
        })
        .collect()
}

/// Stream name from the last component of its input directory
fn stream_id_for(dir: &Path) -> StreamId {
    let name = dir
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "stream".to_string());
    StreamId::new(name)
}

fn open_sink(args: &Args, id: &StreamId) -> Result<Box<dyn FrameSink + Send>> {
    if let Some(device) = &args.loopback {
        let sink = LoopbackSink::new(device, args.loopback_width, args.loopback_height)
            .context("Failed to initialize v4l2loopback output")?;
        return Ok(Box::new(sink));
    }

    let sink = ImageSequenceSink::new(args.output.join(id.as_str()))?;
    Ok(Box::new(sink))
}

fn create_predictor(args: &Args) -> Result<BoxedPredictor> {
    let (width, height) = (args.model_width, args.model_height);

    let Some(model_path) = &args.model else {
        // Empty mask everywhere: the overlay adds nothing
        let blank = FnPredictor::new(width, height, move |_| {
            Ok(Array2::zeros((height as usize, width as usize)))
        });
        return Ok(Box::new(blank));
    };

    #[cfg(feature = "onnx")]
    return Ok(Box::new(lanify::prediction::OnnxLanePredictor::new(
        model_path,
        width,
        height,
        args.layout,
    )?));

    #[cfg(not(feature = "onnx"))]
    bail!(
        "{} given but lanify was built without the `onnx` feature",
        model_path.display()
    );
}
