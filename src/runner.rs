use crate::capture::FrameSource;
use crate::output::FrameSink;
use crate::pipeline::{FrameOutcome, LaneOverlayPipeline};
use crate::prediction::MaskPredictor;
use anyhow::{Context, Result};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Log averaged timings every this many frames
const STATS_INTERVAL: u64 = 30;

/// Shared stop signal for one or more streams.
///
/// Observed between frames: a frame that was already pulled from its source is
/// finished and written, nothing further is read or predicted.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

/// Limits applied while draining a source
#[derive(Debug, Clone, Copy, Default)]
pub struct RunOptions {
    /// Stop after this many frames
    pub max_frames: Option<u64>,
    /// Pace the loop for live sources
    pub target_fps: Option<u32>,
}

/// Per-stream counters returned once the stream ends
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StreamSummary {
    pub frames: u64,
    pub enriched: u64,
    pub passed_through: u64,
    pub cancelled: bool,
}

#[derive(Default)]
struct StageTimes {
    capture: Duration,
    process: Duration,
    output: Duration,
}

impl StageTimes {
    fn log(&self, frames: u64) {
        let per_frame = |total: Duration| total.as_secs_f64() * 1000.0 / frames as f64;
        let capture_ms = per_frame(self.capture);
        let process_ms = per_frame(self.process);
        let output_ms = per_frame(self.output);
        let total_ms = capture_ms + process_ms + output_ms;

        tracing::info!(
            "Frame {}: capture={:.1}ms, lanes={:.1}ms, output={:.1}ms, total={:.1}ms, fps={:.1}",
            frames,
            capture_ms,
            process_ms,
            output_ms,
            total_ms,
            1000.0 / total_ms
        );
    }
}

/// Drain `source` through `pipeline` into `sink`, one frame at a time in arrival order.
///
/// Frames whose enrichment fails are written unmodified. Source and sink
/// failures end the stream.
pub fn run_stream<P, S, K>(
    pipeline: &mut LaneOverlayPipeline<P>,
    source: &mut S,
    sink: &mut K,
    token: &CancellationToken,
    options: RunOptions,
) -> Result<StreamSummary>
where
    P: MaskPredictor,
    S: FrameSource + ?Sized,
    K: FrameSink + ?Sized,
{
    let frame_duration = options
        .target_fps
        .filter(|&fps| fps > 0)
        .map(|fps| Duration::from_secs_f32(1.0 / fps as f32));
    let mut summary = StreamSummary::default();
    let mut times = StageTimes::default();

    let (width, height) = source.resolution();
    tracing::info!("Starting lane overlay stream at {}x{}", width, height);
    if let Some((sink_width, sink_height)) = sink.resolution() {
        if (sink_width, sink_height) != (width, height) {
            tracing::info!("Sink rescales frames to {}x{}", sink_width, sink_height);
        }
    }

    loop {
        if token.is_cancelled() {
            tracing::info!("Stream cancelled after {} frames", summary.frames);
            summary.cancelled = true;
            break;
        }
        if options.max_frames.is_some_and(|max| summary.frames >= max) {
            break;
        }

        let loop_start = Instant::now();

        let frame = source.next_frame().context("Failed to capture frame")?;
        let Some(frame) = frame else {
            break;
        };
        times.capture += loop_start.elapsed();

        let process_start = Instant::now();
        let outcome = pipeline.process_frame(frame);
        times.process += process_start.elapsed();

        match &outcome {
            FrameOutcome::Enriched(_) => summary.enriched += 1,
            FrameOutcome::PassedThrough { .. } => summary.passed_through += 1,
        }

        let frame = outcome.into_frame();
        let output_start = Instant::now();
        sink.write_frame(&frame).context("Failed to write frame")?;
        times.output += output_start.elapsed();

        summary.frames += 1;

        if summary.frames % STATS_INTERVAL == 0 {
            times.log(summary.frames);
        }

        if let Some(frame_duration) = frame_duration {
            let elapsed = loop_start.elapsed();
            if elapsed < frame_duration {
                std::thread::sleep(frame_duration - elapsed);
            }
        }
    }

    tracing::info!(
        "Stream finished: {} frames, {} enriched, {} passed through",
        summary.frames,
        summary.enriched,
        summary.passed_through
    );

    Ok(summary)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::pipeline::PipelineConfig;
    use crate::prediction::{FnPredictor, NormalizedImage};
    use anyhow::bail;
    use image::{Rgb, RgbImage};
    use ndarray::Array2;

    /// In-memory source over a fixed list of frames
    pub(crate) struct VecSource {
        pub frames: std::vec::IntoIter<RgbImage>,
        pub size: (u32, u32),
    }

    impl VecSource {
        pub fn uniform(count: usize, width: u32, height: u32, color: [u8; 3]) -> Self {
            Self {
                frames: vec![RgbImage::from_pixel(width, height, Rgb(color)); count].into_iter(),
                size: (width, height),
            }
        }
    }

    impl FrameSource for VecSource {
        fn next_frame(&mut self) -> Result<Option<RgbImage>> {
            Ok(self.frames.next())
        }

        fn resolution(&self) -> (u32, u32) {
            self.size
        }
    }

    /// Sink that keeps every frame
    #[derive(Default)]
    pub(crate) struct VecSink {
        pub frames: Vec<RgbImage>,
    }

    impl FrameSink for VecSink {
        fn write_frame(&mut self, frame: &RgbImage) -> Result<()> {
            self.frames.push(frame.clone());
            Ok(())
        }

        fn resolution(&self) -> Option<(u32, u32)> {
            None
        }
    }

    #[test]
    fn test_every_frame_is_emitted_in_order() {
        let mut frames = Vec::new();
        for i in 0..4u8 {
            frames.push(RgbImage::from_pixel(32, 16, Rgb([i * 10, 0, 0])));
        }
        let mut source = VecSource {
            frames: frames.into_iter(),
            size: (32, 16),
        };

        // Fails on the second frame only
        let mut call = 0;
        let predictor = FnPredictor::new(160, 80, move |_: &NormalizedImage| {
            call += 1;
            if call == 2 {
                bail!("model timed out");
            }
            Ok(Array2::zeros((80, 160)))
        });
        let mut pipeline = LaneOverlayPipeline::new(predictor, PipelineConfig::default());
        let mut sink = VecSink::default();

        let summary = run_stream(
            &mut pipeline,
            &mut source,
            &mut sink,
            &CancellationToken::new(),
            RunOptions::default(),
        )
        .unwrap();

        assert_eq!(summary.frames, 4);
        assert_eq!(summary.enriched, 3);
        assert_eq!(summary.passed_through, 1);
        assert!(!summary.cancelled);

        let reds: Vec<u8> = sink.frames.iter().map(|f| f.get_pixel(0, 0)[0]).collect();
        assert_eq!(reds, vec![0, 10, 20, 30]);
        assert_eq!(pipeline.history_len(), 3);
    }

    #[test]
    fn test_cancelled_stream_stops_before_next_frame() {
        let token = CancellationToken::new();
        let observer = token.clone();

        let mut calls = 0;
        let predictor = FnPredictor::new(160, 80, |_: &NormalizedImage| {
            calls += 1;
            if calls == 2 {
                observer.cancel();
            }
            Ok(Array2::from_elem((80, 160), 1.0))
        });
        let mut pipeline = LaneOverlayPipeline::new(predictor, PipelineConfig::default());
        let mut source = VecSource::uniform(10, 16, 8, [0, 0, 0]);
        let mut sink = VecSink::default();

        let summary =
            run_stream(&mut pipeline, &mut source, &mut sink, &token, RunOptions::default())
                .unwrap();

        // The in-flight frame completes and is written, nothing after it
        assert!(summary.cancelled);
        assert_eq!(summary.frames, 2);
        assert_eq!(sink.frames.len(), 2);
        assert_eq!(pipeline.history_len(), 2);
        drop(pipeline);
        assert_eq!(calls, 2);
    }

    #[test]
    fn test_max_frames_limit() {
        let predictor = FnPredictor::new(160, 80, |_: &NormalizedImage| Ok(Array2::zeros((80, 160))));
        let mut pipeline = LaneOverlayPipeline::new(predictor, PipelineConfig::default());
        let mut source = VecSource::uniform(10, 16, 8, [1, 2, 3]);
        let mut sink = VecSink::default();

        let options = RunOptions {
            max_frames: Some(3),
            ..RunOptions::default()
        };
        let summary = run_stream(
            &mut pipeline,
            &mut source,
            &mut sink,
            &CancellationToken::new(),
            options,
        )
        .unwrap();

        assert_eq!(summary.frames, 3);
        assert_eq!(sink.frames.len(), 3);
    }
}
