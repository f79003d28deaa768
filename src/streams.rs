//! Independent streams: per-stream pipelines keyed by stream identity, and
//! concurrent draining of several sources on a rayon pool.

use crate::capture::FrameSource;
use crate::output::FrameSink;
use crate::pipeline::{FrameOutcome, LaneOverlayPipeline, PipelineConfig};
use crate::prediction::MaskPredictor;
use crate::error::LaneError;
use crate::runner::{run_stream, CancellationToken, RunOptions, StreamSummary};
use anyhow::{Context, Result};
use image::RgbImage;
use rayon::prelude::*;
use std::collections::hash_map::{Entry, HashMap};
use std::fmt;

/// Identity of one video stream (a dashcam, a file, a session)
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StreamId(String);

impl StreamId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for StreamId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Pipelines for interleaved frames from many streams.
///
/// Each stream gets its own pipeline (and predictor, built by `factory`) on
/// its first frame; nothing is shared between streams.
pub struct StreamRegistry<P, F> {
    pipelines: HashMap<StreamId, LaneOverlayPipeline<P>>,
    factory: F,
    config: PipelineConfig,
}

impl<P, F> StreamRegistry<P, F>
where
    P: MaskPredictor,
    F: FnMut(&StreamId) -> Result<P>,
{
    pub fn new(config: PipelineConfig, factory: F) -> Self {
        Self {
            pipelines: HashMap::new(),
            factory,
            config,
        }
    }

    /// Process the next frame of stream `id`.
    ///
    /// If no predictor can be built for a new stream the frame is passed
    /// through with `LaneError::PredictorUnavailable`; the next frame of that
    /// stream tries again.
    pub fn process(&mut self, id: &StreamId, frame: RgbImage) -> FrameOutcome {
        let pipeline = match self.pipelines.entry(id.clone()) {
            Entry::Occupied(entry) => entry.into_mut(),
            Entry::Vacant(entry) => {
                tracing::info!("Opening stream {}", id);
                match (self.factory)(id) {
                    Ok(predictor) => {
                        entry.insert(LaneOverlayPipeline::new(predictor, self.config.clone()))
                    }
                    Err(e) => {
                        let error = LaneError::PredictorUnavailable(
                            e.context(format!("stream {}", id)),
                        );
                        tracing::warn!(kind = error.kind(), "Passing frame through: {}", error);
                        return FrameOutcome::PassedThrough { frame, error };
                    }
                }
            }
        };

        pipeline.process_frame(frame)
    }

    pub fn get(&self, id: &StreamId) -> Option<&LaneOverlayPipeline<P>> {
        self.pipelines.get(id)
    }

    /// Drop a stream and its history. Returns false if it was unknown.
    pub fn stop(&mut self, id: &StreamId) -> bool {
        let removed = self.pipelines.remove(id).is_some();
        if removed {
            tracing::info!("Closed stream {}", id);
        }
        removed
    }

    pub fn len(&self) -> usize {
        self.pipelines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pipelines.is_empty()
    }
}

/// One stream ready to be drained: its own pipeline, source and sink
pub struct StreamJob<P> {
    pub id: StreamId,
    pub pipeline: LaneOverlayPipeline<P>,
    pub source: Box<dyn FrameSource + Send>,
    pub sink: Box<dyn FrameSink + Send>,
}

/// Drain every job concurrently; frames within a stream stay sequential.
///
/// Streams run on a dedicated pool with one thread per job, so live sources
/// that never end cannot keep other streams from starting. Results come back
/// in job order. One stream failing does not stop the others.
pub fn run_streams<P>(
    jobs: Vec<StreamJob<P>>,
    token: &CancellationToken,
    options: RunOptions,
) -> Result<Vec<(StreamId, Result<StreamSummary>)>>
where
    P: MaskPredictor + Send,
{
    tracing::info!("Running {} streams", jobs.len());

    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(jobs.len().max(1))
        .thread_name(|i| format!("lanify-stream-{}", i))
        .build()
        .context("Failed to start stream workers")?;

    let results: Vec<_> = pool.install(|| {
        jobs.into_par_iter()
            .map(|mut job| {
                let _span = tracing::info_span!("stream", id = %job.id).entered();
                let result = run_stream(
                    &mut job.pipeline,
                    job.source.as_mut(),
                    job.sink.as_mut(),
                    token,
                    options,
                );
                if let Err(e) = &result {
                    tracing::error!("Stream {} failed: {:#}", job.id, e);
                }
                (job.id, result)
            })
            .collect()
    });

    Ok(results)
}
