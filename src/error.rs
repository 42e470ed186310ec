//! Error types for the character pipeline.

use std::io;

/// Errors raised while building or running the pipeline.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// The byte source failed before a clean end-of-stream.
    #[error("failed to read input: {0}")]
    SourceRead(#[source] io::Error),

    /// The byte sink rejected a write or flush.
    #[error("failed to write output: {0}")]
    SinkWrite(#[source] io::Error),

    /// A stage tried to put into a buffer that was already closed.
    #[error("put into closed buffer {buffer}")]
    ClosedSink { buffer: &'static str },

    /// A buffer was configured with zero capacity.
    #[error("buffer {buffer} capacity must be at least 1, got {capacity}")]
    InvalidCapacity {
        buffer: &'static str,
        capacity: usize,
    },

    /// The OS refused to start a worker thread.
    #[error("failed to spawn {stage} worker: {source}")]
    Spawn {
        stage: &'static str,
        #[source]
        source: io::Error,
    },

    /// A worker thread panicked before reporting.
    #[error("{stage} worker panicked")]
    WorkerPanicked { stage: &'static str },
}

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, PipelineError>;
