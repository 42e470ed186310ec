//! Per-stage counters collected during a pipeline run.

use std::fmt;

/// What one worker consumed and produced, in bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StageReport {
    pub name: &'static str,
    pub consumed: usize,
    pub produced: usize,
}

impl StageReport {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            ..Self::default()
        }
    }
}

/// Summary of a complete pipeline run.
///
/// `stages[0]` is the input stage, `stages[3]` the output stage. For the
/// output stage `produced` counts bytes written, terminators included.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PipelineReport {
    pub stages: Vec<StageReport>,
    /// Whether the input ended with the sentinel rather than end-of-stream.
    pub sentinel_seen: bool,
    pub pairs_collapsed: usize,
    pub records_written: usize,
    /// Bytes left in the output accumulator at shutdown, never written.
    pub residual_discarded: usize,
}

impl fmt::Display for PipelineReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for stage in &self.stages {
            writeln!(
                f,
                "{:<15} {} in -> {} out",
                stage.name, stage.consumed, stage.produced
            )?;
        }
        write!(
            f,
            "Records: {} written, {} byte(s) discarded, {} pair(s) collapsed, sentinel {}",
            self.records_written,
            self.residual_discarded,
            self.pairs_collapsed,
            if self.sentinel_seen { "seen" } else { "not seen" }
        )
    }
}
