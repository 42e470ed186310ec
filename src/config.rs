//! Pipeline configuration.
//!
//! Only buffer capacities are tunable. The transformations themselves are fixed.

use crate::error::{PipelineError, Result};

/// Default capacity of each inter-stage buffer, in bytes.
pub const DEFAULT_CAPACITY: usize = 1000;

/// Capacities of the three inter-stage buffers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PipelineConfig {
    /// Input stage -> line separator.
    pub capacity_a: usize,
    /// Line separator -> plus collapse.
    pub capacity_b: usize,
    /// Plus collapse -> output stage.
    pub capacity_c: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

impl PipelineConfig {
    /// Use the same capacity for every buffer.
    pub fn new(capacity: usize) -> Self {
        Self::with_capacities(capacity, capacity, capacity)
    }

    pub fn with_capacities(capacity_a: usize, capacity_b: usize, capacity_c: usize) -> Self {
        Self {
            capacity_a,
            capacity_b,
            capacity_c,
        }
    }

    /// Reject any buffer configured with zero capacity.
    pub fn validate(&self) -> Result<()> {
        for (buffer, capacity) in [
            ("A", self.capacity_a),
            ("B", self.capacity_b),
            ("C", self.capacity_c),
        ] {
            if capacity == 0 {
                return Err(PipelineError::InvalidCapacity { buffer, capacity });
            }
        }
        Ok(())
    }
}
