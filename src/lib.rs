//! # charpipe-rs
//!
//! A four-stage character pipeline in which each stage runs on its own
//! thread and hands bytes to the next through a bounded buffer.
//!
//! ## Overview
//!
//! - **Input**: reads lines until a standalone `STOP` line (or end-of-stream)
//! - **Line separator**: turns every `\n` into a space
//! - **Plus collapse**: turns every adjacent `++` into `^`
//! - **Output**: writes fixed 80-byte records, each followed by `\n`
//!
//! Shutdown flows downstream: each stage closes its output buffer once its
//! input is closed and drained. A short final record is never written.
//!
//! ## Example
//!
//! ```
//! use charpipe_rs::{PipelineConfig, execute_bytes};
//!
//! let mut input = "+".repeat(160).into_bytes();
//! input.extend_from_slice(b"\nSTOP\n");
//!
//! let (output, report) = execute_bytes(&input, &PipelineConfig::new(16)).unwrap();
//!
//! assert_eq!(output, format!("{}\n", "^".repeat(80)).into_bytes());
//! assert_eq!(report.records_written, 1);
//! assert!(report.sentinel_seen);
//! ```

pub mod buffer;
pub mod config;
pub mod error;
pub mod executor;
pub mod record;
pub mod report;
pub mod stage;
pub mod worker;

pub use buffer::BoundedBuffer;
pub use config::{DEFAULT_CAPACITY, PipelineConfig};
pub use error::{PipelineError, Result};
pub use executor::{execute_bytes, execute_sequential, execute_threaded};
pub use record::{RECORD_WIDTH, Record};
pub use report::{PipelineReport, StageReport};
pub use stage::{CharStage, LineAssembler, LineEvent, LineSeparator, PlusCollapse, SENTINEL};
