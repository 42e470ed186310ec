//! Long-running worker bodies, one per pipeline stage.
//!
//! Each worker owns its stage-private state and talks to its neighbours only
//! through [`BoundedBuffer`]s. A worker always closes its output buffer when
//! it returns or unwinds, so shutdown propagates downstream from the input
//! stage. A worker that fails part way drains its input to end-of-stream so
//! that its producer never blocks on a full buffer.

use std::io::{BufReader, Read, Write};

use crate::buffer::{BoundedBuffer, CloseOnDrop};
use crate::error::{PipelineError, Result};
use crate::record::{RECORD_WIDTH, Record};
use crate::report::StageReport;
use crate::stage::{CharStage, LineAssembler, LineEvent};

pub const INPUT_STAGE: &str = "input";
pub const OUTPUT_STAGE: &str = "output";

/// Counters from the input stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InputReport {
    pub stage: StageReport,
    pub sentinel_seen: bool,
}

/// Counters from the output stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OutputReport {
    pub stage: StageReport,
    pub records_written: usize,
    pub residual_discarded: usize,
}

fn put_all(output: &BoundedBuffer, bytes: &[u8], report: &mut StageReport) -> Result<()> {
    for &byte in bytes {
        output.put(byte)?;
        report.produced += 1;
    }
    Ok(())
}

/// Read lines from `source` into `output` until the sentinel or end-of-stream.
///
/// A read error ends the input like end-of-stream does (the partial line is
/// still forwarded) and is then reported.
pub fn run_input<R: Read>(source: R, output: &BoundedBuffer) -> (InputReport, Result<()>) {
    let _close = CloseOnDrop(output);
    let mut report = InputReport {
        stage: StageReport::new(INPUT_STAGE),
        sentinel_seen: false,
    };
    log::debug!("{INPUT_STAGE} stage started");
    let result = feed_lines(source, output, &mut report);
    log::debug!(
        "{INPUT_STAGE} stage finished: {} read, {} forwarded",
        report.stage.consumed,
        report.stage.produced
    );
    (report, result)
}

fn feed_lines<R: Read>(source: R, output: &BoundedBuffer, report: &mut InputReport) -> Result<()> {
    let mut lines = LineAssembler::new();
    for byte in BufReader::new(source).bytes() {
        let byte = match byte {
            Ok(byte) => byte,
            Err(e) => {
                log::warn!("{INPUT_STAGE} stage: read failed, ending input: {e}");
                put_all(output, &lines.finish(), &mut report.stage)?;
                return Err(PipelineError::SourceRead(e));
            }
        };
        report.stage.consumed += 1;
        match lines.push(byte) {
            LineEvent::Pending => {}
            LineEvent::Line(line) => put_all(output, &line, &mut report.stage)?,
            LineEvent::Sentinel => {
                log::debug!("{INPUT_STAGE} stage: sentinel seen");
                report.sentinel_seen = true;
                return Ok(());
            }
        }
    }
    put_all(output, &lines.finish(), &mut report.stage)
}

/// Move bytes from `input` through `stage` into `output` until end-of-stream.
pub fn run_transform(
    stage: &mut dyn CharStage,
    input: &BoundedBuffer,
    output: &BoundedBuffer,
) -> (StageReport, Result<()>) {
    let _close = (CloseOnDrop(input), CloseOnDrop(output));
    let mut report = StageReport::new(stage.name());
    log::debug!("{} stage started", report.name);
    let result = transform(stage, input, output, &mut report);
    if let Err(e) = &result {
        let dropped = input.drain();
        log::warn!("{} stage failed: {e}; dropped {dropped} queued byte(s)", report.name);
    }
    log::debug!(
        "{} stage finished: {} in, {} out",
        report.name,
        report.consumed,
        report.produced
    );
    (report, result)
}

fn transform(
    stage: &mut dyn CharStage,
    input: &BoundedBuffer,
    output: &BoundedBuffer,
    report: &mut StageReport,
) -> Result<()> {
    while let Some(byte) = input.get() {
        report.consumed += 1;
        put_all(output, stage.process(byte).as_slice(), report)?;
    }
    put_all(output, stage.flush().as_slice(), report)
}

fn write_record<W: Write>(sink: &mut W, record: &Record) -> std::io::Result<()> {
    sink.write_all(record.as_bytes())?;
    sink.write_all(b"\n")?;
    sink.flush()
}

/// Group bytes from `input` into full records and write them to `sink`.
///
/// After a write failure the stage keeps consuming, discarding everything,
/// until `input` reaches end-of-stream.
pub fn run_output<W: Write>(input: &BoundedBuffer, mut sink: W) -> (OutputReport, Result<()>) {
    let _close = CloseOnDrop(input);
    let mut report = OutputReport {
        stage: StageReport::new(OUTPUT_STAGE),
        records_written: 0,
        residual_discarded: 0,
    };
    log::debug!("{OUTPUT_STAGE} stage started");

    let mut record = Record::new();
    let mut failure = None;
    while let Some(byte) = input.get() {
        report.stage.consumed += 1;
        if !record.push(byte) {
            continue;
        }
        if failure.is_none() {
            match write_record(&mut sink, &record) {
                Ok(()) => {
                    report.records_written += 1;
                    report.stage.produced += RECORD_WIDTH + 1;
                }
                Err(e) => {
                    log::warn!("{OUTPUT_STAGE} stage: write failed, discarding further output: {e}");
                    failure = Some(e);
                }
            }
        }
        record.clear();
    }
    report.residual_discarded = record.len();

    log::debug!(
        "{OUTPUT_STAGE} stage finished: {} record(s), {} byte(s) discarded",
        report.records_written,
        report.residual_discarded
    );
    let result = match failure {
        Some(e) => Err(PipelineError::SinkWrite(e)),
        None => Ok(()),
    };
    (report, result)
}
