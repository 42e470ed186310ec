//! Pipeline executors.
//!
//! [`execute_threaded`] runs the four stages as concurrent workers joined by
//! three bounded buffers. [`execute_sequential`] runs the same stage state
//! machines one stage after another over in-memory byte vectors; it exists
//! as a reference and always produces the same output.

use std::any::Any;
use std::io::{Read, Write};
use std::thread::{self, Scope, ScopedJoinHandle};

use crate::buffer::BoundedBuffer;
use crate::config::PipelineConfig;
use crate::error::{PipelineError, Result};
use crate::record::RECORD_WIDTH;
use crate::report::{PipelineReport, StageReport};
use crate::stage::{
    CharStage, LINE_SEPARATOR_STAGE, LineAssembler, LineEvent, LineSeparator, PLUS_COLLAPSE_STAGE,
    PlusCollapse, apply_stage,
};
use crate::worker::{INPUT_STAGE, OUTPUT_STAGE, run_input, run_output, run_transform};

fn spawn_worker<'scope, T, F>(
    scope: &'scope Scope<'scope, '_>,
    stage: &'static str,
    f: F,
) -> Result<ScopedJoinHandle<'scope, T>>
where
    F: FnOnce() -> T + Send + 'scope,
    T: Send + 'scope,
{
    thread::Builder::new()
        .name(stage.to_string())
        .spawn_scoped(scope, f)
        .map_err(|source| PipelineError::Spawn { stage, source })
}

fn join_worker<T>(handle: ScopedJoinHandle<'_, T>, stage: &'static str) -> Result<T> {
    handle.join().map_err(|payload: Box<dyn Any + Send>| {
        let message = payload
            .downcast_ref::<&str>()
            .copied()
            .or_else(|| payload.downcast_ref::<String>().map(String::as_str))
            .unwrap_or("unknown panic");
        log::error!("{stage} worker panicked: {message}");
        PipelineError::WorkerPanicked { stage }
    })
}

/// Run the pipeline with one thread per stage.
///
/// Reads from `source` until the sentinel line or end-of-stream and writes
/// full 80-byte records to `sink`. All four workers are always joined; the
/// first failure in pipeline order is returned, with a panic taking
/// precedence over ordinary errors.
pub fn execute_threaded<R, W>(source: R, sink: W, config: &PipelineConfig) -> Result<PipelineReport>
where
    R: Read + Send,
    W: Write + Send,
{
    config.validate()?;
    let a = BoundedBuffer::new("A", config.capacity_a)?;
    let b = BoundedBuffer::new("B", config.capacity_b)?;
    let c = BoundedBuffer::new("C", config.capacity_c)?;
    let (a, b, c) = (&a, &b, &c);

    let joined = thread::scope(|s| -> Result<_> {
        // Closing every buffer unwinds whichever workers already started.
        let abort = |err: PipelineError| {
            log::error!("aborting pipeline: {err}");
            for buffer in [a, b, c] {
                buffer.close();
            }
            err
        };

        let input = spawn_worker(s, INPUT_STAGE, move || run_input(source, a)).map_err(abort)?;
        let separator = spawn_worker(s, LINE_SEPARATOR_STAGE, move || {
            run_transform(&mut LineSeparator, a, b)
        })
        .map_err(abort)?;
        let collapse = spawn_worker(s, PLUS_COLLAPSE_STAGE, move || {
            let mut stage = PlusCollapse::new();
            let (report, result) = run_transform(&mut stage, b, c);
            (report, result, stage.collapsed())
        })
        .map_err(abort)?;
        let output = spawn_worker(s, OUTPUT_STAGE, move || run_output(c, sink)).map_err(abort)?;

        Ok((
            join_worker(input, INPUT_STAGE),
            join_worker(separator, LINE_SEPARATOR_STAGE),
            join_worker(collapse, PLUS_COLLAPSE_STAGE),
            join_worker(output, OUTPUT_STAGE),
        ))
    })?;

    let (input, separator, collapse, output) = match joined {
        (Ok(input), Ok(separator), Ok(collapse), Ok(output)) => (input, separator, collapse, output),
        (input, separator, collapse, output) => {
            let panicked = [input.err(), separator.err(), collapse.err(), output.err()];
            let first = panicked.into_iter().flatten().next();
            return Err(first.unwrap_or(PipelineError::WorkerPanicked { stage: "unknown" }));
        }
    };

    let (input_report, input_result) = input;
    let (separator_report, separator_result) = separator;
    let (collapse_report, collapse_result, pairs_collapsed) = collapse;
    let (output_report, output_result) = output;

    input_result?;
    separator_result?;
    collapse_result?;
    output_result?;

    let report = PipelineReport {
        stages: vec![
            input_report.stage,
            separator_report,
            collapse_report,
            output_report.stage,
        ],
        sentinel_seen: input_report.sentinel_seen,
        pairs_collapsed,
        records_written: output_report.records_written,
        residual_discarded: output_report.residual_discarded,
    };
    log::info!(
        "pipeline finished: {} record(s) written, {} byte(s) discarded",
        report.records_written,
        report.residual_discarded
    );
    Ok(report)
}

/// Run the threaded pipeline over an in-memory input, collecting the output.
pub fn execute_bytes(input: &[u8], config: &PipelineConfig) -> Result<(Vec<u8>, PipelineReport)> {
    let mut output = Vec::new();
    let report = execute_threaded(input, &mut output, config)?;
    Ok((output, report))
}

/// Run each stage to completion before the next, without threads.
pub fn execute_sequential(input: &[u8]) -> (Vec<u8>, PipelineReport) {
    let mut input_stage = StageReport::new(INPUT_STAGE);
    let mut sentinel_seen = false;
    let mut lines = LineAssembler::new();
    let mut buffer_a = Vec::new();
    for &byte in input {
        input_stage.consumed += 1;
        match lines.push(byte) {
            LineEvent::Pending => {}
            LineEvent::Line(line) => buffer_a.extend_from_slice(&line),
            LineEvent::Sentinel => {
                sentinel_seen = true;
                break;
            }
        }
    }
    if !sentinel_seen {
        buffer_a.extend_from_slice(&lines.finish());
    }
    input_stage.produced = buffer_a.len();

    let mut separator = LineSeparator;
    let buffer_b = apply_stage(&mut separator, &buffer_a);
    let mut collapse = PlusCollapse::new();
    let buffer_c = apply_stage(&mut collapse, &buffer_b);

    let records = buffer_c.chunks_exact(RECORD_WIDTH);
    let residual_discarded = records.remainder().len();
    let mut output = Vec::with_capacity(buffer_c.len() + buffer_c.len() / RECORD_WIDTH);
    let mut records_written = 0;
    for record in records {
        output.extend_from_slice(record);
        output.push(b'\n');
        records_written += 1;
    }

    let report = PipelineReport {
        stages: vec![
            input_stage,
            StageReport {
                name: separator.name(),
                consumed: buffer_a.len(),
                produced: buffer_b.len(),
            },
            StageReport {
                name: collapse.name(),
                consumed: buffer_b.len(),
                produced: buffer_c.len(),
            },
            StageReport {
                name: OUTPUT_STAGE,
                consumed: buffer_c.len(),
                produced: output.len(),
            },
        ],
        sentinel_seen,
        pairs_collapsed: collapse.collapsed(),
        records_written,
        residual_discarded,
    };
    (output, report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::io;
    use std::path::Path;

    /// Run both executors and check they agree, returning the output.
    fn run_both(input: &[u8], config: &PipelineConfig) -> Vec<u8> {
        let (threaded, threaded_report) = execute_bytes(input, config).unwrap();
        let (sequential, sequential_report) = execute_sequential(input);
        assert_eq!(threaded, sequential, "threaded output differs from sequential");
        assert_eq!(threaded_report, sequential_report);
        threaded
    }

    /// Assert a scenario from `specs/` at several buffer capacities.
    fn assert_scenario(name: &str) {
        let spec_dir = Path::new(env!("CARGO_MANIFEST_DIR")).join("specs");
        let input = fs::read(spec_dir.join(format!("{name}.in"))).unwrap();
        let expected = fs::read(spec_dir.join(format!("{name}.expected"))).unwrap();

        for capacity in [1, 3, crate::config::DEFAULT_CAPACITY] {
            let output = run_both(&input, &PipelineConfig::new(capacity));
            assert_eq!(
                String::from_utf8_lossy(&output),
                String::from_utf8_lossy(&expected),
                "scenario {name} at capacity {capacity}"
            );
        }
    }

    /// Deterministic input mixing letters, pluses and line breaks.
    fn mixed_input(len: usize) -> Vec<u8> {
        let alphabet = b"ab+c++d\n+e+++\nfg";
        let mut state: u32 = 0x2545_f491;
        let mut out = Vec::with_capacity(len + 5);
        for _ in 0..len {
            state ^= state << 13;
            state ^= state >> 17;
            state ^= state << 5;
            out.push(alphabet[state as usize % alphabet.len()]);
        }
        out.extend_from_slice(b"\nSTOP\n");
        out
    }

    #[test]
    fn test_empty_input() {
        let (output, report) = execute_bytes(b"", &PipelineConfig::default()).unwrap();
        assert!(output.is_empty());
        assert!(!report.sentinel_seen);
        assert_eq!(report.stages.len(), 4);
    }

    #[test]
    fn test_zero_capacity_rejected() {
        let err = execute_bytes(b"abc\n", &PipelineConfig::with_capacities(1, 1, 0)).unwrap_err();
        assert!(matches!(err, PipelineError::InvalidCapacity { buffer: "C", .. }));
    }

    #[test]
    fn test_report_counts() {
        let mut input = vec![b'+'; 160];
        input.extend_from_slice(b"\nSTOP\n");
        let (output, report) = execute_bytes(&input, &PipelineConfig::new(2)).unwrap();
        assert_eq!(output.len(), RECORD_WIDTH + 1);
        assert!(report.sentinel_seen);
        assert_eq!(report.pairs_collapsed, 80);
        assert_eq!(report.records_written, 1);
        assert_eq!(report.residual_discarded, 1);
        assert_eq!(report.stages[0].consumed, 166);
        assert_eq!(report.stages[0].produced, 161);
        assert_eq!(report.stages[2].produced, 81);
    }

    #[test]
    fn test_no_newline_survives_separator() {
        let input = mixed_input(4000);
        let output = run_both(&input, &PipelineConfig::new(5));
        for line in output.split(|&b| b == b'\n').filter(|l| !l.is_empty()) {
            assert_eq!(line.len(), RECORD_WIDTH);
        }
        assert_eq!(output.len() % (RECORD_WIDTH + 1), 0);
    }

    #[test]
    fn test_large_input_capacity_one() {
        let input = mixed_input(100_000);
        let output = run_both(&input, &PipelineConfig::new(1));
        assert!(!output.is_empty());
    }

    #[test]
    fn test_mixed_capacities_agree() {
        let input = mixed_input(20_000);
        let expected = execute_sequential(&input).0;
        for (ca, cb, cc) in [(1, 64, 1), (97, 1, 13), (4096, 4096, 1)] {
            let config = PipelineConfig::with_capacities(ca, cb, cc);
            let (output, _) = execute_bytes(&input, &config).unwrap();
            assert_eq!(output, expected, "capacities ({ca}, {cb}, {cc})");
        }
    }

    #[test]
    fn test_sink_failure_reports_error() {
        struct BrokenPipe;
        impl Write for BrokenPipe {
            fn write(&mut self, _buf: &[u8]) -> io::Result<usize> {
                Err(io::Error::new(io::ErrorKind::BrokenPipe, "reader went away"))
            }
            fn flush(&mut self) -> io::Result<()> {
                Ok(())
            }
        }

        let input = mixed_input(50_000);
        let err = execute_threaded(&input[..], BrokenPipe, &PipelineConfig::new(1)).unwrap_err();
        assert!(matches!(err, PipelineError::SinkWrite(_)));
    }

    #[test]
    fn test_source_failure_reports_error() {
        struct Truncated(io::Cursor<Vec<u8>>);
        impl Read for Truncated {
            fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
                match self.0.read(buf)? {
                    0 => Err(io::Error::new(io::ErrorKind::UnexpectedEof, "tty hung up")),
                    n => Ok(n),
                }
            }
        }

        let source = Truncated(io::Cursor::new(vec![b'q'; RECORD_WIDTH]));
        let mut sink = Vec::new();
        let err = execute_threaded(source, &mut sink, &PipelineConfig::new(4)).unwrap_err();
        assert!(matches!(err, PipelineError::SourceRead(_)));
        // The partial line was still forwarded and completed one record.
        assert_eq!(sink.len(), RECORD_WIDTH + 1);
    }

    #[test]
    fn test_file_sink() {
        let mut input = vec![b'k'; 79];
        input.extend_from_slice(b"\nSTOP\n");
        let file = tempfile::NamedTempFile::new().unwrap();
        let report =
            execute_threaded(&input[..], file.reopen().unwrap(), &PipelineConfig::default()).unwrap();
        assert_eq!(report.records_written, 1);

        let written = fs::read(file.path()).unwrap();
        let mut expected = vec![b'k'; 79];
        expected.extend_from_slice(b" \n");
        assert_eq!(written, expected);
    }

    #[test]
    fn test_sequential_ignores_after_sentinel() {
        let (output, report) = execute_sequential(b"STOP\nanything at all\n");
        assert!(output.is_empty());
        assert!(report.sentinel_seen);
        assert_eq!(report.stages[0].consumed, 5);
        assert_eq!(report.stages[0].produced, 0);
    }

    // --- Scenario files ---

    macro_rules! scenario_test {
        ($name:ident, $file:expr) => {
            #[test]
            fn $name() {
                assert_scenario($file);
            }
        };
    }

    scenario_test!(scenario_single_exact_block, "single-exact-block");
    scenario_test!(scenario_plus_pair, "plus-pair");
    scenario_test!(scenario_triple_plus, "triple-plus");
    scenario_test!(scenario_sentinel_only, "sentinel-only");
    scenario_test!(scenario_multi_line_block, "multi-line-block");
    scenario_test!(scenario_plus_across_lines, "plus-across-lines");
    scenario_test!(scenario_input_after_sentinel, "input-after-sentinel");
    scenario_test!(scenario_eof_without_sentinel, "eof-without-sentinel");
    scenario_test!(scenario_collapsed_block, "collapsed-block");
    scenario_test!(scenario_several_records, "several-records");
    scenario_test!(scenario_sentinel_lookalikes, "sentinel-lookalikes");
}
