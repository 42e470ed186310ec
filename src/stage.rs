//! Stage-private transformation state.
//!
//! These types hold the per-stage scratch state and know nothing about
//! buffers or threads. The workers in [`crate::worker`] feed them bytes and
//! forward what they emit; the sequential executor drives the very same
//! types directly.

/// Line terminator on input. Only `\n` counts; `\r` is an ordinary byte.
pub const LINE_TERMINATOR: u8 = b'\n';

/// A standalone input line with exactly this content ends the input.
pub const SENTINEL: &[u8] = b"STOP";

pub const LINE_SEPARATOR_STAGE: &str = "line-separator";
pub const PLUS_COLLAPSE_STAGE: &str = "plus-collapse";

// ---------------------------------------------------------------------------
// Input stage: line assembly
// ---------------------------------------------------------------------------

/// Outcome of feeding one byte to a [`LineAssembler`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LineEvent {
    /// The byte was buffered; no complete line yet.
    Pending,
    /// A complete non-sentinel line, terminator included, ready to forward.
    Line(Vec<u8>),
    /// The sentinel line was seen and discarded.
    Sentinel,
}

/// Accumulates input bytes into lines and recognizes the sentinel.
#[derive(Debug, Default)]
pub struct LineAssembler {
    line: Vec<u8>,
}

impl LineAssembler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, byte: u8) -> LineEvent {
        self.line.push(byte);
        if byte != LINE_TERMINATOR {
            return LineEvent::Pending;
        }
        let line = std::mem::take(&mut self.line);
        if &line[..line.len() - 1] == SENTINEL {
            LineEvent::Sentinel
        } else {
            LineEvent::Line(line)
        }
    }

    /// Take whatever partial line is buffered at end-of-stream.
    pub fn finish(&mut self) -> Vec<u8> {
        std::mem::take(&mut self.line)
    }
}

// ---------------------------------------------------------------------------
// Byte-to-byte stages
// ---------------------------------------------------------------------------

/// Up to two bytes emitted for one input byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Emitted {
    bytes: [u8; 2],
    len: usize,
}

impl Emitted {
    pub const NONE: Emitted = Emitted {
        bytes: [0; 2],
        len: 0,
    };

    pub fn one(byte: u8) -> Self {
        Self {
            bytes: [byte, 0],
            len: 1,
        }
    }

    pub fn two(first: u8, second: u8) -> Self {
        Self {
            bytes: [first, second],
            len: 2,
        }
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.bytes[..self.len]
    }
}

/// A middle stage that maps a byte stream to a byte stream.
///
/// `process` is called once per input byte; `flush` once at end-of-stream,
/// before the stage's output buffer is closed.
pub trait CharStage {
    fn process(&mut self, byte: u8) -> Emitted;

    /// Emit anything held back for lookahead.
    fn flush(&mut self) -> Emitted {
        Emitted::NONE
    }

    /// The display name of this stage.
    fn name(&self) -> &'static str;
}

/// Rewrites each line terminator as a single space.
#[derive(Debug, Default)]
pub struct LineSeparator;

impl CharStage for LineSeparator {
    fn process(&mut self, byte: u8) -> Emitted {
        if byte == LINE_TERMINATOR {
            Emitted::one(b' ')
        } else {
            Emitted::one(byte)
        }
    }

    fn name(&self) -> &'static str {
        LINE_SEPARATOR_STAGE
    }
}

/// Collapses each adjacent `++` pair into `^`.
///
/// Holds at most one `+` back while waiting to see the next byte.
#[derive(Debug, Default)]
pub struct PlusCollapse {
    seen_plus: bool,
    collapsed: usize,
}

impl PlusCollapse {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of `++` pairs replaced so far.
    pub fn collapsed(&self) -> usize {
        self.collapsed
    }
}

impl CharStage for PlusCollapse {
    fn process(&mut self, byte: u8) -> Emitted {
        match (self.seen_plus, byte) {
            (false, b'+') => {
                self.seen_plus = true;
                Emitted::NONE
            }
            (false, other) => Emitted::one(other),
            (true, b'+') => {
                self.seen_plus = false;
                self.collapsed += 1;
                Emitted::one(b'^')
            }
            (true, other) => {
                self.seen_plus = false;
                Emitted::two(b'+', other)
            }
        }
    }

    fn flush(&mut self) -> Emitted {
        if std::mem::take(&mut self.seen_plus) {
            Emitted::one(b'+')
        } else {
            Emitted::NONE
        }
    }

    fn name(&self) -> &'static str {
        PLUS_COLLAPSE_STAGE
    }
}

/// Run a stage over a whole slice, flush included.
pub fn apply_stage(stage: &mut dyn CharStage, input: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(input.len());
    for &byte in input {
        out.extend_from_slice(stage.process(byte).as_slice());
    }
    out.extend_from_slice(stage.flush().as_slice());
    out
}
