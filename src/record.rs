//! Fixed-width output records.
//!
//! The output stage groups bytes into records of exactly [`RECORD_WIDTH`]
//! bytes, the width of a punch card. A record is only ever emitted full;
//! a short tail at shutdown is dropped.

use std::fmt;

/// Width of every emitted record, in bytes.
pub const RECORD_WIDTH: usize = 80;

/// An 80-byte accumulator that fills up one byte at a time.
#[derive(Clone, PartialEq, Eq)]
pub struct Record {
    data: [u8; RECORD_WIDTH],
    len: usize,
}

impl Default for Record {
    fn default() -> Self {
        Self::new()
    }
}

impl Record {
    pub fn new() -> Self {
        Self {
            data: [0; RECORD_WIDTH],
            len: 0,
        }
    }

    /// Append one byte. Returns `true` when the record has just become full.
    ///
    /// A full record ignores further bytes until [`Record::clear`].
    pub fn push(&mut self, byte: u8) -> bool {
        if self.is_full() {
            return true;
        }
        self.data[self.len] = byte;
        self.len += 1;
        self.is_full()
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn is_full(&self) -> bool {
        self.len == RECORD_WIDTH
    }

    /// Filled portion of the record.
    pub fn as_bytes(&self) -> &[u8] {
        &self.data[..self.len]
    }

    pub fn clear(&mut self) {
        self.len = 0;
    }
}

impl fmt::Debug for Record {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Record")
            .field("len", &self.len)
            .field("data", &String::from_utf8_lossy(self.as_bytes()))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_record_is_empty() {
        let r = Record::new();
        assert!(r.is_empty());
        assert!(!r.is_full());
        assert_eq!(r.as_bytes(), b"");
    }

    #[test]
    fn test_fills_at_width() {
        let mut r = Record::new();
        for _ in 0..RECORD_WIDTH - 1 {
            assert!(!r.push(b'a'));
        }
        assert!(r.push(b'b'));
        assert_eq!(r.len(), RECORD_WIDTH);
        assert_eq!(r.as_bytes()[RECORD_WIDTH - 1], b'b');
    }

    #[test]
    fn test_clear_resets() {
        let mut r = Record::new();
        r.push(b'x');
        r.push(b'y');
        r.clear();
        assert!(r.is_empty());
        r.push(b'z');
        assert_eq!(r.as_bytes(), b"z");
    }

    #[test]
    fn test_debug_shows_content() {
        let mut r = Record::new();
        r.push(b'h');
        r.push(b'i');
        assert_eq!(format!("{r:?}"), r#"Record { len: 2, data: "hi" }"#);
    }
}
