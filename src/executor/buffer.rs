//! Per-task output buffer
//!
//! Collects everything a task produces (preloaded text from its source,
//! captured child output, handler notes) so it can be written out as one
//! contiguous block.

#![allow(dead_code)]

use std::fmt;

/// Append-only text accumulator owned by a single task
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct OutputBuffer {
    text: String,
}

impl OutputBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append text as-is
    pub fn push_str(&mut self, s: &str) {
        self.text.push_str(s);
    }

    /// Append text followed by a newline
    pub fn push_line(&mut self, line: impl AsRef<str>) {
        self.text.push_str(line.as_ref());
        self.text.push('\n');
    }

    /// Append raw child output, replacing invalid UTF-8
    pub fn push_bytes(&mut self, bytes: &[u8]) {
        self.text.push_str(&String::from_utf8_lossy(bytes));
    }

    pub fn as_str(&self) -> &str {
        &self.text
    }

    pub fn len(&self) -> usize {
        self.text.len()
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }

    pub(crate) fn into_bytes(self) -> Vec<u8> {
        self.text.into_bytes()
    }
}

impl fmt::Write for OutputBuffer {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        self.push_str(s);
        Ok(())
    }
}

impl fmt::Display for OutputBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fmt::Write;

    #[test]
    fn test_append_operations() {
        let mut buf = OutputBuffer::new();
        assert!(buf.is_empty());

        buf.push_str("Output of ");
        buf.push_line("'t0001-basic.sh':");
        buf.push_bytes(b"ok 1\n");
        write!(buf, "{}: '{}'", "SUCCESS", "t0001-basic.sh").unwrap();

        assert_eq!(
            buf.as_str(),
            "Output of 't0001-basic.sh':\nok 1\nSUCCESS: 't0001-basic.sh'"
        );
        assert_eq!(buf.len(), buf.as_str().len());
    }

    #[test]
    fn test_lossy_bytes() {
        let mut buf = OutputBuffer::new();
        buf.push_bytes(&[b'a', 0xff, b'b']);
        assert_eq!(buf.as_str(), "a\u{fffd}b");
    }
}
