//! Bounded line buffer for storing process output

use regex::Regex;
use std::collections::VecDeque;

/// Prefix applied to stderr lines in the combined output view
pub const STDERR_TAG: &str = "[ERROR] ";

/// A single captured line
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogLine {
    /// The content of the line, without its trailing newline
    pub content: String,
    /// Whether this line came from stderr
    pub is_stderr: bool,
}

/// Ring buffer of lines; the oldest line is evicted once `max_lines` is reached
#[derive(Debug)]
pub struct LogBuffer {
    lines: VecDeque<LogLine>,
    max_lines: usize,
    /// Lines evicted because the buffer was full
    dropped: u64,
}

impl LogBuffer {
    /// Create a new log buffer with the given capacity (at least one line)
    pub fn new(max_lines: usize) -> Self {
        let max_lines = max_lines.max(1);
        Self {
            lines: VecDeque::with_capacity(max_lines.min(1024)),
            max_lines,
            dropped: 0,
        }
    }

    /// Push a new line to the buffer
    pub fn push_line(&mut self, content: &str, is_stderr: bool) {
        if self.lines.len() >= self.max_lines {
            self.lines.pop_front();
            self.dropped += 1;
        }

        self.lines.push_back(LogLine {
            content: content.to_string(),
            is_stderr,
        });
    }

    /// Get all lines
    pub fn lines(&self) -> impl Iterator<Item = &LogLine> {
        self.lines.iter()
    }

    /// Get the number of lines
    pub fn len(&self) -> usize {
        self.lines.len()
    }

    /// Check if the buffer is empty
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Number of lines evicted over the buffer's lifetime
    pub fn dropped(&self) -> u64 {
        self.dropped
    }

    /// Clear the buffer. The eviction counter is kept.
    pub fn clear(&mut self) {
        self.lines.clear();
    }

    /// Render the buffer as text, one line per row, optionally keeping only
    /// lines that match `filter`. Order is preserved and the buffer is untouched.
    pub fn render(&self, filter: Option<&Regex>) -> String {
        let mut out = String::new();
        for line in &self.lines {
            if filter.map_or(true, |re| re.is_match(&line.content)) {
                out.push_str(&line.content);
                out.push('\n');
            }
        }
        out
    }
}

impl Default for LogBuffer {
    fn default() -> Self {
        Self::new(10000)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_push_and_get() {
        let mut buffer = LogBuffer::new(100);
        buffer.push_line("test line 1", false);
        buffer.push_line("test line 2", true);

        assert_eq!(buffer.len(), 2);

        let lines: Vec<_> = buffer.lines().collect();
        assert_eq!(lines[0].content, "test line 1");
        assert!(!lines[0].is_stderr);
        assert_eq!(lines[1].content, "test line 2");
        assert!(lines[1].is_stderr);
    }

    #[test]
    fn test_capacity_limit() {
        let mut buffer = LogBuffer::new(3);
        buffer.push_line("line 1", false);
        buffer.push_line("line 2", false);
        buffer.push_line("line 3", false);
        buffer.push_line("line 4", false);

        assert_eq!(buffer.len(), 3);
        assert_eq!(buffer.dropped(), 1);

        let lines: Vec<_> = buffer.lines().collect();
        assert_eq!(lines[0].content, "line 2");
        assert_eq!(lines[2].content, "line 4");
    }

    #[test]
    fn test_zero_capacity_keeps_latest_line() {
        let mut buffer = LogBuffer::new(0);
        buffer.push_line("a", false);
        buffer.push_line("b", false);
        assert_eq!(buffer.render(None), "b\n");
    }

    #[test]
    fn test_render_filter_preserves_order() {
        let mut buffer = LogBuffer::new(100);
        buffer.push_line("error: something failed", false);
        buffer.push_line("info: all good", false);
        buffer.push_line("error: another failure", false);

        let re = Regex::new("^error").unwrap();
        assert_eq!(
            buffer.render(Some(&re)),
            "error: something failed\nerror: another failure\n"
        );
        // Filtering is a read, not a mutation
        assert_eq!(buffer.len(), 3);
    }

    #[test]
    fn test_clear_keeps_drop_count() {
        let mut buffer = LogBuffer::new(1);
        buffer.push_line("x", false);
        buffer.push_line("y", false);
        buffer.clear();
        assert!(buffer.is_empty());
        assert_eq!(buffer.render(None), "");
        assert_eq!(buffer.dropped(), 1);
    }
}
