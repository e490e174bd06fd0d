use std::fmt;
use std::ops::Range;

use serde::Serialize;

/// A file name plus a 1-based line number.
///
/// Line 0 means "no location" (synthesized nodes that were never attached to
/// source text).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct SourceLoc {
    pub file: String,
    pub line: u32,
}

impl SourceLoc {
    pub fn new(file: impl Into<String>, line: u32) -> Self {
        Self {
            file: file.into(),
            line,
        }
    }

    /// Whether this location points at a real source line.
    pub fn is_known(&self) -> bool {
        self.line > 0
    }
}

impl fmt::Display for SourceLoc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_known() {
            write!(f, "{}:{}", self.file, self.line)
        } else {
            write!(f, "{}", self.file)
        }
    }
}

/// Pre-computed index of line start positions.
///
/// Constructed once per source file. Used in the other direction from a
/// lexer's line index: diagnostics know a line number and need the byte
/// range of that line to underline it.
#[derive(Debug)]
pub struct LineIndex {
    /// Byte offset of the start of each line. The first entry is always 0.
    line_starts: Vec<u32>,
    len: u32,
}

impl LineIndex {
    /// Build a line index by scanning the source text for newline characters.
    pub fn new(source: &str) -> Self {
        let mut line_starts = vec![0u32];
        for (i, byte) in source.bytes().enumerate() {
            if byte == b'\n' {
                line_starts.push((i + 1) as u32);
            }
        }
        Self {
            line_starts,
            len: source.len() as u32,
        }
    }

    /// Byte range of a 1-based line, excluding its trailing newline.
    ///
    /// Returns `None` for line 0 and for lines past the end of the source.
    pub fn line_range(&self, line: u32) -> Option<Range<usize>> {
        let idx = (line as usize).checked_sub(1)?;
        let start = *self.line_starts.get(idx)?;
        let end = match self.line_starts.get(idx + 1) {
            Some(&next) => next - 1,
            None => self.len,
        };
        Some(start as usize..end as usize)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn source_loc_display() {
        assert_eq!(SourceLoc::new("main.w", 12).to_string(), "main.w:12");
        assert_eq!(SourceLoc::new("main.w", 0).to_string(), "main.w");
    }

    #[test]
    fn line_index_last_line_without_newline() {
        let src = "hello\nworld\nfoo";
        let idx = LineIndex::new(src);
        assert_eq!(idx.line_range(3), Some(12..15));
        assert_eq!(&src[idx.line_range(3).unwrap()], "foo");
    }

    #[test]
    fn line_range_excludes_newline() {
        let src = "ab\ncde\n\nf";
        let idx = LineIndex::new(src);
        assert_eq!(idx.line_range(1), Some(0..2));
        assert_eq!(idx.line_range(2), Some(3..6));
        assert_eq!(idx.line_range(3), Some(7..7));
        assert_eq!(idx.line_range(4), Some(8..9));
        assert_eq!(&src[idx.line_range(2).unwrap()], "cde");
    }

    #[test]
    fn line_range_out_of_bounds() {
        let idx = LineIndex::new("a\nb");
        assert_eq!(idx.line_range(0), None);
        assert_eq!(idx.line_range(3), None);
        assert_eq!(idx.line_range(2), Some(2..3));
    }
}
