use serde::{Deserialize, Serialize};
use std::ops::Range;

/// Sequence index of a segment within its file
pub type SegmentId = usize;

/// Coarse kind of a segment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SegmentKind {
    Function,
    Method,
    /// Class header plus the fields that precede its first member declaration
    Class,
    /// Residual code owned by a class (trailing fields, closing brace)
    StatementBlock,
    /// Residual file-scope code
    ModuleLevel,
}

impl SegmentKind {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Function => "function",
            Self::Method => "method",
            Self::Class => "class",
            Self::StatementBlock => "statement_block",
            Self::ModuleLevel => "module_level",
        }
    }

    /// Named declaration units, as opposed to residual code
    #[must_use]
    pub const fn is_declaration(self) -> bool {
        matches!(self, Self::Function | Self::Method | Self::Class)
    }
}

impl std::fmt::Display for SegmentKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The unit of chunking: a contiguous byte range of one file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Segment {
    pub id: SegmentId,

    pub kind: SegmentKind,

    /// Half-open UTF-8 byte range into the file text
    pub byte_range: Range<usize>,

    /// Best-effort identifier; absent for residual blocks
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// Token cost of the raw slice
    pub declared_tokens: usize,

    /// Owning class for methods and class-owned residual blocks
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<SegmentId>,
}

impl Segment {
    /// Raw text of this segment
    ///
    /// Returns an empty string when the range does not fit `source`.
    #[must_use]
    pub fn text<'a>(&self, source: &'a str) -> &'a str {
        source.get(self.byte_range.clone()).unwrap_or("")
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.byte_range.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.byte_range.is_empty()
    }

    /// 1-indexed line range (inclusive) covered by this segment
    #[must_use]
    pub fn line_span(&self, source: &str) -> (usize, usize) {
        let start = self.byte_range.start.min(source.len());
        let end = self.byte_range.end.min(source.len());
        let first = source[..start].matches('\n').count() + 1;
        let body = &source[start..end];
        let newlines = body.trim_end_matches('\n').matches('\n').count();
        (first, first + newlines)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn segment(range: Range<usize>) -> Segment {
        Segment {
            id: 0,
            kind: SegmentKind::Function,
            byte_range: range,
            name: Some("f".into()),
            declared_tokens: 3,
            parent_id: None,
        }
    }

    #[test]
    fn text_and_lines() {
        let source = "import os\n\ndef f():\n    pass\n";
        let seg = segment(11..29);
        assert_eq!(seg.text(source), "def f():\n    pass\n");
        assert_eq!(seg.line_span(source), (3, 4));
        assert_eq!(seg.len(), 18);
    }

    #[test]
    fn out_of_range_text_is_empty() {
        assert_eq!(segment(5..50).text("short"), "");
    }

    #[test]
    fn serializes_snake_case_kind() {
        let json = serde_json::to_string(&segment(0..1)).unwrap();
        assert!(json.contains("\"kind\":\"function\""), "{json}");
        assert!(!json.contains("parent_id"));
    }
}
