use serde::{Deserialize, Serialize};
use std::ops::Range;
use thiserror::Error;

use crate::segment::SegmentId;

/// Result type for engine operations
pub type Result<T> = std::result::Result<T, EngineError>;

/// Errors that stop a run or a single file
#[derive(Error, Debug)]
pub enum EngineError {
    /// Invalid configuration, detected before any file is touched
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Configuration document could not be deserialized
    #[error("Configuration parse error: {0}")]
    Config(#[from] toml::de::Error),

    /// File text could not be decoded with its declared encoding
    #[error("Cannot decode {path} as {encoding}: {reason}")]
    Encoding {
        path: String,
        encoding: String,
        reason: String,
    },

    /// Run-level cancellation was observed
    #[error("Processing cancelled")]
    Cancelled,

    /// IO error occurred
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    /// Tree-sitter error
    #[error("Tree-sitter error: {0}")]
    TreeSitterError(String),

    /// A batch worker panicked or was aborted
    #[error("Worker failed: {0}")]
    Join(String),
}

impl EngineError {
    /// Create an invalid config error
    pub fn invalid_config(msg: impl Into<String>) -> Self {
        Self::InvalidConfig(msg.into())
    }

    /// Create a tree-sitter error
    pub fn tree_sitter(msg: impl Into<String>) -> Self {
        Self::TreeSitterError(msg.into())
    }

    /// Create an encoding error
    pub fn encoding(
        path: impl Into<String>,
        encoding: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self::Encoding {
            path: path.into(),
            encoding: encoding.into(),
            reason: reason.into(),
        }
    }
}

/// Problems that were recovered locally and only degrade output quality
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiagnosticKind {
    /// No grammar for the language; the heuristic structure was used
    GrammarUnavailable,
    /// A malformed region was replaced by an `Other` node
    ParseRegionError,
    /// Ancestor or symbol lookup failed; the context field was left empty
    ContextResolutionGap,
    /// A segment alone exceeds the chunk budget and was emitted as a flagged singleton
    OversizedSegment,
    /// Context did not fit next to a segment and was left out of its chunk
    ContextTrimmed,
}

impl DiagnosticKind {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::GrammarUnavailable => "grammar_unavailable",
            Self::ParseRegionError => "parse_region_error",
            Self::ContextResolutionGap => "context_resolution_gap",
            Self::OversizedSegment => "oversized_segment",
            Self::ContextTrimmed => "context_trimmed",
        }
    }
}

/// A single recovered problem
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnostic {
    pub kind: DiagnosticKind,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub byte_range: Option<Range<usize>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub segment: Option<SegmentId>,
}

impl Diagnostic {
    pub fn new(kind: DiagnosticKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            byte_range: None,
            segment: None,
        }
    }

    /// Builder: set the affected byte range
    #[must_use]
    pub fn with_range(mut self, range: Range<usize>) -> Self {
        self.byte_range = Some(range);
        self
    }

    /// Builder: set the affected segment
    #[must_use]
    pub const fn with_segment(mut self, segment: SegmentId) -> Self {
        self.segment = Some(segment);
        self
    }
}

/// Per-file report of recovered problems, in the order they were found
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileDiagnostics {
    entries: Vec<Diagnostic>,
}

impl FileDiagnostics {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, diagnostic: Diagnostic) {
        self.entries.push(diagnostic);
    }

    pub fn extend(&mut self, diagnostics: impl IntoIterator<Item = Diagnostic>) {
        self.entries.extend(diagnostics);
    }

    #[must_use]
    pub fn entries(&self) -> &[Diagnostic] {
        &self.entries
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Number of diagnostics of one kind
    #[must_use]
    pub fn count(&self, kind: DiagnosticKind) -> usize {
        self.entries.iter().filter(|d| d.kind == kind).count()
    }

    /// True when output was produced from a degraded path (fallback structure or parse errors)
    #[must_use]
    pub fn is_degraded(&self) -> bool {
        self.entries.iter().any(|d| {
            matches!(
                d.kind,
                DiagnosticKind::GrammarUnavailable | DiagnosticKind::ParseRegionError
            )
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn diagnostics_count_by_kind() {
        let mut diagnostics = FileDiagnostics::new();
        diagnostics.push(Diagnostic::new(DiagnosticKind::OversizedSegment, "big").with_segment(3));
        diagnostics.push(
            Diagnostic::new(DiagnosticKind::ParseRegionError, "bad").with_range(10..12),
        );
        diagnostics.push(Diagnostic::new(DiagnosticKind::OversizedSegment, "big too"));

        assert_eq!(diagnostics.len(), 3);
        assert_eq!(diagnostics.count(DiagnosticKind::OversizedSegment), 2);
        assert_eq!(diagnostics.entries()[1].byte_range, Some(10..12));
        assert!(diagnostics.is_degraded());
    }

    #[test]
    fn oversized_alone_is_not_degraded() {
        let mut diagnostics = FileDiagnostics::new();
        diagnostics.push(Diagnostic::new(DiagnosticKind::OversizedSegment, "big"));
        assert!(!diagnostics.is_degraded());
    }

    #[test]
    fn error_messages() {
        let err = EngineError::encoding("a.py", "utf-8", "invalid byte at 3");
        assert_eq!(err.to_string(), "Cannot decode a.py as utf-8: invalid byte at 3");
        assert!(EngineError::invalid_config("x")
            .to_string()
            .starts_with("Invalid configuration"));
    }
}
