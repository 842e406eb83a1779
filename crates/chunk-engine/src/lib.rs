//! # Context Chunk Engine
//!
//! Structure-aware segmentation and context windowing for source files.
//!
//! ## Philosophy
//!
//! The engine splits a file into chunks that:
//! - Never cut through a function, method or class header when avoidable
//! - Carry the context a reader needs (imports, enclosing signatures)
//! - Stay within a hard token budget, with a bounded overlap between neighbours
//! - Cover every byte of the file exactly once across their new segments
//!
//! ## Architecture
//!
//! ```text
//! SourceFile (bytes + language + encoding)
//!     │
//!     ├──> Decode → text
//!     │
//!     ├──> GrammarRegistry → tree-sitter grammar, or unavailable
//!     │
//!     ├──> TreeBuilder → SyntaxTree (precise or heuristic)
//!     │
//!     ├──> Segmenter → Segment[] (contiguous, gap-free tiling)
//!     │
//!     ├──> ContextExtractor → ContextBundle[] (imports, signatures, symbols)
//!     │
//!     ├──> DependencyAnalyzer → DependencyGraph (calls, inherits, references)
//!     │
//!     └──> ChunkPacker → Chunk[] + diagnostics
//! ```
//!
//! ## Example
//!
//! ```rust
//! use context_chunk_engine::{ChunkEngine, EngineConfig};
//!
//! let engine = ChunkEngine::new(EngineConfig::default()).unwrap();
//!
//! let code = r#"
//! def process_data(value):
//!     return value.strip().upper()
//! "#;
//!
//! let output = engine.process_str("example.py", code).unwrap();
//! for chunk in &output.chunks {
//!     println!("chunk {} ({} tokens): {:?}", chunk.id, chunk.token_count, chunk.segments);
//! }
//! ```

mod builder;
mod config;
mod context;
mod dependency;
mod engine;
mod error;
mod grammar;
mod heuristic;
mod language;
mod packer;
mod segment;
mod segmenter;
mod source;
mod tokens;
mod tree;

pub use builder::{BuildOutput, StructureStrategy, TreeBuilder, TreeSitterStrategy};
pub use config::{ChunkStrategy, EngineConfig, OverlapPolicyKind};
pub use context::{ContextBundle, ContextExtractor, ContextOutput, FileContext};
pub use dependency::{DependencyAnalyzer, DependencyEdge, DependencyGraph, EdgeKind};
pub use engine::{ChunkEngine, FileOutput};
pub use error::{Diagnostic, DiagnosticKind, EngineError, FileDiagnostics, Result};
pub use grammar::{
    BuiltinLoader, Grammar, GrammarLoader, GrammarProfile, GrammarRegistry, Resolution,
};
pub use heuristic::HeuristicStrategy;
pub use language::{BlockStyle, Language};
pub use packer::{
    Chunk, ChunkContext, ChunkPacker, DependencyAwareOverlap, OverlapPolicy, PackInput,
    PackOutput, PackingStats, TrailingOverlap,
};
pub use segment::{Segment, SegmentId, SegmentKind};
pub use segmenter::{SegmentOrigin, Segmentation, Segmenter};
pub use source::{Encoding, SourceFile};
pub use tokens::{HeuristicCounter, TokenCounter, WordCounter};
pub use tree::{NodeId, NodeKind, StructureOrigin, SyntaxNode, SyntaxTree};

#[cfg(feature = "hf-tokenizer")]
pub use tokens::HfTokenCounter;

/// Re-exported so callers can build tokens without a direct tokio-util dependency
pub use tokio_util::sync::CancellationToken;
