//! File pipeline (text → tree → segments → context → graph → chunks) and the batch driver.

use crate::builder::{BuildOutput, TreeBuilder};
use crate::config::EngineConfig;
use crate::context::{ContextBundle, ContextExtractor, FileContext};
use crate::dependency::{DependencyAnalyzer, DependencyEdge};
use crate::error::{EngineError, FileDiagnostics, Result};
use crate::grammar::GrammarRegistry;
use crate::language::Language;
use crate::packer::{Chunk, ChunkPacker, PackInput, PackingStats};
use crate::segment::{Segment, SegmentId};
use crate::segmenter::Segmenter;
use crate::source::SourceFile;
use crate::tokens::{HeuristicCounter, TokenCounter};
use crate::tree::StructureOrigin;
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;

/// Everything produced for one file
#[derive(Debug, Clone, Serialize)]
pub struct FileOutput {
    pub path: String,
    pub language: Language,
    /// Whether structure came from a grammar or from heuristics
    pub origin: StructureOrigin,
    pub segments: Vec<Segment>,
    /// One bundle per segment, indexed by segment id
    pub contexts: Vec<ContextBundle>,
    /// Ordering hints for consumers; not enforced
    pub edges: Vec<DependencyEdge>,
    pub cycles: Vec<Vec<SegmentId>>,
    pub chunks: Vec<Chunk>,
    pub diagnostics: FileDiagnostics,
    pub stats: PackingStats,
}

impl FileOutput {
    /// Pretty JSON for downstream tooling
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }

    #[must_use]
    pub fn is_degraded(&self) -> bool {
        self.diagnostics.is_degraded()
    }
}

/// Segmentation and context-windowing engine
#[derive(Clone)]
pub struct ChunkEngine {
    config: Arc<EngineConfig>,
    counter: Arc<dyn TokenCounter>,
    registry: Option<Arc<GrammarRegistry>>,
}

impl ChunkEngine {
    /// Create an engine; an invalid configuration fails before any file is touched
    pub fn new(config: EngineConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config: Arc::new(config),
            counter: Arc::new(HeuristicCounter),
            registry: None,
        })
    }

    /// Use a different token cost function
    #[must_use]
    pub fn with_token_counter(mut self, counter: impl TokenCounter + 'static) -> Self {
        self.counter = Arc::new(counter);
        self
    }

    /// Use a private grammar registry instead of the process-wide one
    #[must_use]
    pub fn with_registry(mut self, registry: Arc<GrammarRegistry>) -> Self {
        self.registry = Some(registry);
        self
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    fn registry(&self) -> &GrammarRegistry {
        match self.registry.as_deref() {
            Some(registry) => registry,
            None => GrammarRegistry::global(),
        }
    }

    /// Run the whole pipeline for one file
    ///
    /// Only decoding failures and cancellation are errors; every other problem
    /// is recovered and reported in [`FileOutput::diagnostics`].
    pub fn process_file(&self, file: &SourceFile, cancel: &CancellationToken) -> Result<FileOutput> {
        if cancel.is_cancelled() {
            return Err(EngineError::Cancelled);
        }
        let path = file.display_path();
        let text = file.decode()?;
        let config = self.config.as_ref();
        let counter = self.counter.as_ref();
        let mut diagnostics = FileDiagnostics::new();

        let resolution = self.registry().resolve(file.language);
        let BuildOutput {
            tree,
            diagnostics: build_diagnostics,
        } = TreeBuilder::build(&text, file.language, &resolution);
        diagnostics.extend(build_diagnostics);
        let origin = tree.origin();

        let segmentation = Segmenter::new(config, counter).segment(&tree, &text, cancel)?;
        let file_context = FileContext::new(
            file.language,
            &tree,
            &text,
            &segmentation.segments,
            config.max_imports,
        );
        let context = ContextExtractor::new(&tree, &text, file_context).extract_all(&segmentation);
        diagnostics.extend(context.diagnostics);

        // segments hold byte ranges only; the tree is no longer needed
        drop(tree);
        let segments = segmentation.into_segments();
        let graph = DependencyAnalyzer::analyze(&segments, &context.bundles);

        let input = PackInput {
            source_file: &path,
            text: &text,
            segments: &segments,
            bundles: &context.bundles,
            graph: Some(&graph),
        };
        let packed = ChunkPacker::new(config, counter).pack(&input, cancel)?;
        let stats = packed.stats();
        diagnostics.extend(packed.diagnostics);

        if diagnostics.is_degraded() {
            log::warn!("{path}: output degraded ({} diagnostic(s))", diagnostics.len());
        }
        log::debug!("{path}: {} segments, {stats}", segments.len());

        Ok(FileOutput {
            path,
            language: file.language,
            origin,
            segments,
            contexts: context.bundles,
            edges: graph.edges().to_vec(),
            cycles: graph.cycles(),
            chunks: packed.chunks,
            diagnostics,
            stats,
        })
    }

    /// Convenience for in-memory UTF-8 text; the language comes from the path
    pub fn process_str(&self, path: &str, text: &str) -> Result<FileOutput> {
        self.process_file(&SourceFile::from_text(path, text), &CancellationToken::new())
    }

    /// Process files concurrently, at most `max_concurrency` at a time
    ///
    /// Results come back in input order. A failing or cancelled file does not
    /// affect the others; cancelling `cancel` stops every file still running.
    pub async fn process_batch(
        &self,
        files: Vec<SourceFile>,
        cancel: &CancellationToken,
    ) -> Vec<Result<FileOutput>> {
        let tokens = files.iter().map(|_| cancel.child_token()).collect();
        self.process_batch_with_tokens(files, tokens).await
    }

    /// Like [`Self::process_batch`], with one cancellation token per file
    pub async fn process_batch_with_tokens(
        &self,
        files: Vec<SourceFile>,
        tokens: Vec<CancellationToken>,
    ) -> Vec<Result<FileOutput>> {
        let semaphore = Arc::new(Semaphore::new(self.config.max_concurrency));
        let mut handles = Vec::with_capacity(files.len());

        for (file, token) in files.into_iter().zip(tokens) {
            let engine = self.clone();
            let semaphore = semaphore.clone();
            handles.push(tokio::spawn(async move {
                let _permit = semaphore
                    .acquire_owned()
                    .await
                    .map_err(|e| EngineError::Join(e.to_string()))?;
                if token.is_cancelled() {
                    return Err(EngineError::Cancelled);
                }
                tokio::task::spawn_blocking(move || engine.process_file(&file, &token))
                    .await
                    .map_err(|e| EngineError::Join(e.to_string()))?
            }));
        }

        let mut results = Vec::with_capacity(handles.len());
        for handle in handles {
            let result = handle
                .await
                .unwrap_or_else(|e| Err(EngineError::Join(e.to_string())));
            if let Err(e) = &result {
                log::warn!("file failed: {e}");
            }
            results.push(result);
        }
        results
    }
}

impl std::fmt::Debug for ChunkEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChunkEngine")
            .field("config", &self.config)
            .field("private_registry", &self.registry.is_some())
            .finish_non_exhaustive()
    }
}
