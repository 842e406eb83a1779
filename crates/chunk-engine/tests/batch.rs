use context_chunk_engine::{
    CancellationToken, ChunkEngine, DiagnosticKind, EngineConfig, EngineError, Encoding,
    GrammarLoader, GrammarRegistry, Language, SourceFile, StructureOrigin,
};
use std::sync::Arc;

fn files() -> Vec<SourceFile> {
    (0..12)
        .map(|i| {
            SourceFile::from_text(
                format!("module_{i}.py"),
                format!("import os\n\ndef f_{i}(x):\n    return x + {i}\n\ndef g_{i}():\n    return f_{i}(1)\n"),
            )
        })
        .collect()
}

fn engine(max_concurrency: usize) -> ChunkEngine {
    ChunkEngine::new(EngineConfig {
        max_concurrency,
        ..EngineConfig::default()
    })
    .unwrap()
}

#[tokio::test]
async fn results_keep_input_order() {
    let engine = engine(3);
    let results = engine.process_batch(files(), &CancellationToken::new()).await;

    assert_eq!(results.len(), 12);
    for (i, result) in results.iter().enumerate() {
        let output = result.as_ref().unwrap();
        assert_eq!(output.path, format!("module_{i}.py"));
        assert_eq!(output.segments.len(), 3);
    }
}

#[tokio::test]
async fn batch_matches_sequential_processing() {
    let engine = engine(4);
    let sequential: Vec<String> = files()
        .iter()
        .map(|file| {
            engine
                .process_file(file, &CancellationToken::new())
                .unwrap()
                .to_json()
                .unwrap()
        })
        .collect();
    let batched: Vec<String> = engine
        .process_batch(files(), &CancellationToken::new())
        .await
        .into_iter()
        .map(|result| result.unwrap().to_json().unwrap())
        .collect();
    assert_eq!(sequential, batched);
}

#[tokio::test]
async fn one_bad_file_does_not_affect_the_rest() {
    let engine = engine(2);
    let mut batch = files();
    batch.insert(
        1,
        SourceFile::new("bad.py", Language::Python, vec![b'x', 0xFF], Encoding::Utf8),
    );

    let results = engine.process_batch(batch, &CancellationToken::new()).await;
    assert_eq!(results.len(), 13);
    assert!(matches!(results[1], Err(EngineError::Encoding { .. })));
    assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 12);
    assert_eq!(results[2].as_ref().unwrap().path, "module_1.py");
}

#[tokio::test]
async fn run_cancellation_reaches_every_file() {
    let engine = engine(2);
    let cancel = CancellationToken::new();
    cancel.cancel();

    let results = engine.process_batch(files(), &cancel).await;
    assert_eq!(results.len(), 12);
    assert!(results
        .iter()
        .all(|r| matches!(r, Err(EngineError::Cancelled))));
}

#[tokio::test]
async fn file_cancellation_is_isolated() {
    let engine = engine(2);
    let tokens: Vec<CancellationToken> = (0..12).map(|_| CancellationToken::new()).collect();
    tokens[5].cancel();

    let results = engine.process_batch_with_tokens(files(), tokens).await;
    assert!(matches!(results[5], Err(EngineError::Cancelled)));
    for (i, result) in results.iter().enumerate() {
        if i != 5 {
            assert!(result.is_ok(), "file {i} should complete");
        }
    }
}

struct BrokenLoader;

impl GrammarLoader for BrokenLoader {
    fn load(&self, language: Language) -> context_chunk_engine::Result<tree_sitter::Language> {
        Err(EngineError::tree_sitter(format!("{language} grammar missing")))
    }
}

#[tokio::test]
async fn missing_grammars_degrade_instead_of_failing() {
    let registry = Arc::new(GrammarRegistry::with_loader(BrokenLoader));
    let engine = engine(4).with_registry(registry.clone());

    let results = engine.process_batch(files(), &CancellationToken::new()).await;
    for result in results {
        let output = result.unwrap();
        assert_eq!(output.origin, StructureOrigin::Approximate);
        assert_eq!(output.diagnostics.count(DiagnosticKind::GrammarUnavailable), 1);
        assert_eq!(output.segments.len(), 3);
    }
    // one load attempt per language, shared across workers
    assert_eq!(registry.load_count(), 1);
}
