use context_chunk_engine::{
    CancellationToken, ChunkEngine, ChunkPacker, DiagnosticKind, EngineConfig, PackInput,
    Segment, SegmentKind, WordCounter,
};
use pretty_assertions::assert_eq;

/// Back-to-back segments of `sizes` words each
fn methods(sizes: &[usize], kind: SegmentKind) -> (String, Vec<Segment>) {
    let mut text = String::new();
    let mut segments = Vec::new();
    for (id, &size) in sizes.iter().enumerate() {
        let start = text.len();
        text.push_str(&"tok ".repeat(size));
        text.push('\n');
        segments.push(Segment {
            id,
            kind,
            byte_range: start..text.len(),
            name: Some(format!("m{id}")),
            declared_tokens: size,
            parent_id: None,
        });
    }
    (text, segments)
}

fn layout(config: &EngineConfig, sizes: &[usize], kind: SegmentKind) -> Vec<(Vec<usize>, Vec<usize>)> {
    let (text, segments) = methods(sizes, kind);
    let input = PackInput {
        source_file: "scenario.py",
        text: &text,
        segments: &segments,
        bundles: &[],
        graph: None,
    };
    ChunkPacker::new(config, &WordCounter)
        .pack(&input, &CancellationToken::new())
        .unwrap()
        .chunks
        .into_iter()
        .map(|chunk| (chunk.segments, chunk.overlap_segments))
        .collect()
}

fn config(max_chunk_tokens: usize, overlap_tokens: usize) -> EngineConfig {
    EngineConfig {
        max_chunk_tokens,
        overlap_tokens,
        ..EngineConfig::default()
    }
}

#[test]
fn two_functions_that_nearly_fill_the_budget() {
    assert_eq!(
        layout(&config(30, 5), &[20, 25], SegmentKind::Function),
        vec![(vec![0], vec![]), (vec![1], vec![])]
    );
}

#[test]
fn three_methods_with_and_without_room_for_overlap() {
    assert_eq!(
        layout(&config(25, 10), &[10, 10, 10], SegmentKind::Method),
        vec![(vec![0, 1], vec![]), (vec![1, 2], vec![1])]
    );
    assert_eq!(
        layout(&config(25, 9), &[10, 10, 10], SegmentKind::Method),
        vec![(vec![0, 1], vec![]), (vec![2], vec![])]
    );
}

#[test]
fn oversized_function_in_a_real_file() {
    let mut code = String::from("def small():\n    return 1\n\ndef big():\n");
    for i in 0..200 {
        code.push_str(&format!("    value_{i} = compute({i})\n"));
    }
    code.push_str("\ndef tail():\n    return 2\n");

    let engine = ChunkEngine::new(config(200, 20)).unwrap();
    let output = engine.process_str("big.py", &code).unwrap();

    let big = output
        .segments
        .iter()
        .find(|s| s.name.as_deref() == Some("big"))
        .unwrap();
    assert!(big.declared_tokens > 200);

    let oversized: Vec<_> = output.chunks.iter().filter(|c| c.oversized).collect();
    assert_eq!(oversized.len(), 1);
    assert_eq!(oversized[0].segments, vec![big.id]);
    assert!(oversized[0].overlap_segments.is_empty());
    assert!(oversized[0].context.is_empty());
    assert!(output
        .chunks
        .iter()
        .all(|c| !c.overlap_segments.contains(&big.id)));

    assert_eq!(output.diagnostics.count(DiagnosticKind::OversizedSegment), 1);
    assert_eq!(output.stats.oversized_chunks, 1);
    assert_eq!(output.chunks.len(), 3);
}
