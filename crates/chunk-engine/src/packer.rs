//! Chunk packing: greedy, order-preserving, budget-bounded, with an overlap window.

use crate::config::{EngineConfig, OverlapPolicyKind};
use crate::context::ContextBundle;
use crate::dependency::DependencyGraph;
use crate::error::{Diagnostic, DiagnosticKind, EngineError, Result};
use crate::segment::{Segment, SegmentId};
use crate::tokens::TokenCounter;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashSet};
use tokio_util::sync::CancellationToken;

/// Context rendered in front of a chunk's code
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkContext {
    pub imports: Vec<String>,
    pub signatures: Vec<String>,
}

impl ChunkContext {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.imports.is_empty() && self.signatures.is_empty()
    }

    /// Prefix block: imports, then signatures, then a blank separator line
    #[must_use]
    pub fn render(&self) -> String {
        if self.is_empty() {
            return String::new();
        }
        let mut block = String::new();
        for line in self.imports.iter().chain(&self.signatures) {
            block.push_str(line);
            block.push('\n');
        }
        block.push('\n');
        block
    }
}

/// A token-bounded group of consecutive segments
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chunk {
    /// Sequence index within the file
    pub id: usize,

    pub source_file: String,

    /// Segment ids in file order, overlap segments first
    pub segments: Vec<SegmentId>,

    /// Segments repeated from the previous chunk
    pub overlap_segments: Vec<SegmentId>,

    /// Segment tokens plus injected context tokens
    pub token_count: usize,

    /// A single segment larger than the budget
    pub oversized: bool,

    pub context: ChunkContext,

    /// Context prefix followed by the raw segment text
    pub text: String,
}

impl Chunk {
    /// Segments that appear here for the first time
    pub fn new_segments(&self) -> impl Iterator<Item = SegmentId> + '_ {
        self.segments
            .iter()
            .copied()
            .filter(|id| !self.overlap_segments.contains(id))
    }
}

/// Everything the packer reads for one file
#[derive(Debug, Clone, Copy)]
pub struct PackInput<'a> {
    pub source_file: &'a str,
    pub text: &'a str,
    pub segments: &'a [Segment],
    /// Bundles indexed by segment id; may be empty
    pub bundles: &'a [ContextBundle],
    pub graph: Option<&'a DependencyGraph>,
}

impl PackInput<'_> {
    fn tokens(&self, id: SegmentId) -> usize {
        self.segments.get(id).map_or(0, |s| s.declared_tokens)
    }
}

/// Chooses which segments of a closed chunk are repeated at the start of the next
pub trait OverlapPolicy: Send + Sync {
    fn name(&self) -> &'static str;

    /// Seed for the chunk that will receive `next`, in `closed` order
    fn select(
        &self,
        closed: &[SegmentId],
        next: SegmentId,
        input: &PackInput<'_>,
        overlap_tokens: usize,
    ) -> Vec<SegmentId>;
}

/// Walk back from the end of the closed chunk while the window has room
#[derive(Debug, Clone, Copy, Default)]
pub struct TrailingOverlap;

impl OverlapPolicy for TrailingOverlap {
    fn name(&self) -> &'static str {
        "trailing"
    }

    fn select(
        &self,
        closed: &[SegmentId],
        _next: SegmentId,
        input: &PackInput<'_>,
        overlap_tokens: usize,
    ) -> Vec<SegmentId> {
        if overlap_tokens == 0 {
            return Vec::new();
        }
        let mut picked = Vec::new();
        let mut used = 0;
        for &id in closed.iter().rev() {
            let cost = input.tokens(id);
            if used + cost > overlap_tokens {
                break;
            }
            used += cost;
            picked.push(id);
        }
        picked.reverse();
        picked
    }
}

/// Prefer what the next segment depends on, nearest first; trailing otherwise
#[derive(Debug, Clone, Copy, Default)]
pub struct DependencyAwareOverlap;

impl OverlapPolicy for DependencyAwareOverlap {
    fn name(&self) -> &'static str {
        "dependency_aware"
    }

    fn select(
        &self,
        closed: &[SegmentId],
        next: SegmentId,
        input: &PackInput<'_>,
        overlap_tokens: usize,
    ) -> Vec<SegmentId> {
        let Some(graph) = input.graph else {
            return TrailingOverlap.select(closed, next, input, overlap_tokens);
        };
        if overlap_tokens == 0 {
            return Vec::new();
        }

        let wanted: BTreeSet<SegmentId> = graph.dependencies_of(next).into_iter().collect();
        let mut picked = Vec::new();
        let mut used = 0;
        for &id in closed.iter().rev() {
            if !wanted.contains(&id) {
                continue;
            }
            let cost = input.tokens(id);
            if used + cost <= overlap_tokens {
                used += cost;
                picked.push(id);
            }
        }

        if picked.is_empty() {
            return TrailingOverlap.select(closed, next, input, overlap_tokens);
        }
        picked.reverse();
        picked
    }
}

/// Result of packing one file
#[derive(Debug, Clone, Default)]
pub struct PackOutput {
    pub chunks: Vec<Chunk>,
    pub diagnostics: Vec<Diagnostic>,
}

impl PackOutput {
    #[must_use]
    pub fn stats(&self) -> PackingStats {
        PackingStats::from_chunks(&self.chunks)
    }
}

/// Summary of a packing run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackingStats {
    pub total_chunks: usize,
    pub total_tokens: usize,
    pub avg_tokens_per_chunk: usize,
    pub min_tokens: usize,
    pub max_tokens: usize,
    pub oversized_chunks: usize,
    pub overlap_segments: usize,
}

impl PackingStats {
    #[must_use]
    pub fn from_chunks(chunks: &[Chunk]) -> Self {
        let total_tokens: usize = chunks.iter().map(|c| c.token_count).sum();
        Self {
            total_chunks: chunks.len(),
            total_tokens,
            avg_tokens_per_chunk: if chunks.is_empty() {
                0
            } else {
                total_tokens / chunks.len()
            },
            min_tokens: chunks.iter().map(|c| c.token_count).min().unwrap_or(0),
            max_tokens: chunks.iter().map(|c| c.token_count).max().unwrap_or(0),
            oversized_chunks: chunks.iter().filter(|c| c.oversized).count(),
            overlap_segments: chunks.iter().map(|c| c.overlap_segments.len()).sum(),
        }
    }
}

impl std::fmt::Display for PackingStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Chunks: {} | Tokens: {} | Avg: {} | Range: {}-{} | Oversized: {} | Overlap: {}",
            self.total_chunks,
            self.total_tokens,
            self.avg_tokens_per_chunk,
            self.min_tokens,
            self.max_tokens,
            self.oversized_chunks,
            self.overlap_segments
        )
    }
}

/// Token cost of the context a segment may pull into a chunk
struct ContextCosts {
    imports: Vec<String>,
    imports_cost: usize,
    /// Per segment: enclosing signature and its cost
    signatures: Vec<Option<(String, usize)>>,
}

/// Chunk under construction with running token totals
///
/// Segments arrive in file order, so a class segment is always pushed before
/// the members whose signature it makes redundant.
#[derive(Debug, Default)]
struct OpenChunk {
    ids: Vec<SegmentId>,
    members: HashSet<SegmentId>,
    signatures: Vec<String>,
    seen_signatures: HashSet<String>,
    segment_tokens: usize,
    context_tokens: usize,
}

impl OpenChunk {
    fn from_ids(ids: &[SegmentId], input: &PackInput<'_>, costs: &ContextCosts) -> Self {
        let mut chunk = Self::default();
        for &id in ids {
            chunk.push(id, input, costs);
        }
        chunk
    }

    fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// Signature `id` would add; none when its owner is already here or it is a repeat
    fn new_signature<'c>(
        &self,
        id: SegmentId,
        input: &PackInput<'_>,
        costs: &'c ContextCosts,
    ) -> Option<&'c (String, usize)> {
        let owner_present = input
            .segments
            .get(id)
            .and_then(|s| s.parent_id)
            .is_some_and(|parent| self.members.contains(&parent));
        if owner_present {
            return None;
        }
        let entry = costs.signatures.get(id)?.as_ref()?;
        (!self.seen_signatures.contains(&entry.0)).then_some(entry)
    }

    /// Full cost of the chunk if `id` were appended
    fn cost_with(&self, id: SegmentId, input: &PackInput<'_>, costs: &ContextCosts) -> usize {
        let mut cost = self.segment_tokens + self.context_tokens + input.tokens(id);
        if self.is_empty() {
            cost += costs.imports_cost;
        }
        if let Some((_, sig_cost)) = self.new_signature(id, input, costs) {
            cost += sig_cost;
        }
        cost
    }

    fn push(&mut self, id: SegmentId, input: &PackInput<'_>, costs: &ContextCosts) {
        if self.is_empty() {
            self.context_tokens += costs.imports_cost;
        }
        if let Some((signature, sig_cost)) = self.new_signature(id, input, costs) {
            self.seen_signatures.insert(signature.clone());
            self.signatures.push(signature.clone());
            self.context_tokens += sig_cost;
        }
        self.segment_tokens += input.tokens(id);
        self.members.insert(id);
        self.ids.push(id);
    }
}

/// Greedy streaming packer
pub struct ChunkPacker<'a> {
    config: &'a EngineConfig,
    counter: &'a dyn TokenCounter,
    policy: Box<dyn OverlapPolicy + 'a>,
}

impl<'a> ChunkPacker<'a> {
    /// Packer using the overlap policy named in the config
    pub fn new(config: &'a EngineConfig, counter: &'a dyn TokenCounter) -> Self {
        let policy: Box<dyn OverlapPolicy> = match config.overlap_policy {
            OverlapPolicyKind::Trailing => Box::new(TrailingOverlap),
            OverlapPolicyKind::DependencyAware => Box::new(DependencyAwareOverlap),
        };
        Self {
            config,
            counter,
            policy,
        }
    }

    #[must_use]
    pub fn with_policy(mut self, policy: impl OverlapPolicy + 'a) -> Self {
        self.policy = Box::new(policy);
        self
    }

    pub fn policy_name(&self) -> &'static str {
        self.policy.name()
    }

    /// Pack segments in order; cancellation is checked before every segment
    pub fn pack(&self, input: &PackInput<'_>, cancel: &CancellationToken) -> Result<PackOutput> {
        let max = self.config.max_chunk_tokens;
        let costs = self.context_costs(input);
        let mut output = PackOutput::default();
        let mut open = OpenChunk::default();
        let mut seeded: Vec<SegmentId> = Vec::new();

        for segment in input.segments {
            if cancel.is_cancelled() {
                return Err(EngineError::Cancelled);
            }

            if segment.declared_tokens > max {
                self.close(&mut open, &mut seeded, input, &costs, &mut output);
                self.push_oversized(segment, input, &mut output);
                continue;
            }

            if !open.is_empty() && open.cost_with(segment.id, input, &costs) > max {
                let closed = self.close(&mut open, &mut seeded, input, &costs, &mut output);
                seeded = self.seed(&closed, segment.id, input, &costs);
                open = OpenChunk::from_ids(&seeded, input, &costs);
            }
            open.push(segment.id, input, &costs);
        }
        self.close(&mut open, &mut seeded, input, &costs, &mut output);

        log::debug!(
            "packed {} segments of {} with {} overlap: {}",
            input.segments.len(),
            input.source_file,
            self.policy.name(),
            output.stats()
        );
        Ok(output)
    }

    /// Overlap seed for the chunk receiving `next`, shrunk until `next` fits
    fn seed(
        &self,
        closed: &[SegmentId],
        next: SegmentId,
        input: &PackInput<'_>,
        costs: &ContextCosts,
    ) -> Vec<SegmentId> {
        let overlap_tokens = self.config.overlap_tokens;
        let mut seed: Vec<SegmentId> = self
            .policy
            .select(closed, next, input, overlap_tokens)
            .into_iter()
            .filter(|id| closed.contains(id))
            .collect();
        seed.sort_by_key(|id| closed.iter().position(|c| c == id));
        seed.dedup();

        while seed.iter().map(|&id| input.tokens(id)).sum::<usize>() > overlap_tokens {
            seed.remove(0);
        }
        while !seed.is_empty()
            && OpenChunk::from_ids(&seed, input, costs).cost_with(next, input, costs)
                > self.config.max_chunk_tokens
        {
            seed.remove(0);
        }
        seed
    }

    fn context_costs(&self, input: &PackInput<'_>) -> ContextCosts {
        let imports = if self.config.include_imports {
            input
                .bundles
                .iter()
                .find(|b| !b.imports.is_empty())
                .map(|b| b.imports.clone())
                .unwrap_or_default()
        } else {
            Vec::new()
        };
        let imports_cost = if imports.is_empty() {
            0
        } else {
            self.counter.count(&imports.join("\n"))
        };

        let signatures = input
            .segments
            .iter()
            .map(|segment| {
                if !self.config.include_enclosing_signature {
                    return None;
                }
                let signature = input.bundles.get(segment.id)?.enclosing_signature.clone()?;
                let cost = self.counter.count(&signature);
                Some((signature, cost))
            })
            .collect();

        ContextCosts {
            imports,
            imports_cost,
            signatures,
        }
    }

    /// Emit the open chunk (if any) and return its segment ids
    fn close(
        &self,
        open: &mut OpenChunk,
        seeded: &mut Vec<SegmentId>,
        input: &PackInput<'_>,
        costs: &ContextCosts,
        output: &mut PackOutput,
    ) -> Vec<SegmentId> {
        let chunk = std::mem::take(open);
        let overlap = std::mem::take(seeded);
        if chunk.is_empty() {
            return Vec::new();
        }

        let max = self.config.max_chunk_tokens;
        let segment_tokens = chunk.segment_tokens;
        let mut context_cost = chunk.context_tokens;
        let mut context = ChunkContext {
            imports: costs.imports.clone(),
            signatures: chunk.signatures,
        };

        if segment_tokens + context_cost > max {
            let before = context.clone();
            if !context.imports.is_empty() {
                context.imports.clear();
                context_cost -= costs.imports_cost;
            }
            while segment_tokens + context_cost > max {
                let Some(signature) = context.signatures.pop() else {
                    break;
                };
                context_cost -= self.counter.count(&signature);
            }
            let first_new = chunk
                .ids
                .iter()
                .copied()
                .find(|id| !overlap.contains(id))
                .unwrap_or(chunk.ids[0]);
            output.diagnostics.push(
                Diagnostic::new(
                    DiagnosticKind::ContextTrimmed,
                    format!(
                        "dropped {} import(s) and {} signature(s) to stay within {max} tokens",
                        before.imports.len() - context.imports.len(),
                        before.signatures.len() - context.signatures.len()
                    ),
                )
                .with_segment(first_new),
            );
        }

        let mut text = context.render();
        for &id in &chunk.ids {
            if let Some(segment) = input.segments.get(id) {
                text.push_str(segment.text(input.text));
            }
        }

        output.chunks.push(Chunk {
            id: output.chunks.len(),
            source_file: input.source_file.to_string(),
            segments: chunk.ids.clone(),
            overlap_segments: overlap,
            token_count: segment_tokens + context_cost,
            oversized: false,
            context,
            text,
        });
        chunk.ids
    }

    fn push_oversized(&self, segment: &Segment, input: &PackInput<'_>, output: &mut PackOutput) {
        log::warn!(
            "segment {} of {} has {} tokens, over the {} token budget; emitted alone",
            segment.id,
            input.source_file,
            segment.declared_tokens,
            self.config.max_chunk_tokens
        );
        output.diagnostics.push(
            Diagnostic::new(
                DiagnosticKind::OversizedSegment,
                format!(
                    "{} tokens exceed max_chunk_tokens {}",
                    segment.declared_tokens, self.config.max_chunk_tokens
                ),
            )
            .with_segment(segment.id)
            .with_range(segment.byte_range.clone()),
        );
        output.chunks.push(Chunk {
            id: output.chunks.len(),
            source_file: input.source_file.to_string(),
            segments: vec![segment.id],
            overlap_segments: Vec::new(),
            token_count: segment.declared_tokens,
            oversized: true,
            context: ChunkContext::default(),
            text: segment.text(input.text).to_string(),
        });
    }
}
