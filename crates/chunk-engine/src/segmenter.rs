//! Segmentation: tiles a file's structure into ordered, non-overlapping segments.
//!
//! Every byte of the file ends up in exactly one segment. Declarations
//! (functions, methods, classes) are cut at their node boundaries; whatever
//! lies between them becomes residual code. Whitespace belongs to the unit
//! that follows it, and a comment run directly above a declaration travels
//! with that declaration.

use crate::config::{ChunkStrategy, EngineConfig};
use crate::error::{EngineError, Result};
use crate::segment::{Segment, SegmentId, SegmentKind};
use crate::tokens::TokenCounter;
use crate::tree::{NodeId, NodeKind, SyntaxTree};
use std::ops::Range;
use tokio_util::sync::CancellationToken;

/// Tree position a segment was cut from, kept until context extraction is done
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SegmentOrigin {
    /// Declaration node for Function/Method/Class segments
    pub node: Option<NodeId>,
    /// Class whose body contains the segment
    pub scope: Option<NodeId>,
}

/// Ordered segments of one file plus their tree origins
#[derive(Debug, Clone, Default)]
pub struct Segmentation {
    pub segments: Vec<Segment>,
    origins: Vec<SegmentOrigin>,
}

impl Segmentation {
    #[must_use]
    pub fn origin(&self, id: SegmentId) -> Option<SegmentOrigin> {
        self.origins.get(id).copied()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.segments.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    pub fn into_segments(self) -> Vec<Segment> {
        self.segments
    }
}

/// Converts a syntax tree into segments
pub struct Segmenter<'a> {
    config: &'a EngineConfig,
    counter: &'a dyn TokenCounter,
}

impl<'a> Segmenter<'a> {
    pub fn new(config: &'a EngineConfig, counter: &'a dyn TokenCounter) -> Self {
        Self { config, counter }
    }

    /// Segment one file; cancellation is checked before every emitted segment
    pub fn segment(
        &self,
        tree: &SyntaxTree,
        text: &str,
        cancel: &CancellationToken,
    ) -> Result<Segmentation> {
        let mut pass = Pass {
            segmenter: self,
            tree,
            text,
            cancel,
            out: Segmentation::default(),
        };

        let roots = tree.roots().to_vec();
        let atoms = pass.layout(0..text.len(), &roots);
        pass.emit_units(atoms, None, None)?;

        log::debug!(
            "segmented {} bytes into {} segments ({:?} structure)",
            text.len(),
            pass.out.len(),
            tree.origin()
        );
        Ok(pass.out)
    }
}

/// Contiguous slice of a scope: a child node (plus the whitespace before it) or a gap
#[derive(Debug, Clone)]
struct Atom {
    range: Range<usize>,
    node: Option<(NodeId, NodeKind)>,
}

impl Atom {
    fn declaration(&self) -> Option<(NodeId, NodeKind)> {
        self.node.filter(|(_, kind)| kind.is_declaration())
    }

    fn is_comment(&self) -> bool {
        matches!(self.node, Some((_, NodeKind::Comment)))
    }
}

struct Pass<'s, 'a> {
    segmenter: &'s Segmenter<'a>,
    tree: &'s SyntaxTree,
    text: &'s str,
    cancel: &'s CancellationToken,
    out: Segmentation,
}

impl Pass<'_, '_> {
    fn slice(&self, range: Range<usize>) -> &str {
        self.text.get(range).unwrap_or("")
    }

    /// Tile `scope` with atoms for `children` and the gaps between them
    fn layout(&self, scope: Range<usize>, children: &[NodeId]) -> Vec<Atom> {
        let mut atoms: Vec<Atom> = Vec::with_capacity(children.len() * 2 + 1);
        let mut pending = scope.start;

        for &child in children {
            let Some(node) = self.tree.node(child) else {
                continue;
            };
            let start = node.byte_range.start.max(pending);
            let end = node.byte_range.end.min(scope.end);
            if end <= start {
                continue;
            }
            let atom_start = self.settle_gap(&mut atoms, pending, start);
            atoms.push(Atom {
                range: atom_start..end,
                node: Some((child, node.kind)),
            });
            pending = end;
        }

        if pending < scope.end {
            let gap = self.slice(pending..scope.end);
            let attach = gap.trim().is_empty() || is_separator(gap);
            match atoms.last_mut() {
                Some(last) if attach => last.range.end = scope.end,
                _ => atoms.push(Atom {
                    range: pending..scope.end,
                    node: None,
                }),
            }
        }

        self.absorb_leading_comments(atoms)
    }

    /// Assign the bytes in `pending..start`; returns where the next atom begins
    fn settle_gap(&self, atoms: &mut Vec<Atom>, pending: usize, start: usize) -> usize {
        if pending >= start {
            return start;
        }
        let gap = self.slice(pending..start);
        if gap.trim().is_empty() {
            return pending;
        }
        if let Some(last) = atoms.last_mut() {
            // `;` after a class body belongs to the class
            if is_separator(gap) {
                let split = pending + gap.trim_end().len();
                last.range.end = split;
                return split;
            }
        }
        atoms.push(Atom {
            range: pending..start,
            node: None,
        });
        start
    }

    fn absorb_leading_comments(&self, atoms: Vec<Atom>) -> Vec<Atom> {
        let mut out: Vec<Atom> = Vec::with_capacity(atoms.len());
        for mut atom in atoms {
            if let Some((id, _)) = atom.declaration() {
                let mut boundary = self
                    .tree
                    .node(id)
                    .map_or(atom.range.start, |n| n.byte_range.start);
                while let Some(prev) = out.last() {
                    if !prev.is_comment() {
                        break;
                    }
                    let between = self.slice(prev.range.end..boundary);
                    if between.matches('\n').count() > 1 {
                        break;
                    }
                    boundary = prev.range.start;
                    atom.range.start = prev.range.start;
                    out.pop();
                }
            }
            out.push(atom);
        }
        out
    }

    fn emit(
        &mut self,
        kind: SegmentKind,
        range: Range<usize>,
        name: Option<String>,
        parent_id: Option<SegmentId>,
        origin: SegmentOrigin,
    ) -> Result<SegmentId> {
        if self.cancel.is_cancelled() {
            return Err(EngineError::Cancelled);
        }
        let id = self.out.segments.len();
        let declared_tokens = self.segmenter.counter.count(self.slice(range.clone()));
        self.out.segments.push(Segment {
            id,
            kind,
            byte_range: range,
            name,
            declared_tokens,
            parent_id,
        });
        self.out.origins.push(origin);
        Ok(id)
    }

    fn emit_units(
        &mut self,
        atoms: Vec<Atom>,
        parent: Option<SegmentId>,
        scope: Option<NodeId>,
    ) -> Result<()> {
        let mut run: Vec<Range<usize>> = Vec::new();
        for atom in atoms {
            match atom.declaration() {
                Some((id, kind)) => {
                    self.emit_residual(std::mem::take(&mut run), parent, scope)?;
                    self.emit_declaration(id, kind, atom.range, parent, scope)?;
                }
                None => run.push(atom.range),
            }
        }
        self.emit_residual(run, parent, scope)
    }

    fn emit_declaration(
        &mut self,
        id: NodeId,
        kind: NodeKind,
        range: Range<usize>,
        parent: Option<SegmentId>,
        scope: Option<NodeId>,
    ) -> Result<()> {
        if kind == NodeKind::Class {
            return self.emit_class(id, range, parent, scope);
        }
        let segment_kind = if kind == NodeKind::Method || parent.is_some() {
            SegmentKind::Method
        } else {
            SegmentKind::Function
        };
        let name = self.tree.node(id).and_then(|n| n.name.clone());
        let origin = SegmentOrigin {
            node: Some(id),
            scope,
        };
        self.emit(segment_kind, range, name, parent, origin)?;
        Ok(())
    }

    /// Class header (plus leading fields) first, then members owned by it
    fn emit_class(
        &mut self,
        id: NodeId,
        range: Range<usize>,
        parent: Option<SegmentId>,
        scope: Option<NodeId>,
    ) -> Result<()> {
        let (name, children) = match self.tree.node(id) {
            Some(node) => (node.name.clone(), node.children.clone()),
            None => (None, Vec::new()),
        };
        let origin = SegmentOrigin {
            node: Some(id),
            scope,
        };

        let has_members = children
            .iter()
            .any(|&c| self.tree.node(c).is_some_and(|n| n.kind.is_declaration()));
        let atoms = if has_members {
            self.layout(range.clone(), &children)
        } else {
            Vec::new()
        };
        let header_len = atoms
            .iter()
            .take_while(|atom| atom.declaration().is_none())
            .count();
        if header_len == 0 {
            self.emit(SegmentKind::Class, range, name, parent, origin)?;
            return Ok(());
        }

        let header_end = atoms[header_len - 1].range.end;
        let class_id = self.emit(SegmentKind::Class, range.start..header_end, name, parent, origin)?;
        self.emit_units(atoms.into_iter().skip(header_len).collect(), Some(class_id), Some(id))
    }

    fn emit_residual(
        &mut self,
        run: Vec<Range<usize>>,
        parent: Option<SegmentId>,
        scope: Option<NodeId>,
    ) -> Result<()> {
        let kind = if parent.is_some() {
            SegmentKind::StatementBlock
        } else {
            SegmentKind::ModuleLevel
        };
        let origin = SegmentOrigin { node: None, scope };

        match self.segmenter.config.chunk_strategy {
            ChunkStrategy::StatementLevel => {
                for range in run {
                    self.emit(kind, range, None, parent, origin)?;
                }
            }
            ChunkStrategy::FunctionLevel => {
                let budget = self.segmenter.config.max_chunk_tokens;
                let mut group: Option<Range<usize>> = None;
                for range in run {
                    group = match group {
                        None => Some(range),
                        Some(current) => {
                            let merged = current.start..range.end;
                            if self.segmenter.counter.count(self.slice(merged.clone())) <= budget {
                                Some(merged)
                            } else {
                                self.emit(kind, current, None, parent, origin)?;
                                Some(range)
                            }
                        }
                    };
                }
                if let Some(range) = group {
                    self.emit(kind, range, None, parent, origin)?;
                }
            }
        }
        Ok(())
    }
}

fn is_separator(gap: &str) -> bool {
    let trimmed = gap.trim();
    !trimmed.is_empty() && trimmed.chars().all(|c| c == ';' || c == ',')
}
