use serde::{Deserialize, Serialize};
use std::ops::Range;

/// Index of a node in a [`SyntaxTree`] arena
pub type NodeId = usize;

/// Normalized node vocabulary shared by all grammars and the heuristic path
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeKind {
    Function,
    Method,
    Class,
    Statement,
    Import,
    Comment,
    Other,
}

impl NodeKind {
    /// Kinds that become their own segment
    #[must_use]
    pub const fn is_declaration(self) -> bool {
        matches!(self, Self::Function | Self::Method | Self::Class)
    }

    /// Kinds whose header provides an enclosing signature
    #[must_use]
    pub const fn is_scope(self) -> bool {
        matches!(self, Self::Function | Self::Method | Self::Class)
    }
}

/// Which strategy produced a tree
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StructureOrigin {
    /// Built from a tree-sitter grammar
    Precise,
    /// Built from line and regex heuristics
    Approximate,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyntaxNode {
    pub kind: NodeKind,
    pub byte_range: Range<usize>,
    pub name: Option<String>,
    /// Byte offset where the body starts; the text before it is the declaration header
    pub header_end: Option<usize>,
    /// Names in the inheritance clause of a class
    pub bases: Vec<String>,
    pub children: Vec<NodeId>,
}

impl SyntaxNode {
    pub fn new(kind: NodeKind, byte_range: Range<usize>) -> Self {
        Self {
            kind,
            byte_range,
            name: None,
            header_end: None,
            bases: Vec::new(),
            children: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_name(mut self, name: Option<String>) -> Self {
        self.name = name;
        self
    }

    #[must_use]
    pub const fn with_header_end(mut self, header_end: Option<usize>) -> Self {
        self.header_end = header_end;
        self
    }

    #[must_use]
    pub fn with_bases(mut self, bases: Vec<String>) -> Self {
        self.bases = bases;
        self
    }
}

/// Arena of normalized nodes with a parent index map
#[derive(Debug, Clone)]
pub struct SyntaxTree {
    nodes: Vec<SyntaxNode>,
    roots: Vec<NodeId>,
    parents: Vec<Option<NodeId>>,
    origin: StructureOrigin,
}

impl SyntaxTree {
    #[must_use]
    pub const fn origin(&self) -> StructureOrigin {
        self.origin
    }

    /// Top-level nodes in byte order
    #[must_use]
    pub fn roots(&self) -> &[NodeId] {
        &self.roots
    }

    #[must_use]
    pub fn node(&self, id: NodeId) -> Option<&SyntaxNode> {
        self.nodes.get(id)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn nodes(&self) -> impl Iterator<Item = (NodeId, &SyntaxNode)> {
        self.nodes.iter().enumerate()
    }

    #[must_use]
    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.parents.get(id).copied().flatten()
    }

    /// Ancestors from the direct parent up to a root
    pub fn ancestors(&self, id: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        let mut current = self.parent(id);
        let mut steps = 0usize;
        std::iter::from_fn(move || {
            // a corrupt parent map must not loop forever
            if steps > self.nodes.len() {
                return None;
            }
            steps += 1;
            let id = current?;
            current = self.parent(id);
            Some(id)
        })
    }

    /// Nearest Class/Function/Method ancestor
    #[must_use]
    pub fn enclosing_scope(&self, id: NodeId) -> Option<NodeId> {
        self.ancestors(id)
            .find(|&ancestor| self.nodes.get(ancestor).is_some_and(|n| n.kind.is_scope()))
    }

    /// True when no Class/Function/Method encloses the node
    #[must_use]
    pub fn is_file_scope(&self, id: NodeId) -> bool {
        self.enclosing_scope(id).is_none()
    }
}

/// Incremental arena construction; parents are recorded as children are attached
#[derive(Debug)]
pub struct TreeBuilderArena {
    nodes: Vec<SyntaxNode>,
    roots: Vec<NodeId>,
    parents: Vec<Option<NodeId>>,
}

impl TreeBuilderArena {
    #[must_use]
    pub fn new() -> Self {
        Self {
            nodes: Vec::new(),
            roots: Vec::new(),
            parents: Vec::new(),
        }
    }

    /// Add a node under `parent` (or as a root) and return its id
    pub fn push(&mut self, node: SyntaxNode, parent: Option<NodeId>) -> NodeId {
        let id = self.nodes.len();
        self.nodes.push(node);
        self.parents.push(parent);
        match parent.and_then(|p| self.nodes.get_mut(p)) {
            Some(parent_node) => parent_node.children.push(id),
            None => self.roots.push(id),
        }
        id
    }

    /// Sort children by start offset and freeze
    #[must_use]
    pub fn finish(mut self, origin: StructureOrigin) -> SyntaxTree {
        let starts: Vec<usize> = self.nodes.iter().map(|n| n.byte_range.start).collect();
        for node in &mut self.nodes {
            node.children.sort_by_key(|&c| (starts[c], c));
        }
        self.roots.sort_by_key(|&r| (starts[r], r));
        SyntaxTree {
            nodes: self.nodes,
            roots: self.roots,
            parents: self.parents,
            origin,
        }
    }
}

impl Default for TreeBuilderArena {
    fn default() -> Self {
        Self::new()
    }
}
