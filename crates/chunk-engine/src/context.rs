//! Context bundles: what a segment needs to be read without the rest of its file.

use crate::error::{Diagnostic, DiagnosticKind};
use crate::language::Language;
use crate::segment::{Segment, SegmentId};
use crate::segmenter::{SegmentOrigin, Segmentation};
use crate::tree::{NodeId, NodeKind, SyntaxTree};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use unicode_segmentation::UnicodeSegmentation;

/// Context attached to one segment
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContextBundle {
    pub segment: SegmentId,

    /// File-scope import statements, shared by every segment of the file
    pub imports: Vec<String>,

    /// Declaration line of the enclosing class or function
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enclosing_signature: Option<String>,

    /// Names used here and defined by another segment of the file
    pub referenced_symbols: BTreeMap<String, SegmentId>,

    /// Subset of `referenced_symbols` used in call position
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub called_symbols: BTreeSet<String>,

    /// Inheritance clause of a class segment
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub base_names: Vec<String>,
}

/// Per-file facts computed once and shared by every extraction
#[derive(Debug, Clone)]
pub struct FileContext {
    language: Language,
    imports: Vec<String>,
    definitions: HashMap<String, Vec<SegmentId>>,
}

impl FileContext {
    /// Collect file-scope imports and the names defined by declaration segments
    pub fn new(
        language: Language,
        tree: &SyntaxTree,
        text: &str,
        segments: &[Segment],
        max_imports: usize,
    ) -> Self {
        let mut import_nodes: Vec<_> = tree
            .nodes()
            .filter(|(id, node)| node.kind == NodeKind::Import && tree.is_file_scope(*id))
            .map(|(_, node)| node.byte_range.clone())
            .collect();
        import_nodes.sort_by_key(|range| range.start);

        let mut imports: Vec<String> = Vec::new();
        for range in import_nodes {
            let statement = text.get(range).unwrap_or("").trim();
            if statement.is_empty() || imports.iter().any(|seen| seen == statement) {
                continue;
            }
            if imports.len() == max_imports {
                log::debug!("import list capped at {max_imports} entries");
                break;
            }
            imports.push(statement.to_string());
        }

        let mut definitions: HashMap<String, Vec<SegmentId>> = HashMap::new();
        for segment in segments.iter().filter(|s| s.kind.is_declaration()) {
            if let Some(name) = &segment.name {
                definitions.entry(name.clone()).or_default().push(segment.id);
            }
        }

        Self {
            language,
            imports,
            definitions,
        }
    }

    #[must_use]
    pub fn imports(&self) -> &[String] {
        &self.imports
    }

    /// Segment defining `name`, other than `user`
    ///
    /// Definitions sharing the user's parent win; otherwise the lowest id.
    fn resolve(&self, name: &str, user: &Segment, segments: &[Segment]) -> Option<SegmentId> {
        let candidates = self.definitions.get(name)?;
        let others = candidates.iter().copied().filter(|&id| id != user.id);
        let sibling = others
            .clone()
            .find(|&id| segments.get(id).is_some_and(|s| s.parent_id == user.parent_id));
        sibling.or_else(|| others.min())
    }
}

/// Output of extracting every segment of a file
#[derive(Debug, Clone, Default)]
pub struct ContextOutput {
    pub bundles: Vec<ContextBundle>,
    pub diagnostics: Vec<Diagnostic>,
}

/// Builds context bundles while the tree is still alive
pub struct ContextExtractor<'a> {
    tree: &'a SyntaxTree,
    text: &'a str,
    file: FileContext,
}

impl<'a> ContextExtractor<'a> {
    pub fn new(tree: &'a SyntaxTree, text: &'a str, file: FileContext) -> Self {
        Self { tree, text, file }
    }

    /// Bundles for all segments, in segment order
    pub fn extract_all(&self, segmentation: &Segmentation) -> ContextOutput {
        let mut output = ContextOutput::default();
        for segment in &segmentation.segments {
            let origin = segmentation.origin(segment.id).unwrap_or_default();
            let (bundle, gap) = self.extract(segment, origin, &segmentation.segments);
            output.bundles.push(bundle);
            output.diagnostics.extend(gap);
        }
        output
    }

    /// Bundle for one segment; a failed ancestor lookup leaves the signature absent
    pub fn extract(
        &self,
        segment: &Segment,
        origin: SegmentOrigin,
        segments: &[Segment],
    ) -> (ContextBundle, Option<Diagnostic>) {
        let mut bundle = ContextBundle {
            segment: segment.id,
            imports: self.file.imports.clone(),
            ..ContextBundle::default()
        };

        let mut gap = None;
        let scope = match origin.node {
            Some(node) => self.tree.enclosing_scope(node),
            None => origin.scope,
        };
        match scope.and_then(|id| self.signature(id)) {
            Some(signature) => bundle.enclosing_signature = Some(signature),
            None if segment.parent_id.is_some() => {
                log::debug!("no enclosing signature for segment {}", segment.id);
                gap = Some(
                    Diagnostic::new(
                        DiagnosticKind::ContextResolutionGap,
                        "enclosing declaration could not be resolved",
                    )
                    .with_segment(segment.id)
                    .with_range(segment.byte_range.clone()),
                );
            }
            None => {}
        }

        if segment.kind == crate::segment::SegmentKind::Class {
            if let Some(node) = origin.node.and_then(|id| self.tree.node(id)) {
                bundle.base_names = node.bases.clone();
            }
        }

        for (name, called) in identifiers(segment.text(self.text)) {
            if let Some(target) = self.file.resolve(&name, segment, segments) {
                if called {
                    bundle.called_symbols.insert(name.clone());
                }
                bundle.referenced_symbols.entry(name).or_insert(target);
            }
        }

        (bundle, gap)
    }

    /// Header of a declaration collapsed to one line, without decorators or comments
    fn signature(&self, id: NodeId) -> Option<String> {
        let node = self.tree.node(id)?;
        let start = node.byte_range.start;
        let header = match node.header_end {
            Some(end) if end > start => self.text.get(start..end)?,
            _ => {
                let full = self.text.get(node.byte_range.clone())?;
                full.lines().find(|line| {
                    let trimmed = line.trim();
                    !trimmed.is_empty()
                        && !self.file.language.is_annotation_line(trimmed)
                        && !self.file.language.is_comment_line(trimmed)
                })?
            }
        };

        let language = self.file.language;
        let joined = header
            .lines()
            .map(str::trim)
            .filter(|line| {
                !line.is_empty() && !language.is_annotation_line(line) && !language.is_comment_line(line)
            })
            .collect::<Vec<_>>()
            .join(" ");
        let collapsed = joined.split_whitespace().collect::<Vec<_>>().join(" ");
        let signature = collapsed.trim_end_matches('{').trim_end().to_string();
        (!signature.is_empty()).then_some(signature)
    }
}

/// Identifiers in `text`, each flagged when it is directly followed by `(`
fn identifiers(text: &str) -> Vec<(String, bool)> {
    let mut found = Vec::new();
    for (offset, word) in text.split_word_bound_indices() {
        // word boundaries keep `self.run` and `a::b` together
        let mut part_offset = offset;
        for part in word.split(['.', ':', '\'']) {
            let end = part_offset + part.len();
            if is_identifier(part) {
                let called = text[end..].trim_start().starts_with('(');
                found.push((part.to_string(), called));
            }
            part_offset = end + 1;
        }
    }
    found
}

fn is_identifier(word: &str) -> bool {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) if first.is_alphabetic() || first == '_' => {
            chars.all(|c| c.is_alphanumeric() || c == '_')
        }
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::TreeBuilder;
    use crate::config::EngineConfig;
    use crate::grammar::GrammarRegistry;
    use crate::segmenter::Segmenter;
    use crate::tokens::HeuristicCounter;
    use pretty_assertions::assert_eq;
    use tokio_util::sync::CancellationToken;

    fn extract(language: Language, code: &str) -> (Segmentation, ContextOutput) {
        let config = EngineConfig::default();
        let resolution = GrammarRegistry::global().resolve(language);
        let built = TreeBuilder::build(code, language, &resolution);
        let segmentation = Segmenter::new(&config, &HeuristicCounter)
            .segment(&built.tree, code, &CancellationToken::new())
            .unwrap();
        let file = FileContext::new(language, &built.tree, code, &segmentation.segments, 32);
        let output = ContextExtractor::new(&built.tree, code, file).extract_all(&segmentation);
        (segmentation, output)
    }

    const CODE: &str = r#"import os
from typing import List

def helper(x):
    return x

@dataclass
class Service(Base):
    def run(self):
        return helper(self.name)

    def stop(self):
        self.run()
"#;

    #[test]
    fn imports_are_shared_by_every_bundle() {
        let (_, output) = extract(Language::Python, CODE);
        for bundle in &output.bundles {
            assert_eq!(
                bundle.imports,
                vec!["import os".to_string(), "from typing import List".to_string()]
            );
        }
    }

    #[test]
    fn methods_get_class_signature_without_decorators() {
        let (segmentation, output) = extract(Language::Python, CODE);
        let run = segmentation
            .segments
            .iter()
            .position(|s| s.name.as_deref() == Some("run"))
            .unwrap();
        assert_eq!(
            output.bundles[run].enclosing_signature.as_deref(),
            Some("class Service(Base):")
        );
        assert_eq!(output.bundles[0].enclosing_signature, None);
        assert!(output.diagnostics.is_empty());
    }

    #[test]
    fn referenced_symbols_resolve_to_defining_segments() {
        let (segmentation, output) = extract(Language::Python, CODE);
        let id_of = |name: &str| {
            segmentation
                .segments
                .iter()
                .position(|s| s.name.as_deref() == Some(name))
                .unwrap()
        };
        let run = &output.bundles[id_of("run")];
        assert_eq!(run.referenced_symbols.get("helper"), Some(&id_of("helper")));
        assert!(run.called_symbols.contains("helper"));
        // a segment never references itself
        assert!(!run.referenced_symbols.contains_key("run"));

        let stop = &output.bundles[id_of("stop")];
        assert_eq!(stop.referenced_symbols.get("run"), Some(&id_of("run")));

        let class = &output.bundles[id_of("Service")];
        assert_eq!(class.base_names, vec!["Base".to_string()]);
    }

    #[test]
    fn import_cap_is_respected() {
        let code = "import a\nimport b\nimport c\n";
        let resolution = GrammarRegistry::global().resolve(Language::Python);
        let built = TreeBuilder::build(code, Language::Python, &resolution);
        let file = FileContext::new(Language::Python, &built.tree, code, &[], 2);
        assert_eq!(file.imports(), &["import a".to_string(), "import b".to_string()]);
    }

    #[test]
    fn unresolvable_enclosing_header_is_a_gap() {
        use crate::segment::SegmentKind;
        use crate::tree::{StructureOrigin, SyntaxNode, TreeBuilderArena};

        // the class header holds only a comment and a decorator
        let code = "# c\n@deco\n    def m(self):\n        pass\n";
        let mut arena = TreeBuilderArena::new();
        let class = arena.push(
            SyntaxNode::new(NodeKind::Class, 0..code.len()).with_header_end(Some(10)),
            None,
        );
        let method = arena.push(
            SyntaxNode::new(NodeKind::Method, 10..code.len()).with_name(Some("m".into())),
            Some(class),
        );
        let tree = arena.finish(StructureOrigin::Approximate);

        let segments = vec![
            Segment {
                id: 0,
                kind: SegmentKind::Class,
                byte_range: 0..10,
                name: None,
                declared_tokens: 2,
                parent_id: None,
            },
            Segment {
                id: 1,
                kind: SegmentKind::Method,
                byte_range: 10..code.len(),
                name: Some("m".into()),
                declared_tokens: 8,
                parent_id: Some(0),
            },
        ];
        let file = FileContext::new(Language::Python, &tree, code, &segments, 32);
        let extractor = ContextExtractor::new(&tree, code, file);
        let origin = SegmentOrigin {
            node: Some(method),
            scope: Some(class),
        };

        let (bundle, gap) = extractor.extract(&segments[1], origin, &segments);
        assert_eq!(bundle.enclosing_signature, None);
        let gap = gap.unwrap();
        assert_eq!(gap.kind, DiagnosticKind::ContextResolutionGap);
        assert_eq!(gap.segment, Some(1));
        assert_eq!(gap.byte_range, Some(10..code.len()));

        // a top-level segment without a signature is not a gap
        let (_, gap) = extractor.extract(&segments[0], SegmentOrigin::default(), &segments);
        assert!(gap.is_none());
    }

    #[test]
    fn identifier_scan_splits_member_access() {
        let names: Vec<_> = identifiers("self.run(1) + a::b").into_iter().collect();
        assert!(names.contains(&("self".to_string(), false)));
        assert!(names.contains(&("run".to_string(), true)));
        assert!(names.contains(&("b".to_string(), false)));
        assert!(!names.iter().any(|(n, _)| n == "1"));
    }
}
