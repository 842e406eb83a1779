use crate::error::{Diagnostic, DiagnosticKind, EngineError, Result};
use crate::grammar::{Grammar, GrammarProfile, Resolution};
use crate::heuristic::HeuristicStrategy;
use crate::language::Language;
use crate::tree::{NodeId, NodeKind, StructureOrigin, SyntaxNode, SyntaxTree, TreeBuilderArena};
use std::sync::Arc;
use tree_sitter::Node;

/// Reported parse-error regions per file before they are summarized
const MAX_REPORTED_ERROR_REGIONS: usize = 64;

/// Tree plus the problems recovered while building it
#[derive(Debug, Clone)]
pub struct BuildOutput {
    pub tree: SyntaxTree,
    pub diagnostics: Vec<Diagnostic>,
}

/// Produces the ordered, byte-addressable structure the segmenter consumes
pub trait StructureStrategy {
    fn build(&self, text: &str) -> Result<BuildOutput>;
}

/// Chooses the grammar-backed strategy when possible, the heuristic one otherwise
pub struct TreeBuilder;

impl TreeBuilder {
    pub fn build(text: &str, language: Language, resolution: &Resolution) -> BuildOutput {
        let mut diagnostics = Vec::new();

        match resolution {
            Resolution::Available(grammar) => {
                match TreeSitterStrategy::new(grammar.clone()).build(text) {
                    Ok(output) => return output,
                    Err(e) => {
                        log::warn!("tree-sitter parse failed for {language}, using heuristics: {e}");
                        diagnostics.push(Diagnostic::new(
                            DiagnosticKind::GrammarUnavailable,
                            format!("parser failed: {e}"),
                        ));
                    }
                }
            }
            Resolution::Unavailable { reason, .. } => {
                log::debug!("grammar unavailable for {language}: {reason}");
                diagnostics.push(Diagnostic::new(
                    DiagnosticKind::GrammarUnavailable,
                    format!("{reason}; structure approximated"),
                ));
            }
        }

        let mut output = HeuristicStrategy::new(language).build_structure(text);
        diagnostics.append(&mut output.diagnostics);
        output.diagnostics = diagnostics;
        output
    }
}

/// Grammar-backed structure
pub struct TreeSitterStrategy {
    grammar: Arc<Grammar>,
}

impl TreeSitterStrategy {
    pub fn new(grammar: Arc<Grammar>) -> Self {
        Self { grammar }
    }
}

impl StructureStrategy for TreeSitterStrategy {
    fn build(&self, text: &str) -> Result<BuildOutput> {
        let mut parser = self.grammar.parser()?;
        let tree = parser
            .parse(text, None)
            .ok_or_else(|| EngineError::tree_sitter("parser returned no tree"))?;
        let root = tree.root_node();

        let mut converter = Converter {
            text,
            profile: self.grammar.profile(),
            arena: TreeBuilderArena::new(),
        };
        converter.convert_scope(root, None, false);

        let diagnostics = if root.has_error() {
            collect_error_regions(root)
        } else {
            Vec::new()
        };
        if !diagnostics.is_empty() {
            log::warn!(
                "{} malformed region(s) while parsing {}",
                diagnostics.len(),
                self.grammar.language()
            );
        }

        Ok(BuildOutput {
            tree: converter.arena.finish(StructureOrigin::Precise),
            diagnostics,
        })
    }
}

struct Converter<'a> {
    text: &'a str,
    profile: &'static GrammarProfile,
    arena: TreeBuilderArena,
}

impl Converter<'_> {
    fn convert_scope(&mut self, container: Node, parent: Option<NodeId>, in_class: bool) {
        let mut cursor = container.walk();
        let children: Vec<_> = container.named_children(&mut cursor).collect();
        for child in children {
            self.convert_item(child, child, parent, in_class);
        }
    }

    /// Convert one node; `outer` is the outermost wrapper and defines the byte range
    fn convert_item(&mut self, node: Node, outer: Node, parent: Option<NodeId>, in_class: bool) {
        let kind = node.kind();
        let range = outer.start_byte()..outer.end_byte();

        if node.is_error() {
            if self.contains_declaration(node) {
                // keep whatever parsed cleanly inside the broken region
                self.convert_scope(node, parent, in_class);
            } else {
                self.arena.push(SyntaxNode::new(NodeKind::Other, range), parent);
            }
            return;
        }

        if self.profile.is_wrapper(kind) {
            match self.wrapped_declaration(node) {
                Some(inner) => self.convert_item(inner, outer, parent, in_class),
                None => {
                    self.arena.push(SyntaxNode::new(NodeKind::Statement, range), parent);
                }
            }
            return;
        }

        if self.profile.is_container(kind) {
            match node.child_by_field_name("body") {
                Some(body) => self.convert_scope(body, parent, in_class),
                None => self.convert_unnamed_members(node, parent, in_class),
            }
            return;
        }

        if in_class && self.profile.is_class_body(kind) {
            self.convert_scope(node, parent, true);
            return;
        }

        if self.profile.is_class(kind) {
            let Some(body) = node.child_by_field_name("body") else {
                // forward declaration
                self.arena.push(SyntaxNode::new(NodeKind::Statement, range), parent);
                return;
            };
            let class = SyntaxNode::new(NodeKind::Class, range)
                .with_name(self.declaration_name(node))
                .with_header_end(Some(body.start_byte()))
                .with_bases(self.base_names(node));
            let id = self.arena.push(class, parent);
            self.convert_scope(body, Some(id), true);
            return;
        }

        let is_method = in_class && self.profile.is_method(kind);
        if is_method || self.profile.is_function(kind) {
            let node_kind = if is_method {
                NodeKind::Method
            } else {
                NodeKind::Function
            };
            let header_end = node.child_by_field_name("body").map(|b| b.start_byte());
            let function = SyntaxNode::new(node_kind, range)
                .with_name(self.declaration_name(node))
                .with_header_end(header_end);
            self.arena.push(function, parent);
            return;
        }

        if self.profile.is_binding(kind) {
            if let Some((name, header_end)) = self.bound_function(node) {
                let function = SyntaxNode::new(NodeKind::Function, range)
                    .with_name(Some(name))
                    .with_header_end(header_end);
                self.arena.push(function, parent);
                return;
            }
        }

        let node_kind = if self.profile.is_import(kind) {
            NodeKind::Import
        } else if self.profile.is_comment(kind) {
            NodeKind::Comment
        } else {
            NodeKind::Statement
        };
        self.arena.push(SyntaxNode::new(node_kind, range), parent);
    }

    fn convert_unnamed_members(&mut self, node: Node, parent: Option<NodeId>, in_class: bool) {
        let name_id = node.child_by_field_name("name").map(|n| n.id());
        let mut cursor = node.walk();
        let members: Vec<_> = node
            .named_children(&mut cursor)
            .filter(|child| Some(child.id()) != name_id)
            .collect();
        for member in members {
            self.convert_item(member, member, parent, in_class);
        }
    }

    fn contains_declaration(&self, node: Node) -> bool {
        let mut cursor = node.walk();
        let found = node.named_children(&mut cursor).any(|child| {
            let kind = child.kind();
            self.profile.is_function(kind)
                || self.profile.is_class(kind)
                || self.profile.is_wrapper(kind)
        });
        found
    }

    fn wrapped_declaration<'t>(&self, node: Node<'t>) -> Option<Node<'t>> {
        if let Some(inner) = node
            .child_by_field_name("definition")
            .or_else(|| node.child_by_field_name("declaration"))
        {
            return Some(inner);
        }

        let mut cursor = node.walk();
        let inner = node.named_children(&mut cursor).find(|child| {
            let kind = child.kind();
            self.profile.is_function(kind)
                || self.profile.is_class(kind)
                || self.profile.is_method(kind)
                || self.profile.is_wrapper(kind)
        });
        inner
    }

    /// `const name = (..) => ..` style bindings with a single declarator
    fn bound_function(&self, node: Node) -> Option<(String, Option<usize>)> {
        let mut cursor = node.walk();
        let declarators: Vec<_> = node
            .named_children(&mut cursor)
            .filter(|child| child.kind() == "variable_declarator")
            .collect();
        let [declarator] = declarators.as_slice() else {
            return None;
        };

        let value = declarator.child_by_field_name("value")?;
        if !matches!(
            value.kind(),
            "arrow_function" | "function_expression" | "function" | "generator_function"
        ) {
            return None;
        }

        let name = self.node_text(declarator.child_by_field_name("name")?);
        let header_end = value.child_by_field_name("body").map(|b| b.start_byte());
        Some((name.to_string(), header_end))
    }

    fn declaration_name(&self, node: Node) -> Option<String> {
        if let Some(name) = node.child_by_field_name("name") {
            return Some(last_path_segment(self.node_text(name)));
        }

        // C/C++ nest the name inside declarator chains
        let mut current = node.child_by_field_name("declarator");
        while let Some(declarator) = current {
            match declarator.kind() {
                "identifier" | "field_identifier" | "qualified_identifier" | "destructor_name"
                | "operator_name" | "type_identifier" => {
                    return Some(last_path_segment(self.node_text(declarator)));
                }
                _ => current = declarator.child_by_field_name("declarator"),
            }
        }
        None
    }

    fn base_names(&self, class: Node) -> Vec<String> {
        let mut clauses = Vec::new();
        if let Some(superclasses) = class.child_by_field_name("superclasses") {
            clauses.push(superclasses);
        }
        let mut cursor = class.walk();
        clauses.extend(
            class
                .named_children(&mut cursor)
                .filter(|child| self.profile.is_base_clause(child.kind())),
        );

        let mut bases: Vec<String> = Vec::new();
        for clause in clauses {
            for token in self.node_text(clause).split(|c: char| {
                !(c.is_alphanumeric() || c == '_' || c == '.' || c == ':')
            }) {
                let token = token.trim_matches(|c| c == ':' || c == '.');
                if token.is_empty() || is_clause_keyword(token) {
                    continue;
                }
                let name = last_path_segment(token);
                if !bases.contains(&name) {
                    bases.push(name);
                }
            }
        }
        bases
    }

    fn node_text(&self, node: Node) -> &str {
        self.text.get(node.start_byte()..node.end_byte()).unwrap_or("")
    }
}

fn is_clause_keyword(token: &str) -> bool {
    matches!(
        token,
        "extends" | "implements" | "public" | "private" | "protected" | "virtual" | "metaclass"
    )
}

fn last_path_segment(path: &str) -> String {
    path.rsplit(|c| c == '.' || c == ':')
        .find(|s| !s.is_empty())
        .unwrap_or(path)
        .trim()
        .to_string()
}

fn collect_error_regions(root: Node) -> Vec<Diagnostic> {
    let mut diagnostics = Vec::new();
    let mut omitted = 0usize;
    let mut stack = vec![root];

    while let Some(node) = stack.pop() {
        if node.is_error() || node.is_missing() {
            if diagnostics.len() < MAX_REPORTED_ERROR_REGIONS {
                let what = if node.is_missing() {
                    format!("missing `{}`", node.kind())
                } else {
                    "unparseable region".to_string()
                };
                let pos = node.start_position();
                diagnostics.push(
                    Diagnostic::new(
                        DiagnosticKind::ParseRegionError,
                        format!("{what} at {}:{}", pos.row + 1, pos.column + 1),
                    )
                    .with_range(node.start_byte()..node.end_byte()),
                );
            } else {
                omitted += 1;
            }
            continue;
        }
        if !node.has_error() {
            continue;
        }
        let mut cursor = node.walk();
        let children: Vec<_> = node.children(&mut cursor).collect();
        stack.extend(children.into_iter().rev());
    }

    if omitted > 0 {
        diagnostics.push(Diagnostic::new(
            DiagnosticKind::ParseRegionError,
            format!("{omitted} further malformed region(s) not listed"),
        ));
    }
    diagnostics.sort_by_key(|d| d.byte_range.as_ref().map_or(usize::MAX, |r| r.start));
    diagnostics
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grammar::GrammarRegistry;

    fn build(language: Language, code: &str) -> BuildOutput {
        let resolution = GrammarRegistry::global().resolve(language);
        TreeBuilder::build(code, language, &resolution)
    }

    fn kinds_and_names(tree: &SyntaxTree) -> Vec<(NodeKind, Option<String>)> {
        tree.nodes()
            .filter(|(_, n)| n.kind.is_declaration())
            .map(|(_, n)| (n.kind, n.name.clone()))
            .collect()
    }

    #[test]
    fn python_classes_functions_and_methods() {
        let code = r#"import os

def foo(x):
    return x + 1

@decorated
class Bar(Base):
    def method(self):
        pass
"#;
        let output = build(Language::Python, code);
        assert!(output.diagnostics.is_empty());
        let tree = &output.tree;
        assert_eq!(tree.origin(), StructureOrigin::Precise);
        assert_eq!(
            kinds_and_names(tree),
            vec![
                (NodeKind::Function, Some("foo".to_string())),
                (NodeKind::Class, Some("Bar".to_string())),
                (NodeKind::Method, Some("method".to_string())),
            ]
        );

        let class_id = tree
            .nodes()
            .find(|(_, n)| n.kind == NodeKind::Class)
            .map(|(id, _)| id)
            .unwrap();
        let class = tree.node(class_id).unwrap();
        assert!(code[class.byte_range.clone()].starts_with("@decorated"));
        assert_eq!(class.bases, vec!["Base".to_string()]);
        let header = &code[class.byte_range.start..class.header_end.unwrap()];
        assert!(header.trim_end().ends_with("class Bar(Base):"));

        let first_root = tree.node(tree.roots()[0]).unwrap();
        assert_eq!(first_root.kind, NodeKind::Import);
    }

    #[test]
    fn javascript_exports_and_arrow_functions() {
        let code = r#"import { a } from "a";
export function foo() { return a(); }
const bar = (x) => x * 2;
class Widget extends Base {
  render() { return bar(1); }
}
"#;
        let output = build(Language::JavaScript, code);
        assert_eq!(
            kinds_and_names(&output.tree),
            vec![
                (NodeKind::Function, Some("foo".to_string())),
                (NodeKind::Function, Some("bar".to_string())),
                (NodeKind::Class, Some("Widget".to_string())),
                (NodeKind::Method, Some("render".to_string())),
            ]
        );
        let foo = output
            .tree
            .nodes()
            .find(|(_, n)| n.name.as_deref() == Some("foo"))
            .map(|(_, n)| n.byte_range.clone())
            .unwrap();
        assert!(code[foo].starts_with("export function"));
    }

    #[test]
    fn java_methods_inside_classes() {
        let code = r#"package demo;

import java.util.List;

public class Greeter extends Base {
    private String name;

    public Greeter(String name) { this.name = name; }

    public String greet() { return "hi " + name; }
}
"#;
        let output = build(Language::Java, code);
        assert_eq!(
            kinds_and_names(&output.tree),
            vec![
                (NodeKind::Class, Some("Greeter".to_string())),
                (NodeKind::Method, Some("Greeter".to_string())),
                (NodeKind::Method, Some("greet".to_string())),
            ]
        );
        let imports = output
            .tree
            .nodes()
            .filter(|(_, n)| n.kind == NodeKind::Import)
            .count();
        assert_eq!(imports, 2);
    }

    #[test]
    fn cpp_namespaces_are_transparent() {
        let code = r#"#include <string>

namespace app {
int add(int a, int b) { return a + b; }

class Counter {
public:
    void bump() { value++; }
private:
    int value;
};
}
"#;
        let output = build(Language::Cpp, code);
        assert_eq!(
            kinds_and_names(&output.tree),
            vec![
                (NodeKind::Function, Some("add".to_string())),
                (NodeKind::Class, Some("Counter".to_string())),
                (NodeKind::Method, Some("bump".to_string())),
            ]
        );
        let add = output
            .tree
            .nodes()
            .find(|(_, n)| n.name.as_deref() == Some("add"))
            .map(|(id, _)| id)
            .unwrap();
        assert!(output.tree.is_file_scope(add));
    }

    #[test]
    fn csharp_namespace_and_class() {
        let code = r#"using System;

namespace Demo
{
    public class Account : Entity
    {
        public void Deposit(int amount) { Balance += amount; }
    }
}
"#;
        let output = build(Language::CSharp, code);
        assert_eq!(
            kinds_and_names(&output.tree),
            vec![
                (NodeKind::Class, Some("Account".to_string())),
                (NodeKind::Method, Some("Deposit".to_string())),
            ]
        );
        let class = output
            .tree
            .nodes()
            .find(|(_, n)| n.kind == NodeKind::Class)
            .map(|(_, n)| n.bases.clone())
            .unwrap();
        assert_eq!(class, vec!["Entity".to_string()]);
    }

    #[test]
    fn malformed_region_is_reported_and_rest_survives() {
        let code = "def good():\n    return 1\n\ndef broken(:\n    ???\n\ndef also_good():\n    return 2\n";
        let output = build(Language::Python, code);
        assert!(output
            .diagnostics
            .iter()
            .any(|d| d.kind == DiagnosticKind::ParseRegionError && d.byte_range.is_some()));
        let names: Vec<_> = output
            .tree
            .nodes()
            .filter_map(|(_, n)| n.name.clone())
            .collect();
        assert!(names.contains(&"good".to_string()));
        assert!(names.contains(&"also_good".to_string()));
    }

    #[test]
    fn unavailable_grammar_falls_back() {
        let output = build(Language::Sql, "SELECT 1;\n");
        assert_eq!(output.tree.origin(), StructureOrigin::Approximate);
        assert_eq!(output.diagnostics[0].kind, DiagnosticKind::GrammarUnavailable);
    }

    #[test]
    fn last_segment_of_qualified_names() {
        assert_eq!(last_path_segment("Counter::bump"), "bump");
        assert_eq!(last_path_segment("models.Base"), "Base");
        assert_eq!(last_path_segment("plain"), "plain");
    }
}
