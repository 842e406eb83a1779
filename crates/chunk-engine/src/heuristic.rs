//! Line-based structure for languages without a usable grammar.
//!
//! Declarations are recognised by per-language signature patterns; their
//! bodies are delimited by indentation, brace balance or (for SQL) a
//! `;`-terminated line outside dollar-quoted blocks.

use crate::builder::{BuildOutput, StructureStrategy};
use crate::error::{Diagnostic, DiagnosticKind, Result};
use crate::language::{BlockStyle, Language};
use crate::tree::{NodeId, NodeKind, StructureOrigin, SyntaxNode, TreeBuilderArena};
use once_cell::sync::Lazy;
use regex::{Captures, Regex};

/// Lines inspected after a signature while looking for the opening brace
const MAX_HEADER_LINES: usize = 4;

fn compile(pattern: &str) -> Regex {
    Regex::new(pattern).unwrap_or_else(|e| panic!("invalid built-in pattern {pattern}: {e}"))
}

static PY_DEF: Lazy<Regex> = Lazy::new(|| compile(r"^\s*(?:async\s+)?def\s+([A-Za-z_]\w*)\s*\("));
static PY_CLASS: Lazy<Regex> =
    Lazy::new(|| compile(r"^\s*class\s+([A-Za-z_]\w*)\s*(?:\(([^)]*)\))?\s*:"));

static JS_FUNCTION: Lazy<Regex> = Lazy::new(|| {
    compile(r"^\s*(?:export\s+)?(?:default\s+)?(?:async\s+)?function\s*\*?\s*([A-Za-z_$][\w$]*)\s*[(<]")
});
static JS_ARROW: Lazy<Regex> = Lazy::new(|| {
    compile(
        r"^\s*(?:export\s+)?(?:const|let|var)\s+([A-Za-z_$][\w$]*)\s*(?::[^=]+)?=\s*(?:async\s+)?(?:function\b|\([^)]*\)\s*(?::[^=]+)?=>|[A-Za-z_$][\w$]*\s*=>)",
    )
});
static JS_CLASS: Lazy<Regex> = Lazy::new(|| {
    compile(
        r"^\s*(?:export\s+)?(?:default\s+)?(?:abstract\s+)?(?:class|interface|enum)\s+([A-Za-z_$][\w$]*)(?:\s*<[^>]*>)?(?:\s+extends\s+([\w$.]+))?",
    )
});
static JS_METHOD: Lazy<Regex> = Lazy::new(|| {
    compile(
        r"^\s*(?:(?:public|private|protected|static|async|readonly|get|set|override|abstract)\s+)*\*?([A-Za-z_$][\w$]*)\s*(?:<[^>]*>)?\s*\(",
    )
});

static CLIKE_CLASS: Lazy<Regex> = Lazy::new(|| {
    compile(
        r"^\s*(?:\[[^\]]*\]\s*)*(?:(?:public|private|protected|internal|static|abstract|final|sealed|partial|readonly|strictfp)\s+)*(?:class|interface|enum|record|struct)\s+([A-Za-z_]\w*)(?:\s*<[^>]*>)?(?:\s*\([^)]*\))?(?:\s*(?:extends|:)\s*([\w.]+))?",
    )
});
static CLIKE_METHOD: Lazy<Regex> = Lazy::new(|| {
    compile(
        r"^\s*(?:(?:public|private|protected|internal|static|final|abstract|virtual|override|async|synchronized|native|sealed|extern|unsafe|new|partial)\s+)*(?:<[^>]*>\s*)?(?:[\w.\[\]<>,?]+\s+)?([A-Za-z_]\w*)\s*\(",
    )
});

static CPP_CLASS: Lazy<Regex> = Lazy::new(|| {
    compile(
        r"^\s*(?:template\s*<.*>\s*)?(?:class|struct|union)\s+([A-Za-z_]\w*)\s*(?:final\s*)?(?::\s*(?:(?:public|private|protected|virtual)\s+)*([\w:]+))?",
    )
});
static CPP_FUNCTION: Lazy<Regex> = Lazy::new(|| {
    compile(
        r"^\s*(?:template\s*<.*>\s*)?(?:(?:static|inline|virtual|explicit|constexpr|extern|friend)\s+)*(?:[\w:<>,\*&]+\s+[\*&]*)*?([~A-Za-z_][\w:~]*)\s*\(",
    )
});

static R_FUNCTION: Lazy<Regex> =
    Lazy::new(|| compile(r"^\s*([A-Za-z_.][\w.]*)\s*(?:<-|<<-|=)\s*function\s*\("));

static SQL_CREATE: Lazy<Regex> = Lazy::new(|| {
    compile(
        r#"(?i)^\s*CREATE\s+(?:OR\s+REPLACE\s+)?(?:TEMP(?:ORARY)?\s+)?(?:FUNCTION|PROCEDURE|VIEW|TABLE|TRIGGER)\s+(?:IF\s+NOT\s+EXISTS\s+)?([\w."]+)"#,
    )
});

/// Words that look like `name(` but open control flow
const CONTROL_KEYWORDS: &[&str] = &[
    "if", "for", "foreach", "while", "switch", "catch", "return", "else", "new", "throw",
    "sizeof", "do", "using", "lock", "synchronized", "function", "await", "typeof", "delete",
];

#[derive(Debug, Clone, PartialEq, Eq)]
struct Declaration {
    kind: NodeKind,
    name: String,
    bases: Vec<String>,
}

#[derive(Debug, Clone, Copy)]
struct Line {
    /// Byte offset of the line start
    start: usize,
    /// Byte offset of the end of the content, before `\r\n` or `\n`
    end: usize,
    /// Byte offset of the start of the next line
    next: usize,
}

/// Where a declaration's body lies, in line indices
#[derive(Debug, Clone, Copy)]
struct Block {
    /// One past the last line of the declaration
    end: usize,
    header_end: Option<usize>,
    /// Lines holding the members, for classes
    inner: Option<(usize, usize)>,
    closed: bool,
}

/// Heuristic structure strategy
#[derive(Debug, Clone, Copy)]
pub struct HeuristicStrategy {
    language: Language,
}

impl HeuristicStrategy {
    pub const fn new(language: Language) -> Self {
        Self { language }
    }

    /// Approximate structure; never fails
    pub fn build_structure(&self, text: &str) -> BuildOutput {
        let lines = split_lines(text);
        let mut scan = Scan {
            language: self.language,
            text,
            lines: &lines,
            arena: TreeBuilderArena::new(),
            diagnostics: Vec::new(),
        };
        scan.block(0, lines.len(), None, false);

        BuildOutput {
            tree: scan.arena.finish(StructureOrigin::Approximate),
            diagnostics: scan.diagnostics,
        }
    }
}

impl StructureStrategy for HeuristicStrategy {
    fn build(&self, text: &str) -> Result<BuildOutput> {
        Ok(self.build_structure(text))
    }
}

fn split_lines(text: &str) -> Vec<Line> {
    let mut lines = Vec::new();
    let mut start = 0;
    for piece in text.split_inclusive('\n') {
        let content = piece.trim_end_matches(['\n', '\r']);
        lines.push(Line {
            start,
            end: start + content.len(),
            next: start + piece.len(),
        });
        start += piece.len();
    }
    lines
}

struct Scan<'a> {
    language: Language,
    text: &'a str,
    lines: &'a [Line],
    arena: TreeBuilderArena,
    diagnostics: Vec<Diagnostic>,
}

impl Scan<'_> {
    fn line_text(&self, idx: usize) -> &str {
        let line = self.lines[idx];
        &self.text[line.start..line.end]
    }

    fn trimmed(&self, idx: usize) -> &str {
        self.line_text(idx).trim()
    }

    fn is_blank(&self, idx: usize) -> bool {
        self.trimmed(idx).is_empty()
    }

    fn indent(&self, idx: usize) -> usize {
        let text = self.line_text(idx);
        text.len() - text.trim_start().len()
    }

    /// Byte range from the first non-blank char of `first` to the content end of `last`
    fn span(&self, first: usize, last: usize) -> std::ops::Range<usize> {
        self.lines[first].start + self.indent(first)..self.lines[last].end
    }

    fn block(&mut self, lo: usize, hi: usize, parent: Option<NodeId>, in_class: bool) {
        let mut i = lo;
        while i < hi {
            if self.is_blank(i) {
                i += 1;
                continue;
            }

            let mut sig = i;
            while sig < hi && self.language.is_annotation_line(self.trimmed(sig)) {
                sig += 1;
            }
            if sig < hi {
                if let Some(next) = self.try_declaration(i, sig, hi, parent, in_class) {
                    i = next;
                    continue;
                }
            }

            let trimmed = self.trimmed(i);
            i = if self.language.is_import_line(trimmed) {
                self.import(i, hi, parent)
            } else if self.language.is_comment_line(trimmed) {
                self.comment(i, hi, parent)
            } else {
                self.statement(i, hi, parent)
            };
        }
    }

    /// Push the declaration starting at `first` (annotations) / `sig` (signature line)
    fn try_declaration(
        &mut self,
        first: usize,
        sig: usize,
        hi: usize,
        parent: Option<NodeId>,
        in_class: bool,
    ) -> Option<usize> {
        let decl = self.match_declaration(self.line_text(sig), in_class)?;
        let block = self.block_extent(sig, hi)?;

        let last = block.end.saturating_sub(1).max(sig);
        let range = self.span(first, last);
        if !block.closed {
            self.diagnostics.push(
                Diagnostic::new(
                    DiagnosticKind::ParseRegionError,
                    format!("unterminated body of `{}`", decl.name),
                )
                .with_range(range.clone()),
            );
        }

        let is_class = decl.kind == NodeKind::Class;
        let node = SyntaxNode::new(decl.kind, range)
            .with_name(Some(decl.name))
            .with_header_end(block.header_end)
            .with_bases(decl.bases);
        let id = self.arena.push(node, parent);

        if is_class {
            if let Some((inner_lo, inner_hi)) = block.inner {
                self.block(inner_lo, inner_hi, Some(id), true);
            }
        }
        Some(block.end)
    }

    fn match_declaration(&self, line: &str, in_class: bool) -> Option<Declaration> {
        let class = |caps: Captures| Declaration {
            kind: NodeKind::Class,
            name: caps[1].to_string(),
            bases: caps
                .get(2)
                .map(|m| split_bases(m.as_str()))
                .unwrap_or_default(),
        };
        let function = |name: &str| {
            let name = last_segment(name);
            if CONTROL_KEYWORDS.contains(&name.as_str()) {
                return None;
            }
            Some(Declaration {
                kind: if in_class {
                    NodeKind::Method
                } else {
                    NodeKind::Function
                },
                name,
                bases: Vec::new(),
            })
        };

        match self.language {
            Language::Python | Language::Unknown => {
                if let Some(caps) = PY_CLASS.captures(line) {
                    return Some(class(caps));
                }
                if let Some(caps) = PY_DEF.captures(line) {
                    return function(&caps[1]);
                }
                if self.language == Language::Unknown {
                    if let Some(caps) = JS_FUNCTION.captures(line) {
                        return function(&caps[1]);
                    }
                }
                None
            }
            Language::JavaScript | Language::TypeScript => {
                if let Some(caps) = JS_CLASS.captures(line) {
                    return Some(class(caps));
                }
                if let Some(caps) = JS_FUNCTION
                    .captures(line)
                    .or_else(|| JS_ARROW.captures(line))
                {
                    return function(&caps[1]);
                }
                if in_class {
                    if let Some(caps) = JS_METHOD.captures(line) {
                        return function(&caps[1]);
                    }
                }
                None
            }
            Language::Java | Language::CSharp => {
                if let Some(caps) = CLIKE_CLASS.captures(line) {
                    return Some(class(caps));
                }
                CLIKE_METHOD.captures(line).and_then(|caps| function(&caps[1]))
            }
            Language::Cpp => {
                if let Some(caps) = CPP_CLASS.captures(line) {
                    return Some(class(caps));
                }
                CPP_FUNCTION.captures(line).and_then(|caps| function(&caps[1]))
            }
            Language::R => R_FUNCTION.captures(line).and_then(|caps| function(&caps[1])),
            Language::Sql => SQL_CREATE.captures(line).map(|caps| Declaration {
                kind: NodeKind::Function,
                name: last_segment(&caps[1].replace('"', "")),
                bases: Vec::new(),
            }),
        }
    }

    fn block_extent(&self, sig: usize, hi: usize) -> Option<Block> {
        match self.language.block_style() {
            BlockStyle::Indentation => Some(self.indented_block(sig, hi)),
            BlockStyle::Braces => self.braced_block(sig, hi),
            BlockStyle::Statement => Some(self.sql_block(sig, hi)),
        }
    }

    fn indented_block(&self, sig: usize, hi: usize) -> Block {
        let base = self.indent(sig);
        // signatures may wrap inside their parameter list
        let mut header = sig;
        let mut balance = paren_balance(self.line_text(sig));
        while balance > 0 && header + 1 < hi && header < sig + MAX_HEADER_LINES {
            header += 1;
            balance += paren_balance(self.line_text(header));
        }

        let mut last = header;
        let mut idx = header + 1;
        while idx < hi {
            if self.is_blank(idx) {
                idx += 1;
                continue;
            }
            if self.indent(idx) <= base {
                break;
            }
            last = idx;
            idx += 1;
        }

        Block {
            end: last + 1,
            header_end: Some(self.lines[header].next.min(self.lines[last].end)),
            inner: (header < last).then_some((header + 1, last + 1)),
            closed: true,
        }
    }

    fn braced_block(&self, sig: usize, hi: usize) -> Option<Block> {
        let mut depth = 0i64;
        let mut open: Option<(usize, usize)> = None;

        for idx in sig..hi {
            if open.is_none() && idx > sig + MAX_HEADER_LINES {
                break;
            }
            let line = self.line_text(idx);
            for (offset, ch) in code_chars(line, self.language) {
                match ch {
                    '{' => {
                        if open.is_none() {
                            open = Some((idx, self.lines[idx].start + offset));
                        }
                        depth += 1;
                    }
                    '}' => depth -= 1,
                    ';' if open.is_none() => return None,
                    _ => {}
                }
                if let Some((open_line, header_end)) = open {
                    if depth <= 0 {
                        return Some(Block {
                            end: idx + 1,
                            header_end: Some(header_end),
                            inner: (idx > open_line + 1).then_some((open_line + 1, idx)),
                            closed: true,
                        });
                    }
                }
            }
        }

        match open {
            Some((open_line, header_end)) => Some(Block {
                end: hi,
                header_end: Some(header_end),
                inner: (hi > open_line + 1).then_some((open_line + 1, hi)),
                closed: false,
            }),
            // R allows single-expression bodies without braces
            None if self.language == Language::R => Some(Block {
                end: sig + 1,
                header_end: None,
                inner: None,
                closed: true,
            }),
            None => None,
        }
    }

    fn sql_block(&self, sig: usize, hi: usize) -> Block {
        let end = self.sql_statement_end(sig, hi);
        Block {
            end: end.unwrap_or(hi),
            header_end: Some(self.lines[sig].end),
            inner: None,
            closed: end.is_some(),
        }
    }

    /// One past the line ending the statement at `from`, outside `$$` quoting
    fn sql_statement_end(&self, from: usize, hi: usize) -> Option<usize> {
        let mut in_dollar = false;
        for idx in from..hi {
            let line = self.line_text(idx);
            if line.matches("$$").count() % 2 == 1 {
                in_dollar = !in_dollar;
            }
            if !in_dollar && line.trim_end().ends_with(';') {
                return Some(idx + 1);
            }
        }
        None
    }

    fn import(&mut self, i: usize, hi: usize, parent: Option<NodeId>) -> usize {
        // `from x import (\n a,\n b)` and `import {\n a\n} from` span lines
        let mut last = i;
        let mut balance = paren_balance(self.line_text(i));
        while balance > 0 && last + 1 < hi {
            last += 1;
            balance += paren_balance(self.line_text(last));
        }
        let range = self.span(i, last);
        self.arena.push(SyntaxNode::new(NodeKind::Import, range), parent);
        last + 1
    }

    fn comment(&mut self, i: usize, hi: usize, parent: Option<NodeId>) -> usize {
        let mut last = i;
        let mut in_block = self.opens_block_comment(i);
        while last + 1 < hi {
            let next = last + 1;
            if in_block {
                in_block = !self.trimmed(last).contains("*/") || self.opens_block_comment(last);
                if in_block {
                    last = next;
                    continue;
                }
            }
            if self.is_blank(next) || !self.language.is_comment_line(self.trimmed(next)) {
                break;
            }
            last = next;
            in_block = self.opens_block_comment(last);
        }
        let range = self.span(i, last);
        self.arena.push(SyntaxNode::new(NodeKind::Comment, range), parent);
        last + 1
    }

    fn opens_block_comment(&self, idx: usize) -> bool {
        let line = self.trimmed(idx);
        match line.rfind("/*") {
            Some(open) => !line[open..].contains("*/"),
            None => false,
        }
    }

    fn statement(&mut self, i: usize, hi: usize, parent: Option<NodeId>) -> usize {
        let style = self.language.block_style();
        let base = self.indent(i);
        let mut depth = brace_delta(self.line_text(i), self.language);
        let mut last = i;

        if style == BlockStyle::Statement {
            let end = self.sql_statement_end(i, hi);
            // an unterminated statement stops at the next blank line
            last = match end {
                Some(end) => end - 1,
                None => (i..hi).take_while(|&idx| !self.is_blank(idx)).last().unwrap_or(i),
            };
        } else {
            let mut idx = i + 1;
            while idx < hi {
                if style == BlockStyle::Braces && depth > 0 {
                    depth += brace_delta(self.line_text(idx), self.language);
                    last = idx;
                    idx += 1;
                    continue;
                }
                if self.is_blank(idx) {
                    if style == BlockStyle::Indentation {
                        let resume = (idx..hi).find(|&j| !self.is_blank(j));
                        if let Some(resume) = resume {
                            if self.indent(resume) > base {
                                idx = resume;
                                continue;
                            }
                        }
                    }
                    break;
                }
                if style == BlockStyle::Indentation && self.indent(idx) > base {
                    last = idx;
                    idx += 1;
                    continue;
                }
                let trimmed = self.trimmed(idx);
                if self.language.is_import_line(trimmed)
                    || self.language.is_comment_line(trimmed)
                    || self.language.is_annotation_line(trimmed)
                    || self.match_declaration(self.line_text(idx), false).is_some()
                    || trimmed.starts_with('}')
                {
                    break;
                }
                depth += brace_delta(self.line_text(idx), self.language);
                last = idx;
                idx += 1;
            }
        }

        let range = self.span(i, last);
        self.arena.push(SyntaxNode::new(NodeKind::Statement, range), parent);
        last + 1
    }
}

/// Characters outside string literals and line comments, with byte offsets
fn code_chars(line: &str, language: Language) -> Vec<(usize, char)> {
    let line_comment = match language {
        Language::Python | Language::R => "#",
        Language::Sql => "--",
        _ => "//",
    };
    let mut out = Vec::new();
    let mut quote: Option<char> = None;
    let mut escaped = false;
    for (offset, ch) in line.char_indices() {
        if let Some(q) = quote {
            if escaped {
                escaped = false;
            } else if ch == '\\' {
                escaped = true;
            } else if ch == q {
                quote = None;
            }
            continue;
        }
        if line[offset..].starts_with(line_comment) {
            break;
        }
        match ch {
            '"' | '\'' | '`' => quote = Some(ch),
            _ => out.push((offset, ch)),
        }
    }
    out
}

fn brace_delta(line: &str, language: Language) -> i64 {
    code_chars(line, language)
        .into_iter()
        .map(|(_, ch)| match ch {
            '{' => 1,
            '}' => -1,
            _ => 0,
        })
        .sum()
}

fn paren_balance(line: &str) -> i64 {
    line.chars()
        .map(|ch| match ch {
            '(' | '{' => 1,
            ')' | '}' => -1,
            _ => 0,
        })
        .sum()
}

fn last_segment(name: &str) -> String {
    name.rsplit(|c| c == '.' || c == ':')
        .find(|s| !s.is_empty())
        .unwrap_or(name)
        .to_string()
}

fn split_bases(clause: &str) -> Vec<String> {
    clause
        .split(',')
        .map(str::trim)
        .filter(|base| !base.is_empty() && !base.contains('='))
        .map(last_segment)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tree::SyntaxTree;
    use pretty_assertions::assert_eq;

    fn outline(tree: &SyntaxTree, text: &str) -> Vec<(NodeKind, String, Option<NodeId>)> {
        tree.nodes()
            .map(|(id, node)| {
                let label = node
                    .name
                    .clone()
                    .unwrap_or_else(|| text[node.byte_range.clone()].lines().next().unwrap_or("").to_string());
                (node.kind, label, tree.parent(id))
            })
            .collect()
    }

    #[test]
    fn r_functions_and_statements() {
        let code = "library(dplyr)\n\nclean <- function(df) {\n  df %>% filter(!is.na(x))\n}\n\nsquare <- function(x) x^2\n\nresult <- clean(data)\n";
        let output = HeuristicStrategy::new(Language::R).build_structure(code);
        assert!(output.diagnostics.is_empty());
        assert_eq!(
            outline(&output.tree, code),
            vec![
                (NodeKind::Import, "library(dplyr)".to_string(), None),
                (NodeKind::Function, "clean".to_string(), None),
                (NodeKind::Function, "square".to_string(), None),
                (NodeKind::Statement, "result <- clean(data)".to_string(), None),
            ]
        );
        let clean = output.tree.node(1).unwrap();
        assert_eq!(
            &code[clean.byte_range.clone()],
            "clean <- function(df) {\n  df %>% filter(!is.na(x))\n}"
        );
        assert_eq!(output.tree.origin(), StructureOrigin::Approximate);
    }

    #[test]
    fn sql_statements_split_at_semicolons() {
        let code = "-- schema\nCREATE TABLE users (\n  id INT\n);\n\nCREATE OR REPLACE FUNCTION add(a int, b int) RETURNS int AS $$\nBEGIN\n  RETURN a + b;\nEND;\n$$ LANGUAGE plpgsql;\n\nSELECT add(1, 2);\n";
        let output = HeuristicStrategy::new(Language::Sql).build_structure(code);
        assert_eq!(
            outline(&output.tree, code),
            vec![
                (NodeKind::Comment, "-- schema".to_string(), None),
                (NodeKind::Function, "users".to_string(), None),
                (NodeKind::Function, "add".to_string(), None),
                (NodeKind::Statement, "SELECT add(1, 2);".to_string(), None),
            ]
        );
        let add = output.tree.node(2).unwrap();
        assert!(code[add.byte_range.clone()].ends_with("$$ LANGUAGE plpgsql;"));
    }

    #[test]
    fn python_indentation_blocks_with_methods() {
        let code = "import os\n\n@tool\nclass Shape(Base):\n    sides = 0\n\n    def area(self):\n        return 0\n\ndef main():\n    Shape()\n";
        let output = HeuristicStrategy::new(Language::Python).build_structure(code);
        let tree = &output.tree;
        assert_eq!(
            outline(tree, code),
            vec![
                (NodeKind::Import, "import os".to_string(), None),
                (NodeKind::Class, "Shape".to_string(), None),
                (NodeKind::Statement, "sides = 0".to_string(), Some(1)),
                (NodeKind::Method, "area".to_string(), Some(1)),
                (NodeKind::Function, "main".to_string(), None),
            ]
        );
        let shape = tree.node(1).unwrap();
        assert!(code[shape.byte_range.clone()].starts_with("@tool\nclass Shape"));
        assert_eq!(shape.bases, vec!["Base".to_string()]);
        let header = &code[shape.byte_range.start..shape.header_end.unwrap()];
        assert_eq!(header, "@tool\nclass Shape(Base):\n");
    }

    #[test]
    fn braces_class_members() {
        let code = "public class Box {\n    private int size;\n\n    public int getSize() {\n        return size;\n    }\n}\n";
        let output = HeuristicStrategy::new(Language::Java).build_structure(code);
        assert_eq!(
            outline(&output.tree, code),
            vec![
                (NodeKind::Class, "Box".to_string(), None),
                (NodeKind::Statement, "private int size;".to_string(), Some(0)),
                (NodeKind::Method, "getSize".to_string(), Some(0)),
            ]
        );
    }

    #[test]
    fn unterminated_brace_is_reported() {
        let code = "function broken() {\n  return 1;\n";
        let output = HeuristicStrategy::new(Language::JavaScript).build_structure(code);
        assert_eq!(output.diagnostics.len(), 1);
        assert_eq!(output.diagnostics[0].kind, DiagnosticKind::ParseRegionError);
        assert_eq!(output.tree.node(0).unwrap().kind, NodeKind::Function);
    }

    #[test]
    fn control_flow_is_not_a_function() {
        let code = "if (ready) {\n  start();\n}\n";
        let output = HeuristicStrategy::new(Language::Cpp).build_structure(code);
        assert_eq!(output.tree.len(), 1);
        assert_eq!(output.tree.node(0).unwrap().kind, NodeKind::Statement);
    }

    #[test]
    fn braces_ignore_strings_and_comments() {
        assert_eq!(brace_delta(r#"let s = "{"; // }"#, Language::JavaScript), 0);
        assert_eq!(brace_delta("x = {", Language::JavaScript), 1);
    }
}
