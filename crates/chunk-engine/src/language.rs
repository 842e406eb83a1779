use serde::{Deserialize, Serialize};
use std::path::Path;

/// Source language of a file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    Python,
    JavaScript,
    TypeScript,
    Java,
    Cpp,
    CSharp,
    Sql,
    R,
    Unknown,
}

/// How a language delimits declaration bodies
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockStyle {
    /// Bodies are deeper-indented lines (Python)
    Indentation,
    /// Bodies are balanced `{ }`
    Braces,
    /// Statements run to a terminating `;`
    Statement,
}

impl Language {
    pub const ALL: [Self; 9] = [
        Self::Python,
        Self::JavaScript,
        Self::TypeScript,
        Self::Java,
        Self::Cpp,
        Self::CSharp,
        Self::Sql,
        Self::R,
        Self::Unknown,
    ];

    /// Parse a language tag such as `"python"`, `"C++"` or `"c#"`
    pub fn from_tag(tag: &str) -> Self {
        match tag.trim().to_lowercase().as_str() {
            "python" | "py" => Self::Python,
            "javascript" | "js" => Self::JavaScript,
            "typescript" | "ts" => Self::TypeScript,
            "java" => Self::Java,
            "cpp" | "c++" | "cplusplus" => Self::Cpp,
            "csharp" | "c#" | "cs" => Self::CSharp,
            "sql" => Self::Sql,
            "r" => Self::R,
            _ => Self::Unknown,
        }
    }

    /// Detect language from file extension
    pub fn from_extension(ext: &str) -> Self {
        match ext.to_lowercase().as_str() {
            "py" | "pyw" => Self::Python,
            "js" | "mjs" | "cjs" | "jsx" => Self::JavaScript,
            "ts" | "tsx" | "mts" | "cts" => Self::TypeScript,
            "java" => Self::Java,
            "cpp" | "cc" | "cxx" | "hpp" | "hh" | "hxx" | "h" => Self::Cpp,
            "cs" => Self::CSharp,
            "sql" => Self::Sql,
            "r" => Self::R,
            _ => Self::Unknown,
        }
    }

    /// Detect language from file path
    pub fn from_path(path: impl AsRef<Path>) -> Self {
        path.as_ref()
            .extension()
            .and_then(|ext| ext.to_str())
            .map_or(Self::Unknown, Self::from_extension)
    }

    /// Get language name as string
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Python => "python",
            Self::JavaScript => "javascript",
            Self::TypeScript => "typescript",
            Self::Java => "java",
            Self::Cpp => "cpp",
            Self::CSharp => "csharp",
            Self::Sql => "sql",
            Self::R => "r",
            Self::Unknown => "unknown",
        }
    }

    /// Languages with a tree-sitter grammar in this build
    pub const fn has_grammar(self) -> bool {
        matches!(
            self,
            Self::Python
                | Self::JavaScript
                | Self::TypeScript
                | Self::Java
                | Self::Cpp
                | Self::CSharp
        )
    }

    pub const fn block_style(self) -> BlockStyle {
        match self {
            Self::Python | Self::Unknown => BlockStyle::Indentation,
            Self::Sql => BlockStyle::Statement,
            _ => BlockStyle::Braces,
        }
    }

    /// Get typical comment prefixes for this language
    pub fn comment_prefixes(self) -> &'static [&'static str] {
        match self {
            Self::JavaScript | Self::TypeScript | Self::Java | Self::Cpp | Self::CSharp => {
                &["//", "/*", "*", "*/"]
            }
            Self::Python | Self::R => &["#"],
            Self::Sql => &["--", "/*", "*", "*/"],
            Self::Unknown => &["#", "//", "--", "/*", "*"],
        }
    }

    /// Prefixes of annotation/decorator lines that belong to the following declaration
    pub fn annotation_prefixes(self) -> &'static [&'static str] {
        match self {
            Self::Python | Self::Java | Self::TypeScript | Self::JavaScript => &["@"],
            Self::CSharp => &["["],
            Self::Cpp => &["template", "[["],
            Self::Sql | Self::R | Self::Unknown => &[],
        }
    }

    /// Get import/use statement patterns for this language
    pub fn import_patterns(self) -> &'static [&'static str] {
        match self {
            Self::Python => &["import ", "from "],
            Self::JavaScript | Self::TypeScript => &["import ", "const {", "require("],
            Self::Java => &["import ", "package "],
            Self::Cpp => &["#include", "using namespace ", "import "],
            Self::CSharp => &["using "],
            Self::R => &["library(", "require(", "source("],
            Self::Sql => &["use ", "\\i ", "\\include "],
            Self::Unknown => &[],
        }
    }

    /// True when a trimmed line starts with a comment prefix
    pub fn is_comment_line(self, trimmed: &str) -> bool {
        !trimmed.is_empty()
            && self
                .comment_prefixes()
                .iter()
                .any(|prefix| trimmed.starts_with(prefix))
    }

    /// True when a trimmed line starts with an annotation/decorator prefix
    pub fn is_annotation_line(self, trimmed: &str) -> bool {
        !trimmed.is_empty()
            && self
                .annotation_prefixes()
                .iter()
                .any(|prefix| trimmed.starts_with(prefix))
    }

    /// True when a trimmed line looks like an import statement
    pub fn is_import_line(self, trimmed: &str) -> bool {
        let patterns = self.import_patterns();
        if self == Self::Sql {
            let lower = trimmed.to_lowercase();
            return patterns.iter().any(|p| lower.starts_with(p));
        }
        if self == Self::JavaScript || self == Self::TypeScript {
            // `const { a } = require("x")` is only an import when it requires
            if trimmed.starts_with("const {") || trimmed.starts_with("const ") {
                return trimmed.contains("require(");
            }
        }
        patterns.iter().any(|p| trimmed.starts_with(p))
    }
}

impl std::fmt::Display for Language {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_tag() {
        assert_eq!(Language::from_tag("Python"), Language::Python);
        assert_eq!(Language::from_tag("C++"), Language::Cpp);
        assert_eq!(Language::from_tag("c#"), Language::CSharp);
        assert_eq!(Language::from_tag("SQL"), Language::Sql);
        assert_eq!(Language::from_tag("Jupyter Notebook"), Language::Unknown);
    }

    #[test]
    fn test_from_extension() {
        assert_eq!(Language::from_extension("py"), Language::Python);
        assert_eq!(Language::from_extension("PY"), Language::Python);
        assert_eq!(Language::from_extension("js"), Language::JavaScript);
        assert_eq!(Language::from_extension("ts"), Language::TypeScript);
        assert_eq!(Language::from_extension("cs"), Language::CSharp);
        assert_eq!(Language::from_extension("R"), Language::R);
        assert_eq!(Language::from_extension("json"), Language::Unknown);
    }

    #[test]
    fn test_from_path() {
        assert_eq!(Language::from_path("src/main.py"), Language::Python);
        assert_eq!(Language::from_path("index.ts"), Language::TypeScript);
        assert_eq!(Language::from_path("lib/Widget.java"), Language::Java);
        assert_eq!(Language::from_path("no_extension"), Language::Unknown);
    }

    #[test]
    fn test_tag_round_trip_for_all_variants() {
        for language in Language::ALL {
            assert_eq!(Language::from_tag(language.as_str()), language);
        }
    }

    #[test]
    fn test_has_grammar() {
        assert!(Language::Python.has_grammar());
        assert!(Language::CSharp.has_grammar());
        assert!(!Language::Sql.has_grammar());
        assert!(!Language::R.has_grammar());
        assert!(!Language::Unknown.has_grammar());
    }

    #[test]
    fn test_line_classifiers() {
        assert!(Language::Python.is_comment_line("# note"));
        assert!(Language::Python.is_annotation_line("@property"));
        assert!(Language::Python.is_import_line("from os import path"));
        assert!(Language::Cpp.is_import_line("#include <vector>"));
        assert!(Language::JavaScript.is_import_line("const { a } = require('a');"));
        assert!(!Language::JavaScript.is_import_line("const total = 1;"));
        assert!(Language::Sql.is_import_line("USE warehouse;"));
        assert!(!Language::Sql.is_comment_line(""));
    }
}
