//! Grammar provider: resolves a language to a loaded tree-sitter grammar.
//!
//! The registry is process-wide and read-mostly. Each language slot is a
//! once-initialised cell, so concurrent first use from several file workers
//! performs a single load; failed loads are cached as `Unavailable`.

use crate::error::{EngineError, Result};
use crate::language::Language;
use once_cell::sync::{Lazy, OnceCell};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, RwLock};
use tree_sitter::Parser;

/// Node-kind tables that normalize one grammar into the shared vocabulary
#[derive(Debug)]
pub struct GrammarProfile {
    /// Free functions
    pub functions: &'static [&'static str],
    /// Functions declared inside a class body
    pub methods: &'static [&'static str],
    /// Classes, interfaces, structs, enums
    pub classes: &'static [&'static str],
    /// Class body nodes whose children are members
    pub class_bodies: &'static [&'static str],
    pub imports: &'static [&'static str],
    pub comments: &'static [&'static str],
    /// Nodes that wrap a declaration (decorators, `export`, `template<>`)
    pub wrappers: &'static [&'static str],
    /// Namespaces whose members are lifted into the enclosing scope
    pub containers: &'static [&'static str],
    /// Variable declarations that may bind a function expression
    pub bindings: &'static [&'static str],
    /// Clause nodes listing base classes
    pub base_clauses: &'static [&'static str],
}

static PYTHON: GrammarProfile = GrammarProfile {
    functions: &["function_definition"],
    methods: &["function_definition"],
    classes: &["class_definition"],
    class_bodies: &["block"],
    imports: &[
        "import_statement",
        "import_from_statement",
        "future_import_statement",
    ],
    comments: &["comment"],
    wrappers: &["decorated_definition"],
    containers: &[],
    bindings: &[],
    base_clauses: &["argument_list"],
};

static JAVASCRIPT: GrammarProfile = GrammarProfile {
    functions: &["function_declaration", "generator_function_declaration"],
    methods: &["method_definition"],
    classes: &["class_declaration"],
    class_bodies: &["class_body"],
    imports: &["import_statement"],
    comments: &["comment"],
    wrappers: &["export_statement"],
    containers: &[],
    bindings: &["lexical_declaration", "variable_declaration"],
    base_clauses: &["class_heritage"],
};

static TYPESCRIPT: GrammarProfile = GrammarProfile {
    functions: &[
        "function_declaration",
        "generator_function_declaration",
        "function_signature",
    ],
    methods: &[
        "method_definition",
        "method_signature",
        "abstract_method_signature",
    ],
    classes: &[
        "class_declaration",
        "abstract_class_declaration",
        "interface_declaration",
        "enum_declaration",
    ],
    class_bodies: &["class_body", "interface_body", "object_type", "enum_body"],
    imports: &["import_statement"],
    comments: &["comment"],
    wrappers: &["export_statement"],
    containers: &["internal_module", "module"],
    bindings: &["lexical_declaration", "variable_declaration"],
    base_clauses: &["class_heritage", "extends_type_clause"],
};

static JAVA: GrammarProfile = GrammarProfile {
    functions: &[],
    methods: &[
        "method_declaration",
        "constructor_declaration",
        "compact_constructor_declaration",
    ],
    classes: &[
        "class_declaration",
        "interface_declaration",
        "enum_declaration",
        "record_declaration",
        "annotation_type_declaration",
    ],
    class_bodies: &[
        "class_body",
        "interface_body",
        "enum_body",
        "enum_body_declarations",
        "annotation_type_body",
    ],
    imports: &["import_declaration", "package_declaration"],
    comments: &["line_comment", "block_comment"],
    wrappers: &[],
    containers: &[],
    bindings: &[],
    base_clauses: &["superclass", "super_interfaces", "extends_interfaces"],
};

static CPP: GrammarProfile = GrammarProfile {
    functions: &["function_definition"],
    methods: &["function_definition"],
    classes: &["class_specifier", "struct_specifier", "union_specifier"],
    class_bodies: &["field_declaration_list"],
    imports: &["preproc_include", "using_declaration"],
    comments: &["comment"],
    wrappers: &["template_declaration"],
    containers: &["namespace_definition", "linkage_specification"],
    bindings: &[],
    base_clauses: &["base_class_clause"],
};

static CSHARP: GrammarProfile = GrammarProfile {
    functions: &["local_function_statement"],
    methods: &[
        "method_declaration",
        "constructor_declaration",
        "destructor_declaration",
        "operator_declaration",
        "conversion_operator_declaration",
    ],
    classes: &[
        "class_declaration",
        "struct_declaration",
        "interface_declaration",
        "record_declaration",
        "enum_declaration",
    ],
    class_bodies: &["declaration_list", "enum_member_declaration_list"],
    imports: &["using_directive"],
    comments: &["comment"],
    wrappers: &["global_statement"],
    containers: &["namespace_declaration", "file_scoped_namespace_declaration"],
    bindings: &[],
    base_clauses: &["base_list"],
};

impl GrammarProfile {
    /// Profile for a language, `None` when no grammar is compiled in
    pub fn for_language(language: Language) -> Option<&'static Self> {
        match language {
            Language::Python => Some(&PYTHON),
            Language::JavaScript => Some(&JAVASCRIPT),
            Language::TypeScript => Some(&TYPESCRIPT),
            Language::Java => Some(&JAVA),
            Language::Cpp => Some(&CPP),
            Language::CSharp => Some(&CSHARP),
            Language::Sql | Language::R | Language::Unknown => None,
        }
    }

    pub fn is_function(&self, kind: &str) -> bool {
        self.functions.contains(&kind)
    }

    pub fn is_method(&self, kind: &str) -> bool {
        self.methods.contains(&kind)
    }

    pub fn is_class(&self, kind: &str) -> bool {
        self.classes.contains(&kind)
    }

    pub fn is_class_body(&self, kind: &str) -> bool {
        self.class_bodies.contains(&kind)
    }

    pub fn is_import(&self, kind: &str) -> bool {
        self.imports.contains(&kind)
    }

    pub fn is_comment(&self, kind: &str) -> bool {
        self.comments.contains(&kind)
    }

    pub fn is_wrapper(&self, kind: &str) -> bool {
        self.wrappers.contains(&kind)
    }

    pub fn is_container(&self, kind: &str) -> bool {
        self.containers.contains(&kind)
    }

    pub fn is_binding(&self, kind: &str) -> bool {
        self.bindings.contains(&kind)
    }

    pub fn is_base_clause(&self, kind: &str) -> bool {
        self.base_clauses.contains(&kind)
    }
}

/// A loaded grammar
#[derive(Debug, Clone)]
pub struct Grammar {
    language: Language,
    ts_language: tree_sitter::Language,
    profile: &'static GrammarProfile,
}

impl Grammar {
    pub const fn language(&self) -> Language {
        self.language
    }

    pub const fn profile(&self) -> &'static GrammarProfile {
        self.profile
    }

    /// Fresh parser bound to this grammar; parsers are per file and never shared
    pub fn parser(&self) -> Result<Parser> {
        let mut parser = Parser::new();
        parser
            .set_language(&self.ts_language)
            .map_err(|e| EngineError::tree_sitter(format!("Failed to set language: {e}")))?;
        Ok(parser)
    }
}

/// Outcome of a registry lookup
#[derive(Debug, Clone)]
pub enum Resolution {
    Available(Arc<Grammar>),
    Unavailable { language: Language, reason: String },
}

impl Resolution {
    pub fn grammar(&self) -> Option<&Arc<Grammar>> {
        match self {
            Self::Available(grammar) => Some(grammar),
            Self::Unavailable { .. } => None,
        }
    }

    pub const fn is_available(&self) -> bool {
        matches!(self, Self::Available(_))
    }
}

/// Produces the raw tree-sitter language for a tag
pub trait GrammarLoader: Send + Sync {
    fn load(&self, language: Language) -> Result<tree_sitter::Language>;
}

/// Loader backed by the grammars compiled into this crate
#[derive(Debug, Default, Clone, Copy)]
pub struct BuiltinLoader;

impl GrammarLoader for BuiltinLoader {
    fn load(&self, language: Language) -> Result<tree_sitter::Language> {
        match language {
            Language::Python => Ok(tree_sitter_python::LANGUAGE.into()),
            Language::JavaScript => Ok(tree_sitter_javascript::LANGUAGE.into()),
            Language::TypeScript => Ok(tree_sitter_typescript::LANGUAGE_TYPESCRIPT.into()),
            Language::Java => Ok(tree_sitter_java::LANGUAGE.into()),
            Language::Cpp => Ok(tree_sitter_cpp::LANGUAGE.into()),
            Language::CSharp => Ok(tree_sitter_c_sharp::LANGUAGE.into()),
            Language::Sql | Language::R | Language::Unknown => Err(EngineError::tree_sitter(
                format!("no grammar compiled in for {language}"),
            )),
        }
    }
}

type Slot = Arc<OnceCell<Resolution>>;

/// Lazily-populated language → grammar registry
pub struct GrammarRegistry {
    slots: RwLock<HashMap<Language, Slot>>,
    loader: Box<dyn GrammarLoader>,
    loads: AtomicUsize,
}

static GLOBAL_REGISTRY: Lazy<GrammarRegistry> = Lazy::new(GrammarRegistry::new);

impl GrammarRegistry {
    /// Registry using the built-in grammars
    pub fn new() -> Self {
        Self::with_loader(BuiltinLoader)
    }

    pub fn with_loader(loader: impl GrammarLoader + 'static) -> Self {
        Self {
            slots: RwLock::new(HashMap::new()),
            loader: Box::new(loader),
            loads: AtomicUsize::new(0),
        }
    }

    /// The process-wide registry
    pub fn global() -> &'static Self {
        &GLOBAL_REGISTRY
    }

    /// Number of loads actually performed (cache misses)
    pub fn load_count(&self) -> usize {
        self.loads.load(Ordering::Relaxed)
    }

    /// Resolve a language; never fails, unavailability is a value
    pub fn resolve(&self, language: Language) -> Resolution {
        let slot = self.slot(language);
        slot.get_or_init(|| self.load(language)).clone()
    }

    fn slot(&self, language: Language) -> Slot {
        {
            let slots = self
                .slots
                .read()
                .unwrap_or_else(std::sync::PoisonError::into_inner);
            if let Some(slot) = slots.get(&language) {
                return slot.clone();
            }
        }
        let mut slots = self
            .slots
            .write()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        slots.entry(language).or_default().clone()
    }

    fn load(&self, language: Language) -> Resolution {
        self.loads.fetch_add(1, Ordering::Relaxed);

        let Some(profile) = GrammarProfile::for_language(language) else {
            log::debug!("no grammar profile for {language}; structural fallback will be used");
            return Resolution::Unavailable {
                language,
                reason: format!("no grammar for {language}"),
            };
        };

        let loaded = self.loader.load(language).and_then(|ts_language| {
            let grammar = Grammar {
                language,
                ts_language,
                profile,
            };
            // Binding a probe parser catches ABI mismatches up front
            grammar.parser()?;
            Ok(grammar)
        });

        match loaded {
            Ok(grammar) => {
                log::debug!("loaded tree-sitter grammar for {language}");
                Resolution::Available(Arc::new(grammar))
            }
            Err(e) => {
                log::warn!("grammar for {language} failed to load: {e}");
                Resolution::Unavailable {
                    language,
                    reason: e.to_string(),
                }
            }
        }
    }
}

impl Default for GrammarRegistry {
    fn default() -> Self {
        Self::new()
    }
}
