//! Scene description language for simhost.
//!
//! Source text goes through three stages: [`lexer`] (logos), [`parser`]
//! (chumsky) and [`compiler`], which builds a [`sh_scene::SceneRoot`] and
//! resolves `include` statements through the hooks on [`ParserConfig`].
//! Problems from every stage are collected as [`Diagnostic`]s and can be
//! rendered with [`diagnostics::render_diagnostics`].

/// Syntax tree produced by the parser.
pub mod ast;
/// AST to scene graph compilation.
pub mod compiler;
/// Loader settings and asset lookup hooks.
pub mod config;
/// Diagnostics and terminal rendering.
pub mod diagnostics;
/// Tokenizer.
pub mod lexer;
/// Token stream to AST.
pub mod parser;

use std::path::Path;

use sh_scene::SceneRoot;

pub use config::ParserConfig;
pub use diagnostics::{Diagnostic, Severity, Tally};

/// File extension for scene files.
pub const FILE_EXTENSION: &str = "scene";

/// File loaded when an include target is a directory.
pub const MODEL_FILE_NAME: &str = "model.scene";

/// Outcome of loading scene text: the graph plus everything that went wrong.
#[derive(Debug)]
pub struct LoadResult {
    /// The loaded scene. Partial when [`LoadResult::has_errors`] is true.
    pub root: SceneRoot,
    /// Errors and warnings from every stage.
    pub diagnostics: Vec<Diagnostic>,
}

impl LoadResult {
    /// Returns `true` if any diagnostic has error severity.
    pub fn has_errors(&self) -> bool {
        self.diagnostics.iter().any(Diagnostic::is_error)
    }

    /// Messages of the error-severity diagnostics, prefixed with the
    /// include chain they were found through.
    pub fn error_messages(&self) -> Vec<String> {
        self.diagnostics
            .iter()
            .filter(|d| d.is_error())
            .map(Diagnostic::located_message)
            .collect()
    }
}

/// Load scene text with the default configuration.
pub fn load_source(source: &str) -> LoadResult {
    load_source_at(source, None, &ParserConfig::default())
}

/// Load scene text that came from `path`.
///
/// The path only anchors relative includes and is recorded on the root;
/// nothing is read from it.
pub fn load_source_at(source: &str, path: Option<&Path>, config: &ParserConfig) -> LoadResult {
    load_at_depth(source, path, config, 0)
}

/// Read and load a scene file.
pub fn load_file(path: &Path, config: &ParserConfig) -> LoadResult {
    load_file_at_depth(path, config, 0)
}

pub(crate) fn load_file_at_depth(path: &Path, config: &ParserConfig, depth: usize) -> LoadResult {
    match std::fs::read_to_string(path) {
        Ok(source) => load_at_depth(&source, Some(path), config, depth),
        Err(e) => LoadResult {
            root: SceneRoot::new(),
            diagnostics: vec![Diagnostic::error(
                0..0,
                format!("cannot read {}: {e}", path.display()),
            )],
        },
    }
}

fn load_at_depth(
    source: &str,
    path: Option<&Path>,
    config: &ParserConfig,
    depth: usize,
) -> LoadResult {
    let (tokens, lex_errors) = lexer::lex(source);

    let mut diagnostics: Vec<Diagnostic> = lex_errors
        .into_iter()
        .map(|e| Diagnostic::error(e.span, e.message))
        .collect();

    let ast = match parser::parse(&tokens) {
        Ok(ast) => ast,
        Err(parse_errors) => {
            diagnostics.extend(
                parse_errors
                    .into_iter()
                    .map(|e| Diagnostic::error(e.span, e.message)),
            );
            return LoadResult {
                root: SceneRoot::new(),
                diagnostics,
            };
        }
    };

    let base_dir = path.and_then(Path::parent);
    let compiled = compiler::compile_at_depth(&ast, base_dir, config, depth);
    diagnostics.extend(compiled.diagnostics);

    let mut root = compiled.root;
    if let Some(path) = path {
        root.set_source_path(path);
    }

    tracing::debug!(
        path = ?path,
        worlds = root.world_count(),
        has_model = root.model().is_some(),
        diagnostics = diagnostics.len(),
        "loaded scene"
    );

    LoadResult { root, diagnostics }
}
