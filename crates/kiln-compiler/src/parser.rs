//! Tree-sitter parser wrapper for TypeScript sources
//!
//! One parser is owned by the compiler session and switched between the
//! TypeScript and TSX grammars on demand.

use tree_sitter::{Language, Parser, Tree};

use kiln_core::SourceKind;

use crate::CompileError;

/// Get the tree-sitter language for a source kind
pub fn language_for(kind: SourceKind) -> Language {
    if kind.is_tsx() {
        tree_sitter_typescript::LANGUAGE_TSX.into()
    } else {
        tree_sitter_typescript::LANGUAGE_TYPESCRIPT.into()
    }
}

pub struct SourceParser {
    parser: Parser,
    tsx: Option<bool>,
}

impl SourceParser {
    pub fn new() -> Self {
        SourceParser {
            parser: Parser::new(),
            tsx: None,
        }
    }

    /// Parse `text` with the grammar matching `kind`.
    pub fn parse(&mut self, kind: SourceKind, text: &str) -> Result<Tree, CompileError> {
        if self.tsx != Some(kind.is_tsx()) {
            self.parser
                .set_language(&language_for(kind))
                .map_err(|e| CompileError::Parser(format!("failed to set language: {}", e)))?;
            self.tsx = Some(kind.is_tsx());
        }

        self.parser
            .parse(text, None)
            .ok_or_else(|| CompileError::Parser("parser returned no tree".to_string()))
    }
}

impl Default for SourceParser {
    fn default() -> Self {
        Self::new()
    }
}
