//! Structured build and lint diagnostics

use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// Where a diagnostic came from and how severe it is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DiagnosticKind {
    BuildError,
    BuildWarning,
    LintError,
    LintWarning,
}

impl DiagnosticKind {
    pub fn is_error(self) -> bool {
        matches!(self, DiagnosticKind::BuildError | DiagnosticKind::LintError)
    }

    pub fn is_build(self) -> bool {
        matches!(self, DiagnosticKind::BuildError | DiagnosticKind::BuildWarning)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            DiagnosticKind::BuildError => "build-error",
            DiagnosticKind::BuildWarning => "build-warning",
            DiagnosticKind::LintError => "lint-error",
            DiagnosticKind::LintWarning => "lint-warning",
        }
    }
}

impl fmt::Display for DiagnosticKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single error or warning. Field order defines the sort order used for
/// deterministic reports: file, then position, then kind.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Diagnostic {
    pub file: Option<PathBuf>,
    /// 1-based line.
    pub line: u32,
    /// 1-based column.
    pub column: u32,
    pub kind: DiagnosticKind,
    /// Rule name for lint diagnostics.
    pub code: Option<String>,
    pub message: String,
}

impl Diagnostic {
    pub fn new(kind: DiagnosticKind, file: Option<&Path>, message: impl Into<String>) -> Self {
        Diagnostic {
            file: file.map(Path::to_path_buf),
            line: 1,
            column: 1,
            kind,
            code: None,
            message: message.into(),
        }
    }

    pub fn build_error(file: &Path, message: impl Into<String>) -> Self {
        Self::new(DiagnosticKind::BuildError, Some(file), message)
    }

    pub fn build_warning(file: &Path, message: impl Into<String>) -> Self {
        Self::new(DiagnosticKind::BuildWarning, Some(file), message)
    }

    /// Set the 1-based position.
    pub fn at(mut self, line: u32, column: u32) -> Self {
        self.line = line;
        self.column = column;
        self
    }

    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.code = Some(code.into());
        self
    }

    pub fn is_error(&self) -> bool {
        self.kind.is_error()
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(file) = &self.file {
            write!(f, "{}:{}:{}: ", file.display(), self.line, self.column)?;
        }
        write!(f, "{}: {}", self.kind, self.message)?;
        if let Some(code) = &self.code {
            write!(f, " [{}]", code)?;
        }
        Ok(())
    }
}

/// Count error-level diagnostics.
pub fn error_count(diagnostics: &[Diagnostic]) -> usize {
    diagnostics.iter().filter(|d| d.is_error()).count()
}
