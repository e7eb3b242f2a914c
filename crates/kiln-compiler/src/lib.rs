//! Incremental TypeScript compilation: parsing, module resolution,
//! type-stripping emit and lint rules

pub mod compiler;
pub mod emit;
pub mod index;
pub mod lint;
pub mod parser;
pub mod program;
pub mod resolve;
pub mod scan;
pub mod syntax;

#[cfg(test)]
pub mod test_utils;
#[cfg(test)]
pub mod tests;

pub use compiler::{CompileError, CompileOutput, Compiler, IncrementalCompiler, output_path_for};
pub use index::{render_index, sync_index_file};
pub use lint::{LintContext, LintEngine, LintLevel, LintRule};
pub use program::{Program, SourceEntry};
pub use resolve::Resolution;
