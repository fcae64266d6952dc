//! Structured Text → ladder IR compiler library
//!
//! Pipeline: lexer/parser produce an AST with source spans, the
//! transformer lowers statements to ladder rungs, and the validator
//! checks the result for traceability and power-flow integrity. The
//! whole pipeline is a pure function of the source string (no I/O, no
//! global state), so callers can run it on every keystroke.
//!
//! ```rust
//! use rungc::{transform, TransformOptions};
//!
//! let result = transform(
//!     "VAR A, X : BOOL; END_VAR X := A;",
//!     &TransformOptions::default(),
//! );
//! assert!(result.success);
//! assert_eq!(result.rungs.len(), 1);
//! ```
//!
//! The cyclic interpreter in `rung-runtime` executes the same AST under
//! scan-cycle semantics; `Intermediates::ast` hands it over when
//! `include_intermediates` is set.

pub mod ast;
pub mod diagnostics;
pub mod ladder;
pub mod lexer;
pub mod parser;
pub mod timeval;
pub mod transform;
pub mod validator;

pub use ast::{DataType, FbType, Program, Span};
pub use diagnostics::{Diagnostic, DiagnosticKind, Severity};
pub use ladder::{
    CoilKind, CompareOp, ContactKind, CounterKind, Network, Rung, RungOutput, TimerKind,
};
pub use parser::{parse, ParseResult, Parser};
pub use transform::{FunctionBlockInfo, SymbolTable, VariableInfo};

use serde::Serialize;

/// Options for [`transform`]
#[derive(Debug, Clone, Copy)]
pub struct TransformOptions {
    /// Attach the parsed AST to the result for downstream consumers
    /// (the simulator feeds it to the interpreter)
    pub include_intermediates: bool,
    /// Emit `UNSUPPORTED_IN_LADDER` warnings for loop statements
    pub warn_on_unsupported: bool,
}

impl Default for TransformOptions {
    fn default() -> Self {
        TransformOptions {
            include_intermediates: false,
            warn_on_unsupported: true,
        }
    }
}

/// Intermediate artifacts, attached on request
#[derive(Debug, Clone, Serialize)]
pub struct Intermediates {
    pub ast: Program,
}

/// Outcome of one compile: the ladder IR plus every diagnostic
#[derive(Debug, Serialize)]
pub struct TransformResult {
    /// False when any error was recorded; warnings do not clear it
    pub success: bool,
    pub rungs: Vec<Rung>,
    pub variables: Vec<VariableInfo>,
    pub function_blocks: Vec<FunctionBlockInfo>,
    pub errors: Vec<Diagnostic>,
    pub warnings: Vec<Diagnostic>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub intermediates: Option<Intermediates>,
}

/// Compile a Structured Text source string to ladder IR.
///
/// Never panics on user input. Parse errors disable IR generation
/// entirely; validator errors clear `success` but leave the rungs in
/// place so tools can show partial results.
pub fn transform(source: &str, options: &TransformOptions) -> TransformResult {
    let parsed = parser::parse(source);

    if parsed.has_errors() {
        let table = transform::SymbolTable::from_program(&parsed.program);
        let intermediates = options.include_intermediates.then(|| Intermediates {
            ast: parsed.program.clone(),
        });
        return TransformResult {
            success: false,
            rungs: Vec::new(),
            variables: table.variables().to_vec(),
            function_blocks: table.blocks().to_vec(),
            errors: parsed.diagnostics,
            warnings: Vec::new(),
            intermediates,
        };
    }

    let lowered = transform::lower(&parsed.program);
    let report = validator::validate(&lowered, source, options.warn_on_unsupported);

    let intermediates = options.include_intermediates.then(|| Intermediates {
        ast: parsed.program.clone(),
    });

    TransformResult {
        success: report.is_ok(),
        rungs: lowered.rungs,
        variables: lowered.table.variables().to_vec(),
        function_blocks: lowered.table.blocks().to_vec(),
        errors: report.errors,
        warnings: report.warnings,
        intermediates,
    }
}
