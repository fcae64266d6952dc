//! Diagnostics for the compile pipeline and the runtime log
//!
//! Every reportable condition in the system carries one of a closed set
//! of kinds. Parse errors come from the lexer/parser, the semantic kinds
//! from the ladder validator, and the runtime kinds from the cyclic
//! interpreter's per-scan log. Diagnostics are accumulated in lists and
//! returned; nothing in the pipeline panics or throws on user input.

use crate::ast::Span;
use serde::Serialize;
use std::fmt;

/// Maximum length of the source excerpt attached to a diagnostic
pub const EXCERPT_LIMIT: usize = 50;

/// Closed taxonomy of diagnostic kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum DiagnosticKind {
    /// Lexical or syntactic error; the parser skips to a recovery point
    Parse,
    /// A referenced name has no declaration
    UndeclaredVariable,
    /// Rung input network has no contact or comparator
    OrphanedOutput,
    /// Power can never reach the rung output
    PowerFlowBreak,
    /// Integer division or modulo by zero during a scan
    DivisionByZero,
    /// Assignment targeted a function-block output member
    WriteToFbOutput,
    /// Declared but never referenced in any rung
    UnusedVariable,
    /// Statement form that cannot be represented as ladder
    UnsupportedInLadder,
    /// Rung input is exactly the energised rail
    AlwaysTrue,
    /// Rung input is exactly the never-energised pseudo-contact
    AlwaysFalse,
    /// A variable appears both NO and NC at the same series level
    Contradiction,
}

impl DiagnosticKind {
    /// Canonical wire name of the kind
    pub fn as_str(self) -> &'static str {
        match self {
            DiagnosticKind::Parse => "PARSE",
            DiagnosticKind::UndeclaredVariable => "UNDECLARED_VARIABLE",
            DiagnosticKind::OrphanedOutput => "ORPHANED_OUTPUT",
            DiagnosticKind::PowerFlowBreak => "POWER_FLOW_BREAK",
            DiagnosticKind::DivisionByZero => "DIVISION_BY_ZERO",
            DiagnosticKind::WriteToFbOutput => "WRITE_TO_FB_OUTPUT",
            DiagnosticKind::UnusedVariable => "UNUSED_VARIABLE",
            DiagnosticKind::UnsupportedInLadder => "UNSUPPORTED_IN_LADDER",
            DiagnosticKind::AlwaysTrue => "ALWAYS_TRUE",
            DiagnosticKind::AlwaysFalse => "ALWAYS_FALSE",
            DiagnosticKind::Contradiction => "CONTRADICTION",
        }
    }

    pub fn severity(self) -> Severity {
        match self {
            DiagnosticKind::Parse
            | DiagnosticKind::UndeclaredVariable
            | DiagnosticKind::OrphanedOutput
            | DiagnosticKind::PowerFlowBreak
            | DiagnosticKind::DivisionByZero
            | DiagnosticKind::WriteToFbOutput => Severity::Error,
            DiagnosticKind::UnusedVariable
            | DiagnosticKind::UnsupportedInLadder
            | DiagnosticKind::AlwaysTrue
            | DiagnosticKind::AlwaysFalse
            | DiagnosticKind::Contradiction => Severity::Warning,
        }
    }
}

impl fmt::Display for DiagnosticKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Error,
    Warning,
}

/// A single diagnostic with its source location, where available
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Diagnostic {
    pub kind: DiagnosticKind,
    pub severity: Severity,
    pub message: String,
    /// 1-based line, `None` when no source span applies
    pub line: Option<usize>,
    /// 1-based column
    pub column: Option<usize>,
    /// Up to [`EXCERPT_LIMIT`] characters of the offending source
    pub excerpt: String,
}

impl Diagnostic {
    /// Diagnostic without a source location (runtime log entries)
    pub fn bare(kind: DiagnosticKind, message: impl Into<String>) -> Self {
        Diagnostic {
            kind,
            severity: kind.severity(),
            message: message.into(),
            line: None,
            column: None,
            excerpt: String::new(),
        }
    }

    /// Diagnostic anchored at `span` within `source`
    pub fn at_span(kind: DiagnosticKind, message: impl Into<String>, span: Span, source: &str) -> Self {
        let (line, column) = line_col(source, span.start);
        Diagnostic {
            kind,
            severity: kind.severity(),
            message: message.into(),
            line: Some(line),
            column: Some(column),
            excerpt: excerpt(source, span),
        }
    }

    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let severity = match self.severity {
            Severity::Error => "error",
            Severity::Warning => "warning",
        };
        match (self.line, self.column) {
            (Some(line), Some(col)) => {
                write!(f, "{}:{}: {} [{}]: {}", line, col, severity, self.kind, self.message)?;
            }
            _ => {
                write!(f, "{} [{}]: {}", severity, self.kind, self.message)?;
            }
        }
        if !self.excerpt.is_empty() {
            write!(f, "\n  near: {}", self.excerpt)?;
        }
        Ok(())
    }
}

/// Convert a byte offset into a 1-based (line, column) pair.
///
/// Column counts characters, not bytes, so multibyte source renders
/// sensibly in editors.
pub fn line_col(source: &str, offset: usize) -> (usize, usize) {
    let clamped = offset.min(source.len());
    let before = &source[..clamped];
    let line = before.bytes().filter(|&b| b == b'\n').count() + 1;
    let line_start = before.rfind('\n').map(|p| p + 1).unwrap_or(0);
    let column = before[line_start..].chars().count() + 1;
    (line, column)
}

/// Extract at most [`EXCERPT_LIMIT`] characters of source at `span`,
/// trimmed and collapsed onto one line.
fn excerpt(source: &str, span: Span) -> String {
    let start = span.start.min(source.len());
    let end = span.end.clamp(start, source.len());
    let mut s = source.get(start..end).unwrap_or("").trim().to_string();
    if s.is_empty() {
        // Point span: show the rest of the line instead
        let tail = &source[start..];
        s = tail.lines().next().unwrap_or("").trim().to_string();
    }
    let collapsed: String = s.split_whitespace().collect::<Vec<_>>().join(" ");
    collapsed.chars().take(EXCERPT_LIMIT).collect()
}

/// Format a diagnostic list for CLI output, one per line, with an
/// optional file name prefix.
pub fn format_diagnostics(file: Option<&str>, diagnostics: &[Diagnostic]) -> String {
    let mut out = String::new();
    for d in diagnostics {
        if let Some(name) = file {
            out.push_str(name);
            out.push(':');
        }
        out.push_str(&d.to_string());
        out.push('\n');
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_line_col_basics() {
        let src = "abc\ndef\nghi";
        assert_eq!(line_col(src, 0), (1, 1));
        assert_eq!(line_col(src, 2), (1, 3));
        assert_eq!(line_col(src, 4), (2, 1));
        assert_eq!(line_col(src, 9), (3, 2));
    }

    #[test]
    fn test_line_col_clamps_past_end() {
        assert_eq!(line_col("ab", 99), (1, 3));
    }

    #[test]
    fn test_excerpt_is_limited_and_single_line() {
        let src = "X := A AND\n   B OR C;";
        let d = Diagnostic::at_span(
            DiagnosticKind::Parse,
            "test",
            Span::new(0, src.len()),
            src,
        );
        assert_eq!(d.excerpt, "X := A AND B OR C;");
        assert!(d.excerpt.chars().count() <= EXCERPT_LIMIT);

        let long = "Y := ".to_string() + &"Q OR ".repeat(40) + "Z;";
        let d = Diagnostic::at_span(
            DiagnosticKind::Parse,
            "test",
            Span::new(0, long.len()),
            &long,
        );
        assert_eq!(d.excerpt.chars().count(), EXCERPT_LIMIT);
    }

    #[test]
    fn test_kind_severity_split() {
        assert_eq!(DiagnosticKind::Parse.severity(), Severity::Error);
        assert_eq!(DiagnosticKind::DivisionByZero.severity(), Severity::Error);
        assert_eq!(DiagnosticKind::UnusedVariable.severity(), Severity::Warning);
        assert_eq!(DiagnosticKind::Contradiction.severity(), Severity::Warning);
    }

    #[test]
    fn test_display_format() {
        let src = "Motor := ;";
        let d = Diagnostic::at_span(
            DiagnosticKind::Parse,
            "expected an expression",
            Span::new(9, 10),
            src,
        );
        let text = d.to_string();
        assert!(text.starts_with("1:10: error [PARSE]: expected an expression"));
    }
}
