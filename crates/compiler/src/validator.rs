//! Ladder IR validation
//!
//! Runs after lowering and checks the rung list against the declaration
//! tables: every referenced name must trace back to a declaration, every
//! output must be reachable from the power rail, and suspicious shapes
//! (unconditioned rungs, dead rungs, NO/NC contradictions) are reported
//! as warnings. Errors clear the compile result's success flag but never
//! suppress the IR itself, so tools can still show partial results.

use crate::ast::Span;
use crate::diagnostics::{Diagnostic, DiagnosticKind};
use crate::ladder::{ContactKind, Network, Rung};
use crate::transform::TransformOutput;
use std::collections::BTreeSet;

/// Members of a function-block instance readable from expressions
const FB_OUTPUT_MEMBERS: &[&str] = &["Q", "ET", "CV", "QU", "QD", "Q1"];

/// Names accepted without any declaration
const RESERVED_NAMES: &[&str] = &["TRUE", "FALSE", ""];

#[derive(Debug, Default)]
pub struct ValidationReport {
    pub errors: Vec<Diagnostic>,
    pub warnings: Vec<Diagnostic>,
}

impl ValidationReport {
    pub fn is_ok(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Validate lowered rungs against the symbol table
pub fn validate(output: &TransformOutput, source: &str, warn_on_unsupported: bool) -> ValidationReport {
    let mut report = ValidationReport::default();

    for rung in &output.rungs {
        check_power_flow(rung, source, &mut report);
        check_contradictions(&rung.input, rung.source_span, source, &mut report);
    }

    check_declarations(output, source, &mut report);
    check_unused(output, source, &mut report);

    if warn_on_unsupported {
        for (form, span) in &output.unsupported {
            report.warnings.push(Diagnostic::at_span(
                DiagnosticKind::UnsupportedInLadder,
                format!(
                    "{} statement cannot be represented in ladder logic; it is skipped in the diagram but still executes in simulation",
                    form
                ),
                *span,
                source,
            ));
        }
    }

    report
}

/// Orphaned-output, always-true, always-false, and power-flow checks
fn check_power_flow(rung: &Rung, source: &str, report: &mut ValidationReport) {
    let input = &rung.input;

    if *input == Network::True {
        report.warnings.push(Diagnostic::at_span(
            DiagnosticKind::AlwaysTrue,
            format!("rung {} is always energised; its output is unconditional", rung.index),
            rung.source_span,
            source,
        ));
        return;
    }

    if input.is_never() {
        report.warnings.push(Diagnostic::at_span(
            DiagnosticKind::AlwaysFalse,
            format!("rung {} can never be energised; its output never activates", rung.index),
            rung.source_span,
            source,
        ));
        return;
    }

    if !input.has_condition() {
        report.errors.push(Diagnostic::at_span(
            DiagnosticKind::OrphanedOutput,
            format!(
                "rung {} has no contact or comparator between the rails and its output",
                rung.index
            ),
            rung.source_span,
            source,
        ));
        return;
    }

    if is_dead(input) {
        report.errors.push(Diagnostic::at_span(
            DiagnosticKind::PowerFlowBreak,
            format!(
                "rung {} contains a branch through which power can never flow",
                rung.index
            ),
            rung.source_span,
            source,
        ));
    }
}

/// True when no assignment of variables can energise the network
/// (structurally: it contains the never-energised pseudo-contact in
/// every path)
fn is_dead(network: &Network) -> bool {
    match network {
        Network::Contact { .. } => network.is_never(),
        Network::Comparator { .. } => false,
        Network::Series { elements } => elements.iter().any(is_dead),
        Network::Parallel { branches } => branches.iter().all(is_dead),
        Network::True => false,
    }
}

/// NO and NC contacts on the same variable at the same series level
fn check_contradictions(
    network: &Network,
    span: Span,
    source: &str,
    report: &mut ValidationReport,
) {
    if let Network::Series { elements } = network {
        let mut open: Vec<&str> = Vec::new();
        let mut closed: Vec<&str> = Vec::new();
        for element in elements {
            if let Network::Contact { variable, kind } = element {
                match kind {
                    ContactKind::NormallyOpen => open.push(variable),
                    ContactKind::NormallyClosed => closed.push(variable),
                    _ => {}
                }
            }
        }
        for name in &open {
            if closed.iter().any(|c| c.eq_ignore_ascii_case(name)) {
                report.warnings.push(Diagnostic::at_span(
                    DiagnosticKind::Contradiction,
                    format!(
                        "'{}' appears both normally-open and normally-closed in the same series; the branch can never conduct",
                        name
                    ),
                    span,
                    source,
                ));
            }
        }
    }

    match network {
        Network::Series { elements } => {
            for e in elements {
                check_contradictions(e, span, source, report);
            }
        }
        Network::Parallel { branches } => {
            for b in branches {
                check_contradictions(b, span, source, report);
            }
        }
        _ => {}
    }
}

/// Every referenced name must resolve to a declaration, a function-block
/// output path, or a reserved name
fn check_declarations(output: &TransformOutput, source: &str, report: &mut ValidationReport) {
    let mut reported: BTreeSet<String> = BTreeSet::new();

    for reference in &output.references {
        let key = reference.path.to_ascii_lowercase();
        if reported.contains(&key) {
            continue;
        }

        if let Some(message) = resolve_failure(output, &reference.path) {
            reported.insert(key);
            report.errors.push(Diagnostic::at_span(
                DiagnosticKind::UndeclaredVariable,
                message,
                reference.span,
                source,
            ));
        }
    }
}

/// `None` when the path resolves; otherwise the error message
fn resolve_failure(output: &TransformOutput, path: &str) -> Option<String> {
    if RESERVED_NAMES.iter().any(|r| r.eq_ignore_ascii_case(path)) {
        return None;
    }

    let mut parts = path.split('.');
    let head = parts.next().unwrap_or("");
    let member = parts.next();

    if parts.next().is_some() {
        return Some(format!("'{}' has too many path components", path));
    }

    match member {
        None => {
            if output.table.variable(head).is_some() || output.table.block(head).is_some() {
                None
            } else {
                Some(format!("'{}' is not declared", head))
            }
        }
        Some(member) => {
            if output.table.block(head).is_none() {
                return Some(format!(
                    "'{}' is not a declared function block, so '{}' cannot be read",
                    head, path
                ));
            }
            if FB_OUTPUT_MEMBERS.iter().any(|m| m.eq_ignore_ascii_case(member)) {
                None
            } else {
                Some(format!(
                    "'{}' is not a readable output of function block '{}'",
                    member, head
                ))
            }
        }
    }
}

/// Declared names that no rung mentions
fn check_unused(output: &TransformOutput, source: &str, report: &mut ValidationReport) {
    let referenced: BTreeSet<String> = output
        .references
        .iter()
        .map(|r| {
            r.path
                .split('.')
                .next()
                .unwrap_or("")
                .to_ascii_lowercase()
        })
        .collect();

    for variable in output.table.variables() {
        if !referenced.contains(&variable.name.to_ascii_lowercase()) {
            report.warnings.push(Diagnostic::at_span(
                DiagnosticKind::UnusedVariable,
                format!("variable '{}' is declared but never used", variable.name),
                variable.span,
                source,
            ));
        }
    }
    for block in output.table.blocks() {
        if !referenced.contains(&block.name.to_ascii_lowercase()) {
            report.warnings.push(Diagnostic::at_span(
                DiagnosticKind::UnusedVariable,
                format!(
                    "function block '{}' is declared but never used",
                    block.name
                ),
                block.span,
                source,
            ));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse;
    use crate::transform::lower;

    fn validate_source(source: &str) -> ValidationReport {
        let result = parse(source);
        assert!(
            !result.has_errors(),
            "unexpected parse errors: {:?}",
            result.diagnostics
        );
        validate(&lower(&result.program), source, true)
    }

    fn kinds(diagnostics: &[Diagnostic]) -> Vec<DiagnosticKind> {
        diagnostics.iter().map(|d| d.kind).collect()
    }

    #[test]
    fn test_clean_program_passes() {
        let report = validate_source(
            "VAR A, B, M : BOOL; END_VAR M := (A OR M) AND NOT B;",
        );
        assert!(report.is_ok());
        assert!(report.warnings.is_empty(), "{:?}", report.warnings);
    }

    #[test]
    fn test_undeclared_variable_is_error() {
        let report = validate_source("VAR X : BOOL; END_VAR X := Ghost;");
        assert_eq!(kinds(&report.errors), vec![DiagnosticKind::UndeclaredVariable]);
        assert!(report.errors[0].message.contains("Ghost"));
    }

    #[test]
    fn test_undeclared_reported_once_per_name() {
        let report = validate_source(
            "VAR X, Y : BOOL; END_VAR X := Ghost; Y := Ghost;",
        );
        assert_eq!(report.errors.len(), 1);
    }

    #[test]
    fn test_fb_output_paths_are_accepted() {
        let report = validate_source(
            "VAR Delay : TON; C1 : CTU; Out : BOOL; N : INT; P : BOOL; END_VAR \
             Delay(IN := P, PT := T#1s); \
             C1(CU := P, PV := 3); \
             Out := Delay.Q; \
             N := C1.CV;",
        );
        assert!(report.is_ok(), "{:?}", report.errors);
    }

    #[test]
    fn test_bad_fb_member_is_error() {
        let report = validate_source(
            "VAR Delay : TON; Out : BOOL; END_VAR Delay(IN := Out); Out := Delay.BOGUS;",
        );
        assert_eq!(kinds(&report.errors), vec![DiagnosticKind::UndeclaredVariable]);
        assert!(report.errors[0].message.contains("BOGUS"));
    }

    #[test]
    fn test_dotted_path_on_scalar_is_error() {
        let report = validate_source(
            "VAR A : INT; X : BOOL; END_VAR X := A.Q;",
        );
        assert_eq!(kinds(&report.errors), vec![DiagnosticKind::UndeclaredVariable]);
    }

    #[test]
    fn test_undeclared_fb_instance_call_is_error() {
        // The rung degrades to a coil named after the instance, and the
        // validator reports the missing declaration
        let report = validate_source("VAR Run : BOOL; END_VAR Mystery(IN := Run);");
        assert!(report
            .errors
            .iter()
            .any(|d| d.kind == DiagnosticKind::UndeclaredVariable
                && d.message.contains("Mystery")));
    }

    #[test]
    fn test_unused_variable_warning() {
        let report = validate_source(
            "VAR A, X : BOOL; Spare : INT; IdleTimer : TON; END_VAR X := A;",
        );
        assert!(report.is_ok());
        let unused: Vec<&str> = report
            .warnings
            .iter()
            .filter(|d| d.kind == DiagnosticKind::UnusedVariable)
            .map(|d| d.message.as_str())
            .collect();
        assert_eq!(unused.len(), 2);
        assert!(unused.iter().any(|m| m.contains("Spare")));
        assert!(unused.iter().any(|m| m.contains("IdleTimer")));
    }

    #[test]
    fn test_always_true_warning() {
        let report = validate_source("VAR X : BOOL; END_VAR X := TRUE;");
        assert!(report.is_ok());
        assert_eq!(kinds(&report.warnings), vec![DiagnosticKind::AlwaysTrue]);
    }

    #[test]
    fn test_always_false_warning() {
        let report = validate_source("VAR X : BOOL; END_VAR X := FALSE;");
        assert!(report.is_ok());
        assert_eq!(kinds(&report.warnings), vec![DiagnosticKind::AlwaysFalse]);
    }

    #[test]
    fn test_power_flow_break_on_dead_series() {
        let report = validate_source("VAR A, X : BOOL; END_VAR X := A AND FALSE;");
        assert_eq!(kinds(&report.errors), vec![DiagnosticKind::PowerFlowBreak]);
    }

    #[test]
    fn test_contradiction_same_series_level() {
        let report = validate_source("VAR A, B, X : BOOL; END_VAR X := A AND B AND NOT A;");
        assert!(report.is_ok());
        assert!(report
            .warnings
            .iter()
            .any(|d| d.kind == DiagnosticKind::Contradiction && d.message.contains("A")));
    }

    #[test]
    fn test_no_contradiction_across_parallel_branches() {
        // A OR NOT A spans different branches, not the same series level
        let report = validate_source("VAR A, X : BOOL; END_VAR X := A OR NOT A;");
        assert!(!report
            .warnings
            .iter()
            .any(|d| d.kind == DiagnosticKind::Contradiction));
    }

    #[test]
    fn test_unsupported_loop_warning_gated_by_option() {
        let source = "VAR I : INT; END_VAR FOR I := 1 TO 3 DO I := I; END_FOR;";
        let result = parse(source);
        let lowered = lower(&result.program);
        let with = validate(&lowered, source, true);
        assert!(with
            .warnings
            .iter()
            .any(|d| d.kind == DiagnosticKind::UnsupportedInLadder));
        let without = validate(&lowered, source, false);
        assert!(!without
            .warnings
            .iter()
            .any(|d| d.kind == DiagnosticKind::UnsupportedInLadder));
    }

    #[test]
    fn test_orphaned_output_for_hand_built_ir() {
        use crate::ladder::{CoilKind, Network, Rung, RungOutput};
        // IR built programmatically (not via lowering) can contain an
        // empty parallel group
        let result = parse("VAR X : BOOL; END_VAR");
        let mut lowered = lower(&result.program);
        lowered.rungs.push(Rung {
            index: 0,
            input: Network::Parallel { branches: vec![] },
            output: RungOutput::Coil {
                variable: "X".to_string(),
                kind: CoilKind::Standard,
            },
            comment: None,
            source_span: Span::new(0, 0),
        });
        let report = validate(&lowered, "VAR X : BOOL; END_VAR", true);
        assert!(report
            .errors
            .iter()
            .any(|d| d.kind == DiagnosticKind::OrphanedOutput));
    }
}
