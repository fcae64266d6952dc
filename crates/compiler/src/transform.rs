//! Lowering from the Structured Text AST to ladder IR
//!
//! Two passes. Pass 1 walks the variable blocks and builds the symbol
//! table: primitive declarations become `VariableInfo`, function-block
//! declarations become `FunctionBlockInfo`. Pass 2 lowers statements to
//! rungs in source order. Control flow is folded into the rungs it
//! dominates: an IF prepends its condition in series to every rung its
//! body produced, a CASE prepends the per-clause label condition.
//!
//! Two simplifications are intentional and kept from the original
//! design: an ELSIF branch uses its own condition without negating the
//! conditions of earlier branches, and CASE ELSE statements are emitted
//! unconditioned.

use crate::ast::{
    BinaryOp, CaseLabel, DataType, Expression, FbType, LiteralValue, Program, Span, Statement,
    UnaryOp, VarScope,
};
use crate::ladder::{
    CoilKind, CompareOp, ContactKind, CounterKind, Network, Rung, RungOutput, TimerKind,
};
use serde::Serialize;
use std::collections::BTreeMap;

/// Default counter preset when `PV` is missing or not an integer literal
const DEFAULT_COUNTER_PRESET: i64 = 10;

/// A primitive variable known to the program
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VariableInfo {
    pub name: String,
    pub scope: VarScope,
    pub data_type: DataType,
    #[serde(skip)]
    pub span: Span,
}

/// A function-block instance known to the program
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FunctionBlockInfo {
    pub name: String,
    pub fb_type: FbType,
    #[serde(skip)]
    pub span: Span,
}

/// Declaration tables built in pass 1.
///
/// Lookup is case-insensitive; the stored entries keep the declared
/// spelling for display.
#[derive(Debug, Default, Clone)]
pub struct SymbolTable {
    variables: Vec<VariableInfo>,
    blocks: Vec<FunctionBlockInfo>,
    variable_index: BTreeMap<String, usize>,
    block_index: BTreeMap<String, usize>,
}

impl SymbolTable {
    pub fn from_program(program: &Program) -> SymbolTable {
        let mut table = SymbolTable::default();
        for block in &program.var_blocks {
            for decl in &block.decls {
                for name in &decl.names {
                    match decl.data_type {
                        DataType::FunctionBlock(fb_type) => {
                            table.insert_block(FunctionBlockInfo {
                                name: name.clone(),
                                fb_type,
                                span: decl.span,
                            });
                        }
                        _ => {
                            table.insert_variable(VariableInfo {
                                name: name.clone(),
                                scope: block.scope,
                                data_type: decl.data_type,
                                span: decl.span,
                            });
                        }
                    }
                }
            }
        }
        table
    }

    fn insert_variable(&mut self, info: VariableInfo) {
        let key = info.name.to_ascii_lowercase();
        if self.variable_index.contains_key(&key) {
            return;
        }
        self.variable_index.insert(key, self.variables.len());
        self.variables.push(info);
    }

    fn insert_block(&mut self, info: FunctionBlockInfo) {
        let key = info.name.to_ascii_lowercase();
        if self.block_index.contains_key(&key) {
            return;
        }
        self.block_index.insert(key, self.blocks.len());
        self.blocks.push(info);
    }

    pub fn variable(&self, name: &str) -> Option<&VariableInfo> {
        self.variable_index
            .get(&name.to_ascii_lowercase())
            .map(|&i| &self.variables[i])
    }

    pub fn block(&self, name: &str) -> Option<&FunctionBlockInfo> {
        self.block_index
            .get(&name.to_ascii_lowercase())
            .map(|&i| &self.blocks[i])
    }

    pub fn variables(&self) -> &[VariableInfo] {
        &self.variables
    }

    pub fn blocks(&self) -> &[FunctionBlockInfo] {
        &self.blocks
    }
}

/// A name mentioned by a rung, with the span it came from
#[derive(Debug, Clone, PartialEq)]
pub struct Reference {
    /// Dotted path as written, e.g. `Delay.Q`
    pub path: String,
    pub span: Span,
}

/// Result of pass 2
#[derive(Debug)]
pub struct TransformOutput {
    pub rungs: Vec<Rung>,
    pub table: SymbolTable,
    /// Every name referenced while lowering, for declaration checks
    pub references: Vec<Reference>,
    /// Statement forms that cannot be represented as ladder
    pub unsupported: Vec<(&'static str, Span)>,
}

/// Lower a parsed program to ladder rungs
pub fn lower(program: &Program) -> TransformOutput {
    let table = SymbolTable::from_program(program);
    let mut transformer = Transformer {
        table,
        references: Vec::new(),
        unsupported: Vec::new(),
    };

    let mut rungs = Vec::new();
    for statement in &program.statements {
        rungs.extend(transformer.lower_statement(statement));
    }
    let mut rungs = merge_fanout(rungs);
    for (index, rung) in rungs.iter_mut().enumerate() {
        rung.index = index;
    }

    TransformOutput {
        rungs,
        table: transformer.table,
        references: transformer.references,
        unsupported: transformer.unsupported,
    }
}

/// Merge consecutive rungs with structurally identical inputs into one
/// rung with a fan-out output
fn merge_fanout(rungs: Vec<Rung>) -> Vec<Rung> {
    let mut merged: Vec<Rung> = Vec::new();
    for rung in rungs {
        match merged.last_mut() {
            Some(last) if last.input == rung.input => {
                let previous = std::mem::replace(
                    &mut last.output,
                    RungOutput::Multi { outputs: Vec::new() },
                );
                let mut outputs = match previous {
                    RungOutput::Multi { outputs } => outputs,
                    single => vec![single],
                };
                outputs.push(rung.output);
                last.output = RungOutput::Multi { outputs };
                last.source_span = last.source_span.merge(rung.source_span);
            }
            _ => merged.push(rung),
        }
    }
    merged
}

struct Transformer {
    table: SymbolTable,
    references: Vec<Reference>,
    unsupported: Vec<(&'static str, Span)>,
}

impl Transformer {
    fn lower_statement(&mut self, statement: &Statement) -> Vec<Rung> {
        match statement {
            Statement::Assignment { target, value, span } => {
                let input = self.expression_to_network(value);
                self.record_path(target, *span);
                vec![rung(
                    input,
                    RungOutput::Coil {
                        variable: target.join("."),
                        kind: CoilKind::Standard,
                    },
                    *span,
                )]
            }

            Statement::FbCall {
                instance,
                args,
                span,
            } => self.lower_fb_call(instance, args, *span),

            Statement::If {
                condition,
                then_branch,
                elsif_branches,
                else_branch,
                span: _,
            } => {
                let cond = self.expression_to_network(condition);

                let mut rungs = Vec::new();
                for stmt in then_branch {
                    for r in self.lower_statement(stmt) {
                        rungs.push(prepend(cond.clone(), r));
                    }
                }

                // Documented simplification: each ELSIF uses only its own
                // condition
                for (elsif_cond, body) in elsif_branches {
                    let branch_cond = self.expression_to_network(elsif_cond);
                    for stmt in body {
                        for r in self.lower_statement(stmt) {
                            rungs.push(prepend(branch_cond.clone(), r));
                        }
                    }
                }

                // ELSE negates the top IF condition only
                if let Some(body) = else_branch {
                    let negated = cond.negate();
                    for stmt in body {
                        for r in self.lower_statement(stmt) {
                            rungs.push(prepend(negated.clone(), r));
                        }
                    }
                }
                rungs
            }

            Statement::Case {
                selector,
                clauses,
                else_branch,
                span: _,
            } => {
                let selector_text = selector.to_string();
                self.record_expression(selector);

                let mut rungs = Vec::new();
                for clause in clauses {
                    let cond = case_condition(&selector_text, &clause.labels);
                    for stmt in &clause.body {
                        for r in self.lower_statement(stmt) {
                            rungs.push(prepend(cond.clone(), r));
                        }
                    }
                }

                // Documented simplification: ELSE statements are emitted
                // without a guarding condition
                if let Some(body) = else_branch {
                    for stmt in body {
                        rungs.extend(self.lower_statement(stmt));
                    }
                }
                rungs
            }

            Statement::For { span, .. } => {
                self.unsupported.push(("FOR", *span));
                Vec::new()
            }
            Statement::While { span, .. } => {
                self.unsupported.push(("WHILE", *span));
                Vec::new()
            }
            Statement::Repeat { span, .. } => {
                self.unsupported.push(("REPEAT", *span));
                Vec::new()
            }
        }
    }

    fn lower_fb_call(
        &mut self,
        instance: &str,
        args: &[(String, Expression)],
        span: Span,
    ) -> Vec<Rung> {
        self.references.push(Reference {
            path: instance.to_string(),
            span,
        });
        for (_, expr) in args {
            self.record_expression(expr);
        }

        let fb_type = self.table.block(instance).map(|b| b.fb_type);
        let arg = |name: &str| {
            args.iter()
                .find(|(n, _)| n.eq_ignore_ascii_case(name))
                .map(|(_, e)| e)
        };

        match fb_type {
            Some(fb @ (FbType::Ton | FbType::Tof | FbType::Tp)) => {
                let input = self.arg_network(arg("IN"));
                let preset = arg("PT").map(|e| e.to_string()).unwrap_or_default();
                let kind = match fb {
                    FbType::Ton => TimerKind::Ton,
                    FbType::Tof => TimerKind::Tof,
                    _ => TimerKind::Tp,
                };
                vec![rung(
                    input,
                    RungOutput::Timer {
                        instance: instance.to_string(),
                        kind,
                        preset,
                    },
                    span,
                )]
            }

            Some(fb @ (FbType::Ctu | FbType::Ctd | FbType::Ctud)) => {
                // CTUD counts through CU when present, CD otherwise
                let input_expr = match fb {
                    FbType::Ctd => arg("CD"),
                    FbType::Ctu => arg("CU"),
                    _ => arg("CU").or_else(|| arg("CD")),
                };
                let input = self.arg_network(input_expr);
                let preset = arg("PV")
                    .and_then(|e| e.as_int_literal())
                    .unwrap_or(DEFAULT_COUNTER_PRESET);
                let kind = match fb {
                    FbType::Ctu => CounterKind::Ctu,
                    FbType::Ctd => CounterKind::Ctd,
                    _ => CounterKind::Ctud,
                };
                vec![rung(
                    input,
                    RungOutput::Counter {
                        instance: instance.to_string(),
                        kind,
                        preset,
                    },
                    span,
                )]
            }

            // Edge detectors render as transition-sensing coils
            Some(FbType::RTrig) => vec![rung(
                self.arg_network(arg("CLK")),
                RungOutput::Coil {
                    variable: instance.to_string(),
                    kind: CoilKind::PosTrans,
                },
                span,
            )],
            Some(FbType::FTrig) => vec![rung(
                self.arg_network(arg("CLK")),
                RungOutput::Coil {
                    variable: instance.to_string(),
                    kind: CoilKind::NegTrans,
                },
                span,
            )],

            // Bistables render as a set/reset coil pair; the dominant
            // input is emitted last
            Some(FbType::Sr) => {
                let mut rungs = Vec::new();
                if let Some(reset) = arg("R") {
                    let input = self.expression_to_network(reset);
                    rungs.push(rung(
                        input,
                        RungOutput::Coil {
                            variable: instance.to_string(),
                            kind: CoilKind::Reset,
                        },
                        span,
                    ));
                }
                if let Some(set) = arg("S1") {
                    let input = self.expression_to_network(set);
                    rungs.push(rung(
                        input,
                        RungOutput::Coil {
                            variable: instance.to_string(),
                            kind: CoilKind::Set,
                        },
                        span,
                    ));
                }
                rungs
            }
            Some(FbType::Rs) => {
                let mut rungs = Vec::new();
                if let Some(set) = arg("S") {
                    let input = self.expression_to_network(set);
                    rungs.push(rung(
                        input,
                        RungOutput::Coil {
                            variable: instance.to_string(),
                            kind: CoilKind::Set,
                        },
                        span,
                    ));
                }
                if let Some(reset) = arg("R1") {
                    let input = self.expression_to_network(reset);
                    rungs.push(rung(
                        input,
                        RungOutput::Coil {
                            variable: instance.to_string(),
                            kind: CoilKind::Reset,
                        },
                        span,
                    ));
                }
                rungs
            }

            // No declaration: degrade to a standard coil named after the
            // instance; the validator reports the missing declaration
            None => {
                let input = self.arg_network(args.first().map(|(_, e)| e));
                vec![rung(
                    input,
                    RungOutput::Coil {
                        variable: instance.to_string(),
                        kind: CoilKind::Standard,
                    },
                    span,
                )]
            }
        }
    }

    fn arg_network(&mut self, expr: Option<&Expression>) -> Network {
        match expr {
            Some(e) => self.expression_to_network(e),
            None => Network::True,
        }
    }

    /// Map a boolean expression to its contact network
    fn expression_to_network(&mut self, expr: &Expression) -> Network {
        match expr {
            Expression::Binary { op, left, right, .. } => match op {
                BinaryOp::And => {
                    let l = self.expression_to_network(left);
                    let r = self.expression_to_network(right);
                    Network::series(vec![l, r])
                }
                BinaryOp::Or => {
                    let l = self.expression_to_network(left);
                    let r = self.expression_to_network(right);
                    Network::parallel(vec![l, r])
                }
                BinaryOp::Xor => {
                    let l = self.expression_to_network(left);
                    let r = self.expression_to_network(right);
                    Network::parallel(vec![
                        Network::series(vec![l.clone(), r.negate()]),
                        Network::series(vec![l.negate(), r]),
                    ])
                }
                op if op.is_comparison() => {
                    self.record_expression(left);
                    self.record_expression(right);
                    Network::Comparator {
                        op: compare_op(*op),
                        left: left.to_string(),
                        right: right.to_string(),
                    }
                }
                // Arithmetic in boolean context tests non-zero
                _ => {
                    self.record_expression(expr);
                    Network::Comparator {
                        op: CompareOp::Ne,
                        left: expr.to_string(),
                        right: "0".to_string(),
                    }
                }
            },

            Expression::Unary { op, operand, .. } => match op {
                UnaryOp::Not => self.expression_to_network(operand).negate(),
                UnaryOp::Neg => {
                    self.record_expression(expr);
                    Network::Comparator {
                        op: CompareOp::Ne,
                        left: expr.to_string(),
                        right: "0".to_string(),
                    }
                }
            },

            Expression::Variable { path, span } => {
                self.record_path(path, *span);
                Network::contact(path.join("."), ContactKind::NormallyOpen)
            }

            Expression::Literal { value, raw, .. } => match value {
                LiteralValue::Bool(true) => Network::True,
                LiteralValue::Bool(false) => Network::never(),
                _ => Network::Comparator {
                    op: CompareOp::Ne,
                    left: raw.clone(),
                    right: "0".to_string(),
                },
            },

            Expression::Paren { inner, .. } => self.expression_to_network(inner),

            Expression::Call { args, .. } => {
                for arg in args {
                    self.record_expression(arg);
                }
                Network::Comparator {
                    op: CompareOp::Ne,
                    left: expr.to_string(),
                    right: "0".to_string(),
                }
            }
        }
    }

    /// Record every variable mentioned inside `expr`
    fn record_expression(&mut self, expr: &Expression) {
        match expr {
            Expression::Binary { left, right, .. } => {
                self.record_expression(left);
                self.record_expression(right);
            }
            Expression::Unary { operand, .. } => self.record_expression(operand),
            Expression::Variable { path, span } => self.record_path(path, *span),
            Expression::Paren { inner, .. } => self.record_expression(inner),
            Expression::Call { args, .. } => {
                for arg in args {
                    self.record_expression(arg);
                }
            }
            Expression::Literal { .. } => {}
        }
    }

    fn record_path(&mut self, path: &[String], span: Span) {
        self.references.push(Reference {
            path: path.join("."),
            span,
        });
    }
}

fn rung(input: Network, output: RungOutput, span: Span) -> Rung {
    Rung {
        index: 0,
        input,
        output,
        comment: None,
        source_span: span,
    }
}

fn prepend(condition: Network, mut r: Rung) -> Rung {
    r.input = Network::series(vec![condition, r.input]);
    r
}

/// Build the guarding condition for one CASE clause
fn case_condition(selector: &str, labels: &[CaseLabel]) -> Network {
    let single = |label: &CaseLabel| match label {
        CaseLabel::Value(v) => Network::Comparator {
            op: CompareOp::Eq,
            left: selector.to_string(),
            right: v.to_string(),
        },
        CaseLabel::Range(low, high) => Network::series(vec![
            Network::Comparator {
                op: CompareOp::Ge,
                left: selector.to_string(),
                right: low.to_string(),
            },
            Network::Comparator {
                op: CompareOp::Le,
                left: selector.to_string(),
                right: high.to_string(),
            },
        ]),
    };

    if labels.len() == 1 {
        single(&labels[0])
    } else {
        Network::parallel(labels.iter().map(single).collect())
    }
}

fn compare_op(op: BinaryOp) -> CompareOp {
    match op {
        BinaryOp::Eq => CompareOp::Eq,
        BinaryOp::Ne => CompareOp::Ne,
        BinaryOp::Gt => CompareOp::Gt,
        BinaryOp::Ge => CompareOp::Ge,
        BinaryOp::Lt => CompareOp::Lt,
        BinaryOp::Le => CompareOp::Le,
        other => unreachable!("not a comparison operator: {:?}", other),
    }
}
