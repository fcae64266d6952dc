//! Cyclic interpreter
//!
//! One call to [`scan`] is one PLC scan cycle: advance the clock,
//! execute every top-level statement in source order, then advance the
//! running timers. The phases never reorder: statements observe each
//! timer's `Q` as computed before the tick, which is what makes the
//! self-resetting pattern `T(IN := Cond AND NOT T.Q)` pulse cleanly.
//!
//! Runtime faults (division by zero, writes to function-block outputs)
//! never abort the scan; they accumulate in the returned report and the
//! offending assignment is skipped.

use crate::counter::CounterKind;
use crate::state::{RuntimeState, SlotInit, SlotKind};
use crate::timer::TimerKind;
use crate::trigger::{BistableKind, EdgeKind};
use crate::value::{apply_binary, apply_unary, Value};
use rungc::ast::{
    BinaryOp, CaseLabel, DataType, Expression, FbType, LiteralValue, Program, Statement,
};
use rungc::diagnostics::{Diagnostic, DiagnosticKind};

/// Upper bound on iterations of one loop statement within one scan; a
/// real controller would trip its watchdog long before this
pub const MAX_LOOP_ITERATIONS: usize = 100_000;

/// Runtime faults collected during one scan
#[derive(Debug, Default)]
pub struct ScanReport {
    pub diagnostics: Vec<Diagnostic>,
}

impl ScanReport {
    pub fn is_clean(&self) -> bool {
        self.diagnostics.is_empty()
    }
}

/// Populate the store with a default-valued slot for every declaration.
///
/// Initial-value expressions are constant-folded; timers take `PT` and
/// counters take `PV` from them when present.
pub fn initialize(program: &Program, state: &mut RuntimeState) {
    let mut plan = Vec::new();

    for decl in program.declarations() {
        let init = decl.init.as_ref().and_then(const_value);
        for name in &decl.names {
            let slot = match decl.data_type {
                DataType::Bool => {
                    SlotInit::Bool(name.clone(), init.map(|v| v.truthy()).unwrap_or(false))
                }
                DataType::Int | DataType::Dint | DataType::Uint => {
                    SlotInit::Int(name.clone(), init.map(|v| v.as_int()).unwrap_or(0))
                }
                DataType::Real => {
                    SlotInit::Real(name.clone(), init.map(|v| v.as_real()).unwrap_or(0.0))
                }
                DataType::Time => {
                    SlotInit::Time(name.clone(), init.map(|v| v.as_time_ms()).unwrap_or(0))
                }
                DataType::FunctionBlock(fb) => match fb {
                    FbType::Ton | FbType::Tof | FbType::Tp => {
                        let kind = match fb {
                            FbType::Ton => TimerKind::Ton,
                            FbType::Tof => TimerKind::Tof,
                            _ => TimerKind::Tp,
                        };
                        let preset = init.map(|v| v.as_time_ms()).unwrap_or(0);
                        SlotInit::Timer(name.clone(), kind, preset)
                    }
                    FbType::Ctu | FbType::Ctd | FbType::Ctud => {
                        let kind = match fb {
                            FbType::Ctu => CounterKind::Ctu,
                            FbType::Ctd => CounterKind::Ctd,
                            _ => CounterKind::Ctud,
                        };
                        let preset = init.map(|v| v.as_int()).unwrap_or(0);
                        SlotInit::Counter(name.clone(), kind, preset)
                    }
                    FbType::RTrig => SlotInit::Edge(name.clone(), EdgeKind::Rising),
                    FbType::FTrig => SlotInit::Edge(name.clone(), EdgeKind::Falling),
                    FbType::Sr => SlotInit::Bistable(name.clone(), BistableKind::SetDominant),
                    FbType::Rs => SlotInit::Bistable(name.clone(), BistableKind::ResetDominant),
                },
            };
            plan.push(slot);
        }
    }

    state.install(plan);
}

/// Constant-fold an initial-value expression
fn const_value(expr: &Expression) -> Option<Value> {
    match expr {
        Expression::Literal { value, .. } => match value {
            LiteralValue::Bool(b) => Some(Value::Bool(*b)),
            LiteralValue::Int(n) => Some(Value::Int(*n as i32)),
            LiteralValue::Real(r) => Some(Value::Real(*r)),
            LiteralValue::Time(ms) => Some(Value::Time(*ms)),
            LiteralValue::Str(_) => None,
        },
        Expression::Paren { inner, .. } => const_value(inner),
        Expression::Unary { op, operand, .. } => {
            const_value(operand).map(|v| apply_unary(*op, v))
        }
        Expression::Binary { op, left, right, .. } => {
            let l = const_value(left)?;
            let r = const_value(right)?;
            apply_binary(*op, l, r).ok()
        }
        _ => None,
    }
}

/// Perform one scan cycle
pub fn scan(program: &Program, state: &mut RuntimeState, scan_ms: i64) -> ScanReport {
    // Phase 1: clock
    state.elapsed_ms += scan_ms;
    state.scan_count += 1;

    // Phase 2: statements in source order
    let mut interp = Interp {
        state: &mut *state,
        diagnostics: Vec::new(),
    };
    for statement in &program.statements {
        interp.exec(statement);
    }
    let diagnostics = interp.diagnostics;

    // Phase 3: time advance for running timers
    state.advance_timers(scan_ms);

    ScanReport { diagnostics }
}

struct Interp<'a> {
    state: &'a mut RuntimeState,
    diagnostics: Vec<Diagnostic>,
}

impl Interp<'_> {
    fn exec(&mut self, statement: &Statement) {
        match statement {
            Statement::Assignment { target, value, .. } => {
                let v = match self.eval(value) {
                    Ok(v) => v,
                    Err(diagnostic) => {
                        // Fault: leave the target unchanged
                        self.diagnostics.push(diagnostic);
                        return;
                    }
                };
                if target.len() > 1 {
                    self.diagnostics.push(Diagnostic::bare(
                        DiagnosticKind::WriteToFbOutput,
                        format!(
                            "write to '{}' ignored; function-block outputs are read-only",
                            target.join(".")
                        ),
                    ));
                    return;
                }
                self.state.write_scalar(&target[0], v);
            }

            Statement::FbCall { instance, args, .. } => {
                self.exec_fb_call(instance, args);
            }

            Statement::If {
                condition,
                then_branch,
                elsif_branches,
                else_branch,
                ..
            } => {
                if self.truthy(condition) {
                    self.exec_all(then_branch);
                    return;
                }
                for (cond, body) in elsif_branches {
                    if self.truthy(cond) {
                        self.exec_all(body);
                        return;
                    }
                }
                if let Some(body) = else_branch {
                    self.exec_all(body);
                }
            }

            Statement::Case {
                selector,
                clauses,
                else_branch,
                ..
            } => {
                let sel = match self.eval(selector) {
                    Ok(v) => v.as_time_ms(),
                    Err(diagnostic) => {
                        self.diagnostics.push(diagnostic);
                        return;
                    }
                };
                for clause in clauses {
                    let matched = clause.labels.iter().any(|label| match label {
                        CaseLabel::Value(v) => sel == *v,
                        CaseLabel::Range(low, high) => sel >= *low && sel <= *high,
                    });
                    if matched {
                        self.exec_all(&clause.body);
                        return;
                    }
                }
                if let Some(body) = else_branch {
                    self.exec_all(body);
                }
            }

            Statement::For {
                var,
                from,
                to,
                by,
                body,
                ..
            } => {
                let start = match self.eval(from) {
                    Ok(v) => v.as_int(),
                    Err(d) => {
                        self.diagnostics.push(d);
                        return;
                    }
                };
                let limit = match self.eval(to) {
                    Ok(v) => v.as_int(),
                    Err(d) => {
                        self.diagnostics.push(d);
                        return;
                    }
                };
                let step = match by {
                    Some(expr) => match self.eval(expr) {
                        Ok(v) => v.as_int(),
                        Err(d) => {
                            self.diagnostics.push(d);
                            return;
                        }
                    },
                    None => 1,
                };
                if step == 0 {
                    return;
                }

                let mut i = start;
                let mut iterations = 0;
                while (step > 0 && i <= limit) || (step < 0 && i >= limit) {
                    self.state.write_scalar(var, Value::Int(i));
                    self.exec_all(body);
                    // The body may write the loop variable
                    i = self
                        .state
                        .read(var)
                        .map(|v| v.as_int())
                        .unwrap_or(i)
                        .wrapping_add(step);
                    iterations += 1;
                    if iterations >= MAX_LOOP_ITERATIONS {
                        break;
                    }
                }
            }

            Statement::While { condition, body, .. } => {
                let mut iterations = 0;
                while self.truthy(condition) {
                    self.exec_all(body);
                    iterations += 1;
                    if iterations >= MAX_LOOP_ITERATIONS {
                        break;
                    }
                }
            }

            Statement::Repeat { body, until, .. } => {
                let mut iterations = 0;
                loop {
                    self.exec_all(body);
                    if self.truthy(until) {
                        break;
                    }
                    iterations += 1;
                    if iterations >= MAX_LOOP_ITERATIONS {
                        break;
                    }
                }
            }
        }
    }

    fn exec_all(&mut self, statements: &[Statement]) {
        for statement in statements {
            self.exec(statement);
        }
    }

    /// Evaluate a condition; faults report and read as false
    fn truthy(&mut self, expr: &Expression) -> bool {
        match self.eval(expr) {
            Ok(v) => v.truthy(),
            Err(diagnostic) => {
                self.diagnostics.push(diagnostic);
                false
            }
        }
    }

    fn exec_fb_call(&mut self, instance: &str, args: &[(String, Expression)]) {
        match self.state.slot_kind(instance) {
            Some(SlotKind::Timer) => {
                let input = self.arg_value(args, "IN").map(|v| v.truthy());
                let preset = self.arg_value(args, "PT").map(|v| v.as_time_ms());
                if let Some(timer) = self.state.timer_mut(instance) {
                    if let Some(input) = input {
                        timer.drive(input);
                    }
                    if let Some(preset) = preset {
                        timer.preset_ms = preset;
                    }
                }
            }
            Some(SlotKind::Counter) => {
                let cu = self.arg_value(args, "CU").map(|v| v.truthy());
                let cd = self.arg_value(args, "CD").map(|v| v.truthy());
                let r = self.arg_value(args, "R").map(|v| v.truthy());
                let ld = self.arg_value(args, "LD").map(|v| v.truthy());
                let pv = self.arg_value(args, "PV").map(|v| v.as_int());
                if let Some(counter) = self.state.counter_mut(instance) {
                    if let Some(cu) = cu {
                        counter.count_up(cu);
                    }
                    if let Some(cd) = cd {
                        counter.count_down(cd);
                    }
                    if let Some(r) = r {
                        counter.apply_reset(r);
                    }
                    if let Some(ld) = ld {
                        counter.apply_load(ld);
                    }
                    if let Some(pv) = pv {
                        counter.set_preset(pv);
                    }
                }
            }
            Some(SlotKind::Edge) => {
                let clk = self.arg_value(args, "CLK").map(|v| v.truthy());
                if let Some(edge) = self.state.edge_mut(instance) {
                    if let Some(clk) = clk {
                        edge.drive(clk);
                    }
                }
            }
            Some(SlotKind::Bistable) => {
                let dominant_set = self
                    .state
                    .get_bistable(instance)
                    .is_some_and(|b| b.kind == BistableKind::SetDominant);
                let (set_arg, reset_arg) = if dominant_set { ("S1", "R") } else { ("S", "R1") };
                let set = self
                    .arg_value(args, set_arg)
                    .map(|v| v.truthy())
                    .unwrap_or(false);
                let reset = self
                    .arg_value(args, reset_arg)
                    .map(|v| v.truthy())
                    .unwrap_or(false);
                if let Some(bistable) = self.state.bistable_mut(instance) {
                    bistable.drive(set, reset);
                }
            }
            // Calls on undeclared instances were already reported by the
            // validator; at runtime they are inert
            _ => {}
        }
    }

    /// Evaluate the named call argument, if present. Faults report and
    /// read as absent.
    fn arg_value(&mut self, args: &[(String, Expression)], name: &str) -> Option<Value> {
        let (_, expr) = args.iter().find(|(n, _)| n.eq_ignore_ascii_case(name))?;
        match self.eval(expr) {
            Ok(v) => Some(v),
            Err(diagnostic) => {
                self.diagnostics.push(diagnostic);
                None
            }
        }
    }

    fn eval(&mut self, expr: &Expression) -> Result<Value, Diagnostic> {
        match expr {
            Expression::Literal { value, .. } => Ok(match value {
                LiteralValue::Bool(b) => Value::Bool(*b),
                LiteralValue::Int(n) => Value::Int(*n as i32),
                LiteralValue::Real(r) => Value::Real(*r),
                LiteralValue::Time(ms) => Value::Time(*ms),
                LiteralValue::Str(_) => Value::Int(0),
            }),

            Expression::Variable { path, .. } => {
                let name = path.join(".");
                Ok(self.state.read(&name).unwrap_or(Value::Bool(false)))
            }

            Expression::Unary { op, operand, .. } => {
                let v = self.eval(operand)?;
                Ok(apply_unary(*op, v))
            }

            Expression::Binary { op, left, right, .. } => {
                let l = self.eval(left)?;
                let r = self.eval(right)?;
                apply_binary(*op, l, r).map_err(|e| {
                    Diagnostic::bare(
                        DiagnosticKind::DivisionByZero,
                        format!("{} evaluating '{}'", e, expr),
                    )
                })
            }

            Expression::Paren { inner, .. } => self.eval(inner),

            Expression::Call { name, args, .. } => {
                let mut values = Vec::with_capacity(args.len());
                for arg in args {
                    values.push(self.eval(arg)?);
                }
                Ok(standard_function(name, &values))
            }
        }
    }
}

/// IEC standard functions supported in expressions. Unknown names and
/// arity mismatches evaluate to zero.
fn standard_function(name: &str, args: &[Value]) -> Value {
    let op = |op: BinaryOp, l: Value, r: Value| apply_binary(op, l, r).unwrap_or(Value::Int(0));
    match (name.to_ascii_uppercase().as_str(), args) {
        ("ABS", [v]) => match v {
            Value::Real(r) => Value::Real(r.abs()),
            Value::Time(ms) => Value::Time(ms.abs()),
            other => Value::Int(other.as_int().saturating_abs()),
        },
        ("MIN", [first, rest @ ..]) => {
            let mut best = *first;
            for v in rest {
                if op(BinaryOp::Lt, *v, best).truthy() {
                    best = *v;
                }
            }
            best
        }
        ("MAX", [first, rest @ ..]) => {
            let mut best = *first;
            for v in rest {
                if op(BinaryOp::Gt, *v, best).truthy() {
                    best = *v;
                }
            }
            best
        }
        ("LIMIT", [min, input, max]) => {
            if op(BinaryOp::Lt, *input, *min).truthy() {
                *min
            } else if op(BinaryOp::Gt, *input, *max).truthy() {
                *max
            } else {
                *input
            }
        }
        ("SEL", [gate, if_false, if_true]) => {
            if gate.truthy() {
                *if_true
            } else {
                *if_false
            }
        }
        _ => Value::Int(0),
    }
}
