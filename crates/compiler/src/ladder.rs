//! Ladder-diagram intermediate representation
//!
//! A rung pairs an input contact network with one output. The network is
//! a tree of series/parallel compositions over contacts and comparators;
//! the smart constructors keep it normalised so downstream consumers
//! (validator, layout) never see `Series` inside `Series`, `Parallel`
//! inside `Parallel`, or a redundant `True`.
//!
//! Comparators keep their operand text exactly as written in the source;
//! negation acts on the operator, never on the operands.

use crate::ast::Span;
use serde::Serialize;
use std::fmt;

/// Reserved pseudo-variable for the never-energised contact.
///
/// `Contact { FALSE_CONTACT, NormallyClosed }` is the ladder rendering of
/// literal `FALSE` and of negated `True`.
pub const FALSE_CONTACT: &str = "FALSE";

/// How a contact tests its variable
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ContactKind {
    /// `-| |-` passes while the variable is true
    NormallyOpen,
    /// `-|/|-` passes while the variable is false
    NormallyClosed,
    /// `-|P|-` passes for one scan on a rising edge
    PosEdge,
    /// `-|N|-` passes for one scan on a falling edge
    NegEdge,
}

impl ContactKind {
    fn flipped(self) -> ContactKind {
        match self {
            ContactKind::NormallyOpen => ContactKind::NormallyClosed,
            ContactKind::NormallyClosed => ContactKind::NormallyOpen,
            ContactKind::PosEdge => ContactKind::NegEdge,
            ContactKind::NegEdge => ContactKind::PosEdge,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CompareOp {
    Eq,
    Ne,
    Gt,
    Ge,
    Lt,
    Le,
}

impl CompareOp {
    /// Logical complement: `EQ↔NE`, `GT↔LE`, `GE↔LT`
    pub fn negated(self) -> CompareOp {
        match self {
            CompareOp::Eq => CompareOp::Ne,
            CompareOp::Ne => CompareOp::Eq,
            CompareOp::Gt => CompareOp::Le,
            CompareOp::Le => CompareOp::Gt,
            CompareOp::Ge => CompareOp::Lt,
            CompareOp::Lt => CompareOp::Ge,
        }
    }

    pub fn symbol(self) -> &'static str {
        match self {
            CompareOp::Eq => "=",
            CompareOp::Ne => "<>",
            CompareOp::Gt => ">",
            CompareOp::Ge => ">=",
            CompareOp::Lt => "<",
            CompareOp::Le => "<=",
        }
    }
}

/// Input side of a rung
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum Network {
    Contact {
        variable: String,
        kind: ContactKind,
    },
    Comparator {
        op: CompareOp,
        left: String,
        right: String,
    },
    Series {
        elements: Vec<Network>,
    },
    Parallel {
        branches: Vec<Network>,
    },
    /// Identity: the rail itself, always energised
    True,
}

impl Network {
    pub fn contact(variable: impl Into<String>, kind: ContactKind) -> Network {
        Network::Contact {
            variable: variable.into(),
            kind,
        }
    }

    /// The never-energised pseudo-contact
    pub fn never() -> Network {
        Network::contact(FALSE_CONTACT, ContactKind::NormallyClosed)
    }

    pub fn is_never(&self) -> bool {
        matches!(
            self,
            Network::Contact { variable, kind: ContactKind::NormallyClosed }
                if variable == FALSE_CONTACT
        )
    }

    /// Series composition with normalisation: nested `Series` splice in,
    /// `True` is absorbed, an empty result collapses to `True`, a single
    /// element stands alone.
    pub fn series(elements: Vec<Network>) -> Network {
        let mut flat = Vec::new();
        for element in elements {
            match element {
                Network::True => {}
                Network::Series { elements } => flat.extend(elements),
                other => flat.push(other),
            }
        }
        match flat.len() {
            0 => Network::True,
            1 => flat.pop().unwrap(),
            _ => Network::Series { elements: flat },
        }
    }

    /// Parallel composition with normalisation: nested `Parallel`
    /// branches splice in, a `True` branch collapses the whole group to
    /// `True`, a single branch stands alone.
    pub fn parallel(branches: Vec<Network>) -> Network {
        let mut flat = Vec::new();
        for branch in branches {
            match branch {
                Network::True => return Network::True,
                Network::Parallel { branches } => {
                    if branches.iter().any(|b| matches!(b, Network::True)) {
                        return Network::True;
                    }
                    flat.extend(branches);
                }
                other => flat.push(other),
            }
        }
        match flat.len() {
            0 => Network::never(),
            1 => flat.pop().unwrap(),
            _ => Network::Parallel { branches: flat },
        }
    }

    /// Structural De Morgan negation.
    ///
    /// Contacts flip kind, comparators flip operator (operand text
    /// untouched), series becomes parallel of negated elements and vice
    /// versa. `True` becomes the never-energised pseudo-contact and that
    /// pseudo-contact negates back to `True`.
    pub fn negate(&self) -> Network {
        if self.is_never() {
            return Network::True;
        }
        match self {
            Network::Contact { variable, kind } => Network::Contact {
                variable: variable.clone(),
                kind: kind.flipped(),
            },
            Network::Comparator { op, left, right } => Network::Comparator {
                op: op.negated(),
                left: left.clone(),
                right: right.clone(),
            },
            Network::Series { elements } => {
                Network::parallel(elements.iter().map(Network::negate).collect())
            }
            Network::Parallel { branches } => {
                Network::series(branches.iter().map(Network::negate).collect())
            }
            Network::True => Network::never(),
        }
    }

    /// True when the network contains at least one contact or comparator.
    ///
    /// The never-energised pseudo-contact does not count: it is a
    /// placeholder, not a condition on program state.
    pub fn has_condition(&self) -> bool {
        match self {
            Network::Contact { .. } => !self.is_never(),
            Network::Comparator { .. } => true,
            Network::Series { elements } => elements.iter().any(Network::has_condition),
            Network::Parallel { branches } => branches.iter().any(Network::has_condition),
            Network::True => false,
        }
    }

    /// Every variable named by a contact in this network (comparator
    /// operands are free text and are tracked by the transformer instead)
    pub fn contact_variables(&self) -> Vec<&str> {
        let mut names = Vec::new();
        self.collect_contact_variables(&mut names);
        names
    }

    fn collect_contact_variables<'a>(&'a self, names: &mut Vec<&'a str>) {
        match self {
            Network::Contact { variable, .. } => {
                if variable != FALSE_CONTACT {
                    names.push(variable);
                }
            }
            Network::Series { elements } => {
                for e in elements {
                    e.collect_contact_variables(names);
                }
            }
            Network::Parallel { branches } => {
                for b in branches {
                    b.collect_contact_variables(names);
                }
            }
            Network::Comparator { .. } | Network::True => {}
        }
    }
}

/// How a coil writes its variable
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CoilKind {
    /// `-( )-` follows the rung condition
    Standard,
    /// `-(S)-` latches on
    Set,
    /// `-(R)-` latches off
    Reset,
    /// `-(P)-` one-shot on rising condition
    PosTrans,
    /// `-(N)-` one-shot on falling condition
    NegTrans,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TimerKind {
    Ton,
    Tof,
    Tp,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CounterKind {
    Ctu,
    Ctd,
    Ctud,
}

/// Output side of a rung
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum RungOutput {
    Coil {
        variable: String,
        kind: CoilKind,
    },
    Timer {
        instance: String,
        kind: TimerKind,
        /// `PT` argument exactly as written (`T#500ms`); empty when the
        /// call site gave none
        preset: String,
    },
    Counter {
        instance: String,
        kind: CounterKind,
        preset: i64,
    },
    /// Fan-out: several outputs driven by one condition
    Multi { outputs: Vec<RungOutput> },
}

impl RungOutput {
    /// Names written by this output (coil variables and FB instances)
    pub fn written_names(&self) -> Vec<&str> {
        match self {
            RungOutput::Coil { variable, .. } => vec![variable],
            RungOutput::Timer { instance, .. } => vec![instance],
            RungOutput::Counter { instance, .. } => vec![instance],
            RungOutput::Multi { outputs } => {
                outputs.iter().flat_map(|o| o.written_names()).collect()
            }
        }
    }
}

/// One row of the ladder: input network driving an output
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Rung {
    pub index: usize,
    pub input: Network,
    pub output: RungOutput,
    pub comment: Option<String>,
    /// Span of the statement this rung was lowered from
    pub source_span: Span,
}

impl fmt::Display for Network {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Network::Contact { variable, kind } => match kind {
                ContactKind::NormallyOpen => write!(f, "[{}]", variable),
                ContactKind::NormallyClosed => write!(f, "[/{}]", variable),
                ContactKind::PosEdge => write!(f, "[P:{}]", variable),
                ContactKind::NegEdge => write!(f, "[N:{}]", variable),
            },
            Network::Comparator { op, left, right } => {
                write!(f, "[{} {} {}]", left, op.symbol(), right)
            }
            Network::Series { elements } => {
                let parts: Vec<String> = elements.iter().map(|e| e.to_string()).collect();
                write!(f, "({})", parts.join(" & "))
            }
            Network::Parallel { branches } => {
                let parts: Vec<String> = branches.iter().map(|b| b.to_string()).collect();
                write!(f, "({})", parts.join(" | "))
            }
            Network::True => write!(f, "[=]"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn no(name: &str) -> Network {
        Network::contact(name, ContactKind::NormallyOpen)
    }

    fn nc(name: &str) -> Network {
        Network::contact(name, ContactKind::NormallyClosed)
    }

    #[test]
    fn test_series_flattens_nested_series() {
        let inner = Network::series(vec![no("A"), no("B")]);
        let outer = Network::series(vec![inner, no("C")]);
        match outer {
            Network::Series { elements } => assert_eq!(elements.len(), 3),
            other => panic!("expected flat series, got {:?}", other),
        }
    }

    #[test]
    fn test_series_absorbs_true_and_collapses() {
        assert_eq!(Network::series(vec![]), Network::True);
        assert_eq!(Network::series(vec![Network::True]), Network::True);
        assert_eq!(Network::series(vec![Network::True, no("A")]), no("A"));
    }

    #[test]
    fn test_parallel_flattens_and_true_wins() {
        let inner = Network::parallel(vec![no("A"), no("B")]);
        let outer = Network::parallel(vec![inner, no("C")]);
        match outer {
            Network::Parallel { branches } => assert_eq!(branches.len(), 3),
            other => panic!("expected flat parallel, got {:?}", other),
        }
        assert_eq!(
            Network::parallel(vec![no("A"), Network::True]),
            Network::True
        );
    }

    #[test]
    fn test_single_element_stands_alone() {
        assert_eq!(Network::series(vec![no("A")]), no("A"));
        assert_eq!(Network::parallel(vec![no("A")]), no("A"));
    }

    #[test]
    fn test_negate_contact_and_comparator() {
        assert_eq!(no("A").negate(), nc("A"));
        assert_eq!(nc("A").negate(), no("A"));

        let cmp = Network::Comparator {
            op: CompareOp::Ge,
            left: "Level".to_string(),
            right: "10".to_string(),
        };
        match cmp.negate() {
            Network::Comparator { op, left, right } => {
                assert_eq!(op, CompareOp::Lt);
                // Operand text untouched
                assert_eq!(left, "Level");
                assert_eq!(right, "10");
            }
            other => panic!("expected comparator, got {:?}", other),
        }
    }

    #[test]
    fn test_negate_de_morgan_series() {
        // NOT (A AND B) == NOT A OR NOT B
        let and = Network::series(vec![no("A"), no("B")]);
        assert_eq!(
            and.negate(),
            Network::parallel(vec![nc("A"), nc("B")])
        );
    }

    #[test]
    fn test_negate_true_round_trips_through_pseudo_contact() {
        let negated = Network::True.negate();
        assert!(negated.is_never());
        assert_eq!(negated.negate(), Network::True);
    }

    #[test]
    fn test_double_negation_is_identity_after_normalisation() {
        let net = Network::parallel(vec![
            Network::series(vec![no("A"), nc("B")]),
            Network::Comparator {
                op: CompareOp::Eq,
                left: "P".to_string(),
                right: "3".to_string(),
            },
        ]);
        assert_eq!(net.negate().negate(), net);
    }

    #[test]
    fn test_has_condition() {
        assert!(no("A").has_condition());
        assert!(!Network::True.has_condition());
        assert!(!Network::never().has_condition());
        assert!(Network::series(vec![no("A")]).has_condition());
        let cmp = Network::Comparator {
            op: CompareOp::Eq,
            left: "P".to_string(),
            right: "0".to_string(),
        };
        assert!(cmp.has_condition());
    }

    #[test]
    fn test_written_names_of_multi() {
        let multi = RungOutput::Multi {
            outputs: vec![
                RungOutput::Coil {
                    variable: "X".to_string(),
                    kind: CoilKind::Standard,
                },
                RungOutput::Timer {
                    instance: "T1".to_string(),
                    kind: TimerKind::Ton,
                    preset: "T#1s".to_string(),
                },
            ],
        };
        assert_eq!(multi.written_names(), vec!["X", "T1"]);
    }

    #[test]
    fn test_network_display() {
        let net = Network::series(vec![
            no("Run"),
            Network::Comparator {
                op: CompareOp::Eq,
                left: "P".to_string(),
                right: "0".to_string(),
            },
        ]);
        assert_eq!(net.to_string(), "([Run] & [P = 0])");
    }
}
