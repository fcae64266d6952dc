//! Edge detectors and bistables
//!
//! R_TRIG/F_TRIG raise `Q` for exactly one evaluation per edge: the
//! record keeps the previous `CLK` level in `M`. SR and RS differ only
//! in which input dominates when both are high.

use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EdgeKind {
    /// R_TRIG
    Rising,
    /// F_TRIG
    Falling,
}

/// Edge-detector record: `CLK`, `Q`, `M`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct EdgeState {
    pub kind: EdgeKind,
    /// Last driven `CLK` level
    pub clock: bool,
    /// `Q`
    pub output: bool,
    /// `M`: previous `CLK`
    pub memory: bool,
}

impl EdgeState {
    pub fn new(kind: EdgeKind) -> Self {
        EdgeState {
            kind,
            clock: false,
            output: false,
            memory: false,
        }
    }

    pub fn drive(&mut self, clk: bool) {
        self.output = match self.kind {
            EdgeKind::Rising => clk && !self.memory,
            EdgeKind::Falling => !clk && self.memory,
        };
        self.memory = clk;
        self.clock = clk;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BistableKind {
    /// SR: set wins
    SetDominant,
    /// RS: reset wins
    ResetDominant,
}

/// Bistable record: `Q1`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct BistableState {
    pub kind: BistableKind,
    /// `Q1`
    pub output: bool,
}

impl BistableState {
    pub fn new(kind: BistableKind) -> Self {
        BistableState {
            kind,
            output: false,
        }
    }

    pub fn drive(&mut self, set: bool, reset: bool) {
        self.output = match self.kind {
            BistableKind::SetDominant => set || (self.output && !reset),
            BistableKind::ResetDominant => !reset && (set || self.output),
        };
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rising_edge_fires_once() {
        let mut e = EdgeState::new(EdgeKind::Rising);
        e.drive(true);
        assert!(e.output);
        e.drive(true);
        assert!(!e.output, "Q lasts one evaluation only");
        e.drive(false);
        assert!(!e.output);
        e.drive(true);
        assert!(e.output);
    }

    #[test]
    fn test_falling_edge_fires_once() {
        let mut e = EdgeState::new(EdgeKind::Falling);
        e.drive(true);
        assert!(!e.output);
        e.drive(false);
        assert!(e.output);
        e.drive(false);
        assert!(!e.output);
    }

    #[test]
    fn test_sr_set_wins() {
        let mut b = BistableState::new(BistableKind::SetDominant);
        b.drive(true, true);
        assert!(b.output);
        b.drive(false, true);
        assert!(!b.output);
        b.drive(false, false);
        assert!(!b.output, "unchanged without inputs");
        b.drive(true, false);
        assert!(b.output);
        b.drive(false, false);
        assert!(b.output, "latched");
    }

    #[test]
    fn test_rs_reset_wins() {
        let mut b = BistableState::new(BistableKind::ResetDominant);
        b.drive(true, false);
        assert!(b.output);
        b.drive(true, true);
        assert!(!b.output);
        b.drive(false, false);
        assert!(!b.output);
    }
}
