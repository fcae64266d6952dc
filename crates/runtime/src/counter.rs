//! IEC 61131-3 counter function blocks
//!
//! CTU, CTD and CTUD share one record. Counting is edge-sensitive: the
//! record remembers the previous `CU`/`CD` levels and a pulse fires only
//! on a false→true transition. `R` and `LD` are level-sensitive.

use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CounterKind {
    Ctu,
    Ctd,
    Ctud,
}

/// Counter instance record: `CU`, `CD`, `R`, `LD`, `PV`, `CV`, `QU`, `QD`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CounterState {
    pub kind: CounterKind,
    /// Last seen `CU` level
    pub up_input: bool,
    /// Last seen `CD` level
    pub down_input: bool,
    /// Last seen `R` level
    pub reset: bool,
    /// Last seen `LD` level
    pub load: bool,
    /// `PV`
    pub preset: i32,
    /// `CV`
    pub value: i32,
    /// `QU`: counted up to the preset
    pub up_output: bool,
    /// `QD`: counted down to zero
    pub down_output: bool,
}

impl CounterState {
    pub fn new(kind: CounterKind, preset: i32) -> Self {
        let mut counter = CounterState {
            kind,
            up_input: false,
            down_input: false,
            reset: false,
            load: false,
            preset,
            value: 0,
            up_output: false,
            down_output: false,
        };
        counter.update_outputs();
        counter
    }

    /// Feed a new `CU` level; counts on the rising edge
    pub fn count_up(&mut self, cu: bool) {
        if cu && !self.up_input {
            self.value = self.value.saturating_add(1);
            self.update_outputs();
        }
        self.up_input = cu;
    }

    /// Feed a new `CD` level; counts on the rising edge
    pub fn count_down(&mut self, cd: bool) {
        if cd && !self.down_input {
            self.value = self.value.saturating_sub(1);
            self.update_outputs();
        }
        self.down_input = cd;
    }

    /// Level-sensitive reset: `CV := 0` while `R` is high
    pub fn apply_reset(&mut self, r: bool) {
        if r {
            self.value = 0;
            self.update_outputs();
        }
        self.reset = r;
    }

    /// Level-sensitive load: `CV := PV` while `LD` is high
    pub fn apply_load(&mut self, ld: bool) {
        if ld {
            self.value = self.preset;
            self.update_outputs();
        }
        self.load = ld;
    }

    pub fn set_preset(&mut self, pv: i32) {
        self.preset = pv;
        self.update_outputs();
    }

    /// Driver-initiated single count up, bypassing edge detection
    pub fn pulse_up(&mut self) {
        self.value = self.value.saturating_add(1);
        self.update_outputs();
    }

    /// Driver-initiated single count down, bypassing edge detection
    pub fn pulse_down(&mut self) {
        self.value = self.value.saturating_sub(1);
        self.update_outputs();
    }

    fn update_outputs(&mut self) {
        self.up_output = self.value >= self.preset;
        self.down_output = self.value <= 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ctu_counts_rising_edges_only() {
        let mut c = CounterState::new(CounterKind::Ctu, 3);
        c.count_up(true);
        assert_eq!(c.value, 1);
        // Held high: no further counting
        c.count_up(true);
        assert_eq!(c.value, 1);
        c.count_up(false);
        c.count_up(true);
        assert_eq!(c.value, 2);
    }

    #[test]
    fn test_ctu_rollover_scenario() {
        // Four edges against PV = 3: CV 1,2,3,4 and QU false,false,true,true
        let mut c = CounterState::new(CounterKind::Ctu, 3);
        let mut observed = Vec::new();
        for _ in 0..4 {
            c.count_up(true);
            observed.push((c.value, c.up_output));
            c.count_up(false);
        }
        assert_eq!(
            observed,
            vec![(1, false), (2, false), (3, true), (4, true)]
        );
    }

    #[test]
    fn test_ctd_counts_down_to_zero() {
        let mut c = CounterState::new(CounterKind::Ctd, 2);
        c.apply_load(true);
        assert_eq!(c.value, 2);
        assert!(!c.down_output);
        c.apply_load(false);
        c.count_down(true);
        c.count_down(false);
        assert_eq!(c.value, 1);
        c.count_down(true);
        assert_eq!(c.value, 0);
        assert!(c.down_output);
    }

    #[test]
    fn test_reset_clears_value_and_outputs() {
        let mut c = CounterState::new(CounterKind::Ctu, 2);
        c.count_up(true);
        c.count_up(false);
        c.count_up(true);
        assert!(c.up_output);
        c.apply_reset(true);
        assert_eq!(c.value, 0);
        assert!(!c.up_output);
        assert!(c.down_output);
    }

    #[test]
    fn test_ctud_counts_both_directions() {
        let mut c = CounterState::new(CounterKind::Ctud, 10);
        c.count_up(true);
        c.count_up(false);
        c.count_up(true);
        assert_eq!(c.value, 2);
        c.count_down(true);
        assert_eq!(c.value, 1);
        c.count_down(false);
        c.count_down(true);
        assert_eq!(c.value, 0);
        assert!(c.down_output);
    }

    #[test]
    fn test_initial_outputs() {
        let c = CounterState::new(CounterKind::Ctu, 5);
        assert!(!c.up_output);
        assert!(c.down_output, "CV starts at zero, so QD starts high");
        // Degenerate preset: QU is already satisfied
        let c = CounterState::new(CounterKind::Ctu, 0);
        assert!(c.up_output);
    }

    #[test]
    fn test_set_preset_reevaluates_outputs() {
        let mut c = CounterState::new(CounterKind::Ctu, 5);
        c.pulse_up();
        c.pulse_up();
        assert!(!c.up_output);
        c.set_preset(2);
        assert!(c.up_output);
    }

    #[test]
    fn test_driver_pulses_bypass_edge_detection() {
        let mut c = CounterState::new(CounterKind::Ctu, 3);
        c.pulse_up();
        c.pulse_up();
        c.pulse_down();
        assert_eq!(c.value, 1);
    }

    #[test]
    fn test_value_saturates() {
        let mut c = CounterState::new(CounterKind::Ctu, 3);
        c.value = i32::MAX;
        c.pulse_up();
        assert_eq!(c.value, i32::MAX);
    }
}
