//! IEC 61131-3 timer function blocks
//!
//! One record drives all three timer kinds. A scan touches a timer in
//! two phases: the statement phase feeds the new `IN` level through
//! [`TimerState::drive`], and the post-statement phase advances every
//! running timer's `ET` through [`TimerState::advance`]. The split is
//! what makes the self-resetting idiom
//! `T(IN := Cond AND NOT T.Q)` produce a clean one-scan pulse: the
//! statement phase observes the `Q` computed on the previous scan.

use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TimerKind {
    /// On-delay: Q rises PT after IN rises
    Ton,
    /// Off-delay: Q falls PT after IN falls
    Tof,
    /// Pulse: Q high for exactly PT per trigger, non-retriggerable
    Tp,
}

/// Timer instance record: `IN`, `PT`, `Q`, `ET` plus the running flag
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct TimerState {
    pub kind: TimerKind,
    /// Last driven `IN` level
    pub input: bool,
    /// `PT` in milliseconds
    pub preset_ms: i64,
    /// `Q`
    pub output: bool,
    /// `ET` in milliseconds
    pub elapsed_ms: i64,
    pub running: bool,
}

impl TimerState {
    pub fn new(kind: TimerKind, preset_ms: i64) -> Self {
        TimerState {
            kind,
            input: false,
            preset_ms,
            output: false,
            elapsed_ms: 0,
            running: false,
        }
    }

    /// Statement-phase update: feed the new `IN` level through the
    /// timer's state machine
    pub fn drive(&mut self, input: bool) {
        let rising = input && !self.input;
        let falling = !input && self.input;
        let staying_off = !input && !self.input;
        let staying_on = input && self.input;

        match self.kind {
            TimerKind::Ton => {
                if rising {
                    self.elapsed_ms = 0;
                    if self.preset_ms <= 0 {
                        self.output = true;
                        self.running = false;
                    } else {
                        self.running = true;
                        self.output = false;
                    }
                } else if falling {
                    // Q stays up for one more scan; the deferred clear
                    // below implements the self-reset idiom
                    self.running = false;
                    self.elapsed_ms = 0;
                } else if staying_off && self.output {
                    self.output = false;
                }
            }
            TimerKind::Tof => {
                if rising {
                    self.output = true;
                    self.elapsed_ms = 0;
                    self.running = false;
                } else if falling {
                    if self.preset_ms <= 0 {
                        self.output = false;
                    } else {
                        self.elapsed_ms = 0;
                        self.running = true;
                    }
                } else if staying_on {
                    self.elapsed_ms = 0;
                    self.running = false;
                    self.output = true;
                }
            }
            TimerKind::Tp => {
                // A new pulse can only start from rest; IN changes while
                // the pulse runs have no effect
                if !self.running && !self.output && rising && self.preset_ms > 0 {
                    self.output = true;
                    self.elapsed_ms = 0;
                    self.running = true;
                }
            }
        }

        self.input = input;
    }

    /// Post-statement-phase update: advance `ET` on a running timer and
    /// settle `Q` when the preset is reached
    pub fn advance(&mut self, delta_ms: i64) {
        if !self.running {
            return;
        }
        self.elapsed_ms = (self.elapsed_ms + delta_ms).min(self.preset_ms);
        if self.elapsed_ms >= self.preset_ms {
            self.running = false;
            self.output = matches!(self.kind, TimerKind::Ton);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Drive one full scan: statement phase then time advance
    fn scan(timer: &mut TimerState, input: bool, delta_ms: i64) {
        timer.drive(input);
        timer.advance(delta_ms);
    }

    #[test]
    fn test_ton_delays_then_fires() {
        let mut t = TimerState::new(TimerKind::Ton, 500);
        // Five 100 ms scans with IN held high; Q fires on the fifth
        for i in 1..=4 {
            scan(&mut t, true, 100);
            assert!(!t.output, "Q must stay low at scan {}", i);
            assert_eq!(t.elapsed_ms, i * 100);
        }
        scan(&mut t, true, 100);
        assert!(t.output);
        assert!(!t.running);
        assert_eq!(t.elapsed_ms, 500);
    }

    #[test]
    fn test_ton_resets_on_falling_input() {
        let mut t = TimerState::new(TimerKind::Ton, 500);
        scan(&mut t, true, 100);
        scan(&mut t, true, 100);
        scan(&mut t, false, 100);
        assert!(!t.running);
        assert_eq!(t.elapsed_ms, 0);
        // Restart measures the full preset again
        for _ in 0..4 {
            scan(&mut t, true, 100);
            assert!(!t.output);
        }
        scan(&mut t, true, 100);
        assert!(t.output);
    }

    #[test]
    fn test_ton_zero_preset_fires_immediately() {
        let mut t = TimerState::new(TimerKind::Ton, 0);
        t.drive(true);
        assert!(t.output);
        assert!(!t.running);
    }

    #[test]
    fn test_ton_keeps_q_one_scan_after_falling() {
        let mut t = TimerState::new(TimerKind::Ton, 100);
        scan(&mut t, true, 100);
        assert!(t.output);
        // Falling edge: Q survives this scan
        scan(&mut t, false, 100);
        assert!(t.output);
        // Staying off: deferred clear
        scan(&mut t, false, 100);
        assert!(!t.output);
    }

    #[test]
    fn test_tof_holds_through_short_gaps() {
        let mut t = TimerState::new(TimerKind::Tof, 300);
        scan(&mut t, true, 100);
        assert!(t.output);
        // IN drops; Q must stay up while the off-delay times
        scan(&mut t, false, 100);
        assert!(t.output);
        scan(&mut t, false, 100);
        assert!(t.output);
        // IN returns before the delay expires: timing cancels
        scan(&mut t, true, 100);
        assert!(t.output);
        assert!(!t.running);
        assert_eq!(t.elapsed_ms, 0);
    }

    #[test]
    fn test_tof_drops_after_preset() {
        let mut t = TimerState::new(TimerKind::Tof, 300);
        scan(&mut t, true, 100);
        for _ in 0..2 {
            scan(&mut t, false, 100);
            assert!(t.output);
        }
        scan(&mut t, false, 100);
        assert!(!t.output);
        assert!(!t.running);
    }

    #[test]
    fn test_tof_zero_preset_drops_immediately() {
        let mut t = TimerState::new(TimerKind::Tof, 0);
        scan(&mut t, true, 100);
        assert!(t.output);
        t.drive(false);
        assert!(!t.output);
    }

    #[test]
    fn test_tp_pulse_width_is_exact() {
        let mut t = TimerState::new(TimerKind::Tp, 300);
        scan(&mut t, true, 100);
        assert!(t.output);
        scan(&mut t, true, 100);
        assert!(t.output);
        scan(&mut t, true, 100);
        assert!(!t.output, "pulse ends when ET reaches PT");
    }

    #[test]
    fn test_tp_is_not_retriggerable() {
        let mut t = TimerState::new(TimerKind::Tp, 300);
        scan(&mut t, true, 100);
        // Drop and raise IN mid-pulse: no restart
        scan(&mut t, false, 100);
        assert!(t.output);
        assert_eq!(t.elapsed_ms, 200);
        scan(&mut t, true, 100);
        assert!(!t.output, "pulse completed on schedule despite retrigger");
    }

    #[test]
    fn test_tp_needs_a_fresh_rising_edge_after_pulse() {
        let mut t = TimerState::new(TimerKind::Tp, 100);
        scan(&mut t, true, 100);
        assert!(!t.output, "one-scan pulse already over");
        // IN still high: no new pulse without a fresh edge
        scan(&mut t, true, 100);
        assert!(!t.output);
        scan(&mut t, false, 100);
        scan(&mut t, true, 100);
        assert!(!t.output, "100 ms pulse at 100 ms scan ends within the scan");
        assert_eq!(t.elapsed_ms, 100);
    }

    #[test]
    fn test_tp_zero_preset_never_pulses() {
        let mut t = TimerState::new(TimerKind::Tp, 0);
        scan(&mut t, true, 100);
        assert!(!t.output);
        assert!(!t.running);
    }

    #[test]
    fn test_et_saturates_at_preset() {
        let mut t = TimerState::new(TimerKind::Ton, 250);
        scan(&mut t, true, 100);
        scan(&mut t, true, 100);
        scan(&mut t, true, 100);
        assert_eq!(t.elapsed_ms, 250);
        scan(&mut t, true, 100);
        assert_eq!(t.elapsed_ms, 250);
    }
}
