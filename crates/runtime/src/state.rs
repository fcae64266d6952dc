//! Runtime state store
//!
//! Four typed scalar maps plus four function-block instance maps, all
//! keyed by the case-folded variable name. The store owns every record;
//! the interpreter and the driver address them by name only, so cyclic
//! programs (a latch reading its own output) need no back-references.
//!
//! The store remembers its initialisation plan. Stopping and restarting
//! replays the plan (fresh state); pausing preserves everything.

use crate::counter::{CounterKind, CounterState};
use crate::timer::{TimerKind, TimerState};
use crate::trigger::{BistableKind, BistableState, EdgeKind, EdgeState};
use crate::value::Value;
use serde::Serialize;
use std::collections::BTreeMap;

/// Default scan period in milliseconds
pub const DEFAULT_SCAN_TIME_MS: i64 = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SimStatus {
    Stopped,
    Running,
    Paused,
}

/// What kind of slot a name is bound to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotKind {
    Bool,
    Int,
    Real,
    Time,
    Timer,
    Counter,
    Edge,
    Bistable,
}

/// One slot of the initialisation plan, replayed on every cold start
#[derive(Debug, Clone)]
pub enum SlotInit {
    Bool(String, bool),
    Int(String, i32),
    Real(String, f64),
    Time(String, i64),
    Timer(String, TimerKind, i64),
    Counter(String, CounterKind, i32),
    Edge(String, EdgeKind),
    Bistable(String, BistableKind),
}

#[derive(Debug, Default)]
pub struct RuntimeState {
    bools: BTreeMap<String, bool>,
    ints: BTreeMap<String, i32>,
    reals: BTreeMap<String, f64>,
    times: BTreeMap<String, i64>,
    timers: BTreeMap<String, TimerState>,
    counters: BTreeMap<String, CounterState>,
    edges: BTreeMap<String, EdgeState>,
    bistables: BTreeMap<String, BistableState>,
    init_plan: Vec<SlotInit>,

    pub status: SimStatus,
    pub scan_time_ms: i64,
    pub elapsed_ms: i64,
    pub scan_count: u64,
}

impl Default for SimStatus {
    fn default() -> Self {
        SimStatus::Stopped
    }
}

fn key(name: &str) -> String {
    name.to_ascii_lowercase()
}

impl RuntimeState {
    pub fn new() -> Self {
        RuntimeState {
            scan_time_ms: DEFAULT_SCAN_TIME_MS,
            ..Default::default()
        }
    }

    /// Install an initialisation plan and apply it. Called once per
    /// program load by the interpreter's `initialize`.
    pub fn install(&mut self, plan: Vec<SlotInit>) {
        self.init_plan = plan;
        self.reinitialize();
    }

    /// Clear all state and replay the initialisation plan
    pub fn reinitialize(&mut self) {
        self.bools.clear();
        self.ints.clear();
        self.reals.clear();
        self.times.clear();
        self.timers.clear();
        self.counters.clear();
        self.edges.clear();
        self.bistables.clear();
        self.elapsed_ms = 0;
        self.scan_count = 0;

        let plan = std::mem::take(&mut self.init_plan);
        for slot in &plan {
            match slot {
                SlotInit::Bool(name, v) => {
                    self.bools.insert(key(name), *v);
                }
                SlotInit::Int(name, v) => {
                    self.ints.insert(key(name), *v);
                }
                SlotInit::Real(name, v) => {
                    self.reals.insert(key(name), *v);
                }
                SlotInit::Time(name, v) => {
                    self.times.insert(key(name), *v);
                }
                SlotInit::Timer(name, kind, preset) => {
                    self.timers.insert(key(name), TimerState::new(*kind, *preset));
                }
                SlotInit::Counter(name, kind, preset) => {
                    self.counters
                        .insert(key(name), CounterState::new(*kind, *preset));
                }
                SlotInit::Edge(name, kind) => {
                    self.edges.insert(key(name), EdgeState::new(*kind));
                }
                SlotInit::Bistable(name, kind) => {
                    self.bistables.insert(key(name), BistableState::new(*kind));
                }
            }
        }
        self.init_plan = plan;
    }

    // ------------------------------------------------------------------
    // Control
    // ------------------------------------------------------------------

    /// Enter RUNNING. From STOPPED this is a cold start: state is
    /// cleared and reinitialised. From PAUSED the state is preserved
    /// exactly.
    pub fn start(&mut self) {
        if self.status == SimStatus::Stopped {
            self.reinitialize();
        }
        self.status = SimStatus::Running;
    }

    pub fn pause(&mut self) {
        if self.status == SimStatus::Running {
            self.status = SimStatus::Paused;
        }
    }

    pub fn stop(&mut self) {
        self.status = SimStatus::Stopped;
    }

    /// Explicit driver-side reset while keeping the current status
    pub fn reset(&mut self) {
        self.reinitialize();
    }

    // ------------------------------------------------------------------
    // Scalar access
    // ------------------------------------------------------------------

    pub fn get_bool(&self, name: &str) -> Option<bool> {
        self.bools.get(&key(name)).copied()
    }

    pub fn get_int(&self, name: &str) -> Option<i32> {
        self.ints.get(&key(name)).copied()
    }

    pub fn get_real(&self, name: &str) -> Option<f64> {
        self.reals.get(&key(name)).copied()
    }

    pub fn get_time(&self, name: &str) -> Option<i64> {
        self.times.get(&key(name)).copied()
    }

    pub fn set_bool(&mut self, name: &str, value: bool) -> bool {
        match self.bools.get_mut(&key(name)) {
            Some(slot) => {
                *slot = value;
                true
            }
            None => false,
        }
    }

    pub fn set_int(&mut self, name: &str, value: i32) -> bool {
        match self.ints.get_mut(&key(name)) {
            Some(slot) => {
                *slot = value;
                true
            }
            None => false,
        }
    }

    pub fn set_real(&mut self, name: &str, value: f64) -> bool {
        match self.reals.get_mut(&key(name)) {
            Some(slot) => {
                *slot = value;
                true
            }
            None => false,
        }
    }

    pub fn set_time(&mut self, name: &str, ms: i64) -> bool {
        match self.times.get_mut(&key(name)) {
            Some(slot) => {
                *slot = ms;
                true
            }
            None => false,
        }
    }

    /// What `name` is bound to, if anything
    pub fn slot_kind(&self, name: &str) -> Option<SlotKind> {
        let k = key(name);
        if self.bools.contains_key(&k) {
            Some(SlotKind::Bool)
        } else if self.ints.contains_key(&k) {
            Some(SlotKind::Int)
        } else if self.reals.contains_key(&k) {
            Some(SlotKind::Real)
        } else if self.times.contains_key(&k) {
            Some(SlotKind::Time)
        } else if self.timers.contains_key(&k) {
            Some(SlotKind::Timer)
        } else if self.counters.contains_key(&k) {
            Some(SlotKind::Counter)
        } else if self.edges.contains_key(&k) {
            Some(SlotKind::Edge)
        } else if self.bistables.contains_key(&k) {
            Some(SlotKind::Bistable)
        } else {
            None
        }
    }

    /// Write a value into the scalar slot declared for `name`, coercing
    /// to the slot's type. False when no scalar slot exists.
    pub fn write_scalar(&mut self, name: &str, value: Value) -> bool {
        let k = key(name);
        if let Some(slot) = self.bools.get_mut(&k) {
            *slot = value.truthy();
            return true;
        }
        if let Some(slot) = self.ints.get_mut(&k) {
            *slot = value.as_int();
            return true;
        }
        if let Some(slot) = self.reals.get_mut(&k) {
            *slot = value.as_real();
            return true;
        }
        if let Some(slot) = self.times.get_mut(&k) {
            *slot = value.as_time_ms();
            return true;
        }
        false
    }

    /// Read a value by access path: a scalar name, a bare instance name
    /// (its main output), or `instance.member` for FB outputs.
    pub fn read(&self, path: &str) -> Option<Value> {
        let mut parts = path.split('.');
        let head = parts.next()?;
        let member = parts.next();
        if parts.next().is_some() {
            return None;
        }

        match member {
            None => {
                let k = key(head);
                if let Some(v) = self.bools.get(&k) {
                    return Some(Value::Bool(*v));
                }
                if let Some(v) = self.ints.get(&k) {
                    return Some(Value::Int(*v));
                }
                if let Some(v) = self.reals.get(&k) {
                    return Some(Value::Real(*v));
                }
                if let Some(v) = self.times.get(&k) {
                    return Some(Value::Time(*v));
                }
                // A bare instance name reads as its main output
                if let Some(t) = self.timers.get(&k) {
                    return Some(Value::Bool(t.output));
                }
                if let Some(c) = self.counters.get(&k) {
                    return Some(Value::Bool(c.up_output));
                }
                if let Some(e) = self.edges.get(&k) {
                    return Some(Value::Bool(e.output));
                }
                if let Some(b) = self.bistables.get(&k) {
                    return Some(Value::Bool(b.output));
                }
                None
            }
            Some(member) => self.read_member(head, member),
        }
    }

    fn read_member(&self, instance: &str, member: &str) -> Option<Value> {
        let k = key(instance);
        let m = member.to_ascii_uppercase();
        if let Some(t) = self.timers.get(&k) {
            return match m.as_str() {
                "Q" => Some(Value::Bool(t.output)),
                "ET" => Some(Value::Time(t.elapsed_ms)),
                "IN" => Some(Value::Bool(t.input)),
                "PT" => Some(Value::Time(t.preset_ms)),
                _ => None,
            };
        }
        if let Some(c) = self.counters.get(&k) {
            return match m.as_str() {
                "CV" => Some(Value::Int(c.value)),
                "QU" | "Q" => Some(Value::Bool(c.up_output)),
                "QD" => Some(Value::Bool(c.down_output)),
                "PV" => Some(Value::Int(c.preset)),
                _ => None,
            };
        }
        if let Some(e) = self.edges.get(&k) {
            return match m.as_str() {
                "Q" => Some(Value::Bool(e.output)),
                _ => None,
            };
        }
        if let Some(b) = self.bistables.get(&k) {
            return match m.as_str() {
                "Q1" | "Q" => Some(Value::Bool(b.output)),
                _ => None,
            };
        }
        None
    }

    // ------------------------------------------------------------------
    // Function-block access
    // ------------------------------------------------------------------

    pub fn get_timer(&self, name: &str) -> Option<&TimerState> {
        self.timers.get(&key(name))
    }

    pub fn get_counter(&self, name: &str) -> Option<&CounterState> {
        self.counters.get(&key(name))
    }

    pub fn get_edge(&self, name: &str) -> Option<&EdgeState> {
        self.edges.get(&key(name))
    }

    pub fn get_bistable(&self, name: &str) -> Option<&BistableState> {
        self.bistables.get(&key(name))
    }

    pub(crate) fn timer_mut(&mut self, name: &str) -> Option<&mut TimerState> {
        self.timers.get_mut(&key(name))
    }

    pub(crate) fn counter_mut(&mut self, name: &str) -> Option<&mut CounterState> {
        self.counters.get_mut(&key(name))
    }

    pub(crate) fn edge_mut(&mut self, name: &str) -> Option<&mut EdgeState> {
        self.edges.get_mut(&key(name))
    }

    pub(crate) fn bistable_mut(&mut self, name: &str) -> Option<&mut BistableState> {
        self.bistables.get_mut(&key(name))
    }

    /// Driver-side timer input override
    pub fn set_timer_input(&mut self, name: &str, input: bool) -> bool {
        match self.timers.get_mut(&key(name)) {
            Some(timer) => {
                timer.drive(input);
                true
            }
            None => false,
        }
    }

    /// Driver-side preset override, in milliseconds
    pub fn set_timer_preset(&mut self, name: &str, preset_ms: i64) -> bool {
        match self.timers.get_mut(&key(name)) {
            Some(timer) => {
                timer.preset_ms = preset_ms;
                true
            }
            None => false,
        }
    }

    pub fn reset_counter(&mut self, name: &str) -> bool {
        match self.counters.get_mut(&key(name)) {
            Some(counter) => {
                counter.apply_reset(true);
                counter.apply_reset(false);
                true
            }
            None => false,
        }
    }

    pub fn pulse_count_up(&mut self, name: &str) -> bool {
        match self.counters.get_mut(&key(name)) {
            Some(counter) => {
                counter.pulse_up();
                true
            }
            None => false,
        }
    }

    pub fn pulse_count_down(&mut self, name: &str) -> bool {
        match self.counters.get_mut(&key(name)) {
            Some(counter) => {
                counter.pulse_down();
                true
            }
            None => false,
        }
    }

    /// Post-statement phase: advance every running timer, in stable
    /// name order
    pub fn advance_timers(&mut self, delta_ms: i64) {
        for timer in self.timers.values_mut() {
            timer.advance(delta_ms);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_plan() -> Vec<SlotInit> {
        vec![
            SlotInit::Bool("Run".to_string(), false),
            SlotInit::Int("Count".to_string(), 5),
            SlotInit::Real("Ratio".to_string(), 0.5),
            SlotInit::Time("Window".to_string(), 2_000),
            SlotInit::Timer("Delay".to_string(), TimerKind::Ton, 500),
            SlotInit::Counter("Parts".to_string(), CounterKind::Ctu, 3),
            SlotInit::Edge("Trig".to_string(), EdgeKind::Rising),
            SlotInit::Bistable("Latch".to_string(), BistableKind::SetDominant),
        ]
    }

    #[test]
    fn test_install_creates_defaults() {
        let mut state = RuntimeState::new();
        state.install(sample_plan());
        assert_eq!(state.get_bool("Run"), Some(false));
        assert_eq!(state.get_int("Count"), Some(5));
        assert_eq!(state.get_real("Ratio"), Some(0.5));
        assert_eq!(state.get_time("Window"), Some(2_000));
        assert_eq!(state.get_timer("Delay").unwrap().preset_ms, 500);
        assert_eq!(state.get_counter("Parts").unwrap().preset, 3);
        assert!(state.get_edge("Trig").is_some());
        assert!(state.get_bistable("Latch").is_some());
    }

    #[test]
    fn test_names_are_case_insensitive() {
        let mut state = RuntimeState::new();
        state.install(sample_plan());
        assert_eq!(state.get_int("COUNT"), Some(5));
        assert!(state.set_bool("RUN", true));
        assert_eq!(state.get_bool("run"), Some(true));
    }

    #[test]
    fn test_set_on_missing_name_is_refused() {
        let mut state = RuntimeState::new();
        state.install(sample_plan());
        assert!(!state.set_bool("Ghost", true));
        assert_eq!(state.get_bool("Ghost"), None);
    }

    #[test]
    fn test_stop_start_reinitialises() {
        let mut state = RuntimeState::new();
        state.install(sample_plan());
        state.start();
        state.set_int("Count", 42);
        state.scan_count = 7;
        state.stop();
        state.start();
        assert_eq!(state.get_int("Count"), Some(5), "cold start replays the plan");
        assert_eq!(state.scan_count, 0);
        assert_eq!(state.status, SimStatus::Running);
    }

    #[test]
    fn test_pause_resume_preserves_state() {
        let mut state = RuntimeState::new();
        state.install(sample_plan());
        state.start();
        state.set_int("Count", 42);
        state.pause();
        assert_eq!(state.status, SimStatus::Paused);
        state.start();
        assert_eq!(state.get_int("Count"), Some(42), "pause must not clear state");
    }

    #[test]
    fn test_read_paths() {
        let mut state = RuntimeState::new();
        state.install(sample_plan());
        assert_eq!(state.read("Count"), Some(Value::Int(5)));
        assert_eq!(state.read("Delay.Q"), Some(Value::Bool(false)));
        assert_eq!(state.read("Delay.ET"), Some(Value::Time(0)));
        assert_eq!(state.read("Parts.CV"), Some(Value::Int(0)));
        assert_eq!(state.read("Parts.QD"), Some(Value::Bool(true)));
        assert_eq!(state.read("Latch.Q1"), Some(Value::Bool(false)));
        // Bare instance name reads the main output
        assert_eq!(state.read("Delay"), Some(Value::Bool(false)));
        assert_eq!(state.read("Delay.BOGUS"), None);
        assert_eq!(state.read("a.b.c"), None);
    }

    #[test]
    fn test_write_scalar_coerces_to_slot_type() {
        let mut state = RuntimeState::new();
        state.install(sample_plan());
        assert!(state.write_scalar("Count", Value::Real(2.9)));
        assert_eq!(state.get_int("Count"), Some(2));
        assert!(state.write_scalar("Run", Value::Int(7)));
        assert_eq!(state.get_bool("Run"), Some(true));
        assert!(state.write_scalar("Window", Value::Int(250)));
        assert_eq!(state.get_time("Window"), Some(250));
        assert!(!state.write_scalar("Delay", Value::Bool(true)));
    }

    #[test]
    fn test_driver_counter_ops() {
        let mut state = RuntimeState::new();
        state.install(sample_plan());
        state.pulse_count_up("Parts");
        state.pulse_count_up("Parts");
        assert_eq!(state.get_counter("Parts").unwrap().value, 2);
        state.pulse_count_down("Parts");
        assert_eq!(state.get_counter("Parts").unwrap().value, 1);
        state.reset_counter("Parts");
        assert_eq!(state.get_counter("Parts").unwrap().value, 0);
    }

    #[test]
    fn test_slot_kinds() {
        let mut state = RuntimeState::new();
        state.install(sample_plan());
        assert_eq!(state.slot_kind("Run"), Some(SlotKind::Bool));
        assert_eq!(state.slot_kind("Window"), Some(SlotKind::Time));
        assert_eq!(state.slot_kind("Delay"), Some(SlotKind::Timer));
        assert_eq!(state.slot_kind("Latch"), Some(SlotKind::Bistable));
        assert_eq!(state.slot_kind("Nope"), None);
    }
}
