//! Simulation engine: owns one compiled program and its runtime state
//!
//! The engine is the "driver" the runtime is written against: it calls
//! `scan` on a cadence, forwards input changes between scans, and reads
//! watched values back out. All timing comes from the caller; the
//! engine itself never sleeps.

use rung_runtime::{initialize, scan, RuntimeState, ScanReport, SimStatus, Value};
use rungc::ast::Program;
use rungc::{transform, Diagnostic, TransformOptions};

#[derive(Debug)]
pub struct Simulator {
    program: Program,
    state: RuntimeState,
}

impl Simulator {
    /// Compile `source` and initialise a fresh store for it. Compile
    /// errors abort the load; warnings are returned for the caller to
    /// report.
    pub fn load(source: &str) -> Result<(Simulator, Vec<Diagnostic>), String> {
        let result = transform(
            source,
            &TransformOptions {
                include_intermediates: true,
                ..Default::default()
            },
        );
        if !result.success {
            let messages: Vec<String> =
                result.errors.iter().map(|d| d.to_string()).collect();
            return Err(messages.join("\n"));
        }

        let program = result
            .intermediates
            .expect("intermediates requested")
            .ast;
        let mut state = RuntimeState::new();
        initialize(&program, &mut state);

        Ok((
            Simulator { program, state },
            result.warnings,
        ))
    }

    pub fn start(&mut self) {
        self.state.start();
    }

    pub fn pause(&mut self) {
        self.state.pause();
    }

    pub fn stop(&mut self) {
        self.state.stop();
    }

    pub fn reset(&mut self) {
        self.state.reset();
    }

    pub fn status(&self) -> SimStatus {
        self.state.status
    }

    /// One scan at the given period. The caller decides the cadence.
    pub fn tick(&mut self, scan_ms: i64) -> ScanReport {
        scan(&self.program, &mut self.state, scan_ms)
    }

    /// One scan at the store's configured period (§6.2 `step`)
    pub fn step(&mut self) -> ScanReport {
        let scan_ms = self.state.scan_time_ms;
        self.tick(scan_ms)
    }

    pub fn read(&self, path: &str) -> Option<Value> {
        self.state.read(path)
    }

    pub fn state(&self) -> &RuntimeState {
        &self.state
    }

    pub fn state_mut(&mut self) -> &mut RuntimeState {
        &mut self.state
    }

    /// Watchable names when the user gave none: every declared name, in
    /// declaration order
    pub fn default_watch(&self) -> Vec<String> {
        self.program
            .declarations()
            .flat_map(|d| d.names.iter().cloned())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const BLINKER: &str = "VAR Blink : TON; Run, Pulse : BOOL; END_VAR \
         Blink(IN := Run AND NOT Blink.Q, PT := T#200ms); \
         Pulse := Blink.Q;";

    #[test]
    fn test_load_and_tick() {
        let (mut sim, warnings) = Simulator::load(BLINKER).expect("load");
        assert!(warnings.is_empty());
        sim.start();
        assert_eq!(sim.status(), SimStatus::Running);
        sim.state_mut().set_bool("Run", true);
        let report = sim.tick(100);
        assert!(report.is_clean());
        assert_eq!(sim.read("Blink.ET"), Some(Value::Time(100)));
    }

    #[test]
    fn test_load_rejects_bad_source() {
        let err = Simulator::load("X := ;").unwrap_err();
        assert!(err.contains("PARSE"));
    }

    #[test]
    fn test_step_uses_configured_period() {
        let (mut sim, _) = Simulator::load(BLINKER).expect("load");
        sim.state_mut().scan_time_ms = 50;
        sim.start();
        sim.state_mut().set_bool("Run", true);
        sim.step();
        assert_eq!(sim.read("Blink.ET"), Some(Value::Time(50)));
    }

    #[test]
    fn test_default_watch_lists_declarations() {
        let (sim, _) = Simulator::load(BLINKER).expect("load");
        assert_eq!(sim.default_watch(), vec!["Blink", "Run", "Pulse"]);
    }
}
