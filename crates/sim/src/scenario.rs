//! Scenario files: scripted stimulus for a simulation run
//!
//! A scenario is a TOML document with one `[scenario]` header and any
//! number of `[[step]]` blocks. Each step names the scan before which
//! its `set` assignments are applied, which mirrors how a real driver
//! mutates inputs strictly between scans:
//!
//! ```toml
//! [scenario]
//! scans = 30
//! scan-ms = 100
//! watch = ["Motor", "Delay.ET"]
//!
//! [[step]]
//! at = 0
//! set = { Start = true }
//!
//! [[step]]
//! at = 10
//! set = { Start = false, Window = "T#2s" }
//! ```

use rung_runtime::{RuntimeState, SlotKind};
use rungc::timeval;
use serde::Deserialize;
use std::collections::BTreeMap;

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ScenarioFile {
    #[serde(default)]
    pub scenario: Settings,
    #[serde(rename = "step", default)]
    pub steps: Vec<Step>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct Settings {
    /// Total scans to run; the CLI flag wins when both are given
    pub scans: Option<u64>,
    /// Scan period in milliseconds
    pub scan_ms: Option<i64>,
    /// Access paths to report each scan
    #[serde(default)]
    pub watch: Vec<String>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Step {
    /// Applied before scan number `at` (0-based)
    pub at: u64,
    #[serde(default)]
    pub set: BTreeMap<String, toml::Value>,
}

impl ScenarioFile {
    pub fn from_toml(text: &str) -> Result<ScenarioFile, String> {
        toml::from_str(text).map_err(|e| format!("bad scenario file: {}", e))
    }

    /// Steps scheduled immediately before the given scan
    pub fn steps_at(&self, scan: u64) -> impl Iterator<Item = &Step> {
        self.steps.iter().filter(move |s| s.at == scan)
    }

    /// Apply every step scheduled for `scan`; collects one message per
    /// assignment that could not be applied
    pub fn apply(&self, scan: u64, state: &mut RuntimeState) -> Vec<String> {
        let mut failures = Vec::new();
        for step in self.steps_at(scan) {
            for (name, value) in &step.set {
                if let Err(message) = apply_value(state, name, value) {
                    failures.push(message);
                }
            }
        }
        failures
    }
}

/// Write one scenario value into the store, typed by the target slot
pub fn apply_value(
    state: &mut RuntimeState,
    name: &str,
    value: &toml::Value,
) -> Result<(), String> {
    let kind = state
        .slot_kind(name)
        .ok_or_else(|| format!("scenario sets '{}', which is not declared", name))?;

    match kind {
        SlotKind::Bool => match value {
            toml::Value::Boolean(b) => {
                state.set_bool(name, *b);
                Ok(())
            }
            other => Err(type_error(name, "a boolean", other)),
        },
        SlotKind::Int => match value {
            toml::Value::Integer(n) => {
                state.set_int(name, *n as i32);
                Ok(())
            }
            other => Err(type_error(name, "an integer", other)),
        },
        SlotKind::Real => match value {
            toml::Value::Float(f) => {
                state.set_real(name, *f);
                Ok(())
            }
            toml::Value::Integer(n) => {
                state.set_real(name, *n as f64);
                Ok(())
            }
            other => Err(type_error(name, "a number", other)),
        },
        SlotKind::Time => match value {
            toml::Value::String(text) => {
                let ms = timeval::parse_time_literal(text)?;
                state.set_time(name, ms);
                Ok(())
            }
            toml::Value::Integer(ms) => {
                state.set_time(name, *ms);
                Ok(())
            }
            other => Err(type_error(name, "a TIME literal string or milliseconds", other)),
        },
        SlotKind::Timer => match value {
            // A boolean on a timer drives its IN
            toml::Value::Boolean(b) => {
                state.set_timer_input(name, *b);
                Ok(())
            }
            // A string or integer sets its preset
            toml::Value::String(text) => {
                let ms = timeval::parse_time_literal(text)?;
                state.set_timer_preset(name, ms);
                Ok(())
            }
            toml::Value::Integer(ms) => {
                state.set_timer_preset(name, *ms);
                Ok(())
            }
            other => Err(type_error(name, "a boolean (IN) or preset", other)),
        },
        SlotKind::Counter | SlotKind::Edge | SlotKind::Bistable => Err(format!(
            "scenario cannot set '{}' directly; drive its inputs from the program instead",
            name
        )),
    }
}

fn type_error(name: &str, expected: &str, got: &toml::Value) -> String {
    format!(
        "scenario value for '{}' must be {}, got {}",
        name,
        expected,
        got.type_str()
    )
}
