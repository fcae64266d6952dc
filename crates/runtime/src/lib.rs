//! Scan-cycle runtime for Structured Text programs
//!
//! Executes the AST produced by `rung-compiler` under PLC semantics: a
//! driver calls [`interp::scan`] on a fixed cadence and the interpreter
//! performs exactly one scan cycle per call: clock step, statements in
//! source order, then timer advance. The runtime never blocks, spawns,
//! sleeps or performs I/O; wall-clock time arrives from the driver as
//! the `scan_ms` argument.
//!
//! State lives in [`state::RuntimeState`]: four typed scalar stores plus
//! instance records for timers, counters, edge detectors and bistables.
//! Between scans the driver may flip inputs through the store's typed
//! setters; the program observes the change on the next scan.
//!
//! ```rust
//! use rungc::parser::parse;
//! use rung_runtime::{interp, state::RuntimeState};
//!
//! let program = parse("VAR A, X : BOOL; END_VAR X := A;").program;
//! let mut state = RuntimeState::new();
//! interp::initialize(&program, &mut state);
//! state.set_bool("A", true);
//! interp::scan(&program, &mut state, 100);
//! assert_eq!(state.get_bool("X"), Some(true));
//! ```

pub mod counter;
pub mod interp;
pub mod state;
pub mod timer;
pub mod trigger;
pub mod value;

pub use counter::{CounterKind, CounterState};
pub use interp::{initialize, scan, ScanReport};
pub use state::{RuntimeState, SimStatus, SlotKind};
pub use timer::{TimerKind, TimerState};
pub use trigger::{BistableKind, BistableState, EdgeKind, EdgeState};
pub use value::Value;
