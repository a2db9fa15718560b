#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::doc_markdown)]
#![allow(clippy::too_many_lines)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::unused_async)]

//! unitd library — exposes the core modules for use by downstream crates.
//!
//! - `config` — unit file loading
//! - `process` — the one-shot event primitive, stdio pump, command runner
//!   and the `ProcessUnit` state machine
//! - `pool` — `SupervisorPool`, which drives one or more units to
//!   completion
//! - `signal_future` — one-shot futures over OS signal delivery
//! - `logsink` — structured logging sink for stdio and lifecycle events
//! - `error` — shared error types

pub mod config;
pub mod error;
pub mod logsink;
pub mod pool;
pub mod process;
pub mod signal_future;

pub use config::Config;
pub use pool::SupervisorPool;
pub use process::unit::ProcessUnit;
