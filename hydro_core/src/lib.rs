#![cfg_attr(all(not(debug_assertions), not(test)), deny(warnings))]
#![cfg_attr(
    all(not(debug_assertions), not(test)),
    deny(clippy::all, clippy::pedantic, clippy::nursery)
)]
#![allow(clippy::module_name_repetitions, clippy::missing_errors_doc)]
#![cfg_attr(not(test), deny(clippy::unwrap_used, clippy::expect_used))]
//! Core control logic for the hydroponic controller (hardware-agnostic).
//!
//! All hardware interactions go through the `hydro_traits` capability
//! traits (`AnalogSensor`, `Actuator`, `Positioner`).
//!
//! ## Architecture
//!
//! - **Acquisition**: budgeted stable-reading loop over a rolling window
//!   (`reader`, `window`)
//! - **Correction**: bounded dose-mix-recheck state machine (`corrector`)
//! - **Arbitration**: exclusive RAII lease over the shared mix pump
//!   (`arbiter`)
//! - **Scheduling**: interval / time-of-day / hour-bucket rules
//!   (`schedule`)
//! - **Telemetry**: report + command boundary trait (`telemetry`,
//!   `command`); transports live in `hydro_telemetry`
//! - **Orchestration**: control and telemetry threads (`runner`)

pub mod arbiter;
pub mod command;
mod conversions;
pub mod corrector;
pub mod error;
pub mod mocks;
pub mod reader;
pub mod runner;
pub mod schedule;
pub mod telemetry;
pub mod util;
pub mod window;

pub use arbiter::{LeaseDenied, MixLease, ResourceArbiter};
pub use command::RemoteCommand;
pub use corrector::{BoundedCorrector, CorrectionOutcome, CorrectorCfg, Direction};
pub use error::{ControlError, Result};
pub use reader::{Reading, ReaderCfg, StableReader};
pub use runner::RunnerCfg;
pub use schedule::{ScheduleRule, Scheduler};
pub use telemetry::{CycleReport, NoTelemetry, TelemetryPort};
