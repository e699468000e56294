//! splitcodec command line support
//!
//! Workload simulator for the `splitcodec` binary. The simulator drives the
//! reference text engines and is only built with the `simulator` feature
//! (on by default).

#![warn(missing_docs)]

#[cfg(feature = "simulator")]
pub mod simulator;

#[cfg(feature = "simulator")]
pub use simulator::{run_simulator, SimulatorConfig, SimulatorReport, WorkloadDistribution};
