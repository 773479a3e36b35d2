//! The benchmark runner.
//!
//! This builds on top of [`ctlbench_scenario`] and runs a configured scenario against a real
//! cluster, reporting whether the control service kept up with the load.

pub mod cli;
pub mod config;
pub mod observability;
pub mod run;
