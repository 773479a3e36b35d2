//! Test utilities for ctlbench scenarios.
//!
//! This crate provides control service fakes and logging setup shared by the scenario tests.
//! See the modules for all available utilities.

pub mod clients;
pub mod cluster;
pub mod tracing;
