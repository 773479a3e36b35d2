//! Load scenarios for benchmarking a cluster's control service.
//!
//! A [`Scenario`] generates a particular kind of load while a benchmark takes its
//! measurements. The main scenario is the [`ReadRequestLoadScenario`], which issues read
//! requests to the control service at a target rate and fails its
//! [`maintained`](Scenario::maintained) signal once the achieved rate drops below that target.
//!
//! Scenarios run against a [`Clock`](clock::Clock). In tests, a [`ManualClock`](clock::ManualClock)
//! makes them fully deterministic:
//!
//! ```
//! use std::collections::HashSet;
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! use ctlbench_scenario::clock::ManualClock;
//! use ctlbench_scenario::{BenchmarkCluster, FakeControlService, ReadRequestLoadScenario, Scenario};
//! use futures::FutureExt;
//!
//! let address = "10.0.0.1".parse().unwrap();
//! let service = Arc::new(FakeControlService::default());
//! let cluster = BenchmarkCluster::new(address, service, HashSet::from([address]));
//!
//! let clock = Arc::new(ManualClock::new());
//! let scenario =
//!     ReadRequestLoadScenario::new(clock.clone(), &cluster, 5.0, Duration::from_secs(1)).unwrap();
//!
//! scenario.start().now_or_never().unwrap().unwrap();
//! clock.pump(std::iter::repeat_n(Duration::from_secs(1), 6));
//! assert_eq!(scenario.maintained().now_or_never(), None);
//!
//! scenario.stop().now_or_never().unwrap().unwrap();
//! assert_eq!(scenario.maintained().now_or_never(), Some(Ok(())));
//! ```
#![warn(missing_docs)]
#![warn(missing_debug_implementations)]

pub mod client;
pub mod clock;
pub mod cluster;
pub mod error;
pub mod http;
pub mod rate;
pub mod scenario;

pub use client::{ClientError, ControlServiceClient, FakeControlService, Node};
pub use cluster::BenchmarkCluster;
pub use error::{RequestRateTooLow, ScenarioError};
pub use rate::RateMeasurer;
pub use scenario::{Maintained, NoLoadScenario, ReadRequestLoadScenario, Scenario, ScenarioState};
