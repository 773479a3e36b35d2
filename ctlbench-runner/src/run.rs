//! Runs a scenario against a cluster for the configured duration.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use ctlbench_scenario::clock::{Clock, TokioClock};
use ctlbench_scenario::http::HttpControlService;
use ctlbench_scenario::{
    BenchmarkCluster, NoLoadScenario, ReadRequestLoadScenario, RequestRateTooLow, Scenario,
};

use crate::config::{self, Config, ScenarioKind};

/// How a scenario run ended.
#[derive(Debug, PartialEq)]
pub enum Outcome {
    /// The scenario held up for the whole duration.
    Completed(Duration),
    /// The scenario could not sustain its target rate.
    RateTooLow(RequestRateTooLow),
    /// The run was interrupted before the duration elapsed.
    Interrupted,
}

/// Creates the cluster described by the configuration, talking to its control service via HTTP.
pub fn build_cluster(config: &config::Cluster) -> Result<BenchmarkCluster> {
    let url = config.control_service_url();
    let control_service =
        HttpControlService::new(&url).context("failed to create control service client")?;

    let mut addresses: HashSet<_> = config.nodes.iter().copied().collect();
    addresses.insert(config.control_node);

    Ok(BenchmarkCluster::new(
        config.control_node,
        Arc::new(control_service),
        addresses,
    ))
}

/// Creates the configured scenario.
pub fn build_scenario(
    config: &config::Scenario,
    clock: Arc<dyn Clock>,
    cluster: &BenchmarkCluster,
) -> Result<Box<dyn Scenario>> {
    let scenario: Box<dyn Scenario> = match config.kind {
        ScenarioKind::NoLoad => Box::new(NoLoadScenario::new()),
        ScenarioKind::ReadRequestLoad => Box::new(
            ReadRequestLoadScenario::builder(clock, cluster, config.target_rate)
                .check_interval(config.check_interval)
                .request_interval(config.request_interval)
                .window_size(config.window_size)
                .build()
                .context("invalid read request load scenario")?,
        ),
    };

    Ok(scenario)
}

/// Runs the configured scenario until the duration elapses, it fails, or the process is
/// interrupted.
///
/// The scenario is stopped in every case.
pub async fn run(config: &Config) -> Result<Outcome> {
    let cluster = build_cluster(&config.cluster)?;
    let clock = Arc::new(TokioClock::new());
    let scenario = build_scenario(&config.scenario, clock, &cluster)?;

    tracing::info!(
        kind = ?config.scenario.kind,
        control_service = %config.cluster.control_service_url(),
        duration = ?config.duration,
        "running scenario"
    );
    scenario.start().await?;

    let outcome = tokio::select! {
        maintained = scenario.maintained() => match maintained {
            Ok(()) => Outcome::Completed(config.duration),
            Err(error) => Outcome::RateTooLow(error),
        },
        _ = tokio::time::sleep(config.duration) => Outcome::Completed(config.duration),
        _ = tokio::signal::ctrl_c() => Outcome::Interrupted,
    };

    scenario.stop().await?;
    tracing::info!(?outcome, "scenario finished");

    Ok(outcome)
}
