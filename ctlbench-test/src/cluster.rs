//! Ready-made clusters for scenario tests.

use std::net::IpAddr;
use std::sync::Arc;

use ctlbench_scenario::client::{ControlServiceClient, Node};
use ctlbench_scenario::cluster::BenchmarkCluster;
use uuid::Uuid;

/// Creates the two nodes of a test cluster, at `10.0.0.1` and `10.0.0.2`.
pub fn nodes() -> Vec<Node> {
    ["10.0.0.1", "10.0.0.2"]
        .into_iter()
        .map(|address| Node {
            uuid: Uuid::new_v4(),
            public_address: address.parse().unwrap(),
        })
        .collect()
}

/// Creates a cluster with the given control service, running on the first of [`nodes`].
pub fn make_cluster(control_service: Arc<dyn ControlServiceClient>) -> BenchmarkCluster {
    let addresses: Vec<IpAddr> = nodes().iter().map(|node| node.public_address).collect();
    BenchmarkCluster::new(addresses[0], control_service, addresses.into_iter().collect())
}
