//! The cluster a benchmark runs against.

use std::collections::HashSet;
use std::net::IpAddr;
use std::sync::Arc;

use crate::client::ControlServiceClient;

/// A cluster under benchmark: its control service and the addresses of its nodes.
#[derive(Clone, Debug)]
pub struct BenchmarkCluster {
    control_node_address: IpAddr,
    control_service: Arc<dyn ControlServiceClient>,
    public_addresses: HashSet<IpAddr>,
}

impl BenchmarkCluster {
    /// Creates a cluster whose control service runs on `control_node_address`.
    pub fn new(
        control_node_address: IpAddr,
        control_service: Arc<dyn ControlServiceClient>,
        public_addresses: HashSet<IpAddr>,
    ) -> Self {
        Self {
            control_node_address,
            control_service,
            public_addresses,
        }
    }

    /// The address of the node running the control service.
    pub fn control_node_address(&self) -> IpAddr {
        self.control_node_address
    }

    /// A client for the cluster's control service.
    ///
    /// Every call returns the same client instance.
    pub fn control_service(&self) -> Arc<dyn ControlServiceClient> {
        Arc::clone(&self.control_service)
    }

    /// The public addresses of all nodes in the cluster.
    pub fn public_addresses(&self) -> &HashSet<IpAddr> {
        &self.public_addresses
    }
}
