//! Control service fakes with controllable failure modes.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use ctlbench_scenario::client::{ClientResult, ControlServiceClient, Node};

/// A control service that can be told to drop every other request.
///
/// Dropped requests are never answered: their futures stay pending forever. Answered requests
/// succeed immediately with the configured nodes.
#[derive(Debug, Default)]
pub struct RequestDroppingControlService {
    nodes: Vec<Node>,
    drop_requests: AtomicBool,
    dropped_last_request: AtomicBool,
    dropped: AtomicUsize,
}

impl RequestDroppingControlService {
    /// Creates a service that answers every request until told otherwise.
    pub fn new(nodes: Vec<Node>) -> Self {
        Self {
            nodes,
            ..Default::default()
        }
    }

    /// Starts or stops dropping every other request.
    ///
    /// The first request after enabling this is dropped.
    pub fn set_drop_requests(&self, drop_requests: bool) {
        self.drop_requests.store(drop_requests, Ordering::SeqCst);
    }

    /// The number of requests dropped so far.
    pub fn dropped(&self) -> usize {
        self.dropped.load(Ordering::SeqCst)
    }

    fn should_drop(&self) -> bool {
        if !self.drop_requests.load(Ordering::SeqCst) {
            return false;
        }
        // Alternate between dropping and answering.
        let dropped_last = self.dropped_last_request.fetch_xor(true, Ordering::SeqCst);
        !dropped_last
    }
}

#[async_trait::async_trait]
impl ControlServiceClient for RequestDroppingControlService {
    async fn list_nodes(&self) -> ClientResult<Vec<Node>> {
        if self.should_drop() {
            self.dropped.fetch_add(1, Ordering::SeqCst);
            return futures::future::pending().await;
        }
        Ok(self.nodes.clone())
    }
}
