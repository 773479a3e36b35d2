//! The control service seen from a load scenario.

use std::fmt::Debug;
use std::net::IpAddr;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// A node known to the control service.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Deserialize, Serialize)]
pub struct Node {
    /// Unique identifier of the node.
    pub uuid: Uuid,
    /// The address the node is reachable at.
    #[serde(rename = "host")]
    pub public_address: IpAddr,
}

/// Errors returned by a [`ControlServiceClient`].
#[derive(Debug, Error)]
pub enum ClientError {
    /// Network errors and errors decoding the response body.
    #[error("reqwest error: {context}")]
    Reqwest {
        /// What the client was doing when the error occurred.
        context: String,
        /// The underlying error.
        #[source]
        cause: reqwest::Error,
    },

    /// The control service answered with an unsuccessful status.
    #[error("control service responded with {0}")]
    Status(reqwest::StatusCode),
}

/// Result type for control service requests.
pub type ClientResult<T> = Result<T, ClientError>;

/// A client for the control service that load is generated against.
///
/// A request that is never answered is represented by a future that never completes. Callers
/// must not expect a distinct signal for dropped requests.
#[async_trait::async_trait]
pub trait ControlServiceClient: Debug + Send + Sync + 'static {
    /// Lists the nodes known to the control service.
    async fn list_nodes(&self) -> ClientResult<Vec<Node>>;
}

/// An in-memory control service that answers every request immediately.
#[derive(Clone, Debug, Default)]
pub struct FakeControlService {
    nodes: Vec<Node>,
}

impl FakeControlService {
    /// Creates a fake control service that knows about the given nodes.
    pub fn new(nodes: Vec<Node>) -> Self {
        Self { nodes }
    }
}

#[async_trait::async_trait]
impl ControlServiceClient for FakeControlService {
    async fn list_nodes(&self) -> ClientResult<Vec<Node>> {
        Ok(self.nodes.clone())
    }
}
