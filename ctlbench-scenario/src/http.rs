//! Contains a control service client using HTTP.

use async_trait::async_trait;

use crate::client::{ClientError, ClientResult, ControlServiceClient, Node};

/// User agent string used for outgoing requests.
pub const USER_AGENT: &str = concat!("ctlbench/", env!("CARGO_PKG_VERSION"));

/// Reads cluster state from the control service's REST API.
#[derive(Debug)]
pub struct HttpControlService {
    client: reqwest::Client,
    base_url: String,
}

impl HttpControlService {
    /// Creates a client for the control service at `base_url`, e.g. `http://10.0.0.1:4523`.
    pub fn new(base_url: impl Into<String>) -> ClientResult<Self> {
        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .build()
            .map_err(|cause| ClientError::Reqwest {
                context: "failed to build HTTP client".into(),
                cause,
            })?;

        Ok(Self::with_client(client, base_url))
    }

    /// Creates a client reusing an existing [`reqwest::Client`].
    pub fn with_client(client: reqwest::Client, base_url: impl Into<String>) -> Self {
        let mut base_url = base_url.into();
        while base_url.ends_with('/') {
            base_url.pop();
        }
        Self { client, base_url }
    }

    fn nodes_url(&self) -> String {
        format!("{}/v1/state/nodes", self.base_url)
    }
}

#[async_trait]
impl ControlServiceClient for HttpControlService {
    async fn list_nodes(&self) -> ClientResult<Vec<Node>> {
        let url = self.nodes_url();
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|cause| ClientError::Reqwest {
                context: format!("failed to request `{url}`"),
                cause,
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(ClientError::Status(status));
        }

        response.json().await.map_err(|cause| ClientError::Reqwest {
            context: "failed to decode node list".into(),
            cause,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_trailing_slashes() {
        let service = HttpControlService::new("http://10.0.0.1:4523//").unwrap();
        assert_eq!(service.nodes_url(), "http://10.0.0.1:4523/v1/state/nodes");
    }
}
