use std::time::Duration;

use reqwest::header::{HeaderValue, AUTHORIZATION};
use serde::Serialize;
use serde_json::{Map, Value};
use tracing::{debug, instrument, trace, warn};

use super::compose::Subgraph;
use super::error::{GatewayError, Result};

const SDL_QUERY: &str = "{ _service { sdl } }";

/// GraphQL-over-HTTP request body sent upstream.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UpstreamRequest<'a> {
    pub query: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub operation_name: Option<&'a str>,
    #[serde(skip_serializing_if = "Map::is_empty")]
    pub variables: Map<String, Value>,
}

/// HTTP client shared by every upstream call.
#[derive(Clone, Debug)]
pub struct UpstreamClient {
    http: reqwest::Client,
}

impl UpstreamClient {
    pub fn new(timeout: Duration) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|source| GatewayError::Transport {
                service: "gateway".to_string(),
                source,
            })?;
        Ok(Self { http })
    }

    /// POST a GraphQL request, copying the caller's `authorization` header verbatim.
    #[instrument(skip(self, request, authorization), fields(service = %subgraph.name))]
    pub async fn send(
        &self,
        subgraph: &Subgraph,
        request: &UpstreamRequest<'_>,
        authorization: Option<&HeaderValue>,
    ) -> Result<Map<String, Value>> {
        trace!("Forwarding operation to {}", subgraph.url);

        let mut builder = self.http.post(&subgraph.url).json(request);
        if let Some(authorization) = authorization {
            builder = builder.header(AUTHORIZATION, authorization.clone());
        }

        let transport = |source| GatewayError::Transport {
            service: subgraph.name.clone(),
            source,
        };
        let response = builder.send().await.map_err(transport)?;
        let status = response.status();
        let body: Value = response.json().await.map_err(transport)?;

        match body {
            // Services answer GraphQL errors (including 401) with an envelope
            Value::Object(envelope) if envelope.contains_key("data") || envelope.contains_key("errors") => {
                debug!("{} answered with status {}", subgraph.name, status);
                Ok(envelope)
            }
            _ => {
                warn!("{} answered {} without a GraphQL envelope", subgraph.name, status);
                Err(GatewayError::InvalidResponse {
                    service: subgraph.name.clone(),
                    message: format!("status {} without data or errors", status),
                })
            }
        }
    }

    /// Fetch the federated SDL an upstream publishes.
    #[instrument(skip(self), fields(service = %subgraph.name))]
    pub async fn fetch_sdl(&self, subgraph: &Subgraph) -> Result<String> {
        let request = UpstreamRequest {
            query: SDL_QUERY,
            operation_name: None,
            variables: Map::new(),
        };
        let envelope = self.send(subgraph, &request, None).await?;

        envelope
            .get("data")
            .and_then(|data| data.get("_service"))
            .and_then(|service| service.get("sdl"))
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| GatewayError::InvalidResponse {
                service: subgraph.name.clone(),
                message: format!(
                    "no SDL in response: {}",
                    envelope.get("errors").cloned().unwrap_or(Value::Null)
                ),
            })
    }
}
