use std::collections::BTreeMap;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, info, warn};

use super::{normalize, ResponseShape, RetrievalAdapter, RetrievedContent};
use crate::config::{MethodPlan, RequestConfig};
use crate::error::{RetrievalError, RetrievalResult};

/// Body posted to a retrieval endpoint.
#[derive(Debug, Clone, Serialize)]
pub struct RetrievalRequest<'a> {
    /// Query text.
    pub query: &'a str,
    /// Method identifier, for endpoints that multiplex methods.
    pub method: &'a str,
    /// User or session identity, when supplied.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<&'a str>,
}

/// Retrieval method reached over HTTP (a thin bridge service in front of a
/// memory backend SDK). The response body is normalized by `shape`.
#[derive(Clone)]
pub struct HttpRetrievalAdapter {
    client: Client,
    method_id: String,
    label: String,
    endpoint: String,
    shape: ResponseShape,
    headers: BTreeMap<String, String>,
    request_config: RequestConfig,
}

impl HttpRetrievalAdapter {
    /// Create a new adapter for one method.
    pub fn new(
        method_id: impl Into<String>,
        endpoint: impl Into<String>,
        shape: ResponseShape,
        request_config: RequestConfig,
    ) -> RetrievalResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_millis(request_config.timeout_ms))
            .build()
            .map_err(RetrievalError::Http)?;
        let method_id = method_id.into();

        Ok(Self {
            client,
            label: method_id.clone(),
            method_id,
            endpoint: endpoint.into(),
            shape,
            headers: BTreeMap::new(),
            request_config,
        })
    }

    /// Build an adapter from a benchmark plan entry.
    pub fn from_plan(plan: &MethodPlan, request_config: RequestConfig) -> RetrievalResult<Self> {
        let mut adapter = Self::new(&plan.id, &plan.endpoint, plan.shape, request_config)?;
        if let Some(label) = &plan.label {
            adapter = adapter.with_label(label);
        }
        for (name, value) in &plan.headers {
            adapter = adapter.with_header(name, value);
        }
        Ok(adapter)
    }

    /// Set the human label passed to the judge.
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    /// Add a header sent with every request (e.g. an API key).
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    /// Response shape this adapter normalizes.
    pub fn shape(&self) -> ResponseShape {
        self.shape
    }

    /// Delay before retry `retry` (1-based): doubles each time and saturates
    /// instead of overflowing.
    fn backoff(&self, retry: u32) -> Duration {
        let factor = 2_u64.saturating_pow(retry.saturating_sub(1));
        Duration::from_millis(self.request_config.retry_delay_ms.saturating_mul(factor))
    }

    async fn execute_request(&self, request: &RetrievalRequest<'_>) -> RetrievalResult<Value> {
        debug!(method = %self.method_id, endpoint = %self.endpoint, "Calling retrieval endpoint");

        let mut builder = self.client.post(&self.endpoint).json(request);
        for (name, value) in &self.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }

        let response = builder.send().await.map_err(|e| {
            if e.is_timeout() {
                RetrievalError::Timeout {
                    timeout_ms: self.request_config.timeout_ms,
                }
            } else {
                RetrievalError::Http(e)
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            let error_body = response.text().await.unwrap_or_default();
            return Err(RetrievalError::Api {
                status: status.as_u16(),
                message: error_body,
            });
        }

        response
            .json()
            .await
            .map_err(|e| RetrievalError::InvalidResponse {
                message: format!("Failed to parse response: {}", e),
            })
    }
}

#[async_trait]
impl RetrievalAdapter for HttpRetrievalAdapter {
    fn method_id(&self) -> &str {
        &self.method_id
    }

    fn label(&self) -> &str {
        &self.label
    }

    async fn retrieve(
        &self,
        query: &str,
        identity: Option<&str>,
    ) -> RetrievalResult<RetrievedContent> {
        let request = RetrievalRequest {
            query,
            method: &self.method_id,
            user_id: identity,
        };

        let mut last_error = None;
        let mut retries = 0;

        while retries <= self.request_config.max_retries {
            if retries > 0 {
                let delay = self.backoff(retries);
                warn!(
                    method = %self.method_id,
                    retry = retries,
                    delay_ms = delay.as_millis(),
                    "Retrying retrieval request"
                );
                tokio::time::sleep(delay).await;
            }

            let start = Instant::now();
            match self.execute_request(&request).await {
                Ok(payload) => {
                    info!(
                        method = %self.method_id,
                        latency_ms = start.elapsed().as_millis(),
                        "Retrieval call succeeded"
                    );
                    // A payload we cannot read will not improve on retry.
                    return normalize(self.shape, &payload);
                }
                Err(e)
                    if matches!(&e, RetrievalError::Api { status, .. } if (400..500).contains(status)) =>
                {
                    return Err(e);
                }
                Err(e) => {
                    warn!(
                        method = %self.method_id,
                        error = %e,
                        latency_ms = start.elapsed().as_millis(),
                        retry = retries,
                        "Retrieval call failed"
                    );
                    last_error = Some(e);
                    retries += 1;
                }
            }
        }

        Err(RetrievalError::Unavailable {
            message: last_error
                .map(|e| e.to_string())
                .unwrap_or_else(|| "Unknown error".to_string()),
            retries,
        })
    }
}
