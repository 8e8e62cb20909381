use std::time::{Duration, Instant};

use reqwest::{Client, Response};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, info, warn};

use super::types::{CreatePipeRequest, CreatePipeResponse, PipeRequest, PipeResponse, PipeSpec};
use crate::config::{LangbaseConfig, RequestConfig};
use crate::error::{LangbaseError, LangbaseResult};

const RUN_PATH: &str = "/v1/pipes/run";
const PIPES_PATH: &str = "/v1/pipes";

/// Client for the Langbase Pipes API.
///
/// Only pipe runs are retried. Provisioning is a single attempt so that a
/// rejected pipe definition surfaces as-is.
#[derive(Clone)]
pub struct LangbaseClient {
    http: Client,
    base_url: String,
    api_key: String,
    request_config: RequestConfig,
}

impl LangbaseClient {
    /// Build a client from API and request settings.
    pub fn new(config: &LangbaseConfig, request_config: RequestConfig) -> LangbaseResult<Self> {
        let http = Client::builder()
            .timeout(Duration::from_millis(request_config.timeout_ms))
            .build()
            .map_err(LangbaseError::Http)?;

        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            request_config,
        })
    }

    /// API root without a trailing slash.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Run a pipe. 5xx, timeouts and transport errors are retried with
    /// exponential backoff; 4xx is returned on the first attempt.
    pub async fn call_pipe(&self, request: PipeRequest) -> LangbaseResult<PipeResponse> {
        let max_retries = self.request_config.max_retries;
        let mut attempt = 0;
        let mut last_error = String::new();

        while attempt <= max_retries {
            if attempt > 0 {
                let delay = self.backoff(attempt);
                warn!(
                    pipe = %request.name,
                    retry = attempt,
                    delay_ms = delay.as_millis() as u64,
                    "Retrying pipe run"
                );
                tokio::time::sleep(delay).await;
            }

            let started = Instant::now();
            let outcome = match self.post(RUN_PATH, &request).await {
                Ok(response) => decode::<PipeResponse>(response, "pipe run").await,
                Err(e) => Err(e),
            };

            match outcome {
                Ok(response) => {
                    debug!(
                        pipe = %request.name,
                        latency_ms = started.elapsed().as_millis() as u64,
                        tokens = ?response.total_tokens(),
                        "Pipe run succeeded"
                    );
                    return Ok(response);
                }
                Err(e) if is_client_error(&e) => return Err(e),
                Err(e) => {
                    warn!(pipe = %request.name, error = %e, attempt, "Pipe run failed");
                    last_error = e.to_string();
                    attempt += 1;
                }
            }
        }

        Err(LangbaseError::Unavailable {
            message: last_error,
            retries: attempt,
        })
    }

    /// Create or update the pipe described by `spec`. A 409 from an older
    /// API without upsert support means the pipe already exists.
    pub async fn ensure_pipe(&self, spec: &PipeSpec) -> LangbaseResult<()> {
        let request = CreatePipeRequest::from(spec);
        info!(pipe = %spec.name, model = %spec.model, "Provisioning pipe");

        let created = match self.post(PIPES_PATH, &request).await {
            Ok(response) => decode::<CreatePipeResponse>(response, "pipe creation").await?,
            Err(LangbaseError::Api { status: 409, .. }) => {
                info!(pipe = %spec.name, "Pipe already exists");
                return Ok(());
            }
            Err(e) => return Err(e),
        };

        info!(pipe = %created.name, url = %created.url, "Pipe ready");
        Ok(())
    }

    fn backoff(&self, attempt: u32) -> Duration {
        let factor = 2_u64.saturating_pow(attempt.saturating_sub(1));
        Duration::from_millis(self.request_config.retry_delay_ms.saturating_mul(factor))
    }

    /// POST a JSON body; non-2xx statuses become [`LangbaseError::Api`].
    async fn post<B: Serialize + ?Sized>(&self, path: &str, body: &B) -> LangbaseResult<Response> {
        let response = self
            .http
            .post(format!("{}{}", self.base_url, path))
            .bearer_auth(&self.api_key)
            .json(body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    LangbaseError::Timeout {
                        timeout_ms: self.request_config.timeout_ms,
                    }
                } else {
                    LangbaseError::Http(e)
                }
            })?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        Err(LangbaseError::Api {
            status: status.as_u16(),
            message: response.text().await.unwrap_or_default(),
        })
    }
}

async fn decode<T: DeserializeOwned>(response: Response, what: &str) -> LangbaseResult<T> {
    response
        .json()
        .await
        .map_err(|e| LangbaseError::InvalidResponse {
            message: format!("cannot decode {} response: {}", what, e),
        })
}

fn is_client_error(error: &LangbaseError) -> bool {
    matches!(error, LangbaseError::Api { status, .. } if (400..500).contains(status))
}
