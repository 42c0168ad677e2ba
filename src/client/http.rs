//! HTTP implementation of [`JobService`].

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, AUTHORIZATION};
use serde::de::DeserializeOwned;
use serde_json::Value;
use url::Url;

use super::JobService;
use crate::config::{Endpoints, MonitorConfig, TASK_ID_PLACEHOLDER};
use crate::error::ServiceError;
use crate::types::wire::{ArtifactList, StartRequest, StartResponse, StatusResponse};

/// Talks to the job service over its REST API.
///
/// # Examples
///
/// ```
/// use jobwatch::{HttpJobService, MonitorConfig};
///
/// let config = MonitorConfig::default().with_base_url("http://localhost:8000/api");
/// let service = HttpJobService::from_config(&config).unwrap();
/// assert_eq!(service.base_url().as_str(), "http://localhost:8000/api/");
/// ```
#[derive(Debug, Clone)]
pub struct HttpJobService {
    http_client: reqwest::Client,
    base_url: Url,
    endpoints: Endpoints,
}

impl HttpJobService {
    /// Builds a client from configuration: base URL, endpoints, timeout,
    /// bearer token and extra headers.
    pub fn from_config(config: &MonitorConfig) -> Result<Self, ServiceError> {
        let mut headers = HeaderMap::new();
        for (name, value) in &config.headers {
            let name = HeaderName::from_bytes(name.as_bytes())
                .map_err(|e| ServiceError::InvalidRequest(format!("header {name}: {e}")))?;
            let value = HeaderValue::from_str(value)
                .map_err(|e| ServiceError::InvalidRequest(format!("header {name}: {e}")))?;
            headers.insert(name, value);
        }
        if let Some(token) = &config.auth_token {
            let mut value = HeaderValue::from_str(&format!("Bearer {token}"))
                .map_err(|e| ServiceError::InvalidRequest(format!("auth token: {e}")))?;
            value.set_sensitive(true);
            headers.insert(AUTHORIZATION, value);
        }

        let http_client = reqwest::Client::builder()
            .timeout(config.request_timeout())
            .default_headers(headers)
            .build()
            .map_err(|e| ServiceError::InvalidRequest(format!("failed to create HTTP client: {e}")))?;

        Self::with_http_client(http_client, &config.base_url, config.endpoints.clone())
    }

    /// Uses a preconfigured `reqwest` client.
    pub fn with_http_client(
        http_client: reqwest::Client,
        base_url: &str,
        endpoints: Endpoints,
    ) -> Result<Self, ServiceError> {
        Ok(Self {
            http_client,
            base_url: normalize_base(base_url)?,
            endpoints,
        })
    }

    /// Base URL every endpoint is resolved against. Always ends in `/`.
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn endpoint(&self, path: &str) -> Result<Url, ServiceError> {
        self.base_url
            .join(path.trim_start_matches('/'))
            .map_err(|e| ServiceError::InvalidRequest(format!("{path}: {e}")))
    }

    fn status_url(&self, task_handle: &str) -> Result<Url, ServiceError> {
        let encoded: String = url::form_urlencoded::byte_serialize(task_handle.as_bytes()).collect();
        self.endpoint(&self.endpoints.status.replace(TASK_ID_PLACEHOLDER, &encoded))
    }

    async fn read<T: DeserializeOwned>(response: reqwest::Response) -> Result<T, ServiceError> {
        let status = response.status();
        let body = response.text().await.map_err(transport)?;
        if !status.is_success() {
            return Err(ServiceError::Rejected {
                status: status.as_u16(),
                message: error_message(&body)
                    .unwrap_or_else(|| status.canonical_reason().unwrap_or("error").to_string()),
            });
        }
        serde_json::from_str(&body).map_err(Into::into)
    }
}

fn normalize_base(base_url: &str) -> Result<Url, ServiceError> {
    let mut base = base_url.trim().to_string();
    if !base.ends_with('/') {
        base.push('/');
    }
    Url::parse(&base).map_err(|e| ServiceError::InvalidRequest(format!("base url {base_url}: {e}")))
}

fn transport(err: reqwest::Error) -> ServiceError {
    if err.is_timeout() {
        ServiceError::Transport(format!("request timed out: {err}"))
    } else {
        ServiceError::Transport(err.to_string())
    }
}

/// Pulls a human-readable message out of an error body.
fn error_message(body: &str) -> Option<String> {
    let trimmed = body.trim();
    if trimmed.is_empty() {
        return None;
    }
    if let Ok(Value::Object(map)) = serde_json::from_str::<Value>(trimmed) {
        for key in ["error", "message", "detail"] {
            if let Some(Value::String(message)) = map.get(key) {
                return Some(message.clone());
            }
        }
    }
    Some(trimmed.to_string())
}

#[async_trait]
impl JobService for HttpJobService {
    async fn start(&self, job_key: &str) -> Result<StartResponse, ServiceError> {
        let url = self.endpoint(&self.endpoints.start)?;
        tracing::debug!(%url, job_key, "Submitting job");
        let response = self
            .http_client
            .post(url)
            .json(&StartRequest { ticker: job_key })
            .send()
            .await
            .map_err(transport)?;
        Self::read(response).await
    }

    async fn status(&self, task_handle: &str) -> Result<StatusResponse, ServiceError> {
        let url = self.status_url(task_handle)?;
        let response = self.http_client.get(url).send().await.map_err(transport)?;
        Self::read(response).await
    }

    async fn artifacts(&self) -> Result<ArtifactList, ServiceError> {
        let url = self.endpoint(&self.endpoints.artifacts)?;
        let response = self.http_client.get(url).send().await.map_err(transport)?;
        let list: ArtifactList = Self::read(response).await?;
        if let Some(message) = list.reported_error() {
            return Err(ServiceError::Reported(message.to_string()));
        }
        Ok(list)
    }
}
