use std::time::Duration;

use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

use crate::decode::{self, DecodeError};
use crate::payload::{self, PageMeta, Payload, Row, ShapeError};

#[derive(Clone, Debug)]
pub struct ClientOptions {
    pub base_url: String,
    pub token: String,
    pub timeout_seconds: u64,
    pub proxy: Option<String>,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            base_url: String::new(),
            token: String::new(),
            timeout_seconds: 10,
            proxy: None,
        }
    }
}

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("invalid base URL '{url}': {reason}")]
    InvalidBaseUrl { url: String, reason: String },

    #[error("bearer token contains characters invalid in a header")]
    InvalidToken,

    #[error("failed to build HTTP client: {source}")]
    HttpClientBuild {
        #[source]
        source: reqwest::Error,
    },

    #[error("failed to setup proxy: {proxy}: {source}")]
    ProxySetup {
        proxy: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("request to {url} failed: {source}")]
    Network {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("server returned {status} for {url}")]
    Status { status: u16, url: String },

    #[error("validation failed: {}", .messages.join("; "))]
    Validation { messages: Vec<String> },

    #[error(transparent)]
    Decode(#[from] DecodeError),

    #[error(transparent)]
    Shape(#[from] ShapeError),
}

/// Bearer-authenticated JSON client for the back-office API. All verbs
/// return the decoded body; callers needing a list shape go through
/// [`ApiClient::get_payload`].
#[derive(Clone, Debug)]
pub struct ApiClient {
    http: reqwest::Client,
    base_url: reqwest::Url,
}

impl ApiClient {
    pub fn new(options: &ClientOptions) -> Result<Self, ApiError> {
        let base_url =
            reqwest::Url::parse(&options.base_url).map_err(|e| ApiError::InvalidBaseUrl {
                url: options.base_url.clone(),
                reason: e.to_string(),
            })?;
        let mut base_url = base_url;
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }

        let mut headers = reqwest::header::HeaderMap::new();
        headers.insert(
            reqwest::header::ACCEPT,
            reqwest::header::HeaderValue::from_static("application/json"),
        );
        if !options.token.trim().is_empty() {
            let mut value = reqwest::header::HeaderValue::from_str(&format!(
                "Bearer {}",
                options.token.trim()
            ))
            .map_err(|_| ApiError::InvalidToken)?;
            value.set_sensitive(true);
            headers.insert(reqwest::header::AUTHORIZATION, value);
        }

        let timeout = Duration::from_secs(options.timeout_seconds.max(1));
        let mut builder = reqwest::Client::builder()
            .default_headers(headers)
            .redirect(reqwest::redirect::Policy::limited(10))
            .timeout(timeout);

        if let Some(proxy) = options.proxy.as_deref().filter(|p| !p.trim().is_empty()) {
            let proxy = reqwest::Proxy::all(proxy).map_err(|e| ApiError::ProxySetup {
                proxy: proxy.to_string(),
                source: e,
            })?;
            builder = builder.proxy(proxy);
        }

        let http = builder
            .build()
            .map_err(|e| ApiError::HttpClientBuild { source: e })?;

        Ok(Self { http, base_url })
    }

    pub fn endpoint(&self, path: &str) -> Result<reqwest::Url, ApiError> {
        self.base_url
            .join(path.trim_start_matches('/'))
            .map_err(|e| ApiError::InvalidBaseUrl {
                url: format!("{}{}", self.base_url, path),
                reason: e.to_string(),
            })
    }

    pub async fn get(&self, path: &str, query: &[(&str, String)]) -> Result<Value, ApiError> {
        let url = self.endpoint(path)?;
        let req = self.http.get(url).query(query);
        self.execute(req).await
    }

    pub async fn get_payload(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<Payload, ApiError> {
        let value = self.get(path, query).await?;
        Ok(payload::normalize(value)?)
    }

    pub async fn post<B: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<Value, ApiError> {
        let url = self.endpoint(path)?;
        let req = self.http.post(url).json(body);
        self.execute(req).await
    }

    pub async fn put<B: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<Value, ApiError> {
        let url = self.endpoint(path)?;
        let req = self.http.put(url).json(body);
        self.execute(req).await
    }

    pub async fn delete(&self, path: &str) -> Result<Value, ApiError> {
        let url = self.endpoint(path)?;
        let req = self.http.delete(url);
        self.execute(req).await
    }

    async fn execute(&self, req: reqwest::RequestBuilder) -> Result<Value, ApiError> {
        let resp = req.send().await.map_err(|e| ApiError::Network {
            url: e
                .url()
                .map(|u| u.to_string())
                .unwrap_or_else(|| self.base_url.to_string()),
            source: e,
        })?;

        let status = resp.status();
        let url = resp.url().to_string();
        let text = resp.text().await.map_err(|e| ApiError::Network {
            url: url.clone(),
            source: e,
        })?;

        if status.is_success() {
            return Ok(decode::decode(&text)?);
        }

        // 400/422 bodies carry field validation messages meant for the
        // user; surface them verbatim instead of a bare status code.
        if status.as_u16() == 400 || status.as_u16() == 422 {
            if let Ok(body) = decode::decode(&text) {
                let messages = validation_messages(&body);
                if !messages.is_empty() {
                    return Err(ApiError::Validation { messages });
                }
            }
        }

        Err(ApiError::Status {
            status: status.as_u16(),
            url,
        })
    }
}

fn validation_messages(body: &Value) -> Vec<String> {
    let mut out = Vec::new();
    if let Some(errors) = body.get("errors").and_then(Value::as_object) {
        for (field, value) in errors {
            match value {
                Value::Array(items) => {
                    for item in items {
                        if let Some(s) = item.as_str() {
                            out.push(format!("{field}: {s}"));
                        }
                    }
                }
                Value::String(s) => out.push(format!("{field}: {s}")),
                _ => {}
            }
        }
    }
    if out.is_empty() {
        if let Some(message) = body.get("message").and_then(Value::as_str) {
            if !message.trim().is_empty() {
                out.push(message.to_string());
            }
        }
    }
    out
}

/// The settled state a view renders after a fetch. Decode and network
/// failures degrade here instead of propagating past the fetch boundary,
/// and a failed request stays distinguishable from a genuinely empty
/// result. Failures are never retried automatically.
#[derive(Clone, Debug, PartialEq)]
pub enum FetchOutcome {
    Rows { rows: Vec<Row>, meta: Option<PageMeta> },
    Empty,
    Failed { reason: String },
}

impl FetchOutcome {
    pub fn rows(&self) -> &[Row] {
        match self {
            FetchOutcome::Rows { rows, .. } => rows,
            _ => &[],
        }
    }
}

pub fn settle(result: Result<Payload, ApiError>) -> FetchOutcome {
    match result {
        Ok(payload) => {
            let meta = payload.meta();
            let rows = payload.rows();
            if rows.is_empty() {
                FetchOutcome::Empty
            } else {
                FetchOutcome::Rows { rows, meta }
            }
        }
        Err(e) => FetchOutcome::Failed {
            reason: e.to_string(),
        },
    }
}
