//! Resilient API client for the memodeck backend.
//!
//! This module provides the `ApiClient` struct for making authenticated
//! requests with per-attempt timeouts, bounded retries with linear
//! backoff, and uniform [`ApiResponse`] envelopes for every outcome.
//!
//! Two asymmetries are deliberate and load-bearing:
//! - A timed-out attempt is **not** retried; it fails fast so the UI can
//!   react, while transport and server errors go through the retry loop.
//! - HTTP status is only interpreted for 401, 404 and 5xx. Every other
//!   status (including 4xx like 400) is resolved by parsing the body
//!   envelope: the backend, not the transport, decides `success`.

use std::sync::{Arc, RwLock};

use chrono::Utc;
use rand::Rng;
use reqwest::{header, multipart, Client, Method, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, warn};

use crate::config::ClientConfig;
use crate::notify::{LogNotifier, Notifier};
use crate::storage::CredentialStore;

use super::types::{ApiResponse, RequestConfig};
use super::ApiError;

// ============================================================================
// Constants
// ============================================================================

/// CSRF-style marker the backend requires on every request.
const REQUESTED_WITH: &str = "XMLHttpRequest";

const HEADER_REQUESTED_WITH: &str = "x-requested-with";
const HEADER_CLIENT_VERSION: &str = "x-client-version";
const HEADER_PLATFORM: &str = "x-platform";
const HEADER_REQUEST_ID: &str = "x-request-id";
const HEADER_TIMESTAMP: &str = "x-request-timestamp";

/// Fixed user-facing messages for client-fabricated envelopes.
const MSG_SESSION_EXPIRED: &str = "Your session has expired. Please sign in again.";
const MSG_NOT_FOUND: &str = "The requested resource was not found.";
const MSG_TIMEOUT: &str = "Request timed out. Please try again.";
const MSG_NETWORK: &str = "Network request failed. Please check your connection.";

/// Progress observer for uploads. Accepted for interface stability, but
/// the transport exposes no upload progress events, so it is never
/// invoked. Known limitation, not a defect.
pub type ProgressCallback = Arc<dyn Fn(u64, u64) + Send + Sync>;

/// Body of an outgoing request.
///
/// Multipart payloads keep their bytes so the form can be rebuilt for
/// each retry attempt (a form, once sent, cannot be reused).
enum RequestBody {
    Empty,
    Json(Value),
    Multipart(MultipartPayload),
}

struct MultipartPayload {
    field_name: String,
    file_name: String,
    mime_type: String,
    bytes: Vec<u8>,
}

/// API client for the memodeck backend.
/// Clone is cheap - reqwest::Client uses Arc internally for connection pooling.
#[derive(Clone)]
pub struct ApiClient {
    http: Client,
    config: ClientConfig,
    token: Arc<RwLock<Option<String>>>,
    store: Arc<CredentialStore>,
    notifier: Arc<dyn Notifier>,
}

impl ApiClient {
    /// Create a new API client.
    ///
    /// No client-wide timeout is set on the transport; each attempt is
    /// wrapped individually so a timeout can be told apart from other
    /// failures.
    pub fn new(config: ClientConfig, store: Arc<CredentialStore>) -> Result<Self, ApiError> {
        let http = Client::builder().build()?;
        Ok(Self {
            http,
            config,
            token: Arc::new(RwLock::new(None)),
            store,
            notifier: Arc::new(LogNotifier),
        })
    }

    /// Replace the notifier used for `show_error` failures.
    pub fn with_notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifier = notifier;
        self
    }

    // ===== Auth token slot =====
    //
    // The slot is owned here; persisting the token is the caller's job
    // (the client does not sync from storage on its own).

    pub fn set_auth_token(&self, token: &str) {
        *self.token.write().expect("token lock poisoned") = Some(token.to_string());
    }

    pub fn clear_auth_token(&self) {
        *self.token.write().expect("token lock poisoned") = None;
    }

    pub fn auth_token(&self) -> Option<String> {
        self.token.read().expect("token lock poisoned").clone()
    }

    // ===== Convenience verbs =====

    pub async fn get<T: DeserializeOwned>(
        &self,
        path: &str,
        config: Option<RequestConfig>,
    ) -> ApiResponse<T> {
        self.execute(Method::GET, path, RequestBody::Empty, config)
            .await
    }

    pub async fn post<T: DeserializeOwned, B: Serialize>(
        &self,
        path: &str,
        body: &B,
        config: Option<RequestConfig>,
    ) -> ApiResponse<T> {
        self.execute_json(Method::POST, path, body, config).await
    }

    pub async fn put<T: DeserializeOwned, B: Serialize>(
        &self,
        path: &str,
        body: &B,
        config: Option<RequestConfig>,
    ) -> ApiResponse<T> {
        self.execute_json(Method::PUT, path, body, config).await
    }

    pub async fn patch<T: DeserializeOwned, B: Serialize>(
        &self,
        path: &str,
        body: &B,
        config: Option<RequestConfig>,
    ) -> ApiResponse<T> {
        self.execute_json(Method::PATCH, path, body, config).await
    }

    pub async fn delete<T: DeserializeOwned>(
        &self,
        path: &str,
        config: Option<RequestConfig>,
    ) -> ApiResponse<T> {
        self.execute(Method::DELETE, path, RequestBody::Empty, config)
            .await
    }

    /// Upload a file as a multipart POST.
    ///
    /// No JSON content-type is set so the transport can attach the
    /// multipart boundary. The progress callback is accepted but never
    /// invoked; see [`ProgressCallback`].
    pub async fn upload_file<T: DeserializeOwned>(
        &self,
        path: &str,
        field_name: &str,
        file_name: &str,
        mime_type: &str,
        bytes: Vec<u8>,
        progress: Option<ProgressCallback>,
        config: Option<RequestConfig>,
    ) -> ApiResponse<T> {
        let _ = progress;
        self.execute(
            Method::POST,
            path,
            RequestBody::Multipart(MultipartPayload {
                field_name: field_name.to_string(),
                file_name: file_name.to_string(),
                mime_type: mime_type.to_string(),
                bytes,
            }),
            config,
        )
        .await
    }

    async fn execute_json<T: DeserializeOwned, B: Serialize>(
        &self,
        method: Method,
        path: &str,
        body: &B,
        config: Option<RequestConfig>,
    ) -> ApiResponse<T> {
        match serde_json::to_value(body) {
            Ok(value) => {
                self.execute(method, path, RequestBody::Json(value), config)
                    .await
            }
            Err(e) => {
                warn!(path, error = %e, "Request body failed to serialize");
                ApiResponse::failure("Invalid request body", e.to_string())
            }
        }
    }

    // ===== Request engine =====

    /// Run one request through the timeout/retry engine.
    ///
    /// Never returns an error: every terminal outcome is an envelope.
    async fn execute<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        body: RequestBody,
        config: Option<RequestConfig>,
    ) -> ApiResponse<T> {
        let cfg = config.unwrap_or_default();
        let url = self.resolve_url(path);
        let timeout = cfg.timeout.unwrap_or(self.config.timeout);
        let retries = cfg.retries.unwrap_or(self.config.max_retries).max(1);

        let mut attempt = 0u32;
        loop {
            attempt += 1;
            match tokio::time::timeout(timeout, self.attempt(&method, &url, &body, &cfg)).await {
                // Timed out: the in-flight request is aborted by the
                // dropped future. Fails fast, not retried.
                Err(_) => {
                    warn!(url = %url, attempt, timeout_ms = timeout.as_millis() as u64, "Request timed out");
                    return self.fail(&cfg, MSG_TIMEOUT, ApiError::Timeout.to_string());
                }
                Ok(Ok(envelope)) => return envelope,
                Ok(Err(err)) => {
                    debug!(url = %url, attempt, error = %err, "Request attempt failed");
                    let retryable = !matches!(err, ApiError::InvalidRequest(_));
                    if !retryable || attempt >= retries {
                        warn!(url = %url, attempts = attempt, error = %err, "Request failed");
                        return self.fail(&cfg, MSG_NETWORK, err.to_string());
                    }
                    // Linear backoff: attempt N waits N * retry_delay.
                    tokio::time::sleep(self.config.retry_delay * attempt).await;
                }
            }
        }
    }

    /// A single attempt: send, interpret the status, parse the envelope.
    async fn attempt<T: DeserializeOwned>(
        &self,
        method: &Method,
        url: &str,
        body: &RequestBody,
        cfg: &RequestConfig,
    ) -> Result<ApiResponse<T>, ApiError> {
        let json_body = matches!(body, RequestBody::Json(_));
        let headers = self.build_headers(json_body, cfg.headers.as_ref())?;

        let mut builder = self.http.request(method.clone(), url).headers(headers);
        builder = match body {
            RequestBody::Empty => builder,
            RequestBody::Json(value) => builder.json(value),
            RequestBody::Multipart(payload) => {
                let part = multipart::Part::bytes(payload.bytes.clone())
                    .file_name(payload.file_name.clone())
                    .mime_str(&payload.mime_type)
                    .map_err(|e| ApiError::InvalidRequest(e.to_string()))?;
                builder.multipart(multipart::Form::new().part(payload.field_name.clone(), part))
            }
        };

        let response = builder.send().await?;
        let status = response.status();

        // Status interpretation comes before any body parse, in this order.
        if status == StatusCode::UNAUTHORIZED {
            self.handle_unauthorized().await;
            return Ok(ApiResponse::failure(MSG_SESSION_EXPIRED, "unauthorized"));
        }
        if status == StatusCode::NOT_FOUND {
            return Ok(ApiResponse::failure(MSG_NOT_FOUND, "not_found"));
        }
        if status.is_server_error() {
            let body_text = response.text().await.unwrap_or_default();
            return Err(ApiError::from_status(status, &body_text));
        }

        // Everything else, 2xx and remaining 4xx alike: the body envelope
        // is the source of truth.
        response
            .json::<ApiResponse<T>>()
            .await
            .map_err(|e| ApiError::InvalidResponse(e.to_string()))
    }

    /// Session teardown on 401: the in-memory token goes first so callers
    /// observe an unauthenticated client even if the store wipe fails.
    async fn handle_unauthorized(&self) {
        warn!("Received 401, ending session");
        self.clear_auth_token();
        if let Err(e) = self.store.logout().await {
            warn!(error = %e, "Failed to clear stored credentials after 401");
        }
    }

    fn fail<T>(&self, cfg: &RequestConfig, message: &str, error: String) -> ApiResponse<T> {
        if cfg.show_error {
            self.notifier.notify(message);
        }
        ApiResponse::failure(message, error)
    }

    /// Absolute URLs pass through untouched; relative paths get the
    /// configured base URL.
    fn resolve_url(&self, path: &str) -> String {
        if path.starts_with("http://") || path.starts_with("https://") {
            return path.to_string();
        }
        format!(
            "{}/{}",
            self.config.base_url.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }

    fn build_headers(
        &self,
        json_body: bool,
        overrides: Option<&std::collections::HashMap<String, String>>,
    ) -> Result<header::HeaderMap, ApiError> {
        let mut headers = header::HeaderMap::new();

        headers.insert(
            header::ACCEPT,
            header::HeaderValue::from_static("application/json"),
        );
        // Multipart bodies must not carry a JSON content-type; the
        // transport sets its own with the boundary parameter.
        if json_body {
            headers.insert(
                header::CONTENT_TYPE,
                header::HeaderValue::from_static("application/json"),
            );
        }

        // The backend expects the raw token value, no scheme prefix.
        if let Some(token) = self.auth_token() {
            headers.insert(
                header::AUTHORIZATION,
                header::HeaderValue::from_str(&token).map_err(|_| {
                    ApiError::InvalidRequest("auth token is not a valid header value".to_string())
                })?,
            );
        }

        headers.insert(
            HEADER_REQUESTED_WITH,
            header::HeaderValue::from_static(REQUESTED_WITH),
        );
        headers.insert(
            HEADER_CLIENT_VERSION,
            Self::header_value(&self.config.app_version)?,
        );
        headers.insert(HEADER_PLATFORM, Self::header_value(&self.config.platform)?);

        let now = Utc::now().timestamp_millis();
        let request_id = format!("{}-{:08x}", now, rand::thread_rng().gen::<u32>());
        headers.insert(HEADER_REQUEST_ID, Self::header_value(&request_id)?);
        headers.insert(HEADER_TIMESTAMP, Self::header_value(&now.to_string())?);

        if let Some(extra) = overrides {
            for (name, value) in extra {
                let name = header::HeaderName::from_bytes(name.as_bytes()).map_err(|_| {
                    ApiError::InvalidRequest(format!("invalid header name: {}", name))
                })?;
                headers.insert(name, Self::header_value(value)?);
            }
        }

        Ok(headers)
    }

    fn header_value(value: &str) -> Result<header::HeaderValue, ApiError> {
        header::HeaderValue::from_str(value)
            .map_err(|_| ApiError::InvalidRequest(format!("invalid header value: {}", value)))
    }
}
