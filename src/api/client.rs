//! Shared HTTP client for the LightVPN API
//!
//! Every request goes to a single origin and carries a client identity header
//! (`X-Client-Version: <platform> <version>`). Once a user is authenticated the
//! client also attaches `Authorization: <username> <session id>` to every call
//! until the session header is cleared.

use reqwest::header::{AUTHORIZATION, HeaderMap, HeaderValue};
use reqwest::{Client, Method, StatusCode};
use serde::de::DeserializeOwned;
use std::sync::RwLock;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::api::error::{API_DOWN_MESSAGE, ApiError};
use crate::api::models::GenericResponse;
use crate::api::tls::pinned_client_config;
use crate::config::ApiConfig;

pub const CLIENT_VERSION_HEADER: &str = "X-Client-Version";

const CLIENT_UPDATE_MESSAGE: &str = "Client update required! Please update via the website.";
const RATELIMIT_MESSAGE: &str = "You are being ratelimited, please try again later.";

/// Status and body of a completed request, before validation
#[derive(Debug, Clone)]
pub struct RawResponse {
    pub status: StatusCode,
    pub body: Vec<u8>,
}

pub struct ApiClient {
    http: Client,
    origin: String,
    session: RwLock<Option<HeaderValue>>,
}

impl ApiClient {
    /// Create a client for `origin`, identifying as `platform`
    ///
    /// HTTPS connections are validated against the webpki roots and must be
    /// issued by an authority whose name contains `pinned_issuer`.
    pub fn new(origin: &str, platform: &str, pinned_issuer: &str) -> Result<Self, ApiError> {
        let identity = format!("{} {}", platform, env!("CARGO_PKG_VERSION"));
        let mut headers = HeaderMap::new();
        headers.insert(
            CLIENT_VERSION_HEADER,
            HeaderValue::from_str(&identity).map_err(|e| ApiError::InvalidHeader(e.to_string()))?,
        );

        let http = Client::builder()
            .default_headers(headers)
            .no_proxy()
            .use_preconfigured_tls(pinned_client_config(pinned_issuer)?)
            .build()?;

        Ok(Self {
            http,
            origin: origin.trim_end_matches('/').to_string(),
            session: RwLock::new(None),
        })
    }

    pub fn from_config(config: &ApiConfig) -> Result<Self, ApiError> {
        Self::new(&config.origin, &config.platform, &config.pinned_issuer)
    }

    pub fn origin(&self) -> &str {
        &self.origin
    }

    /// Replace the authorization header with one for `username` and `token`
    pub fn set_session_header(&self, username: &str, token: &str) -> Result<(), ApiError> {
        let value = HeaderValue::from_str(&format!("{} {}", username, token))
            .map_err(|e| ApiError::InvalidHeader(e.to_string()))?;
        *self.session.write().unwrap_or_else(|e| e.into_inner()) = Some(value);
        debug!("Session header set for {}", username);
        Ok(())
    }

    /// Remove the authorization header entirely
    pub fn clear_session_header(&self) {
        *self.session.write().unwrap_or_else(|e| e.into_inner()) = None;
        debug!("Session header cleared");
    }

    /// Current authorization header, if any
    pub fn session_header(&self) -> Option<String> {
        self.session
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .as_ref()
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
    }

    /// Issue a request and return the raw status and body
    ///
    /// The call is abandoned as soon as `cancel` fires; no retry is attempted.
    pub async fn request(
        &self,
        method: Method,
        path: &str,
        body: Option<&serde_json::Value>,
        cancel: &CancellationToken,
    ) -> Result<RawResponse, ApiError> {
        let url = format!("{}{}", self.origin, path);
        debug!("{} {}", method, url);

        let mut builder = self.http.request(method, &url);
        let session = self
            .session
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone();
        if let Some(value) = session {
            builder = builder.header(AUTHORIZATION, value);
        }
        if let Some(body) = body {
            builder = builder.json(body);
        }

        let send = async {
            let response = builder.send().await?;
            let status = response.status();
            let body = response.bytes().await?.to_vec();
            Ok::<_, reqwest::Error>(RawResponse { status, body })
        };

        tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                debug!("Request to {} cancelled", path);
                Err(ApiError::Cancelled)
            }
            result = send => {
                let raw = result?;
                debug!("{} -> {} ({} bytes)", path, raw.status, raw.body.len());
                Ok(raw)
            }
        }
    }

    /// Issue a request, validate it and deserialize the JSON payload
    pub async fn request_json<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        body: Option<&serde_json::Value>,
        cancel: &CancellationToken,
    ) -> Result<T, ApiError> {
        let raw = self.request(method, path, body, cancel).await?;
        Self::validate(&raw)?;
        serde_json::from_slice(&raw.body).map_err(ApiError::invalid_payload)
    }

    /// GET a raw payload (archives, binaries) after validating the status
    pub async fn request_bytes(
        &self,
        path: &str,
        cancel: &CancellationToken,
    ) -> Result<Vec<u8>, ApiError> {
        let raw = self.request(Method::GET, path, None, cancel).await?;
        Self::validate(&raw)?;
        Ok(raw.body)
    }

    /// Translate a non-success response into the error taxonomy
    ///
    /// - 426 Upgrade Required: the client version is obsolete
    /// - 429 Too Many Requests: throttled
    /// - anything else outside 2xx: invalid response
    pub fn validate(response: &RawResponse) -> Result<(), ApiError> {
        if response.status.is_success() {
            return Ok(());
        }

        let message = envelope_message(&response.body);
        match response.status {
            StatusCode::UPGRADE_REQUIRED => Err(ApiError::ClientUpdateRequired(
                message.unwrap_or_else(|| CLIENT_UPDATE_MESSAGE.to_string()),
            )),
            StatusCode::TOO_MANY_REQUESTS => Err(ApiError::Ratelimited(
                message.unwrap_or_else(|| RATELIMIT_MESSAGE.to_string()),
            )),
            _ => Err(ApiError::invalid_response(
                message.unwrap_or_else(|| API_DOWN_MESSAGE.to_string()),
            )),
        }
    }
}

/// Pull the `message` out of a JSON error envelope, if the body is one
fn envelope_message(body: &[u8]) -> Option<String> {
    serde_json::from_slice::<GenericResponse>(body)
        .ok()
        .and_then(|r| r.message)
        .filter(|m| !m.trim().is_empty())
}
