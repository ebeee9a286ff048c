//! Authentication calls
//!
//! - login - exchange username/password for a session id
//! - validate_session - check a persisted session id against the API
//! - get_changelog - unauthenticated changelog for this platform

use reqwest::Method;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::api::client::ApiClient;
use crate::api::error::ApiError;
use crate::api::models::{AuthResponse, Changelog, LoginRequest};

/// Log in and install the resulting session header on `client`
pub async fn login(
    client: &ApiClient,
    username: &str,
    password: &str,
    cancel: &CancellationToken,
) -> Result<AuthResponse, ApiError> {
    info!("Logging in as {}", username);

    let body = serde_json::to_value(LoginRequest { username, password })
        .map_err(ApiError::invalid_payload)?;
    let response: AuthResponse = client
        .request_json(Method::POST, "/api/auth", Some(&body), cancel)
        .await?;

    client.set_session_header(username, &response.session_id.to_string())?;
    debug!("Login succeeded for {}", username);
    Ok(response)
}

/// Validate a session id previously returned by [`login`]
///
/// Returns `Ok(false)` and clears the session header when the API rejects the
/// session. Throttling and client-update signals still surface as errors so
/// the caller can tell them apart from an expired session.
pub async fn validate_session(
    client: &ApiClient,
    username: &str,
    session_id: Uuid,
    cancel: &CancellationToken,
) -> Result<bool, ApiError> {
    info!("Validating session for {}", username);
    client.set_session_header(username, &session_id.to_string())?;

    let raw = match client
        .request(Method::GET, "/api/profile", None, cancel)
        .await
    {
        Ok(raw) => raw,
        Err(e) => {
            client.clear_session_header();
            return Err(e);
        }
    };

    match ApiClient::validate(&raw) {
        Ok(()) => Ok(true),
        Err(e @ (ApiError::ClientUpdateRequired(_) | ApiError::Ratelimited(_))) => {
            client.clear_session_header();
            Err(e)
        }
        Err(e) => {
            warn!("Session rejected: {}", e);
            client.clear_session_header();
            Ok(false)
        }
    }
}

/// Fetch the changelog text for `platform`
pub async fn get_changelog(
    client: &ApiClient,
    platform: &str,
    cancel: &CancellationToken,
) -> Result<String, ApiError> {
    let path = format!("/api/changelog?platform={}", platform.to_lowercase());
    let changelog: Changelog = client
        .request_json(Method::GET, &path, None, cancel)
        .await?;
    Ok(changelog.content)
}
