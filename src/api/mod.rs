/// LightVPN control-plane API
///
/// This module wraps every call to the LightVPN API: the shared client with
/// its session header, response validation and the typed error taxonomy.
pub mod auth;
pub mod client;
pub mod error;
pub mod models;
pub mod tls;

pub use auth::{get_changelog, login, validate_session};
pub use client::{ApiClient, RawResponse};
pub use error::ApiError;
pub use models::{
    AuthResponse, Changelog, ConfigResponse, GenericResponse, ServerDescriptor, ServerType,
};
