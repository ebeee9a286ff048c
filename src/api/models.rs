//! Wire models for the LightVPN API

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Envelope shared by most JSON responses
#[derive(Debug, Clone, Default, Deserialize)]
pub struct GenericResponse {
    #[serde(default)]
    pub code: i32,
    #[serde(default)]
    pub message: Option<String>,
}

/// Response to `POST /api/auth`
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthResponse {
    #[serde(default)]
    pub code: i32,
    #[serde(default)]
    pub message: Option<String>,
    pub session_id: Uuid,
}

/// Response to `GET /api/configs`; `bytes` is a base64 zip archive
#[derive(Debug, Clone, Deserialize)]
pub struct ConfigResponse {
    #[serde(default)]
    pub code: i32,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(rename = "bytes")]
    pub archive_base64: String,
}

/// Response to `GET /api/changelog`
#[derive(Debug, Clone, Deserialize)]
pub struct Changelog {
    #[serde(default)]
    pub code: i32,
    #[serde(rename = "changelog")]
    pub content: String,
}

/// Request body for `POST /api/auth`
#[derive(Debug, Serialize)]
pub(crate) struct LoginRequest<'a> {
    pub username: &'a str,
    pub password: &'a str,
}

/// Kind of server, sent by the API as a number
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "u8", into = "u8")]
pub enum ServerType {
    Normal,
    Gaming,
    Streaming,
    Unknown(u8),
}

impl From<u8> for ServerType {
    fn from(value: u8) -> Self {
        match value {
            0 => ServerType::Normal,
            1 => ServerType::Gaming,
            2 => ServerType::Streaming,
            other => ServerType::Unknown(other),
        }
    }
}

impl From<ServerType> for u8 {
    fn from(value: ServerType) -> Self {
        match value {
            ServerType::Normal => 0,
            ServerType::Gaming => 1,
            ServerType::Streaming => 2,
            ServerType::Unknown(other) => other,
        }
    }
}

impl fmt::Display for ServerType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ServerType::Normal => write!(f, "Normal"),
            ServerType::Gaming => write!(f, "Gaming"),
            ServerType::Streaming => write!(f, "Streaming"),
            ServerType::Unknown(n) => write!(f, "Unknown({})", n),
        }
    }
}

/// A VPN endpoint as listed by `GET /api/servers`
///
/// Display ordinals are not part of the descriptor; consumers number servers
/// by their position in the catalog snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerDescriptor {
    pub country_name: String,
    pub server_name: String,
    /// true when the server is online
    pub status: bool,
    #[serde(rename = "type")]
    pub server_type: ServerType,
    /// Key used to locate the server's profile in the config cache
    pub file_name: String,
}
