//! LightVPN CLI - session handling and server config sync
//!
//! This crate implements the client side of the LightVPN control plane:
//! logging in, keeping an encrypted session on disk, listing servers and
//! keeping a local cache of their OpenVPN profiles.
//!
//! # Architecture
//!
//! - `api`: HTTP client, session header, response validation, error taxonomy
//! - `session`: Encrypted session file
//! - `catalog`: Server list with a one hour freshness window
//! - `sync`: Config bundle, drivers, OpenVPN and updater downloads
//! - `resolver`: Server file key to cached profile path
//! - `app`: Interactive flow and user-facing error messages
//! - `config`: Configuration file handling (TOML)
//!
//! # Usage
//!
//! ```bash
//! lightvpn connect
//! ```

pub mod api;
pub mod app;
pub mod catalog;
pub mod config;
pub mod console;
pub mod launcher;
pub mod resolver;
pub mod session;
pub mod sync;

pub use api::{ApiClient, ApiError};
pub use app::{App, AppError};
pub use catalog::ServerCatalog;
pub use config::Config;
pub use resolver::ConfigResolver;
pub use session::{Session, SessionStore};
pub use sync::ConfigSync;
