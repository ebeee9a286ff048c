//! In-memory server catalog with a freshness window
//!
//! The server list changes rarely, so one fetch is reused for an hour. The
//! cache lives on the catalog instance and is not scoped to a user: switching
//! accounts within one process keeps serving the previous list until it
//! expires or [`ServerCatalog::invalidate`] is called.

use reqwest::Method;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::api::{ApiClient, ApiError, ServerDescriptor};

pub const FRESHNESS_WINDOW: Duration = Duration::from_secs(60 * 60);

struct CachedCatalog {
    snapshot: Arc<Vec<ServerDescriptor>>,
    fetched_at: Instant,
}

pub struct ServerCatalog {
    api: Arc<ApiClient>,
    freshness: Duration,
    cache: Mutex<Option<CachedCatalog>>,
}

impl ServerCatalog {
    pub fn new(api: Arc<ApiClient>) -> Self {
        Self::with_freshness(api, FRESHNESS_WINDOW)
    }

    pub fn with_freshness(api: Arc<ApiClient>, freshness: Duration) -> Self {
        Self {
            api,
            freshness,
            cache: Mutex::new(None),
        }
    }

    /// Return the server list, hitting the API only when the cache is stale
    ///
    /// A failed fetch leaves any previous snapshot and its timestamp untouched.
    pub async fn fetch(
        &self,
        cancel: &CancellationToken,
    ) -> Result<Arc<Vec<ServerDescriptor>>, ApiError> {
        let mut cache = self.cache.lock().await;

        if let Some(cached) = cache.as_ref() {
            if cached.fetched_at.elapsed() < self.freshness {
                debug!("Serving {} cached servers", cached.snapshot.len());
                return Ok(cached.snapshot.clone());
            }
        }

        let servers: Vec<ServerDescriptor> = self
            .api
            .request_json(Method::GET, "/api/servers", None, cancel)
            .await?;
        let snapshot = Arc::new(dedup(servers));
        info!("Fetched {} servers", snapshot.len());

        *cache = Some(CachedCatalog {
            snapshot: snapshot.clone(),
            fetched_at: Instant::now(),
        });
        Ok(snapshot)
    }

    /// Drop the cached snapshot so the next fetch goes to the API
    pub async fn invalidate(&self) {
        *self.cache.lock().await = None;
    }
}

/// Collapse exact duplicates, keeping the first occurrence
fn dedup(servers: Vec<ServerDescriptor>) -> Vec<ServerDescriptor> {
    let mut unique: Vec<ServerDescriptor> = Vec::with_capacity(servers.len());
    for server in servers {
        if !unique.contains(&server) {
            unique.push(server);
        }
    }
    unique
}
