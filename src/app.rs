//! Interactive client flow
//!
//! This is the boundary between the core and the user:
//!
//! 1. Authenticate: validate the stored session, or prompt for credentials
//! 2. Fetch the server catalog and make sure configs are cached
//! 3. Let the user pick a server and resolve its profile
//! 4. Hand the profile to the tunnel launcher
//!
//! A corrupt or rejected session file is deleted here and the user is asked
//! to log in again. Every other error is returned to `main`, which reports it
//! through [`user_message`].

use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::api::{self, ApiClient, ApiError, ServerDescriptor};
use crate::catalog::ServerCatalog;
use crate::config::{Config, ConfigError, Paths};
use crate::console::{Console, render_server_table};
use crate::launcher::{LaunchError, TunnelLauncher};
use crate::resolver::{ConfigResolver, ResolveError};
use crate::session::{Session, SessionError, SessionStore};
use crate::sync::{ConfigSync, Downloads, SyncError};

#[derive(Error, Debug)]
pub enum AppError {
    #[error("{0}")]
    Api(#[from] ApiError),
    #[error("{0}")]
    Session(#[from] SessionError),
    #[error("{0}")]
    Sync(#[from] SyncError),
    #[error("{0}")]
    Resolve(#[from] ResolveError),
    #[error("{0}")]
    Launch(#[from] LaunchError),
    #[error("Config error: {0}")]
    Config(#[from] ConfigError),
    #[error("Failed to read input: {0}")]
    Io(#[from] io::Error),
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

/// Long-lived client context; every piece of shared state hangs off this
pub struct App<C: Console> {
    api: Arc<ApiClient>,
    store: SessionStore,
    catalog: ServerCatalog,
    configs: ConfigSync,
    downloads: Downloads,
    resolver: ConfigResolver,
    platform: String,
    console: C,
}

impl<C: Console> App<C> {
    pub fn new(config: &Config, paths: &Paths, console: C) -> Result<Self, AppError> {
        let api = Arc::new(ApiClient::from_config(&config.api)?);
        Ok(Self::with_api(api, paths, &config.api.platform, console))
    }

    pub fn with_api(api: Arc<ApiClient>, paths: &Paths, platform: &str, console: C) -> Self {
        Self {
            store: SessionStore::new(paths.auth_file.clone()),
            catalog: ServerCatalog::new(api.clone()),
            configs: ConfigSync::new(api.clone(), paths.config_cache_dir.clone()),
            downloads: Downloads::new(
                api.clone(),
                paths.drivers_dir.clone(),
                paths.openvpn_dir.clone(),
            ),
            resolver: ConfigResolver::new(paths.config_cache_dir.clone()),
            platform: platform.to_string(),
            api,
            console,
        }
    }

    pub fn console(&self) -> &C {
        &self.console
    }

    pub fn api(&self) -> &ApiClient {
        &self.api
    }

    /// Establish an authenticated session
    ///
    /// Tries the stored session first. If it is corrupt or rejected by the API
    /// the file is deleted and the user is prompted for credentials.
    pub async fn authenticate(&self, cancel: &CancellationToken) -> Result<Session, AppError> {
        if self.store.exists() {
            self.console
                .info("Attempting to authenticate you via session...");

            match self.store.load() {
                Ok(session) => {
                    let valid = api::validate_session(
                        &self.api,
                        &session.username,
                        session.session_id,
                        cancel,
                    )
                    .await?;
                    if valid {
                        self.console.success("Authentication success!");
                        return Ok(session);
                    }
                    self.store.delete()?;
                    self.console
                        .error("Your session ID is invalid, it has been cleared.");
                }
                Err(SessionError::CorruptedAuthSettings(reason)) => {
                    warn!("Discarding corrupted session file: {}", reason);
                    self.store.delete()?;
                    self.console
                        .error("Your authentication data has corrupted, it has been cleared.");
                }
                Err(e) => return Err(e.into()),
            }
        } else {
            self.console.info(concat!(
                "Since this is your first time using LightVPN, ",
                "please enter your account ID and password."
            ));
        }

        self.login_interactive(cancel).await
    }

    async fn login_interactive(&self, cancel: &CancellationToken) -> Result<Session, AppError> {
        let username = self.prompt_line("Account ID: ", cancel)?;
        if username.is_empty() {
            return Err(AppError::InvalidInput("account ID must not be empty".to_string()));
        }
        let password = self.console.read_password(&format!(
            "Hi there, {}. Please enter your password: ",
            username
        ))?;
        ensure_not_cancelled(cancel)?;

        self.console.info("Attempting to authenticate you...");
        let response = api::login(&self.api, &username, &password, cancel).await?;
        self.console.success("Authentication success!");

        let session = Session {
            username,
            session_id: response.session_id,
        };
        self.console.info("Saving & encrypting session ID...");
        self.store.save(&session)?;
        Ok(session)
    }

    /// Read a line, discarding it if Ctrl+C arrived while waiting on stdin
    fn prompt_line(&self, prompt: &str, cancel: &CancellationToken) -> Result<String, AppError> {
        let line = self.console.read_line(prompt)?;
        ensure_not_cancelled(cancel)?;
        Ok(line)
    }

    /// Authenticate and return the current server list
    pub async fn servers(
        &self,
        cancel: &CancellationToken,
    ) -> Result<Arc<Vec<ServerDescriptor>>, AppError> {
        self.authenticate(cancel).await?;
        self.console.info("Fetching servers...");
        Ok(self.catalog.fetch(cancel).await?)
    }

    /// Run the whole flow up to a resolved profile path
    pub async fn select_server(
        &self,
        refresh: bool,
        cancel: &CancellationToken,
    ) -> Result<PathBuf, AppError> {
        let servers = self.servers(cancel).await?;

        self.console.info("Caching servers...");
        self.configs.ensure_cached(refresh, cancel).await?;

        self.console.print(&render_server_table(&servers));
        let input = self.prompt_line("Enter the server ID: ", cancel)?;
        let index: usize = input
            .trim()
            .parse()
            .map_err(|_| AppError::InvalidInput("must be a number".to_string()))?;
        let server = servers.get(index).ok_or_else(|| {
            AppError::InvalidInput(format!("no server with ID {}", index))
        })?;

        self.console.info("Resolving configuration file");
        let path = self.resolver.resolve(&server.file_name)?;
        info!("Selected {} ({})", server.server_name, path.display());
        Ok(path)
    }

    /// Select a server and start the tunnel with its profile
    pub async fn connect(
        &self,
        launcher: &dyn TunnelLauncher,
        refresh: bool,
        cancel: &CancellationToken,
    ) -> Result<(), AppError> {
        let path = self.select_server(refresh, cancel).await?;
        ensure_not_cancelled(cancel)?;
        self.console.info("Connecting to the server...");
        launcher.launch(&path)?;
        Ok(())
    }

    /// Authenticate and refresh the profile cache
    pub async fn sync_configs(
        &self,
        force: bool,
        cancel: &CancellationToken,
    ) -> Result<(), AppError> {
        self.authenticate(cancel).await?;
        self.console.info("Caching servers...");
        self.configs.ensure_cached(force, cancel).await?;
        self.console.success("Done!");
        Ok(())
    }

    /// Forget the stored session
    pub async fn logout(&self) -> Result<(), AppError> {
        self.store.delete()?;
        self.api.clear_session_header();
        self.catalog.invalidate().await;
        self.console.success("Logged out.");
        Ok(())
    }

    pub async fn changelog(&self, cancel: &CancellationToken) -> Result<String, AppError> {
        Ok(api::get_changelog(&self.api, &self.platform, cancel).await?)
    }

    /// Download the updater into `dir`
    pub async fn download_updater(
        &self,
        dir: &Path,
        cancel: &CancellationToken,
    ) -> Result<PathBuf, AppError> {
        self.authenticate(cancel).await?;
        Ok(self.downloads.save_updater(dir, cancel).await?)
    }

    /// Download the TAP drivers and, if missing, the OpenVPN binaries
    pub async fn install_drivers(&self, cancel: &CancellationToken) -> Result<(), AppError> {
        self.authenticate(cancel).await?;
        self.console.info("Fetching drivers...");
        self.downloads.fetch_drivers(cancel).await?;
        if self.downloads.ensure_openvpn(cancel).await? {
            self.console.info("Fetched OpenVPN binaries");
        }
        self.console.success("Done!");
        Ok(())
    }
}

fn ensure_not_cancelled(cancel: &CancellationToken) -> Result<(), AppError> {
    if cancel.is_cancelled() {
        return Err(ApiError::Cancelled.into());
    }
    Ok(())
}

/// User-facing text for an error reaching the CLI boundary
pub fn user_message(err: &AppError) -> String {
    match err {
        AppError::Api(ApiError::ClientUpdateRequired(_))
        | AppError::Sync(SyncError::Api(ApiError::ClientUpdateRequired(_))) => {
            "Client update required! Please update via the website.".to_string()
        }
        AppError::Api(ApiError::Http(e)) | AppError::Sync(SyncError::Api(ApiError::Http(e))) => {
            if is_tls_failure(e) {
                "API authenticity could not be verified (SSL failure)".to_string()
            } else {
                "API request has failed".to_string()
            }
        }
        other => other.to_string(),
    }
}

fn is_tls_failure(err: &reqwest::Error) -> bool {
    let mut source: Option<&(dyn std::error::Error + 'static)> = std::error::Error::source(err);
    while let Some(e) = source {
        if e.is::<rustls::Error>() {
            return true;
        }
        if let Some(io_err) = e.downcast_ref::<io::Error>() {
            if io_err.get_ref().is_some_and(|inner| inner.is::<rustls::Error>()) {
                return true;
            }
        }
        source = e.source();
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sync::archive::test_support::build_zip;
    use base64::Engine;
    use base64::engine::general_purpose::STANDARD as BASE64;
    use std::collections::VecDeque;
    use std::sync::Mutex;
    use tempfile::TempDir;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const SESSION: &str = "11111111-1111-1111-1111-111111111111";

    /// Console fed from a queue of canned answers
    #[derive(Default)]
    struct ScriptedConsole {
        inputs: Mutex<VecDeque<String>>,
        output: Mutex<Vec<String>>,
        /// Cancelled when a prompt containing the text is shown, like Ctrl+C at that prompt
        interrupt_at: Option<(&'static str, CancellationToken)>,
    }

    impl ScriptedConsole {
        fn with_inputs(inputs: &[&str]) -> Self {
            Self {
                inputs: Mutex::new(inputs.iter().map(|s| s.to_string()).collect()),
                output: Mutex::new(Vec::new()),
                interrupt_at: None,
            }
        }

        fn interrupted_at(mut self, prompt: &'static str, cancel: &CancellationToken) -> Self {
            self.interrupt_at = Some((prompt, cancel.clone()));
            self
        }

        fn interrupt_if_asked(&self, prompt: &str) {
            if let Some((text, cancel)) = &self.interrupt_at {
                if prompt.contains(text) {
                    cancel.cancel();
                }
            }
        }

        fn next_input(&self) -> io::Result<String> {
            self.inputs
                .lock()
                .unwrap()
                .pop_front()
                .ok_or_else(|| io::Error::new(io::ErrorKind::UnexpectedEof, "no more input"))
        }

        fn printed(&self) -> String {
            self.output.lock().unwrap().join("\n")
        }
    }

    impl Console for ScriptedConsole {
        fn banner(&self) {}
        fn info(&self, message: &str) {
            self.output.lock().unwrap().push(format!("[-] {}", message));
        }
        fn success(&self, message: &str) {
            self.output.lock().unwrap().push(format!("[!] {}", message));
        }
        fn error(&self, message: &str) {
            self.output.lock().unwrap().push(format!("[/] {}", message));
        }
        fn print(&self, text: &str) {
            self.output.lock().unwrap().push(text.to_string());
        }
        fn read_line(&self, prompt: &str) -> io::Result<String> {
            self.interrupt_if_asked(prompt);
            self.next_input()
        }
        fn read_password(&self, prompt: &str) -> io::Result<String> {
            self.interrupt_if_asked(prompt);
            self.next_input()
        }
    }

    #[derive(Default)]
    struct RecordingLauncher {
        launched: Mutex<Vec<PathBuf>>,
    }

    impl TunnelLauncher for RecordingLauncher {
        fn launch(&self, config_path: &Path) -> Result<(), LaunchError> {
            self.launched.lock().unwrap().push(config_path.to_path_buf());
            Ok(())
        }
    }

    fn app_for(server: &MockServer, temp_dir: &TempDir, inputs: &[&str]) -> App<ScriptedConsole> {
        let api = Arc::new(ApiClient::new(&server.uri(), "Linux", "cloudflare").unwrap());
        let paths = Paths::new(temp_dir.path().join("LightVPN"));
        App::with_api(api, &paths, "Linux", ScriptedConsole::with_inputs(inputs))
    }

    fn store_for(temp_dir: &TempDir) -> SessionStore {
        SessionStore::new(Paths::new(temp_dir.path().join("LightVPN")).auth_file)
    }

    async fn mount_login(server: &MockServer, expected_calls: u64) {
        Mock::given(method("POST"))
            .and(path("/api/auth"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "code": 200,
                "message": "ok",
                "sessionId": SESSION
            })))
            .expect(expected_calls)
            .mount(server)
            .await;
    }

    #[tokio::test]
    async fn test_first_run_prompts_and_saves_session() {
        let mock_server = MockServer::start().await;
        mount_login(&mock_server, 1).await;

        let temp_dir = TempDir::new().unwrap();
        let app = app_for(&mock_server, &temp_dir, &["alice", "secret"]);

        let session = app.authenticate(&CancellationToken::new()).await.unwrap();

        assert_eq!(session.username, "alice");
        assert_eq!(
            app.api().session_header().as_deref(),
            Some("alice 11111111-1111-1111-1111-111111111111")
        );
        assert_eq!(store_for(&temp_dir).load().unwrap(), session);
    }

    #[tokio::test]
    async fn test_valid_stored_session_skips_login() {
        let mock_server = MockServer::start().await;
        mount_login(&mock_server, 0).await;
        Mock::given(method("GET"))
            .and(path("/api/profile"))
            .and(header("Authorization", "alice 11111111-1111-1111-1111-111111111111"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&mock_server)
            .await;

        let temp_dir = TempDir::new().unwrap();
        let stored = Session {
            username: "alice".to_string(),
            session_id: SESSION.parse().unwrap(),
        };
        store_for(&temp_dir).save(&stored).unwrap();

        let app = app_for(&mock_server, &temp_dir, &[]);
        let session = app.authenticate(&CancellationToken::new()).await.unwrap();
        assert_eq!(session, stored);
    }

    #[tokio::test]
    async fn test_rejected_session_is_deleted_then_login() {
        let mock_server = MockServer::start().await;
        mount_login(&mock_server, 1).await;
        Mock::given(method("GET"))
            .and(path("/api/profile"))
            .respond_with(ResponseTemplate::new(401))
            .mount(&mock_server)
            .await;

        let temp_dir = TempDir::new().unwrap();
        let old = Session {
            username: "alice".to_string(),
            session_id: uuid::Uuid::new_v4(),
        };
        store_for(&temp_dir).save(&old).unwrap();

        let app = app_for(&mock_server, &temp_dir, &["alice", "secret"]);
        let session = app.authenticate(&CancellationToken::new()).await.unwrap();

        assert_eq!(session.session_id.to_string(), SESSION);
        assert_eq!(store_for(&temp_dir).load().unwrap(), session);
        assert!(app.console().printed().contains("session ID is invalid"));
    }

    #[tokio::test]
    async fn test_corrupted_session_is_deleted_then_login() {
        let mock_server = MockServer::start().await;
        mount_login(&mock_server, 1).await;

        let temp_dir = TempDir::new().unwrap();
        let store = store_for(&temp_dir);
        std::fs::create_dir_all(store.path().parent().unwrap()).unwrap();
        std::fs::write(store.path(), "garbage").unwrap();

        let app = app_for(&mock_server, &temp_dir, &["alice", "secret"]);
        app.authenticate(&CancellationToken::new()).await.unwrap();

        assert!(app.console().printed().contains("corrupted"));
        assert!(store.load().is_ok());
    }

    #[tokio::test]
    async fn test_empty_account_id_is_rejected() {
        let mock_server = MockServer::start().await;
        mount_login(&mock_server, 0).await;

        let temp_dir = TempDir::new().unwrap();
        let app = app_for(&mock_server, &temp_dir, &[""]);

        let err = app.authenticate(&CancellationToken::new()).await.unwrap_err();
        assert!(matches!(err, AppError::InvalidInput(_)));
    }

    async fn mount_catalog_and_configs(server: &MockServer) {
        Mock::given(method("GET"))
            .and(path("/api/servers"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([
                {"countryName": "Germany", "serverName": "de-fra-1",
                 "status": true, "type": 0, "fileName": "de-fra-1"},
                {"countryName": "Japan", "serverName": "jp-tyo-2",
                 "status": true, "type": 1, "fileName": "jp-tyo-2"}
            ])))
            .expect(1)
            .mount(server)
            .await;

        let bundle = build_zip(&[
            ("de-fra-1.ovpn", "client\nremote 1.1.1.1 1194\n"),
            ("jp-tyo-2.ovpn", "client\nproto udp6\nremote 2.2.2.2 1194\n"),
        ]);
        Mock::given(method("GET"))
            .and(path("/api/configs"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "code": 200,
                "message": "ok",
                "bytes": BASE64.encode(bundle)
            })))
            .expect(1)
            .mount(server)
            .await;
    }

    #[tokio::test]
    async fn test_connect_launches_selected_profile() {
        let mock_server = MockServer::start().await;
        mount_login(&mock_server, 1).await;
        mount_catalog_and_configs(&mock_server).await;

        let temp_dir = TempDir::new().unwrap();
        let app = app_for(&mock_server, &temp_dir, &["alice", "secret", "1"]);
        let launcher = RecordingLauncher::default();

        app.connect(&launcher, false, &CancellationToken::new())
            .await
            .unwrap();

        let launched = launcher.launched.lock().unwrap();
        assert_eq!(launched.len(), 1);
        assert!(launched[0].ends_with("jp-tyo-2.ovpn"));
        let profile = std::fs::read_to_string(&launched[0]).unwrap();
        assert_eq!(profile, "client\nremote 2.2.2.2 1194\n");
        assert!(app.console().printed().contains("| 1 "));
    }

    #[tokio::test]
    async fn test_interrupt_at_server_prompt_does_not_launch() {
        let mock_server = MockServer::start().await;
        mount_login(&mock_server, 1).await;
        mount_catalog_and_configs(&mock_server).await;

        let temp_dir = TempDir::new().unwrap();
        let cancel = CancellationToken::new();
        let api = Arc::new(ApiClient::new(&mock_server.uri(), "Linux", "cloudflare").unwrap());
        let console = ScriptedConsole::with_inputs(&["alice", "secret", "1"])
            .interrupted_at("server ID", &cancel);
        let app = App::with_api(
            api,
            &Paths::new(temp_dir.path().join("LightVPN")),
            "Linux",
            console,
        );
        let launcher = RecordingLauncher::default();

        let err = app.connect(&launcher, false, &cancel).await.unwrap_err();

        assert!(cancel.is_cancelled());
        assert!(matches!(err, AppError::Api(ApiError::Cancelled)));
        assert!(launcher.launched.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_interrupt_at_password_prompt_skips_login() {
        let mock_server = MockServer::start().await;
        mount_login(&mock_server, 0).await;

        let temp_dir = TempDir::new().unwrap();
        let cancel = CancellationToken::new();
        let api = Arc::new(ApiClient::new(&mock_server.uri(), "Linux", "cloudflare").unwrap());
        let console =
            ScriptedConsole::with_inputs(&["alice", "secret"]).interrupted_at("password", &cancel);
        let app = App::with_api(
            api,
            &Paths::new(temp_dir.path().join("LightVPN")),
            "Linux",
            console,
        );

        let err = app.authenticate(&cancel).await.unwrap_err();

        assert!(matches!(err, AppError::Api(ApiError::Cancelled)));
        assert!(!store_for(&temp_dir).exists());
    }

    #[tokio::test]
    async fn test_non_numeric_selection_is_rejected() {
        let mock_server = MockServer::start().await;
        mount_login(&mock_server, 1).await;
        mount_catalog_and_configs(&mock_server).await;

        let temp_dir = TempDir::new().unwrap();
        let app = app_for(&mock_server, &temp_dir, &["alice", "secret", "abc"]);

        let err = app
            .select_server(false, &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::InvalidInput(_)));
    }

    #[tokio::test]
    async fn test_out_of_range_selection_is_rejected() {
        let mock_server = MockServer::start().await;
        mount_login(&mock_server, 1).await;
        mount_catalog_and_configs(&mock_server).await;

        let temp_dir = TempDir::new().unwrap();
        let app = app_for(&mock_server, &temp_dir, &["alice", "secret", "7"]);

        let err = app
            .select_server(false, &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::InvalidInput(_)));
    }

    #[tokio::test]
    async fn test_logout_removes_session() {
        let mock_server = MockServer::start().await;
        mount_login(&mock_server, 1).await;

        let temp_dir = TempDir::new().unwrap();
        let app = app_for(&mock_server, &temp_dir, &["alice", "secret"]);
        app.authenticate(&CancellationToken::new()).await.unwrap();

        app.logout().await.unwrap();
        assert!(!store_for(&temp_dir).exists());
        assert!(app.api().session_header().is_none());
    }

    #[test]
    fn test_user_message_for_client_update() {
        let err = AppError::Api(ApiError::ClientUpdateRequired("old".to_string()));
        assert_eq!(
            user_message(&err),
            "Client update required! Please update via the website."
        );
    }

    #[test]
    fn test_user_message_passes_through_other_errors() {
        let err = AppError::Resolve(ResolveError::ConfigNotFound("whitespace".to_string()));
        assert!(user_message(&err).contains("server cache may be out of date"));

        let err = AppError::Api(ApiError::Ratelimited("Slow down".to_string()));
        assert_eq!(user_message(&err), "Slow down");
    }
}
