//! Encrypted on-disk session storage
//!
//! The session (username + session id) is serialized to JSON, sealed with
//! AES-256-GCM and written as base64 text. The key is derived from a secret
//! fixed at build time, so this only keeps the file opaque at rest; anyone
//! with the binary can decrypt it.

use aes_gcm::aead::{Aead, AeadCore, KeyInit, OsRng};
use aes_gcm::{Aes256Gcm, Nonce};
use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info};
use uuid::Uuid;

const STORE_SECRET: &str = match option_env!("LIGHTVPN_STORE_SECRET") {
    Some(secret) => secret,
    None => "lightvpn-cli-session-store",
};

const MAGIC: &[u8] = b"LVPN1";
const NONCE_SIZE: usize = 12;

#[derive(Error, Debug)]
pub enum SessionError {
    #[error("Authentication data is corrupted: {0}")]
    CorruptedAuthSettings(String),
    #[error("Failed to access session file: {0}")]
    Io(#[from] io::Error),
}

/// An authenticated identity
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub username: String,
    pub session_id: Uuid,
}

/// Plaintext layout of the session file
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AuthFile {
    username: String,
    session_id: Uuid,
    /// Written by older clients, ignored
    #[serde(default, skip_serializing)]
    #[allow(dead_code)]
    password: Option<String>,
}

pub struct SessionStore {
    path: PathBuf,
    key: [u8; 32],
}

impl SessionStore {
    pub fn new(path: PathBuf) -> Self {
        Self {
            path,
            key: derive_key(STORE_SECRET),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn exists(&self) -> bool {
        self.path.is_file()
    }

    /// Read and decrypt the stored session
    ///
    /// Any decoding, decryption or schema failure is reported as
    /// [`SessionError::CorruptedAuthSettings`]; the caller should delete the file.
    pub fn load(&self) -> Result<Session, SessionError> {
        let content = fs::read_to_string(&self.path).map_err(|e| match e.kind() {
            io::ErrorKind::InvalidData => SessionError::CorruptedAuthSettings(e.to_string()),
            _ => SessionError::Io(e),
        })?;

        let sealed = BASE64
            .decode(content.trim())
            .map_err(|e| SessionError::CorruptedAuthSettings(format!("not base64: {}", e)))?;
        let plaintext = self.open(&sealed)?;
        let file: AuthFile = serde_json::from_slice(&plaintext)
            .map_err(|e| SessionError::CorruptedAuthSettings(format!("bad record: {}", e)))?;

        debug!("Loaded session for {}", file.username);
        Ok(Session {
            username: file.username,
            session_id: file.session_id,
        })
    }

    /// Encrypt and write `session`, replacing any previous file atomically
    pub fn save(&self, session: &Session) -> Result<(), SessionError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }

        let file = AuthFile {
            username: session.username.clone(),
            session_id: session.session_id,
            password: None,
        };
        let plaintext = serde_json::to_vec(&file)
            .map_err(|e| SessionError::CorruptedAuthSettings(e.to_string()))?;
        let sealed = self.seal(&plaintext)?;

        let tmp_path = self.path.with_extension("tmp");
        fs::write(&tmp_path, BASE64.encode(sealed))?;
        fs::rename(&tmp_path, &self.path)?;

        info!("Session saved to {}", self.path.display());
        Ok(())
    }

    /// Remove the stored session; no-op if there is none
    pub fn delete(&self) -> Result<(), SessionError> {
        match fs::remove_file(&self.path) {
            Ok(()) => {
                info!("Session file removed");
                Ok(())
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    fn seal(&self, plaintext: &[u8]) -> Result<Vec<u8>, SessionError> {
        let cipher = Aes256Gcm::new_from_slice(&self.key)
            .map_err(|e| SessionError::CorruptedAuthSettings(e.to_string()))?;
        let nonce = Aes256Gcm::generate_nonce(&mut OsRng);
        let ciphertext = cipher
            .encrypt(&nonce, plaintext)
            .map_err(|e| SessionError::CorruptedAuthSettings(format!("encryption failed: {}", e)))?;

        let mut out = Vec::with_capacity(MAGIC.len() + NONCE_SIZE + ciphertext.len());
        out.extend_from_slice(MAGIC);
        out.extend_from_slice(&nonce);
        out.extend_from_slice(&ciphertext);
        Ok(out)
    }

    fn open(&self, sealed: &[u8]) -> Result<Vec<u8>, SessionError> {
        if sealed.len() < MAGIC.len() + NONCE_SIZE || &sealed[..MAGIC.len()] != MAGIC {
            return Err(SessionError::CorruptedAuthSettings(
                "header missing or invalid".to_string(),
            ));
        }
        let nonce = Nonce::from_slice(&sealed[MAGIC.len()..MAGIC.len() + NONCE_SIZE]);
        let ciphertext = &sealed[MAGIC.len() + NONCE_SIZE..];

        let cipher = Aes256Gcm::new_from_slice(&self.key)
            .map_err(|e| SessionError::CorruptedAuthSettings(e.to_string()))?;
        cipher
            .decrypt(nonce, ciphertext)
            .map_err(|_| SessionError::CorruptedAuthSettings("decryption failed".to_string()))
    }
}

fn derive_key(secret: &str) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(secret.as_bytes());
    let result = hasher.finalize();
    let mut key = [0u8; 32];
    key.copy_from_slice(&result[..32]);
    key
}
