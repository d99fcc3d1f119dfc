use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

use super::AuthError;

/// Token saved by `pr-helper login`, kept base64-encoded under the user's
/// config directory. Encoding only keeps the token from being read at a glance.
#[derive(Debug, Clone)]
pub struct TokenStorage {
    path: PathBuf,
}

impl TokenStorage {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// `{config_dir}/pr-helper/token`, or None on platforms without a config dir.
    pub fn default_location() -> Option<Self> {
        dirs::config_dir().map(|dir| Self::new(dir.join("pr-helper").join("token")))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn save(&self, token: &str) -> Result<(), AuthError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&self.path, STANDARD.encode(token))?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(&self.path, fs::Permissions::from_mode(0o600))?;
        }
        debug!(path = %self.path.display(), "saved token");
        Ok(())
    }

    /// The stored token, or None when nothing has been saved.
    pub fn load(&self) -> Result<Option<String>, AuthError> {
        if !self.path.exists() {
            return Ok(None);
        }
        let encoded = fs::read_to_string(&self.path)?;
        let bytes = STANDARD.decode(encoded.trim())?;
        let token = String::from_utf8(bytes).map_err(|_| AuthError::CorruptToken)?;
        Ok(Some(token))
    }

    /// Remove the stored token. Returns whether there was one.
    pub fn delete(&self) -> Result<bool, AuthError> {
        if !self.path.exists() {
            return Ok(false);
        }
        fs::remove_file(&self.path)?;
        Ok(true)
    }
}
