//! Durable storage for the bearer token, and the authenticated session built from it.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use directories::ProjectDirs;
use tracing::{debug, info};

use crate::config::SessionConfig;
use crate::error::{MessengerError, Result};
use crate::models::{User, UserId};
use crate::repository::AuthApi;

/// File name of the stored token
pub const TOKEN_FILE_NAME: &str = "contactManager_token";

/// Token file on local disk
#[derive(Debug, Clone)]
pub struct TokenStore {
    path: PathBuf,
}

impl TokenStore {
    /// Store the token at `path`
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Use the configured path, or the platform data directory
    pub fn from_config(config: &SessionConfig) -> Result<Self> {
        if let Some(path) = &config.token_path {
            return Ok(Self::new(path));
        }
        let dirs = ProjectDirs::from("com", "contact-messenger", "ContactMessenger")
            .ok_or_else(|| MessengerError::InvalidConfig("No home directory for session storage".to_string()))?;
        Ok(Self::new(dirs.data_dir().join(TOKEN_FILE_NAME)))
    }

    /// Where the token lives
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The stored token, if any
    pub fn load(&self) -> Result<Option<String>> {
        match fs::read_to_string(&self.path) {
            Ok(contents) => {
                let token = contents.trim();
                Ok((!token.is_empty()).then(|| token.to_string()))
            },
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// The stored token, or `NotAuthenticated`
    pub fn require(&self) -> Result<String> {
        self.load()?.ok_or(MessengerError::NotAuthenticated)
    }

    /// Persist `token`, replacing any previous one
    pub fn save(&self, token: &str) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&self.path, token)?;
        debug!(path = %self.path.display(), "Saved session token");
        Ok(())
    }

    /// Remove the stored token
    pub fn clear(&self) -> Result<()> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

/// An authenticated identity. Identity-dependent components take one of these, so they
/// cannot be started without a token.
#[derive(Debug, Clone)]
pub struct Session {
    token: String,
    user: User,
}

impl Session {
    /// Pair a token with the user it belongs to
    #[must_use]
    pub const fn new(token: String, user: User) -> Self {
        Self { token, user }
    }

    /// Resume from the stored token. A token the server rejects is cleared.
    pub async fn resume(tokens: &TokenStore, auth: &dyn AuthApi) -> Result<Self> {
        let token = tokens.require()?;
        match auth.current_user().await {
            Ok(user) => Ok(Self::new(token, user)),
            Err(MessengerError::Server { status: 401 | 422, .. }) => {
                info!("Stored session token rejected; clearing it");
                tokens.clear()?;
                Err(MessengerError::NotAuthenticated)
            },
            Err(e) => Err(e),
        }
    }

    /// Sign in and persist the token
    pub async fn login(tokens: &TokenStore, auth: &dyn AuthApi, email: &str, password: &str) -> Result<Self> {
        let resp = auth.login(email, password).await?;
        tokens.save(&resp.token)?;
        info!(user = %resp.user.email, "Logged in");
        Ok(Self::new(resp.token, resp.user))
    }

    /// Create an account and persist the token
    pub async fn register(
        tokens: &TokenStore, auth: &dyn AuthApi, name: &str, email: &str, password: &str,
    ) -> Result<Self> {
        let resp = auth.register(name, email, password).await?;
        tokens.save(&resp.token)?;
        info!(user = %resp.user.email, "Registered");
        Ok(Self::new(resp.token, resp.user))
    }

    /// Bearer token
    #[must_use]
    pub fn token(&self) -> &str {
        &self.token
    }

    /// Signed-in user
    #[must_use]
    pub const fn user(&self) -> &User {
        &self.user
    }

    /// Signed-in user's id
    #[must_use]
    pub const fn user_id(&self) -> UserId {
        self.user.id
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_token_round_trip_and_clear() {
        let dir = tempdir().unwrap();
        let store = TokenStore::new(dir.path().join("nested").join(TOKEN_FILE_NAME));

        assert_eq!(store.load().unwrap(), None);
        assert!(matches!(store.require(), Err(MessengerError::NotAuthenticated)));

        store.save("abc.def").unwrap();
        assert_eq!(store.load().unwrap().as_deref(), Some("abc.def"));

        store.clear().unwrap();
        assert_eq!(store.load().unwrap(), None);
        store.clear().unwrap();
    }

    #[test]
    fn test_blank_token_file_counts_as_logged_out() {
        let dir = tempdir().unwrap();
        let path = dir.path().join(TOKEN_FILE_NAME);
        fs::write(&path, "  \n").unwrap();
        assert_eq!(TokenStore::new(path).load().unwrap(), None);
    }
}
