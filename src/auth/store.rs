use std::path::PathBuf;
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::error::AuthError;
use super::profile::UserProfile;
use super::token::Credential;
use crate::util::fs::{default_state_dir, normalize_label, read_toml, remove_if_exists, write_toml};

/// Credential and profile, persisted and cleared together.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredSession {
    pub credential: Credential,
    pub profile: Option<UserProfile>,
}

impl StoredSession {
    pub fn new(credential: Credential, profile: Option<UserProfile>) -> Self {
        Self {
            credential,
            profile,
        }
    }
}

/// Storage abstraction for the persisted session record.
pub trait TokenStore: Send + Sync {
    fn load(&self) -> Result<Option<StoredSession>, AuthError>;
    fn save(&self, session: &StoredSession) -> Result<(), AuthError>;
    fn clear(&self) -> Result<(), AuthError>;
}

/// Configuration for file-backed session storage.
#[derive(Debug, Clone)]
pub struct TokenStoreConfig {
    pub base_dir: PathBuf,
    pub namespace: String,
}

impl TokenStoreConfig {
    pub fn new(base_dir: PathBuf) -> Self {
        Self {
            base_dir,
            namespace: "default".to_string(),
        }
    }

    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = namespace.into();
        self
    }

    pub fn default_dir() -> PathBuf {
        default_state_dir()
    }
}

/// File-backed session store using a TOML file.
///
/// # Example
/// ```no_run
/// use statement_gate::auth::{Credential, FileTokenStore, StoredSession, TokenStore};
///
/// let store = FileTokenStore::new_default();
/// let credential = Credential::new("access")?.with_refresh_token("refresh");
/// store.save(&StoredSession::new(credential, None))?;
/// # Ok::<(), statement_gate::auth::AuthError>(())
/// ```
#[derive(Debug, Clone)]
pub struct FileTokenStore {
    path: PathBuf,
}

impl FileTokenStore {
    pub fn new(config: TokenStoreConfig) -> Self {
        let name = format!("{}.session.toml", normalize_label(&config.namespace));
        Self {
            path: config.base_dir.join(name),
        }
    }

    pub fn new_default() -> Self {
        Self::new(TokenStoreConfig::new(default_state_dir()))
    }

    pub fn path(&self) -> &PathBuf {
        &self.path
    }
}

impl TokenStore for FileTokenStore {
    fn load(&self) -> Result<Option<StoredSession>, AuthError> {
        let Some(file) = read_toml::<SessionFile>(&self.path)? else {
            return Ok(None);
        };
        if file.session.credential.access_token.trim().is_empty() {
            tracing::warn!(path = %self.path.display(), "Ignoring stored session with empty access token");
            return Ok(None);
        }
        Ok(Some(file.session))
    }

    fn save(&self, session: &StoredSession) -> Result<(), AuthError> {
        let file = SessionFile {
            version: SESSION_FILE_VERSION,
            session: session.clone(),
            saved_at: Utc::now(),
        };
        write_toml(&self.path, &file)?;
        Ok(())
    }

    fn clear(&self) -> Result<(), AuthError> {
        remove_if_exists(&self.path)?;
        Ok(())
    }
}

const SESSION_FILE_VERSION: u32 = 1;

#[derive(Debug, Clone, Serialize, Deserialize)]
struct SessionFile {
    version: u32,
    saved_at: DateTime<Utc>,
    session: StoredSession,
}

/// In-process store for hosts without a filesystem.
#[derive(Debug, Default)]
pub struct MemoryTokenStore {
    session: Mutex<Option<StoredSession>>,
}

impl MemoryTokenStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store pre-existing state, e.g. a session restored by the host.
    pub fn seeded(session: StoredSession) -> Self {
        Self {
            session: Mutex::new(Some(session)),
        }
    }
}

impl TokenStore for MemoryTokenStore {
    fn load(&self) -> Result<Option<StoredSession>, AuthError> {
        Ok(self
            .session
            .lock()
            .map_err(|_| AuthError::Io("session store lock poisoned".to_string()))?
            .clone())
    }

    fn save(&self, session: &StoredSession) -> Result<(), AuthError> {
        *self
            .session
            .lock()
            .map_err(|_| AuthError::Io("session store lock poisoned".to_string()))? =
            Some(session.clone());
        Ok(())
    }

    fn clear(&self) -> Result<(), AuthError> {
        self.session
            .lock()
            .map_err(|_| AuthError::Io("session store lock poisoned".to_string()))?
            .take();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn temp_store() -> (TempDir, FileTokenStore) {
        let dir = TempDir::new().unwrap();
        let store = FileTokenStore::new(TokenStoreConfig::new(dir.path().to_path_buf()));
        (dir, store)
    }

    fn sample_session() -> StoredSession {
        StoredSession::new(
            Credential::new("access").unwrap().with_refresh_token("refresh"),
            Some(UserProfile::new("ana@example.com")),
        )
    }

    #[test]
    fn session_round_trip_works() {
        let (_dir, store) = temp_store();
        store.save(&sample_session()).unwrap();
        let loaded = store.load().unwrap().unwrap();
        assert_eq!(loaded.credential.access_token, "access");
        assert_eq!(loaded.credential.refresh_token.as_deref(), Some("refresh"));
        assert_eq!(loaded.profile.unwrap().email, "ana@example.com");
    }

    #[test]
    fn clear_removes_session_and_is_idempotent() {
        let (_dir, store) = temp_store();
        store.save(&sample_session()).unwrap();
        store.clear().unwrap();
        assert!(store.load().unwrap().is_none());
        store.clear().unwrap();
    }

    #[test]
    fn namespaces_do_not_collide() {
        let dir = TempDir::new().unwrap();
        let work = FileTokenStore::new(
            TokenStoreConfig::new(dir.path().to_path_buf()).with_namespace("Work"),
        );
        let home = FileTokenStore::new(TokenStoreConfig::new(dir.path().to_path_buf()));
        work.save(&sample_session()).unwrap();
        assert!(home.load().unwrap().is_none());
        assert!(work.path().ends_with("work.session.toml"));
    }

    #[test]
    fn empty_access_token_on_disk_loads_as_absent() {
        let (_dir, store) = temp_store();
        let mut session = sample_session();
        session.credential.access_token = String::new();
        store.save(&session).unwrap();
        assert!(store.load().unwrap().is_none());
    }

    #[cfg(unix)]
    #[test]
    fn session_file_is_private() {
        use std::os::unix::fs::PermissionsExt;
        let (_dir, store) = temp_store();
        store.save(&sample_session()).unwrap();
        let mode = std::fs::metadata(store.path()).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }

    #[test]
    fn memory_store_round_trip() {
        let store = MemoryTokenStore::new();
        assert!(store.load().unwrap().is_none());
        store.save(&sample_session()).unwrap();
        assert!(store.load().unwrap().is_some());
        store.clear().unwrap();
        assert!(store.load().unwrap().is_none());
    }
}
