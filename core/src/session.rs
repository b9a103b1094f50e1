//! Client-side session state.
//!
//! # Design
//! The session is a bearer token paired with the signed-in user's profile.
//! It lives in two places: a `SessionStorage` backend that survives restarts
//! (string keys `token` and `user`, the user stored as JSON text) and an
//! observable `watch` cell that UI code subscribes to. `SessionStore` keeps
//! both in step; token and user are always written and cleared together.
//! Token freshness is never checked locally; the server decides.

use std::collections::HashMap;
use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::watch;

use crate::error::ApiError;

pub const TOKEN_KEY: &str = "token";
pub const USER_KEY: &str = "user";

const SESSION_DIR_NAME: &str = "school-client";

/// A signed-in user and their bearer token.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub token: String,
    pub user: Value,
}

/// String key/value storage that persists the session.
pub trait SessionStorage: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>, ApiError>;
    fn set(&self, key: &str, value: &str) -> Result<(), ApiError>;
    fn remove(&self, key: &str) -> Result<(), ApiError>;
}

/// Process-local storage. Nothing survives a restart.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    entries: RwLock<HashMap<String, String>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SessionStorage for MemoryStorage {
    fn get(&self, key: &str) -> Result<Option<String>, ApiError> {
        let entries = self
            .entries
            .read()
            .map_err(|_| ApiError::Storage("memory storage lock poisoned".into()))?;
        Ok(entries.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), ApiError> {
        let mut entries = self
            .entries
            .write()
            .map_err(|_| ApiError::Storage("memory storage lock poisoned".into()))?;
        entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), ApiError> {
        let mut entries = self
            .entries
            .write()
            .map_err(|_| ApiError::Storage("memory storage lock poisoned".into()))?;
        entries.remove(key);
        Ok(())
    }
}

/// One file per key inside a directory. On Unix the directory is 0700 and
/// files are created 0600.
#[derive(Debug, Clone)]
pub struct FileStorage {
    dir: PathBuf,
}

impl FileStorage {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// `<config_dir>/school-client`, e.g. `~/.config/school-client` on Linux.
    pub fn default_dir() -> Result<PathBuf, ApiError> {
        dirs::config_dir()
            .map(|d| d.join(SESSION_DIR_NAME))
            .ok_or_else(|| ApiError::Storage("config directory not found".into()))
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, key: &str) -> Result<PathBuf, ApiError> {
        let valid = !key.is_empty()
            && key
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
        if !valid {
            return Err(ApiError::Storage(format!("invalid storage key {key:?}")));
        }
        Ok(self.dir.join(key))
    }
}

impl SessionStorage for FileStorage {
    fn get(&self, key: &str) -> Result<Option<String>, ApiError> {
        let path = self.path_for(key)?;
        match fs::read_to_string(&path) {
            Ok(value) => Ok(Some(value)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(ApiError::Storage(format!("read {}: {e}", path.display()))),
        }
    }

    fn set(&self, key: &str, value: &str) -> Result<(), ApiError> {
        let path = self.path_for(key)?;
        fs::create_dir_all(&self.dir)
            .map_err(|e| ApiError::Storage(format!("mkdir {}: {e}", self.dir.display())))?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            if let Err(e) = fs::set_permissions(&self.dir, fs::Permissions::from_mode(0o700)) {
                tracing::warn!("failed to chmod 0700 {}: {e}", self.dir.display());
            }
        }

        let mut options = OpenOptions::new();
        options.write(true).create(true).truncate(true);
        #[cfg(unix)]
        {
            use std::os::unix::fs::OpenOptionsExt;
            options.mode(0o600);
        }
        let mut file = options
            .open(&path)
            .map_err(|e| ApiError::Storage(format!("open {}: {e}", path.display())))?;

        // `mode` only applies on creation; tighten files left by older writes.
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            file.set_permissions(fs::Permissions::from_mode(0o600))
                .map_err(|e| ApiError::Storage(format!("chmod {}: {e}", path.display())))?;
        }

        file.write_all(value.as_bytes())
            .map_err(|e| ApiError::Storage(format!("write {}: {e}", path.display())))?;
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), ApiError> {
        let path = self.path_for(key)?;
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(ApiError::Storage(format!("delete {}: {e}", path.display()))),
        }
    }
}

/// Persisted session plus observable `user` and `loading` cells.
pub struct SessionStore {
    storage: Arc<dyn SessionStorage>,
    user: watch::Sender<Option<Value>>,
    loading: watch::Sender<bool>,
}

impl SessionStore {
    pub fn new(storage: Arc<dyn SessionStorage>) -> Self {
        let (user, _) = watch::channel(None);
        let (loading, _) = watch::channel(false);
        Self {
            storage,
            user,
            loading,
        }
    }

    pub fn storage(&self) -> &Arc<dyn SessionStorage> {
        &self.storage
    }

    /// Restore the user cell from storage at startup.
    ///
    /// The cell is populated only when both keys are present and the stored
    /// user parses as JSON. Returns whether a session was restored.
    pub fn init_auth(&self) -> Result<bool, ApiError> {
        let token = self.storage.get(TOKEN_KEY)?;
        let user = self.storage.get(USER_KEY)?;
        let (Some(token), Some(raw_user)) = (token, user) else {
            return Ok(false);
        };
        if token.is_empty() {
            return Ok(false);
        }
        match serde_json::from_str::<Value>(&raw_user) {
            Ok(user) => {
                self.user.send_replace(Some(user));
                Ok(true)
            }
            Err(error) => {
                tracing::warn!(%error, "stored user is not valid JSON; ignoring persisted session");
                Ok(false)
            }
        }
    }

    /// Persist `token` and `user`, then publish `user`.
    ///
    /// If either write fails the whole session is cleared.
    pub fn login(&self, user: Value, token: &str) -> Result<(), ApiError> {
        let written = self
            .storage
            .set(TOKEN_KEY, token)
            .and_then(|()| self.storage.set(USER_KEY, &user.to_string()));
        if let Err(e) = written {
            tracing::warn!(error = %e, "failed to persist session; clearing it");
            let _ = self.logout();
            return Err(e);
        }
        self.user.send_replace(Some(user));
        tracing::info!("session stored");
        Ok(())
    }

    /// Clear both persisted keys and the user cell.
    ///
    /// The cell is cleared even when storage fails; the first storage error
    /// is returned.
    pub fn logout(&self) -> Result<(), ApiError> {
        let token = self.storage.remove(TOKEN_KEY);
        let user = self.storage.remove(USER_KEY);
        self.user.send_replace(None);
        tracing::info!("session cleared");
        token.and(user)
    }

    pub fn token(&self) -> Result<Option<String>, ApiError> {
        self.storage.get(TOKEN_KEY)
    }

    /// The persisted session, if both halves are present and readable.
    pub fn session(&self) -> Result<Option<Session>, ApiError> {
        let token = self.storage.get(TOKEN_KEY)?;
        let user = self.storage.get(USER_KEY)?;
        Ok(match (token, user) {
            (Some(token), Some(raw)) => serde_json::from_str(&raw)
                .ok()
                .map(|user| Session { token, user }),
            _ => None,
        })
    }

    pub fn current_user(&self) -> Option<Value> {
        self.user.borrow().clone()
    }

    pub fn is_authenticated(&self) -> bool {
        self.user.borrow().is_some()
    }

    pub fn subscribe_user(&self) -> watch::Receiver<Option<Value>> {
        self.user.subscribe()
    }

    pub fn set_loading(&self, loading: bool) {
        self.loading.send_replace(loading);
    }

    pub fn is_loading(&self) -> bool {
        *self.loading.borrow()
    }

    pub fn subscribe_loading(&self) -> watch::Receiver<bool> {
        self.loading.subscribe()
    }
}

impl std::fmt::Debug for SessionStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionStore")
            .field("authenticated", &self.is_authenticated())
            .field("loading", &self.is_loading())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn memory_store() -> SessionStore {
        SessionStore::new(Arc::new(MemoryStorage::new()))
    }

    #[test]
    fn login_updates_storage_and_cell() {
        let store = memory_store();
        let user = json!({"id": 1, "email": "admin@school.test", "role": "admin"});
        store.login(user.clone(), "tok").unwrap();

        assert_eq!(store.current_user(), Some(user.clone()));
        assert_eq!(store.token().unwrap().as_deref(), Some("tok"));
        let raw = store.storage().get(USER_KEY).unwrap().unwrap();
        assert_eq!(serde_json::from_str::<Value>(&raw).unwrap(), user);
        assert_eq!(
            store.session().unwrap(),
            Some(Session {
                token: "tok".into(),
                user
            })
        );
    }

    #[test]
    fn logout_then_init_does_not_restore() {
        let store = memory_store();
        store.login(json!({"id": 2}), "tok").unwrap();
        store.logout().unwrap();
        assert!(!store.init_auth().unwrap());
        assert_eq!(store.current_user(), None);
        assert_eq!(store.token().unwrap(), None);
    }

    #[test]
    fn init_restores_persisted_session() {
        let storage = Arc::new(MemoryStorage::new());
        storage.set(TOKEN_KEY, "tok").unwrap();
        storage.set(USER_KEY, r#"{"id":3,"role":"teacher"}"#).unwrap();

        let store = SessionStore::new(storage);
        assert!(!store.is_authenticated());
        assert!(store.init_auth().unwrap());
        assert_eq!(store.current_user(), Some(json!({"id": 3, "role": "teacher"})));
    }

    #[test]
    fn init_requires_both_keys() {
        let storage = Arc::new(MemoryStorage::new());
        storage.set(USER_KEY, r#"{"id":3}"#).unwrap();
        let store = SessionStore::new(storage);
        assert!(!store.init_auth().unwrap());
        assert!(!store.is_authenticated());
    }

    #[test]
    fn init_ignores_corrupt_user() {
        let storage = Arc::new(MemoryStorage::new());
        storage.set(TOKEN_KEY, "tok").unwrap();
        storage.set(USER_KEY, "{not json").unwrap();
        let store = SessionStore::new(storage);
        assert!(!store.init_auth().unwrap());
        assert_eq!(store.session().unwrap(), None);
    }

    #[test]
    fn init_rejects_empty_token() {
        let storage = Arc::new(MemoryStorage::new());
        storage.set(TOKEN_KEY, "").unwrap();
        storage.set(USER_KEY, r#"{"id":3}"#).unwrap();
        let store = SessionStore::new(storage);
        assert!(!store.init_auth().unwrap());
        assert!(!store.is_authenticated());
    }

    /// Memory storage that refuses writes to one key.
    struct RefusingStorage {
        inner: MemoryStorage,
        refuse: RwLock<Option<&'static str>>,
    }

    impl SessionStorage for RefusingStorage {
        fn get(&self, key: &str) -> Result<Option<String>, ApiError> {
            self.inner.get(key)
        }

        fn set(&self, key: &str, value: &str) -> Result<(), ApiError> {
            if *self.refuse.read().unwrap() == Some(key) {
                return Err(ApiError::Storage(format!("disk full writing {key}")));
            }
            self.inner.set(key, value)
        }

        fn remove(&self, key: &str) -> Result<(), ApiError> {
            self.inner.remove(key)
        }
    }

    #[test]
    fn failed_login_clears_previous_session() {
        let storage = Arc::new(RefusingStorage {
            inner: MemoryStorage::new(),
            refuse: RwLock::new(None),
        });
        let store = SessionStore::new(storage.clone());
        store.login(json!({"id": "A"}), "tok-a").unwrap();

        *storage.refuse.write().unwrap() = Some(USER_KEY);
        let err = store.login(json!({"id": "B"}), "tok-b").unwrap_err();
        assert!(matches!(err, ApiError::Storage(_)));

        assert!(!store.is_authenticated());
        assert_eq!(store.current_user(), None);
        assert_eq!(store.token().unwrap(), None);
        assert_eq!(storage.get(USER_KEY).unwrap(), None);
        assert!(!store.init_auth().unwrap());
    }

    #[test]
    fn failed_token_write_leaves_nothing_behind() {
        let storage = Arc::new(RefusingStorage {
            inner: MemoryStorage::new(),
            refuse: RwLock::new(Some(TOKEN_KEY)),
        });
        let store = SessionStore::new(storage.clone());
        assert!(store.login(json!({"id": 1}), "tok").is_err());
        assert!(!store.is_authenticated());
        assert_eq!(storage.get(USER_KEY).unwrap(), None);
    }

    #[test]
    fn subscribers_see_login_and_logout() {
        let store = memory_store();
        let mut rx = store.subscribe_user();
        assert!(!rx.has_changed().unwrap());

        store.login(json!({"id": 4}), "tok").unwrap();
        assert!(rx.has_changed().unwrap());
        assert_eq!(*rx.borrow_and_update(), Some(json!({"id": 4})));

        store.logout().unwrap();
        assert!(rx.has_changed().unwrap());
        assert_eq!(*rx.borrow_and_update(), None);
    }

    #[test]
    fn loading_flag_is_observable() {
        let store = memory_store();
        let rx = store.subscribe_loading();
        store.set_loading(true);
        assert!(*rx.borrow());
        store.set_loading(false);
        assert!(!store.is_loading());
    }

    #[test]
    fn file_storage_round_trips_and_survives_new_instance() {
        let tmp = tempfile::TempDir::new().expect("tmp dir");
        let dir = tmp.path().join("session");

        let store = SessionStore::new(Arc::new(FileStorage::new(&dir)));
        store.login(json!({"id": 5, "role": "student"}), "file-tok").unwrap();

        let reopened = SessionStore::new(Arc::new(FileStorage::new(&dir)));
        assert!(reopened.init_auth().unwrap());
        assert_eq!(reopened.current_user(), Some(json!({"id": 5, "role": "student"})));

        reopened.logout().unwrap();
        assert!(!dir.join(TOKEN_KEY).exists());
        assert!(!dir.join(USER_KEY).exists());
    }

    #[cfg(unix)]
    #[test]
    fn file_storage_writes_owner_only_files() {
        use std::os::unix::fs::PermissionsExt;

        let tmp = tempfile::TempDir::new().expect("tmp dir");
        let dir = tmp.path().join("session");
        let storage = FileStorage::new(&dir);
        storage.set(TOKEN_KEY, "secret").unwrap();
        let mode = fs::metadata(dir.join(TOKEN_KEY))
            .expect("metadata")
            .permissions()
            .mode()
            & 0o777;
        assert_eq!(mode, 0o600);

        let dir_mode = fs::metadata(&dir)
            .expect("metadata")
            .permissions()
            .mode()
            & 0o777;
        assert_eq!(dir_mode, 0o700);
    }

    #[cfg(unix)]
    #[test]
    fn file_storage_tightens_existing_loose_file() {
        use std::os::unix::fs::PermissionsExt;

        let tmp = tempfile::TempDir::new().expect("tmp dir");
        let path = tmp.path().join(TOKEN_KEY);
        fs::write(&path, "old").unwrap();
        fs::set_permissions(&path, fs::Permissions::from_mode(0o644)).unwrap();

        FileStorage::new(tmp.path()).set(TOKEN_KEY, "new").unwrap();
        let mode = fs::metadata(&path).expect("metadata").permissions().mode() & 0o777;
        assert_eq!(mode, 0o600);
        assert_eq!(fs::read_to_string(&path).unwrap(), "new");
    }

    #[test]
    fn file_storage_remove_missing_key_is_ok() {
        let tmp = tempfile::TempDir::new().expect("tmp dir");
        let storage = FileStorage::new(tmp.path());
        assert!(storage.remove(USER_KEY).is_ok());
        assert_eq!(storage.get(USER_KEY).unwrap(), None);
    }

    #[test]
    fn file_storage_rejects_path_like_keys() {
        let tmp = tempfile::TempDir::new().expect("tmp dir");
        let storage = FileStorage::new(tmp.path());
        let err = storage.set("../escape", "x").unwrap_err();
        assert!(matches!(err, ApiError::Storage(_)));
    }
}
