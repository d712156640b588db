//! Session state and its persistence.
//!
//! The session is the process-wide source of truth for "who is logged in":
//! the bearer token, the refresh token used to renew it, and the last-fetched
//! user profile. All three move together - `SessionStore::set` is the only
//! mutator, and it persists and swaps the in-memory snapshot as one step, so
//! no component can observe a token without its persisted copy.
//!
//! Persistence goes through the `SessionBackend` trait so the coordination
//! logic is testable without touching the filesystem.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Mutex, PoisonError};

use serde_json::Value;
use tracing::{debug, warn};

use crate::auth::token;
use crate::models::UserProfile;

/// Storage key for the bearer token.
pub const TOKEN_KEY: &str = "laf_token";

/// Storage key for the refresh token.
pub const REFRESH_TOKEN_KEY: &str = "laf_refresh_token";

/// Storage key for the serialized user profile.
pub const USER_KEY: &str = "laf_user";

/// One atomic snapshot of the authentication state.
#[derive(Debug, Clone, Default)]
pub struct Session {
    pub token: Option<String>,
    pub refresh_token: Option<String>,
    pub user: Option<UserProfile>,
}

impl Session {
    /// Whether this snapshot carries a bearer token at all.
    /// Expiry is a separate question - see [`SessionStore::is_authenticated`].
    pub fn is_authenticated(&self) -> bool {
        self.token.is_some()
    }

    fn is_empty(&self) -> bool {
        self.token.is_none() && self.refresh_token.is_none() && self.user.is_none()
    }
}

/// Durable key-value area scoped to the application session.
///
/// Write failures must be absorbed by the implementation (log, don't raise):
/// the in-memory snapshot is authoritative the moment `SessionStore::set`
/// returns, and auth flows cannot stall on a disk error.
pub trait SessionBackend: Send + Sync {
    fn get(&self, key: &str) -> Option<String>;
    fn set(&self, key: &str, value: &str);
    fn remove(&self, key: &str);
}

/// In-memory backend for tests and ephemeral sessions.
#[derive(Default)]
pub struct MemorySessionBackend {
    entries: Mutex<HashMap<String, String>>,
}

impl MemorySessionBackend {
    pub fn new() -> Self {
        Self::default()
    }

    fn entries(&self) -> std::sync::MutexGuard<'_, HashMap<String, String>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl SessionBackend for MemorySessionBackend {
    fn get(&self, key: &str) -> Option<String> {
        self.entries().get(key).cloned()
    }

    fn set(&self, key: &str, value: &str) {
        self.entries().insert(key.to_string(), value.to_string());
    }

    fn remove(&self, key: &str) {
        self.entries().remove(key);
    }
}

/// File-backed backend: a single JSON object of key -> value, written through
/// on every mutation (writes are cheap at three keys).
pub struct FileSessionBackend {
    path: PathBuf,
    entries: Mutex<HashMap<String, String>>,
}

impl FileSessionBackend {
    /// Open the session file, starting empty if it is missing or corrupt.
    pub fn open(path: PathBuf) -> Self {
        let entries = match std::fs::read_to_string(&path) {
            Ok(contents) => match serde_json::from_str(&contents) {
                Ok(map) => map,
                Err(err) => {
                    warn!(path = %path.display(), error = %err, "Corrupt session file, starting empty");
                    HashMap::new()
                }
            },
            Err(_) => HashMap::new(),
        };
        Self {
            path,
            entries: Mutex::new(entries),
        }
    }

    fn flush(&self, entries: &HashMap<String, String>) {
        let write = || -> anyhow::Result<()> {
            if let Some(parent) = self.path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            let contents = serde_json::to_string_pretty(entries)?;
            std::fs::write(&self.path, contents)?;
            Ok(())
        };
        if let Err(err) = write() {
            warn!(path = %self.path.display(), error = %err, "Failed to persist session");
        }
    }

    fn entries(&self) -> std::sync::MutexGuard<'_, HashMap<String, String>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl SessionBackend for FileSessionBackend {
    fn get(&self, key: &str) -> Option<String> {
        self.entries().get(key).cloned()
    }

    fn set(&self, key: &str, value: &str) {
        let mut entries = self.entries();
        entries.insert(key.to_string(), value.to_string());
        self.flush(&entries);
    }

    fn remove(&self, key: &str) {
        let mut entries = self.entries();
        if entries.remove(key).is_some() {
            self.flush(&entries);
        }
    }
}

/// Holder of the current session, kept in lockstep with its persisted copy.
pub struct SessionStore {
    backend: Box<dyn SessionBackend>,
    current: Mutex<Session>,
}

impl SessionStore {
    /// Create a store, restoring any session the backend already holds.
    pub fn new(backend: Box<dyn SessionBackend>) -> Self {
        let restored = Self::read(backend.as_ref());
        Self {
            backend,
            current: Mutex::new(restored),
        }
    }

    /// In-memory store with no durable state, mostly for tests.
    pub fn in_memory() -> Self {
        Self::new(Box::new(MemorySessionBackend::new()))
    }

    fn read(backend: &dyn SessionBackend) -> Session {
        let user = backend.get(USER_KEY).and_then(|raw| {
            match serde_json::from_str::<UserProfile>(&raw) {
                Ok(profile) => Some(profile),
                Err(err) => {
                    // Unreadable profile is not fatal - the tokens still count.
                    warn!(error = %err, "Stored user profile unreadable, treating as absent");
                    None
                }
            }
        });
        Session {
            token: backend.get(TOKEN_KEY),
            refresh_token: backend.get(REFRESH_TOKEN_KEY),
            user,
        }
    }

    /// Replace the whole session. The only mutator: each field is persisted or
    /// cleared based on presence, then the in-memory snapshot is swapped in
    /// one piece.
    pub fn set(&self, next: Session) {
        match &next.token {
            Some(token) => self.backend.set(TOKEN_KEY, token),
            None => self.backend.remove(TOKEN_KEY),
        }
        match &next.refresh_token {
            Some(refresh) => self.backend.set(REFRESH_TOKEN_KEY, refresh),
            None => self.backend.remove(REFRESH_TOKEN_KEY),
        }
        match serialize_user(next.user.as_ref()) {
            Some(raw) => self.backend.set(USER_KEY, &raw),
            None => self.backend.remove(USER_KEY),
        }

        let mut current = self.lock();
        *current = next;
    }

    /// Drop all session state, in memory and persisted.
    pub fn clear(&self) {
        self.set(Session::default());
    }

    /// Clear, reporting whether there was anything to clear.
    /// Lets callers fire "session ended" signals exactly once.
    pub(crate) fn clear_if_present(&self) -> bool {
        let had_state = !self.lock().is_empty();
        if had_state {
            debug!("Clearing session state");
            self.clear();
        }
        had_state
    }

    /// Current snapshot.
    pub fn snapshot(&self) -> Session {
        self.lock().clone()
    }

    /// The stored bearer token, regardless of expiry. The pipeline sends even
    /// an expired token - the server is the authority on rejection.
    pub fn token(&self) -> Option<String> {
        self.lock().token.clone()
    }

    /// The stored refresh token, if any.
    pub fn refresh_token(&self) -> Option<String> {
        self.lock().refresh_token.clone()
    }

    /// Whether the stored token is present and unexpired.
    pub fn is_authenticated(&self) -> bool {
        token::is_valid(self.lock().token.as_deref())
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Session> {
        self.current.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn serialize_user(user: Option<&UserProfile>) -> Option<String> {
    let user = user?;
    match serde_json::to_string(user) {
        Ok(raw) => Some(raw),
        Err(err) => {
            warn!(error = %err, "Failed to serialize user profile");
            None
        }
    }
}

/// Build a profile out of a raw response payload, tolerating shapes that are
/// not objects by yielding no profile.
pub fn profile_from_value(value: &Value) -> Option<UserProfile> {
    serde_json::from_value(value.clone()).ok()
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::auth::token::token_expiring_in;

    struct SharedBackend(Arc<MemorySessionBackend>);

    impl SessionBackend for SharedBackend {
        fn get(&self, key: &str) -> Option<String> {
            self.0.get(key)
        }
        fn set(&self, key: &str, value: &str) {
            self.0.set(key, value);
        }
        fn remove(&self, key: &str) {
            self.0.remove(key);
        }
    }

    fn store_over(backend: &Arc<MemorySessionBackend>) -> SessionStore {
        SessionStore::new(Box::new(SharedBackend(backend.clone())))
    }

    fn profile(username: &str) -> UserProfile {
        UserProfile {
            username: Some(username.to_string()),
            ..UserProfile::default()
        }
    }

    #[test]
    fn test_set_persists_all_fields() {
        let backend = Arc::new(MemorySessionBackend::new());
        let store = store_over(&backend);

        store.set(Session {
            token: Some("tok".into()),
            refresh_token: Some("ref".into()),
            user: Some(profile("ada")),
        });

        assert_eq!(backend.get(TOKEN_KEY).as_deref(), Some("tok"));
        assert_eq!(backend.get(REFRESH_TOKEN_KEY).as_deref(), Some("ref"));
        assert!(backend.get(USER_KEY).is_some());
        assert_eq!(store.token().as_deref(), Some("tok"));
    }

    #[test]
    fn test_restore_from_backend() {
        let backend = Arc::new(MemorySessionBackend::new());
        store_over(&backend).set(Session {
            token: Some("tok".into()),
            refresh_token: Some("ref".into()),
            user: Some(profile("ada")),
        });

        let restored = store_over(&backend);
        let snapshot = restored.snapshot();
        assert_eq!(snapshot.token.as_deref(), Some("tok"));
        assert_eq!(snapshot.refresh_token.as_deref(), Some("ref"));
        assert_eq!(
            snapshot.user.and_then(|u| u.username).as_deref(),
            Some("ada")
        );
    }

    #[test]
    fn test_corrupt_profile_restores_as_absent() {
        let backend = Arc::new(MemorySessionBackend::new());
        backend.set(TOKEN_KEY, "tok");
        backend.set(USER_KEY, "{not json");

        let store = store_over(&backend);
        let snapshot = store.snapshot();
        assert_eq!(snapshot.token.as_deref(), Some("tok"));
        assert!(snapshot.user.is_none());
    }

    #[test]
    fn test_clear_removes_everything() {
        let backend = Arc::new(MemorySessionBackend::new());
        let store = store_over(&backend);
        store.set(Session {
            token: Some("tok".into()),
            refresh_token: Some("ref".into()),
            user: Some(profile("ada")),
        });

        store.clear();

        assert!(backend.get(TOKEN_KEY).is_none());
        assert!(backend.get(REFRESH_TOKEN_KEY).is_none());
        assert!(backend.get(USER_KEY).is_none());
        assert!(!store.snapshot().is_authenticated());
    }

    #[test]
    fn test_clear_if_present_reports_once() {
        let store = SessionStore::in_memory();
        store.set(Session {
            token: Some("tok".into()),
            ..Session::default()
        });

        assert!(store.clear_if_present());
        assert!(!store.clear_if_present());
    }

    #[test]
    fn test_file_backend_round_trip() {
        let path = std::env::temp_dir().join(format!(
            "laf-client-session-test-{}.json",
            std::process::id()
        ));
        let _ = std::fs::remove_file(&path);

        {
            let store = SessionStore::new(Box::new(FileSessionBackend::open(path.clone())));
            store.set(Session {
                token: Some("tok".into()),
                refresh_token: Some("ref".into()),
                user: Some(profile("ada")),
            });
        }

        let reopened = SessionStore::new(Box::new(FileSessionBackend::open(path.clone())));
        assert_eq!(reopened.token().as_deref(), Some("tok"));
        assert_eq!(reopened.refresh_token().as_deref(), Some("ref"));

        reopened.clear();
        let emptied = SessionStore::new(Box::new(FileSessionBackend::open(path.clone())));
        assert!(emptied.token().is_none());

        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn test_file_backend_tolerates_corrupt_file() {
        let path = std::env::temp_dir().join(format!(
            "laf-client-session-corrupt-{}.json",
            std::process::id()
        ));
        std::fs::write(&path, "{definitely not json").unwrap();

        let backend = FileSessionBackend::open(path.clone());
        assert!(backend.get(TOKEN_KEY).is_none());

        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn test_is_authenticated_requires_valid_token() {
        let store = SessionStore::in_memory();
        assert!(!store.is_authenticated());

        store.set(Session {
            token: Some(token_expiring_in(3600)),
            ..Session::default()
        });
        assert!(store.is_authenticated());

        store.set(Session {
            token: Some(token_expiring_in(-60)),
            ..Session::default()
        });
        // Expired token: not authenticated, but still readable for renewal.
        assert!(!store.is_authenticated());
        assert!(store.token().is_some());
    }
}
