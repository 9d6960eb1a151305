//! Credential storage for the console session
//!
//! Holds exactly one credential pair (or none). The pair is always replaced
//! or dropped as a whole; there is no way to touch one half of it. A tokio
//! Mutex guards the in-memory copy, and `set`/`clear` update memory and
//! persist under the same guard, so the next `get` from any task sees the
//! new state.
//!
//! File-backed stores write atomically (temp file + rename) and keep the
//! file at 0600.

use std::path::{Path, PathBuf};

use common::Secret;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::error::{Error, Result};

/// Access and renewal credentials, both opaque bearer strings.
///
/// Field names on the wire match the remote service (`accessToken`,
/// `refreshToken`). Debug output is redacted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CredentialPair {
    /// Sent as `Authorization: Bearer <access>` on every call
    #[serde(rename = "accessToken")]
    pub access: Secret<String>,
    /// Traded for a rotated pair at the renewal endpoint
    #[serde(rename = "refreshToken")]
    pub renewal: Secret<String>,
}

impl CredentialPair {
    pub fn new(access: impl Into<String>, renewal: impl Into<String>) -> Self {
        Self {
            access: Secret::new(access.into()),
            renewal: Secret::new(renewal.into()),
        }
    }
}

/// On-disk layout of the credential file.
#[derive(Debug, Default, Serialize, Deserialize)]
struct StoredSession {
    credentials: Option<CredentialPair>,
}

/// Single source of truth for the current credential pair.
pub struct CredentialStore {
    path: Option<PathBuf>,
    state: Mutex<Option<CredentialPair>>,
}

impl CredentialStore {
    /// Load the credential pair from the given file path.
    ///
    /// If the file doesn't exist, creates it with no credentials (cold
    /// start, unauthenticated).
    pub async fn load(path: PathBuf) -> Result<Self> {
        let state = if path.exists() {
            let contents = tokio::fs::read_to_string(&path)
                .await
                .map_err(|e| Error::Io(format!("reading credential file: {e}")))?;
            let stored: StoredSession = serde_json::from_str(&contents)
                .map_err(|e| Error::CredentialParse(format!("parsing credential file: {e}")))?;
            info!(
                path = %path.display(),
                authenticated = stored.credentials.is_some(),
                "loaded credentials"
            );
            stored.credentials
        } else {
            info!(path = %path.display(), "credential file not found, starting unauthenticated");
            write_atomic(&path, &StoredSession::default()).await?;
            None
        };

        Ok(Self {
            path: Some(path),
            state: Mutex::new(state),
        })
    }

    /// A store that never touches disk.
    pub fn in_memory(initial: Option<CredentialPair>) -> Self {
        Self {
            path: None,
            state: Mutex::new(initial),
        }
    }

    /// Current pair, or None when unauthenticated.
    pub async fn get(&self) -> Option<CredentialPair> {
        self.state.lock().await.clone()
    }

    /// Replace both credentials and persist.
    ///
    /// The in-memory pair is replaced before the write, so a failed write
    /// still leaves the running process on the new pair.
    pub async fn set(&self, pair: CredentialPair) -> Result<()> {
        let mut state = self.state.lock().await;
        *state = Some(pair);
        debug!("stored credential pair");
        self.persist(&state).await
    }

    /// Drop both credentials and persist.
    pub async fn clear(&self) -> Result<()> {
        let mut state = self.state.lock().await;
        *state = None;
        debug!("cleared credential pair");
        self.persist(&state).await
    }

    /// Whether a pair is currently held.
    pub async fn is_authenticated(&self) -> bool {
        self.state.lock().await.is_some()
    }

    /// Backing file, if any.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    async fn persist(&self, state: &Option<CredentialPair>) -> Result<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        let stored = StoredSession {
            credentials: state.clone(),
        };
        write_atomic(path, &stored).await
    }
}

/// Write the session file atomically.
///
/// Writes to a temporary file in the same directory, then renames it over
/// the target. Sets 0600 permissions since the file holds bearer tokens.
async fn write_atomic(path: &Path, data: &StoredSession) -> Result<()> {
    let json = serde_json::to_string_pretty(data)
        .map_err(|e| Error::CredentialParse(format!("serializing credentials: {e}")))?;

    let dir = path
        .parent()
        .ok_or_else(|| Error::Io("credential path has no parent directory".into()))?;

    let tmp_path = dir.join(format!(".session.tmp.{}", std::process::id()));

    tokio::fs::write(&tmp_path, json.as_bytes())
        .await
        .map_err(|e| Error::Io(format!("writing temp credential file: {e}")))?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let perms = std::fs::Permissions::from_mode(0o600);
        tokio::fs::set_permissions(&tmp_path, perms)
            .await
            .map_err(|e| Error::Io(format!("setting credential file permissions: {e}")))?;
    }

    tokio::fs::rename(&tmp_path, path)
        .await
        .map_err(|e| Error::Io(format!("renaming temp credential file: {e}")))?;

    debug!(path = %path.display(), "persisted credentials");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn roundtrip_set_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session.json");

        let store = CredentialStore::load(path.clone()).await.unwrap();
        store.set(CredentialPair::new("tok1", "rt1")).await.unwrap();

        let reloaded = CredentialStore::load(path).await.unwrap();
        let pair = reloaded.get().await.unwrap();
        assert_eq!(pair.access.expose(), "tok1");
        assert_eq!(pair.renewal.expose(), "rt1");
    }

    #[tokio::test]
    async fn cold_start_creates_unauthenticated_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session.json");

        assert!(!path.exists());
        let store = CredentialStore::load(path.clone()).await.unwrap();
        assert!(!store.is_authenticated().await);
        assert!(path.exists());

        let contents = tokio::fs::read_to_string(&path).await.unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&contents).unwrap();
        assert!(parsed["credentials"].is_null());
    }

    #[tokio::test]
    async fn file_uses_remote_field_names() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session.json");

        let store = CredentialStore::load(path.clone()).await.unwrap();
        store.set(CredentialPair::new("tok1", "rt1")).await.unwrap();

        let contents = tokio::fs::read_to_string(&path).await.unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&contents).unwrap();
        assert_eq!(parsed["credentials"]["accessToken"], "tok1");
        assert_eq!(parsed["credentials"]["refreshToken"], "rt1");
    }

    #[tokio::test]
    async fn clear_drops_both_halves_and_persists() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session.json");

        let store = CredentialStore::load(path.clone()).await.unwrap();
        store.set(CredentialPair::new("tok1", "rt1")).await.unwrap();
        store.clear().await.unwrap();
        assert!(store.get().await.is_none());

        let reloaded = CredentialStore::load(path).await.unwrap();
        assert!(reloaded.get().await.is_none());
    }

    #[tokio::test]
    async fn set_is_visible_to_next_get() {
        let store = CredentialStore::in_memory(Some(CredentialPair::new("tok1", "rt1")));
        store.set(CredentialPair::new("tok2", "rt2")).await.unwrap();

        let pair = store.get().await.unwrap();
        assert_eq!(pair.access.expose(), "tok2");
        assert_eq!(pair.renewal.expose(), "rt2");
    }

    #[tokio::test]
    async fn in_memory_store_has_no_path() {
        let store = CredentialStore::in_memory(None);
        assert!(store.path().is_none());
        store.set(CredentialPair::new("a", "b")).await.unwrap();
        assert!(store.is_authenticated().await);
    }

    #[tokio::test]
    async fn corrupt_file_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session.json");
        tokio::fs::write(&path, "{ not json").await.unwrap();

        let result = CredentialStore::load(path).await;
        assert!(matches!(result, Err(Error::CredentialParse(_))));
    }

    #[test]
    fn debug_output_is_redacted() {
        let pair = CredentialPair::new("tok-secret", "rt-secret");
        let debug = format!("{pair:?}");
        assert!(!debug.contains("tok-secret"), "got: {debug}");
        assert!(!debug.contains("rt-secret"), "got: {debug}");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn file_permissions_are_0600() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session.json");

        let store = CredentialStore::load(path.clone()).await.unwrap();
        store.set(CredentialPair::new("tok1", "rt1")).await.unwrap();

        let metadata = tokio::fs::metadata(&path).await.unwrap();
        let mode = metadata.permissions().mode() & 0o777;
        assert_eq!(mode, 0o600, "credential file must be 0600, got {mode:o}");
    }

    #[tokio::test]
    async fn concurrent_sets_leave_a_whole_pair() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session.json");
        let store = std::sync::Arc::new(CredentialStore::load(path.clone()).await.unwrap());

        let mut handles = vec![];
        for i in 0..10 {
            let store = store.clone();
            handles.push(tokio::spawn(async move {
                store
                    .set(CredentialPair::new(format!("tok{i}"), format!("rt{i}")))
                    .await
                    .unwrap();
            }));
        }
        for h in handles {
            h.await.unwrap();
        }

        // Whichever write won, both halves must come from the same set()
        let pair = store.get().await.unwrap();
        let suffix = pair.access.expose().trim_start_matches("tok").to_string();
        assert_eq!(pair.renewal.expose(), &format!("rt{suffix}"));

        let contents = tokio::fs::read_to_string(&path).await.unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&contents).unwrap();
        assert_eq!(parsed["credentials"]["accessToken"], pair.access.expose().as_str());
    }
}
