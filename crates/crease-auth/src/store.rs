//! Key-value backends for persisted tokens
//!
//! `TokenStore` is the injected storage capability: three async, fallible
//! operations over string keys. Two backends ship with the crate:
//!
//! - `FileTokenStore`: a JSON object on disk, written atomically (temp file +
//!   rename) with 0600 permissions. A tokio Mutex serializes writes.
//! - `MemoryTokenStore`: process-local map. Tokens are lost on restart.
//!
//! Which backend a client uses is decided once, at construction.

use std::collections::HashMap;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::pin::Pin;

use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::error::{Error, Result};

/// Boxed future returned by `TokenStore` methods.
pub type StoreFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T>> + Send + 'a>>;

/// Persistent key-value storage for tokens.
///
/// Uses `Pin<Box<dyn Future>>` return types so clients can hold an
/// `Arc<dyn TokenStore>`.
pub trait TokenStore: Send + Sync {
    /// Read a value. `Ok(None)` means the key was never written or was removed.
    fn get<'a>(&'a self, key: &'a str) -> StoreFuture<'a, Option<String>>;

    /// Write a value, replacing any previous one.
    fn set<'a>(&'a self, key: &'a str, value: &'a str) -> StoreFuture<'a, ()>;

    /// Delete a value. Removing a missing key is not an error.
    fn remove<'a>(&'a self, key: &'a str) -> StoreFuture<'a, ()>;
}

/// Process-local store. Nothing survives a restart.
#[derive(Default)]
pub struct MemoryTokenStore {
    state: Mutex<HashMap<String, String>>,
}

impl MemoryTokenStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl TokenStore for MemoryTokenStore {
    fn get<'a>(&'a self, key: &'a str) -> StoreFuture<'a, Option<String>> {
        Box::pin(async move { Ok(self.state.lock().await.get(key).cloned()) })
    }

    fn set<'a>(&'a self, key: &'a str, value: &'a str) -> StoreFuture<'a, ()> {
        Box::pin(async move {
            self.state
                .lock()
                .await
                .insert(key.to_owned(), value.to_owned());
            Ok(())
        })
    }

    fn remove<'a>(&'a self, key: &'a str) -> StoreFuture<'a, ()> {
        Box::pin(async move {
            self.state.lock().await.remove(key);
            Ok(())
        })
    }
}

/// JSON file store.
///
/// Reads are served from the in-memory copy; every mutation rewrites the file
/// while holding the lock, so the file always matches a state some caller saw.
pub struct FileTokenStore {
    path: PathBuf,
    state: Mutex<HashMap<String, String>>,
}

impl FileTokenStore {
    /// Load tokens from `path`.
    ///
    /// A missing file is a cold start: the store begins empty and creates the
    /// file as `{}` so later loads take the normal path.
    pub async fn load(path: PathBuf) -> Result<Self> {
        let state = if path.exists() {
            let contents = tokio::fs::read_to_string(&path)
                .await
                .map_err(|e| Error::Io(format!("reading token file: {e}")))?;
            let tokens: HashMap<String, String> = serde_json::from_str(&contents)
                .map_err(|e| Error::Parse(format!("parsing token file: {e}")))?;
            info!(path = %path.display(), keys = tokens.len(), "loaded token file");
            tokens
        } else {
            info!(path = %path.display(), "token file not found, starting with empty store");
            let tokens = HashMap::new();
            write_atomic(&path, &tokens).await?;
            tokens
        };

        Ok(Self {
            path,
            state: Mutex::new(state),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl TokenStore for FileTokenStore {
    fn get<'a>(&'a self, key: &'a str) -> StoreFuture<'a, Option<String>> {
        Box::pin(async move { Ok(self.state.lock().await.get(key).cloned()) })
    }

    fn set<'a>(&'a self, key: &'a str, value: &'a str) -> StoreFuture<'a, ()> {
        Box::pin(async move {
            let mut state = self.state.lock().await;
            state.insert(key.to_owned(), value.to_owned());
            debug!(key, "stored token");
            write_atomic(&self.path, &state).await
        })
    }

    fn remove<'a>(&'a self, key: &'a str) -> StoreFuture<'a, ()> {
        Box::pin(async move {
            let mut state = self.state.lock().await;
            if state.remove(key).is_some() {
                debug!(key, "removed token");
                write_atomic(&self.path, &state).await?;
            }
            Ok(())
        })
    }
}

/// Write the token map to `path` atomically with owner-only permissions.
async fn write_atomic(path: &Path, data: &HashMap<String, String>) -> Result<()> {
    let json = serde_json::to_string_pretty(data)
        .map_err(|e| Error::Parse(format!("serializing tokens: {e}")))?;

    let dir = path
        .parent()
        .ok_or_else(|| Error::Io("token path has no parent directory".into()))?;

    let file_name = path
        .file_name()
        .ok_or_else(|| Error::Io("token path has no file name".into()))?;
    let tmp_path = dir.join(format!(
        ".{}.tmp.{}",
        file_name.to_string_lossy(),
        std::process::id()
    ));

    tokio::fs::write(&tmp_path, json.as_bytes())
        .await
        .map_err(|e| Error::Io(format!("writing temp token file: {e}")))?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let perms = std::fs::Permissions::from_mode(0o600);
        tokio::fs::set_permissions(&tmp_path, perms)
            .await
            .map_err(|e| Error::Io(format!("setting token file permissions: {e}")))?;
    }

    tokio::fs::rename(&tmp_path, path)
        .await
        .map_err(|e| Error::Io(format!("renaming temp token file: {e}")))?;

    debug!(path = %path.display(), "persisted tokens");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[tokio::test]
    async fn memory_store_set_get_remove() {
        let store = MemoryTokenStore::new();
        assert_eq!(store.get("accessToken").await.unwrap(), None);

        store.set("accessToken", "at_1").await.unwrap();
        assert_eq!(store.get("accessToken").await.unwrap().as_deref(), Some("at_1"));

        store.remove("accessToken").await.unwrap();
        assert_eq!(store.get("accessToken").await.unwrap(), None);

        // removing again is fine
        store.remove("accessToken").await.unwrap();
    }

    #[tokio::test]
    async fn file_store_survives_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tokens.json");

        let store = FileTokenStore::load(path.clone()).await.unwrap();
        store.set("accessToken", "at_1").await.unwrap();
        store.set("refreshToken", "rt_1").await.unwrap();

        let reloaded = FileTokenStore::load(path).await.unwrap();
        assert_eq!(reloaded.get("accessToken").await.unwrap().as_deref(), Some("at_1"));
        assert_eq!(reloaded.get("refreshToken").await.unwrap().as_deref(), Some("rt_1"));
    }

    #[tokio::test]
    async fn cold_start_creates_empty_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tokens.json");

        assert!(!path.exists());
        let store = FileTokenStore::load(path.clone()).await.unwrap();
        assert!(path.exists());
        assert_eq!(store.path(), path.as_path());

        let contents = tokio::fs::read_to_string(&path).await.unwrap();
        let parsed: HashMap<String, String> = serde_json::from_str(&contents).unwrap();
        assert!(parsed.is_empty());
    }

    #[tokio::test]
    async fn removed_key_is_gone_after_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tokens.json");

        let store = FileTokenStore::load(path.clone()).await.unwrap();
        store.set("accessToken", "at_1").await.unwrap();
        store.remove("accessToken").await.unwrap();

        let reloaded = FileTokenStore::load(path).await.unwrap();
        assert_eq!(reloaded.get("accessToken").await.unwrap(), None);
    }

    #[tokio::test]
    async fn corrupt_file_is_a_parse_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tokens.json");
        tokio::fs::write(&path, "{not json").await.unwrap();

        let result = FileTokenStore::load(path).await;
        assert!(matches!(result, Err(Error::Parse(_))));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn file_permissions_are_0600() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tokens.json");

        let store = FileTokenStore::load(path.clone()).await.unwrap();
        store.set("accessToken", "at_1").await.unwrap();

        let metadata = tokio::fs::metadata(&path).await.unwrap();
        let mode = metadata.permissions().mode() & 0o777;
        assert_eq!(mode, 0o600, "token file must be 0600, got {mode:o}");
    }

    #[tokio::test]
    async fn concurrent_writes_dont_corrupt() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tokens.json");
        let store = Arc::new(FileTokenStore::load(path.clone()).await.unwrap());

        let mut handles = vec![];
        for i in 0..10 {
            let store = store.clone();
            handles.push(tokio::spawn(async move {
                let key = format!("key-{i}");
                store.set(&key, &format!("value-{i}")).await.unwrap();
            }));
        }
        for h in handles {
            h.await.unwrap();
        }

        let contents = tokio::fs::read_to_string(&path).await.unwrap();
        let parsed: HashMap<String, String> = serde_json::from_str(&contents).unwrap();
        assert_eq!(parsed.len(), 10);
    }

    #[tokio::test]
    async fn stores_sharing_a_directory_keep_their_own_files() {
        let dir = tempfile::tempdir().unwrap();
        let staff = Arc::new(FileTokenStore::load(dir.path().join("staff.json")).await.unwrap());
        let parent = Arc::new(FileTokenStore::load(dir.path().join("parent.json")).await.unwrap());

        let mut handles = vec![];
        for i in 0..10 {
            let staff = staff.clone();
            let parent = parent.clone();
            handles.push(tokio::spawn(async move {
                staff.set(&format!("staff-{i}"), "s").await.unwrap();
            }));
            handles.push(tokio::spawn(async move {
                parent.set(&format!("parent-{i}"), "p").await.unwrap();
            }));
        }
        for h in handles {
            h.await.unwrap();
        }

        for (name, prefix) in [("staff.json", "staff-"), ("parent.json", "parent-")] {
            let contents = tokio::fs::read_to_string(dir.path().join(name)).await.unwrap();
            let parsed: HashMap<String, String> = serde_json::from_str(&contents).unwrap();
            assert_eq!(parsed.len(), 10, "{name}");
            assert!(parsed.keys().all(|k| k.starts_with(prefix)), "{name}");
        }

        let mut leftovers = tokio::fs::read_dir(dir.path()).await.unwrap();
        while let Some(entry) = leftovers.next_entry().await.unwrap() {
            let name = entry.file_name();
            assert!(!name.to_string_lossy().contains(".tmp."), "{name:?}");
        }
    }
}
