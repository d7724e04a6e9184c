//! 键值存储
//!
//! 宿主持久化层的抽象：字符串键 → 字符串值。
//! - `MemoryKvStore`：内存实现（测试、或宿主自带持久化）
//! - `FileKvStore`：单个 JSON 文件，写临时文件后 rename 原子替换

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;
use tokio::sync::{Mutex, RwLock};
use tracing::debug;

use crate::error::{WalletError, WalletResult};

#[async_trait]
pub trait KeyValueStore: Send + Sync {
    async fn get(&self, key: &str) -> WalletResult<Option<String>>;

    /// 整体替换 `key` 的值
    async fn set(&self, key: &str, value: String) -> WalletResult<()>;

    async fn remove(&self, key: &str) -> WalletResult<()>;
}

/// 内存存储
#[derive(Debug, Default)]
pub struct MemoryKvStore {
    entries: RwLock<HashMap<String, String>>,
}

impl MemoryKvStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl KeyValueStore for MemoryKvStore {
    async fn get(&self, key: &str) -> WalletResult<Option<String>> {
        Ok(self.entries.read().await.get(key).cloned())
    }

    async fn set(&self, key: &str, value: String) -> WalletResult<()> {
        self.entries.write().await.insert(key.to_string(), value);
        Ok(())
    }

    async fn remove(&self, key: &str) -> WalletResult<()> {
        self.entries.write().await.remove(key);
        Ok(())
    }
}

/// JSON 文件存储
///
/// 文件内容为 `{ key: value }`。Unix 上权限为 0o600。
#[derive(Debug)]
pub struct FileKvStore {
    path: PathBuf,
    // 串行化读-改-写
    lock: Mutex<()>,
}

impl FileKvStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn read_all(&self) -> WalletResult<HashMap<String, String>> {
        match tokio::fs::read_to_string(&self.path).await {
            Ok(contents) if contents.trim().is_empty() => Ok(HashMap::new()),
            Ok(contents) => serde_json::from_str(&contents).map_err(|e| {
                WalletError::Storage(format!(
                    "corrupted store file {}: {}",
                    self.path.display(),
                    e
                ))
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(HashMap::new()),
            Err(e) => Err(e.into()),
        }
    }

    async fn write_all(&self, entries: &HashMap<String, String>) -> WalletResult<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }

        let json = serde_json::to_string_pretty(entries)?;
        let tmp = self.path.with_extension("tmp");

        if let Err(e) = Self::replace_with(&tmp, &self.path, json.as_bytes()).await {
            // 失败时不留下临时文件
            let _ = tokio::fs::remove_file(&tmp).await;
            return Err(e.into());
        }

        debug!(path = %self.path.display(), entries = entries.len(), "kv store written");
        Ok(())
    }

    // 临时文件创建时即为 0o600（Unix），写入落盘后 rename 覆盖目标
    async fn replace_with(tmp: &Path, target: &Path, contents: &[u8]) -> std::io::Result<()> {
        // 残留的临时文件可能权限过宽，重新创建
        match tokio::fs::remove_file(tmp).await {
            Err(e) if e.kind() != std::io::ErrorKind::NotFound => return Err(e),
            _ => {}
        }

        let mut options = tokio::fs::OpenOptions::new();
        options.write(true).create_new(true);
        #[cfg(unix)]
        options.mode(0o600);

        let mut file = options.open(tmp).await?;
        file.write_all(contents).await?;
        file.sync_all().await?;
        drop(file);

        tokio::fs::rename(tmp, target).await
    }
}

#[async_trait]
impl KeyValueStore for FileKvStore {
    async fn get(&self, key: &str) -> WalletResult<Option<String>> {
        let _guard = self.lock.lock().await;
        Ok(self.read_all().await?.remove(key))
    }

    async fn set(&self, key: &str, value: String) -> WalletResult<()> {
        let _guard = self.lock.lock().await;
        let mut entries = self.read_all().await?;
        entries.insert(key.to_string(), value);
        self.write_all(&entries).await
    }

    async fn remove(&self, key: &str) -> WalletResult<()> {
        let _guard = self.lock.lock().await;
        let mut entries = self.read_all().await?;
        if entries.remove(key).is_some() {
            self.write_all(&entries).await?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_memory_store_basic() {
        let store = MemoryKvStore::new();
        assert_eq!(store.get("k").await.unwrap(), None);

        store.set("k", "v1".to_string()).await.unwrap();
        store.set("k", "v2".to_string()).await.unwrap();
        assert_eq!(store.get("k").await.unwrap().as_deref(), Some("v2"));

        store.remove("k").await.unwrap();
        assert_eq!(store.get("k").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_file_store_missing_file_is_empty() {
        let dir = TempDir::new().unwrap();
        let store = FileKvStore::new(dir.path().join("store.json"));
        assert_eq!(store.get("wallet").await.unwrap(), None);
        // 删除不存在的键不创建文件
        store.remove("wallet").await.unwrap();
        assert!(!store.path().exists());
    }

    #[tokio::test]
    async fn test_file_store_persists_across_instances() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("store.json");

        let store = FileKvStore::new(&path);
        store.set("a", "1".to_string()).await.unwrap();
        store.set("b", "2".to_string()).await.unwrap();

        let reopened = FileKvStore::new(&path);
        assert_eq!(reopened.get("a").await.unwrap().as_deref(), Some("1"));
        assert_eq!(reopened.get("b").await.unwrap().as_deref(), Some("2"));

        reopened.remove("a").await.unwrap();
        assert_eq!(store.get("a").await.unwrap(), None);
        assert!(!path.with_extension("tmp").exists());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_file_store_owner_only_permissions() {
        use std::os::unix::fs::PermissionsExt;

        let dir = TempDir::new().unwrap();
        let store = FileKvStore::new(dir.path().join("store.json"));
        store.set("k", "v".to_string()).await.unwrap();

        let mode = std::fs::metadata(store.path()).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_file_store_replaces_stale_temp_file() {
        use std::os::unix::fs::PermissionsExt;

        let dir = TempDir::new().unwrap();
        let path = dir.path().join("store.json");
        let tmp = path.with_extension("tmp");
        std::fs::write(&tmp, "stale").unwrap();
        std::fs::set_permissions(&tmp, std::fs::Permissions::from_mode(0o644)).unwrap();

        let store = FileKvStore::new(&path);
        store.set("k", "v".to_string()).await.unwrap();

        let mode = std::fs::metadata(&path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
        assert!(!tmp.exists());
        assert_eq!(store.get("k").await.unwrap().as_deref(), Some("v"));
    }

    #[tokio::test]
    async fn test_failed_write_removes_temp_file() {
        let dir = TempDir::new().unwrap();
        // 目标是非空目录，rename 必然失败
        let target = dir.path().join("store.json");
        std::fs::create_dir(&target).unwrap();
        std::fs::write(target.join("occupied"), "x").unwrap();

        let store = FileKvStore::new(&target);
        let mut entries = HashMap::new();
        entries.insert("k".to_string(), "v".to_string());

        assert!(matches!(
            store.write_all(&entries).await,
            Err(WalletError::Storage(_))
        ));
        assert!(!target.with_extension("tmp").exists());
    }

    #[tokio::test]
    async fn test_file_store_corrupted_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("store.json");
        std::fs::write(&path, "not json").unwrap();

        let store = FileKvStore::new(&path);
        assert!(matches!(
            store.get("k").await,
            Err(WalletError::Storage(_))
        ));
    }
}
