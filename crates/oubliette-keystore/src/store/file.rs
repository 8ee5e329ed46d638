//! File-backed item store.
//!
//! Each item is one JSON file named by the SHA-256 of its service and
//! alias, so arbitrary names never reach the filesystem. Files are created
//! with mode `0600` inside a `0700` directory.

use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

use base64::Engine;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::{debug, warn};
use zeroize::Zeroizing;

use super::{SecureItemStore, StoreCapabilities, StoreStatus};
use crate::query::{attr, ItemQuery};

/// On-disk representation of an item.
#[derive(Serialize, Deserialize)]
struct StoredItem {
    service: Option<String>,
    account: String,
    accessible: Option<String>,
    #[serde(default)]
    data_protection: bool,
    /// Stored value, base64-encoded.
    value: Zeroizing<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

/// A [`SecureItemStore`] persisting items as files under a directory.
///
/// Intended for hosts without a platform keychain. Values are stored as
/// given; hardware protection is what keeps them confidential at rest.
pub struct FileItemStore {
    base_dir: PathBuf,
}

impl FileItemStore {
    /// Open (creating if needed) a store rooted at `base_dir`.
    pub fn open(base_dir: impl Into<PathBuf>) -> std::io::Result<Self> {
        let base_dir = base_dir.into();
        std::fs::create_dir_all(&base_dir)?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(&base_dir, std::fs::Permissions::from_mode(0o700))?;
        }

        Ok(Self { base_dir })
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    fn item_path(&self, service: Option<&str>, account: &str) -> PathBuf {
        let mut hasher = Sha256::new();
        match service {
            Some(service) => {
                hasher.update(b"s:");
                hasher.update(service.as_bytes());
            }
            None => hasher.update(b"-"),
        }
        hasher.update([0u8]);
        hasher.update(account.as_bytes());
        self.base_dir
            .join(format!("{}.json", hex::encode(hasher.finalize())))
    }

    fn path_for(&self, query: &ItemQuery) -> Result<PathBuf, StoreStatus> {
        let account = query.account().ok_or(StoreStatus::PARAM)?;
        Ok(self.item_path(query.service(), account))
    }

    fn load(path: &Path) -> Result<StoredItem, StoreStatus> {
        let data = Zeroizing::new(std::fs::read(path)?);
        serde_json::from_slice(&data).map_err(|e| {
            warn!(path = %path.display(), error = %e, "unreadable item file");
            StoreStatus::DECODE
        })
    }

    fn decode_value(item: &StoredItem) -> Result<Vec<u8>, StoreStatus> {
        base64::engine::general_purpose::STANDARD
            .decode(item.value.as_bytes())
            .map_err(|_| StoreStatus::DECODE)
    }

    fn encode(item: &StoredItem) -> Result<Zeroizing<Vec<u8>>, StoreStatus> {
        serde_json::to_vec_pretty(item)
            .map(Zeroizing::new)
            .map_err(|_| StoreStatus::DECODE)
    }
}

/// Write `data` to a new file at `path` with mode 0600 on Unix.
fn create_item_file(path: &Path, data: &[u8]) -> std::io::Result<()> {
    let mut options = OpenOptions::new();
    options.write(true).create_new(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o600);
    }
    let mut file = options.open(path)?;
    file.write_all(data)?;
    file.sync_all()
}

/// Replace the file at `path` atomically.
fn replace_item_file(path: &Path, data: &[u8]) -> std::io::Result<()> {
    let tmp = path.with_extension("json.tmp");
    // A stale temp file from an interrupted write would block create_new.
    match std::fs::remove_file(&tmp) {
        Ok(()) => {}
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => return Err(e),
    }
    create_item_file(&tmp, data)?;
    std::fs::rename(&tmp, path)
}

impl SecureItemStore for FileItemStore {
    fn capabilities(&self) -> StoreCapabilities {
        StoreCapabilities {
            accessibility: true,
            ..StoreCapabilities::default()
        }
    }

    fn add(&self, query: &ItemQuery, value: &[u8]) -> Result<(), StoreStatus> {
        let path = self.path_for(query)?;
        let now = Utc::now();
        let item = StoredItem {
            service: query.service().map(str::to_string),
            account: query.account().unwrap_or_default().to_string(),
            accessible: query.get_str(attr::ACCESSIBLE).map(str::to_string),
            data_protection: query.get_bool(attr::USE_DATA_PROTECTION),
            value: Zeroizing::new(base64::engine::general_purpose::STANDARD.encode(value)),
            created_at: now,
            updated_at: now,
        };
        let json = Self::encode(&item)?;
        debug!(path = %path.display(), "writing item");
        create_item_file(&path, &json)?;
        Ok(())
    }

    fn update(&self, query: &ItemQuery, value: &[u8]) -> Result<(), StoreStatus> {
        let path = self.path_for(query)?;
        let mut item = Self::load(&path)?;
        item.value = Zeroizing::new(base64::engine::general_purpose::STANDARD.encode(value));
        item.updated_at = Utc::now();
        let json = Self::encode(&item)?;
        debug!(path = %path.display(), "updating item");
        replace_item_file(&path, &json)?;
        Ok(())
    }

    fn copy_matching(&self, query: &ItemQuery) -> Result<Option<Vec<u8>>, StoreStatus> {
        let path = self.path_for(query)?;
        if !query.return_data() {
            return match std::fs::metadata(&path) {
                Ok(_) => Ok(None),
                Err(e) => Err(e.into()),
            };
        }
        let item = Self::load(&path)?;
        Self::decode_value(&item).map(Some)
    }

    fn delete(&self, query: &ItemQuery) -> Result<(), StoreStatus> {
        let path = self.path_for(query)?;
        std::fs::remove_file(&path)?;
        debug!(path = %path.display(), "deleted item");
        Ok(())
    }
}
