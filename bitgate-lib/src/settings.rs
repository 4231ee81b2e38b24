//! Persisted, operator-editable gateway settings.
//!
//! All settings live in one record so a credential write is a single save.
//! [`SharedSettings`] caches the record for cheap reads on the notification
//! path and serializes writers so concurrent updates cannot lose changes.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};
use tracing::debug;

use crate::credentials::CredentialSet;
use crate::mapping::{OrderStateOverrides, StatusMapping};
use crate::{GatewayError, Result};

/// Processor confirmation speed requested for new invoices.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionSpeed {
    /// Paid as soon as the transaction is broadcast.
    #[default]
    High,
    /// Paid after one confirmation.
    Medium,
    /// Paid after six confirmations.
    Low,
}

impl TransactionSpeed {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::High => "high",
            Self::Medium => "medium",
            Self::Low => "low",
        }
    }
}

impl std::str::FromStr for TransactionSpeed {
    type Err = GatewayError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "high" => Ok(Self::High),
            "medium" => Ok(Self::Medium),
            "low" => Ok(Self::Low),
            other => Err(GatewayError::invalid_input(
                "transaction_speed",
                format!("expected high, medium or low, got `{other}`"),
            )),
        }
    }
}

/// The persisted settings record.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GatewaySettings {
    #[serde(default)]
    pub credentials: Option<CredentialSet>,
    #[serde(default)]
    pub order_states: OrderStateOverrides,
    /// Ask the processor to notify on every status change, not just paid/complete.
    #[serde(default)]
    pub full_notifications: bool,
    #[serde(default)]
    pub transaction_speed: TransactionSpeed,
}

impl GatewaySettings {
    /// Validated credentials, or `ConfigurationInvalid` when unpaired or partial.
    pub fn require_credentials(&self) -> Result<CredentialSet> {
        let credentials = self.credentials.as_ref().ok_or_else(|| {
            GatewayError::ConfigurationInvalid("gateway is not paired with the processor".into())
        })?;
        credentials.validate()?;
        Ok(credentials.clone())
    }

    /// Resolved remote-to-local status mapping.
    pub fn status_mapping(&self) -> StatusMapping {
        StatusMapping::from_overrides(&self.order_states)
    }

    /// Whether a usable credential set is stored.
    pub fn is_paired(&self) -> bool {
        self.require_credentials().is_ok()
    }
}

/// Backend holding the settings record.
#[async_trait]
pub trait SettingsStore: Send + Sync {
    /// Load the record, or defaults when nothing has been saved yet.
    async fn load(&self) -> Result<GatewaySettings>;

    /// Replace the record.
    async fn save(&self, settings: &GatewaySettings) -> Result<()>;

    /// Value that changes whenever the stored record changes, `None` while
    /// nothing is stored. Backends that cannot tell keep the default, and
    /// cached readers then never see writes made through other handles.
    async fn revision(&self) -> Result<Option<u64>> {
        Ok(None)
    }
}

/// Settings held in memory. For tests and throwaway runs.
#[derive(Default)]
pub struct MemorySettingsStore {
    record: RwLock<GatewaySettings>,
    saves: AtomicU64,
}

impl MemorySettingsStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from an existing record.
    pub fn with_settings(settings: GatewaySettings) -> Self {
        Self {
            record: RwLock::new(settings),
            saves: AtomicU64::new(1),
        }
    }
}

#[async_trait]
impl SettingsStore for MemorySettingsStore {
    async fn load(&self) -> Result<GatewaySettings> {
        self.record
            .read()
            .map(|r| r.clone())
            .map_err(|_| lock_error("load"))
    }

    async fn save(&self, settings: &GatewaySettings) -> Result<()> {
        let mut record = self.record.write().map_err(|_| lock_error("save"))?;
        *record = settings.clone();
        self.saves.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn revision(&self) -> Result<Option<u64>> {
        let saves = self.saves.load(Ordering::SeqCst);
        Ok((saves > 0).then_some(saves))
    }
}

/// Settings persisted as one JSON file.
///
/// Writes go to a sibling temp file that is renamed over the target, so a
/// crash mid-write leaves the previous record intact. On Unix the file is
/// created owner-readable only since it holds the private key.
pub struct FileSettingsStore {
    path: PathBuf,
}

impl FileSettingsStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_else(|| "settings.json".into());
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

#[async_trait]
impl SettingsStore for FileSettingsStore {
    async fn load(&self) -> Result<GatewaySettings> {
        if !self.path.exists() {
            debug!(path = %self.path.display(), "no settings file, using defaults");
            return Ok(GatewaySettings::default());
        }
        let json = std::fs::read_to_string(&self.path)?;
        if json.trim().is_empty() {
            return Ok(GatewaySettings::default());
        }
        let settings: GatewaySettings = serde_json::from_str(&json).map_err(|e| {
            GatewayError::ConfigurationInvalid(format!(
                "{} is not a valid settings file: {e}",
                self.path.display()
            ))
        })?;
        settings.order_states.validate()?;
        Ok(settings)
    }

    async fn save(&self, settings: &GatewaySettings) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let json = serde_json::to_string_pretty(settings)?;
        let tmp = self.temp_path();
        write_private(&tmp, json.as_bytes())?;
        std::fs::rename(&tmp, &self.path)?;
        Ok(())
    }

    /// Fingerprint of the file's metadata. Every save renames a fresh file
    /// into place, so the inode changes even when the mtime does not.
    async fn revision(&self) -> Result<Option<u64>> {
        let metadata = match std::fs::metadata(&self.path) {
            Ok(metadata) => metadata,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        let mut hasher = DefaultHasher::new();
        metadata.len().hash(&mut hasher);
        if let Ok(modified) = metadata.modified() {
            modified.hash(&mut hasher);
        }
        #[cfg(unix)]
        {
            use std::os::unix::fs::MetadataExt;
            (metadata.dev(), metadata.ino()).hash(&mut hasher);
        }
        Ok(Some(hasher.finish()))
    }
}

#[cfg(unix)]
fn write_private(path: &Path, contents: &[u8]) -> std::io::Result<()> {
    use std::io::Write;
    use std::os::unix::fs::OpenOptionsExt;

    let mut file = std::fs::OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .mode(0o600)
        .open(path)?;
    file.write_all(contents)?;
    file.sync_all()
}

#[cfg(not(unix))]
fn write_private(path: &Path, contents: &[u8]) -> std::io::Result<()> {
    std::fs::write(path, contents)
}

fn lock_error(context: &str) -> GatewayError {
    GatewayError::Storage(format!("settings lock poisoned during {context}"))
}

/// Cached, write-through view of the settings record.
///
/// Cheap to clone; clones share the cache. Other handles on the same backing
/// store (another process pairing, say) are picked up by [`refresh`].
///
/// [`refresh`]: SharedSettings::refresh
#[derive(Clone)]
pub struct SharedSettings {
    inner: Arc<SharedInner>,
}

struct SharedInner {
    store: Arc<dyn SettingsStore>,
    cache: RwLock<Cached>,
    writer: tokio::sync::Mutex<()>,
}

struct Cached {
    settings: GatewaySettings,
    revision: Option<u64>,
}

impl SharedSettings {
    /// Load the record from `store` and cache it.
    pub async fn load(store: Arc<dyn SettingsStore>) -> Result<Self> {
        let revision = store.revision().await?;
        let settings = store.load().await?;
        Ok(Self {
            inner: Arc::new(SharedInner {
                store,
                cache: RwLock::new(Cached { settings, revision }),
                writer: tokio::sync::Mutex::new(()),
            }),
        })
    }

    /// Copy of the cached record.
    pub fn snapshot(&self) -> Result<GatewaySettings> {
        self.inner
            .cache
            .read()
            .map(|c| c.settings.clone())
            .map_err(|_| lock_error("snapshot"))
    }

    fn cached_revision(&self) -> Result<Option<u64>> {
        self.inner
            .cache
            .read()
            .map(|c| c.revision)
            .map_err(|_| lock_error("revision"))
    }

    fn store_cache(&self, settings: GatewaySettings, revision: Option<u64>) -> Result<()> {
        let mut cache = self.inner.cache.write().map_err(|_| lock_error("cache"))?;
        *cache = Cached { settings, revision };
        Ok(())
    }

    /// Record as currently stored, reloading only when the store reports a
    /// change since it was cached.
    pub async fn refresh(&self) -> Result<GatewaySettings> {
        if self.inner.store.revision().await? == self.cached_revision()? {
            return self.snapshot();
        }

        let _writer = self.inner.writer.lock().await;
        let revision = self.inner.store.revision().await?;
        if revision == self.cached_revision()? {
            return self.snapshot();
        }

        debug!("settings changed in storage, reloading");
        let loaded = self.inner.store.load().await?;
        self.store_cache(loaded.clone(), revision)?;
        Ok(loaded)
    }

    /// Modify the record and persist it before the cache sees the change.
    ///
    /// Starts from the stored record when it changed elsewhere. If `f` or the
    /// save fails, neither the cache nor the store changes.
    pub async fn update<F>(&self, f: F) -> Result<GatewaySettings>
    where
        F: FnOnce(&mut GatewaySettings) -> Result<()>,
    {
        let _writer = self.inner.writer.lock().await;

        let mut next = if self.inner.store.revision().await? == self.cached_revision()? {
            self.snapshot()?
        } else {
            self.inner.store.load().await?
        };
        f(&mut next)?;
        self.inner.store.save(&next).await?;

        let revision = self.inner.store.revision().await?;
        self.store_cache(next.clone(), revision)?;
        Ok(next)
    }

    /// Re-read the record from the store, dropping the cached copy.
    pub async fn reload(&self) -> Result<GatewaySettings> {
        let _writer = self.inner.writer.lock().await;

        let revision = self.inner.store.revision().await?;
        let loaded = self.inner.store.load().await?;
        self.store_cache(loaded.clone(), revision)?;
        Ok(loaded)
    }
}
