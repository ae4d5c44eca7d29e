//! Encrypted option store: OS keyring first, file fallback second.
//!
//! ## Storage Locations
//!
//! **Keyring (Primary):**
//! - Service: `fla` (configurable)
//! - Entries: `{key}:{site_uid}`
//!
//! **File Fallback (Secondary):** `storage.dir` when configured, otherwise
//! - Windows: `%APPDATA%\fla\`
//! - macOS: `~/Library/Application Support/fla/`
//! - Linux: `~/.local/share/fla/`
//!
//! Values are sealed with AES-256-GCM under a key derived from the site UID
//! before they reach either backend.

use async_trait::async_trait;
use std::io::ErrorKind;
use std::path::PathBuf;
use tokio::fs;

use crate::config::StorageConfig;
use crate::encryption::Sealer;
use crate::errors::{LicenseError, LicenseResult};
use crate::site::SiteIdentity;
use crate::store::OptionStore;

/// Default service name for keyring storage.
pub const DEFAULT_KEYRING_SERVICE: &str = "fla";

#[derive(Debug)]
pub struct SecureStore {
    service: String,
    use_keyring: bool,
    dir: Option<PathBuf>,
    site_uid: String,
    sealer: Sealer,
}

/// Platform data directory for the file fallback.
fn default_data_dir() -> Option<PathBuf> {
    dirs::data_dir().map(|p| p.join("fla"))
}

fn no_data_dir() -> LicenseError {
    LicenseError::StorageError(std::io::Error::new(
        ErrorKind::NotFound,
        "Could not determine app data directory",
    ))
}

impl SecureStore {
    pub fn new(
        service: &str,
        use_keyring: bool,
        dir: Option<PathBuf>,
        site: &SiteIdentity,
    ) -> Self {
        let site_uid = site.uid();
        Self {
            service: service.to_string(),
            use_keyring,
            dir,
            sealer: Sealer::from_material(&site_uid),
            site_uid,
        }
    }

    pub fn from_config(config: &StorageConfig, site: &SiteIdentity) -> LicenseResult<Self> {
        let service = if config.keyring_service.trim().is_empty() {
            DEFAULT_KEYRING_SERVICE
        } else {
            config.keyring_service.as_str()
        };
        let dir = config.dir.clone().or_else(default_data_dir);
        if dir.is_none() && !config.use_keyring {
            return Err(no_data_dir());
        }
        Ok(Self::new(service, config.use_keyring, dir, site))
    }

    /// File-only store rooted at `dir`; the keyring is never touched.
    pub fn file_only(dir: impl Into<PathBuf>, site: &SiteIdentity) -> Self {
        Self::new(DEFAULT_KEYRING_SERVICE, false, Some(dir.into()), site)
    }

    pub fn dir(&self) -> Option<&PathBuf> {
        self.dir.as_ref()
    }

    fn keyring_name(&self, key: &str) -> String {
        format!("{}:{}", key, self.site_uid)
    }

    fn file_path(&self, key: &str) -> Option<PathBuf> {
        let name: String = key
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() || c == '_' || c == '-' {
                    c
                } else {
                    '_'
                }
            })
            .collect();
        self.dir.as_ref().map(|d| d.join(format!("{name}.enc")))
    }

    // === Keyring Operations ===

    fn save_to_keyring(&self, key: &str, data: &str) -> Result<(), keyring::Error> {
        let entry = keyring::Entry::new(&self.service, &self.keyring_name(key))?;
        entry.set_password(data)
    }

    fn load_from_keyring(&self, key: &str) -> Result<String, keyring::Error> {
        let entry = keyring::Entry::new(&self.service, &self.keyring_name(key))?;
        entry.get_password()
    }

    fn clear_from_keyring(&self, key: &str) -> Result<(), keyring::Error> {
        let entry = keyring::Entry::new(&self.service, &self.keyring_name(key))?;
        entry.delete_credential()
    }

    // === File Operations ===

    async fn save_to_file(&self, key: &str, data: &str) -> LicenseResult<()> {
        let dir = self.dir.as_ref().ok_or_else(no_data_dir)?;
        fs::create_dir_all(dir).await?;

        let path = self.file_path(key).ok_or_else(no_data_dir)?;
        fs::write(&path, data).await?;
        Ok(())
    }

    async fn load_from_file(&self, key: &str) -> LicenseResult<Option<String>> {
        let Some(path) = self.file_path(key) else {
            return Ok(None);
        };
        match fs::read_to_string(&path).await {
            Ok(data) => Ok(Some(data)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(LicenseError::StorageError(e)),
        }
    }

    async fn clear_from_file(&self, key: &str) -> LicenseResult<()> {
        let Some(path) = self.file_path(key) else {
            return Ok(());
        };
        match fs::remove_file(&path).await {
            Ok(_) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(LicenseError::StorageError(e)),
        }
    }

    async fn load_sealed(&self, key: &str) -> LicenseResult<Option<String>> {
        if self.use_keyring {
            match self.load_from_keyring(key) {
                Ok(data) => {
                    log::debug!("Loaded {} from keyring", key);
                    return Ok(Some(data));
                }
                Err(keyring::Error::NoEntry) => {}
                Err(e) => log::debug!("Keyring load failed for {}: {}", key, e),
            }
        }
        self.load_from_file(key).await
    }
}

#[async_trait]
impl OptionStore for SecureStore {
    async fn get(&self, key: &str) -> LicenseResult<Option<String>> {
        match self.load_sealed(key).await? {
            Some(sealed) => Ok(Some(self.sealer.open_str(&sealed)?)),
            None => Ok(None),
        }
    }

    async fn set(&self, key: &str, value: &str) -> LicenseResult<()> {
        let sealed = self.sealer.seal_str(value)?;

        if self.use_keyring {
            match self.save_to_keyring(key, &sealed) {
                // Verify the save by reading back.
                Ok(()) if self.load_from_keyring(key).is_ok() => {
                    log::debug!("Saved {} to keyring", key);
                    return Ok(());
                }
                Ok(()) => {
                    log::debug!("Keyring save verification failed for {}, falling back to file", key)
                }
                Err(e) => {
                    log::debug!("Keyring save failed for {}: {}, falling back to file", key, e)
                }
            }
        }

        self.save_to_file(key, &sealed).await?;
        log::debug!("Saved {} to file storage", key);
        Ok(())
    }

    async fn delete(&self, key: &str) -> LicenseResult<()> {
        if self.use_keyring {
            if let Err(e) = self.clear_from_keyring(key) {
                match e {
                    keyring::Error::NoEntry => {}
                    _ => log::debug!("Failed to clear {} from keyring: {}", key, e),
                }
            }
        }
        self.clear_from_file(key).await
    }
}
