//! Vault persistence port and adapters
//!
//! The store sees an ordered collection of [`VaultEntry`] records through
//! [`VaultRepository`]. Two adapters ship with the crate: an in-memory one
//! and a single JSON file replaced atomically on every write.

use crate::models::VaultEntry;
use crate::{Error, Result};
use nebula_core::Pubkey;
use parking_lot::{Mutex, RwLock};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

/// File name of the JSON vault collection
pub const VAULT_FILE_NAME: &str = "nebula_wallets.json";

/// Persistence port for vault entries
pub trait VaultRepository: Send + Sync {
    /// All entries in insertion order
    fn list(&self) -> Result<Vec<VaultEntry>>;

    /// Entry for `public_key`, if any
    fn get(&self, public_key: &Pubkey) -> Result<Option<VaultEntry>> {
        Ok(self
            .list()?
            .into_iter()
            .find(|entry| entry.public_key == *public_key))
    }

    /// Append an entry, replacing one with the same id
    fn put(&self, entry: VaultEntry) -> Result<()>;

    /// Remove every entry for `public_key`; returns whether anything was removed
    fn delete(&self, public_key: &Pubkey) -> Result<bool>;
}

fn upsert(entries: &mut Vec<VaultEntry>, entry: VaultEntry) {
    match entries.iter_mut().find(|e| e.id == entry.id) {
        Some(existing) => *existing = entry,
        None => entries.push(entry),
    }
}

fn remove(entries: &mut Vec<VaultEntry>, public_key: &Pubkey) -> bool {
    let before = entries.len();
    entries.retain(|e| e.public_key != *public_key);
    entries.len() != before
}

/// Volatile repository
#[derive(Debug, Default)]
pub struct InMemoryVaultRepository {
    entries: RwLock<Vec<VaultEntry>>,
}

impl InMemoryVaultRepository {
    /// Empty repository
    pub fn new() -> Self {
        Self::default()
    }
}

impl VaultRepository for InMemoryVaultRepository {
    fn list(&self) -> Result<Vec<VaultEntry>> {
        Ok(self.entries.read().clone())
    }

    fn put(&self, entry: VaultEntry) -> Result<()> {
        upsert(&mut self.entries.write(), entry);
        Ok(())
    }

    fn delete(&self, public_key: &Pubkey) -> Result<bool> {
        Ok(remove(&mut self.entries.write(), public_key))
    }
}

/// JSON array on disk
#[derive(Debug)]
pub struct JsonFileVaultRepository {
    path: PathBuf,
    io_lock: Mutex<()>,
}

impl JsonFileVaultRepository {
    /// Repository backed by `path`. The file is created on first write.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            io_lock: Mutex::new(()),
        }
    }

    /// Repository at [`VAULT_FILE_NAME`] inside `dir`
    pub fn in_dir(dir: impl AsRef<Path>) -> Self {
        Self::new(dir.as_ref().join(VAULT_FILE_NAME))
    }

    /// Backing file
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_entries(&self) -> Result<Vec<VaultEntry>> {
        let bytes = match fs::read(&self.path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };
        if bytes.iter().all(u8::is_ascii_whitespace) {
            return Ok(Vec::new());
        }
        serde_json::from_slice(&bytes)
            .map_err(|e| Error::Corrupt(format!("{}: {}", self.path.display(), e)))
    }

    fn write_entries(&self, entries: &[VaultEntry]) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let json = serde_json::to_vec_pretty(entries)?;
        let tmp = self.path.with_extension("json.tmp");
        {
            let mut file = fs::File::create(&tmp)?;
            file.write_all(&json)?;
            file.sync_all()?;
        }
        restrict_permissions(&tmp)?;
        fs::rename(&tmp, &self.path)?;
        tracing::debug!("Wrote {} vault entries to {}", entries.len(), self.path.display());
        Ok(())
    }
}

#[cfg(unix)]
fn restrict_permissions(path: &Path) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(0o600))?;
    Ok(())
}

#[cfg(not(unix))]
fn restrict_permissions(_path: &Path) -> Result<()> {
    Ok(())
}

impl VaultRepository for JsonFileVaultRepository {
    fn list(&self) -> Result<Vec<VaultEntry>> {
        let _guard = self.io_lock.lock();
        self.read_entries()
    }

    fn put(&self, entry: VaultEntry) -> Result<()> {
        let _guard = self.io_lock.lock();
        let mut entries = self.read_entries()?;
        upsert(&mut entries, entry);
        self.write_entries(&entries)
    }

    fn delete(&self, public_key: &Pubkey) -> Result<bool> {
        let _guard = self.io_lock.lock();
        let mut entries = self.read_entries()?;
        if !remove(&mut entries, public_key) {
            return Ok(false);
        }
        self.write_entries(&entries)?;
        Ok(true)
    }
}

/// Platform data directory for the wallet
pub fn default_data_dir() -> Result<PathBuf> {
    directories::ProjectDirs::from("org", "Nebula", "NebulaWallet")
        .map(|dirs| dirs.data_dir().to_path_buf())
        .ok_or_else(|| Error::Storage("no home directory available".to_string()))
}
