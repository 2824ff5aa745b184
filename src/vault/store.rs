//! Durable storage for vault metadata.
//!
//! `VaultStore` is the seam between the session engine and wherever the
//! bytes live.  `FileVaultStore` keeps one `<name>.vault` file per vault
//! in a directory; `MemoryVaultStore` (in `memory.rs`) keeps them in a map.

use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;

use super::format::VaultMetadata;
use crate::errors::{PassVaultError, Result};

/// File extension identifying vault files.
pub const VAULT_EXTENSION: &str = "vault";

/// Longest accepted vault name, in bytes.
const MAX_NAME_LEN: usize = 64;

/// Persistence operations the session engine needs.
///
/// Implementations must be safe to share between threads.  `save`
/// replaces a vault wholesale and must never expose a half-written value
/// to a concurrent `load`.
pub trait VaultStore: Send + Sync {
    /// Whether a vault called `name` exists.
    fn exists(&self, name: &str) -> Result<bool>;

    /// Names of every stored vault, sorted.
    fn list(&self) -> Result<Vec<String>>;

    /// Write `metadata` for `name`, replacing any previous value.
    fn save(&self, name: &str, metadata: &VaultMetadata) -> Result<()>;

    /// Write `metadata` for a new vault, failing with `VaultAlreadyExists`
    /// if `name` is already taken.  Check and write happen as one step.
    fn create(&self, name: &str, metadata: &VaultMetadata) -> Result<()>;

    /// Read the metadata for `name`.
    ///
    /// `VaultNotFound` when nothing is stored under `name`;
    /// `CorruptVault` when something is but it does not parse.
    fn load(&self, name: &str) -> Result<VaultMetadata>;
}

/// Validate that a vault name is safe to use as a file stem.
///
/// Allowed: ASCII letters, digits, underscores, hyphens, periods.
/// Must be non-empty, at most 64 characters, and must not start with a
/// period (no hidden files, no `..`).
pub fn validate_vault_name(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(PassVaultError::InvalidInput(
            "vault name cannot be empty".into(),
        ));
    }
    if name.len() > MAX_NAME_LEN {
        return Err(PassVaultError::InvalidInput(format!(
            "vault name cannot exceed {MAX_NAME_LEN} characters"
        )));
    }
    if name.starts_with('.') {
        return Err(PassVaultError::InvalidInput(format!(
            "vault name '{name}' cannot start with a period"
        )));
    }
    if !name
        .bytes()
        .all(|b| b.is_ascii_alphanumeric() || b == b'_' || b == b'-' || b == b'.')
    {
        return Err(PassVaultError::InvalidInput(format!(
            "vault name '{name}' contains invalid characters — only ASCII letters, digits, underscores, hyphens, and periods are allowed"
        )));
    }
    Ok(())
}

/// Filesystem-backed store: one JSON file per vault.
#[derive(Debug, Clone)]
pub struct FileVaultStore {
    dir: PathBuf,
}

impl FileVaultStore {
    /// Open a store rooted at `dir`, creating the directory (0700 on Unix)
    /// if it does not exist.
    pub fn open(dir: &Path) -> Result<Self> {
        if !dir.exists() {
            fs::create_dir_all(dir)?;

            #[cfg(unix)]
            {
                use std::os::unix::fs::PermissionsExt;
                fs::set_permissions(dir, fs::Permissions::from_mode(0o700))?;
            }
        }

        if !dir.is_dir() {
            return Err(PassVaultError::InvalidInput(format!(
                "vault directory {} is not a directory",
                dir.display()
            )));
        }

        Ok(Self {
            dir: dir.to_path_buf(),
        })
    }

    /// Directory holding the vault files.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Full path of the file backing `name`.
    ///
    /// Example: `vaults/personal.vault`
    pub fn vault_path(&self, name: &str) -> PathBuf {
        self.dir.join(format!("{name}.{VAULT_EXTENSION}"))
    }

    /// Serialize `metadata` into a temp file next to the target.
    ///
    /// The temp file is in the same directory so the final rename stays on
    /// one filesystem and is atomic.  `NamedTempFile` creates it 0600 on Unix
    /// and removes it again if we bail out early.
    fn write_temp(&self, metadata: &VaultMetadata) -> Result<NamedTempFile> {
        let bytes = metadata.to_bytes()?;

        let mut tmp = tempfile::Builder::new()
            .prefix(".")
            .suffix(".tmp")
            .tempfile_in(&self.dir)?;
        tmp.write_all(&bytes)?;
        tmp.as_file().sync_all()?;
        Ok(tmp)
    }
}

impl VaultStore for FileVaultStore {
    fn exists(&self, name: &str) -> Result<bool> {
        validate_vault_name(name)?;
        Ok(self.vault_path(name).is_file())
    }

    fn list(&self) -> Result<Vec<String>> {
        let mut names = Vec::new();

        for entry in fs::read_dir(&self.dir)? {
            let entry = entry?;

            // Skip directories even when they carry the vault extension.
            // Follows symlinks, matching `exists` and `load`.
            let path = entry.path();
            if !path.is_file() {
                continue;
            }

            if path.extension().and_then(|e| e.to_str()) != Some(VAULT_EXTENSION) {
                continue;
            }

            if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                if validate_vault_name(stem).is_ok() {
                    names.push(stem.to_string());
                }
            }
        }

        names.sort();
        Ok(names)
    }

    fn save(&self, name: &str, metadata: &VaultMetadata) -> Result<()> {
        validate_vault_name(name)?;

        let tmp = self.write_temp(metadata)?;
        tmp.persist(self.vault_path(name)).map_err(|e| e.error)?;

        Ok(())
    }

    fn create(&self, name: &str, metadata: &VaultMetadata) -> Result<()> {
        validate_vault_name(name)?;

        let tmp = self.write_temp(metadata)?;
        match tmp.persist_noclobber(self.vault_path(name)) {
            Ok(_) => Ok(()),
            Err(e) if e.error.kind() == ErrorKind::AlreadyExists => {
                Err(PassVaultError::VaultAlreadyExists(name.to_string()))
            }
            Err(e) => Err(e.error.into()),
        }
    }

    fn load(&self, name: &str) -> Result<VaultMetadata> {
        validate_vault_name(name)?;

        let path = self.vault_path(name);
        if !path.is_file() {
            return Err(PassVaultError::VaultNotFound(name.to_string()));
        }

        let data = match fs::read(&path) {
            Ok(data) => data,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(PassVaultError::VaultNotFound(name.to_string()));
            }
            Err(e) => return Err(e.into()),
        };

        VaultMetadata::from_bytes(name, &data)
    }
}
