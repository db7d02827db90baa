//! On-disk key material

use std::io::Write;
use std::path::{Path, PathBuf};

use crate::error::SecurityResult;
use crate::signer::ReportSigner;
use crate::vault::Vault;

const ENCRYPTION_KEY_FILE: &str = ".encryption_key";
const SIGNING_KEY_FILE: &str = ".signing_key";

/// Vault key and system signing key, loaded together from one directory
pub struct KeyMaterial {
    pub vault: Vault,
    pub signer: ReportSigner,
    key_dir: PathBuf,
}

impl KeyMaterial {
    /// Load both keys from `key_dir`, generating any that are missing
    pub fn load_or_create(key_dir: impl AsRef<Path>) -> SecurityResult<Self> {
        let key_dir = key_dir.as_ref().to_path_buf();
        std::fs::create_dir_all(&key_dir)?;

        let vault = Vault::load_or_create(key_dir.join(ENCRYPTION_KEY_FILE))?;
        let signer = ReportSigner::load_or_create(key_dir.join(SIGNING_KEY_FILE))?;

        Ok(Self {
            vault,
            signer,
            key_dir,
        })
    }

    /// Ephemeral keys (for testing)
    pub fn ephemeral() -> Self {
        Self {
            vault: Vault::generate(),
            signer: ReportSigner::generate(),
            key_dir: PathBuf::new(),
        }
    }

    pub fn key_dir(&self) -> &Path {
        &self.key_dir
    }
}

/// Write a secret file readable only by the owner
pub(crate) fn write_secret(path: &Path, contents: &str) -> SecurityResult<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let mut options = std::fs::OpenOptions::new();
    options.write(true).create(true).truncate(true);

    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o600);
    }

    let mut file = options.open(path)?;
    file.write_all(contents.as_bytes())?;
    file.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_keys_survive_reload() {
        let dir = tempdir().unwrap();

        let first = KeyMaterial::load_or_create(dir.path()).unwrap();
        let token = first.vault.encrypt("acct-9876").unwrap();
        let pubkey = first.signer.public_key_hex();

        let second = KeyMaterial::load_or_create(dir.path()).unwrap();
        assert_eq!(second.vault.decrypt(&token).unwrap(), "acct-9876");
        assert_eq!(second.signer.public_key_hex(), pubkey);
        assert!(dir.path().join(".encryption_key").exists());
        assert!(dir.path().join(".signing_key").exists());
    }

    #[cfg(unix)]
    #[test]
    fn test_key_file_mode() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempdir().unwrap();
        KeyMaterial::load_or_create(dir.path()).unwrap();

        let mode = std::fs::metadata(dir.path().join(".encryption_key"))
            .unwrap()
            .permissions()
            .mode();
        assert_eq!(mode & 0o777, 0o600);
    }
}
