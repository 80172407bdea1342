//! The on-disk PKI store.
//!
//! ```text
//! <base>/root_ca/{rootCA.key, rootCA.crt, rootCA.srl}
//! <base>/issued_certs/<dir>/{privkey.pem, cert.pem, fullchain.pem, bundle.p12}
//! <base>/configs/<dir>.{request.toml, ext}
//! <base>/README.md
//! <base>/.localca.lock
//! ```
//!
//! Multi-file outputs are written into a hidden staging directory next to
//! their target and swapped into place by [`StagedDir::promote`], so a
//! reader never observes a half-written root or bundle.

use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::domain::DomainName;
use crate::error::{Error, Result};
use crate::serial::Serial;

pub const ROOT_CA_DIR: &str = "root_ca";
pub const ISSUED_CERTS_DIR: &str = "issued_certs";
pub const CONFIGS_DIR: &str = "configs";

pub const ROOT_KEY_FILE: &str = "rootCA.key";
pub const ROOT_CERT_FILE: &str = "rootCA.crt";
pub const SERIAL_FILE: &str = "rootCA.srl";

pub const PRIVATE_KEY_FILE: &str = "privkey.pem";
pub const CERT_FILE: &str = "cert.pem";
pub const FULL_CHAIN_FILE: &str = "fullchain.pem";
pub const PKCS12_FILE: &str = "bundle.p12";

pub const GUIDE_FILE: &str = "README.md";
pub const LOCK_FILE: &str = ".localca.lock";

const REQUEST_DESCRIPTOR_SUFFIX: &str = "request.toml";
const EXTENSION_DESCRIPTOR_SUFFIX: &str = "ext";

/// Owner read-only; applied to the root key once written.
pub const KEY_FILE_MODE: u32 = 0o400;
/// Owner read-write; private keys and PKCS#12 bundles are created with it.
pub const SECRET_FILE_MODE: u32 = 0o600;

/// Handle on a store rooted at a base directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PkiStore {
    base: PathBuf,
}

impl PkiStore {
    pub fn new(base: impl Into<PathBuf>) -> Self {
        Self { base: base.into() }
    }

    /// Builds a handle and makes sure the directory layout exists.
    pub fn open(base: impl Into<PathBuf>) -> Result<Self> {
        let store = Self::new(base);
        store.ensure_layout()?;
        Ok(store)
    }

    /// Creates `root_ca/`, `issued_certs/` and `configs/` if missing.
    pub fn ensure_layout(&self) -> Result<()> {
        for dir in [self.root_ca_dir(), self.issued_certs_dir(), self.configs_dir()] {
            fs::create_dir_all(&dir).map_err(|e| Error::io(&dir, e))?;
        }
        debug!(base = %self.base.display(), "store layout ready");
        Ok(())
    }

    pub fn base(&self) -> &Path {
        &self.base
    }

    pub fn root_ca_dir(&self) -> PathBuf {
        self.base.join(ROOT_CA_DIR)
    }

    pub fn issued_certs_dir(&self) -> PathBuf {
        self.base.join(ISSUED_CERTS_DIR)
    }

    pub fn configs_dir(&self) -> PathBuf {
        self.base.join(CONFIGS_DIR)
    }

    pub fn root_key_path(&self) -> PathBuf {
        self.root_ca_dir().join(ROOT_KEY_FILE)
    }

    pub fn root_cert_path(&self) -> PathBuf {
        self.root_ca_dir().join(ROOT_CERT_FILE)
    }

    pub fn serial_path(&self) -> PathBuf {
        self.root_ca_dir().join(SERIAL_FILE)
    }

    pub fn guide_path(&self) -> PathBuf {
        self.base.join(GUIDE_FILE)
    }

    pub fn lock_path(&self) -> PathBuf {
        self.base.join(LOCK_FILE)
    }

    /// `issued_certs/<dir>` for `domain`; see [`DomainName::directory_name`].
    pub fn resolve_domain_directory(&self, domain: &DomainName) -> PathBuf {
        self.issued_certs_dir().join(domain.directory_name())
    }

    pub fn request_descriptor_path(&self, domain: &DomainName) -> PathBuf {
        self.configs_dir().join(format!(
            "{}.{REQUEST_DESCRIPTOR_SUFFIX}",
            domain.directory_name()
        ))
    }

    pub fn extension_descriptor_path(&self, domain: &DomainName) -> PathBuf {
        self.configs_dir().join(format!(
            "{}.{EXTENSION_DESCRIPTOR_SUFFIX}",
            domain.directory_name()
        ))
    }

    /// Takes the exclusive store lock. Fails with [`Error::StoreLocked`] if
    /// another operation holds it.
    pub fn lock(&self) -> Result<StoreLock> {
        let path = self.lock_path();
        let mut file = match OpenOptions::new().write(true).create_new(true).open(&path) {
            Ok(file) => file,
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
                return Err(Error::StoreLocked(path));
            }
            Err(e) => return Err(Error::io(&path, e)),
        };
        let guard = StoreLock { path };
        writeln!(file, "{}", std::process::id()).map_err(|e| Error::io(&guard.path, e))?;
        debug!(lock = %guard.path.display(), "acquired store lock");
        Ok(guard)
    }

    /// Starts a staging directory that will replace `target` on promotion.
    pub fn stage(&self, target: impl Into<PathBuf>) -> Result<StagedDir> {
        let target = target.into();
        let staging = sibling(&target, "staging")?;
        fs::create_dir_all(&staging).map_err(|e| Error::io(&staging, e))?;
        debug!(staging = %staging.display(), target = %target.display(), "staging");
        Ok(StagedDir {
            staging,
            target,
            promoted: false,
        })
    }

    /// Reads the last serial used by the current root.
    pub fn read_serial(&self) -> Result<Option<Serial>> {
        let path = self.serial_path();
        match fs::read_to_string(&path) {
            Ok(content) => content.parse().map(Some).map_err(|e| {
                Error::CorruptStore(format!("unreadable serial counter {}: {e}", path.display()))
            }),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(Error::io(&path, e)),
        }
    }

    /// Reserves the next serial: increments the counter and persists it
    /// before returning. A reserved serial is never handed out again, even if
    /// the issuance it was reserved for fails.
    ///
    /// A missing counter is reseeded randomly, as `openssl x509
    /// -CAcreateserial` does.
    pub fn next_serial(&self) -> Result<Serial> {
        let next = match self.read_serial()? {
            Some(last) => last.next()?,
            None => {
                warn!(path = %self.serial_path().display(), "serial counter missing, reseeding");
                Serial::random_seed()
            }
        };
        self.write_atomic(&self.serial_path(), format!("{}\n", next.to_hex()).as_bytes())?;
        debug!(serial = %next, "reserved serial");
        Ok(next)
    }

    /// Writes `contents` to a temporary sibling of `path` and renames it into place.
    pub fn write_atomic(&self, path: &Path, contents: &[u8]) -> Result<()> {
        let temp = sibling(path, "tmp")?;
        let cleanup = TempFileCleanup::new(&temp);
        {
            let mut file = File::create(&temp).map_err(|e| Error::io(&temp, e))?;
            file.write_all(contents).map_err(|e| Error::io(&temp, e))?;
            file.sync_all().map_err(|e| Error::io(&temp, e))?;
        }
        fs::rename(&temp, path).map_err(|e| Error::io(path, e))?;
        cleanup.disarm();
        Ok(())
    }

    /// Domains with a bundle directory under `issued_certs/`, sorted.
    /// Entries that are not domain directories (staging leftovers, stray
    /// files) are skipped.
    pub fn issued_domains(&self) -> Result<Vec<DomainName>> {
        let dir = self.issued_certs_dir();
        let entries = match fs::read_dir(&dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(Error::io(&dir, e)),
        };

        let mut domains = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| Error::io(&dir, e))?;
            if !entry.path().is_dir() {
                continue;
            }
            let name = entry.file_name().to_string_lossy().into_owned();
            if name.starts_with('.') {
                continue;
            }
            match DomainName::from_directory_name(&name) {
                Ok(domain) => domains.push(domain),
                Err(e) => debug!(entry = %name, error = %e, "skipping non-domain entry"),
            }
        }
        domains.sort();
        Ok(domains)
    }
}

/// Hidden, unique sibling of `path`: `<parent>/.<name>.<purpose>.<pid>.<nonce>`.
fn sibling(path: &Path, purpose: &str) -> Result<PathBuf> {
    let name = path
        .file_name()
        .ok_or_else(|| Error::InvalidInput(format!("{} has no file name", path.display())))?;
    let parent = path.parent().unwrap_or_else(|| Path::new("."));
    Ok(parent.join(format!(
        ".{}.{purpose}.{}.{:08x}",
        name.to_string_lossy(),
        std::process::id(),
        rand::random::<u32>()
    )))
}

pub(crate) fn read_file(path: &Path) -> Result<String> {
    fs::read_to_string(path).map_err(|e| Error::io(path, e))
}

/// Exclusive hold on a store; released on drop.
#[derive(Debug)]
pub struct StoreLock {
    path: PathBuf,
}

impl StoreLock {
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for StoreLock {
    fn drop(&mut self) {
        if let Err(e) = fs::remove_file(&self.path) {
            warn!(lock = %self.path.display(), error = %e, "failed to release store lock");
        }
    }
}

/// A directory being assembled before it replaces its target.
///
/// Dropped without [`promote`](Self::promote), the staging directory is
/// removed and the target is left as it was.
#[derive(Debug)]
pub struct StagedDir {
    staging: PathBuf,
    target: PathBuf,
    promoted: bool,
}

impl StagedDir {
    pub fn path(&self) -> &Path {
        &self.staging
    }

    pub fn target(&self) -> &Path {
        &self.target
    }

    /// Writes a world-readable file (certificates, chains).
    pub fn write_file(&self, name: &str, contents: &[u8]) -> Result<PathBuf> {
        let path = self.staging.join(name);
        fs::write(&path, contents).map_err(|e| Error::io(&path, e))?;
        Ok(path)
    }

    /// Writes a file readable only by its owner (0600 on Unix).
    pub fn write_secret(&self, name: &str, contents: &[u8]) -> Result<PathBuf> {
        let path = self.staging.join(name);
        let mut file = create_with_mode(&path, SECRET_FILE_MODE).map_err(|e| Error::io(&path, e))?;
        file.write_all(contents).map_err(|e| Error::io(&path, e))?;
        file.sync_all().map_err(|e| Error::io(&path, e))?;
        Ok(path)
    }

    /// Writes a secret and then drops the owner's write bit (0400).
    /// Failing to harden is logged, not fatal.
    pub fn write_key(&self, name: &str, contents: &[u8]) -> Result<PathBuf> {
        let path = self.write_secret(name, contents)?;
        if let Err(e) = restrict_permissions(&path, KEY_FILE_MODE) {
            warn!(path = %path.display(), error = %e, "could not restrict key file permissions");
        }
        Ok(path)
    }

    /// Swaps the staging directory into place of the target.
    ///
    /// An existing target is moved aside first and restored if the swap
    /// fails; it is removed once the new directory is in place.
    pub fn promote(mut self) -> Result<PathBuf> {
        let backup = if self.target.exists() {
            let backup = sibling(&self.target, "old")?;
            fs::rename(&self.target, &backup).map_err(|e| Error::io(&self.target, e))?;
            Some(backup)
        } else {
            None
        };

        if let Err(e) = fs::rename(&self.staging, &self.target) {
            if let Some(backup) = &backup {
                if let Err(restore) = fs::rename(backup, &self.target) {
                    warn!(
                        backup = %backup.display(),
                        error = %restore,
                        "could not restore previous directory"
                    );
                }
            }
            return Err(Error::io(&self.target, e));
        }
        self.promoted = true;

        if let Some(backup) = backup {
            if let Err(e) = fs::remove_dir_all(&backup) {
                warn!(backup = %backup.display(), error = %e, "could not remove superseded directory");
            }
        }
        debug!(target = %self.target.display(), "promoted");
        Ok(self.target.clone())
    }
}

impl Drop for StagedDir {
    fn drop(&mut self) {
        if !self.promoted {
            let _ = fs::remove_dir_all(&self.staging); // Best effort cleanup
        }
    }
}

/// Removes a temporary file unless disarmed.
struct TempFileCleanup {
    path: Option<PathBuf>,
}

impl TempFileCleanup {
    fn new(path: &Path) -> Self {
        Self {
            path: Some(path.to_path_buf()),
        }
    }

    fn disarm(mut self) {
        self.path = None;
    }
}

impl Drop for TempFileCleanup {
    fn drop(&mut self) {
        if let Some(path) = &self.path {
            let _ = fs::remove_file(path);
        }
    }
}

#[cfg(unix)]
fn create_with_mode(path: &Path, mode: u32) -> io::Result<File> {
    use std::os::unix::fs::OpenOptionsExt;
    OpenOptions::new()
        .write(true)
        .create_new(true)
        .mode(mode)
        .open(path)
}

#[cfg(not(unix))]
fn create_with_mode(path: &Path, _mode: u32) -> io::Result<File> {
    OpenOptions::new().write(true).create_new(true).open(path)
}

#[cfg(unix)]
fn restrict_permissions(path: &Path, mode: u32) -> io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(mode))
}

#[cfg(not(unix))]
fn restrict_permissions(path: &Path, _mode: u32) -> io::Result<()> {
    let mut permissions = fs::metadata(path)?.permissions();
    permissions.set_readonly(true);
    fs::set_permissions(path, permissions)
}
