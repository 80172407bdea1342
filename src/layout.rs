//! Read-only summary of a store, for display.

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use time::OffsetDateTime;
use tracing::warn;

use crate::cert::Certificate;
use crate::domain::DomainName;
use crate::error::Result;
use crate::store::{CERT_FILE, CONFIGS_DIR, ISSUED_CERTS_DIR, PkiStore, ROOT_CA_DIR, read_file};

/// What a certificate on disk says about itself.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CertificateSummary {
    pub subject: String,
    pub serial: String,
    pub not_after: OffsetDateTime,
    pub subject_alt_name: String,
}

impl CertificateSummary {
    fn read(path: &Path) -> Option<Self> {
        let summarize = || -> Result<Self> {
            let cert = Certificate::from_pem(&read_file(path)?)?;
            Ok(Self {
                subject: cert.subject_name().to_string(),
                serial: cert.serial()?.to_hex(),
                not_after: cert.validity().not_after,
                subject_alt_name: cert.subject_alt_name()?.to_string(),
            })
        };
        match summarize() {
            Ok(summary) => Some(summary),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "unreadable certificate");
                None
            }
        }
    }
}

impl fmt::Display for CertificateSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if !self.subject_alt_name.is_empty() {
            write!(f, "{} ", self.subject_alt_name)?;
        } else {
            write!(f, "{} ", self.subject)?;
        }
        write!(f, "(serial {}, expires {})", self.serial, self.not_after.date())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DomainEntry {
    pub domain: DomainName,
    pub directory: PathBuf,
    pub files: Vec<String>,
    pub certificate: Option<CertificateSummary>,
}

/// Snapshot of a store's root and issued bundles.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreLayout {
    pub base: PathBuf,
    pub root_files: Vec<String>,
    pub root: Option<CertificateSummary>,
    pub domains: Vec<DomainEntry>,
    pub descriptors: Vec<String>,
}

impl StoreLayout {
    pub fn scan(store: &PkiStore) -> Result<Self> {
        let root_cert = store.root_cert_path();
        let root = root_cert
            .exists()
            .then(|| CertificateSummary::read(&root_cert))
            .flatten();

        let domains = store
            .issued_domains()?
            .into_iter()
            .map(|domain| {
                let directory = store.resolve_domain_directory(&domain);
                let cert = directory.join(CERT_FILE);
                DomainEntry {
                    certificate: cert.exists().then(|| CertificateSummary::read(&cert)).flatten(),
                    files: file_names(&directory),
                    domain,
                    directory,
                }
            })
            .collect();

        Ok(Self {
            base: store.base().to_path_buf(),
            root_files: file_names(&store.root_ca_dir()),
            root,
            domains,
            descriptors: file_names(&store.configs_dir()),
        })
    }
}

/// Visible file names in `dir`, sorted; empty if it cannot be read.
fn file_names(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = fs::read_dir(dir)
        .into_iter()
        .flatten()
        .flatten()
        .filter(|entry| entry.path().is_file())
        .map(|entry| entry.file_name().to_string_lossy().into_owned())
        .filter(|name| !name.starts_with('.'))
        .collect();
    names.sort();
    names
}

impl fmt::Display for StoreLayout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}", self.base.display())?;

        write!(f, "├── {ROOT_CA_DIR}/")?;
        match &self.root {
            Some(root) => writeln!(f, "  {root}")?,
            None => writeln!(f, "  (no root CA)")?,
        }
        for (i, name) in self.root_files.iter().enumerate() {
            let branch = if i + 1 == self.root_files.len() { "└──" } else { "├──" };
            writeln!(f, "│   {branch} {name}")?;
        }

        writeln!(f, "├── {ISSUED_CERTS_DIR}/")?;
        for (i, entry) in self.domains.iter().enumerate() {
            let last = i + 1 == self.domains.len();
            let (branch, indent) = if last { ("└──", "    ") } else { ("├──", "│   ") };
            let dir = entry
                .directory
                .file_name()
                .map(|name| name.to_string_lossy().into_owned())
                .unwrap_or_else(|| entry.domain.directory_name());
            match &entry.certificate {
                Some(cert) => writeln!(f, "│   {branch} {dir}/  {cert}")?,
                None => writeln!(f, "│   {branch} {dir}/  (no certificate)")?,
            }
            if !entry.files.is_empty() {
                writeln!(f, "│   {indent}    {}", entry.files.join(", "))?;
            }
        }

        writeln!(f, "└── {CONFIGS_DIR}/")?;
        if !self.descriptors.is_empty() {
            writeln!(f, "        {}", self.descriptors.join(", "))?;
        }
        Ok(())
    }
}
