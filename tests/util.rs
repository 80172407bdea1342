#![allow(dead_code)]

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use localca::cert::extensions::{SubjectAltName, ToAndFromX509Extension};
use localca::cert::params::{CertificationRequestInfo, DistinguishedName, ExtensionParam, Validity};
use localca::cert::{Certificate, CertificateWithPrivateKey};
use localca::domain::DomainName;
use localca::error::CryptoError;
use localca::issue::SubjectRequest;
use localca::key::KeyPair;
use localca::provider::{CryptoProvider, RustCryptoProvider};
use localca::request::CertificateSigningRequest;
use localca::root_ca::{Overwrite, RootCa, RootCaManager, RootCaParams};
use localca::serial::Serial;
use localca::store::PkiStore;
use tempfile::TempDir;

/// Keeps the suite fast; production keys are 4096 bits.
pub const TEST_KEY_BITS: usize = 2048;

pub fn provider() -> RustCryptoProvider {
    RustCryptoProvider::new(TEST_KEY_BITS).unwrap()
}

pub fn temp_store() -> (TempDir, PkiStore) {
    let dir = tempfile::tempdir().unwrap();
    let store = PkiStore::open(dir.path().join("pki")).unwrap();
    (dir, store)
}

pub fn root_params(common_name: &str, days: u32) -> RootCaParams {
    RootCaParams::builder()
        .country("US")
        .state("California")
        .locality("San Francisco")
        .organization("Test Org")
        .common_name(common_name)
        .validity_days(days)
        .build()
        .unwrap()
}

pub fn init_root(store: &PkiStore) -> RootCa {
    RootCaManager::new(store, &provider())
        .initialize(&root_params("Test Root", 3650), Overwrite::Deny)
        .unwrap()
}

pub fn request(domain: &str, ip: Option<&str>, days: u32) -> SubjectRequest {
    SubjectRequest::new(
        DomainName::parse(domain).unwrap(),
        ip.map(|ip| ip.parse().unwrap()),
        days,
    )
    .unwrap()
}

/// Every file under `dir` with its contents, keyed by relative path.
pub fn snapshot(dir: &Path) -> BTreeMap<PathBuf, Vec<u8>> {
    fn walk(root: &Path, dir: &Path, out: &mut BTreeMap<PathBuf, Vec<u8>>) {
        for entry in fs::read_dir(dir).unwrap() {
            let path = entry.unwrap().path();
            if path.is_dir() {
                walk(root, &path, out);
            } else {
                out.insert(
                    path.strip_prefix(root).unwrap().to_path_buf(),
                    fs::read(&path).unwrap(),
                );
            }
        }
    }
    let mut out = BTreeMap::new();
    walk(dir, dir, &mut out);
    out
}

/// Names of hidden entries (staging leftovers) directly under `dir`.
pub fn hidden_entries(dir: &Path) -> Vec<String> {
    fs::read_dir(dir)
        .unwrap()
        .map(|entry| entry.unwrap().file_name().to_string_lossy().into_owned())
        .filter(|name| name.starts_with('.'))
        .collect()
}

/// The steps a [`FaultyProvider`] can be told to break.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fault {
    GenerateKey,
    Sign,
    /// Requests one more DNS name than asked for.
    ExtraSan,
}

/// Delegates to the real provider except for one injected fault.
pub struct FaultyProvider {
    pub inner: RustCryptoProvider,
    pub fault: Fault,
}

impl FaultyProvider {
    pub fn new(fault: Fault) -> Self {
        Self {
            inner: provider(),
            fault,
        }
    }
}

impl CryptoProvider for FaultyProvider {
    fn generate_key(&self) -> Result<KeyPair, CryptoError> {
        if self.fault == Fault::GenerateKey {
            return Err(CryptoError::KeyGenerationError("entropy exhausted".to_string()));
        }
        self.inner.generate_key()
    }

    fn create_request(
        &self,
        subject: &DistinguishedName,
        key: &KeyPair,
        extensions: &[ExtensionParam],
    ) -> Result<CertificateSigningRequest, CryptoError> {
        if self.fault != Fault::ExtraSan {
            return self.inner.create_request(subject, key, extensions);
        }
        let mut san = match extensions.iter().find(|ext| ext.oid == SubjectAltName::OID) {
            Some(ext) => ext.to_extension::<SubjectAltName>()?,
            None => SubjectAltName::default(),
        };
        san.names.push("evil.example".to_string());
        self.inner
            .create_request(subject, key, &[ExtensionParam::from_extension(san, false)?])
    }

    fn self_sign(
        &self,
        subject: &DistinguishedName,
        key: &KeyPair,
        validity: Validity,
        serial: &Serial,
    ) -> Result<Certificate, CryptoError> {
        self.inner.self_sign(subject, key, validity, serial)
    }

    fn sign(
        &self,
        csr: &CertificateSigningRequest,
        issuer: &CertificateWithPrivateKey,
        extensions: &[ExtensionParam],
        validity: Validity,
        serial: &Serial,
    ) -> Result<Certificate, CryptoError> {
        if self.fault == Fault::Sign {
            return Err(CryptoError::CertificateError("signer unavailable".to_string()));
        }
        self.inner.sign(csr, issuer, extensions, validity, serial)
    }
}

pub fn generate_ca_cert() -> CertificateWithPrivateKey {
    let ca_key = KeyPair::generate_rsa(TEST_KEY_BITS).unwrap();

    let subject_dn = DistinguishedName::builder()
        .common_name("myca.local".to_string())
        .build();

    let ca_cert_info = CertificationRequestInfo::builder()
        .subject(subject_dn)
        .subject_public_key(ca_key.public_key())
        .is_ca(true)
        .build();

    CertificateWithPrivateKey {
        cert: Certificate::new_self_signed(
            &ca_cert_info,
            &ca_key,
            Validity::for_days(30).unwrap(),
            &Serial::random_seed(),
        )
        .unwrap(),
        key: ca_key,
    }
}
