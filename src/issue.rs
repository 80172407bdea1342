//! Leaf certificate issuance and renewal.
//!
//! Renewal is reissue: a new key pair and a new certificate replace the
//! domain's bundle. Nothing is revoked or extended; whoever deployed the
//! previous bundle has to redeploy.

use std::fmt::Write as _;
use std::net::IpAddr;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::cert::Certificate;
use crate::cert::extensions::{SubjectAltName, ToAndFromX509Extension};
use crate::cert::params::{DistinguishedName, ExtensionParam, Validity};
use crate::domain::DomainName;
use crate::error::{CryptoError, Error, Result};
use crate::export::ExportBundle;
use crate::key::KeyPair;
use crate::provider::CryptoProvider;
use crate::root_ca::{RootCa, RootCaManager, validate_days};
use crate::serial::Serial;
use crate::store::{
    CERT_FILE, FULL_CHAIN_FILE, PKCS12_FILE, PRIVATE_KEY_FILE, PkiStore, StoreLock, read_file,
};

pub const DEFAULT_LEAF_VALIDITY_DAYS: u32 = 365;

fn default_validity_days() -> u32 {
    DEFAULT_LEAF_VALIDITY_DAYS
}

/// What to issue: a domain, an optional IP and a lifetime.
///
/// Retained as `configs/<dir>.request.toml` so the domain can be renewed
/// with the same parameters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubjectRequest {
    pub domain: DomainName,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ip_address: Option<IpAddr>,
    #[serde(default = "default_validity_days")]
    pub validity_days: u32,
}

impl SubjectRequest {
    pub fn new(domain: DomainName, ip_address: Option<IpAddr>, validity_days: u32) -> Result<Self> {
        validate_days(validity_days)?;
        Ok(Self {
            domain,
            ip_address,
            validity_days,
        })
    }

    /// `DNS.1 = domain`, plus `IP.1 = ip` when present. Nothing else.
    pub fn subject_alt_name(&self) -> SubjectAltName {
        SubjectAltName {
            names: vec![self.domain.as_san()],
            ip_addresses: self.ip_address.into_iter().collect(),
        }
    }

    pub fn subject(&self) -> DistinguishedName {
        DistinguishedName {
            common_name: self.domain.as_san(),
            ..Default::default()
        }
    }

    /// The signing-time extensions in OpenSSL extension-file syntax.
    pub fn extension_descriptor(&self) -> String {
        let mut ext = String::from(
            "authorityKeyIdentifier = keyid,issuer\n\
             subjectKeyIdentifier = hash\n\
             basicConstraints = CA:FALSE\n\
             keyUsage = digitalSignature, nonRepudiation, keyEncipherment, dataEncipherment\n\
             subjectAltName = @alt_names\n\
             \n\
             [alt_names]\n",
        );
        let san = self.subject_alt_name();
        for (i, name) in san.names.iter().enumerate() {
            let _ = writeln!(ext, "DNS.{} = {name}", i + 1);
        }
        for (i, ip) in san.ip_addresses.iter().enumerate() {
            let _ = writeln!(ext, "IP.{} = {ip}", i + 1);
        }
        ext
    }
}

/// The result of one issuance, as written to the store.
#[derive(Debug, Clone)]
pub struct IssuedCertificate {
    pub request: SubjectRequest,
    pub key: KeyPair,
    pub certificate: Certificate,
    pub serial: Serial,
    pub directory: PathBuf,
    pub bundle: ExportBundle,
}

/// Issues and renews leaf certificates signed by the store's root.
pub struct CertificateIssuer<'a, P: CryptoProvider> {
    store: &'a PkiStore,
    provider: &'a P,
}

impl<'a, P: CryptoProvider> CertificateIssuer<'a, P> {
    pub fn new(store: &'a PkiStore, provider: &'a P) -> Self {
        Self { store, provider }
    }

    /// Issues a certificate for `request` and writes its bundle to the
    /// domain's directory, replacing any previous bundle only on success.
    pub fn issue(&self, request: &SubjectRequest, pkcs12_password: &str) -> Result<IssuedCertificate> {
        let lock = self.store.lock()?;
        self.issue_locked(&lock, request, pkcs12_password)
    }

    /// Reissues `domain` with a fresh key pair, using the retained request
    /// or, failing that, the parameters of the deployed certificate.
    pub fn renew(&self, domain: &DomainName, pkcs12_password: &str) -> Result<IssuedCertificate> {
        let lock = self.store.lock()?;
        let request = self.retained_request(domain)?;
        info!(domain = %domain, "renewing");
        self.issue_locked(&lock, &request, pkcs12_password)
    }

    /// The request to renew `domain` with.
    pub fn retained_request(&self, domain: &DomainName) -> Result<SubjectRequest> {
        let descriptor = self.store.request_descriptor_path(domain);
        if descriptor.exists() {
            let parsed: SubjectRequest = toml::from_str(&read_file(&descriptor)?).map_err(|e| {
                Error::CorruptStore(format!("unreadable request {}: {e}", descriptor.display()))
            })?;
            let request = SubjectRequest::new(parsed.domain, parsed.ip_address, parsed.validity_days)
                .map_err(|e| {
                    Error::CorruptStore(format!("invalid request {}: {e}", descriptor.display()))
                })?;
            if &request.domain != domain {
                return Err(Error::CorruptStore(format!(
                    "{} describes {}, not {domain}",
                    descriptor.display(),
                    request.domain
                )));
            }
            return Ok(request);
        }

        let cert_path = self.store.resolve_domain_directory(domain).join(CERT_FILE);
        if cert_path.exists() {
            debug!(path = %cert_path.display(), "reconstructing request from deployed certificate");
            let cert = Certificate::from_pem(&read_file(&cert_path)?)?;
            let san = cert.subject_alt_name()?;
            let days = u32::try_from(cert.validity().days())
                .ok()
                .filter(|days| *days > 0)
                .unwrap_or(DEFAULT_LEAF_VALIDITY_DAYS);
            return SubjectRequest::new(domain.clone(), san.ip_addresses.first().copied(), days);
        }

        Err(Error::UnknownDomain(domain.to_string()))
    }

    fn issue_locked(
        &self,
        _lock: &StoreLock,
        request: &SubjectRequest,
        pkcs12_password: &str,
    ) -> Result<IssuedCertificate> {
        let root = RootCaManager::new(self.store, self.provider).load()?;
        self.store.ensure_layout()?;

        let domain = &request.domain;
        let directory = self.store.resolve_domain_directory(domain);
        let san = request.subject_alt_name();
        let san_extension = ExtensionParam::from_extension(san.clone(), false)?;
        let retained = toml::to_string_pretty(request)
            .map_err(|e| Error::InvalidInput(format!("cannot serialize request: {e}")))?;
        let validity = Validity::for_days(request.validity_days)?;

        let key = self.provider.generate_key()?;
        self.check_fresh_key(&key, &root, &directory)?;

        let csr = self
            .provider
            .create_request(&request.subject(), &key, std::slice::from_ref(&san_extension))?;
        let requested_san = csr
            .requested_extensions()?
            .iter()
            .find(|ext| ext.oid == SubjectAltName::OID)
            .map(|ext| ext.to_extension::<SubjectAltName>())
            .transpose()?;
        if requested_san.as_ref() != Some(&san) {
            return Err(CryptoError::CertificateError(format!(
                "request asks for SAN {requested_san:?}, expected {san}"
            ))
            .into());
        }

        let serial = self.store.next_serial()?;
        let certificate = self.provider.sign(
            &csr,
            root.issuer(),
            std::slice::from_ref(&san_extension),
            validity,
            &serial,
        )?;
        self.check_issued(&certificate, &root, &key, &san, &serial)?;

        let bundle = ExportBundle::build(
            &certificate,
            &key,
            root.certificate(),
            &domain.as_san(),
            pkcs12_password,
        )?;

        let staged = self.store.stage(&directory)?;
        staged.write_secret(PRIVATE_KEY_FILE, key.to_pkcs8_pem()?.as_bytes())?;
        staged.write_file(CERT_FILE, certificate.to_pem()?.as_bytes())?;
        staged.write_file(FULL_CHAIN_FILE, bundle.full_chain_pem.as_bytes())?;
        staged.write_secret(PKCS12_FILE, &bundle.pkcs12_der)?;
        staged.promote()?;

        // Descriptors describe the deployed bundle, so they change only with it.
        self.write_descriptors(request, &retained);

        info!(
            domain = %domain,
            serial = %serial,
            san = %san,
            days = request.validity_days,
            directory = %directory.display(),
            "certificate issued"
        );

        Ok(IssuedCertificate {
            request: request.clone(),
            key,
            certificate,
            serial,
            directory,
            bundle,
        })
    }

    /// Best effort once the bundle is promoted. A request descriptor that
    /// could not be replaced is removed so renewal falls back to `cert.pem`.
    fn write_descriptors(&self, request: &SubjectRequest, retained: &str) {
        let request_path = self.store.request_descriptor_path(&request.domain);
        if let Err(e) = self.store.write_atomic(&request_path, retained.as_bytes()) {
            warn!(path = %request_path.display(), error = %e, "could not retain request");
            if let Err(e) = std::fs::remove_file(&request_path) {
                if e.kind() != std::io::ErrorKind::NotFound {
                    warn!(path = %request_path.display(), error = %e, "stale request left behind");
                }
            }
        }

        let ext_path = self.store.extension_descriptor_path(&request.domain);
        if let Err(e) = self
            .store
            .write_atomic(&ext_path, request.extension_descriptor().as_bytes())
        {
            warn!(path = %ext_path.display(), error = %e, "could not write extension descriptor");
        }
    }

    /// A leaf key must differ from the root key and from the key it replaces.
    fn check_fresh_key(&self, key: &KeyPair, root: &RootCa, directory: &std::path::Path) -> Result<()> {
        let public = key.public_key();
        if public == root.key().public_key() {
            return Err(CryptoError::KeyGenerationError(
                "generated leaf key equals the root key".to_string(),
            )
            .into());
        }

        let deployed = directory.join(PRIVATE_KEY_FILE);
        if deployed.exists() {
            match read_file(&deployed).and_then(|pem| Ok(KeyPair::import_from_pem(&pem)?)) {
                Ok(previous) if previous.public_key() == public => {
                    return Err(CryptoError::KeyGenerationError(
                        "generated leaf key equals the deployed key".to_string(),
                    )
                    .into());
                }
                Ok(_) => {}
                Err(e) => warn!(path = %deployed.display(), error = %e, "cannot read deployed key"),
            }
        }
        Ok(())
    }

    /// Checks a signed certificate before anything is written for it.
    fn check_issued(
        &self,
        certificate: &Certificate,
        root: &RootCa,
        key: &KeyPair,
        san: &SubjectAltName,
        serial: &Serial,
    ) -> Result<()> {
        let mismatch = |what: &str| -> Error {
            CryptoError::CertificateError(format!("issued certificate has the wrong {what}")).into()
        };

        certificate.verify_signed_by(root.certificate())?;
        if &certificate.subject_alt_name()? != san {
            return Err(mismatch("subject alternative names"));
        }
        if certificate.public_key()? != key.public_key() {
            return Err(mismatch("public key"));
        }
        if &certificate.serial()? != serial {
            return Err(mismatch("serial number"));
        }
        if certificate.is_ca() {
            return Err(mismatch("basic constraints"));
        }
        Ok(())
    }
}
