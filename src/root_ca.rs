//! Root CA creation and loading.

use std::path::PathBuf;

use bon::bon;
use tracing::{info, warn};

use crate::cert::params::{DistinguishedName, Validity};
use crate::cert::{Certificate, CertificateWithPrivateKey};
use crate::error::{CryptoError, Error, Result};
use crate::guide;
use crate::key::KeyPair;
use crate::provider::CryptoProvider;
use crate::serial::Serial;
use crate::store::{PkiStore, ROOT_CERT_FILE, ROOT_KEY_FILE, SERIAL_FILE, read_file};

pub const DEFAULT_ROOT_VALIDITY_DAYS: u32 = 3650;

/// Longest validity accepted for any certificate, roughly a century.
pub const MAX_VALIDITY_DAYS: u32 = 36_500;

/// Validated subject and lifetime of a new root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RootCaParams {
    country: String,
    state: Option<String>,
    locality: Option<String>,
    organization: Option<String>,
    common_name: String,
    validity_days: u32,
}

#[bon]
impl RootCaParams {
    /// Country must be two ASCII letters (stored uppercase), the common name
    /// must not be blank and the validity must be between 1 and
    /// [`MAX_VALIDITY_DAYS`] days. Blank optional fields are dropped.
    #[builder]
    pub fn new(
        #[builder(into)] country: String,
        #[builder(into)] state: Option<String>,
        #[builder(into)] locality: Option<String>,
        #[builder(into)] organization: Option<String>,
        #[builder(into)] common_name: String,
        #[builder(default = DEFAULT_ROOT_VALIDITY_DAYS)] validity_days: u32,
    ) -> Result<Self> {
        let country = country.trim().to_ascii_uppercase();
        if country.len() != 2 || !country.chars().all(|c| c.is_ascii_alphabetic()) {
            return Err(Error::InvalidInput(format!(
                "country code must be two letters, got {country:?}"
            )));
        }
        let common_name = common_name.trim().to_string();
        if common_name.is_empty() {
            return Err(Error::InvalidInput("common name must not be empty".to_string()));
        }
        validate_days(validity_days)?;

        let optional = |value: Option<String>| {
            value
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        Ok(Self {
            country,
            state: optional(state),
            locality: optional(locality),
            organization: optional(organization),
            common_name,
            validity_days,
        })
    }
}

impl RootCaParams {
    pub fn validity_days(&self) -> u32 {
        self.validity_days
    }

    pub fn distinguished_name(&self) -> DistinguishedName {
        DistinguishedName {
            common_name: self.common_name.clone(),
            country: Some(self.country.clone()),
            state: self.state.clone(),
            locality: self.locality.clone(),
            organization: self.organization.clone(),
            organization_unit: None,
        }
    }
}

pub(crate) fn validate_days(days: u32) -> Result<()> {
    if days == 0 || days > MAX_VALIDITY_DAYS {
        return Err(Error::InvalidInput(format!(
            "validity must be between 1 and {MAX_VALIDITY_DAYS} days, got {days}"
        )));
    }
    Ok(())
}

/// Whether an existing root may be replaced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Overwrite {
    /// Fail with [`Error::RootCaExists`] if a root is present.
    #[default]
    Deny,
    /// The operator accepted that every previously issued certificate stops
    /// chaining to the new root.
    Confirmed,
}

/// The root key and certificate, loaded and checked to be a pair.
#[derive(Debug, Clone)]
pub struct RootCa {
    issuer: CertificateWithPrivateKey,
    cert_path: PathBuf,
}

impl RootCa {
    pub fn certificate(&self) -> &Certificate {
        &self.issuer.cert
    }

    pub fn key(&self) -> &KeyPair {
        &self.issuer.key
    }

    /// The root in issuing form.
    pub fn issuer(&self) -> &CertificateWithPrivateKey {
        &self.issuer
    }

    pub fn cert_path(&self) -> &PathBuf {
        &self.cert_path
    }
}

/// Creates, replaces and loads the root CA of a store.
pub struct RootCaManager<'a, P: CryptoProvider> {
    store: &'a PkiStore,
    provider: &'a P,
}

impl<'a, P: CryptoProvider> RootCaManager<'a, P> {
    pub fn new(store: &'a PkiStore, provider: &'a P) -> Self {
        Self { store, provider }
    }

    /// Whether any root material (key or certificate) is present.
    pub fn exists(&self) -> bool {
        self.store.root_key_path().exists() || self.store.root_cert_path().exists()
    }

    /// Generates a new root key and self-signed certificate.
    ///
    /// Key, certificate and serial counter are staged together and promoted
    /// over `root_ca/` only once all of them are written. Without
    /// [`Overwrite::Confirmed`] an existing root is left byte-identical.
    pub fn initialize(&self, params: &RootCaParams, overwrite: Overwrite) -> Result<RootCa> {
        let _lock = self.store.lock()?;
        self.store.ensure_layout()?;

        if self.exists() && overwrite != Overwrite::Confirmed {
            return Err(Error::RootCaExists(self.store.root_ca_dir()));
        }

        let subject = params.distinguished_name();
        let key = self.provider.generate_key()?;
        let serial = Serial::random_seed();
        let cert = self.provider.self_sign(
            &subject,
            &key,
            Validity::for_days(params.validity_days)?,
            &serial,
        )?;

        let issuer = CertificateWithPrivateKey { cert, key };
        if !issuer.matches_key() {
            return Err(CryptoError::CertificateError(
                "root certificate does not carry the generated key".to_string(),
            )
            .into());
        }
        issuer.cert.verify_signed_by(&issuer.cert)?;

        let staged = self.store.stage(self.store.root_ca_dir())?;
        staged.write_key(ROOT_KEY_FILE, issuer.key.to_pkcs8_pem()?.as_bytes())?;
        staged.write_file(ROOT_CERT_FILE, issuer.cert.to_pem()?.as_bytes())?;
        staged.write_file(SERIAL_FILE, format!("{}\n", serial.to_hex()).as_bytes())?;
        staged.promote()?;

        info!(
            subject = %issuer.cert.subject_name(),
            serial = %serial,
            days = params.validity_days,
            bits = issuer.key.size_bits(),
            "root CA initialized"
        );

        let guide_path = self.store.guide_path();
        if let Err(e) = self
            .store
            .write_atomic(&guide_path, guide::render(self.store).as_bytes())
        {
            warn!(path = %guide_path.display(), error = %e, "could not write trust guide");
        }

        Ok(RootCa {
            issuer,
            cert_path: self.store.root_cert_path(),
        })
    }

    /// Loads the root key and certificate and checks they match.
    pub fn load(&self) -> Result<RootCa> {
        let key_path = self.store.root_key_path();
        let cert_path = self.store.root_cert_path();
        if !key_path.exists() || !cert_path.exists() {
            return Err(Error::NoRootCa(self.store.root_ca_dir()));
        }

        let key = KeyPair::import_from_pem(&read_file(&key_path)?).map_err(|e| {
            Error::CorruptStore(format!("unreadable root key {}: {e}", key_path.display()))
        })?;
        let cert = Certificate::from_pem(&read_file(&cert_path)?).map_err(|e| {
            Error::CorruptStore(format!(
                "unreadable root certificate {}: {e}",
                cert_path.display()
            ))
        })?;

        let issuer = CertificateWithPrivateKey { cert, key };
        if !issuer.matches_key() {
            return Err(Error::CorruptStore(format!(
                "{} does not belong to {}",
                key_path.display(),
                cert_path.display()
            )));
        }

        Ok(RootCa { issuer, cert_path })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn params_are_normalized() {
        let params = RootCaParams::builder()
            .country(" us ")
            .state("")
            .organization("Test Org")
            .common_name("  Test Root ")
            .build()
            .unwrap();
        let dn = params.distinguished_name();
        assert_eq!(dn.country.as_deref(), Some("US"));
        assert_eq!(dn.state, None);
        assert_eq!(dn.common_name, "Test Root");
        assert_eq!(params.validity_days(), DEFAULT_ROOT_VALIDITY_DAYS);
    }

    #[test]
    fn invalid_params_are_rejected() {
        let attempts = [
            RootCaParams::builder().country("USA").common_name("Root").build(),
            RootCaParams::builder().country("1A").common_name("Root").build(),
            RootCaParams::builder().country("US").common_name(" ").build(),
            RootCaParams::builder()
                .country("US")
                .common_name("Root")
                .validity_days(0)
                .build(),
        ];
        for attempt in attempts {
            assert!(matches!(attempt, Err(Error::InvalidInput(_))));
        }
    }
}
