//! The crypto provider seam.
//!
//! Everything the store needs from cryptography goes through
//! [`CryptoProvider`]: key generation, request construction, self-signing
//! the root and signing requests. [`RustCryptoProvider`] is the default
//! implementation; tests substitute doubles.

use rand_core::RngCore;
use tracing::debug;

use crate::cert::params::{CertificationRequestInfo, DistinguishedName, ExtensionParam, Validity};
use crate::cert::{Certificate, CertificateWithPrivateKey};
use crate::error::{CryptoError, Error};
use crate::issuer::{Issuer, is_issuer_controlled};
use crate::key::{DEFAULT_RSA_BITS, KeyPair, MIN_RSA_BITS};
use crate::request::CertificateSigningRequest;
use crate::serial::Serial;

/// Typed cryptographic operations used by the root CA manager and the issuer.
pub trait CryptoProvider {
    /// Checks that the provider can run on this host. Called once at startup,
    /// before anything touches the filesystem.
    fn check_available(&self) -> Result<(), Error> {
        Ok(())
    }

    /// Generates a fresh key pair.
    fn generate_key(&self) -> Result<KeyPair, CryptoError>;

    /// Builds a request for `key` with the given subject and requested extensions.
    fn create_request(
        &self,
        subject: &DistinguishedName,
        key: &KeyPair,
        extensions: &[ExtensionParam],
    ) -> Result<CertificateSigningRequest, CryptoError>;

    /// Creates a self-signed CA certificate for `key`.
    fn self_sign(
        &self,
        subject: &DistinguishedName,
        key: &KeyPair,
        validity: Validity,
        serial: &Serial,
    ) -> Result<Certificate, CryptoError>;

    /// Signs `csr` with `issuer`.
    ///
    /// `extensions` are the signing-time extensions; they replace requested
    /// extensions with the same OID. The issuer-controlled extensions
    /// (basic constraints, key usage, key identifiers) are always the issuer's.
    fn sign(
        &self,
        csr: &CertificateSigningRequest,
        issuer: &CertificateWithPrivateKey,
        extensions: &[ExtensionParam],
        validity: Validity,
        serial: &Serial,
    ) -> Result<Certificate, CryptoError>;
}

/// Pure-Rust provider on the RustCrypto stack. Signs with SHA-256 and RSA.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RustCryptoProvider {
    pub key_bits: usize,
}

impl Default for RustCryptoProvider {
    fn default() -> Self {
        Self {
            key_bits: DEFAULT_RSA_BITS,
        }
    }
}

impl RustCryptoProvider {
    pub fn new(key_bits: usize) -> Result<Self, Error> {
        if key_bits < MIN_RSA_BITS {
            return Err(Error::InvalidInput(format!(
                "key size must be at least {MIN_RSA_BITS} bits, got {key_bits}"
            )));
        }
        Ok(Self { key_bits })
    }
}

impl CryptoProvider for RustCryptoProvider {
    fn check_available(&self) -> Result<(), Error> {
        let mut sample = [0u8; 16];
        rand_core::OsRng
            .try_fill_bytes(&mut sample)
            .map_err(|e| Error::DependencyMissing(format!("OS entropy source unavailable: {e}")))
    }

    fn generate_key(&self) -> Result<KeyPair, CryptoError> {
        debug!(bits = self.key_bits, "generating RSA key");
        KeyPair::generate_rsa(self.key_bits)
    }

    fn create_request(
        &self,
        subject: &DistinguishedName,
        key: &KeyPair,
        extensions: &[ExtensionParam],
    ) -> Result<CertificateSigningRequest, CryptoError> {
        CertificateSigningRequest::new(subject, key, extensions)
    }

    fn self_sign(
        &self,
        subject: &DistinguishedName,
        key: &KeyPair,
        validity: Validity,
        serial: &Serial,
    ) -> Result<Certificate, CryptoError> {
        let info = CertificationRequestInfo::builder()
            .subject(subject.clone())
            .subject_public_key(key.public_key())
            .is_ca(true)
            .build();
        Certificate::new_self_signed(&info, key, validity, serial)
    }

    fn sign(
        &self,
        csr: &CertificateSigningRequest,
        issuer: &CertificateWithPrivateKey,
        extensions: &[ExtensionParam],
        validity: Validity,
        serial: &Serial,
    ) -> Result<Certificate, CryptoError> {
        csr.verify()?;

        let mut merged: Vec<ExtensionParam> = extensions.to_vec();
        for requested in csr.requested_extensions()? {
            if is_issuer_controlled(&requested.oid) {
                debug!(oid = %requested.oid, "ignoring issuer-controlled extension from request");
                continue;
            }
            if !merged.iter().any(|ext| ext.oid == requested.oid) {
                merged.push(requested);
            }
        }

        let info = CertificationRequestInfo::builder()
            .subject(csr.subject())
            .subject_public_key(csr.public_key()?)
            .extensions(merged)
            .build();

        debug!(serial = %serial, "signing certificate request");
        issuer.issue(&info, validity, serial)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_undersized_keys() {
        assert!(matches!(
            RustCryptoProvider::new(1024),
            Err(Error::InvalidInput(_))
        ));
        assert_eq!(RustCryptoProvider::default().key_bits, 4096);
        assert!(RustCryptoProvider::new(2048).unwrap().check_available().is_ok());
    }
}
