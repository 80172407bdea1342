pub mod extensions;
pub mod params;

use der::{Decode, Encode};
use extensions::{BasicConstraints, SubjectAltName, SubjectKeyIdentifier, ToAndFromX509Extension};
use params::{CertificationRequestInfo, DistinguishedName, Validity};
use x509_cert::certificate::CertificateInner;
use x509_cert::name::Name;
use x509_cert::spki::AlgorithmIdentifierOwned;

use crate::error::CryptoError;
use crate::issuer::Issuer;
use crate::key::{KeyPair, PublicKey};
use crate::pem_utils::{der_to_pem, pem_blocks};
use crate::serial::Serial;
use crate::tbs_certificate::decode_validity;

pub type Result<T> = std::result::Result<T, CryptoError>;

const CERTIFICATE_LABEL: &str = "CERTIFICATE";

/// Represents the supported signature algorithms for certificates.
///
/// This enum provides a mapping to the corresponding OIDs for each algorithm.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SignatureAlgorithm {
    /// SHA-256 with RSA encryption (PKCS#1 v1.5).
    Sha256WithRSA,
}

impl From<SignatureAlgorithm> for AlgorithmIdentifierOwned {
    /// Converts a `SignatureAlgorithm` into an `AlgorithmIdentifierOwned`.
    ///
    /// RSA PKCS#1 v1.5 identifiers carry an explicit NULL parameter.
    fn from(value: SignatureAlgorithm) -> Self {
        match value {
            SignatureAlgorithm::Sha256WithRSA => AlgorithmIdentifierOwned {
                oid: const_oid::db::rfc5912::SHA_256_WITH_RSA_ENCRYPTION,
                parameters: Some(der::Any::null()),
            },
        }
    }
}

impl TryFrom<&AlgorithmIdentifierOwned> for SignatureAlgorithm {
    type Error = CryptoError;

    fn try_from(value: &AlgorithmIdentifierOwned) -> Result<Self> {
        match value.oid {
            const_oid::db::rfc5912::SHA_256_WITH_RSA_ENCRYPTION => Ok(Self::Sha256WithRSA),
            oid => Err(CryptoError::DecodingError(format!(
                "Unsupported signature algorithm {oid}"
            ))),
        }
    }
}

/// Represents an X.509 certificate.
///
/// This struct provides methods to encode the certificate into DER or PEM
/// formats and to read back the fields the store relies on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Certificate {
    /// The inner representation of the certificate.
    pub inner: CertificateInner,
}

impl Certificate {
    pub fn from_der(der: &[u8]) -> Result<Self> {
        Ok(Self {
            inner: CertificateInner::from_der(der)?,
        })
    }

    /// Parses the first `CERTIFICATE` block of a PEM string.
    pub fn from_pem(pem: &str) -> Result<Self> {
        let der = pem_blocks(pem, CERTIFICATE_LABEL)?
            .into_iter()
            .next()
            .ok_or_else(|| CryptoError::DecodingError("no CERTIFICATE block".to_string()))?;
        Self::from_der(&der)
    }

    /// Encodes the certificate into DER format.
    ///
    /// # Returns
    /// A byte vector containing the DER-encoded certificate.
    pub fn to_der(&self) -> Result<Vec<u8>> {
        self.inner
            .to_der()
            .map_err(|e| CryptoError::EncodingError(e.to_string()))
    }

    /// Encodes the certificate into PEM format.
    ///
    /// # Returns
    /// A string containing the PEM-encoded certificate.
    pub fn to_pem(&self) -> Result<String> {
        Ok(der_to_pem(&self.to_der()?, CERTIFICATE_LABEL))
    }

    pub fn subject(&self) -> DistinguishedName {
        DistinguishedName::from_x509_name(&self.inner.tbs_certificate.subject)
    }

    /// The subject as encoded, for byte-exact issuer matching.
    pub fn subject_name(&self) -> &Name {
        &self.inner.tbs_certificate.subject
    }

    pub fn issuer_name(&self) -> &Name {
        &self.inner.tbs_certificate.issuer
    }

    pub fn serial(&self) -> Result<Serial> {
        Serial::from_bytes(self.inner.tbs_certificate.serial_number.as_bytes())
    }

    pub fn validity(&self) -> Validity {
        decode_validity(&self.inner.tbs_certificate.validity)
    }

    pub fn signature_algorithm(&self) -> Result<SignatureAlgorithm> {
        SignatureAlgorithm::try_from(&self.inner.signature_algorithm)
    }

    pub fn public_key(&self) -> Result<PublicKey> {
        PublicKey::from_x509spki(&self.inner.tbs_certificate.subject_public_key_info)
    }

    /// Decodes the first extension of type `E`, if present.
    pub fn extension<E: ToAndFromX509Extension>(&self) -> Result<Option<E>> {
        self.inner
            .tbs_certificate
            .extensions
            .iter()
            .flatten()
            .find(|ext| ext.extn_id == E::OID)
            .map(|ext| E::from_x509_extension_value(ext.extn_value.as_bytes()))
            .transpose()
    }

    /// Whether the extension with `E`'s OID is flagged critical.
    pub fn is_extension_critical<E: ToAndFromX509Extension>(&self) -> Option<bool> {
        self.inner
            .tbs_certificate
            .extensions
            .iter()
            .flatten()
            .find(|ext| ext.extn_id == E::OID)
            .map(|ext| ext.critical)
    }

    /// The SAN extension; empty when the certificate carries none.
    pub fn subject_alt_name(&self) -> Result<SubjectAltName> {
        Ok(self.extension::<SubjectAltName>()?.unwrap_or_default())
    }

    pub fn subject_key_identifier(&self) -> Result<Option<Vec<u8>>> {
        Ok(self.extension::<SubjectKeyIdentifier>()?.map(|ski| ski.0))
    }

    pub fn is_ca(&self) -> bool {
        matches!(
            self.extension::<BasicConstraints>(),
            Ok(Some(BasicConstraints { is_ca: true, .. }))
        )
    }

    /// Checks that `issuer` issued this certificate: the issuer name matches
    /// the issuer's subject byte for byte and the signature verifies under
    /// the issuer's public key.
    pub fn verify_signed_by(&self, issuer: &Certificate) -> Result<()> {
        if self.issuer_name() != issuer.subject_name() {
            return Err(CryptoError::CertificateError(format!(
                "issuer {} does not match {}",
                self.issuer_name(),
                issuer.subject_name()
            )));
        }
        self.signature_algorithm()?;
        if self.inner.signature_algorithm != self.inner.tbs_certificate.signature {
            return Err(CryptoError::CertificateError(
                "outer and inner signature algorithms differ".to_string(),
            ));
        }
        let tbs = self.inner.tbs_certificate.to_der()?;
        issuer
            .public_key()?
            .verify(&tbs, self.inner.signature.raw_bytes())
    }

    pub fn is_self_signed(&self) -> bool {
        self.verify_signed_by(self).is_ok()
    }

    /// Creates a new self-signed CA certificate.
    ///
    /// # Arguments
    /// * `cert_info` - The certification request information.
    /// * `key` - The key pair used to sign the certificate.
    /// * `validity` - The validity period.
    /// * `serial` - The serial number of the new certificate.
    ///
    /// # Returns
    /// A `Certificate` object representing the self-signed certificate.
    pub fn new_self_signed(
        cert_info: &CertificationRequestInfo,
        key: &KeyPair,
        validity: Validity,
        serial: &Serial,
    ) -> Result<Self> {
        if cert_info.subject_public_key != key.public_key() {
            return Err(CryptoError::InvalidInput(
                "self-signed certificate must carry the signing key".to_string(),
            ));
        }
        let self_issuer = SelfIssuer {
            name: cert_info.subject.as_x509_name()?,
            key,
        };
        self_issuer.issue(cert_info, validity, serial)
    }
}

// For self-signed certificates the issuer is the subject being created.
struct SelfIssuer<'a> {
    name: Name,
    key: &'a KeyPair,
}

impl Issuer for SelfIssuer<'_> {
    fn issuer_name(&self) -> Result<Name> {
        Ok(self.name.clone())
    }

    fn signing_key(&self) -> &KeyPair {
        self.key
    }

    fn authority_cert(&self) -> Option<(Name, Vec<u8>)> {
        None
    }
}

/// A certificate together with its private key; the root CA in issuing form.
#[derive(Debug, Clone)]
pub struct CertificateWithPrivateKey {
    pub cert: Certificate,
    pub key: KeyPair,
}

impl CertificateWithPrivateKey {
    /// Whether `key` is the private half of `cert`'s public key.
    pub fn matches_key(&self) -> bool {
        self.cert
            .public_key()
            .is_ok_and(|public| public == self.key.public_key())
    }
}

impl Issuer for CertificateWithPrivateKey {
    fn issuer_name(&self) -> Result<Name> {
        // The name of the issuer is the subject of the certificate
        Ok(self.cert.subject_name().clone())
    }

    fn signing_key(&self) -> &KeyPair {
        &self.key
    }

    fn authority_cert(&self) -> Option<(Name, Vec<u8>)> {
        Some((
            self.cert.issuer_name().clone(),
            self.cert
                .inner
                .tbs_certificate
                .serial_number
                .as_bytes()
                .to_vec(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cert::extensions::{AuthorityKeyIdentifier, KeyUsage};
    use crate::key::MIN_RSA_BITS;

    fn root() -> CertificateWithPrivateKey {
        let key = KeyPair::generate_rsa(MIN_RSA_BITS).unwrap();
        let info = CertificationRequestInfo::builder()
            .subject(DistinguishedName {
                common_name: "Test Root".to_string(),
                country: Some("US".to_string()),
                ..Default::default()
            })
            .subject_public_key(key.public_key())
            .is_ca(true)
            .build();
        let cert = Certificate::new_self_signed(
            &info,
            &key,
            Validity::for_days(10).unwrap(),
            &Serial::from_bytes(&[0x42]).unwrap(),
        )
        .unwrap();
        CertificateWithPrivateKey { cert, key }
    }

    #[test]
    fn self_signed_root_has_ca_extensions() {
        let root = root();
        let cert = &root.cert;
        assert!(cert.is_self_signed());
        assert!(cert.is_ca());
        assert!(root.matches_key());
        assert_eq!(cert.is_extension_critical::<BasicConstraints>(), Some(true));
        assert_eq!(
            cert.extension::<KeyUsage>().unwrap(),
            Some(KeyUsage::certificate_authority())
        );
        assert_eq!(
            cert.subject_key_identifier().unwrap().unwrap(),
            root.key.public_key().key_identifier().unwrap()
        );
        let aki = cert.extension::<AuthorityKeyIdentifier>().unwrap().unwrap();
        assert!(aki.authority_cert_issuer.is_none());
        assert_eq!(cert.serial().unwrap().as_bytes(), &[0x42]);
        assert_eq!(cert.validity().days(), 10);
        assert_eq!(
            cert.inner.signature_algorithm,
            cert.inner.tbs_certificate.signature
        );
    }

    #[test]
    fn pem_round_trip() {
        let cert = root().cert;
        let pem = cert.to_pem().unwrap();
        assert!(pem.starts_with("-----BEGIN CERTIFICATE-----\n"));
        assert_eq!(Certificate::from_pem(&pem).unwrap(), cert);
    }

    #[test]
    fn foreign_root_does_not_verify() {
        let a = root();
        let b = root();
        assert!(a.cert.verify_signed_by(&b.cert).is_err());
        let mismatched = CertificateWithPrivateKey {
            cert: a.cert,
            key: b.key,
        };
        assert!(!mismatched.matches_key());
    }
}
