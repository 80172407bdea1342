//! PKCS#10 certificate signing requests.

use const_oid::AssociatedOid;
use der::asn1::{BitString, SetOfVec};
use der::{Decode, Encode};
use x509_cert::attr::Attribute;
use x509_cert::request::{CertReq, CertReqInfo, ExtensionReq, Version};

use crate::cert::SignatureAlgorithm;
use crate::cert::params::{DistinguishedName, ExtensionParam};
use crate::error::CryptoError;
use crate::key::{KeyPair, PublicKey};
use crate::pem_utils::{der_to_pem, pem_to_der};

pub type Result<T> = std::result::Result<T, CryptoError>;

const REQUEST_LABEL: &str = "CERTIFICATE REQUEST";

/// A signed certificate request: subject, public key and requested extensions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CertificateSigningRequest {
    pub inner: CertReq,
}

impl CertificateSigningRequest {
    /// Builds a request for `key`'s public key and signs it with `key`.
    ///
    /// `extensions` are carried in a single `extensionRequest` attribute;
    /// with no extensions the attribute set is empty.
    pub fn new(
        subject: &DistinguishedName,
        key: &KeyPair,
        extensions: &[ExtensionParam],
    ) -> Result<Self> {
        let mut attributes = Vec::new();
        if !extensions.is_empty() {
            let requested = ExtensionReq(
                extensions
                    .iter()
                    .map(ExtensionParam::to_x509)
                    .collect::<Result<Vec<_>>>()?,
            );
            attributes.push(Attribute::try_from(requested)?);
        }

        let info = CertReqInfo {
            version: Version::V1,
            subject: subject.as_x509_name()?,
            public_key: key.as_spki()?,
            attributes: SetOfVec::try_from(attributes)?,
        };

        let signature = key.sign_data(&info.to_der()?)?;

        Ok(Self {
            inner: CertReq {
                info,
                algorithm: SignatureAlgorithm::Sha256WithRSA.into(),
                signature: BitString::from_bytes(&signature)?,
            },
        })
    }

    pub fn from_der(der: &[u8]) -> Result<Self> {
        Ok(Self {
            inner: CertReq::from_der(der)?,
        })
    }

    pub fn from_pem(pem: &str) -> Result<Self> {
        Self::from_der(&pem_to_der(pem)?)
    }

    pub fn to_der(&self) -> Result<Vec<u8>> {
        self.inner
            .to_der()
            .map_err(|e| CryptoError::EncodingError(e.to_string()))
    }

    pub fn to_pem(&self) -> Result<String> {
        Ok(der_to_pem(&self.to_der()?, REQUEST_LABEL))
    }

    pub fn subject(&self) -> DistinguishedName {
        DistinguishedName::from_x509_name(&self.inner.info.subject)
    }

    pub fn public_key(&self) -> Result<PublicKey> {
        PublicKey::from_x509spki(&self.inner.info.public_key)
    }

    /// Checks the proof of possession: the request is signed by the key it carries.
    pub fn verify(&self) -> Result<()> {
        SignatureAlgorithm::try_from(&self.inner.algorithm)?;
        let info = self.inner.info.to_der()?;
        self.public_key()?
            .verify(&info, self.inner.signature.raw_bytes())
            .map_err(|e| CryptoError::CertificateError(format!("request signature: {e}")))
    }

    /// All extensions from every `extensionRequest` attribute, in order.
    pub fn requested_extensions(&self) -> Result<Vec<ExtensionParam>> {
        let mut extensions = Vec::new();
        for attribute in self.inner.info.attributes.iter() {
            if attribute.oid != ExtensionReq::OID {
                continue;
            }
            for value in attribute.values.iter() {
                let requested = ExtensionReq::from_der(&value.to_der()?)?;
                extensions.extend(requested.0.iter().map(ExtensionParam::from));
            }
        }
        Ok(extensions)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cert::extensions::SubjectAltName;
    use crate::key::MIN_RSA_BITS;

    #[test]
    fn carries_subject_key_and_extensions() {
        let key = KeyPair::generate_rsa(MIN_RSA_BITS).unwrap();
        let subject = DistinguishedName {
            common_name: "*.example.com".to_string(),
            ..Default::default()
        };
        let san = SubjectAltName {
            names: vec!["*.example.com".to_string()],
            ip_addresses: vec!["192.168.1.20".parse().unwrap()],
        };
        let csr = CertificateSigningRequest::new(
            &subject,
            &key,
            &[ExtensionParam::from_extension(san.clone(), false).unwrap()],
        )
        .unwrap();

        let parsed = CertificateSigningRequest::from_pem(&csr.to_pem().unwrap()).unwrap();
        parsed.verify().unwrap();
        assert_eq!(parsed.subject(), subject);
        assert_eq!(parsed.public_key().unwrap(), key.public_key());

        let requested = parsed.requested_extensions().unwrap();
        assert_eq!(requested.len(), 1);
        assert_eq!(requested[0].to_extension::<SubjectAltName>().unwrap(), san);
    }

    #[test]
    fn tampered_request_fails_verification() {
        let key = KeyPair::generate_rsa(MIN_RSA_BITS).unwrap();
        let other = KeyPair::generate_rsa(MIN_RSA_BITS).unwrap();
        let mut csr = CertificateSigningRequest::new(
            &DistinguishedName {
                common_name: "svc.local".to_string(),
                ..Default::default()
            },
            &key,
            &[],
        )
        .unwrap();
        assert!(csr.requested_extensions().unwrap().is_empty());

        csr.inner.info.public_key = other.as_spki().unwrap();
        assert!(csr.verify().is_err());
    }
}
