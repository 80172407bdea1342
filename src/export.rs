//! Derived artifacts: full chain and PKCS#12.

use p12::PFX;

use crate::cert::Certificate;
use crate::error::CryptoError;
use crate::key::KeyPair;

/// Export formats regenerated on every issuance.
#[derive(Clone, PartialEq, Eq)]
pub struct ExportBundle {
    /// Leaf certificate followed by the root, PEM.
    pub full_chain_pem: String,
    /// Key, leaf and root in a password-protected PKCS#12 container.
    pub pkcs12_der: Vec<u8>,
}

impl std::fmt::Debug for ExportBundle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExportBundle")
            .field("full_chain_pem", &self.full_chain_pem)
            .field("pkcs12_der", &format_args!("<{} bytes>", self.pkcs12_der.len()))
            .finish()
    }
}

impl ExportBundle {
    /// Builds both exports. `friendly_name` labels the key in the PKCS#12;
    /// an empty `password` still produces a MAC-protected container.
    pub fn build(
        certificate: &Certificate,
        key: &KeyPair,
        root: &Certificate,
        friendly_name: &str,
        password: &str,
    ) -> Result<Self, CryptoError> {
        let full_chain_pem = format!("{}{}", certificate.to_pem()?, root.to_pem()?);

        let root_der = root.to_der()?;
        let pfx = PFX::new(
            &certificate.to_der()?,
            &key.to_pkcs8_der()?,
            Some(root_der.as_slice()),
            password,
            friendly_name,
        )
        .ok_or_else(|| CryptoError::EncodingError("failed to build PKCS#12 bundle".to_string()))?;

        Ok(Self {
            full_chain_pem,
            pkcs12_der: pfx.to_der(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cert::params::{CertificationRequestInfo, DistinguishedName, Validity};
    use crate::key::MIN_RSA_BITS;
    use crate::pem_utils::pem_blocks;
    use crate::serial::Serial;

    fn self_signed(cn: &str) -> (Certificate, KeyPair) {
        let key = KeyPair::generate_rsa(MIN_RSA_BITS).unwrap();
        let info = CertificationRequestInfo::builder()
            .subject(DistinguishedName {
                common_name: cn.to_string(),
                ..Default::default()
            })
            .subject_public_key(key.public_key())
            .is_ca(true)
            .build();
        let cert = Certificate::new_self_signed(
            &info,
            &key,
            Validity::for_days(1).unwrap(),
            &Serial::from_bytes(&[1]).unwrap(),
        )
        .unwrap();
        (cert, key)
    }

    #[test]
    fn chain_is_leaf_then_root_and_pkcs12_opens() {
        let (root, _) = self_signed("Root");
        let (leaf, key) = self_signed("svc.local");
        let bundle = ExportBundle::build(&leaf, &key, &root, "svc.local", "hunter2").unwrap();

        let blocks = pem_blocks(&bundle.full_chain_pem, "CERTIFICATE").unwrap();
        assert_eq!(blocks, vec![leaf.to_der().unwrap(), root.to_der().unwrap()]);

        let pfx = PFX::parse(&bundle.pkcs12_der).unwrap();
        assert!(pfx.verify_mac("hunter2"));
        assert!(!pfx.verify_mac("wrong"));
        assert_eq!(
            pfx.key_bags("hunter2").unwrap(),
            vec![key.to_pkcs8_der().unwrap()]
        );
    }

    #[test]
    fn empty_password_is_allowed() {
        let (root, _) = self_signed("Root");
        let (leaf, key) = self_signed("svc.local");
        let bundle = ExportBundle::build(&leaf, &key, &root, "svc.local", "").unwrap();
        assert!(PFX::parse(&bundle.pkcs12_der).unwrap().verify_mac(""));
    }
}
