use der::asn1::BitString;
use x509_cert::certificate::CertificateInner;
use x509_cert::name::Name;

use crate::cert::Certificate;
use crate::cert::SignatureAlgorithm;
use crate::cert::extensions::{
    AuthorityKeyIdentifier, BasicConstraints, KeyUsage, SubjectKeyIdentifier,
    ToAndFromX509Extension,
};
use crate::cert::params::{CertificationRequestInfo, ExtensionParam, Validity};
use crate::error::CryptoError;
use crate::key::KeyPair;
use crate::serial::Serial;
use crate::tbs_certificate::TbsCertificate;

/// Represents an entity capable of issuing certificates.
///
/// This trait provides methods to retrieve issuer details and issue certificates.
pub trait Issuer {
    /// Returns the issuer name exactly as it must appear in issued certificates.
    fn issuer_name(&self) -> Result<Name, CryptoError>;

    /// Returns the signing key of the issuer.
    fn signing_key(&self) -> &KeyPair;

    /// The issuing certificate's own issuer name and serial, for the
    /// authority key identifier. `None` when issuing a self-signed certificate.
    fn authority_cert(&self) -> Option<(Name, Vec<u8>)>;

    /// Issues a certificate based on the provided certification request information.
    ///
    /// BasicConstraints, KeyUsage, SubjectKeyIdentifier and
    /// AuthorityKeyIdentifier are always set by the issuer; requested
    /// extensions with those OIDs are dropped. Other requested extensions are
    /// kept, first occurrence wins.
    ///
    /// # Arguments
    /// * `cert_request` - The certification request information containing details about the certificate to be issued.
    /// * `validity` - The validity period.
    /// * `serial` - The serial number reserved for this certificate.
    ///
    /// # Returns
    /// A `Certificate` object representing the issued certificate.
    fn issue(
        &self,
        cert_request: &CertificationRequestInfo,
        validity: Validity,
        serial: &Serial,
    ) -> Result<Certificate, CryptoError> {
        let signature_algo = SignatureAlgorithm::Sha256WithRSA;

        let (authority_cert_issuer, authority_cert_serial_number) = match self.authority_cert() {
            Some((name, serial)) => (Some(name), serial),
            None => (None, Vec::new()),
        };
        let authority_key_id = AuthorityKeyIdentifier {
            key_identifier: self.signing_key().public_key().key_identifier()?,
            authority_cert_issuer,
            authority_cert_serial_number,
        };
        let subject_key_id =
            SubjectKeyIdentifier(cert_request.subject_public_key.key_identifier()?);

        let basic_constraints = BasicConstraints {
            is_ca: cert_request.is_ca,
            max_path_length: None,
        };
        let key_usage = if cert_request.is_ca {
            KeyUsage::certificate_authority()
        } else {
            KeyUsage::server_leaf()
        };

        let mut extensions: Vec<ExtensionParam> = vec![
            ExtensionParam::from_extension(basic_constraints, cert_request.is_ca)?,
            ExtensionParam::from_extension(key_usage, cert_request.is_ca)?,
            ExtensionParam::from_extension(subject_key_id, false)?,
            ExtensionParam::from_extension(authority_key_id, false)?,
        ];

        for requested in &cert_request.extensions {
            if !extensions.iter().any(|ext| ext.oid == requested.oid) {
                extensions.push(requested.clone());
            }
        }

        let tbs_cert = TbsCertificate {
            serial_number: serial.clone(),
            signature_algorithm: signature_algo,
            issuer: self.issuer_name()?,
            validity,
            subject: cert_request.subject.clone(),
            subject_public_key: cert_request.subject_public_key.clone(),
            extensions,
        };

        let tbs_cert_inner = tbs_cert.to_tbs_certificate_inner()?;
        let signature = self.signing_key().sign_data(&der::Encode::to_der(&tbs_cert_inner)?)?;

        let cert_inner = CertificateInner {
            signature_algorithm: tbs_cert_inner.signature.clone(),
            tbs_certificate: tbs_cert_inner,
            signature: BitString::from_bytes(&signature)?,
        };

        Ok(Certificate { inner: cert_inner })
    }
}

/// OIDs the issuer always controls, whatever a request asks for.
pub fn is_issuer_controlled(oid: &const_oid::ObjectIdentifier) -> bool {
    [
        BasicConstraints::OID,
        KeyUsage::OID,
        SubjectKeyIdentifier::OID,
        AuthorityKeyIdentifier::OID,
    ]
    .contains(oid)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cert::CertificateWithPrivateKey;
    use crate::cert::extensions::SubjectAltName;
    use crate::cert::params::DistinguishedName;
    use crate::key::MIN_RSA_BITS;

    fn dn(cn: &str) -> DistinguishedName {
        DistinguishedName {
            common_name: cn.to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn leaf_cannot_request_ca_constraints() {
        let root_key = KeyPair::generate_rsa(MIN_RSA_BITS).unwrap();
        let root_info = CertificationRequestInfo::builder()
            .subject(dn("Root"))
            .subject_public_key(root_key.public_key())
            .is_ca(true)
            .build();
        let root = CertificateWithPrivateKey {
            cert: Certificate::new_self_signed(
                &root_info,
                &root_key,
                Validity::for_days(30).unwrap(),
                &Serial::from_bytes(&[7]).unwrap(),
            )
            .unwrap(),
            key: root_key,
        };

        let leaf_key = KeyPair::generate_rsa(MIN_RSA_BITS).unwrap();
        let san = SubjectAltName {
            names: vec!["svc.local".to_string()],
            ip_addresses: Vec::new(),
        };
        let request = CertificationRequestInfo::builder()
            .subject(dn("svc.local"))
            .subject_public_key(leaf_key.public_key())
            .extensions(vec![
                ExtensionParam::from_extension(
                    BasicConstraints {
                        is_ca: true,
                        max_path_length: None,
                    },
                    true,
                )
                .unwrap(),
                ExtensionParam::from_extension(san.clone(), false).unwrap(),
            ])
            .build();

        let leaf = root
            .issue(&request, Validity::for_days(5).unwrap(), &Serial::from_bytes(&[8]).unwrap())
            .unwrap();
        leaf.verify_signed_by(&root.cert).unwrap();
        assert!(!leaf.is_ca());
        assert_eq!(leaf.is_extension_critical::<BasicConstraints>(), Some(false));
        assert_eq!(leaf.subject_alt_name().unwrap(), san);
        assert_eq!(leaf.issuer_name(), root.cert.subject_name());

        let aki = leaf.extension::<AuthorityKeyIdentifier>().unwrap().unwrap();
        assert_eq!(Some(aki.key_identifier), root.cert.subject_key_identifier().unwrap());
        assert_eq!(aki.authority_cert_serial_number, vec![7]);
        assert_eq!(aki.authority_cert_issuer.as_ref(), Some(root.cert.issuer_name()));
        assert!(is_issuer_controlled(&BasicConstraints::OID));
        assert!(!is_issuer_controlled(&SubjectAltName::OID));
    }
}
