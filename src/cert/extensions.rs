use std::fmt;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

use const_oid::AssociatedOid;
pub use der::flagset::FlagSet;
use der::{
    Decode, Encode,
    asn1::{Ia5String, OctetString},
    oid::ObjectIdentifier,
};
use x509_cert::ext::pkix::KeyUsage as X509KeyUsage;
pub use x509_cert::ext::pkix::KeyUsages;
use x509_cert::ext::pkix::name::GeneralName;
use x509_cert::name::Name;

use crate::error::CryptoError;

/// Trait for converting to and from X.509 extensions.
///
/// This trait provides methods to encode and decode X.509 extension values.
///
/// # Example
/// ```
/// use localca::cert::extensions::{SubjectAltName, ToAndFromX509Extension};
/// let san = SubjectAltName {
///     names: vec!["example.com".to_string()],
///     ip_addresses: vec!["10.0.0.5".parse().unwrap()],
/// };
/// let encoded = san.to_x509_extension_value().unwrap();
/// let decoded = SubjectAltName::from_x509_extension_value(&encoded).unwrap();
/// assert_eq!(san, decoded);
/// ```
pub trait ToAndFromX509Extension {
    /// The Object Identifier (OID) for the extension.
    const OID: ObjectIdentifier;

    /// Encodes the extension into a DER-encoded byte vector.
    fn to_x509_extension_value(&self) -> Result<Vec<u8>, CryptoError>;

    /// Decodes the extension from a DER-encoded byte slice.
    fn from_x509_extension_value(extension: &[u8]) -> Result<Self, CryptoError>
    where
        Self: Sized;
}

/// Represents the Subject Alternative Name (SAN) extension.
///
/// This extension specifies additional identities for the subject of the certificate.
/// DNS names are encoded before IP addresses, each group in the given order.
///
/// # Fields
/// * `names` - A list of DNS names (wildcard patterns included).
/// * `ip_addresses` - A list of IPv4/IPv6 addresses.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SubjectAltName {
    pub names: Vec<String>,
    pub ip_addresses: Vec<IpAddr>,
}

impl ToAndFromX509Extension for SubjectAltName {
    const OID: ObjectIdentifier = x509_cert::ext::pkix::SubjectAltName::OID;

    fn to_x509_extension_value(&self) -> Result<Vec<u8>, CryptoError> {
        let mut general_names = self
            .names
            .iter()
            .map(|name| {
                Ia5String::try_from(name.clone())
                    .map(GeneralName::DnsName)
                    .map_err(|e| CryptoError::InvalidInput(e.to_string()))
            })
            .collect::<Result<Vec<_>, _>>()?;

        for ip in &self.ip_addresses {
            let octets = match ip {
                IpAddr::V4(v4) => v4.octets().to_vec(),
                IpAddr::V6(v6) => v6.octets().to_vec(),
            };
            general_names.push(GeneralName::IpAddress(OctetString::new(octets)?));
        }

        let san = x509_cert::ext::pkix::SubjectAltName(general_names);
        Ok(san.to_der()?)
    }

    fn from_x509_extension_value(extension: &[u8]) -> Result<Self, CryptoError> {
        let san = x509_cert::ext::pkix::SubjectAltName::from_der(extension)?;
        let mut decoded = Self::default();
        for name in san.0.iter() {
            match name {
                GeneralName::DnsName(dns) => decoded.names.push(dns.to_string()),
                GeneralName::IpAddress(octets) => {
                    decoded.ip_addresses.push(ip_from_octets(octets.as_bytes())?)
                }
                _ => {
                    return Err(CryptoError::InvalidInput(
                        "Unsupported general name type".to_string(),
                    ));
                }
            }
        }
        Ok(decoded)
    }
}

fn ip_from_octets(octets: &[u8]) -> Result<IpAddr, CryptoError> {
    if let Ok(v4) = <[u8; 4]>::try_from(octets) {
        return Ok(IpAddr::V4(Ipv4Addr::from(v4)));
    }
    if let Ok(v6) = <[u8; 16]>::try_from(octets) {
        return Ok(IpAddr::V6(Ipv6Addr::from(v6)));
    }
    Err(CryptoError::DecodingError(format!(
        "IP address SAN has {} octets",
        octets.len()
    )))
}

impl fmt::Display for SubjectAltName {
    /// OpenSSL-style rendering, e.g. `DNS:svc.local, IP:10.0.0.5`.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let entries = self
            .names
            .iter()
            .map(|name| format!("DNS:{name}"))
            .chain(self.ip_addresses.iter().map(|ip| format!("IP:{ip}")))
            .collect::<Vec<_>>();
        f.write_str(&entries.join(", "))
    }
}

/// Represents the Basic Constraints extension.
///
/// This extension indicates whether the certificate is a CA certificate and its path length.
///
/// # Fields
/// * `is_ca` - Indicates if the certificate is a CA.
/// * `max_path_length` - The maximum number of intermediate CAs allowed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BasicConstraints {
    pub is_ca: bool,
    pub max_path_length: Option<u32>,
}

impl ToAndFromX509Extension for BasicConstraints {
    const OID: ObjectIdentifier = x509_cert::ext::pkix::BasicConstraints::OID;

    fn to_x509_extension_value(&self) -> Result<Vec<u8>, CryptoError> {
        let path_len_constraint = self
            .max_path_length
            .map(u8::try_from)
            .transpose()
            .map_err(|e| CryptoError::InvalidInput(e.to_string()))?;
        let bc = x509_cert::ext::pkix::BasicConstraints {
            ca: self.is_ca,
            path_len_constraint,
        };

        Ok(bc.to_der()?)
    }

    fn from_x509_extension_value(der_bytes: &[u8]) -> Result<Self, CryptoError> {
        let bc = x509_cert::ext::pkix::BasicConstraints::from_der(der_bytes)?;
        Ok(Self {
            is_ca: bc.ca,
            max_path_length: bc.path_len_constraint.map(u32::from),
        })
    }
}

/// Represents the Key Usage extension.
///
/// This extension defines the purpose of the key contained in the certificate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyUsage(pub FlagSet<KeyUsages>);

impl KeyUsage {
    /// `keyCertSign, cRLSign`: what a root needs to sign certificates.
    pub fn certificate_authority() -> Self {
        Self(KeyUsages::KeyCertSign | KeyUsages::CRLSign)
    }

    /// `digitalSignature, nonRepudiation, keyEncipherment, dataEncipherment`.
    pub fn server_leaf() -> Self {
        Self(
            KeyUsages::DigitalSignature
                | KeyUsages::NonRepudiation
                | KeyUsages::KeyEncipherment
                | KeyUsages::DataEncipherment,
        )
    }
}

impl ToAndFromX509Extension for KeyUsage {
    const OID: ObjectIdentifier = <X509KeyUsage as AssociatedOid>::OID;

    fn to_x509_extension_value(&self) -> Result<Vec<u8>, CryptoError> {
        let ku = X509KeyUsage::from(self.0);
        Ok(ku.to_der()?)
    }

    fn from_x509_extension_value(extension: &[u8]) -> Result<Self, CryptoError> {
        let ku = X509KeyUsage::from_der(extension)?;
        Ok(Self(ku.0))
    }
}

/// Represents the Subject Key Identifier (SKI) extension.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubjectKeyIdentifier(pub Vec<u8>);

impl ToAndFromX509Extension for SubjectKeyIdentifier {
    const OID: ObjectIdentifier = x509_cert::ext::pkix::SubjectKeyIdentifier::OID;

    fn to_x509_extension_value(&self) -> Result<Vec<u8>, CryptoError> {
        let ski = x509_cert::ext::pkix::SubjectKeyIdentifier(OctetString::new(self.0.clone())?);
        Ok(ski.to_der()?)
    }

    fn from_x509_extension_value(extension: &[u8]) -> Result<Self, CryptoError> {
        let ski = x509_cert::ext::pkix::SubjectKeyIdentifier::from_der(extension)?;
        Ok(Self(ski.0.as_bytes().to_vec()))
    }
}

/// Represents the Authority Key Identifier (AKI) extension.
///
/// This extension identifies the public key corresponding to the private key used to sign the certificate.
/// `authority_cert_issuer` and `authority_cert_serial_number` describe the
/// issuer's own certificate (its issuer name and its serial) and are encoded
/// only as a pair.
///
/// # Fields
/// * `key_identifier` - The key identifier.
/// * `authority_cert_issuer` - The name of the issuer of the issuing certificate.
/// * `authority_cert_serial_number` - The issuing certificate's serial number.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthorityKeyIdentifier {
    pub key_identifier: Vec<u8>,
    pub authority_cert_issuer: Option<Name>,
    pub authority_cert_serial_number: Vec<u8>,
}

impl ToAndFromX509Extension for AuthorityKeyIdentifier {
    const OID: ObjectIdentifier = x509_cert::ext::pkix::AuthorityKeyIdentifier::OID;

    fn to_x509_extension_value(&self) -> Result<Vec<u8>, CryptoError> {
        let (authority_cert_issuer, authority_cert_serial_number) = match &self
            .authority_cert_issuer
        {
            Some(issuer) if !self.authority_cert_serial_number.is_empty() => (
                Some(vec![GeneralName::DirectoryName(issuer.clone())]),
                Some(x509_cert::serial_number::SerialNumber::new(
                    self.authority_cert_serial_number.as_slice(),
                )?),
            ),
            _ => (None, None),
        };

        let aki = x509_cert::ext::pkix::AuthorityKeyIdentifier {
            key_identifier: Some(OctetString::new(self.key_identifier.as_slice())?),
            authority_cert_issuer,
            authority_cert_serial_number,
        };

        Ok(aki.to_der()?)
    }

    fn from_x509_extension_value(extension: &[u8]) -> Result<Self, CryptoError> {
        let aki = x509_cert::ext::pkix::AuthorityKeyIdentifier::from_der(extension)?;

        let authority_cert_issuer = aki.authority_cert_issuer.as_ref().and_then(|names| {
            names.iter().find_map(|name| match name {
                GeneralName::DirectoryName(dn) => Some(dn.clone()),
                _ => None,
            })
        });

        Ok(Self {
            key_identifier: aki
                .key_identifier
                .map(|id| id.as_bytes().to_vec())
                .unwrap_or_default(),
            authority_cert_issuer,
            authority_cert_serial_number: aki
                .authority_cert_serial_number
                .map(|sn| sn.as_bytes().to_vec())
                .unwrap_or_default(),
        })
    }
}
