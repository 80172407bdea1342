use bon::Builder;
use const_oid::ObjectIdentifier;
use der::asn1::SetOfVec;
use der::{Any, Tag, Tagged};
use time::Duration;
use time::OffsetDateTime;
use x509_cert::attr::AttributeTypeAndValue;
use x509_cert::name::{Name, RdnSequence, RelativeDistinguishedName};

use super::extensions::ToAndFromX509Extension;
use crate::error::CryptoError;
use crate::key::PublicKey;

const COUNTRY: ObjectIdentifier = ObjectIdentifier::new_unwrap("2.5.4.6");
const STATE: ObjectIdentifier = ObjectIdentifier::new_unwrap("2.5.4.8");
const LOCALITY: ObjectIdentifier = ObjectIdentifier::new_unwrap("2.5.4.7");
const ORGANIZATION: ObjectIdentifier = ObjectIdentifier::new_unwrap("2.5.4.10");
const ORGANIZATION_UNIT: ObjectIdentifier = ObjectIdentifier::new_unwrap("2.5.4.11");
const COMMON_NAME: ObjectIdentifier = ObjectIdentifier::new_unwrap("2.5.4.3");

/// Parameters for building an X.509 certificate.
///
/// This struct contains the subject, public key, and optional extensions for the certificate.
///
/// # Fields
/// * `subject` - The distinguished name of the certificate subject.
/// * `subject_public_key` - The public key of the certificate subject.
/// * `is_ca` - Indicates if the certificate is a CA.
/// * `extensions` - Additional X.509 extensions, such as the subject alternative names.
#[derive(Clone, Debug, Builder)]
pub struct CertificationRequestInfo {
    pub subject: DistinguishedName,
    pub subject_public_key: PublicKey,
    #[builder(default)]
    pub is_ca: bool,
    #[builder(default)]
    pub extensions: Vec<ExtensionParam>,
}

/// Distinguished name parameters for building an X.509 certificate.
///
/// This struct represents the subject or issuer name in a certificate.
///
/// # Fields
/// * `common_name` - The common name (CN).
/// * `country` - The country (C), two letters.
/// * `state` - The state or province (ST).
/// * `locality` - The locality or city (L).
/// * `organization` - The organization (O).
/// * `organization_unit` - The organizational unit (OU).
#[derive(Clone, Debug, Builder, Default, PartialEq, Eq)]
pub struct DistinguishedName {
    pub common_name: String,
    pub country: Option<String>,
    pub state: Option<String>,
    pub locality: Option<String>,
    pub organization: Option<String>,
    pub organization_unit: Option<String>,
}

impl DistinguishedName {
    /// Converts the distinguished name to an X.509-compatible format.
    ///
    /// Attributes are emitted in `C, ST, L, O, OU, CN` order; absent or empty
    /// attributes are left out. The country is a PrintableString, everything
    /// else a UTF8String.
    ///
    /// # Returns
    /// An `x509_cert::name::Name` object.
    pub fn as_x509_name(&self) -> Result<Name, CryptoError> {
        let attributes = [
            (COUNTRY, self.country.as_deref()),
            (STATE, self.state.as_deref()),
            (LOCALITY, self.locality.as_deref()),
            (ORGANIZATION, self.organization.as_deref()),
            (ORGANIZATION_UNIT, self.organization_unit.as_deref()),
            (COMMON_NAME, Some(self.common_name.as_str())),
        ];

        let mut rdns = Vec::new();
        for (oid, value) in attributes {
            let Some(value) = value.filter(|v| !v.is_empty()) else {
                continue;
            };
            let tag = if oid == COUNTRY {
                Tag::PrintableString
            } else {
                Tag::Utf8String
            };
            let atv = AttributeTypeAndValue {
                oid,
                value: Any::new(tag, value.as_bytes())?,
            };
            rdns.push(RelativeDistinguishedName(SetOfVec::try_from(vec![atv])?));
        }
        Ok(RdnSequence(rdns))
    }

    /// Creates a `DistinguishedName` from an X.509-compatible format.
    ///
    /// Attributes other than the six modelled here are ignored, as are values
    /// that are not string types.
    ///
    /// # Arguments
    /// * `x509dn` - An `x509_cert::name::Name` object.
    ///
    /// # Returns
    /// A `DistinguishedName` object.
    pub fn from_x509_name(x509dn: &Name) -> Self {
        let mut dn = DistinguishedName::default();

        for rdn in x509dn.0.iter() {
            for attr in rdn.0.iter() {
                let Some(value) = attribute_string(&attr.value) else {
                    continue;
                };
                match attr.oid {
                    COMMON_NAME => dn.common_name = value,
                    COUNTRY => dn.country = Some(value),
                    STATE => dn.state = Some(value),
                    LOCALITY => dn.locality = Some(value),
                    ORGANIZATION => dn.organization = Some(value),
                    ORGANIZATION_UNIT => dn.organization_unit = Some(value),
                    _ => {}
                }
            }
        }

        dn
    }
}

fn attribute_string(value: &Any) -> Option<String> {
    match value.tag() {
        Tag::Utf8String | Tag::PrintableString | Tag::Ia5String | Tag::TeletexString => {
            String::from_utf8(value.value().to_vec()).ok()
        }
        _ => None,
    }
}

/// Certificate validity period.
///
/// This struct represents the `notBefore` and `notAfter` fields in a certificate.
///
/// # Fields
/// * `not_before` - The start of the validity period.
/// * `not_after` - The end of the validity period.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Validity {
    pub not_before: OffsetDateTime,
    pub not_after: OffsetDateTime,
}

impl Validity {
    /// Creates a validity period starting now for the given number of days.
    ///
    /// The start is truncated to whole seconds, the resolution certificates
    /// carry, so the encoded period is exactly `days` long.
    ///
    /// # Arguments
    /// * `days` - The number of days for the validity period.
    ///
    /// # Returns
    /// A `Validity` object, or `InvalidInput` if the end date is out of range.
    pub fn for_days(days: u32) -> Result<Self, CryptoError> {
        let now = OffsetDateTime::now_utc();
        let now = now - Duration::nanoseconds(i64::from(now.nanosecond()));
        let not_after = now
            .checked_add(Duration::days(i64::from(days)))
            .ok_or_else(|| {
                CryptoError::InvalidInput(format!("validity of {days} days is out of range"))
            })?;
        Ok(Self {
            not_before: now,
            not_after,
        })
    }

    /// Length of the period in whole days.
    pub fn days(&self) -> i64 {
        (self.not_after - self.not_before).whole_days()
    }
}

/// Represents an X.509 extension.
///
/// This struct contains the OID, criticality, and value of an extension.
///
/// # Fields
/// * `oid` - The object identifier of the extension.
/// * `critical` - Indicates if the extension is critical.
/// * `value` - The DER-encoded value of the extension.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ExtensionParam {
    pub oid: ObjectIdentifier,
    pub critical: bool,
    /// DER-encoded extension value
    pub value: Vec<u8>,
}

impl ExtensionParam {
    /// Creates an `ExtensionParam` from a specific extension.
    ///
    /// # Arguments
    /// * `extension` - The extension to encode.
    /// * `critical` - Indicates if the extension is critical.
    ///
    /// # Returns
    /// An `ExtensionParam` object, or the encoding error.
    pub fn from_extension<E: ToAndFromX509Extension>(
        extension: E,
        critical: bool,
    ) -> Result<Self, CryptoError> {
        Ok(Self {
            oid: E::OID,
            critical,
            value: extension.to_x509_extension_value()?,
        })
    }

    /// Decodes an `ExtensionParam` into a specific extension.
    ///
    /// # Returns
    /// A decoded extension object.
    pub fn to_extension<E: ToAndFromX509Extension>(&self) -> Result<E, CryptoError> {
        E::from_x509_extension_value(&self.value)
    }

    pub fn to_x509(&self) -> Result<x509_cert::ext::Extension, CryptoError> {
        Ok(x509_cert::ext::Extension {
            extn_id: self.oid,
            critical: self.critical,
            extn_value: der::asn1::OctetString::new(self.value.clone())?,
        })
    }
}

impl From<&x509_cert::ext::Extension> for ExtensionParam {
    fn from(ext: &x509_cert::ext::Extension) -> Self {
        Self {
            oid: ext.extn_id,
            critical: ext.critical,
            value: ext.extn_value.as_bytes().to_vec(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn distinguished_name_round_trip() {
        let dn = DistinguishedName::builder()
            .common_name("Test Root".to_string())
            .country("US".to_string())
            .state("California".to_string())
            .locality("San Francisco, CA".to_string())
            .organization("Test Org".to_string())
            .build();

        let name = dn.as_x509_name().unwrap();
        assert_eq!(name.0.len(), 5);
        assert_eq!(DistinguishedName::from_x509_name(&name), dn);
        assert_eq!(name.0[0].0.get(0).unwrap().value.tag(), Tag::PrintableString);
        assert_eq!(name.0[4].0.get(0).unwrap().oid, COMMON_NAME);
    }

    #[test]
    fn empty_attributes_are_omitted() {
        let dn = DistinguishedName {
            common_name: "svc.local".to_string(),
            organization: Some(String::new()),
            ..Default::default()
        };
        let name = dn.as_x509_name().unwrap();
        assert_eq!(name.0.len(), 1);
        assert_eq!(name.0[0].0.get(0).unwrap().value.tag(), Tag::Utf8String);
    }

    #[test]
    fn validity_spans_whole_days() {
        let validity = Validity::for_days(365).unwrap();
        assert_eq!(validity.days(), 365);
        assert_eq!(validity.not_before.nanosecond(), 0);
    }

    #[test]
    fn unrepresentable_validity_is_an_error() {
        assert!(matches!(
            Validity::for_days(4_000_000_000),
            Err(CryptoError::InvalidInput(_))
        ));
    }
}
