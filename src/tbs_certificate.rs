use std::time::SystemTime;

use der::Encode;
use der::asn1::{GeneralizedTime, UtcTime};
use time::OffsetDateTime;
use x509_cert::Version;
use x509_cert::certificate::TbsCertificateInner;
use x509_cert::name::Name;
use x509_cert::serial_number::SerialNumber;
use x509_cert::time::Time;

use crate::cert::SignatureAlgorithm;
use crate::cert::params::{DistinguishedName, ExtensionParam, Validity};
use crate::error::CryptoError;
use crate::key::PublicKey;
use crate::serial::Serial;

/// Dates from this year on must be encoded as GeneralizedTime (RFC 5280 4.1.2.5).
const UTC_TIME_LIMIT_YEAR: u16 = 2050;

/// Represents the "To Be Signed" (TBS) portion of an X.509 certificate.
/// This struct contains all the fields required to generate a valid X.509 certificate.
///
/// # Fields
/// * `serial_number` - The unique identifier for the certificate.
/// * `signature_algorithm` - The algorithm used to sign the certificate.
/// * `issuer` - The issuer name, copied verbatim from the issuing certificate's subject.
/// * `validity` - The certificate's validity period.
/// * `subject` - The distinguished name of the certificate subject.
/// * `subject_public_key` - The public key of the certificate subject.
/// * `extensions` - Additional X.509 extensions for the certificate.
pub struct TbsCertificate {
    pub serial_number: Serial,
    pub signature_algorithm: SignatureAlgorithm,
    pub issuer: Name,
    pub validity: Validity,
    pub subject: DistinguishedName,
    pub subject_public_key: PublicKey,
    pub extensions: Vec<ExtensionParam>,
}

impl TbsCertificate {
    /// Converts the `TbsCertificate` into a `TbsCertificateInner` for DER encoding.
    ///
    /// # Returns
    /// A `TbsCertificateInner` object suitable for DER encoding.
    pub fn to_tbs_certificate_inner(&self) -> Result<TbsCertificateInner, CryptoError> {
        let extensions = self
            .extensions
            .iter()
            .map(ExtensionParam::to_x509)
            .collect::<Result<Vec<_>, _>>()?;

        let validity = x509_cert::time::Validity {
            not_before: encode_time(self.validity.not_before)?,
            not_after: encode_time(self.validity.not_after)?,
        };

        Ok(TbsCertificateInner {
            version: Version::V3,
            serial_number: SerialNumber::new(self.serial_number.as_bytes())?,
            signature: self.signature_algorithm.clone().into(),
            issuer: self.issuer.clone(),
            validity,
            subject: self.subject.as_x509_name()?,
            subject_public_key_info: self.subject_public_key.to_spki()?,
            issuer_unique_id: None,
            subject_unique_id: None,
            extensions: (!extensions.is_empty()).then_some(extensions),
        })
    }

    /// Creates a `TbsCertificate` from a `TbsCertificateInner`.
    ///
    /// # Arguments
    /// * `inner` - The `TbsCertificateInner` object to convert from.
    pub fn from_tbs_certificate_inner(inner: &TbsCertificateInner) -> Result<Self, CryptoError> {
        let signature_algorithm = SignatureAlgorithm::try_from(&inner.signature)?;

        Ok(Self {
            serial_number: Serial::from_bytes(inner.serial_number.as_bytes())?,
            signature_algorithm,
            issuer: inner.issuer.clone(),
            validity: decode_validity(&inner.validity),
            subject: DistinguishedName::from_x509_name(&inner.subject),
            subject_public_key: PublicKey::from_x509spki(&inner.subject_public_key_info)?,
            extensions: inner
                .extensions
                .iter()
                .flatten()
                .map(ExtensionParam::from)
                .collect(),
        })
    }

    /// Encodes the `TbsCertificate` into DER format.
    pub fn to_der(&self) -> Result<Vec<u8>, CryptoError> {
        Ok(self.to_tbs_certificate_inner()?.to_der()?)
    }
}

/// UTCTime through 2049, GeneralizedTime afterwards.
fn encode_time(at: OffsetDateTime) -> Result<Time, CryptoError> {
    let date_time = der::DateTime::from_system_time(SystemTime::from(at))
        .map_err(|e| CryptoError::EncodingError(format!("time {at} out of range: {e}")))?;
    if date_time.year() < UTC_TIME_LIMIT_YEAR {
        Ok(Time::UtcTime(UtcTime::from_date_time(date_time)?))
    } else {
        Ok(Time::GeneralTime(GeneralizedTime::from_date_time(date_time)))
    }
}

pub(crate) fn decode_validity(validity: &x509_cert::time::Validity) -> Validity {
    Validity {
        not_before: OffsetDateTime::from(validity.not_before.to_system_time()),
        not_after: OffsetDateTime::from(validity.not_after.to_system_time()),
    }
}
