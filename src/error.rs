//! Error types.
//!
//! Two layers: [`CryptoError`] covers everything the X.509 toolkit and the
//! crypto provider can fail at, and [`Error`] is the taxonomy surfaced by the
//! store, the root CA manager and the issuer.
//!
//! ```rust
//! use localca::error::Error;
//!
//! fn report(err: &Error) {
//!     if err.is_fatal() {
//!         eprintln!("aborting: {err}");
//!     } else {
//!         eprintln!("operation failed: {err}");
//!     }
//! }
//! ```

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Represents errors raised while building, encoding, signing or verifying
/// keys, requests and certificates.
#[derive(Debug, Error, Clone)]
pub enum CryptoError {
    /// Error during data encoding.
    #[error("Failed to encode data: {0}")]
    EncodingError(String),

    /// Error during data decoding.
    #[error("Failed to decode data: {0}")]
    DecodingError(String),

    /// Error due to invalid input.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Error during key generation.
    #[error("Key generation error: {0}")]
    KeyGenerationError(String),

    /// Error related to certificate or request contents, including failed
    /// signature verification.
    #[error("Certificate error: {0}")]
    CertificateError(String),

    /// Error from RSA operations.
    #[error("RSA error: {0}")]
    RsaError(String),
}

impl From<der::Error> for CryptoError {
    /// Converts a `der::Error` into a `CryptoError`.
    fn from(err: der::Error) -> Self {
        CryptoError::DecodingError(err.to_string())
    }
}

impl From<rsa::Error> for CryptoError {
    fn from(err: rsa::Error) -> Self {
        CryptoError::RsaError(err.to_string())
    }
}

impl From<rsa::pkcs1::Error> for CryptoError {
    fn from(err: rsa::pkcs1::Error) -> Self {
        CryptoError::RsaError(err.to_string())
    }
}

impl From<pkcs8::Error> for CryptoError {
    fn from(err: pkcs8::Error) -> Self {
        CryptoError::DecodingError(err.to_string())
    }
}

impl From<spki::Error> for CryptoError {
    fn from(err: spki::Error) -> Self {
        CryptoError::DecodingError(err.to_string())
    }
}

impl From<pem::PemError> for CryptoError {
    fn from(err: pem::PemError) -> Self {
        CryptoError::DecodingError(err.to_string())
    }
}

impl From<rsa::signature::Error> for CryptoError {
    fn from(err: rsa::signature::Error) -> Self {
        CryptoError::CertificateError(err.to_string())
    }
}

/// Errors surfaced by PKI store operations.
#[derive(Debug, Error)]
pub enum Error {
    /// The crypto provider cannot run on this host.
    #[error("Missing dependency: {0}")]
    DependencyMissing(String),

    /// Issuance was requested before a root CA exists.
    #[error("No root CA found in {}; initialize the root CA first", .0.display())]
    NoRootCa(PathBuf),

    /// Root CA material exists and overwriting it was not confirmed.
    #[error(
        "A root CA already exists in {}; overwriting it requires explicit confirmation",
        .0.display()
    )]
    RootCaExists(PathBuf),

    /// Key generation, encoding, signing or verification failed.
    #[error("Crypto provider error: {0}")]
    CryptoProvider(#[from] CryptoError),

    /// The OS refused access to a store path.
    #[error("Permission denied on {}: {source}", path.display())]
    FilesystemPermission {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Any other filesystem failure.
    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// A single input field was rejected.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Renewal was requested for a domain with no prior issuance.
    #[error("No certificate has been issued for {0}")]
    UnknownDomain(String),

    /// Another operation holds the store lock.
    #[error("PKI store is locked by another operation (remove {} if it is stale)", .0.display())]
    StoreLocked(PathBuf),

    /// Store contents violate an invariant.
    #[error("Corrupt PKI store: {0}")]
    CorruptStore(String),

    /// The configuration file could not be read or parsed.
    #[error("Configuration error: {0}")]
    Config(String),
}

impl Error {
    /// Maps an I/O error on `path`, singling out permission failures.
    pub fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        let path = path.into();
        if source.kind() == io::ErrorKind::PermissionDenied {
            Error::FilesystemPermission { path, source }
        } else {
            Error::Io { path, source }
        }
    }

    /// Structural and dependency errors abort the whole run; everything else
    /// only aborts the current operation.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Error::DependencyMissing(_)
                | Error::FilesystemPermission { .. }
                | Error::CorruptStore(_)
                | Error::Config(_)
        )
    }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn permission_denied_maps_to_filesystem_permission() {
        let err = Error::io(
            "/root/ca",
            io::Error::from(io::ErrorKind::PermissionDenied),
        );
        assert!(matches!(err, Error::FilesystemPermission { .. }));
        assert!(err.is_fatal());

        let err = Error::io("/root/ca", io::Error::from(io::ErrorKind::NotFound));
        assert!(matches!(err, Error::Io { .. }));
        assert!(!err.is_fatal());
    }

    #[test]
    fn issuance_errors_are_recoverable() {
        assert!(!Error::NoRootCa(PathBuf::from("x")).is_fatal());
        assert!(!Error::InvalidInput("days".into()).is_fatal());
        assert!(!Error::from(CryptoError::KeyGenerationError("rng".into())).is_fatal());
        assert!(Error::DependencyMissing("entropy".into()).is_fatal());
    }
}
