//! # localca - A Local Certificate Authority in Pure Rust
//!
//! localca creates a self-signed root CA, issues leaf certificates signed by
//! it (with DNS and IP subject alternative names) and packages them for
//! common servers: PEM key and certificate, full chain and PKCS#12. It is
//! built entirely on rustcrypto libraries; OpenSSL is only used by the tests
//! as an independent verifier.
//!
//! ## Store Layout
//!
//! ```text
//! <base>/root_ca/{rootCA.key, rootCA.crt, rootCA.srl}
//! <base>/issued_certs/<domain>/{privkey.pem, cert.pem, fullchain.pem, bundle.p12}
//! <base>/configs/<domain>.{request.toml, ext}
//! ```
//!
//! Wildcard domains live in `_wildcard.<domain>` so that `*.a.com` and
//! `a.com` never share a directory.
//!
//! ## Key Features
//!
//! - **Pure Rust**: RSA keys, CSRs, certificates and PKCS#12 without OpenSSL
//! - **Typed Inputs**: domains, root parameters and requests are validated on construction
//! - **Atomic Writes**: roots and bundles are staged and promoted in one rename
//! - **Pluggable Crypto**: everything goes through the [`provider::CryptoProvider`] trait
//! - **Renewal**: reissue a domain with a fresh key from its retained request
//!
//! ## Quick Start
//!
//! ### Creating a Root CA and Issuing a Certificate
//!
//! ```rust,no_run
//! use localca::{
//!     domain::DomainName,
//!     issue::{CertificateIssuer, SubjectRequest},
//!     provider::RustCryptoProvider,
//!     root_ca::{Overwrite, RootCaManager, RootCaParams},
//!     store::PkiStore,
//! };
//!
//! # fn main() -> Result<(), localca::error::Error> {
//! let store = PkiStore::open("/tmp/pki")?;
//! let provider = RustCryptoProvider::default();
//!
//! let params = RootCaParams::builder()
//!     .country("US")
//!     .organization("Example Corp")
//!     .common_name("Example Root")
//!     .build()?;
//! RootCaManager::new(&store, &provider).initialize(&params, Overwrite::Deny)?;
//!
//! let request = SubjectRequest::new(
//!     DomainName::parse("svc.local")?,
//!     Some("10.0.0.5".parse().unwrap()),
//!     365,
//! )?;
//! let issued = CertificateIssuer::new(&store, &provider).issue(&request, "changeit")?;
//! println!("issued {} into {}", issued.serial, issued.directory.display());
//! # Ok(())
//! # }
//! ```
//!
//! ### Working with the X.509 Toolkit Directly
//!
//! ```rust,no_run
//! use localca::{
//!     cert::{
//!         Certificate, CertificateWithPrivateKey,
//!         extensions::SubjectAltName,
//!         params::{CertificationRequestInfo, DistinguishedName, ExtensionParam, Validity},
//!     },
//!     issuer::Issuer,
//!     key::KeyPair,
//!     serial::Serial,
//! };
//!
//! # fn main() -> Result<(), localca::error::CryptoError> {
//! let ca_key = KeyPair::generate_rsa(2048)?;
//! let ca_info = CertificationRequestInfo::builder()
//!     .subject(DistinguishedName::builder().common_name("Example CA".to_string()).build())
//!     .subject_public_key(ca_key.public_key())
//!     .is_ca(true)
//!     .build();
//! let ca_cert = Certificate::new_self_signed(
//!     &ca_info,
//!     &ca_key,
//!     Validity::for_days(3650)?,
//!     &Serial::random_seed(),
//! )?;
//! let ca = CertificateWithPrivateKey { cert: ca_cert, key: ca_key };
//!
//! let server_key = KeyPair::generate_rsa(2048)?;
//! let san = SubjectAltName {
//!     names: vec!["server.example.com".to_string()],
//!     ip_addresses: vec![],
//! };
//! let server_info = CertificationRequestInfo::builder()
//!     .subject(DistinguishedName::builder().common_name("server.example.com".to_string()).build())
//!     .subject_public_key(server_key.public_key())
//!     .extensions(vec![ExtensionParam::from_extension(san, false)?])
//!     .build();
//! let server_cert = ca.issue(&server_info, Validity::for_days(365)?, &Serial::random_seed())?;
//! server_cert.verify_signed_by(&ca.cert)?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Error Handling
//!
//! Store operations return [`error::Error`]; the X.509 toolkit returns
//! [`error::CryptoError`], which converts into it.
//!
//! ```rust
//! use localca::{domain::DomainName, error::Error};
//!
//! match DomainName::parse("**.example.com") {
//!     Ok(domain) => println!("accepted {domain}"),
//!     Err(Error::InvalidInput(msg)) => println!("rejected: {msg}"),
//!     Err(e) => println!("other error: {e}"),
//! }
//! ```
//!
//! ## Module Organization
//!
//! - [`store`]: On-disk layout, locking, staging and the serial counter
//! - [`root_ca`]: Root CA creation and loading
//! - [`issue`]: Leaf issuance and renewal
//! - [`export`]: Full chain and PKCS#12 bundles
//! - [`provider`]: The crypto provider seam and its RustCrypto implementation
//! - [`domain`]: Domain validation and directory naming
//! - [`key`], [`cert`], [`request`], [`issuer`], [`tbs_certificate`]: The X.509 toolkit
//! - [`layout`], [`guide`]: Store summary and trust-installation guide
//! - [`config`], [`cli`]: Configuration file and command-line front end
//! - [`error`]: Error types

pub mod cert;
pub mod cli;
pub mod config;
pub mod domain;
pub mod error;
pub mod export;
pub mod guide;
pub mod issue;
pub mod issuer;
pub mod key;
pub mod layout;
pub mod pem_utils;
pub mod provider;
pub mod request;
pub mod root_ca;
pub mod serial;
pub mod store;
pub mod tbs_certificate;

pub use error::{CryptoError, Error, Result};
