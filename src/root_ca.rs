//! Root CA Certificate Module
//!
//! Builds the self-signed root certificate that anchors the webhook's trust
//! chain. The key is generated separately (see [`crate::keygen`]) so an
//! existing CA key can be reused to re-issue a missing CA certificate.
//!
//! # Chain Position
//! ```text
//! Root CA (self-signed) ← This module
//!   └── Serving certificate (signed by Root)
//! ```
//!
//! # Certificate Properties
//! - **Self-signed**: Issuer and subject are the same
//! - **Basic Constraints**: CA=true, critical
//! - **Key Usage**: digitalSignature, keyCertSign (critical)
//! - **Extended Key Usage**: clientAuth, serverAuth
//! - **Signature Algorithm**: SHA-384 with RSA
//! - **Default Validity**: 10 years
//! - **Serial Number**: random 128-bit
//!
//! # Example
//! ```rust,no_run
//! use webhook_certs::keygen::generate_key_pair;
//! use webhook_certs::root_ca::create_root_certificate;
//! # fn example() -> webhook_certs::Result<()> {
//! let ca_key = generate_key_pair(4096)?;
//! let ca_cert = create_root_certificate(&ca_key)?;
//! println!("{}", ca_cert.pem());
//! # Ok(())
//! # }
//! ```

use openssl::hash::MessageDigest;
use openssl::x509::extension::{BasicConstraints, ExtendedKeyUsage, KeyUsage, SubjectKeyIdentifier};
use openssl::x509::X509;

use crate::certificate::{random_serial, validity_window, Certificate, X509_VERSION_3};
use crate::error::{PkiError, Result};
use crate::keygen::KeyPair;
use crate::subject::{subject_name, CA_ORGANIZATION};

/// 10 years
pub const ROOT_CA_VALIDITY_MONTHS: u32 = 120;

/// Builder for the self-signed root CA certificate.
///
/// Defaults match what the webhook issues at startup; `organization` and
/// `validity_months` exist so tests and callers can build distinguishable
/// CAs without touching the issuing code.
pub struct RootCaBuilder<'a> {
    key: &'a KeyPair,
    organization: String,
    validity_months: u32,
}

impl<'a> RootCaBuilder<'a> {
    pub fn new(key: &'a KeyPair) -> Self {
        Self {
            key,
            organization: CA_ORGANIZATION.to_string(),
            validity_months: ROOT_CA_VALIDITY_MONTHS,
        }
    }

    /// Set the organization (O) for the certificate
    pub fn organization(mut self, org: impl Into<String>) -> Self {
        self.organization = org.into();
        self
    }

    /// Set validity period in calendar months
    pub fn validity_months(mut self, months: u32) -> Self {
        self.validity_months = months;
        self
    }

    /// Build and self-sign the root certificate.
    ///
    /// # Errors
    /// [`PkiError::Sign`] if any part of the template cannot be built or the
    /// signature fails.
    pub fn build(self) -> Result<Certificate> {
        let private_key = self.key.private_key();

        let mut builder =
            X509::builder().map_err(|e| PkiError::sign("Failed to create X509 builder", e))?;

        builder
            .set_version(X509_VERSION_3)
            .map_err(|e| PkiError::sign("Failed to set version", e))?;

        let serial = random_serial().map_err(|e| PkiError::sign("Failed to generate serial", e))?;
        builder
            .set_serial_number(&serial)
            .map_err(|e| PkiError::sign("Failed to set serial", e))?;

        let name = subject_name(&self.organization)
            .map_err(|e| PkiError::sign("Failed to build subject", e))?;
        builder
            .set_subject_name(&name)
            .map_err(|e| PkiError::sign("Failed to set subject", e))?;
        builder
            .set_issuer_name(&name)
            .map_err(|e| PkiError::sign("Failed to set issuer", e))?;

        let (not_before, not_after) = validity_window(self.validity_months)
            .map_err(|e| PkiError::sign("Failed to compute validity", e))?;
        builder
            .set_not_before(&not_before)
            .map_err(|e| PkiError::sign("Failed to set not_before", e))?;
        builder
            .set_not_after(&not_after)
            .map_err(|e| PkiError::sign("Failed to set not_after", e))?;

        builder
            .set_pubkey(private_key)
            .map_err(|e| PkiError::sign("Failed to set public key", e))?;

        let bc = BasicConstraints::new()
            .critical()
            .ca()
            .build()
            .map_err(|e| PkiError::sign("Failed to build BasicConstraints", e))?;
        builder
            .append_extension(bc)
            .map_err(|e| PkiError::sign("Failed to add BasicConstraints", e))?;

        let ku = KeyUsage::new()
            .critical()
            .digital_signature()
            .key_cert_sign()
            .build()
            .map_err(|e| PkiError::sign("Failed to build KeyUsage", e))?;
        builder
            .append_extension(ku)
            .map_err(|e| PkiError::sign("Failed to add KeyUsage", e))?;

        let eku = ExtendedKeyUsage::new()
            .client_auth()
            .server_auth()
            .build()
            .map_err(|e| PkiError::sign("Failed to build ExtendedKeyUsage", e))?;
        builder
            .append_extension(eku)
            .map_err(|e| PkiError::sign("Failed to add ExtendedKeyUsage", e))?;

        let ski = SubjectKeyIdentifier::new()
            .build(&builder.x509v3_context(None, None))
            .map_err(|e| PkiError::sign("Failed to build SubjectKeyIdentifier", e))?;
        builder
            .append_extension(ski)
            .map_err(|e| PkiError::sign("Failed to add SubjectKeyIdentifier", e))?;

        builder
            .sign(private_key, MessageDigest::sha384())
            .map_err(|e| PkiError::sign("Failed to sign certificate", e))?;

        let certificate = Certificate::from_x509(builder.build())?;
        tracing::info!(organization = %self.organization, "issued self-signed root CA certificate");
        Ok(certificate)
    }
}

/// Build the root CA certificate for `key` with the default template.
pub fn create_root_certificate(key: &KeyPair) -> Result<Certificate> {
    RootCaBuilder::new(key).build()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keygen::generate_key_pair;

    const SHA384_WITH_RSA: &str = "1.2.840.113549.1.1.12";

    #[test]
    fn test_root_is_self_signed_ca() {
        let key = generate_key_pair(2048).unwrap();
        let cert = create_root_certificate(&key).unwrap();
        let info = cert.info().unwrap();

        assert_eq!(info.issuer, info.subject);
        assert!(info.is_ca);
        assert!(info.subject.contains(CA_ORGANIZATION));
        assert!(cert.is_issued_by(&cert).unwrap());
    }

    #[test]
    fn test_root_extensions() {
        let key = generate_key_pair(2048).unwrap();
        let info = create_root_certificate(&key).unwrap().info().unwrap();

        assert!(info.digital_signature);
        assert!(info.key_cert_sign);
        assert!(info.client_auth);
        assert!(info.server_auth);
        assert_eq!(info.signature_algorithm, SHA384_WITH_RSA);
        assert!(info.dns_names.is_empty());
    }

    #[test]
    fn test_root_validity_ten_years() {
        let key = generate_key_pair(2048).unwrap();
        let info = create_root_certificate(&key).unwrap().info().unwrap();
        let days = info.validity_seconds() / 86_400;
        assert!((3651..=3654).contains(&days), "validity was {days} days");
    }

    #[test]
    fn test_root_public_key_matches_key() {
        let key = generate_key_pair(2048).unwrap();
        let cert = create_root_certificate(&key).unwrap();
        assert!(key.matches(&cert.public_key().unwrap()));
    }

    #[test]
    fn test_root_serials_differ() {
        let key = generate_key_pair(2048).unwrap();
        let a = create_root_certificate(&key).unwrap().info().unwrap();
        let b = create_root_certificate(&key).unwrap().info().unwrap();
        assert_ne!(a.serial, b.serial);
    }

    #[test]
    fn test_pem_round_trip_is_byte_identical() {
        let key = generate_key_pair(2048).unwrap();
        let cert = RootCaBuilder::new(&key)
            .organization("Round Trip CA")
            .validity_months(12)
            .build()
            .unwrap();
        let decoded = Certificate::from_pem(cert.pem()).unwrap();
        assert_eq!(decoded.pem(), cert.pem());
        assert_eq!(decoded.to_der().unwrap(), cert.to_der().unwrap());
    }
}
