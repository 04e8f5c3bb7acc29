//! Serving Certificate Signing Module
//!
//! Turns a certificate request into an end-entity certificate signed by the
//! root CA:
//!
//! **Certificate Chain**: Root CA → Serving Certificate
//!
//! # X.509 Extensions
//! - **Basic Constraints**: CA=false (critical)
//! - **Key Usage**: `digitalSignature` (critical)
//! - **Extended Key Usage**: `clientAuth`, `serverAuth`
//! - **Subject Alternative Name**: DNS names copied from the request. Other
//!   extensions the request asks for are ignored.
//! - **Key identifiers**: subject key id, and authority key id of the CA
//!
//! Validity is 18 months from issuance, and never extends past the CA's own
//! expiry. Signing fails when the CA is expired or not yet valid.

use std::cmp::Ordering;

use openssl::hash::MessageDigest;
use openssl::x509::extension::{
    AuthorityKeyIdentifier, BasicConstraints, ExtendedKeyUsage, KeyUsage, SubjectAlternativeName,
    SubjectKeyIdentifier,
};
use openssl::x509::X509;

use crate::certificate::{random_serial, validity_window, Certificate, CertificateRequest, X509_VERSION_3};
use crate::error::{PkiError, Result};
use crate::keygen::KeyPair;

/// 1 year 6 months
pub const SERVER_CERT_VALIDITY_MONTHS: u32 = 18;

/// Sign a PEM certificate request with the PEM CA certificate and key.
///
/// # Errors
/// - [`PkiError::Decode`]: a PEM input is empty, malformed or of the wrong type
/// - [`PkiError::Parse`]: the CA certificate or CSR DER is malformed, or the
///   CSR's self-signature does not verify
/// - [`PkiError::Sign`]: the certificate could not be built or signed
pub fn sign_request(ca_certificate: &str, ca_private_key: &str, csr: &str) -> Result<Certificate> {
    let ca_cert = Certificate::from_pem(ca_certificate)?;
    let ca_key = KeyPair::from_pem(ca_private_key)?;
    let request = CertificateRequest::from_pem(csr)?;
    sign(&ca_cert, &ca_key, &request)
}

/// Sign an already decoded request.
pub fn sign(ca_cert: &Certificate, ca_key: &KeyPair, request: &CertificateRequest) -> Result<Certificate> {
    if !request.verify_signature()? {
        return Err(PkiError::Parse("CSR signature does not verify".to_string()));
    }
    let dns_names = request.dns_names()?;
    let request_key = request.public_key()?;
    let ca = ca_cert.x509();

    let mut builder =
        X509::builder().map_err(|e| PkiError::sign("Failed to create X509 builder", e))?;

    builder
        .set_version(X509_VERSION_3)
        .map_err(|e| PkiError::sign("Failed to set version", e))?;

    let serial = random_serial().map_err(|e| PkiError::sign("Failed to generate serial", e))?;
    builder
        .set_serial_number(&serial)
        .map_err(|e| PkiError::sign("Failed to set serial", e))?;

    builder
        .set_subject_name(request.req().subject_name())
        .map_err(|e| PkiError::sign("Failed to set subject", e))?;

    // Issuer is the CA's subject, not the CA's issuer
    builder
        .set_issuer_name(ca.subject_name())
        .map_err(|e| PkiError::sign("Failed to set issuer from CA", e))?;

    let (not_before, not_after) = validity_window(SERVER_CERT_VALIDITY_MONTHS)
        .map_err(|e| PkiError::sign("Failed to compute validity", e))?;
    let ca_expired = ca
        .not_after()
        .compare(&not_before)
        .map_err(|e| PkiError::sign("Failed to compare validity", e))?
        != Ordering::Greater;
    if ca_expired {
        return Err(PkiError::Sign(format!(
            "CA certificate expired at {}",
            ca.not_after()
        )));
    }
    let ca_not_yet_valid = ca
        .not_before()
        .compare(&not_before)
        .map_err(|e| PkiError::sign("Failed to compare validity", e))?
        == Ordering::Greater;
    if ca_not_yet_valid {
        return Err(PkiError::Sign(format!(
            "CA certificate is not valid before {}",
            ca.not_before()
        )));
    }
    let outlives_ca = not_after
        .compare(ca.not_after())
        .map_err(|e| PkiError::sign("Failed to compare validity", e))?
        == Ordering::Greater;
    builder
        .set_not_before(&not_before)
        .map_err(|e| PkiError::sign("Failed to set not_before", e))?;
    if outlives_ca {
        tracing::warn!("CA expires before the default serving certificate lifetime, clamping not_after");
        builder
            .set_not_after(ca.not_after())
            .map_err(|e| PkiError::sign("Failed to set not_after", e))?;
    } else {
        builder
            .set_not_after(&not_after)
            .map_err(|e| PkiError::sign("Failed to set not_after", e))?;
    }

    builder
        .set_pubkey(&request_key)
        .map_err(|e| PkiError::sign("Failed to set public key", e))?;

    let bc = BasicConstraints::new()
        .critical()
        .build()
        .map_err(|e| PkiError::sign("Failed to build BasicConstraints", e))?;
    builder
        .append_extension(bc)
        .map_err(|e| PkiError::sign("Failed to add BasicConstraints", e))?;

    let ku = KeyUsage::new()
        .critical()
        .digital_signature()
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

    if !dns_names.is_empty() {
        let mut san = SubjectAlternativeName::new();
        for dns in &dns_names {
            san.dns(dns);
        }
        let san = san
            .build(&builder.x509v3_context(Some(ca), None))
            .map_err(|e| PkiError::sign("Failed to build SubjectAlternativeName", e))?;
        builder
            .append_extension(san)
            .map_err(|e| PkiError::sign("Failed to add SubjectAlternativeName", e))?;
    }

    let ski = SubjectKeyIdentifier::new()
        .build(&builder.x509v3_context(Some(ca), None))
        .map_err(|e| PkiError::sign("Failed to build SubjectKeyIdentifier", e))?;
    builder
        .append_extension(ski)
        .map_err(|e| PkiError::sign("Failed to add SubjectKeyIdentifier", e))?;

    // keyid needs the CA's subject key id; fall back to issuer name + serial
    let mut aki = AuthorityKeyIdentifier::new();
    if ca.subject_key_id().is_some() {
        aki.keyid(false);
    } else {
        aki.issuer(true);
    }
    let aki = aki
        .build(&builder.x509v3_context(Some(ca), None))
        .map_err(|e| PkiError::sign("Failed to build AuthorityKeyIdentifier", e))?;
    builder
        .append_extension(aki)
        .map_err(|e| PkiError::sign("Failed to add AuthorityKeyIdentifier", e))?;

    // Sign with the CA's private key
    builder
        .sign(ca_key.private_key(), MessageDigest::sha384())
        .map_err(|e| PkiError::sign("Failed to sign certificate", e))?;

    let certificate = Certificate::from_x509(builder.build())?;
    tracing::info!(dns_names = ?dns_names, "issued serving certificate signed by CA");
    Ok(certificate)
}
