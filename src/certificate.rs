//! Certificate and certificate-request values.
//!
//! Both types keep the parsed OpenSSL structure next to its canonical PEM
//! encoding, so re-encoding a decoded certificate is byte-identical to the
//! PEM OpenSSL produced when it was issued. Field-level inspection
//! ([`CertificateInfo`]) goes through `x509-parser`, which exposes the
//! extensions OpenSSL's safe API does not.

use std::cmp::Ordering;
use std::fmt;

use chrono::{Months, Utc};
use openssl::asn1::{Asn1Integer, Asn1Time};
use openssl::bn::{BigNum, MsbOption};
use openssl::error::ErrorStack;
use openssl::pkey::{PKey, Public};
use openssl::x509::{X509Ref, X509Req, X509ReqRef, X509};
use x509_parser::prelude::{
    FromDer, GeneralName, ParsedExtension, X509Certificate, X509CertificationRequest, X509Error,
};

use crate::error::{PkiError, Result};

pub const CERTIFICATE_PEM_LABEL: &str = "CERTIFICATE";
pub const REQUEST_PEM_LABEL: &str = "CERTIFICATE REQUEST";

pub(crate) const X509_VERSION_3: i32 = 2; // X509 version 3 is represented by 2
pub(crate) const X509_REQ_VERSION_1: i32 = 0;
const SERIAL_BITS: i32 = 128;

/// Decode a single PEM block and check its label.
pub(crate) fn decode_block(input: &str, label: &str) -> Result<Vec<u8>> {
    if input.trim().is_empty() {
        return Err(PkiError::Decode(format!("no PEM block containing {label}")));
    }
    let block = pem::parse(input)
        .map_err(|e| PkiError::decode(&format!("failed to decode PEM block containing {label}"), e))?;
    if block.tag() != label {
        return Err(PkiError::Decode(format!(
            "expected PEM block of type {label}, found {}",
            block.tag()
        )));
    }
    Ok(block.into_contents())
}

/// Random 128-bit serial number
pub(crate) fn random_serial() -> std::result::Result<Asn1Integer, ErrorStack> {
    let mut serial = BigNum::new()?;
    serial.rand(SERIAL_BITS, MsbOption::MAYBE_ZERO, false)?;
    serial.to_asn1_integer()
}

/// Validity window starting now and lasting `months` calendar months.
pub(crate) fn validity_window(months: u32) -> std::result::Result<(Asn1Time, Asn1Time), String> {
    let now = Utc::now();
    let expiry = now
        .checked_add_months(Months::new(months))
        .ok_or_else(|| format!("validity of {months} months overflows"))?;
    let not_before = Asn1Time::from_unix(now.timestamp()).map_err(|e| e.to_string())?;
    let not_after = Asn1Time::from_unix(expiry.timestamp()).map_err(|e| e.to_string())?;
    Ok((not_before, not_after))
}

/// An issued X.509 certificate.
#[derive(Clone)]
pub struct Certificate {
    x509: X509,
    pem: String,
}

impl Certificate {
    pub(crate) fn from_x509(x509: X509) -> Result<Self> {
        let pem = x509
            .to_pem()
            .map_err(|e| PkiError::sign("Failed to encode certificate", e))
            .and_then(|bytes| {
                String::from_utf8(bytes).map_err(|e| PkiError::sign("Failed to encode certificate", e))
            })?;
        Ok(Self { x509, pem })
    }

    /// Decode a `CERTIFICATE` PEM block.
    ///
    /// # Errors
    /// [`PkiError::Decode`] when the PEM envelope is missing, malformed or of
    /// another type; [`PkiError::Parse`] when the DER inside is not a
    /// certificate.
    pub fn from_pem(input: &str) -> Result<Self> {
        let der = decode_block(input, CERTIFICATE_PEM_LABEL)?;
        let x509 = X509::from_der(&der).map_err(|e| PkiError::parse("parse cert", e))?;
        Self::from_x509(x509)
    }

    pub fn pem(&self) -> &str {
        &self.pem
    }

    pub fn x509(&self) -> &X509Ref {
        &self.x509
    }

    pub fn to_der(&self) -> Result<Vec<u8>> {
        self.x509
            .to_der()
            .map_err(|e| PkiError::parse("Failed to encode certificate as DER", e))
    }

    pub fn public_key(&self) -> Result<PKey<Public>> {
        self.x509
            .public_key()
            .map_err(|e| PkiError::parse("Failed to read certificate public key", e))
    }

    /// True when `issuer`'s subject is this certificate's issuer and the
    /// signature verifies with `issuer`'s public key.
    pub fn is_issued_by(&self, issuer: &Certificate) -> Result<bool> {
        let names_match = issuer
            .x509
            .subject_name()
            .try_cmp(self.x509.issuer_name())
            .map_err(|e| PkiError::parse("Failed to compare names", e))?
            == Ordering::Equal;
        if !names_match {
            return Ok(false);
        }
        let issuer_key = issuer.public_key()?;
        self.x509
            .verify(&issuer_key)
            .map_err(|e| PkiError::parse("Failed to verify certificate signature", e))
    }

    pub fn info(&self) -> Result<CertificateInfo> {
        let der = self.to_der()?;
        let (_, cert) =
            X509Certificate::from_der(&der).map_err(|e| PkiError::parse("parse cert", e))?;
        CertificateInfo::from_parsed(&cert)
    }
}

impl fmt::Debug for Certificate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Certificate").field("pem", &self.pem).finish()
    }
}

/// Decoded view of the certificate fields the trust chain depends on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CertificateInfo {
    pub serial: String,
    pub subject: String,
    pub issuer: String,
    /// Unix timestamps
    pub not_before: i64,
    pub not_after: i64,
    pub is_ca: bool,
    pub dns_names: Vec<String>,
    pub digital_signature: bool,
    pub key_cert_sign: bool,
    pub client_auth: bool,
    pub server_auth: bool,
    /// Dotted OID of the signature algorithm
    pub signature_algorithm: String,
}

impl CertificateInfo {
    fn from_parsed(cert: &X509Certificate<'_>) -> Result<Self> {
        let ext_err = |e: X509Error| PkiError::parse("Failed to read extension", e);

        let is_ca = cert
            .basic_constraints()
            .map_err(ext_err)?
            .map(|bc| bc.value.ca)
            .unwrap_or(false);
        let (digital_signature, key_cert_sign) = cert
            .key_usage()
            .map_err(ext_err)?
            .map(|ku| (ku.value.digital_signature(), ku.value.key_cert_sign()))
            .unwrap_or((false, false));
        let (client_auth, server_auth) = cert
            .extended_key_usage()
            .map_err(ext_err)?
            .map(|eku| (eku.value.client_auth, eku.value.server_auth))
            .unwrap_or((false, false));
        let dns_names = cert
            .subject_alternative_name()
            .map_err(ext_err)?
            .map(|san| collect_dns_names(&san.value.general_names))
            .unwrap_or_default();

        Ok(Self {
            serial: cert.raw_serial_as_string(),
            subject: cert.subject().to_string(),
            issuer: cert.issuer().to_string(),
            not_before: cert.validity().not_before.timestamp(),
            not_after: cert.validity().not_after.timestamp(),
            is_ca,
            dns_names,
            digital_signature,
            key_cert_sign,
            client_auth,
            server_auth,
            signature_algorithm: cert.signature_algorithm.algorithm.to_id_string(),
        })
    }

    pub fn validity_seconds(&self) -> i64 {
        self.not_after - self.not_before
    }
}

fn collect_dns_names(names: &[GeneralName<'_>]) -> Vec<String> {
    names
        .iter()
        .filter_map(|name| match name {
            GeneralName::DNSName(dns) => Some(dns.to_string()),
            _ => None,
        })
        .collect()
}

/// A PKCS#10 certificate signing request.
pub struct CertificateRequest {
    req: X509Req,
    pem: String,
}

impl CertificateRequest {
    pub(crate) fn from_req(req: X509Req) -> Result<Self> {
        let pem = req
            .to_pem()
            .map_err(|e| PkiError::sign("Failed to encode CSR", e))
            .and_then(|bytes| String::from_utf8(bytes).map_err(|e| PkiError::sign("Failed to encode CSR", e)))?;
        Ok(Self { req, pem })
    }

    /// Decode a `CERTIFICATE REQUEST` PEM block.
    pub fn from_pem(input: &str) -> Result<Self> {
        let der = decode_block(input, REQUEST_PEM_LABEL)?;
        let req = X509Req::from_der(&der).map_err(|e| PkiError::parse("parse csr", e))?;
        Self::from_req(req)
    }

    pub fn pem(&self) -> &str {
        &self.pem
    }

    pub fn req(&self) -> &X509ReqRef {
        &self.req
    }

    pub fn public_key(&self) -> Result<PKey<Public>> {
        self.req
            .public_key()
            .map_err(|e| PkiError::parse("Failed to read CSR public key", e))
    }

    /// Check the proof-of-possession signature.
    pub fn verify_signature(&self) -> Result<bool> {
        let key = self.public_key()?;
        self.req
            .verify(&key)
            .map_err(|e| PkiError::parse("Failed to verify CSR signature", e))
    }

    /// DNS names requested through the subjectAltName extension.
    pub fn dns_names(&self) -> Result<Vec<String>> {
        let der = self
            .req
            .to_der()
            .map_err(|e| PkiError::parse("Failed to encode CSR as DER", e))?;
        let (_, csr) = X509CertificationRequest::from_der(&der)
            .map_err(|e| PkiError::parse("parse csr", e))?;

        let mut names = Vec::new();
        if let Some(extensions) = csr.requested_extensions() {
            for extension in extensions {
                if let ParsedExtension::SubjectAlternativeName(san) = extension {
                    names.extend(collect_dns_names(&san.general_names));
                }
            }
        }
        Ok(names)
    }
}

impl fmt::Debug for CertificateRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CertificateRequest").field("pem", &self.pem).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const NOT_PEM: &str = "this is not a certificate";

    #[test]
    fn test_decode_block_empty() {
        assert!(matches!(decode_block("", CERTIFICATE_PEM_LABEL), Err(PkiError::Decode(_))));
        assert!(matches!(decode_block("  \n", CERTIFICATE_PEM_LABEL), Err(PkiError::Decode(_))));
    }

    #[test]
    fn test_decode_block_garbage() {
        assert!(matches!(
            decode_block(NOT_PEM, CERTIFICATE_PEM_LABEL),
            Err(PkiError::Decode(_))
        ));
    }

    #[test]
    fn test_decode_block_wrong_label() {
        let block = pem::encode(&pem::Pem::new("PUBLIC KEY", vec![1, 2, 3]));
        match decode_block(&block, CERTIFICATE_PEM_LABEL) {
            Err(PkiError::Decode(msg)) => assert!(msg.contains("PUBLIC KEY")),
            other => panic!("expected Decode error, got {other:?}"),
        }
    }

    #[test]
    fn test_certificate_from_pem_bad_der() {
        let block = pem::encode(&pem::Pem::new(CERTIFICATE_PEM_LABEL, vec![0x30, 0x03, 0x02, 0x01, 0x01]));
        assert!(matches!(Certificate::from_pem(&block), Err(PkiError::Parse(_))));
    }

    #[test]
    fn test_request_from_pem_bad_der() {
        let block = pem::encode(&pem::Pem::new(REQUEST_PEM_LABEL, vec![0xde, 0xad, 0xbe, 0xef]));
        assert!(matches!(CertificateRequest::from_pem(&block), Err(PkiError::Parse(_))));
    }

    #[test]
    fn test_random_serial_unique() {
        let a = random_serial().unwrap().to_bn().unwrap();
        let b = random_serial().unwrap().to_bn().unwrap();
        assert_ne!(a, b);
        assert!(a.num_bits() <= SERIAL_BITS);
    }

    #[test]
    fn test_validity_window_ordering() {
        let (not_before, not_after) = validity_window(18).unwrap();
        assert_eq!(not_before.compare(&not_after).unwrap(), Ordering::Less);
        let days = not_before.diff(&not_after).unwrap().days;
        assert!((545..=553).contains(&days), "18 months was {days} days");
    }
}
