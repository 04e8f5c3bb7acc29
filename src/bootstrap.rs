//! Trust-chain bootstrap.
//!
//! Sequences key generation, CA issuance, request building and signing
//! against a [`TrustState`], generating only what is missing:
//!
//! ```text
//! NoCa ─► CaKeyOnly ─► CaReady ─► LeafKeyOnly ─► LeafReady
//!   CA key     CA cert     leaf key      leaf cert
//! ```
//!
//! Artifacts already present are reused verbatim; nothing is ever rotated.
//! When all four exist the result is assembled into a [`TlsChain`] and
//! cross-checked before it is returned, so a caller never receives a chain
//! whose pieces do not belong together.

use std::fmt;
use std::sync::Arc;

use crate::certificate::Certificate;
use crate::csr::create_request;
use crate::error::{PkiError, Result};
use crate::keygen::{generate_key_pair, KeyPair, RSA_KEY_SIZE_DEFAULT};
use crate::root_ca::create_root_certificate;
use crate::signer::sign_request;
use crate::state::{present, TrustState};
use crate::subject::ServiceIdentity;

/// The root of trust: CA certificate and CA private key.
#[derive(Debug, Clone)]
pub struct TrustBundle {
    pub certificate: Certificate,
    pub private_key: KeyPair,
}

impl TrustBundle {
    pub fn from_state(state: &TrustState) -> Result<Self> {
        Ok(Self {
            certificate: Certificate::from_pem(field(&state.ca_certificate))?,
            private_key: KeyPair::from_pem(field(&state.ca_private_key))?,
        })
    }
}

/// Serving identity for a TLS listener: leaf certificate, CA certificate and
/// the leaf private key.
#[derive(Clone)]
pub struct TlsChain {
    leaf: Certificate,
    ca: Certificate,
    private_key: KeyPair,
}

impl TlsChain {
    pub fn new(leaf: Certificate, ca: Certificate, private_key: KeyPair) -> Self {
        Self { leaf, ca, private_key }
    }

    pub fn leaf(&self) -> &Certificate {
        &self.leaf
    }

    pub fn ca(&self) -> &Certificate {
        &self.ca
    }

    pub fn private_key(&self) -> &KeyPair {
        &self.private_key
    }

    /// Leaf certificate followed by the CA certificate, PEM-encoded.
    pub fn cert_chain_pem(&self) -> String {
        format!("{}{}", self.leaf.pem(), self.ca.pem())
    }

    pub fn private_key_pem(&self) -> &str {
        self.private_key.pem()
    }

    /// Check that the chain and the CA key belong together.
    ///
    /// # Errors
    /// [`PkiError::Inconsistent`] when the CA certificate is not for
    /// `ca_key`, the leaf certificate is not for the leaf key, or the leaf
    /// was not issued by the CA.
    pub fn verify(&self, ca_key: &KeyPair) -> Result<()> {
        let ca_public = self.ca.public_key()?;
        if !ca_key.matches(&ca_public) {
            return Err(PkiError::Inconsistent(
                "CA certificate does not match the CA private key".to_string(),
            ));
        }
        let leaf_public = self.leaf.public_key()?;
        if !self.private_key.matches(&leaf_public) {
            return Err(PkiError::Inconsistent(
                "serving certificate does not match the serving private key".to_string(),
            ));
        }
        if !self.leaf.is_issued_by(&self.ca)? {
            return Err(PkiError::Inconsistent(
                "serving certificate was not issued by the CA".to_string(),
            ));
        }
        Ok(())
    }

    /// Build a rustls server configuration serving this chain.
    pub fn server_config(&self) -> Result<rustls::ServerConfig> {
        let chain_pem = self.cert_chain_pem();
        let certs = rustls_pemfile::certs(&mut chain_pem.as_bytes())
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|e| PkiError::tls("Failed to read certificate chain", e))?;
        let key = rustls_pemfile::private_key(&mut self.private_key.pem().as_bytes())
            .map_err(|e| PkiError::tls("Failed to read private key", e))?
            .ok_or_else(|| PkiError::Tls("no private key in chain".to_string()))?;

        let provider = Arc::new(rustls::crypto::ring::default_provider());
        rustls::ServerConfig::builder_with_provider(provider)
            .with_safe_default_protocol_versions()
            .map_err(|e| PkiError::tls("Failed to select protocol versions", e))?
            .with_no_client_auth()
            .with_single_cert(certs, key)
            .map_err(|e| PkiError::tls("Failed to load serving identity", e))
    }
}

impl PartialEq for TlsChain {
    fn eq(&self, other: &Self) -> bool {
        self.leaf.pem() == other.leaf.pem()
            && self.ca.pem() == other.ca.pem()
            && self.private_key.pem() == other.private_key.pem()
    }
}

impl fmt::Debug for TlsChain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TlsChain")
            .field("leaf", &self.leaf)
            .field("ca", &self.ca)
            .field("private_key", &self.private_key)
            .finish()
    }
}

/// Bootstrap configured with the service identity and key size.
pub struct TrustBootstrap<'a> {
    identity: &'a ServiceIdentity,
    key_bits: u32,
}

impl<'a> TrustBootstrap<'a> {
    pub fn new(identity: &'a ServiceIdentity) -> Self {
        Self {
            identity,
            key_bits: RSA_KEY_SIZE_DEFAULT,
        }
    }

    /// RSA key size for keys generated by this bootstrap (default 4096)
    pub fn key_bits(mut self, bits: u32) -> Self {
        self.key_bits = bits;
        self
    }

    /// Fill in whatever `state` is missing and return the assembled chain.
    ///
    /// Fields written by steps that completed before a failure stay in
    /// `state`; the error is returned and no chain is produced.
    pub fn run(&self, state: &mut TrustState) -> Result<TlsChain> {
        let starting_stage = state.stage();

        if present(&state.ca_private_key).is_none() {
            tracing::trace!("No certificate authority private key detected");
            let key = generate_key_pair(self.key_bits)?;
            state.ca_private_key = Some(key.pem().to_string());
            tracing::info!(bits = self.key_bits, "generated certificate authority private key");
        } else {
            tracing::debug!("reusing certificate authority private key");
        }

        if present(&state.ca_certificate).is_none() {
            tracing::trace!("No certificate authority certificate detected");
            let ca_key = KeyPair::from_pem(field(&state.ca_private_key))?;
            let certificate = create_root_certificate(&ca_key)?;
            state.ca_certificate = Some(certificate.pem().to_string());
        } else {
            tracing::debug!("reusing certificate authority certificate");
        }

        if present(&state.private_key).is_none() {
            tracing::trace!("No server private key detected");
            let key = generate_key_pair(self.key_bits)?;
            state.private_key = Some(key.pem().to_string());
            tracing::info!(bits = self.key_bits, "generated server private key");
        } else {
            tracing::debug!("reusing server private key");
        }

        if present(&state.certificate).is_none() {
            tracing::trace!("No server certificate detected");
            let request = create_request(field(&state.private_key), self.identity)?;
            let certificate = sign_request(
                field(&state.ca_certificate),
                field(&state.ca_private_key),
                request.pem(),
            )?;
            state.certificate = Some(certificate.pem().to_string());
        } else {
            tracing::debug!("reusing server certificate");
        }

        let chain = assemble(state)?;
        tracing::info!(from = ?starting_stage, to = ?state.stage(), "trust chain ready");
        Ok(chain)
    }
}

/// Ensure `state` holds a complete trust chain for `identity`, generating
/// 4096-bit keys for anything missing.
pub fn ensure_trust_chain(state: &mut TrustState, identity: &ServiceIdentity) -> Result<TlsChain> {
    TrustBootstrap::new(identity).run(state)
}

fn assemble(state: &TrustState) -> Result<TlsChain> {
    let bundle = TrustBundle::from_state(state)?;
    let leaf = Certificate::from_pem(field(&state.certificate))?;
    let private_key = KeyPair::from_pem(field(&state.private_key))?;

    let chain = TlsChain::new(leaf, bundle.certificate, private_key);
    chain.verify(&bundle.private_key)?;
    Ok(chain)
}

fn field(value: &Option<String>) -> &str {
    present(value).unwrap_or_default()
}
