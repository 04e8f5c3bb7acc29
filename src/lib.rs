//! Webhook Certs - In-process Certificate Authority for Admission Webhooks
//!
//! Bootstraps the TLS material a Kubernetes admission webhook needs to serve
//! HTTPS inside the cluster: a private RSA root CA and a serving certificate
//! for the webhook's Service DNS names, signed by that CA.
//!
//! # Overview
//!
//! ```text
//! Root CA (self-signed, CA=true, 10 years)
//!   └── Serving Certificate (signed by Root, CA=false, 18 months)
//!         SANs: svc, svc.ns, svc.ns.svc, svc.ns.svc.cluster,
//!               svc.ns.svc.cluster.local, *.svc.cluster.local
//! ```
//!
//! Existing material is always preferred over new material. The bootstrap
//! only generates the artifacts that are missing from the supplied
//! [`TrustState`], so a restarted webhook keeps presenting the same CA that
//! was registered in its `caBundle`.
//!
//! # Features
//!
//! - **Idempotent bootstrap**: re-running on a complete state is a no-op
//! - **RSA keys**: 4096-bit by default, PKCS#1 PEM encoded
//! - **SHA-384 signatures**: for both the CA and the serving certificate
//! - **Consistency check**: the returned chain is verified against the CA key
//! - **rustls handoff**: [`TlsChain::server_config`] builds a ready server config
//!
//! # As a Library
//!
//! ```no_run
//! use webhook_certs::{ensure_trust_chain, ServiceIdentity, TrustState};
//!
//! fn main() -> anyhow::Result<()> {
//!     let identity = ServiceIdentity::new("webhook", "ingress-nginx");
//!     let mut state = TrustState::load("webhook-certs.state.toml".as_ref())?;
//!
//!     let chain = ensure_trust_chain(&mut state, &identity)?;
//!     state.save("webhook-certs.state.toml".as_ref())?;
//!
//!     let _server_config = chain.server_config()?;
//!     println!("caBundle:\n{}", chain.ca().pem());
//!     Ok(())
//! }
//! ```
//!
//! # Modules
//!
//! - [`keygen`]: RSA key pair generation and PEM decoding
//! - [`root_ca`]: self-signed root CA issuance
//! - [`csr`]: certificate signing requests for the webhook Service
//! - [`signer`]: signing requests with the root CA
//! - [`bootstrap`]: the orchestration over a [`TrustState`]
//! - [`configs`] and [`logging`]: the ambient layer used by the binary

pub mod bootstrap;
pub mod certificate;
pub mod configs;
pub mod csr;
pub mod error;
pub mod keygen;
pub mod logging;
pub mod root_ca;
pub mod signer;
pub mod state;
pub mod subject;

pub use bootstrap::{ensure_trust_chain, TlsChain, TrustBootstrap, TrustBundle};
pub use certificate::{Certificate, CertificateInfo, CertificateRequest};
pub use csr::create_request;
pub use error::{PkiError, Result};
pub use keygen::{generate_key_pair, KeyPair};
pub use root_ca::create_root_certificate;
pub use signer::sign_request;
pub use state::{BootstrapStage, TrustState};
pub use subject::{dns_names, ServiceIdentity};
