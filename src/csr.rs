//! Certificate signing requests for the webhook's serving identity.
//!
//! The request carries every in-cluster DNS name of the service plus the
//! cluster wildcard. Its signature only proves possession of the private key;
//! trust comes from the CA signing it later in [`crate::signer`].

use openssl::hash::MessageDigest;
use openssl::stack::Stack;
use openssl::x509::extension::SubjectAlternativeName;
use openssl::x509::X509Req;

use crate::certificate::{CertificateRequest, X509_REQ_VERSION_1};
use crate::error::{PkiError, Result};
use crate::keygen::KeyPair;
use crate::subject::{subject_name, ServiceIdentity, CLUSTER_WILDCARD, SERVER_ORGANIZATION};

/// Build a CSR for `identity` signed with the PKCS#1 PEM key `private_key`.
///
/// # Errors
/// [`PkiError::Decode`] if `private_key` is missing, malformed or not an
/// `RSA PRIVATE KEY` block; [`PkiError::Sign`] if building or signing the
/// request fails.
pub fn create_request(private_key: &str, identity: &ServiceIdentity) -> Result<CertificateRequest> {
    let key = KeyPair::from_pem(private_key)?;
    create_request_with_key(&key, identity)
}

/// Same as [`create_request`] for an already decoded key.
pub fn create_request_with_key(key: &KeyPair, identity: &ServiceIdentity) -> Result<CertificateRequest> {
    let mut dns_names = identity.dns_names();
    dns_names.push(CLUSTER_WILDCARD.to_string());

    let mut builder = X509Req::builder().map_err(|e| PkiError::sign("Failed to create CSR builder", e))?;
    builder
        .set_version(X509_REQ_VERSION_1)
        .map_err(|e| PkiError::sign("Failed to set CSR version", e))?;

    let name = subject_name(SERVER_ORGANIZATION).map_err(|e| PkiError::sign("Failed to build subject", e))?;
    builder
        .set_subject_name(&name)
        .map_err(|e| PkiError::sign("Failed to set subject", e))?;
    builder
        .set_pubkey(key.private_key())
        .map_err(|e| PkiError::sign("Failed to set public key", e))?;

    let mut san = SubjectAlternativeName::new();
    for dns in &dns_names {
        san.dns(dns);
    }
    let san = san
        .build(&builder.x509v3_context(None))
        .map_err(|e| PkiError::sign("Failed to build SubjectAlternativeName", e))?;
    let mut extensions = Stack::new().map_err(|e| PkiError::sign("Failed to allocate extensions", e))?;
    extensions
        .push(san)
        .map_err(|e| PkiError::sign("Failed to add SubjectAlternativeName", e))?;
    builder
        .add_extensions(&extensions)
        .map_err(|e| PkiError::sign("Failed to add CSR extensions", e))?;

    builder
        .sign(key.private_key(), MessageDigest::sha384())
        .map_err(|e| PkiError::sign("Failed to sign CSR", e))?;

    let request = CertificateRequest::from_req(builder.build())?;
    tracing::trace!(service = %identity.name, namespace = %identity.namespace, "Generated Host CSR:\n{}", request.pem());
    Ok(request)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keygen::generate_key_pair;

    fn identity() -> ServiceIdentity {
        ServiceIdentity::new("webhook", "ingress-nginx")
    }

    #[test]
    fn test_request_carries_all_names() {
        let key = generate_key_pair(2048).unwrap();
        let request = create_request(key.pem(), &identity()).unwrap();

        assert_eq!(
            request.dns_names().unwrap(),
            vec![
                "webhook",
                "webhook.ingress-nginx",
                "webhook.ingress-nginx.svc",
                "webhook.ingress-nginx.svc.cluster",
                "webhook.ingress-nginx.svc.cluster.local",
                "*.svc.cluster.local",
            ]
        );
    }

    #[test]
    fn test_request_is_self_signed_by_key() {
        let key = generate_key_pair(2048).unwrap();
        let request = create_request_with_key(&key, &identity()).unwrap();

        assert!(request.verify_signature().unwrap());
        assert!(key.matches(&request.public_key().unwrap()));
        assert!(request.pem().starts_with("-----BEGIN CERTIFICATE REQUEST-----"));
    }

    #[test]
    fn test_request_pem_decodes() {
        let key = generate_key_pair(2048).unwrap();
        let request = create_request_with_key(&key, &identity()).unwrap();
        let decoded = CertificateRequest::from_pem(request.pem()).unwrap();
        assert_eq!(decoded.pem(), request.pem());
    }

    #[test]
    fn test_empty_key_is_decode_error() {
        assert!(matches!(create_request("", &identity()), Err(PkiError::Decode(_))));
    }

    #[test]
    fn test_wrong_block_type_is_decode_error() {
        let key = generate_key_pair(2048).unwrap();
        let request = create_request_with_key(&key, &identity()).unwrap();
        assert!(matches!(
            create_request(request.pem(), &identity()),
            Err(PkiError::Decode(_))
        ));
    }
}
