//! Certificate subjects and the service's DNS identity.

use openssl::error::ErrorStack;
use openssl::nid::Nid;
use openssl::x509::{X509Name, X509NameBuilder};

/// Organization (O) of the root CA.
pub const CA_ORGANIZATION: &str = "Kubernetes Mutating Webserver CA";
/// Organization (O) of the serving certificate.
pub const SERVER_ORGANIZATION: &str = "Kubernetes Mutating Webserver";
/// State/province (ST), shared by CA and serving certificate.
pub const PROVINCE: &str = "Cluster Service";
/// Locality (L), shared by CA and serving certificate.
pub const LOCALITY: &str = "Cluster Local";

/// Wildcard SAN appended to every certificate request.
pub const CLUSTER_WILDCARD: &str = "*.svc.cluster.local";

/// Kubernetes service whose DNS names the serving certificate must cover.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceIdentity {
    pub name: String,
    pub namespace: String,
}

impl ServiceIdentity {
    pub fn new(name: impl Into<String>, namespace: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            namespace: namespace.into(),
        }
    }

    pub fn dns_names(&self) -> Vec<String> {
        dns_names(&self.name, &self.namespace)
    }
}

/// Every in-cluster DNS name a service is reachable under, shortest first.
///
/// The cluster wildcard is not part of this list; the request builder adds it.
pub fn dns_names(service: &str, namespace: &str) -> Vec<String> {
    vec![
        service.to_string(),
        format!("{service}.{namespace}"),
        format!("{service}.{namespace}.svc"),
        format!("{service}.{namespace}.svc.cluster"),
        format!("{service}.{namespace}.svc.cluster.local"),
    ]
}

/// Build the fixed subject name for the given organization.
///
/// No country attribute is written: the identifier the webhook historically
/// used (`K8S`) is not a two-letter ISO code and OpenSSL refuses it.
pub(crate) fn subject_name(organization: &str) -> Result<X509Name, ErrorStack> {
    let mut name_builder = X509NameBuilder::new()?;
    name_builder.append_entry_by_nid(Nid::STATEORPROVINCENAME, PROVINCE)?;
    name_builder.append_entry_by_nid(Nid::LOCALITYNAME, LOCALITY)?;
    name_builder.append_entry_by_nid(Nid::ORGANIZATIONNAME, organization)?;
    Ok(name_builder.build())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dns_names() {
        assert_eq!(
            dns_names("svc", "ns"),
            vec![
                "svc",
                "svc.ns",
                "svc.ns.svc",
                "svc.ns.svc.cluster",
                "svc.ns.svc.cluster.local",
            ]
        );
    }

    #[test]
    fn test_dns_names_excludes_wildcard() {
        let identity = ServiceIdentity::new("exampleService", "exampleNameSpace");
        let names = identity.dns_names();
        assert_eq!(names.len(), 5);
        assert!(!names.iter().any(|n| n == CLUSTER_WILDCARD));
        assert_eq!(names[4], "exampleService.exampleNameSpace.svc.cluster.local");
    }

    #[test]
    fn test_subject_name_entries() {
        let name = subject_name(SERVER_ORGANIZATION).unwrap();
        let entry = name.entries_by_nid(Nid::ORGANIZATIONNAME).next().unwrap();
        let org = std::str::from_utf8(entry.data().as_slice()).unwrap();
        assert_eq!(org, SERVER_ORGANIZATION);
        assert_eq!(name.entries().count(), 3);
    }
}
