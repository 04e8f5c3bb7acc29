use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

use crate::state::TrustState;
use crate::subject::ServiceIdentity;

#[derive(Debug, Deserialize, Clone, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub kubernetes: KubernetesConfig,
    #[serde(default)]
    pub certificate_authority: CertificateMaterial,
    #[serde(default)]
    pub certificate: CertificateMaterial,
    #[serde(default)]
    pub state: StateConfig,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct KubernetesConfig {
    #[serde(default = "default_namespace")]
    pub namespace: String,
    #[serde(default = "default_service_name")]
    pub service_name: String,
}

impl Default for KubernetesConfig {
    fn default() -> Self {
        Self {
            namespace: default_namespace(),
            service_name: default_service_name(),
        }
    }
}

fn default_namespace() -> String {
    "ingress-nginx".to_string()
}

fn default_service_name() -> String {
    "webhook".to_string()
}

/// Pre-existing PEM material supplied inline; empty means "generate".
#[derive(Deserialize, Clone, Default)]
pub struct CertificateMaterial {
    #[serde(default)]
    pub certificate: String,
    #[serde(default)]
    pub private_key: String,
}

impl std::fmt::Debug for CertificateMaterial {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CertificateMaterial")
            .field("certificate", &redact(&self.certificate))
            .field("private_key", &redact(&self.private_key))
            .finish()
    }
}

fn redact(value: &str) -> &'static str {
    if value.trim().is_empty() {
        "<unset>"
    } else {
        "<provided>"
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct StateConfig {
    #[serde(default = "default_state_path")]
    pub path: PathBuf,
}

impl Default for StateConfig {
    fn default() -> Self {
        Self {
            path: default_state_path(),
        }
    }
}

fn default_state_path() -> PathBuf {
    PathBuf::from("webhook-certs.state.toml")
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_tls_cert_path")]
    pub tls_cert_path: PathBuf,
    #[serde(default = "default_tls_key_path")]
    pub tls_key_path: PathBuf,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            tls_cert_path: default_tls_cert_path(),
            tls_key_path: default_tls_key_path(),
        }
    }
}

fn default_tls_cert_path() -> PathBuf {
    PathBuf::from("web_certs/server/chain.pem")
}

fn default_tls_key_path() -> PathBuf {
    PathBuf::from("web_certs/server/server.key")
}

#[derive(Debug, Deserialize, Clone)]
pub struct LoggingConfig {
    /// 1-100; see [`crate::logging::level_filter`]
    #[serde(default = "default_log_level")]
    pub level: u32,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_log_level() -> u32 {
    50
}

impl AppConfig {
    /// Load configuration from a TOML file
    pub fn from_file(path: &Path) -> Result<Self> {
        let config_str = fs::read_to_string(path)
            .context(format!("Failed to read config file: {}", path.display()))?;

        let config: AppConfig =
            toml::from_str(&config_str).context("Failed to parse config file")?;

        Ok(config)
    }

    /// Load configuration with default path (config.toml), falling back to
    /// built-in defaults when it does not exist
    pub fn load() -> Result<Self> {
        let path = Path::new("config.toml");
        if path.exists() {
            Self::from_file(path)
        } else {
            Ok(Self::default())
        }
    }

    pub fn validate(&self) -> Result<()> {
        let checks = [
            (self.kubernetes.service_name.trim().is_empty(), "no kubernetes.service_name specified"),
            (self.kubernetes.namespace.trim().is_empty(), "no kubernetes.namespace specified"),
            (self.logging.level == 0, "no logging.level specified"),
            (self.state.path.as_os_str().is_empty(), "no state.path specified"),
            (self.server.tls_cert_path.as_os_str().is_empty(), "no server.tls_cert_path specified"),
            (self.server.tls_key_path.as_os_str().is_empty(), "no server.tls_key_path specified"),
        ];

        for (bad, message) in checks {
            if bad {
                bail!("invalid config: {}", message);
            }
        }
        Ok(())
    }

    pub fn service_identity(&self) -> ServiceIdentity {
        ServiceIdentity::new(&self.kubernetes.service_name, &self.kubernetes.namespace)
    }

    /// PEM material supplied in the config file, as a state overlay.
    pub fn inline_state(&self) -> TrustState {
        fn field(value: &str) -> Option<String> {
            (!value.trim().is_empty()).then(|| value.to_string())
        }
        TrustState {
            ca_private_key: field(&self.certificate_authority.private_key),
            ca_certificate: field(&self.certificate_authority.certificate),
            private_key: field(&self.certificate.private_key),
            certificate: field(&self.certificate.certificate),
        }
    }

    /// Log the effective configuration at debug level, PEMs redacted.
    pub fn log_running_config(&self) {
        tracing::debug!("Current Running Configuration Values:");
        tracing::debug!("\tkubernetes.namespace\t\t= {}", self.kubernetes.namespace);
        tracing::debug!("\tkubernetes.service_name\t\t= {}", self.kubernetes.service_name);
        tracing::debug!("\tcertificate_authority\t\t= {:?}", self.certificate_authority);
        tracing::debug!("\tcertificate\t\t\t= {:?}", self.certificate);
        tracing::debug!("\tstate.path\t\t\t= {}", self.state.path.display());
        tracing::debug!("\tserver.tls_cert_path\t\t= {}", self.server.tls_cert_path.display());
        tracing::debug!("\tserver.tls_key_path\t\t= {}", self.server.tls_key_path.display());
        tracing::debug!("\tlogging.level\t\t\t= {}", self.logging.level);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config: AppConfig = toml::from_str("").unwrap();
        assert_eq!(config.kubernetes.namespace, "ingress-nginx");
        assert_eq!(config.kubernetes.service_name, "webhook");
        assert_eq!(config.logging.level, 50);
        assert_eq!(config.server.tls_cert_path, PathBuf::from("web_certs/server/chain.pem"));
        assert!(config.validate().is_ok());
        assert_eq!(config.inline_state(), TrustState::default());
    }

    #[test]
    fn test_file_values_override_defaults() {
        let config: AppConfig = toml::from_str(
            r#"
            [kubernetes]
            namespace = "example-namespace"
            service_name = "example-webhook"

            [certificate_authority]
            certificate = "ca-cert"
            private_key = "ca-key"

            [certificate]
            private_key = "  "

            [logging]
            level = 90
            "#,
        )
        .unwrap();

        assert_eq!(
            config.service_identity(),
            ServiceIdentity::new("example-webhook", "example-namespace")
        );
        assert_eq!(config.logging.level, 90);

        let inline = config.inline_state();
        assert_eq!(inline.ca_certificate.as_deref(), Some("ca-cert"));
        assert_eq!(inline.ca_private_key.as_deref(), Some("ca-key"));
        assert_eq!(inline.private_key, None);
        assert_eq!(inline.certificate, None);
    }

    #[test]
    fn test_validate_rejects_empty_identity() {
        let mut config = AppConfig::default();
        config.kubernetes.namespace = String::new();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("namespace"));

        let mut config = AppConfig::default();
        config.logging.level = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_debug_redacts_pem() {
        let material = CertificateMaterial {
            certificate: "-----BEGIN CERTIFICATE-----".to_string(),
            private_key: String::new(),
        };
        let debug_str = format!("{:?}", material);
        assert!(!debug_str.contains("BEGIN"));
        assert!(debug_str.contains("<provided>"));
        assert!(debug_str.contains("<unset>"));
    }

    #[test]
    fn test_from_file_missing() {
        let dir = tempfile::tempdir().unwrap();
        assert!(AppConfig::from_file(&dir.path().join("missing.toml")).is_err());
    }
}
