//! Webhook Certs - serving certificate bootstrap for an admission webhook
//!
//! Loads the configuration, brings the persisted trust state up to a complete
//! CA + serving certificate chain, and exports the chain and key for the TLS
//! listener. Runs once, before the listener binds, and exits non-zero on any
//! failure.
//!
//! ```bash
//! webhook-certs --config config.toml --namespace ingress-nginx --service-name webhook
//! ```

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;

use webhook_certs::configs::AppConfig;
use webhook_certs::state::{write_private, TrustState};
use webhook_certs::{ensure_trust_chain, logging};

#[derive(Parser, Debug)]
#[command(name = "webhook-certs", version, about)]
struct Cli {
    /// Path to TOML configuration file (defaults to ./config.toml when present).
    #[arg(long, env = "CONFIG_FILE")]
    config: Option<PathBuf>,

    /// Log level from 1 to 100; overrides logging.level.
    #[arg(long, env = "LOG_LEVEL")]
    log_level: Option<u32>,

    /// Namespace the webhook Service lives in.
    #[arg(long, env = "NAMESPACE")]
    namespace: Option<String>,

    /// Name of the webhook Service.
    #[arg(long, env = "SERVICE_NAME")]
    service_name: Option<String>,
}

fn load_config(cli: &Cli) -> Result<AppConfig> {
    let mut config = match &cli.config {
        Some(path) => AppConfig::from_file(path)?,
        None => AppConfig::load()?,
    };

    if let Some(level) = cli.log_level {
        config.logging.level = level;
    }
    if let Some(namespace) = &cli.namespace {
        config.kubernetes.namespace = namespace.clone();
    }
    if let Some(service_name) = &cli.service_name {
        config.kubernetes.service_name = service_name.clone();
    }
    Ok(config)
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = load_config(&cli).context("Unable to load configuration")?;

    logging::init(config.logging.level)?;
    config.validate()?;

    let mut state = TrustState::load(&config.state.path)?;
    let persisted = state.clone();
    state.merge(config.inline_state());

    let identity = config.service_identity();
    let chain =
        ensure_trust_chain(&mut state, &identity).context("Unable to initialize certificate data")?;

    if state != persisted {
        state.save(&config.state.path)?;
        tracing::info!(path = %config.state.path.display(), "trust state saved");
    }

    write_private(&config.server.tls_cert_path, chain.cert_chain_pem().as_bytes()).with_context(
        || format!("Failed to write certificate chain: {}", config.server.tls_cert_path.display()),
    )?;
    write_private(&config.server.tls_key_path, chain.private_key_pem().as_bytes()).with_context(
        || format!("Failed to write private key: {}", config.server.tls_key_path.display()),
    )?;
    tracing::info!(
        chain = %config.server.tls_cert_path.display(),
        key = %config.server.tls_key_path.display(),
        "serving certificate exported"
    );

    config.log_running_config();
    tracing::info!("initialization sequence complete");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_overrides_config() {
        let cli = Cli::parse_from([
            "webhook-certs",
            "--log-level",
            "90",
            "--namespace",
            "example-namespace",
            "--service-name",
            "example-webhook",
        ]);
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[kubernetes]\nnamespace = \"from-file\"\n").unwrap();
        let cli = Cli {
            config: Some(path),
            ..cli
        };

        let config = load_config(&cli).unwrap();
        assert_eq!(config.logging.level, 90);
        assert_eq!(config.kubernetes.namespace, "example-namespace");
        assert_eq!(config.kubernetes.service_name, "example-webhook");
    }

    #[test]
    fn test_missing_explicit_config_fails() {
        let cli = Cli {
            config: Some(PathBuf::from("/nonexistent/webhook-certs.toml")),
            log_level: None,
            namespace: None,
            service_name: None,
        };
        assert!(load_config(&cli).is_err());
    }

    #[test]
    fn test_cli_definition() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }
}
