// # extdnsd - external-dns DreamHost webhook
//
// The extdnsd daemon is a thin shell over extdns-core. It is responsible for:
// 1. Reading configuration from environment variables
// 2. Building the DreamHost client, domain filter and reconciler
// 3. Serving the webhook protocol and the health probes
// 4. Shutting down cleanly on SIGTERM/SIGINT
//
// ## Configuration
//
// All configuration is done via environment variables:
//
// ### Provider
// - `DREAMHOST_API_KEY`: DreamHost API key (required)
// - `DREAMHOST_API_URL`: API base URL (default: https://api.dreamhost.com)
// - `DRY_RUN`: List records but never add or remove any (default: false)
//
// ### Domain filter
// - `DOMAIN_FILTER`: Comma-separated domains to include
// - `EXCLUDE_DOMAIN_FILTER`: Comma-separated domains to exclude
// - `REGEXP_DOMAIN_FILTER`: Include pattern; enables regex mode when set
// - `REGEXP_DOMAIN_FILTER_EXCLUSION`: Exclude pattern (regex mode only)
//
// ### Servers
// - `WEBHOOK_HOST` / `WEBHOOK_PORT`: Webhook listener (default: localhost:8888)
// - `HEALTH_HOST` / `HEALTH_PORT`: Probe listener (default: 0.0.0.0:8080)
// - `SERVER_READ_TIMEOUT` / `SERVER_WRITE_TIMEOUT`: Seconds (default: 60)
//
// ### Logging
// - `LOG_LEVEL`: trace, debug, info, warn or error (default: info)
//
// ## Example
//
// ```bash
// export DREAMHOST_API_KEY=6SHU5P2HLDAYECUM
// export DOMAIN_FILTER=example.com
// export DRY_RUN=true
//
// extdnsd
// ```

mod health;
mod webhook;

use anyhow::{Context, Result};
use extdns_core::{DomainFilter, ProviderConfig, ReconcileEvent, Reconciler};
use extdns_provider_dreamhost::{DREAMHOST_API_BASE, DreamhostClient};
use std::env;
use std::fmt::Display;
use std::process::ExitCode;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::{mpsc, watch};
use tracing::{Level, debug, error, info, warn};
use tracing_subscriber::FmtSubscriber;

#[cfg(unix)]
use tokio::signal::unix::{SignalKind, signal};

use health::HealthStatus;
use webhook::Timeouts;

/// Time allowed for in-flight requests to finish after a shutdown signal
const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(30);

/// Exit codes for different termination scenarios
///
/// These codes follow systemd conventions:
/// - 0: Clean shutdown
/// - 1: Configuration or startup error
/// - 2: Runtime error (unexpected)
#[derive(Debug, Clone, Copy)]
enum DaemonExitCode {
    /// Clean shutdown (normal exit)
    CleanShutdown = 0,
    /// Configuration error or startup failure
    ConfigError = 1,
    /// Runtime error (unexpected failure)
    RuntimeError = 2,
}

impl From<DaemonExitCode> for ExitCode {
    fn from(code: DaemonExitCode) -> Self {
        ExitCode::from(code as u8)
    }
}

/// Application configuration
struct Config {
    provider: ProviderConfig,
    webhook_host: String,
    webhook_port: u16,
    health_host: String,
    health_port: u16,
    read_timeout_secs: u64,
    write_timeout_secs: u64,
    log_level: String,
}

impl Config {
    /// Load configuration from environment variables
    fn from_env() -> Result<Self> {
        let provider = ProviderConfig {
            api_key: env::var("DREAMHOST_API_KEY").unwrap_or_default(),
            api_url: env_or("DREAMHOST_API_URL", DREAMHOST_API_BASE),
            dry_run: env_bool("DRY_RUN", false)?,
            domain_filter: env_list("DOMAIN_FILTER"),
            exclude_domains: env_list("EXCLUDE_DOMAIN_FILTER"),
            regex_domain_filter: env_or("REGEXP_DOMAIN_FILTER", ""),
            regex_domain_exclusion: env_or("REGEXP_DOMAIN_FILTER_EXCLUSION", ""),
            ..ProviderConfig::default()
        };

        Ok(Self {
            provider,
            webhook_host: env_or("WEBHOOK_HOST", "localhost"),
            webhook_port: env_parse("WEBHOOK_PORT", 8888)?,
            health_host: env_or("HEALTH_HOST", "0.0.0.0"),
            health_port: env_parse("HEALTH_PORT", 8080)?,
            read_timeout_secs: env_parse("SERVER_READ_TIMEOUT", 60)?,
            write_timeout_secs: env_parse("SERVER_WRITE_TIMEOUT", 60)?,
            log_level: env_or("LOG_LEVEL", "info"),
        })
    }

    /// Validate the configuration
    ///
    /// Filter patterns are compiled later, once logging is up, so that the
    /// filter summary is logged.
    fn validate(&self) -> Result<()> {
        if self.provider.api_key.trim().is_empty() {
            anyhow::bail!(
                "DREAMHOST_API_KEY is required. \
                Create one at https://panel.dreamhost.com/?tree=home.api with the dns-* functions"
            );
        }

        // Check for obvious placeholder keys (common mistake)
        let key_lower = self.provider.api_key.to_lowercase();
        if key_lower.contains("your_key") || key_lower.contains("replace_me") || key_lower == "key" {
            anyhow::bail!(
                "DREAMHOST_API_KEY appears to be a placeholder. \
                Use an actual API key from the DreamHost panel."
            );
        }

        self.provider
            .validate()
            .context("Invalid provider configuration")?;

        for (name, port) in [("WEBHOOK_PORT", self.webhook_port), ("HEALTH_PORT", self.health_port)] {
            if port == 0 {
                anyhow::bail!("{} must be between 1 and 65535. Got: 0", name);
            }
        }

        if self.webhook_host == self.health_host && self.webhook_port == self.health_port {
            anyhow::bail!(
                "Webhook and health servers cannot share {}:{}",
                self.webhook_host,
                self.webhook_port
            );
        }

        for (name, secs) in [
            ("SERVER_READ_TIMEOUT", self.read_timeout_secs),
            ("SERVER_WRITE_TIMEOUT", self.write_timeout_secs),
        ] {
            if !(1..=3600).contains(&secs) {
                anyhow::bail!("{} must be between 1 and 3600 seconds. Got: {}", name, secs);
            }
        }

        // Validate log level
        match self.log_level.to_lowercase().as_str() {
            "trace" | "debug" | "info" | "warn" | "error" => {}
            _ => anyhow::bail!(
                "LOG_LEVEL '{}' is not valid. \
                Valid levels: trace, debug, info, warn, error",
                self.log_level
            ),
        }

        Ok(())
    }

    fn webhook_address(&self) -> String {
        format!("{}:{}", self.webhook_host, self.webhook_port)
    }

    fn health_address(&self) -> String {
        format!("{}:{}", self.health_host, self.health_port)
    }

    fn timeouts(&self) -> Timeouts {
        Timeouts {
            read: Duration::from_secs(self.read_timeout_secs),
            write: Duration::from_secs(self.write_timeout_secs),
        }
    }
}

fn env_or(name: &str, default: &str) -> String {
    env::var(name).unwrap_or_else(|_| default.to_string())
}

fn env_list(name: &str) -> Vec<String> {
    env::var(name)
        .unwrap_or_default()
        .split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

fn env_parse<T>(name: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: Display,
{
    match env::var(name) {
        Ok(raw) if !raw.trim().is_empty() => raw
            .trim()
            .parse()
            .map_err(|e| anyhow::anyhow!("{} has invalid value '{}': {}", name, raw, e)),
        _ => Ok(default),
    }
}

fn env_bool(name: &str, default: bool) -> Result<bool> {
    match env::var(name) {
        Ok(raw) => match raw.trim().to_lowercase().as_str() {
            "" => Ok(default),
            "1" | "true" | "yes" => Ok(true),
            "0" | "false" | "no" => Ok(false),
            _ => anyhow::bail!("{} must be true or false. Got: {}", name, raw),
        },
        Err(_) => Ok(default),
    }
}

fn main() -> ExitCode {
    // Load configuration from environment
    let config = match Config::from_env() {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("Configuration error: {}", e);
            return DaemonExitCode::ConfigError.into();
        }
    };

    // Validate configuration
    if let Err(e) = config.validate() {
        eprintln!("Configuration validation error: {:#}", e);
        return DaemonExitCode::ConfigError.into();
    }

    // Initialize tracing
    let log_level = match config.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let subscriber = FmtSubscriber::builder().with_max_level(log_level).finish();

    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {}", e);
        return DaemonExitCode::ConfigError.into();
    }

    info!("Starting extdnsd webhook");

    let domain_filter = match config.provider.domain_filter() {
        Ok(filter) => filter,
        Err(e) => {
            error!("Invalid domain filter: {}", e);
            return DaemonExitCode::ConfigError.into();
        }
    };

    let client = match DreamhostClient::from_config(&config.provider) {
        Ok(client) => client,
        Err(e) => {
            error!("Failed to create DreamHost client: {}", e);
            return DaemonExitCode::ConfigError.into();
        }
    };

    info!(
        "DreamHost client ready [mode: {}]",
        if client.is_dry_run() { "DRY-RUN" } else { "LIVE" }
    );

    // Enter tokio runtime
    let rt = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            error!("Failed to create tokio runtime: {}", e);
            return DaemonExitCode::RuntimeError.into();
        }
    };

    let result = rt.block_on(async {
        if let Err(e) = run_daemon(config, client, domain_filter).await {
            error!("Daemon error: {:#}", e);
            DaemonExitCode::RuntimeError
        } else {
            DaemonExitCode::CleanShutdown
        }
    });

    result.into()
}

/// Run the daemon
async fn run_daemon(config: Config, client: DreamhostClient, domain_filter: DomainFilter) -> Result<()> {
    let status = Arc::new(HealthStatus::default());
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    // Health server first, so probes answer (503) while the webhook starts
    let health_address = config.health_address();
    info!("Starting liveness and readiness server on {}", health_address);
    let health_listener = TcpListener::bind(&health_address)
        .await
        .with_context(|| format!("Failed to bind health server on {}", health_address))?;
    let health_server = tokio::spawn(serve(
        health_listener,
        health::router(status.clone()),
        shutdown_rx.clone(),
    ));

    let (reconciler, events) =
        Reconciler::new(Box::new(client), domain_filter, &config.provider.reconciler)?;
    let event_logger = tokio::spawn(log_events(events));

    let webhook_address = config.webhook_address();
    info!("Starting webhook server on {}", webhook_address);
    let webhook_listener = TcpListener::bind(&webhook_address)
        .await
        .with_context(|| format!("Failed to bind webhook server on {}", webhook_address))?;
    let mut webhook_server = tokio::spawn(serve(
        webhook_listener,
        webhook::router(reconciler, config.timeouts()),
        shutdown_rx,
    ));

    status.set_healthy(true);
    status.set_ready(true);
    info!("Webhook ready");

    tokio::select! {
        signal = wait_for_shutdown() => {
            let signal = signal?;
            info!("Signal {} received. Shutting down the webhook.", signal);
        }
        exited = &mut webhook_server => {
            status.set_healthy(false);
            status.set_ready(false);
            exited.context("Webhook server task failed")??;
            anyhow::bail!("Webhook server stopped unexpectedly");
        }
    }

    status.set_healthy(false);
    status.set_ready(false);
    let _ = shutdown_tx.send(true);

    let drained = tokio::time::timeout(SHUTDOWN_TIMEOUT, async {
        let webhook = webhook_server.await;
        let health = health_server.await;
        (webhook, health)
    })
    .await;

    event_logger.abort();

    match drained {
        Ok((webhook, health)) => {
            webhook.context("Webhook server task failed")??;
            health.context("Health server task failed")??;
            info!("Shutdown complete");
            Ok(())
        }
        Err(_) => Err(anyhow::anyhow!(
            "Shutdown timeout after {:?}",
            SHUTDOWN_TIMEOUT
        )),
    }
}

/// Serve a router until the shutdown flag flips
async fn serve(listener: TcpListener, app: axum::Router, mut shutdown: watch::Receiver<bool>) -> Result<()> {
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            let _ = shutdown.wait_for(|stop| *stop).await;
        })
        .await
        .context("HTTP server error")
}

/// Log reconcile events until every sender is gone
async fn log_events(mut events: mpsc::Receiver<ReconcileEvent>) {
    while let Some(event) = events.recv().await {
        match event {
            ReconcileEvent::RecordsListed { listed, endpoints } => {
                debug!("Listed {} record(s) as {} endpoint(s)", listed, endpoints);
            }
            ReconcileEvent::ListFailed { error } => {
                warn!("Record listing failed: {}", error);
            }
            ReconcileEvent::ValueProcessed(outcome) => {
                debug!(
                    "{:?} {}: {}",
                    outcome.phase,
                    outcome.input,
                    outcome.error.as_deref().unwrap_or("ok")
                );
            }
            ReconcileEvent::AdjustFinished {
                endpoints,
                kept,
                dropped,
            } => {
                debug!(
                    "Adjusted {} endpoint(s): {} value(s) kept, {} dropped",
                    endpoints, kept, dropped
                );
            }
            ReconcileEvent::ApplyFinished { succeeded, failed } => {
                debug!("Apply pass finished: {} call(s) succeeded, {} failed", succeeded, failed);
            }
        }
    }
}

/// Wait for shutdown signals (SIGTERM, SIGINT)
///
/// # Returns
///
/// Returns the name of the signal received.
#[cfg(unix)]
async fn wait_for_shutdown() -> Result<&'static str> {
    // Set up signal handlers for SIGTERM and SIGINT
    let mut sigterm = signal(SignalKind::terminate())
        .map_err(|e| anyhow::anyhow!("Failed to setup SIGTERM handler: {}", e))?;
    let mut sigint = signal(SignalKind::interrupt())
        .map_err(|e| anyhow::anyhow!("Failed to setup SIGINT handler: {}", e))?;

    let signal = tokio::select! {
        _ = sigterm.recv() => "SIGTERM",
        _ = sigint.recv() => "SIGINT",
    };
    Ok(signal)
}

/// Wait for shutdown signals (SIGINT only)
///
/// Fallback implementation for non-Unix platforms.
#[cfg(not(unix))]
async fn wait_for_shutdown() -> Result<&'static str> {
    tokio::signal::ctrl_c()
        .await
        .map_err(|e| anyhow::anyhow!("Failed to wait for CTRL-C: {}", e))?;
    Ok("SIGINT")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_config() -> Config {
        Config {
            provider: ProviderConfig::new("6SHU5P2HLDAYECUM"),
            webhook_host: "localhost".to_string(),
            webhook_port: 8888,
            health_host: "0.0.0.0".to_string(),
            health_port: 8080,
            read_timeout_secs: 60,
            write_timeout_secs: 60,
            log_level: "info".to_string(),
        }
    }

    #[test]
    fn test_defaults_are_valid() {
        let config = valid_config();
        assert!(config.validate().is_ok());
        assert_eq!(config.webhook_address(), "localhost:8888");
        assert_eq!(config.health_address(), "0.0.0.0:8080");
        assert_eq!(config.timeouts().write, Duration::from_secs(60));
    }

    #[test]
    fn test_missing_api_key_rejected() {
        let mut config = valid_config();
        config.provider.api_key = String::new();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("DREAMHOST_API_KEY"));

        config.provider.api_key = "REPLACE_ME".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_server_settings_validated() {
        let mut config = valid_config();
        config.health_host = "localhost".to_string();
        config.health_port = 8888;
        assert!(config.validate().is_err());

        let mut config = valid_config();
        config.write_timeout_secs = 0;
        assert!(config.validate().is_err());

        let mut config = valid_config();
        config.webhook_port = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_invalid_log_level_rejected() {
        let mut config = valid_config();
        config.log_level = "verbose".to_string();
        assert!(config.validate().is_err());

        config.log_level = "DEBUG".to_string();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_provider_url_checked() {
        let mut config = valid_config();
        config.provider.api_url = "api.dreamhost.com".to_string();
        let err = config.validate().unwrap_err();
        assert!(format!("{:#}", err).contains("HTTP or HTTPS"));
    }
}
