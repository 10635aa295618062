//! Session facade over the responsibility matrix core.
//!
//! A [`ResponsibilitySession`] loads the three views from a [`ResponsibilityGateway`], applies
//! edits optimistically, propagates contract assignments into the team matrix, and reconciles
//! with the authoritative collections the gateway returns.

use std::path::Path;

use anyhow::Context;

pub mod config;
pub mod error;
pub mod gateway;
pub mod session;
pub mod telemetry;

pub use config::{ConfigError, LoggingConfig, MatrixConfig, RolesConfig};
pub use error::{ErrorCategory, ErrorCode, ErrorReport, SessionError};
pub use gateway::{GatewayError, InMemoryGateway, ResponsibilityBundle, ResponsibilityGateway};
pub use session::{CsvExport, ResponsibilitySession};
pub use telemetry::init_tracing;

/// Read `config_path`, install tracing from its logging section, and load a session.
///
/// # Errors
/// Returns an error when the config cannot be loaded or the initial fetch fails.
pub async fn load_session_from_config<G: ResponsibilityGateway>(
    gateway: G,
    config_path: &Path,
) -> anyhow::Result<ResponsibilitySession<G>> {
    let display = config_path.display();
    let config = MatrixConfig::from_path(config_path)
        .with_context(|| format!("failed to load config {display}"))?;
    init_tracing(&config.logging);
    let session = ResponsibilitySession::load(gateway, &config)
        .await
        .context("failed to load responsibility data")?;
    Ok(session)
}
