//! Key rotation background task.
//!
//! Periodically checks the key store:
//! 1. Registers a new signing key when no valid key outlives the lead window
//! 2. Purges keys that expired longer ago than the retention window, if set
//!
//! # Graceful Shutdown
//!
//! The task exits when its cancellation token is cancelled. An iteration in
//! progress is allowed to finish first.

use crate::config::KeyPolicy;
use crate::errors::JwksError;
use crate::models::{self, KeyPair};
use crate::observability::metrics;
use crate::repositories::KeyStore;
use crate::services::key_management_service;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{info, instrument, warn};

/// Default rotation check interval in seconds (1 hour).
const DEFAULT_CHECK_INTERVAL_SECONDS: u64 = 3600;

/// Default lead time in seconds: rotate when the newest key expires sooner.
const DEFAULT_LEAD_SECONDS: i64 = 3600;

/// Configuration for the key rotation task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyRotationConfig {
    /// Rotation check interval in seconds.
    pub check_interval_seconds: u64,
    /// Rotate once no valid key remains valid beyond `now + lead_seconds`.
    pub lead_seconds: i64,
    /// Delete keys whose `not_after` is older than this. `None` keeps them.
    pub retention_seconds: Option<i64>,
}

impl Default for KeyRotationConfig {
    fn default() -> Self {
        Self {
            check_interval_seconds: DEFAULT_CHECK_INTERVAL_SECONDS,
            lead_seconds: DEFAULT_LEAD_SECONDS,
            retention_seconds: None,
        }
    }
}

/// What a single rotation pass did.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RotationReport {
    pub rotated_kid: Option<String>,
    pub purged_kids: Vec<String>,
}

/// Start the key rotation background task.
///
/// Returns when the cancellation token is triggered.
#[instrument(skip_all, name = "jwks.task.key_rotation")]
pub async fn start_key_rotation(
    store: Arc<dyn KeyStore>,
    policy: KeyPolicy,
    config: KeyRotationConfig,
    cancel_token: CancellationToken,
) {
    info!(
        target: "jwks.task.key_rotation",
        check_interval_seconds = config.check_interval_seconds,
        lead_seconds = config.lead_seconds,
        retention_seconds = ?config.retention_seconds,
        "Starting key rotation task"
    );

    let mut interval =
        tokio::time::interval(std::time::Duration::from_secs(config.check_interval_seconds));

    loop {
        tokio::select! {
            _ = interval.tick() => {
                run_rotation(store.as_ref(), &policy, &config, Utc::now()).await;
            }
            _ = cancel_token.cancelled() => {
                info!(
                    target: "jwks.task.key_rotation",
                    "Key rotation task received shutdown signal, exiting"
                );
                break;
            }
        }
    }

    info!(target: "jwks.task.key_rotation", "Key rotation task stopped");
}

/// Run a single rotation pass.
///
/// Failures are logged and counted; the next tick retries.
pub async fn run_rotation(
    store: &dyn KeyStore,
    policy: &KeyPolicy,
    config: &KeyRotationConfig,
    now: DateTime<Utc>,
) -> RotationReport {
    let mut report = RotationReport::default();

    match rotation_horizon(store, config, now).await {
        Ok((valid, horizon)) if valid.iter().any(|k| k.not_after() > horizon) => {
            metrics::record_key_rotation("skipped");
        }
        Ok(_) => match key_management_service::rotate_signing_key(store, policy, now).await {
            Ok(kid) => {
                info!(target: "jwks.task.key_rotation", kid = %kid, "Rotated signing key");
                metrics::record_key_rotation("success");
                report.rotated_kid = Some(kid);
            }
            Err(e) => {
                tracing::error!(
                    target: "jwks.task.key_rotation",
                    error = %e,
                    "Failed to rotate signing key"
                );
                metrics::record_key_rotation("error");
            }
        },
        Err(e) => {
            tracing::error!(
                target: "jwks.task.key_rotation",
                error = %e,
                "Failed to check valid signing keys"
            );
            metrics::record_key_rotation("error");
        }
    }

    if let Some(retention_seconds) = config.retention_seconds {
        let Some(cutoff) = models::offset_by_seconds(now, -retention_seconds) else {
            tracing::error!(
                target: "jwks.task.key_rotation",
                retention_seconds,
                "Retention window out of range, skipping purge"
            );
            return report;
        };
        match store.purge_expired_before(cutoff).await {
            Ok(purged) => {
                if !purged.is_empty() {
                    warn!(
                        target: "jwks.task.key_rotation",
                        purged_count = purged.len(),
                        retention_seconds,
                        "Purged expired signing keys"
                    );
                }
                report.purged_kids = purged;
            }
            Err(e) => {
                tracing::error!(
                    target: "jwks.task.key_rotation",
                    error = %e,
                    "Failed to purge expired signing keys"
                );
            }
        }
    }

    report
}

/// Valid keys at `now` plus the instant the newest one must outlive.
async fn rotation_horizon(
    store: &dyn KeyStore,
    config: &KeyRotationConfig,
    now: DateTime<Utc>,
) -> Result<(Vec<KeyPair>, DateTime<Utc>), JwksError> {
    let Some(horizon) = models::offset_by_seconds(now, config.lead_seconds) else {
        tracing::error!(
            target: "jwks.task.key_rotation",
            lead_seconds = config.lead_seconds,
            "Rotation lead window out of range"
        );
        return Err(JwksError::Internal);
    };
    let valid = store.list_valid(now).await?;
    Ok((valid, horizon))
}
