use chrono::Utc;
use std::time::Duration;

use crate::config::AppState;
use crate::domain::checkout::expire_stale_checkouts;
use crate::domain::retention::{run_cleanup, CleanupOptions, RetentionPolicy};

const RETENTION_INTERVAL: Duration = Duration::from_secs(6 * 60 * 60);
const STALE_CHECKOUT_INTERVAL: Duration = Duration::from_secs(5 * 60);

/// Background jobs: the file retention sweep and stale checkout reconciliation
pub struct PrintScheduler {
    state: AppState,
}

impl PrintScheduler {
    pub fn new(state: AppState) -> Self {
        Self { state }
    }

    /// Spawn the periodic tasks unless DISABLE_SCHEDULER is set
    pub fn start(self) {
        if self.state.config.disable_scheduler {
            tracing::info!("🖨️ Print scheduler disabled via DISABLE_SCHEDULER environment variable");
            return;
        }

        tracing::info!("🖨️ Starting Print Service Background Scheduler...");

        let retention_state = self.state.clone();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(RETENTION_INTERVAL);

            loop {
                interval.tick().await;
                tracing::info!("🧹 Running scheduled file retention sweep...");

                let state = retention_state.clone();
                tokio::spawn(async move {
                    for attempt in 1..=3 {
                        match run_cleanup(
                            &state.orders,
                            &state.storage,
                            &RetentionPolicy::default(),
                            &CleanupOptions::default(),
                            Utc::now(),
                        )
                        .await
                        {
                            Ok(report) => {
                                if report.files_deleted + report.temp_files_deleted > 0 {
                                    tracing::info!(
                                        "✅ Retention sweep freed {:.2} MB from {} file(s)",
                                        report.mb_freed,
                                        report.files_deleted + report.temp_files_deleted
                                    );
                                }
                                break;
                            }
                            Err(e) => {
                                if attempt == 3 {
                                    tracing::error!("❌ Failed to run retention sweep after 3 attempts: {}", e);
                                } else {
                                    tokio::time::sleep(Duration::from_millis(1000)).await;
                                }
                            }
                        }
                    }
                });
            }
        });

        let state = self.state;
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(STALE_CHECKOUT_INTERVAL);

            loop {
                interval.tick().await;

                let state = state.clone();
                tokio::spawn(async move {
                    let older_than =
                        Utc::now() - chrono::Duration::minutes(state.config.checkout_expiry_minutes);

                    for attempt in 1..=3 {
                        match expire_stale_checkouts(
                            &state.orders,
                            state.gateway.as_ref(),
                            &state.storage,
                            older_than,
                        )
                        .await
                        {
                            Ok(settled) => {
                                if settled > 0 {
                                    tracing::info!("✅ Reconciled {} stale checkout(s)", settled);
                                }
                                break;
                            }
                            Err(e) => {
                                if attempt == 3 {
                                    tracing::error!("❌ Failed to reconcile stale checkouts after 3 attempts: {}", e);
                                } else {
                                    tokio::time::sleep(Duration::from_millis(1000)).await;
                                }
                            }
                        }
                    }
                });
            }
        });
    }
}
