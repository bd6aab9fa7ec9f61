use chrono::{Duration, Utc};
use sqlx::PgPool;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{info, warn};

use crate::config::ReconciliationSettings;
use crate::error::Result;
use crate::provider::{PaymentProvider, RemoteTransferStatus};
use crate::repositories::TransferRepository;
use crate::services::TransferService;

/// Outcome of one reconciliation pass.
#[derive(Debug, Default, Clone, Copy)]
pub struct ReconciliationReport {
    pub checked: usize,
    pub confirmed: usize,
    pub compensated: usize,
    pub still_pending: usize,
}

/// Periodically re-verifies stale pending state against the provider. A
/// local timeout is treated as failure and compensated, but the provider's
/// action may still have succeeded after the timeout; this poll detects and
/// corrects that drift. The webhook endpoint also acknowledges
/// unconditionally, so internally-dropped events surface here too.
pub struct ReconciliationService {
    transfer_repo: TransferRepository,
    transfer_service: Arc<TransferService>,
    provider: Arc<dyn PaymentProvider>,
    settings: ReconciliationSettings,
    running: Arc<AtomicBool>,
}

impl ReconciliationService {
    pub fn new(
        pool: PgPool,
        transfer_service: Arc<TransferService>,
        provider: Arc<dyn PaymentProvider>,
        settings: ReconciliationSettings,
    ) -> Self {
        Self {
            transfer_repo: TransferRepository::new(pool),
            transfer_service,
            provider,
            settings,
            running: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Runs the reconciliation loop until `stop` is called.
    pub async fn start(&self) {
        self.running.store(true, Ordering::SeqCst);
        info!(
            interval_secs = self.settings.interval_secs,
            "reconciliation loop started"
        );

        while self.running.load(Ordering::SeqCst) {
            match self.run_once().await {
                Ok(report) => {
                    if report.checked > 0 {
                        info!(
                            checked = report.checked,
                            confirmed = report.confirmed,
                            compensated = report.compensated,
                            still_pending = report.still_pending,
                            "reconciliation pass complete"
                        );
                    }
                }
                Err(e) => warn!(error = %e, "reconciliation pass failed"),
            }

            tokio::time::sleep(std::time::Duration::from_secs(self.settings.interval_secs)).await;
        }

        info!("reconciliation loop stopped");
    }

    pub fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// One pass: every non-terminal transfer older than the staleness
    /// cutoff is re-checked against the provider and moved to the same
    /// terminal transitions the webhook path applies.
    pub async fn run_once(&self) -> Result<ReconciliationReport> {
        let cutoff = Utc::now() - Duration::seconds(self.settings.stale_after_secs);
        let stale = self.transfer_repo.find_stale_pending(cutoff).await?;

        let mut report = ReconciliationReport {
            checked: stale.len(),
            ..Default::default()
        };

        for transfer in stale {
            match self.provider.verify_transfer(&transfer.reference).await {
                Ok(RemoteTransferStatus::Success) => {
                    self.transfer_service.confirm_success(&transfer).await?;
                    report.confirmed += 1;
                }
                Ok(RemoteTransferStatus::Failed | RemoteTransferStatus::Reversed) => {
                    self.transfer_service
                        .fail_with_compensation(&transfer, "transfer failed (reconciliation)")
                        .await?;
                    report.compensated += 1;
                }
                Ok(RemoteTransferStatus::Pending) => {
                    report.still_pending += 1;
                }
                Err(e) => {
                    warn!(
                        reference = %transfer.reference,
                        error = %e,
                        "could not verify transfer, leaving for next pass"
                    );
                    report.still_pending += 1;
                }
            }
        }

        Ok(report)
    }
}
