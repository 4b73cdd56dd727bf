//! Cycle driver — runs the batch scheduler over all accounts, sleeps, repeats.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::account::build_sessions;
use crate::client::ClientFactory;
use crate::config::BotConfig;
use crate::error::InputError;
use crate::input::ProxyRef;
use crate::worker::scheduler::{BatchScheduler, CycleReport};

/// Owns the account list and drives one cycle after another.
pub struct CycleDriver {
    scheduler: BatchScheduler,
    accounts: Vec<String>,
    proxies: Vec<ProxyRef>,
    interval: Duration,
    cycle_count: u64,
    next_run_at: Option<DateTime<Utc>>,
}

impl CycleDriver {
    /// Refuses to build a driver with no accounts.
    pub fn new(
        config: Arc<BotConfig>,
        factory: Arc<dyn ClientFactory>,
        accounts: Vec<String>,
        proxies: Vec<ProxyRef>,
    ) -> Result<Self, InputError> {
        if accounts.is_empty() {
            return Err(InputError::NoAccounts {
                path: config.data_file.display().to_string(),
            });
        }

        Ok(Self {
            interval: config.cycle_interval,
            scheduler: BatchScheduler::new(config, factory),
            accounts,
            proxies,
            cycle_count: 0,
            next_run_at: None,
        })
    }

    /// Completed cycles so far.
    pub fn cycle_count(&self) -> u64 {
        self.cycle_count
    }

    /// When the next cycle is due, if one has been scheduled.
    pub fn next_run_at(&self) -> Option<DateTime<Utc>> {
        self.next_run_at
    }

    /// Process every account once. Sessions are rebuilt from the raw list.
    pub async fn run_once(&mut self) -> CycleReport {
        let cycle = self.cycle_count + 1;
        let sessions = build_sessions(&self.accounts, &self.proxies);
        let report = self.scheduler.run_cycle(sessions, cycle).await;
        self.cycle_count = cycle;

        info!(
            cycle,
            batches = report.batches,
            succeeded = report.succeeded(),
            failed = report.failed(),
            "All users processed"
        );
        report
    }

    /// Run cycles until `shutdown` fires. The token is checked between cycles
    /// and during the inter-cycle sleep; an in-flight cycle always finishes.
    ///
    /// Returns the number of cycles completed.
    pub async fn run_forever(&mut self, shutdown: CancellationToken) -> u64 {
        while !shutdown.is_cancelled() {
            self.run_once().await;

            self.next_run_at = next_run_after(Utc::now(), self.interval);
            info!(
                next_run_at = ?self.next_run_at.map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string()),
                "Restarting the loop after {} minutes...",
                self.interval.as_secs() / 60
            );

            tokio::select! {
                _ = tokio::time::sleep(self.interval) => {}
                _ = shutdown.cancelled() => break,
            }
        }

        info!(cycles = self.cycle_count, "Cycle driver stopped");
        self.cycle_count
    }
}

/// `now + interval`, or `None` when that is past what `DateTime` can hold.
fn next_run_after(now: DateTime<Utc>, interval: Duration) -> Option<DateTime<Utc>> {
    chrono::Duration::from_std(interval)
        .ok()
        .and_then(|d| now.checked_add_signed(d))
}
