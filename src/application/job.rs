use super::billing::{BillingService, SettlementReport};
use crate::error::Result;
use std::future::Future;
use std::time::Duration;
use tokio::time::MissedTickBehavior;
use tracing::{error, info};

pub const DEFAULT_JOB_INTERVAL: Duration = Duration::from_secs(60);

#[derive(Debug, Clone)]
pub struct JobConfig {
    /// Time between the start of two settlement runs.
    pub interval: Duration,
    /// Stop after this many runs. `None` runs until shutdown.
    pub max_runs: Option<u64>,
}

impl Default for JobConfig {
    fn default() -> Self {
        Self {
            interval: DEFAULT_JOB_INTERVAL,
            max_runs: None,
        }
    }
}

impl JobConfig {
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    pub fn with_max_runs(mut self, max_runs: u64) -> Self {
        self.max_runs = Some(max_runs);
        self
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct JobStats {
    pub runs: u64,
    pub failed_runs: u64,
    pub invoices_paid: usize,
    pub invoices_failed: usize,
}

/// Triggers [`BillingService::settle_all`] on a fixed interval.
///
/// Runs never overlap: the next tick is only awaited once the current run is over.
/// A failed run is logged and counted; the job keeps going.
pub struct BillingJob {
    service: BillingService,
    config: JobConfig,
}

impl BillingJob {
    pub fn new(service: BillingService, config: JobConfig) -> Self {
        Self { service, config }
    }

    pub fn service(&self) -> &BillingService {
        &self.service
    }

    pub async fn run_once(&self) -> Result<SettlementReport> {
        self.service.settle_all().await
    }

    /// Runs until `max_runs` is reached or `shutdown` resolves.
    ///
    /// `shutdown` is only observed between runs; a run in progress always completes.
    pub async fn run<F>(&self, shutdown: F) -> JobStats
    where
        F: Future<Output = ()>,
    {
        let mut ticker = tokio::time::interval(self.config.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        tokio::pin!(shutdown);

        let mut stats = JobStats::default();
        loop {
            if let Some(max_runs) = self.config.max_runs
                && stats.runs >= max_runs
            {
                break;
            }

            tokio::select! {
                biased;
                _ = &mut shutdown => {
                    info!(runs = stats.runs, "Billing job shutting down");
                    break;
                }
                _ = ticker.tick() => {}
            }

            stats.runs += 1;
            info!(run = stats.runs, "Running billing job");
            match self.run_once().await {
                Ok(report) => {
                    stats.invoices_paid += report.paid.len();
                    stats.invoices_failed += report.failed.len();
                }
                Err(e) => {
                    stats.failed_runs += 1;
                    error!(run = stats.runs, error = %e, "Billing run failed");
                }
            }
        }
        stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::invoice::Invoice;
    use crate::domain::money::{Currency, Money};
    use crate::domain::ports::{InvoiceStore, PaymentProvider};
    use crate::error::BillingError;
    use crate::infrastructure::in_memory::{InMemoryCustomerStore, InMemoryInvoiceStore};
    use async_trait::async_trait;
    use rust_decimal_macros::dec;

    struct AlwaysAccept;

    #[async_trait]
    impl PaymentProvider for AlwaysAccept {
        async fn charge(&self, _invoice: &Invoice) -> Result<bool> {
            Ok(true)
        }
    }

    struct AlwaysOffline;

    #[async_trait]
    impl PaymentProvider for AlwaysOffline {
        async fn charge(&self, _invoice: &Invoice) -> Result<bool> {
            Err(BillingError::Network)
        }
    }

    async fn job_with(provider: impl PaymentProvider + 'static, config: JobConfig) -> BillingJob {
        let invoices = InMemoryInvoiceStore::new();
        invoices
            .insert(Invoice::new(1, 1, Money::new(dec!(10), Currency::Usd)))
            .await
            .unwrap();
        let service = BillingService::new(
            Box::new(provider),
            Box::new(invoices),
            Box::new(InMemoryCustomerStore::new()),
        );
        BillingJob::new(service, config)
    }

    #[tokio::test(start_paused = true)]
    async fn test_job_runs_on_interval() {
        let job = job_with(
            AlwaysAccept,
            JobConfig::default()
                .with_interval(Duration::from_secs(10))
                .with_max_runs(3),
        )
        .await;

        let started = tokio::time::Instant::now();
        let stats = job.run(std::future::pending()).await;

        assert_eq!(stats.runs, 3);
        assert_eq!(stats.failed_runs, 0);
        // Paid on the first run, skipped afterwards.
        assert_eq!(stats.invoices_paid, 1);
        assert!(started.elapsed() >= Duration::from_secs(20));
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_runs_do_not_stop_the_job() {
        let job = job_with(AlwaysOffline, JobConfig::default().with_max_runs(2)).await;

        let stats = job.run(std::future::pending()).await;

        assert_eq!(stats.runs, 2);
        assert_eq!(stats.failed_runs, 2);
        assert_eq!(stats.invoices_paid, 0);
    }

    #[tokio::test]
    async fn test_shutdown_before_first_run() {
        let job = job_with(AlwaysAccept, JobConfig::default()).await;

        let stats = job.run(std::future::ready(())).await;

        assert_eq!(stats, JobStats::default());
    }
}
