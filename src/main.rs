use clap::Parser;
use invoice_settlement::application::billing::{
    BillingConfig, BillingService, DEFAULT_MAX_RETRIES, ExhaustionPolicy,
};
use invoice_settlement::application::job::{BillingJob, JobConfig};
use invoice_settlement::domain::ports::{CustomerStoreBox, InvoiceStoreBox};
use invoice_settlement::infrastructure::in_memory::{InMemoryCustomerStore, InMemoryInvoiceStore};
#[cfg(feature = "storage-rocksdb")]
use invoice_settlement::infrastructure::rocksdb::RocksDBStore;
use invoice_settlement::infrastructure::simulated::{SimulatedPaymentProvider, SimulationConfig};
use invoice_settlement::interfaces::csv::invoice_reader::{CustomerReader, InvoiceReader};
use invoice_settlement::interfaces::csv::invoice_writer::InvoiceWriter;
use miette::{IntoDiagnostic, Result};
use std::fs::File;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Invoices CSV file (id, customer_id, value, currency, status)
    invoices: PathBuf,

    /// Customers CSV file (id, currency)
    #[arg(long)]
    customers: Option<PathBuf>,

    /// Path to persistent database (optional). If provided, uses RocksDB.
    #[arg(long)]
    db_path: Option<PathBuf>,

    /// Retries per invoice after the first charge attempt
    #[arg(long, default_value_t = DEFAULT_MAX_RETRIES)]
    max_retries: u32,

    /// Pause after a network failure, in milliseconds
    #[arg(long, default_value_t = 1000)]
    retry_delay_ms: u64,

    /// Keep settling the remaining invoices when one runs out of retries
    #[arg(long)]
    continue_on_failure: bool,

    /// Simulated provider: probability of a network failure per charge
    #[arg(long, default_value_t = 0.0)]
    network_failure_rate: f64,

    /// Simulated provider: probability of a decline per valid charge
    #[arg(long, default_value_t = 0.0)]
    decline_rate: f64,

    /// Simulated provider: RNG seed
    #[arg(long, default_value_t = 0)]
    seed: u64,

    /// Run as a periodic job with this many seconds between runs
    #[arg(long)]
    interval_secs: Option<u64>,

    /// Number of job runs; runs until Ctrl-C when omitted
    #[arg(long, requires = "interval_secs")]
    runs: Option<u64>,
}

type Stores = (InvoiceStoreBox, CustomerStoreBox, CustomerStoreBox);

fn in_memory_stores() -> Stores {
    let customers = InMemoryCustomerStore::new();
    (
        Box::new(InMemoryInvoiceStore::new()),
        Box::new(customers.clone()),
        Box::new(customers),
    )
}

#[cfg(feature = "storage-rocksdb")]
fn open_stores(db_path: Option<&Path>) -> Result<Stores> {
    match db_path {
        Some(path) => {
            let store = RocksDBStore::open(path).into_diagnostic()?;
            Ok((
                Box::new(store.clone()),
                Box::new(store.clone()),
                Box::new(store),
            ))
        }
        None => Ok(in_memory_stores()),
    }
}

#[cfg(not(feature = "storage-rocksdb"))]
fn open_stores(db_path: Option<&Path>) -> Result<Stores> {
    if db_path.is_some() {
        warn!(
            "Persistent storage requested via --db-path, but 'storage-rocksdb' feature is not enabled. Falling back to In-Memory storage."
        );
    }
    Ok(in_memory_stores())
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .try_init();
}

/// Resolves on Ctrl-C. Never resolves if the handler cannot be installed, so the
/// job then only stops after `--runs`.
async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!(error = %e, "Could not listen for Ctrl-C");
        std::future::pending::<()>().await;
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();

    let (invoice_store, customer_store, provider_customers) = open_stores(cli.db_path.as_deref())?;

    // Seed the stores
    if let Some(path) = &cli.customers {
        let file = File::open(path).into_diagnostic()?;
        for customer in CustomerReader::new(file).customers() {
            match customer {
                Ok(customer) => customer_store.insert(customer).await.into_diagnostic()?,
                Err(e) => warn!(error = %e, "Error reading customer"),
            }
        }
    }
    let file = File::open(&cli.invoices).into_diagnostic()?;
    for invoice in InvoiceReader::new(file).invoices() {
        match invoice {
            Ok(invoice) => invoice_store.insert(invoice).await.into_diagnostic()?,
            Err(e) => warn!(error = %e, "Error reading invoice"),
        }
    }

    let simulation = SimulationConfig::default()
        .with_network_failure_rate(cli.network_failure_rate)
        .with_decline_rate(cli.decline_rate)
        .with_seed(cli.seed);
    let provider = SimulatedPaymentProvider::new(provider_customers, simulation).into_diagnostic()?;

    let policy = if cli.continue_on_failure {
        ExhaustionPolicy::Continue
    } else {
        ExhaustionPolicy::Abort
    };
    let config = BillingConfig::default()
        .with_max_retries(cli.max_retries)
        .with_retry_delay(Duration::from_millis(cli.retry_delay_ms))
        .with_exhaustion_policy(policy);
    let service =
        BillingService::with_config(Box::new(provider), invoice_store, customer_store, config);

    let mut job_config = JobConfig::default();
    if let Some(secs) = cli.interval_secs {
        job_config = job_config.with_interval(Duration::from_secs(secs));
    }
    if let Some(runs) = cli.runs {
        job_config = job_config.with_max_runs(runs);
    }
    let job = BillingJob::new(service, job_config);

    let outcome = if cli.interval_secs.is_some() {
        let stats = job.run(shutdown_signal()).await;
        info!(
            runs = stats.runs,
            failed_runs = stats.failed_runs,
            paid = stats.invoices_paid,
            "Billing job stopped"
        );
        Ok(())
    } else {
        job.run_once().await.map(|report| {
            for failure in &report.failed {
                error!(invoice_id = failure.invoice_id, error = %failure.error, "Invoice not settled");
            }
        })
    };

    // Output final state, even when the run failed
    let invoices = job.service().invoices().await.into_diagnostic()?;
    let stdout = io::stdout();
    let mut writer = InvoiceWriter::new(stdout.lock());
    writer.write_invoices(invoices).into_diagnostic()?;

    outcome.into_diagnostic()
}
