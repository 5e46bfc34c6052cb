use crate::domain::charge::FailureKind;
use crate::domain::invoice::{Invoice, InvoiceId};
use crate::domain::ports::{CustomerStoreBox, InvoiceStoreBox, PaymentProviderBox};
use crate::error::{BillingError, Result};
use std::time::Duration;
use tracing::{debug, error, info, warn};

pub const DEFAULT_MAX_RETRIES: u32 = 3;
pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_secs(1);

/// What a run does once an invoice has used up its attempts on a recoverable failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExhaustionPolicy {
    /// Re-raise the last failure and leave the remaining invoices for the next run.
    #[default]
    Abort,
    /// Record the failure in the report and carry on with the next invoice.
    Continue,
}

#[derive(Debug, Clone)]
pub struct BillingConfig {
    /// Retries after the first attempt. `3` means four charges at most.
    pub max_retries: u32,
    /// Pause between a network failure and the next attempt.
    pub retry_delay: Duration,
    pub on_exhausted: ExhaustionPolicy,
}

impl Default for BillingConfig {
    fn default() -> Self {
        Self {
            max_retries: DEFAULT_MAX_RETRIES,
            retry_delay: DEFAULT_RETRY_DELAY,
            on_exhausted: ExhaustionPolicy::Abort,
        }
    }
}

impl BillingConfig {
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn with_retry_delay(mut self, retry_delay: Duration) -> Self {
        self.retry_delay = retry_delay;
        self
    }

    pub fn with_exhaustion_policy(mut self, policy: ExhaustionPolicy) -> Self {
        self.on_exhausted = policy;
        self
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_retries.saturating_add(1)
    }
}

/// An invoice that ran out of attempts, with the last failure it saw.
#[derive(Debug)]
pub struct InvoiceFailure {
    pub invoice_id: InvoiceId,
    pub error: BillingError,
}

/// Per-invoice outcome of one `settle_all` run.
#[derive(Debug, Default)]
pub struct SettlementReport {
    pub paid: Vec<InvoiceId>,
    pub declined: Vec<InvoiceId>,
    /// A replacement customer could not be created.
    pub abandoned: Vec<InvoiceId>,
    /// Already paid before the run started.
    pub skipped: Vec<InvoiceId>,
    pub failed: Vec<InvoiceFailure>,
}

impl SettlementReport {
    pub fn is_clean(&self) -> bool {
        self.failed.is_empty()
    }
}

enum Settlement {
    Paid,
    Declined,
    Abandoned,
    Exhausted(BillingError),
}

/// Charges every outstanding invoice, recovering from provider failures where a
/// policy exists.
///
/// Invoices are processed one after another in store order; the attempts for a
/// single invoice are strictly sequential.
pub struct BillingService {
    payment_provider: PaymentProviderBox,
    invoice_store: InvoiceStoreBox,
    customer_store: CustomerStoreBox,
    config: BillingConfig,
}

impl BillingService {
    pub fn new(
        payment_provider: PaymentProviderBox,
        invoice_store: InvoiceStoreBox,
        customer_store: CustomerStoreBox,
    ) -> Self {
        Self::with_config(
            payment_provider,
            invoice_store,
            customer_store,
            BillingConfig::default(),
        )
    }

    pub fn with_config(
        payment_provider: PaymentProviderBox,
        invoice_store: InvoiceStoreBox,
        customer_store: CustomerStoreBox,
        config: BillingConfig,
    ) -> Self {
        Self {
            payment_provider,
            invoice_store,
            customer_store,
            config,
        }
    }

    /// Current state of every invoice in the store.
    pub async fn invoices(&self) -> Result<Vec<Invoice>> {
        self.invoice_store.fetch_all().await
    }

    /// Attempts to charge every invoice that is not paid yet.
    ///
    /// Returns the first unclassified error as soon as it happens. An invoice that
    /// exhausts its attempts either aborts the run with its last failure or is
    /// recorded in the report, depending on [`ExhaustionPolicy`].
    pub async fn settle_all(&self) -> Result<SettlementReport> {
        let invoices = self.invoice_store.fetch_all().await?;
        info!(invoices = invoices.len(), "Starting invoice settlement");

        let mut report = SettlementReport::default();
        for invoice in invoices {
            let invoice_id = invoice.id;
            if invoice.is_paid() {
                debug!(invoice_id, "Skipping paid invoice");
                report.skipped.push(invoice_id);
                continue;
            }

            match self.settle_invoice(invoice).await? {
                Settlement::Paid => report.paid.push(invoice_id),
                Settlement::Declined => report.declined.push(invoice_id),
                Settlement::Abandoned => report.abandoned.push(invoice_id),
                Settlement::Exhausted(error) => match self.config.on_exhausted {
                    ExhaustionPolicy::Abort => {
                        error!(invoice_id, %error, "Retries exhausted, aborting settlement run");
                        return Err(error);
                    }
                    ExhaustionPolicy::Continue => {
                        warn!(invoice_id, %error, "Retries exhausted");
                        report.failed.push(InvoiceFailure { invoice_id, error });
                    }
                },
            }
        }

        info!(
            paid = report.paid.len(),
            declined = report.declined.len(),
            abandoned = report.abandoned.len(),
            failed = report.failed.len(),
            "Invoice settlement finished"
        );
        Ok(report)
    }

    async fn settle_invoice(&self, mut invoice: Invoice) -> Result<Settlement> {
        let max_attempts = self.config.max_attempts();
        let mut attempt = 1;

        loop {
            let error = match self.payment_provider.charge(&invoice).await {
                Ok(true) => {
                    invoice.mark_paid();
                    let invoice = self.invoice_store.update(invoice).await?;
                    info!(invoice_id = invoice.id, attempt, amount = %invoice.amount, "Invoice paid");
                    return Ok(Settlement::Paid);
                }
                Ok(false) => {
                    info!(invoice_id = invoice.id, attempt, "Charge declined");
                    return Ok(Settlement::Declined);
                }
                Err(error) => error,
            };

            let Some(kind) = FailureKind::classify(&error) else {
                return Err(error);
            };
            warn!(invoice_id = invoice.id, attempt, max_attempts, %error, "Charge failed");

            match kind {
                FailureKind::Network => {
                    if attempt < max_attempts {
                        tokio::time::sleep(self.config.retry_delay).await;
                    }
                }
                FailureKind::UnknownCustomer => {
                    if !self.replace_customer(&mut invoice).await? {
                        warn!(invoice_id = invoice.id, "No replacement customer, giving up");
                        return Ok(Settlement::Abandoned);
                    }
                }
                FailureKind::CurrencyMismatch => self.align_currency(&mut invoice).await?,
            }

            if attempt >= max_attempts {
                return Ok(Settlement::Exhausted(error));
            }
            attempt += 1;
        }
    }

    /// Creates a customer in the invoice's currency and moves the invoice to it.
    ///
    /// Returns `false` when the customer store could not create one.
    async fn replace_customer(&self, invoice: &mut Invoice) -> Result<bool> {
        let Some(customer) = self.customer_store.save(invoice.amount.currency).await? else {
            return Ok(false);
        };

        debug!(
            invoice_id = invoice.id,
            from = invoice.customer_id,
            to = customer.id,
            "Reassigning invoice customer"
        );
        invoice.customer_id = customer.id;
        *invoice = self.invoice_store.update(invoice.clone()).await?;
        Ok(true)
    }

    /// Re-labels the invoice amount with its customer's currency.
    async fn align_currency(&self, invoice: &mut Invoice) -> Result<()> {
        let customer = self.customer_store.fetch(invoice.customer_id).await?;

        debug!(
            invoice_id = invoice.id,
            from = %invoice.amount.currency,
            to = %customer.currency,
            "Aligning invoice currency"
        );
        invoice.amount = invoice.amount.with_currency(customer.currency);
        *invoice = self.invoice_store.update(invoice.clone()).await?;
        Ok(())
    }
}
