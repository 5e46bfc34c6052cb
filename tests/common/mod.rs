#![allow(dead_code)]

use async_trait::async_trait;
use invoice_settlement::domain::invoice::{Invoice, InvoiceId};
use invoice_settlement::domain::ports::{InvoiceStore, PaymentProvider};
use invoice_settlement::error::{BillingError, Result};
use invoice_settlement::infrastructure::in_memory::InMemoryInvoiceStore;
use std::sync::{Arc, Mutex};

#[derive(Debug, Clone, Copy)]
pub enum Reply {
    Accept,
    Decline,
    Network,
    UnknownCustomer,
    CurrencyMismatch,
}

impl Reply {
    fn into_result(self, invoice: &Invoice) -> Result<bool> {
        match self {
            Reply::Accept => Ok(true),
            Reply::Decline => Ok(false),
            Reply::Network => Err(BillingError::Network),
            Reply::UnknownCustomer => Err(BillingError::CustomerNotFound(invoice.customer_id)),
            Reply::CurrencyMismatch => Err(BillingError::CurrencyMismatch {
                invoice_id: invoice.id,
                customer_id: invoice.customer_id,
            }),
        }
    }
}

/// Answers a charge according to the exact state of the invoice it receives.
///
/// Invoices without a matching rule get the fallback reply.
#[derive(Clone)]
pub struct MockProvider {
    rules: Arc<Mutex<Vec<(Invoice, Reply)>>>,
    fallback: Reply,
    charged: Arc<Mutex<Vec<Invoice>>>,
}

impl MockProvider {
    pub fn new(fallback: Reply) -> Self {
        Self {
            rules: Arc::default(),
            fallback,
            charged: Arc::default(),
        }
    }

    pub fn when(self, invoice: &Invoice, reply: Reply) -> Self {
        self.rules.lock().unwrap().push((invoice.clone(), reply));
        self
    }

    pub fn charged(&self) -> Vec<Invoice> {
        self.charged.lock().unwrap().clone()
    }

    pub fn charges_for(&self, invoice_id: InvoiceId) -> usize {
        self.charged()
            .iter()
            .filter(|invoice| invoice.id == invoice_id)
            .count()
    }
}

#[async_trait]
impl PaymentProvider for MockProvider {
    async fn charge(&self, invoice: &Invoice) -> Result<bool> {
        self.charged.lock().unwrap().push(invoice.clone());
        let reply = self
            .rules
            .lock()
            .unwrap()
            .iter()
            .find(|(expected, _)| expected == invoice)
            .map(|(_, reply)| *reply)
            .unwrap_or(self.fallback);
        reply.into_result(invoice)
    }
}

/// Wraps the in-memory store and keeps every invoice passed to `update`.
#[derive(Clone, Default)]
pub struct RecordingInvoiceStore {
    inner: InMemoryInvoiceStore,
    updates: Arc<Mutex<Vec<Invoice>>>,
}

impl RecordingInvoiceStore {
    pub async fn with_invoices(invoices: &[Invoice]) -> Self {
        let store = Self::default();
        for invoice in invoices {
            store.inner.insert(invoice.clone()).await.unwrap();
        }
        store
    }

    pub fn updates(&self) -> Vec<Invoice> {
        self.updates.lock().unwrap().clone()
    }
}

#[async_trait]
impl InvoiceStore for RecordingInvoiceStore {
    async fn fetch_all(&self) -> Result<Vec<Invoice>> {
        self.inner.fetch_all().await
    }

    async fn fetch(&self, id: InvoiceId) -> Result<Invoice> {
        self.inner.fetch(id).await
    }

    async fn update(&self, invoice: Invoice) -> Result<Invoice> {
        self.updates.lock().unwrap().push(invoice.clone());
        self.inner.update(invoice).await
    }

    async fn insert(&self, invoice: Invoice) -> Result<()> {
        self.inner.insert(invoice).await
    }
}
