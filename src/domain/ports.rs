use super::customer::{Customer, CustomerId};
use super::invoice::{Invoice, InvoiceId};
use super::money::Currency;
use crate::error::Result;
use async_trait::async_trait;

#[async_trait]
pub trait InvoiceStore: Send + Sync {
    /// Snapshot of every invoice, ordered by id.
    async fn fetch_all(&self) -> Result<Vec<Invoice>>;
    async fn fetch(&self, id: InvoiceId) -> Result<Invoice>;
    /// Persists the full state of an existing invoice and returns what was stored.
    async fn update(&self, invoice: Invoice) -> Result<Invoice>;
    async fn insert(&self, invoice: Invoice) -> Result<()>;
}

#[async_trait]
pub trait CustomerStore: Send + Sync {
    /// Fails with `BillingError::CustomerNotFound` when the id is unknown.
    async fn fetch(&self, id: CustomerId) -> Result<Customer>;
    async fn fetch_all(&self) -> Result<Vec<Customer>>;
    /// Creates a customer billed in `currency`. `None` when no customer could be created.
    async fn save(&self, currency: Currency) -> Result<Option<Customer>>;
    async fn insert(&self, customer: Customer) -> Result<()>;
}

#[async_trait]
pub trait PaymentProvider: Send + Sync {
    /// `Ok(true)` when the charge went through, `Ok(false)` when it was declined.
    ///
    /// Fails with `Network`, `CustomerNotFound` or `CurrencyMismatch` for the
    /// recoverable cases.
    async fn charge(&self, invoice: &Invoice) -> Result<bool>;
}

pub type InvoiceStoreBox = Box<dyn InvoiceStore>;
pub type CustomerStoreBox = Box<dyn CustomerStore>;
pub type PaymentProviderBox = Box<dyn PaymentProvider>;
