use crate::domain::customer::{Customer, CustomerId};
use crate::domain::invoice::{Invoice, InvoiceId};
use crate::domain::money::Currency;
use crate::domain::ports::{CustomerStore, InvoiceStore};
use crate::error::{BillingError, Result};
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// A thread-safe in-memory store for invoices.
///
/// Uses `Arc<RwLock<BTreeMap<u32, Invoice>>>` so clones share state and
/// `fetch_all` yields invoices ordered by id.
#[derive(Default, Clone)]
pub struct InMemoryInvoiceStore {
    invoices: Arc<RwLock<BTreeMap<InvoiceId, Invoice>>>,
}

impl InMemoryInvoiceStore {
    /// Creates a new, empty in-memory invoice store.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl InvoiceStore for InMemoryInvoiceStore {
    async fn fetch_all(&self) -> Result<Vec<Invoice>> {
        let invoices = self.invoices.read().await;
        Ok(invoices.values().cloned().collect())
    }

    async fn fetch(&self, id: InvoiceId) -> Result<Invoice> {
        let invoices = self.invoices.read().await;
        invoices
            .get(&id)
            .cloned()
            .ok_or(BillingError::InvoiceNotFound(id))
    }

    async fn update(&self, invoice: Invoice) -> Result<Invoice> {
        let mut invoices = self.invoices.write().await;
        let slot = invoices
            .get_mut(&invoice.id)
            .ok_or(BillingError::InvoiceNotFound(invoice.id))?;
        *slot = invoice.clone();
        Ok(invoice)
    }

    async fn insert(&self, invoice: Invoice) -> Result<()> {
        let mut invoices = self.invoices.write().await;
        invoices.insert(invoice.id, invoice);
        Ok(())
    }
}

/// A thread-safe in-memory store for customers.
///
/// New customers get the id after the highest one currently stored.
#[derive(Default, Clone)]
pub struct InMemoryCustomerStore {
    customers: Arc<RwLock<BTreeMap<CustomerId, Customer>>>,
}

impl InMemoryCustomerStore {
    /// Creates a new, empty in-memory customer store.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CustomerStore for InMemoryCustomerStore {
    async fn fetch(&self, id: CustomerId) -> Result<Customer> {
        let customers = self.customers.read().await;
        customers
            .get(&id)
            .copied()
            .ok_or(BillingError::CustomerNotFound(id))
    }

    async fn fetch_all(&self) -> Result<Vec<Customer>> {
        let customers = self.customers.read().await;
        Ok(customers.values().copied().collect())
    }

    async fn save(&self, currency: Currency) -> Result<Option<Customer>> {
        let mut customers = self.customers.write().await;
        let next_id = match customers.last_key_value() {
            Some((&id, _)) => id.checked_add(1),
            None => Some(1),
        };
        // The id space is exhausted; nothing can be created.
        let Some(id) = next_id else {
            return Ok(None);
        };

        let customer = Customer::new(id, currency);
        customers.insert(id, customer);
        Ok(Some(customer))
    }

    async fn insert(&self, customer: Customer) -> Result<()> {
        let mut customers = self.customers.write().await;
        customers.insert(customer.id, customer);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::invoice::InvoiceStatus;
    use crate::domain::money::Money;
    use rust_decimal_macros::dec;

    #[tokio::test]
    async fn test_in_memory_invoice_store() {
        let store = InMemoryInvoiceStore::new();
        let invoice = Invoice::new(1, 2, Money::new(dec!(500), Currency::Sek));

        store.insert(invoice.clone()).await.unwrap();
        let retrieved = store.fetch(1).await.unwrap();
        assert_eq!(retrieved, invoice);

        assert!(matches!(
            store.fetch(2).await,
            Err(BillingError::InvoiceNotFound(2))
        ));
    }

    #[tokio::test]
    async fn test_fetch_all_is_ordered_by_id() {
        let store = InMemoryInvoiceStore::new();
        for id in [3, 1, 2] {
            let invoice = Invoice::new(id, 1, Money::new(dec!(1), Currency::Eur));
            store.insert(invoice).await.unwrap();
        }

        let ids: Vec<_> = store
            .fetch_all()
            .await
            .unwrap()
            .into_iter()
            .map(|invoice| invoice.id)
            .collect();
        assert_eq!(ids, vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn test_update_replaces_state() {
        let store = InMemoryInvoiceStore::new();
        let mut invoice = Invoice::new(1, 2, Money::new(dec!(500), Currency::Sek));
        store.insert(invoice.clone()).await.unwrap();

        invoice.mark_paid();
        invoice.customer_id = 7;
        let returned = store.update(invoice.clone()).await.unwrap();
        assert_eq!(returned, invoice);

        let stored = store.fetch(1).await.unwrap();
        assert_eq!(stored.status, InvoiceStatus::Paid);
        assert_eq!(stored.customer_id, 7);
    }

    #[tokio::test]
    async fn test_update_unknown_invoice_fails() {
        let store = InMemoryInvoiceStore::new();
        let invoice = Invoice::new(9, 2, Money::new(dec!(500), Currency::Sek));

        assert!(matches!(
            store.update(invoice).await,
            Err(BillingError::InvoiceNotFound(9))
        ));
    }

    #[tokio::test]
    async fn test_in_memory_customer_store() {
        let store = InMemoryCustomerStore::new();
        store.insert(Customer::new(2, Currency::Eur)).await.unwrap();

        assert_eq!(store.fetch(2).await.unwrap().currency, Currency::Eur);
        assert!(matches!(
            store.fetch(5).await,
            Err(BillingError::CustomerNotFound(5))
        ));
    }

    #[tokio::test]
    async fn test_save_allocates_next_id() {
        let store = InMemoryCustomerStore::new();
        let first = store.save(Currency::Dkk).await.unwrap().unwrap();
        assert_eq!(first.id, 1);

        store.insert(Customer::new(10, Currency::Eur)).await.unwrap();
        let next = store.save(Currency::Sek).await.unwrap().unwrap();
        assert_eq!(next, Customer::new(11, Currency::Sek));
        assert_eq!(store.fetch_all().await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_save_returns_none_when_ids_run_out() {
        let store = InMemoryCustomerStore::new();
        store
            .insert(Customer::new(u32::MAX, Currency::Usd))
            .await
            .unwrap();

        assert!(store.save(Currency::Usd).await.unwrap().is_none());
    }
}
