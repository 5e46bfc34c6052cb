use crate::domain::customer::{Customer, CustomerId};
use crate::domain::invoice::{Invoice, InvoiceId};
use crate::domain::money::Currency;
use crate::domain::ports::{CustomerStore, InvoiceStore};
use crate::error::{BillingError, Result};
use async_trait::async_trait;
use rocksdb::{ColumnFamily, ColumnFamilyDescriptor, DB, IteratorMode, Options};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Column Family for storing invoices.
pub const CF_INVOICES: &str = "invoices";
/// Column Family for storing customers.
pub const CF_CUSTOMERS: &str = "customers";

/// A persistent store implementation using RocksDB.
///
/// Handles storage for both `Invoice` and `Customer` entities using separate
/// Column Families. Keys are big-endian ids, so iteration follows id order.
///
/// This struct is thread-safe (`Clone` shares the underlying `Arc<DB>`).
#[derive(Clone)]
pub struct RocksDBStore {
    db: Arc<DB>,
    // Held by every write so check-then-put sequences are atomic.
    writes: Arc<Mutex<()>>,
}

impl RocksDBStore {
    /// Opens or creates a RocksDB instance at the specified path.
    ///
    /// Ensures that the required column families ("invoices" and "customers") exist.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.create_missing_column_families(true);

        let cf_invoices = ColumnFamilyDescriptor::new(CF_INVOICES, Options::default());
        let cf_customers = ColumnFamilyDescriptor::new(CF_CUSTOMERS, Options::default());

        let db = DB::open_cf_descriptors(&opts, path, vec![cf_invoices, cf_customers])?;

        Ok(Self {
            db: Arc::new(db),
            writes: Arc::new(Mutex::new(())),
        })
    }

    fn cf(&self, name: &str) -> Result<&ColumnFamily> {
        self.db.cf_handle(name).ok_or_else(|| {
            BillingError::InternalError(Box::new(std::io::Error::other(format!(
                "Column family '{}' not found",
                name
            ))))
        })
    }

    fn put<T: Serialize>(&self, cf_name: &str, id: u32, value: &T) -> Result<()> {
        let cf = self.cf(cf_name)?;
        let bytes = serde_json::to_vec(value).map_err(|e| {
            BillingError::InternalError(Box::new(std::io::Error::new(
                std::io::ErrorKind::InvalidData,
                format!("Serialization error: {}", e),
            )))
        })?;

        self.db.put_cf(&cf, id.to_be_bytes(), bytes)?;
        Ok(())
    }

    fn get<T: DeserializeOwned>(&self, cf_name: &str, id: u32) -> Result<Option<T>> {
        let cf = self.cf(cf_name)?;
        match self.db.get_cf(&cf, id.to_be_bytes())? {
            Some(bytes) => Ok(Some(decode(&bytes)?)),
            None => Ok(None),
        }
    }

    fn values<T: DeserializeOwned>(&self, cf_name: &str) -> Result<Vec<T>> {
        let cf = self.cf(cf_name)?;
        let mut values = Vec::new();
        for item in self.db.iterator_cf(cf, IteratorMode::Start) {
            let (_key, value) = item?;
            values.push(decode(&value)?);
        }
        Ok(values)
    }

    fn last_id(&self, cf_name: &str) -> Result<Option<u32>> {
        let cf = self.cf(cf_name)?;
        let Some(item) = self.db.iterator_cf(cf, IteratorMode::End).next() else {
            return Ok(None);
        };
        let (key, _value) = item?;
        let bytes: [u8; 4] = key.as_ref().try_into().map_err(|_| {
            BillingError::InternalError(Box::new(std::io::Error::other(format!(
                "Malformed key in '{}'",
                cf_name
            ))))
        })?;
        Ok(Some(u32::from_be_bytes(bytes)))
    }
}

fn decode<T: DeserializeOwned>(bytes: &[u8]) -> Result<T> {
    serde_json::from_slice(bytes).map_err(|e| {
        BillingError::InternalError(Box::new(std::io::Error::new(
            std::io::ErrorKind::InvalidData,
            format!("Deserialization error: {}", e),
        )))
    })
}

#[async_trait]
impl InvoiceStore for RocksDBStore {
    async fn fetch_all(&self) -> Result<Vec<Invoice>> {
        self.values(CF_INVOICES)
    }

    async fn fetch(&self, id: InvoiceId) -> Result<Invoice> {
        self.get(CF_INVOICES, id)?
            .ok_or(BillingError::InvoiceNotFound(id))
    }

    async fn update(&self, invoice: Invoice) -> Result<Invoice> {
        let _guard = self.writes.lock().await;
        if self.get::<Invoice>(CF_INVOICES, invoice.id)?.is_none() {
            return Err(BillingError::InvoiceNotFound(invoice.id));
        }
        self.put(CF_INVOICES, invoice.id, &invoice)?;
        Ok(invoice)
    }

    async fn insert(&self, invoice: Invoice) -> Result<()> {
        let _guard = self.writes.lock().await;
        self.put(CF_INVOICES, invoice.id, &invoice)
    }
}

#[async_trait]
impl CustomerStore for RocksDBStore {
    async fn fetch(&self, id: CustomerId) -> Result<Customer> {
        self.get(CF_CUSTOMERS, id)?
            .ok_or(BillingError::CustomerNotFound(id))
    }

    async fn fetch_all(&self) -> Result<Vec<Customer>> {
        self.values(CF_CUSTOMERS)
    }

    async fn save(&self, currency: Currency) -> Result<Option<Customer>> {
        let _guard = self.writes.lock().await;
        let next_id = match self.last_id(CF_CUSTOMERS)? {
            Some(id) => id.checked_add(1),
            None => Some(1),
        };
        let Some(id) = next_id else {
            return Ok(None);
        };

        let customer = Customer::new(id, currency);
        self.put(CF_CUSTOMERS, id, &customer)?;
        Ok(Some(customer))
    }

    async fn insert(&self, customer: Customer) -> Result<()> {
        let _guard = self.writes.lock().await;
        self.put(CF_CUSTOMERS, customer.id, &customer)
    }
}
