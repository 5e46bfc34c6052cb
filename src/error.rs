use crate::domain::customer::CustomerId;
use crate::domain::invoice::InvoiceId;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum BillingError {
    #[error("Network error while contacting the payment provider")]
    Network,
    #[error("Customer '{0}' was not found")]
    CustomerNotFound(CustomerId),
    #[error("Currency of invoice '{invoice_id}' does not match customer '{customer_id}'")]
    CurrencyMismatch {
        invoice_id: InvoiceId,
        customer_id: CustomerId,
    },
    #[error("Invoice '{0}' was not found")]
    InvoiceNotFound(InvoiceId),
    #[error("CSV error: {0}")]
    CsvError(#[from] csv::Error),
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
    #[error("Validation error: {0}")]
    ValidationError(String),
    #[error("Internal error: {0}")]
    InternalError(Box<dyn std::error::Error + Send + Sync>),
    #[cfg(feature = "storage-rocksdb")]
    #[error("Storage error: {0}")]
    StorageError(#[from] rocksdb::Error),
}

pub type Result<T> = std::result::Result<T, BillingError>;
