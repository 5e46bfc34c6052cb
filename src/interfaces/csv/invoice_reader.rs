use crate::domain::customer::{Customer, CustomerId};
use crate::domain::invoice::{Invoice, InvoiceId, InvoiceStatus};
use crate::domain::money::{Currency, Money};
use crate::error::{BillingError, Result};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::io::Read;

/// Flat CSV shape of an invoice: `id,customer_id,value,currency,status`.
///
/// `status` may be omitted and defaults to `PENDING`.
#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
pub struct InvoiceRecord {
    pub id: InvoiceId,
    pub customer_id: CustomerId,
    // Read as text; csv would otherwise go through f64 and drop scale and precision.
    #[serde(with = "rust_decimal::serde::str")]
    pub value: Decimal,
    pub currency: Currency,
    #[serde(default)]
    pub status: InvoiceStatus,
}

impl From<InvoiceRecord> for Invoice {
    fn from(record: InvoiceRecord) -> Self {
        Self {
            id: record.id,
            customer_id: record.customer_id,
            amount: Money::new(record.value, record.currency),
            status: record.status,
        }
    }
}

impl From<Invoice> for InvoiceRecord {
    fn from(invoice: Invoice) -> Self {
        Self {
            id: invoice.id,
            customer_id: invoice.customer_id,
            value: invoice.amount.value,
            currency: invoice.amount.currency,
            status: invoice.status,
        }
    }
}

fn csv_reader<R: Read>(source: R) -> csv::Reader<R> {
    csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .flexible(true)
        .from_reader(source)
}

/// Reads invoices from a CSV source.
///
/// Yields one `Result<Invoice>` per row so a malformed row can be reported and skipped.
pub struct InvoiceReader<R: Read> {
    reader: csv::Reader<R>,
}

impl<R: Read> InvoiceReader<R> {
    pub fn new(source: R) -> Self {
        Self {
            reader: csv_reader(source),
        }
    }

    pub fn invoices(self) -> impl Iterator<Item = Result<Invoice>> {
        self.reader
            .into_deserialize::<InvoiceRecord>()
            .map(|result| result.map(Invoice::from).map_err(BillingError::from))
    }
}

/// Reads customers (`id,currency`) from a CSV source.
pub struct CustomerReader<R: Read> {
    reader: csv::Reader<R>,
}

impl<R: Read> CustomerReader<R> {
    pub fn new(source: R) -> Self {
        Self {
            reader: csv_reader(source),
        }
    }

    pub fn customers(self) -> impl Iterator<Item = Result<Customer>> {
        self.reader
            .into_deserialize::<Customer>()
            .map(|result| result.map_err(BillingError::from))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_reader_valid_stream() {
        let data = "id, customer_id, value, currency, status\n\
                    1, 2, 500.00, SEK, PENDING\n\
                    2, 3, 12.5, EUR, PAID";
        let reader = InvoiceReader::new(data.as_bytes());
        let results: Vec<Result<Invoice>> = reader.invoices().collect();

        assert_eq!(results.len(), 2);
        let first = results[0].as_ref().unwrap();
        assert_eq!(first.customer_id, 2);
        assert_eq!(first.amount, Money::new(dec!(500.00), Currency::Sek));
        assert!(!first.is_paid());
        assert!(results[1].as_ref().unwrap().is_paid());
    }

    #[test]
    fn test_missing_status_defaults_to_pending() {
        let data = "id, customer_id, value, currency\n7, 1, 10, USD";
        let reader = InvoiceReader::new(data.as_bytes());
        let invoice = reader.invoices().next().unwrap().unwrap();

        assert_eq!(invoice.status, InvoiceStatus::Pending);
    }

    #[test]
    fn test_reader_malformed_line() {
        let data = "id, customer_id, value, currency, status\n1, 2, 500, XYZ, PENDING";
        let reader = InvoiceReader::new(data.as_bytes());
        let results: Vec<Result<Invoice>> = reader.invoices().collect();

        assert!(matches!(results[0], Err(BillingError::CsvError(_))));
    }

    #[test]
    fn test_customer_reader() {
        let data = "id, currency\n1, DKK\n2, GBP";
        let reader = CustomerReader::new(data.as_bytes());
        let customers: Vec<Customer> = reader.customers().map(|c| c.unwrap()).collect();

        assert_eq!(
            customers,
            vec![Customer::new(1, Currency::Dkk), Customer::new(2, Currency::Gbp)]
        );
    }
}
