use super::invoice_reader::InvoiceRecord;
use crate::domain::invoice::Invoice;
use crate::error::Result;
use std::io::Write;

/// Writes invoices as CSV in the same shape `InvoiceReader` accepts.
pub struct InvoiceWriter<W: Write> {
    writer: csv::Writer<W>,
}

impl<W: Write> InvoiceWriter<W> {
    pub fn new(sink: W) -> Self {
        Self {
            writer: csv::Writer::from_writer(sink),
        }
    }

    pub fn write_invoices<I>(&mut self, invoices: I) -> Result<()>
    where
        I: IntoIterator<Item = Invoice>,
    {
        for invoice in invoices {
            self.writer.serialize(InvoiceRecord::from(invoice))?;
        }
        self.writer.flush()?;
        Ok(())
    }
}
