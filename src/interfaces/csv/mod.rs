pub mod invoice_reader;
pub mod invoice_writer;
