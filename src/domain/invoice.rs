use super::customer::CustomerId;
use super::money::Money;
use serde::{Deserialize, Serialize};

pub type InvoiceId = u32;

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone, Copy, Default)]
#[serde(rename_all = "UPPERCASE")]
pub enum InvoiceStatus {
    #[default]
    Pending,
    Paid,
}

/// A billable record owned by a customer.
///
/// The `id` never changes. The customer and the amount may be rewritten while the
/// invoice is being settled, and `status` moves from `Pending` to `Paid` exactly once.
#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
pub struct Invoice {
    pub id: InvoiceId,
    pub customer_id: CustomerId,
    pub amount: Money,
    pub status: InvoiceStatus,
}

impl Invoice {
    pub fn new(id: InvoiceId, customer_id: CustomerId, amount: Money) -> Self {
        Self {
            id,
            customer_id,
            amount,
            status: InvoiceStatus::Pending,
        }
    }

    pub fn is_paid(&self) -> bool {
        self.status == InvoiceStatus::Paid
    }

    pub fn mark_paid(&mut self) {
        self.status = InvoiceStatus::Paid;
    }
}
