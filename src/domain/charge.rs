use crate::error::BillingError;

/// The provider failures that have a recovery policy.
///
/// Anything that does not map to one of these is unclassified and is never retried.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum FailureKind {
    /// Transient; wait and charge again.
    Network,
    /// The invoice points at a customer the provider does not know.
    UnknownCustomer,
    /// The invoice currency differs from the customer's currency.
    CurrencyMismatch,
}

impl FailureKind {
    pub fn classify(error: &BillingError) -> Option<Self> {
        match error {
            BillingError::Network => Some(FailureKind::Network),
            BillingError::CustomerNotFound(_) => Some(FailureKind::UnknownCustomer),
            BillingError::CurrencyMismatch { .. } => Some(FailureKind::CurrencyMismatch),
            _ => None,
        }
    }
}
