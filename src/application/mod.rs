//! Application layer containing the settlement orchestration.
//!
//! `BillingService` owns the charge/retry/remediation loop over the invoice set.
//! `BillingJob` is the trigger that invokes it periodically.

pub mod billing;
pub mod job;
