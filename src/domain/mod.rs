//! Domain types and the ports the settlement engine talks through.

pub mod charge;
pub mod customer;
pub mod invoice;
pub mod money;
pub mod ports;
