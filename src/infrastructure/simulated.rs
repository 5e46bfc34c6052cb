use crate::domain::invoice::Invoice;
use crate::domain::ports::{CustomerStoreBox, PaymentProvider};
use crate::error::{BillingError, Result};
use async_trait::async_trait;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::sync::Mutex;

#[derive(Debug, Clone)]
pub struct SimulationConfig {
    /// Probability in `[0, 1]` that a charge fails with a network error.
    pub network_failure_rate: f64,
    /// Probability in `[0, 1]` that a reachable, valid charge is declined.
    pub decline_rate: f64,
    pub seed: u64,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            network_failure_rate: 0.0,
            decline_rate: 0.0,
            seed: 0,
        }
    }
}

impl SimulationConfig {
    pub fn with_network_failure_rate(mut self, rate: f64) -> Self {
        self.network_failure_rate = rate;
        self
    }

    pub fn with_decline_rate(mut self, rate: f64) -> Self {
        self.decline_rate = rate;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    fn validate(&self) -> Result<()> {
        for (name, rate) in [
            ("network failure rate", self.network_failure_rate),
            ("decline rate", self.decline_rate),
        ] {
            if !(0.0..=1.0).contains(&rate) {
                return Err(BillingError::ValidationError(format!(
                    "{} must be between 0 and 1, got {}",
                    name, rate
                )));
            }
        }
        Ok(())
    }
}

/// A stand-in for the external payment provider.
///
/// Rejects invoices whose customer is unknown or billed in another currency, the way
/// the real provider does, and injects network failures and declines at the
/// configured rates. The RNG is seeded so runs are reproducible.
pub struct SimulatedPaymentProvider {
    customers: CustomerStoreBox,
    config: SimulationConfig,
    rng: Mutex<StdRng>,
}

impl SimulatedPaymentProvider {
    pub fn new(customers: CustomerStoreBox, config: SimulationConfig) -> Result<Self> {
        config.validate()?;
        let rng = Mutex::new(StdRng::seed_from_u64(config.seed));
        Ok(Self {
            customers,
            config,
            rng,
        })
    }

    fn roll(&self, probability: f64) -> Result<bool> {
        let mut rng = self.rng.lock().map_err(|_| {
            BillingError::InternalError(Box::new(std::io::Error::other(
                "Simulation RNG lock poisoned",
            )))
        })?;
        Ok(rng.gen_bool(probability))
    }
}

#[async_trait]
impl PaymentProvider for SimulatedPaymentProvider {
    async fn charge(&self, invoice: &Invoice) -> Result<bool> {
        if self.roll(self.config.network_failure_rate)? {
            return Err(BillingError::Network);
        }

        let customer = self.customers.fetch(invoice.customer_id).await?;
        if customer.currency != invoice.amount.currency {
            return Err(BillingError::CurrencyMismatch {
                invoice_id: invoice.id,
                customer_id: customer.id,
            });
        }

        Ok(!self.roll(self.config.decline_rate)?)
    }
}
