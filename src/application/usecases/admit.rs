use std::sync::Arc;

use tracing::{info, warn};

use crate::domain::{errors::LedgerError, repositories::CreditLedger};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Admission {
    pub allow: bool,
    /// Balance after the reservation.
    pub balance: u64,
}

/// Credit check in front of every enqueue. Credits are taken at admission,
/// not at confirmed delivery.
pub struct AdmissionGate {
    ledger: Arc<dyn CreditLedger>,
}

impl AdmissionGate {
    pub fn new(ledger: Arc<dyn CreditLedger>) -> Self {
        Self { ledger }
    }

    pub async fn admit(&self, sender_id: &str, units: u64) -> Result<Admission, LedgerError> {
        match self.ledger.reserve(sender_id, units).await {
            Ok(balance) => {
                info!(sender_id, units, balance, "credits reserved");
                Ok(Admission {
                    allow: true,
                    balance,
                })
            }
            Err(err @ LedgerError::InsufficientCredits { .. }) => {
                warn!(sender_id, units, error = %err, "admission refused");
                Err(err)
            }
            Err(err) => Err(err),
        }
    }

    pub async fn balance(&self, sender_id: &str) -> anyhow::Result<u64> {
        self.ledger.balance(sender_id).await
    }
}
