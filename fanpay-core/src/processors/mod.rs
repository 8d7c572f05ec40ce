//! Money-movement processors.
//!
//! - `PaymentProcessor`: verifies gateway intents and applies payments
//! - `PayoutOrchestrator`: reserves balance and transfers it to creators
//! - `FailoverQueue`: captures infrastructure failures and retries them
//! - `TierRecalculator`: assigns monthly fee tiers
//! - `AccountRegistry`: connected-account onboarding and status
//! - `ReconciliationAuditor`: ledger and payout integrity reports
//! - `TaskScheduler`: periodic runs of the batch tasks

pub mod accounts;
pub mod failover;
pub mod payment;
pub mod payout;
pub mod reconciliation;
pub mod scheduler;
pub mod tiers;

pub use accounts::AccountRegistry;
pub use failover::{FailoverOperation, FailoverQueue, FailoverRecord, RetryHandler};
pub use payment::{PaymentCommand, PaymentProcessor, PaymentReceipt};
pub use payout::{PayoutIntegrityReport, PayoutOrchestrator};
pub use reconciliation::ReconciliationAuditor;
pub use scheduler::{TaskRunner, TaskScheduler};
pub use tiers::TierRecalculator;
