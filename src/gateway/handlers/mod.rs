pub mod health;
pub mod jobs;
pub mod webhook;

pub use health::health_check;
pub use jobs::{
    accrue_yield, commission_cycles, expire_pending, mark_earning_paid, reprocess_transaction,
};
pub use webhook::receive_webhook;
