//! Funding flows that open or post ledger entries outside webhooks
//!
//! Deposits and USDT purchases open PENDING rows for a provider to
//! settle. Payouts debit first and submit second. Adjustments are the
//! operator escape hatch.

pub mod adjustment;
pub mod deposit;
pub mod error;
pub mod payout_client;
pub mod withdraw;

pub use adjustment::AdjustmentService;
pub use deposit::{DepositService, USDT_SCALE, usdt_for};
pub use error::FundingError;
pub use payout_client::{MockPixPayout, PayoutClient, PayoutError};
pub use withdraw::{PayoutReceipt, WithdrawService};
