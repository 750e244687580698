use std::sync::Arc;

use super::rate_limit::{RateLimitStore, RateLimiter};
use crate::commission::CommissionCycleEngine;
use crate::config::AppConfig;
use crate::investment::{FixedRate, ReferenceRateSource, YieldAccrualEngine};
use crate::settlement::SettlementProcessor;
use crate::store::LedgerStore;
use crate::sweeper::ExpirationSweeper;
use crate::webhook::NormalizerRegistry;

/// Gateway shared state
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn LedgerStore>,
    pub normalizers: Arc<NormalizerRegistry>,
    pub settlement: Arc<SettlementProcessor>,
    pub sweeper: Arc<ExpirationSweeper>,
    pub yield_engine: Arc<YieldAccrualEngine>,
    pub commissions: Arc<CommissionCycleEngine>,
    pub rate_limiter: Arc<RateLimiter>,
    /// Expected `X-Internal-Secret`; `None` locks the internal routes
    pub internal_secret: Option<String>,
}

impl AppState {
    /// Wire every engine onto one store, with the configured fixed rate as
    /// the yield reference source
    pub fn new(
        store: Arc<dyn LedgerStore>,
        rate_store: Arc<dyn RateLimitStore>,
        config: &AppConfig,
    ) -> Self {
        let rates: Arc<dyn ReferenceRateSource> =
            Arc::new(FixedRate(config.yield_accrual.daily_rate));
        Self::with_rate_source(store, rate_store, rates, config)
    }

    pub fn with_rate_source(
        store: Arc<dyn LedgerStore>,
        rate_store: Arc<dyn RateLimitStore>,
        rates: Arc<dyn ReferenceRateSource>,
        config: &AppConfig,
    ) -> Self {
        Self {
            normalizers: Arc::new(NormalizerRegistry::with_defaults()),
            settlement: Arc::new(SettlementProcessor::new(
                store.clone(),
                config.settlement.clone(),
            )),
            sweeper: Arc::new(ExpirationSweeper::new(store.clone(), config.sweeper.clone())),
            yield_engine: Arc::new(YieldAccrualEngine::new(
                store.clone(),
                rates,
                config.yield_accrual.clone(),
            )),
            commissions: Arc::new(CommissionCycleEngine::new(
                store.clone(),
                config.commission.clone(),
            )),
            rate_limiter: Arc::new(RateLimiter::new(rate_store, config.rate_limit.clone())),
            internal_secret: config.internal_secret.clone(),
            store,
        }
    }
}
