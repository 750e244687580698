//! Commission cycles over deposits settled through the webhook path

use chrono::{Duration, Utc};
use rust_decimal::Decimal;
use serde_json::json;
use std::sync::Arc;

use paygate::commission::{
    CommissionConfig, CommissionCycleEngine, CommissionError, CommissionRule, CycleStatus,
    CycleType,
};
use paygate::funding::DepositService;
use paygate::settlement::{SettlementConfig, SettlementProcessor};
use paygate::store::MemoryStore;
use paygate::webhook::NormalizerRegistry;

fn d(s: &str) -> Decimal {
    s.parse().unwrap()
}

async fn settle_deposit(store: &MemoryStore, user_id: i64, external_id: &str, amount: &str) {
    DepositService::new(Arc::new(store.clone()))
        .open_pix_deposit(user_id, d(amount), "pix-bank", external_id, None)
        .await
        .unwrap();
    let event = NormalizerRegistry::with_defaults()
        .normalize(
            "pix-bank",
            &json!({
                "event": "pix.received",
                "data": {
                    "txid": external_id,
                    "endToEndId": format!("E2E-{}", external_id),
                    "status": "CONCLUIDA",
                    "valor": amount
                }
            }),
            Utc::now(),
        )
        .unwrap();
    SettlementProcessor::new(Arc::new(store.clone()), SettlementConfig::default())
        .process(&event)
        .await
        .unwrap();
}

async fn seeded() -> (MemoryStore, CommissionCycleEngine) {
    let store = MemoryStore::new();
    store.assign_sales_rep(10, 500).await;
    store.assign_sales_rep(11, 500).await;
    store.assign_sales_rep(12, 501).await;
    store
        .set_commission_rule(501, CommissionRule::Fixed(d("2.50")))
        .await;

    settle_deposit(&store, 10, "c-1", "200.00").await;
    settle_deposit(&store, 11, "c-2", "300.00").await;
    settle_deposit(&store, 12, "c-3", "40.00").await;
    settle_deposit(&store, 12, "c-4", "60.00").await;
    // still pending: not volume
    DepositService::new(Arc::new(store.clone()))
        .open_pix_deposit(10, d("999.00"), "pix-bank", "c-open", None)
        .await
        .unwrap();

    let engine = CommissionCycleEngine::new(Arc::new(store.clone()), CommissionConfig::default());
    (store, engine)
}

#[tokio::test]
async fn recalculation_is_stable_until_completion() {
    let (_store, engine) = seeded().await;
    let now = Utc::now();
    let (cycle, _) = engine.create_missing(CycleType::Weekly, now).await.unwrap();

    let first = engine.calculate_commissions(cycle.cycle_id, now).await.unwrap();
    let second = engine.calculate_commissions(cycle.cycle_id, now).await.unwrap();

    let summarize = |earnings: &[paygate::commission::CommissionEarning]| {
        let mut rows: Vec<_> = earnings
            .iter()
            .map(|e| (e.sales_rep_id, e.amount, e.base_volume, e.transaction_count))
            .collect();
        rows.sort();
        rows
    };
    assert_eq!(summarize(&first), summarize(&second));
    assert_eq!(
        summarize(&second),
        vec![
            (500, d("5.00"), d("500.00"), 2),
            (501, d("5.00"), d("100.00"), 2),
        ]
    );

    engine.complete_cycle(cycle.cycle_id, now).await.unwrap();
    let err = engine
        .calculate_commissions(cycle.cycle_id, now)
        .await
        .unwrap_err();
    assert!(matches!(err, CommissionError::CycleCompleted(_)));
}

#[tokio::test]
async fn paid_earnings_survive_recalculation() {
    let (store, engine) = seeded().await;
    let now = Utc::now();
    let (cycle, _) = engine.create_missing(CycleType::Monthly, now).await.unwrap();
    let earnings = engine.calculate_commissions(cycle.cycle_id, now).await.unwrap();
    let rep_500 = earnings.iter().find(|e| e.sales_rep_id == 500).unwrap();

    let paid = engine
        .mark_period_earning_as_paid(rep_500.earning_id, "PIX-REF-1", now)
        .await
        .unwrap();
    assert!(paid.paid);
    assert!(matches!(
        engine
            .mark_period_earning_as_paid(rep_500.earning_id, "PIX-REF-2", now)
            .await,
        Err(CommissionError::EarningAlreadyPaid(_))
    ));

    // more volume for rep 500 after payment does not reopen the paid row
    settle_deposit(&store, 10, "c-5", "1000.00").await;
    let recalculated = engine.calculate_commissions(cycle.cycle_id, now).await.unwrap();
    assert!(recalculated.iter().all(|e| e.sales_rep_id != 500));

    let state = store.snapshot().await;
    let paid_row = &state.earnings[&rep_500.earning_id];
    assert!(paid_row.paid);
    assert_eq!(paid_row.amount, d("5.00"));
    assert_eq!(paid_row.payment_reference.as_deref(), Some("PIX-REF-1"));
}

#[tokio::test]
async fn maintenance_closes_ended_cycles() {
    let (store, engine) = seeded().await;
    let now = Utc::now();
    let (week, _) = engine.create_missing(CycleType::Weekly, now).await.unwrap();

    let later = now + Duration::days(8);
    let summary = engine.run_maintenance(later).await.unwrap();
    assert!(summary.completed.contains(&week.cycle_id));
    assert_eq!(summary.failed, 0);
    assert!(!summary.created.is_empty());

    let state = store.snapshot().await;
    assert_eq!(state.cycles[&week.cycle_id].status, CycleStatus::Completed);
    let week_earnings = state
        .earnings
        .values()
        .filter(|e| e.cycle_id == week.cycle_id)
        .count();
    assert_eq!(week_earnings, 2);

    // a second pass finds nothing new to close for that week
    let again = engine.run_maintenance(later).await.unwrap();
    assert!(!again.completed.contains(&week.cycle_id));
}
