//! Reconciler over PostgreSQL: row locks alone keep settlement exactly-once

use pressone_core::{
    models::{DtmfEvent, HangupEvent, NewCall, NewCampaign, ReconcileOutcome},
    traits::{CallRepository, CampaignRepository},
    BillingCalculator,
};
use pressone_db::{
    create_pool, run_migrations, PgCallRepository, PgCampaignRepository, PgLedgerStore, PgPool,
};
use pressone_services::{KeyedLocks, Notifier, Reconciler};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::sync::Arc;

async fn test_pool() -> PgPool {
    let database_url = std::env::var("DATABASE_URL")
        .unwrap_or_else(|_| "postgresql://localhost/pressone_test".to_string());
    let pool = create_pool(&database_url, Some(16)).await.unwrap();
    run_migrations(&pool).await.unwrap();
    pool
}

/// Account with one trunk and a one-number campaign whose item is dialing
async fn seed_call(pool: &PgPool) -> (i64, i64, String) {
    let (account_id,): (i64,) = sqlx::query_as(
        "INSERT INTO accounts (name, credit_balance) VALUES ('race', 10) RETURNING id",
    )
    .fetch_one(pool)
    .await
    .unwrap();
    let (trunk_id,): (i64,) = sqlx::query_as(
        "INSERT INTO trunks (account_id, name, endpoint) VALUES ($1, 'race', $2) RETURNING id",
    )
    .bind(account_id)
    .bind(format!("race_trunk_{}", account_id))
    .fetch_one(pool)
    .await
    .unwrap();

    let campaigns = PgCampaignRepository::new(pool.clone());
    let campaign = campaigns
        .create(&NewCampaign {
            account_id,
            name: "race".to_string(),
            trunk_id: Some(trunk_id),
            caller_id: None,
            cps: 1,
            max_concurrent: 1,
        })
        .await
        .unwrap();
    campaigns
        .add_items(campaign.id, &["15551230001".to_string()])
        .await
        .unwrap();
    let item = campaigns.claim_next_item(campaign.id).await.unwrap().unwrap();

    let call_id = uuid::Uuid::new_v4().to_string();
    PgCallRepository::new(pool.clone())
        .create_queued(&NewCall {
            call_id: call_id.clone(),
            campaign_id: Some(campaign.id),
            campaign_item_id: Some(item.id),
            account_id,
            trunk_id,
            destination: item.phone_number,
            caller_id: None,
        })
        .await
        .unwrap();

    (account_id, campaign.id, call_id)
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
#[ignore] // Requires database
async fn test_concurrent_settlement_applies_once() {
    let pool = test_pool().await;
    let (account_id, campaign_id, call_id) = seed_call(&pool).await;
    let store = Arc::new(PgLedgerStore::new(pool.clone()));

    // Separate lock tables, as if each reconciler ran in its own process
    let reconcilers: Vec<_> = (0..4)
        .map(|_| {
            Arc::new(Reconciler::new(
                Arc::clone(&store),
                BillingCalculator::default(),
                KeyedLocks::new(4),
                Notifier::new(16),
            ))
        })
        .collect();

    let mut tasks = Vec::new();
    for (i, reconciler) in reconcilers.iter().cycle().take(8).enumerate() {
        let reconciler = Arc::clone(reconciler);
        let call_id = call_id.clone();
        tasks.push(tokio::spawn(async move {
            if i % 2 == 0 {
                reconciler
                    .settle_call(&HangupEvent {
                        call_id,
                        duration_seconds: 60,
                        hangup_cause: "NORMAL_CLEARING".to_string(),
                        campaign_id: None,
                        campaign_item_id: None,
                    })
                    .await
            } else {
                reconciler
                    .record_dtmf(&DtmfEvent {
                        call_id,
                        digit: "1".to_string(),
                        duration_seconds: Some(60),
                        hangup_cause: Some("NORMAL_CLEARING".to_string()),
                        campaign_id: None,
                        campaign_item_id: None,
                    })
                    .await
            }
        }));
    }

    let mut applied = 0;
    for task in tasks {
        if task.await.unwrap().unwrap() == ReconcileOutcome::Applied {
            applied += 1;
        }
    }
    assert_eq!(applied, 1);

    let (balance, total_calls): (Decimal, i64) =
        sqlx::query_as("SELECT credit_balance, total_calls FROM accounts WHERE id = $1")
            .bind(account_id)
            .fetch_one(&pool)
            .await
            .unwrap();
    assert_eq!(total_calls, 1);
    assert_eq!(balance, dec!(9));

    let (entries,): (i64,) = sqlx::query_as(
        "SELECT COUNT(*) FROM ledger_entries WHERE reference = $1 AND kind = 'call_charge'",
    )
    .bind(&call_id)
    .fetch_one(&pool)
    .await
    .unwrap();
    assert_eq!(entries, 1);

    let (completed, answered, actual_cost): (i64, i64, Decimal) = sqlx::query_as(
        "SELECT completed, answered, actual_cost FROM campaigns WHERE id = $1",
    )
    .bind(campaign_id)
    .fetch_one(&pool)
    .await
    .unwrap();
    assert_eq!((completed, answered), (1, 1));
    assert_eq!(actual_cost, dec!(1));
}
