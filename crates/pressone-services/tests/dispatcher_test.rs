//! Campaign dispatcher pacing, channel gating and completion

mod common;

use common::{eventually, hangup, Harness};
use pressone_core::models::{CampaignItemStatus, CampaignStatus, LedgerEvent, TrunkStatus};
use pressone_core::AppError;
use std::time::Duration;

#[tokio::test]
async fn test_start_requires_numbers_and_state() {
    let h = &Harness::new().await;
    let dispatcher = &h.dispatcher();

    let empty = h.campaign(&[]).await;
    let err = dispatcher.start(empty.id).await.unwrap_err();
    assert!(matches!(err, AppError::Validation(_)));

    let err = dispatcher.start(9_999).await.unwrap_err();
    assert!(matches!(err, AppError::CampaignNotFound(_)));

    let err = dispatcher.pause(empty.id).await.unwrap_err();
    assert!(matches!(err, AppError::InvalidStateTransition(_)));
}

#[tokio::test]
async fn test_campaign_runs_to_completion() {
    let h = &Harness::new().await;
    let dispatcher = &h.dispatcher();
    let mut events = h.notifier.subscribe();
    let campaign = h
        .campaign(&["15551230001", "15551230002", "15551230003"])
        .await;

    let started = dispatcher.start(campaign.id).await.unwrap();
    assert_eq!(started.status, CampaignStatus::Running);
    assert!(started.started_at.is_some());

    assert!(eventually(|| async move { h.switch.sent().len() == 3 }).await);

    for command in h.switch.sent() {
        h.reconciler
            .settle_call(&hangup(&command.call_id, 10, "ANSWER"))
            .await
            .unwrap();
    }

    let id = campaign.id;
    assert!(
        eventually(|| async move {
            h.store.campaign(id).await.status == CampaignStatus::Completed
        })
        .await
    );

    let stats = h.store.campaign(campaign.id).await.stats;
    assert_eq!(stats.completed, 3);
    assert_eq!(stats.remaining(), 0);

    let completed = tokio::time::timeout(Duration::from_secs(3), async {
        loop {
            if let Ok(LedgerEvent::CampaignCompleted { campaign_id, .. }) = events.recv().await {
                return campaign_id;
            }
        }
    })
    .await
    .unwrap();
    assert_eq!(completed, campaign.id);
    assert!(eventually(|| async move { !dispatcher.is_dispatching(id) }).await);
}

#[tokio::test]
async fn test_channels_gate_originations() {
    let h = &Harness::new().await;
    h.store.add_trunk(9, Harness::ACCOUNT, 1, TrunkStatus::Active).await;
    let dispatcher = &h.dispatcher();
    let campaign = h.campaign_on(9, &["15551230001", "15551230002"]).await;

    dispatcher.start(campaign.id).await.unwrap();
    assert!(eventually(|| async move { h.switch.sent().len() == 1 }).await);

    tokio::time::sleep(Duration::from_millis(200)).await;
    assert_eq!(h.switch.sent().len(), 1);

    let first = h.switch.sent()[0].call_id.clone();
    h.reconciler
        .settle_call(&hangup(&first, 0, "NOANSWER"))
        .await
        .unwrap();

    assert!(eventually(|| async move { h.switch.sent().len() == 2 }).await);
    dispatcher.shutdown();
}

#[tokio::test]
async fn test_pause_stops_new_originations() {
    let h = &Harness::new().await;
    h.store.add_trunk(9, Harness::ACCOUNT, 1, TrunkStatus::Active).await;
    let dispatcher = &h.dispatcher();
    let campaign = h
        .campaign_on(9, &["15551230001", "15551230002", "15551230003"])
        .await;

    dispatcher.start(campaign.id).await.unwrap();
    assert!(eventually(|| async move { h.switch.sent().len() == 1 }).await);

    let paused = dispatcher.pause(campaign.id).await.unwrap();
    assert_eq!(paused.status, CampaignStatus::Paused);
    assert!(!dispatcher.is_dispatching(campaign.id));

    // in-flight calls still reconcile after the pause
    let first = h.switch.sent()[0].call_id.clone();
    h.reconciler
        .settle_call(&hangup(&first, 30, "ANSWER"))
        .await
        .unwrap();

    tokio::time::sleep(Duration::from_millis(200)).await;
    assert_eq!(h.switch.sent().len(), 1);
    assert_eq!(h.store.campaign(campaign.id).await.stats.completed, 1);
}

#[tokio::test]
async fn test_unreachable_switch_returns_item_to_pending() {
    let h = &Harness::new().await;
    let dispatcher = &h.dispatcher();
    let campaign = h.campaign(&["15551230001"]).await;
    h.switch
        .push(Err(AppError::SwitchUnavailable("connection refused".to_string())));

    dispatcher.start(campaign.id).await.unwrap();
    assert!(eventually(|| async move { h.switch.sent().len() == 1 }).await);

    assert!(
        eventually(|| async move {
            let state = h.store.snapshot().await;
            state
                .items
                .values()
                .all(|i| i.call_id.is_none() && i.status == CampaignItemStatus::Pending)
        })
        .await
    );
    assert!(dispatcher.is_dispatching(campaign.id));
    dispatcher.shutdown();
}

#[tokio::test]
async fn test_paused_campaign_completes_when_last_call_settles() {
    let h = &Harness::new().await;
    let dispatcher = &h.dispatcher();
    let mut events = h.notifier.subscribe();
    let campaign = h.campaign(&["15551230001"]).await;

    dispatcher.start(campaign.id).await.unwrap();
    assert!(eventually(|| async move { h.switch.sent().len() == 1 }).await);
    dispatcher.pause(campaign.id).await.unwrap();

    let only = h.switch.sent()[0].call_id.clone();
    h.reconciler
        .settle_call(&hangup(&only, 12, "ANSWER"))
        .await
        .unwrap();

    let drained = h.store.campaign(campaign.id).await;
    assert_eq!(drained.status, CampaignStatus::Completed);
    assert_eq!(drained.stats.remaining(), 0);

    let completed = tokio::time::timeout(Duration::from_secs(3), async {
        loop {
            if let Ok(LedgerEvent::CampaignCompleted { campaign_id, .. }) = events.recv().await {
                return campaign_id;
            }
        }
    })
    .await
    .unwrap();
    assert_eq!(completed, campaign.id);

    let err = dispatcher.start(campaign.id).await.unwrap_err();
    assert!(matches!(err, AppError::InvalidStateTransition(_)));
}
