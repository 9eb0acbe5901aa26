mod common;

use std::sync::Arc;
use std::time::Duration;

use common::{client_record, FakeBridge};
use tgcrm::api::StatsRecord;
use tgcrm::chat::Watermark;
use tgcrm::roster::refresh;
use tgcrm::{BridgeApi, ClientStatus, RosterLoader, SyncCursor};

fn stats(total: u64, active: u64) -> StatsRecord {
    StatsRecord {
        total_clients: total,
        active_clients: active,
        total_messages: 120,
        today_messages: 4,
    }
}

fn loader(fake: &Arc<FakeBridge>, cursor: SyncCursor) -> RosterLoader {
    let api: Arc<dyn BridgeApi> = fake.clone();
    RosterLoader::new(api, cursor)
}

#[tokio::test]
async fn test_refresh_loads_clients_and_stats() {
    let fake = FakeBridge::new();
    fake.set_clients(Some(vec![
        client_record(1, Some("Alexander"), Some("alex_ivanov"), Some(100)),
        client_record(2, None, Some("abc"), None),
    ]));
    fake.set_stats(Some(stats(2, 1)));

    let roster_loader = loader(&fake, SyncCursor::default());
    assert!(!roster_loader.roster().lock().await.loaded);
    roster_loader.refresh_now().await;

    let roster = roster_loader.roster();
    let roster = roster.lock().await;
    assert!(roster.loaded);
    assert_eq!(roster.clients.len(), 2);
    assert_eq!(roster.clients[0].display_name, "Alexander");
    assert_eq!(roster.clients[0].handle, "@alex_ivanov");
    assert_eq!(roster.clients[0].status, ClientStatus::Active);
    assert_eq!(roster.clients[1].display_name, "abc");
    assert_eq!(roster.clients[1].avatar_initial, 'A');
    assert!(roster.find(2).unwrap().chat_target().is_none());
    assert_eq!(roster.stats.total_clients, 2);
    assert_eq!(roster.stats.active_clients, 1);
}

#[tokio::test]
async fn test_refresh_replaces_roster_wholesale() {
    let fake = FakeBridge::new();
    fake.set_clients(Some(vec![
        client_record(1, Some("Alexander"), None, Some(100)),
        client_record(2, Some("Maria"), None, Some(200)),
    ]));
    fake.set_stats(Some(stats(2, 2)));

    let roster_loader = loader(&fake, SyncCursor::default());
    roster_loader.refresh_now().await;

    fake.set_clients(Some(vec![client_record(3, Some("Dmitry"), None, Some(300))]));
    roster_loader.refresh_now().await;

    let roster = roster_loader.roster();
    let roster = roster.lock().await;
    let ids: Vec<i64> = roster.clients.iter().map(|c| c.id).collect();
    assert_eq!(ids, vec![3]);
}

#[tokio::test(start_paused = true)]
async fn test_slow_refresh_does_not_overwrite_newer_one() {
    let fake = FakeBridge::new();
    fake.set_clients(Some(vec![client_record(1, Some("Old"), None, Some(100))]));
    fake.set_stats(Some(stats(1, 1)));
    let gate = fake.gate_next_clients();

    let roster_loader = loader(&fake, SyncCursor::default());
    let api: Arc<dyn BridgeApi> = fake.clone();
    let slow = tokio::spawn(refresh(api, roster_loader.roster(), SyncCursor::default()));
    tokio::time::sleep(Duration::from_millis(10)).await;

    fake.set_clients(Some(vec![client_record(2, Some("New"), None, Some(200))]));
    fake.set_stats(Some(stats(7, 6)));
    roster_loader.refresh_now().await;

    gate.notify_one();
    slow.await.unwrap();

    let roster = roster_loader.roster();
    let roster = roster.lock().await;
    let names: Vec<&str> = roster.clients.iter().map(|c| c.display_name.as_str()).collect();
    assert_eq!(names, vec!["New"]);
    assert_eq!(roster.stats.total_clients, 7);
}

#[tokio::test]
async fn test_failed_refresh_keeps_previous_roster() {
    let fake = FakeBridge::new();
    fake.set_clients(Some(vec![client_record(1, Some("Alexander"), None, Some(100))]));
    fake.set_stats(Some(stats(1, 1)));

    let roster_loader = loader(&fake, SyncCursor::default());
    roster_loader.refresh_now().await;

    fake.set_clients(None);
    fake.set_stats(Some(stats(5, 3)));
    roster_loader.refresh_now().await;

    let roster = roster_loader.roster();
    let roster = roster.lock().await;
    assert!(roster.loaded);
    assert_eq!(roster.clients.len(), 1);
    assert_eq!(roster.clients[0].display_name, "Alexander");
    assert_eq!(roster.stats.total_clients, 5);
}

#[tokio::test]
async fn test_first_refresh_failing_leaves_roster_unloaded() {
    let fake = FakeBridge::new();

    let roster_loader = loader(&fake, SyncCursor::default());
    roster_loader.refresh_now().await;

    let roster = roster_loader.roster();
    let roster = roster.lock().await;
    assert!(!roster.loaded);
    assert!(roster.clients.is_empty());
    assert_eq!(roster.stats.total_clients, 0);
}

#[tokio::test(start_paused = true)]
async fn test_refresh_triggers_sync_from_cursor() {
    let fake = FakeBridge::new();
    let cursor = SyncCursor::default();
    let mut watermark = Watermark::default();
    watermark.advance(41);
    cursor.observe(watermark);

    let roster_loader = loader(&fake, cursor);
    roster_loader.refresh_now().await;
    tokio::time::sleep(Duration::from_millis(10)).await;

    assert_eq!(fake.sync_offsets(), vec![41]);
}

#[tokio::test(start_paused = true)]
async fn test_periodic_refresh_until_stopped() {
    let fake = FakeBridge::new();
    fake.set_clients(Some(Vec::new()));

    let mut roster_loader = loader(&fake, SyncCursor::default());
    roster_loader.start(Duration::from_secs(5));
    assert!(roster_loader.is_running());

    tokio::time::sleep(Duration::from_millis(10)).await;
    assert_eq!(fake.client_calls(), 1);

    tokio::time::sleep(Duration::from_secs(10)).await;
    assert_eq!(fake.client_calls(), 3);

    roster_loader.stop();
    assert!(!roster_loader.is_running());
    tokio::time::sleep(Duration::from_secs(20)).await;
    assert_eq!(fake.client_calls(), 3);
}
