// Client roster: periodic refresh of the contact list and dashboard stats.

use std::sync::Arc;
use std::time::Duration;

use futures::FutureExt;
use log::{debug, error, info};
use tokio::sync::Mutex as TokioMutex;

use crate::api::{BridgeApi, ClientRecord, StatsRecord};
use crate::chat::SyncCursor;
use crate::models::{Client, ClientStatus, Stats};
use crate::task::PeriodicTask;

pub const FALLBACK_NAME: &str = "Unknown client";
pub const FALLBACK_INITIAL: char = '?';
pub const RECENTLY: &str = "recently";

/// Last successfully loaded roster and stats.
#[derive(Debug, Clone, Default)]
pub struct Roster {
    pub clients: Vec<Client>,
    pub stats: Stats,
    pub loaded: bool,
    // Refresh sequence numbers: last one started, last applied per part
    issued: u64,
    clients_seq: u64,
    stats_seq: u64,
}

impl Roster {
    pub fn find(&self, id: i64) -> Option<&Client> {
        self.clients.iter().find(|c| c.id == id)
    }

    fn next_seq(&mut self) -> u64 {
        self.issued += 1;
        self.issued
    }
}

fn non_blank(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|s| !s.is_empty())
}

/// Turn a bridge contact record into the shape the client list displays.
pub fn normalize_client(record: &ClientRecord) -> Client {
    let first = non_blank(&record.first_name);
    let last = non_blank(&record.last_name);
    let username = non_blank(&record.telegram_username);

    let (display_name, initial_source) = match (first, last, username) {
        (Some(first), Some(last), _) => (format!("{} {}", first, last), Some(first)),
        (Some(first), None, _) => (first.to_string(), Some(first)),
        (None, _, Some(username)) => (username.to_string(), Some(username)),
        (None, _, None) => (FALLBACK_NAME.to_string(), None),
    };

    let avatar_initial = initial_source
        .and_then(|s| s.chars().next())
        .and_then(|c| c.to_uppercase().next())
        .unwrap_or(FALLBACK_INITIAL);

    Client {
        id: record.id,
        display_name,
        handle: username.map(|u| format!("@{}", u)).unwrap_or_default(),
        avatar_initial,
        conversation_id: record.telegram_chat_id,
        status: ClientStatus::parse(record.status.as_deref()),
        tags: record.tags.clone().unwrap_or_default(),
        last_seen: non_blank(&record.last_message)
            .unwrap_or(RECENTLY)
            .to_string(),
    }
}

fn to_stats(record: StatsRecord) -> Stats {
    Stats {
        total_clients: record.total_clients,
        active_clients: record.active_clients,
        total_messages: record.total_messages,
        today_messages: record.today_messages,
    }
}

/// Fetches the roster on a timer and replaces the shared copy wholesale.
pub struct RosterLoader {
    api: Arc<dyn BridgeApi>,
    roster: Arc<TokioMutex<Roster>>,
    cursor: SyncCursor,
    task: Option<PeriodicTask>,
}

impl RosterLoader {
    pub fn new(api: Arc<dyn BridgeApi>, cursor: SyncCursor) -> Self {
        RosterLoader {
            api,
            roster: Arc::new(TokioMutex::new(Roster::default())),
            cursor,
            task: None,
        }
    }

    pub fn roster(&self) -> Arc<TokioMutex<Roster>> {
        self.roster.clone()
    }

    pub fn start(&mut self, interval: Duration) {
        let api = self.api.clone();
        let roster = self.roster.clone();
        let cursor = self.cursor.clone();
        self.task = Some(PeriodicTask::spawn("roster", interval, move || {
            refresh(api.clone(), roster.clone(), cursor.clone()).boxed()
        }));
    }

    pub fn stop(&mut self) {
        if let Some(task) = self.task.take() {
            task.cancel();
        }
    }

    pub fn is_running(&self) -> bool {
        self.task.is_some()
    }

    pub async fn refresh_now(&self) {
        refresh(self.api.clone(), self.roster.clone(), self.cursor.clone()).await;
    }
}

impl Drop for RosterLoader {
    fn drop(&mut self) {
        self.stop();
    }
}

/// One refresh cycle. Clients and stats are fetched together; each part that
/// succeeds replaces its old value, each part that fails keeps it.
///
/// Ticks overlap when the bridge is slow, so a part is only applied if no
/// later-started refresh has already replaced it.
pub async fn refresh(api: Arc<dyn BridgeApi>, roster: Arc<TokioMutex<Roster>>, cursor: SyncCursor) {
    let seq = roster.lock().await.next_seq();
    let sync_api = api.clone();
    let offset = cursor.offset();
    tokio::spawn(async move {
        if let Err(e) = sync_api.sync_updates(offset).await {
            debug!("syncUpdates (offset {}) failed: {}", offset, e);
        }
    });

    let (clients, stats) = tokio::join!(api.get_clients(), api.get_stats());

    let mut roster = roster.lock().await;
    match clients {
        Ok(_) if seq < roster.clients_seq => {
            debug!("Dropping clients from refresh {} (have {})", seq, roster.clients_seq);
        }
        Ok(records) => {
            roster.clients = records.iter().map(normalize_client).collect();
            roster.clients_seq = seq;
            roster.loaded = true;
            debug!("Roster refreshed: {} clients", roster.clients.len());
        }
        Err(e) => error!("Error loading clients: {}", e),
    }
    match stats {
        Ok(_) if seq < roster.stats_seq => {
            debug!("Dropping stats from refresh {} (have {})", seq, roster.stats_seq);
        }
        Ok(record) => {
            roster.stats = to_stats(record);
            roster.stats_seq = seq;
        }
        Err(e) => error!("Error loading stats: {}", e),
    }
    if !roster.loaded {
        info!("Roster not loaded yet, will retry on next tick");
    }
}
