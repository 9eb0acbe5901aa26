// Common test utilities for integration tests
// A scripted in-memory bridge standing in for the HTTP endpoint.
#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, Once};

use async_trait::async_trait;
use log::LevelFilter;
use tokio::sync::Notify;

use tgcrm::api::{
    BridgeApi, ClientRecord, StatsRecord, TelegramChat, TelegramMessage, TelegramUser, Update,
};
use tgcrm::error::{BridgeError, BridgeResult};

static INIT_LOGGER: Once = Once::new();

/// Set up the logger for the tests
pub fn setup_logging() {
    INIT_LOGGER.call_once(|| {
        let _ = env_logger::Builder::new()
            .filter_level(LevelFilter::Debug)
            .is_test(true)
            .try_init();
    });
}

fn scripted_failure(action: &'static str) -> BridgeError {
    BridgeError::Rejected {
        action,
        description: "scripted failure".to_string(),
    }
}

/// Bridge whose answers are queued up by the test.
///
/// getUpdates pops the next scripted batch (an empty batch once the script
/// runs out); sendMessage pops the next scripted id. Every request is recorded.
#[derive(Default)]
pub struct FakeBridge {
    updates: Mutex<VecDeque<Option<Vec<Update>>>>,
    send_results: Mutex<VecDeque<Option<i64>>>,
    clients: Mutex<Option<Vec<ClientRecord>>>,
    stats: Mutex<Option<StatsRecord>>,
    offsets: Mutex<Vec<i64>>,
    sends: Mutex<Vec<(i64, String)>>,
    sync_offsets: Mutex<Vec<i64>>,
    client_calls: Mutex<usize>,
    poll_gate: Mutex<Option<Arc<Notify>>>,
    send_gate: Mutex<Option<Arc<Notify>>>,
    clients_gate: Mutex<Option<Arc<Notify>>>,
}

impl FakeBridge {
    pub fn new() -> Arc<Self> {
        setup_logging();
        Arc::new(FakeBridge::default())
    }

    pub fn push_updates(&self, updates: Vec<Update>) {
        self.updates.lock().unwrap().push_back(Some(updates));
    }

    pub fn push_poll_failure(&self) {
        self.updates.lock().unwrap().push_back(None);
    }

    pub fn push_send_result(&self, message_id: Option<i64>) {
        self.send_results.lock().unwrap().push_back(message_id);
    }

    pub fn set_clients(&self, clients: Option<Vec<ClientRecord>>) {
        *self.clients.lock().unwrap() = clients;
    }

    pub fn set_stats(&self, stats: Option<StatsRecord>) {
        *self.stats.lock().unwrap() = stats;
    }

    /// The next getUpdates call blocks until the returned handle is notified.
    pub fn gate_next_poll(&self) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        *self.poll_gate.lock().unwrap() = Some(gate.clone());
        gate
    }

    /// The next sendMessage call blocks until the returned handle is notified.
    pub fn gate_next_send(&self) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        *self.send_gate.lock().unwrap() = Some(gate.clone());
        gate
    }

    /// The next getClients call answers with the clients set at call time,
    /// but only once the returned handle is notified.
    pub fn gate_next_clients(&self) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        *self.clients_gate.lock().unwrap() = Some(gate.clone());
        gate
    }

    pub fn offsets(&self) -> Vec<i64> {
        self.offsets.lock().unwrap().clone()
    }

    pub fn sends(&self) -> Vec<(i64, String)> {
        self.sends.lock().unwrap().clone()
    }

    pub fn sync_offsets(&self) -> Vec<i64> {
        self.sync_offsets.lock().unwrap().clone()
    }

    pub fn client_calls(&self) -> usize {
        *self.client_calls.lock().unwrap()
    }
}

#[async_trait]
impl BridgeApi for FakeBridge {
    async fn get_updates(&self, offset: i64) -> BridgeResult<Vec<Update>> {
        self.offsets.lock().unwrap().push(offset);
        let scripted = self.updates.lock().unwrap().pop_front();
        let gate = self.poll_gate.lock().unwrap().take();
        if let Some(gate) = gate {
            gate.notified().await;
        }
        match scripted {
            Some(Some(updates)) => Ok(updates),
            Some(None) => Err(scripted_failure("getUpdates")),
            None => Ok(Vec::new()),
        }
    }

    async fn send_message(&self, chat_id: i64, text: &str) -> BridgeResult<i64> {
        self.sends.lock().unwrap().push((chat_id, text.to_string()));
        let gate = self.send_gate.lock().unwrap().take();
        if let Some(gate) = gate {
            gate.notified().await;
        }
        match self.send_results.lock().unwrap().pop_front() {
            Some(Some(id)) => Ok(id),
            _ => Err(scripted_failure("sendMessage")),
        }
    }

    async fn get_clients(&self) -> BridgeResult<Vec<ClientRecord>> {
        *self.client_calls.lock().unwrap() += 1;
        let clients = self.clients.lock().unwrap().clone();
        let gate = self.clients_gate.lock().unwrap().take();
        if let Some(gate) = gate {
            gate.notified().await;
        }
        clients.ok_or_else(|| scripted_failure("getClients"))
    }

    async fn get_stats(&self) -> BridgeResult<StatsRecord> {
        self.stats
            .lock()
            .unwrap()
            .ok_or_else(|| scripted_failure("getStats"))
    }

    async fn sync_updates(&self, offset: i64) -> BridgeResult<()> {
        self.sync_offsets.lock().unwrap().push(offset);
        Ok(())
    }
}

/// A text message update from a human (or from the bot when `is_bot`).
pub fn text_update(update_id: i64, message_id: i64, chat_id: i64, is_bot: bool, text: &str) -> Update {
    Update {
        update_id,
        message: Some(TelegramMessage {
            message_id,
            text: Some(text.to_string()),
            date: 1_700_000_000,
            chat: TelegramChat { id: chat_id },
            from: Some(TelegramUser {
                is_bot,
                username: if is_bot { None } else { Some("alex_ivanov".to_string()) },
                first_name: Some(if is_bot { "CRM Bot" } else { "Alexander" }.to_string()),
            }),
        }),
    }
}

pub fn client_record(id: i64, first: Option<&str>, username: Option<&str>, chat_id: Option<i64>) -> ClientRecord {
    ClientRecord {
        id,
        first_name: first.map(String::from),
        telegram_username: username.map(String::from),
        telegram_chat_id: chat_id,
        status: Some("active".to_string()),
        ..ClientRecord::default()
    }
}
