// Chat window logic: polling the bridge for new messages of one conversation,
// merging them into the log, and sending replies.

use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures::FutureExt;
use log::{error, info, warn};
use tokio::sync::Mutex as TokioMutex;

use crate::api::BridgeApi;
use crate::models::{ChatTarget, Message};
use crate::task::PeriodicTask;

pub mod state;

pub use state::{format_clock, ChatState, MergeOutcome, MessageLog, PollTicket, SendTicket, Watermark};

/// Highest update id any chat window has confirmed, shared with the roster
/// loader so its syncUpdates trigger starts from there.
#[derive(Debug, Clone, Default)]
pub struct SyncCursor(Arc<AtomicI64>);

impl SyncCursor {
    pub fn offset(&self) -> i64 {
        self.0.load(Ordering::SeqCst)
    }

    pub fn observe(&self, watermark: Watermark) {
        self.0.fetch_max(watermark.value(), Ordering::SeqCst);
    }
}

/// Read-only copy of the chat state for rendering.
#[derive(Debug, Clone, Default)]
pub struct ChatSnapshot {
    pub target: Option<ChatTarget>,
    pub messages: Vec<Message>,
    pub draft: String,
    pub sending: bool,
    pub loading: bool,
    pub send_seq: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendOutcome {
    /// Blank draft, nothing bound, or another send still running
    Skipped,
    Sent(i64),
    Failed,
}

/// Owns one chat window's state and its poll timer.
pub struct ChatController {
    api: Arc<dyn BridgeApi>,
    state: Arc<TokioMutex<ChatState>>,
    cursor: SyncCursor,
    poll_interval: Duration,
    poller: Option<PeriodicTask>,
}

impl ChatController {
    pub fn new(api: Arc<dyn BridgeApi>, poll_interval: Duration, cursor: SyncCursor) -> Self {
        ChatController {
            api,
            state: Arc::new(TokioMutex::new(ChatState::new())),
            cursor,
            poll_interval,
            poller: None,
        }
    }

    pub fn state(&self) -> Arc<TokioMutex<ChatState>> {
        self.state.clone()
    }

    pub fn is_polling(&self) -> bool {
        self.poller.is_some()
    }

    /// Bind the window to `target` and start polling it.
    ///
    /// The previous timer is cancelled and the state reset before the new
    /// timer exists, so the first poll for the new target always starts from
    /// an empty log and a zero watermark.
    pub async fn open(&mut self, target: ChatTarget) {
        self.stop_polling();
        self.state.lock().await.retarget(Some(target.clone()));

        let api = self.api.clone();
        let state = self.state.clone();
        let cursor = self.cursor.clone();
        let name = format!("chat-poll-{}", target.chat_id);
        self.poller = Some(PeriodicTask::spawn(&name, self.poll_interval, move || {
            poll_once(api.clone(), state.clone(), cursor.clone())
                .map(|_| ())
                .boxed()
        }));
    }

    /// Unbind the window and stop polling.
    pub async fn close(&mut self) {
        self.stop_polling();
        self.state.lock().await.retarget(None);
    }

    fn stop_polling(&mut self) {
        if let Some(poller) = self.poller.take() {
            info!("Stopping {}", poller.name());
            poller.cancel();
        }
    }

    pub async fn set_draft(&self, text: &str) {
        self.state.lock().await.set_draft(text);
    }

    /// Run one poll now, outside the timer.
    pub async fn poll_now(&self) -> MergeOutcome {
        poll_once(self.api.clone(), self.state.clone(), self.cursor.clone()).await
    }

    /// Send the current draft.
    pub async fn send_draft(&self) -> SendOutcome {
        send_draft(self.api.as_ref(), &self.state).await
    }

    /// Same as `send_draft`, but the request runs on its own task so the
    /// caller's loop keeps going.
    ///
    /// The send slot is claimed before this returns, so the next snapshot
    /// already reports `sending`. `None` when there was nothing to send.
    pub async fn spawn_send(&self) -> Option<tokio::task::JoinHandle<SendOutcome>> {
        let ticket = self.state.lock().await.begin_send()?;
        let api = self.api.clone();
        let state = self.state.clone();
        Some(tokio::spawn(async move { deliver(api.as_ref(), &state, ticket).await }))
    }

    pub async fn snapshot(&self) -> ChatSnapshot {
        let state = self.state.lock().await;
        ChatSnapshot {
            target: state.target().cloned(),
            messages: state.messages().to_vec(),
            draft: state.draft().to_string(),
            sending: state.is_sending(),
            loading: state.is_loading(),
            send_seq: state.send_seq(),
        }
    }
}

impl Drop for ChatController {
    fn drop(&mut self) {
        self.stop_polling();
    }
}

/// One poll cycle: read the ticket under the lock, fetch without it, merge
/// under it again.
pub async fn poll_once(
    api: Arc<dyn BridgeApi>,
    state: Arc<TokioMutex<ChatState>>,
    cursor: SyncCursor,
) -> MergeOutcome {
    let Some(ticket) = state.lock().await.begin_poll() else {
        return MergeOutcome::default();
    };

    match api.get_updates(ticket.offset).await {
        Ok(updates) => {
            let mut state = state.lock().await;
            let outcome = state.apply_updates(&ticket, &updates);
            if !outcome.stale {
                cursor.observe(state.watermark());
            }
            outcome
        }
        Err(e) => {
            error!("Error fetching messages for chat {}: {}", ticket.chat_id, e);
            state.lock().await.fail_poll(&ticket);
            MergeOutcome::default()
        }
    }
}

/// Single-flight send of the draft held in `state`.
pub async fn send_draft(api: &dyn BridgeApi, state: &TokioMutex<ChatState>) -> SendOutcome {
    let Some(ticket) = state.lock().await.begin_send() else {
        return SendOutcome::Skipped;
    };
    deliver(api, state, ticket).await
}

/// Post a claimed draft and record the answer.
async fn deliver(api: &dyn BridgeApi, state: &TokioMutex<ChatState>, ticket: SendTicket) -> SendOutcome {
    let result = api.send_message(ticket.chat_id, &ticket.text).await;

    let mut state = state.lock().await;
    match result {
        Ok(message_id) => {
            info!("Sent message {} to chat {}", message_id, ticket.chat_id);
            state.complete_send(&ticket, Some(message_id));
            SendOutcome::Sent(message_id)
        }
        Err(e) => {
            warn!("Error sending message to chat {}: {}", ticket.chat_id, e);
            state.complete_send(&ticket, None);
            SendOutcome::Failed
        }
    }
}
