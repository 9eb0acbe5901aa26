use std::collections::HashSet;

use chrono::{DateTime, Local, TimeZone, Utc};
use log::{debug, info};

use crate::api::{Update, LATEST_ONLY_OFFSET};
use crate::models::{ChatTarget, Direction, Message};

/// Highest update id processed for the active conversation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Watermark(i64);

impl Watermark {
    pub fn value(&self) -> i64 {
        self.0
    }

    /// Offset for the next getUpdates call.
    pub fn next_offset(&self) -> i64 {
        if self.0 > 0 {
            self.0 + 1
        } else {
            LATEST_ONLY_OFFSET
        }
    }

    /// Move forward to `update_id`; never moves back.
    pub fn advance(&mut self, update_id: i64) {
        if update_id > self.0 {
            self.0 = update_id;
        }
    }

    pub fn reset(&mut self) {
        self.0 = 0;
    }
}

/// Append-only, arrival-ordered message log with at most one entry per id.
#[derive(Debug, Default)]
pub struct MessageLog {
    entries: Vec<Message>,
    seen: HashSet<i64>,
}

impl MessageLog {
    /// Append unless an entry with the same id is already present.
    pub fn push(&mut self, message: Message) -> bool {
        if !self.seen.insert(message.id) {
            return false;
        }
        self.entries.push(message);
        true
    }

    pub fn entries(&self) -> &[Message] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.seen.clear();
    }
}

/// Identifies one in-flight poll so its response can be matched back.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollTicket {
    pub generation: u64,
    pub chat_id: i64,
    pub offset: i64,
}

/// One in-flight send.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SendTicket {
    pub generation: u64,
    pub chat_id: i64,
    pub text: String,
}

/// Result of merging one getUpdates response.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MergeOutcome {
    pub appended: usize,
    pub duplicates: usize,
    pub stale: bool,
}

/// Everything a chat window owns: the bound target, its watermark, the
/// message log and the draft being typed.
///
/// All mutation goes through `&mut self`; the controller keeps the state behind
/// a single lock and never holds it across a network call. `generation` is
/// bumped on every retarget so late responses can be recognised and dropped.
#[derive(Debug, Default)]
pub struct ChatState {
    target: Option<ChatTarget>,
    generation: u64,
    watermark: Watermark,
    log: MessageLog,
    draft: String,
    sending: bool,
    send_seq: u64,
    loading: bool,
}

impl ChatState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn target(&self) -> Option<&ChatTarget> {
        self.target.as_ref()
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn watermark(&self) -> Watermark {
        self.watermark
    }

    pub fn messages(&self) -> &[Message] {
        self.log.entries()
    }

    pub fn draft(&self) -> &str {
        &self.draft
    }

    pub fn set_draft(&mut self, text: &str) {
        self.draft = text.to_string();
    }

    pub fn is_sending(&self) -> bool {
        self.sending
    }

    /// Bumped after every finished send attempt, successful or not.
    pub fn send_seq(&self) -> u64 {
        self.send_seq
    }

    /// True between binding a target and the first poll completing.
    pub fn is_loading(&self) -> bool {
        self.loading
    }

    /// Bind to a new conversation (or none). Resets the watermark and log.
    pub fn retarget(&mut self, target: Option<ChatTarget>) {
        self.generation += 1;
        self.watermark.reset();
        self.log.clear();
        self.draft.clear();
        self.loading = target.is_some();
        match &target {
            Some(t) => info!("Chat bound to {} ({}), generation {}", t.title, t.chat_id, self.generation),
            None => info!("Chat closed, generation {}", self.generation),
        }
        self.target = target;
    }

    pub fn begin_poll(&self) -> Option<PollTicket> {
        self.target.as_ref().map(|t| PollTicket {
            generation: self.generation,
            chat_id: t.chat_id,
            offset: self.watermark.next_offset(),
        })
    }

    /// The poll failed; only the loading indicator changes.
    pub fn fail_poll(&mut self, ticket: &PollTicket) {
        if ticket.generation == self.generation {
            self.loading = false;
        }
    }

    /// Merge one getUpdates response.
    ///
    /// Only updates for the ticket's chat are kept. The watermark moves to the
    /// highest update id among them, and messages whose id is already in the
    /// log are skipped.
    pub fn apply_updates(&mut self, ticket: &PollTicket, updates: &[Update]) -> MergeOutcome {
        if ticket.generation != self.generation {
            debug!(
                "Dropping poll response for chat {} (generation {} != {})",
                ticket.chat_id, ticket.generation, self.generation
            );
            return MergeOutcome {
                stale: true,
                ..MergeOutcome::default()
            };
        }

        self.loading = false;
        let mut outcome = MergeOutcome::default();
        let mut batch = Vec::new();

        for update in updates {
            let Some(msg) = update.message.as_ref() else {
                continue;
            };
            if msg.chat.id != ticket.chat_id {
                continue;
            }
            self.watermark.advance(update.update_id);

            let from = msg.from.clone().unwrap_or_default();
            batch.push(Message {
                id: msg.message_id,
                text: msg.text.clone().unwrap_or_default(),
                direction: if from.is_bot {
                    Direction::Outgoing
                } else {
                    Direction::Incoming
                },
                timestamp: format_clock(msg.date, &Local),
                sender_name: from.username.or(from.first_name),
            });
        }

        for message in batch {
            if self.log.push(message) {
                outcome.appended += 1;
            } else {
                outcome.duplicates += 1;
            }
        }

        if outcome.appended > 0 || outcome.duplicates > 0 {
            debug!(
                "Chat {}: +{} messages ({} duplicates), watermark {}",
                ticket.chat_id,
                outcome.appended,
                outcome.duplicates,
                self.watermark.value()
            );
        }
        outcome
    }

    /// Claim the single send slot. `None` when the draft is blank, a send is
    /// already running or no conversation is bound.
    pub fn begin_send(&mut self) -> Option<SendTicket> {
        if self.sending || self.draft.trim().is_empty() {
            return None;
        }
        let chat_id = self.target.as_ref()?.chat_id;
        self.sending = true;
        Some(SendTicket {
            generation: self.generation,
            chat_id,
            text: self.draft.clone(),
        })
    }

    /// Record the bridge's answer to a send. Returns true when an entry was
    /// appended.
    pub fn complete_send(&mut self, ticket: &SendTicket, result: Option<i64>) -> bool {
        self.sending = false;
        self.send_seq += 1;

        let Some(message_id) = result else {
            return false;
        };
        if ticket.generation != self.generation {
            debug!("Send to chat {} finished after retarget, not appending", ticket.chat_id);
            return false;
        }

        self.draft.clear();
        self.log.push(Message {
            id: message_id,
            text: ticket.text.clone(),
            direction: Direction::Outgoing,
            timestamp: format_clock(Utc::now().timestamp(), &Local),
            sender_name: None,
        })
    }
}

/// `HH:MM` wall-clock time of a unix timestamp in the given zone.
pub fn format_clock<Tz: TimeZone>(unix_secs: i64, tz: &Tz) -> String
where
    Tz::Offset: std::fmt::Display,
{
    let utc = DateTime::from_timestamp(unix_secs, 0).unwrap_or_else(Utc::now);
    utc.with_timezone(tz).format("%H:%M").to_string()
}
