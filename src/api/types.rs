// Wire types for the Telegram bridge endpoint.
// The bridge forwards Telegram Bot API bodies for getUpdates/sendMessage and
// serves its own CRM bodies for getClients/getStats.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Deserialize)]
pub struct UpdatesResponse {
    pub ok: bool,
    #[serde(default)]
    pub result: Vec<Update>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Update {
    pub update_id: i64,
    // Edited messages, callback queries etc. arrive without this
    #[serde(default)]
    pub message: Option<TelegramMessage>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TelegramMessage {
    pub message_id: i64,
    #[serde(default)]
    pub text: Option<String>,
    pub date: i64, // unix seconds
    pub chat: TelegramChat,
    #[serde(default)]
    pub from: Option<TelegramUser>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TelegramChat {
    pub id: i64,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TelegramUser {
    #[serde(default)]
    pub is_bot: bool,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub first_name: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SendMessageRequest<'a> {
    pub action: &'static str,
    pub chat_id: i64,
    pub text: &'a str,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SendMessageResponse {
    #[serde(default)]
    pub ok: bool,
    #[serde(default)]
    pub result: Option<SentMessage>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SentMessage {
    pub message_id: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ClientsResponse {
    #[serde(default)]
    pub clients: Vec<ClientRecord>,
}

/// Contact record as stored by the bridge. Every field but the id may be
/// missing or null.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ClientRecord {
    pub id: i64,
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub last_name: Option<String>,
    #[serde(default)]
    pub telegram_username: Option<String>,
    #[serde(default)]
    pub telegram_chat_id: Option<i64>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub tags: Option<Vec<String>>,
    #[serde(default)]
    pub last_message: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StatsResponse {
    #[serde(default)]
    pub stats: StatsRecord,
}

#[derive(Debug, Clone, Copy, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatsRecord {
    #[serde(default)]
    pub total_clients: u64,
    #[serde(default)]
    pub active_clients: u64,
    #[serde(default)]
    pub total_messages: u64,
    #[serde(default)]
    pub today_messages: u64,
}

/// Pick whatever explanation an `ok: false` body carried.
pub(crate) fn rejection_reason(description: Option<String>, error: Option<String>) -> String {
    description
        .or(error)
        .unwrap_or_else(|| "no description".to_string())
}
