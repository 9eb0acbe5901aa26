use std::fmt;

/// Which side of the conversation a message came from.
///
/// Messages written by the bot account (that is, by us through the bridge) are
/// `Outgoing`; everything else is `Incoming`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Incoming,
    Outgoing,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Message {
    pub id: i64,
    pub text: String,
    pub direction: Direction,
    pub timestamp: String, // Display string, HH:MM local time
    pub sender_name: Option<String>,
}

/// The remote chat a chat view is bound to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatTarget {
    pub chat_id: i64,
    pub title: String,
}

impl ChatTarget {
    pub fn new(chat_id: i64, title: &str) -> Self {
        ChatTarget {
            chat_id,
            title: title.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientStatus {
    Active,
    New,
    Inactive,
    Other(String),
}

impl ClientStatus {
    pub fn parse(raw: Option<&str>) -> Self {
        match raw.map(str::trim) {
            None | Some("") => ClientStatus::New,
            Some(s) if s.eq_ignore_ascii_case("active") => ClientStatus::Active,
            Some(s) if s.eq_ignore_ascii_case("new") => ClientStatus::New,
            Some(s) if s.eq_ignore_ascii_case("inactive") => ClientStatus::Inactive,
            Some(other) => ClientStatus::Other(other.to_string()),
        }
    }
}

impl fmt::Display for ClientStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ClientStatus::Active => write!(f, "active"),
            ClientStatus::New => write!(f, "new"),
            ClientStatus::Inactive => write!(f, "inactive"),
            ClientStatus::Other(raw) => write!(f, "{}", raw),
        }
    }
}

/// A contact as shown in the client list, rebuilt from the remote record on
/// every roster refresh.
#[derive(Debug, Clone, PartialEq)]
pub struct Client {
    pub id: i64,
    pub display_name: String,
    pub handle: String,
    pub avatar_initial: char,
    pub conversation_id: Option<i64>,
    pub status: ClientStatus,
    pub tags: Vec<String>,
    pub last_seen: String,
}

impl Client {
    /// Chat target for this client, if the bridge knows its Telegram chat.
    pub fn chat_target(&self) -> Option<ChatTarget> {
        self.conversation_id
            .map(|chat_id| ChatTarget::new(chat_id, &self.display_name))
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Stats {
    pub total_clients: u64,
    pub active_clients: u64,
    pub total_messages: u64,
    pub today_messages: u64,
}
