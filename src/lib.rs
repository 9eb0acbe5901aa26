// Library side of tgcrm: bridge client, chat polling, roster and CRM data.
// The terminal UI in main.rs drives these.
pub mod api;
pub mod chat;
pub mod config;
pub mod crm;
pub mod error;
pub mod logging;
pub mod models;
pub mod roster;
pub mod task;

// Re-export main types for convenience
pub use api::{BridgeApi, HttpBridge};
pub use chat::{ChatController, ChatSnapshot, SendOutcome, SyncCursor};
pub use config::Config;
pub use error::BridgeError;
pub use models::*;
pub use roster::{Roster, RosterLoader};
