// Client side of the Telegram bridge.
// The bridge is a single HTTP endpoint that dispatches on an `action` field.

use async_trait::async_trait;

use crate::error::BridgeResult;

pub mod http;
pub mod types;

pub use http::HttpBridge;
pub use types::*;

/// Offset sent on the first poll of a conversation: "only the latest update".
pub const LATEST_ONLY_OFFSET: i64 = -1;

/// Operations the dashboard needs from the bridge.
///
/// `HttpBridge` is the real implementation; tests script their own.
#[async_trait]
pub trait BridgeApi: Send + Sync {
    async fn get_updates(&self, offset: i64) -> BridgeResult<Vec<Update>>;

    /// Returns the server-assigned message id.
    async fn send_message(&self, chat_id: i64, text: &str) -> BridgeResult<i64>;

    async fn get_clients(&self) -> BridgeResult<Vec<ClientRecord>>;

    async fn get_stats(&self) -> BridgeResult<StatsRecord>;

    /// Ask the bridge to pull pending updates into its own store. The body is
    /// ignored.
    async fn sync_updates(&self, offset: i64) -> BridgeResult<()>;
}
