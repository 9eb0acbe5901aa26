use std::time::Duration;

use async_trait::async_trait;
use log::{debug, warn};
use serde::de::DeserializeOwned;
use serde::Deserialize;

use super::types::{
    rejection_reason, ClientRecord, ClientsResponse, SendMessageRequest, SendMessageResponse,
    StatsRecord, StatsResponse, Update, UpdatesResponse,
};
use super::BridgeApi;
use crate::error::{BridgeError, BridgeResult};

/// reqwest-backed bridge client bound to one endpoint URL.
#[derive(Clone)]
pub struct HttpBridge {
    endpoint: String,
    http: reqwest::Client,
}

// Shape of the bridge's own error bodies (400/405)
#[derive(Deserialize)]
struct ErrorBody {
    error: String,
}

impl HttpBridge {
    pub fn new(endpoint: &str, timeout: Option<Duration>) -> BridgeResult<Self> {
        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        Ok(HttpBridge {
            endpoint: endpoint.to_string(),
            http: builder.build()?,
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    async fn get_action<T: DeserializeOwned>(
        &self,
        action: &'static str,
        offset: Option<i64>,
    ) -> BridgeResult<T> {
        let mut query = vec![("action", action.to_string())];
        if let Some(offset) = offset {
            query.push(("offset", offset.to_string()));
        }
        debug!("GET {} action={} offset={:?}", self.endpoint, action, offset);

        let response = self.http.get(&self.endpoint).query(&query).send().await?;
        Self::decode(action, response).await
    }

    async fn decode<T: DeserializeOwned>(
        action: &'static str,
        response: reqwest::Response,
    ) -> BridgeResult<T> {
        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            if let Ok(err) = serde_json::from_str::<ErrorBody>(&body) {
                return Err(BridgeError::Rejected {
                    action,
                    description: err.error,
                });
            }
            warn!("{} failed with HTTP {}", action, status);
            return Err(BridgeError::Status {
                action,
                status: status.as_u16(),
            });
        }

        Ok(serde_json::from_str(&body)?)
    }
}

#[async_trait]
impl BridgeApi for HttpBridge {
    async fn get_updates(&self, offset: i64) -> BridgeResult<Vec<Update>> {
        let response: UpdatesResponse = self.get_action("getUpdates", Some(offset)).await?;
        if !response.ok {
            return Err(BridgeError::Rejected {
                action: "getUpdates",
                description: rejection_reason(response.description, response.error),
            });
        }
        Ok(response.result)
    }

    async fn send_message(&self, chat_id: i64, text: &str) -> BridgeResult<i64> {
        let request = SendMessageRequest {
            action: "sendMessage",
            chat_id,
            text,
        };
        debug!("POST {} action=sendMessage chat_id={}", self.endpoint, chat_id);

        let response = self.http.post(&self.endpoint).json(&request).send().await?;
        let response: SendMessageResponse = Self::decode("sendMessage", response).await?;

        match (response.ok, response.result) {
            (true, Some(sent)) => Ok(sent.message_id),
            (true, None) => Err(BridgeError::Rejected {
                action: "sendMessage",
                description: "response carried no message id".to_string(),
            }),
            (false, _) => Err(BridgeError::Rejected {
                action: "sendMessage",
                description: rejection_reason(response.description, response.error),
            }),
        }
    }

    async fn get_clients(&self) -> BridgeResult<Vec<ClientRecord>> {
        let response: ClientsResponse = self.get_action("getClients", None).await?;
        Ok(response.clients)
    }

    async fn get_stats(&self) -> BridgeResult<StatsRecord> {
        let response: StatsResponse = self.get_action("getStats", None).await?;
        Ok(response.stats)
    }

    async fn sync_updates(&self, offset: i64) -> BridgeResult<()> {
        let response = self
            .http
            .get(&self.endpoint)
            .query(&[("action", "syncUpdates".to_string()), ("offset", offset.to_string())])
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(BridgeError::Status {
                action: "syncUpdates",
                status: response.status().as_u16(),
            });
        }
        Ok(())
    }
}
