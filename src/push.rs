use anyhow::Result;
use reqwest::Client;
use serde::Serialize;
use tracing::{info, warn};

/// Expo-compatible push delivery. The core's responsibility ends at building
/// the payloads; retries and token lifecycle belong to the push service.
#[derive(Debug, Clone)]
pub struct PushClient {
    http: Client,
    endpoint: String,
}

/// Messages per request, matching the Expo push API limit.
pub const PUSH_CHUNK_SIZE: usize = 100;

#[derive(Debug, Clone, Serialize)]
pub struct PushMessage {
    pub to: String,
    pub sound: String,
    pub title: String,
    pub body: String,
    pub data: PushData,
}

#[derive(Debug, Clone, Serialize)]
pub struct PushData {
    pub event_id: String,
    pub url: String,
}

impl PushMessage {
    pub fn new(token: &str, title: &str, body: String, event_id: &str) -> Self {
        PushMessage {
            to: token.to_string(),
            sound: "default".to_string(),
            title: title.to_string(),
            body,
            data: PushData {
                event_id: event_id.to_string(),
                url: format!("/event/{}", event_id),
            },
        }
    }
}

/// One request per `PUSH_CHUNK_SIZE` messages; an empty batch makes no
/// requests at all.
fn chunked(messages: &[PushMessage]) -> impl Iterator<Item = &[PushMessage]> {
    messages.chunks(PUSH_CHUNK_SIZE)
}

/// Device tokens registered by the mobile client all carry the Expo prefix;
/// anything else is stale junk not worth a round trip.
pub fn is_push_token(token: &str) -> bool {
    (token.starts_with("ExponentPushToken[") || token.starts_with("ExpoPushToken["))
        && token.ends_with(']')
}

impl PushClient {
    pub fn new(endpoint: &str) -> Self {
        PushClient {
            http: Client::new(),
            endpoint: endpoint.to_string(),
        }
    }

    /// Fire-and-forget fan-out. A failed chunk is logged and skipped; push
    /// delivery must never block or fail the flow that produced it.
    pub async fn send_all(&self, messages: &[PushMessage]) {
        for chunk in chunked(messages) {
            if let Err(err) = self.send_chunk(chunk).await {
                warn!(size = chunk.len(), error = %err, "push chunk failed");
            }
        }
        if !messages.is_empty() {
            info!(count = messages.len(), "push messages dispatched");
        }
    }

    async fn send_chunk(&self, chunk: &[PushMessage]) -> Result<()> {
        let response = self
            .http
            .post(&self.endpoint)
            .header("Content-Type", "application/json")
            .json(&chunk)
            .send()
            .await?;

        if response.status().is_success() {
            Ok(())
        } else {
            let err_text = response.text().await.unwrap_or_default();
            Err(anyhow::anyhow!("push service error: {}", err_text))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_shape_check() {
        assert!(is_push_token("ExponentPushToken[abc123]"));
        assert!(is_push_token("ExpoPushToken[abc123]"));
        assert!(!is_push_token("abc123"));
        assert!(!is_push_token("ExponentPushToken[abc123"));
    }

    #[test]
    fn fan_out_respects_the_batch_limit() {
        let message = |i: usize| {
            PushMessage::new(
                "ExponentPushToken[abc]",
                "Event Reminder",
                format!("message {}", i),
                "65f0",
            )
        };

        let none: Vec<PushMessage> = Vec::new();
        assert_eq!(chunked(&none).count(), 0);

        let full: Vec<_> = (0..PUSH_CHUNK_SIZE).map(message).collect();
        let chunks: Vec<_> = chunked(&full).collect();
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].len(), PUSH_CHUNK_SIZE);

        let overflow: Vec<_> = (0..PUSH_CHUNK_SIZE + 1).map(message).collect();
        let chunks: Vec<_> = chunked(&overflow).collect();
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].len(), PUSH_CHUNK_SIZE);
        assert_eq!(chunks[1].len(), 1);
    }

    #[test]
    fn message_carries_deep_link() {
        let msg = PushMessage::new(
            "ExponentPushToken[abc]",
            "Event Reminder",
            "Robotics Expo is starting soon".to_string(),
            "65f0",
        );
        assert_eq!(msg.data.url, "/event/65f0");
        assert_eq!(msg.sound, "default");
    }
}
