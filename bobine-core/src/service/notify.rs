//! Outbound notification dispatch.
//!
//! Alert and lifecycle messages leave the server through a
//! [`NotificationSender`]; the production implementation posts JSON to a
//! webhook URL. Tests substitute a recording fake.

use async_trait::async_trait;
use chrono::Utc;
use serde::Serialize;
use std::time::Duration;

use crate::models::{ChannelKind, NotificationChannel};
use crate::{Error, Result};

const DELIVERY_TIMEOUT: Duration = Duration::from_secs(10);

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait NotificationSender: Send + Sync {
    async fn send(&self, channel: &NotificationChannel, subject: &str, body: &str) -> Result<()>;
}

#[derive(Serialize)]
struct WebhookPayload<'a> {
    subject: &'a str,
    body: &'a str,
    timestamp: chrono::DateTime<Utc>,
}

/// Posts `{subject, body, timestamp}` as JSON with a per-call timeout.
pub struct WebhookSender {
    client: reqwest::Client,
}

impl WebhookSender {
    #[must_use]
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
        }
    }
}

impl Default for WebhookSender {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl NotificationSender for WebhookSender {
    async fn send(&self, channel: &NotificationChannel, subject: &str, body: &str) -> Result<()> {
        if !channel.enabled {
            return Err(Error::InvalidInput(format!(
                "channel {} is disabled",
                channel.id
            )));
        }

        let ChannelKind::Webhook { url } = &channel.kind;

        let payload = WebhookPayload {
            subject,
            body,
            timestamp: Utc::now(),
        };

        let response = self
            .client
            .post(url)
            .json(&payload)
            .timeout(DELIVERY_TIMEOUT)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(Error::NotificationDelivery(format!(
                "webhook {} returned {}",
                channel.name,
                response.status()
            )));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ChannelId;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    fn webhook_channel(url: String, enabled: bool) -> NotificationChannel {
        NotificationChannel {
            id: ChannelId::from("chan-ops"),
            name: "ops".to_string(),
            kind: ChannelKind::Webhook { url },
            enabled,
        }
    }

    /// Accept one HTTP request, answer with `status`, return the raw
    /// request bytes (headers + body) as a string.
    fn accept_one(
        listener: TcpListener,
        status: &'static str,
    ) -> tokio::task::JoinHandle<String> {
        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.expect("accept");

            let mut raw = Vec::new();
            let mut chunk = [0u8; 4096];
            let (head_end, content_length) = loop {
                let n = socket.read(&mut chunk).await.expect("read headers");
                raw.extend_from_slice(&chunk[..n]);
                if let Some(pos) = raw.windows(4).position(|w| w == b"\r\n\r\n") {
                    let head = String::from_utf8_lossy(&raw[..pos]).into_owned();
                    let len = head
                        .lines()
                        .find_map(|line| {
                            let (name, value) = line.split_once(':')?;
                            name.eq_ignore_ascii_case("content-length")
                                .then(|| value.trim().parse::<usize>().ok())?
                        })
                        .unwrap_or(0);
                    break (pos + 4, len);
                }
            };
            while raw.len() < head_end + content_length {
                let n = socket.read(&mut chunk).await.expect("read body");
                raw.extend_from_slice(&chunk[..n]);
            }

            let response =
                format!("HTTP/1.1 {status}\r\ncontent-length: 0\r\nconnection: close\r\n\r\n");
            socket
                .write_all(response.as_bytes())
                .await
                .expect("write response");
            String::from_utf8_lossy(&raw).into_owned()
        })
    }

    #[tokio::test]
    async fn posts_the_json_payload_to_the_hook_path() {
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
        let addr = listener.local_addr().expect("local addr");
        let server = accept_one(listener, "200 OK");

        let channel = webhook_channel(format!("http://{addr}/hook"), true);
        WebhookSender::new()
            .send(&channel, "disk-low", "Disk space is low: 5.2 GB free")
            .await
            .expect("delivery should succeed");

        let request = server.await.expect("server task");
        assert!(request.starts_with("POST /hook HTTP/1.1\r\n"));
        assert!(request.to_lowercase().contains("content-type: application/json"));
        assert!(request.contains(r#""subject":"disk-low""#));
        assert!(request.contains(r#""body":"Disk space is low: 5.2 GB free""#));
        assert!(request.contains(r#""timestamp":""#));
    }

    #[tokio::test]
    async fn non_success_status_is_a_delivery_error() {
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
        let addr = listener.local_addr().expect("local addr");
        let server = accept_one(listener, "500 Internal Server Error");

        let channel = webhook_channel(format!("http://{addr}/hook"), true);
        let result = WebhookSender::new().send(&channel, "s", "b").await;

        assert!(matches!(result, Err(Error::NotificationDelivery(_))));
        server.await.expect("server task");
    }

    #[tokio::test]
    async fn disabled_channel_is_rejected_without_a_request() {
        // Nothing listens on this address; a rejected channel must fail
        // before any connection attempt.
        let channel = webhook_channel("http://127.0.0.1:1/hook".to_string(), false);
        let result = WebhookSender::new().send(&channel, "s", "b").await;
        assert!(matches!(result, Err(Error::InvalidInput(_))));
    }

    #[tokio::test]
    async fn unreachable_hook_is_a_delivery_error() {
        let channel = webhook_channel("http://127.0.0.1:1/hook".to_string(), true);
        let result = WebhookSender::new().send(&channel, "s", "b").await;
        assert!(matches!(result, Err(Error::NotificationDelivery(_))));
    }
}
