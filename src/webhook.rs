use anyhow::{Context, Result};
use chrono::{SecondsFormat, Utc};
use reqwest::Client;
use rusqlite::Connection;
use serde::Serialize;
use tracing::{info, warn};

use crate::db::{self, PendingDelivery};
use crate::extractor::Capture;

const ENV_WEBHOOK_URL: &str = "WEBHOOK_URL";

pub fn webhook_url() -> Result<String> {
    std::env::var(ENV_WEBHOOK_URL)
        .map_err(|_| anyhow::anyhow!("{} environment variable must be set", ENV_WEBHOOK_URL))
}

/// Wire shape the sink expects. Fields the page did not yield go out as
/// null, and capturedAt is stamped when the payload is built.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Payload<'a> {
    pub address: &'a str,
    pub street: Option<&'a str>,
    pub city: Option<&'a str>,
    pub state: Option<&'a str>,
    pub zip: Option<&'a str>,
    pub source_url: &'a str,
    pub captured_at: String,
}

impl<'a> Payload<'a> {
    pub fn from_capture(c: &'a Capture) -> Self {
        Self::build(&c.full_address, &c.street, &c.city, &c.state, &c.zip, &c.url)
    }

    pub fn from_pending(row: &'a PendingDelivery) -> Self {
        Self::build(
            &row.full_address,
            &row.street,
            &row.city,
            &row.state,
            &row.zip,
            &row.url,
        )
    }

    fn build(
        address: &'a str,
        street: &'a str,
        city: &'a str,
        state: &'a str,
        zip: &'a str,
        source_url: &'a str,
    ) -> Self {
        Self {
            address,
            street: non_empty(street),
            city: non_empty(city),
            state: non_empty(state),
            zip: non_empty(zip),
            source_url,
            captured_at: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
        }
    }
}

fn non_empty(s: &str) -> Option<&str> {
    (!s.is_empty()).then_some(s)
}

/// POST one payload to the webhook. Non-2xx responses become errors that
/// carry the status line and response body.
pub async fn send_payload(client: &Client, url: &str, payload: &Payload<'_>) -> Result<()> {
    let res = client
        .post(url)
        .json(payload)
        .send()
        .await
        .context("Webhook request failed")?;

    let status = res.status();
    if !status.is_success() {
        let body = res.text().await.unwrap_or_default();
        anyhow::bail!("Webhook HTTP {} {}", status, body);
    }
    Ok(())
}

/// Delivery stats returned after completion.
pub struct DeliveryStats {
    pub total: usize,
    pub sent: usize,
    pub errors: usize,
}

/// Walk pending captures in order, POSTing each and recording the outcome.
/// Failures are recorded and left pending; no automatic retry loop here.
pub async fn deliver_pending(conn: &Connection, limit: Option<usize>) -> Result<DeliveryStats> {
    let pending = db::fetch_undelivered(conn, limit)?;
    if pending.is_empty() {
        return Ok(DeliveryStats {
            total: 0,
            sent: 0,
            errors: 0,
        });
    }

    let url = webhook_url()?;
    let client = crate::fetch::client()?;
    let mut sent = 0usize;
    let mut errors = 0usize;

    for row in &pending {
        let payload = Payload::from_pending(row);
        match send_payload(&client, &url, &payload).await {
            Ok(()) => {
                db::mark_delivery(conn, row.capture_id, None)?;
                info!("Delivered {}", row.url);
                sent += 1;
            }
            Err(e) => {
                warn!("Delivery failed for {}: {}", row.url, e);
                db::mark_delivery(conn, row.capture_id, Some(&e.to_string()))?;
                errors += 1;
            }
        }
    }

    Ok(DeliveryStats {
        total: pending.len(),
        sent,
        errors,
    })
}

// ── Tests ──

#[cfg(test)]
mod tests {
    use super::*;

    fn capture() -> Capture {
        Capture {
            url: "https://example.com/listing/1".into(),
            street: "5904 E 7 St".into(),
            city: "Tulsa".into(),
            state: String::new(),
            zip: String::new(),
            full_address: "5904 E 7 St, Tulsa".into(),
        }
    }

    #[test]
    fn payload_keys_are_camel_case() {
        let c = capture();
        let value = serde_json::to_value(Payload::from_capture(&c)).unwrap();
        assert_eq!(value["address"], "5904 E 7 St, Tulsa");
        assert_eq!(value["sourceUrl"], "https://example.com/listing/1");
        assert!(value.get("capturedAt").is_some());
        assert!(value.get("source_url").is_none());
    }

    #[test]
    fn empty_fields_serialize_as_null() {
        let c = capture();
        let value = serde_json::to_value(Payload::from_capture(&c)).unwrap();
        assert_eq!(value["street"], "5904 E 7 St");
        assert!(value["state"].is_null());
        assert!(value["zip"].is_null());
    }

    #[test]
    fn captured_at_is_rfc3339_utc() {
        let c = capture();
        let payload = Payload::from_capture(&c);
        let parsed = chrono::DateTime::parse_from_rfc3339(&payload.captured_at).unwrap();
        assert_eq!(parsed.offset().local_minus_utc(), 0);
    }
}
