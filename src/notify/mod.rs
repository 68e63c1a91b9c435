//! Notification sink: renders tracked tickets and delivers them one at a
//! time to a Discord webhook. Delivery is per-record; a failed send leaves
//! the record unposted for the next cycle.

use crate::models::{PriceDirection, PriceHistoryEntry, TicketRecord};
use crate::storage::format_price_change;
use crate::utils;
use anyhow::{Context, Result};
use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::debug;

const COLOR_INCREASE: u32 = 0xED4245; // red
const COLOR_DECREASE: u32 = 0x57F287; // green
const COLOR_UNCHANGED: u32 = 0x5865F2;

/// How many of the most recent ledger entries a notification carries.
const HISTORY_TAIL: usize = 3;

fn embed_color(direction: PriceDirection) -> u32 {
    match direction {
        PriceDirection::Increase => COLOR_INCREASE,
        PriceDirection::Decrease => COLOR_DECREASE,
        PriceDirection::Unchanged => COLOR_UNCHANGED,
    }
}

/// A rendered record ready for delivery.
#[derive(Debug, Clone)]
pub struct TicketNotification {
    pub ticket_id: String,
    pub direction: PriceDirection,
    pub payload: Value,
}

/// Render one record with its price-change annotation and color hint.
pub fn render(record: &TicketRecord, history: &[PriceHistoryEntry]) -> TicketNotification {
    let (price_info, direction) = format_price_change(&record.price, history);

    let mut fields = vec![json!({ "name": "価格", "value": price_info, "inline": true })];
    if !record.quantity.is_empty() {
        fields.push(json!({ "name": "枚数", "value": record.quantity, "inline": true }));
    }
    if !record.date.is_empty() || !record.time.is_empty() {
        let when = format!("{} {}", record.date, record.time).trim().to_string();
        fields.push(json!({ "name": "日時", "value": when, "inline": true }));
    }
    if !record.location.is_empty() || !record.venue.is_empty() {
        let place = format!("{} {}", record.location, record.venue).trim().to_string();
        fields.push(json!({ "name": "会場", "value": place, "inline": true }));
    }
    if !record.seat_info.is_empty() {
        fields.push(json!({ "name": "座席", "value": record.seat_info, "inline": true }));
    }
    if !record.days_remaining.is_empty() {
        fields.push(json!({ "name": "残り日数", "value": record.days_remaining, "inline": true }));
    }
    if record.is_instant_buy {
        fields.push(json!({ "name": "即決", "value": "あり", "inline": true }));
    }

    let tail_start = history.len().saturating_sub(HISTORY_TAIL);
    if !history[tail_start..].is_empty() {
        let ledger = history[tail_start..]
            .iter()
            .map(|e| format!("{} ({})", e.price, e.recorded_at.format("%Y-%m-%d %H:%M")))
            .collect::<Vec<_>>()
            .join("\n");
        fields.push(json!({ "name": "価格履歴", "value": ledger, "inline": false }));
    }

    let title = if record.title.is_empty() {
        record.event_name.clone()
    } else {
        record.title.clone()
    };

    let payload = json!({
        "embeds": [{
            "title": title,
            "url": record.url,
            "color": embed_color(direction),
            "fields": fields,
            "footer": { "text": format!("id: {}", utils::truncate_chars(&record.ticket_id, 8)) },
        }]
    });

    TicketNotification {
        ticket_id: record.ticket_id.clone(),
        direction,
        payload,
    }
}

// ── Sink ──────────────────────────────────────────────────────────────────────

/// Where rendered records get delivered. Success or failure is reported back
/// per record.
#[async_trait]
pub trait NotificationSink: Send + Sync {
    async fn send(&self, note: &TicketNotification) -> Result<()>;
}

pub struct DiscordWebhookSink {
    client: reqwest::Client,
    webhook_url: String,
}

impl DiscordWebhookSink {
    pub fn new(webhook_url: String) -> Result<Self> {
        let client = reqwest::Client::builder()
            .build()
            .context("Failed to build webhook client")?;
        Ok(Self { client, webhook_url })
    }
}

#[async_trait]
impl NotificationSink for DiscordWebhookSink {
    async fn send(&self, note: &TicketNotification) -> Result<()> {
        debug!("Posting {} to webhook", note.ticket_id);
        let resp = self
            .client
            .post(&self.webhook_url)
            .json(&note.payload)
            .send()
            .await
            .with_context(|| format!("Webhook send failed for {}", note.ticket_id))?;

        resp.error_for_status()
            .with_context(|| format!("Webhook rejected {}", note.ticket_id))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::TicketStatus;
    use chrono::Utc;

    fn record() -> TicketRecord {
        let now = Utc::now();
        TicketRecord {
            ticket_id: "7938150-2511".to_string(),
            title: "人気アーティスト公演".to_string(),
            event_name: "人気アーティスト公演".to_string(),
            date: "2025/12/23".to_string(),
            time: "19:00".to_string(),
            venue: "ガーデンシアター".to_string(),
            location: "東京".to_string(),
            price: "1,200円".to_string(),
            quantity: "2枚".to_string(),
            seat_info: String::new(),
            description: "desc".to_string(),
            days_remaining: "残り3日".to_string(),
            is_instant_buy: true,
            url: "https://ticketjam.jp/ticket/live_domestic/7938150-2511".to_string(),
            first_seen: now,
            last_seen: now,
            status: TicketStatus::Active,
            posted: false,
            created_at: now,
            updated_at: now,
        }
    }

    fn entry(price: &str) -> PriceHistoryEntry {
        PriceHistoryEntry { price: price.to_string(), recorded_at: Utc::now() }
    }

    #[test]
    fn test_render_price_increase() {
        let history = vec![entry("1,000円"), entry("1,200円")];
        let note = render(&record(), &history);

        assert_eq!(note.ticket_id, "7938150-2511");
        assert_eq!(note.direction, PriceDirection::Increase);

        let embed = &note.payload["embeds"][0];
        assert_eq!(embed["title"], "人気アーティスト公演");
        assert_eq!(embed["color"], COLOR_INCREASE);
        assert_eq!(embed["footer"]["text"], "id: 7938150-");

        let price_field = &embed["fields"][0];
        assert_eq!(price_field["name"], "価格");
        assert!(price_field["value"].as_str().unwrap().contains("+200円"));
    }

    #[test]
    fn test_render_history_tail_capped_at_three() {
        let history = vec![
            entry("1,000円"),
            entry("1,100円"),
            entry("1,200円"),
            entry("1,200円"),
        ];
        let note = render(&record(), &history);
        let fields = note.payload["embeds"][0]["fields"].as_array().unwrap();
        let ledger = fields
            .iter()
            .find(|f| f["name"] == "価格履歴")
            .unwrap()["value"]
            .as_str()
            .unwrap()
            .to_string();
        assert_eq!(ledger.lines().count(), 3);
        assert!(!ledger.contains("1,000円"));
    }

    #[test]
    fn test_render_unchanged_single_entry() {
        let note = render(&record(), &[entry("1,200円")]);
        assert_eq!(note.direction, PriceDirection::Unchanged);
        let embed = &note.payload["embeds"][0];
        assert_eq!(embed["color"], COLOR_UNCHANGED);
        assert_eq!(embed["fields"][0]["value"], "1,200円");
    }
}
