use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

// ── Status ────────────────────────────────────────────────────────────────────

/// Listing status. Only `Active` is ever produced by the scraper; `Sold` is
/// reserved for operators flipping records by hand.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TicketStatus {
    Active,
    Sold,
}

impl TicketStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TicketStatus::Active => "active",
            TicketStatus::Sold => "sold",
        }
    }
}

impl fmt::Display for TicketStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error)]
#[error("invalid status filter '{0}' (valid: active, sold, or leave empty for all)")]
pub struct InvalidStatusFilter(pub String);

impl FromStr for TicketStatus {
    type Err = InvalidStatusFilter;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(TicketStatus::Active),
            "sold" => Ok(TicketStatus::Sold),
            other => Err(InvalidStatusFilter(other.to_string())),
        }
    }
}

// ── Extraction output ─────────────────────────────────────────────────────────

/// One validated listing as extracted from a page. All string fields are
/// best-effort and may be empty; only `price` plus one of
/// `event_name`/`description` is guaranteed by validation.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CandidateTicket {
    pub ticket_id: String,
    pub title: String,
    pub event_name: String,
    pub date: String,
    pub time: String,
    pub venue: String,
    pub location: String,
    pub price: String,
    pub quantity: String,
    pub seat_info: String,
    pub description: String,
    pub days_remaining: String,
    pub is_instant_buy: bool,
    pub url: String,
}

/// Derive the stable ticket id from a listing url: the last path segment,
/// trailing slash stripped. e.g.
/// `https://ticketjam.jp/ticket/live_domestic/7938150-2511` → `7938150-2511`.
/// An empty url degrades to an empty id.
pub fn ticket_id_from_url(url: &str) -> String {
    let trimmed = url.trim_end_matches('/');
    match trimmed.rsplit('/').next() {
        Some(seg) if !seg.is_empty() => seg.to_string(),
        _ => url.to_string(),
    }
}

// ── Stored record ─────────────────────────────────────────────────────────────

/// One tracked listing as persisted in the `tickets` table.
#[derive(Debug, Clone, Serialize)]
pub struct TicketRecord {
    pub ticket_id: String,
    pub title: String,
    pub event_name: String,
    pub date: String,
    pub time: String,
    pub venue: String,
    pub location: String,
    pub price: String,
    pub quantity: String,
    pub seat_info: String,
    pub description: String,
    pub days_remaining: String,
    pub is_instant_buy: bool,
    pub url: String,
    pub first_seen: DateTime<Utc>,
    pub last_seen: DateTime<Utc>,
    pub status: TicketStatus,
    pub posted: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Append-only price ledger row for one ticket.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PriceHistoryEntry {
    pub price: String,
    pub recorded_at: DateTime<Utc>,
}

// ── Diff outcomes ─────────────────────────────────────────────────────────────

/// What an upsert did to the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpsertAction {
    /// First sighting: record inserted with an initial history entry.
    Inserted,
    /// Price differs from the stored record: history appended, fields
    /// overwritten, `posted` reset.
    PriceChanged { previous: String },
    /// Same price, only `last_seen` bumped.
    Touched,
}

/// Direction of the most recent price movement, used as the delivery color
/// hint for the notification sink.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PriceDirection {
    Unchanged,
    Increase,
    Decrease,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ticket_id_from_url() {
        assert_eq!(
            ticket_id_from_url("https://ticketjam.jp/ticket/live_domestic/7938150-2511"),
            "7938150-2511"
        );
        // Trailing slash yields the same identity
        assert_eq!(
            ticket_id_from_url("https://site/ticket/abc-1"),
            ticket_id_from_url("https://site/ticket/abc-1/"),
        );
        assert_eq!(ticket_id_from_url(""), "");
    }

    #[test]
    fn test_status_round_trip() {
        assert_eq!("active".parse::<TicketStatus>().unwrap(), TicketStatus::Active);
        assert_eq!("sold".parse::<TicketStatus>().unwrap(), TicketStatus::Sold);
        assert!("pending".parse::<TicketStatus>().is_err());
        assert_eq!(TicketStatus::Active.to_string(), "active");
    }
}
