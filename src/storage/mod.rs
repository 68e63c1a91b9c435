use crate::models::{
    CandidateTicket, PriceDirection, PriceHistoryEntry, TicketRecord, TicketStatus, UpsertAction,
};
use crate::utils;
use anyhow::{Context, Result};
use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{params, params_from_iter, Connection, OptionalExtension};
use serde::Serialize;
use std::path::Path;
use tracing::info;

// ── Schema ────────────────────────────────────────────────────────────────────

const DDL: &str = r#"
CREATE TABLE IF NOT EXISTS tickets (
    ticket_id       TEXT PRIMARY KEY,
    title           TEXT NOT NULL DEFAULT '',
    event_name      TEXT NOT NULL DEFAULT '',
    date            TEXT NOT NULL DEFAULT '',
    time            TEXT NOT NULL DEFAULT '',
    venue           TEXT NOT NULL DEFAULT '',
    location        TEXT NOT NULL DEFAULT '',
    price           TEXT NOT NULL DEFAULT '',
    quantity        TEXT NOT NULL DEFAULT '',
    seat_info       TEXT NOT NULL DEFAULT '',
    description     TEXT NOT NULL DEFAULT '',
    days_remaining  TEXT NOT NULL DEFAULT '',
    is_instant_buy  INTEGER NOT NULL DEFAULT 0,
    url             TEXT NOT NULL DEFAULT '',
    first_seen      TEXT NOT NULL,
    last_seen       TEXT NOT NULL,
    status          TEXT NOT NULL DEFAULT 'active',
    posted          INTEGER NOT NULL DEFAULT 0,
    created_at      TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP,
    updated_at      TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
);

-- No FK to tickets: pruned records deliberately leave their history rows
-- orphaned, so the ledger must outlive the ticket.
CREATE TABLE IF NOT EXISTS price_history (
    id          INTEGER PRIMARY KEY AUTOINCREMENT,
    ticket_id   TEXT NOT NULL,
    price       TEXT NOT NULL,
    recorded_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
);
"#;

const INDEXES: &str = r#"
CREATE INDEX IF NOT EXISTS idx_tickets_event_name ON tickets (event_name);
CREATE INDEX IF NOT EXISTS idx_tickets_date       ON tickets (date);
CREATE INDEX IF NOT EXISTS idx_tickets_status     ON tickets (status);
CREATE INDEX IF NOT EXISTS idx_tickets_first_seen ON tickets (first_seen);
CREATE INDEX IF NOT EXISTS idx_history_ticket     ON price_history (ticket_id);
"#;

const TICKET_COLUMNS: &str = "ticket_id, title, event_name, date, time, venue, location, price, \
                              quantity, seat_info, description, days_remaining, is_instant_buy, \
                              url, first_seen, last_seen, status, posted, created_at, updated_at";

fn now_string(now: DateTime<Utc>) -> String {
    // Fixed-width RFC 3339 so lexicographic TEXT ordering is chronological.
    now.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_timestamp(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}

// ── Repository ────────────────────────────────────────────────────────────────

pub struct Repository {
    conn: Connection,
}

impl Repository {
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Could not create dir {:?}", parent))?;
        }
        let conn = Connection::open(path)
            .with_context(|| format!("Failed to open database at {:?}", path))?;
        Ok(Self { conn })
    }

    pub fn open_in_memory() -> Result<Self> {
        Ok(Self { conn: Connection::open_in_memory()? })
    }

    pub fn run_migrations(&self) -> Result<()> {
        self.conn.execute_batch(DDL).context("DDL failed")?;
        self.conn.execute_batch(INDEXES).context("Index creation failed")?;
        Ok(())
    }

    /// Remove the persisted store file entirely.
    pub fn delete_store(path: &Path) -> Result<bool> {
        if !path.exists() {
            return Ok(false);
        }
        std::fs::remove_file(path)
            .with_context(|| format!("Failed to delete database at {:?}", path))?;
        Ok(true)
    }

    // ── Upsert / diff ─────────────────────────────────────────────────────────

    /// Insert a candidate or reconcile it against the stored record.
    ///
    /// New id: insert with an initial history entry, `posted = false`.
    /// Known id, same price: bump `last_seen` only.
    /// Known id, new price: append a history entry, overwrite the mutable
    /// fields, and reset `posted` so the record is delivered again.
    pub fn upsert(&self, cand: &CandidateTicket) -> Result<(bool, UpsertAction)> {
        let now = now_string(Utc::now());
        let tx = self.conn.unchecked_transaction()?;

        let existing: Option<String> = tx
            .query_row(
                "SELECT price FROM tickets WHERE ticket_id = ?1",
                params![cand.ticket_id],
                |r| r.get(0),
            )
            .optional()?;

        let result = match existing {
            None => {
                tx.execute(
                    r#"INSERT INTO tickets (
                           ticket_id, title, event_name, date, time, venue, location, price,
                           quantity, seat_info, description, days_remaining, is_instant_buy, url,
                           first_seen, last_seen, status, posted, created_at, updated_at
                       ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14,
                                 ?15, ?15, 'active', 0, ?15, ?15)"#,
                    params![
                        cand.ticket_id, cand.title, cand.event_name, cand.date, cand.time,
                        cand.venue, cand.location, cand.price, cand.quantity, cand.seat_info,
                        cand.description, cand.days_remaining, cand.is_instant_buy, cand.url,
                        now,
                    ],
                )
                .with_context(|| format!("insert ticket {}", cand.ticket_id))?;

                tx.execute(
                    "INSERT INTO price_history (ticket_id, price, recorded_at) VALUES (?1, ?2, ?3)",
                    params![cand.ticket_id, cand.price, now],
                )?;

                (true, UpsertAction::Inserted)
            }
            Some(previous) if previous == cand.price => {
                tx.execute(
                    "UPDATE tickets SET last_seen = ?1, updated_at = ?1 WHERE ticket_id = ?2",
                    params![now, cand.ticket_id],
                )?;
                (false, UpsertAction::Touched)
            }
            Some(previous) => {
                tx.execute(
                    "INSERT INTO price_history (ticket_id, price, recorded_at) VALUES (?1, ?2, ?3)",
                    params![cand.ticket_id, cand.price, now],
                )?;
                tx.execute(
                    r#"UPDATE tickets SET
                           title = ?2, event_name = ?3, date = ?4, time = ?5, venue = ?6,
                           location = ?7, price = ?8, quantity = ?9, seat_info = ?10,
                           description = ?11, days_remaining = ?12, is_instant_buy = ?13,
                           url = ?14, last_seen = ?15, posted = 0, updated_at = ?15
                       WHERE ticket_id = ?1"#,
                    params![
                        cand.ticket_id, cand.title, cand.event_name, cand.date, cand.time,
                        cand.venue, cand.location, cand.price, cand.quantity, cand.seat_info,
                        cand.description, cand.days_remaining, cand.is_instant_buy, cand.url,
                        now,
                    ],
                )
                .with_context(|| format!("update ticket {}", cand.ticket_id))?;

                (false, UpsertAction::PriceChanged { previous })
            }
        };

        tx.commit()?;
        Ok(result)
    }

    /// Delete every active record whose id is not in the cycle's snapshot.
    ///
    /// An empty snapshot means "nothing currently listed" and deletes all
    /// active records; callers must only pass a set produced by a successful
    /// scrape. History rows are left orphaned on purpose.
    pub fn prune(&self, current_ids: &[String]) -> Result<usize> {
        let deleted = if current_ids.is_empty() {
            self.conn
                .execute("DELETE FROM tickets WHERE status = 'active'", [])?
        } else {
            let placeholders = vec!["?"; current_ids.len()].join(",");
            let sql = format!(
                "DELETE FROM tickets WHERE status = 'active' AND ticket_id NOT IN ({placeholders})"
            );
            self.conn.execute(&sql, params_from_iter(current_ids.iter()))?
        };
        Ok(deleted)
    }

    // ── Queries ───────────────────────────────────────────────────────────────

    pub fn is_empty(&self) -> Result<bool> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM tickets", [], |r| r.get(0))?;
        Ok(count == 0)
    }

    pub fn statistics(&self) -> Result<Statistics> {
        let mut stmt = self
            .conn
            .prepare("SELECT status, COUNT(*) FROM tickets GROUP BY status")?;
        let by_status = stmt
            .query_map([], |r| Ok((r.get(0)?, r.get(1)?)))?
            .collect::<rusqlite::Result<Vec<(String, i64)>>>()?;

        let mut stmt = self.conn.prepare(
            "SELECT event_name, COUNT(*) AS count FROM tickets \
             WHERE status = 'active' GROUP BY event_name ORDER BY count DESC",
        )?;
        let active_by_event = stmt
            .query_map([], |r| Ok((r.get(0)?, r.get(1)?)))?
            .collect::<rusqlite::Result<Vec<(String, i64)>>>()?;

        Ok(Statistics { by_status, active_by_event })
    }

    /// Full price ledger for one ticket, oldest first.
    pub fn price_history(&self, ticket_id: &str) -> Result<Vec<PriceHistoryEntry>> {
        let mut stmt = self.conn.prepare(
            "SELECT price, recorded_at FROM price_history \
             WHERE ticket_id = ?1 ORDER BY recorded_at, id",
        )?;
        let entries = stmt
            .query_map(params![ticket_id], |r| {
                Ok((r.get::<_, String>(0)?, r.get::<_, String>(1)?))
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?
            .into_iter()
            .map(|(price, recorded_at)| PriceHistoryEntry {
                price,
                recorded_at: parse_timestamp(&recorded_at),
            })
            .collect();
        Ok(entries)
    }

    /// Records whose current state has not been delivered yet, newest first.
    pub fn unposted(&self, status: Option<TicketStatus>) -> Result<Vec<TicketRecord>> {
        let sql = match status {
            Some(_) => format!(
                "SELECT {TICKET_COLUMNS} FROM tickets \
                 WHERE posted = 0 AND status = ?1 ORDER BY created_at DESC"
            ),
            None => format!(
                "SELECT {TICKET_COLUMNS} FROM tickets WHERE posted = 0 ORDER BY created_at DESC"
            ),
        };
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = match status {
            Some(s) => stmt.query_map(params![s.as_str()], row_to_record)?,
            None => stmt.query_map([], row_to_record)?,
        };
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    /// Mark the given ids as delivered. Batch and idempotent; ids that do not
    /// exist are simply not counted.
    pub fn mark_posted(&self, ticket_ids: &[String]) -> Result<usize> {
        if ticket_ids.is_empty() {
            return Ok(0);
        }
        let now = now_string(Utc::now());
        let placeholders = (1..=ticket_ids.len())
            .map(|i| format!("?{i}"))
            .collect::<Vec<_>>()
            .join(",");
        let sql = format!(
            "UPDATE tickets SET posted = 1, updated_at = ?{} WHERE ticket_id IN ({placeholders})",
            ticket_ids.len() + 1
        );
        let mut values: Vec<&str> = ticket_ids.iter().map(String::as_str).collect();
        values.push(&now);
        let updated = self.conn.execute(&sql, params_from_iter(values))?;
        Ok(updated)
    }

    /// Serialize every record (optionally filtered by status) plus its price
    /// history into the export envelope.
    pub fn dump(&self, status: Option<TicketStatus>, db_path: &str) -> Result<DumpExport> {
        let sql = match status {
            Some(_) => format!(
                "SELECT {TICKET_COLUMNS} FROM tickets WHERE status = ?1 ORDER BY first_seen DESC"
            ),
            None => format!("SELECT {TICKET_COLUMNS} FROM tickets ORDER BY first_seen DESC"),
        };
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = match status {
            Some(s) => stmt.query_map(params![s.as_str()], row_to_record)?,
            None => stmt.query_map([], row_to_record)?,
        };
        let records = rows.collect::<rusqlite::Result<Vec<_>>>()?;

        let mut tickets = Vec::with_capacity(records.len());
        for record in records {
            let price_history = self.price_history(&record.ticket_id)?;
            tickets.push(DumpTicket { record, price_history });
        }

        Ok(DumpExport {
            export_timestamp: Utc::now(),
            total_tickets: tickets.len(),
            status_filter: status.map(|s| s.as_str().to_string()),
            database_path: db_path.to_string(),
            tickets,
        })
    }

    /// Empty both tables, keeping the schema.
    pub fn clear(&self) -> Result<()> {
        self.conn.execute("DELETE FROM price_history", [])?;
        self.conn.execute("DELETE FROM tickets", [])?;
        info!("Database cleared");
        Ok(())
    }
}

fn row_to_record(row: &rusqlite::Row) -> rusqlite::Result<TicketRecord> {
    let status: String = row.get(16)?;
    Ok(TicketRecord {
        ticket_id: row.get(0)?,
        title: row.get(1)?,
        event_name: row.get(2)?,
        date: row.get(3)?,
        time: row.get(4)?,
        venue: row.get(5)?,
        location: row.get(6)?,
        price: row.get(7)?,
        quantity: row.get(8)?,
        seat_info: row.get(9)?,
        description: row.get(10)?,
        days_remaining: row.get(11)?,
        is_instant_buy: row.get(12)?,
        url: row.get(13)?,
        first_seen: parse_timestamp(&row.get::<_, String>(14)?),
        last_seen: parse_timestamp(&row.get::<_, String>(15)?),
        status: status.parse().unwrap_or(TicketStatus::Active),
        posted: row.get(17)?,
        created_at: parse_timestamp(&row.get::<_, String>(18)?),
        updated_at: parse_timestamp(&row.get::<_, String>(19)?),
    })
}

// ── Export shapes ─────────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
pub struct Statistics {
    pub by_status: Vec<(String, i64)>,
    pub active_by_event: Vec<(String, i64)>,
}

#[derive(Debug, Serialize)]
pub struct DumpTicket {
    #[serde(flatten)]
    pub record: TicketRecord,
    pub price_history: Vec<PriceHistoryEntry>,
}

#[derive(Debug, Serialize)]
pub struct DumpExport {
    pub export_timestamp: DateTime<Utc>,
    pub total_tickets: usize,
    pub status_filter: Option<String>,
    pub database_path: String,
    pub tickets: Vec<DumpTicket>,
}

// ── Price comparison ──────────────────────────────────────────────────────────

/// Numeric value of a currency string: separators and unit stripped.
fn parse_price_value(price: &str) -> Option<i64> {
    price.replace(',', "").replace('円', "").trim().parse().ok()
}

/// Render the current price against the prior history entry.
///
/// The prior price is the second-to-last ledger entry (the last one is the
/// current price). Parse failures degrade to a plain current/previous string
/// with no arithmetic delta.
pub fn format_price_change(
    current_price: &str,
    history: &[PriceHistoryEntry],
) -> (String, PriceDirection) {
    if history.len() <= 1 {
        return (current_price.to_string(), PriceDirection::Unchanged);
    }

    let previous = &history[history.len() - 2].price;
    if previous == current_price {
        return (current_price.to_string(), PriceDirection::Unchanged);
    }

    match (parse_price_value(current_price), parse_price_value(previous)) {
        (Some(cur), Some(prev)) if cur > prev => (
            format!(
                "{current_price} 📈 (+{}円)\n~~{previous}~~",
                utils::fmt_number(cur - prev)
            ),
            PriceDirection::Increase,
        ),
        (Some(cur), Some(prev)) if cur < prev => (
            format!(
                "{current_price} 📉 (-{}円)\n~~{previous}~~",
                utils::fmt_number(prev - cur)
            ),
            PriceDirection::Decrease,
        ),
        (Some(_), Some(_)) => (current_price.to_string(), PriceDirection::Unchanged),
        _ => (
            format!("{current_price}\n前回: {previous}"),
            PriceDirection::Unchanged,
        ),
    }
}

// ── Tests ────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn repo() -> Repository {
        let repo = Repository::open_in_memory().unwrap();
        repo.run_migrations().unwrap();
        repo
    }

    fn candidate(id: &str, price: &str) -> CandidateTicket {
        CandidateTicket {
            ticket_id: id.to_string(),
            event_name: format!("event-{id}"),
            price: price.to_string(),
            url: format!("https://ticketjam.jp/ticket/live_domestic/{id}"),
            description: "desc".to_string(),
            ..CandidateTicket::default()
        }
    }

    fn history(prices: &[&str]) -> Vec<PriceHistoryEntry> {
        prices
            .iter()
            .map(|p| PriceHistoryEntry {
                price: p.to_string(),
                recorded_at: Utc::now(),
            })
            .collect()
    }

    #[test]
    fn test_insert_then_touch_is_idempotent() {
        let repo = repo();
        let cand = candidate("a-1", "1,000円");

        let (is_new, action) = repo.upsert(&cand).unwrap();
        assert!(is_new);
        assert_eq!(action, UpsertAction::Inserted);
        assert_eq!(repo.price_history("a-1").unwrap().len(), 1);

        let (is_new, action) = repo.upsert(&cand).unwrap();
        assert!(!is_new);
        assert_eq!(action, UpsertAction::Touched);
        // No new history row, posted untouched
        assert_eq!(repo.price_history("a-1").unwrap().len(), 1);
        assert_eq!(repo.unposted(None).unwrap().len(), 1);
    }

    #[test]
    fn test_price_change_appends_history_and_resets_posted() {
        let repo = repo();
        repo.upsert(&candidate("x", "1,000円")).unwrap();
        repo.mark_posted(&["x".to_string()]).unwrap();
        assert!(repo.unposted(None).unwrap().is_empty());

        let (is_new, action) = repo.upsert(&candidate("x", "1,200円")).unwrap();
        assert!(!is_new);
        assert_eq!(
            action,
            UpsertAction::PriceChanged { previous: "1,000円".to_string() }
        );

        let history = repo.price_history("x").unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[1].price, "1,200円");

        let unposted = repo.unposted(None).unwrap();
        assert_eq!(unposted.len(), 1);
        assert!(!unposted[0].posted);
        assert_eq!(unposted[0].price, "1,200円");
    }

    #[test]
    fn test_prune_deletes_only_missing_actives() {
        let repo = repo();
        for id in ["A", "B", "C"] {
            repo.upsert(&candidate(id, "1,000円")).unwrap();
        }

        let snapshot = vec!["A".to_string(), "C".to_string()];
        assert_eq!(repo.prune(&snapshot).unwrap(), 1);

        let remaining: Vec<String> = repo
            .unposted(None)
            .unwrap()
            .into_iter()
            .map(|t| t.ticket_id)
            .collect();
        assert!(remaining.contains(&"A".to_string()));
        assert!(remaining.contains(&"C".to_string()));
        assert!(!remaining.contains(&"B".to_string()));
    }

    #[test]
    fn test_prune_orphans_history_of_delisted_tickets() {
        let repo = repo();
        repo.upsert(&candidate("gone", "1,000円")).unwrap();
        repo.upsert(&candidate("gone", "1,200円")).unwrap();
        repo.upsert(&candidate("stays", "2,000円")).unwrap();

        // Deleting a ticket that has accumulated history must succeed and
        // leave the ledger rows behind.
        assert_eq!(repo.prune(&["stays".to_string()]).unwrap(), 1);
        let orphaned = repo.price_history("gone").unwrap();
        assert_eq!(orphaned.len(), 2);
        assert_eq!(orphaned[1].price, "1,200円");
    }

    #[test]
    fn test_prune_empty_snapshot_deletes_all_actives() {
        let repo = repo();
        repo.upsert(&candidate("A", "1,000円")).unwrap();
        repo.upsert(&candidate("B", "2,000円")).unwrap();

        assert_eq!(repo.prune(&[]).unwrap(), 2);
        assert!(repo.is_empty().unwrap());
        // History rows are orphaned, not removed
        assert_eq!(repo.price_history("A").unwrap().len(), 1);
    }

    #[test]
    fn test_mark_posted_is_batch_and_idempotent() {
        let repo = repo();
        repo.upsert(&candidate("A", "1,000円")).unwrap();
        repo.upsert(&candidate("B", "2,000円")).unwrap();

        let ids = vec!["A".to_string(), "B".to_string(), "ghost".to_string()];
        assert_eq!(repo.mark_posted(&ids).unwrap(), 2);
        assert_eq!(repo.mark_posted(&ids).unwrap(), 2);
        assert!(repo.unposted(None).unwrap().is_empty());
        assert_eq!(repo.mark_posted(&[]).unwrap(), 0);
    }

    #[test]
    fn test_unposted_status_filter() {
        let repo = repo();
        repo.upsert(&candidate("A", "1,000円")).unwrap();
        assert_eq!(repo.unposted(Some(TicketStatus::Active)).unwrap().len(), 1);
        assert!(repo.unposted(Some(TicketStatus::Sold)).unwrap().is_empty());
    }

    #[test]
    fn test_statistics_groups_by_event() {
        let repo = repo();
        let mut a = candidate("A", "1,000円");
        a.event_name = "公演X".to_string();
        let mut b = candidate("B", "2,000円");
        b.event_name = "公演X".to_string();
        let mut c = candidate("C", "3,000円");
        c.event_name = "公演Y".to_string();
        for cand in [&a, &b, &c] {
            repo.upsert(cand).unwrap();
        }

        let stats = repo.statistics().unwrap();
        assert_eq!(stats.by_status, vec![("active".to_string(), 3)]);
        assert_eq!(stats.active_by_event[0], ("公演X".to_string(), 2));
        assert_eq!(stats.active_by_event[1], ("公演Y".to_string(), 1));
    }

    #[test]
    fn test_dump_envelope() {
        let repo = repo();
        repo.upsert(&candidate("A", "1,000円")).unwrap();
        repo.upsert(&candidate("A", "1,200円")).unwrap();

        let export = repo.dump(None, "test.db").unwrap();
        assert_eq!(export.total_tickets, 1);
        assert_eq!(export.status_filter, None);
        assert_eq!(export.tickets[0].price_history.len(), 2);

        let json = serde_json::to_value(&export).unwrap();
        assert_eq!(json["tickets"][0]["ticket_id"], "A");
        assert_eq!(json["tickets"][0]["price"], "1,200円");
    }

    #[test]
    fn test_clear_keeps_schema() {
        let repo = repo();
        repo.upsert(&candidate("A", "1,000円")).unwrap();
        repo.clear().unwrap();
        assert!(repo.is_empty().unwrap());
        assert!(repo.price_history("A").unwrap().is_empty());
        // Still usable afterwards
        repo.upsert(&candidate("B", "2,000円")).unwrap();
        assert!(!repo.is_empty().unwrap());
    }

    #[test]
    fn test_delete_store_removes_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("t.db");
        {
            let repo = Repository::open(&path).unwrap();
            repo.run_migrations().unwrap();
        }
        assert!(path.exists());
        assert!(Repository::delete_store(&path).unwrap());
        assert!(!path.exists());
        assert!(!Repository::delete_store(&path).unwrap());
    }

    #[test]
    fn test_format_price_change_directions() {
        let (text, dir) = format_price_change("1,500円", &history(&["1,000円", "1,500円"]));
        assert_eq!(dir, PriceDirection::Increase);
        assert!(text.contains("+500円"));
        assert!(text.contains("~~1,000円~~"));

        let (text, dir) = format_price_change("1,000円", &history(&["1,500円", "1,000円"]));
        assert_eq!(dir, PriceDirection::Decrease);
        assert!(text.contains("-500円"));

        let (text, dir) = format_price_change("1,000円", &history(&["1,000円"]));
        assert_eq!(dir, PriceDirection::Unchanged);
        assert_eq!(text, "1,000円");
    }

    #[test]
    fn test_format_price_change_parse_failure_degrades() {
        let (text, dir) = format_price_change("応相談", &history(&["1,000円", "応相談"]));
        assert_eq!(dir, PriceDirection::Unchanged);
        assert_eq!(text, "応相談\n前回: 1,000円");
    }
}
