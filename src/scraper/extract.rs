//! Heuristic listing extraction.
//!
//! Turns one fetched document into zero or more validated candidate tickets.
//! Containers are found structurally (price pattern + plausible size +
//! multiple lines); field extraction is an ordered list of named matchers,
//! each a pure function over the container text, so every heuristic can be
//! tested on its own.

use crate::models::{ticket_id_from_url, CandidateTicket};
use once_cell::sync::Lazy;
use regex_lite::Regex;
use scraper::{ElementRef, Html, Selector};
use std::collections::HashSet;
use tracing::{debug, info};
use url::Url;

/// Marker token for listings that can be bought outright.
const INSTANT_BUY_MARKER: &str = "即決";

/// Description keeps the head of the container text only.
const DESCRIPTION_MAX_CHARS: usize = 500;

/// How far a price-bearing element may walk up looking for its container.
const MAX_ANCESTOR_HOPS: usize = 5;

// ── Field matchers ───────────────────────────────────────────────────────────

static CONTAINER_PRICE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\d{1,3}(?:,\d{3})*\s*円").expect("price pattern"));

/// Progressively looser currency patterns, tried in priority order.
static PRICE_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    vec![
        Regex::new(r"(\d{1,3}(?:,\d{3})*)\s*円(?:/枚)?").expect("price pattern"),
        Regex::new(r"(\d{1,3}(?:,\d{3})*)\s+円").expect("price pattern"),
        Regex::new(r"(\d{1,3}(?:,\d{3})*)\s*円").expect("price pattern"),
    ]
});

static QUANTITY_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(\d+)\s*枚").expect("quantity pattern"));

static DATE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(\d{2,4})[/\-年](\d{1,2})[/\-月](\d{1,2})").expect("date pattern"));

static TIME_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(\d{1,2}):(\d{2})").expect("time pattern"));

static DAYS_REMAINING_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"残り\s*(\d+)\s*日").expect("days pattern"));

/// `2025/12/23(火) 19:00 東京 ガーデンシアター` → (東京, ガーデンシアター)
static VENUE_WITH_WEEKDAY_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\d{4}/\d{1,2}/\d{1,2}\([^)]+\)\s+\d{1,2}:\d{2}\s+(\S+)\s+(.+)")
        .expect("venue pattern")
});

/// Same shape without the weekday parenthetical.
static VENUE_PLAIN_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\d{4}/\d{1,2}/\d{1,2}\s+\d{1,2}:\d{2}\s+(\S+)\s+(.+)").expect("venue pattern")
});

/// First matching currency amount, normalised to `<amount>円` with the
/// source's thousands separators preserved.
pub(crate) fn match_price(text: &str) -> Option<String> {
    PRICE_PATTERNS
        .iter()
        .find_map(|re| re.captures(text))
        .and_then(|caps| caps.get(1).map(|m| format!("{}円", m.as_str())))
}

pub(crate) fn match_quantity(line: &str) -> Option<String> {
    let caps = QUANTITY_RE.captures(line)?;
    Some(format!("{}枚", caps.get(1)?.as_str()))
}

/// `Y[/−年]M[/−月]D`, two-digit years promoted to `20YY`, zero-padded to
/// `YYYY/MM/DD`.
pub(crate) fn match_date(line: &str) -> Option<String> {
    let caps = DATE_RE.captures(line)?;
    let year = caps.get(1)?.as_str();
    let month = caps.get(2)?.as_str();
    let day = caps.get(3)?.as_str();
    let year = if year.len() == 2 {
        format!("20{year}")
    } else {
        year.to_string()
    };
    Some(format!("{year}/{month:0>2}/{day:0>2}"))
}

pub(crate) fn match_time(line: &str) -> Option<String> {
    let caps = TIME_RE.captures(line)?;
    Some(format!("{}:{}", caps.get(1)?.as_str(), caps.get(2)?.as_str()))
}

pub(crate) fn match_days_remaining(line: &str) -> Option<String> {
    let caps = DAYS_REMAINING_RE.captures(line)?;
    Some(format!("残り{}日", caps.get(1)?.as_str()))
}

/// First line among the leading five that is long enough to be a heading and
/// does not itself look like a price, time or quantity line.
pub(crate) fn match_event_name(lines: &[&str]) -> Option<String> {
    lines
        .iter()
        .take(5)
        .find(|line| {
            line.len() > 10
                && !CONTAINER_PRICE_RE.is_match(line)
                && !TIME_RE.is_match(line)
                && !QUANTITY_RE.is_match(line)
        })
        .map(|line| line.to_string())
}

/// `(location, venue)` from a combined date/time line, tried first with the
/// weekday parenthetical, then without.
pub(crate) fn match_venue_location(line: &str) -> Option<(String, String)> {
    [&*VENUE_WITH_WEEKDAY_RE, &*VENUE_PLAIN_RE]
        .iter()
        .find_map(|re| re.captures(line))
        .and_then(|caps| {
            let location = caps.get(1)?.as_str().trim().to_string();
            let venue = caps.get(2)?.as_str().trim().to_string();
            Some((location, venue))
        })
}

// ── Container detection ──────────────────────────────────────────────────────

/// Container plausibility: carries a price, is neither a bare price tag nor a
/// whole page, and has some line/token structure to it.
fn is_plausible_container(text: &str) -> bool {
    let has_price = CONTAINER_PRICE_RE.is_match(text);
    // Character count, not bytes: CJK listings are 3 bytes per char and a
    // description-heavy container would blow a byte-based upper bound.
    let chars = text.chars().count();
    let size_ok = chars > 50 && chars < 5000;
    let has_structure = text.lines().count() > 3 || text.split_whitespace().count() > 10;
    has_price && size_ok && has_structure
}

/// All text under the element, one trimmed line per text node.
fn element_text(el: ElementRef) -> String {
    el.text()
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

/// Text belonging directly to the element, child elements excluded.
fn own_text(el: ElementRef) -> String {
    el.children()
        .filter_map(|child| child.value().as_text())
        .map(|t| t.trim())
        .filter(|t| !t.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

fn find_containers(doc: &Html) -> Vec<ElementRef<'_>> {
    let Ok(block_sel) = Selector::parse("div, article, section, li") else {
        return Vec::new();
    };

    let mut containers: Vec<ElementRef> = doc
        .select(&block_sel)
        .filter(|el| is_plausible_container(&element_text(*el)))
        .collect();

    if !containers.is_empty() {
        return containers;
    }

    // Fallback: start from every element whose own text carries a price and
    // walk up until something container-shaped appears.
    debug!("no block container matched, falling back to price-element walk");
    let Ok(wide_sel) = Selector::parse("div, span, p, article, section, li") else {
        return containers;
    };

    for el in doc.select(&wide_sel) {
        if !CONTAINER_PRICE_RE.is_match(&own_text(el)) {
            continue;
        }

        let mut current = el;
        for _ in 0..=MAX_ANCESTOR_HOPS {
            if current.value().name() == "body" {
                break;
            }
            if is_plausible_container(&element_text(current)) {
                containers.push(current);
                break;
            }
            let Some(parent) = current.parent().and_then(ElementRef::wrap) else {
                break;
            };
            current = parent;
        }
    }

    containers
}

// ── Link resolution ──────────────────────────────────────────────────────────

fn resolve_href(base: Option<&Url>, href: &str) -> String {
    match base {
        Some(base) => base
            .join(href)
            .map(|u| u.to_string())
            .unwrap_or_else(|_| href.to_string()),
        None => href.to_string(),
    }
}

/// The element's own link if it is one, else the nearest ancestor link, else
/// the first descendant link pointing at a ticket path.
fn find_listing_url(el: ElementRef, base: Option<&Url>) -> Option<String> {
    if el.value().name() == "a" {
        if let Some(href) = el.value().attr("href") {
            return Some(resolve_href(base, href));
        }
    }

    for ancestor in el.ancestors() {
        let Some(anc) = ElementRef::wrap(ancestor) else {
            continue;
        };
        if anc.value().name() == "body" {
            break;
        }
        if anc.value().name() == "a" {
            if let Some(href) = anc.value().attr("href") {
                return Some(resolve_href(base, href));
            }
        }
    }

    let link_sel = Selector::parse("a[href]").ok()?;
    el.select(&link_sel)
        .filter_map(|link| link.value().attr("href"))
        .find(|href| href.contains("/ticket/") || href.contains("/tickets/"))
        .map(|href| resolve_href(base, href))
}

// ── Candidate assembly ───────────────────────────────────────────────────────

fn extract_candidate(el: ElementRef, base: Option<&Url>) -> Option<CandidateTicket> {
    let full_text = element_text(el);
    let lines: Vec<&str> = full_text.lines().collect();

    let mut cand = CandidateTicket {
        url: find_listing_url(el, base).unwrap_or_default(),
        price: match_price(&full_text)?,
        ..CandidateTicket::default()
    };

    for line in &lines {
        if cand.quantity.is_empty() {
            if let Some(q) = match_quantity(line) {
                cand.quantity = q;
            }
        }
        if cand.date.is_empty() {
            if let Some(d) = match_date(line) {
                cand.date = d;
            }
        }
        if cand.time.is_empty() {
            if let Some(t) = match_time(line) {
                cand.time = t;
            }
        }
        if cand.days_remaining.is_empty() {
            if let Some(d) = match_days_remaining(line) {
                cand.days_remaining = d;
            }
        }
        if line.contains(INSTANT_BUY_MARKER) {
            cand.is_instant_buy = true;
        }
    }

    cand.event_name = match_event_name(&lines).unwrap_or_default();
    cand.title = cand.event_name.clone();

    for line in &lines {
        if let Some((location, venue)) = match_venue_location(line) {
            cand.location = location;
            cand.venue = venue;
            break;
        }
    }

    cand.description = full_text.chars().take(DESCRIPTION_MAX_CHARS).collect();

    // Identity is derived last, once the url is settled.
    cand.ticket_id = ticket_id_from_url(&cand.url);

    Some(cand)
}

/// A candidate is kept only when it has a price and something to identify the
/// event by.
pub(crate) fn validate_candidate(cand: &CandidateTicket) -> bool {
    !cand.price.is_empty() && (!cand.event_name.is_empty() || !cand.description.is_empty())
}

/// Extract every validated candidate from one fetched document.
///
/// Relative listing hrefs are resolved against `page_url`. Duplicate ids
/// collapse to the first occurrence in document order; a container that fails
/// extraction is skipped, never fatal.
pub fn extract(html: &str, page_url: &str) -> Vec<CandidateTicket> {
    let doc = Html::parse_document(html);
    let base = Url::parse(page_url).ok();

    let containers = find_containers(&doc);
    debug!("{} candidate containers", containers.len());

    let mut seen_ids = HashSet::new();
    let mut candidates = Vec::new();

    for container in containers {
        let Some(cand) = extract_candidate(container, base.as_ref()) else {
            continue;
        };
        if !validate_candidate(&cand) {
            debug!(ticket_id = %cand.ticket_id, "dropping incomplete candidate");
            continue;
        }
        if seen_ids.insert(cand.ticket_id.clone()) {
            candidates.push(cand);
        }
    }

    info!("Found {} unique tickets", candidates.len());
    candidates
}

// ── Tests ────────────────────────────────────────────────────────────────────
