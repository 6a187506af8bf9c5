//! Ledger XML normalization
//!
//! Tally's XML export is only loosely structured: namespace declarations
//! come and go between versions, balance values hide under half a dozen tag
//! names, and sign conventions ride on element attributes. Normalization
//! walks a fixed sequence of repair and fallback steps, each tolerant of
//! failure, and emits canonical [`AccountRecord`]s. A failure in one group's
//! document never propagates; the group simply yields no records.

use chrono::Utc;
use once_cell::sync::OnceCell;
use regex::Regex;
use std::path::Path;

use crate::currency::parse_currency;
use crate::types::{AccountRecord, AccountType};
use crate::xml::{parse_document, Element};

/// Resolved balances at or below this magnitude are dropped entirely.
pub const BALANCE_EPSILON: f64 = 0.01;

/// Balance tag candidates, consulted in priority order.
const BALANCE_TAGS: [&str; 8] = [
    "CLOSINGBALANCE",
    "CLBALANCE",
    "BALANCE",
    "AMOUNT",
    "BALANCEAMOUNT",
    "DRCRBALANCE",
    "OPENINGBALANCE",
    "LEDGERBALANCE",
];

/// Normalize one group's raw XML response into canonical account records.
///
/// Steps, in order: default-namespace repair, diagnostic dump, parse with a
/// prefix-collapsing retry, `LEDGER` discovery, then per-entry field
/// resolution and the epsilon filter. Never panics, never returns an error;
/// anything unrecoverable is logged and yields an empty result.
pub fn normalize(raw_xml: &str, group_name: &str, dump_dir: &Path) -> Vec<AccountRecord> {
    let cleaned = strip_default_namespace(raw_xml);

    dump_cleaned_xml(&cleaned, group_name, dump_dir);

    let root = match parse_document(&cleaned) {
        Ok(root) => root,
        Err(first) => {
            // Second chance: collapse prefixed tag names into plain
            // identifiers and retry once.
            let rewritten = collapse_tag_prefixes(raw_xml);
            match parse_document(&rewritten) {
                Ok(root) => {
                    log::debug!(
                        "prefix rewrite recovered the {} document after: {}",
                        group_name,
                        first
                    );
                    root
                }
                Err(second) => {
                    log::error!(
                        "XML parsing error for {}: {} (retry after prefix rewrite: {}) - raw XML: {}",
                        group_name,
                        first,
                        second,
                        excerpt(raw_xml, 1000)
                    );
                    return Vec::new();
                }
            }
        }
    };

    let ledgers: Vec<&Element> = root.descendants().filter(|e| e.tag == "LEDGER").collect();
    log::info!("found {} LEDGER elements for {}", ledgers.len(), group_name);
    if ledgers.is_empty() {
        log::warn!("no LEDGER elements in response for {}", group_name);
        return Vec::new();
    }

    let account_type = AccountType::from_group(group_name);
    let extracted_at = Utc::now();
    let mut records = Vec::new();

    for ledger in ledgers {
        let name = resolve_name(ledger);
        log::debug!("processing ledger: {}", name);

        let signed_balance = resolve_balance(ledger, &name);
        let parent = resolve_parent(ledger, group_name);
        let due_date = resolve_due_date(ledger);

        log::debug!(
            "parsed {}: balance {}, parent {}",
            name,
            signed_balance,
            parent
        );

        if signed_balance.abs() > BALANCE_EPSILON {
            records.push(AccountRecord {
                name,
                account_type,
                balance: signed_balance.abs(),
                due_date,
                parent_group: parent,
                last_updated: extracted_at,
            });
        }
    }

    log::info!("extracted {} accounts for {}", records.len(), group_name);
    records
}

// ==================== Repair Steps ====================

/// Remove the first default-namespace declaration from the raw document.
/// Some Tally versions emit one on the root element, some do not.
fn strip_default_namespace(raw_xml: &str) -> String {
    static XMLNS: OnceCell<Regex> = OnceCell::new();
    let xmlns = XMLNS.get_or_init(|| Regex::new(r#"\sxmlns(?::\w+)?="[^"]+""#).unwrap());
    xmlns.replacen(raw_xml, 1, "").into_owned()
}

/// Rewrite `<prefix:tag>` style names into `<prefix_tag>` across the whole
/// document, collapsing namespace prefixes into plain identifiers.
fn collapse_tag_prefixes(raw_xml: &str) -> String {
    static PREFIXED: OnceCell<Regex> = OnceCell::new();
    let prefixed = PREFIXED.get_or_init(|| Regex::new(r"<([^>]+):([^>]+)>").unwrap());
    prefixed.replace_all(raw_xml, "<${1}_${2}>").into_owned()
}

/// Persist the cleaned document for offline diagnosis. Best-effort only.
fn dump_cleaned_xml(cleaned: &str, group_name: &str, dump_dir: &Path) {
    let file_name = format!(
        "tally_response_{}.xml",
        group_name.to_lowercase().replace(' ', "_")
    );
    let path = dump_dir.join(file_name);
    match std::fs::write(&path, cleaned) {
        Ok(()) => log::info!("raw XML saved for {}", group_name),
        Err(e) => log::warn!("could not save raw XML for {}: {}", group_name, e),
    }
}

// ==================== Field Resolution ====================

/// First `NAME` descendant; if absent or empty, the first non-empty `NAME`
/// anywhere in the subtree; otherwise a placeholder from the structural hash.
fn resolve_name(ledger: &Element) -> String {
    let direct = ledger
        .find("NAME")
        .map(|e| e.text.trim())
        .filter(|t| !t.is_empty());

    let name = direct.or_else(|| {
        ledger
            .descendants()
            .filter(|e| e.tag == "NAME")
            .map(|e| e.text.trim())
            .find(|t| !t.is_empty())
    });

    match name {
        Some(name) => name.to_string(),
        None => {
            let placeholder = format!("Unnamed_{}", ledger.fingerprint());
            log::warn!("unnamed ledger detected: {}", placeholder);
            placeholder
        }
    }
}

/// Locate the balance element and resolve its signed numeric value.
///
/// Tag candidates are tried in priority order as descendant searches; if none
/// matches, the entry's subtree is scanned in document order for any
/// candidate tag. `DR`/`CR` attributes on the chosen element override the
/// parsed sign; absent both, the parsed sign stands.
fn resolve_balance(ledger: &Element, name: &str) -> f64 {
    let balance_elem = BALANCE_TAGS
        .iter()
        .find_map(|tag| ledger.find(tag))
        .or_else(|| {
            ledger
                .descendants()
                .find(|e| BALANCE_TAGS.contains(&e.tag.as_str()))
        });

    let Some(elem) = balance_elem else {
        log::warn!("no balance tag found for {}", name);
        return 0.0;
    };

    let is_debit = attr_is_yes(elem, "DR");
    let is_credit = attr_is_yes(elem, "CR");

    let mut balance = parse_currency(&elem.text);
    if is_debit {
        balance = balance.abs();
    } else if is_credit {
        balance = -balance.abs();
    }

    log::debug!(
        "found balance tag {} with value {:?}, adjusted: {}",
        elem.tag,
        elem.text,
        balance
    );
    balance
}

fn attr_is_yes(elem: &Element, name: &str) -> bool {
    elem.attr(name)
        .map(|v| v.eq_ignore_ascii_case("yes"))
        .unwrap_or(false)
}

fn resolve_parent(ledger: &Element, group_name: &str) -> String {
    ledger
        .child("PARENT")
        .map(|e| e.text.trim())
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| group_name.to_string())
}

fn resolve_due_date(ledger: &Element) -> String {
    ["BILLDATE", "DUEDATE"]
        .iter()
        .find_map(|tag| ledger.child(tag))
        .map(|e| e.text.trim().to_string())
        .unwrap_or_default()
}

fn excerpt(text: &str, limit: usize) -> String {
    text.chars().take(limit).collect()
}

// ==================== Tests ====================
