//! Free-text currency amount parsing
//!
//! Tally balance fields arrive as display text: currency symbols, thousands
//! separators, embedded whitespace and "Dr"/"Cr" suffixes are all common.
//! `parse_currency` is total over arbitrary input; anything unusable
//! degrades to 0.0 with a warning rather than an error.

use once_cell::sync::OnceCell;
use regex::Regex;

/// Parse a raw currency string into a signed value.
///
/// The debit/credit suffix is stripped here but NOT interpreted; sign policy
/// is applied by the normalizer from the balance element's attributes.
pub fn parse_currency(text: &str) -> f64 {
    if text.trim().is_empty() {
        return 0.0;
    }

    static SYMBOLS: OnceCell<Regex> = OnceCell::new();
    let symbols = SYMBOLS.get_or_init(|| Regex::new(r"[₹,\s]").unwrap());

    static DR_CR: OnceCell<Regex> = OnceCell::new();
    let dr_cr = DR_CR.get_or_init(|| Regex::new(r"(?i)\s*(dr|cr)\s*").unwrap());

    static NUMBER: OnceCell<Regex> = OnceCell::new();
    let number = NUMBER.get_or_init(|| Regex::new(r"-?\d+\.?\d*").unwrap());

    let cleaned = symbols.replace_all(text, "");
    let cleaned = dr_cr.replace_all(&cleaned, "");

    let value = match number.find(&cleaned) {
        Some(m) => m.as_str().parse::<f64>().ok(),
        None => cleaned.parse::<f64>().ok(),
    };

    match value {
        Some(v) => {
            log::debug!("parsed currency {:?} to {}", text, v);
            v
        }
        None => {
            log::warn!("invalid currency format: {:?}", text);
            0.0
        }
    }
}
