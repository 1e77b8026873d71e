//! MSISDN normalization for the push-payment gateway.
//!
//! The gateway only accepts international format without a leading `+`
//! (e.g. `254712345678`). Subscribers type numbers every other way, so
//! normalization is total: it always produces a candidate, and callers log
//! a warning when the candidate fails the plausibility check rather than
//! rejecting outright.

use regex::Regex;
use std::sync::OnceLock;

fn plausibility_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^\d{10,14}$").expect("valid MSISDN pattern"))
}

/// Normalize a subscriber-entered phone number to international format.
///
/// Rules, applied after stripping whitespace and a single leading `+`:
/// a leading `0` is replaced by the country prefix; a number already
/// bearing the prefix is left unchanged; anything else gets the prefix
/// prepended.
pub fn normalize_msisdn(raw: &str, country_prefix: &str) -> String {
    let cleaned: String = raw.chars().filter(|c| !c.is_whitespace()).collect();
    let cleaned = cleaned.strip_prefix('+').unwrap_or(&cleaned);

    if let Some(rest) = cleaned.strip_prefix('0') {
        return format!("{country_prefix}{rest}");
    }
    if cleaned.starts_with(country_prefix) {
        return cleaned.to_string();
    }
    format!("{country_prefix}{cleaned}")
}

/// Whether a normalized MSISDN looks deliverable: all digits, sane length,
/// bearing the expected country prefix.
pub fn is_plausible(msisdn: &str, country_prefix: &str) -> bool {
    plausibility_pattern().is_match(msisdn) && msisdn.starts_with(country_prefix)
}
