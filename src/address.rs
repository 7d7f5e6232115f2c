//! Lexical validation for wallet addresses and space names
//!
//! This is the single gate in front of the transaction builder: no
//! destination string reaches a build unless it passed here first.

use once_cell::sync::Lazy;
use regex::Regex;

/// Longest space name the ledger accepts
pub const MAX_SPACE_NAME_LEN: usize = 256;

static ADDRESS_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^0x[0-9a-fA-F]{40}$").expect("static address pattern"));

static SPACE_ID_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[a-z0-9]+$").expect("static space pattern"));

static SPACE_STRIP_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[^a-z0-9]").expect("static strip pattern"));

/// Whether `s` is a well-formed external wallet address
///
/// Total over arbitrary input: never panics, `false` for empty or
/// malformed strings.
pub fn is_valid_address(s: &str) -> bool {
    ADDRESS_RE.is_match(s)
}

/// Whether `s` is already a canonical space name
pub fn is_valid_space_id(s: &str) -> bool {
    !s.is_empty() && s.len() <= MAX_SPACE_NAME_LEN && SPACE_ID_RE.is_match(s)
}

/// Reduce arbitrary user input to the canonical space-name form:
/// lowercased, non-alphanumerics stripped, truncated to the length cap
///
/// May return an empty string; callers decide whether that is an error.
pub fn normalize_space_id(s: &str) -> String {
    let lower = s.to_lowercase();
    let stripped = SPACE_STRIP_RE.replace_all(&lower, "");
    let mut out = stripped.into_owned();
    out.truncate(MAX_SPACE_NAME_LEN);
    out
}
