//! Cleanup of recognized cell text.

use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    // Table borders are often read as |, -, _, l, I, J or brackets.
    static ref LEADING_BORDER_NOISE: Regex = Regex::new(r"^[|\-_lIJ\[\] ]+").unwrap();
    static ref TRAILING_BORDER_NOISE: Regex = Regex::new(r"[|\-_lIJ\[\] ]+$").unwrap();
    static ref WHITESPACE_RUN: Regex = Regex::new(r"\s+").unwrap();
}

/// Clean a recognized string.
///
/// Strips leading and trailing runs of border-noise characters, collapses
/// whitespace runs to one space and trims. Blank input yields an empty string.
pub fn clean(text: &str) -> String {
    let mut current = text.trim().to_string();

    // Stripping can expose new whitespace or noise at either end, so repeat
    // until stable to keep the function idempotent.
    loop {
        let stripped = LEADING_BORDER_NOISE.replace(&current, "");
        let stripped = TRAILING_BORDER_NOISE.replace(&stripped, "");
        let collapsed = WHITESPACE_RUN.replace_all(&stripped, " ");
        let next = collapsed.trim().to_string();

        if next == current {
            return next;
        }
        current = next;
    }
}
