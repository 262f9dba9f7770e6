// ⏳ Duration Extractor - free-text comment → months paid for
// Members write things like "Paid for 12 months membership" or "3mo" in
// the comment box. No hint means a single month.

use once_cell::sync::Lazy;
use regex::Regex;

/// Months assumed when the comment says nothing usable
pub const DEFAULT_MONTHS: u32 = 1;

/// Inclusive bounds every extracted duration is clamped to
pub const MIN_MONTHS: u32 = 1;
pub const MAX_MONTHS: u32 = 60;

/// Digits, optional whitespace, then a month unit as a whole word
static MONTHS_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(\d+)\s*(?:months|month|mth|mnt|mo)\b").expect("valid duration regex")
});

/// Extract the number of months from a comment
///
/// Only the first match counts. Numbers too large to represent clamp to
/// `MAX_MONTHS` like any other oversized value.
///
/// ```
/// use membership_tracker::duration::parse_duration;
///
/// assert_eq!(parse_duration("Paid for 12 months membership"), 12);
/// assert_eq!(parse_duration(""), 1);
/// ```
pub fn parse_duration(comment: &str) -> u32 {
    let Some(caps) = MONTHS_PATTERN.captures(comment) else {
        return DEFAULT_MONTHS;
    };

    caps[1]
        .parse::<u64>()
        .map(|months| months.clamp(MIN_MONTHS as u64, MAX_MONTHS as u64) as u32)
        .unwrap_or(MAX_MONTHS)
}
