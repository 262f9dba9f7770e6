// 📅 Date Normalizer - heterogeneous date text → zone-aware instant
// Form exports mix "payment month" values ("3/2025"), submission
// timestamps ("3/14/2025 10:22:51") and hand-typed dates. Everything that
// comes out of here is already tagged with the configured time zone.

use chrono::{DateTime, Datelike, Duration, NaiveDate, NaiveDateTime, TimeZone};
use chrono_tz::Tz;
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::warn;

/// "M/YYYY" or "MM/YYYY" with nothing else around it
static MONTH_YEAR: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(\d{1,2})/(\d{4})$").expect("valid month/year regex"));

/// "March 2025" / "Mar 2025"
static WRITTEN_MONTH_YEAR: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z]+\.? +\d{4}$").expect("valid written month/year regex"));

/// Earliest year accepted; `%Y` takes any digit count, so "1/5/25" would
/// otherwise land in year 25
const MIN_YEAR: i32 = 1000;

/// Naive date-time layouts, most common (Google Forms timestamp) first
///
/// Two-digit-year layouts come before their `%Y` twins (00-69 → 20xx).
const DATETIME_FORMATS: &[&str] = &[
    "%m/%d/%y %H:%M:%S",
    "%m/%d/%y %H:%M",
    "%m/%d/%Y %H:%M:%S",
    "%m/%d/%Y %H:%M",
    "%m/%d/%Y %I:%M:%S %p",
    "%m/%d/%Y %I:%M %p",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%dT%H:%M:%S%.f",
];

/// Naive date-only layouts
const DATE_FORMATS: &[&str] = &[
    "%m/%d/%y",
    "%m/%d/%Y",
    "%Y-%m-%d",
    "%Y/%m/%d",
    "%B %d, %Y",
    "%B %d %Y",
    "%d %B %Y",
    "%A, %B %d, %Y",
];

/// Offset-carrying layouts (converted into the configured zone)
const OFFSET_FORMATS: &[&str] = &["%Y-%m-%d %H:%M:%S %z", "%m/%d/%Y %H:%M:%S %z"];

// ============================================================================
// DATE NORMALIZER
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DateNormalizer {
    /// Zone attached to naive values and used for all calendar arithmetic
    tz: Tz,
}

impl DateNormalizer {
    pub fn new(tz: Tz) -> Self {
        DateNormalizer { tz }
    }

    pub fn timezone(&self) -> Tz {
        self.tz
    }

    /// Parse date-like text into an instant in the configured zone
    ///
    /// Returns `None` for empty input and for anything unparseable (the
    /// latter is logged). `None` means "start unknown", never an error.
    pub fn parse(&self, text: &str) -> Option<DateTime<Tz>> {
        let text = text.trim();
        if text.is_empty() {
            return None;
        }

        let parsed = self
            .parse_month_year(text)
            .or_else(|| self.parse_with_offset(text))
            .or_else(|| self.parse_naive(text))
            .filter(|instant| instant.year() >= MIN_YEAR);

        if parsed.is_none() {
            warn!(text = %text, "Could not parse date");
        }
        parsed
    }

    /// Midnight of `date` in the configured zone
    pub fn start_of_day(&self, date: NaiveDate) -> Option<DateTime<Tz>> {
        self.localize(date.and_hms_opt(0, 0, 0)?)
    }

    /// Attach the configured zone to a wall-clock value
    ///
    /// Ambiguous local times (DST fall-back) take the earlier instant;
    /// nonexistent ones (DST spring-forward gap) move one hour later.
    pub fn localize(&self, naive: NaiveDateTime) -> Option<DateTime<Tz>> {
        self.tz
            .from_local_datetime(&naive)
            .earliest()
            .or_else(|| self.tz.from_local_datetime(&(naive + Duration::hours(1))).earliest())
    }

    /// Month-only values: day 1 of that month, midnight
    fn parse_month_year(&self, text: &str) -> Option<DateTime<Tz>> {
        if let Some(caps) = MONTH_YEAR.captures(text) {
            let month: u32 = caps[1].parse().ok()?;
            let year: i32 = caps[2].parse().ok()?;
            return self.start_of_day(NaiveDate::from_ymd_opt(year, month, 1)?);
        }

        if WRITTEN_MONTH_YEAR.is_match(text) {
            let cleaned = text.replace('.', "");
            let (month, year) = cleaned.split_once(' ')?;
            // chrono knows "Sep" and "September" only
            let month = if month.eq_ignore_ascii_case("sept") { "Sep" } else { month };
            let date =
                NaiveDate::parse_from_str(&format!("1 {} {}", month, year.trim()), "%d %B %Y").ok()?;
            return self.start_of_day(date);
        }

        None
    }

    fn parse_with_offset(&self, text: &str) -> Option<DateTime<Tz>> {
        let fixed = DateTime::parse_from_rfc3339(text)
            .or_else(|_| DateTime::parse_from_rfc2822(text))
            .ok()
            .or_else(|| {
                OFFSET_FORMATS
                    .iter()
                    .find_map(|fmt| DateTime::parse_from_str(text, fmt).ok())
            })?;

        Some(fixed.with_timezone(&self.tz))
    }

    fn parse_naive(&self, text: &str) -> Option<DateTime<Tz>> {
        if let Some(naive) = DATETIME_FORMATS
            .iter()
            .find_map(|fmt| NaiveDateTime::parse_from_str(text, fmt).ok())
        {
            return self.localize(naive);
        }

        DATE_FORMATS
            .iter()
            .find_map(|fmt| NaiveDate::parse_from_str(text, fmt).ok())
            .and_then(|date| self.start_of_day(date))
    }
}

impl Default for DateNormalizer {
    fn default() -> Self {
        Self::new(Tz::UTC)
    }
}

// ============================================================================
// TESTS
// ============================================================================
