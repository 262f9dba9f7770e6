// 🧮 Status Calculator - start + duration → expiry + days remaining
// Calendar-month arithmetic (Jan 31 + 1 month = Feb 28/29) and date-only
// subtraction, so time of day never shifts the day count.

use crate::dates::DateNormalizer;
use crate::duration::parse_duration;
use crate::fields::{BasisKind, ResolvedFields};
use chrono::{DateTime, Months, NaiveDate};
use chrono_tz::Tz;
use serde::Serialize;
use std::fmt;

// ============================================================================
// EXPIRY BAND
// ============================================================================

/// Urgency classification of a days-remaining value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ExpiryBand {
    /// More than one day left
    Active { days_left: i64 },
    /// Exactly one day left: the only band that triggers a notification
    ExpiringTomorrow,
    ExpiresToday,
    Expired { days_ago: i64 },
}

impl ExpiryBand {
    pub fn from_days_remaining(days: i64) -> Self {
        match days {
            d if d > 1 => ExpiryBand::Active { days_left: d },
            1 => ExpiryBand::ExpiringTomorrow,
            0 => ExpiryBand::ExpiresToday,
            d => ExpiryBand::Expired { days_ago: -d },
        }
    }

    pub fn is_urgent(&self) -> bool {
        matches!(self, ExpiryBand::ExpiringTomorrow)
    }
}

impl fmt::Display for ExpiryBand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExpiryBand::Active { days_left } => write!(f, "✅ Active: {} days left", days_left),
            ExpiryBand::ExpiringTomorrow => write!(f, "⚠️ Remaining: 1 day (expires tomorrow)"),
            ExpiryBand::ExpiresToday => write!(f, "⚠️ Expires today"),
            ExpiryBand::Expired { days_ago: 1 } => write!(f, "❌ Expired 1 day ago"),
            ExpiryBand::Expired { days_ago } => write!(f, "❌ Expired {} days ago", days_ago),
        }
    }
}

// ============================================================================
// MEMBERSHIP STATUS
// ============================================================================

/// Derived per evaluation, never stored
#[derive(Debug, Clone, PartialEq)]
pub struct MembershipStatus {
    pub start: DateTime<Tz>,
    pub basis: BasisKind,
    pub duration_months: u32,
    pub expiry: DateTime<Tz>,
    pub days_remaining: i64,
}

impl MembershipStatus {
    pub fn band(&self) -> ExpiryBand {
        ExpiryBand::from_days_remaining(self.days_remaining)
    }

    pub fn start_date(&self) -> NaiveDate {
        self.start.date_naive()
    }

    pub fn expiry_date(&self) -> NaiveDate {
        self.expiry.date_naive()
    }
}

// ============================================================================
// STATUS CALCULATOR
// ============================================================================

#[derive(Debug, Clone, Copy, Default)]
pub struct StatusCalculator {
    normalizer: DateNormalizer,
}

impl StatusCalculator {
    pub fn new(normalizer: DateNormalizer) -> Self {
        StatusCalculator { normalizer }
    }

    /// Compute the status of one resolved record at `now`
    ///
    /// `None` when the record has no parseable start: an expected outcome,
    /// not an error.
    pub fn compute(&self, fields: &ResolvedFields, now: DateTime<Tz>) -> Option<MembershipStatus> {
        let basis = fields.start.as_ref()?;
        let duration_months = parse_duration(&fields.comment);
        let expiry = self.add_months(basis.instant, duration_months)?;

        Some(MembershipStatus {
            start: basis.instant,
            basis: basis.kind,
            duration_months,
            expiry,
            days_remaining: self.days_between(now, expiry),
        })
    }

    /// Calendar-month addition, day clamped to the target month's length
    pub fn add_months(&self, start: DateTime<Tz>, months: u32) -> Option<DateTime<Tz>> {
        let local = start
            .with_timezone(&self.normalizer.timezone())
            .naive_local()
            .checked_add_months(Months::new(months))?;

        self.normalizer.localize(local)
    }

    /// Whole days from `now`'s calendar date to `until`'s, in the configured zone
    pub fn days_between(&self, now: DateTime<Tz>, until: DateTime<Tz>) -> i64 {
        let tz = self.normalizer.timezone();
        let today = now.with_timezone(&tz).date_naive();
        let target = until.with_timezone(&tz).date_naive();

        (target - today).num_days()
    }
}

// ============================================================================
// TESTS
// ============================================================================
