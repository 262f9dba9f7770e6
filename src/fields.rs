// 🔑 Record Field Resolver - canonical fields from inconsistent headers
// The payment form and the application form were edited independently over
// time, so every logical field has several possible column names.

use crate::dates::DateNormalizer;
use crate::record::Record;
use chrono::DateTime;
use chrono_tz::Tz;
use serde::Serialize;

// ============================================================================
// SYNONYM KEYS (ordered: first present, non-empty value wins)
// ============================================================================

pub const EMAIL_KEYS: &[&str] = &["Email Address", "Email"];
pub const HANDLE_KEYS: &[&str] = &["Telegram User Name", "Telegram Username"];
pub const NAME_KEYS: &[&str] = &[
    "Member Name",
    "Name",
    "Full Name",
    "Telegram User Name",
    "Telegram Username",
];
/// Explicit payment period, including the trailing-space header variant
pub const PAYMENT_PERIOD_KEYS: &[&str] = &[
    "Payment Month",
    "Payment Month ",
    "Payment Period",
    "Payment Period ",
];
pub const TIMESTAMP_KEYS: &[&str] = &["Timestamp"];
pub const COMMENT_KEYS: &[&str] = &["Any additional comments?", "Any additional comment?"];
pub const TIER_KEYS: &[&str] = &["Preferred Membership Tier", "Membership Tier"];

/// Display name when no name column is filled in
pub const UNKNOWN_NAME: &str = "Unknown member";

/// Placeholder for absent tier / handle
pub const PLACEHOLDER: &str = "-";

/// Normalized form used for identity comparison
pub fn identity_key(value: &str) -> String {
    value.trim().to_lowercase()
}

// ============================================================================
// START BASIS
// ============================================================================

/// Which column the start date came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum BasisKind {
    PaymentMonth,
    Timestamp,
}

impl BasisKind {
    /// Human-readable label for reports
    pub fn label(&self) -> &str {
        match self {
            BasisKind::PaymentMonth => "Payment Month",
            BasisKind::Timestamp => "Timestamp",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct StartBasis {
    pub instant: DateTime<Tz>,
    pub kind: BasisKind,
}

// ============================================================================
// RESOLVED FIELDS
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedFields {
    /// Trimmed, original casing (for display)
    pub email: Option<String>,
    pub handle: Option<String>,
    pub name: String,
    /// None = no candidate column parsed
    pub start: Option<StartBasis>,
    pub comment: String,
    pub tier: String,
}

impl ResolvedFields {
    /// Lower-cased email used to group records
    pub fn email_key(&self) -> Option<String> {
        self.email.as_deref().map(identity_key)
    }

    pub fn handle_key(&self) -> Option<String> {
        self.handle.as_deref().map(identity_key)
    }

    /// Case-insensitive exact match on email or handle
    ///
    /// `query_key` must already be normalized with [`identity_key`].
    pub fn matches(&self, query_key: &str) -> bool {
        self.email_key().as_deref() == Some(query_key)
            || self.handle_key().as_deref() == Some(query_key)
    }

    /// At least one identity key and a parsed start basis
    pub fn is_usable(&self) -> bool {
        (self.email.is_some() || self.handle.is_some()) && self.start.is_some()
    }
}

/// Email or handle of `record` equals `query_key`, without resolving dates
///
/// `query_key` must already be normalized with [`identity_key`].
pub fn record_matches(record: &Record, query_key: &str) -> bool {
    [EMAIL_KEYS, HANDLE_KEYS]
        .iter()
        .any(|keys| record.first_present(keys).map(identity_key).as_deref() == Some(query_key))
}

// ============================================================================
// FIELD RESOLVER
// ============================================================================

#[derive(Debug, Clone, Copy, Default)]
pub struct FieldResolver {
    normalizer: DateNormalizer,
}

impl FieldResolver {
    pub fn new(normalizer: DateNormalizer) -> Self {
        FieldResolver { normalizer }
    }

    /// Extract canonical fields; never fails, absent data stays absent
    pub fn resolve(&self, record: &Record) -> ResolvedFields {
        let email = record.first_present(EMAIL_KEYS).map(str::to_string);
        let handle = record.first_present(HANDLE_KEYS).map(str::to_string);

        let name = record
            .first_present(NAME_KEYS)
            .unwrap_or(UNKNOWN_NAME)
            .to_string();

        let comment = record.first_present(COMMENT_KEYS).unwrap_or("").to_string();
        let tier = record
            .first_present(TIER_KEYS)
            .unwrap_or(PLACEHOLDER)
            .to_string();

        ResolvedFields {
            email,
            handle,
            name,
            start: self.resolve_start(record),
            comment,
            tier,
        }
    }

    /// Payment period beats timestamp; an unparseable candidate falls
    /// through to the next one
    fn resolve_start(&self, record: &Record) -> Option<StartBasis> {
        let candidates = PAYMENT_PERIOD_KEYS
            .iter()
            .map(|key| (*key, BasisKind::PaymentMonth))
            .chain(TIMESTAMP_KEYS.iter().map(|key| (*key, BasisKind::Timestamp)));

        for (key, kind) in candidates {
            let Some(text) = record.get(key).map(str::trim).filter(|t| !t.is_empty()) else {
                continue;
            };
            if let Some(instant) = self.normalizer.parse(text) {
                return Some(StartBasis { instant, kind });
            }
        }

        None
    }
}

// ============================================================================
// TESTS
// ============================================================================
