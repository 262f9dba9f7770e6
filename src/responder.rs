// 🔎 Query Responder - "is member X still valid?"
// Looks up one identity across all sources and renders a plain-text report.

use crate::fields::{BasisKind, PLACEHOLDER};
use crate::reconcile::{IdentityReconciler, Lookup};
use crate::record::Record;
use crate::sources::SourceSet;
use crate::status::ExpiryBand;
use chrono::{DateTime, NaiveDate};
use chrono_tz::Tz;
use serde::Serialize;
use std::fmt;
use tracing::error;

/// Reply sent when the lookup itself fails (source unreachable, bad export)
pub const GENERIC_ERROR: &str = "An error occurred. Please try again.";

// ============================================================================
// STATUS REPORT
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatusReport {
    pub name: String,
    pub email: String,
    pub handle: String,
    pub tier: String,
    pub basis: BasisKind,
    pub start_date: NaiveDate,
    pub duration_months: u32,
    pub expiry_date: NaiveDate,
    pub band: ExpiryBand,
}

impl fmt::Display for StatusReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "👤 {}", self.name)?;
        writeln!(f, "📧 Email: {}", self.email)?;
        writeln!(f, "💬 Telegram: {}", self.handle)?;
        writeln!(f, "🏷️ Tier: {}", self.tier)?;
        writeln!(f, "📌 Based on: {}", self.basis.label())?;
        writeln!(f, "📅 Start: {}", self.start_date.format("%Y-%m-%d"))?;
        writeln!(
            f,
            "⏳ Duration: {} month{}",
            self.duration_months,
            if self.duration_months == 1 { "" } else { "s" }
        )?;
        writeln!(f, "🗓️ Expires: {}", self.expiry_date.format("%Y-%m-%d"))?;
        write!(f, "{}", self.band)
    }
}

// ============================================================================
// ANSWER
// ============================================================================

/// Outcome of a lookup: each case renders differently
#[derive(Debug, Clone, PartialEq)]
pub enum Answer {
    Report(StatusReport),
    NotFound { query: String },
    /// Rows exist for the identity but no start date could be parsed
    Uncomputable { query: String, name: String },
}

impl Answer {
    pub fn render(&self) -> String {
        match self {
            Answer::Report(report) => report.to_string(),
            Answer::NotFound { query } => format!("No record found for {}", query),
            Answer::Uncomputable { query, name } => format!(
                "Found a record for {} ({}) but cannot compute dates for it. \
                 Please check the payment month / timestamp in the sheet.",
                query, name
            ),
        }
    }
}

// ============================================================================
// QUERY RESPONDER
// ============================================================================

#[derive(Debug, Clone, Copy, Default)]
pub struct QueryResponder {
    reconciler: IdentityReconciler,
}

impl QueryResponder {
    pub fn new(reconciler: IdentityReconciler) -> Self {
        QueryResponder { reconciler }
    }

    /// Answer a query against an already fetched record set
    pub fn answer(&self, records: &[Record], query: &str, now: DateTime<Tz>) -> Answer {
        let query = query.trim();

        match self.reconciler.find_best(records, query, now) {
            Lookup::NotFound => Answer::NotFound {
                query: query.to_string(),
            },
            Lookup::Uncomputable { fields, .. } => Answer::Uncomputable {
                query: query.to_string(),
                name: fields.name,
            },
            Lookup::Found(found) => {
                let fields = found.fields;
                let status = found.status;

                Answer::Report(StatusReport {
                    name: fields.name,
                    email: fields.email.unwrap_or_else(|| PLACEHOLDER.to_string()),
                    handle: fields.handle.unwrap_or_else(|| PLACEHOLDER.to_string()),
                    tier: fields.tier,
                    basis: status.basis,
                    start_date: status.start_date(),
                    duration_months: status.duration_months,
                    expiry_date: status.expiry_date(),
                    band: status.band(),
                })
            }
        }
    }

    /// Fetch fresh records and answer; failures become [`GENERIC_ERROR`]
    pub async fn respond(&self, sources: &SourceSet, query: &str, now: DateTime<Tz>) -> String {
        match sources.fetch_all().await {
            Ok(records) => self.answer(&records, query, now).render(),
            Err(e) => {
                error!(query = %query.trim(), error = %e, "Lookup failed");
                GENERIC_ERROR.to_string()
            }
        }
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dates::DateNormalizer;
    use crate::error::Result as SourceResult;
    use crate::sources::{MemorySource, RecordSource};
    use async_trait::async_trait;
    use chrono::TimeZone;

    fn create_test_record(row: usize, pairs: &[(&str, &str)]) -> Record {
        Record::from_pairs("test", row, pairs.iter().copied())
    }

    fn responder() -> QueryResponder {
        QueryResponder::new(IdentityReconciler::new(DateNormalizer::new(Tz::UTC)))
    }

    fn at(y: i32, m: u32, d: u32) -> DateTime<Tz> {
        Tz::UTC.with_ymd_and_hms(y, m, d, 9, 0, 0).unwrap()
    }

    struct FailingSource;

    #[async_trait]
    impl RecordSource for FailingSource {
        fn name(&self) -> &str {
            "broken"
        }

        async fn fetch_all_rows(&self) -> SourceResult<Vec<Record>> {
            Err(crate::error::Error::Config("sheet unavailable".to_string()))
        }
    }

    #[test]
    fn test_report_fields() {
        let records = vec![create_test_record(
            2,
            &[
                ("Email Address", "A@x.com"),
                ("Member Name", "Alice"),
                ("Payment Month", "1/2025"),
                ("Timestamp", "1/3/2025 10:00:00"),
                ("Any additional comments?", "3 months"),
            ],
        )];

        let answer = responder().answer(&records, "  a@x.com ", at(2025, 3, 31));

        let Answer::Report(report) = answer else {
            panic!("expected report");
        };
        assert_eq!(report.name, "Alice");
        assert_eq!(report.email, "A@x.com");
        assert_eq!(report.handle, "-");
        assert_eq!(report.tier, "-");
        assert_eq!(report.basis, BasisKind::PaymentMonth);
        assert_eq!(report.start_date, NaiveDate::from_ymd_opt(2025, 1, 1).unwrap());
        assert_eq!(report.duration_months, 3);
        assert_eq!(report.expiry_date, NaiveDate::from_ymd_opt(2025, 4, 1).unwrap());
        assert_eq!(report.band, ExpiryBand::ExpiringTomorrow);

        let text = report.to_string();
        assert!(text.contains("Based on: Payment Month"));
        assert!(text.contains("Start: 2025-01-01"));
        assert!(text.contains("Expires: 2025-04-01"));
        assert!(text.contains("Remaining: 1 day"));
    }

    #[test]
    fn test_basis_label_reflects_the_parsed_column() {
        // Payment Month present but unparseable: the timestamp is what was used
        let records = vec![create_test_record(
            2,
            &[
                ("Email", "b@x.com"),
                ("Payment Month", "??"),
                ("Timestamp", "2/1/2025 10:00:00"),
            ],
        )];

        let Answer::Report(report) = responder().answer(&records, "b@x.com", at(2025, 2, 10)) else {
            panic!("expected report");
        };
        assert_eq!(report.basis, BasisKind::Timestamp);
        assert!(report.to_string().contains("Based on: Timestamp"));
    }

    #[test]
    fn test_not_found_and_uncomputable_differ() {
        let records = vec![create_test_record(
            2,
            &[("Email", "c@x.com"), ("Member Name", "Cee"), ("Timestamp", "soon")],
        )];

        let not_found = responder().answer(&records, "zed@x.com", at(2025, 1, 1));
        let uncomputable = responder().answer(&records, "c@x.com", at(2025, 1, 1));

        assert_eq!(not_found.render(), "No record found for zed@x.com");
        assert!(matches!(uncomputable, Answer::Uncomputable { ref name, .. } if name == "Cee"));
        assert!(uncomputable.render().contains("cannot compute dates"));
    }

    #[tokio::test]
    async fn test_respond_fetches_from_sources() {
        let sources = SourceSet::default().with_source(Box::new(MemorySource::new(
            "payments",
            vec![create_test_record(
                2,
                &[("Email", "d@x.com"), ("Member Name", "Dee"), ("Timestamp", "1/1/2025")],
            )],
        )));

        let reply = responder().respond(&sources, "d@x.com", at(2025, 1, 11)).await;

        assert!(reply.contains("👤 Dee"));
        assert!(reply.contains("Active: 21 days left"));
    }

    #[tokio::test]
    async fn test_respond_hides_source_errors() {
        let sources = SourceSet::default().with_source(Box::new(FailingSource));

        let reply = responder().respond(&sources, "d@x.com", at(2025, 1, 1)).await;
        assert_eq!(reply, GENERIC_ERROR);
    }
}
