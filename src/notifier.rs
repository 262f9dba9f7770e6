// 🔔 Expiry Notifier - who expires tomorrow?
// Scans every reconciled identity and reports exactly those with one day
// left. Already-expired members and members further out are not included.

use crate::reconcile::IdentityReconciler;
use crate::record::Record;
use crate::sources::SourceSet;
use crate::telegram::Messenger;
use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDate};
use chrono_tz::Tz;
use serde::Serialize;
use std::fmt::Write;
use tracing::{error, info};

// ============================================================================
// URGENT MEMBER
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UrgentMember {
    pub name: String,
    pub email: String,
    pub expiry_date: NaiveDate,
}

/// One aggregated notification, or `None` when nobody is urgent
pub fn format_notification(urgent: &[UrgentMember]) -> Option<String> {
    if urgent.is_empty() {
        return None;
    }

    let mut text = String::from("⏰ Memberships expiring tomorrow:");
    for member in urgent {
        let _ = write!(
            text,
            "\n• {} ({}) — expires {}",
            member.name,
            member.email,
            member.expiry_date.format("%Y-%m-%d")
        );
    }
    Some(text)
}

// ============================================================================
// EXPIRY NOTIFIER
// ============================================================================

#[derive(Debug, Clone, Copy, Default)]
pub struct ExpiryNotifier {
    reconciler: IdentityReconciler,
}

impl ExpiryNotifier {
    pub fn new(reconciler: IdentityReconciler) -> Self {
        ExpiryNotifier { reconciler }
    }

    /// Identities whose latest record has exactly one day remaining
    ///
    /// Order follows first appearance of each identity in `records`.
    pub fn collect_urgent(&self, records: &[Record], now: DateTime<Tz>) -> Vec<UrgentMember> {
        self.reconciler
            .reconcile_all(records, now)
            .iter()
            .filter(|entry| entry.status.band().is_urgent())
            .map(|entry| UrgentMember {
                name: entry.fields.name.clone(),
                email: entry.fields.email.clone().unwrap_or_default(),
                expiry_date: entry.status.expiry_date(),
            })
            .collect()
    }

    /// Fetch fresh records and collect urgent members
    pub async fn scan(&self, sources: &SourceSet, now: DateTime<Tz>) -> Result<Vec<UrgentMember>> {
        let records = sources
            .fetch_all()
            .await
            .context("Failed to fetch records for expiry scan")?;

        let urgent = self.collect_urgent(&records, now);
        info!(records = records.len(), urgent = urgent.len(), "Expiry scan complete");
        Ok(urgent)
    }

    /// Scan and send one aggregated message if anyone is urgent
    ///
    /// Returns how many members were reported.
    pub async fn notify(
        &self,
        sources: &SourceSet,
        messenger: &dyn Messenger,
        chat_id: &str,
        now: DateTime<Tz>,
    ) -> Result<usize> {
        let urgent = self.scan(sources, now).await?;

        if let Some(text) = format_notification(&urgent) {
            messenger
                .send_text(chat_id, &text)
                .await
                .context("Failed to send expiry notification")?;
        }
        Ok(urgent.len())
    }

    /// Scheduled-job boundary: failures are logged, never propagated
    pub async fn run_scheduled(
        &self,
        sources: &SourceSet,
        messenger: &dyn Messenger,
        chat_id: &str,
        now: DateTime<Tz>,
    ) {
        if let Err(e) = self.notify(sources, messenger, chat_id, now).await {
            error!("Scheduled expiry scan failed: {:#}", e);
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
    use crate::error::{Error, Result as SendResult};
    use crate::sources::MemorySource;
    use async_trait::async_trait;
    use chrono::TimeZone;
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingMessenger {
        sent: Mutex<Vec<(String, String)>>,
        fail: bool,
    }

    #[async_trait]
    impl Messenger for RecordingMessenger {
        async fn send_text(&self, chat_id: &str, text: &str) -> SendResult<()> {
            if self.fail {
                return Err(Error::Telegram {
                    description: "Forbidden".to_string(),
                });
            }
            self.sent
                .lock()
                .unwrap()
                .push((chat_id.to_string(), text.to_string()));
            Ok(())
        }
    }

    fn create_test_record(row: usize, pairs: &[(&str, &str)]) -> Record {
        Record::from_pairs("test", row, pairs.iter().copied())
    }

    fn notifier() -> ExpiryNotifier {
        ExpiryNotifier::new(IdentityReconciler::new(DateNormalizer::new(Tz::UTC)))
    }

    fn march_31() -> DateTime<Tz> {
        Tz::UTC.with_ymd_and_hms(2025, 3, 31, 0, 0, 0).unwrap()
    }

    /// Expiry offsets relative to 2025-03-31: 0, 1, 2 and -1 days
    fn sample_records() -> Vec<Record> {
        vec![
            create_test_record(2, &[("Email", "today@x.com"), ("Member Name", "Today"), ("Timestamp", "1/31/2025"), ("Any additional comments?", "2 months")]),
            create_test_record(3, &[("Email", "a@x.com"), ("Member Name", "Ann"), ("Payment Month", "1/2025"), ("Any additional comments?", "3 months")]),
            create_test_record(4, &[("Email", "later@x.com"), ("Member Name", "Later"), ("Timestamp", "3/2/2025")]),
            create_test_record(5, &[("Email", "gone@x.com"), ("Member Name", "Gone"), ("Timestamp", "1/30/2025"), ("Any additional comments?", "2 months")]),
        ]
    }

    #[test]
    fn test_only_one_day_remaining_is_urgent() {
        let urgent = notifier().collect_urgent(&sample_records(), march_31());

        assert_eq!(
            urgent,
            vec![UrgentMember {
                name: "Ann".to_string(),
                email: "a@x.com".to_string(),
                expiry_date: NaiveDate::from_ymd_opt(2025, 4, 1).unwrap(),
            }]
        );
    }

    #[test]
    fn test_renewal_supersedes_expiring_record() {
        let mut records = sample_records();
        records.push(create_test_record(
            6,
            &[("Email", "A@X.com"), ("Payment Month", "4/2025")],
        ));

        assert!(notifier().collect_urgent(&records, march_31()).is_empty());
    }

    #[test]
    fn test_format_notification() {
        assert_eq!(format_notification(&[]), None);

        let text = format_notification(&[
            UrgentMember {
                name: "Ann".to_string(),
                email: "a@x.com".to_string(),
                expiry_date: NaiveDate::from_ymd_opt(2025, 4, 1).unwrap(),
            },
            UrgentMember {
                name: "Bo".to_string(),
                email: "b@x.com".to_string(),
                expiry_date: NaiveDate::from_ymd_opt(2025, 4, 1).unwrap(),
            },
        ])
        .unwrap();

        assert!(text.starts_with("⏰ Memberships expiring tomorrow:"));
        assert!(text.contains("• Ann (a@x.com) — expires 2025-04-01"));
        assert!(text.contains("• Bo (b@x.com) — expires 2025-04-01"));
    }

    #[tokio::test]
    async fn test_notify_sends_one_aggregated_message() {
        let sources = SourceSet::default().with_source(Box::new(MemorySource::new("p", sample_records())));
        let messenger = RecordingMessenger::default();

        let count = notifier().notify(&sources, &messenger, "42", march_31()).await.unwrap();

        assert_eq!(count, 1);
        let sent = messenger.sent.lock().unwrap();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].0, "42");
        assert!(sent[0].1.contains("Ann"));
    }

    #[tokio::test]
    async fn test_notify_sends_nothing_when_nobody_urgent() {
        let sources = SourceSet::default().with_source(Box::new(MemorySource::new("p", vec![])));
        let messenger = RecordingMessenger::default();

        let count = notifier().notify(&sources, &messenger, "42", march_31()).await.unwrap();

        assert_eq!(count, 0);
        assert!(messenger.sent.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_scheduled_run_swallows_send_failure() {
        let sources = SourceSet::default().with_source(Box::new(MemorySource::new("p", sample_records())));
        let messenger = RecordingMessenger {
            fail: true,
            ..Default::default()
        };

        assert!(notifier().notify(&sources, &messenger, "42", march_31()).await.is_err());
        // Boundary variant returns normally
        notifier().run_scheduled(&sources, &messenger, "42", march_31()).await;
    }
}
