// 🔗 Identity Reconciler - one authoritative record per member
// Payment and application sheets overlap: the same member can appear in
// both, many times. The record with the latest start wins; on equal starts
// the first one seen (payment sheet before application sheet, rows in
// order) is kept.

use crate::dates::DateNormalizer;
use crate::fields::{identity_key, record_matches, FieldResolver, ResolvedFields};
use crate::record::Record;
use crate::status::{MembershipStatus, StatusCalculator};
use chrono::DateTime;
use chrono_tz::Tz;
use std::collections::HashMap;
use tracing::debug;

// ============================================================================
// EVALUATED RECORD
// ============================================================================

/// A record together with its resolved fields and computed status
#[derive(Debug, Clone, PartialEq)]
pub struct Evaluated<'a> {
    pub record: &'a Record,
    pub fields: ResolvedFields,
    pub status: MembershipStatus,
}

impl Evaluated<'_> {
    /// Strictly later start than `other` (ties are not "better")
    fn supersedes(&self, other: &Evaluated<'_>) -> bool {
        self.status.start > other.status.start
    }
}

// ============================================================================
// LOOKUP OUTCOME
// ============================================================================

/// Result of an on-demand lookup
#[derive(Debug, Clone, PartialEq)]
pub enum Lookup<'a> {
    /// Latest usable record for the query
    Found(Evaluated<'a>),
    /// Matching rows exist but none has a parseable start date
    Uncomputable {
        record: &'a Record,
        fields: ResolvedFields,
    },
    NotFound,
}

// ============================================================================
// RECONCILED SET
// ============================================================================

/// Latest status per normalized email, in first-seen identity order
#[derive(Debug, Default)]
pub struct ReconciledSet<'a> {
    entries: Vec<Evaluated<'a>>,
    index: HashMap<String, usize>,
}

impl<'a> ReconciledSet<'a> {
    fn offer(&mut self, key: String, candidate: Evaluated<'a>) {
        match self.index.get(&key) {
            Some(&slot) => {
                if candidate.supersedes(&self.entries[slot]) {
                    self.entries[slot] = candidate;
                }
            }
            None => {
                self.index.insert(key, self.entries.len());
                self.entries.push(candidate);
            }
        }
    }

    /// Entry for an email (any casing, surrounding whitespace ignored)
    pub fn get(&self, email: &str) -> Option<&Evaluated<'a>> {
        self.index
            .get(&identity_key(email))
            .map(|&slot| &self.entries[slot])
    }

    pub fn iter(&self) -> impl Iterator<Item = &Evaluated<'a>> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

// ============================================================================
// IDENTITY RECONCILER
// ============================================================================

#[derive(Debug, Clone, Copy, Default)]
pub struct IdentityReconciler {
    resolver: FieldResolver,
    calculator: StatusCalculator,
}

impl IdentityReconciler {
    pub fn new(normalizer: DateNormalizer) -> Self {
        IdentityReconciler {
            resolver: FieldResolver::new(normalizer),
            calculator: StatusCalculator::new(normalizer),
        }
    }

    pub fn resolver(&self) -> &FieldResolver {
        &self.resolver
    }

    pub fn calculator(&self) -> &StatusCalculator {
        &self.calculator
    }

    /// Resolve fields and compute status for one record
    pub fn evaluate(
        &self,
        record: &Record,
        now: DateTime<Tz>,
    ) -> (ResolvedFields, Option<MembershipStatus>) {
        let fields = self.resolver.resolve(record);
        let status = self.calculator.compute(&fields, now);
        (fields, status)
    }

    /// Latest usable record per email across all records
    ///
    /// Records without an email or without a computable status are skipped.
    pub fn reconcile_all<'a>(&self, records: &'a [Record], now: DateTime<Tz>) -> ReconciledSet<'a> {
        let mut set = ReconciledSet::default();

        for record in records {
            let (fields, status) = self.evaluate(record, now);

            let Some(key) = fields.email_key() else {
                debug!(origin = %record.origin(), "Skipping record without email");
                continue;
            };
            let Some(status) = status else {
                debug!(origin = %record.origin(), "Skipping record without a start date");
                continue;
            };

            set.offer(
                key,
                Evaluated {
                    record,
                    fields,
                    status,
                },
            );
        }

        set
    }

    /// Latest usable record whose email or handle equals `query`
    ///
    /// Matching is case-insensitive and exact. The same latest-start rule
    /// applies regardless of which identity field matched.
    pub fn find_best<'a>(&self, records: &'a [Record], query: &str, now: DateTime<Tz>) -> Lookup<'a> {
        let query_key = identity_key(query);
        if query_key.is_empty() {
            return Lookup::NotFound;
        }

        let mut best: Option<Evaluated<'a>> = None;
        let mut first_unusable: Option<(&'a Record, ResolvedFields)> = None;

        for record in records {
            // Dates of other members' rows are never parsed (or warned about)
            if !record_matches(record, &query_key) {
                continue;
            }
            let (fields, status) = self.evaluate(record, now);

            match status {
                Some(status) => {
                    let candidate = Evaluated {
                        record,
                        fields,
                        status,
                    };
                    if best.as_ref().map_or(true, |b| candidate.supersedes(b)) {
                        best = Some(candidate);
                    }
                }
                None => {
                    debug!(origin = %record.origin(), "Matching record has no start date");
                    first_unusable.get_or_insert((record, fields));
                }
            }
        }

        match (best, first_unusable) {
            (Some(found), _) => Lookup::Found(found),
            (None, Some((record, fields))) => Lookup::Uncomputable { record, fields },
            (None, None) => Lookup::NotFound,
        }
    }
}

// ============================================================================
// TESTS
// ============================================================================
