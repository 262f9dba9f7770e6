// Membership Tracker - Core Library
// Exposes all modules for use in the bot CLI, the webhook server, and tests

pub mod record;
pub mod dates;      // Date Normalizer
pub mod duration;   // Duration Extractor
pub mod fields;     // Record Field Resolver
pub mod status;     // Status Calculator
pub mod reconcile;  // Identity Reconciler
pub mod notifier;   // Expiry Notifier
pub mod responder;  // Query Responder
pub mod sources;    // Data sources (CSV file, sheet export, memory)
pub mod telegram;   // Messaging channel
pub mod bot;        // Command surface + long polling
pub mod scheduler;  // Daily scan times
pub mod config;
pub mod error;
pub mod app;

// Re-export commonly used types
pub use record::Record;
pub use dates::DateNormalizer;
pub use duration::parse_duration;
pub use fields::{BasisKind, FieldResolver, ResolvedFields, StartBasis};
pub use status::{ExpiryBand, MembershipStatus, StatusCalculator};
pub use reconcile::{Evaluated, IdentityReconciler, Lookup, ReconciledSet};
pub use notifier::{format_notification, ExpiryNotifier, UrgentMember};
pub use responder::{Answer, QueryResponder, StatusReport, GENERIC_ERROR};
pub use sources::{
    open_source, records_from_csv, CsvFileSource, MemorySource, RecordSource, SheetCsvSource,
    SourceSet,
};
pub use telegram::{Messenger, TelegramClient, Update};
pub use bot::Command;
pub use scheduler::DailySchedule;
pub use config::Config;
pub use error::{Error, Result};
pub use app::App;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Default log filter when `RUST_LOG` is unset
pub const DEFAULT_LOG_FILTER: &str = "membership_tracker=info";

/// Install the tracing subscriber used by both binaries
pub fn init_tracing(default_filter: &str) {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter)))
        .with(tracing_subscriber::fmt::layer())
        .init();
}
