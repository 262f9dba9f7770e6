// 🧩 App wiring - sources, engines and clock built once at startup
// Acquired at process start and shared (behind `Arc`) by the bot loop, the
// scheduled scans and the webhook server. Holds no per-request state.

use crate::config::Config;
use crate::dates::DateNormalizer;
use crate::notifier::ExpiryNotifier;
use crate::reconcile::IdentityReconciler;
use crate::responder::QueryResponder;
use crate::sources::{open_source, SourceSet};
use chrono::{DateTime, Utc};
use chrono_tz::Tz;

pub struct App {
    pub sources: SourceSet,
    pub responder: QueryResponder,
    pub notifier: ExpiryNotifier,
    normalizer: DateNormalizer,
}

impl App {
    pub fn new(sources: SourceSet, tz: Tz) -> Self {
        let normalizer = DateNormalizer::new(tz);
        let reconciler = IdentityReconciler::new(normalizer);

        App {
            sources,
            responder: QueryResponder::new(reconciler),
            notifier: ExpiryNotifier::new(reconciler),
            normalizer,
        }
    }

    /// Open every configured source (payments first) sharing one HTTP client
    pub fn from_config(config: &Config, client: reqwest::Client) -> Self {
        let sources = config
            .source_locations()
            .into_iter()
            .fold(SourceSet::default(), |set, (name, location)| {
                set.with_source(open_source(
                    name,
                    location,
                    config.sheets_token.clone(),
                    client.clone(),
                ))
            });

        App::new(sources, config.timezone)
    }

    pub fn timezone(&self) -> Tz {
        self.normalizer.timezone()
    }

    /// Evaluation instant for a query or scan
    pub fn now(&self) -> DateTime<Tz> {
        Utc::now().with_timezone(&self.timezone())
    }

    /// `/check` boundary: always returns a reply
    pub async fn check(&self, query: &str) -> String {
        self.responder.respond(&self.sources, query, self.now()).await
    }
}
