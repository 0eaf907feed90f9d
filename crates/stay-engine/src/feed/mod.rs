//! Third-party calendar feed synchronization.
//!
//! - [`parser`] -- feed text → [`ImportedEvent`](crate::model::ImportedEvent)s
//! - [`classify`] -- pluggable owner-block vs guest-booking classification
//! - [`recurrence`] -- `RRULE` expansion for recurring imported events
//! - [`fetch`] -- blocking HTTP download with a timeout
//! - [`export`] -- blocked ranges → feed text

pub mod classify;
pub mod export;
pub mod fetch;
pub mod parser;
pub mod recurrence;

pub use classify::{EventClassifier, PhraseClassifier};
pub use export::{export_feed, ExportedFeed, FeedMetadata};
pub use fetch::{FeedFetcher, HttpFeedFetcher};
pub use parser::{import_feed, import_feed_with, FeedImport, ImportOptions};
