//! Blocked-vs-booked classification of imported events.
//!
//! Feed producers mark owner blocks and guest bookings differently, usually
//! only through the summary text. The parser delegates the decision to an
//! [`EventClassifier`] so other producers' conventions can be plugged in
//! without touching the parser.

/// Phrases the default classifier treats as owner/host blocks.
pub const DEFAULT_BLOCKED_PHRASES: &[&str] = &[
    "not available",
    "blocked",
    "unavailable",
    "owner block",
    "closed period",
];

/// Decides whether an imported event is an owner block (`true`) or a guest booking.
pub trait EventClassifier: Send + Sync {
    fn is_blocked(&self, summary: Option<&str>) -> bool;
}

impl<F> EventClassifier for F
where
    F: Fn(Option<&str>) -> bool + Send + Sync,
{
    fn is_blocked(&self, summary: Option<&str>) -> bool {
        self(summary)
    }
}

/// Case-insensitive substring matching against a fixed phrase list.
#[derive(Debug, Clone, PartialEq)]
pub struct PhraseClassifier {
    phrases: Vec<String>,
}

impl PhraseClassifier {
    pub fn new<S: AsRef<str>>(phrases: &[S]) -> Self {
        Self {
            phrases: phrases
                .iter()
                .map(|p| p.as_ref().trim().to_lowercase())
                .filter(|p| !p.is_empty())
                .collect(),
        }
    }
}

impl Default for PhraseClassifier {
    fn default() -> Self {
        Self::new(DEFAULT_BLOCKED_PHRASES)
    }
}

impl EventClassifier for PhraseClassifier {
    fn is_blocked(&self, summary: Option<&str>) -> bool {
        let Some(summary) = summary else {
            return false;
        };
        let summary = summary.to_lowercase();
        self.phrases.iter().any(|p| summary.contains(p.as_str()))
    }
}
