use chrono::{DateTime, Utc};

/// One ticker mentioned by one post. A post naming three tickers yields three
/// mentions sharing the post's timestamp.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TickerMention {
    pub created_utc: DateTime<Utc>,
    pub ticker: String,
}

impl TickerMention {
    pub fn new(created_utc: DateTime<Utc>, ticker: impl Into<String>) -> Self {
        Self {
            created_utc,
            ticker: ticker.into(),
        }
    }
}
