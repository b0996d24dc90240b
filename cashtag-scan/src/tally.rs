use crate::mention::TickerMention;
use std::collections::HashMap;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TickerCount {
    pub ticker: String,
    pub mentions: usize,
}

/// The `limit` most mentioned tickers, most first, ties broken alphabetically.
pub fn top_mentions(mentions: &[TickerMention], limit: usize) -> Vec<TickerCount> {
    let mut counts: HashMap<&str, usize> = HashMap::new();
    for m in mentions {
        *counts.entry(m.ticker.as_str()).or_default() += 1;
    }
    let mut ranked: Vec<TickerCount> = counts
        .into_iter()
        .map(|(ticker, mentions)| TickerCount {
            ticker: ticker.to_string(),
            mentions,
        })
        .collect();
    ranked.sort_by(|a, b| {
        b.mentions
            .cmp(&a.mentions)
            .then_with(|| a.ticker.cmp(&b.ticker))
    });
    ranked.truncate(limit);
    ranked
}
