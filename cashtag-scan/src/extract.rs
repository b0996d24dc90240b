//! Ticker extraction from a post title.
//!
//! Two matchers are unioned: explicit cash tags (`$GME`) and bare all-caps
//! words of three or four letters (`AMC`). The union is then narrowed to
//! listed symbols and stripped of stopwords.
use crate::reference::ReferenceData;
use regex::Regex;
use std::collections::{BTreeSet, HashSet};
use std::sync::{Arc, LazyLock};

static CASH_TAG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\$([A-Za-z]+)").expect("cash tag pattern"));
static CASH_OR_HASH_TAG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[$#]([A-Za-z]+)").expect("hash tag pattern"));
static WORD_RUN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[\p{L}_]+").expect("word run pattern"));

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExtractOptions {
    /// Treat `#GME` like `$GME`.
    pub hash_prefix: bool,
}

/// Letters following a `$` (or `#` when enabled), uppercased.
pub fn cash_tags(title: &str, options: ExtractOptions) -> BTreeSet<String> {
    let pattern = if options.hash_prefix {
        &*CASH_OR_HASH_TAG
    } else {
        &*CASH_TAG
    };
    pattern
        .captures_iter(title)
        .filter_map(|caps| caps.get(1))
        .map(|m| m.as_str().to_ascii_uppercase())
        .collect()
}

/// Standalone runs of exactly three or four uppercase letters.
///
/// Runs are matched maximally over letters of any script and underscores, so
/// `GAMESTOP`, `GME_CALLS` and `ÉGME` contribute nothing.
pub fn bare_tickers(title: &str) -> BTreeSet<String> {
    WORD_RUN
        .find_iter(title)
        .map(|m| m.as_str())
        .filter(|run| {
            (3..=4).contains(&run.len()) && run.bytes().all(|b| b.is_ascii_uppercase())
        })
        .map(str::to_string)
        .collect()
}

/// Listed, non-stopword tickers mentioned in `title`.
///
/// ```
/// use cashtag_scan::extract_tickers;
/// use std::collections::HashSet;
///
/// let valid: HashSet<String> = ["GME", "AMC"].iter().map(|s| s.to_string()).collect();
/// let found = extract_tickers("$GME and AMC to the moon", &valid, &HashSet::new());
/// assert_eq!(found.into_iter().collect::<Vec<_>>(), vec!["AMC", "GME"]);
/// ```
pub fn extract_tickers(
    title: &str,
    valid_tickers: &HashSet<String>,
    stopwords: &HashSet<String>,
) -> BTreeSet<String> {
    extract_with(title, valid_tickers, stopwords, ExtractOptions::default())
}

pub fn extract_with(
    title: &str,
    valid_tickers: &HashSet<String>,
    stopwords: &HashSet<String>,
    options: ExtractOptions,
) -> BTreeSet<String> {
    let mut found = cash_tags(title, options);
    found.extend(bare_tickers(title));
    found.retain(|t| valid_tickers.contains(t) && !stopwords.contains(t));
    found
}

/// Extraction bound to one run's reference data.
#[derive(Debug, Clone)]
pub struct TickerExtractor {
    reference: Arc<ReferenceData>,
    options: ExtractOptions,
}

impl TickerExtractor {
    pub fn new(reference: Arc<ReferenceData>) -> Self {
        Self {
            reference,
            options: ExtractOptions::default(),
        }
    }

    pub fn with_options(mut self, options: ExtractOptions) -> Self {
        self.options = options;
        self
    }

    pub fn reference(&self) -> &ReferenceData {
        &self.reference
    }

    pub fn extract(&self, title: &str) -> BTreeSet<String> {
        extract_with(
            title,
            self.reference.valid_tickers(),
            self.reference.stopwords(),
            self.options,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn set(items: &[&str]) -> HashSet<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    fn extractor(valid: &[&str], stop: &[&str]) -> TickerExtractor {
        TickerExtractor::new(Arc::new(ReferenceData::new(
            valid.iter().copied(),
            stop.iter().copied(),
        )))
    }

    #[test]
    fn cash_tag_and_bare_word_are_unioned() {
        let ex = extractor(&["GME", "AMC"], &[]);
        let found: Vec<_> = ex.extract("$GME and AMC").into_iter().collect();
        assert_eq!(found, vec!["AMC", "GME"]);
    }

    #[test]
    fn ordinary_caps_words_are_not_tickers() {
        let ex = extractor(&["GME", "AMC"], &["SO"]);
        assert!(ex.extract("I AM SO EXCITED").is_empty());
    }

    #[test]
    fn title_without_candidates_yields_nothing() {
        let ex = extractor(&["GME"], &[]);
        assert!(ex.extract("what a day for the market").is_empty());
        assert!(ex.extract("").is_empty());
    }

    #[test]
    fn lowercase_cash_tag_is_uppercased() {
        let ex = extractor(&["GME"], &[]);
        assert_eq!(
            ex.extract("buy $gme now"),
            BTreeSet::from(["GME".to_string()])
        );
    }

    #[test]
    fn unlisted_and_stopword_tokens_are_dropped() {
        let ex = extractor(&["GME", "YOLO"], &["YOLO"]);
        let found = ex.extract("YOLO into $GME and $FAKE");
        assert_eq!(found, BTreeSet::from(["GME".to_string()]));
    }

    #[test]
    fn longer_caps_runs_do_not_leak_slices() {
        let valid = set(&["GAME", "STOP", "GME"]);
        let none = HashSet::new();
        assert!(extract_tickers("GAMESTOP", &valid, &none).is_empty());
        assert!(extract_tickers("GME_CALLS", &valid, &none).is_empty());
        assert!(extract_tickers("xGME", &valid, &none).is_empty());
    }

    #[test]
    fn accented_neighbours_extend_the_run() {
        let valid = set(&["GME"]);
        let none = HashSet::new();
        assert!(extract_tickers("ÉGME", &valid, &none).is_empty());
        assert!(extract_tickers("GMEé", &valid, &none).is_empty());
        assert_eq!(extract_tickers("über GME", &valid, &none).len(), 1);
    }

    #[test]
    fn digits_and_punctuation_bound_a_run() {
        let valid = set(&["GME"]);
        let none = HashSet::new();
        assert_eq!(extract_tickers("GME2", &valid, &none).len(), 1);
        assert_eq!(extract_tickers("(GME)!", &valid, &none).len(), 1);
    }

    #[test]
    fn two_and_five_letter_words_need_a_cash_tag() {
        let valid = set(&["GE", "GOOGL"]);
        let none = HashSet::new();
        assert!(extract_tickers("GE GOOGL", &valid, &none).is_empty());
        assert_eq!(extract_tickers("$GE $GOOGL", &valid, &none).len(), 2);
    }

    #[test]
    fn hash_prefix_is_opt_in() {
        let valid = set(&["GOOGL"]);
        let none = HashSet::new();
        assert!(extract_tickers("#googl", &valid, &none).is_empty());
        let options = ExtractOptions { hash_prefix: true };
        let found = extract_with("#googl", &valid, &none, options);
        assert_eq!(found, BTreeSet::from(["GOOGL".to_string()]));
    }

    #[test]
    fn extraction_is_idempotent() {
        let ex = extractor(&["GME", "AMC", "BB"], &[]);
        let title = "$BB squeeze, GME and AMC both green";
        assert_eq!(ex.extract(title), ex.extract(title));
    }
}
