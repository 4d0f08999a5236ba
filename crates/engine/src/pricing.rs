//! Item codes and what they are worth.
//!
//! A regear request names the items to replace by their code. The price
//! table is loaded once at startup and only read afterwards.

use std::collections::HashMap;

/// Silver value of each regear item code.
const REGEAR_PRICES: [(&str, i64); 29] = [
    ("1", 925_000),
    ("2", 1_037_000),
    ("3", 744_000),
    ("4", 838_000),
    ("5", 696_000),
    ("6", 1_094_000),
    ("7", 1_393_000),
    ("8", 857_000),
    ("9", 1_018_000),
    ("10", 824_000),
    ("11", 831_000),
    ("12", 1_259_000),
    ("13", 1_284_000),
    ("14", 1_299_000),
    ("15", 1_461_000),
    ("16", 950_000),
    ("17", 675_000),
    ("18", 682_000),
    ("19", 740_000),
    ("20", 1_243_000),
    ("21", 1_768_000),
    ("22", 1_126_000),
    ("23", 1_517_000),
    ("24", 1_653_000),
    ("25", 3_179_000),
    ("26", 1_003_000),
    ("27", 2_535_000),
    ("28", 6_000_000),
    ("29", 4_000_000),
];

/// How many times each item code was requested, in first-seen order.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ItemCounts {
    entries: Vec<(String, u32)>,
}

impl ItemCounts {
    pub fn new() -> Self {
        Self::default()
    }

    /// Count one more occurrence of `code`.
    pub fn add(&mut self, code: &str) {
        self.add_many(code, 1);
    }

    pub fn add_many(&mut self, code: &str, count: u32) {
        if count == 0 {
            return;
        }
        match self.entries.iter_mut().find(|(c, _)| c == code) {
            Some((_, n)) => *n += count,
            None => self.entries.push((code.to_string(), count)),
        }
    }

    #[must_use]
    pub fn with(mut self, code: &str, count: u32) -> Self {
        self.add_many(code, count);
        self
    }

    pub fn count(&self, code: &str) -> u32 {
        self.entries
            .iter()
            .find_map(|(c, n)| (c == code).then_some(*n))
            .unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of distinct codes.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, u32)> {
        self.entries.iter().map(|(c, n)| (c.as_str(), *n))
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PriceTable {
    prices: HashMap<String, i64>,
}

impl PriceTable {
    pub fn new<I, S>(prices: I) -> Self
    where
        I: IntoIterator<Item = (S, i64)>,
        S: Into<String>,
    {
        Self {
            prices: prices
                .into_iter()
                .map(|(code, value)| (code.into(), value))
                .collect(),
        }
    }

    pub fn price(&self, code: &str) -> Option<i64> {
        self.prices.get(code).copied()
    }

    pub fn len(&self) -> usize {
        self.prices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.prices.is_empty()
    }

    /// Count every whole word of `text` that is a known item code.
    ///
    /// Words are maximal runs of alphanumeric characters or `_`, so `3x2`
    /// is one (unknown) word while `3, 2` are two codes.
    pub fn count_items(&self, text: &str) -> ItemCounts {
        let mut counts = ItemCounts::new();
        for word in text
            .split(|c: char| !(c.is_alphanumeric() || c == '_'))
            .filter(|word| !word.is_empty())
        {
            if self.prices.contains_key(word) {
                counts.add(word);
            }
        }
        counts
    }

    /// Total value of the counted items. Unknown codes are worth nothing.
    pub fn appraise(&self, counts: &ItemCounts) -> i64 {
        counts
            .iter()
            .map(|(code, n)| self.price(code).unwrap_or(0) * i64::from(n))
            .sum()
    }
}

impl Default for PriceTable {
    fn default() -> Self {
        Self::new(REGEAR_PRICES)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_table_has_all_regear_codes() {
        let prices = PriceTable::default();
        assert_eq!(prices.len(), 29);
        assert_eq!(prices.price("1"), Some(925_000));
        assert_eq!(prices.price("28"), Some(6_000_000));
        assert_eq!(prices.price("30"), None);
    }

    #[test]
    fn counts_repeated_codes_in_first_seen_order() {
        let counts = PriceTable::default().count_items("2 1 2, 2 and 1");
        let seen: Vec<_> = counts.iter().collect();
        assert_eq!(seen, vec![("2", 3), ("1", 2)]);
    }

    #[test]
    fn ignores_words_that_merely_contain_codes() {
        let counts = PriceTable::default().count_items("30 05 3x2 a1 100");
        assert!(counts.is_empty());
    }

    #[test]
    fn punctuation_separates_codes() {
        let counts = PriceTable::default().count_items("murió: 1.5/29!");
        assert_eq!(counts.count("1"), 1);
        assert_eq!(counts.count("5"), 1);
        assert_eq!(counts.count("29"), 1);
    }

    #[test]
    fn appraise_multiplies_by_count() {
        let prices = PriceTable::default();
        let counts = ItemCounts::new().with("1", 2).with("3", 1);
        assert_eq!(prices.appraise(&counts), 2 * 925_000 + 744_000);
    }

    #[test]
    fn appraise_ignores_unknown_codes() {
        let prices = PriceTable::new([("a", 10)]);
        let counts = ItemCounts::new().with("a", 3).with("b", 5);
        assert_eq!(prices.appraise(&counts), 30);
    }

    #[test]
    fn zero_count_is_not_recorded() {
        let counts = ItemCounts::new().with("1", 0);
        assert!(counts.is_empty());
    }
}
