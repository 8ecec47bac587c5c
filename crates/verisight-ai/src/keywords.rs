//! Precompiled substring matchers for keyword and marker sets.
//!
//! Each set compiles to a single Aho-Corasick automaton, so testing a label
//! against a whole set is one pass over the label regardless of set size.

use aho_corasick::{AhoCorasick, BuildError};

/// Case-insensitive "does any keyword occur in this text" matcher.
#[derive(Debug, Clone)]
pub struct KeywordMatcher {
    automaton: AhoCorasick,
    keywords: Vec<String>,
}

impl KeywordMatcher {
    /// Compile a matcher from a keyword list. Keywords are lower-cased;
    /// blanks are dropped.
    pub fn new<I, S>(keywords: I) -> Result<Self, BuildError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let keywords: Vec<String> = keywords
            .into_iter()
            .map(|k| k.as_ref().trim().to_lowercase())
            .filter(|k| !k.is_empty())
            .collect();

        let automaton = AhoCorasick::builder()
            .ascii_case_insensitive(true)
            .build(&keywords)?;

        Ok(Self {
            automaton,
            keywords,
        })
    }

    /// True if at least one keyword is a substring of `text`.
    pub fn is_match(&self, text: &str) -> bool {
        self.automaton.is_match(text)
    }

    /// Every distinct keyword occurring in `text`, in keyword-list order.
    pub fn matches(&self, text: &str) -> Vec<&str> {
        let mut hit = vec![false; self.keywords.len()];
        for m in self.automaton.find_overlapping_iter(text) {
            hit[m.pattern().as_usize()] = true;
        }
        self.keywords
            .iter()
            .zip(hit)
            .filter_map(|(k, h)| h.then_some(k.as_str()))
            .collect()
    }
}
