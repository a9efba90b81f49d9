use crate::sanitize::Sanitizer;
use perspec_common::Tweet;

/// Average English words per model token.
pub const WORDS_PER_TOKEN: f64 = 0.75;

/// Packs cleaned tweets into a prompt context bounded by a token budget.
#[derive(Debug, Clone)]
pub struct Packer {
    sanitizer: Sanitizer,
    words_per_token: f64,
}

impl Packer {
    pub fn new(sanitizer: Sanitizer) -> Self {
        Self {
            sanitizer,
            words_per_token: WORDS_PER_TOKEN,
        }
    }

    pub fn word_budget(&self, token_limit: usize) -> usize {
        (token_limit as f64 * self.words_per_token).floor() as usize
    }

    /// One cleaned tweet per line, stopping at the word budget.
    ///
    /// ```
    /// use perspec_common::Tweet;
    /// use perspec_pipeline::{Packer, Sanitizer};
    ///
    /// let packer = Packer::new(Sanitizer::new(5).unwrap());
    /// let tweets = vec![
    ///     Tweet::new("2", "the quick brown fox jumps over"),
    ///     Tweet::new("1", "short one"),
    ///     Tweet::new("0", "a lazy dog sleeps in the sun"),
    /// ];
    /// assert_eq!(
    ///     packer.pack(&tweets, 10),
    ///     "the quick brown fox jumps over\na"
    /// );
    /// assert_eq!(packer.pack(&[], 3400), "");
    /// ```
    pub fn pack(&self, tweets: &[Tweet], token_limit: usize) -> String {
        let budget = self.word_budget(token_limit);
        let mut used = 0usize;
        let mut lines: Vec<String> = Vec::new();

        for tweet in tweets {
            if used >= budget {
                break;
            }
            let Some(clean) = self.sanitizer.sanitize(&tweet.text) else {
                continue;
            };
            let words: Vec<&str> = clean
                .split_whitespace()
                .filter(|w| *w != "-")
                .take(budget - used)
                .collect();
            if words.is_empty() {
                continue;
            }
            used += words.len();
            lines.push(words.join(" "));
        }

        lines.join("\n").trim().to_string()
    }

    /// Clip free text to the word budget without the per-tweet filters.
    pub fn clip(&self, text: &str, token_limit: usize) -> String {
        text.split_whitespace()
            .take(self.word_budget(token_limit))
            .collect::<Vec<_>>()
            .join(" ")
    }
}
