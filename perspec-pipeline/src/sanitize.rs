use regex::Regex;

/// Mojibake left behind when U+FFFD is decoded as Latin-1.
const MOJIBAKE: &str = "ï¿½";

/// Cleans tweet text and rejects tweets too short to carry meaning.
#[derive(Debug, Clone)]
pub struct Sanitizer {
    min_words: usize,
    url: Regex,
    high_chars: Regex,
    line_breaks: Regex,
    spaces: Regex,
}

impl Sanitizer {
    pub const DEFAULT_MIN_WORDS: usize = 5;

    /// Tweets need more than `min_words` words to be kept.
    pub fn new(min_words: usize) -> Result<Self, regex::Error> {
        Ok(Self {
            min_words,
            url: Regex::new(r"(?:https?|ftp)://\S+")?,
            high_chars: Regex::new(r"[\x{1000}-\x{10FFFF}]+")?,
            line_breaks: Regex::new(r"[ \t]*\n\s*")?,
            spaces: Regex::new(r"[ \t]{2,}")?,
        })
    }

    pub fn min_words(&self) -> usize {
        self.min_words
    }

    /// Clean one tweet, or `None` when it is too short after cleaning.
    ///
    /// ```
    /// use perspec_pipeline::Sanitizer;
    ///
    /// let s = Sanitizer::new(5).unwrap();
    /// assert_eq!(
    ///     s.sanitize("- shipping the new build today https://t.co/x  🚀 wish us luck").as_deref(),
    ///     Some("shipping the new build today wish us luck")
    /// );
    /// assert_eq!(s.sanitize("too short"), None);
    /// ```
    pub fn sanitize(&self, raw: &str) -> Option<String> {
        let text = self.url.replace_all(raw, "");
        let text = self.high_chars.replace_all(&text, "");
        let text = text.replace(MOJIBAKE, "");
        let text = self.line_breaks.replace_all(&text, "\n");
        let text = self.spaces.replace_all(&text, " ");
        let text = text.trim();

        if text.split_whitespace().count() <= self.min_words {
            return None;
        }

        let text = text.strip_prefix('-').unwrap_or(text).trim();
        Some(text.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sanitizer() -> Sanitizer {
        Sanitizer::new(Sanitizer::DEFAULT_MIN_WORDS).unwrap()
    }

    #[test]
    fn removes_urls_and_double_spaces() {
        let out = sanitizer()
            .sanitize("read this  http://example.com/a?b=c and ftp://files.example.org now please friends")
            .unwrap();
        assert!(!out.contains("://"));
        assert!(!out.contains("  "));
        assert_eq!(out, "read this and now please friends");
    }

    #[test]
    fn word_threshold_is_exclusive() {
        let s = sanitizer();
        assert_eq!(s.sanitize("hello world"), None);
        assert_eq!(s.sanitize("one two three four five"), None);
        assert_eq!(
            s.sanitize("one two three four five six").as_deref(),
            Some("one two three four five six")
        );
    }

    #[test]
    fn cleaning_happens_before_counting() {
        // Six tokens raw, but two are URLs.
        let s = sanitizer();
        assert_eq!(s.sanitize("a b c d https://x.io https://y.io"), None);
    }

    #[test]
    fn strips_noise_and_collapses_line_breaks() {
        let out = sanitizer()
            .sanitize("first line here 😀\n\n  \nsecond line ï¿½ goes on")
            .unwrap();
        assert_eq!(out, "first line here\nsecond line goes on");
    }

    #[test]
    fn replacement_character_is_removed() {
        let out = sanitizer()
            .sanitize("broken \u{FFFD} text still has enough words")
            .unwrap();
        assert_eq!(out, "broken text still has enough words");
    }
}
