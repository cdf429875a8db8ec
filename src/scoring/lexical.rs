//! Lexical match primitive
//!
//! Case-insensitive phrase and token matching over two classes of fields.
//! Title-class hits weigh more than body-class hits. The input is treated as
//! opaque text: quotes, SQL metacharacters and markup are just bytes to match.

use memchr::memmem;

/// Score for an empty query: relevance is unknown, not zero.
pub const NEUTRAL_SCORE: f64 = 0.5;
/// Score when nothing matches, so combined scores stay orderable.
pub const NO_MATCH_FLOOR: f64 = 0.1;

const TITLE_PHRASE_SCORE: f64 = 0.9;
const BODY_PHRASE_SCORE: f64 = 0.6;
const TITLE_COVERAGE_SPAN: f64 = 0.6;
const BODY_COVERAGE_SPAN: f64 = 0.35;

/// Queries beyond this many characters are cut rather than rejected.
pub const MAX_QUERY_CHARS: usize = 4096;

/// Searchable text of one candidate, split by field class.
#[derive(Debug, Default, Clone)]
pub struct SearchableText<'a> {
    title: Vec<&'a str>,
    body: Vec<&'a str>,
}

impl<'a> SearchableText<'a> {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn title(mut self, text: &'a str) -> Self {
        self.title.push(text);
        self
    }

    #[must_use]
    pub fn body(mut self, text: &'a str) -> Self {
        self.body.push(text);
        self
    }

    #[must_use]
    pub fn body_opt(self, text: Option<&'a str>) -> Self {
        match text {
            Some(text) => self.body(text),
            None => self,
        }
    }

    #[must_use]
    pub fn body_all<I>(mut self, texts: I) -> Self
    where
        I: IntoIterator<Item = &'a str>,
    {
        self.body.extend(texts);
        self
    }
}

/// A query normalized once and scored against many candidates.
#[derive(Debug, Clone)]
pub struct LexicalQuery {
    phrase: String,
    tokens: Vec<String>,
}

impl LexicalQuery {
    pub fn new(query: &str) -> Self {
        let truncated: String = query.chars().take(MAX_QUERY_CHARS).collect();
        let phrase = truncated
            .split_whitespace()
            .collect::<Vec<_>>()
            .join(" ")
            .to_lowercase();

        let mut tokens: Vec<String> = Vec::new();
        for token in phrase.split(|c: char| !c.is_alphanumeric()) {
            if !token.is_empty() && !tokens.iter().any(|t| t == token) {
                tokens.push(token.to_string());
            }
        }

        Self { phrase, tokens }
    }

    pub fn is_empty(&self) -> bool {
        self.phrase.is_empty()
    }

    /// Relevance in [0.1, 0.9], or exactly 0.5 for an empty query.
    pub fn score(&self, text: &SearchableText<'_>) -> f64 {
        if self.is_empty() {
            return NEUTRAL_SCORE;
        }

        let title = lowered(&text.title);
        let body = lowered(&text.body);

        let mut best = NO_MATCH_FLOOR;
        if contains(&title, &self.phrase) {
            best = best.max(TITLE_PHRASE_SCORE);
        }
        if contains(&body, &self.phrase) {
            best = best.max(BODY_PHRASE_SCORE);
        }

        if !self.tokens.is_empty() {
            best = best.max(NO_MATCH_FLOOR + TITLE_COVERAGE_SPAN * self.coverage(&title));
            best = best.max(NO_MATCH_FLOOR + BODY_COVERAGE_SPAN * self.coverage(&body));
        }

        best.clamp(0.0, 1.0)
    }

    #[allow(clippy::cast_precision_loss)]
    fn coverage(&self, haystack: &str) -> f64 {
        if haystack.is_empty() {
            return 0.0;
        }
        let hits = self
            .tokens
            .iter()
            .filter(|token| contains(haystack, token))
            .count();
        hits as f64 / self.tokens.len() as f64
    }
}

/// One-shot convenience over [`LexicalQuery`].
pub fn lexical_score(query: &str, text: &SearchableText<'_>) -> f64 {
    LexicalQuery::new(query).score(text)
}

fn lowered(fields: &[&str]) -> String {
    fields.join("\n").to_lowercase()
}

fn contains(haystack: &str, needle: &str) -> bool {
    !needle.is_empty() && memmem::find(haystack.as_bytes(), needle.as_bytes()).is_some()
}
