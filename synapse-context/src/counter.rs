//! Token count estimation for context messages.

use synapse_types::ContextMessage;

/// Per-message overhead for role markers and formatting.
const ROLE_OVERHEAD: usize = 4;

/// Estimates token counts from text using a configurable chars-per-token ratio.
///
/// This is a heuristic estimator — real tokenization varies per model. The
/// default ratio of 4.0 chars/token approximates GPT-family and Claude models.
/// The manager counts each message exactly once at insertion; strategies
/// trust the precomputed `tokens` field thereafter.
///
/// # Example
///
/// ```
/// use synapse_context::TokenCounter;
///
/// let counter = TokenCounter::new();
/// let estimate = counter.count_text("Hello, world!");
/// assert!(estimate > 0);
/// ```
#[derive(Debug, Clone)]
pub struct TokenCounter {
    chars_per_token: f32,
}

impl Default for TokenCounter {
    fn default() -> Self {
        Self::new()
    }
}

impl TokenCounter {
    /// Creates a new `TokenCounter` with the default ratio of 4.0 chars/token.
    #[must_use]
    pub fn new() -> Self {
        Self { chars_per_token: 4.0 }
    }

    /// Creates a new `TokenCounter` with a custom chars-per-token ratio.
    #[must_use]
    pub fn with_ratio(chars_per_token: f32) -> Self {
        Self { chars_per_token }
    }

    /// Estimates the number of tokens in a text string.
    #[must_use]
    pub fn count_text(&self, text: &str) -> usize {
        (text.len() as f32 / self.chars_per_token).ceil() as usize
    }

    /// Estimates the token count of a message body, including the
    /// per-message overhead for role markers.
    #[must_use]
    pub fn count_message(&self, content: &str) -> usize {
        ROLE_OVERHEAD + self.count_text(content)
    }

    /// Sums the precomputed token counts of a message slice.
    #[must_use]
    pub fn total(&self, messages: &[ContextMessage]) -> usize {
        messages.iter().map(|m| m.tokens).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use synapse_types::ContextMessage;

    #[test]
    fn empty_text_counts_zero() {
        let counter = TokenCounter::new();
        assert_eq!(counter.count_text(""), 0);
    }

    #[test]
    fn count_rounds_up() {
        let counter = TokenCounter::new();
        // 5 chars at 4.0 chars/token rounds up to 2
        assert_eq!(counter.count_text("aaaaa"), 2);
    }

    #[test]
    fn custom_ratio_applies() {
        let counter = TokenCounter::with_ratio(2.0);
        assert_eq!(counter.count_text("aaaa"), 2);
        // message adds the role overhead
        assert_eq!(counter.count_message("aaaa"), 6);
    }

    #[test]
    fn total_sums_precomputed_tokens() {
        let counter = TokenCounter::new();
        let msgs = vec![
            ContextMessage::user("m1", "hello", 10),
            ContextMessage::assistant("m2", "world", 7),
        ];
        assert_eq!(counter.total(&msgs), 17);
    }
}
