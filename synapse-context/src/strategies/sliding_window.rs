//! Recency-only pruning: keep the most recent N messages.

use std::future::Future;

use synapse_types::{ConfigError, ContextMessage, PruningResult, PruningStrategy};

use super::{result_from, split_system};

/// Configuration for [`SlidingWindowStrategy`].
#[derive(Debug, Clone)]
pub struct SlidingWindowConfig {
    /// Maximum number of regular (non-system) messages to retain. Must be ≥ 1.
    pub max_messages: usize,
    /// Keep the system message out of scoring and guarantee it survives.
    pub preserve_system: bool,
}

impl Default for SlidingWindowConfig {
    fn default() -> Self {
        Self { max_messages: 50, preserve_system: true }
    }
}

/// Keeps the system message (when preserving) plus the most recent
/// `max_messages` regular messages, then trims oldest-first inside the
/// window until the token budget fits.
///
/// Deterministic, no external calls — the simplest possible policy and the
/// fallback target for every other strategy. The most recent regular message
/// is never trimmed, even when it alone exceeds the budget: at that point no
/// further reduction is possible without emptying the conversation.
///
/// # Example
///
/// ```
/// use synapse_context::{SlidingWindowStrategy, SlidingWindowConfig};
///
/// let strategy = SlidingWindowStrategy::new(SlidingWindowConfig {
///     max_messages: 10,
///     preserve_system: true,
/// }).unwrap();
/// ```
pub struct SlidingWindowStrategy {
    config: SlidingWindowConfig,
}

impl SlidingWindowStrategy {
    /// Creates a new `SlidingWindowStrategy`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::TooSmall`] when `max_messages` is zero.
    pub fn new(config: SlidingWindowConfig) -> Result<Self, ConfigError> {
        if config.max_messages < 1 {
            return Err(ConfigError::TooSmall {
                field: "max_messages",
                min: 1,
                got: config.max_messages,
            });
        }
        Ok(Self { config })
    }
}

/// Core window computation, shared with the fallback paths of the other
/// strategies: last `max_messages` regular messages, then oldest-first
/// trimming against the budget. System messages (already split off by the
/// caller) count against the budget but are never trimmed.
pub(crate) fn window_keep(
    system: Vec<ContextMessage>,
    regular: Vec<ContextMessage>,
    max_messages: usize,
    max_tokens: usize,
) -> Vec<ContextMessage> {
    let system_tokens: usize = system.iter().map(|m| m.tokens).sum();

    let skip = regular.len().saturating_sub(max_messages);
    let mut window: Vec<ContextMessage> = regular.into_iter().skip(skip).collect();

    let mut window_tokens: usize = window.iter().map(|m| m.tokens).sum();
    let mut drop_from = 0;
    while window.len() - drop_from > 1 && system_tokens + window_tokens > max_tokens {
        window_tokens -= window[drop_from].tokens;
        drop_from += 1;
    }
    window.drain(..drop_from);

    let mut result = system;
    result.extend(window);
    result
}

impl PruningStrategy for SlidingWindowStrategy {
    fn name(&self) -> &'static str {
        "sliding_window"
    }

    fn prune(
        &self,
        messages: Vec<ContextMessage>,
        max_tokens: usize,
        current_tokens: usize,
    ) -> impl Future<Output = PruningResult> + Send {
        let config = self.config.clone();
        async move {
            let original_count = messages.len();

            if original_count <= config.max_messages && current_tokens <= max_tokens {
                return PruningResult::identity(messages, "sliding_window");
            }

            let (system, regular) = split_system(messages, config.preserve_system);
            let kept = window_keep(system, regular, config.max_messages, max_tokens);

            tracing::debug!(
                kept = kept.len(),
                removed = original_count - kept.len(),
                "sliding window prune"
            );

            result_from(
                original_count,
                current_tokens,
                kept,
                "sliding_window",
                serde_json::Value::Null,
            )
        }
    }
}
