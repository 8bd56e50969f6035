//! Pruning strategies implementing [`PruningStrategy`].
//!
//! Four policies behind one contract: sliding window (recency only),
//! priority (weighted scoring), summary (LLM-backed collapse of old turns),
//! and semantic (embedding similarity with keyword fallback). The sliding
//! window is the deterministic fallback target for every other strategy.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use synapse_types::{ContextMessage, PruningResult, PruningStrategy, Role};

pub mod priority;
pub mod semantic;
pub mod sliding_window;
pub mod summary;

pub use priority::{PriorityConfig, PriorityStrategy};
pub use semantic::{SemanticConfig, SemanticStrategy};
pub use sliding_window::{SlidingWindowConfig, SlidingWindowStrategy};
pub use summary::{SummaryConfig, SummaryStrategy};

// ---- Dyn-compatible wrapper -------------------------------------------------

/// Type alias for a pinned, boxed, `Send` future returning a pruning result.
type PruneFuture<'a> = Pin<Box<dyn Future<Output = PruningResult> + Send + 'a>>;

/// A dyn-compatible strategy object.
///
/// Because `PruningStrategy::prune` returns `impl Future` (RPITIT), the trait
/// is not dyn-compatible. `ErasedStrategy` provides a vtable-friendly
/// equivalent that boxes the future.
trait ErasedStrategy: Send + Sync {
    fn erased_name(&self) -> &'static str;
    fn erased_prune<'a>(
        &'a self,
        messages: Vec<ContextMessage>,
        max_tokens: usize,
        current_tokens: usize,
    ) -> PruneFuture<'a>;
}

impl<S: PruningStrategy> ErasedStrategy for S {
    fn erased_name(&self) -> &'static str {
        self.name()
    }

    fn erased_prune<'a>(
        &'a self,
        messages: Vec<ContextMessage>,
        max_tokens: usize,
        current_tokens: usize,
    ) -> PruneFuture<'a> {
        Box::pin(self.prune(messages, max_tokens, current_tokens))
    }
}

/// A type-erased wrapper around a [`PruningStrategy`].
///
/// The [`crate::ContextManager`] holds strategies through this wrapper so the
/// active strategy can be swapped at runtime (`update_strategy`).
///
/// # Example
///
/// ```
/// use synapse_context::{BoxedStrategy, SlidingWindowStrategy, SlidingWindowConfig};
///
/// let strategy = SlidingWindowStrategy::new(SlidingWindowConfig::default()).unwrap();
/// let boxed = BoxedStrategy::new(strategy);
/// ```
#[derive(Clone)]
pub struct BoxedStrategy(Arc<dyn ErasedStrategy>);

impl BoxedStrategy {
    /// Wrap any [`PruningStrategy`] into a type-erased `BoxedStrategy`.
    #[must_use]
    pub fn new<S: PruningStrategy + 'static>(strategy: S) -> Self {
        BoxedStrategy(Arc::new(strategy))
    }
}

impl PruningStrategy for BoxedStrategy {
    fn name(&self) -> &'static str {
        self.0.erased_name()
    }

    fn prune(
        &self,
        messages: Vec<ContextMessage>,
        max_tokens: usize,
        current_tokens: usize,
    ) -> impl Future<Output = PruningResult> + Send {
        let inner = Arc::clone(&self.0);
        async move { inner.erased_prune(messages, max_tokens, current_tokens).await }
    }
}

// ---- Shared plumbing ---------------------------------------------------------

/// Split a message list into system messages and regular messages,
/// preserving chronological order within each part.
///
/// When `preserve` is false, everything lands in the regular part and system
/// messages compete for the budget like any other message.
pub(crate) fn split_system(
    messages: Vec<ContextMessage>,
    preserve: bool,
) -> (Vec<ContextMessage>, Vec<ContextMessage>) {
    if !preserve {
        return (Vec::new(), messages);
    }
    messages.into_iter().partition(|m| m.role == Role::System)
}

/// Build a [`PruningResult`] from the input totals by conservation:
/// `removed_tokens = input_tokens - kept_tokens`.
///
/// A synthetic summary can carry more tokens than the messages it replaced
/// (tiny originals, verbose summary). In that case the output is larger than
/// the input and `removed_tokens` saturates at 0 rather than underflowing;
/// the manager recomputes its running total from the returned messages, so
/// totals stay exact either way.
pub(crate) fn result_from(
    original_count: usize,
    original_tokens: usize,
    messages: Vec<ContextMessage>,
    strategy: &'static str,
    metadata: serde_json::Value,
) -> PruningResult {
    let kept_tokens: usize = messages.iter().map(|m| m.tokens).sum();
    PruningResult {
        removed_count: original_count.saturating_sub(messages.len()),
        removed_tokens: original_tokens.saturating_sub(kept_tokens),
        messages,
        strategy,
        metadata,
    }
}
