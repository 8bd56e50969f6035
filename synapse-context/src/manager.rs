//! The context manager: owns the message list, token totals, and strategy
//! selection, and exposes the add/prune/export contract the agent loop
//! consumes.

use serde::{Deserialize, Serialize};
use synapse_types::{
    ContextError, ContextMessage, LlmMessage, MessageId, PruningResult, PruningStrategy, Role,
};

use crate::counter::TokenCounter;
use crate::strategies::{BoxedStrategy, SlidingWindowConfig, SlidingWindowStrategy};

/// Default token budget when none is configured.
const DEFAULT_MAX_TOKENS: usize = 8_000;

/// Prefix of manager-assigned message ids.
const ID_PREFIX: &str = "msg-";

/// Optional per-message fields for [`ContextManager::add_message_with`].
#[derive(Debug, Clone, Default)]
pub struct AddOptions {
    /// Explicit priority in `[0, 1]`, consumed by the priority strategy.
    pub priority: Option<f32>,
    /// Caller metadata, carried verbatim on the message.
    pub metadata: Option<serde_json::Value>,
}

/// Observability snapshot returned by [`ContextManager::stats`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ManagerStats {
    /// Current number of messages in the window.
    pub message_count: usize,
    /// Current token total.
    pub total_tokens: usize,
    /// Configured token budget.
    pub max_tokens: usize,
    /// `total_tokens / max_tokens`.
    pub utilization: f32,
    /// Pruning passes run so far.
    pub prune_passes: u64,
    /// Messages removed across all passes.
    pub messages_removed: u64,
    /// Tokens removed across all passes.
    pub tokens_removed: u64,
}

/// A lossless snapshot of manager state for export/import round-trips.
///
/// No byte format is owned here — serialize with any serde format.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContextExport {
    /// The full message list, in order.
    pub messages: Vec<ContextMessage>,
    /// Token total at export time (verified on import).
    pub total_tokens: usize,
    /// Token budget at export time.
    pub max_tokens: usize,
    /// When the snapshot was taken.
    pub exported_at: chrono::DateTime<chrono::Utc>,
}

/// Owns one conversation's context window.
///
/// The manager appends messages, tracks the running token total, and
/// delegates to its [`BoxedStrategy`] when the budget is exceeded. It holds
/// the invariant `total_tokens == sum(messages[i].tokens)` after every
/// mutation.
///
/// Not designed for concurrent mutation: callers serialize
/// `add_message`/`prune` on a given instance, or put the manager behind
/// their own mutex or actor boundary.
pub struct ContextManager {
    messages: Vec<ContextMessage>,
    total_tokens: usize,
    max_tokens: usize,
    auto_prune: bool,
    next_id: u64,
    counter: TokenCounter,
    strategy: BoxedStrategy,
    prune_passes: u64,
    messages_removed: u64,
    tokens_removed: u64,
}

impl ContextManager {
    /// Start building a manager.
    #[must_use]
    pub fn builder() -> ContextManagerBuilder {
        ContextManagerBuilder::default()
    }

    /// Append a message, computing its token count at insertion.
    ///
    /// Triggers a pruning pass as a side effect when auto-pruning is on and
    /// the new total exceeds the budget. A `Role::System` message is routed
    /// through [`Self::set_system_message`] instead of appended.
    pub async fn add_message(&mut self, role: Role, content: impl Into<String>) -> MessageId {
        self.add_message_with(role, content, AddOptions::default()).await
    }

    /// [`Self::add_message`] with explicit priority/metadata.
    pub async fn add_message_with(
        &mut self,
        role: Role,
        content: impl Into<String>,
        options: AddOptions,
    ) -> MessageId {
        let content = content.into();
        if role == Role::System {
            return self.set_system_message(content);
        }

        let id = self.push_message(role, content, options);
        if self.auto_prune && self.needs_pruning() {
            self.prune().await;
        }
        id
    }

    /// Append a batch of messages with a single auto-prune check at the end.
    pub async fn add_messages<I>(&mut self, items: I) -> Vec<MessageId>
    where
        I: IntoIterator<Item = (Role, String)>,
    {
        let mut ids = Vec::new();
        for (role, content) in items {
            if role == Role::System {
                ids.push(self.set_system_message(content));
            } else {
                ids.push(self.push_message(role, content, AddOptions::default()));
            }
        }
        if self.auto_prune && self.needs_pruning() {
            self.prune().await;
        }
        ids
    }

    /// Upsert the single tracked system message, kept at index 0.
    ///
    /// At most one system message exists at a time; strategies configured
    /// with `preserve_system` guarantee it survives every pass verbatim.
    pub fn set_system_message(&mut self, content: impl Into<String>) -> MessageId {
        let content = content.into();
        let tokens = self.counter.count_message(&content);
        let id = self.fresh_id();
        let message = ContextMessage::new(id.clone(), Role::System, content, tokens);

        if let Some(pos) = self.messages.iter().position(|m| m.role == Role::System) {
            self.total_tokens -= self.messages[pos].tokens;
            self.messages.remove(pos);
        }
        self.messages.insert(0, message);
        self.total_tokens += tokens;
        id
    }

    /// True iff the current token total exceeds the budget.
    #[must_use]
    pub fn needs_pruning(&self) -> bool {
        self.total_tokens > self.max_tokens
    }

    /// Run one pruning pass with the configured strategy and apply its
    /// result. Never errors: strategies degrade rather than fail.
    pub async fn prune(&mut self) -> PruningResult {
        let result = self
            .strategy
            .prune(self.messages.clone(), self.max_tokens, self.total_tokens)
            .await;

        self.messages = result.messages.clone();
        self.total_tokens = self.messages.iter().map(|m| m.tokens).sum();
        self.prune_passes += 1;
        self.messages_removed += result.removed_count as u64;
        self.tokens_removed += result.removed_tokens as u64;

        tracing::info!(
            strategy = result.strategy,
            removed = result.removed_count,
            removed_tokens = result.removed_tokens,
            total_tokens = self.total_tokens,
            "prune pass applied"
        );
        result
    }

    /// The current window in provider-ready form: role and content only.
    #[must_use]
    pub fn messages_for_llm(&self) -> Vec<LlmMessage> {
        self.messages.iter().map(LlmMessage::from).collect()
    }

    /// Case-insensitive substring search over the live window, newest first.
    #[must_use]
    pub fn search(&self, query: &str) -> Vec<&ContextMessage> {
        let needle = query.to_lowercase();
        self.messages
            .iter()
            .rev()
            .filter(|m| m.content.to_lowercase().contains(&needle))
            .collect()
    }

    /// Remove a single message by id. Returns whether it existed.
    pub fn remove_message(&mut self, id: &MessageId) -> bool {
        match self.messages.iter().position(|m| &m.id == id) {
            Some(pos) => {
                let removed = self.messages.remove(pos);
                self.total_tokens -= removed.tokens;
                true
            }
            None => false,
        }
    }

    /// Drop all messages. Strategy-level caches are untouched — they live
    /// inside the strategy object, not here.
    pub fn clear(&mut self) {
        self.messages.clear();
        self.total_tokens = 0;
    }

    /// [`Self::clear`] plus zeroed cumulative stats.
    pub fn reset(&mut self) {
        self.clear();
        self.prune_passes = 0;
        self.messages_removed = 0;
        self.tokens_removed = 0;
    }

    /// Snapshot the full state for persistence or transfer.
    #[must_use]
    pub fn export(&self) -> ContextExport {
        ContextExport {
            messages: self.messages.clone(),
            total_tokens: self.total_tokens,
            max_tokens: self.max_tokens,
            exported_at: chrono::Utc::now(),
        }
    }

    /// Replace the manager state with a snapshot.
    ///
    /// # Errors
    ///
    /// Fails with [`ContextError::Import`] when the snapshot violates the
    /// token-total invariant, leaving the current state untouched.
    pub fn import(&mut self, export: ContextExport) -> Result<(), ContextError> {
        let sum: usize = export.messages.iter().map(|m| m.tokens).sum();
        if sum != export.total_tokens {
            return Err(ContextError::Import(format!(
                "token total mismatch: snapshot claims {}, messages sum to {sum}",
                export.total_tokens
            )));
        }

        // Keep id assignment ahead of any imported manager-style ids.
        for msg in &export.messages {
            if let Some(n) = msg.id.as_str().strip_prefix(ID_PREFIX) {
                if let Ok(n) = n.parse::<u64>() {
                    self.next_id = self.next_id.max(n + 1);
                }
            }
        }

        self.messages = export.messages;
        self.total_tokens = export.total_tokens;
        self.max_tokens = export.max_tokens;
        Ok(())
    }

    /// Current observability snapshot.
    #[must_use]
    pub fn stats(&self) -> ManagerStats {
        ManagerStats {
            message_count: self.messages.len(),
            total_tokens: self.total_tokens,
            max_tokens: self.max_tokens,
            utilization: if self.max_tokens > 0 {
                self.total_tokens as f32 / self.max_tokens as f32
            } else {
                0.0
            },
            prune_passes: self.prune_passes,
            messages_removed: self.messages_removed,
            tokens_removed: self.tokens_removed,
        }
    }

    /// Swap the active pruning strategy. Takes effect on the next pass.
    pub fn update_strategy(&mut self, strategy: BoxedStrategy) {
        self.strategy = strategy;
    }

    /// Change the token budget. Takes effect on the next pruning check.
    pub fn update_max_tokens(&mut self, max_tokens: usize) {
        self.max_tokens = max_tokens;
    }

    /// The current window, in order.
    #[must_use]
    pub fn messages(&self) -> &[ContextMessage] {
        &self.messages
    }

    /// The running token total.
    #[must_use]
    pub fn total_tokens(&self) -> usize {
        self.total_tokens
    }

    /// The configured token budget.
    #[must_use]
    pub fn max_tokens(&self) -> usize {
        self.max_tokens
    }

    fn fresh_id(&mut self) -> MessageId {
        let id = MessageId::new(format!("{ID_PREFIX}{}", self.next_id));
        self.next_id += 1;
        id
    }

    fn push_message(&mut self, role: Role, content: String, options: AddOptions) -> MessageId {
        let tokens = self.counter.count_message(&content);
        let id = self.fresh_id();
        let mut message = ContextMessage::new(id.clone(), role, content, tokens);
        message.priority = options.priority;
        message.metadata = options.metadata;

        self.messages.push(message);
        self.total_tokens += tokens;
        id
    }
}

/// Builder for [`ContextManager`].
///
/// Defaults: 8,000-token budget, auto-pruning on, default token counter,
/// and a sliding-window strategy with its default configuration.
pub struct ContextManagerBuilder {
    max_tokens: usize,
    auto_prune: bool,
    counter: TokenCounter,
    strategy: BoxedStrategy,
}

impl Default for ContextManagerBuilder {
    fn default() -> Self {
        let strategy = SlidingWindowStrategy::new(SlidingWindowConfig::default())
            .expect("default sliding window config is valid");
        Self {
            max_tokens: DEFAULT_MAX_TOKENS,
            auto_prune: true,
            counter: TokenCounter::new(),
            strategy: BoxedStrategy::new(strategy),
        }
    }
}

impl ContextManagerBuilder {
    /// Set the token budget.
    #[must_use]
    pub fn max_tokens(mut self, max_tokens: usize) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    /// Enable or disable pruning as a side effect of `add_message`.
    #[must_use]
    pub fn auto_prune(mut self, auto_prune: bool) -> Self {
        self.auto_prune = auto_prune;
        self
    }

    /// Use a custom [`TokenCounter`].
    #[must_use]
    pub fn counter(mut self, counter: TokenCounter) -> Self {
        self.counter = counter;
        self
    }

    /// Use the given pruning strategy.
    #[must_use]
    pub fn strategy(mut self, strategy: BoxedStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    /// Finish building.
    #[must_use]
    pub fn build(self) -> ContextManager {
        ContextManager {
            messages: Vec::new(),
            total_tokens: 0,
            max_tokens: self.max_tokens,
            auto_prune: self.auto_prune,
            next_id: 1,
            counter: self.counter,
            strategy: self.strategy,
            prune_passes: 0,
            messages_removed: 0,
            tokens_removed: 0,
        }
    }
}
