//! LLM-backed pruning: collapse old messages into one cached summary.

use std::collections::HashMap;
use std::collections::VecDeque;
use std::future::Future;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::Utc;
use synapse_types::{
    CompletionRequest, ConfigError, ContextMessage, ContextSummary, LlmClient, MessageId,
    NoClient, PruningResult, PruningStrategy,
};

use super::sliding_window::window_keep;
use super::{result_from, split_system};
use crate::counter::TokenCounter;

/// Instruction sent with every summarization call.
const SUMMARY_PROMPT: &str = "Summarize the conversation below concisely. Focus on key \
     information, decisions made, and open questions. Write in third person.";

/// Output budget for summarization calls.
const SUMMARY_MAX_TOKENS: usize = 512;

/// Maximum cached summaries before the oldest entry is evicted.
const SUMMARY_CACHE_CAP: usize = 128;

/// Configuration for [`SummaryStrategy`].
#[derive(Debug, Clone)]
pub struct SummaryConfig {
    /// Message count above which a pass does real work. Must be ≥ 1.
    pub max_messages: usize,
    /// Below this many regular messages, fall back to the sliding window
    /// instead of summarizing. Must be ≥ 2.
    pub summary_threshold: usize,
    /// Most recent messages kept verbatim. Must be ≥ 1 and strictly less
    /// than `summary_threshold`.
    pub keep_recent_count: usize,
    /// Model passed to the LLM client (empty lets the client pick).
    pub model: String,
    /// Keep the system message out of summarization and guarantee it survives.
    pub preserve_system: bool,
}

impl Default for SummaryConfig {
    fn default() -> Self {
        Self {
            max_messages: 20,
            summary_threshold: 10,
            keep_recent_count: 5,
            model: String::new(),
            preserve_system: true,
        }
    }
}

/// Id-set-keyed summary cache with FIFO eviction.
///
/// Keys are ever-growing id sets, so the cache is capped: week-long
/// sessions must not grow it without limit.
struct SummaryCache {
    entries: HashMap<String, ContextSummary>,
    order: VecDeque<String>,
}

impl SummaryCache {
    fn new() -> Self {
        Self { entries: HashMap::new(), order: VecDeque::new() }
    }

    fn get(&self, key: &str) -> Option<ContextSummary> {
        self.entries.get(key).cloned()
    }

    fn insert(&mut self, key: String, summary: ContextSummary) {
        if self.entries.len() >= SUMMARY_CACHE_CAP {
            if let Some(oldest) = self.order.pop_front() {
                self.entries.remove(&oldest);
            }
        }
        if self.entries.insert(key.clone(), summary).is_none() {
            self.order.push_back(key);
        }
    }

    fn clear(&mut self) {
        self.entries.clear();
        self.order.clear();
    }
}

/// Keeps the most recent `keep_recent_count` messages verbatim and collapses
/// everything older into a single LLM-generated summary message, cached by
/// the id set it replaces.
///
/// Degradation ladder: no client configured → sliding-window fallback;
/// too few messages to be worth a call → sliding-window fallback; LLM call
/// fails → placeholder summary for this pass (not cached, so the next pass
/// retries). A prune pass never errors.
///
/// # Example
///
/// ```ignore
/// use synapse_context::{SummaryStrategy, SummaryConfig};
///
/// let strategy = SummaryStrategy::with_client(SummaryConfig::default(), client)?;
/// ```
pub struct SummaryStrategy<P = NoClient> {
    config: SummaryConfig,
    client: Option<P>,
    counter: TokenCounter,
    cache: Mutex<SummaryCache>,
    summaries_created: AtomicU64,
    cache_hits: AtomicU64,
    next_summary_id: AtomicU64,
}

fn validate(config: &SummaryConfig) -> Result<(), ConfigError> {
    if config.max_messages < 1 {
        return Err(ConfigError::TooSmall {
            field: "max_messages",
            min: 1,
            got: config.max_messages,
        });
    }
    if config.summary_threshold < 2 {
        return Err(ConfigError::TooSmall {
            field: "summary_threshold",
            min: 2,
            got: config.summary_threshold,
        });
    }
    if config.keep_recent_count < 1 {
        return Err(ConfigError::TooSmall {
            field: "keep_recent_count",
            min: 1,
            got: config.keep_recent_count,
        });
    }
    if config.keep_recent_count >= config.summary_threshold {
        return Err(ConfigError::OrderViolation {
            smaller: "keep_recent_count",
            smaller_value: config.keep_recent_count,
            larger: "summary_threshold",
            larger_value: config.summary_threshold,
        });
    }
    Ok(())
}

impl SummaryStrategy<NoClient> {
    /// Creates a `SummaryStrategy` without an LLM client. Every pass
    /// degrades deterministically to the sliding-window fallback.
    ///
    /// # Errors
    ///
    /// Fails on invalid configuration (see [`SummaryConfig`] field docs).
    pub fn new(config: SummaryConfig) -> Result<Self, ConfigError> {
        validate(&config)?;
        Ok(Self {
            config,
            client: None,
            counter: TokenCounter::new(),
            cache: Mutex::new(SummaryCache::new()),
            summaries_created: AtomicU64::new(0),
            cache_hits: AtomicU64::new(0),
            next_summary_id: AtomicU64::new(0),
        })
    }
}

impl<P: LlmClient> SummaryStrategy<P> {
    /// Creates a `SummaryStrategy` backed by an LLM client.
    ///
    /// # Errors
    ///
    /// Fails on invalid configuration (see [`SummaryConfig`] field docs).
    pub fn with_client(config: SummaryConfig, client: P) -> Result<Self, ConfigError> {
        validate(&config)?;
        Ok(Self {
            config,
            client: Some(client),
            counter: TokenCounter::new(),
            cache: Mutex::new(SummaryCache::new()),
            summaries_created: AtomicU64::new(0),
            cache_hits: AtomicU64::new(0),
            next_summary_id: AtomicU64::new(0),
        })
    }
}

impl<P> SummaryStrategy<P> {
    /// Number of summaries generated by the LLM client so far.
    pub fn summaries_created(&self) -> u64 {
        self.summaries_created.load(Ordering::SeqCst)
    }

    /// Number of prune passes served from the summary cache.
    pub fn cache_hits(&self) -> u64 {
        self.cache_hits.load(Ordering::SeqCst)
    }

    /// Drop every cached summary. Counters are untouched.
    pub fn clear_cache(&self) {
        self.cache.lock().expect("summary cache poisoned").clear();
    }

    /// Reset the `summaries_created` / `cache_hits` counters to zero.
    pub fn reset_stats(&self) {
        self.summaries_created.store(0, Ordering::SeqCst);
        self.cache_hits.store(0, Ordering::SeqCst);
    }

    fn render_transcript(messages: &[ContextMessage]) -> String {
        messages
            .iter()
            .map(|m| format!("{}: {}", m.role, m.content))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

impl<P: LlmClient> PruningStrategy for SummaryStrategy<P> {
    fn name(&self) -> &'static str {
        "summary"
    }

    fn prune(
        &self,
        messages: Vec<ContextMessage>,
        max_tokens: usize,
        current_tokens: usize,
    ) -> impl Future<Output = PruningResult> + Send {
        async move {
            let original_count = messages.len();

            if original_count <= self.config.max_messages && current_tokens <= max_tokens {
                return PruningResult::identity(messages, "summary");
            }

            let (system, regular) = split_system(messages, self.config.preserve_system);

            // Too few messages to be worth an LLM call, or nothing to call
            // with: recency window instead.
            if regular.len() <= self.config.summary_threshold || self.client.is_none() {
                let kept = window_keep(system, regular, self.config.max_messages, max_tokens);
                return result_from(
                    original_count,
                    current_tokens,
                    kept,
                    "summary",
                    serde_json::json!({ "fallback": "sliding_window" }),
                );
            }

            let split_at = regular.len() - self.config.keep_recent_count;
            let old: Vec<ContextMessage> = regular[..split_at].to_vec();
            let mut recent: Vec<ContextMessage> = regular[split_at..].to_vec();

            let key = old
                .iter()
                .map(|m| m.id.as_str())
                .collect::<Vec<_>>()
                .join(",");

            let cached = self.cache.lock().expect("summary cache poisoned").get(&key);
            let (summary, cache_hit, placeholder) = match cached {
                Some(summary) => {
                    self.cache_hits.fetch_add(1, Ordering::SeqCst);
                    tracing::debug!(key_len = old.len(), "summary cache hit");
                    (summary, true, false)
                }
                None => {
                    let (summary, placeholder) = self.summarize(&old, &key).await;
                    (summary, false, placeholder)
                }
            };

            let mut kept = system;
            kept.push(summary.to_message());

            // Over budget: trim oldest-first among the verbatim recent set.
            // The summary and system messages are never dropped.
            let fixed_tokens: usize = kept.iter().map(|m| m.tokens).sum();
            let mut recent_tokens: usize = recent.iter().map(|m| m.tokens).sum();
            while fixed_tokens + recent_tokens > max_tokens && !recent.is_empty() {
                recent_tokens -= recent.remove(0).tokens;
            }
            kept.extend(recent);

            result_from(
                original_count,
                current_tokens,
                kept,
                "summary",
                serde_json::json!({
                    "cache_hit": cache_hit,
                    "placeholder": placeholder,
                    "summarized": old.len(),
                }),
            )
        }
    }
}

impl<P: LlmClient> SummaryStrategy<P> {
    /// Generate (or synthesize) the summary for `old`, caching on success.
    /// Returns the summary and whether it is a placeholder.
    async fn summarize(&self, old: &[ContextMessage], key: &str) -> (ContextSummary, bool) {
        // Checked by the caller before splitting.
        let client = self.client.as_ref().expect("client presence checked");

        let request = CompletionRequest {
            model: self.config.model.clone(),
            system: Some(SUMMARY_PROMPT.to_string()),
            prompt: Self::render_transcript(old),
            max_tokens: Some(SUMMARY_MAX_TOKENS),
            temperature: Some(0.0),
        };

        let seq = self.next_summary_id.fetch_add(1, Ordering::SeqCst) + 1;
        let message_ids: Vec<MessageId> = old.iter().map(|m| m.id.clone()).collect();

        match client.complete(request).await {
            Ok(response) => {
                let content =
                    format!("[Summary of earlier conversation]\n{}", response.content.trim());
                let summary = ContextSummary {
                    id: MessageId::new(format!("summary-{seq}")),
                    tokens: self.counter.count_message(&content),
                    content,
                    message_ids,
                    timestamp: Utc::now(),
                    model: response.model,
                };
                self.summaries_created.fetch_add(1, Ordering::SeqCst);
                self.cache
                    .lock()
                    .expect("summary cache poisoned")
                    .insert(key.to_string(), summary.clone());
                (summary, false)
            }
            Err(err) => {
                // Per-pass degradation: a placeholder stands in for the
                // summary and is not cached, so the next pass retries.
                tracing::warn!(error = %err, "summarization failed, using placeholder");
                let content = format!("[Summary of {} messages...]", old.len());
                let summary = ContextSummary {
                    id: MessageId::new(format!("summary-{seq}")),
                    tokens: self.counter.count_message(&content),
                    content,
                    message_ids,
                    timestamp: Utc::now(),
                    model: String::new(),
                };
                (summary, true)
            }
        }
    }
}
