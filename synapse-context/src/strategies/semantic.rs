//! Embedding-backed pruning: keep the old messages most similar to the
//! recent conversation, with keyword similarity as the degraded path.

use std::collections::{HashMap, VecDeque};
use std::future::Future;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::Utc;
use synapse_types::{
    ConfigError, ContextMessage, EmbeddingClient, EmbeddingRequest, MessageEmbedding, NoClient,
    PruningResult, PruningStrategy,
};

use super::sliding_window::window_keep;
use super::{result_from, split_system};
use crate::similarity::{average_vector, cosine_similarity, jaccard_similarity, keywords};

/// Number of most recent messages used as the relevance anchor.
const ANCHOR_COUNT: usize = 5;

/// Maximum cached embeddings before the oldest entry is evicted.
const EMBEDDING_CACHE_CAP: usize = 1024;

/// Configuration for [`SemanticStrategy`].
#[derive(Debug, Clone)]
pub struct SemanticConfig {
    /// Message count above which a pass does real work, and the window size
    /// of the fallback path. Must be ≥ 1.
    pub max_messages: usize,
    /// Maximum scored candidates to keep. Must be ≥ 1 and ≤ `max_messages`.
    pub top_k: usize,
    /// Minimum similarity score a candidate must reach to be retained.
    /// Must lie in `[0, 1]`.
    pub relevance_threshold: f32,
    /// Model passed to the embedding client (empty lets the client pick).
    pub model: String,
    /// Keep the system message out of scoring and guarantee it survives.
    pub preserve_system: bool,
}

impl Default for SemanticConfig {
    fn default() -> Self {
        Self {
            max_messages: 20,
            top_k: 10,
            relevance_threshold: 0.3,
            model: String::new(),
            preserve_system: true,
        }
    }
}

/// Per-message embedding cache with FIFO eviction.
///
/// Embeddings are immutable once computed (messages never change), so
/// entries stay valid for the strategy's lifetime. The cache is capped:
/// ids accumulate for as long as the strategy lives.
struct EmbeddingCache {
    entries: HashMap<String, MessageEmbedding>,
    order: VecDeque<String>,
}

impl EmbeddingCache {
    fn new() -> Self {
        Self { entries: HashMap::new(), order: VecDeque::new() }
    }

    fn get(&self, id: &str) -> Option<Vec<f32>> {
        self.entries.get(id).map(|e| e.embedding.clone())
    }

    fn insert(&mut self, id: String, embedding: MessageEmbedding) {
        if self.entries.len() >= EMBEDDING_CACHE_CAP {
            if let Some(oldest) = self.order.pop_front() {
                self.entries.remove(&oldest);
            }
        }
        if self.entries.insert(id.clone(), embedding).is_none() {
            self.order.push_back(id);
        }
    }

    fn clear(&mut self) {
        self.entries.clear();
        self.order.clear();
    }
}

/// Keeps the most recent messages verbatim as a relevance anchor and retains
/// the `top_k` older messages most similar to them.
///
/// Similarity is cosine distance between each candidate's embedding and the
/// anchor-set average vector. When the embedding call fails, the pass
/// recomputes with keyword Jaccard similarity instead; when no client is
/// configured or there are too few candidates to rank, the pass degrades to
/// the sliding window. A prune pass never errors.
pub struct SemanticStrategy<E = NoClient> {
    config: SemanticConfig,
    client: Option<E>,
    cache: Mutex<EmbeddingCache>,
    embeddings_computed: AtomicU64,
    cache_hits: AtomicU64,
}

fn validate(config: &SemanticConfig) -> Result<(), ConfigError> {
    if config.max_messages < 1 {
        return Err(ConfigError::TooSmall {
            field: "max_messages",
            min: 1,
            got: config.max_messages,
        });
    }
    if config.top_k < 1 {
        return Err(ConfigError::TooSmall { field: "top_k", min: 1, got: config.top_k });
    }
    if config.top_k > config.max_messages {
        return Err(ConfigError::OrderViolation {
            smaller: "top_k",
            smaller_value: config.top_k,
            larger: "max_messages",
            larger_value: config.max_messages,
        });
    }
    if !(0.0..=1.0).contains(&config.relevance_threshold) {
        return Err(ConfigError::OutOfUnitRange {
            field: "relevance_threshold",
            got: config.relevance_threshold,
        });
    }
    Ok(())
}

impl SemanticStrategy<NoClient> {
    /// Creates a `SemanticStrategy` without an embedding client. Every pass
    /// degrades deterministically to the sliding-window fallback.
    ///
    /// # Errors
    ///
    /// Fails on invalid configuration (see [`SemanticConfig`] field docs).
    pub fn new(config: SemanticConfig) -> Result<Self, ConfigError> {
        validate(&config)?;
        Ok(Self {
            config,
            client: None,
            cache: Mutex::new(EmbeddingCache::new()),
            embeddings_computed: AtomicU64::new(0),
            cache_hits: AtomicU64::new(0),
        })
    }
}

impl<E: EmbeddingClient> SemanticStrategy<E> {
    /// Creates a `SemanticStrategy` backed by an embedding client.
    ///
    /// # Errors
    ///
    /// Fails on invalid configuration (see [`SemanticConfig`] field docs).
    pub fn with_client(config: SemanticConfig, client: E) -> Result<Self, ConfigError> {
        validate(&config)?;
        Ok(Self {
            config,
            client: Some(client),
            cache: Mutex::new(EmbeddingCache::new()),
            embeddings_computed: AtomicU64::new(0),
            cache_hits: AtomicU64::new(0),
        })
    }
}

impl<E> SemanticStrategy<E> {
    /// Number of embeddings currently cached.
    pub fn cached_embeddings(&self) -> usize {
        self.cache.lock().expect("embedding cache poisoned").entries.len()
    }

    /// Number of embeddings computed by the client so far.
    pub fn embeddings_computed(&self) -> u64 {
        self.embeddings_computed.load(Ordering::SeqCst)
    }

    /// Number of per-message embeddings served from the cache.
    pub fn cache_hits(&self) -> u64 {
        self.cache_hits.load(Ordering::SeqCst)
    }

    /// Drop every cached embedding. Counters are untouched.
    pub fn clear_cache(&self) {
        self.cache.lock().expect("embedding cache poisoned").clear();
    }

    /// Reset the `embeddings_computed` / `cache_hits` counters to zero.
    pub fn reset_stats(&self) {
        self.embeddings_computed.store(0, Ordering::SeqCst);
        self.cache_hits.store(0, Ordering::SeqCst);
    }

    /// Keyword-similarity scores: Jaccard between each candidate's keyword
    /// set and the union of the anchors' keywords.
    fn keyword_scores(candidates: &[ContextMessage], anchors: &[ContextMessage]) -> Vec<f32> {
        let mut anchor_keywords = std::collections::HashSet::new();
        for anchor in anchors {
            anchor_keywords.extend(keywords(&anchor.content));
        }
        candidates
            .iter()
            .map(|c| jaccard_similarity(&keywords(&c.content), &anchor_keywords))
            .collect()
    }
}

impl<E: EmbeddingClient> SemanticStrategy<E> {
    /// Score every candidate against the anchor set. Returns the scores
    /// (index-aligned with `candidates`) and whether embeddings were used.
    async fn score_candidates(
        &self,
        candidates: &[ContextMessage],
        anchors: &[ContextMessage],
    ) -> (Vec<f32>, bool) {
        match self.embedding_scores(candidates, anchors).await {
            Some(scores) => (scores, true),
            None => (Self::keyword_scores(candidates, anchors), false),
        }
    }

    /// Embedding-based scores, or `None` when the embedding call fails and
    /// the pass must degrade to keywords.
    async fn embedding_scores(
        &self,
        candidates: &[ContextMessage],
        anchors: &[ContextMessage],
    ) -> Option<Vec<f32>> {
        let client = self.client.as_ref()?;

        // Resolve cached vectors and collect misses without holding the
        // lock across the embed call.
        let mut vectors: HashMap<String, Vec<f32>> = HashMap::new();
        let mut misses: Vec<(String, String)> = Vec::new();
        {
            let cache = self.cache.lock().expect("embedding cache poisoned");
            for msg in candidates.iter().chain(anchors.iter()) {
                match cache.get(msg.id.as_str()) {
                    Some(v) => {
                        self.cache_hits.fetch_add(1, Ordering::SeqCst);
                        vectors.insert(msg.id.as_str().to_string(), v);
                    }
                    None => misses.push((msg.id.as_str().to_string(), msg.content.clone())),
                }
            }
        }

        if !misses.is_empty() {
            let request = EmbeddingRequest {
                model: self.config.model.clone(),
                input: misses.iter().map(|(_, text)| text.clone()).collect(),
            };
            let response = match client.embed(request).await {
                Ok(response) => response,
                Err(err) => {
                    tracing::warn!(error = %err, "embedding failed, using keyword similarity");
                    return None;
                }
            };
            if response.embeddings.len() != misses.len() {
                tracing::warn!(
                    expected = misses.len(),
                    got = response.embeddings.len(),
                    "embedding count mismatch, using keyword similarity"
                );
                return None;
            }

            self.embeddings_computed.fetch_add(misses.len() as u64, Ordering::SeqCst);
            let mut cache = self.cache.lock().expect("embedding cache poisoned");
            for ((id, _), embedding) in misses.into_iter().zip(response.embeddings) {
                cache.insert(
                    id.clone(),
                    MessageEmbedding {
                        message_id: id.as_str().into(),
                        embedding: embedding.clone(),
                        model: response.model.clone(),
                        timestamp: Utc::now(),
                    },
                );
                vectors.insert(id, embedding);
            }
        }

        let anchor_vectors: Vec<&[f32]> = anchors
            .iter()
            .filter_map(|a| vectors.get(a.id.as_str()).map(Vec::as_slice))
            .collect();
        let anchor_avg = average_vector(&anchor_vectors);

        Some(
            candidates
                .iter()
                .map(|c| {
                    vectors
                        .get(c.id.as_str())
                        .map_or(0.0, |v| cosine_similarity(v, &anchor_avg))
                })
                .collect(),
        )
    }
}

impl<E: EmbeddingClient> PruningStrategy for SemanticStrategy<E> {
    fn name(&self) -> &'static str {
        "semantic"
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
                return PruningResult::identity(messages, "semantic");
            }

            let (system, regular) = split_system(messages, self.config.preserve_system);

            let anchor_count = ANCHOR_COUNT.min(regular.len());
            let split_at = regular.len() - anchor_count;
            let candidates: Vec<ContextMessage> = regular[..split_at].to_vec();
            let anchors: Vec<ContextMessage> = regular[split_at..].to_vec();

            // Nothing to rank, or no client at all: recency window instead.
            if self.client.is_none() || candidates.len() <= self.config.top_k {
                let kept = window_keep(system, regular, self.config.max_messages, max_tokens);
                return result_from(
                    original_count,
                    current_tokens,
                    kept,
                    "semantic",
                    serde_json::json!({ "fallback": "sliding_window" }),
                );
            }

            let (scores, used_embeddings) = self.score_candidates(&candidates, &anchors).await;

            // Descending score; ties break toward the newer candidate.
            let mut ranked: Vec<(usize, f32)> = scores.iter().copied().enumerate().collect();
            ranked.sort_by(|a, b| {
                b.1.partial_cmp(&a.1)
                    .unwrap_or(std::cmp::Ordering::Equal)
                    .then_with(|| b.0.cmp(&a.0))
            });

            let mut kept_indices: Vec<usize> = ranked
                .into_iter()
                .filter(|(_, score)| *score >= self.config.relevance_threshold)
                .take(self.config.top_k)
                .map(|(idx, _)| idx)
                .collect();
            kept_indices.sort_unstable();

            let kept_scores: Vec<f32> = kept_indices.iter().map(|&i| scores[i]).collect();
            let mut kept_candidates: Vec<ContextMessage> =
                kept_indices.into_iter().map(|i| candidates[i].clone()).collect();

            // Over budget: trim newest-first from the kept candidates (the
            // anchors already hold the recent turns). The anchor set and
            // system messages are never trimmed.
            let fixed_tokens: usize = system.iter().map(|m| m.tokens).sum::<usize>()
                + anchors.iter().map(|m| m.tokens).sum::<usize>();
            let mut candidate_tokens: usize = kept_candidates.iter().map(|m| m.tokens).sum();
            let mut trimmed = 0usize;
            while fixed_tokens + candidate_tokens > max_tokens {
                match kept_candidates.pop() {
                    Some(dropped) => {
                        candidate_tokens -= dropped.tokens;
                        trimmed += 1;
                    }
                    None => break,
                }
            }

            let relevance = if kept_scores.len() > trimmed {
                let surviving = &kept_scores[..kept_scores.len() - trimmed];
                let sum: f32 = surviving.iter().sum();
                serde_json::json!({
                    "avg": sum / surviving.len() as f32,
                    "min": surviving.iter().copied().fold(f32::INFINITY, f32::min),
                    "max": surviving.iter().copied().fold(f32::NEG_INFINITY, f32::max),
                })
            } else {
                serde_json::json!({ "avg": 0.0, "min": 0.0, "max": 0.0 })
            };

            tracing::debug!(
                kept = kept_candidates.len(),
                used_embeddings,
                "semantic prune"
            );

            let mut kept = system;
            kept.extend(kept_candidates);
            kept.extend(anchors);

            result_from(
                original_count,
                current_tokens,
                kept,
                "semantic",
                serde_json::json!({
                    "used_embeddings": used_embeddings,
                    "relevance": relevance,
                }),
            )
        }
    }
}
