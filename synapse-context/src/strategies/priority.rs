//! Score-based pruning: weighted blend of explicit priority, recency decay,
//! and role.

use std::future::Future;

use chrono::Utc;
use synapse_types::{ConfigError, ContextMessage, PruningResult, PruningStrategy, Role};

use super::{result_from, split_system};

/// Priority assumed for messages that carry no explicit one.
const DEFAULT_PRIORITY: f32 = 0.5;

/// Configuration for [`PriorityStrategy`].
#[derive(Debug, Clone)]
pub struct PriorityConfig {
    /// Minimum number of regular messages that survive every pass, even
    /// over budget. Must be ≥ 1.
    pub min_messages: usize,
    /// Weight of the explicit per-message priority.
    pub priority_weight: f32,
    /// Weight of the recency decay term.
    pub recency_weight: f32,
    /// Weight of the role rank term.
    pub role_weight: f32,
    /// Half-life of the exponential recency decay, in seconds. Must be > 0.
    pub recency_half_life_secs: f32,
    /// Keep the system message out of scoring and guarantee it survives.
    pub preserve_system: bool,
}

impl Default for PriorityConfig {
    fn default() -> Self {
        Self {
            min_messages: 5,
            priority_weight: 0.5,
            recency_weight: 0.3,
            role_weight: 0.2,
            recency_half_life_secs: 300.0,
            preserve_system: true,
        }
    }
}

/// Ranks messages by `wp·priority + wr·exp(-age/half_life) + wrole·role_rank`
/// and keeps the top scorers that fit the budget, guaranteeing a
/// `min_messages` floor. Ties break toward the newer message. The kept set
/// is reordered chronologically for assembly.
///
/// Role ranks: user 1.0, assistant 0.7. System messages are excluded from
/// scoring entirely when preserved.
pub struct PriorityStrategy {
    config: PriorityConfig,
}

impl PriorityStrategy {
    /// Creates a new `PriorityStrategy`.
    ///
    /// # Errors
    ///
    /// Fails when `min_messages` is zero, a weight is negative, or the
    /// half-life is not positive.
    pub fn new(config: PriorityConfig) -> Result<Self, ConfigError> {
        if config.min_messages < 1 {
            return Err(ConfigError::TooSmall {
                field: "min_messages",
                min: 1,
                got: config.min_messages,
            });
        }
        if config.recency_half_life_secs <= 0.0 {
            return Err(ConfigError::NotPositive {
                field: "recency_half_life_secs",
                got: config.recency_half_life_secs,
            });
        }
        for (field, value) in [
            ("priority_weight", config.priority_weight),
            ("recency_weight", config.recency_weight),
            ("role_weight", config.role_weight),
        ] {
            if value < 0.0 {
                return Err(ConfigError::NotPositive { field, got: value });
            }
        }
        Ok(Self { config })
    }

    fn score(&self, msg: &ContextMessage, age_secs: f32) -> f32 {
        let priority = msg.priority.unwrap_or(DEFAULT_PRIORITY);
        let decay = (-age_secs / self.config.recency_half_life_secs).exp();
        let role_rank = match msg.role {
            Role::User => 1.0,
            Role::Assistant => 0.7,
            // Only scored when preserve_system is off.
            Role::System => 1.0,
        };
        self.config.priority_weight * priority
            + self.config.recency_weight * decay
            + self.config.role_weight * role_rank
    }
}

impl PruningStrategy for PriorityStrategy {
    fn name(&self) -> &'static str {
        "priority"
    }

    fn prune(
        &self,
        messages: Vec<ContextMessage>,
        max_tokens: usize,
        current_tokens: usize,
    ) -> impl Future<Output = PruningResult> + Send {
        async move {
            let original_count = messages.len();

            if current_tokens <= max_tokens {
                return PruningResult::identity(messages, "priority");
            }

            let (system, regular) = split_system(messages, self.config.preserve_system);
            let system_tokens: usize = system.iter().map(|m| m.tokens).sum();
            let budget = max_tokens.saturating_sub(system_tokens);

            // Score with original positions so the kept set can be restored
            // to chronological order afterwards.
            let now = Utc::now();
            let mut ranked: Vec<(usize, f32, ContextMessage)> = regular
                .into_iter()
                .enumerate()
                .map(|(idx, msg)| {
                    let age_secs =
                        (now - msg.timestamp).num_milliseconds().max(0) as f32 / 1000.0;
                    let score = self.score(&msg, age_secs);
                    (idx, score, msg)
                })
                .collect();

            // Descending score; ties break toward the newer message.
            ranked.sort_by(|a, b| {
                b.1.partial_cmp(&a.1)
                    .unwrap_or(std::cmp::Ordering::Equal)
                    .then_with(|| b.0.cmp(&a.0))
            });

            let mut kept: Vec<(usize, ContextMessage)> = Vec::new();
            let mut kept_tokens = 0usize;
            let mut score_sum = 0.0f32;
            for (idx, score, msg) in ranked {
                let under_floor = kept.len() < self.config.min_messages;
                if under_floor || kept_tokens + msg.tokens <= budget {
                    kept_tokens += msg.tokens;
                    score_sum += score;
                    kept.push((idx, msg));
                }
            }

            let kept_count = kept.len();
            kept.sort_by_key(|(idx, _)| *idx);

            let mut result = system;
            result.extend(kept.into_iter().map(|(_, msg)| msg));

            let avg_score =
                if kept_count > 0 { score_sum / kept_count as f32 } else { 0.0 };
            tracing::debug!(kept = kept_count, avg_score, "priority prune");

            result_from(
                original_count,
                current_tokens,
                result,
                "priority",
                serde_json::json!({ "avg_score": avg_score }),
            )
        }
    }
}
