//! Core message, pruning, summary, and embedding types.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The role of a message participant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Role {
    /// A system message.
    System,
    /// A human user.
    User,
    /// An AI assistant.
    Assistant,
}

impl Role {
    /// The lowercase wire name of this role.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::System => "system",
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Unique identifier for a context message.
///
/// Just a string underneath — no UUID enforcement, no format requirement.
/// The engine assigns sequential ids; importers may bring their own.
#[derive(Debug, Clone, Hash, Eq, PartialEq, Serialize, Deserialize)]
pub struct MessageId(pub String);

impl MessageId {
    /// Create a new id from anything that converts to String.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Borrow the inner string.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for MessageId {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

impl From<String> for MessageId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// A single message in a managed context window.
///
/// Immutable once created: `tokens` is computed exactly once, at insertion.
/// Strategies receive owned copies and return new lists — they never mutate
/// the manager's list in place.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContextMessage {
    /// Unique identifier assigned at insertion.
    pub id: MessageId,
    /// The role of the message author.
    pub role: Role,
    /// The text content.
    pub content: String,
    /// When the message was created.
    pub timestamp: DateTime<Utc>,
    /// Token count, computed once at insertion.
    pub tokens: usize,
    /// Optional explicit priority in `[0, 1]`, used by the priority strategy.
    pub priority: Option<f32>,
    /// Optional caller-supplied metadata, carried verbatim.
    pub metadata: Option<serde_json::Value>,
}

impl ContextMessage {
    /// Create a message with an explicit token count.
    pub fn new(
        id: impl Into<MessageId>,
        role: Role,
        content: impl Into<String>,
        tokens: usize,
    ) -> Self {
        Self {
            id: id.into(),
            role,
            content: content.into(),
            timestamp: Utc::now(),
            tokens,
            priority: None,
            metadata: None,
        }
    }

    /// Create a user message.
    pub fn user(id: impl Into<MessageId>, content: impl Into<String>, tokens: usize) -> Self {
        Self::new(id, Role::User, content, tokens)
    }

    /// Create an assistant message.
    pub fn assistant(id: impl Into<MessageId>, content: impl Into<String>, tokens: usize) -> Self {
        Self::new(id, Role::Assistant, content, tokens)
    }

    /// Create a system message.
    pub fn system(id: impl Into<MessageId>, content: impl Into<String>, tokens: usize) -> Self {
        Self::new(id, Role::System, content, tokens)
    }

    /// Set the explicit priority.
    #[must_use]
    pub fn with_priority(mut self, priority: f32) -> Self {
        self.priority = Some(priority);
        self
    }

    /// Attach caller metadata.
    #[must_use]
    pub fn with_metadata(mut self, metadata: serde_json::Value) -> Self {
        self.metadata = Some(metadata);
        self
    }

    /// Override the creation timestamp.
    #[must_use]
    pub fn with_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = timestamp;
        self
    }
}

/// A provider-ready view of a message: role and content only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LlmMessage {
    /// The role of the message author.
    pub role: Role,
    /// The text content.
    pub content: String,
}

impl From<&ContextMessage> for LlmMessage {
    fn from(msg: &ContextMessage) -> Self {
        Self { role: msg.role, content: msg.content.clone() }
    }
}

/// The outcome of one pruning pass.
///
/// Invariants (for any input of `n` messages totalling `t` tokens):
/// - `removed_tokens == t - sum(tokens in messages)`
/// - `removed_count == n - messages.len()`
#[derive(Debug, Clone, Serialize)]
pub struct PruningResult {
    /// The surviving messages, in chronological order.
    pub messages: Vec<ContextMessage>,
    /// Number of messages removed by this pass.
    pub removed_count: usize,
    /// Total tokens removed by this pass.
    pub removed_tokens: usize,
    /// Name of the strategy that produced this result.
    pub strategy: &'static str,
    /// Strategy-specific observability data (scores, cache hits, fallbacks).
    pub metadata: serde_json::Value,
}

impl PruningResult {
    /// The no-op result: input returned unchanged.
    #[must_use]
    pub fn identity(messages: Vec<ContextMessage>, strategy: &'static str) -> Self {
        Self {
            messages,
            removed_count: 0,
            removed_tokens: 0,
            strategy,
            metadata: serde_json::Value::Null,
        }
    }

    /// Total tokens across the surviving messages.
    #[must_use]
    pub fn total_tokens(&self) -> usize {
        self.messages.iter().map(|m| m.tokens).sum()
    }
}

/// A synthetic message standing in for a contiguous span of summarized
/// originals. Created by the summary-based strategy, cached by the id set
/// it was produced from, never mutated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContextSummary {
    /// Identifier of the summary itself.
    pub id: MessageId,
    /// The full summary text as it will appear in the context.
    pub content: String,
    /// Ids of the messages this summary replaces.
    pub message_ids: Vec<MessageId>,
    /// Token count of `content`.
    pub tokens: usize,
    /// When the summary was generated.
    pub timestamp: DateTime<Utc>,
    /// The model that produced it (empty for placeholder summaries).
    pub model: String,
}

impl ContextSummary {
    /// Render this summary as a context message.
    ///
    /// The summary is voiced as a user message so providers that reject
    /// leading assistant turns still accept the pruned context.
    #[must_use]
    pub fn to_message(&self) -> ContextMessage {
        ContextMessage {
            id: self.id.clone(),
            role: Role::User,
            content: self.content.clone(),
            timestamp: self.timestamp,
            tokens: self.tokens,
            priority: None,
            metadata: Some(serde_json::json!({
                "summary": true,
                "summarized_count": self.message_ids.len(),
            })),
        }
    }
}

/// A cached embedding for a single message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessageEmbedding {
    /// The message this embedding belongs to.
    pub message_id: MessageId,
    /// The embedding vector.
    pub embedding: Vec<f32>,
    /// The model that produced it.
    pub model: String,
    /// When it was computed.
    pub timestamp: DateTime<Utc>,
}

// --- Client request/response types ---

/// A one-shot completion request.
///
/// Deliberately narrower than a full provider API: the engine only issues
/// single summarization calls with a fixed instruction and a transcript.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CompletionRequest {
    /// The model identifier (empty lets the client pick its default).
    pub model: String,
    /// The system/instruction prompt.
    pub system: Option<String>,
    /// The user prompt (here: a rendered transcript of old messages).
    pub prompt: String,
    /// Maximum tokens to generate.
    pub max_tokens: Option<usize>,
    /// Sampling temperature.
    pub temperature: Option<f32>,
}

/// Response to a [`CompletionRequest`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompletionResponse {
    /// The generated text.
    pub content: String,
    /// The model that generated it.
    pub model: String,
}

/// A request to an embedding model.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EmbeddingRequest {
    /// The embedding model to use (empty lets the client pick its default).
    pub model: String,
    /// The text inputs to embed.
    pub input: Vec<String>,
}

/// Response to an [`EmbeddingRequest`]: one vector per input string.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmbeddingResponse {
    /// The embedding vectors, index-aligned with the request input.
    pub embeddings: Vec<Vec<f32>>,
    /// The model that generated the embeddings.
    pub model: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn role_as_str_round_trips_display() {
        for role in [Role::System, Role::User, Role::Assistant] {
            assert_eq!(role.to_string(), role.as_str());
        }
    }

    #[test]
    fn identity_result_removes_nothing() {
        let msgs = vec![ContextMessage::user("m1", "hello", 2)];
        let result = PruningResult::identity(msgs.clone(), "test");
        assert_eq!(result.removed_count, 0);
        assert_eq!(result.removed_tokens, 0);
        assert_eq!(result.messages, msgs);
    }

    #[test]
    fn summary_to_message_is_user_voiced() {
        let summary = ContextSummary {
            id: MessageId::new("sum-1"),
            content: "[Summary of earlier conversation]\nRust was discussed.".to_string(),
            message_ids: vec![MessageId::new("m1"), MessageId::new("m2")],
            tokens: 12,
            timestamp: Utc::now(),
            model: "test-model".to_string(),
        };
        let msg = summary.to_message();
        assert_eq!(msg.role, Role::User);
        assert_eq!(msg.tokens, 12);
        assert_eq!(msg.metadata.unwrap()["summarized_count"], 2);
    }

    #[test]
    fn context_message_serde_round_trip() {
        let msg = ContextMessage::assistant("m9", "reply", 3)
            .with_priority(0.8)
            .with_metadata(serde_json::json!({"source": "test"}));
        let json = serde_json::to_string(&msg).unwrap();
        let back: ContextMessage = serde_json::from_str(&json).unwrap();
        assert_eq!(back, msg);
    }
}
