//! Core traits: LlmClient, EmbeddingClient, PruningStrategy.

use std::future::Future;

use crate::error::{EmbeddingError, ProviderError};
use crate::types::{
    CompletionRequest, CompletionResponse, ContextMessage, EmbeddingRequest, EmbeddingResponse,
    PruningResult,
};

/// One-shot LLM completion client. Used only by the summary-based strategy.
///
/// Uses RPITIT (return position impl trait in trait) — Rust 2024 native
/// async. Not object-safe by design; compose via generics `<P: LlmClient>`.
///
/// # Example
///
/// ```ignore
/// struct MyClient;
///
/// impl LlmClient for MyClient {
///     fn complete(&self, request: CompletionRequest)
///         -> impl Future<Output = Result<CompletionResponse, ProviderError>> + Send
///     {
///         async { todo!() }
///     }
/// }
/// ```
pub trait LlmClient: Send + Sync {
    /// Send a completion request and get the full response.
    fn complete(
        &self,
        request: CompletionRequest,
    ) -> impl Future<Output = Result<CompletionResponse, ProviderError>> + Send;
}

/// Batched text-embedding client. Used only by the semantic strategy.
pub trait EmbeddingClient: Send + Sync {
    /// Embed every input string, returning index-aligned vectors.
    fn embed(
        &self,
        request: EmbeddingRequest,
    ) -> impl Future<Output = Result<EmbeddingResponse, EmbeddingError>> + Send;
}

/// Strategy for pruning a context window down to a token budget.
///
/// One contract, many implementations: the manager calls
/// `prune(messages, max_tokens, current_tokens)` and applies whatever comes
/// back. Pruning is infallible by contract — a strategy whose dependency
/// fails must degrade (fallback path, placeholder output) rather than error.
/// Only construction may fail, with a [`crate::ConfigError`].
///
/// Data-shape conditions (empty input, already under budget) are valid no-op
/// results, never errors.
pub trait PruningStrategy: Send + Sync {
    /// Stable name of this strategy, recorded on every [`PruningResult`].
    fn name(&self) -> &'static str;

    /// Run one pruning pass.
    ///
    /// `messages` is the full chronological window, `max_tokens` the budget,
    /// and `current_tokens` the precomputed total of `messages` (strategies
    /// trust it; the manager maintains the invariant).
    fn prune(
        &self,
        messages: Vec<ContextMessage>,
        max_tokens: usize,
        current_tokens: usize,
    ) -> impl Future<Output = PruningResult> + Send;
}

/// Placeholder client for strategies constructed without one.
///
/// Satisfies the `LlmClient`/`EmbeddingClient` bounds on the cached
/// strategies' default type parameters. Strategies detect the missing client
/// before calling, so these implementations are never reached in practice.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoClient;

impl LlmClient for NoClient {
    fn complete(
        &self,
        _request: CompletionRequest,
    ) -> impl Future<Output = Result<CompletionResponse, ProviderError>> + Send {
        async { Err(ProviderError::InvalidRequest("no LLM client configured".to_string())) }
    }
}

impl EmbeddingClient for NoClient {
    fn embed(
        &self,
        _request: EmbeddingRequest,
    ) -> impl Future<Output = Result<EmbeddingResponse, EmbeddingError>> + Send {
        async { Err(EmbeddingError::InvalidRequest("no embedding client configured".to_string())) }
    }
}
