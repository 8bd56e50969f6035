//! Integration tests for SlidingWindowStrategy.

use synapse_context::{SlidingWindowConfig, SlidingWindowStrategy};
use synapse_types::{ContextMessage, PruningStrategy, Role};

fn user_msg(i: usize, tokens: usize) -> ContextMessage {
    ContextMessage::user(format!("msg-{i}"), format!("message {i}"), tokens)
}

fn system_msg(tokens: usize) -> ContextMessage {
    ContextMessage::system("sys-1", "You are a helpful assistant.", tokens)
}

fn total(messages: &[ContextMessage]) -> usize {
    messages.iter().map(|m| m.tokens).sum()
}

fn strategy(max_messages: usize) -> SlidingWindowStrategy {
    SlidingWindowStrategy::new(SlidingWindowConfig { max_messages, preserve_system: true })
        .expect("valid config")
}

#[tokio::test]
async fn keeps_only_last_n_regular_messages() {
    let strategy = strategy(5);
    let messages: Vec<ContextMessage> = (0..11).map(|i| user_msg(i, 10)).collect();
    let current = total(&messages);

    let result = strategy.prune(messages, 100_000, current).await;

    assert_eq!(result.messages.len(), 5);
    assert_eq!(result.removed_count, 6);
    // The newest message survives.
    assert_eq!(result.messages.last().unwrap().content, "message 10");
}

#[tokio::test]
async fn system_message_survives_verbatim() {
    let strategy = strategy(3);
    let system = system_msg(8);
    let mut messages = vec![system.clone()];
    messages.extend((0..7).map(|i| user_msg(i, 10)));
    let current = total(&messages);

    let result = strategy.prune(messages, 100_000, current).await;

    assert_eq!(result.messages.len(), 4);
    assert_eq!(result.messages[0], system);
}

#[tokio::test]
async fn under_budget_and_window_is_identity() {
    let strategy = strategy(10);
    let messages: Vec<ContextMessage> = (0..3).map(|i| user_msg(i, 10)).collect();
    let current = total(&messages);

    let result = strategy.prune(messages.clone(), 1_000, current).await;

    assert_eq!(result.removed_count, 0);
    assert_eq!(result.removed_tokens, 0);
    assert_eq!(result.messages, messages);
}

#[tokio::test]
async fn trims_inside_window_to_fit_budget() {
    let strategy = strategy(5);
    let messages: Vec<ContextMessage> = (0..8).map(|i| user_msg(i, 100)).collect();
    let current = total(&messages);

    // Window of 5 holds 500 tokens; budget of 250 forces it down to 2.
    let result = strategy.prune(messages, 250, current).await;

    assert_eq!(result.messages.len(), 2);
    assert!(result.total_tokens() <= 250);
    assert_eq!(result.messages.last().unwrap().content, "message 7");
}

#[tokio::test]
async fn adversarial_budget_keeps_last_message_and_system() {
    let strategy = strategy(5);
    // Every message individually exceeds the budget.
    let mut messages = vec![system_msg(5_000)];
    messages.extend((0..6).map(|i| user_msg(i, 5_000)));
    let current = total(&messages);

    let result = strategy.prune(messages, 2_000, current).await;

    // No further reduction is possible without dropping the system message
    // or emptying the conversation.
    assert_eq!(result.messages.len(), 2);
    assert_eq!(result.messages[0].role, Role::System);
    assert_eq!(result.messages[1].content, "message 5");
}

#[tokio::test]
async fn conservation_law_holds() {
    let strategy = strategy(4);
    let messages: Vec<ContextMessage> = (0..9).map(|i| user_msg(i, 13)).collect();
    let input_total = total(&messages);

    let result = strategy.prune(messages, 40, input_total).await;

    assert_eq!(result.removed_tokens + result.total_tokens(), input_total);
    assert_eq!(result.removed_count + result.messages.len(), 9);
}

#[tokio::test]
async fn empty_input_is_a_valid_noop() {
    let strategy = strategy(5);
    let result = strategy.prune(Vec::new(), 100, 0).await;
    assert!(result.messages.is_empty());
    assert_eq!(result.removed_count, 0);
}

#[test]
fn zero_window_is_a_config_error() {
    let err = SlidingWindowStrategy::new(SlidingWindowConfig {
        max_messages: 0,
        preserve_system: true,
    });
    assert!(err.is_err());
}

#[tokio::test]
async fn without_preserve_system_the_system_message_competes() {
    let strategy = SlidingWindowStrategy::new(SlidingWindowConfig {
        max_messages: 2,
        preserve_system: false,
    })
    .expect("valid config");

    let mut messages = vec![system_msg(8)];
    messages.extend((0..4).map(|i| user_msg(i, 10)));
    let current = total(&messages);

    let result = strategy.prune(messages, 100_000, current).await;

    assert_eq!(result.messages.len(), 2);
    assert!(result.messages.iter().all(|m| m.role != Role::System));
}
