//! Integration tests for PriorityStrategy.

use chrono::{Duration, Utc};
use synapse_context::{PriorityConfig, PriorityStrategy};
use synapse_types::{ContextMessage, PruningStrategy, Role};

/// A message aged `age_secs` into the past.
fn aged_msg(i: usize, tokens: usize, age_secs: i64) -> ContextMessage {
    ContextMessage::user(format!("msg-{i}"), format!("message {i}"), tokens)
        .with_timestamp(Utc::now() - Duration::seconds(age_secs))
}

fn total(messages: &[ContextMessage]) -> usize {
    messages.iter().map(|m| m.tokens).sum()
}

/// Scores driven purely by explicit priority.
fn priority_only_config() -> PriorityConfig {
    PriorityConfig {
        min_messages: 1,
        priority_weight: 1.0,
        recency_weight: 0.0,
        role_weight: 0.0,
        recency_half_life_secs: 300.0,
        preserve_system: true,
    }
}

#[tokio::test]
async fn under_budget_is_identity() {
    let strategy = PriorityStrategy::new(PriorityConfig::default()).expect("valid config");
    let messages: Vec<ContextMessage> = (0..4).map(|i| aged_msg(i, 10, 60)).collect();
    let current = total(&messages);

    let result = strategy.prune(messages.clone(), 1_000, current).await;

    assert_eq!(result.removed_count, 0);
    assert_eq!(result.messages, messages);
}

#[tokio::test]
async fn min_messages_floor_survives_adversarial_budget() {
    let config = PriorityConfig { min_messages: 3, ..PriorityConfig::default() };
    let strategy = PriorityStrategy::new(config).expect("valid config");
    let messages: Vec<ContextMessage> = (0..10).map(|i| aged_msg(i, 1_000, 60)).collect();
    let current = total(&messages);

    let result = strategy.prune(messages, 500, current).await;

    assert_eq!(result.messages.len(), 3);
}

#[tokio::test]
async fn high_priority_old_message_beats_newer_low_priority() {
    let strategy = PriorityStrategy::new(priority_only_config()).expect("valid config");

    let pinned = aged_msg(0, 100, 3_600).with_priority(1.0);
    let mut messages = vec![pinned.clone()];
    messages.extend((1..5).map(|i| aged_msg(i, 100, 60).with_priority(0.0)));
    let current = total(&messages);

    // Budget fits two messages.
    let result = strategy.prune(messages, 200, current).await;

    assert!(result.messages.iter().any(|m| m.id == pinned.id), "pinned message must survive");
    // Output stays chronological: the old pinned message comes first.
    assert_eq!(result.messages[0].id, pinned.id);
}

#[tokio::test]
async fn equal_scores_tie_break_toward_newer() {
    let strategy = PriorityStrategy::new(priority_only_config()).expect("valid config");
    let messages: Vec<ContextMessage> =
        (0..5).map(|i| aged_msg(i, 100, 60).with_priority(0.5)).collect();
    let current = total(&messages);

    // Budget fits one message; all scores equal, so the newest wins.
    let result = strategy.prune(messages, 100, current).await;

    assert_eq!(result.messages.len(), 1);
    assert_eq!(result.messages[0].content, "message 4");
}

#[tokio::test]
async fn recency_decay_prefers_newer_messages() {
    let config = PriorityConfig {
        min_messages: 1,
        priority_weight: 0.0,
        recency_weight: 1.0,
        role_weight: 0.0,
        recency_half_life_secs: 300.0,
        preserve_system: true,
    };
    let strategy = PriorityStrategy::new(config).expect("valid config");

    let messages = vec![
        aged_msg(0, 100, 7_200),
        aged_msg(1, 100, 3_600),
        aged_msg(2, 100, 10),
    ];
    let current = total(&messages);

    let result = strategy.prune(messages, 100, current).await;

    assert_eq!(result.messages.len(), 1);
    assert_eq!(result.messages[0].content, "message 2");
}

#[tokio::test]
async fn system_message_is_excluded_from_scoring_and_survives() {
    let strategy = PriorityStrategy::new(PriorityConfig::default()).expect("valid config");
    let system = ContextMessage::system("sys-1", "Rules.", 10);
    let mut messages = vec![system.clone()];
    messages.extend((0..8).map(|i| aged_msg(i, 500, 60)));
    let current = total(&messages);

    let result = strategy.prune(messages, 1_000, current).await;

    assert_eq!(result.messages[0], system);
}

#[tokio::test]
async fn conservation_law_holds() {
    let strategy = PriorityStrategy::new(PriorityConfig::default()).expect("valid config");
    let messages: Vec<ContextMessage> = (0..12).map(|i| aged_msg(i, 37, 60)).collect();
    let input_total = total(&messages);
    let input_count = messages.len();

    let result = strategy.prune(messages, 150, input_total).await;

    assert_eq!(result.removed_tokens + result.total_tokens(), input_total);
    assert_eq!(result.removed_count + result.messages.len(), input_count);
}

#[test]
fn invalid_configurations_fail_fast() {
    assert!(
        PriorityStrategy::new(PriorityConfig { min_messages: 0, ..PriorityConfig::default() })
            .is_err()
    );
    assert!(PriorityStrategy::new(PriorityConfig {
        recency_half_life_secs: 0.0,
        ..PriorityConfig::default()
    })
    .is_err());
    assert!(PriorityStrategy::new(PriorityConfig {
        priority_weight: -0.1,
        ..PriorityConfig::default()
    })
    .is_err());
}

#[tokio::test]
async fn output_is_chronological() {
    let strategy = PriorityStrategy::new(PriorityConfig::default()).expect("valid config");
    let messages: Vec<ContextMessage> =
        (0..10).map(|i| aged_msg(i, 100, (10 - i as i64) * 60)).collect();
    let current = total(&messages);

    let result = strategy.prune(messages, 400, current).await;

    let mut sorted = result.messages.clone();
    sorted.sort_by_key(|m| m.timestamp);
    assert_eq!(sorted, result.messages);
    assert!(result.messages.iter().all(|m| m.role != Role::System));
}
