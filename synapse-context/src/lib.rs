#![doc = include_str!("../README.md")]

pub mod counter;
pub mod manager;
pub mod similarity;
pub mod strategies;

pub use counter::TokenCounter;
pub use manager::{
    AddOptions, ContextExport, ContextManager, ContextManagerBuilder, ManagerStats,
};
pub use strategies::{
    BoxedStrategy, PriorityConfig, PriorityStrategy, SemanticConfig, SemanticStrategy,
    SlidingWindowConfig, SlidingWindowStrategy, SummaryConfig, SummaryStrategy,
};
