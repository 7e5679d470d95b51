//! 评论 → 回复的核心流程：匹配、调度、限流、投递

mod executor;
mod ingest;
mod matcher;
mod queue;
mod rate;
mod scheduler;

#[cfg(test)]
mod testing;

pub use executor::{DeliveryExecutor, DeliveryLimits, DeliveryOutcome};
pub use ingest::{CommentProcessor, IngestPool};
pub use matcher::RuleMatcher;
pub use queue::{
    DeliveryError, LocalWorkQueue, QueueClass, RetryPolicy, TaskOptions, WorkHandler, WorkQueue,
    WorkerConfig,
};
pub use rate::{RateDecision, RateLimiter};
pub use scheduler::{plan, DispatchScheduler, PlannedItem};
