//! 进程内延迟工作队列：按到期时间出队，带重试预算、单次超时和指数退避

use anyhow::anyhow;
use async_trait::async_trait;
use domain::ScheduledWorkItem;
use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use thiserror::Error;
use tokio::sync::{Notify, Semaphore};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// 单个工作项最长的等待时间，超出的延迟按此截断
const MAX_PARK: Duration = Duration::from_secs(30 * 24 * 60 * 60);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum QueueClass {
    #[default]
    Default,
    Priority,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TaskOptions {
    pub class: QueueClass,
    /// 首次执行之后最多再重试的次数
    pub max_retry: u32,
    pub timeout: Duration,
    pub process_in: Duration,
}

impl Default for TaskOptions {
    fn default() -> Self {
        Self {
            class: QueueClass::Default,
            max_retry: 8,
            timeout: Duration::from_secs(15),
            process_in: Duration::ZERO,
        }
    }
}

#[derive(Debug, Error)]
pub enum DeliveryError {
    /// 终止，不再重试
    #[error("skip retry: {0}")]
    SkipRetry(String),
    #[error(transparent)]
    Retryable(#[from] anyhow::Error),
}

#[async_trait]
pub trait WorkQueue: Send + Sync {
    async fn enqueue(&self, item: ScheduledWorkItem, options: TaskOptions) -> anyhow::Result<()>;
}

#[async_trait]
pub trait WorkHandler: Send + Sync {
    async fn handle(&self, item: &ScheduledWorkItem) -> Result<(), DeliveryError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub initial: Duration,
    pub max: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            initial: Duration::from_secs(1),
            max: Duration::from_secs(600),
        }
    }
}

impl RetryPolicy {
    /// 第 `retried` 次重试前的等待：initial * 2^retried，封顶 max
    pub fn backoff(&self, retried: u32) -> Duration {
        let factor = 1u32.checked_shl(retried.min(31)).unwrap_or(u32::MAX);
        self.initial.saturating_mul(factor).min(self.max)
    }
}

#[derive(Debug, Clone, Copy)]
pub struct WorkerConfig {
    pub concurrency: usize,
    pub retry: RetryPolicy,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            concurrency: 10,
            retry: RetryPolicy::default(),
        }
    }
}

struct Pending {
    due: Instant,
    seq: u64,
    retried: u32,
    options: TaskOptions,
    item: ScheduledWorkItem,
}

// BinaryHeap 是大顶堆，反转比较让最早到期的在堆顶
impl Ord for Pending {
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .due
            .cmp(&self.due)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

impl PartialOrd for Pending {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for Pending {
    fn eq(&self, other: &Self) -> bool {
        self.seq == other.seq
    }
}

impl Eq for Pending {}

#[derive(Default)]
struct Lanes {
    default: BinaryHeap<Pending>,
    priority: BinaryHeap<Pending>,
}

impl Lanes {
    fn lane(&mut self, class: QueueClass) -> &mut BinaryHeap<Pending> {
        match class {
            QueueClass::Default => &mut self.default,
            QueueClass::Priority => &mut self.priority,
        }
    }

    /// 到期的 priority 项优先；都未到期时返回最近的到期时间
    fn pop_due(&mut self, now: Instant) -> Result<Pending, Option<Instant>> {
        for class in [QueueClass::Priority, QueueClass::Default] {
            let lane = self.lane(class);
            if lane.peek().is_some_and(|p| p.due <= now) {
                if let Some(task) = lane.pop() {
                    return Ok(task);
                }
            }
        }
        let next = [self.priority.peek(), self.default.peek()]
            .into_iter()
            .flatten()
            .map(|p| p.due)
            .min();
        Err(next)
    }
}

struct Shared {
    lanes: Mutex<Lanes>,
    notify: Notify,
    seq: AtomicU64,
}

/// 单进程的工作队列；`run` 启动有界并发的消费循环
#[derive(Clone)]
pub struct LocalWorkQueue {
    shared: Arc<Shared>,
}

impl Default for LocalWorkQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl LocalWorkQueue {
    pub fn new() -> Self {
        Self {
            shared: Arc::new(Shared {
                lanes: Mutex::new(Lanes::default()),
                notify: Notify::new(),
                seq: AtomicU64::new(0),
            }),
        }
    }

    fn lanes(&self) -> MutexGuard<'_, Lanes> {
        self.shared.lanes.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn pending_len(&self) -> usize {
        let lanes = self.lanes();
        lanes.default.len() + lanes.priority.len()
    }

    fn push(&self, item: ScheduledWorkItem, options: TaskOptions, retried: u32, delay: Duration) {
        let task = Pending {
            due: Instant::now() + delay.min(MAX_PARK),
            seq: self.shared.seq.fetch_add(1, AtomicOrdering::Relaxed),
            retried,
            options,
            item,
        };
        self.lanes().lane(options.class).push(task);
        self.shared.notify.notify_one();
    }

    async fn next_due(&self) -> Pending {
        loop {
            let next = match self.lanes().pop_due(Instant::now()) {
                Ok(task) => return task,
                Err(next) => next,
            };
            match next {
                Some(at) => {
                    tokio::select! {
                        _ = self.shared.notify.notified() => {}
                        _ = tokio::time::sleep_until(at) => {}
                    }
                }
                None => self.shared.notify.notified().await,
            }
        }
    }

    /// 消费循环，直到 `cancel` 触发；返回前等待已开始的执行结束
    pub async fn run(
        self,
        handler: Arc<dyn WorkHandler>,
        config: WorkerConfig,
        cancel: CancellationToken,
    ) {
        let concurrency = config.concurrency.max(1);
        let slots = Arc::new(Semaphore::new(concurrency));
        info!(concurrency = config.concurrency, "Work queue started");

        loop {
            let permit = tokio::select! {
                _ = cancel.cancelled() => break,
                permit = slots.clone().acquire_owned() => match permit {
                    Ok(p) => p,
                    Err(_) => break,
                },
            };
            let task = tokio::select! {
                _ = cancel.cancelled() => break,
                task = self.next_due() => task,
            };

            let queue = self.clone();
            let handler = handler.clone();
            let retry = config.retry;
            tokio::spawn(async move {
                let _permit = permit;
                queue.attempt(task, handler.as_ref(), retry).await;
            });
        }

        // 收回全部名额即所有执行已结束
        let _ = slots.acquire_many(concurrency as u32).await;
        info!(pending = self.pending_len(), "Work queue stopped");
    }

    async fn attempt(&self, task: Pending, handler: &dyn WorkHandler, retry: RetryPolicy) {
        let Pending {
            retried,
            options,
            item,
            ..
        } = task;

        let result = match tokio::time::timeout(options.timeout, handler.handle(&item)).await {
            Ok(result) => result,
            Err(_) => Err(DeliveryError::Retryable(anyhow!(
                "attempt timed out after {:?}",
                options.timeout
            ))),
        };

        match result {
            Ok(()) => {
                debug!(kind = %item.kind, tenant_id = %item.tenant_id, retried, "Work item done");
            }
            Err(DeliveryError::SkipRetry(reason)) => {
                info!(
                    kind = %item.kind,
                    tenant_id = %item.tenant_id,
                    target_id = %item.target_id,
                    reason = %reason,
                    "Work item skipped"
                );
            }
            Err(DeliveryError::Retryable(e)) if retried >= options.max_retry => {
                error!(
                    kind = %item.kind,
                    tenant_id = %item.tenant_id,
                    target_id = %item.target_id,
                    attempts = retried + 1,
                    error = %e,
                    "Work item abandoned after exhausting retries"
                );
            }
            Err(DeliveryError::Retryable(e)) => {
                let delay = retry.backoff(retried);
                warn!(
                    kind = %item.kind,
                    tenant_id = %item.tenant_id,
                    target_id = %item.target_id,
                    retry = retried + 1,
                    delay_ms = delay.as_millis() as u64,
                    error = %e,
                    "Work item failed, will retry"
                );
                self.push(item, options, retried + 1, delay);
            }
        }
    }
}

#[async_trait]
impl WorkQueue for LocalWorkQueue {
    async fn enqueue(&self, item: ScheduledWorkItem, options: TaskOptions) -> anyhow::Result<()> {
        debug!(
            kind = %item.kind,
            tenant_id = %item.tenant_id,
            process_in_secs = options.process_in.as_secs(),
            "Work item enqueued"
        );
        self.push(item, options, 0, options.process_in);
        Ok(())
    }
}
