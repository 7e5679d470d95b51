use crate::matcher::RuleMatcher;
use crate::scheduler::DispatchScheduler;
use anyhow::{anyhow, Result};
use domain::{CommentEvent, CommentNotification};
use std::sync::Arc;
use storage::CredentialResolver;
use tokio::sync::{mpsc, Semaphore};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// 一条通知的完整处理：租户与凭证解析 → 匹配 → 调度
pub struct CommentProcessor {
    resolver: Arc<dyn CredentialResolver>,
    fallback_credential: Option<String>,
    matcher: RuleMatcher,
    scheduler: DispatchScheduler,
}

impl CommentProcessor {
    pub fn new(
        resolver: Arc<dyn CredentialResolver>,
        matcher: RuleMatcher,
        scheduler: DispatchScheduler,
    ) -> Self {
        Self {
            resolver,
            fallback_credential: None,
            matcher,
            scheduler,
        }
    }

    /// 租户凭证查不到或查询失败时使用
    pub fn with_fallback_credential(mut self, token: impl Into<String>) -> Self {
        let token = token.into();
        self.fallback_credential = (!token.is_empty()).then_some(token);
        self
    }

    async fn resolve_credential(&self, tenant_id: &str) -> Option<String> {
        match self.resolver.credential(tenant_id).await {
            Ok(Some(token)) if !token.is_empty() => return Some(token),
            Ok(_) => debug!(tenant_id = %tenant_id, "No stored credential"),
            Err(e) => warn!(tenant_id = %tenant_id, error = %e, "Credential lookup failed"),
        }
        self.fallback_credential.clone()
    }

    /// 返回入队的工作项数量
    pub async fn process_notification(&self, notification: CommentNotification) -> Result<usize> {
        let account = notification.platform_account_id.clone();
        let Some(tenant_id) = self.resolver.tenant_for_account(&account).await? else {
            warn!(platform_account_id = %account, "No tenant bound to account, skipped");
            return Ok(0);
        };
        let Some(credential) = self.resolve_credential(&tenant_id).await else {
            warn!(tenant_id = %tenant_id, "No outbound credential, skipped");
            return Ok(0);
        };

        let event = notification.into_event(tenant_id, credential);
        self.process(&event).await
    }

    pub async fn process(&self, event: &CommentEvent) -> Result<usize> {
        let intents = self.matcher.match_event(event).await?;
        let mut scheduled = 0;
        for intent in &intents {
            scheduled += self.scheduler.schedule(intent).await?;
        }
        if scheduled > 0 {
            info!(
                event_id = %event.event_id,
                tenant_id = %event.tenant_id,
                matched = intents.len(),
                scheduled,
                "Comment scheduled"
            );
        }
        Ok(scheduled)
    }
}

/// 有界的事件处理池：队列满时 `submit` 等待，同时处理的事件数受信号量限制
#[derive(Clone)]
pub struct IngestPool {
    tx: mpsc::Sender<CommentNotification>,
}

impl IngestPool {
    pub fn start(
        processor: Arc<CommentProcessor>,
        capacity: usize,
        max_inflight: usize,
        cancel: CancellationToken,
    ) -> (Self, JoinHandle<()>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        let handle = tokio::spawn(dispatch_loop(processor, rx, max_inflight.max(1), cancel));
        (Self { tx }, handle)
    }

    pub async fn submit(&self, notification: CommentNotification) -> Result<()> {
        self.tx
            .send(notification)
            .await
            .map_err(|_| anyhow!("ingest pool is closed"))
    }
}

async fn dispatch_loop(
    processor: Arc<CommentProcessor>,
    mut rx: mpsc::Receiver<CommentNotification>,
    max_inflight: usize,
    cancel: CancellationToken,
) {
    let slots = Arc::new(Semaphore::new(max_inflight));
    info!(max_inflight, "Ingest pool started");

    let mut closing = false;
    loop {
        let next = if closing {
            rx.recv().await
        } else {
            tokio::select! {
                _ = cancel.cancelled() => {
                    // 不再接收新通知，已缓冲的照常处理完
                    rx.close();
                    closing = true;
                    info!("Ingest pool closing, draining buffered notifications");
                    continue;
                }
                next = rx.recv() => next,
            }
        };
        let Some(notification) = next else {
            break;
        };
        let Ok(permit) = slots.clone().acquire_owned().await else {
            break;
        };

        let processor = processor.clone();
        tokio::spawn(async move {
            let _permit = permit;
            let comment_id = notification.comment_id.clone();
            if let Err(e) = processor.process_notification(notification).await {
                error!(comment_id = %comment_id, error = %e, "Failed to process comment");
            }
        });
    }

    // 等已派发的事件处理完
    let _ = slots.acquire_many(max_inflight as u32).await;
    info!("Ingest pool stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{clock_at, promo_definition, RecordingQueue, StaticRepo, StaticResolver};
    use domain::ActionKind;
    use std::collections::HashMap;
    use std::time::Duration;
    use storage::MemoryStore;

    fn notification(comment_id: &str, text: &str) -> CommentNotification {
        CommentNotification {
            platform_account_id: "acc-1".into(),
            comment_id: comment_id.into(),
            post_id: "P1".into(),
            text: text.into(),
            author_id: "U1".into(),
            author_handle: "buyer".into(),
        }
    }

    fn processor(resolver: StaticResolver) -> (CommentProcessor, Arc<RecordingQueue>) {
        let clock = Arc::new(clock_at(2024, 6, 1, 0, 0));
        let store = Arc::new(MemoryStore::with_clock(clock.clone()));
        let repo = Arc::new(StaticRepo::with("acc-1", vec![promo_definition("wf-1")]));
        let queue = Arc::new(RecordingQueue::default());
        let processor = CommentProcessor::new(
            Arc::new(resolver),
            RuleMatcher::new(store, repo),
            DispatchScheduler::new(queue.clone(), clock),
        );
        (processor, queue)
    }

    fn resolver() -> StaticResolver {
        StaticResolver {
            tenants: HashMap::from([("acc-1".to_string(), "T".to_string())]),
            credentials: HashMap::from([("T".to_string(), "tok-T".to_string())]),
            fail_credentials: false,
        }
    }

    #[tokio::test]
    async fn test_end_to_end_scenario() {
        let (processor, queue) = processor(resolver());

        let scheduled = processor
            .process_notification(notification("C1", "tell me about the promo"))
            .await
            .unwrap();
        assert_eq!(scheduled, 2);

        let taken = queue.taken();
        let replies: Vec<_> = taken
            .iter()
            .filter(|(i, _)| i.kind == ActionKind::PublicReply)
            .collect();
        let dms: Vec<_> = taken
            .iter()
            .filter(|(i, _)| i.kind == ActionKind::DirectMessage)
            .collect();
        assert_eq!(replies.len(), 1);
        assert_eq!(dms.len(), 1);
        assert_eq!(replies[0].0.message, "Thanks!");
        assert_eq!(replies[0].0.target_id, "C1");
        assert_eq!(dms[0].0.message, "Check this: \nShop: http://x");
        assert_eq!(dms[0].0.target_id, "U1");
        assert_eq!(dms[0].0.tenant_id, "T");
        assert_eq!(dms[0].0.credential, "tok-T");

        let again = processor
            .process_notification(notification("C1", "tell me about the promo"))
            .await
            .unwrap();
        assert_eq!(again, 0);
        assert_eq!(queue.taken().len(), 2);
    }

    #[tokio::test]
    async fn test_unknown_account_is_skipped() {
        let (processor, queue) = processor(StaticResolver::default());
        let n = processor
            .process_notification(notification("C1", "promo"))
            .await
            .unwrap();
        assert_eq!(n, 0);
        assert!(queue.taken().is_empty());
    }

    #[tokio::test]
    async fn test_fallback_credential() {
        let mut broken = resolver();
        broken.fail_credentials = true;
        let (processor, queue) = processor(broken);
        let processor = processor.with_fallback_credential("tok-env");

        processor
            .process_notification(notification("C1", "promo"))
            .await
            .unwrap();
        assert!(queue.taken().iter().all(|(i, _)| i.credential == "tok-env"));

        // 既没有租户凭证也没有兜底凭证
        let mut empty = resolver();
        empty.credentials.clear();
        let (processor, queue) = processor_without_fallback(empty);
        assert_eq!(
            processor
                .process_notification(notification("C2", "promo"))
                .await
                .unwrap(),
            0
        );
        assert!(queue.taken().is_empty());
    }

    fn processor_without_fallback(resolver: StaticResolver) -> (CommentProcessor, Arc<RecordingQueue>) {
        let (processor, queue) = processor(resolver);
        (processor.with_fallback_credential(""), queue)
    }

    #[tokio::test]
    async fn test_pool_processes_submitted_notifications() {
        let (processor, queue) = processor(resolver());
        let cancel = CancellationToken::new();
        let (pool, handle) = IngestPool::start(Arc::new(processor), 4, 2, cancel.clone());

        pool.submit(notification("C1", "promo")).await.unwrap();
        pool.submit(notification("C2", "no match here")).await.unwrap();
        pool.submit(notification("C3", "PROMO!!")).await.unwrap();

        for _ in 0..200 {
            if queue.taken().len() == 4 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert_eq!(queue.taken().len(), 4);

        cancel.cancel();
        handle.await.unwrap();
        assert!(pool.submit(notification("C4", "promo")).await.is_err());
    }

    #[tokio::test]
    async fn test_cancel_drains_buffered_notifications() {
        let (processor, queue) = processor(resolver());
        let cancel = CancellationToken::new();
        let (pool, handle) = IngestPool::start(Arc::new(processor), 64, 1, cancel.clone());

        for i in 0..20 {
            pool.submit(notification(&format!("C{}", i), "promo")).await.unwrap();
        }
        cancel.cancel();
        handle.await.unwrap();

        assert_eq!(queue.taken().len(), 40);
        assert!(pool.submit(notification("late", "promo")).await.is_err());
    }
}
