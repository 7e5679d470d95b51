use crate::queue::{TaskOptions, WorkQueue};
use anyhow::Result;
use chrono::{DateTime, Utc};
use domain::reply::{apply_content_rules, pick_reply, render_dm};
use domain::{ActionKind, Clock, DelayRange, ReplyIntent, ScheduledWorkItem};
use rand::Rng;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// 一个待入队的工作项及其相对当前时刻的延迟
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedItem {
    pub item: ScheduledWorkItem,
    pub delay: Duration,
}

/// 单段延迟上限（秒），租户配置超出时截断
const MAX_DELAY_SECS: i64 = 24 * 60 * 60;

/// 闭区间 [min, max] 秒内均匀取值；max ≤ min 时固定为 min，负数按 0 处理
fn draw_delay<R: Rng>(range: DelayRange, rng: &mut R) -> u64 {
    let min = range.min.clamp(0, MAX_DELAY_SECS) as u64;
    let max = range.max.clamp(0, MAX_DELAY_SECS) as u64;
    if max <= min {
        min
    } else {
        rng.gen_range(min..=max)
    }
}

/// 由意图生成公开回复和私信两个工作项，私信总在公开回复之后
pub fn plan<R: Rng>(intent: &ReplyIntent, now: DateTime<Utc>, rng: &mut R) -> Vec<PlannedItem> {
    let limits = &intent.reply.safety.combined_limits;
    let between = draw_delay(limits.delay_between_actions, rng);
    let to_dm = draw_delay(limits.comment_to_dm_delay, rng);

    let item = |kind, target_id: &str, message: String, delay_secs: u64| PlannedItem {
        item: ScheduledWorkItem {
            kind,
            tenant_id: intent.tenant_id.clone(),
            target_id: target_id.to_string(),
            comment_id: intent.comment_id.clone(),
            message,
            credential: intent.credential.clone(),
            automation_id: intent.automation_id.clone(),
            action_node_id: intent.action_node_id.clone(),
            not_before: chrono::Duration::try_seconds(delay_secs as i64)
                .and_then(|d| now.checked_add_signed(d))
                .unwrap_or(now),
        },
        delay: Duration::from_secs(delay_secs),
    };

    let mut planned = Vec::with_capacity(2);

    let reply = pick_reply(&intent.reply.public_replies, &intent.author_id)
        .map(|msg| apply_content_rules(msg, &intent.reply.safety.content_rules))
        .filter(|msg| !msg.trim().is_empty());
    match reply {
        Some(message) => planned.push(item(ActionKind::PublicReply, &intent.comment_id, message, between)),
        None => debug!(automation_id = %intent.automation_id, "No public reply configured"),
    }

    let dm = render_dm(&intent.reply.dm_message, &intent.reply.buttons);
    if dm.trim().is_empty() {
        debug!(automation_id = %intent.automation_id, "No direct message configured");
    } else {
        planned.push(item(ActionKind::DirectMessage, &intent.author_id, dm, between + to_dm));
    }

    planned
}

/// 计算延迟并把工作项交给队列
#[derive(Clone)]
pub struct DispatchScheduler {
    queue: Arc<dyn WorkQueue>,
    clock: Arc<dyn Clock>,
    options: TaskOptions,
}

impl DispatchScheduler {
    pub fn new(queue: Arc<dyn WorkQueue>, clock: Arc<dyn Clock>) -> Self {
        Self {
            queue,
            clock,
            options: TaskOptions::default(),
        }
    }

    /// 覆盖队列类别、重试预算和单次超时；`process_in` 由调度器按延迟填写
    pub fn with_options(mut self, options: TaskOptions) -> Self {
        self.options = options;
        self
    }

    pub async fn schedule(&self, intent: &ReplyIntent) -> Result<usize> {
        let planned = {
            let mut rng = rand::thread_rng();
            plan(intent, self.clock.now(), &mut rng)
        };

        let count = planned.len();
        for PlannedItem { item, delay } in planned {
            debug!(
                kind = %item.kind,
                tenant_id = %item.tenant_id,
                delay_secs = delay.as_secs(),
                "Scheduling work item"
            );
            let options = TaskOptions {
                process_in: delay,
                ..self.options
            };
            self.queue.enqueue(item, options).await?;
        }
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{clock_at, RecordingQueue};
    use domain::{ButtonConfig, ContentRules, ReplyConfig};
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn intent(between: [i64; 2], to_dm: [i64; 2]) -> ReplyIntent {
        let mut reply = ReplyConfig {
            public_replies: vec!["Thanks!".into()],
            dm_message: "Check this: ".into(),
            buttons: vec![ButtonConfig {
                title: "Shop".into(),
                url: "http://x".into(),
                enabled: true,
            }],
            ..Default::default()
        };
        reply.safety.combined_limits.delay_between_actions = between.into();
        reply.safety.combined_limits.comment_to_dm_delay = to_dm.into();
        ReplyIntent {
            tenant_id: "T".into(),
            comment_id: "C1".into(),
            author_id: "U1".into(),
            credential: "tok".into(),
            automation_id: "wf-1".into(),
            action_node_id: "action".into(),
            reply,
        }
    }

    #[test]
    fn test_delays_stay_in_configured_ranges() {
        let now = clock_at(2024, 6, 1, 0, 0).now();
        let intent = intent([2, 5], [1, 3]);
        let mut rng = StdRng::seed_from_u64(7);

        for _ in 0..500 {
            let planned = plan(&intent, now, &mut rng);
            assert_eq!(planned.len(), 2);
            let (reply, dm) = (&planned[0], &planned[1]);
            assert_eq!(reply.item.kind, ActionKind::PublicReply);
            assert_eq!(dm.item.kind, ActionKind::DirectMessage);

            let reply_delay = (reply.item.not_before - now).num_seconds();
            let gap = (dm.item.not_before - reply.item.not_before).num_seconds();
            assert!((2..=5).contains(&reply_delay), "reply delay {}", reply_delay);
            assert!((1..=3).contains(&gap), "dm gap {}", gap);
            assert_eq!(reply.delay.as_secs() as i64, reply_delay);
        }
    }

    #[test]
    fn test_degenerate_ranges_use_min() {
        let now = clock_at(2024, 6, 1, 0, 0).now();
        let mut rng = StdRng::seed_from_u64(1);

        let planned = plan(&intent([4, 4], [9, 1]), now, &mut rng);
        assert_eq!(planned[0].delay, Duration::from_secs(4));
        assert_eq!(planned[1].delay, Duration::from_secs(13));

        let planned = plan(&intent([-3, -1], [0, 0]), now, &mut rng);
        assert_eq!(planned[0].delay, Duration::ZERO);
        assert_eq!(planned[1].item.not_before, now);
    }

    #[test]
    fn test_oversized_delays_are_capped() {
        let now = clock_at(2024, 6, 1, 0, 0).now();
        let huge = 10_i64.pow(13);
        let mut rng = StdRng::seed_from_u64(5);

        let planned = plan(&intent([huge, huge], [i64::MAX, i64::MAX]), now, &mut rng);
        let cap = MAX_DELAY_SECS as u64;
        assert_eq!(planned[0].delay, Duration::from_secs(cap));
        assert_eq!(planned[1].delay, Duration::from_secs(2 * cap));
        assert_eq!((planned[1].item.not_before - now).num_seconds(), 2 * MAX_DELAY_SECS);
    }

    #[test]
    fn test_messages_are_rendered() {
        let now = clock_at(2024, 6, 1, 0, 0).now();
        let mut rng = StdRng::seed_from_u64(3);
        let planned = plan(&intent([0, 0], [0, 0]), now, &mut rng);

        assert_eq!(planned[0].item.message, "Thanks!");
        assert_eq!(planned[0].item.target_id, "C1");
        assert_eq!(planned[1].item.message, "Check this: \nShop: http://x");
        assert_eq!(planned[1].item.target_id, "U1");
        assert_eq!(planned[1].item.credential, "tok");
    }

    #[test]
    fn test_content_rules_apply_to_public_reply() {
        let now = clock_at(2024, 6, 1, 0, 0).now();
        let mut intent = intent([0, 0], [0, 0]);
        intent.reply.public_replies = vec!["hey @a @b #x".into()];
        intent.reply.safety.content_rules = ContentRules {
            max_mentions: 1,
            max_hashtags: 0,
        };
        let planned = plan(&intent, now, &mut StdRng::seed_from_u64(0));
        assert_eq!(planned[0].item.message, "hey @a #x");
    }

    #[test]
    fn test_missing_messages_produce_fewer_items() {
        let now = clock_at(2024, 6, 1, 0, 0).now();
        let mut intent = intent([0, 0], [0, 0]);
        intent.reply.public_replies.clear();
        let planned = plan(&intent, now, &mut StdRng::seed_from_u64(0));
        assert_eq!(planned.len(), 1);
        assert_eq!(planned[0].item.kind, ActionKind::DirectMessage);

        intent.reply.dm_message.clear();
        intent.reply.buttons.clear();
        assert!(plan(&intent, now, &mut StdRng::seed_from_u64(0)).is_empty());
    }

    #[tokio::test]
    async fn test_schedule_enqueues_with_task_options() {
        let queue = Arc::new(RecordingQueue::default());
        let clock = clock_at(2024, 6, 1, 0, 0);
        let scheduler = DispatchScheduler::new(queue.clone(), Arc::new(clock.clone()));

        let count = scheduler.schedule(&intent([2, 5], [1, 3])).await.unwrap();
        assert_eq!(count, 2);

        let taken = queue.taken();
        assert_eq!(taken.len(), 2);
        for (item, opts) in &taken {
            assert_eq!(opts.max_retry, 8);
            assert_eq!(opts.timeout, Duration::from_secs(15));
            assert_eq!(
                opts.process_in.as_secs() as i64,
                (item.not_before - clock.now()).num_seconds()
            );
        }
        assert!(taken[1].0.not_before >= taken[0].0.not_before);
    }
}
