use anyhow::{Context, Result};
use domain::{keys, CommentEvent, NodeKind, ReplyIntent};
use std::sync::Arc;
use storage::{AutomationRepository, CoordinationStore};
use tracing::{debug, info};

/// 把一条评论事件和租户的启用流程逐一比对，产出回复意图
#[derive(Clone)]
pub struct RuleMatcher {
    store: Arc<dyn CoordinationStore>,
    repo: Arc<dyn AutomationRepository>,
}

impl RuleMatcher {
    pub fn new(store: Arc<dyn CoordinationStore>, repo: Arc<dyn AutomationRepository>) -> Self {
        Self { store, repo }
    }

    /// 除领取幂等令牌外没有副作用。存储或仓库错误直接返回，由上游重试
    pub async fn match_event(&self, event: &CommentEvent) -> Result<Vec<ReplyIntent>> {
        let first_seen = self
            .store
            .claim_once(&keys::event_token(&event.event_id), keys::IDEMPOTENCY_TTL)
            .await
            .context("Failed to claim event token")?;
        if !first_seen {
            info!(event_id = %event.event_id, "Duplicate event ignored");
            return Ok(Vec::new());
        }

        let definitions = self
            .repo
            .list_active(&event.platform_account_id)
            .await
            .context("Failed to list active automations")?;

        let mut intents = Vec::new();
        for def in &definitions {
            let Some((trigger, cfg)) = def.trigger() else {
                continue;
            };
            if !cfg.accepts_post(&event.post_id) {
                debug!(automation_id = %def.id, post_id = %event.post_id, "Post not selected");
                continue;
            }
            if !cfg.accepts_text(&event.text) {
                debug!(automation_id = %def.id, "Keyword filter rejected comment");
                continue;
            }
            let Some(action) = def.next_node(&trigger.id) else {
                debug!(automation_id = %def.id, "Trigger has no action node");
                continue;
            };

            let fresh = self
                .store
                .claim_once(
                    &keys::exec_token(&def.id, &action.id, &event.comment_id),
                    keys::IDEMPOTENCY_TTL,
                )
                .await
                .context("Failed to claim node execution token")?;
            if !fresh {
                info!(
                    automation_id = %def.id,
                    node_id = %action.id,
                    comment_id = %event.comment_id,
                    "Node execution already claimed"
                );
                continue;
            }

            match &action.kind {
                NodeKind::SendMessage(reply) => intents.push(ReplyIntent {
                    tenant_id: event.tenant_id.clone(),
                    comment_id: event.comment_id.clone(),
                    author_id: event.author_id.clone(),
                    credential: event.credential.clone(),
                    automation_id: def.id.clone(),
                    action_node_id: action.id.clone(),
                    reply: reply.clone(),
                }),
                other => {
                    debug!(automation_id = %def.id, node_id = %action.id, kind = ?other, "Unsupported action node")
                }
            }
        }

        Ok(intents)
    }
}
