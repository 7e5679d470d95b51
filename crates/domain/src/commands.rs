use crate::automation::ReplyConfig;

/// 匹配成功后交给调度器的意图：事件上下文 + 动作节点的回复配置
#[derive(Debug, Clone)]
pub struct ReplyIntent {
    pub tenant_id: String,
    pub comment_id: String,
    pub author_id: String,
    pub credential: String,
    pub automation_id: String,
    pub action_node_id: String,
    pub reply: ReplyConfig,
}
