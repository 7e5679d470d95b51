//! 共享的键值协调存储：幂等令牌、限流计数器、冷却标记、凭证缓存
//!
//! 所有写操作都必须是原子的 (SET NX / INCR)，调用方不做读-改-写。

mod memory;
mod redis_store;

pub use memory::MemoryStore;
pub use redis_store::RedisStore;

use anyhow::Result;
use async_trait::async_trait;
use std::time::Duration;

#[async_trait]
pub trait CoordinationStore: Send + Sync {
    /// 键不存在时写入并返回 true；已存在返回 false
    async fn claim_once(&self, key: &str, ttl: Duration) -> Result<bool>;

    /// 原子自增，仅当键还没有过期时间时才设置 TTL
    async fn incr_with_ttl(&self, key: &str, ttl: Duration) -> Result<i64>;

    async fn get(&self, key: &str) -> Result<Option<String>>;

    /// `ttl` 为零表示永不过期
    async fn set(&self, key: &str, value: &str, ttl: Duration) -> Result<()>;
}
