use super::CoordinationStore;
use anyhow::{anyhow, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use domain::{Clock, SystemClock};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

struct Entry {
    value: String,
    expires_at: Option<DateTime<Utc>>,
}

impl Entry {
    fn is_live(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.map_or(true, |at| at > now)
    }
}

/// 写入时若距上次清扫超过该间隔，顺带清掉所有过期条目
const SWEEP_INTERVAL_SECS: i64 = 60;

struct Entries {
    map: HashMap<String, Entry>,
    last_sweep: DateTime<Utc>,
}

impl Entries {
    fn sweep_if_due(&mut self, now: DateTime<Utc>) {
        if (now - self.last_sweep).num_seconds() < SWEEP_INTERVAL_SECS {
            return;
        }
        self.map.retain(|_, e| e.is_live(now));
        self.last_sweep = now;
    }
}

/// 进程内实现，单实例部署与测试使用；时钟可注入以模拟过期
#[derive(Clone)]
pub struct MemoryStore {
    entries: Arc<Mutex<Entries>>,
    clock: Arc<dyn Clock>,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        let last_sweep = clock.now();
        Self {
            entries: Arc::new(Mutex::new(Entries {
                map: HashMap::new(),
                last_sweep,
            })),
            clock,
        }
    }

    fn lock(&self) -> Result<MutexGuard<'_, Entries>> {
        self.entries
            .lock()
            .map_err(|_| anyhow!("memory store lock poisoned"))
    }

    fn expiry(&self, now: DateTime<Utc>, ttl: Duration) -> Result<Option<DateTime<Utc>>> {
        if ttl.is_zero() {
            return Ok(None);
        }
        let ttl = chrono::Duration::from_std(ttl).map_err(|e| anyhow!("invalid ttl: {}", e))?;
        now.checked_add_signed(ttl)
            .map(Some)
            .ok_or_else(|| anyhow!("ttl out of range"))
    }

    /// 过期条目按需清除
    fn live_entry<'a>(
        map: &'a mut HashMap<String, Entry>,
        key: &str,
        now: DateTime<Utc>,
    ) -> Option<&'a mut Entry> {
        if map.get(key).is_some_and(|e| !e.is_live(now)) {
            map.remove(key);
        }
        map.get_mut(key)
    }
}

#[async_trait]
impl CoordinationStore for MemoryStore {
    async fn claim_once(&self, key: &str, ttl: Duration) -> Result<bool> {
        let now = self.clock.now();
        let expires_at = self.expiry(now, ttl)?;
        let mut entries = self.lock()?;
        entries.sweep_if_due(now);
        if Self::live_entry(&mut entries.map, key, now).is_some() {
            return Ok(false);
        }
        entries.map.insert(
            key.to_string(),
            Entry {
                value: "1".to_string(),
                expires_at,
            },
        );
        Ok(true)
    }

    async fn incr_with_ttl(&self, key: &str, ttl: Duration) -> Result<i64> {
        let now = self.clock.now();
        let expires_at = self.expiry(now, ttl)?;
        let mut entries = self.lock()?;
        entries.sweep_if_due(now);
        match Self::live_entry(&mut entries.map, key, now) {
            Some(entry) => {
                let current: i64 = entry
                    .value
                    .parse()
                    .map_err(|_| anyhow!("value at {} is not an integer", key))?;
                let next = current + 1;
                entry.value = next.to_string();
                if entry.expires_at.is_none() {
                    entry.expires_at = expires_at;
                }
                Ok(next)
            }
            None => {
                entries.map.insert(
                    key.to_string(),
                    Entry {
                        value: "1".to_string(),
                        expires_at,
                    },
                );
                Ok(1)
            }
        }
    }

    async fn get(&self, key: &str) -> Result<Option<String>> {
        let now = self.clock.now();
        let mut entries = self.lock()?;
        Ok(Self::live_entry(&mut entries.map, key, now).map(|e| e.value.clone()))
    }

    async fn set(&self, key: &str, value: &str, ttl: Duration) -> Result<()> {
        let now = self.clock.now();
        let expires_at = self.expiry(now, ttl)?;
        let mut entries = self.lock()?;
        entries.sweep_if_due(now);
        entries.map.insert(
            key.to_string(),
            Entry {
                value: value.to_string(),
                expires_at,
            },
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use domain::ManualClock;

    fn store() -> (MemoryStore, ManualClock) {
        let clock = ManualClock::new(Utc.with_ymd_and_hms(2024, 5, 1, 10, 0, 0).unwrap());
        (MemoryStore::with_clock(Arc::new(clock.clone())), clock)
    }

    #[tokio::test]
    async fn test_claim_once_until_expiry() {
        let (kv, clock) = store();
        let ttl = Duration::from_secs(60);

        assert!(kv.claim_once("idem:event:1", ttl).await.unwrap());
        assert!(!kv.claim_once("idem:event:1", ttl).await.unwrap());
        assert!(kv.claim_once("idem:event:2", ttl).await.unwrap());

        clock.advance(chrono::Duration::seconds(61));
        assert!(kv.claim_once("idem:event:1", ttl).await.unwrap());
    }

    #[tokio::test]
    async fn test_incr_arms_ttl_only_once() {
        let (kv, clock) = store();
        let ttl = Duration::from_secs(100);

        assert_eq!(kv.incr_with_ttl("c", ttl).await.unwrap(), 1);
        clock.advance(chrono::Duration::seconds(90));
        // 第二次自增不会把过期时间往后推
        assert_eq!(kv.incr_with_ttl("c", ttl).await.unwrap(), 2);
        clock.advance(chrono::Duration::seconds(11));
        assert_eq!(kv.incr_with_ttl("c", ttl).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_incr_arms_ttl_on_persistent_key() {
        let (kv, clock) = store();
        kv.set("c", "5", Duration::ZERO).await.unwrap();
        assert_eq!(kv.incr_with_ttl("c", Duration::from_secs(10)).await.unwrap(), 6);
        clock.advance(chrono::Duration::seconds(11));
        assert!(kv.get("c").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_incr_rejects_non_integer() {
        let (kv, _) = store();
        kv.set("c", "abc", Duration::from_secs(10)).await.unwrap();
        assert!(kv.incr_with_ttl("c", Duration::from_secs(10)).await.is_err());
    }

    #[tokio::test]
    async fn test_expired_keys_are_swept_on_write() {
        let (kv, clock) = store();
        let ttl = Duration::from_secs(60);
        for i in 0..10_000 {
            kv.claim_once(&format!("idem:event:{}", i), ttl).await.unwrap();
        }
        kv.set("keep", "v", Duration::ZERO).await.unwrap();
        assert_eq!(kv.lock().unwrap().map.len(), 10_001);

        clock.advance(chrono::Duration::days(30));
        assert!(kv.claim_once("idem:event:new", ttl).await.unwrap());
        assert_eq!(kv.lock().unwrap().map.len(), 2);
        assert_eq!(kv.get("keep").await.unwrap().as_deref(), Some("v"));
    }

    #[tokio::test]
    async fn test_get_set_with_ttl() {
        let (kv, clock) = store();
        assert!(kv.get("k").await.unwrap().is_none());

        kv.set("k", "v", Duration::from_secs(5)).await.unwrap();
        assert_eq!(kv.get("k").await.unwrap().as_deref(), Some("v"));

        clock.advance(chrono::Duration::seconds(5));
        assert!(kv.get("k").await.unwrap().is_none());
    }
}
