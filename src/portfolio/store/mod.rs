//! 持久化层：按资产组 id 读写的键值存储抽象。
//!
//! 存储本身只保证单次读/写原子；跨越"读-改-写"的序列（启用策略、
//! 修改配置、执行一次调仓）必须经由 [`GroupLocks`] 对组 id 加锁，
//! 避免定时调仓与手动修改互相覆盖。

pub mod json_file_store;
pub mod memory_store;

use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use dashmap::DashMap;
use tokio::sync::{Mutex, OwnedMutexGuard};

use crate::portfolio::model::{FeeConfig, Group, TradeLogEntry};

pub use json_file_store::JsonFileStore;
pub use memory_store::MemoryStore;

/// 按组 id 的键值持久化接口
#[async_trait]
pub trait Store: Send + Sync {
    /// 所有资产组
    async fn list_groups(&self) -> Result<Vec<Group>>;

    /// 按 id 读取资产组，不存在时返回 None
    async fn get_group(&self, group_id: &str) -> Result<Option<Group>>;

    /// 整体覆盖写入一个资产组（含其策略与最近结果）
    async fn save_group(&self, group: &Group) -> Result<()>;

    /// 追加交易日志，只增不改
    async fn append_trade_logs(&self, entries: &[TradeLogEntry]) -> Result<()>;

    /// 某组的交易日志，按时间倒序，最多 limit 条
    async fn trade_logs_for_group(
        &self,
        group_id: &str,
        limit: Option<usize>,
    ) -> Result<Vec<TradeLogEntry>>;

    async fn fee_config(&self) -> Result<FeeConfig>;

    async fn save_fee_config(&self, config: &FeeConfig) -> Result<()>;
}

/// 每个组 id 一把异步互斥锁，序列化该组的所有读-改-写序列
#[derive(Default)]
pub struct GroupLocks {
    locks: DashMap<String, Arc<Mutex<()>>>,
}

impl GroupLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// 获取该组的锁，持有返回的 guard 期间独占该组
    pub async fn lock(&self, group_id: &str) -> OwnedMutexGuard<()> {
        let lock = self
            .locks
            .entry(group_id.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();
        lock.lock_owned().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_group_locks_serialize_same_group() {
        let locks = Arc::new(GroupLocks::new());
        let guard = locks.lock("g1").await;

        // 同组第二次加锁应阻塞
        let locks2 = locks.clone();
        let pending = tokio::spawn(async move { locks2.lock("g1").await });
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        assert!(!pending.is_finished());

        // 不同组互不影响
        let _other = locks.lock("g2").await;

        drop(guard);
        pending.await.unwrap();
    }
}
