use anyhow::Result;
use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::portfolio::model::{FeeConfig, Group, TradeLogEntry};
use crate::portfolio::store::Store;

/// 纯内存存储，用于测试与临时运行，不落盘
#[derive(Default)]
pub struct MemoryStore {
    groups: RwLock<Vec<Group>>,
    trade_log: RwLock<Vec<TradeLogEntry>>,
    fee_config: RwLock<FeeConfig>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// 预置资产组，便于测试搭建场景
    pub async fn with_group(self, group: Group) -> Self {
        self.groups.write().await.push(group);
        self
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn list_groups(&self) -> Result<Vec<Group>> {
        Ok(self.groups.read().await.clone())
    }

    async fn get_group(&self, group_id: &str) -> Result<Option<Group>> {
        Ok(self
            .groups
            .read()
            .await
            .iter()
            .find(|g| g.id == group_id)
            .cloned())
    }

    async fn save_group(&self, group: &Group) -> Result<()> {
        let mut groups = self.groups.write().await;
        match groups.iter_mut().find(|g| g.id == group.id) {
            Some(existing) => *existing = group.clone(),
            None => groups.push(group.clone()),
        }
        Ok(())
    }

    async fn append_trade_logs(&self, entries: &[TradeLogEntry]) -> Result<()> {
        self.trade_log.write().await.extend_from_slice(entries);
        Ok(())
    }

    async fn trade_logs_for_group(
        &self,
        group_id: &str,
        limit: Option<usize>,
    ) -> Result<Vec<TradeLogEntry>> {
        let log = self.trade_log.read().await;
        let mut entries: Vec<TradeLogEntry> = log
            .iter()
            .filter(|e| e.group_id == group_id)
            .cloned()
            .collect();
        entries.sort_by_key(|e| std::cmp::Reverse(e.timestamp));
        if let Some(limit) = limit {
            entries.truncate(limit);
        }
        Ok(entries)
    }

    async fn fee_config(&self) -> Result<FeeConfig> {
        Ok(*self.fee_config.read().await)
    }

    async fn save_fee_config(&self, config: &FeeConfig) -> Result<()> {
        *self.fee_config.write().await = *config;
        Ok(())
    }
}
