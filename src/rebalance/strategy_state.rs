//! 策略生命周期：懒初始化、配置、启用（捕获基准）、停用。

use std::sync::Arc;

use anyhow::Result;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::app_error::AppError;
use crate::exchange::price_oracle::{refresh_asset_prices, PriceOracle};
use crate::portfolio::model::{
    BaselineSnapshot, FrequencyUnit, Group, SnapshotAsset, Strategy,
};
use crate::portfolio::store::{GroupLocks, Store};
use crate::rebalance::scheduler::RebalanceScheduler;

/// 部分更新请求：未指定的字段保持原值
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StrategyUpdate {
    pub unit: Option<FrequencyUnit>,
    pub value: Option<u32>,
    pub min_trade_usdt: Option<f64>,
    pub max_trade_usdt: Option<f64>,
}

/// 策略状态服务
pub struct StrategyState {
    store: Arc<dyn Store>,
    oracle: Arc<dyn PriceOracle>,
    scheduler: Arc<RebalanceScheduler>,
    locks: Arc<GroupLocks>,
}

impl StrategyState {
    pub fn new(
        store: Arc<dyn Store>,
        oracle: Arc<dyn PriceOracle>,
        scheduler: Arc<RebalanceScheduler>,
        locks: Arc<GroupLocks>,
    ) -> Self {
        Self {
            store,
            oracle,
            scheduler,
            locks,
        }
    }

    async fn load_group(&self, group_id: &str) -> Result<Group> {
        self.store
            .get_group(group_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("资产组不存在: {}", group_id)).into())
    }

    /// 读取策略配置，不存在时用默认值懒创建并持久化
    pub async fn get_or_init(&self, group_id: &str) -> Result<Strategy> {
        let _guard = self.locks.lock(group_id).await;
        let mut group = self.load_group(group_id).await?;
        if let Some(strategy) = &group.strategy {
            return Ok(strategy.clone());
        }
        let strategy = Strategy::default();
        group.strategy = Some(strategy.clone());
        self.store.save_group(&group).await?;
        Ok(strategy)
    }

    /// 部分更新策略配置。
    /// 策略已启用时重启该组定时器使新频率生效，并异步触发一次调仓。
    pub async fn configure(&self, group_id: &str, update: StrategyUpdate) -> Result<Strategy> {
        if let Some(value) = update.value {
            if value < 1 {
                return Err(AppError::ConfigError("频率数值必须 >= 1".to_string()).into());
            }
        }

        let enabled;
        let strategy = {
            let _guard = self.locks.lock(group_id).await;
            let mut group = self.load_group(group_id).await?;
            let strategy = group.strategy.get_or_insert_with(Strategy::default);

            let min = update.min_trade_usdt.unwrap_or(strategy.min_trade_usdt);
            let max = update.max_trade_usdt.unwrap_or(strategy.max_trade_usdt);
            if min < 0.0 || max <= 0.0 || min > max {
                return Err(AppError::ConfigError(format!(
                    "交易金额边界非法: min={}, max={}",
                    min, max
                ))
                .into());
            }

            if let Some(unit) = update.unit {
                strategy.frequency.unit = unit;
            }
            if let Some(value) = update.value {
                strategy.frequency.value = value;
            }
            strategy.min_trade_usdt = min;
            strategy.max_trade_usdt = max;
            enabled = strategy.enabled;

            let strategy = strategy.clone();
            self.store.save_group(&group).await?;
            strategy
        };

        if enabled {
            // 新频率立刻生效，并补一次立即调仓，不阻塞调用方
            self.scheduler.start(group_id).await?;
            self.scheduler.trigger_now(group_id);
        }
        info!("组 {} 策略配置已更新", group_id);
        Ok(strategy)
    }

    /// 启用策略：按当前价格捕获基准权重与持仓快照，
    /// 安装定时器并立即触发一次调仓。
    pub async fn enable(&self, group_id: &str) -> Result<Strategy> {
        let strategy = {
            let _guard = self.locks.lock(group_id).await;
            let mut group = self.load_group(group_id).await?;

            // 基准必须基于最新标记价格，失败的符号保留旧价
            refresh_asset_prices(&*self.oracle, &mut group.assets).await;

            let total = group.total_value();
            let timestamp = chrono::Utc::now().timestamp_millis();

            let strategy = group.strategy.get_or_insert_with(Strategy::default);
            strategy.enabled = true;
            // 零市值组合合法：权重表为空即"无基准"，引擎会跳过
            strategy.baseline_weights = group
                .assets
                .iter()
                .filter(|a| a.is_tradable())
                .filter(|_| total > 0.0)
                .map(|a| (a.symbol.clone(), a.market_value() / total))
                .collect();
            strategy.baseline_snapshot = Some(BaselineSnapshot {
                timestamp,
                total_value: total,
                assets: group
                    .assets
                    .iter()
                    .filter(|a| a.is_tradable())
                    .map(|a| SnapshotAsset {
                        symbol: a.symbol.clone(),
                        quantity: a.quantity,
                        price: a.price,
                    })
                    .collect(),
            });

            let strategy = strategy.clone();
            self.store.save_group(&group).await?;
            strategy
        };

        self.scheduler.start(group_id).await?;
        self.scheduler.trigger_now(group_id);
        info!(
            "组 {} 策略已启用, 基准含 {} 个符号",
            group_id,
            strategy.baseline_weights.len()
        );
        Ok(strategy)
    }

    /// 停用策略：停掉定时器，基准数据保留，业绩比较仍可用。
    /// 进行中的调仓不被取消，允许其完成并记录结果。
    pub async fn disable(&self, group_id: &str) -> Result<Strategy> {
        let strategy = {
            let _guard = self.locks.lock(group_id).await;
            let mut group = self.load_group(group_id).await?;
            let strategy = group.strategy.get_or_insert_with(Strategy::default);
            strategy.enabled = false;
            let strategy = strategy.clone();
            self.store.save_group(&group).await?;
            strategy
        };

        self.scheduler.stop(group_id).await;
        info!("组 {} 策略已停用", group_id);
        Ok(strategy)
    }
}
