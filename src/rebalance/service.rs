//! 策略控制面：供外层 API/UI 调用的全部操作入口。

use std::sync::Arc;

use anyhow::Result;

use crate::portfolio::model::{FeeConfig, LastResult, Strategy, TradeLogEntry};
use crate::portfolio::store::Store;
use crate::rebalance::comparator::{ComparisonReport, PerformanceComparator};
use crate::rebalance::engine::{RebalanceEngine, RunOutcome};
use crate::rebalance::strategy_state::{StrategyState, StrategyUpdate};

/// 默认返回的交易日志条数
const DEFAULT_TRADE_LOG_LIMIT: usize = 50;

/// 调仓策略服务门面。
/// 手动操作同步返回结果；后台定时触发只记日志（见调度器）。
pub struct StrategyService {
    store: Arc<dyn Store>,
    state: StrategyState,
    engine: Arc<RebalanceEngine>,
    comparator: PerformanceComparator,
}

impl StrategyService {
    pub fn new(
        store: Arc<dyn Store>,
        state: StrategyState,
        engine: Arc<RebalanceEngine>,
        comparator: PerformanceComparator,
    ) -> Self {
        Self {
            store,
            state,
            engine,
            comparator,
        }
    }

    /// 当前策略配置（不存在时懒创建默认值）
    pub async fn strategy(&self, group_id: &str) -> Result<Strategy> {
        self.state.get_or_init(group_id).await
    }

    /// 部分更新策略配置
    pub async fn update_strategy(&self, group_id: &str, update: StrategyUpdate) -> Result<Strategy> {
        self.state.configure(group_id, update).await
    }

    /// 启用策略并捕获基准
    pub async fn enable(&self, group_id: &str) -> Result<Strategy> {
        self.state.enable(group_id).await
    }

    /// 停用策略，基准保留
    pub async fn disable(&self, group_id: &str) -> Result<Strategy> {
        self.state.disable(group_id).await
    }

    /// 同步执行一次调仓并返回结果
    pub async fn run_once(&self, group_id: &str) -> Result<RunOutcome> {
        self.engine.run_once(group_id).await
    }

    /// 最近一次调仓结果，从未跑过时为 None
    pub async fn last_result(&self, group_id: &str) -> Result<Option<LastResult>> {
        let strategy = self.state.get_or_init(group_id).await?;
        Ok(strategy.last_result)
    }

    /// 策略业绩比较（可选计费）
    pub async fn comparison(&self, group_id: &str, with_fees: bool) -> Result<ComparisonReport> {
        self.comparator.compare(group_id, with_fees).await
    }

    /// 某组最近的交易日志
    pub async fn trade_logs(
        &self,
        group_id: &str,
        limit: Option<usize>,
    ) -> Result<Vec<TradeLogEntry>> {
        self.store
            .trade_logs_for_group(group_id, Some(limit.unwrap_or(DEFAULT_TRADE_LOG_LIMIT)))
            .await
    }

    pub async fn fee_config(&self) -> Result<FeeConfig> {
        self.store.fee_config().await
    }

    /// 更新手续费配置；费率越界时拒绝且不做任何部分更新
    pub async fn update_fee_config(&self, config: FeeConfig) -> Result<FeeConfig> {
        config.validate()?;
        self.store.save_fee_config(&config).await?;
        Ok(config)
    }
}
