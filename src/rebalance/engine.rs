//! 调仓引擎：刷新价格、计算偏离、生成并执行有界的纠偏交易。

use std::collections::HashMap;
use std::fmt::{Display, Formatter};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use anyhow::Result;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};

use crate::exchange::order_executor::{OrderExecutor, EXECUTOR_TIMEOUT};
use crate::exchange::price_oracle::{refresh_asset_prices, PriceOracle};
use crate::portfolio::model::{
    Asset, Deviation, ExecutionStatus, LastResult, Side, TradeAction, TradeLogEntry, TradingMode,
};
use crate::portfolio::store::{GroupLocks, Store};

/// 一次调仓被跳过的原因，跳过不是错误
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SkipReason {
    GroupNotFound,
    StrategyDisabled,
    NonPositiveTotal,
    RunInProgress,
}

impl Display for SkipReason {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            SkipReason::GroupNotFound => write!(f, "资产组不存在"),
            SkipReason::StrategyDisabled => write!(f, "策略未启用"),
            SkipReason::NonPositiveTotal => write!(f, "组合总市值为零"),
            SkipReason::RunInProgress => write!(f, "上一次调仓仍在执行"),
        }
    }
}

/// `run_once` 的结果：完成（含本次执行详情）或跳过
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", tag = "outcome")]
pub enum RunOutcome {
    Completed(LastResult),
    Skipped { reason: SkipReason },
}

/// 计划中的一笔纠偏交易（尚未执行）
#[derive(Debug, Clone, PartialEq)]
pub struct PlannedTrade {
    pub symbol: String,
    pub side: Side,
    pub quantity: f64,
    pub value_usdt: f64,
}

/// 每类符号的数量精度：BTC 前缀 5 位小数，其余 3 位
fn quantity_precision(symbol: &str) -> i32 {
    if symbol.starts_with("BTC") {
        5
    } else {
        3
    }
}

/// 向零截断到符号精度。只舍不入，保证不超出按 USDT 计的预算。
pub fn truncate_quantity(raw: f64, symbol: &str) -> f64 {
    let scale = 10f64.powi(quantity_precision(symbol));
    (raw * scale).floor() / scale
}

/// 计算每个可交易资产相对基准权重的偏离。
/// 不在基准权重表中的符号目标权重按 0 处理（基准捕获后新增的
/// 资产在重新启用策略前没有目标份额，会被逐步卖出）。
pub fn compute_deviations(
    assets: &[Asset],
    total: f64,
    baseline_weights: &HashMap<String, f64>,
) -> Vec<Deviation> {
    assets
        .iter()
        .filter(|a| a.is_tradable())
        .map(|a| {
            let current_value = a.market_value();
            let current_weight = current_value / total;
            let target_weight = baseline_weights.get(&a.symbol).copied().unwrap_or(0.0);
            let target_value = total * target_weight;
            Deviation {
                symbol: a.symbol.clone(),
                current_value,
                target_value,
                deviation_amount: target_value - current_value,
                deviation_percent: (current_weight - target_weight) * 100.0,
            }
        })
        .collect()
}

/// 把偏离转换为有界的交易计划：
/// 偏离金额低于 min_trade 的不动，高于 max_trade 的截断到上限，
/// 数量向零截断后为 0 的不下单。
pub fn plan_trades(
    assets: &[Asset],
    deviations: &[Deviation],
    min_trade_usdt: f64,
    max_trade_usdt: f64,
) -> Vec<PlannedTrade> {
    let price_by_symbol: HashMap<&str, f64> = assets
        .iter()
        .filter(|a| a.is_tradable())
        .map(|a| (a.symbol.as_str(), a.price))
        .collect();

    deviations
        .iter()
        .filter_map(|d| {
            let amount = d.deviation_amount.abs();
            if amount < min_trade_usdt {
                return None;
            }
            let price = price_by_symbol.get(d.symbol.as_str()).copied()?;
            if price <= 0.0 {
                return None;
            }
            let capped_value = amount.min(max_trade_usdt);
            let quantity = truncate_quantity(capped_value / price, &d.symbol);
            if quantity <= 0.0 {
                return None;
            }
            let side = if d.deviation_amount > 0.0 {
                Side::Buy
            } else {
                Side::Sell
            };
            Some(PlannedTrade {
                symbol: d.symbol.clone(),
                side,
                quantity,
                // 用截断后的数量回算，保证不超过上限
                value_usdt: quantity * price,
            })
        })
        .collect()
}

/// 单飞许可：持有期间同组的新触发会被跳过，drop 时自动释放
struct RunPermit {
    flag: Arc<AtomicBool>,
}

impl Drop for RunPermit {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::SeqCst);
    }
}

/// 调仓引擎
pub struct RebalanceEngine {
    store: Arc<dyn Store>,
    oracle: Arc<dyn PriceOracle>,
    executor: Arc<dyn OrderExecutor>,
    trading_mode: TradingMode,
    locks: Arc<GroupLocks>,
    run_guards: DashMap<String, Arc<AtomicBool>>,
}

impl RebalanceEngine {
    pub fn new(
        store: Arc<dyn Store>,
        oracle: Arc<dyn PriceOracle>,
        executor: Arc<dyn OrderExecutor>,
        trading_mode: TradingMode,
        locks: Arc<GroupLocks>,
    ) -> Self {
        Self {
            store,
            oracle,
            executor,
            trading_mode,
            locks,
            run_guards: DashMap::new(),
        }
    }

    pub fn trading_mode(&self) -> TradingMode {
        self.trading_mode
    }

    /// 申请该组的单飞许可；已有调仓在执行时返回 None
    fn claim_run(&self, group_id: &str) -> Option<RunPermit> {
        let flag = self
            .run_guards
            .entry(group_id.to_string())
            .or_insert_with(|| Arc::new(AtomicBool::new(false)))
            .clone();
        if flag
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
        {
            Some(RunPermit { flag })
        } else {
            None
        }
    }

    /// 执行一次调仓。
    ///
    /// 组不存在、策略未启用、总市值为零、同组已有调仓在执行时跳过；
    /// 跳过不覆盖上一次的 `last_result`。持久化失败作为运行级错误上抛。
    pub async fn run_once(&self, group_id: &str) -> Result<RunOutcome> {
        let _permit = match self.claim_run(group_id) {
            Some(p) => p,
            None => {
                warn!("组 {} 上一次调仓仍在执行，本次触发跳过", group_id);
                return Ok(RunOutcome::Skipped {
                    reason: SkipReason::RunInProgress,
                });
            }
        };
        // 读-改-写全程持有组锁
        let _guard = self.locks.lock(group_id).await;

        let mut group = match self.store.get_group(group_id).await? {
            Some(g) => g,
            None => {
                return Ok(RunOutcome::Skipped {
                    reason: SkipReason::GroupNotFound,
                })
            }
        };
        let strategy = match &group.strategy {
            Some(s) if s.enabled => s.clone(),
            _ => {
                return Ok(RunOutcome::Skipped {
                    reason: SkipReason::StrategyDisabled,
                })
            }
        };

        refresh_asset_prices(&*self.oracle, &mut group.assets).await;

        let total = group.total_value();
        if total <= 0.0 {
            return Ok(RunOutcome::Skipped {
                reason: SkipReason::NonPositiveTotal,
            });
        }

        let deviations = compute_deviations(&group.assets, total, &strategy.baseline_weights);
        let planned = plan_trades(
            &group.assets,
            &deviations,
            strategy.min_trade_usdt,
            strategy.max_trade_usdt,
        );
        info!(
            "组 {} 调仓: 总市值 {:.2}, {} 个偏离, {} 笔计划交易, 模式 {}",
            group_id,
            total,
            deviations.len(),
            planned.len(),
            self.trading_mode
        );

        let mut actions = Vec::with_capacity(planned.len());
        for trade in planned {
            let action = self.execute_trade(&mut group.assets, trade).await;
            actions.push(action);
        }

        let timestamp = chrono::Utc::now().timestamp_millis();
        let result = LastResult {
            timestamp,
            total_before: total,
            actions: actions.clone(),
            deviations,
            trading_mode: self.trading_mode,
        };
        if let Some(strategy) = group.strategy.as_mut() {
            strategy.last_result = Some(result.clone());
        }
        self.store.save_group(&group).await?;

        let entries: Vec<TradeLogEntry> = actions
            .iter()
            .map(|a| TradeLogEntry::from_action(group_id, a, timestamp))
            .collect();
        self.store.append_trade_logs(&entries).await?;

        Ok(RunOutcome::Completed(result))
    }

    /// 执行一笔计划交易。
    ///
    /// 模拟模式直接调整记录数量；实盘模式只有在订单被接受且成交后
    /// 才调整数量——被拒绝或异常的订单绝不触碰存储的持仓。
    async fn execute_trade(&self, assets: &mut [Asset], trade: PlannedTrade) -> TradeAction {
        let (status, detail) = match self.trading_mode {
            TradingMode::Simulated => {
                apply_quantity(assets, &trade);
                (ExecutionStatus::Simulated, "模拟成交".to_string())
            }
            TradingMode::Real => {
                let placed = tokio::time::timeout(
                    EXECUTOR_TIMEOUT,
                    self.executor
                        .place_market_order(&trade.symbol, trade.side, trade.quantity),
                )
                .await;
                match placed {
                    Ok(Ok(outcome)) if outcome.is_success() => {
                        apply_quantity(assets, &trade);
                        (ExecutionStatus::Success, "实盘成交".to_string())
                    }
                    Ok(Ok(outcome)) => {
                        let detail = format!(
                            "下单被拒绝: {} {}",
                            outcome.error_code.unwrap_or_default(),
                            outcome.error_message.unwrap_or_default()
                        );
                        error!("{} {}", trade.symbol, detail);
                        (ExecutionStatus::Failed, detail)
                    }
                    Ok(Err(e)) => {
                        let detail = format!("下单异常: {}", e);
                        error!("{} {}", trade.symbol, detail);
                        (ExecutionStatus::Error, detail)
                    }
                    Err(_) => {
                        let detail = format!("下单超时 ({}s)", EXECUTOR_TIMEOUT.as_secs());
                        error!("{} {}", trade.symbol, detail);
                        (ExecutionStatus::Error, detail)
                    }
                }
            }
        };

        TradeAction {
            symbol: trade.symbol,
            side: trade.side,
            quantity: trade.quantity,
            value_usdt: trade.value_usdt,
            status,
            detail: Some(detail),
        }
    }
}

/// 按成交方向调整持仓数量
fn apply_quantity(assets: &mut [Asset], trade: &PlannedTrade) {
    if let Some(asset) = assets.iter_mut().find(|a| a.symbol == trade.symbol) {
        match trade.side {
            Side::Buy => asset.quantity += trade.quantity,
            Side::Sell => asset.quantity -= trade.quantity,
        }
        asset.updated_at = Some(chrono::Utc::now().timestamp_millis());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn asset(symbol: &str, quantity: f64, price: f64) -> Asset {
        Asset::new(symbol, symbol, quantity, price)
    }

    #[test]
    fn test_truncate_quantity_by_symbol_class() {
        // BTC 前缀 5 位小数，只舍不入
        assert_eq!(truncate_quantity(0.123456789, "BTCUSDT"), 0.12345);
        // 其他 3 位
        assert_eq!(truncate_quantity(1.2349, "ETHUSDT"), 1.234);
        assert_eq!(truncate_quantity(0.0004, "ETHUSDT"), 0.0);
    }

    #[test]
    fn test_compute_deviations_scenario_60_40() {
        // 基准 BTC 60% / ETH 40%，价格变动后 BTC 占 72%
        let assets = vec![asset("BTCUSDT", 1.0, 720.0), asset("ETHUSDT", 1.0, 280.0)];
        let weights = HashMap::from([
            ("BTCUSDT".to_string(), 0.6),
            ("ETHUSDT".to_string(), 0.4),
        ]);
        let deviations = compute_deviations(&assets, 1000.0, &weights);

        let btc = deviations.iter().find(|d| d.symbol == "BTCUSDT").unwrap();
        assert!((btc.deviation_amount - (-120.0)).abs() < 1e-9);
        assert!((btc.deviation_percent - 12.0).abs() < 1e-9);

        let eth = deviations.iter().find(|d| d.symbol == "ETHUSDT").unwrap();
        assert!((eth.deviation_amount - 120.0).abs() < 1e-9);
        assert!((eth.deviation_percent - (-12.0)).abs() < 1e-9);
    }

    #[test]
    fn test_missing_baseline_symbol_targets_zero() {
        // 基准捕获后新增的资产目标权重按 0 处理，会被卖出
        let assets = vec![asset("SOLUSDT", 10.0, 100.0)];
        let deviations = compute_deviations(&assets, 2000.0, &HashMap::new());
        assert_eq!(deviations[0].target_value, 0.0);
        assert_eq!(deviations[0].deviation_amount, -1000.0);
    }

    #[test]
    fn test_plan_trades_respects_min_and_max() {
        let assets = vec![asset("BTCUSDT", 1.0, 720.0), asset("ETHUSDT", 1.0, 280.0)];
        let weights = HashMap::from([
            ("BTCUSDT".to_string(), 0.6),
            ("ETHUSDT".to_string(), 0.4),
        ]);
        let deviations = compute_deviations(&assets, 1000.0, &weights);

        // 偏离 120，低于 min=150 时不出交易
        assert!(plan_trades(&assets, &deviations, 150.0, 1000.0).is_empty());

        // max=50 时截断到上限
        let trades = plan_trades(&assets, &deviations, 50.0, 50.0);
        assert_eq!(trades.len(), 2);
        for t in &trades {
            assert!(t.value_usdt <= 50.0 + 1e-9);
        }

        // 正常范围：SELL BTC / BUY ETH 各约 120
        let trades = plan_trades(&assets, &deviations, 50.0, 1000.0);
        let btc = trades.iter().find(|t| t.symbol == "BTCUSDT").unwrap();
        assert_eq!(btc.side, Side::Sell);
        assert!(btc.value_usdt <= 120.0 + 1e-9);
        assert!(btc.value_usdt > 120.0 - 720.0 / 1e5 - 1e-9);
        let eth = trades.iter().find(|t| t.symbol == "ETHUSDT").unwrap();
        assert_eq!(eth.side, Side::Buy);
    }

    #[test]
    fn test_plan_trades_drops_zero_quantity() {
        // 偏离超过 min 但价格太高，截断后数量为 0
        let assets = vec![asset("ETHUSDT", 0.0, 1_000_000.0)];
        let deviations = vec![Deviation {
            symbol: "ETHUSDT".to_string(),
            current_value: 0.0,
            target_value: 200.0,
            deviation_amount: 200.0,
            deviation_percent: -20.0,
        }];
        assert!(plan_trades(&assets, &deviations, 100.0, 1000.0).is_empty());
    }
}
