//! 业绩比较器：再平衡策略 vs 买入持有基准，含手续费后的净收益。

use std::collections::HashMap;
use std::sync::Arc;

use anyhow::Result;
use serde::{Deserialize, Serialize};

use crate::error::app_error::AppError;
use crate::portfolio::store::Store;

const MS_PER_DAY: i64 = 86_400_000;

/// 单侧策略的收益
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StrategyReturn {
    pub value_now: f64,
    pub delta_total: f64,
    pub return_percent: f64,
    pub annualized_percent: f64,
}

/// 手续费汇总与费后净收益
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeeSummary {
    pub fee_percent: f64,
    pub total_trading_volume: f64,
    pub total_fees: f64,
    pub net_delta_total: f64,
    pub net_return_percent: f64,
    pub net_annualized_percent: f64,
}

/// 结论：哪个策略更优及推荐文案
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Verdict {
    pub outperformance_percent: f64,
    pub better_strategy: String,
    pub summary: String,
    pub recommendation: String,
}

/// 比较结果。未捕获基准时 `has_baseline == false`，其余字段为空。
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComparisonReport {
    pub has_baseline: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub baseline_timestamp: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub baseline_total: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub days_elapsed: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub buy_and_hold: Option<StrategyReturn>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rebalance: Option<StrategyReturn>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fees: Option<FeeSummary>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub comparison: Option<Verdict>,
}

impl ComparisonReport {
    fn no_baseline() -> Self {
        Self {
            has_baseline: false,
            baseline_timestamp: None,
            baseline_total: None,
            days_elapsed: None,
            buy_and_hold: None,
            rebalance: None,
            fees: None,
            comparison: None,
        }
    }
}

/// 年化收益率（百分数）。
/// days 不足一天时不年化，返回 0；亏穿本金时按 -100 处理。
pub fn annualized_percent(return_percent: f64, days: i64) -> f64 {
    let years = days as f64 / 365.25;
    if years <= 0.0 {
        return 0.0;
    }
    let base = 1.0 + return_percent / 100.0;
    if base <= 0.0 {
        return -100.0;
    }
    (base.powf(1.0 / years) - 1.0) * 100.0
}

fn return_percent(delta: f64, baseline_total: f64) -> f64 {
    if baseline_total > 0.0 {
        delta / baseline_total * 100.0
    } else {
        0.0
    }
}

/// 业绩比较器，只读取存储，不触发任何外部调用
pub struct PerformanceComparator {
    store: Arc<dyn Store>,
}

impl PerformanceComparator {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    /// 比较某组的再平衡策略与买入持有基准。
    ///
    /// `with_fees` 时用该组交易日志中已成交条目的总交易量
    /// 乘以费率得到总手续费，从再平衡收益中扣除。
    pub async fn compare(&self, group_id: &str, with_fees: bool) -> Result<ComparisonReport> {
        let group = self
            .store
            .get_group(group_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("资产组不存在: {}", group_id)))?;

        let snapshot = match group.strategy.as_ref().and_then(|s| s.baseline_snapshot.as_ref()) {
            Some(s) => s.clone(),
            None => return Ok(ComparisonReport::no_baseline()),
        };

        // 当前标记价格（由引擎在每次调仓时刷新）
        let current_prices: HashMap<&str, f64> = group
            .assets
            .iter()
            .filter(|a| a.is_tradable())
            .map(|a| (a.symbol.as_str(), a.price))
            .collect();

        let now = chrono::Utc::now().timestamp_millis();
        let days = ((now - snapshot.timestamp) / MS_PER_DAY).max(0);
        let baseline_total = snapshot.total_value;

        // 买入持有：假设从未调仓，基准数量按当前价估值；
        // 已被删除的符号退回快照价格
        let buy_and_hold_value: f64 = snapshot
            .assets
            .iter()
            .map(|a| {
                let price = current_prices.get(a.symbol.as_str()).copied().unwrap_or(a.price);
                a.quantity * price
            })
            .sum();

        // 再平衡：真实持仓的当前估值
        let rebalance_value = group.total_value();

        let bh_delta = buy_and_hold_value - baseline_total;
        let bh_percent = return_percent(bh_delta, baseline_total);
        let buy_and_hold = StrategyReturn {
            value_now: buy_and_hold_value,
            delta_total: bh_delta,
            return_percent: bh_percent,
            annualized_percent: annualized_percent(bh_percent, days),
        };

        let rb_delta = rebalance_value - baseline_total;
        let rb_percent = return_percent(rb_delta, baseline_total);
        let rebalance = StrategyReturn {
            value_now: rebalance_value,
            delta_total: rb_delta,
            return_percent: rb_percent,
            annualized_percent: annualized_percent(rb_percent, days),
        };

        let fees = if with_fees {
            let fee_config = self.store.fee_config().await?;
            let volume: f64 = self
                .store
                .trade_logs_for_group(group_id, None)
                .await?
                .iter()
                .filter(|e| e.status.is_executed())
                .map(|e| e.value_usdt)
                .sum();
            let total_fees = if fee_config.enabled {
                volume * fee_config.trading_fee_percent / 100.0
            } else {
                0.0
            };
            let net_delta = rb_delta - total_fees;
            let net_percent = return_percent(net_delta, baseline_total);
            Some(FeeSummary {
                fee_percent: fee_config.trading_fee_percent,
                total_trading_volume: volume,
                total_fees,
                net_delta_total: net_delta,
                net_return_percent: net_percent,
                net_annualized_percent: annualized_percent(net_percent, days),
            })
        } else {
            None
        };

        let effective_rb_percent = fees
            .as_ref()
            .map(|f| f.net_return_percent)
            .unwrap_or(rb_percent);
        let outperformance = effective_rb_percent - bh_percent;
        let comparison = if outperformance > 0.0 {
            Verdict {
                outperformance_percent: outperformance,
                better_strategy: "rebalance".to_string(),
                summary: format!("再平衡策略跑赢买入持有 {:.2}%", outperformance),
                recommendation: "再平衡策略表现更优，建议继续启用".to_string(),
            }
        } else {
            Verdict {
                outperformance_percent: outperformance,
                better_strategy: "buyAndHold".to_string(),
                summary: format!("买入持有跑赢再平衡策略 {:.2}%", -outperformance),
                recommendation: "买入持有表现更优，建议评估是否继续再平衡".to_string(),
            }
        };

        Ok(ComparisonReport {
            has_baseline: true,
            baseline_timestamp: Some(snapshot.timestamp),
            baseline_total: Some(baseline_total),
            days_elapsed: Some(days),
            buy_and_hold: Some(buy_and_hold),
            rebalance: Some(rebalance),
            fees,
            comparison: Some(comparison),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_annualized_half_year() {
        // 1000 -> 1100, 182 天: 约 21.3% 年化
        let annualized = annualized_percent(10.0, 182);
        assert_relative_eq!(annualized, 21.3, max_relative = 0.025);
    }

    #[test]
    fn test_annualized_under_one_day_is_zero() {
        assert_eq!(annualized_percent(10.0, 0), 0.0);
    }

    #[test]
    fn test_annualized_total_loss() {
        assert_eq!(annualized_percent(-100.0, 365), -100.0);
    }

    #[test]
    fn test_return_percent_zero_baseline() {
        assert_eq!(return_percent(50.0, 0.0), 0.0);
    }
}
