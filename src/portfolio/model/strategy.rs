use std::collections::HashMap;
use std::fmt::{Display, Formatter};
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// 调仓频率单位
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FrequencyUnit {
    Minute,
    Hour,
    Day,
    Week,
}

impl FrequencyUnit {
    pub fn seconds(&self) -> u64 {
        match self {
            FrequencyUnit::Minute => 60,
            FrequencyUnit::Hour => 3_600,
            FrequencyUnit::Day => 86_400,
            FrequencyUnit::Week => 604_800,
        }
    }
}

/// 调仓频率：unit * value，value 最小为 1
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Frequency {
    pub unit: FrequencyUnit,
    pub value: u32,
}

impl Frequency {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.unit.seconds() * self.value.max(1) as u64)
    }
}

impl Default for Frequency {
    fn default() -> Self {
        Self {
            unit: FrequencyUnit::Hour,
            value: 1,
        }
    }
}

/// 交易方向
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Side {
    Buy,
    Sell,
}

impl Display for Side {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Side::Buy => write!(f, "buy"),
            Side::Sell => write!(f, "sell"),
        }
    }
}

/// 真实下单还是仅模拟调整持仓数量
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TradingMode {
    Real,
    Simulated,
}

impl Display for TradingMode {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            TradingMode::Real => write!(f, "real"),
            TradingMode::Simulated => write!(f, "simulated"),
        }
    }
}

/// 单笔调仓动作的执行结果
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionStatus {
    /// 模拟执行，直接调整记录数量
    Simulated,
    /// 实盘下单成功
    Success,
    /// 实盘下单被拒绝
    Failed,
    /// 实盘下单过程异常（网络、超时等）
    Error,
}

impl ExecutionStatus {
    /// 该状态是否代表数量已被调整（成交）
    pub fn is_executed(&self) -> bool {
        matches!(self, ExecutionStatus::Simulated | ExecutionStatus::Success)
    }
}

/// 启用策略那一刻的持仓快照，作为调仓目标与业绩比较的基准。
/// 创建后不可变，仅在重新启用策略时被整体替换。
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BaselineSnapshot {
    pub timestamp: i64,
    pub total_value: f64,
    pub assets: Vec<SnapshotAsset>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SnapshotAsset {
    pub symbol: String,
    pub quantity: f64,
    pub price: f64,
}

/// 单个资产当前权重与基准权重的偏离，每次调仓运行时重新计算
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Deviation {
    pub symbol: String,
    pub current_value: f64,
    pub target_value: f64,
    /// 正值表示应买入
    pub deviation_amount: f64,
    pub deviation_percent: f64,
}

/// 一笔调仓动作
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TradeAction {
    pub symbol: String,
    pub side: Side,
    pub quantity: f64,
    pub value_usdt: f64,
    pub status: ExecutionStatus,
    #[serde(default)]
    pub detail: Option<String>,
}

/// 最近一次完成的调仓运行结果，每组一份，运行完成时整体覆盖
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LastResult {
    pub timestamp: i64,
    pub total_before: f64,
    pub actions: Vec<TradeAction>,
    pub deviations: Vec<Deviation>,
    pub trading_mode: TradingMode,
}

/// 每个资产组的调仓策略配置
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Strategy {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub frequency: Frequency,
    #[serde(default = "default_min_trade")]
    pub min_trade_usdt: f64,
    #[serde(default = "default_max_trade")]
    pub max_trade_usdt: f64,
    /// symbol -> 目标权重，启用时按当时市值占比捕获；
    /// 空表表示"无基准"（零市值组合启用时的合法状态）
    #[serde(default)]
    pub baseline_weights: HashMap<String, f64>,
    #[serde(default)]
    pub baseline_snapshot: Option<BaselineSnapshot>,
    #[serde(default)]
    pub last_result: Option<LastResult>,
}

fn default_min_trade() -> f64 {
    100.0
}

fn default_max_trade() -> f64 {
    1_000.0
}

impl Default for Strategy {
    fn default() -> Self {
        Self {
            enabled: false,
            frequency: Frequency::default(),
            min_trade_usdt: default_min_trade(),
            max_trade_usdt: default_max_trade(),
            baseline_weights: HashMap::new(),
            baseline_snapshot: None,
            last_result: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frequency_interval() {
        let f = Frequency {
            unit: FrequencyUnit::Minute,
            value: 5,
        };
        assert_eq!(f.interval(), Duration::from_secs(300));

        let f = Frequency {
            unit: FrequencyUnit::Week,
            value: 1,
        };
        assert_eq!(f.interval(), Duration::from_secs(604_800));

        // value=0 按最小值 1 处理
        let f = Frequency {
            unit: FrequencyUnit::Hour,
            value: 0,
        };
        assert_eq!(f.interval(), Duration::from_secs(3_600));
    }

    #[test]
    fn test_strategy_defaults() {
        let s = Strategy::default();
        assert!(!s.enabled);
        assert_eq!(s.min_trade_usdt, 100.0);
        assert_eq!(s.max_trade_usdt, 1_000.0);
        assert!(s.baseline_weights.is_empty());
        assert_eq!(s.frequency, Frequency::default());
    }

    #[test]
    fn test_side_serde() {
        assert_eq!(serde_json::to_string(&Side::Buy).unwrap(), "\"BUY\"");
        assert_eq!(serde_json::to_string(&Side::Sell).unwrap(), "\"SELL\"");
    }
}
