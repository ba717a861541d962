use serde::{Deserialize, Serialize};

use crate::portfolio::model::strategy::{ExecutionStatus, Side, TradeAction};

/// 交易日志条目：每笔已执行/已模拟的调仓动作追加一条，只增不改
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TradeLogEntry {
    pub timestamp: i64,
    pub group_id: String,
    pub symbol: String,
    pub side: Side,
    pub quantity: f64,
    pub value_usdt: f64,
    pub status: ExecutionStatus,
    #[serde(default)]
    pub note: Option<String>,
}

impl TradeLogEntry {
    pub fn from_action(group_id: &str, action: &TradeAction, timestamp: i64) -> Self {
        Self {
            timestamp,
            group_id: group_id.to_string(),
            symbol: action.symbol.clone(),
            side: action.side,
            quantity: action.quantity,
            value_usdt: action.value_usdt,
            status: action.status,
            note: action.detail.clone(),
        }
    }
}
