use serde::{Deserialize, Serialize};

use crate::portfolio::model::strategy::Strategy;

/// 单个持仓资产
///
/// `symbol` 为空字符串时表示该资产不可交易（不刷新价格、不参与调仓），
/// `price` 仅为最近一次刷新的标记价格，两次刷新之间不保证准确。
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Asset {
    pub id: String,
    pub symbol: String,
    pub name: String,
    pub quantity: f64,
    pub price: f64,
    #[serde(default)]
    pub created_at: i64,
    #[serde(default)]
    pub updated_at: Option<i64>,
}

impl Asset {
    pub fn new(symbol: &str, name: &str, quantity: f64, price: f64) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            symbol: symbol.to_string(),
            name: name.to_string(),
            quantity,
            price,
            created_at: chrono::Utc::now().timestamp_millis(),
            updated_at: None,
        }
    }

    /// 当前市值
    pub fn market_value(&self) -> f64 {
        self.price * self.quantity
    }

    /// 是否可交易（有交易对符号）
    pub fn is_tradable(&self) -> bool {
        !self.symbol.is_empty()
    }
}

/// 资产组：一组共享同一个调仓策略的持仓
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Group {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub assets: Vec<Asset>,
    #[serde(default)]
    pub strategy: Option<Strategy>,
}

impl Group {
    pub fn new(name: &str) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            name: name.to_string(),
            assets: Vec::new(),
            strategy: None,
        }
    }

    /// 可交易资产的总市值
    pub fn total_value(&self) -> f64 {
        self.assets
            .iter()
            .filter(|a| a.is_tradable())
            .map(|a| a.market_value())
            .sum()
    }
}
