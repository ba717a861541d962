use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use serde::Deserialize;
use tokio::sync::Mutex;
use tracing::warn;

use crate::error::app_error::AppError;
use crate::exchange::bitget_client::{BitgetClient, BitgetResponse};
use crate::portfolio::model::Asset;

/// 单次价格查询的超时上限，避免单个无响应的交易所拖死整次调仓
pub const ORACLE_TIMEOUT: Duration = Duration::from_secs(10);

/// 相邻两次价格查询之间的间隔，用于限制对外请求频率
pub const PRICE_CALL_DELAY: Duration = Duration::from_millis(120);

/// 价格源：按交易对符号查询最新成交价
#[async_trait]
pub trait PriceOracle: Send + Sync {
    async fn last_price(&self, symbol: &str) -> Result<f64>;
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TickerData {
    last_pr: String,
}

/// 基于 Bitget 合约行情接口的价格源
pub struct BitgetPriceOracle {
    client: Arc<BitgetClient>,
}

impl BitgetPriceOracle {
    pub fn new(client: Arc<BitgetClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl PriceOracle for BitgetPriceOracle {
    async fn last_price(&self, symbol: &str) -> Result<f64> {
        let path = format!(
            "/api/v2/mix/market/ticker?productType={}&symbol={}",
            self.client.product_type(),
            symbol
        );
        let resp: BitgetResponse<Vec<TickerData>> = self.client.get_public(&path).await?;
        if !resp.is_ok() {
            return Err(AppError::BitgetApiError(format!(
                "获取 {} 价格失败: {}",
                symbol,
                resp.msg.unwrap_or_default()
            ))
            .into());
        }
        let ticker = resp
            .data
            .and_then(|mut d| if d.is_empty() { None } else { Some(d.remove(0)) })
            .ok_or_else(|| anyhow!("获取 {} 价格失败: 响应为空", symbol))?;
        let price: f64 = ticker
            .last_pr
            .parse()
            .map_err(|e| anyhow!("解析 {} 价格失败: {}", symbol, e))?;
        Ok(price)
    }
}

/// 刷新一组资产的标记价格。
///
/// 单个资产查询失败只告警并保留旧价格，绝不中断整次刷新；
/// 相邻查询之间按 [`PRICE_CALL_DELAY`] 限速。
pub async fn refresh_asset_prices(oracle: &dyn PriceOracle, assets: &mut [Asset]) {
    let mut first = true;
    for asset in assets.iter_mut().filter(|a| a.is_tradable()) {
        if !first {
            tokio::time::sleep(PRICE_CALL_DELAY).await;
        }
        first = false;

        match tokio::time::timeout(ORACLE_TIMEOUT, oracle.last_price(&asset.symbol)).await {
            Ok(Ok(price)) if price > 0.0 => {
                asset.price = price;
                asset.updated_at = Some(chrono::Utc::now().timestamp_millis());
            }
            Ok(Ok(price)) => {
                warn!("{} 返回非法价格 {}, 保留旧价格 {}", asset.symbol, price, asset.price);
            }
            Ok(Err(e)) => {
                warn!("获取 {} 价格失败: {}, 保留旧价格 {}", asset.symbol, e, asset.price);
            }
            Err(_) => {
                warn!(
                    "获取 {} 价格超时 ({}s), 保留旧价格 {}",
                    asset.symbol,
                    ORACLE_TIMEOUT.as_secs(),
                    asset.price
                );
            }
        }
    }
}

/// 测试用价格源：固定价格表，可配置单符号失败与响应延迟
pub struct FixedPriceOracle {
    prices: Mutex<HashMap<String, f64>>,
    failing: Mutex<Vec<String>>,
    delay: Option<Duration>,
}

impl FixedPriceOracle {
    pub fn new(prices: &[(&str, f64)]) -> Self {
        Self {
            prices: Mutex::new(
                prices
                    .iter()
                    .map(|(s, p)| (s.to_string(), *p))
                    .collect(),
            ),
            failing: Mutex::new(Vec::new()),
            delay: None,
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// 让指定符号的查询返回错误
    pub async fn fail_symbol(&self, symbol: &str) {
        self.failing.lock().await.push(symbol.to_string());
    }

    pub async fn set_price(&self, symbol: &str, price: f64) {
        self.prices.lock().await.insert(symbol.to_string(), price);
    }
}

#[async_trait]
impl PriceOracle for FixedPriceOracle {
    async fn last_price(&self, symbol: &str) -> Result<f64> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if self.failing.lock().await.iter().any(|s| s == symbol) {
            return Err(anyhow!("模拟价格查询失败: {}", symbol));
        }
        self.prices
            .lock()
            .await
            .get(symbol)
            .copied()
            .ok_or_else(|| anyhow!("无此符号价格: {}", symbol))
    }
}
