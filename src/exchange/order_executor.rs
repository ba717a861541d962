use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use reqwest::Method;
use serde::Deserialize;
use serde_json::json;
use tokio::sync::Mutex;
use tracing::info;

use crate::exchange::bitget_client::BitgetClient;
use crate::portfolio::model::Side;

/// 单次下单的超时上限
pub const EXECUTOR_TIMEOUT: Duration = Duration::from_secs(10);

/// 下单结果的结构化契约。
/// 成功与否由类型化字段表达，而不是在响应文本里找成功标记。
#[derive(Debug, Clone)]
pub struct OrderOutcome {
    pub accepted: bool,
    pub filled: bool,
    pub error_code: Option<String>,
    pub error_message: Option<String>,
}

impl OrderOutcome {
    pub fn filled() -> Self {
        Self {
            accepted: true,
            filled: true,
            error_code: None,
            error_message: None,
        }
    }

    pub fn rejected(code: &str, message: &str) -> Self {
        Self {
            accepted: false,
            filled: false,
            error_code: Some(code.to_string()),
            error_message: Some(message.to_string()),
        }
    }

    pub fn is_success(&self) -> bool {
        self.accepted && self.filled
    }
}

/// 订单执行器：向交易所提交市价单
#[async_trait]
pub trait OrderExecutor: Send + Sync {
    async fn place_market_order(&self, symbol: &str, side: Side, size: f64) -> Result<OrderOutcome>;
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PlaceOrderResponse {
    code: String,
    msg: Option<String>,
}

/// 通过 Bitget 合约下市价单
pub struct BitgetOrderExecutor {
    client: Arc<BitgetClient>,
}

impl BitgetOrderExecutor {
    pub fn new(client: Arc<BitgetClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl OrderExecutor for BitgetOrderExecutor {
    async fn place_market_order(&self, symbol: &str, side: Side, size: f64) -> Result<OrderOutcome> {
        let body = json!({
            "symbol": symbol,
            "productType": self.client.product_type(),
            "marginMode": "crossed",
            "marginCoin": "USDT",
            "size": size.to_string(),
            "side": side.to_string(),
            "tradeSide": "open",
            "orderType": "market",
            "clientOid": format!("rebalance_{}", chrono::Utc::now().timestamp_millis()),
        })
        .to_string();

        let resp: PlaceOrderResponse = self
            .client
            .send_request(Method::POST, "/api/v2/mix/order/place-order", &body)
            .await?;

        if resp.code == "00000" {
            info!("市价单已提交: {} {} {}", side, size, symbol);
            Ok(OrderOutcome::filled())
        } else {
            Ok(OrderOutcome::rejected(
                &resp.code,
                resp.msg.as_deref().unwrap_or("下单被拒绝"),
            ))
        }
    }
}

/// 未配置交易凭据时的执行器：任何下单直接报错。
/// 模拟模式下引擎不会走到这里。
pub struct DisabledExecutor;

#[async_trait]
impl OrderExecutor for DisabledExecutor {
    async fn place_market_order(&self, symbol: &str, _side: Side, _size: f64) -> Result<OrderOutcome> {
        Err(anyhow!("未配置交易凭据，无法下单: {}", symbol))
    }
}

/// 测试用执行器：按脚本返回结果并记录收到的订单
#[derive(Default)]
pub struct ScriptedExecutor {
    outcomes: Mutex<Vec<OrderOutcome>>,
    pub received: Mutex<Vec<(String, Side, f64)>>,
    error_on_call: Mutex<bool>,
}

impl ScriptedExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    /// 预置下一批下单结果，按先进先出消费；耗尽后默认全部成交
    pub async fn push_outcome(&self, outcome: OrderOutcome) {
        self.outcomes.lock().await.push(outcome);
    }

    /// 让后续下单直接返回错误（模拟网络异常）
    pub async fn set_error(&self, on: bool) {
        *self.error_on_call.lock().await = on;
    }
}

#[async_trait]
impl OrderExecutor for ScriptedExecutor {
    async fn place_market_order(&self, symbol: &str, side: Side, size: f64) -> Result<OrderOutcome> {
        self.received
            .lock()
            .await
            .push((symbol.to_string(), side, size));
        if *self.error_on_call.lock().await {
            return Err(anyhow!("模拟下单异常: {}", symbol));
        }
        let mut outcomes = self.outcomes.lock().await;
        if outcomes.is_empty() {
            Ok(OrderOutcome::filled())
        } else {
            Ok(outcomes.remove(0))
        }
    }
}
