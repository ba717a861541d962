use std::collections::HashMap;
use std::env;

use anyhow::{anyhow, Result};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use hmac::{Hmac, Mac};
use once_cell::sync::Lazy;
use reqwest::{Client, Method, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use sha2::Sha256;
use tracing::{debug, info};

use crate::error::app_error::AppError;

const BASE_URL: &str = "https://api.bitget.com";

/// 常用币种到 USDT 合约交易对的映射
static SUPPORTED_SYMBOLS: Lazy<HashMap<&'static str, &'static str>> = Lazy::new(|| {
    HashMap::from([
        ("BTC", "BTCUSDT"),
        ("ETH", "ETHUSDT"),
        ("BNB", "BNBUSDT"),
        ("ADA", "ADAUSDT"),
        ("SOL", "SOLUSDT"),
        ("DOGE", "DOGEUSDT"),
        ("XRP", "XRPUSDT"),
        ("LTC", "LTCUSDT"),
        ("DOT", "DOTUSDT"),
        ("MATIC", "MATICUSDT"),
        ("LINK", "LINKUSDT"),
    ])
});

/// 把币种名归一化为交易对符号：BTC -> BTCUSDT，BTCUSDT 原样返回
pub fn normalize_symbol(coin: &str) -> Result<String> {
    let upper = coin.to_uppercase();
    if let Some(symbol) = SUPPORTED_SYMBOLS.get(upper.as_str()) {
        return Ok(symbol.to_string());
    }
    if upper.ends_with("USDT") {
        return Ok(upper);
    }
    Err(AppError::BizError(format!("不支持的币种: {}", coin)).into())
}

/// Bitget 通用响应包装，code 为 "00000" 表示成功
#[derive(Debug, Deserialize)]
pub struct BitgetResponse<T> {
    pub code: String,
    pub msg: Option<String>,
    pub data: Option<T>,
}

impl<T> BitgetResponse<T> {
    pub fn is_ok(&self) -> bool {
        self.code == "00000"
    }
}

/// Bitget REST 客户端，负责请求签名与收发
pub struct BitgetClient {
    client: Client,
    api_key: String,
    secret_key: String,
    passphrase: String,
    sandbox: bool,
}

impl BitgetClient {
    pub fn new(api_key: String, secret_key: String, passphrase: String, sandbox: bool) -> Self {
        Self {
            client: Client::new(),
            api_key,
            secret_key,
            passphrase,
            sandbox,
        }
    }

    /// 无凭据客户端：只能访问公共行情接口，沙盒开关仍从环境读取
    pub fn public() -> Self {
        let sandbox = crate::app_config::env::env_is_true("BITGET_SANDBOX", true);
        Self::new(String::new(), String::new(), String::new(), sandbox)
    }

    /// 从环境变量构建客户端；缺少密钥时返回 None（只能模拟交易）
    pub fn from_env() -> Option<Self> {
        let api_key = env::var("BITGET_API_KEY").ok()?;
        let secret_key = env::var("BITGET_SECRET_KEY").ok()?;
        let passphrase = env::var("BITGET_PASSPHRASE").ok()?;
        if api_key.is_empty() || secret_key.is_empty() || passphrase.is_empty() {
            return None;
        }
        let sandbox = crate::app_config::env::env_is_true("BITGET_SANDBOX", true);
        Some(Self::new(api_key, secret_key, passphrase, sandbox))
    }

    pub fn is_sandbox(&self) -> bool {
        self.sandbox
    }

    /// 合约产品类型，沙盒环境用模拟盘产品
    pub fn product_type(&self) -> &'static str {
        if self.sandbox {
            "SUSDT-FUTURES"
        } else {
            "USDT-FUTURES"
        }
    }

    /// 签名串为 timestamp + METHOD + path + body 的 HMAC-SHA256，base64 编码
    fn generate_signature(&self, timestamp: &str, method: &Method, path: &str, body: &str) -> Result<String> {
        let payload = format!("{}{}{}{}", timestamp, method.as_str(), path, body);
        let mut mac = Hmac::<Sha256>::new_from_slice(self.secret_key.as_bytes())
            .map_err(|e| anyhow!("HMAC 初始化失败: {}", e))?;
        mac.update(payload.as_bytes());
        Ok(BASE64.encode(mac.finalize().into_bytes()))
    }

    /// 发送签名请求（私有接口）
    pub async fn send_request<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        body: &str,
    ) -> Result<T> {
        let timestamp = chrono::Utc::now().timestamp_millis().to_string();
        let signature = self.generate_signature(&timestamp, &method, path, body)?;

        let url = format!("{}{}", BASE_URL, path);
        let response = self
            .client
            .request(method, &url)
            .header("ACCESS-KEY", &self.api_key)
            .header("ACCESS-SIGN", signature)
            .header("ACCESS-TIMESTAMP", timestamp)
            .header("ACCESS-PASSPHRASE", &self.passphrase)
            .header("Content-Type", "application/json")
            .header("locale", "zh-CN")
            .body(body.to_string())
            .send()
            .await?;

        let status_code = response.status();
        let response_body = response.text().await?;
        info!("path:{}, bitget_response: {}", path, response_body);

        if status_code == StatusCode::OK {
            let result: T = serde_json::from_str(&response_body)?;
            Ok(result)
        } else {
            Err(AppError::BitgetApiError(format!(
                "HTTP {}: {}",
                status_code, response_body
            ))
            .into())
        }
    }

    /// 公共接口 GET，不需要签名
    pub async fn get_public<T: DeserializeOwned>(&self, path_and_query: &str) -> Result<T> {
        let url = format!("{}{}", BASE_URL, path_and_query);
        debug!("bitget GET {}", path_and_query);
        let response = self.client.get(&url).send().await?;
        let status_code = response.status();
        let response_body = response.text().await?;

        if status_code == StatusCode::OK {
            let result: T = serde_json::from_str(&response_body)?;
            Ok(result)
        } else {
            Err(AppError::BitgetApiError(format!(
                "HTTP {}: {}",
                status_code, response_body
            ))
            .into())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_symbol() {
        assert_eq!(normalize_symbol("btc").unwrap(), "BTCUSDT");
        assert_eq!(normalize_symbol("ETHUSDT").unwrap(), "ETHUSDT");
        assert!(normalize_symbol("NOPE").is_err());
    }

    #[test]
    fn test_product_type_by_sandbox() {
        let client = BitgetClient::new("k".into(), "s".into(), "p".into(), true);
        assert_eq!(client.product_type(), "SUSDT-FUTURES");
        let client = BitgetClient::new("k".into(), "s".into(), "p".into(), false);
        assert_eq!(client.product_type(), "USDT-FUTURES");
    }
}
