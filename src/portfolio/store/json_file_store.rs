use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::debug;

use crate::portfolio::model::{FeeConfig, Group, TradeLogEntry};
use crate::portfolio::store::Store;

const PORTFOLIO_FILE: &str = "portfolio.json";
const TRADE_LOG_FILE: &str = "trade_log.json";

/// `portfolio.json` 的顶层结构
#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PortfolioFile {
    #[serde(default)]
    groups: Vec<Group>,
    #[serde(default)]
    fee_config: FeeConfig,
}

/// JSON 文件存储：资产组与手续费配置写入 `portfolio.json`，
/// 交易日志追加到 `trade_log.json`。
///
/// 启动时整体加载进内存，之后写穿（write-through）落盘；
/// 内部互斥锁保证单次读/写原子，跨操作的序列化由上层 `GroupLocks` 承担。
pub struct JsonFileStore {
    portfolio_path: PathBuf,
    trade_log_path: PathBuf,
    state: Mutex<PortfolioFile>,
    trade_log: Mutex<Vec<TradeLogEntry>>,
}

impl JsonFileStore {
    /// 打开（必要时创建）数据目录下的存储文件
    pub async fn open(data_dir: impl AsRef<Path>) -> Result<Self> {
        let data_dir = data_dir.as_ref();
        tokio::fs::create_dir_all(data_dir)
            .await
            .with_context(|| format!("创建数据目录失败: {}", data_dir.display()))?;

        let portfolio_path = data_dir.join(PORTFOLIO_FILE);
        let trade_log_path = data_dir.join(TRADE_LOG_FILE);

        let state: PortfolioFile = load_json_or_default(&portfolio_path).await?;
        let trade_log: Vec<TradeLogEntry> = load_json_or_default(&trade_log_path).await?;

        debug!(
            "存储已加载: {} 个资产组, {} 条交易日志",
            state.groups.len(),
            trade_log.len()
        );

        Ok(Self {
            portfolio_path,
            trade_log_path,
            state: Mutex::new(state),
            trade_log: Mutex::new(trade_log),
        })
    }

    async fn flush_portfolio(&self, state: &PortfolioFile) -> Result<()> {
        let json = serde_json::to_string_pretty(state)?;
        tokio::fs::write(&self.portfolio_path, json)
            .await
            .with_context(|| format!("写入 {} 失败", self.portfolio_path.display()))
    }

    async fn flush_trade_log(&self, log: &[TradeLogEntry]) -> Result<()> {
        let json = serde_json::to_string_pretty(log)?;
        tokio::fs::write(&self.trade_log_path, json)
            .await
            .with_context(|| format!("写入 {} 失败", self.trade_log_path.display()))
    }
}

async fn load_json_or_default<T: serde::de::DeserializeOwned + Default>(
    path: &Path,
) -> Result<T> {
    match tokio::fs::read_to_string(path).await {
        Ok(content) => {
            serde_json::from_str(&content).with_context(|| format!("解析 {} 失败", path.display()))
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(T::default()),
        Err(e) => Err(e).with_context(|| format!("读取 {} 失败", path.display())),
    }
}

#[async_trait]
impl Store for JsonFileStore {
    async fn list_groups(&self) -> Result<Vec<Group>> {
        Ok(self.state.lock().await.groups.clone())
    }

    async fn get_group(&self, group_id: &str) -> Result<Option<Group>> {
        let state = self.state.lock().await;
        Ok(state.groups.iter().find(|g| g.id == group_id).cloned())
    }

    async fn save_group(&self, group: &Group) -> Result<()> {
        let mut state = self.state.lock().await;
        match state.groups.iter_mut().find(|g| g.id == group.id) {
            Some(existing) => *existing = group.clone(),
            None => state.groups.push(group.clone()),
        }
        self.flush_portfolio(&state).await
    }

    async fn append_trade_logs(&self, entries: &[TradeLogEntry]) -> Result<()> {
        if entries.is_empty() {
            return Ok(());
        }
        let mut log = self.trade_log.lock().await;
        log.extend_from_slice(entries);
        self.flush_trade_log(&log).await
    }

    async fn trade_logs_for_group(
        &self,
        group_id: &str,
        limit: Option<usize>,
    ) -> Result<Vec<TradeLogEntry>> {
        let log = self.trade_log.lock().await;
        let mut entries: Vec<TradeLogEntry> = log
            .iter()
            .filter(|e| e.group_id == group_id)
            .cloned()
            .collect();
        entries.sort_by_key(|e| std::cmp::Reverse(e.timestamp));
        if let Some(limit) = limit {
            entries.truncate(limit);
        }
        Ok(entries)
    }

    async fn fee_config(&self) -> Result<FeeConfig> {
        Ok(self.state.lock().await.fee_config)
    }

    async fn save_fee_config(&self, config: &FeeConfig) -> Result<()> {
        let mut state = self.state.lock().await;
        state.fee_config = *config;
        self.flush_portfolio(&state).await
    }
}
