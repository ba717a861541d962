use clap::{Parser, Subcommand};
use dotenv::dotenv;
use tracing::error;

use rust_rebalance::app::bootstrap;
use rust_rebalance::config::log::setup_logging;
use rust_rebalance::portfolio::model::{FeeConfig, FrequencyUnit};
use rust_rebalance::rebalance::StrategyUpdate;

#[derive(Parser)]
#[command(name = "rust_rebalance", about = "定时组合再平衡引擎")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// 启动守护进程：恢复启用中的策略定时器并常驻运行
    Run,
    /// 启用某组的调仓策略（捕获基准并立即调仓一次）
    Enable { group_id: String },
    /// 停用某组的调仓策略
    Disable { group_id: String },
    /// 手动执行一次调仓并打印结果
    RunOnce { group_id: String },
    /// 更新策略配置（未指定的字段保持原值）
    Configure {
        group_id: String,
        /// 频率单位: minute/hour/day/week
        #[arg(long)]
        unit: Option<String>,
        #[arg(long)]
        value: Option<u32>,
        #[arg(long)]
        min_trade: Option<f64>,
        #[arg(long)]
        max_trade: Option<f64>,
    },
    /// 查看策略配置
    Strategy { group_id: String },
    /// 查看最近一次调仓结果
    LastResult { group_id: String },
    /// 业绩比较：再平衡 vs 买入持有
    Compare {
        group_id: String,
        /// 扣除手续费后的净收益比较
        #[arg(long)]
        with_fees: bool,
    },
    /// 查看或更新手续费配置
    FeeConfig {
        #[arg(long)]
        percent: Option<f64>,
        #[arg(long)]
        enabled: Option<bool>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();
    let _log_guards = setup_logging()?;

    let cli = Cli::parse();
    let ctx = bootstrap::build_context().await?;

    match cli.command {
        Command::Run => {
            if let Err(e) = bootstrap::run(ctx).await {
                error!("守护进程异常退出: {}", e);
                return Err(e);
            }
        }
        Command::Enable { group_id } => {
            let strategy = ctx.service.enable(&group_id).await?;
            println!("{}", serde_json::to_string_pretty(&strategy)?);
        }
        Command::Disable { group_id } => {
            let strategy = ctx.service.disable(&group_id).await?;
            println!("{}", serde_json::to_string_pretty(&strategy)?);
        }
        Command::RunOnce { group_id } => {
            let outcome = ctx.service.run_once(&group_id).await?;
            println!("{}", serde_json::to_string_pretty(&outcome)?);
        }
        Command::Configure {
            group_id,
            unit,
            value,
            min_trade,
            max_trade,
        } => {
            let unit = match unit.as_deref() {
                Some("minute") => Some(FrequencyUnit::Minute),
                Some("hour") => Some(FrequencyUnit::Hour),
                Some("day") => Some(FrequencyUnit::Day),
                Some("week") => Some(FrequencyUnit::Week),
                Some(other) => anyhow::bail!("无效的频率单位: {}", other),
                None => None,
            };
            let update = StrategyUpdate {
                unit,
                value,
                min_trade_usdt: min_trade,
                max_trade_usdt: max_trade,
            };
            let strategy = ctx.service.update_strategy(&group_id, update).await?;
            println!("{}", serde_json::to_string_pretty(&strategy)?);
        }
        Command::Strategy { group_id } => {
            let strategy = ctx.service.strategy(&group_id).await?;
            println!("{}", serde_json::to_string_pretty(&strategy)?);
        }
        Command::LastResult { group_id } => {
            let result = ctx.service.last_result(&group_id).await?;
            println!("{}", serde_json::to_string_pretty(&result)?);
        }
        Command::Compare {
            group_id,
            with_fees,
        } => {
            let report = ctx.service.comparison(&group_id, with_fees).await?;
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        Command::FeeConfig { percent, enabled } => {
            let current = ctx.service.fee_config().await?;
            let updated = FeeConfig {
                trading_fee_percent: percent.unwrap_or(current.trading_fee_percent),
                enabled: enabled.unwrap_or(current.enabled),
            };
            let saved = if percent.is_some() || enabled.is_some() {
                ctx.service.update_fee_config(updated).await?
            } else {
                current
            };
            println!("{}", serde_json::to_string_pretty(&saved)?);
        }
    }
    Ok(())
}
