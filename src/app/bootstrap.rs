//! 应用装配与入口编排：构建各组件、恢复定时器、心跳与优雅关闭。

use std::sync::Arc;

use anyhow::Result;
use tracing::info;

use crate::app_config::env::env_or_default;
use crate::exchange::order_executor::DisabledExecutor;
use crate::exchange::{
    select_trading_mode, BitgetClient, BitgetOrderExecutor, BitgetPriceOracle, OrderExecutor,
    PriceOracle,
};
use crate::portfolio::store::{GroupLocks, JsonFileStore, Store};
use crate::rebalance::{
    PerformanceComparator, RebalanceEngine, RebalanceScheduler, StrategyService, StrategyState,
};

/// 装配完成的应用上下文
pub struct AppContext {
    pub store: Arc<dyn Store>,
    pub scheduler: Arc<RebalanceScheduler>,
    pub service: Arc<StrategyService>,
}

/// 打开默认数据目录下的 JSON 文件存储并装配上下文
pub async fn build_context() -> Result<AppContext> {
    let data_dir = env_or_default("DATA_DIR", "data");
    let store: Arc<dyn Store> = Arc::new(JsonFileStore::open(&data_dir).await?);
    Ok(build_context_with_store(store))
}

/// 用任意存储实现装配上下文（测试注入内存存储）
pub fn build_context_with_store(store: Arc<dyn Store>) -> AppContext {
    // 交易模式启动时一次性确定：有凭据且非沙盒才实盘
    let (oracle, executor, trading_mode) = match BitgetClient::from_env() {
        Some(client) => {
            let client = Arc::new(client);
            let mode = select_trading_mode(true, client.is_sandbox());
            let oracle: Arc<dyn PriceOracle> = Arc::new(BitgetPriceOracle::new(client.clone()));
            let executor: Arc<dyn OrderExecutor> = Arc::new(BitgetOrderExecutor::new(client));
            (oracle, executor, mode)
        }
        None => {
            // 无凭据时行情仍可走公共接口，下单被禁用，只能模拟
            let client = Arc::new(BitgetClient::public());
            let mode = select_trading_mode(false, client.is_sandbox());
            let oracle: Arc<dyn PriceOracle> = Arc::new(BitgetPriceOracle::new(client));
            let executor: Arc<dyn OrderExecutor> = Arc::new(DisabledExecutor);
            (oracle, executor, mode)
        }
    };
    info!("交易模式: {}", trading_mode);

    let locks = Arc::new(GroupLocks::new());
    let engine = Arc::new(RebalanceEngine::new(
        store.clone(),
        oracle.clone(),
        executor,
        trading_mode,
        locks.clone(),
    ));
    let scheduler = Arc::new(RebalanceScheduler::new(engine.clone(), store.clone()));
    let state = StrategyState::new(store.clone(), oracle, scheduler.clone(), locks);
    let comparator = PerformanceComparator::new(store.clone());
    let service = Arc::new(StrategyService::new(store.clone(), state, engine, comparator));

    AppContext {
        store,
        scheduler,
        service,
    }
}

/// 守护进程模式：恢复启用中的策略定时器，等待退出信号后优雅关闭
pub async fn run(ctx: AppContext) -> Result<()> {
    // 重启不能悄悄停掉在跑的策略
    let resumed = ctx.scheduler.resume_enabled_groups().await?;
    info!("调仓守护进程已启动，恢复 {} 个定时器", resumed);

    // 心跳任务，定期输出运行状态
    let scheduler = ctx.scheduler.clone();
    let heartbeat = tokio::spawn(async move {
        let mut interval = tokio::time::interval(tokio::time::Duration::from_secs(30));
        loop {
            interval.tick().await;
            info!("💓 调仓服务运行中，活跃定时器: {}", scheduler.active_timer_count().await);
        }
    });

    let signal_name = setup_shutdown_signals().await;
    info!("接收到 {} 信号，开始优雅关闭...", signal_name);

    heartbeat.abort();
    ctx.scheduler.shutdown().await;
    info!("应用已优雅退出");
    Ok(())
}

/// 等待多种退出信号中的任意一个
async fn setup_shutdown_signals() -> &'static str {
    use tokio::signal;

    #[cfg(unix)]
    {
        let mut sigterm = signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to register SIGTERM handler");
        let mut sigint = signal::unix::signal(signal::unix::SignalKind::interrupt())
            .expect("Failed to register SIGINT handler");

        tokio::select! {
            _ = sigterm.recv() => "SIGTERM",
            _ = sigint.recv() => "SIGINT",
        }
    }

    #[cfg(not(unix))]
    {
        signal::ctrl_c().await.expect("Failed to listen for ctrl-c");
        "CTRL+C"
    }
}
