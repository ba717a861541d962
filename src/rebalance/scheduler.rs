//! 每个启用策略的资产组一个循环定时任务，到点触发一次调仓。

use std::collections::HashMap;
use std::sync::Arc;

use anyhow::Result;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant};
use tracing::{error, info, warn};

use crate::rebalance::engine::{RebalanceEngine, RunOutcome};
use crate::portfolio::store::Store;

/// 调仓调度器：维护 group_id -> 定时任务句柄 的映射。
/// 对同一组 id 的 start/stop 原子生效，任一时刻每组至多一个定时器。
pub struct RebalanceScheduler {
    timers: tokio::sync::Mutex<HashMap<String, JoinHandle<()>>>,
    engine: Arc<RebalanceEngine>,
    store: Arc<dyn Store>,
}

impl RebalanceScheduler {
    pub fn new(engine: Arc<RebalanceEngine>, store: Arc<dyn Store>) -> Self {
        Self {
            timers: tokio::sync::Mutex::new(HashMap::new()),
            engine,
            store,
        }
    }

    /// 为一个组安装定时器。
    ///
    /// 策略未启用时无操作；已有定时器先取消再装新的（频率变更即重启）。
    /// 首次触发在一个完整周期之后——启用时的立即执行由
    /// [`trigger_now`](Self::trigger_now) 单独负责。
    pub async fn start(&self, group_id: &str) -> Result<()> {
        let group = match self.store.get_group(group_id).await? {
            Some(g) => g,
            None => {
                warn!("调度器启动失败: 组 {} 不存在", group_id);
                return Ok(());
            }
        };
        let frequency = match &group.strategy {
            Some(s) if s.enabled => s.frequency,
            _ => return Ok(()),
        };
        let period = frequency.interval();

        let engine = self.engine.clone();
        let id = group_id.to_string();
        let handle = tokio::spawn(async move {
            let mut ticker = interval_at(Instant::now() + period, period);
            loop {
                ticker.tick().await;
                // 触发后不等待执行完成，慢调仓不拖累定时节奏；
                // 重叠触发由引擎的单飞许可拦截
                let engine = engine.clone();
                let id = id.clone();
                tokio::spawn(async move {
                    run_and_log(&engine, &id).await;
                });
            }
        });

        let mut timers = self.timers.lock().await;
        if let Some(old) = timers.insert(group_id.to_string(), handle) {
            old.abort();
        }
        info!("组 {} 定时器已安装: 每 {:?} 一次", group_id, period);
        Ok(())
    }

    /// 取消并移除一个组的定时器，幂等
    pub async fn stop(&self, group_id: &str) {
        let mut timers = self.timers.lock().await;
        if let Some(handle) = timers.remove(group_id) {
            handle.abort();
            info!("组 {} 定时器已停止", group_id);
        }
    }

    /// 立即异步触发一次调仓，不阻塞调用方
    pub fn trigger_now(&self, group_id: &str) {
        let engine = self.engine.clone();
        let id = group_id.to_string();
        tokio::spawn(async move {
            run_and_log(&engine, &id).await;
        });
    }

    /// 进程启动时重扫所有组，为启用中的策略恢复定时器，
    /// 保证重启不会悄悄停掉在跑的策略
    pub async fn resume_enabled_groups(&self) -> Result<usize> {
        let groups = self.store.list_groups().await?;
        let mut resumed = 0;
        for group in &groups {
            if group.strategy.as_ref().map_or(false, |s| s.enabled) {
                self.start(&group.id).await?;
                resumed += 1;
            }
        }
        info!("已恢复 {} 个组的调仓定时器", resumed);
        Ok(resumed)
    }

    /// 当前活跃定时器数量
    pub async fn active_timer_count(&self) -> usize {
        self.timers.lock().await.len()
    }

    /// 取消全部定时器（进程关闭）
    pub async fn shutdown(&self) {
        let mut timers = self.timers.lock().await;
        let count = timers.len();
        for (_, handle) in timers.drain() {
            handle.abort();
        }
        info!("调度器已关闭，取消 {} 个定时器", count);
    }
}

/// 后台触发没有直接调用方：结果只记日志，绝不向上抛
async fn run_and_log(engine: &RebalanceEngine, group_id: &str) {
    match engine.run_once(group_id).await {
        Ok(RunOutcome::Completed(result)) => {
            info!(
                "组 {} 调仓完成: {} 笔交易, 调仓前总市值 {:.2}",
                group_id,
                result.actions.len(),
                result.total_before
            );
        }
        Ok(RunOutcome::Skipped { reason }) => {
            info!("组 {} 调仓跳过: {}", group_id, reason);
        }
        Err(e) => {
            error!("组 {} 调仓失败: {}", group_id, e);
        }
    }
}
