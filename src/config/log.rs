use std::env;

use dotenv::dotenv;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter, FmtSubscriber, Layer, Registry};

/// 设置日志。
/// LOCAL 环境输出到控制台；其他环境写入 log_files/ 下按天滚动的
/// info/error 双文件。返回的 guard 必须由调用方持有到进程结束，
/// 否则非阻塞写线程会提前退出丢日志。
pub fn setup_logging() -> anyhow::Result<Vec<WorkerGuard>> {
    dotenv().ok();
    let app_env = env::var("APP_ENV").unwrap_or_else(|_| "LOCAL".to_string());

    if app_env == "LOCAL" {
        let subscriber = FmtSubscriber::builder()
            .with_env_filter(
                EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
            )
            .finish();
        tracing::subscriber::set_global_default(subscriber)?;
        Ok(Vec::new())
    } else {
        let info_file = RollingFileAppender::new(Rotation::DAILY, "log_files", "info.log");
        let error_file = RollingFileAppender::new(Rotation::DAILY, "log_files", "error.log");

        let (info_non_blocking, info_guard) = tracing_appender::non_blocking(info_file);
        let (error_non_blocking, error_guard) = tracing_appender::non_blocking(error_file);

        Registry::default()
            .with(
                fmt::layer()
                    .with_writer(info_non_blocking)
                    .with_filter(EnvFilter::new("info")),
            )
            .with(
                fmt::layer()
                    .with_writer(error_non_blocking)
                    .with_filter(EnvFilter::new("error")),
            )
            .init();

        Ok(vec![info_guard, error_guard])
    }
}
