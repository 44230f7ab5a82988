use crate::app::CliApp;
use crate::commands::run_once;
use backup_core::{
    error::Result,
    pipeline::BackupPipeline,
    scheduler::{self, CadenceSchedule},
};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{info, instrument, warn};

/// 按配置启动：未配置 cron 时执行一次后退出，否则常驻定时备份
///
/// 无效的 cron 表达式直接返回错误，进程以非零状态退出
#[instrument(skip(app))]
pub async fn run_start(app: &CliApp) -> Result<()> {
    let Some(expression) = app.config.cron_expression() else {
        info!("未配置定时备份，执行一次后退出");
        return run_once(app).await;
    };

    // 先校验 cron 表达式，再组装备份流程
    CadenceSchedule::parse(expression)?;
    let pipeline = Arc::new(BackupPipeline::from_config(app.config.clone())?);
    let shutdown = CancellationToken::new();

    let handle = scheduler::register(
        expression,
        app.config.schedule.run_on_startup,
        pipeline,
        shutdown.clone(),
    )
    .await?;

    match handle.next_fire() {
        Some(next) => info!("⏰ 定时备份已启动: '{}'，下一次执行: {} (UTC)", expression, next),
        None => warn!("⚠️  定时备份已启动，但 '{}' 没有后续触发时间", expression),
    }
    info!("💡 按 Ctrl+C 停止");

    let signal_token = shutdown.clone();
    tokio::spawn(async move {
        wait_for_shutdown_signal().await;
        info!("🛑 收到停止信号，等待当前备份完成...");
        signal_token.cancel();
    });

    handle.wait().await?;
    info!("👋 定时备份已停止");
    Ok(())
}

/// 等待 Ctrl+C，Unix 上同时监听 SIGTERM
async fn wait_for_shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};

        match signal(SignalKind::terminate()) {
            Ok(mut terminate) => {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => {}
                    _ = terminate.recv() => {}
                }
                return;
            }
            Err(e) => warn!(error = %e, "无法监听 SIGTERM，仅响应 Ctrl+C"),
        }
    }

    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "无法监听 Ctrl+C 信号");
        std::future::pending::<()>().await;
    }
}
