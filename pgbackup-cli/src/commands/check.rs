use crate::app::CliApp;
use anyhow::{Context, Result};
use backup_core::{
    artifact::database_label, dump::PgDumpSource, scheduler::CadenceSchedule,
    uploader::S3Uploader,
};
use tracing::info;

/// 检查配置是否完整可用，不执行任何备份
pub fn run_check(app: &CliApp, count: usize) -> Result<()> {
    let config = &app.config;

    info!("🔍 检查备份配置");
    info!("===============");
    info!("📄 配置文件: {}", app.config_path.display());

    // 1. 数据库连接
    let target = config.connection_target()?;
    info!("✅ 数据库: {}", database_label(target));

    // 2. 转储工具
    let source =
        PgDumpSource::from_config(&config.database, config.backup.compression_level);
    let resolved = which::which(source.program())
        .with_context(|| format!("未找到转储工具: {}", source.program().display()))?;
    info!("✅ 转储工具: {}", resolved.display());

    // 3. 对象存储
    let uploader = S3Uploader::from_config(config)?;
    info!(
        "✅ 对象存储: bucket={}, region={}, 键示例={}",
        uploader.bucket(),
        config.storage.region,
        uploader.object_key("backup-<db>-<timestamp>.sql.gz")
    );
    if let Some(endpoint) = config.storage.endpoint.as_deref() {
        info!("   自定义端点: {}", endpoint);
    }

    // 4. 定时配置
    match config.cron_expression() {
        Some(expression) => {
            let schedule = CadenceSchedule::parse(expression)?;
            info!(
                "✅ 定时备份: '{}' (启动时执行: {})",
                schedule.expression(),
                config.schedule.run_on_startup
            );
            for (i, time) in schedule.upcoming(count).iter().enumerate() {
                info!("   {}. {} (UTC)", i + 1, time);
            }
        }
        None => info!("ℹ️  未配置定时备份，启动后执行一次即退出"),
    }

    info!("📁 暂存目录: {}", config.staging_dir().display());
    info!("🎉 配置检查通过");
    Ok(())
}
