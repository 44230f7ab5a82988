use crate::app::CliApp;
use backup_core::{error::Result, pipeline::BackupPipeline};
use tracing::info;

/// 执行一次完整备份：转储 -> 上传 -> 删除本地文件
pub async fn run_once(app: &CliApp) -> Result<()> {
    info!("💾 数据库备份");
    info!("===============");

    let pipeline = BackupPipeline::from_config(app.config.clone())?;
    let artifact = pipeline.run().await?;

    info!(
        "✅ 备份完成: {} ({:.1} KB)",
        artifact.file_name,
        artifact.size_bytes as f64 / 1024.0
    );
    Ok(())
}
