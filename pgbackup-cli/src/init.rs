use backup_core::{config::AppConfig, error::Result};
use std::path::Path;
use tracing::{info, warn};

/// 生成配置文件模板
pub fn run_init(config_path: &Path, force: bool) -> Result<()> {
    info!("🗄️  pgbackup 初始化");
    info!("======================");

    // 检查是否已经初始化过
    if !force && config_path.exists() {
        warn!("⚠️  检测到已存在的配置文件: {}", config_path.display());
        info!("如果您要重新初始化，请使用 --force 参数");
        info!("示例: pgbackup init --force");
        return Ok(());
    }

    if let Some(parent) = config_path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    let config = AppConfig::default();
    config.save_to_file(config_path)?;
    info!("   ✅ 创建配置文件: {}", config_path.display());
    info!(
        "   📁 暂存目录: {} (首次备份时自动创建)",
        config.backup.staging_dir
    );

    info!("🎉 初始化完成！");
    info!("");
    info!("📝 接下来的步骤:");
    info!("   1️⃣  设置 DATABASE_URL、AWS_S3_BUCKET、AWS_ACCESS_KEY_ID、AWS_SECRET_ACCESS_KEY");
    info!("   2️⃣  运行 'pgbackup check' 检查配置");
    info!("   3️⃣  运行 'pgbackup run' 立即执行一次备份，或 'pgbackup' 按 cron 常驻运行");

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_init_writes_loadable_config() {
        let temp_dir = tempdir().unwrap();
        let path = temp_dir.path().join("conf").join("pgbackup.toml");

        run_init(&path, false).unwrap();

        let config = AppConfig::load_from_file(&path).unwrap();
        assert!(config.cron_expression().is_some());
    }

    #[test]
    fn test_init_keeps_existing_without_force() {
        let temp_dir = tempdir().unwrap();
        let path = temp_dir.path().join("pgbackup.toml");
        std::fs::write(&path, "# custom\n").unwrap();

        run_init(&path, false).unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "# custom\n");

        run_init(&path, true).unwrap();
        assert_ne!(std::fs::read_to_string(&path).unwrap(), "# custom\n");
    }
}
