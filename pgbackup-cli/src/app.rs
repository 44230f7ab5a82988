use backup_core::{config::AppConfig, constants, error::Result};
use std::path::PathBuf;
use std::sync::Arc;

use crate::cli::{Cli, Commands};
use crate::commands;
use tracing::{debug, info};

#[derive(Clone)]
pub struct CliApp {
    pub config: Arc<AppConfig>,
    pub config_path: PathBuf,
}

impl CliApp {
    /// 加载配置文件并叠加环境变量和命令行参数
    ///
    /// 显式指定的配置文件必须存在；默认路径不存在时只使用环境变量
    pub fn from_cli(cli: &Cli) -> Result<Self> {
        let required = cli.config.is_some();
        let config_path = cli
            .config
            .clone()
            .unwrap_or_else(constants::config::get_config_file_path);

        let mut config = AppConfig::find_and_load_config(&config_path, required)?;
        cli.overrides.apply(&mut config);
        debug!(?config, "配置加载完成");

        Ok(Self {
            config: Arc::new(config),
            config_path,
        })
    }

    /// 运行应用命令
    pub async fn run_command(&self, command: Commands) -> anyhow::Result<()> {
        match command {
            Commands::Start => commands::run_start(self).await?,
            Commands::Run => {
                info!("💾 立即执行一次备份...");
                commands::run_once(self).await?
            }
            Commands::Check { count } => commands::run_check(self, count)?,
            Commands::Init { .. } => unreachable!(), // 已经在 main.rs 中处理
        }

        Ok(())
    }
}
