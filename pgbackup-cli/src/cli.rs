use crate::project_info::{metadata, version_info};
use backup_core::config::AppConfig;
use backup_core::constants::env;
use clap::builder::BoolishValueParser;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

/// 可通过环境变量或命令行覆盖的配置项，优先级高于配置文件
#[derive(Args, Debug, Default, Clone)]
pub struct ConfigOverrides {
    /// 数据库连接串
    #[arg(long, env = env::DATABASE_URL, global = true, hide_env_values = true)]
    pub database_url: Option<String>,

    /// 转储工具所在目录
    #[arg(long, env = env::PG_DUMP_PATH, global = true)]
    pub pg_dump_path: Option<String>,

    /// 转储超时时间（秒）
    #[arg(long, env = env::PG_DUMP_TIMEOUT_SECS, global = true)]
    pub dump_timeout_secs: Option<u64>,

    /// cron 表达式，例如 "0 2 * * *" 表示每天凌晨2点（UTC）
    #[arg(long = "cron", env = env::BACKUP_CRON_SCHEDULE, global = true)]
    pub cron: Option<String>,

    /// 启动时立即执行一次备份
    #[arg(long, env = env::RUN_ON_STARTUP, global = true, value_parser = BoolishValueParser::new())]
    pub run_on_startup: Option<bool>,

    /// 对象存储区域
    #[arg(long, env = env::AWS_REGION, global = true)]
    pub region: Option<String>,

    /// 目标存储桶
    #[arg(long, env = env::AWS_S3_BUCKET, global = true)]
    pub bucket: Option<String>,

    #[arg(long, env = env::AWS_ACCESS_KEY_ID, global = true, hide_env_values = true)]
    pub access_key_id: Option<String>,

    #[arg(long, env = env::AWS_SECRET_ACCESS_KEY, global = true, hide_env_values = true)]
    pub secret_access_key: Option<String>,

    /// S3 兼容服务端点
    #[arg(long, env = env::AWS_S3_ENDPOINT, global = true)]
    pub endpoint: Option<String>,

    #[arg(long, env = env::AWS_S3_FORCE_PATH_STYLE, global = true, value_parser = BoolishValueParser::new())]
    pub force_path_style: Option<bool>,

    /// 对象键前缀
    #[arg(long, env = env::BACKUP_KEY_PREFIX, global = true)]
    pub key_prefix: Option<String>,

    /// 上传超时时间（秒）
    #[arg(long, env = env::UPLOAD_TIMEOUT_SECS, global = true)]
    pub upload_timeout_secs: Option<u64>,

    /// 备份文件暂存目录
    #[arg(long, env = env::BACKUP_STAGING_DIR, global = true)]
    pub staging_dir: Option<String>,

    /// gzip 压缩级别 (0-9)
    #[arg(long, env = env::BACKUP_COMPRESSION_LEVEL, global = true, value_parser = clap::value_parser!(u32).range(0..=9))]
    pub compression_level: Option<u32>,
}

impl ConfigOverrides {
    /// 把已设置的项覆盖到配置上
    pub fn apply(&self, config: &mut AppConfig) {
        fn set<T: Clone>(slot: &mut T, value: &Option<T>) {
            if let Some(value) = value {
                *slot = value.clone();
            }
        }
        fn set_opt<T: Clone>(slot: &mut Option<T>, value: &Option<T>) {
            if value.is_some() {
                *slot = value.clone();
            }
        }

        set_opt(&mut config.database.url, &self.database_url);
        set_opt(&mut config.database.dump_bin_dir, &self.pg_dump_path);
        set_opt(&mut config.database.dump_timeout_secs, &self.dump_timeout_secs);

        set_opt(&mut config.schedule.cron, &self.cron);
        set(&mut config.schedule.run_on_startup, &self.run_on_startup);

        set(&mut config.storage.region, &self.region);
        set_opt(&mut config.storage.bucket, &self.bucket);
        set_opt(&mut config.storage.access_key_id, &self.access_key_id);
        set_opt(&mut config.storage.secret_access_key, &self.secret_access_key);
        set_opt(&mut config.storage.endpoint, &self.endpoint);
        set(&mut config.storage.force_path_style, &self.force_path_style);
        set(&mut config.storage.key_prefix, &self.key_prefix);
        set_opt(
            &mut config.storage.upload_timeout_secs,
            &self.upload_timeout_secs,
        );

        set(&mut config.backup.staging_dir, &self.staging_dir);
        set(&mut config.backup.compression_level, &self.compression_level);
    }
}

/// pgbackup - 数据库定时备份工具
#[derive(Parser, Debug)]
#[command(name = "pgbackup")]
#[command(about = metadata::PROJECT_DESCRIPTION)]
#[command(version = version_info::CLI_VERSION)]
#[command(long_about = metadata::display::DESCRIPTION_LONG)]
pub struct Cli {
    /// 配置文件路径（默认 ./pgbackup.toml，不存在时仅使用环境变量）
    #[arg(short, long, env = "PGBACKUP_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// 详细输出
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(flatten)]
    pub overrides: ConfigOverrides,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum Commands {
    /// 按配置运行：配置了 cron 时常驻并定时备份，否则执行一次后退出（默认）
    Start,
    /// 立即执行一次备份后退出，忽略定时配置
    Run,
    /// 检查配置、cron 表达式和转储工具，不执行备份
    Check {
        /// 显示后续触发时间的数量
        #[arg(long, default_value = "5")]
        count: usize,
    },
    /// 生成带注释的配置文件模板
    Init {
        /// 如果配置文件已存在，强制覆盖
        #[arg(long)]
        force: bool,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_command() {
        let cli = Cli::try_parse_from(["pgbackup"]).unwrap();
        assert!(cli.command.is_none());
        assert!(!cli.verbose);
    }

    #[test]
    fn test_subcommands() {
        let cli = Cli::try_parse_from(["pgbackup", "check", "--count", "3"]).unwrap();
        assert_eq!(cli.command, Some(Commands::Check { count: 3 }));

        let cli = Cli::try_parse_from(["pgbackup", "init", "--force"]).unwrap();
        assert_eq!(cli.command, Some(Commands::Init { force: true }));
    }

    #[test]
    fn test_overrides_take_precedence() {
        let cli = Cli::try_parse_from([
            "pgbackup",
            "run",
            "--database-url",
            "postgres://db/app",
            "--cron",
            "*/5 * * * *",
            "--run-on-startup",
            "yes",
            "--staging-dir",
            "/tmp/pgbackup-staging",
            "--compression-level",
            "9",
        ])
        .unwrap();

        let mut config = AppConfig::default();
        config.database.url = Some("postgres://file/old".to_string());
        config.backup.staging_dir = "./from-file".to_string();
        cli.overrides.apply(&mut config);

        assert_eq!(config.database.url.as_deref(), Some("postgres://db/app"));
        assert_eq!(config.cron_expression(), Some("*/5 * * * *"));
        assert!(config.schedule.run_on_startup);
        assert_eq!(config.backup.staging_dir, "/tmp/pgbackup-staging");
        assert_eq!(config.backup.compression_level, 9);
    }

    #[test]
    fn test_unset_overrides_keep_file_values() {
        let overrides = ConfigOverrides::default();
        let mut config = AppConfig::default();
        config.storage.key_prefix = "nightly/".to_string();
        config.schedule.run_on_startup = true;

        overrides.apply(&mut config);

        assert_eq!(config.storage.key_prefix, "nightly/");
        assert!(config.schedule.run_on_startup);
    }

    #[test]
    fn test_compression_level_range() {
        let result = Cli::try_parse_from(["pgbackup", "--compression-level", "12"]);
        assert!(result.is_err());
    }
}
