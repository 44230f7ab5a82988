use crate::constants::{backup, dump, storage};
use crate::error::{BackupError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use toml;

/// 应用配置结构
///
/// 启动时构造一次，之后只读，通过引用传递给各个组件
#[derive(Debug, Serialize, Deserialize, Clone, Default)]
#[serde(default)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub storage: StorageConfig,
    pub schedule: ScheduleConfig,
    pub backup: BackupConfig,
}

/// 数据库及转储工具相关配置
#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct DatabaseConfig {
    /// 数据库连接串
    pub url: Option<String>,
    /// 转储工具所在目录，设置后拼接在可执行文件名之前
    pub dump_bin_dir: Option<String>,
    /// 转储工具可执行文件名
    pub dump_binary: String,
    /// 转储超时时间（秒），不设置则不限制
    pub dump_timeout_secs: Option<u64>,
}

/// 对象存储相关配置
#[derive(Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct StorageConfig {
    pub region: String,
    pub bucket: Option<String>,
    pub access_key_id: Option<String>,
    pub secret_access_key: Option<String>,
    /// S3 兼容服务的自定义端点（MinIO、R2 等）
    pub endpoint: Option<String>,
    pub force_path_style: bool,
    /// 对象键前缀，例如 "nightly/"
    pub key_prefix: String,
    /// 上传超时时间（秒），不设置则不限制
    pub upload_timeout_secs: Option<u64>,
}

/// 定时调度相关配置
#[derive(Debug, Serialize, Deserialize, Clone, Default)]
#[serde(default)]
pub struct ScheduleConfig {
    /// cron 表达式，为空时不启用定时备份
    pub cron: Option<String>,
    /// 启动时立即执行一次备份
    pub run_on_startup: bool,
}

/// 备份文件相关配置
#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct BackupConfig {
    pub staging_dir: String,
    /// gzip 压缩级别 (0-9)
    pub compression_level: u32,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: None,
            dump_bin_dir: None,
            dump_binary: dump::DEFAULT_DUMP_BINARY.to_string(),
            dump_timeout_secs: None,
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            region: storage::DEFAULT_REGION.to_string(),
            bucket: None,
            access_key_id: None,
            secret_access_key: None,
            endpoint: None,
            force_path_style: false,
            key_prefix: String::new(),
            upload_timeout_secs: None,
        }
    }
}

// 手写 Debug，避免密钥出现在日志里
impl fmt::Debug for StorageConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StorageConfig")
            .field("region", &self.region)
            .field("bucket", &self.bucket)
            .field("access_key_id", &self.access_key_id)
            .field(
                "secret_access_key",
                &self.secret_access_key.as_ref().map(|_| "***"),
            )
            .field("endpoint", &self.endpoint)
            .field("force_path_style", &self.force_path_style)
            .field("key_prefix", &self.key_prefix)
            .field("upload_timeout_secs", &self.upload_timeout_secs)
            .finish()
    }
}

impl Default for BackupConfig {
    fn default() -> Self {
        Self {
            staging_dir: backup::get_default_staging_dir()
                .to_string_lossy()
                .to_string(),
            compression_level: backup::DEFAULT_COMPRESSION_LEVEL,
        }
    }
}

impl AppConfig {
    /// 加载配置文件
    ///
    /// 文件不存在时：`required` 为 true 返回错误，否则使用默认配置（完全依赖环境变量）
    pub fn find_and_load_config<P: AsRef<Path>>(path: P, required: bool) -> Result<Self> {
        let path = path.as_ref();
        if path.exists() {
            tracing::info!("找到配置文件: {}", path.display());
            return Self::load_from_file(path);
        }

        if required {
            return Err(BackupError::configuration_missing(format!(
                "配置文件不存在: {}",
                path.display()
            )));
        }

        tracing::debug!("未找到配置文件 {}，使用默认配置", path.display());
        Ok(Self::default())
    }

    /// 从指定文件加载配置
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(&path)?;
        let config: AppConfig = toml::from_str(&content)?;

        Ok(config)
    }

    /// 保存配置到文件
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = self.to_toml_with_comments();
        fs::write(&path, content)?;
        Ok(())
    }

    /// 生成带注释的TOML配置
    fn to_toml_with_comments(&self) -> String {
        const TEMPLATE: &str = include_str!("../templates/config.toml.template");

        TEMPLATE
            .replace("{dump_binary}", &self.database.dump_binary)
            .replace("{region}", &self.storage.region)
            .replace(
                "{cron}",
                self.schedule
                    .cron
                    .as_deref()
                    .unwrap_or(crate::constants::cron::DEFAULT_BACKUP_CRON),
            )
            .replace("{run_on_startup}", &self.schedule.run_on_startup.to_string())
            .replace("{staging_dir}", &self.backup.staging_dir)
            .replace(
                "{compression_level}",
                &self.backup.compression_level.to_string(),
            )
    }

    /// 获取数据库连接串，缺失或为空时返回 ConfigurationMissing
    pub fn connection_target(&self) -> Result<&str> {
        non_blank(self.database.url.as_deref())
            .ok_or_else(|| BackupError::configuration_missing("数据库连接串 (DATABASE_URL)"))
    }

    /// 获取目标存储桶名称
    pub fn bucket(&self) -> Result<&str> {
        non_blank(self.storage.bucket.as_deref())
            .ok_or_else(|| BackupError::configuration_missing("对象存储桶 (AWS_S3_BUCKET)"))
    }

    /// 获取 cron 表达式，空字符串视为未配置
    pub fn cron_expression(&self) -> Option<&str> {
        non_blank(self.schedule.cron.as_deref())
    }

    /// 获取备份暂存目录路径
    pub fn staging_dir(&self) -> PathBuf {
        PathBuf::from(&self.backup.staging_dir)
    }

    pub fn dump_timeout(&self) -> Option<Duration> {
        self.database.dump_timeout_secs.map(Duration::from_secs)
    }

    pub fn upload_timeout(&self) -> Option<Duration> {
        self.storage.upload_timeout_secs.map(Duration::from_secs)
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}
