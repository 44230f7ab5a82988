/// 备份文件相关常量
pub mod backup {
    use std::path::{Path, PathBuf};

    /// 备份暂存目录名
    pub const STAGING_DIR_NAME: &str = "backups";

    /// 备份文件前缀
    pub const BACKUP_PREFIX: &str = "backup-";

    /// 备份文件扩展名（gzip 压缩的 SQL 文本）
    pub const BACKUP_EXTENSION: &str = ".sql.gz";

    /// 最小有效备份文件大小（字节）
    ///
    /// 空 SQL 经 gzip 压缩后也不会小于这个值，低于它基本可以判定文件损坏
    pub const MIN_ARTIFACT_SIZE: u64 = 20;

    /// 无法从连接串中解析出数据库名时使用的默认标签
    pub const DEFAULT_DATABASE_LABEL: &str = "database";

    /// 默认 gzip 压缩级别
    pub const DEFAULT_COMPRESSION_LEVEL: u32 = 6;

    /// 转储输出读取缓冲区大小
    pub const STREAM_BUFFER_SIZE: usize = 64 * 1024;

    /// 获取默认备份暂存目录（跨平台）
    pub fn get_default_staging_dir() -> PathBuf {
        Path::new(".").join(STAGING_DIR_NAME)
    }
}

/// 转储工具相关常量
pub mod dump {
    /// 默认转储工具可执行文件名
    #[cfg(not(windows))]
    pub const DEFAULT_DUMP_BINARY: &str = "pg_dump";

    #[cfg(windows)]
    pub const DEFAULT_DUMP_BINARY: &str = "pg_dump.exe";

    /// 要求输出纯文本 SQL
    pub const PLAIN_FORMAT_ARG: &str = "--format=plain";

    /// 禁止交互式密码输入，避免后台进程挂起
    pub const NO_PASSWORD_ARG: &str = "--no-password";
}

/// 对象存储相关常量
pub mod storage {
    /// 上传时使用的通用二进制内容类型
    pub const CONTENT_TYPE: &str = "application/octet-stream";

    /// 默认区域
    pub const DEFAULT_REGION: &str = "us-east-1";
}

/// Cron任务相关常量
pub mod cron {
    /// 默认自动备份cron表达式（每天凌晨2点）
    pub const DEFAULT_BACKUP_CRON: &str = "0 2 * * *";

    /// 标准cron表达式字段数量（分 时 日 月 周）
    pub const CRON_FIELDS_COUNT: usize = 5;

    /// 带秒字段的cron表达式字段数量
    pub const CRON_FIELDS_WITH_SECONDS: usize = 6;
}

/// 环境变量名
pub mod env {
    pub const DATABASE_URL: &str = "DATABASE_URL";
    pub const PG_DUMP_PATH: &str = "PG_DUMP_PATH";
    pub const PG_DUMP_TIMEOUT_SECS: &str = "PG_DUMP_TIMEOUT_SECS";
    pub const BACKUP_CRON_SCHEDULE: &str = "BACKUP_CRON_SCHEDULE";
    pub const RUN_ON_STARTUP: &str = "RUN_ON_STARTUP";
    pub const AWS_REGION: &str = "AWS_REGION";
    pub const AWS_S3_BUCKET: &str = "AWS_S3_BUCKET";
    pub const AWS_ACCESS_KEY_ID: &str = "AWS_ACCESS_KEY_ID";
    pub const AWS_SECRET_ACCESS_KEY: &str = "AWS_SECRET_ACCESS_KEY";
    pub const AWS_S3_ENDPOINT: &str = "AWS_S3_ENDPOINT";
    pub const AWS_S3_FORCE_PATH_STYLE: &str = "AWS_S3_FORCE_PATH_STYLE";
    pub const BACKUP_KEY_PREFIX: &str = "BACKUP_KEY_PREFIX";
    pub const UPLOAD_TIMEOUT_SECS: &str = "UPLOAD_TIMEOUT_SECS";
    pub const BACKUP_STAGING_DIR: &str = "BACKUP_STAGING_DIR";
    pub const BACKUP_COMPRESSION_LEVEL: &str = "BACKUP_COMPRESSION_LEVEL";

    /// 日志文件路径，设置后日志输出到文件而非终端
    pub const LOG_FILE: &str = "PGBACKUP_LOG_FILE";
}

/// 应用配置相关常量
pub mod config {
    use std::path::{Path, PathBuf};

    /// 配置文件名
    pub const CONFIG_FILE_NAME: &str = "pgbackup.toml";

    /// 获取默认配置文件路径（跨平台）
    pub fn get_config_file_path() -> PathBuf {
        Path::new(".").join(CONFIG_FILE_NAME)
    }
}

/// 技术版本信息常量
pub mod version {
    /// 版本信息（仅技术版本，项目信息在 pgbackup-cli 中定义）
    pub mod version_info {
        /// 核心库版本（自动同步）
        pub const CORE_VERSION: &str = env!("CARGO_PKG_VERSION");

        /// 配置格式版本
        pub const CONFIG_FORMAT_VERSION: &str = "1.0";
    }
}
