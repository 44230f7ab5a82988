use thiserror::Error;

pub type Result<T> = std::result::Result<T, BackupError>;

#[derive(Error, Debug)]
pub enum BackupError {
    #[error("缺少必需配置: {0}")]
    ConfigurationMissing(String),

    #[error("数据库转储失败: {0}")]
    DumpFailed(String),

    #[error("备份文件校验失败: {0}")]
    ValidationFailed(String),

    #[error("上传到对象存储失败: {0}")]
    UploadFailed(String),

    #[error("无效的cron表达式: {0}")]
    InvalidSchedule(String),

    #[error("配置错误: {0}")]
    Config(#[from] toml::de::Error),

    #[error("IO 错误: {0}")]
    Io(#[from] std::io::Error),

    #[error("任务执行错误: {0}")]
    Join(#[from] tokio::task::JoinError),
}

impl BackupError {
    pub fn configuration_missing(msg: impl Into<String>) -> Self {
        Self::ConfigurationMissing(msg.into())
    }

    pub fn dump_failed(msg: impl Into<String>) -> Self {
        Self::DumpFailed(msg.into())
    }

    pub fn validation_failed(msg: impl Into<String>) -> Self {
        Self::ValidationFailed(msg.into())
    }

    pub fn upload_failed(msg: impl Into<String>) -> Self {
        Self::UploadFailed(msg.into())
    }

    pub fn invalid_schedule(msg: impl Into<String>) -> Self {
        Self::InvalidSchedule(msg.into())
    }
}
