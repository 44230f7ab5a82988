use crate::{
    BackupError, Result,
    artifact::{BackupArtifact, artifact_file_name, database_label},
    config::AppConfig,
    constants::backup,
    dump::{DumpExit, DumpSource, DumpStream},
};
use chrono::{DateTime, Utc};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tracing::{debug, error, info, instrument, warn};

/// 备份生成器：执行转储，把压缩结果写入暂存目录并校验
#[derive(Clone)]
pub struct BackupProducer {
    staging_dir: PathBuf,
    source: Arc<dyn DumpSource>,
    dump_timeout: Option<Duration>,
}

impl BackupProducer {
    /// 创建新的备份生成器
    pub fn new(staging_dir: PathBuf, source: Arc<dyn DumpSource>) -> Self {
        Self {
            staging_dir,
            source,
            dump_timeout: None,
        }
    }

    pub fn from_config(config: &AppConfig, source: Arc<dyn DumpSource>) -> Self {
        Self::new(config.staging_dir(), source).with_dump_timeout(config.dump_timeout())
    }

    pub fn with_dump_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.dump_timeout = timeout;
        self
    }

    /// 获取暂存目录
    pub fn staging_dir(&self) -> &Path {
        &self.staging_dir
    }

    /// 生成一份备份文件
    #[instrument(skip_all)]
    pub async fn produce(&self, target: &str) -> Result<BackupArtifact> {
        self.produce_at(target, Utc::now()).await
    }

    /// 以指定时间戳生成备份文件
    pub async fn produce_at(
        &self,
        target: &str,
        created_at: DateTime<Utc>,
    ) -> Result<BackupArtifact> {
        let database_label = database_label(target);
        let file_name = artifact_file_name(&database_label, created_at);

        // 确保暂存目录存在
        tokio::fs::create_dir_all(&self.staging_dir).await?;
        let path = self.staging_dir.join(&file_name);

        info!(database = %database_label, "开始创建备份: {}", path.display());

        match self.dump_and_validate(target, &path).await {
            Ok(size_bytes) => {
                info!(size_bytes, "备份文件已生成: {}", path.display());
                Ok(BackupArtifact {
                    path,
                    file_name,
                    database_label,
                    created_at,
                    size_bytes,
                })
            }
            Err(e) => {
                error!(error = %e, "备份创建失败");
                discard_partial(&path).await;
                Err(e)
            }
        }
    }

    async fn dump_and_validate(&self, target: &str, path: &Path) -> Result<u64> {
        let dump = self.write_dump(target, path);

        match self.dump_timeout {
            Some(limit) => tokio::time::timeout(limit, dump).await.map_err(|_| {
                BackupError::dump_failed(format!("转储超时（{limit:?}）"))
            })??,
            None => dump.await?,
        }

        validate_artifact(path).await
    }

    /// 把转储字节流写入目标文件，并检查转储进程的退出情况
    async fn write_dump(&self, target: &str, path: &Path) -> Result<()> {
        let DumpStream { mut stream, exit } = self.source.produce_dump(target)?;

        let mut file = tokio::fs::File::create(path).await?;
        let written = tokio::io::copy(&mut stream, &mut file)
            .await
            .map_err(|e| BackupError::dump_failed(format!("读取转储输出失败: {e}")))?;
        file.flush().await?;
        file.sync_all().await?;
        drop(file);
        debug!(written, "转储输出写入完成");

        let report = exit.await?;
        check_dump_exit(&report)
    }
}

/// 标准错误输出中出现任何内容都视为失败，即使退出码为 0
fn check_dump_exit(report: &DumpExit) -> Result<()> {
    let stderr = report.stderr.trim();
    if !stderr.is_empty() {
        return Err(BackupError::dump_failed(stderr.to_string()));
    }

    if !report.success {
        let code = report
            .code
            .map(|c| c.to_string())
            .unwrap_or_else(|| "被信号终止".to_string());
        return Err(BackupError::dump_failed(format!("转储进程退出码: {code}")));
    }

    Ok(())
}

/// 校验备份文件：必须是普通文件且不小于最小有效大小
pub async fn validate_artifact(path: &Path) -> Result<u64> {
    let metadata = tokio::fs::metadata(path).await.map_err(|e| {
        BackupError::validation_failed(format!("无法读取备份文件 {}: {e}", path.display()))
    })?;

    if !metadata.is_file() {
        return Err(BackupError::validation_failed(format!(
            "不是普通文件: {}",
            path.display()
        )));
    }

    let size = metadata.len();
    if size < backup::MIN_ARTIFACT_SIZE {
        return Err(BackupError::validation_failed(format!(
            "备份文件过小 ({size} 字节)，可能已损坏: {}",
            path.display()
        )));
    }

    Ok(size)
}

/// 删除失败运行留下的不完整文件
async fn discard_partial(path: &Path) {
    match tokio::fs::try_exists(path).await {
        Ok(true) => match tokio::fs::remove_file(path).await {
            Ok(()) => debug!("已删除不完整的备份文件: {}", path.display()),
            Err(e) => warn!(error = %e, "删除不完整的备份文件失败: {}", path.display()),
        },
        Ok(false) => {}
        Err(e) => warn!(error = %e, "检查备份文件失败: {}", path.display()),
    }
}
