use crate::{
    Result,
    artifact::BackupArtifact,
    config::AppConfig,
    dump::PgDumpSource,
    producer::BackupProducer,
    uploader::{ArtifactUploader, S3Uploader},
};
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info, instrument, warn};

/// 备份流程编排：转储 -> 上传 -> 删除本地文件
///
/// 任何一步失败都直接返回错误，不做重试，由调用方决定退出进程
#[derive(Clone)]
pub struct BackupPipeline {
    config: Arc<AppConfig>,
    producer: BackupProducer,
    uploader: Arc<dyn ArtifactUploader>,
}

impl BackupPipeline {
    pub fn new(
        config: Arc<AppConfig>,
        producer: BackupProducer,
        uploader: Arc<dyn ArtifactUploader>,
    ) -> Self {
        Self {
            config,
            producer,
            uploader,
        }
    }

    /// 使用 pg_dump 和 S3 上传器组装完整流程
    pub fn from_config(config: Arc<AppConfig>) -> Result<Self> {
        config.connection_target()?;

        let source = Arc::new(PgDumpSource::from_config(
            &config.database,
            config.backup.compression_level,
        ));
        let producer = BackupProducer::from_config(&config, source);
        let uploader = Arc::new(S3Uploader::from_config(&config)?);

        Ok(Self::new(config, producer, uploader))
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// 执行一次完整的备份流程
    #[instrument(skip(self))]
    pub async fn run(&self) -> Result<BackupArtifact> {
        let started = Instant::now();

        let target = self.config.connection_target().inspect_err(|e| {
            error!(error = %e, "未配置数据库连接串，无法执行备份");
        })?;

        let artifact = self.producer.produce(target).await?;

        if let Err(e) = self
            .uploader
            .upload(&artifact.path, &artifact.file_name)
            .await
        {
            error!(error = %e, file = %artifact.file_name, "备份上传失败");
            discard_local(&artifact.path).await;
            return Err(e);
        }

        tokio::fs::remove_file(&artifact.path).await.inspect_err(|e| {
            error!(error = %e, "删除本地备份文件失败: {}", artifact.path.display());
        })?;

        info!(
            file = %artifact.file_name,
            size_bytes = artifact.size_bytes,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "备份流程完成，本地文件已清理"
        );

        Ok(artifact)
    }
}

async fn discard_local(path: &Path) {
    if let Err(e) = tokio::fs::remove_file(path).await {
        warn!(error = %e, "清理本地备份文件失败: {}", path.display());
    }
}
