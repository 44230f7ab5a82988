//! # 上传模块
//!
//! 把备份文件推送到 S3 兼容的对象存储：
//! - 整个文件读入内存后一次性 `PutObject`
//! - 不分片、不断点续传、不重试（SDK 自带的重试也被关闭）
//! - 对象键为 `key_prefix + 文件名`

use crate::config::AppConfig;
use crate::constants::storage;
use crate::error::{BackupError, Result};
use aws_sdk_s3::Client;
use aws_sdk_s3::config::retry::RetryConfig;
use aws_sdk_s3::config::{BehaviorVersion, Credentials, Region};
use aws_sdk_s3::error::DisplayErrorContext;
use aws_sdk_s3::primitives::ByteStream;
use futures::future::{BoxFuture, FutureExt};
use std::path::Path;
use std::time::Duration;
use tracing::{debug, info, instrument};

/// 备份文件上传接口
pub trait ArtifactUploader: Send + Sync {
    /// 上传本地文件，`file_name` 决定对象键
    fn upload<'a>(&'a self, path: &'a Path, file_name: &'a str) -> BoxFuture<'a, Result<()>>;
}

/// S3 上传器
#[derive(Debug, Clone)]
pub struct S3Uploader {
    client: Client,
    bucket: String,
    key_prefix: String,
    timeout: Option<Duration>,
}

impl S3Uploader {
    /// 根据配置创建客户端，此时不会发起网络请求
    pub fn from_config(config: &AppConfig) -> Result<Self> {
        let bucket = config.bucket()?.to_string();
        let settings = &config.storage;

        let access_key_id = non_blank(settings.access_key_id.as_deref());
        let secret_access_key = non_blank(settings.secret_access_key.as_deref());
        let (Some(access_key_id), Some(secret_access_key)) = (access_key_id, secret_access_key)
        else {
            return Err(BackupError::configuration_missing(
                "对象存储访问凭证 (AWS_ACCESS_KEY_ID / AWS_SECRET_ACCESS_KEY)",
            ));
        };

        let credentials = Credentials::new(
            access_key_id,
            secret_access_key,
            None,
            None,
            "pgbackup-config",
        );

        let mut builder = aws_sdk_s3::Config::builder()
            .behavior_version(BehaviorVersion::latest())
            .region(Region::new(settings.region.clone()))
            .credentials_provider(credentials)
            .retry_config(RetryConfig::disabled())
            .force_path_style(settings.force_path_style);

        if let Some(endpoint) = non_blank(settings.endpoint.as_deref()) {
            debug!(endpoint, "使用自定义对象存储端点");
            builder = builder.endpoint_url(endpoint);
        }

        Ok(Self {
            client: Client::from_conf(builder.build()),
            bucket,
            key_prefix: normalize_prefix(&settings.key_prefix),
            timeout: config.upload_timeout(),
        })
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    /// 计算对象键
    pub fn object_key(&self, file_name: &str) -> String {
        format!("{}{}", self.key_prefix, file_name)
    }

    #[instrument(skip(self, path), fields(bucket = %self.bucket))]
    async fn put_file(&self, path: &Path, file_name: &str) -> Result<()> {
        let body = tokio::fs::read(path).await.map_err(|e| {
            BackupError::upload_failed(format!("读取备份文件失败 {}: {e}", path.display()))
        })?;
        let key = self.object_key(file_name);
        let size_bytes = body.len();

        debug!(key = %key, size_bytes, "开始上传备份文件");

        let request = self
            .client
            .put_object()
            .bucket(&self.bucket)
            .key(&key)
            .content_type(storage::CONTENT_TYPE)
            .body(ByteStream::from(body))
            .send();

        let response = match self.timeout {
            Some(limit) => tokio::time::timeout(limit, request).await.map_err(|_| {
                BackupError::upload_failed(format!("上传超时（{limit:?}）"))
            })?,
            None => request.await,
        };
        response.map_err(|e| BackupError::upload_failed(DisplayErrorContext(&e).to_string()))?;

        info!(bucket = %self.bucket, key = %key, size_bytes, "备份文件上传成功");
        Ok(())
    }
}

impl ArtifactUploader for S3Uploader {
    fn upload<'a>(&'a self, path: &'a Path, file_name: &'a str) -> BoxFuture<'a, Result<()>> {
        self.put_file(path, file_name).boxed()
    }
}

/// 统一前缀格式：去掉开头的 '/'，非空时保证以 '/' 结尾
fn normalize_prefix(prefix: &str) -> String {
    let trimmed = prefix.trim().trim_start_matches('/');
    if trimmed.is_empty() || trimmed.ends_with('/') {
        trimmed.to_string()
    } else {
        format!("{trimmed}/")
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

/// 测试用的上传器，记录每次调用
#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use std::path::PathBuf;
    use std::sync::Mutex;

    #[derive(Debug, Clone, PartialEq)]
    pub struct UploadCall {
        pub path: PathBuf,
        pub file_name: String,
        /// 上传时文件是否存在
        pub existed: bool,
    }

    #[derive(Debug, Default)]
    pub struct RecordingUploader {
        pub calls: Mutex<Vec<UploadCall>>,
        pub fail: bool,
    }

    impl RecordingUploader {
        pub fn failing() -> Self {
            Self {
                fail: true,
                ..Default::default()
            }
        }

        pub fn calls(&self) -> Vec<UploadCall> {
            self.calls.lock().unwrap().clone()
        }
    }

    impl ArtifactUploader for RecordingUploader {
        fn upload<'a>(&'a self, path: &'a Path, file_name: &'a str) -> BoxFuture<'a, Result<()>> {
            async move {
                self.calls.lock().unwrap().push(UploadCall {
                    path: path.to_path_buf(),
                    file_name: file_name.to_string(),
                    existed: path.is_file(),
                });
                if self.fail {
                    return Err(BackupError::upload_failed("模拟的网络错误"));
                }
                Ok(())
            }
            .boxed()
        }
    }
}
