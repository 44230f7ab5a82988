//! # 转储模块
//!
//! 把"调用外部转储工具并经过 gzip 压缩"这一步封装在 [`DumpSource`] 之后：
//! - [`PgDumpSource`]：启动 `pg_dump` 子进程，标准输出经 gzip 压缩后以字节流返回
//! - 测试中可以替换为内存实现，不需要真实的外部进程
//!
//! 标准错误输出与标准输出并发读取，避免管道写满导致子进程阻塞。

use crate::config::DatabaseConfig;
use crate::constants::{backup, dump};
use crate::error::{BackupError, Result};
use flate2::Compression;
use flate2::write::GzEncoder;
use futures::future::{BoxFuture, FutureExt};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::process::Stdio;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::process::Command;
use tracing::debug;

/// 转储进程结束后的汇报
#[derive(Debug, Clone, Default)]
pub struct DumpExit {
    pub success: bool,
    pub code: Option<i32>,
    /// 标准错误输出的全部内容
    pub stderr: String,
}

/// 一次转储的输出
pub struct DumpStream {
    /// 已压缩的备份字节流
    pub stream: Pin<Box<dyn AsyncRead + Send>>,
    /// 读完 `stream` 之后等待，得到进程退出信息
    pub exit: BoxFuture<'static, Result<DumpExit>>,
}

/// 产生压缩转储字节流的来源
pub trait DumpSource: Send + Sync {
    /// 针对连接目标启动一次转储
    fn produce_dump(&self, target: &str) -> Result<DumpStream>;
}

/// 基于 `pg_dump` 子进程的转储来源
#[derive(Debug, Clone)]
pub struct PgDumpSource {
    program: PathBuf,
    compression_level: u32,
}

impl PgDumpSource {
    pub fn new(bin_dir: Option<&Path>, binary: &str) -> Self {
        let program = match bin_dir {
            Some(dir) => dir.join(binary),
            None => PathBuf::from(binary),
        };

        Self {
            program,
            compression_level: backup::DEFAULT_COMPRESSION_LEVEL,
        }
    }

    pub fn from_config(database: &DatabaseConfig, compression_level: u32) -> Self {
        let bin_dir = database
            .dump_bin_dir
            .as_deref()
            .map(str::trim)
            .filter(|d| !d.is_empty())
            .map(Path::new);

        Self::new(bin_dir, &database.dump_binary).with_compression_level(compression_level)
    }

    pub fn with_compression_level(mut self, level: u32) -> Self {
        self.compression_level = level.min(9);
        self
    }

    /// 实际执行的可执行文件路径
    pub fn program(&self) -> &Path {
        &self.program
    }
}

impl DumpSource for PgDumpSource {
    fn produce_dump(&self, target: &str) -> Result<DumpStream> {
        debug!(program = %self.program.display(), "启动转储进程");

        let mut child = Command::new(&self.program)
            .arg("--dbname")
            .arg(target)
            .arg(dump::PLAIN_FORMAT_ARG)
            .arg(dump::NO_PASSWORD_ARG)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                BackupError::dump_failed(format!(
                    "无法启动转储工具 {}: {e}",
                    self.program.display()
                ))
            })?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| BackupError::dump_failed("无法获取转储进程的标准输出"))?;
        let mut stderr = child
            .stderr
            .take()
            .ok_or_else(|| BackupError::dump_failed("无法获取转储进程的标准错误输出"))?;

        let stderr_task = tokio::spawn(async move {
            let mut buf = Vec::new();
            stderr.read_to_end(&mut buf).await?;
            Ok::<String, std::io::Error>(String::from_utf8_lossy(&buf).into_owned())
        });

        let (mut writer, reader) = tokio::io::duplex(backup::STREAM_BUFFER_SIZE);
        let level = self.compression_level;
        let compress_task =
            tokio::spawn(async move { gzip_stream(stdout, &mut writer, level).await });

        let exit = async move {
            let status = child.wait().await?;
            let stderr = stderr_task.await??;
            let raw_bytes = compress_task
                .await?
                .map_err(|e| BackupError::dump_failed(format!("压缩转储输出失败: {e}")))?;
            debug!(raw_bytes, code = ?status.code(), "转储进程已退出");

            Ok::<DumpExit, BackupError>(DumpExit {
                success: status.success(),
                code: status.code(),
                stderr,
            })
        }
        .boxed();

        Ok(DumpStream {
            stream: Box::pin(reader),
            exit,
        })
    }
}

/// 读取 `reader` 的全部内容，gzip 压缩后写入 `writer`，返回未压缩的字节数
pub async fn gzip_stream<R, W>(mut reader: R, writer: &mut W, level: u32) -> std::io::Result<u64>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut encoder = GzEncoder::new(Vec::new(), Compression::new(level.min(9)));
    let mut buf = vec![0u8; backup::STREAM_BUFFER_SIZE];
    let mut raw_bytes = 0u64;

    loop {
        let n = reader.read(&mut buf).await?;
        if n == 0 {
            break;
        }
        raw_bytes += n as u64;

        encoder.write_all(&buf[..n])?;
        let compressed = std::mem::take(encoder.get_mut());
        if !compressed.is_empty() {
            writer.write_all(&compressed).await?;
        }
    }

    let tail = encoder.finish()?;
    writer.write_all(&tail).await?;
    writer.shutdown().await?;

    Ok(raw_bytes)
}
