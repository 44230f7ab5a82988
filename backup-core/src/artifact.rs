use crate::constants::backup;
use chrono::{DateTime, SecondsFormat, Utc};
use percent_encoding::percent_decode_str;
use std::path::PathBuf;
use url::Url;

/// 一次备份产生的本地压缩文件
#[derive(Debug, Clone, PartialEq)]
pub struct BackupArtifact {
    /// 本地暂存文件路径
    pub path: PathBuf,
    /// 文件名，同时作为对象存储的键
    pub file_name: String,
    /// 从连接串中解析出的数据库标签
    pub database_label: String,
    pub created_at: DateTime<Utc>,
    pub size_bytes: u64,
}

/// 从连接串中提取数据库标签
///
/// 支持 URL 形式（取最后一段路径）和 libpq 关键字形式（取 dbname），
/// 都解析不到时返回 "database"
pub fn database_label(target: &str) -> String {
    let target = target.trim();

    let label = match Url::parse(target) {
        Ok(url) if !url.cannot_be_a_base() => url
            .path_segments()
            .and_then(|segments| segments.filter(|s| !s.is_empty()).last())
            .map(|segment| percent_decode_str(segment).decode_utf8_lossy().into_owned()),
        _ => keyword_dbname(target).or_else(|| path_tail(target)),
    };

    label
        .map(|l| sanitize_label(&l))
        .filter(|l| !l.is_empty())
        .unwrap_or_else(|| backup::DEFAULT_DATABASE_LABEL.to_string())
}

/// 文件系统安全的时间戳：RFC-3339（毫秒精度）中的 ':' 和 '.' 替换为 '-'
pub fn safe_timestamp(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Millis, true)
        .replace([':', '.'], "-")
}

/// 生成备份文件名：backup-{label}-{timestamp}.sql.gz
pub fn artifact_file_name(label: &str, ts: DateTime<Utc>) -> String {
    format!(
        "{}{}-{}{}",
        backup::BACKUP_PREFIX,
        label,
        safe_timestamp(ts),
        backup::BACKUP_EXTENSION
    )
}

// host=localhost dbname=shop user=app
fn keyword_dbname(target: &str) -> Option<String> {
    target
        .split_whitespace()
        .find_map(|pair| pair.strip_prefix("dbname="))
        .map(|v| v.trim_matches(|c| c == '\'' || c == '"').to_string())
}

fn path_tail(target: &str) -> Option<String> {
    let (_, tail) = target.rsplit_once('/')?;
    let tail = tail.split(['?', '#']).next().unwrap_or_default();
    Some(tail.to_string())
}

fn sanitize_label(raw: &str) -> String {
    raw.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.') {
                c
            } else {
                '_'
            }
        })
        .collect()
}
