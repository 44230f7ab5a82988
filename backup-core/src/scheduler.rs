//! # 定时调度模块
//!
//! 按 cron 表达式周期性执行备份：
//! - 支持 5 段（分 时 日 月 周）和 6 段（秒 分 时 日 月 周）表达式，时区为 UTC
//! - 表达式在注册时校验，无效时不注册任何触发器
//! - 可选在注册时立即执行一次
//! - 触发时如果上一次备份仍在执行，本次触发直接跳过（备份在循环内串行执行）
//! - 通过 [`CancellationToken`] 显式停止；停止时等待正在执行的备份完成

use crate::constants::cron as cron_consts;
use crate::error::{BackupError, Result};
use crate::pipeline::BackupPipeline;
use chrono::{DateTime, Utc};
use cron::Schedule;
use futures::future::{BoxFuture, FutureExt};
use std::str::FromStr;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

/// 由调度器反复执行的任务
pub trait BackupJob: Send + Sync {
    fn run_job(&self) -> BoxFuture<'_, Result<()>>;
}

impl BackupJob for BackupPipeline {
    fn run_job(&self) -> BoxFuture<'_, Result<()>> {
        async move { self.run().await.map(|_| ()) }.boxed()
    }
}

/// 解析后的 cron 表达式
#[derive(Debug, Clone)]
pub struct CadenceSchedule {
    expression: String,
    schedule: Schedule,
}

impl CadenceSchedule {
    /// 解析 cron 表达式，5 段表达式自动补上秒字段 "0"
    pub fn parse(expression: &str) -> Result<Self> {
        let trimmed = expression.trim();
        let mut fields: Vec<String> = trimmed.split_whitespace().map(str::to_string).collect();
        match fields.len() {
            cron_consts::CRON_FIELDS_COUNT => fields.insert(0, "0".to_string()),
            cron_consts::CRON_FIELDS_WITH_SECONDS => {}
            n => {
                return Err(BackupError::invalid_schedule(format!(
                    "'{trimmed}' 应为 {} 段或 {} 段，实际 {n} 段",
                    cron_consts::CRON_FIELDS_COUNT,
                    cron_consts::CRON_FIELDS_WITH_SECONDS
                )));
            }
        }

        // 星期字段按标准 cron 书写（0/7 = 周日），cron crate 使用 1-7（1 = 周日）
        if let Some(day_of_week) = fields.last_mut() {
            *day_of_week = normalize_day_of_week(day_of_week)
                .map_err(|e| BackupError::invalid_schedule(format!("'{trimmed}': {e}")))?;
        }
        let normalized = fields.join(" ");

        let schedule = Schedule::from_str(&normalized)
            .map_err(|e| BackupError::invalid_schedule(format!("'{trimmed}': {e}")))?;

        Ok(Self {
            expression: trimmed.to_string(),
            schedule,
        })
    }

    pub fn expression(&self) -> &str {
        &self.expression
    }

    /// 严格晚于 `after` 的下一次触发时间
    pub fn next_after(&self, after: DateTime<Utc>) -> Option<DateTime<Utc>> {
        self.schedule.after(&after).next()
    }

    /// 从当前时间开始的后续若干次触发时间
    pub fn upcoming(&self, count: usize) -> Vec<DateTime<Utc>> {
        self.schedule.upcoming(Utc).take(count).collect()
    }

    /// (start, end] 区间内的触发次数
    fn fires_between(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> usize {
        self.schedule
            .after(&start)
            .take_while(|t| *t <= end)
            .count()
    }
}

const WEEKDAY_NAMES: [(&str, &str); 7] = [
    ("SUN", "SUNDAY"),
    ("MON", "MONDAY"),
    ("TUE", "TUESDAY"),
    ("WED", "WEDNESDAY"),
    ("THU", "THURSDAY"),
    ("FRI", "FRIDAY"),
    ("SAT", "SATURDAY"),
];

/// 把标准 cron 的星期字段转换为 cron crate 的编号
///
/// 支持数字 0-7、英文缩写、列表、范围和步长（如 `1-5`、`5-7`、`MON-FRI`、`*/2`），
/// 展开后输出 crate 编号的列表；`*` 和 `?` 原样保留
fn normalize_day_of_week(field: &str) -> std::result::Result<String, String> {
    if field == "*" || field == "?" {
        return Ok(field.to_string());
    }

    let mut days = [false; 7];
    for item in field.split(',') {
        let (range, step) = match item.split_once('/') {
            Some((range, step)) => {
                let step: usize = step
                    .parse()
                    .ok()
                    .filter(|s| *s > 0)
                    .ok_or_else(|| format!("星期字段步长无效: '{item}'"))?;
                (range, step)
            }
            None => (item, 1),
        };

        let (start, end) = match range {
            "*" => (0, 6),
            _ => match range.split_once('-') {
                Some((start, end)) => (weekday_value(start)?, weekday_value(end)?),
                // `5/2` 表示从 5 开始到周六
                None if item.contains('/') => (weekday_value(range)?, 6),
                None => {
                    let day = weekday_value(range)?;
                    (day, day)
                }
            },
        };
        if start > end {
            return Err(format!("星期字段范围无效: '{item}'"));
        }

        for day in (start..=end).step_by(step) {
            days[day % 7] = true;
        }
    }

    Ok(days
        .iter()
        .enumerate()
        .filter(|(_, set)| **set)
        .map(|(day, _)| (day + 1).to_string())
        .collect::<Vec<_>>()
        .join(","))
}

/// 解析单个星期值，返回 0-7（0 和 7 都是周日）
fn weekday_value(token: &str) -> std::result::Result<usize, String> {
    if let Ok(day) = token.parse::<usize>() {
        return if day <= 7 {
            Ok(day)
        } else {
            Err(format!("星期取值超出 0-7: '{token}'"))
        };
    }

    let upper = token.to_ascii_uppercase();
    WEEKDAY_NAMES
        .iter()
        .position(|(short, long)| upper == *short || upper == *long)
        .ok_or_else(|| format!("无法识别的星期值: '{token}'"))
}

/// 已注册的定时任务句柄，持有后台调度任务
#[derive(Debug)]
pub struct ScheduleHandle {
    schedule: CadenceSchedule,
    shutdown: CancellationToken,
    task: JoinHandle<Result<()>>,
}

impl ScheduleHandle {
    pub fn expression(&self) -> &str {
        self.schedule.expression()
    }

    /// 下一次触发时间
    pub fn next_fire(&self) -> Option<DateTime<Utc>> {
        self.schedule.next_after(Utc::now())
    }

    /// 请求停止；正在执行的备份会先完成
    pub fn shutdown(&self) {
        self.shutdown.cancel();
    }

    /// 等待调度任务结束；某次备份失败时返回该错误
    pub async fn wait(self) -> Result<()> {
        self.task.await?
    }
}

/// 注册定时备份
///
/// 表达式无效时返回 `InvalidSchedule`，不注册触发器也不执行备份。
/// `run_on_startup` 为 true 时在返回前立即执行一次，失败则直接返回错误。
#[instrument(skip(job, shutdown))]
pub async fn register(
    expression: &str,
    run_on_startup: bool,
    job: Arc<dyn BackupJob>,
    shutdown: CancellationToken,
) -> Result<ScheduleHandle> {
    let schedule = CadenceSchedule::parse(expression).inspect_err(|e| {
        error!(error = %e, "定时备份注册失败");
    })?;

    if run_on_startup {
        info!("启动时立即执行一次备份");
        job.run_job().await?;
    }

    let task = tokio::spawn(trigger_loop(schedule.clone(), job, shutdown.clone()));

    info!(
        expression = schedule.expression(),
        next = ?schedule.next_after(Utc::now()),
        "已注册定时备份"
    );

    Ok(ScheduleHandle {
        schedule,
        shutdown,
        task,
    })
}

async fn trigger_loop(
    schedule: CadenceSchedule,
    job: Arc<dyn BackupJob>,
    shutdown: CancellationToken,
) -> Result<()> {
    let mut last_fire: Option<DateTime<Utc>> = None;

    loop {
        let now = Utc::now();
        // 以上一次触发时间为下限，避免时钟抖动导致同一时间点触发两次
        let from = last_fire.map_or(now, |last| last.max(now));
        let Some(next) = schedule.next_after(from) else {
            warn!("cron 表达式没有后续触发时间，定时任务结束");
            return Ok(());
        };

        let wait = (next - now).to_std().unwrap_or_default();
        debug!(next = %next, wait_secs = wait.as_secs(), "等待下一次触发");

        tokio::select! {
            _ = shutdown.cancelled() => {
                info!("收到停止信号，定时任务退出");
                return Ok(());
            }
            _ = tokio::time::sleep(wait) => {}
        }

        last_fire = Some(next);
        info!(scheduled_at = %next, "定时备份触发");

        job.run_job().await.inspect_err(|e| {
            error!(error = %e, "定时备份失败，停止调度");
        })?;

        let skipped = schedule.fires_between(next, Utc::now());
        if skipped > 0 {
            warn!(skipped, "备份执行期间错过的触发已跳过");
        }

        if shutdown.is_cancelled() {
            info!("备份已完成，定时任务退出");
            return Ok(());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Datelike, TimeZone};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[derive(Default)]
    struct CountingJob {
        started: AtomicUsize,
        finished: AtomicUsize,
        duration: Option<Duration>,
        fail: bool,
    }

    impl CountingJob {
        fn started(&self) -> usize {
            self.started.load(Ordering::SeqCst)
        }

        fn finished(&self) -> usize {
            self.finished.load(Ordering::SeqCst)
        }
    }

    impl BackupJob for CountingJob {
        fn run_job(&self) -> BoxFuture<'_, Result<()>> {
            async move {
                self.started.fetch_add(1, Ordering::SeqCst);
                if let Some(duration) = self.duration {
                    tokio::time::sleep(duration).await;
                }
                self.finished.fetch_add(1, Ordering::SeqCst);
                if self.fail {
                    return Err(BackupError::dump_failed("模拟失败"));
                }
                Ok(())
            }
            .boxed()
        }
    }

    async fn wait_until(mut predicate: impl FnMut() -> bool) -> bool {
        let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
        while tokio::time::Instant::now() < deadline {
            if predicate() {
                return true;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        predicate()
    }

    #[test]
    fn test_parse_five_fields() {
        let schedule = CadenceSchedule::parse("0 2 * * *").unwrap();
        assert_eq!(schedule.expression(), "0 2 * * *");

        let after = Utc.with_ymd_and_hms(2026, 10, 18, 3, 0, 0).unwrap();
        assert_eq!(
            schedule.next_after(after),
            Some(Utc.with_ymd_and_hms(2026, 10, 19, 2, 0, 0).unwrap())
        );
    }

    #[test]
    fn test_parse_six_fields() {
        let schedule = CadenceSchedule::parse("30 */15 * * * *").unwrap();
        let after = Utc.with_ymd_and_hms(2026, 10, 18, 3, 0, 0).unwrap();
        assert_eq!(
            schedule.next_after(after),
            Some(Utc.with_ymd_and_hms(2026, 10, 18, 3, 0, 30).unwrap())
        );
        assert_eq!(schedule.upcoming(3).len(), 3);
    }

    /// 2026-10-18 是周日
    fn sunday_morning() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 10, 18, 3, 0, 0).unwrap()
    }

    fn fires(expression: &str, count: usize) -> Vec<DateTime<Utc>> {
        CadenceSchedule::parse(expression)
            .unwrap()
            .schedule
            .after(&sunday_morning())
            .take(count)
            .collect()
    }

    fn at(day: u32, hour: u32, minute: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 10, day, hour, minute, 0).unwrap()
    }

    #[test]
    fn test_day_of_week_uses_standard_numbering() {
        // 0 和 7 都是周日
        assert_eq!(fires("0 2 * * 0", 1), vec![at(25, 2, 0)]);
        assert_eq!(fires("0 2 * * 7", 1), vec![at(25, 2, 0)]);
        assert_eq!(fires("0 2 * * SUN", 1), vec![at(25, 2, 0)]);
        // 1 是周一
        assert_eq!(fires("0 2 * * 1", 1), vec![at(19, 2, 0)]);
        assert_eq!(fires("0 2 * * mon", 1), vec![at(19, 2, 0)]);
    }

    #[test]
    fn test_day_of_week_ranges_and_lists() {
        let weekdays = fires("0 2 * * 1-5", 6);
        assert_eq!(
            weekdays,
            vec![
                at(19, 2, 0),
                at(20, 2, 0),
                at(21, 2, 0),
                at(22, 2, 0),
                at(23, 2, 0),
                at(26, 2, 0)
            ]
        );
        assert!(weekdays.iter().all(|t| t.weekday().number_from_monday() <= 5));
        assert_eq!(fires("0 2 * * MON-FRI", 6), weekdays);

        // 周五到周日
        assert_eq!(
            fires("0 2 * * 5-7", 3),
            vec![at(23, 2, 0), at(24, 2, 0), at(25, 2, 0)]
        );
        // 周日、周二、周四、周六
        assert_eq!(
            fires("0 2 * * */2", 4),
            vec![at(20, 2, 0), at(22, 2, 0), at(24, 2, 0), at(25, 2, 0)]
        );
        assert_eq!(
            fires("0 2 * * 0,3", 2),
            vec![at(21, 2, 0), at(25, 2, 0)]
        );
    }

    #[test]
    fn test_six_field_day_of_week() {
        assert_eq!(fires("0 30 9 * * 0", 1), vec![at(25, 9, 30)]);
        assert_eq!(fires("0 30 9 * * 6", 1), vec![at(24, 9, 30)]);
    }

    #[test]
    fn test_day_of_month() {
        assert_eq!(
            fires("0 2 15 * *", 1),
            vec![Utc.with_ymd_and_hms(2026, 11, 15, 2, 0, 0).unwrap()]
        );
        assert_eq!(
            fires("30 6 1 1 *", 1),
            vec![Utc.with_ymd_and_hms(2027, 1, 1, 6, 30, 0).unwrap()]
        );
        assert_eq!(fires("0 2 20 10 *", 1), vec![at(20, 2, 0)]);
    }

    #[test]
    fn test_normalize_day_of_week() {
        assert_eq!(normalize_day_of_week("*").unwrap(), "*");
        assert_eq!(normalize_day_of_week("1-5").unwrap(), "2,3,4,5,6");
        assert_eq!(normalize_day_of_week("0,7").unwrap(), "1");
        assert_eq!(normalize_day_of_week("5-7").unwrap(), "1,6,7");
        assert_eq!(normalize_day_of_week("1/2").unwrap(), "2,4,6");
        assert!(normalize_day_of_week("8").is_err());
        assert!(normalize_day_of_week("5-1").is_err());
        assert!(normalize_day_of_week("*/0").is_err());
        assert!(normalize_day_of_week("FUNDAY").is_err());
    }

    #[test]
    fn test_parse_invalid() {
        for expression in [
            "not-a-cron",
            "",
            "61 * * * *",
            "* * *",
            "0 2 * * * * * *",
            "0 2 * * 8",
            "0 2 * * 5-1",
        ] {
            let err = CadenceSchedule::parse(expression).unwrap_err();
            assert!(
                matches!(err, BackupError::InvalidSchedule(_)),
                "表达式 '{}' 应被拒绝",
                expression
            );
        }
    }

    #[test]
    fn test_fires_between() {
        let schedule = CadenceSchedule::parse("* * * * *").unwrap();
        let start = Utc.with_ymd_and_hms(2026, 10, 18, 3, 0, 0).unwrap();
        let end = Utc.with_ymd_and_hms(2026, 10, 18, 3, 5, 0).unwrap();
        assert_eq!(schedule.fires_between(start, end), 5);
        assert_eq!(schedule.fires_between(start, start), 0);
    }

    #[tokio::test]
    async fn test_register_without_startup_run() {
        let job = Arc::new(CountingJob::default());
        let handle = register("0 2 * * *", false, job.clone(), CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(job.started(), 0, "不应立即执行备份");
        assert!(handle.next_fire().is_some());
        assert_eq!(handle.expression(), "0 2 * * *");

        handle.shutdown();
        handle.wait().await.unwrap();
        assert_eq!(job.started(), 0);
    }

    #[tokio::test]
    async fn test_register_with_startup_run() {
        let job = Arc::new(CountingJob::default());
        let handle = register("0 2 * * *", true, job.clone(), CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(job.started(), 1, "应立即执行且仅执行一次");

        handle.shutdown();
        handle.wait().await.unwrap();
        assert_eq!(job.started(), 1);
    }

    #[tokio::test]
    async fn test_register_invalid_expression() {
        let job = Arc::new(CountingJob::default());
        let err = register("not-a-cron", true, job.clone(), CancellationToken::new())
            .await
            .unwrap_err();

        assert!(matches!(err, BackupError::InvalidSchedule(_)));
        assert_eq!(job.started(), 0, "无效表达式不应触发任何备份");
    }

    #[tokio::test]
    async fn test_startup_run_failure() {
        let job = Arc::new(CountingJob {
            fail: true,
            ..Default::default()
        });
        let err = register("0 2 * * *", true, job.clone(), CancellationToken::new())
            .await
            .unwrap_err();

        assert!(matches!(err, BackupError::DumpFailed(_)));
        assert_eq!(job.started(), 1);
    }

    #[tokio::test]
    async fn test_recurring_runs() {
        let job = Arc::new(CountingJob::default());
        let handle = register("* * * * * *", false, job.clone(), CancellationToken::new())
            .await
            .unwrap();

        assert!(wait_until(|| job.started() >= 2).await, "每秒触发应至少执行两次");

        handle.shutdown();
        handle.wait().await.unwrap();
    }

    #[tokio::test]
    async fn test_failed_run_stops_schedule() {
        let job = Arc::new(CountingJob {
            fail: true,
            ..Default::default()
        });
        let handle = register("* * * * * *", false, job.clone(), CancellationToken::new())
            .await
            .unwrap();

        let result = tokio::time::timeout(Duration::from_secs(5), handle.wait())
            .await
            .expect("调度任务应在失败后结束");
        assert!(matches!(result, Err(BackupError::DumpFailed(_))));
        assert_eq!(job.started(), 1, "失败后不应继续触发");
    }

    #[tokio::test]
    async fn test_shutdown_drains_running_job() {
        let job = Arc::new(CountingJob {
            duration: Some(Duration::from_millis(300)),
            ..Default::default()
        });
        let handle = register("* * * * * *", false, job.clone(), CancellationToken::new())
            .await
            .unwrap();

        assert!(wait_until(|| job.started() >= 1).await);
        handle.shutdown();
        handle.wait().await.unwrap();

        assert_eq!(job.started(), job.finished(), "正在执行的备份应完成后再退出");
        assert_eq!(job.started(), 1);
    }
}
