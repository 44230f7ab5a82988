use backup_core::constants::env;

/// 设置日志记录系统
///
/// - 库代码只使用 tracing 宏记录日志，在应用入口配置输出行为
/// - 支持 RUST_LOG 环境变量控制日志级别，`-v` 切换到 debug
/// - 设置 PGBACKUP_LOG_FILE 后追加写入文件，包含模块路径和行号
/// - 终端输出简洁格式，输出到 stderr
pub fn setup_logging(verbose: bool) {
    use tracing_subscriber::{EnvFilter, fmt};

    // 根据verbose参数和环境变量确定日志级别
    let default_level = if verbose { "debug" } else { "info" };
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    // 检查环境变量，决定是否输出到文件
    if let Ok(log_file) = std::env::var(env::LOG_FILE) {
        match std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&log_file)
        {
            Ok(file) => {
                fmt()
                    .with_env_filter(env_filter)
                    .with_writer(file)
                    .with_ansi(false)
                    .with_target(true)
                    .with_thread_names(true)
                    .with_line_number(true)
                    .init();
                return;
            }
            Err(e) => {
                eprintln!("无法打开日志文件 {log_file}: {e}，改为输出到终端");
            }
        }
    }

    // 输出到终端 - 使用简洁格式，用户友好
    fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .with_target(false) // 不显示模块路径
        .with_thread_names(false) // 不显示线程名
        .with_line_number(false) // 不显示行号
        .compact() // 使用紧凑格式
        .init();
}
