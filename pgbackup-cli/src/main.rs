use backup_core::{BackupError, constants};
use clap::Parser;
use pgbackup_cli::{Cli, CliApp, Commands, project_info, run_init, setup_logging};
use tracing::{debug, error};

#[tokio::main]
async fn main() {
    // 解析命令行参数
    let mut cli = Cli::parse();

    // 设置日志记录
    setup_logging(cli.verbose);
    debug!("{}", project_info::version_banner());

    let command = cli.command.take().unwrap_or(Commands::Start);

    // `init` 命令是特例，它不需要预先加载配置
    if let Commands::Init { force } = command {
        let path = cli
            .config
            .clone()
            .unwrap_or_else(constants::config::get_config_file_path);
        if let Err(e) = run_init(&path, force) {
            error!("❌ 初始化失败: {}", e);
            std::process::exit(1);
        }
        return;
    }

    // 对于其他所有命令，我们需要加载配置并初始化App
    let app = match CliApp::from_cli(&cli) {
        Ok(app) => app,
        Err(e) => {
            error!("❌ 配置加载失败: {}", e);
            if matches!(e, BackupError::ConfigurationMissing(_)) {
                error!("👉 请检查 --config 指定的路径，或运行 'pgbackup init' 生成配置文件。");
            }
            std::process::exit(1);
        }
    };

    // 运行命令
    if let Err(e) = app.run_command(command).await {
        error!("❌ 操作失败: {:#}", e);
        if let Some(BackupError::ConfigurationMissing(_)) = e.downcast_ref::<BackupError>() {
            error!("👉 可通过环境变量、命令行参数或配置文件提供缺失的配置，运行 'pgbackup check' 检查。");
        }
        std::process::exit(1);
    }
}
