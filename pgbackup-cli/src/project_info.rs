/// pgbackup 项目信息模块
///
/// pgbackup-cli 是面向用户的主程序，项目元数据统一在这里定义
/// backup-core 作为内部库，只提供技术性常量

/// 项目元数据（自动从 pgbackup-cli 的 Cargo.toml 同步）
pub mod metadata {
    /// 项目名称（自动从 Cargo.toml 同步）
    pub const PROJECT_NAME: &str = env!("CARGO_PKG_NAME");

    /// 项目描述（自动从 Cargo.toml 同步）
    pub const PROJECT_DESCRIPTION: &str = env!("CARGO_PKG_DESCRIPTION");

    /// 用户友好的显示名称（手动维护，用于 UI 显示）
    pub mod display {
        /// 用户友好的项目名称
        pub const FRIENDLY_NAME: &str = "pgbackup";

        /// 项目详细描述（比 Cargo.toml 中的描述更详细）
        pub const DESCRIPTION_LONG: &str = "调用 pg_dump 生成 gzip 压缩的 SQL 备份并上传到 S3 兼容的对象存储，上传成功后删除本地文件；支持一次性执行，也支持按 cron 表达式常驻定时备份";
    }
}

/// 版本信息
pub mod version_info {
    /// CLI 版本（自动从 Cargo.toml 同步）
    pub const CLI_VERSION: &str = env!("CARGO_PKG_VERSION");

    /// 核心库版本（从 backup-core 获取）
    pub const CORE_VERSION: &str = backup_core::constants::version::version_info::CORE_VERSION;
}

/// 启动时输出的版本横幅
pub fn version_banner() -> String {
    format!(
        "{} v{} (core v{})",
        metadata::display::FRIENDLY_NAME,
        version_info::CLI_VERSION,
        version_info::CORE_VERSION
    )
}
