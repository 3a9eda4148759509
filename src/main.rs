//! sourcelinks 主程序
//!
//! 启动链接目录 HTTP 服务，或通过子命令维护审计账本

mod cli;
mod error;
mod observability;

use chrono::{DateTime, Utc};
use clap::Parser;
use ledger::{Ledger, Severity};
use observability::init_observability;
use sourcelinks::{AppState, SourcelinksConfig, create_router, metrics, serve};
use sourcelinks_common::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{error, info, warn};

macro_rules! bootstrap_info {
    ($($arg:tt)*) => {
        println!($($arg)*);
    };
}

macro_rules! bootstrap_error {
    ($($arg:tt)*) => {
        eprintln!($($arg)*);
    };
}

use cli::{Cli, Commands, LedgerAction};
use error::{Error, Result};

/// Application launcher utilities
struct ApplicationLauncher;

fn main() -> Result<()> {
    let cli = Cli::parse();

    match &cli.command {
        Some(Commands::Test { config_file }) => {
            let config_path =
                ApplicationLauncher::find_config_file(config_file.as_ref().unwrap_or(&cli.config))?;
            ApplicationLauncher::test_config_file(&config_path)
        }
        Some(Commands::Ledger { action }) => {
            let config_path = ApplicationLauncher::find_config_file(&cli.config)?;
            let runtime = tokio::runtime::Builder::new_multi_thread()
                .enable_all()
                .build()?;
            runtime.block_on(ApplicationLauncher::run_ledger_command(&config_path, action))
        }
        None => {
            let config_path = ApplicationLauncher::find_config_file(&cli.config)?;

            // Create Tokio runtime（before running the application）
            let runtime = tokio::runtime::Builder::new_multi_thread()
                .enable_all()
                .build()?;

            runtime.block_on(ApplicationLauncher::run_application(&config_path))
        }
    }
}

impl ApplicationLauncher {
    /// Find config file with fallback locations
    fn find_config_file(provided_path: &PathBuf) -> Result<PathBuf> {
        if provided_path != Path::new("config.toml") {
            if provided_path.exists() {
                bootstrap_info!("Using provided config file: {:?}", provided_path);
                return Ok(provided_path.clone());
            } else {
                bootstrap_error!("Provided config file not found: {:?}", provided_path);
                return Err(Error::custom(format!(
                    "Config file not found: {provided_path:?}"
                )));
            }
        }

        let fallback_paths = vec![
            // 1. Current working directory
            PathBuf::from("config.toml"),
            // 2. System config directory
            PathBuf::from("/etc/sourcelinks/config.toml"),
        ];

        bootstrap_info!("Searching for config file in default locations...");

        for path in &fallback_paths {
            if path.exists() {
                bootstrap_info!("Found config file: {:?}", path);
                return Ok(path.clone());
            } else {
                bootstrap_info!("Config not found at: {:?}", path);
            }
        }

        bootstrap_error!("No configuration file found!");
        bootstrap_error!("Please create a config file in one of these locations:");
        for (i, path) in fallback_paths.iter().enumerate() {
            bootstrap_error!("  {}. {:?}", i + 1, path);
        }
        bootstrap_error!("Or specify a custom path with: sourcelinks --config <path>");

        Err(Error::custom(
            "No configuration file found. Please create one or specify path with --config",
        ))
    }

    /// 加载并验证配置，警告不阻止继续
    fn load_config(config_path: &Path) -> Result<SourcelinksConfig> {
        let config = SourcelinksConfig::from_file(config_path).map_err(|e| {
            bootstrap_error!("❌ 配置加载失败: {}", e);
            Error::custom(format!("配置加载失败: {e}"))
        })?;

        if let Err(errors) = config.validate() {
            let mut has_critical_errors = false;
            for (i, err) in errors.iter().enumerate() {
                if err.starts_with("Warning:") {
                    bootstrap_info!("  {}. ⚠️  {}", i + 1, err);
                } else {
                    bootstrap_error!("  {}. ❌ {}", i + 1, err);
                    has_critical_errors = true;
                }
            }
            if has_critical_errors {
                return Err(Error::service_validation("配置验证失败，请修复上述错误"));
            }
        }

        Ok(config)
    }

    /// 测试配置文件是否有效
    fn test_config_file(config_path: &Path) -> Result<()> {
        tracing_subscriber::fmt()
            .with_max_level(tracing::Level::INFO)
            .init();

        match SourcelinksConfig::from_file(config_path) {
            Ok(config) => {
                info!("✅ 配置文件解析成功: {:?}", config_path);

                match config.validate() {
                    Ok(()) => {
                        info!("✅ 配置验证通过");
                    }
                    Err(errors) => {
                        error!("❌ 配置验证发现问题:");
                        for (i, err) in errors.iter().enumerate() {
                            if err.starts_with("Warning:") {
                                info!("  {}. ⚠️  {}", i + 1, err);
                            } else {
                                error!("  {}. ❌ {}", i + 1, err);
                            }
                        }
                        let has_errors = errors.iter().any(|e| !e.starts_with("Warning:"));
                        if has_errors {
                            return Err(Error::service_validation("配置验证失败"));
                        }
                    }
                }

                info!("✅ 完整配置验证通过");
                Ok(())
            }
            Err(e) => {
                error!("❌ 配置文件解析失败: {}", e);
                Err(Error::service_validation(format!("配置解析失败: {e}")))
            }
        }
    }

    /// 运行应用程序的主入口
    async fn run_application(config_path: &Path) -> Result<()> {
        bootstrap_info!("📄 加载配置文件: {:?}", config_path);
        let config = Self::load_config(config_path)?;
        bootstrap_info!("✅ 配置加载成功");

        let _observability_guard = init_observability(&config.observability)?;

        if let Err(e) = metrics::register_metrics() {
            warn!(
                "Prometheus metrics registration warning (may already be registered): {}",
                e
            );
        }

        let ledger = Arc::new(Ledger::open(&config.ledger).await?);
        ledger
            .append(
                ErrorKind::Initialized,
                Severity::Info,
                &format!("{} started in {} mode", config.name, config.env),
                "sourcelinks::main",
            )
            .await;

        let addr = config
            .http
            .socket_addr()
            .map_err(Error::service_startup)?;
        let listener = tokio::net::TcpListener::bind(addr)
            .await
            .map_err(|e| Error::service_startup(format!("Failed to bind to address '{addr}': {e}")))?;

        Self::display_service_info(&config);

        let router = create_router(AppState::new(&config, ledger));
        serve(listener, router, shutdown_signal()).await?;

        info!("🛑 服务已安全关闭");
        Ok(())
    }

    /// 执行账本维护子命令
    async fn run_ledger_command(config_path: &Path, action: &LedgerAction) -> Result<()> {
        let config = Self::load_config(config_path)?;
        let _observability_guard = init_observability(&config.observability)?;
        let ledger = Ledger::open(&config.ledger).await?;

        match action {
            LedgerAction::Read { start, end } => {
                let entries = ledger
                    .query(parse_time(start)?, parse_time(end)?)?
                    .collect()
                    .await?;
                println!("{}", serde_json::to_string_pretty(&entries)?);
                info!("{} entries read from {}", entries.len(), ledger.application());
            }
            LedgerAction::Delete { row_key } => {
                ledger.delete_by_key(row_key).await?;
                info!("Deleted entry {}", row_key);
            }
            LedgerAction::DeleteRange { start, end } => {
                let deleted = ledger
                    .delete_by_range(parse_time(start)?, parse_time(end)?)
                    .await?;
                println!("{deleted}");
                info!("Deleted {} entries", deleted);
            }
            LedgerAction::Purge { yes } => {
                if !yes {
                    return Err(Error::custom(
                        "Refusing to purge the ledger without --yes",
                    ));
                }
                if !ledger.purge().await {
                    return Err(Error::custom("Ledger purge failed"));
                }
                info!("Ledger table dropped; it is recreated on the next start");
            }
        }
        Ok(())
    }

    /// 显示服务信息
    fn display_service_info(config: &SourcelinksConfig) {
        let base = format!("http://{}:{}", config.http.ip, config.http.port);
        info!("✅ 服务已启动: {} ({})", config.name, config.env);
        info!("📡 HTTP 服务器监听在: {}", base);
        info!("🔧 可用的API端点:");
        info!("  - {}/v1/ApiAnchorLink?target=<name>", base);
        info!("  - {}/v1/ledger?start=<rfc3339>&end=<rfc3339>", base);
        info!("  - {}/health", base);
        info!("  - {}/metrics", base);
        for target in config.links.keys() {
            info!("  🔗 target: {}", target);
        }
    }
}

fn parse_time(value: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|at| at.with_timezone(&Utc))
        .map_err(|e| Error::custom(format!("Invalid RFC 3339 timestamp '{value}': {e}")))
}

/// 等待 Ctrl-C 信号
async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("无法监听Ctrl-C信号: {}", e);
        std::future::pending::<()>().await;
    }
    info!("收到Ctrl-C信号，开始优雅关闭...");
}
