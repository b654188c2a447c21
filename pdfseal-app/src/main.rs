use std::path::{Path, PathBuf};

use clap::{Args, Parser, Subcommand};
use pdfseal_config::{AppConfig, ConfigError};
use pdfseal_frontend::{BatchOptions, SignOptions};
use tracing::{error, info, warn};
use tracing_subscriber::{EnvFilter, fmt};

#[derive(Debug, Parser)]
#[command(name = "pdfseal", version, about = "为 PDF 文档加盖印章与签名")]
struct Cli {
    /// 配置文件路径（默认读取 PDFSEAL_CONFIG 或 ./config/default.toml）
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// 对目录下所有 PDF 的每一页自动盖章
    Batch(BatchArgs),
    /// 在指定位置签名，并按签名模式展开到其他页面
    Sign(SignArgs),
    /// 显示每页尺寸与分类场景
    Inspect {
        #[arg(long)]
        pdf: PathBuf,
    },
}

#[derive(Debug, Args)]
struct BatchArgs {
    #[arg(long)]
    input: Option<PathBuf>,
    #[arg(long)]
    stamp: Option<PathBuf>,
    #[arg(long)]
    output: Option<PathBuf>,
    /// 固定随机种子，便于复现抖动
    #[arg(long)]
    seed: Option<u64>,
}

#[derive(Debug, Args)]
struct SignArgs {
    #[arg(long)]
    pdf: PathBuf,
    #[arg(long)]
    stamp: PathBuf,
    #[arg(long)]
    output: PathBuf,
    /// free | mass | template | selective
    #[arg(long, default_value = "free")]
    mode: String,
    /// 签名所在页（从 1 开始）
    #[arg(long, default_value_t = 1)]
    page: usize,
    #[arg(long)]
    x: Option<f64>,
    #[arg(long)]
    y: Option<f64>,
    /// 签名宽度（点），高度按图像宽高比计算
    #[arg(long)]
    width: Option<f64>,
    #[arg(long)]
    interval: Option<usize>,
    /// 逗号分隔的页码，例如 1,3
    #[arg(long)]
    pages: Option<String>,
    #[arg(long)]
    exclude: Option<String>,
    #[arg(long)]
    profile: Option<String>,
    #[arg(long)]
    profiles: Option<PathBuf>,
}

impl From<BatchArgs> for BatchOptions {
    fn from(args: BatchArgs) -> Self {
        BatchOptions {
            input: args.input,
            stamp: args.stamp,
            output: args.output,
            seed: args.seed,
        }
    }
}

impl From<SignArgs> for SignOptions {
    fn from(args: SignArgs) -> Self {
        SignOptions {
            pdf: args.pdf,
            stamp: args.stamp,
            output: args.output,
            mode: args.mode,
            page: args.page,
            x: args.x,
            y: args.y,
            width: args.width,
            interval: args.interval,
            pages: args.pages,
            exclude: args.exclude,
            profile: args.profile,
            profiles_file: args.profiles,
        }
    }
}

fn main() {
    let cli = Cli::parse();

    let config = bootstrap(cli.config.as_deref());
    info!("启动 pdfseal");

    let result = match cli.command {
        Command::Batch(args) => pdfseal_frontend::run_batch(&config, &args.into()),
        Command::Sign(args) => pdfseal_frontend::run_sign(&config, &args.into()),
        Command::Inspect { pdf } => pdfseal_frontend::run_inspect(&config, &pdf),
    };

    if let Err(err) = result {
        error!(error = %err, "执行失败");
        std::process::exit(1);
    }
}

/// 加载配置并初始化日志；加载失败时回退默认配置，日志就绪后再报告原因。
fn bootstrap(override_path: Option<&Path>) -> AppConfig {
    let loaded = load_configuration(override_path);
    let config = loaded.as_ref().cloned().unwrap_or_default();
    init_logging(&config);
    if let Err(err) = &loaded {
        report_config_fallback(err, override_path);
    }
    config
}

fn load_configuration(override_path: Option<&Path>) -> Result<AppConfig, ConfigError> {
    match override_path {
        Some(path) => AppConfig::from_file(path),
        None => AppConfig::discover(),
    }
}

fn report_config_fallback(err: &ConfigError, override_path: Option<&Path>) {
    if let Some(path) = override_path {
        warn!(path = %path.display(), error = %err, "加载指定配置失败，使用默认配置");
        return;
    }
    match err {
        ConfigError::Io { path, .. } | ConfigError::Parse { path, .. } => {
            warn!(
                path = %path.display(),
                error = %err,
                "加载默认配置失败，使用内建默认值"
            );
        }
        _ => {
            warn!(error = %err, "加载默认配置失败，使用内建默认值");
        }
    }
}

fn init_logging(config: &AppConfig) {
    let filter = EnvFilter::try_new(config.logging.level.clone())
        .unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber = fmt().with_env_filter(filter);
    if subscriber.try_init().is_err() {
        // 已初始化，忽略
    }
}
