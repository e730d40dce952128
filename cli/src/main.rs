use clap::Parser;
use taskbot_cli::commands::{cli, sweep};
use taskbot_cli::http;
use taskbot_core::api::{AppConfig, CliError, ConfigError, LoggingConfig};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

static LOG_GUARD: std::sync::OnceLock<tracing_appender::non_blocking::WorkerGuard> =
    std::sync::OnceLock::new();

#[tokio::main]
async fn main() {
    let exit = match real_main().await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("{e}");
            exit_code_for_error(&e)
        }
    };

    std::process::exit(exit);
}

async fn real_main() -> Result<i32, CliError> {
    let args = cli::Args::parse();
    let cfg = match args.config.as_deref() {
        Some(path) => taskbot_core::config::load_from_path(path)?,
        None => taskbot_core::config::load_default()?,
    };
    init_tracing(&cfg.logging).map_err(|e| CliError::Config(ConfigError::Invalid(e)))?;
    check_config(&cfg)?;

    match args.command {
        Some(cli::Commands::Sweep(sweep_args)) => {
            let sent = sweep::handle_sweep(sweep_args, &cfg).await?;
            println!("reminders sent: {sent}");
            Ok(0)
        }
        Some(cli::Commands::Serve(serve_args)) => {
            http::handle_serve(serve_args, cfg).await?;
            Ok(0)
        }
        None => {
            http::handle_serve(cli::ServeArgs::default(), cfg).await?;
            Ok(0)
        }
    }
}

fn check_config(cfg: &AppConfig) -> Result<(), CliError> {
    cfg.validate()?;

    let sum = cfg.matching.weights.sum();
    if (sum - 1.0).abs() > 1e-6 {
        tracing::warn!(sum, "matching weights do not sum to 1.0");
    }
    if cfg.ci.enabled && cfg.ci.webhook_secret.is_none() {
        tracing::warn!("ci.webhook_secret is not set; CI webhooks are accepted unverified");
    }
    Ok(())
}

fn exit_code_for_error(e: &CliError) -> i32 {
    // 0: success
    // 11: config error
    // 20: server / IO error
    // 50: internal/uncategorized
    match e {
        CliError::Config(_) => 11,
        CliError::Server(_) => 20,
        CliError::Io(_) => 20,
        CliError::Services(_) => 50,
        CliError::Anyhow(_) => 50,
    }
}

fn init_tracing(logging: &LoggingConfig) -> Result<(), String> {
    if !logging.enabled {
        return Ok(());
    }

    let filter = match std::env::var("RUST_LOG") {
        Ok(v) if !v.trim().is_empty() => EnvFilter::from_default_env(),
        _ => EnvFilter::try_new(logging.level.clone()).map_err(|e| e.to_string())?,
    };

    let mut maybe_writer = None;

    if logging.file {
        let dir = match logging
            .directory
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
        {
            Some(d) => std::path::PathBuf::from(d),
            None => std::env::temp_dir().join("taskbot"),
        };

        std::fs::create_dir_all(&dir).map_err(|e| format!("create log dir failed: {e}"))?;
        let appender = tracing_appender::rolling::daily(dir, "taskbot.log");
        let (non_blocking, guard) = tracing_appender::non_blocking(appender);
        let _ = LOG_GUARD.set(guard);
        maybe_writer = Some(non_blocking);
    }

    if !logging.console && maybe_writer.is_none() {
        return Err("logging disabled for both console and file".to_string());
    }

    let console_layer = logging.console.then(|| {
        tracing_subscriber::fmt::layer()
            .with_writer(std::io::stderr)
            .with_ansi(atty::is(atty::Stream::Stderr))
    });

    let file_layer = maybe_writer.map(|w| {
        tracing_subscriber::fmt::layer()
            .with_writer(w)
            .with_ansi(false)
    });

    tracing_subscriber::registry()
        .with(filter)
        .with(console_layer)
        .with(file_layer)
        .init();

    Ok(())
}
