//! HTTP服务器生命周期管理

use super::{
    middleware::{create_middleware_stack, request_logger},
    routes::create_router,
    AppState,
};
use crate::commands::cli::ServeArgs;
use crate::scheduler::spawn_reminder_scheduler;
use axum::middleware;
use std::net::SocketAddr;
use taskbot_core::api::{AppConfig, CliError, ServerConfig, ServicesFactory};
use taskbot_plugins::services::PluginServicesFactory;
use tokio::signal;
use tokio::sync::broadcast;
use tracing::{info, warn};

/// 处理 serve 命令
pub async fn handle_serve(args: ServeArgs, mut cfg: AppConfig) -> Result<(), CliError> {
    // CLI 参数优先于配置文件
    if let Some(host) = args.host {
        cfg.server.host = host;
    }
    if let Some(port) = args.port {
        cfg.server.port = port;
    }
    if args.no_scheduler {
        cfg.scheduler.enabled = false;
    }

    let services = PluginServicesFactory.build_services(&cfg).await?;
    info!(
        store = services.store.name(),
        chat = services.chat.name(),
        llm = services.llm().map(|l| l.name()).unwrap_or("none"),
        "services ready"
    );

    // 创建 shutdown channel
    let (shutdown_tx, _) = broadcast::channel(1);
    let state = AppState::new(cfg, services, shutdown_tx);

    let scheduler = spawn_reminder_scheduler(
        state.services.clone(),
        &state.config.scheduler,
        state.shutdown_tx.subscribe(),
    );

    let server_cfg = state.config.server.clone();
    let result = start_server(&server_cfg, state.clone()).await;

    // 通知后台任务退出
    let _ = state.shutdown_tx.send(());
    if let Some(handle) = scheduler {
        if let Err(e) = handle.await {
            warn!("reminder scheduler ended abnormally: {}", e);
        }
    }

    result
}

/// 启动HTTP服务器，直到收到 Ctrl+C / SIGTERM / 内部关闭信号
pub async fn start_server(config: &ServerConfig, state: AppState) -> Result<(), CliError> {
    let router = create_router(state.clone());

    // 添加中间件
    let app = router
        .layer(middleware::from_fn(request_logger))
        .layer(create_middleware_stack());

    let addr: SocketAddr = format!("{}:{}", config.host, config.port)
        .parse()
        .map_err(|e| CliError::Server(format!("invalid listen address: {e}")))?;

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("HTTP server listening on http://{}", addr);

    let mut shutdown_rx = state.shutdown_tx.subscribe();

    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            tokio::select! {
                _ = signal::ctrl_c() => {
                    info!("Received Ctrl+C signal");
                }
                _ = shutdown_rx.recv() => {
                    info!("Received internal shutdown signal");
                }
                _ = wait_for_sigterm() => {
                    info!("Received SIGTERM signal");
                }
            }

            info!("Starting graceful shutdown...");
        })
        .await?;

    info!("Server shutdown complete");
    Ok(())
}

/// 等待 SIGTERM 信号（Unix系统）
#[cfg(unix)]
async fn wait_for_sigterm() {
    use tokio::signal::unix::{signal, SignalKind};

    match signal(SignalKind::terminate()) {
        Ok(mut sigterm) => {
            sigterm.recv().await;
        }
        Err(e) => {
            warn!("Failed to install SIGTERM handler: {}", e);
            std::future::pending::<()>().await
        }
    }
}

/// Windows 系统不支持 SIGTERM，使用空操作
#[cfg(not(unix))]
async fn wait_for_sigterm() {
    std::future::pending::<()>().await
}
