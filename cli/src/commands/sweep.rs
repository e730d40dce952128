//! 单次提醒巡检
use chrono::Utc;
use taskbot_core::api::{run_sweep, AppConfig, CliError, ServicesFactory};
use taskbot_core::config::stale_threshold_hours;
use taskbot_plugins::services::PluginServicesFactory;

use super::cli::SweepArgs;

pub async fn handle_sweep(args: SweepArgs, cfg: &AppConfig) -> Result<usize, CliError> {
    let hours = args
        .stale_after_hours
        .unwrap_or(cfg.scheduler.stale_after_hours);
    let threshold = stale_threshold_hours(hours)?;
    let services = PluginServicesFactory.build_services(cfg).await?;
    let sent = run_sweep(
        services.store.as_ref(),
        services.chat.as_ref(),
        Utc::now(),
        threshold,
    )
    .await?;
    Ok(sent)
}
