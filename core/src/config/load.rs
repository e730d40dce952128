use std::path::{Path, PathBuf};

use super::types::{AppConfig, LlmProviderConfig, SchedulerConfig};
use crate::error::ConfigError;

const KNOWN_LLM_PROVIDERS: [&str; 3] = ["deepseek", "gemini", "openai"];

/// Get the default taskbot data directory: ~/.taskbot
pub fn get_taskbot_data_dir() -> Result<PathBuf, ConfigError> {
    dirs::home_dir()
        .map(|home| home.join(".taskbot"))
        .ok_or_else(|| ConfigError::Invalid("Cannot determine home directory".into()))
}

pub fn load_default() -> Result<AppConfig, ConfigError> {
    // Priority 1: ~/.taskbot/config.toml (highest)
    let data_dir = get_taskbot_data_dir()?;
    let home_config = data_dir.join("config.toml");

    // Priority 2: ./config.toml (current directory)
    let local_config = Path::new("config.toml");

    let cfg = if home_config.exists() {
        read_config_file(&home_config)?
    } else if local_config.exists() {
        read_config_file(local_config)?
    } else {
        AppConfig::default()
    };

    finish(cfg, &data_dir)
}

pub fn load_from_path(path: &Path) -> Result<AppConfig, ConfigError> {
    let cfg = read_config_file(path)?;
    let data_dir = get_taskbot_data_dir()?;
    finish(cfg, &data_dir)
}

fn read_config_file(path: &Path) -> Result<AppConfig, ConfigError> {
    let s = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.display().to_string(),
        source,
    })?;
    toml::from_str::<AppConfig>(&s).map_err(|source| ConfigError::Parse {
        path: path.display().to_string(),
        source,
    })
}

fn finish(mut cfg: AppConfig, data_dir: &Path) -> Result<AppConfig, ConfigError> {
    // Log files land in the data directory unless configured otherwise
    let directory_unset = cfg
        .logging
        .directory
        .as_ref()
        .map(|s| s.trim().is_empty())
        .unwrap_or(true);
    if cfg.logging.file && directory_unset {
        cfg.logging.directory = Some(data_dir.join("logs").to_string_lossy().to_string());
    }

    // Environment variable overrides (Priority 0: highest)
    apply_env_overrides(&mut cfg, |key| std::env::var(key).ok());

    if (cfg.matching.weights.sum() - 1.0).abs() > 1e-6 {
        tracing::warn!(
            target: "taskbot.config",
            sum = cfg.matching.weights.sum(),
            "matching weights do not sum to 1.0"
        );
    }

    Ok(cfg)
}

/// Apply `TASKBOT_*` overrides. `lookup` abstracts the environment so tests
/// never touch process state.
pub fn apply_env_overrides<F>(cfg: &mut AppConfig, lookup: F)
where
    F: Fn(&str) -> Option<String>,
{
    let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

    if let Some(v) = get("TASKBOT_SERVER_HOST") {
        cfg.server.host = v;
    }
    if let Some(v) = get("TASKBOT_SERVER_PORT") {
        match v.trim().parse::<u16>() {
            Ok(port) => cfg.server.port = port,
            Err(_) => tracing::warn!(target: "taskbot.config", value = %v, "ignoring invalid TASKBOT_SERVER_PORT"),
        }
    }

    if let Some(v) = get("TASKBOT_FEISHU_APP_ID") {
        cfg.feishu.app_id = v;
    }
    if let Some(v) = get("TASKBOT_FEISHU_APP_SECRET") {
        cfg.feishu.app_secret = v;
    }
    if let Some(v) = get("TASKBOT_FEISHU_VERIFICATION_TOKEN") {
        cfg.feishu.verification_token = Some(v);
    }
    if let Some(v) = get("TASKBOT_FEISHU_ENCRYPT_KEY") {
        cfg.feishu.encrypt_key = Some(v);
    }
    if let Some(v) = get("TASKBOT_FEISHU_BASE_URL") {
        cfg.feishu.base_url = v;
    }

    if let Some(v) = get("TASKBOT_BITABLE_APP_TOKEN") {
        cfg.bitable.app_token = v;
    }
    if let Some(v) = get("TASKBOT_BITABLE_TASK_TABLE_ID") {
        cfg.bitable.task_table_id = v;
    }
    if let Some(v) = get("TASKBOT_BITABLE_PERSON_TABLE_ID") {
        cfg.bitable.person_table_id = v;
    }

    if let Some(v) = get("TASKBOT_CI_ENABLED") {
        cfg.ci.enabled = matches!(v.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes");
    }
    if let Some(v) = get("TASKBOT_CI_WEBHOOK_SECRET") {
        cfg.ci.webhook_secret = Some(v);
    }

    if let Some(v) = get("TASKBOT_LLM_DEFAULT_PROVIDER") {
        cfg.llm.default_provider = v;
    }
    for name in KNOWN_LLM_PROVIDERS {
        let upper = name.to_ascii_uppercase();
        let api_key = get(&format!("TASKBOT_LLM_{upper}_API_KEY"));
        let model = get(&format!("TASKBOT_LLM_{upper}_MODEL"));
        let base_url = get(&format!("TASKBOT_LLM_{upper}_BASE_URL"));

        match cfg.llm.providers.get_mut(name) {
            Some(provider) => {
                if api_key.is_some() {
                    provider.api_key = api_key;
                }
                if let Some(model) = model {
                    provider.model = model;
                }
                if base_url.is_some() {
                    provider.base_url = base_url;
                }
            }
            // A provider can be declared purely from the environment, but only
            // when a model is given too.
            None => {
                if let Some(model) = model {
                    cfg.llm.providers.insert(
                        name.to_string(),
                        LlmProviderConfig {
                            api_key,
                            model,
                            base_url,
                            timeout_ms: 30_000,
                        },
                    );
                }
            }
        }
    }

    if let Some(v) = get("TASKBOT_LOG_LEVEL") {
        cfg.logging.level = v;
    }
}

impl AppConfig {
    /// Fields required before the bot can talk to Feishu.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let required = [
            ("feishu.app_id", &self.feishu.app_id),
            ("feishu.app_secret", &self.feishu.app_secret),
            ("bitable.app_token", &self.bitable.app_token),
            ("bitable.task_table_id", &self.bitable.task_table_id),
            ("bitable.person_table_id", &self.bitable.person_table_id),
        ];
        let missing: Vec<&str> = required
            .iter()
            .filter(|(_, v)| v.trim().is_empty())
            .map(|(k, _)| *k)
            .collect();
        if !missing.is_empty() {
            return Err(ConfigError::Missing(missing.join(", ")));
        }
        self.scheduler.stale_threshold()?;
        Ok(())
    }
}

impl SchedulerConfig {
    /// `stale_after_hours` as a duration.
    pub fn stale_threshold(&self) -> Result<chrono::Duration, ConfigError> {
        stale_threshold_hours(self.stale_after_hours)
    }
}

/// Positive hour count that fits a `chrono::Duration`.
pub fn stale_threshold_hours(hours: i64) -> Result<chrono::Duration, ConfigError> {
    if hours <= 0 {
        return Err(ConfigError::Invalid(format!(
            "scheduler.stale_after_hours must be positive, got {hours}"
        )));
    }
    chrono::Duration::try_hours(hours).ok_or_else(|| {
        ConfigError::Invalid(format!("scheduler.stale_after_hours out of range: {hours}"))
    })
}
