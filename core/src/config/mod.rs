mod load;
mod types;

pub use load::{
    apply_env_overrides, get_taskbot_data_dir, load_default, load_from_path, stale_threshold_hours,
};
pub use types::{
    AppConfig, AppInfoConfig, BitableConfig, CiConfig, FeishuConfig, LlmConfig,
    LlmProviderConfig, LoggingConfig, MatchWeights, MatchingConfig, SchedulerConfig, ServerConfig,
};
