use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub app: AppInfoConfig,

    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub feishu: FeishuConfig,

    #[serde(default)]
    pub bitable: BitableConfig,

    #[serde(default)]
    pub ci: CiConfig,

    #[serde(default)]
    pub llm: LlmConfig,

    #[serde(default)]
    pub matching: MatchingConfig,

    #[serde(default)]
    pub scheduler: SchedulerConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppInfoConfig {
    #[serde(default = "default_app_name")]
    pub name: String,
    #[serde(default = "default_app_version")]
    pub version: String,
}

fn default_app_name() -> String {
    "Feishu Task Bot".to_string()
}

fn default_app_version() -> String {
    env!("CARGO_PKG_VERSION").to_string()
}

impl Default for AppInfoConfig {
    fn default() -> Self {
        Self {
            name: default_app_name(),
            version: default_app_version(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_server_host")]
    pub host: String,
    #[serde(default = "default_server_port")]
    pub port: u16,
}

fn default_server_host() -> String {
    "0.0.0.0".to_string()
}

fn default_server_port() -> u16 {
    8000
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_server_host(),
            port: default_server_port(),
        }
    }
}

/// 飞书开放平台应用凭证
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeishuConfig {
    #[serde(default)]
    pub app_id: String,
    #[serde(default)]
    pub app_secret: String,
    /// Compared against the `token` field of challenge requests when set.
    #[serde(default)]
    pub verification_token: Option<String>,
    /// Mixed into the event signature; unset means empty string.
    #[serde(default)]
    pub encrypt_key: Option<String>,
    #[serde(default = "default_feishu_base_url")]
    pub base_url: String,
    #[serde(default = "default_feishu_timeout_ms")]
    pub timeout_ms: u64,
}

fn default_feishu_base_url() -> String {
    "https://open.feishu.cn/open-apis".to_string()
}

fn default_feishu_timeout_ms() -> u64 {
    10_000
}

impl Default for FeishuConfig {
    fn default() -> Self {
        Self {
            app_id: String::new(),
            app_secret: String::new(),
            verification_token: None,
            encrypt_key: None,
            base_url: default_feishu_base_url(),
            timeout_ms: default_feishu_timeout_ms(),
        }
    }
}

/// 多维表格（Bitable）配置
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BitableConfig {
    #[serde(default)]
    pub app_token: String,
    #[serde(default)]
    pub task_table_id: String,
    #[serde(default)]
    pub person_table_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CiConfig {
    #[serde(default)]
    pub enabled: bool,

    /// HMAC key for `X-Hub-Signature-256`. When unset every CI request is
    /// accepted without verification.
    #[serde(default)]
    pub webhook_secret: Option<String>,

    /// Suppress repeated notifications for the same (sha, status) pair.
    #[serde(default)]
    pub dedup_notifications: bool,

    #[serde(default = "default_dedup_capacity")]
    pub dedup_capacity: usize,
}

fn default_dedup_capacity() -> usize {
    1024
}

impl Default for CiConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            webhook_secret: None,
            dedup_notifications: false,
            dedup_capacity: default_dedup_capacity(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    #[serde(default = "default_llm_provider")]
    pub default_provider: String,

    #[serde(default)]
    pub providers: BTreeMap<String, LlmProviderConfig>,
}

fn default_llm_provider() -> String {
    "deepseek".to_string()
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            default_provider: default_llm_provider(),
            providers: BTreeMap::new(),
        }
    }
}

impl LlmConfig {
    pub fn default_provider_config(&self) -> Option<&LlmProviderConfig> {
        self.providers.get(&self.default_provider)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmProviderConfig {
    #[serde(default)]
    pub api_key: Option<String>,
    pub model: String,
    #[serde(default)]
    pub base_url: Option<String>,
    #[serde(default = "default_llm_timeout_ms")]
    pub timeout_ms: u64,
}

fn default_llm_timeout_ms() -> u64 {
    30_000
}

/// 人岗匹配权重，约定总和为 1.0（不强制）
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MatchWeights {
    #[serde(default = "default_weight_skill")]
    pub skill: f64,
    #[serde(default = "default_weight_availability")]
    pub availability: f64,
    #[serde(default = "default_weight_performance")]
    pub performance: f64,
    #[serde(default = "default_weight_recency")]
    pub recency: f64,
}

fn default_weight_skill() -> f64 {
    0.6
}

fn default_weight_availability() -> f64 {
    0.2
}

fn default_weight_performance() -> f64 {
    0.1
}

fn default_weight_recency() -> f64 {
    0.1
}

impl Default for MatchWeights {
    fn default() -> Self {
        Self {
            skill: default_weight_skill(),
            availability: default_weight_availability(),
            performance: default_weight_performance(),
            recency: default_weight_recency(),
        }
    }
}

impl MatchWeights {
    pub fn sum(&self) -> f64 {
        self.skill + self.availability + self.performance + self.recency
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchingConfig {
    #[serde(default)]
    pub weights: MatchWeights,
    #[serde(default = "default_top_n")]
    pub top_n: usize,
    /// Submissions scoring at or above this are marked Done.
    #[serde(default = "default_pass_score")]
    pub pass_score: f64,
}

fn default_top_n() -> usize {
    3
}

fn default_pass_score() -> f64 {
    80.0
}

impl Default for MatchingConfig {
    fn default() -> Self {
        Self {
            weights: MatchWeights::default(),
            top_n: default_top_n(),
            pass_score: default_pass_score(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    #[serde(default = "default_scheduler_enabled")]
    pub enabled: bool,
    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,
    #[serde(default = "default_stale_after_hours")]
    pub stale_after_hours: i64,
}

fn default_scheduler_enabled() -> bool {
    true
}

fn default_interval_secs() -> u64 {
    3_600
}

fn default_stale_after_hours() -> i64 {
    48
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            enabled: default_scheduler_enabled(),
            interval_secs: default_interval_secs(),
            stale_after_hours: default_stale_after_hours(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_logging_enabled")]
    pub enabled: bool,

    /// If true, log to stderr.
    #[serde(default = "default_logging_console")]
    pub console: bool,

    /// If true, log to a file under `directory` (or OS temp dir if unset).
    #[serde(default)]
    pub file: bool,

    /// EnvFilter string, e.g. "info" or "taskbot_core=debug".
    #[serde(default = "default_logging_level")]
    pub level: String,

    /// Optional directory for log files. If empty or unset, uses OS temp dir.
    #[serde(default)]
    pub directory: Option<String>,
}

fn default_logging_enabled() -> bool {
    true
}

fn default_logging_console() -> bool {
    true
}

fn default_logging_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            enabled: default_logging_enabled(),
            console: default_logging_console(),
            file: false,
            level: default_logging_level(),
            directory: None,
        }
    }
}
