//! Stable re-exports for consumers (`cli`, `plugins`).
//!
//! Prefer importing from `taskbot_core::api` instead of reaching into internal modules.

pub use crate::chat::{mention, ChatClient};
pub use crate::ci::{extract_commit, normalize, short_sha, CIState, CommitInfo};
pub use crate::config::{
    load_default, load_from_path, AppConfig, CiConfig, FeishuConfig, LlmProviderConfig,
    LoggingConfig, MatchWeights, MatchingConfig, SchedulerConfig, ServerConfig,
};
pub use crate::context::{Services, ServicesFactory};
pub use crate::error::{CliError, ConfigError};
pub use crate::matching::{
    candidate_card, evaluate_submission, match_candidates, parse_json, Candidate, ChatMessage,
    Evaluation, LlmProvider, ACTION_SELECT_CANDIDATE,
};
pub use crate::reminder::{find_stale, run_sweep, Reminder};
pub use crate::signature::{is_valid, verify, Provider, SignatureError, WebhookHeaders};
pub use crate::task::{
    apply_ci_result, CiOutcome, NewTask, Notification, NotificationLedger, Person, Task,
    TaskStatus, TaskStore, TaskUpdate,
};
