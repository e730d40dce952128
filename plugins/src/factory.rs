use std::sync::Arc;

use anyhow::Result;

use taskbot_core::chat::ChatClient;
use taskbot_core::config::{AppConfig, LlmProviderConfig};
use taskbot_core::matching::LlmProvider;
use taskbot_core::task::TaskStore;

use crate::feishu::{BitableStore, FeishuChat, FeishuClient};
use crate::llm::{GeminiProvider, OpenAiCompatProvider, DEEPSEEK_BASE_URL, OPENAI_BASE_URL};

pub fn build_feishu(cfg: &AppConfig) -> Result<Arc<FeishuClient>> {
    Ok(Arc::new(FeishuClient::new(&cfg.feishu)?))
}

pub fn build_store(cfg: &AppConfig, client: Arc<FeishuClient>) -> Arc<dyn TaskStore> {
    Arc::new(BitableStore::new(client, &cfg.bitable))
}

pub fn build_chat(client: Arc<FeishuClient>) -> Arc<dyn ChatClient> {
    Arc::new(FeishuChat::new(client))
}

/// The configured default provider, or `None` when it cannot be used.
pub fn build_llm(cfg: &AppConfig) -> Result<Option<Arc<dyn LlmProvider>>> {
    let name = cfg.llm.default_provider.as_str();
    let Some(provider_cfg) = cfg.llm.default_provider_config() else {
        tracing::warn!(target: "taskbot.llm", provider = name, "provider not configured, using local matching only");
        return Ok(None);
    };
    build_llm_by_name(name, provider_cfg)
}

pub fn build_llm_by_name(
    name: &str,
    provider_cfg: &LlmProviderConfig,
) -> Result<Option<Arc<dyn LlmProvider>>> {
    if provider_cfg.api_key.as_deref().map_or(true, |k| k.trim().is_empty()) {
        tracing::warn!(target: "taskbot.llm", provider = name, "API key missing, provider skipped");
        return Ok(None);
    }

    let provider: Arc<dyn LlmProvider> = match name {
        "deepseek" => Arc::new(OpenAiCompatProvider::new(name, provider_cfg, DEEPSEEK_BASE_URL)?),
        "openai" => Arc::new(OpenAiCompatProvider::new(name, provider_cfg, OPENAI_BASE_URL)?),
        "gemini" => Arc::new(GeminiProvider::new(provider_cfg)?),
        other => {
            tracing::warn!(target: "taskbot.llm", provider = other, "unknown LLM provider");
            return Ok(None);
        }
    };
    tracing::info!(target: "taskbot.llm", provider = name, model = %provider_cfg.model, "LLM provider loaded");
    Ok(Some(provider))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn provider(key: Option<&str>) -> LlmProviderConfig {
        LlmProviderConfig {
            api_key: key.map(str::to_string),
            model: "m".into(),
            base_url: None,
            timeout_ms: 1_000,
        }
    }

    #[test]
    fn test_build_llm_by_name() {
        for name in ["deepseek", "openai", "gemini"] {
            let built = build_llm_by_name(name, &provider(Some("k"))).unwrap();
            assert_eq!(built.map(|p| p.name().to_string()), Some(name.to_string()));
        }
        assert!(build_llm_by_name("claude", &provider(Some("k"))).unwrap().is_none());
        assert!(build_llm_by_name("openai", &provider(None)).unwrap().is_none());
        assert!(build_llm_by_name("openai", &provider(Some("  "))).unwrap().is_none());
    }

    #[test]
    fn test_build_llm_missing_default() {
        let mut cfg = AppConfig::default();
        cfg.llm.default_provider = "nope".into();
        assert!(build_llm(&cfg).unwrap().is_none());
    }
}
