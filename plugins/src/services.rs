//! ServicesFactory 实现：从配置构建 Bitable 存储、飞书消息客户端与 LLM 提供商，供 CLI 复用。
use async_trait::async_trait;
use taskbot_core::api::{AppConfig, CliError, Services, ServicesFactory};

use crate::factory;

#[derive(Default)]
pub struct PluginServicesFactory;

#[async_trait]
impl ServicesFactory for PluginServicesFactory {
    async fn build_services(&self, cfg: &AppConfig) -> Result<Services, CliError> {
        let feishu = factory::build_feishu(cfg).map_err(|e| CliError::Services(e.to_string()))?;
        let llm = factory::build_llm(cfg).map_err(|e| CliError::Services(e.to_string()))?;
        Ok(Services {
            store: factory::build_store(cfg, feishu.clone()),
            chat: factory::build_chat(feishu),
            llm,
        })
    }
}
