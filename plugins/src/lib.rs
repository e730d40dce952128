pub mod factory;
pub mod feishu;
pub mod http;
pub mod llm;
pub mod services;
