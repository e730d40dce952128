mod bitable;
mod chat;
mod client;

pub use bitable::{field_equals, BitableStore, Record};
pub use chat::FeishuChat;
pub use client::FeishuClient;
