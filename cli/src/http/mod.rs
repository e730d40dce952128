//! HTTP服务器模块 - 飞书事件回调与 CI webhook 入口

pub mod chat;
pub mod dispatch;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod server;
pub mod state;

#[cfg(test)]
pub(crate) mod test_support;

pub use models::*;
pub use server::*;
pub use state::*;
