pub mod api;
pub mod chat;
pub mod ci;
pub mod config;
pub mod context;
pub mod error;
pub mod matching;
pub mod reminder;
pub mod signature;
pub mod task;

#[cfg(any(test, feature = "testing"))]
pub mod testing;
