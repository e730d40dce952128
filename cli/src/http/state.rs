//! HTTP服务器状态管理

use chrono::{DateTime, Local};
use std::collections::HashMap;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};
use taskbot_core::api::{AppConfig, NotificationLedger, Services};
use tokio::sync::broadcast;

/// 应用状态（在所有handlers间共享）
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub services: Arc<Services>,
    /// Present when `ci.dedup_notifications` is on.
    pub ledger: Option<Arc<NotificationLedger>>,
    pub stats: Arc<RwLock<ServerStats>>,
    pub shutdown_tx: broadcast::Sender<()>,
}

impl AppState {
    pub fn new(config: AppConfig, services: Services, shutdown_tx: broadcast::Sender<()>) -> Self {
        let ledger = config
            .ci
            .dedup_notifications
            .then(|| Arc::new(NotificationLedger::new(config.ci.dedup_capacity)));
        Self {
            config: Arc::new(config),
            services: Arc::new(services),
            ledger,
            stats: Arc::new(RwLock::new(ServerStats::new())),
            shutdown_tx,
        }
    }

    pub fn record_request(&self, endpoint: &str) {
        self.stats_mut().increment_request(endpoint);
    }

    pub fn record_error(&self) {
        self.stats_mut().increment_error();
    }

    pub fn stats(&self) -> RwLockReadGuard<'_, ServerStats> {
        self.stats.read().unwrap_or_else(|p| p.into_inner())
    }

    fn stats_mut(&self) -> RwLockWriteGuard<'_, ServerStats> {
        self.stats.write().unwrap_or_else(|p| p.into_inner())
    }
}

/// 服务器统计信息
pub struct ServerStats {
    pub requests_total: u64,
    pub requests_by_endpoint: HashMap<String, u64>,
    pub errors_total: u64,
    pub start_time: DateTime<Local>,
}

impl ServerStats {
    pub fn new() -> Self {
        Self {
            requests_total: 0,
            requests_by_endpoint: HashMap::new(),
            errors_total: 0,
            start_time: Local::now(),
        }
    }

    pub fn increment_request(&mut self, endpoint: &str) {
        self.requests_total += 1;
        *self
            .requests_by_endpoint
            .entry(endpoint.to_string())
            .or_insert(0) += 1;
    }

    pub fn increment_error(&mut self) {
        self.errors_total += 1;
    }

    pub fn uptime_seconds(&self) -> f64 {
        let now = Local::now();
        (now - self.start_time).num_milliseconds() as f64 / 1000.0
    }
}

impl Default for ServerStats {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::test_support::{services, TestDoubles};

    #[test]
    fn test_server_stats_new() {
        let stats = ServerStats::new();
        assert_eq!(stats.requests_total, 0);
        assert_eq!(stats.errors_total, 0);
        assert!(stats.uptime_seconds() < 1.0);
    }

    #[test]
    fn test_increment_request() {
        let mut stats = ServerStats::new();
        stats.increment_request("/webhook/ci");
        stats.increment_request("/webhook/ci");
        stats.increment_request("/health");

        assert_eq!(stats.requests_total, 3);
        assert_eq!(*stats.requests_by_endpoint.get("/webhook/ci").unwrap(), 2);
        assert_eq!(*stats.requests_by_endpoint.get("/health").unwrap(), 1);
    }

    #[test]
    fn test_ledger_follows_config() {
        let doubles = TestDoubles::default();
        let (tx, _) = broadcast::channel(1);
        let state = AppState::new(AppConfig::default(), services(&doubles), tx.clone());
        assert!(state.ledger.is_none());

        let mut cfg = AppConfig::default();
        cfg.ci.dedup_notifications = true;
        let state = AppState::new(cfg, services(&doubles), tx);
        assert!(state.ledger.is_some());

        state.record_request("/chat/event");
        state.record_error();
        assert_eq!(state.stats().requests_total, 1);
        assert_eq!(state.stats().errors_total, 1);
    }
}
