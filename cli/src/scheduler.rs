//! 定时巡检：周期性提醒超过阈值未更新的任务

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use taskbot_core::api::{run_sweep, SchedulerConfig, Services};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};

/// Spawn the periodic sweep; `None` when disabled. The first sweep runs one
/// interval after start. Stops on the shutdown broadcast.
pub fn spawn_reminder_scheduler(
    services: Arc<Services>,
    cfg: &SchedulerConfig,
    mut shutdown_rx: broadcast::Receiver<()>,
) -> Option<JoinHandle<()>> {
    if !cfg.enabled {
        tracing::info!(target: "taskbot.sweep", "reminder scheduler disabled");
        return None;
    }

    let threshold = match cfg.stale_threshold() {
        Ok(threshold) => threshold,
        Err(e) => {
            tracing::error!(target: "taskbot.sweep", error = %e, "reminder scheduler not started");
            return None;
        }
    };
    let period = Duration::from_secs(cfg.interval_secs.max(1));
    tracing::info!(
        target: "taskbot.sweep",
        interval_secs = period.as_secs(),
        stale_after_hours = cfg.stale_after_hours,
        "reminder scheduler started"
    );

    Some(tokio::spawn(async move {
        let mut ticker = interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    if let Err(e) = run_sweep(
                        services.store.as_ref(),
                        services.chat.as_ref(),
                        Utc::now(),
                        threshold,
                    )
                    .await
                    {
                        tracing::error!(target: "taskbot.sweep", error = %e, "reminder sweep failed");
                    }
                }
                _ = shutdown_rx.recv() => {
                    tracing::info!(target: "taskbot.sweep", "reminder scheduler stopped");
                    break;
                }
            }
        }
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::test_support::{services, TestDoubles};
    use taskbot_core::api::{Task, TaskStatus};

    fn stale_task() -> Task {
        Task {
            record_id: "rec_1".into(),
            title: "Old".into(),
            status: Some(TaskStatus::InProgress),
            assignee_id: Some("ou_dev".into()),
            chat_id: Some("oc_child".into()),
            last_modified: Some(0),
            ..Task::default()
        }
    }

    #[tokio::test]
    async fn test_disabled_scheduler_not_spawned() {
        let doubles = TestDoubles::default();
        let (tx, _) = broadcast::channel(1);
        let cfg = SchedulerConfig {
            enabled: false,
            ..SchedulerConfig::default()
        };
        assert!(spawn_reminder_scheduler(Arc::new(services(&doubles)), &cfg, tx.subscribe()).is_none());
    }

    #[tokio::test]
    async fn test_invalid_threshold_not_spawned() {
        let doubles = TestDoubles::default();
        let (tx, _) = broadcast::channel(1);
        for hours in [-1, i64::MAX] {
            let cfg = SchedulerConfig {
                enabled: true,
                interval_secs: 60,
                stale_after_hours: hours,
            };
            assert!(
                spawn_reminder_scheduler(Arc::new(services(&doubles)), &cfg, tx.subscribe())
                    .is_none()
            );
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_sweeps_on_interval_and_stops() {
        let doubles = TestDoubles::with_tasks(vec![stale_task()]);
        let (tx, _) = broadcast::channel(1);
        let cfg = SchedulerConfig {
            enabled: true,
            interval_secs: 60,
            stale_after_hours: 48,
        };
        let handle =
            spawn_reminder_scheduler(Arc::new(services(&doubles)), &cfg, tx.subscribe()).unwrap();

        tokio::time::sleep(Duration::from_secs(30)).await;
        assert!(doubles.chat.texts().is_empty());

        tokio::time::sleep(Duration::from_secs(31)).await;
        assert_eq!(doubles.chat.texts().len(), 1);
        assert_eq!(doubles.chat.texts()[0].0, "oc_child");

        tx.send(()).unwrap();
        handle.await.unwrap();
    }
}
