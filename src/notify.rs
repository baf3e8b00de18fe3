//! Task reminders.
//!
//! A background poller ticks once a minute and hands every task starting in
//! that minute to a [`Notifier`]. Delivery failures are logged and never
//! touch task state; the poller only uses the store's read path.

use async_trait::async_trait;
use chrono::{Duration, Timelike, Utc};
use serde_json::json;
use std::sync::Arc;
use tokio::task::JoinHandle;

use crate::store::TaskStore;
use crate::task::TaskRecord;

/// A reminder sink.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, task: &TaskRecord) -> anyhow::Result<()>;
}

/// POSTs reminders to a configured webhook.
pub struct WebhookNotifier {
    client: reqwest::Client,
    url: String,
}

impl WebhookNotifier {
    pub fn new(url: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            url,
        }
    }
}

#[async_trait]
impl Notifier for WebhookNotifier {
    async fn notify(&self, task: &TaskRecord) -> anyhow::Result<()> {
        let message = format!(
            "**REMINDER TASK**\nTitle: {}\nStart: {}\nEnd: {}",
            task.title, task.start_time, task.end_time
        );
        let body = json!({
            "user_id": task.user_id,
            "task_id": task.id,
            "title": task.title,
            "start_time": task.start_time,
            "end_time": task.end_time,
            "message": message,
        });
        let response = self.client.post(&self.url).json(&body).send().await?;
        response.error_for_status()?;
        Ok(())
    }
}

/// Log-only sink, used when no webhook is configured.
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn notify(&self, task: &TaskRecord) -> anyhow::Result<()> {
        tracing::info!(
            task = %task.title,
            user = %task.user_id,
            start = %task.start_time,
            "task reminder"
        );
        Ok(())
    }
}

/// Spawn the minute-cadence reminder poller.
pub fn spawn_due_task_poller(
    store: Arc<dyn TaskStore>,
    notifier: Arc<dyn Notifier>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(std::time::Duration::from_secs(60));
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        loop {
            ticker.tick().await;
            let now = Utc::now().naive_utc();
            // Truncate to the minute that is starting.
            let Some(minute_start) = now.with_second(0).and_then(|t| t.with_nanosecond(0)) else {
                continue;
            };
            let minute_end = minute_start + Duration::seconds(60);

            let due = match store.list_starting_between(minute_start, minute_end).await {
                Ok(due) => due,
                Err(e) => {
                    tracing::warn!("reminder scan failed: {}", e);
                    continue;
                }
            };
            if due.is_empty() {
                continue;
            }
            tracing::debug!(count = due.len(), "tasks starting this minute");
            for task in &due {
                if let Err(e) = notifier.notify(task).await {
                    tracing::warn!(task = %task.title, "failed to deliver reminder: {}", e);
                }
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{MemoryTaskStore, NewTask};
    use crate::task::testutil::dt;
    use crate::task::DayOfWeek;
    use std::sync::Mutex;
    use uuid::Uuid;

    struct RecordingNotifier {
        seen: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl Notifier for RecordingNotifier {
        async fn notify(&self, task: &TaskRecord) -> anyhow::Result<()> {
            self.seen.lock().unwrap().push(task.title.clone());
            Ok(())
        }
    }

    #[tokio::test]
    async fn due_window_scan_feeds_the_notifier() {
        let store = MemoryTaskStore::new();
        let user = Uuid::new_v4();
        store
            .create_task(
                user,
                &NewTask {
                    title: "due".to_string(),
                    desc: None,
                    day_of_week: DayOfWeek::Wednesday,
                    start_time: dt(2025, 3, 12, 9, 0),
                    end_time: dt(2025, 3, 12, 10, 0),
                    all_day: false,
                    is_recurring: false,
                    is_fixed: false,
                    is_completed: None,
                    deadline: None,
                },
            )
            .await
            .unwrap();

        let notifier = RecordingNotifier {
            seen: Mutex::new(Vec::new()),
        };

        // Drive one poller iteration by hand against a fixed window.
        let due = store
            .list_starting_between(dt(2025, 3, 12, 9, 0), dt(2025, 3, 12, 9, 1))
            .await
            .unwrap();
        for task in &due {
            notifier.notify(task).await.unwrap();
        }
        assert_eq!(*notifier.seen.lock().unwrap(), vec!["due".to_string()]);
    }
}
