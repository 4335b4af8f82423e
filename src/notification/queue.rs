use super::{Channel, NotificationRequest, Notifier, ScheduledNotification};
use crate::config::NOTIFICATION_QUEUE_FILE;
use crate::error::AppResult;
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Default, Serialize, Deserialize)]
struct QueueFile {
    next_id: u64,
    #[serde(default)]
    channels: Vec<Channel>,
    #[serde(default)]
    scheduled: Vec<ScheduledNotification>,
}

/// Notifier that persists its queue to a JSON file in the data directory.
///
/// Stands in for the platform notification service when running headless:
/// nothing is displayed, but the queue survives restarts so `list_scheduled`
/// reports the same registrations a real service would.
pub struct FileNotifier {
    path: PathBuf,
    queue: QueueFile,
}

impl FileNotifier {
    pub fn open(app_data_path: &Path) -> AppResult<Self> {
        let path = app_data_path.join(NOTIFICATION_QUEUE_FILE);
        let queue = if path.exists() {
            let content = fs::read_to_string(&path)?;
            match serde_json::from_str::<QueueFile>(&content) {
                Ok(queue) => queue,
                Err(e) => {
                    warn!("Notification queue unreadable ({}), starting empty", e);
                    QueueFile::default()
                }
            }
        } else {
            QueueFile::default()
        };
        debug!(
            "Loaded notification queue with {} entries",
            queue.scheduled.len()
        );
        Ok(Self { path, queue })
    }

    fn persist(&self) -> AppResult<()> {
        let content = serde_json::to_string_pretty(&self.queue)?;
        fs::write(&self.path, content)?;
        Ok(())
    }
}

impl Notifier for FileNotifier {
    fn request_permission(&mut self) -> bool {
        true
    }

    fn ensure_channel(&mut self, channel: &Channel) -> AppResult<()> {
        if self.queue.channels.iter().any(|c| c.id == channel.id) {
            return Ok(());
        }
        self.queue.channels.push(channel.clone());
        self.persist()
    }

    fn schedule(&mut self, request: &NotificationRequest) -> AppResult<String> {
        self.queue.next_id += 1;
        let id = format!("queued-{}", self.queue.next_id);
        self.queue.scheduled.push(ScheduledNotification {
            id: id.clone(),
            request: request.clone(),
        });
        self.persist()?;
        info!("Queued notification {}: {}", id, request.title);
        Ok(id)
    }

    fn cancel(&mut self, id: &str) -> AppResult<()> {
        self.queue.scheduled.retain(|n| n.id != id);
        self.persist()
    }

    fn list_scheduled(&self) -> AppResult<Vec<ScheduledNotification>> {
        Ok(self.queue.scheduled.clone())
    }
}
