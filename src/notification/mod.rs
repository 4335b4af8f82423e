mod queue;
pub mod scheduler;

use crate::clock;
use crate::config::{HABIT_CHANNEL_ID, MEDICINE_CHANNEL_ID};
use crate::error::{AppError, AppResult};
use crate::reminder::ReminderKind;
use crate::task_id::TaskRef;
use chrono::NaiveTime;
use serde::{Deserialize, Serialize};

pub use queue::FileNotifier;
pub use scheduler::{plan, NotificationScheduler};

/// Recurring trigger understood by the OS notification service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Trigger {
    Daily { hour: u32, minute: u32 },
    /// `weekday` uses 0 = Sunday, like `Frequency::SpecificDays`
    Weekly { weekday: u8, hour: u32, minute: u32 },
}

/// Data attached to a notification so a tap can be routed back to its reminder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationPayload {
    pub kind: ReminderKind,
    pub reminder_id: String,
    #[serde(with = "clock::hhmm")]
    pub time: NaiveTime,
}

impl NotificationPayload {
    pub fn task(&self) -> TaskRef {
        TaskRef::new(self.kind, &self.reminder_id, Some(self.time))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NotificationRequest {
    pub title: String,
    pub body: String,
    pub channel_id: String,
    pub trigger: Trigger,
    pub payload: NotificationPayload,
}

/// A request as reported back by the notifier's "list scheduled" query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScheduledNotification {
    pub id: String,
    pub request: NotificationRequest,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Importance {
    Default,
    High,
}

/// Android-style notification channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Channel {
    pub id: String,
    pub name: String,
    pub importance: Importance,
}

impl Channel {
    pub fn for_kind(kind: ReminderKind) -> Self {
        match kind {
            ReminderKind::Medicine => Channel {
                id: MEDICINE_CHANNEL_ID.to_string(),
                name: "Medicine reminders".to_string(),
                importance: Importance::High,
            },
            ReminderKind::Habit => Channel {
                id: HABIT_CHANNEL_ID.to_string(),
                name: "Habit reminders".to_string(),
                importance: Importance::Default,
            },
        }
    }
}

/// The OS local-notification service.
pub trait Notifier {
    /// Ask for permission to post notifications. `false` means denied.
    fn request_permission(&mut self) -> bool;

    fn ensure_channel(&mut self, channel: &Channel) -> AppResult<()>;

    /// Register a request, returning the service's identifier for it.
    fn schedule(&mut self, request: &NotificationRequest) -> AppResult<String>;

    fn cancel(&mut self, id: &str) -> AppResult<()>;

    fn list_scheduled(&self) -> AppResult<Vec<ScheduledNotification>>;
}

/// In-process notifier. Keeps everything in memory.
#[derive(Debug)]
pub struct MemoryNotifier {
    permission_granted: bool,
    next_id: u64,
    scheduled: Vec<ScheduledNotification>,
    channels: Vec<Channel>,
    fail_schedule: bool,
}

impl MemoryNotifier {
    pub fn new() -> Self {
        Self::with_permission(true)
    }

    pub fn with_permission(permission_granted: bool) -> Self {
        Self {
            permission_granted,
            next_id: 1,
            scheduled: Vec::new(),
            channels: Vec::new(),
            fail_schedule: false,
        }
    }

    /// Notifier whose every `schedule` call is refused.
    #[cfg(test)]
    pub(crate) fn failing() -> Self {
        Self {
            fail_schedule: true,
            ..Self::new()
        }
    }

    pub fn channels(&self) -> &[Channel] {
        &self.channels
    }
}

impl Default for MemoryNotifier {
    fn default() -> Self {
        Self::new()
    }
}

impl Notifier for MemoryNotifier {
    fn request_permission(&mut self) -> bool {
        self.permission_granted
    }

    fn ensure_channel(&mut self, channel: &Channel) -> AppResult<()> {
        if !self.channels.iter().any(|c| c.id == channel.id) {
            self.channels.push(channel.clone());
        }
        Ok(())
    }

    fn schedule(&mut self, request: &NotificationRequest) -> AppResult<String> {
        if self.fail_schedule {
            return Err(AppError::notification("Scheduling rejected"));
        }
        let id = format!("notif-{}", self.next_id);
        self.next_id += 1;
        self.scheduled.push(ScheduledNotification {
            id: id.clone(),
            request: request.clone(),
        });
        Ok(id)
    }

    fn cancel(&mut self, id: &str) -> AppResult<()> {
        self.scheduled.retain(|n| n.id != id);
        Ok(())
    }

    fn list_scheduled(&self) -> AppResult<Vec<ScheduledNotification>> {
        Ok(self.scheduled.clone())
    }
}
