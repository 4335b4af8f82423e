use super::{Channel, NotificationPayload, NotificationRequest, Notifier, Trigger};
use crate::error::AppResult;
use crate::reminder::{Frequency, Reminder, ReminderKind};
use chrono::{NaiveDate, NaiveTime, Timelike};
use log::{debug, info, warn};

/// Translate a reminder's frequency into notification requests.
///
/// `daily` and `interval` give one daily trigger per time, `specific_days`
/// one weekly trigger per (day, time) pair, `as_needed` nothing.
pub fn plan(reminder: &Reminder) -> Vec<NotificationRequest> {
    match &reminder.frequency {
        Frequency::Daily { times } => times
            .iter()
            .map(|t| request_for(reminder, *t, daily_trigger(t)))
            .collect(),
        Frequency::Interval { .. } => {
            // Interval reminders fire at the same offsets every day
            let any_day = reminder.duration.start_date;
            reminder
                .frequency
                .times_on(any_day)
                .into_iter()
                .map(|t| request_for(reminder, t, daily_trigger(&t)))
                .collect()
        }
        Frequency::SpecificDays { days, times } => days
            .iter()
            .flat_map(move |day| {
                times.iter().map(move |t| {
                    request_for(
                        reminder,
                        *t,
                        Trigger::Weekly {
                            weekday: *day,
                            hour: t.hour(),
                            minute: t.minute(),
                        },
                    )
                })
            })
            .collect(),
        Frequency::AsNeeded => Vec::new(),
    }
}

fn daily_trigger(time: &NaiveTime) -> Trigger {
    Trigger::Daily {
        hour: time.hour(),
        minute: time.minute(),
    }
}

fn request_for(reminder: &Reminder, time: NaiveTime, trigger: Trigger) -> NotificationRequest {
    let (title, body) = match reminder.kind {
        ReminderKind::Medicine => {
            let body = reminder
                .dosage
                .as_ref()
                .map(|d| format!("Take {} {}", d.amount, d.unit))
                .unwrap_or_else(|| "Time for your medicine".to_string());
            (format!("Time to take {}", reminder.name), body)
        }
        ReminderKind::Habit => {
            let body = reminder
                .goal
                .as_ref()
                .map(|g| format!("Goal: {} {}", g.target, g.unit).trim_end().to_string())
                .unwrap_or_default();
            (format!("Habit reminder: {}", reminder.name), body)
        }
    };

    NotificationRequest {
        title,
        body,
        channel_id: Channel::for_kind(reminder.kind).id,
        trigger,
        payload: NotificationPayload {
            kind: reminder.kind,
            reminder_id: reminder.id.clone(),
            time,
        },
    }
}

/// Registers and cancels reminder notifications with a [`Notifier`].
///
/// All operations are best effort: failures are logged and the caller keeps
/// going, since a missing notification never affects stored data.
pub struct NotificationScheduler<N: Notifier> {
    notifier: N,
    enabled: bool,
}

impl<N: Notifier> NotificationScheduler<N> {
    pub fn new(notifier: N) -> Self {
        Self {
            notifier,
            enabled: true,
        }
    }

    pub fn notifier(&self) -> &N {
        &self.notifier
    }

    pub fn notifier_mut(&mut self) -> &mut N {
        &mut self.notifier
    }

    /// Turn registration on or off; cancelling still works while disabled.
    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    pub fn init_channels(&mut self) {
        for kind in [ReminderKind::Medicine, ReminderKind::Habit] {
            if let Err(e) = self.notifier.ensure_channel(&Channel::for_kind(kind)) {
                warn!("Failed to register {} channel: {}", kind, e);
            }
        }
    }

    /// Entries currently queued for a reminder.
    pub fn scheduled_for(&self, reminder_id: &str) -> AppResult<Vec<String>> {
        Ok(self
            .notifier
            .list_scheduled()?
            .into_iter()
            .filter(|n| n.request.payload.reminder_id == reminder_id)
            .map(|n| n.id)
            .collect())
    }

    /// Cancel every queued entry for a reminder, returning how many were removed.
    pub fn cancel_reminder(&mut self, reminder_id: &str) -> usize {
        let ids = match self.scheduled_for(reminder_id) {
            Ok(ids) => ids,
            Err(e) => {
                warn!("Could not list notifications for {}: {}", reminder_id, e);
                return 0;
            }
        };

        let mut cancelled = 0;
        for id in ids {
            match self.notifier.cancel(&id) {
                Ok(()) => cancelled += 1,
                Err(e) => warn!("Failed to cancel notification {}: {}", id, e),
            }
        }
        cancelled
    }

    /// Replace a reminder's queued notifications with its current plan.
    ///
    /// Returns the number of registrations made. Inactive or expired reminders
    /// end up with none.
    pub fn sync_reminder(&mut self, reminder: &Reminder, today: NaiveDate) -> usize {
        let cancelled = self.cancel_reminder(&reminder.id);
        if cancelled > 0 {
            debug!("Cancelled {} notifications for {}", cancelled, reminder.id);
        }

        if !self.enabled || !reminder.is_active || reminder.duration.has_ended(today) {
            return 0;
        }

        let requests = plan(reminder);
        if requests.is_empty() {
            return 0;
        }

        if !self.notifier.request_permission() {
            warn!(
                "Notification permission denied, {} saved without reminders",
                reminder.id
            );
            return 0;
        }

        let mut scheduled = 0;
        for request in &requests {
            match self.notifier.schedule(request) {
                Ok(_) => scheduled += 1,
                Err(e) => warn!(
                    "Failed to schedule {} for {}: {}",
                    request.payload.task(),
                    reminder.name,
                    e
                ),
            }
        }

        info!(
            "Scheduled {}/{} notifications for {} {}",
            scheduled,
            requests.len(),
            reminder.kind,
            reminder.id
        );
        scheduled
    }

    /// Rebuild the whole queue from the given reminders.
    pub fn resync_all(&mut self, reminders: &[Reminder], today: NaiveDate) -> usize {
        let known: Vec<&str> = reminders.iter().map(|r| r.id.as_str()).collect();

        // Drop entries for reminders that no longer exist
        if let Ok(queued) = self.notifier.list_scheduled() {
            for entry in queued {
                if !known.contains(&entry.request.payload.reminder_id.as_str()) {
                    if let Err(e) = self.notifier.cancel(&entry.id) {
                        warn!("Failed to cancel orphaned notification {}: {}", entry.id, e);
                    }
                }
            }
        }

        reminders
            .iter()
            .map(|r| self.sync_reminder(r, today))
            .sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notification::MemoryNotifier;
    use crate::reminder::tests::{d, daily_habit, daily_medicine, t};
    use crate::reminder::ReminderDuration;

    #[test]
    fn test_daily_plans_one_trigger_per_time() {
        for times in [vec!["08:00"], vec!["08:00", "14:00", "20:00"]] {
            let r = daily_medicine("m1", &times);
            let requests = plan(&r);
            assert_eq!(requests.len(), times.len());
            assert!(requests
                .iter()
                .all(|req| matches!(req.trigger, Trigger::Daily { .. })));
        }
    }

    #[test]
    fn test_specific_days_plans_day_time_pairs() {
        let mut r = daily_medicine("m1", &[]);
        r.frequency = Frequency::SpecificDays {
            days: vec![1, 3, 5],
            times: vec![t("09:00"), t("21:00")],
        };
        let requests = plan(&r);
        assert_eq!(requests.len(), 6);
        assert!(requests.contains(&request_for(
            &r,
            t("21:00"),
            Trigger::Weekly {
                weekday: 3,
                hour: 21,
                minute: 0
            }
        )));
    }

    #[test]
    fn test_interval_plans_offsets_within_day() {
        let mut r = daily_medicine("m1", &[]);
        r.frequency = Frequency::Interval {
            every_hours: 6,
            start: t("06:00"),
        };
        let triggers: Vec<Trigger> = plan(&r).into_iter().map(|req| req.trigger).collect();
        assert_eq!(
            triggers,
            vec![
                Trigger::Daily { hour: 6, minute: 0 },
                Trigger::Daily { hour: 12, minute: 0 },
                Trigger::Daily { hour: 18, minute: 0 },
            ]
        );
    }

    #[test]
    fn test_as_needed_plans_nothing() {
        let mut r = daily_medicine("m1", &[]);
        r.frequency = Frequency::AsNeeded;
        assert!(plan(&r).is_empty());
    }

    #[test]
    fn test_payload_identifies_reminder() {
        let r = daily_habit("h1", 8.0);
        let requests = plan(&r);
        assert_eq!(requests[0].payload.task().to_string(), "habit-h1-08:00");
        assert_eq!(requests[0].channel_id, "habit-reminders");
        assert_eq!(requests[0].body, "Goal: 8 glasses");
    }

    #[test]
    fn test_sync_replaces_previous_registrations() {
        let mut scheduler = NotificationScheduler::new(MemoryNotifier::new());
        let mut r = daily_medicine("m1", &["08:00", "20:00"]);
        assert_eq!(scheduler.sync_reminder(&r, d("2024-02-01")), 2);

        r.frequency = Frequency::Daily {
            times: vec![t("12:00")],
        };
        assert_eq!(scheduler.sync_reminder(&r, d("2024-02-01")), 1);
        assert_eq!(scheduler.scheduled_for("m1").unwrap().len(), 1);
    }

    #[test]
    fn test_inactive_or_expired_reminder_is_cancelled() {
        let mut scheduler = NotificationScheduler::new(MemoryNotifier::new());
        let mut r = daily_medicine("m1", &["08:00"]);
        scheduler.sync_reminder(&r, d("2024-02-01"));

        r.is_active = false;
        assert_eq!(scheduler.sync_reminder(&r, d("2024-02-01")), 0);
        assert!(scheduler.scheduled_for("m1").unwrap().is_empty());

        r.is_active = true;
        r.duration = ReminderDuration::days(d("2024-01-01"), 10);
        assert_eq!(scheduler.sync_reminder(&r, d("2024-02-01")), 0);
    }

    #[test]
    fn test_permission_denied_is_not_fatal() {
        let mut scheduler = NotificationScheduler::new(MemoryNotifier::with_permission(false));
        let r = daily_medicine("m1", &["08:00"]);
        assert_eq!(scheduler.sync_reminder(&r, d("2024-02-01")), 0);
    }

    #[test]
    fn test_schedule_failures_are_swallowed() {
        let mut scheduler = NotificationScheduler::new(MemoryNotifier::failing());
        let r = daily_medicine("m1", &["08:00", "09:00"]);
        assert_eq!(scheduler.sync_reminder(&r, d("2024-02-01")), 0);
    }

    #[test]
    fn test_resync_drops_orphans() {
        let mut scheduler = NotificationScheduler::new(MemoryNotifier::new());
        let a = daily_medicine("a", &["08:00"]);
        let b = daily_medicine("b", &["09:00"]);
        scheduler.sync_reminder(&a, d("2024-02-01"));
        scheduler.sync_reminder(&b, d("2024-02-01"));

        let total = scheduler.resync_all(&[a], d("2024-02-01"));
        assert_eq!(total, 1);
        assert!(scheduler.scheduled_for("b").unwrap().is_empty());
        assert_eq!(scheduler.notifier().list_scheduled().unwrap().len(), 1);
    }

    #[test]
    fn test_init_channels_registers_both_kinds() {
        let mut scheduler = NotificationScheduler::new(MemoryNotifier::new());
        scheduler.init_channels();
        assert_eq!(scheduler.notifier().channels().len(), 2);
    }
}
