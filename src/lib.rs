pub mod clock;
pub mod completion;
pub mod config;
pub mod error;
pub mod notification;
pub mod progress;
pub mod reminder;
pub mod storage;
pub mod task_id;

use chrono::{Duration, Local, NaiveDate, NaiveDateTime, Utc};
use completion::{CompletionRecord, CompletionStatus, DailyTask};
use config::{HISTORY_DAYS, MAX_MISSED_GRACE_MINUTES};
use error::{ActionResult, AppError, AppResult};
use log::{info, warn};
use notification::{FileNotifier, NotificationScheduler, Notifier};
use progress::HabitStats;
use reminder::{Reminder, ReminderKind};
use serde::Serialize;
use std::collections::HashMap;
use storage::{load_settings, RemoteStore, Settings, Storage};
use task_id::TaskRef;

/// Aggregates shown on the home screen for one day
#[derive(Debug, Clone, Serialize)]
pub struct DaySummary {
    pub date: NaiveDate,
    pub habit_completion: f64,
    pub medicine_adherence: f64,
    pub history: Vec<(NaiveDate, f64)>,
    pub streaks: HashMap<String, HabitStats>,
}

/// Service object wiring storage, notifications and settings together.
///
/// Built once at startup and handed to whatever drives the UI.
pub struct AppState<N: Notifier> {
    storage: Storage,
    scheduler: NotificationScheduler<N>,
    settings: Settings,
}

impl<N: Notifier> AppState<N> {
    pub fn new(storage: Storage, notifier: N, settings: Settings) -> Self {
        let mut scheduler = NotificationScheduler::new(notifier);
        scheduler.set_enabled(settings.notifications_enabled);
        scheduler.init_channels();
        Self {
            storage,
            scheduler,
            settings,
        }
    }

    pub fn storage(&self) -> &Storage {
        &self.storage
    }

    pub fn scheduler(&self) -> &NotificationScheduler<N> {
        &self.scheduler
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    fn reminder(&self, id: &str) -> AppResult<&Reminder> {
        self.storage
            .get_reminder(id)
            .ok_or_else(|| AppError::not_found(format!("Reminder {}", id)))
    }

    fn reschedule(&mut self, id: &str, today: NaiveDate) {
        if let Some(reminder) = self.storage.get_reminder(id) {
            self.scheduler.sync_reminder(reminder, today);
        }
    }

    // ============ Reminders ============

    /// Save a new reminder and register its notifications.
    ///
    /// Notification failures never undo the save. Notifications also follow
    /// a write that reached local storage but failed to reach the remote.
    pub fn add_reminder(&mut self, mut reminder: Reminder, today: NaiveDate) -> AppResult<String> {
        if reminder.id.is_empty() {
            reminder.id = uuid::Uuid::new_v4().to_string();
        }
        let id = reminder.id.clone();
        let result = self.storage.add_reminder(reminder);
        if kept_locally(&result) {
            self.reschedule(&id, today);
        }
        result
    }

    pub fn update_reminder(&mut self, reminder: Reminder, today: NaiveDate) -> AppResult<()> {
        let id = reminder.id.clone();
        let result = self.storage.update_reminder(reminder);
        if kept_locally(&result) {
            self.reschedule(&id, today);
        }
        result
    }

    pub fn set_reminder_active(&mut self, id: &str, active: bool, today: NaiveDate) -> AppResult<()> {
        let result = self.storage.set_active(id, active);
        if kept_locally(&result) {
            self.reschedule(id, today);
        }
        result.map(|_| ())
    }

    pub fn delete_reminder(&mut self, id: &str) -> AppResult<()> {
        let result = self.storage.delete_reminder(id);
        if kept_locally(&result) {
            self.scheduler.cancel_reminder(id);
        }
        result
    }

    // ============ Completion ============

    fn record(
        &mut self,
        task: &TaskRef,
        date: NaiveDate,
        status: CompletionStatus,
        value: Option<f64>,
    ) -> AppResult<CompletionRecord> {
        let reminder = self.reminder(&task.reminder_id)?;
        if reminder.kind != task.kind {
            return Err(AppError::validation(format!(
                "Task {} does not match a {} reminder",
                task, reminder.kind
            )));
        }

        let record = completion::record_instance(
            self.storage.completions(),
            reminder,
            date,
            task.time,
            status,
            value,
            Utc::now(),
        )?;
        let result = self.storage.append_completion(record.clone());
        if !kept_locally(&result) {
            return result.map(|_| record);
        }
        info!("Recorded {} as {:?}", task, status);

        if task.kind == ReminderKind::Habit {
            if let Err(e) = self.refresh_habit_stats(date) {
                warn!("Failed to refresh habit stats: {}", e);
            }
        }
        result.map(|_| record)
    }

    /// Mark an occurrence as taken. A second attempt is rejected.
    pub fn complete_task(&mut self, task: &TaskRef, date: NaiveDate) -> AppResult<CompletionRecord> {
        self.record(task, date, CompletionStatus::Taken, None)
    }

    /// Same as [`complete_task`](Self::complete_task) for a composite id string.
    pub fn complete_task_id(&mut self, raw: &str, date: NaiveDate) -> AppResult<CompletionRecord> {
        let (_, task) = completion::resolve_task_id(self.storage.reminders(), raw)?;
        self.complete_task(&task, date)
    }

    pub fn skip_task(&mut self, task: &TaskRef, date: NaiveDate) -> AppResult<CompletionRecord> {
        self.record(task, date, CompletionStatus::Skipped, None)
    }

    pub fn skip_task_id(&mut self, raw: &str, date: NaiveDate) -> AppResult<CompletionRecord> {
        let (_, task) = completion::resolve_task_id(self.storage.reminders(), raw)?;
        self.skip_task(&task, date)
    }

    /// Log an amount toward a habit's daily target.
    pub fn record_habit_value(
        &mut self,
        habit_id: &str,
        value: f64,
        date: NaiveDate,
    ) -> AppResult<CompletionRecord> {
        let habit = self.reminder(habit_id)?;
        if !habit.is_habit() {
            return Err(AppError::validation(format!("{} is not a habit", habit.name)));
        }
        let task = TaskRef::new(ReminderKind::Habit, habit_id, None);
        self.record(&task, date, CompletionStatus::Taken, Some(value))
    }

    /// Record occurrences from yesterday and today that passed the grace
    /// period without any action as missed. Returns how many were added.
    pub fn mark_missed(&mut self, now: NaiveDateTime) -> AppResult<usize> {
        let grace = self
            .settings
            .missed_grace_minutes
            .clamp(0, MAX_MISSED_GRACE_MINUTES);
        let cutoff = now - Duration::minutes(grace);
        let today = now.date();
        let mut records = Vec::new();
        for date in [today - Duration::days(1), today] {
            records.extend(completion::missed_records(
                self.storage.reminders(),
                self.storage.completions(),
                date,
                cutoff,
                Utc::now(),
            ));
        }
        let count = records.len();
        self.storage.append_completions(records)?;
        if count > 0 {
            info!("Marked {} occurrences as missed", count);
        }
        Ok(count)
    }

    // ============ Progress ============

    pub fn daily_tasks(&self, date: NaiveDate) -> Vec<DailyTask> {
        completion::daily_tasks(self.storage.reminders(), self.storage.completions(), date)
    }

    pub fn habit_progress(&self, habit_id: &str, date: NaiveDate) -> AppResult<f64> {
        let habit = self.reminder(habit_id)?;
        Ok(progress::habit_progress(habit, self.storage.completions(), date))
    }

    pub fn daily_completion(&self, date: NaiveDate) -> f64 {
        progress::daily_completion(self.storage.reminders(), self.storage.completions(), date)
    }

    pub fn medicine_adherence(&self, date: NaiveDate) -> f64 {
        progress::medicine_adherence(self.storage.reminders(), self.storage.completions(), date)
    }

    /// Recompute streaks for every habit and persist them.
    pub fn refresh_habit_stats(&mut self, today: NaiveDate) -> AppResult<()> {
        let mut stats = self.storage.all_stats().clone();
        for habit in self.storage.reminders().iter().filter(|r| r.is_habit()) {
            stats
                .entry(habit.id.clone())
                .or_default()
                .refresh(habit, self.storage.completions(), today);
        }
        self.storage.set_stats(stats)
    }

    pub fn habit_stats(&self, habit_id: &str) -> AppResult<HabitStats> {
        self.reminder(habit_id)?;
        Ok(self.storage.stats(habit_id).cloned().unwrap_or_default())
    }

    pub fn summary(&self, today: NaiveDate) -> DaySummary {
        let reminders = self.storage.reminders();
        let log = self.storage.completions();
        DaySummary {
            date: today,
            habit_completion: progress::daily_completion(reminders, log, today),
            medicine_adherence: progress::medicine_adherence(reminders, log, today),
            history: progress::completion_history(reminders, log, today, HISTORY_DAYS),
            streaks: self.storage.all_stats().clone(),
        }
    }

    // ============ Notifications & sync ============

    pub fn resync_notifications(&mut self, today: NaiveDate) -> usize {
        self.scheduler.resync_all(self.storage.reminders(), today)
    }

    /// Merge with the remote copy, then rebuild notifications from the result.
    pub fn sync_remote(&mut self, today: NaiveDate) -> AppResult<bool> {
        if !self.storage.sync()? {
            return Ok(false);
        }
        self.resync_notifications(today);
        Ok(true)
    }
}

/// Whether local storage holds the write, even if the remote push failed.
fn kept_locally<T>(result: &AppResult<T>) -> bool {
    match result {
        Ok(_) => true,
        Err(e) => e.is_remote_failure(),
    }
}

fn open_state() -> AppResult<AppState<FileNotifier>> {
    let mut storage = Storage::new()?;
    let settings = load_settings(storage.app_data_path())?;

    if let Some(remote) = &settings.remote {
        storage.connect_remote(RemoteStore::new(remote));
        if let Err(e) = storage.sync() {
            warn!("Remote sync failed, using local data: {}", e);
        }
    }

    let notifier = FileNotifier::open(storage.app_data_path())?;
    Ok(AppState::new(storage, notifier, settings))
}

fn respond<T: Serialize>(result: AppResult<T>) -> String {
    let action = ActionResult::from(result);
    serde_json::to_string_pretty(&action).unwrap_or_else(|e| {
        format!(
            "{{\"success\":false,\"error\":{{\"type\":\"Storage\",\"message\":\"{}\"}}}}",
            e
        )
    })
}

fn missing_arg(usage: &str) -> AppError {
    AppError::validation(format!("usage: medtrack {}", usage))
}

fn execute<N: Notifier>(state: &mut AppState<N>, args: &[String]) -> String {
    let now = Local::now().naive_local();
    let today = now.date();
    let arg = |i: usize| args.get(i).map(String::as_str);

    match arg(0).unwrap_or("today") {
        "today" => {
            if let Err(e) = state.mark_missed(now) {
                warn!("Could not record missed occurrences: {}", e);
            }
            respond(Ok(state.daily_tasks(today)))
        }
        "add" => respond(
            arg(1)
                .ok_or_else(|| missing_arg("add <reminder-json>"))
                .and_then(|json| {
                    serde_json::from_str::<Reminder>(json)
                        .map_err(|e| AppError::validation(e.to_string()))
                })
                .and_then(|reminder| state.add_reminder(reminder, today)),
        ),
        "pause" | "resume" => {
            let active = arg(0) == Some("resume");
            respond(
                arg(1)
                    .ok_or_else(|| missing_arg("pause|resume <reminder-id>"))
                    .and_then(|id| state.set_reminder_active(id, active, today)),
            )
        }
        "delete" => respond(
            arg(1)
                .ok_or_else(|| missing_arg("delete <reminder-id>"))
                .and_then(|id| state.delete_reminder(id)),
        ),
        "complete" => respond(
            arg(1)
                .ok_or_else(|| missing_arg("complete <task-id>"))
                .and_then(|id| state.complete_task_id(id, today)),
        ),
        "skip" => respond(
            arg(1)
                .ok_or_else(|| missing_arg("skip <task-id>"))
                .and_then(|id| state.skip_task_id(id, today)),
        ),
        "log" => {
            let value = arg(2)
                .ok_or_else(|| missing_arg("log <habit-id> <value>"))
                .and_then(|v| {
                    v.parse::<f64>()
                        .map_err(|_| AppError::validation(format!("'{}' is not a number", v)))
                });
            respond(value.and_then(|value| {
                let id = arg(1).ok_or_else(|| missing_arg("log <habit-id> <value>"))?;
                state.record_habit_value(id, value, today)
            }))
        }
        "stats" => respond(state.refresh_habit_stats(today).map(|_| state.summary(today))),
        "schedule" => respond(Ok(state.resync_notifications(today))),
        "sync" => respond(state.sync_remote(today)),
        other => respond::<()>(Err(AppError::validation(format!(
            "Unknown command '{}'",
            other
        )))),
    }
}

pub fn run() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let output = match open_state() {
        Ok(mut state) => execute(&mut state, &args),
        Err(e) => {
            log::error!("Failed to initialize: {}", e);
            respond::<()>(Err(e))
        }
    };
    println!("{}", output);
}
