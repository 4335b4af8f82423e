use crate::clock;
use crate::error::{AppError, AppResult};
use crate::reminder::{Frequency, Reminder, ReminderKind};
use crate::task_id::{parse_legacy, TaskRef};
use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use log::debug;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CompletionStatus {
    Taken,
    Skipped,
    Missed,
    Pending, // Derived only; never written to the log
}

impl CompletionStatus {
    /// Statuses that close an occurrence for further action.
    pub fn is_final(&self) -> bool {
        matches!(self, CompletionStatus::Taken | CompletionStatus::Skipped)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompletionRecord {
    pub id: String,
    pub reminder_id: String,
    pub kind: ReminderKind,
    /// Day the occurrence belongs to
    pub date: NaiveDate,
    #[serde(default, with = "clock::hhmm_opt")]
    pub scheduled_time: Option<NaiveTime>,
    pub completed_at: DateTime<Utc>,
    pub status: CompletionStatus,
    /// Amount logged toward a habit goal; `None` counts as one unit
    #[serde(default)]
    pub value: Option<f64>,
}

impl CompletionRecord {
    pub fn task(&self) -> TaskRef {
        TaskRef::new(self.kind, &self.reminder_id, self.scheduled_time)
    }

    pub fn counted_value(&self) -> f64 {
        self.value.unwrap_or(1.0)
    }
}

/// Append-only history of completion records.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CompletionLog {
    records: Vec<CompletionRecord>,
}

impl CompletionLog {
    pub fn from_records(mut records: Vec<CompletionRecord>) -> Self {
        records.sort_by(|a, b| a.completed_at.cmp(&b.completed_at));
        Self { records }
    }

    pub fn records(&self) -> &[CompletionRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub(crate) fn append(&mut self, record: CompletionRecord) {
        self.records.push(record);
    }

    pub fn contains(&self, id: &str) -> bool {
        self.records.iter().any(|r| r.id == id)
    }

    pub fn for_reminder_on<'a>(
        &'a self,
        reminder_id: &'a str,
        date: NaiveDate,
    ) -> impl Iterator<Item = &'a CompletionRecord> + 'a {
        self.records
            .iter()
            .filter(move |r| r.reminder_id == reminder_id && r.date == date)
    }

    /// Latest record for a scheduled occurrence.
    pub fn latest_for(
        &self,
        reminder_id: &str,
        date: NaiveDate,
        time: NaiveTime,
    ) -> Option<&CompletionRecord> {
        self.records
            .iter()
            .filter(|r| r.reminder_id == reminder_id && r.date == date)
            .filter(|r| r.scheduled_time == Some(time))
            .last()
    }

    /// Earliest taken or skipped record for an occurrence.
    ///
    /// Merged logs can hold a later missed record from another device; a
    /// final record always decides the occurrence.
    pub fn final_for(
        &self,
        reminder_id: &str,
        date: NaiveDate,
        time: NaiveTime,
    ) -> Option<&CompletionRecord> {
        self.records
            .iter()
            .filter(|r| r.reminder_id == reminder_id && r.date == date)
            .filter(|r| r.scheduled_time == Some(time) && r.status.is_final())
            .min_by_key(|r| r.completed_at)
    }

    pub fn status_of(&self, reminder_id: &str, date: NaiveDate, time: NaiveTime) -> CompletionStatus {
        self.final_for(reminder_id, date, time)
            .or_else(|| self.latest_for(reminder_id, date, time))
            .map(|r| r.status)
            .unwrap_or(CompletionStatus::Pending)
    }

    /// Sum of taken values logged for a reminder on a day.
    pub fn total_value(&self, reminder_id: &str, date: NaiveDate) -> f64 {
        self.for_reminder_on(reminder_id, date)
            .filter(|r| r.status == CompletionStatus::Taken)
            .map(|r| r.counted_value())
            .sum()
    }
}

/// Resolve a composite task-id string to a reminder.
///
/// Tries the id with prefix and time suffix stripped, then the raw string.
pub fn resolve_task_id<'a>(reminders: &'a [Reminder], raw: &str) -> AppResult<(&'a Reminder, TaskRef)> {
    let parsed = parse_legacy(raw);
    for candidate in parsed.lookup_candidates() {
        if let Some(reminder) = reminders.iter().find(|r| r.id == candidate) {
            if candidate != parsed.candidate_id {
                debug!("Resolved task {} through its unmodified id", raw);
            }
            let task = TaskRef::new(reminder.kind, &reminder.id, parsed.time);
            return Ok((reminder, task));
        }
    }
    Err(AppError::not_found(format!("No reminder matches task '{}'", raw)))
}

/// Build the record for acting on one occurrence of `reminder`.
///
/// Rejects occurrences that already carry a taken or skipped record, and
/// times the reminder does not fire at on `date`. Nothing is written here;
/// the caller appends the record once it is accepted.
pub fn record_instance(
    log: &CompletionLog,
    reminder: &Reminder,
    date: NaiveDate,
    time: Option<NaiveTime>,
    status: CompletionStatus,
    value: Option<f64>,
    now: DateTime<Utc>,
) -> AppResult<CompletionRecord> {
    if status == CompletionStatus::Pending {
        return Err(AppError::validation("Pending is not a recordable status"));
    }
    if let Some(v) = value {
        if !(v > 0.0) {
            return Err(AppError::validation("Logged value must be greater than zero"));
        }
    }

    match time {
        Some(time) => {
            if !reminder.occurrences_on(date).contains(&time) {
                return Err(AppError::validation(format!(
                    "{} is not scheduled at {} on {}",
                    reminder.name,
                    clock::format_clock(&time),
                    date
                )));
            }
            if let Some(existing) = log.final_for(&reminder.id, date, time) {
                return Err(AppError::already_completed(existing.task().to_string()));
            }
        }
        None => {
            // Unscheduled entries are only for habits and as-needed medicine
            let ad_hoc = reminder.is_habit() || reminder.frequency == Frequency::AsNeeded;
            if !ad_hoc {
                return Err(AppError::validation(format!(
                    "{} needs a scheduled time",
                    reminder.name
                )));
            }
            if !reminder.is_active_on(date) {
                return Err(AppError::validation(format!(
                    "{} is not active on {}",
                    reminder.name, date
                )));
            }
        }
    }

    Ok(CompletionRecord {
        id: uuid::Uuid::new_v4().to_string(),
        reminder_id: reminder.id.clone(),
        kind: reminder.kind,
        date,
        scheduled_time: time,
        completed_at: now,
        status,
        value,
    })
}

/// One occurrence on a given day, with its derived status.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DailyTask {
    pub task: TaskRef,
    pub task_id: String,
    pub name: String,
    #[serde(with = "clock::hhmm")]
    pub time: NaiveTime,
    pub status: CompletionStatus,
}

/// Every scheduled occurrence of `date`, sorted by time.
pub fn daily_tasks(reminders: &[Reminder], log: &CompletionLog, date: NaiveDate) -> Vec<DailyTask> {
    let mut tasks: Vec<DailyTask> = reminders
        .iter()
        .flat_map(move |reminder| {
            reminder.occurrences_on(date).into_iter().map(move |time| {
                let task = TaskRef::new(reminder.kind, &reminder.id, Some(time));
                DailyTask {
                    task_id: task.to_string(),
                    task,
                    name: reminder.name.clone(),
                    time,
                    status: log.status_of(&reminder.id, date, time),
                }
            })
        })
        .collect();
    tasks.sort_by(|a, b| a.time.cmp(&b.time).then_with(|| a.name.cmp(&b.name)));
    tasks
}

/// Records marking occurrences before `cutoff` on `date` as missed.
///
/// Only occurrences with no record at all are considered.
pub fn missed_records(
    reminders: &[Reminder],
    log: &CompletionLog,
    date: NaiveDate,
    cutoff: NaiveDateTime,
    now: DateTime<Utc>,
) -> Vec<CompletionRecord> {
    let mut records = Vec::new();
    for reminder in reminders {
        for time in reminder.occurrences_on(date) {
            if date.and_time(time) >= cutoff {
                continue;
            }
            if log.latest_for(&reminder.id, date, time).is_some() {
                continue;
            }
            records.push(CompletionRecord {
                id: uuid::Uuid::new_v4().to_string(),
                reminder_id: reminder.id.clone(),
                kind: reminder.kind,
                date,
                scheduled_time: Some(time),
                completed_at: now,
                status: CompletionStatus::Missed,
                value: None,
            });
        }
    }
    records
}
