use crate::completion::{resolve_task_id, CompletionLog, CompletionRecord, CompletionStatus};
use crate::reminder::Reminder;
use crate::storage::merge::ReminderStore;
use chrono::{DateTime, Local, Utc};
use log::{info, warn};
use serde::Deserialize;
use std::fs;
use std::path::Path;

/// Completion entry from older app versions, keyed by the composite task id
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LegacyCompletion {
    pub task_id: String,
    pub completed_at: DateTime<Utc>,
    #[serde(default = "legacy_status")]
    pub status: CompletionStatus,
    #[serde(default)]
    pub value: Option<f64>,
}

fn legacy_status() -> CompletionStatus {
    CompletionStatus::Taken
}

#[derive(Debug, Clone, Deserialize)]
pub struct LegacyReminderStore {
    pub reminders: Vec<Reminder>,
    #[serde(default)]
    pub history: Vec<LegacyCompletion>,
}

/// Migrate a legacy completion to a structured record.
///
/// Returns `None` when the task id matches no known reminder.
pub fn migrate_legacy_completion(
    reminders: &[Reminder],
    legacy: &LegacyCompletion,
) -> Option<CompletionRecord> {
    let (reminder, task) = match resolve_task_id(reminders, &legacy.task_id) {
        Ok(found) => found,
        Err(e) => {
            warn!("Dropping legacy completion: {}", e);
            return None;
        }
    };

    Some(CompletionRecord {
        id: uuid::Uuid::new_v4().to_string(),
        reminder_id: reminder.id.clone(),
        kind: reminder.kind,
        // Old entries carried no day; use the local day of completion
        date: legacy.completed_at.with_timezone(&Local).date_naive(),
        scheduled_time: task.time,
        completed_at: legacy.completed_at,
        status: legacy.status,
        value: legacy.value,
    })
}

/// Try to parse content as legacy format and migrate if needed
pub fn try_migrate_legacy_data(content: &str, backup_path: Option<&Path>) -> Option<ReminderStore> {
    // Legacy files carry `history` instead of `completions`
    let value: serde_json::Value = serde_json::from_str(content).ok()?;
    if value.get("history").is_none() || value.get("completions").is_some() {
        return None;
    }

    let legacy_store = serde_json::from_value::<LegacyReminderStore>(value).ok()?;
    info!("Detected legacy data format, migrating...");

    if let Some(backup) = backup_path {
        if let Err(e) = fs::write(backup, content) {
            warn!("Failed to create backup: {}", e);
        } else {
            info!("Created backup at {:?}", backup);
        }
    }

    let records: Vec<CompletionRecord> = legacy_store
        .history
        .iter()
        .filter_map(|c| migrate_legacy_completion(&legacy_store.reminders, c))
        .collect();

    info!(
        "Migrated {} reminders, {}/{} completions",
        legacy_store.reminders.len(),
        records.len(),
        legacy_store.history.len()
    );

    Some(ReminderStore {
        reminders: legacy_store.reminders,
        completions: CompletionLog::from_records(records),
        ..ReminderStore::default()
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reminder::tests::{daily_habit, daily_medicine, t};

    fn legacy_json() -> String {
        let reminders = vec![daily_medicine("abc123", &["09:30"]), daily_habit("xyz", 1.0)];
        serde_json::json!({
            "reminders": reminders,
            "history": [
                { "taskId": "medicine-abc123-09:30", "completedAt": "2024-01-05T09:31:00Z" },
                { "taskId": "habit-xyz", "completedAt": "2024-01-05T12:00:00Z", "value": 2.0 },
                { "taskId": "medicine-gone-08:00", "completedAt": "2024-01-05T08:00:00Z" }
            ]
        })
        .to_string()
    }

    #[test]
    fn test_migrates_composite_task_ids() {
        let store = try_migrate_legacy_data(&legacy_json(), None).unwrap();
        assert_eq!(store.reminders.len(), 2);
        assert_eq!(store.completions.len(), 2);

        let records = store.completions.records();
        assert_eq!(records[0].reminder_id, "abc123");
        assert_eq!(records[0].scheduled_time, Some(t("09:30")));
        assert_eq!(records[1].reminder_id, "xyz");
        assert_eq!(records[1].scheduled_time, None);
        assert_eq!(records[1].value, Some(2.0));
    }

    #[test]
    fn test_current_format_is_not_migrated() {
        let current = serde_json::to_string(&ReminderStore::default()).unwrap();
        assert!(try_migrate_legacy_data(&current, None).is_none());
    }

    #[test]
    fn test_garbage_is_not_migrated() {
        assert!(try_migrate_legacy_data("{\"nope\": 1}", None).is_none());
    }
}
