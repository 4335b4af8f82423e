use crate::completion::{CompletionLog, CompletionRecord};
use crate::progress::HabitStats;
use crate::reminder::Reminder;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};

/// Everything persisted for one user: reminders, completion history, streak stats
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReminderStore {
    /// Bumped on every successful remote write
    #[serde(default)]
    pub revision: u64,
    pub reminders: Vec<Reminder>,
    #[serde(default)]
    pub completions: CompletionLog,
    #[serde(default)]
    pub stats: HashMap<String, HabitStats>,
    /// Ids of deleted reminders, so a merge does not bring them back
    #[serde(default)]
    pub deleted: BTreeSet<String>,
}

/// Pick the winner between two copies of the same reminder.
///
/// Higher version wins; on equal versions the later edit wins; otherwise local.
fn newer<'a>(local: &'a Reminder, other: &'a Reminder) -> &'a Reminder {
    if other.version > local.version {
        other
    } else if other.version == local.version && other.updated_at > local.updated_at {
        other
    } else {
        local
    }
}

/// Merge two ReminderStores, keeping all unique records and preferring newer
/// versions for conflicts
pub fn merge_stores(local: &ReminderStore, remote: &ReminderStore) -> ReminderStore {
    let deleted: BTreeSet<String> = local.deleted.union(&remote.deleted).cloned().collect();

    // Merge reminders, keeping local order first
    let mut reminders: Vec<Reminder> = Vec::new();
    for r in &local.reminders {
        let merged = match remote.reminders.iter().find(|x| x.id == r.id) {
            Some(other) => newer(r, other),
            None => r,
        };
        reminders.push(merged.clone());
    }
    for r in &remote.reminders {
        if !reminders.iter().any(|x| x.id == r.id) {
            reminders.push(r.clone());
        }
    }
    reminders.retain(|r| !deleted.contains(&r.id));

    // Completions are append-only: union by record id
    let mut records: Vec<CompletionRecord> = local.completions.records().to_vec();
    for record in remote.completions.records() {
        if !local.completions.contains(&record.id) {
            records.push(record.clone());
        }
    }

    let mut stats = local.stats.clone();
    for (id, theirs) in &remote.stats {
        match stats.get_mut(id) {
            Some(ours) => {
                if theirs.best_streak > ours.best_streak {
                    ours.best_streak = theirs.best_streak;
                }
                if theirs.updated_on > ours.updated_on {
                    ours.current_streak = theirs.current_streak;
                    ours.updated_on = theirs.updated_on;
                }
            }
            None => {
                stats.insert(id.clone(), theirs.clone());
            }
        }
    }
    stats.retain(|id, _| !deleted.contains(id));

    ReminderStore {
        revision: local.revision.max(remote.revision),
        reminders,
        completions: CompletionLog::from_records(records),
        stats,
        deleted,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::completion::CompletionStatus;
    use crate::reminder::tests::{d, daily_medicine};
    use chrono::{DateTime, Utc};

    fn make_reminder(id: &str, version: u64, updated_at: &str) -> Reminder {
        let mut r = daily_medicine(id, &["08:00"]);
        r.version = version;
        r.updated_at = DateTime::parse_from_rfc3339(updated_at)
            .unwrap()
            .with_timezone(&Utc);
        r
    }

    fn make_record(id: &str, reminder_id: &str) -> CompletionRecord {
        CompletionRecord {
            id: id.to_string(),
            reminder_id: reminder_id.to_string(),
            kind: crate::reminder::ReminderKind::Medicine,
            date: d("2024-01-05"),
            scheduled_time: None,
            completed_at: Utc::now(),
            status: CompletionStatus::Taken,
            value: None,
        }
    }

    fn store(reminders: Vec<Reminder>) -> ReminderStore {
        ReminderStore {
            reminders,
            ..ReminderStore::default()
        }
    }

    #[test]
    fn test_merge_adds_new_reminders_from_remote() {
        let local = store(vec![make_reminder("a", 1, "2024-01-01T00:00:00Z")]);
        let remote = store(vec![
            make_reminder("a", 1, "2024-01-01T00:00:00Z"),
            make_reminder("b", 1, "2024-01-02T00:00:00Z"),
        ]);

        let merged = merge_stores(&local, &remote);
        assert_eq!(merged.reminders.len(), 2);
    }

    #[test]
    fn test_merge_prefers_higher_version() {
        let mut local_copy = make_reminder("a", 3, "2024-01-01T00:00:00Z");
        local_copy.name = "Local".to_string();
        let mut remote_copy = make_reminder("a", 2, "2024-02-01T00:00:00Z");
        remote_copy.name = "Remote".to_string();

        let merged = merge_stores(&store(vec![local_copy]), &store(vec![remote_copy]));
        assert_eq!(merged.reminders.len(), 1);
        assert_eq!(merged.reminders[0].name, "Local");
    }

    #[test]
    fn test_merge_same_version_uses_later_edit() {
        let local_copy = make_reminder("a", 2, "2024-01-01T00:00:00Z");
        let mut remote_copy = make_reminder("a", 2, "2024-01-03T00:00:00Z");
        remote_copy.name = "Updated".to_string();

        let merged = merge_stores(&store(vec![local_copy]), &store(vec![remote_copy]));
        assert_eq!(merged.reminders[0].name, "Updated");
    }

    #[test]
    fn test_merge_respects_tombstones() {
        let mut local = store(vec![]);
        local.deleted.insert("a".to_string());
        let remote = store(vec![make_reminder("a", 1, "2024-01-01T00:00:00Z")]);

        let merged = merge_stores(&local, &remote);
        assert!(merged.reminders.is_empty());
        assert!(merged.deleted.contains("a"));
    }

    #[test]
    fn test_merge_unions_completions() {
        let mut local = store(vec![]);
        local.completions = CompletionLog::from_records(vec![make_record("r1", "a")]);
        let mut remote = store(vec![]);
        remote.completions =
            CompletionLog::from_records(vec![make_record("r1", "a"), make_record("r2", "a")]);

        let merged = merge_stores(&local, &remote);
        assert_eq!(merged.completions.len(), 2);
    }

    #[test]
    fn test_taken_on_other_device_outranks_later_missed() {
        use crate::completion::record_instance;
        use crate::error::AppError;
        use crate::reminder::tests::t;
        use chrono::Duration;

        let reminder = daily_medicine("m1", &["08:00"]);
        let occurrence = |id: &str, status: CompletionStatus, completed_at: DateTime<Utc>| {
            CompletionRecord {
                id: id.to_string(),
                reminder_id: "m1".to_string(),
                kind: crate::reminder::ReminderKind::Medicine,
                date: d("2024-01-05"),
                scheduled_time: Some(t("08:00")),
                completed_at,
                status,
                value: None,
            }
        };
        let now = Utc::now();

        // Device A marked the dose missed after device B had already taken it
        let mut device_a = store(vec![reminder.clone()]);
        device_a.completions =
            CompletionLog::from_records(vec![occurrence("a1", CompletionStatus::Missed, now)]);
        let mut device_b = store(vec![reminder.clone()]);
        device_b.completions = CompletionLog::from_records(vec![occurrence(
            "b1",
            CompletionStatus::Taken,
            now - Duration::hours(2),
        )]);

        let merged = merge_stores(&device_a, &device_b);
        assert_eq!(
            merged.completions.status_of("m1", d("2024-01-05"), t("08:00")),
            CompletionStatus::Taken
        );

        let again = record_instance(
            &merged.completions,
            &reminder,
            d("2024-01-05"),
            Some(t("08:00")),
            CompletionStatus::Taken,
            None,
            Utc::now(),
        );
        assert!(matches!(again, Err(AppError::AlreadyCompleted(_))));
    }

    #[test]
    fn test_merge_keeps_best_streak_and_max_revision() {
        let mut local = store(vec![]);
        local.revision = 4;
        local.stats.insert(
            "h".to_string(),
            HabitStats {
                current_streak: 1,
                best_streak: 3,
                updated_on: Some(d("2024-01-10")),
            },
        );
        let mut remote = store(vec![]);
        remote.revision = 7;
        remote.stats.insert(
            "h".to_string(),
            HabitStats {
                current_streak: 2,
                best_streak: 9,
                updated_on: Some(d("2024-01-09")),
            },
        );

        let merged = merge_stores(&local, &remote);
        assert_eq!(merged.revision, 7);
        assert_eq!(merged.stats["h"].best_streak, 9);
        assert_eq!(merged.stats["h"].current_streak, 1);
    }
}
