use crate::clock;
use crate::reminder::ReminderKind;
use chrono::NaiveTime;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Reference to one scheduled occurrence (or an unscheduled log entry when
/// `time` is `None`) of a reminder.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TaskRef {
    pub kind: ReminderKind,
    pub reminder_id: String,
    #[serde(default, with = "clock::hhmm_opt")]
    pub time: Option<NaiveTime>,
}

impl TaskRef {
    pub fn new(kind: ReminderKind, reminder_id: &str, time: Option<NaiveTime>) -> Self {
        Self {
            kind,
            reminder_id: reminder_id.to_string(),
            time,
        }
    }
}

/// Renders the composite `{kind}-{reminderId}-{HH:MM}` form.
impl fmt::Display for TaskRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.kind, self.reminder_id)?;
        if let Some(time) = &self.time {
            write!(f, "-{}", clock::format_clock(time))?;
        }
        Ok(())
    }
}

/// Pieces recovered from a composite task-id string.
#[derive(Debug, Clone, PartialEq)]
pub struct LegacyTaskId {
    pub kind: Option<ReminderKind>,
    pub candidate_id: String,
    pub time: Option<NaiveTime>,
    pub original: String,
}

impl LegacyTaskId {
    /// Ids to try in order: the stripped candidate, then the raw string.
    pub fn lookup_candidates(&self) -> Vec<&str> {
        let mut ids = vec![self.candidate_id.as_str()];
        if self.original != self.candidate_id {
            ids.push(self.original.as_str());
        }
        ids
    }
}

/// Split a composite id like `medicine-abc123-09:30`.
///
/// The kind prefix is stripped when present; the trailing segment is dropped
/// when it looks like `H:MM`/`HH:MM`. A suffix that matches the pattern but is
/// not a valid time of day is still dropped, with `time` left empty.
pub fn parse_legacy(raw: &str) -> LegacyTaskId {
    let mut kind = None;
    let mut rest = raw;
    for k in [ReminderKind::Medicine, ReminderKind::Habit] {
        if let Some(stripped) = raw.strip_prefix(k.as_str()).and_then(|s| s.strip_prefix('-')) {
            kind = Some(k);
            rest = stripped;
            break;
        }
    }

    let mut time = None;
    if let Some((head, tail)) = rest.rsplit_once('-') {
        if clock::is_clock_time(tail) {
            time = clock::parse_clock(tail).ok();
            rest = head;
        }
    }

    LegacyTaskId {
        kind,
        candidate_id: rest.to_string(),
        time,
        original: raw.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strips_prefix_and_time_suffix() {
        let parsed = parse_legacy("medicine-abc123-09:30");
        assert_eq!(parsed.candidate_id, "abc123");
        assert_eq!(parsed.kind, Some(ReminderKind::Medicine));
        assert_eq!(parsed.time, NaiveTime::from_hms_opt(9, 30, 0));
    }

    #[test]
    fn test_no_time_suffix_keeps_id() {
        let parsed = parse_legacy("habit-xyz");
        assert_eq!(parsed.candidate_id, "xyz");
        assert_eq!(parsed.kind, Some(ReminderKind::Habit));
        assert_eq!(parsed.time, None);
    }

    #[test]
    fn test_single_digit_hour_suffix() {
        let parsed = parse_legacy("habit-run-7:05");
        assert_eq!(parsed.candidate_id, "run");
        assert_eq!(parsed.time, NaiveTime::from_hms_opt(7, 5, 0));
    }

    #[test]
    fn test_dashed_ids_survive() {
        let raw = "medicine-3f2a9c1e-5b7d-4e8f-9a0b-1c2d3e4f5a6b-20:00";
        let parsed = parse_legacy(raw);
        assert_eq!(parsed.candidate_id, "3f2a9c1e-5b7d-4e8f-9a0b-1c2d3e4f5a6b");
    }

    #[test]
    fn test_unprefixed_id_is_untouched() {
        let parsed = parse_legacy("abc123");
        assert_eq!(parsed.kind, None);
        assert_eq!(parsed.candidate_id, "abc123");
        assert_eq!(parsed.lookup_candidates(), vec!["abc123"]);
    }

    #[test]
    fn test_lookup_candidates_fall_back_to_original() {
        let parsed = parse_legacy("medicine-abc-08:00");
        assert_eq!(parsed.lookup_candidates(), vec!["abc", "medicine-abc-08:00"]);
    }

    #[test]
    fn test_display_matches_composite_form() {
        let task = TaskRef::new(
            ReminderKind::Medicine,
            "abc123",
            NaiveTime::from_hms_opt(9, 30, 0),
        );
        assert_eq!(task.to_string(), "medicine-abc123-09:30");

        let task = TaskRef::new(ReminderKind::Habit, "xyz", None);
        assert_eq!(task.to_string(), "habit-xyz");
    }

    #[test]
    fn test_display_parses_back() {
        let task = TaskRef::new(
            ReminderKind::Habit,
            "h-1",
            NaiveTime::from_hms_opt(18, 0, 0),
        );
        let parsed = parse_legacy(&task.to_string());
        assert_eq!(parsed.candidate_id, "h-1");
        assert_eq!(parsed.time, task.time);
    }
}
