use crate::completion::{CompletionLog, CompletionStatus};
use crate::reminder::{Reminder, ReminderKind};
use chrono::{Duration, NaiveDate};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Progress toward a habit's target on `date`, as a percentage capped at 100.
pub fn habit_progress(habit: &Reminder, log: &CompletionLog, date: NaiveDate) -> f64 {
    let total = log.total_value(&habit.id, date);
    (total / habit.target_value() * 100.0).min(100.0)
}

pub fn is_habit_complete(habit: &Reminder, log: &CompletionLog, date: NaiveDate) -> bool {
    log.total_value(&habit.id, date) >= habit.target_value()
}

/// Days on which the habit reached its target.
fn complete_days(habit: &Reminder, log: &CompletionLog) -> BTreeSet<NaiveDate> {
    let mut totals: BTreeMap<NaiveDate, f64> = BTreeMap::new();
    for record in log.records() {
        if record.reminder_id == habit.id && record.status == CompletionStatus::Taken {
            *totals.entry(record.date).or_insert(0.0) += record.counted_value();
        }
    }
    let target = habit.target_value();
    totals
        .into_iter()
        .filter(|(_, total)| *total >= target)
        .map(|(date, _)| date)
        .collect()
}

/// Consecutive complete days ending today, or yesterday if today is not done yet.
pub fn current_streak(habit: &Reminder, log: &CompletionLog, today: NaiveDate) -> u32 {
    let days = complete_days(habit, log);
    let yesterday = today - Duration::days(1);

    let mut day = if days.contains(&today) {
        today
    } else if days.contains(&yesterday) {
        yesterday
    } else {
        return 0;
    };

    let mut streak = 0;
    while days.contains(&day) {
        streak += 1;
        day = day - Duration::days(1);
    }
    streak
}

/// Longest run of complete days anywhere in the history.
pub fn longest_streak(habit: &Reminder, log: &CompletionLog) -> u32 {
    let mut best = 0;
    let mut run = 0;
    let mut previous: Option<NaiveDate> = None;
    for day in complete_days(habit, log) {
        run = match previous {
            Some(prev) if day - prev == Duration::days(1) => run + 1,
            _ => 1,
        };
        best = best.max(run);
        previous = Some(day);
    }
    best
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HabitStats {
    pub current_streak: u32,
    pub best_streak: u32,
    #[serde(default)]
    pub updated_on: Option<NaiveDate>,
}

impl HabitStats {
    /// Recompute the current streak. `best_streak` only ever grows.
    pub fn refresh(&mut self, habit: &Reminder, log: &CompletionLog, today: NaiveDate) {
        self.current_streak = current_streak(habit, log, today);
        self.best_streak = self
            .best_streak
            .max(self.current_streak)
            .max(longest_streak(habit, log));
        self.updated_on = Some(today);
    }
}

/// Share of habits scheduled on `date` that reached their target.
///
/// 100 when no habit is scheduled.
pub fn daily_completion(reminders: &[Reminder], log: &CompletionLog, date: NaiveDate) -> f64 {
    let scheduled: Vec<&Reminder> = reminders
        .iter()
        .filter(|r| r.kind == ReminderKind::Habit && r.is_scheduled_on(date))
        .collect();
    if scheduled.is_empty() {
        return 100.0;
    }
    let done = scheduled
        .iter()
        .filter(|h| is_habit_complete(h, log, date))
        .count();
    done as f64 / scheduled.len() as f64 * 100.0
}

/// Share of medicine occurrences on `date` recorded as taken.
///
/// 100 when nothing is due.
pub fn medicine_adherence(reminders: &[Reminder], log: &CompletionLog, date: NaiveDate) -> f64 {
    let mut due = 0usize;
    let mut taken = 0usize;
    for reminder in reminders.iter().filter(|r| r.kind == ReminderKind::Medicine) {
        for time in reminder.occurrences_on(date) {
            due += 1;
            if log.status_of(&reminder.id, date, time) == CompletionStatus::Taken {
                taken += 1;
            }
        }
    }
    if due == 0 {
        return 100.0;
    }
    taken as f64 / due as f64 * 100.0
}

/// Overall habit completion for the `days` days ending at `today`, oldest first.
pub fn completion_history(
    reminders: &[Reminder],
    log: &CompletionLog,
    today: NaiveDate,
    days: i64,
) -> Vec<(NaiveDate, f64)> {
    (0..days)
        .rev()
        .map(|days_ago| {
            let date = today - Duration::days(days_ago);
            (date, daily_completion(reminders, log, date))
        })
        .collect()
}
