use crate::clock;
use crate::config::{DEFAULT_HABIT_TARGET, MAX_INTERVAL_HOURS};
use crate::error::{AppError, AppResult};
use chrono::{DateTime, Datelike, Duration, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReminderKind {
    Medicine,
    Habit,
}

impl ReminderKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReminderKind::Medicine => "medicine",
            ReminderKind::Habit => "habit",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "medicine" => Some(ReminderKind::Medicine),
            "habit" => Some(ReminderKind::Habit),
            _ => None,
        }
    }
}

impl fmt::Display for ReminderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Recurrence rule attached to a reminder.
///
/// Weekday indices run 0 (Sunday) through 6 (Saturday).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Frequency {
    Daily {
        #[serde(with = "clock::hhmm_vec")]
        times: Vec<NaiveTime>,
    },
    Interval {
        every_hours: u32,
        #[serde(with = "clock::hhmm", default = "midnight")]
        start: NaiveTime,
    },
    SpecificDays {
        days: Vec<u8>,
        #[serde(with = "clock::hhmm_vec")]
        times: Vec<NaiveTime>,
    },
    AsNeeded,
}

fn midnight() -> NaiveTime {
    NaiveTime::MIN
}

impl Frequency {
    /// Whether the rule produces occurrences on the given day.
    pub fn occurs_on(&self, date: NaiveDate) -> bool {
        match self {
            Frequency::Daily { .. } | Frequency::Interval { .. } => true,
            Frequency::SpecificDays { days, .. } => {
                let weekday = date.weekday().num_days_from_sunday() as u8;
                days.contains(&weekday)
            }
            Frequency::AsNeeded => false,
        }
    }

    /// Occurrence times on the given day, in ascending order.
    pub fn times_on(&self, date: NaiveDate) -> Vec<NaiveTime> {
        if !self.occurs_on(date) {
            return Vec::new();
        }
        let mut times = match self {
            Frequency::Daily { times } | Frequency::SpecificDays { times, .. } => times.clone(),
            Frequency::Interval { every_hours, start } => interval_times(*every_hours, *start),
            Frequency::AsNeeded => Vec::new(),
        };
        times.sort();
        times
    }

    fn validate(&self) -> AppResult<()> {
        match self {
            Frequency::Daily { times } => validate_times(times),
            Frequency::SpecificDays { days, times } => {
                if days.is_empty() {
                    return Err(AppError::validation("Select at least one day"));
                }
                if let Some(day) = days.iter().find(|d| **d > 6) {
                    return Err(AppError::validation(format!(
                        "Invalid weekday index {}, expected 0-6",
                        day
                    )));
                }
                let unique: HashSet<&u8> = days.iter().collect();
                if unique.len() != days.len() {
                    return Err(AppError::validation("Duplicate weekday"));
                }
                validate_times(times)
            }
            Frequency::Interval { every_hours, .. } => {
                if *every_hours == 0 || *every_hours > MAX_INTERVAL_HOURS {
                    return Err(AppError::validation(format!(
                        "Interval must be between 1 and {} hours",
                        MAX_INTERVAL_HOURS
                    )));
                }
                Ok(())
            }
            Frequency::AsNeeded => Ok(()),
        }
    }
}

/// Times reached by stepping `every_hours` from `start`, staying within one day.
pub fn interval_times(every_hours: u32, start: NaiveTime) -> Vec<NaiveTime> {
    if every_hours == 0 {
        return Vec::new();
    }
    let mut times = Vec::new();
    let mut current = start;
    loop {
        times.push(current);
        let (next, wrapped) = current.overflowing_add_signed(Duration::hours(every_hours as i64));
        if wrapped != 0 {
            break;
        }
        current = next;
    }
    times
}

fn validate_times(times: &[NaiveTime]) -> AppResult<()> {
    if times.is_empty() {
        return Err(AppError::validation("Add at least one reminder time"));
    }
    let unique: HashSet<&NaiveTime> = times.iter().collect();
    if unique.len() != times.len() {
        return Err(AppError::validation("Duplicate reminder time"));
    }
    Ok(())
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DurationEnd {
    Ongoing,
    Until { date: NaiveDate },
    Days { total: u32 },
}

/// Window of days during which a reminder is in effect.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReminderDuration {
    pub start_date: NaiveDate,
    pub end: DurationEnd,
}

impl ReminderDuration {
    pub fn ongoing(start_date: NaiveDate) -> Self {
        Self {
            start_date,
            end: DurationEnd::Ongoing,
        }
    }

    pub fn until(start_date: NaiveDate, end_date: NaiveDate) -> Self {
        Self {
            start_date,
            end: DurationEnd::Until { date: end_date },
        }
    }

    pub fn days(start_date: NaiveDate, total: u32) -> Self {
        Self {
            start_date,
            end: DurationEnd::Days { total },
        }
    }

    /// Last day (inclusive) the reminder is in effect, if bounded.
    ///
    /// A day count running past the calendar range is treated as unbounded;
    /// `validate` rejects it before it is stored.
    pub fn end_date(&self) -> Option<NaiveDate> {
        match &self.end {
            DurationEnd::Ongoing => None,
            DurationEnd::Until { date } => Some(*date),
            DurationEnd::Days { total } => self.days_end(*total),
        }
    }

    fn days_end(&self, total: u32) -> Option<NaiveDate> {
        self.start_date
            .checked_add_signed(Duration::days(i64::from(total) - 1))
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        date >= self.start_date && self.end_date().map_or(true, |end| date <= end)
    }

    pub fn has_ended(&self, today: NaiveDate) -> bool {
        self.end_date().map_or(false, |end| today > end)
    }

    fn validate(&self) -> AppResult<()> {
        match &self.end {
            DurationEnd::Until { date } if *date < self.start_date => {
                Err(AppError::validation("End date is before start date"))
            }
            DurationEnd::Days { total: 0 } => {
                Err(AppError::validation("Duration must be at least one day"))
            }
            DurationEnd::Days { total } if self.days_end(*total).is_none() => {
                Err(AppError::validation("Duration runs past the supported date range"))
            }
            _ => Ok(()),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Appearance {
    #[serde(default)]
    pub color: String,
    #[serde(default)]
    pub icon: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Dosage {
    pub amount: f64,
    pub unit: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HabitGoal {
    pub target: f64,
    #[serde(default)]
    pub unit: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reminder {
    #[serde(default)]
    pub id: String,
    pub kind: ReminderKind,
    pub name: String,
    pub frequency: Frequency,
    pub duration: ReminderDuration,
    #[serde(default)]
    pub appearance: Appearance,
    #[serde(default)]
    pub dosage: Option<Dosage>,
    #[serde(default)]
    pub goal: Option<HabitGoal>,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default = "default_active")]
    pub is_active: bool,
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
    #[serde(default = "Utc::now")]
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub version: u64, // Bumped on every edit; higher wins on merge
}

fn default_active() -> bool {
    true
}

impl Reminder {
    fn new(kind: ReminderKind, name: String, frequency: Frequency, duration: ReminderDuration) -> Self {
        let now = Utc::now();
        Self {
            id: String::new(), // Will be set by storage
            kind,
            name,
            frequency,
            duration,
            appearance: Appearance::default(),
            dosage: None,
            goal: None,
            notes: None,
            is_active: true,
            created_at: now,
            updated_at: now,
            version: 0,
        }
    }

    pub fn medicine(name: String, frequency: Frequency, duration: ReminderDuration) -> Self {
        Self::new(ReminderKind::Medicine, name, frequency, duration)
    }

    pub fn habit(
        name: String,
        frequency: Frequency,
        duration: ReminderDuration,
        goal: HabitGoal,
    ) -> Self {
        let mut reminder = Self::new(ReminderKind::Habit, name, frequency, duration);
        reminder.goal = Some(goal);
        reminder
    }

    pub fn with_dosage(mut self, amount: f64, unit: &str) -> Self {
        self.dosage = Some(Dosage {
            amount,
            unit: unit.to_string(),
        });
        self
    }

    pub fn with_appearance(mut self, color: &str, icon: &str) -> Self {
        self.appearance = Appearance {
            color: color.to_string(),
            icon: icon.to_string(),
        };
        self
    }

    pub fn is_habit(&self) -> bool {
        self.kind == ReminderKind::Habit
    }

    /// Active and inside its duration window.
    pub fn is_active_on(&self, date: NaiveDate) -> bool {
        self.is_active && self.duration.contains(date)
    }

    /// Active, in window, and the frequency has occurrences that day.
    pub fn is_scheduled_on(&self, date: NaiveDate) -> bool {
        self.is_active_on(date) && self.frequency.occurs_on(date)
    }

    pub fn occurrences_on(&self, date: NaiveDate) -> Vec<NaiveTime> {
        if !self.is_active_on(date) {
            return Vec::new();
        }
        self.frequency.times_on(date)
    }

    pub fn target_value(&self) -> f64 {
        self.goal
            .as_ref()
            .map(|g| g.target)
            .unwrap_or(DEFAULT_HABIT_TARGET)
    }

    pub fn validate(&self) -> AppResult<()> {
        if self.name.trim().is_empty() {
            return Err(AppError::validation("Name is required"));
        }
        self.frequency.validate()?;
        self.duration.validate()?;
        if let Some(goal) = &self.goal {
            if !(goal.target > 0.0) {
                return Err(AppError::validation("Habit target must be greater than zero"));
            }
        }
        if let Some(dosage) = &self.dosage {
            if !(dosage.amount > 0.0) {
                return Err(AppError::validation("Dosage must be greater than zero"));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub fn t(s: &str) -> NaiveTime {
        clock::parse_clock(s).unwrap()
    }

    pub fn d(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    pub fn daily_medicine(id: &str, times: &[&str]) -> Reminder {
        let mut r = Reminder::medicine(
            format!("Medicine {}", id),
            Frequency::Daily {
                times: times.iter().map(|s| t(s)).collect(),
            },
            ReminderDuration::ongoing(d("2024-01-01")),
        );
        r.id = id.to_string();
        r
    }

    pub fn daily_habit(id: &str, target: f64) -> Reminder {
        let mut r = Reminder::habit(
            format!("Habit {}", id),
            Frequency::Daily {
                times: vec![t("08:00")],
            },
            ReminderDuration::ongoing(d("2024-01-01")),
            HabitGoal {
                target,
                unit: "glasses".to_string(),
            },
        );
        r.id = id.to_string();
        r
    }

    #[test]
    fn test_interval_times_stay_within_day() {
        let times = interval_times(8, t("00:00"));
        assert_eq!(times, vec![t("00:00"), t("08:00"), t("16:00")]);

        let times = interval_times(6, t("07:30"));
        assert_eq!(times, vec![t("07:30"), t("13:30"), t("19:30")]);

        assert_eq!(interval_times(24, t("09:00")), vec![t("09:00")]);
    }

    #[test]
    fn test_specific_days_uses_sunday_zero() {
        let freq = Frequency::SpecificDays {
            days: vec![0, 3],
            times: vec![t("09:00")],
        };
        // 2024-01-07 is a Sunday, 2024-01-10 a Wednesday
        assert!(freq.occurs_on(d("2024-01-07")));
        assert!(freq.occurs_on(d("2024-01-10")));
        assert!(!freq.occurs_on(d("2024-01-08")));
        assert!(freq.times_on(d("2024-01-08")).is_empty());
    }

    #[test]
    fn test_as_needed_never_occurs() {
        assert!(!Frequency::AsNeeded.occurs_on(d("2024-01-07")));
        assert!(Frequency::AsNeeded.times_on(d("2024-01-07")).is_empty());
    }

    #[test]
    fn test_duration_days_derives_end_date() {
        let dur = ReminderDuration::days(d("2024-01-01"), 7);
        assert_eq!(dur.end_date(), Some(d("2024-01-07")));
        assert!(dur.contains(d("2024-01-07")));
        assert!(!dur.contains(d("2024-01-08")));
        assert!(!dur.contains(d("2023-12-31")));
        assert!(dur.has_ended(d("2024-01-08")));
    }

    #[test]
    fn test_duration_past_calendar_range_is_rejected() {
        let dur = ReminderDuration::days(d("2024-01-01"), u32::MAX);
        assert!(matches!(dur.validate(), Err(AppError::Validation(_))));
        assert_eq!(dur.end_date(), None);
        assert!(!dur.has_ended(d("2024-01-02")));

        let mut r = daily_medicine("m1", &["08:00"]);
        r.duration = dur;
        assert!(r.validate().is_err());
    }

    #[test]
    fn test_inactive_reminder_has_no_occurrences() {
        let mut r = daily_medicine("m1", &["08:00", "20:00"]);
        assert_eq!(r.occurrences_on(d("2024-02-01")).len(), 2);
        r.is_active = false;
        assert!(r.occurrences_on(d("2024-02-01")).is_empty());
        assert!(!r.is_scheduled_on(d("2024-02-01")));
    }

    #[test]
    fn test_validate_rejects_bad_input() {
        let mut r = daily_medicine("m1", &[]);
        assert!(matches!(r.validate(), Err(AppError::Validation(_))));

        r.frequency = Frequency::Daily {
            times: vec![t("08:00"), t("08:00")],
        };
        assert!(r.validate().is_err());

        r.frequency = Frequency::SpecificDays {
            days: vec![7],
            times: vec![t("08:00")],
        };
        assert!(r.validate().is_err());

        r.frequency = Frequency::Interval {
            every_hours: 0,
            start: t("00:00"),
        };
        assert!(r.validate().is_err());

        r.frequency = Frequency::AsNeeded;
        r.duration = ReminderDuration::until(d("2024-02-01"), d("2024-01-01"));
        assert!(r.validate().is_err());

        r.duration = ReminderDuration::days(d("2024-02-01"), 0);
        assert!(r.validate().is_err());

        r.duration = ReminderDuration::ongoing(d("2024-02-01"));
        r.name = "  ".to_string();
        assert!(r.validate().is_err());
    }

    #[test]
    fn test_validate_habit_target() {
        let mut h = daily_habit("h1", 8.0);
        assert!(h.validate().is_ok());
        h.goal = Some(HabitGoal {
            target: 0.0,
            unit: String::new(),
        });
        assert!(h.validate().is_err());
    }

    #[test]
    fn test_frequency_json_uses_clock_strings() {
        let freq = Frequency::Daily {
            times: vec![t("9:30"), t("21:00")],
        };
        let json = serde_json::to_value(&freq).unwrap();
        assert_eq!(json["type"], "daily");
        assert_eq!(json["times"][0], "09:30");

        let parsed: Frequency =
            serde_json::from_str(r#"{"type":"interval","every_hours":6}"#).unwrap();
        assert_eq!(
            parsed,
            Frequency::Interval {
                every_hours: 6,
                start: t("00:00")
            }
        );
    }

    #[test]
    fn test_target_defaults_to_one() {
        let mut h = daily_habit("h1", 8.0);
        assert_eq!(h.target_value(), 8.0);
        h.goal = None;
        assert_eq!(h.target_value(), 1.0);
    }
}
