//! Application configuration constants
//!
//! Centralized configuration for the reminder engine.

/// Directory created under the platform local-data dir
pub const APP_DIR_NAME: &str = "MedTrack";

/// Environment variable overriding the data directory
pub const DATA_DIR_ENV: &str = "MEDTRACK_DATA_DIR";

/// Main store file
pub const STORE_FILE: &str = "medtrack.json";

/// Backup written before a legacy store is migrated
pub const LEGACY_BACKUP_FILE: &str = "medtrack_backup_v1.json";

/// User settings file
pub const SETTINGS_FILE: &str = "settings.json";

/// Queue file used by the file-backed notifier
pub const NOTIFICATION_QUEUE_FILE: &str = "notifications.json";

/// Notification channel ids, one per reminder kind
pub const MEDICINE_CHANNEL_ID: &str = "medicine-reminders";
pub const HABIT_CHANNEL_ID: &str = "habit-reminders";

/// Minutes after an occurrence before it is considered missed
pub const DEFAULT_MISSED_GRACE_MINUTES: i64 = 60;
pub const MAX_MISSED_GRACE_MINUTES: i64 = 24 * 60;

/// Days shown by the completion history view
pub const HISTORY_DAYS: i64 = 14;

/// Habit target used when a habit carries no explicit goal
pub const DEFAULT_HABIT_TARGET: f64 = 1.0;

/// Widest allowed interval frequency, in hours
pub const MAX_INTERVAL_HOURS: u32 = 24;

/// Timeout for remote document store requests
pub const REMOTE_TIMEOUT_SECS: u64 = 15;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_grace_period_is_reasonable() {
        assert!(DEFAULT_MISSED_GRACE_MINUTES > 0);
        assert!(DEFAULT_MISSED_GRACE_MINUTES <= 24 * 60);
    }

    #[test]
    fn test_channels_are_distinct() {
        assert_ne!(MEDICINE_CHANNEL_ID, HABIT_CHANNEL_ID);
    }

    #[test]
    fn test_interval_bound_is_one_day() {
        assert_eq!(MAX_INTERVAL_HOURS, 24);
    }
}
