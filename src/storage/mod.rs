mod legacy;
mod local;
pub mod merge;
pub mod remote;
pub mod settings;

use crate::completion::{CompletionLog, CompletionRecord};
use crate::config::{APP_DIR_NAME, DATA_DIR_ENV};
use crate::error::{AppError, AppResult};
use crate::progress::HabitStats;
use crate::reminder::Reminder;
use chrono::Utc;
use log::{debug, info, warn};
use merge::{merge_stores, ReminderStore};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

pub use remote::RemoteStore;
pub use settings::{load_settings, save_settings, RemoteSettings, Settings};

/// Main storage struct managing local persistence and the optional remote copy
pub struct Storage {
    data: ReminderStore,
    app_data_path: PathBuf,
    remote: Option<RemoteStore>,
}

/// Platform data directory, overridable through the environment.
pub fn default_data_dir() -> AppResult<PathBuf> {
    if let Ok(dir) = std::env::var(DATA_DIR_ENV) {
        return Ok(PathBuf::from(dir));
    }
    dirs::data_local_dir()
        .map(|d| d.join(APP_DIR_NAME))
        .ok_or_else(|| AppError::storage("Failed to get local data dir"))
}

impl Storage {
    pub fn new() -> AppResult<Self> {
        Self::open(default_data_dir()?)
    }

    pub fn open(app_data_path: PathBuf) -> AppResult<Self> {
        fs::create_dir_all(&app_data_path)?;
        let data = local::load_local(&app_data_path)?;
        debug!(
            "Loaded {} reminders, {} completions from {:?}",
            data.reminders.len(),
            data.completions.len(),
            app_data_path
        );
        Ok(Self {
            data,
            app_data_path,
            remote: None,
        })
    }

    /// Attach a remote document store. Writes go to both copies from now on.
    pub fn connect_remote(&mut self, remote: RemoteStore) {
        self.remote = Some(remote);
    }

    pub fn has_remote(&self) -> bool {
        self.remote.is_some()
    }

    pub fn app_data_path(&self) -> &Path {
        &self.app_data_path
    }

    fn save_local(&self) -> AppResult<()> {
        local::save_local(&self.app_data_path, &self.data)
    }

    /// Conditionally write the store to the remote, advancing the revision.
    fn push(&mut self, expected_revision: Option<u64>) -> AppResult<()> {
        let remote = match &self.remote {
            Some(r) => r,
            None => return Ok(()),
        };
        let mut next = self.data.clone();
        next.revision = self.data.revision.max(expected_revision.unwrap_or(0)) + 1;
        remote.save(&next, expected_revision)?;
        self.data.revision = next.revision;
        self.save_local()
    }

    /// Persist the current data; on a local failure restore `before`.
    ///
    /// A remote failure leaves the local write in place and is reported.
    fn commit(&mut self, before: ReminderStore) -> AppResult<()> {
        if let Err(e) = self.save_local() {
            self.data = before;
            return Err(e);
        }

        if self.remote.is_some() {
            let expected = match self.data.revision {
                0 => None,
                rev => Some(rev),
            };
            if let Err(e) = self.push(expected) {
                warn!("Failed to save to remote: {}", e);
                return Err(match e {
                    AppError::Conflict(_) => {
                        AppError::conflict("Saved locally but remote changed; sync required")
                    }
                    other => AppError::network(format!(
                        "Saved locally but remote sync failed: {}",
                        other
                    )),
                });
            }
        }

        Ok(())
    }

    /// Pull the remote copy, merge it in, and write the result back to both sides.
    ///
    /// Returns `false` when no remote is configured.
    pub fn sync(&mut self) -> AppResult<bool> {
        let loaded = match &self.remote {
            Some(remote) => remote.load()?,
            None => return Ok(false),
        };

        let expected = match loaded {
            Some(remote_data) => {
                let rev = remote_data.revision;
                let local_count = self.data.reminders.len() + self.data.completions.len();
                info!(
                    "Merging {} local items with remote revision {}",
                    local_count, rev
                );
                self.data = merge_stores(&self.data, &remote_data);
                Some(rev)
            }
            None => None,
        };

        self.push(expected)?;
        info!(
            "Sync complete at revision {}: {} reminders, {} completions",
            self.data.revision,
            self.data.reminders.len(),
            self.data.completions.len()
        );
        Ok(true)
    }

    // ============ Public API ============

    pub fn reminders(&self) -> &[Reminder] {
        &self.data.reminders
    }

    pub fn get_reminder(&self, id: &str) -> Option<&Reminder> {
        self.data.reminders.iter().find(|r| r.id == id)
    }

    pub fn completions(&self) -> &CompletionLog {
        &self.data.completions
    }

    pub fn stats(&self, habit_id: &str) -> Option<&HabitStats> {
        self.data.stats.get(habit_id)
    }

    pub fn all_stats(&self) -> &HashMap<String, HabitStats> {
        &self.data.stats
    }

    pub fn add_reminder(&mut self, mut reminder: Reminder) -> AppResult<String> {
        reminder.validate()?;
        if reminder.id.is_empty() {
            reminder.id = uuid::Uuid::new_v4().to_string();
        } else if self.get_reminder(&reminder.id).is_some() {
            return Err(AppError::validation(format!(
                "Reminder {} already exists",
                reminder.id
            )));
        }
        let now = Utc::now();
        reminder.created_at = now;
        reminder.updated_at = now;
        reminder.version = 1;
        let id = reminder.id.clone();

        let before = self.data.clone();
        self.data.deleted.remove(&id);
        self.data.reminders.push(reminder);
        self.commit(before)?;
        Ok(id)
    }

    /// Replace a reminder's definition, bumping its version.
    pub fn update_reminder(&mut self, mut reminder: Reminder) -> AppResult<()> {
        reminder.validate()?;
        let pos = self
            .data
            .reminders
            .iter()
            .position(|r| r.id == reminder.id)
            .ok_or_else(|| AppError::not_found(format!("Reminder {}", reminder.id)))?;

        let existing = &self.data.reminders[pos];
        reminder.created_at = existing.created_at;
        reminder.version = existing.version + 1;
        reminder.updated_at = Utc::now();

        let before = self.data.clone();
        self.data.reminders[pos] = reminder;
        self.commit(before)
    }

    pub fn set_active(&mut self, id: &str, active: bool) -> AppResult<Reminder> {
        let mut reminder = self
            .get_reminder(id)
            .cloned()
            .ok_or_else(|| AppError::not_found(format!("Reminder {}", id)))?;
        reminder.is_active = active;
        self.update_reminder(reminder)?;
        self.get_reminder(id)
            .cloned()
            .ok_or_else(|| AppError::not_found(format!("Reminder {}", id)))
    }

    /// Remove a reminder. Its completion history is kept.
    pub fn delete_reminder(&mut self, id: &str) -> AppResult<()> {
        if self.get_reminder(id).is_none() {
            return Err(AppError::not_found(format!("Reminder {}", id)));
        }
        let before = self.data.clone();
        self.data.reminders.retain(|r| r.id != id);
        self.data.stats.remove(id);
        self.data.deleted.insert(id.to_string());
        self.commit(before)
    }

    pub fn append_completion(&mut self, record: CompletionRecord) -> AppResult<()> {
        self.append_completions(vec![record])
    }

    pub fn append_completions(&mut self, records: Vec<CompletionRecord>) -> AppResult<()> {
        if records.is_empty() {
            return Ok(());
        }
        let before = self.data.clone();
        for record in records {
            self.data.completions.append(record);
        }
        self.commit(before)
    }

    pub fn set_stats(&mut self, stats: HashMap<String, HabitStats>) -> AppResult<()> {
        if stats == self.data.stats {
            return Ok(());
        }
        let before = self.data.clone();
        self.data.stats = stats;
        self.commit(before)
    }
}
