use crate::config::{LEGACY_BACKUP_FILE, STORE_FILE};
use crate::error::{AppError, AppResult};
use crate::storage::legacy::try_migrate_legacy_data;
use crate::storage::merge::ReminderStore;
use log::warn;
use std::fs;
use std::path::Path;

/// Load reminders from the local JSON file
pub fn load_local(app_data_path: &Path) -> AppResult<ReminderStore> {
    let path = app_data_path.join(STORE_FILE);

    if !path.exists() {
        return Ok(ReminderStore::default());
    }

    let content = fs::read_to_string(&path)?;

    // Older files still key history by composite task ids
    let backup_path = app_data_path.join(LEGACY_BACKUP_FILE);
    if let Some(migrated) = try_migrate_legacy_data(&content, Some(&backup_path)) {
        // Save migrated data immediately
        save_local(app_data_path, &migrated)?;
        return Ok(migrated);
    }

    serde_json::from_str::<ReminderStore>(&content).map_err(|e| {
        warn!("Store file {:?} is unreadable: {}", path, e);
        AppError::storage(format!("Unreadable store file: {}", e))
    })
}

/// Save reminders to the local JSON file
pub fn save_local(app_data_path: &Path, data: &ReminderStore) -> AppResult<()> {
    let path = app_data_path.join(STORE_FILE);
    let content = serde_json::to_string_pretty(data)?;
    // Write then rename; readers never see a partial file
    let tmp = path.with_extension("json.tmp");
    fs::write(&tmp, content)?;
    fs::rename(&tmp, &path)?;
    Ok(())
}
