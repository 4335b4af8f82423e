use crate::config::{DEFAULT_MISSED_GRACE_MINUTES, MAX_MISSED_GRACE_MINUTES, SETTINGS_FILE};
use log::warn;
use crate::error::AppResult;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Connection details for the remote document store.
///
/// The access token comes from whatever sign-in flow the embedding app uses.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoteSettings {
    pub base_url: String,
    pub document_path: String,
    pub access_token: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default = "default_true")]
    pub notifications_enabled: bool,
    #[serde(default = "default_grace")]
    pub missed_grace_minutes: i64,
    #[serde(default)]
    pub remote: Option<RemoteSettings>,
}

fn default_true() -> bool {
    true
}

fn default_grace() -> i64 {
    DEFAULT_MISSED_GRACE_MINUTES
}

impl Settings {
    /// Pull out-of-range values back into bounds.
    fn normalized(mut self) -> Self {
        let grace = self.missed_grace_minutes.clamp(0, MAX_MISSED_GRACE_MINUTES);
        if grace != self.missed_grace_minutes {
            warn!(
                "missed_grace_minutes {} out of range, using {}",
                self.missed_grace_minutes, grace
            );
            self.missed_grace_minutes = grace;
        }
        self
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            notifications_enabled: true,
            missed_grace_minutes: DEFAULT_MISSED_GRACE_MINUTES,
            remote: None,
        }
    }
}

/// Load settings, falling back to defaults when the file is missing
pub fn load_settings(app_data_path: &Path) -> AppResult<Settings> {
    let path = app_data_path.join(SETTINGS_FILE);
    if !path.exists() {
        return Ok(Settings::default());
    }
    let content = fs::read_to_string(&path)?;
    let settings: Settings = serde_json::from_str(&content)?;
    Ok(settings.normalized())
}

pub fn save_settings(app_data_path: &Path, settings: &Settings) -> AppResult<()> {
    let content = serde_json::to_string_pretty(settings)?;
    fs::write(app_data_path.join(SETTINGS_FILE), content)?;
    Ok(())
}
