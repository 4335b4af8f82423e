use crate::config::REMOTE_TIMEOUT_SECS;
use crate::error::{AppError, AppResult};
use crate::storage::merge::ReminderStore;
use crate::storage::settings::RemoteSettings;
use log::{debug, info};
use std::time::Duration;

/// Client for the remote copy of the store, kept as a single JSON document.
///
/// Writes are conditional on the revision last read (`If-Match`), so a
/// concurrent edit from another device is reported as a conflict instead of
/// being overwritten.
pub struct RemoteStore {
    agent: ureq::Agent,
    url: String,
    access_token: String,
}

impl RemoteStore {
    pub fn new(settings: &RemoteSettings) -> Self {
        let agent = ureq::AgentBuilder::new()
            .timeout(Duration::from_secs(REMOTE_TIMEOUT_SECS))
            .build();
        Self {
            agent,
            url: document_url(&settings.base_url, &settings.document_path),
            access_token: settings.access_token.clone(),
        }
    }

    /// Fetch the remote store. `None` when the document does not exist yet.
    pub fn load(&self) -> AppResult<Option<ReminderStore>> {
        let response = self
            .agent
            .get(&self.url)
            .set("Authorization", &format!("Bearer {}", self.access_token))
            .call();

        let response = match response {
            Ok(r) => r,
            Err(ureq::Error::Status(404, _)) => {
                debug!("Remote document {} does not exist yet", self.url);
                return Ok(None);
            }
            Err(e) => return Err(map_error(e)),
        };

        let content = response
            .into_string()
            .map_err(|e| AppError::network(e.to_string()))?;
        let data: ReminderStore = serde_json::from_str(&content)
            .map_err(|e| AppError::network(format!("Malformed remote document: {}", e)))?;
        debug!(
            "Loaded remote revision {} ({} reminders, {} completions)",
            data.revision,
            data.reminders.len(),
            data.completions.len()
        );
        Ok(Some(data))
    }

    /// Write `data` if the remote is still at `expected_revision`.
    ///
    /// `None` means the document is expected not to exist yet.
    pub fn save(&self, data: &ReminderStore, expected_revision: Option<u64>) -> AppResult<()> {
        let content = serde_json::to_string(data)?;
        let request = self
            .agent
            .put(&self.url)
            .set("Authorization", &format!("Bearer {}", self.access_token))
            .set("Content-Type", "application/json");
        let (header, value) = precondition(expected_revision);
        let request = request.set(header, &value);

        request.send_string(&content).map_err(map_error)?;
        info!("Saved remote revision {}", data.revision);
        Ok(())
    }
}

/// Conditional-write header: match the last seen revision, or require that
/// no document exists yet.
fn precondition(expected_revision: Option<u64>) -> (&'static str, String) {
    match expected_revision {
        Some(rev) => ("If-Match", format!("\"{}\"", rev)),
        None => ("If-None-Match", "*".to_string()),
    }
}

fn document_url(base_url: &str, document_path: &str) -> String {
    format!(
        "{}/{}",
        base_url.trim_end_matches('/'),
        document_path.trim_start_matches('/')
    )
}

fn map_error(error: ureq::Error) -> AppError {
    match error {
        ureq::Error::Status(401, _) | ureq::Error::Status(403, _) => {
            AppError::network("Access token rejected")
        }
        ureq::Error::Status(409, _) | ureq::Error::Status(412, _) => {
            AppError::conflict("Remote data changed since last sync")
        }
        ureq::Error::Status(code, _) => AppError::network(format!("Document store error: {}", code)),
        e => AppError::network(e.to_string()),
    }
}
