use dex_types::Reminder;
use std::path::PathBuf;
use tokio::sync::Mutex;

#[derive(Debug, thiserror::Error)]
pub enum ReminderStoreError {
    #[error("failed to read reminders file: {0}")]
    Read(#[source] std::io::Error),
    #[error("failed to write reminders file: {0}")]
    Write(#[source] std::io::Error),
    #[error("failed to parse reminders file: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Durable `reminders.json` store shared by the `reminder_set`/`reminder_list`
/// tools (which create and read entries) and the reminder monitor (which
/// flips `is_active` once a reminder fires). Persistence is write-then-replace:
/// the new content lands in a sibling temp file that is renamed over the
/// target, so a reader never observes a partially written file.
pub struct ReminderStore {
    path: PathBuf,
    lock: Mutex<()>,
}

impl ReminderStore {
    pub fn new(path: PathBuf) -> Self {
        Self { path, lock: Mutex::new(()) }
    }

    pub async fn load(&self) -> Result<Vec<Reminder>, ReminderStoreError> {
        let _guard = self.lock.lock().await;
        self.load_locked().await
    }

    /// Parses each stored reminder independently rather than deserializing
    /// the whole array in one shot, so a single malformed entry (e.g. a
    /// `scheduled_time` that no longer parses) is logged and dropped instead
    /// of taking every other reminder down with it.
    async fn load_locked(&self) -> Result<Vec<Reminder>, ReminderStoreError> {
        let bytes = match tokio::fs::read(&self.path).await {
            Ok(bytes) if bytes.is_empty() => return Ok(Vec::new()),
            Ok(bytes) => bytes,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(err) => return Err(ReminderStoreError::Read(err)),
        };
        let raw: Vec<serde_json::Value> = serde_json::from_slice(&bytes)?;
        let reminders = raw
            .into_iter()
            .filter_map(|entry| match serde_json::from_value::<Reminder>(entry.clone()) {
                Ok(reminder) => Some(reminder),
                Err(err) => {
                    tracing::error!(error = %err, entry = %entry, "skipping malformed reminder entry");
                    None
                }
            })
            .collect();
        Ok(reminders)
    }

    async fn save_locked(&self, reminders: &[Reminder]) -> Result<(), ReminderStoreError> {
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await.map_err(ReminderStoreError::Write)?;
        }
        let body = serde_json::to_vec_pretty(reminders)?;
        let tmp_path = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp_path, body).await.map_err(ReminderStoreError::Write)?;
        tokio::fs::rename(&tmp_path, &self.path).await.map_err(ReminderStoreError::Write)?;
        Ok(())
    }

    pub async fn add(&self, reminder: Reminder) -> Result<(), ReminderStoreError> {
        let _guard = self.lock.lock().await;
        let mut reminders = self.load_locked().await?;
        reminders.push(reminder);
        self.save_locked(&reminders).await
    }

    pub async fn list(&self) -> Result<Vec<Reminder>, ReminderStoreError> {
        self.load().await
    }

    /// Replaces the full set, used by the reminder monitor after a tick.
    pub async fn save_all(&self, reminders: &[Reminder]) -> Result<(), ReminderStoreError> {
        let _guard = self.lock.lock().await;
        self.save_locked(reminders).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use dex_types::ReminderPriority;

    #[tokio::test]
    async fn add_then_list_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let store = ReminderStore::new(dir.path().join("reminders.json"));
        let reminder = Reminder::new("Take the bins out", Utc::now(), ReminderPriority::Normal);
        let id = reminder.id;
        store.add(reminder).await.unwrap();

        let listed = store.list().await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].id, id);
    }

    #[tokio::test]
    async fn missing_file_yields_empty_list() {
        let dir = tempfile::tempdir().unwrap();
        let store = ReminderStore::new(dir.path().join("does-not-exist.json"));
        assert!(store.list().await.unwrap().is_empty());
    }
}
