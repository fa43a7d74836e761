use crate::core::error::{PollError, Result};
use crate::core::models::{JobType, PollingJob};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

/// String key-value storage backing durable polling state.
pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>>;
    fn set(&self, key: &str, value: &str) -> Result<()>;
    fn remove(&self, key: &str) -> Result<()>;
}

/// One `<key>.json` file per key under a state directory.
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn path_for(&self, key: &str) -> Result<PathBuf> {
        let valid = !key.is_empty()
            && !key.starts_with('.')
            && key
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_'));
        if !valid {
            return Err(PollError::Store(format!("Invalid storage key: {key:?}")));
        }
        Ok(self.dir.join(format!("{key}.json")))
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        let path = self.path_for(key)?;
        match std::fs::read_to_string(&path) {
            Ok(content) => Ok(Some(content)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        let path = self.path_for(key)?;
        std::fs::create_dir_all(&self.dir)?;

        let tmp = path.with_extension("json.tmp");
        std::fs::write(&tmp, value)?;
        std::fs::rename(&tmp, &path)?;

        tracing::trace!(?path, "Wrote state file");
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        let path = self.path_for(key)?;
        match std::fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

#[allow(dead_code)]
#[derive(Clone, Default)]
pub struct MemoryStore {
    entries: Arc<Mutex<HashMap<String, String>>>,
}

#[allow(dead_code)]
impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn entries(&self) -> Result<std::sync::MutexGuard<'_, HashMap<String, String>>> {
        self.entries
            .lock()
            .map_err(|_| PollError::Store("memory store lock poisoned".to_string()))
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.entries()?.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        self.entries()?.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        self.entries()?.remove(key);
        Ok(())
    }
}

/// Typed persistence of [`PollingJob`]s, one record per job type.
#[derive(Clone)]
pub struct JobStore {
    backend: Arc<dyn KeyValueStore>,
}

impl JobStore {
    pub fn new(backend: Arc<dyn KeyValueStore>) -> Self {
        Self { backend }
    }

    pub fn load(&self, job_type: JobType) -> Result<Option<PollingJob>> {
        let Some(raw) = self.backend.get(job_type.storage_key())? else {
            return Ok(None);
        };

        match serde_json::from_str::<PollingJob>(&raw) {
            Ok(job) if job.job_type == job_type => Ok(Some(job)),
            Ok(job) => {
                tracing::warn!(
                    %job_type,
                    stored_type = %job.job_type,
                    "Discarding persisted job stored under the wrong key"
                );
                self.backend.remove(job_type.storage_key())?;
                Ok(None)
            }
            Err(e) => {
                tracing::warn!(%job_type, error = %e, "Discarding unreadable persisted job");
                self.backend.remove(job_type.storage_key())?;
                Ok(None)
            }
        }
    }

    pub fn save(&self, job: &PollingJob) -> Result<()> {
        let raw = serde_json::to_string(job)?;
        self.backend.set(job.job_type.storage_key(), &raw)?;
        tracing::debug!(
            job_type = %job.job_type,
            job_id = %job.job_id,
            status = %job.status,
            retry_count = job.retry_count,
            "Persisted polling state"
        );
        Ok(())
    }

    pub fn clear(&self, job_type: JobType) -> Result<()> {
        self.backend.remove(job_type.storage_key())
    }
}
