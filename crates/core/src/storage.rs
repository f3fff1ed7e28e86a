use anyhow::{Context, Result, bail};
use async_trait::async_trait;
use interview_types::InterviewRecord;
#[cfg(test)]
use mockall::automock;
use std::path::PathBuf;

/// Session ids end up in file names, so only a safe alphabet is accepted.
pub fn valid_session_id(id: &str) -> bool {
    !id.is_empty()
        && id.len() <= 64
        && id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
}

#[cfg_attr(test, automock)]
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Writes the record, replacing any earlier one for the same session.
    async fn persist(&self, record: &InterviewRecord) -> Result<PathBuf>;

    async fn load(&self, session_id: &str) -> Result<Option<InterviewRecord>>;

    /// All stored records, newest first.
    async fn list(&self) -> Result<Vec<InterviewRecord>>;
}

/// One pretty-printed JSON file per session.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    dir: PathBuf,
}

impl JsonFileStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn path_for(&self, session_id: &str) -> Result<PathBuf> {
        if !valid_session_id(session_id) {
            bail!("invalid session id '{session_id}'");
        }
        Ok(self.dir.join(format!("{session_id}.json")))
    }
}

#[async_trait]
impl RecordStore for JsonFileStore {
    async fn persist(&self, record: &InterviewRecord) -> Result<PathBuf> {
        let path = self.path_for(&record.session_id)?;
        tokio::fs::create_dir_all(&self.dir)
            .await
            .with_context(|| format!("creating {}", self.dir.display()))?;
        let json = serde_json::to_vec_pretty(record).context("serializing interview record")?;
        tokio::fs::write(&path, json)
            .await
            .with_context(|| format!("writing {}", path.display()))?;
        tracing::info!("interview saved to {}", path.display());
        Ok(path)
    }

    async fn load(&self, session_id: &str) -> Result<Option<InterviewRecord>> {
        let path = self.path_for(session_id)?;
        let bytes = match tokio::fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e).with_context(|| format!("reading {}", path.display())),
        };
        let record = serde_json::from_slice(&bytes)
            .with_context(|| format!("parsing {}", path.display()))?;
        Ok(Some(record))
    }

    async fn list(&self) -> Result<Vec<InterviewRecord>> {
        let mut entries = match tokio::fs::read_dir(&self.dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e).with_context(|| format!("listing {}", self.dir.display())),
        };

        let mut records = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            let parsed = tokio::fs::read(&path)
                .await
                .map_err(anyhow::Error::from)
                .and_then(|bytes| Ok(serde_json::from_slice::<InterviewRecord>(&bytes)?));
            match parsed {
                Ok(record) => records.push(record),
                Err(e) => tracing::warn!("skipping unreadable record {}: {}", path.display(), e),
            }
        }
        records.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        Ok(records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};

    fn record(id: &str, minutes_ago: i64) -> InterviewRecord {
        InterviewRecord {
            session_id: id.to_string(),
            timestamp: Utc::now() - Duration::minutes(minutes_ago),
            auto_ended: false,
            duration_minutes: 3.0,
            total_questions: 0,
            history: vec![],
            screen_contexts_count: 0,
            summary: None,
        }
    }

    #[test]
    fn session_ids_are_validated() {
        assert!(valid_session_id("20250101_120000_7"));
        assert!(!valid_session_id("../etc/passwd"));
        assert!(!valid_session_id(""));
        assert!(!valid_session_id("a b"));
    }

    #[tokio::test]
    async fn persist_then_load_and_list_newest_first() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::new(dir.path().join("history"));

        assert!(store.list().await.unwrap().is_empty());
        store.persist(&record("older", 10)).await.unwrap();
        let path = store.persist(&record("newer", 1)).await.unwrap();
        assert!(path.ends_with("newer.json"));
        tokio::fs::write(dir.path().join("history/broken.json"), b"{")
            .await
            .unwrap();

        let loaded = store.load("older").await.unwrap().unwrap();
        assert_eq!(loaded.session_id, "older");
        assert!(store.load("missing").await.unwrap().is_none());

        let ids: Vec<_> = store
            .list()
            .await
            .unwrap()
            .into_iter()
            .map(|r| r.session_id)
            .collect();
        assert_eq!(ids, vec!["newer", "older"]);
    }

    #[tokio::test]
    async fn rejects_path_traversal() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::new(dir.path());
        assert!(store.load("../secret").await.is_err());
    }
}
