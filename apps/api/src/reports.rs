//! Transient report storage. Reports live in a temp directory owned by the
//! process. Each save sweeps out reports older than the TTL and the oldest
//! ones beyond the cap; whatever is left disappears when the process exits.

use std::collections::VecDeque;
use std::io;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tempfile::TempDir;
use tokio::time::Instant;
use tracing::{debug, warn};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportFormat {
    Markdown,
    Pdf,
}

impl ReportFormat {
    const ALL: [ReportFormat; 2] = [ReportFormat::Markdown, ReportFormat::Pdf];

    fn extension(self) -> &'static str {
        match self {
            ReportFormat::Markdown => "md",
            ReportFormat::Pdf => "pdf",
        }
    }

    pub fn content_type(self) -> &'static str {
        match self {
            ReportFormat::Markdown => "text/markdown; charset=utf-8",
            ReportFormat::Pdf => "application/pdf",
        }
    }

    pub fn download_name(self) -> &'static str {
        match self {
            ReportFormat::Markdown => "jdmatch_report.md",
            ReportFormat::Pdf => "jdmatch_report.pdf",
        }
    }
}

/// Retention limits for stored reports.
#[derive(Debug, Clone, Copy)]
pub struct Retention {
    pub ttl: Duration,
    pub max_reports: usize,
}

#[derive(Clone)]
pub struct ReportStore {
    dir: Arc<TempDir>,
    retention: Retention,
    /// Live reports, oldest first.
    index: Arc<Mutex<VecDeque<(Uuid, Instant)>>>,
}

impl ReportStore {
    pub fn new(retention: Retention) -> io::Result<Self> {
        let dir = tempfile::Builder::new().prefix("jdmatch-reports-").tempdir()?;
        debug!("Report directory: {}", dir.path().display());
        Ok(Self {
            dir: Arc::new(dir),
            retention,
            index: Arc::new(Mutex::new(VecDeque::new())),
        })
    }

    fn path(&self, id: Uuid, format: ReportFormat) -> PathBuf {
        self.dir
            .path()
            .join(format!("{}.{}", id, format.extension()))
    }

    fn lock_index(&self) -> io::Result<std::sync::MutexGuard<'_, VecDeque<(Uuid, Instant)>>> {
        self.index
            .lock()
            .map_err(|_| io::Error::new(io::ErrorKind::Other, "report index poisoned"))
    }

    fn is_expired(&self, created: Instant, now: Instant) -> bool {
        now.duration_since(created) >= self.retention.ttl
    }

    pub async fn save(&self, id: Uuid, format: ReportFormat, contents: &[u8]) -> io::Result<()> {
        let evicted = {
            let mut index = self.lock_index()?;
            let now = Instant::now();
            if !index.iter().any(|(known, _)| *known == id) {
                index.push_back((id, now));
            }

            let mut evicted = Vec::new();
            while let Some(&(oldest, created)) = index.front() {
                let over_cap = index.len() > self.retention.max_reports.max(1);
                if oldest == id || !(over_cap || self.is_expired(created, now)) {
                    break;
                }
                index.pop_front();
                evicted.push(oldest);
            }
            evicted
        };

        for old in evicted {
            self.remove_files(old).await;
        }

        tokio::fs::write(self.path(id, format), contents).await
    }

    /// Returns `None` when no live report of that format exists for `id`.
    pub async fn load(&self, id: Uuid, format: ReportFormat) -> io::Result<Option<Vec<u8>>> {
        let expired = {
            let index = self.lock_index()?;
            match index.iter().find(|(known, _)| *known == id) {
                Some(&(_, created)) => self.is_expired(created, Instant::now()),
                None => return Ok(None),
            }
        };
        if expired {
            return Ok(None);
        }

        match tokio::fs::read(self.path(id, format)).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e),
        }
    }

    async fn remove_files(&self, id: Uuid) {
        for format in ReportFormat::ALL {
            match tokio::fs::remove_file(self.path(id, format)).await {
                Ok(()) => debug!("Evicted {} report {id}", format.extension()),
                Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                Err(e) => warn!("Failed to remove report {id}: {e}"),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const HOUR: Duration = Duration::from_secs(3600);

    fn store(ttl: Duration, max_reports: usize) -> ReportStore {
        ReportStore::new(Retention { ttl, max_reports }).unwrap()
    }

    #[tokio::test]
    async fn test_saved_markdown_is_loadable() {
        let store = store(HOUR, 10);
        let id = Uuid::new_v4();
        store
            .save(id, ReportFormat::Markdown, b"# Report")
            .await
            .unwrap();

        let loaded = store.load(id, ReportFormat::Markdown).await.unwrap();
        assert_eq!(loaded.as_deref(), Some(&b"# Report"[..]));
    }

    #[tokio::test]
    async fn test_missing_format_is_none() {
        let store = store(HOUR, 10);
        let id = Uuid::new_v4();
        store.save(id, ReportFormat::Markdown, b"x").await.unwrap();

        assert!(store.load(id, ReportFormat::Pdf).await.unwrap().is_none());
        assert!(store
            .load(Uuid::new_v4(), ReportFormat::Markdown)
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_expired_reports_are_swept_on_save() {
        let store = store(HOUR, 10);
        let old = Uuid::new_v4();
        store.save(old, ReportFormat::Markdown, b"old").await.unwrap();
        store.save(old, ReportFormat::Pdf, b"%PDF-old").await.unwrap();

        tokio::time::advance(HOUR + Duration::from_secs(1)).await;
        assert!(store.load(old, ReportFormat::Markdown).await.unwrap().is_none());

        let fresh = Uuid::new_v4();
        store.save(fresh, ReportFormat::Markdown, b"new").await.unwrap();

        assert!(!store.path(old, ReportFormat::Markdown).exists());
        assert!(!store.path(old, ReportFormat::Pdf).exists());
        assert!(store.load(fresh, ReportFormat::Markdown).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_oldest_report_is_evicted_beyond_cap() {
        let store = store(HOUR, 2);
        let ids: Vec<Uuid> = (0..3).map(|_| Uuid::new_v4()).collect();
        for id in &ids {
            store.save(*id, ReportFormat::Markdown, b"r").await.unwrap();
        }

        assert!(!store.path(ids[0], ReportFormat::Markdown).exists());
        assert!(store.load(ids[0], ReportFormat::Markdown).await.unwrap().is_none());
        assert!(store.load(ids[1], ReportFormat::Markdown).await.unwrap().is_some());
        assert!(store.load(ids[2], ReportFormat::Markdown).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_second_format_does_not_count_as_new_report() {
        let store = store(HOUR, 1);
        let id = Uuid::new_v4();
        store.save(id, ReportFormat::Markdown, b"md").await.unwrap();
        store.save(id, ReportFormat::Pdf, b"%PDF").await.unwrap();

        assert!(store.load(id, ReportFormat::Markdown).await.unwrap().is_some());
        assert!(store.load(id, ReportFormat::Pdf).await.unwrap().is_some());
    }

    #[test]
    fn test_download_names() {
        assert_eq!(ReportFormat::Markdown.download_name(), "jdmatch_report.md");
        assert_eq!(ReportFormat::Pdf.content_type(), "application/pdf");
    }
}
