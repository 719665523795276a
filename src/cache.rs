//! Process-wide cache of built document indexes, keyed by document URL.
//!
//! Each URL moves through [`DocumentState::Unseen`] →
//! [`DocumentState::Processing`] → [`DocumentState::Ready`]. Builds are
//! serialized per URL: concurrent callers asking for the same document wait
//! on one build instead of starting their own. The build itself runs on a
//! spawned task that owns the URL's lock, so it is never cut short by a
//! caller going away. A failed build publishes nothing, so the URL stays
//! `Unseen` and the next request retries.

use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde::Serialize;

use crate::error::{RagError, Result};
use crate::index::VectorIndex;

/// Lifecycle of one document URL.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentState {
    Unseen,
    Processing,
    Ready,
}

/// A fully built document: its chunks live inside `index`.
#[derive(Debug)]
pub struct DocumentEntry {
    pub url: String,
    pub file_type: String,
    /// Characters of normalized text.
    pub text_length: usize,
    pub index: VectorIndex,
}

impl DocumentEntry {
    pub fn chunk_count(&self) -> usize {
        self.index.len()
    }
}

type BuildLock = Arc<tokio::sync::Mutex<()>>;
type BuildGuard = tokio::sync::OwnedMutexGuard<()>;

#[derive(Default)]
struct Inner {
    /// One entry per URL with a build running or waited on.
    locks: HashMap<String, BuildLock>,
    ready: HashMap<String, Arc<DocumentEntry>>,
    /// Bumped by `clear`; builds started before a clear do not publish.
    generation: u64,
}

impl Inner {
    /// Forget the lock for `url` once `guard` is its only holder besides the map.
    fn release(&mut self, url: &str, guard: &BuildGuard) {
        let lock = BuildGuard::mutex(guard);
        let unused = self.locks.get(url).is_some_and(|held| Arc::ptr_eq(held, lock))
            && Arc::strong_count(lock) == 2;
        if unused {
            self.locks.remove(url);
        }
    }
}

fn lock_inner(inner: &Mutex<Inner>) -> MutexGuard<'_, Inner> {
    inner.lock().unwrap_or_else(PoisonError::into_inner)
}

#[derive(Default)]
pub struct DocumentCache {
    inner: Arc<Mutex<Inner>>,
}

impl DocumentCache {
    pub fn new() -> Self {
        Self::default()
    }

    fn inner(&self) -> MutexGuard<'_, Inner> {
        lock_inner(&self.inner)
    }

    pub fn get(&self, url: &str) -> Option<Arc<DocumentEntry>> {
        self.inner().ready.get(url).cloned()
    }

    /// Return the cached entry for `url`, running `build` if there is none.
    ///
    /// At most one `build` runs per URL at a time; callers that arrive while
    /// it runs wait and then share its result. The build runs on its own
    /// task, so it completes and publishes even if the caller that started
    /// it is dropped. Errors from `build` propagate and leave no entry behind.
    pub async fn get_or_build<F, Fut>(&self, url: &str, build: F) -> Result<Arc<DocumentEntry>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<DocumentEntry>> + Send + 'static,
    {
        let lock = {
            let mut inner = self.inner();
            if let Some(entry) = inner.ready.get(url) {
                tracing::debug!(url, "document cache hit");
                return Ok(entry.clone());
            }
            inner.locks.entry(url.to_string()).or_default().clone()
        };

        let guard = lock.lock_owned().await;

        let generation = {
            let mut inner = self.inner();
            if let Some(entry) = inner.ready.get(url).cloned() {
                tracing::debug!(url, "document built by a concurrent request");
                inner.release(url, &guard);
                return Ok(entry);
            }
            inner.generation
        };

        tracing::info!(url, "processing new document");
        let task = tokio::spawn(run_build(
            self.inner.clone(),
            url.to_string(),
            generation,
            guard,
            build(),
        ));
        task.await
            .map_err(|e| RagError::BuildTask(e.to_string()))?
    }

    pub fn state(&self, url: &str) -> DocumentState {
        let inner = self.inner();
        if inner.ready.contains_key(url) {
            return DocumentState::Ready;
        }
        match inner.locks.get(url) {
            Some(lock) if lock.try_lock().is_err() => DocumentState::Processing,
            _ => DocumentState::Unseen,
        }
    }

    /// Ready entries, ordered by URL.
    pub fn ready_entries(&self) -> Vec<Arc<DocumentEntry>> {
        let mut entries: Vec<_> = self.inner().ready.values().cloned().collect();
        entries.sort_by(|a, b| a.url.cmp(&b.url));
        entries
    }

    pub fn len(&self) -> usize {
        self.inner().ready.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop every ready entry. Builds in flight keep their lock and finish
    /// for their callers, but are not cached.
    pub fn clear(&self) {
        let mut inner = self.inner();
        let dropped = inner.ready.len();
        inner.ready.clear();
        inner.generation += 1;
        tracing::info!(dropped, "document cache cleared");
    }
}

/// Body of the build task. Holds `guard` until the outcome is recorded.
async fn run_build<Fut>(
    shared: Arc<Mutex<Inner>>,
    url: String,
    generation: u64,
    guard: BuildGuard,
    build: Fut,
) -> Result<Arc<DocumentEntry>>
where
    Fut: Future<Output = Result<DocumentEntry>>,
{
    let result = build.await.map(Arc::new);

    let mut inner = lock_inner(&shared);
    match &result {
        Ok(entry) if inner.generation == generation => {
            inner.ready.insert(url.clone(), entry.clone());
            tracing::info!(url = %url, chunks = entry.chunk_count(), "document ready");
        }
        Ok(_) => {
            tracing::info!(url = %url, "cache cleared during build, result not cached");
        }
        Err(e) => {
            tracing::error!(url = %url, error = %e, "document build failed");
        }
    }
    inner.release(&url, &guard);
    drop(inner);
    drop(guard);
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    fn entry(url: &str) -> DocumentEntry {
        let mut index = VectorIndex::new();
        index.insert_all(Vec::new(), Vec::new(), 2).unwrap();
        DocumentEntry {
            url: url.to_string(),
            file_type: ".pdf".to_string(),
            text_length: 0,
            index,
        }
    }

    /// A 100 ms build that records how many builds overlap.
    async fn overlapping_build(
        active: Arc<AtomicUsize>,
        peak: Arc<AtomicUsize>,
    ) -> Result<DocumentEntry> {
        let now = active.fetch_add(1, Ordering::SeqCst) + 1;
        peak.fetch_max(now, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(100)).await;
        active.fetch_sub(1, Ordering::SeqCst);
        Ok(entry("doc-a"))
    }

    #[tokio::test]
    async fn test_build_once_then_hit() {
        let cache = DocumentCache::new();
        let builds = Arc::new(AtomicUsize::new(0));

        for _ in 0..3 {
            let builds = builds.clone();
            cache
                .get_or_build("doc-a", || async move {
                    builds.fetch_add(1, Ordering::SeqCst);
                    Ok(entry("doc-a"))
                })
                .await
                .unwrap();
        }

        assert_eq!(builds.load(Ordering::SeqCst), 1);
        assert_eq!(cache.state("doc-a"), DocumentState::Ready);
        assert_eq!(cache.state("doc-b"), DocumentState::Unseen);
    }

    #[tokio::test]
    async fn test_failed_build_reverts_to_unseen() {
        let cache = DocumentCache::new();
        let err = cache
            .get_or_build("doc-a", || async {
                Err(RagError::Download("HTTP 404".to_string()))
            })
            .await
            .unwrap_err();
        assert!(matches!(err, RagError::Download(_)));
        assert_eq!(cache.state("doc-a"), DocumentState::Unseen);
        assert!(cache.is_empty());

        cache
            .get_or_build("doc-a", || async { Ok(entry("doc-a")) })
            .await
            .unwrap();
        assert_eq!(cache.state("doc-a"), DocumentState::Ready);
    }

    #[tokio::test]
    async fn test_lock_entries_released_after_builds() {
        let cache = DocumentCache::new();

        for i in 0..5 {
            let url = format!("https://example.com/missing-{i}.pdf");
            let result = cache
                .get_or_build(&url, || async {
                    Err(RagError::Download("HTTP 404".to_string()))
                })
                .await;
            assert!(result.is_err());
        }
        assert!(cache.inner().locks.is_empty());

        cache
            .get_or_build("doc-a", || async { Ok(entry("doc-a")) })
            .await
            .unwrap();
        assert!(cache.inner().locks.is_empty());
        assert_eq!(cache.state("doc-a"), DocumentState::Ready);
    }

    #[tokio::test]
    async fn test_processing_state_visible_during_build() {
        let cache = Arc::new(DocumentCache::new());
        let (started_tx, started_rx) = tokio::sync::oneshot::channel();
        let (release_tx, release_rx) = tokio::sync::oneshot::channel::<()>();

        let task = {
            let cache = cache.clone();
            tokio::spawn(async move {
                cache
                    .get_or_build("doc-a", || async move {
                        let _ = started_tx.send(());
                        let _ = release_rx.await;
                        Ok(entry("doc-a"))
                    })
                    .await
            })
        };

        started_rx.await.unwrap();
        assert_eq!(cache.state("doc-a"), DocumentState::Processing);
        release_tx.send(()).unwrap();
        task.await.unwrap().unwrap();
        assert_eq!(cache.state("doc-a"), DocumentState::Ready);
    }

    #[tokio::test]
    async fn test_concurrent_requests_share_one_build() {
        let cache = Arc::new(DocumentCache::new());
        let builds = Arc::new(AtomicUsize::new(0));

        let tasks: Vec<_> = (0..8)
            .map(|_| {
                let cache = cache.clone();
                let builds = builds.clone();
                tokio::spawn(async move {
                    cache
                        .get_or_build("doc-a", || async move {
                            builds.fetch_add(1, Ordering::SeqCst);
                            tokio::time::sleep(Duration::from_millis(50)).await;
                            Ok(entry("doc-a"))
                        })
                        .await
                })
            })
            .collect();

        for task in tasks {
            task.await.unwrap().unwrap();
        }
        assert_eq!(builds.load(Ordering::SeqCst), 1);
        assert!(cache.inner().locks.is_empty());
    }

    #[tokio::test]
    async fn test_build_finishes_after_caller_is_dropped() {
        let cache = Arc::new(DocumentCache::new());
        let completed = Arc::new(AtomicUsize::new(0));
        let (started_tx, started_rx) = tokio::sync::oneshot::channel();

        let caller = {
            let cache = cache.clone();
            let completed = completed.clone();
            tokio::spawn(async move {
                cache
                    .get_or_build("doc-a", || async move {
                        let _ = started_tx.send(());
                        tokio::time::sleep(Duration::from_millis(100)).await;
                        completed.fetch_add(1, Ordering::SeqCst);
                        Ok(entry("doc-a"))
                    })
                    .await
            })
        };

        started_rx.await.unwrap();
        caller.abort();
        assert!(caller.await.unwrap_err().is_cancelled());
        assert_eq!(cache.state("doc-a"), DocumentState::Processing);

        let later = completed.clone();
        let built = cache
            .get_or_build("doc-a", || async move {
                later.fetch_add(1, Ordering::SeqCst);
                Ok(entry("doc-a"))
            })
            .await
            .unwrap();

        assert_eq!(built.url, "doc-a");
        assert_eq!(completed.load(Ordering::SeqCst), 1);
        assert_eq!(cache.state("doc-a"), DocumentState::Ready);
    }

    #[tokio::test]
    async fn test_clear_during_build_keeps_one_builder() {
        let cache = Arc::new(DocumentCache::new());
        let active = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));

        let request = || {
            let cache = cache.clone();
            let active = active.clone();
            let peak = peak.clone();
            tokio::spawn(async move {
                cache
                    .get_or_build("doc-a", || overlapping_build(active, peak))
                    .await
            })
        };

        let first = request();
        tokio::time::sleep(Duration::from_millis(30)).await;
        assert_eq!(cache.state("doc-a"), DocumentState::Processing);

        cache.clear();
        assert_eq!(cache.state("doc-a"), DocumentState::Processing);

        let second = request();
        first.await.unwrap().unwrap();
        second.await.unwrap().unwrap();

        assert_eq!(peak.load(Ordering::SeqCst), 1);
        assert_eq!(cache.state("doc-a"), DocumentState::Ready);
        assert!(cache.inner().locks.is_empty());
    }

    #[tokio::test]
    async fn test_clear_forgets_entries() {
        let cache = DocumentCache::new();
        for url in ["b", "a"] {
            cache
                .get_or_build(url, || async move { Ok(entry(url)) })
                .await
                .unwrap();
        }
        let urls: Vec<_> = cache.ready_entries().iter().map(|e| e.url.clone()).collect();
        assert_eq!(urls, vec!["a", "b"]);

        cache.clear();
        assert!(cache.is_empty());
        assert_eq!(cache.state("a"), DocumentState::Unseen);
        assert!(cache.get("a").is_none());
    }
}
