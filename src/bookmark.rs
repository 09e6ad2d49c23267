//! Reads bookmark info for many watched threads at once.

use std::io::Cursor;
use std::time::Duration;

use async_trait::async_trait;
use futures::prelude::*;
use log::{debug, warn};

use crate::config::Config;
use crate::model::{ThreadBookmarkInfo, ThreadDescriptor};
use crate::reader::PostLoader;
use crate::{Error, Result};

const DEFAULT_BATCH_SIZE: usize = 8;

/// Supplies raw thread payloads. Transport, retries and rate limiting are the
/// implementor's concern.
#[async_trait]
pub trait BookmarkFetcher: Send + Sync {
    async fn fetch_thread(&self, thread: &ThreadDescriptor) -> Result<Vec<u8>>;
}

#[derive(Debug, Clone, Copy)]
pub struct BookmarkBatcher {
    batch_size: usize,
    fetch_timeout: Option<Duration>,
    expected_capacity: usize,
}

impl Default for BookmarkBatcher {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
            fetch_timeout: None,
            expected_capacity: 0,
        }
    }
}

impl From<&Config> for BookmarkBatcher {
    fn from(config: &Config) -> Self {
        Self::default()
            .with_batch_size(config.bookmark_batch_size())
            .with_fetch_timeout(config.fetch_timeout)
    }
}

impl BookmarkBatcher {
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    pub fn with_fetch_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.fetch_timeout = timeout;
        self
    }

    /// Posts-per-thread hint handed to the decoders.
    pub fn with_expected_capacity(mut self, expected_capacity: usize) -> Self {
        self.expected_capacity = expected_capacity;
        self
    }

    /// One result per thread, in the order given. At most `batch_size`
    /// fetches are outstanding at once and a failing thread never fails its
    /// batch.
    pub async fn read_bookmark_infos<F: BookmarkFetcher + ?Sized>(
        &self,
        fetcher: &F,
        loader: &PostLoader,
        threads: &[ThreadDescriptor],
    ) -> Vec<Result<ThreadBookmarkInfo>> {
        let mut results = Vec::with_capacity(threads.len());
        for (i, batch) in threads.chunks(self.batch_size).enumerate() {
            debug!("Reading bookmark batch {} ({} threads)", i, batch.len());
            let infos = future::join_all(
                batch
                    .iter()
                    .map(|thread| self.read_one(fetcher, loader, thread)),
            )
            .await;
            results.extend(infos);
        }
        results
    }

    async fn read_one<F: BookmarkFetcher + ?Sized>(
        &self,
        fetcher: &F,
        loader: &PostLoader,
        thread: &ThreadDescriptor,
    ) -> Result<ThreadBookmarkInfo> {
        let body = match self.fetch_timeout {
            Some(timeout) => tokio::time::timeout(timeout, fetcher.fetch_thread(thread))
                .await
                .map_err(|_| {
                    Error::IO(std::io::Error::new(
                        std::io::ErrorKind::TimedOut,
                        format!("fetching {} timed out", thread),
                    ))
                })?,
            None => fetcher.fetch_thread(thread).await,
        };
        let info = match body {
            Ok(body) => {
                loader
                    .load_bookmark_info(thread.clone(), self.expected_capacity, Cursor::new(body))
                    .await
            }
            Err(err) => Err(err),
        };
        if let Err(err) = &info {
            warn!("Failed to read bookmark info for {}: {}", thread, err);
        }
        info
    }
}

/// [`BookmarkBatcher::read_bookmark_infos`] with the default batch size.
pub async fn read_bookmark_infos<F: BookmarkFetcher + ?Sized>(
    fetcher: &F,
    loader: &PostLoader,
    threads: &[ThreadDescriptor],
) -> Vec<Result<ThreadBookmarkInfo>> {
    BookmarkBatcher::default()
        .read_bookmark_infos(fetcher, loader, threads)
        .await
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use rustc_hash::FxHashMap;

    use super::*;
    use crate::model::{BoardDescriptor, BookmarkPost};
    use crate::reader::MemoryPostCache;
    use crate::site::{Board, Dialect, Site, SiteEndpoints, SiteRegistry};

    struct FakeFetcher {
        bodies: FxHashMap<u64, &'static str>,
        in_flight: AtomicUsize,
        max_in_flight: AtomicUsize,
    }

    #[async_trait]
    impl BookmarkFetcher for FakeFetcher {
        async fn fetch_thread(&self, thread: &ThreadDescriptor) -> Result<Vec<u8>> {
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_in_flight.fetch_max(now, Ordering::SeqCst);
            tokio::task::yield_now().await;
            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            self.bodies
                .get(&thread.thread_no())
                .map(|b| b.as_bytes().to_vec())
                .ok_or(Error::NotFound)
        }
    }

    fn loader() -> PostLoader {
        let site = Site::new(
            "4chan",
            Dialect::Futaba,
            SiteEndpoints::new(
                "https://i.4cdn.org/{board}/{tim}s.jpg",
                "https://i.4cdn.org/{board}/{tim}.{ext}",
            ),
        )
        .with_board(Board::new(BoardDescriptor::new("4chan", "g")));
        PostLoader::new(
            Arc::new(SiteRegistry::new().with_site(site)),
            Arc::new(MemoryPostCache::new()),
        )
    }

    #[tokio::test]
    async fn reads_in_batches_and_keeps_order() {
        let mut bodies = FxHashMap::default();
        bodies.insert(1, r#"{"posts":[{"no":1,"resto":0,"com":"one"},{"no":2,"resto":1,"com":"two"}]}"#);
        bodies.insert(3, r#"{"posts":[{"no":3,"resto":0,"closed":1,"com":"three"}]}"#);
        bodies.insert(4, r#"{"posts":[{"no":5,"resto":0,"com":"wrong op"}]}"#);
        let fetcher = FakeFetcher {
            bodies,
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
        };

        let threads: Vec<_> = (1..=4)
            .map(|no| ThreadDescriptor::new("4chan", "g", no))
            .collect();
        let results = BookmarkBatcher::default()
            .with_batch_size(2)
            .with_expected_capacity(16)
            .read_bookmark_infos(&fetcher, &loader(), &threads)
            .await;

        assert_eq!(results.len(), 4);
        let first = results[0].as_ref().unwrap();
        assert_eq!(first.posts().len(), 2);
        assert!(matches!(results[1], Err(Error::NotFound)));
        match results[2].as_ref().unwrap().original_post() {
            BookmarkPost::OriginalPost { closed, .. } => assert!(*closed),
            other => panic!("unexpected {:?}", other),
        }
        assert!(matches!(
            results[3],
            Err(Error::OriginalPostMismatch {
                expected: 4,
                actual: 5
            })
        ));
        assert!(fetcher.max_in_flight.load(Ordering::SeqCst) <= 2);
    }

    #[tokio::test]
    async fn unknown_site_fails_per_thread() {
        let mut bodies = FxHashMap::default();
        bodies.insert(1, r#"{"posts":[{"no":1,"resto":0}]}"#);
        let fetcher = FakeFetcher {
            bodies,
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
        };
        let threads = vec![ThreadDescriptor::new("8chan", "b", 1)];
        let results = read_bookmark_infos(&fetcher, &loader(), &threads).await;
        assert!(matches!(results[0], Err(Error::UnknownSite(_))));
    }
}
