//! Wires a payload through decode, change detection, parsing and
//! reordering.

use std::io::Read;
use std::sync::Arc;

use log::{debug, info};
use serde::Serialize;

mod cache;
mod lookups;
mod pool;
mod processor;

pub use cache::{MemoryPostCache, PostCache};
pub use lookups::ParseLookups;
pub use pool::ParseWorkerPool;
pub use processor::ReadingProcessor;

use crate::imageboard::{ChanDecoder, SiteDecoder};
use crate::model::{
    BoardDescriptor, ChanDescriptor, Post, ThreadBookmarkInfo, ThreadDescriptor, ThreadMeta,
};
use crate::site::{Board, Site, SiteProvider};
use crate::{Error, Result};

#[derive(Debug, Clone, Serialize)]
pub struct LoadResponse {
    /// Thread state carried by the OP. Always `None` for catalogs.
    pub op: Option<ThreadMeta>,
    /// Posts that were new or changed, in feed order.
    pub posts: Vec<Post>,
    /// Every post number in the payload as it appeared, unchanged posts
    /// included.
    pub post_order: Vec<u64>,
}

pub struct PostLoader {
    sites: Arc<dyn SiteProvider>,
    cache: Arc<dyn PostCache>,
    pool: ParseWorkerPool,
}

impl PostLoader {
    pub fn new(sites: Arc<dyn SiteProvider>, cache: Arc<dyn PostCache>) -> Self {
        Self {
            sites,
            cache,
            pool: ParseWorkerPool::default(),
        }
    }

    pub fn with_pool(mut self, pool: ParseWorkerPool) -> Self {
        self.pool = pool;
        self
    }

    fn resolve(&self, board: &BoardDescriptor) -> Result<(Arc<Site>, Board)> {
        let site = self
            .sites
            .site(board.site())
            .ok_or_else(|| Error::UnknownSite(board.site().clone()))?;
        let board = site
            .board(board)
            .ok_or_else(|| Error::UnknownBoard(board.clone()))?;
        Ok((site, board))
    }

    pub async fn load<R: Read + Send + 'static>(
        &self,
        descriptor: ChanDescriptor,
        body: R,
        expected_capacity: usize,
        lookups: ParseLookups,
    ) -> Result<LoadResponse> {
        let (site, board) = self.resolve(descriptor.board())?;
        let decoder = SiteDecoder::from(site.dialect());
        let processor = Arc::new(ReadingProcessor::new(
            descriptor.clone(),
            self.cache.clone(),
            expected_capacity,
        ));

        let p = processor.clone();
        let is_catalog = descriptor.is_catalog();
        tokio::task::spawn_blocking(move || {
            if is_catalog {
                decoder.load_catalog(body, &p, &site, &board)
            } else {
                decoder.load_thread(body, &p, &site, &board)
            }
        })
        .await
        .map_err(|err| Error::Worker(err.to_string()))??;

        let op = processor.op();
        if let ChanDescriptor::Thread(thread) = &descriptor {
            if op.is_none() {
                return Err(Error::NoOriginalPost(thread.clone()));
            }
        }

        let post_order = processor.post_order();
        let mut lookups = lookups;
        lookups.extend_internal_ids(post_order.iter().copied());
        let lookups = Arc::new(lookups);

        let to_parse = processor.take_to_parse();
        debug!(
            "{}: {} posts in payload, {} to parse",
            descriptor,
            post_order.len(),
            to_parse.len()
        );
        let parsed = self.pool.parse_all(to_parse, lookups, &descriptor).await;
        processor.commit_hashes(&parsed);
        let posts = processor.posts_sorted_by_indexes(parsed);

        info!(
            "{}: loaded {} posts ({} new or changed)",
            descriptor,
            post_order.len(),
            posts.len()
        );
        Ok(LoadResponse {
            op,
            posts,
            post_order,
        })
    }

    pub async fn load_bookmark_info<R: Read + Send + 'static>(
        &self,
        thread: ThreadDescriptor,
        expected_capacity: usize,
        body: R,
    ) -> Result<ThreadBookmarkInfo> {
        let (site, _) = self.resolve(thread.board())?;
        let decoder = SiteDecoder::from(site.dialect());
        tokio::task::spawn_blocking(move || {
            decoder.read_bookmark_info(&thread, expected_capacity, body)
        })
        .await
        .map_err(|err| Error::Worker(err.to_string()))?
    }
}
