use std::sync::Arc;

use futures::prelude::*;
use log::{debug, error, warn};

use super::ParseLookups;
use crate::model::{ChanDescriptor, Post, PostBuilder};
use crate::parser::PostParser;
use crate::Result;

/// Parses builders on the blocking thread pool, at most `workers` at a time.
/// Results come back in completion order; the caller restores feed order.
#[derive(Debug, Clone, Copy)]
pub struct ParseWorkerPool {
    workers: usize,
}

impl ParseWorkerPool {
    pub fn new(workers: usize) -> Self {
        Self {
            workers: workers.max(1),
        }
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    pub async fn parse_all(
        &self,
        builders: Vec<PostBuilder>,
        lookups: Arc<ParseLookups>,
        descriptor: &ChanDescriptor,
    ) -> Vec<Post> {
        let parser = PostParser::new(lookups, descriptor.is_catalog());
        let posts = self.run(builders, move |b| parser.parse(b)).await;
        debug!("{}: parsed {} posts", descriptor, posts.len());
        posts
    }

    /// A failing or panicking job only loses its own post.
    pub(crate) async fn run<F>(&self, builders: Vec<PostBuilder>, job: F) -> Vec<Post>
    where
        F: Fn(PostBuilder) -> Result<Post> + Send + Sync + 'static,
    {
        let job = Arc::new(job);
        stream::iter(builders)
            .map(|builder| {
                let job = job.clone();
                let post_no = builder.post_no;
                tokio::task::spawn_blocking(move || (*job)(builder)).map(move |r| (post_no, r))
            })
            .buffer_unordered(self.workers)
            .filter_map(|(post_no, r)| {
                future::ready(match r {
                    Ok(Ok(post)) => Some(post),
                    Ok(Err(err)) => {
                        warn!("Failed to parse post {:?}: {}", post_no, err);
                        None
                    }
                    Err(err) => {
                        error!("Parse worker for post {:?} died: {}", post_no, err);
                        None
                    }
                })
            })
            .collect()
            .await
    }
}

impl Default for ParseWorkerPool {
    fn default() -> Self {
        Self::new(num_cpus::get())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{BoardDescriptor, ThreadDescriptor};

    fn builder(no: u64) -> PostBuilder {
        let mut b = PostBuilder::new(BoardDescriptor::new("4chan", "g"));
        b.post_no = Some(no);
        b.op = no == 1;
        b.op_id = 1;
        b.comment = format!("post {}", no);
        b
    }

    #[tokio::test]
    async fn parses_everything() {
        let pool = ParseWorkerPool::new(2);
        let thread: ChanDescriptor = ThreadDescriptor::new("4chan", "g", 1).into();
        let mut posts = pool
            .parse_all(
                (1..=10).map(builder).collect(),
                Arc::new(ParseLookups::new()),
                &thread,
            )
            .await;
        posts.sort_by_key(|p| p.post_no());
        let nos: Vec<_> = posts.iter().map(|p| p.post_no()).collect();
        assert_eq!(nos, (1..=10).collect::<Vec<_>>());
    }

    #[tokio::test]
    async fn failing_workers_are_isolated() {
        let pool = ParseWorkerPool::new(3);
        let parser = PostParser::new(Arc::new(ParseLookups::new()), false);

        let mut nameless = builder(4);
        nameless.post_no = None;
        let mut builders: Vec<_> = (1..=6).map(builder).collect();
        builders[3] = nameless;

        let mut posts = pool
            .run(builders, move |b| {
                if b.post_no == Some(2) {
                    panic!("worker blew up");
                }
                parser.parse(b)
            })
            .await;
        posts.sort_by_key(|p| p.post_no());
        let nos: Vec<_> = posts.iter().map(|p| p.post_no()).collect();
        assert_eq!(nos, vec![1, 3, 5, 6]);
    }
}
