use std::sync::Arc;

use log::{error, trace};
use parking_lot::Mutex;
use rustc_hash::FxHashMap;

use super::cache::PostCache;
use crate::model::{
    ChanDescriptor, Post, PostBuilder, PostDescriptor, PostHash, ThreadMeta,
};
use crate::parser::unescape;

#[derive(Default)]
struct State {
    to_parse: Vec<PostBuilder>,
    to_parse_index: FxHashMap<PostDescriptor, usize>,
    post_order: Vec<u64>,
    op: Option<ThreadMeta>,
    pending_hashes: FxHashMap<PostDescriptor, PostHash>,
}

/// Collects the builders of one fetch. Decides which of them need parsing,
/// keeps the feed's arrival order and holds the thread-wide OP state.
pub struct ReadingProcessor {
    descriptor: ChanDescriptor,
    cache: Arc<dyn PostCache>,
    state: Mutex<State>,
}

impl ReadingProcessor {
    pub fn new(
        descriptor: ChanDescriptor,
        cache: Arc<dyn PostCache>,
        expected_capacity: usize,
    ) -> Self {
        let state = State {
            to_parse: Vec::with_capacity(expected_capacity),
            post_order: Vec::with_capacity(expected_capacity),
            ..Default::default()
        };
        Self {
            descriptor,
            cache,
            state: Mutex::new(state),
        }
    }

    pub fn descriptor(&self) -> &ChanDescriptor {
        &self.descriptor
    }

    pub fn is_catalog(&self) -> bool {
        self.descriptor.is_catalog()
    }

    /// Records the post's position and queues it for parsing when it differs
    /// from the cached copy. Posts without a number are dropped.
    pub fn add_post(&self, builder: PostBuilder) {
        let descriptor = match builder.post_descriptor() {
            Some(d) => d,
            None => {
                error!(
                    "Dropping post without a post number from {}",
                    self.descriptor
                );
                return;
            }
        };
        let changed = self.differs_from_cache(&descriptor, &builder);

        let mut state = self.state.lock();
        state.post_order.push(descriptor.post_no());
        if !changed {
            trace!("{} unchanged, skipping parse", descriptor);
            return;
        }
        state
            .pending_hashes
            .insert(descriptor.clone(), builder.content_hash());
        match state.to_parse_index.get(&descriptor).copied() {
            // A duplicate in the same feed replaces the earlier builder.
            Some(idx) => state.to_parse[idx] = builder,
            None => {
                let idx = state.to_parse.len();
                state.to_parse.push(builder);
                state.to_parse_index.insert(descriptor, idx);
            }
        }
    }

    pub fn add_many_posts<I: IntoIterator<Item = PostBuilder>>(&self, builders: I) {
        for builder in builders {
            self.add_post(builder);
        }
    }

    pub fn set_op(&self, op: ThreadMeta) {
        self.state.lock().op = Some(op);
    }

    pub fn op(&self) -> Option<ThreadMeta> {
        self.state.lock().op.clone()
    }

    /// Builders that need parsing, in the order they first arrived.
    pub fn to_parse(&self) -> Vec<PostBuilder> {
        self.state.lock().to_parse.clone()
    }

    pub fn take_to_parse(&self) -> Vec<PostBuilder> {
        let mut state = self.state.lock();
        state.to_parse_index.clear();
        std::mem::take(&mut state.to_parse)
    }

    /// Post numbers exactly as they appeared in the feed, duplicates included.
    pub fn post_order(&self) -> Vec<u64> {
        self.state.lock().post_order.clone()
    }

    pub fn total_posts_count(&self) -> usize {
        self.state.lock().post_order.len()
    }

    /// Reorders `posts` by arrival. Numbers with no completed post are
    /// skipped and a number seen twice in the feed is emitted once, at its
    /// first position.
    pub fn posts_sorted_by_indexes(&self, posts: Vec<Post>) -> Vec<Post> {
        let mut by_no: FxHashMap<u64, Post> = posts
            .into_iter()
            .map(|post| (post.post_no(), post))
            .collect();

        let state = self.state.lock();
        state
            .post_order
            .iter()
            .filter_map(|no| by_no.remove(no))
            .collect()
    }

    /// Writes the pending hashes of `parsed` through to the cache. Hashes of
    /// builders that failed to parse are discarded.
    pub fn commit_hashes(&self, parsed: &[Post]) {
        let mut state = self.state.lock();
        for post in parsed {
            if let Some(hash) = state.pending_hashes.remove(post.descriptor()) {
                self.cache.put_post_hash(post.descriptor().clone(), hash);
            }
        }
        state.pending_hashes.clear();
    }

    pub fn pending_hash_count(&self) -> usize {
        self.state.lock().pending_hashes.len()
    }

    fn differs_from_cache(&self, descriptor: &PostDescriptor, builder: &PostBuilder) -> bool {
        let cached = match self.cache.cached_post(descriptor, builder.op) {
            Some(post) => post,
            None => return true,
        };
        if !same_fields(builder, &cached) {
            return true;
        }
        self.cache.post_hash(descriptor) != Some(builder.content_hash())
    }
}

fn same_text(raw: Option<&str>, parsed: Option<&str>) -> bool {
    match (raw, parsed) {
        (None, None) => true,
        (Some(raw), parsed) => {
            let raw = unescape(raw);
            if raw.is_empty() {
                parsed.is_none()
            } else {
                parsed == Some(raw.as_str())
            }
        }
        (None, Some(_)) => false,
    }
}

fn same_fields(builder: &PostBuilder, post: &Post) -> bool {
    let flags = post.flags();
    builder.op == flags.op
        && builder.timestamp == post.timestamp()
        && builder.sticky == flags.sticky
        && builder.closed == flags.closed
        && builder.archived == flags.archived
        && builder.endless == flags.endless
        && builder.tripcode.as_deref() == post.tripcode()
        && builder.poster_id.as_deref() == post.poster_id()
        && builder.moderator_capcode.as_deref() == post.moderator_capcode()
        && same_text(builder.subject.as_deref(), post.subject())
        && same_text(builder.name.as_deref(), post.name())
        && builder.images.len() == post.images().len()
        && builder
            .images
            .iter()
            .zip(post.images())
            .all(|(a, b)| a.same_file(b))
}
