use parking_lot::Mutex;
use rustc_hash::FxHashMap;

use crate::model::{Post, PostDescriptor, PostHash};

/// What the reader needs from the application's post storage to decide
/// whether a freshly decoded post must be parsed again.
pub trait PostCache: Send + Sync {
    fn cached_post(&self, post: &PostDescriptor, is_op: bool) -> Option<Post>;
    fn post_hash(&self, post: &PostDescriptor) -> Option<PostHash>;
    fn put_post_hash(&self, post: PostDescriptor, hash: PostHash);
}

/// In-process cache. Parsed posts are stored with [`MemoryPostCache::put_post`];
/// hashes are written by the loader after a successful parse.
#[derive(Debug, Default)]
pub struct MemoryPostCache {
    posts: Mutex<FxHashMap<PostDescriptor, Post>>,
    hashes: Mutex<FxHashMap<PostDescriptor, PostHash>>,
}

impl MemoryPostCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn put_post(&self, post: Post) {
        self.posts.lock().insert(post.descriptor().clone(), post);
    }

    pub fn put_posts<I: IntoIterator<Item = Post>>(&self, posts: I) {
        let mut map = self.posts.lock();
        for post in posts {
            map.insert(post.descriptor().clone(), post);
        }
    }

    pub fn hash_count(&self) -> usize {
        self.hashes.lock().len()
    }
}

impl PostCache for MemoryPostCache {
    fn cached_post(&self, post: &PostDescriptor, is_op: bool) -> Option<Post> {
        self.posts
            .lock()
            .get(post)
            .filter(|p| p.is_op() == is_op)
            .cloned()
    }

    fn post_hash(&self, post: &PostDescriptor) -> Option<PostHash> {
        self.hashes.lock().get(post).copied()
    }

    fn put_post_hash(&self, post: PostDescriptor, hash: PostHash) {
        self.hashes.lock().insert(post, hash);
    }
}
