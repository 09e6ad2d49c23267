use rustc_hash::{FxHashMap, FxHashSet};

use crate::model::{FilterOutcome, PostDescriptor};

/// Read-only snapshot the parse workers consult. It is assembled by the caller
/// before a load and frozen in an `Arc` once the feed's own post numbers have
/// been added, so every worker sees the same state.
#[derive(Debug, Clone, Default)]
pub struct ParseLookups {
    internal_ids: FxHashSet<u64>,
    saved: FxHashSet<PostDescriptor>,
    filtered: FxHashMap<PostDescriptor, FilterOutcome>,
}

impl ParseLookups {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_internal_ids<I: IntoIterator<Item = u64>>(mut self, ids: I) -> Self {
        self.internal_ids.extend(ids);
        self
    }

    /// Marks a post as written by the user.
    pub fn with_saved(mut self, post: PostDescriptor) -> Self {
        self.saved.insert(post);
        self
    }

    pub fn with_filtered(mut self, post: PostDescriptor, outcome: FilterOutcome) -> Self {
        self.filtered.insert(post, outcome);
        self
    }

    pub(crate) fn extend_internal_ids<I: IntoIterator<Item = u64>>(&mut self, ids: I) {
        self.internal_ids.extend(ids);
    }

    /// Post numbers belonging to the thread being parsed.
    pub fn is_internal(&self, post_no: u64) -> bool {
        self.internal_ids.contains(&post_no)
    }

    pub fn is_saved(&self, post: &PostDescriptor) -> bool {
        self.saved.contains(post)
    }

    pub fn filter_outcome(&self, post: &PostDescriptor) -> Option<FilterOutcome> {
        self.filtered.get(post).copied()
    }
}
