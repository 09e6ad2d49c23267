use serde::Serialize;

use super::ThreadDescriptor;
use crate::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum StickyThread {
    NotSticky,
    StickyUnlimited,
    /// Rolling sticky that keeps at most `cap` posts.
    StickyWithCap(u32),
}

impl StickyThread {
    pub fn create(sticky: bool, cap: Option<u32>) -> Self {
        match (sticky, cap) {
            (false, _) => StickyThread::NotSticky,
            (true, Some(cap)) if cap > 0 => StickyThread::StickyWithCap(cap),
            (true, _) => StickyThread::StickyUnlimited,
        }
    }

    pub fn is_sticky(&self) -> bool {
        !matches!(self, StickyThread::NotSticky)
    }
}

impl Default for StickyThread {
    fn default() -> Self {
        StickyThread::NotSticky
    }
}

/// Reduced view of a post used for watch notifications.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum BookmarkPost {
    OriginalPost {
        post_no: u64,
        closed: bool,
        archived: bool,
        bump_limit: bool,
        image_limit: bool,
        sticky: StickyThread,
        comment: String,
    },
    RegularPost {
        post_no: u64,
        comment: String,
    },
}

impl BookmarkPost {
    pub fn post_no(&self) -> u64 {
        match self {
            BookmarkPost::OriginalPost { post_no, .. } => *post_no,
            BookmarkPost::RegularPost { post_no, .. } => *post_no,
        }
    }

    pub fn comment(&self) -> &str {
        match self {
            BookmarkPost::OriginalPost { comment, .. } => comment,
            BookmarkPost::RegularPost { comment, .. } => comment,
        }
    }

    pub fn is_op(&self) -> bool {
        matches!(self, BookmarkPost::OriginalPost { .. })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ThreadBookmarkInfo {
    thread: ThreadDescriptor,
    posts: Vec<BookmarkPost>,
}

impl ThreadBookmarkInfo {
    /// Fails unless `posts` holds exactly one original post numbered like
    /// the thread itself.
    pub fn new(thread: ThreadDescriptor, posts: Vec<BookmarkPost>) -> Result<Self, Error> {
        let mut ops = posts.iter().filter(|p| p.is_op());
        let op = match ops.next() {
            Some(op) => op,
            None => return Err(Error::NoOriginalPost(thread)),
        };
        if ops.next().is_some() {
            return Err(Error::MultipleOriginalPosts(thread));
        }
        if op.post_no() != thread.thread_no() {
            return Err(Error::OriginalPostMismatch {
                expected: thread.thread_no(),
                actual: op.post_no(),
            });
        }

        Ok(Self { thread, posts })
    }

    pub fn thread(&self) -> &ThreadDescriptor {
        &self.thread
    }

    pub fn posts(&self) -> &[BookmarkPost] {
        &self.posts
    }

    pub fn original_post(&self) -> &BookmarkPost {
        // `new` guarantees exactly one.
        &self.posts[self.posts.iter().position(|p| p.is_op()).unwrap_or(0)]
    }

    pub fn replies(&self) -> impl Iterator<Item = &BookmarkPost> {
        self.posts.iter().filter(|p| !p.is_op())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn op(no: u64) -> BookmarkPost {
        BookmarkPost::OriginalPost {
            post_no: no,
            closed: false,
            archived: false,
            bump_limit: false,
            image_limit: false,
            sticky: StickyThread::NotSticky,
            comment: String::new(),
        }
    }

    fn reply(no: u64) -> BookmarkPost {
        BookmarkPost::RegularPost {
            post_no: no,
            comment: format!(">>{}", no - 1),
        }
    }

    #[test]
    fn accepts_matching_op() {
        let thread = ThreadDescriptor::new("4chan", "g", 10);
        let info = ThreadBookmarkInfo::new(thread, vec![op(10), reply(11), reply(12)]).unwrap();
        assert_eq!(info.original_post().post_no(), 10);
        assert_eq!(info.replies().count(), 2);
    }

    #[test]
    fn rejects_missing_op() {
        let thread = ThreadDescriptor::new("4chan", "g", 10);
        let err = ThreadBookmarkInfo::new(thread, vec![reply(11), reply(12)]).unwrap_err();
        assert!(matches!(err, Error::NoOriginalPost(_)));
    }

    #[test]
    fn rejects_mismatched_op() {
        let thread = ThreadDescriptor::new("4chan", "g", 10);
        let err = ThreadBookmarkInfo::new(thread, vec![op(9), reply(11)]).unwrap_err();
        match err {
            Error::OriginalPostMismatch { expected, actual } => {
                assert_eq!(expected, 10);
                assert_eq!(actual, 9);
            }
            other => panic!("unexpected error: {}", other),
        }
    }

    #[test]
    fn rejects_two_ops() {
        let thread = ThreadDescriptor::new("4chan", "g", 10);
        let err = ThreadBookmarkInfo::new(thread, vec![op(10), op(10)]).unwrap_err();
        assert!(matches!(err, Error::MultipleOriginalPosts(_)));
    }

    #[test]
    fn sticky_cap_zero_is_unlimited() {
        assert_eq!(StickyThread::create(true, Some(0)), StickyThread::StickyUnlimited);
        assert_eq!(StickyThread::create(false, Some(5)), StickyThread::NotSticky);
    }
}
