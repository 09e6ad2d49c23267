use std::hash::{Hash, Hasher};

use seahash::SeaHasher;
use serde::Serialize;
use smallstr::SmallString;
use url::Url;

use super::{BoardDescriptor, HttpIcon, PostDescriptor, PostImage, StickyThread};
use crate::site::{Board, Site};
use crate::Error;

/// Hash over the parts of a post that influence its parsed form. Volatile
/// thread counters are left out so a bumped reply count alone never forces a
/// re-parse.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct PostHash(pub u64);

/// Mutable accumulator filled field by field while a single post is decoded.
#[derive(Debug, Clone, Default)]
pub struct PostBuilder {
    pub board: Option<BoardDescriptor>,
    pub post_no: Option<u64>,
    pub post_sub_no: u64,
    pub op: bool,
    pub op_id: u64,
    pub subject: Option<String>,
    pub name: Option<String>,
    pub tripcode: Option<String>,
    pub poster_id: Option<String>,
    pub moderator_capcode: Option<String>,
    pub timestamp: i64,
    pub comment: String,

    // Thread level, only meaningful on the OP.
    pub sticky: bool,
    pub closed: bool,
    pub archived: bool,
    pub endless: bool,
    pub sticky_cap: Option<u32>,
    pub replies: u32,
    pub thread_images: u32,
    pub unique_ips: u32,
    pub last_modified: i64,

    pub images: Vec<PostImage>,
    pub http_icons: Vec<HttpIcon>,
}

impl PostBuilder {
    pub fn new(board: BoardDescriptor) -> Self {
        Self {
            board: Some(board),
            ..Default::default()
        }
    }

    pub fn is_op(&self) -> bool {
        self.op
    }

    pub fn thread_no(&self) -> Option<u64> {
        if self.op {
            self.post_no
        } else {
            Some(self.op_id)
        }
    }

    /// An OP is keyed by its own number, a reply by its thread's number plus
    /// its own.
    pub fn post_descriptor(&self) -> Option<PostDescriptor> {
        let board = self.board.as_ref()?;
        let post_no = self.post_no?;
        let thread_no = if self.op { post_no } else { self.op_id };
        if thread_no == 0 {
            return None;
        }

        Some(
            board
                .thread(thread_no)
                .post(post_no)
                .with_sub_no(self.post_sub_no),
        )
    }

    pub fn has_post_descriptor(&self) -> bool {
        self.post_descriptor().is_some()
    }

    /// Computed from the current field values on every call, so edits made
    /// after an earlier call are always reflected.
    pub fn content_hash(&self) -> PostHash {
        let mut s = SeaHasher::new();
        self.post_no.hash(&mut s);
        self.post_sub_no.hash(&mut s);
        self.op.hash(&mut s);
        self.op_id.hash(&mut s);
        self.subject.hash(&mut s);
        self.name.hash(&mut s);
        self.tripcode.hash(&mut s);
        self.poster_id.hash(&mut s);
        self.moderator_capcode.hash(&mut s);
        self.timestamp.hash(&mut s);
        self.comment.hash(&mut s);
        self.sticky.hash(&mut s);
        self.closed.hash(&mut s);
        self.archived.hash(&mut s);
        self.endless.hash(&mut s);
        self.sticky_cap.hash(&mut s);
        self.images.hash(&mut s);
        self.http_icons.hash(&mut s);
        PostHash(s.finish())
    }

    pub fn add_http_icon(&mut self, icon: HttpIcon) {
        self.http_icons.push(icon);
    }

    pub fn thread_meta(&self) -> ThreadMeta {
        ThreadMeta {
            closed: self.closed,
            archived: self.archived,
            sticky: StickyThread::create(self.sticky || self.endless, self.sticky_cap),
            replies: self.replies,
            images: self.thread_images,
            unique_ips: self.unique_ips,
            last_modified: self.last_modified,
        }
    }
}

/// Thread-wide state carried by the OP that per-post decoding does not see.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ThreadMeta {
    pub closed: bool,
    pub archived: bool,
    pub sticky: StickyThread,
    pub replies: u32,
    pub images: u32,
    pub unique_ips: u32,
    pub last_modified: i64,
}

/// Raw attachment fields as a decoder finds them. URLs are never taken from
/// the wire; they are rendered from the site templates in `build`.
#[derive(Debug, Clone, Default)]
pub struct PostImageBuilder {
    pub server_filename: Option<String>,
    pub filename: Option<String>,
    pub extension: Option<String>,
    pub width: u32,
    pub height: u32,
    pub size: u64,
    pub spoiler: bool,
    pub file_hash: Option<String>,
    pub args: Vec<(&'static str, String)>,
}

impl PostImageBuilder {
    pub fn arg<T: Into<String>>(mut self, key: &'static str, value: T) -> Self {
        self.args.push((key, value.into()));
        self
    }

    pub fn build(self, site: &Site, board: &Board) -> Result<PostImage, Error> {
        let server_filename = self
            .server_filename
            .ok_or(Error::MissingField("server_filename"))?;
        let extension = self
            .extension
            .map(|ext| ext.trim_start_matches('.').to_string())
            .ok_or(Error::MissingField("ext"))?;
        let filename = self
            .filename
            .map(|f| crate::parser::unescape(&f))
            .unwrap_or_else(|| server_filename.clone());

        let mut args = self.args;
        if !args.iter().any(|(k, _)| *k == "ext") {
            args.push(("ext", extension.clone()));
        }
        let endpoints = site.endpoints();
        let thumbnail_url = endpoints.thumbnail_url(board, false, &args)?;
        let spoiler_thumbnail_url = endpoints.spoiler_thumbnail_url(board, &args)?;
        let image_url = endpoints.image_url(board, &args)?;

        Ok(PostImage::new(
            server_filename,
            filename,
            SmallString::from_str(&extension),
            self.width,
            self.height,
            if site.quirks().accurate_file_sizes {
                Some(self.size)
            } else {
                None
            },
            self.spoiler,
            self.file_hash
                .filter(|h| !h.is_empty() && site.quirks().trusted_file_hashes),
            thumbnail_url,
            spoiler_thumbnail_url,
            image_url,
        ))
    }
}

impl HttpIcon {
    pub fn from_template(
        site: &Site,
        board: &Board,
        icon: &str,
        name: String,
        args: &[(&'static str, String)],
    ) -> Result<Option<Self>, Error> {
        let url: Option<Url> = site.endpoints().icon_url(board, icon, args)?;
        Ok(url.map(|url| HttpIcon { url, name }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn builder(no: u64, op_id: u64, comment: &str) -> PostBuilder {
        let mut b = PostBuilder::new(BoardDescriptor::new("4chan", "g"));
        b.post_no = Some(no);
        b.op = op_id == 0;
        b.op_id = op_id;
        b.comment = comment.to_string();
        b
    }

    #[test]
    fn op_and_reply_descriptors() {
        let op = builder(100, 0, "");
        let reply = builder(101, 100, "");
        assert_eq!(
            op.post_descriptor(),
            Some(PostDescriptor::new("4chan", "g", 100, 100, 0))
        );
        assert_eq!(
            reply.post_descriptor(),
            Some(PostDescriptor::new("4chan", "g", 100, 101, 0))
        );
        assert!(!PostBuilder::default().has_post_descriptor());
    }

    #[test]
    fn hash_ignores_volatile_counters() {
        let a = builder(100, 0, "hello");
        let mut b = a.clone();
        b.replies = 50;
        b.thread_images = 10;
        b.unique_ips = 7;
        b.last_modified = 12345;
        assert_eq!(a.content_hash(), b.content_hash());

        let c = builder(100, 0, "hello, edited");
        assert_ne!(a.content_hash(), c.content_hash());
    }

    #[test]
    fn hash_is_stable_across_calls() {
        let a = builder(5, 1, "text");
        let first = a.content_hash();
        assert_eq!(first, a.content_hash());
        assert_eq!(first, builder(5, 1, "text").content_hash());
    }

    #[test]
    fn hash_follows_later_edits() {
        let mut a = builder(5, 1, "text");
        let before = a.content_hash();
        a.comment.push_str(" more");
        let after_comment = a.content_hash();
        assert_ne!(before, after_comment);
        assert_eq!(after_comment, builder(5, 1, "text more").content_hash());

        a.images.clear();
        a.subject = Some(String::from("subject"));
        assert_ne!(after_comment, a.content_hash());
    }

    #[test]
    fn thread_meta_sticky_state() {
        let mut op = builder(1, 0, "");
        assert_eq!(op.thread_meta().sticky, StickyThread::NotSticky);
        op.sticky = true;
        assert_eq!(op.thread_meta().sticky, StickyThread::StickyUnlimited);
        op.sticky_cap = Some(300);
        assert_eq!(op.thread_meta().sticky, StickyThread::StickyWithCap(300));
    }
}
