mod bookmark;
mod builder;
mod comment;
mod descriptor;
mod post;

pub use bookmark::{BookmarkPost, StickyThread, ThreadBookmarkInfo};
pub use builder::{PostBuilder, PostHash, PostImageBuilder, ThreadMeta};
pub use comment::{
    CommentSpan, FilterOutcome, PostComment, Quote, QuoteSpan, SpanKind, Style, StyleSpan,
};
pub use descriptor::{
    BoardDescriptor, CatalogDescriptor, ChanDescriptor, PostDescriptor, SiteDescriptor,
    ThreadDescriptor,
};
pub use post::{HttpIcon, Post, PostFlags, PostImage};
pub(crate) use post::PostParts;
