use std::collections::BTreeSet;

use serde::Serialize;
use smallstr::SmallString;
use url::Url;

use super::{FilterOutcome, PostComment, PostDescriptor};

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct PostImage {
    server_filename: String,
    filename: String,
    extension: SmallString<[u8; 8]>,
    width: u32,
    height: u32,
    size: Option<u64>,
    spoiler: bool,
    file_hash: Option<String>,
    thumbnail_url: Url,
    spoiler_thumbnail_url: Option<Url>,
    image_url: Url,
}

impl PostImage {
    pub(crate) fn new(
        server_filename: String,
        filename: String,
        extension: SmallString<[u8; 8]>,
        width: u32,
        height: u32,
        size: Option<u64>,
        spoiler: bool,
        file_hash: Option<String>,
        thumbnail_url: Url,
        spoiler_thumbnail_url: Option<Url>,
        image_url: Url,
    ) -> Self {
        Self {
            server_filename,
            filename,
            extension,
            width,
            height,
            size,
            spoiler,
            file_hash,
            thumbnail_url,
            spoiler_thumbnail_url,
            image_url,
        }
    }

    pub fn server_filename(&self) -> &str {
        &self.server_filename
    }

    pub fn filename(&self) -> &str {
        &self.filename
    }

    pub fn extension(&self) -> &str {
        &self.extension
    }

    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    /// `None` until a later out-of-band request learns the real size.
    pub fn size(&self) -> Option<u64> {
        self.size
    }

    pub fn spoiler(&self) -> bool {
        self.spoiler
    }

    pub fn file_hash(&self) -> Option<&str> {
        self.file_hash.as_deref()
    }

    pub fn thumbnail_url(&self) -> &Url {
        &self.thumbnail_url
    }

    pub fn spoiler_thumbnail_url(&self) -> Option<&Url> {
        self.spoiler_thumbnail_url.as_ref()
    }

    pub fn image_url(&self) -> &Url {
        &self.image_url
    }

    /// Fields compared by the fast diff path.
    pub(crate) fn same_file(&self, other: &PostImage) -> bool {
        self.server_filename == other.server_filename
            && self.extension == other.extension
            && self.spoiler == other.spoiler
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct HttpIcon {
    pub url: Url,
    pub name: String,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize)]
pub struct PostFlags {
    pub op: bool,
    pub sticky: bool,
    pub closed: bool,
    pub archived: bool,
    pub endless: bool,
    /// Authored by the user of this application.
    pub own: bool,
}

/// The canonical, app-facing post. Only constructed by the post parser.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Post {
    descriptor: PostDescriptor,
    comment: PostComment,
    raw_comment: String,
    subject: Option<String>,
    name: Option<String>,
    tripcode: Option<String>,
    poster_id: Option<String>,
    moderator_capcode: Option<String>,
    timestamp: i64,
    images: Vec<PostImage>,
    http_icons: Vec<HttpIcon>,
    replies_to: BTreeSet<u64>,
    flags: PostFlags,
    filter: Option<FilterOutcome>,
}

pub(crate) struct PostParts {
    pub descriptor: PostDescriptor,
    pub comment: PostComment,
    pub raw_comment: String,
    pub subject: Option<String>,
    pub name: Option<String>,
    pub tripcode: Option<String>,
    pub poster_id: Option<String>,
    pub moderator_capcode: Option<String>,
    pub timestamp: i64,
    pub images: Vec<PostImage>,
    pub http_icons: Vec<HttpIcon>,
    pub replies_to: BTreeSet<u64>,
    pub flags: PostFlags,
    pub filter: Option<FilterOutcome>,
}

impl From<PostParts> for Post {
    fn from(p: PostParts) -> Self {
        Self {
            descriptor: p.descriptor,
            comment: p.comment,
            raw_comment: p.raw_comment,
            subject: p.subject,
            name: p.name,
            tripcode: p.tripcode,
            poster_id: p.poster_id,
            moderator_capcode: p.moderator_capcode,
            timestamp: p.timestamp,
            images: p.images,
            http_icons: p.http_icons,
            replies_to: p.replies_to,
            flags: p.flags,
            filter: p.filter,
        }
    }
}

impl Post {
    pub fn descriptor(&self) -> &PostDescriptor {
        &self.descriptor
    }

    pub fn post_no(&self) -> u64 {
        self.descriptor.post_no()
    }

    pub fn is_op(&self) -> bool {
        self.flags.op
    }

    pub fn comment(&self) -> &PostComment {
        &self.comment
    }

    pub fn raw_comment(&self) -> &str {
        &self.raw_comment
    }

    pub fn subject(&self) -> Option<&str> {
        self.subject.as_deref()
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn tripcode(&self) -> Option<&str> {
        self.tripcode.as_deref()
    }

    pub fn poster_id(&self) -> Option<&str> {
        self.poster_id.as_deref()
    }

    pub fn moderator_capcode(&self) -> Option<&str> {
        self.moderator_capcode.as_deref()
    }

    pub fn timestamp(&self) -> i64 {
        self.timestamp
    }

    pub fn images(&self) -> &[PostImage] {
        &self.images
    }

    pub fn http_icons(&self) -> &[HttpIcon] {
        &self.http_icons
    }

    /// Post numbers in this thread that this post quotes.
    pub fn replies_to(&self) -> &BTreeSet<u64> {
        &self.replies_to
    }

    pub fn flags(&self) -> PostFlags {
        self.flags
    }

    pub fn filter(&self) -> Option<FilterOutcome> {
        self.filter
    }
}
