use std::io::Read;

use lazy_static::lazy_static;
use log::error;
use regex::Regex;
use serde::Deserialize;

use super::common::null_as_default;
use super::ChanDecoder;
use crate::model::{
    BookmarkPost, HttpIcon, PostBuilder, PostImageBuilder, StickyThread, ThreadBookmarkInfo,
    ThreadDescriptor,
};
use crate::reader::ReadingProcessor;
use crate::site::{Board, Site};
use crate::Error;

/// LynxChan's JSON API.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Lynxchan;

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct LynxPost {
    #[serde(rename = "id")]
    poster_id: Option<String>,
    signed_role: Option<String>,
    name: Option<String>,
    thread_id: Option<u64>,
    post_id: Option<u64>,
    subject: Option<String>,
    markdown: Option<String>,
    locked: Option<bool>,
    pinned: Option<bool>,
    cyclic: Option<bool>,
    #[serde(deserialize_with = "null_as_default")]
    files: Vec<LynxFile>,
    omitted_files: Option<u32>,
    creation: Option<String>,
    flag: Option<String>,
    flag_code: Option<String>,
    flag_name: Option<String>,
    // Before LynxChan 2.7.0
    ommited_posts: Option<u32>,
    omitted_posts: Option<u32>,
    #[serde(deserialize_with = "null_as_default")]
    posts: Vec<LynxPost>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LynxCatalogPage {
    #[serde(default)]
    page_count: u32,
    #[serde(default, deserialize_with = "null_as_default")]
    threads: Vec<LynxPost>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LynxFile {
    original_name: String,
    path: String,
    thumb: String,
    mime: String,
    #[serde(default)]
    size: u64,
    width: Option<u32>,
    height: Option<u32>,
}

impl LynxFile {
    fn into_image(self) -> Option<PostImageBuilder> {
        lazy_static! {
            static ref HASH: Regex = Regex::new(r"\W([0-9a-fA-F]+)\W").unwrap();
        }

        let hash = match HASH.captures(&self.path) {
            Some(cap) => cap[1].to_string(),
            None => {
                error!("Failed to extract a file hash from path '{}'", self.path);
                return None;
            }
        };

        let path_ext = self
            .path
            .rsplit_once('.')
            .map(|(_, ext)| ext.to_ascii_lowercase())
            .filter(|ext| !ext.is_empty() && !ext.contains('/'));
        let extension = match (mime_guess::get_mime_extensions_str(&self.mime), path_ext) {
            (Some(exts), Some(ext)) if exts.contains(&ext.as_str()) => ext,
            (Some(exts), path_ext) => match exts.first() {
                Some(ext) => ext.to_string(),
                None => path_ext?,
            },
            (None, Some(ext)) => ext,
            (None, None) => {
                error!("Failed to extract a file extension from '{}'", self.path);
                return None;
            }
        };

        let suffix = format!(".{}", extension);
        let filename = crate::parser::unescape(&self.original_name);
        let filename = filename
            .strip_suffix(suffix.as_str())
            .map(str::to_string)
            .unwrap_or(filename);

        Some(
            PostImageBuilder {
                server_filename: Some(hash.clone()),
                filename: Some(filename),
                extension: Some(extension),
                width: self.width.unwrap_or(0),
                height: self.height.unwrap_or(0),
                size: self.size,
                spoiler: false,
                file_hash: Some(hash),
                args: Vec::with_capacity(2),
            }
            .arg("path", self.path.trim_start_matches('/'))
            .arg("thumb", self.thumb.trim_start_matches('/')),
        )
    }
}

fn parse_creation(creation: &Option<String>) -> Result<i64, Error> {
    match creation {
        Some(c) => chrono::DateTime::parse_from_rfc3339(c)
            .map(|dt| dt.timestamp())
            .map_err(|err| Error::parse(format!("bad creation date '{}': {}", c, err))),
        None => Ok(0),
    }
}

fn process_posts(
    posts: Vec<LynxPost>,
    reading_catalog: bool,
    processor: &ReadingProcessor,
    site: &Site,
    board: &Board,
) -> Result<(), Error> {
    let mut original_post_id = None;
    let mut builders = Vec::with_capacity(posts.len());

    for post in posts {
        let op = post.thread_id.is_some();
        if original_post_id.is_none() {
            original_post_id = post.thread_id;
        }
        let post_no = post
            .thread_id
            .or(post.post_id)
            .ok_or_else(|| Error::parse("post has neither threadId nor postId"))?;

        let mut b = PostBuilder::new(board.descriptor().clone());
        b.post_no = Some(post_no);
        b.op = op;
        b.op_id = if reading_catalog {
            post_no
        } else {
            original_post_id.unwrap_or(0)
        };
        b.timestamp = parse_creation(&post.creation)?;
        b.last_modified = b.timestamp;

        if op {
            b.sticky = post.pinned.unwrap_or(false);
            b.closed = post.locked.unwrap_or(false);
            b.endless = post.cyclic.unwrap_or(false);
            if reading_catalog {
                let omitted = post.omitted_posts.or(post.ommited_posts).unwrap_or(0);
                b.replies = (post.posts.len() as u32).saturating_add(omitted);
            }
            b.thread_images = post.omitted_files.unwrap_or(0);
        }

        b.moderator_capcode = post.signed_role;
        b.name = post.name;
        b.subject = post.subject;
        b.comment = post.markdown.unwrap_or_default();
        b.poster_id = post.poster_id;

        match (post.flag, post.flag_code, post.flag_name) {
            (Some(flag), Some(code), Some(name))
                if !flag.is_empty() && !code.is_empty() && !name.is_empty() =>
            {
                let icon = HttpIcon::from_template(
                    site,
                    board,
                    "country",
                    format!("{}/{}", name, code.trim_start_matches('-')),
                    &[("flag_path", flag.trim_start_matches('/').to_string())],
                )?;
                if let Some(icon) = icon {
                    b.add_http_icon(icon);
                }
            }
            _ => (),
        }

        let mut images = Vec::with_capacity(post.files.len());
        for file in post.files {
            if let Some(image) = file.into_image() {
                images.push(image.build(site, board)?);
            }
        }
        b.images = images;

        if op && !reading_catalog {
            processor.set_op(b.thread_meta());
        }
        builders.push(b);
    }

    processor.add_many_posts(builders);
    Ok(())
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct LynxBookmarkPost {
    thread_id: Option<u64>,
    post_id: Option<u64>,
    message: Option<String>,
    locked: Option<bool>,
    pinned: Option<bool>,
    auto_sage: Option<bool>,
    #[serde(deserialize_with = "null_as_default")]
    posts: Vec<LynxBookmarkPost>,
}

impl LynxBookmarkPost {
    fn to_bookmark_post(&self) -> Option<BookmarkPost> {
        let comment = self.message.clone().unwrap_or_default();
        match (self.thread_id, self.post_id) {
            (Some(thread_id), _) => {
                let sticky = StickyThread::create(self.pinned.unwrap_or(false), None);
                Some(BookmarkPost::OriginalPost {
                    post_no: thread_id,
                    closed: self.locked.unwrap_or(false),
                    archived: false,
                    bump_limit: self.auto_sage.unwrap_or(false) && !sticky.is_sticky(),
                    image_limit: false,
                    sticky,
                    comment,
                })
            }
            (None, Some(post_id)) => Some(BookmarkPost::RegularPost {
                post_no: post_id,
                comment,
            }),
            (None, None) => {
                error!("Error reading bookmark post, it has neither threadId nor postId");
                None
            }
        }
    }
}

impl ChanDecoder for Lynxchan {
    fn load_thread<R: Read>(
        &self,
        body: R,
        processor: &ReadingProcessor,
        site: &Site,
        board: &Board,
    ) -> Result<(), Error> {
        let mut thread: LynxPost = serde_json::from_reader(body)?;
        let replies = std::mem::take(&mut thread.posts);
        let mut posts = Vec::with_capacity(1 + replies.len());
        posts.push(thread);
        posts.extend(replies);
        process_posts(posts, false, processor, site, board)
    }

    fn load_catalog<R: Read>(
        &self,
        body: R,
        processor: &ReadingProcessor,
        site: &Site,
        board: &Board,
    ) -> Result<(), Error> {
        let page: LynxCatalogPage = serde_json::from_reader(body)?;
        log::debug!(
            "Read {} catalog threads from {} ({} pages)",
            page.threads.len(),
            board.descriptor(),
            page.page_count
        );
        process_posts(page.threads, true, processor, site, board)
    }

    fn read_bookmark_info<R: Read>(
        &self,
        thread: &ThreadDescriptor,
        expected_capacity: usize,
        body: R,
    ) -> Result<ThreadBookmarkInfo, Error> {
        let info: LynxBookmarkPost = serde_json::from_reader(body)?;
        let mut posts = Vec::with_capacity(expected_capacity.max(1 + info.posts.len()));
        posts.extend(
            std::iter::once(&info)
                .chain(info.posts.iter())
                .filter_map(LynxBookmarkPost::to_bookmark_post),
        );
        ThreadBookmarkInfo::new(thread.clone(), posts)
    }
}
