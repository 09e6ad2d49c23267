use std::io::Read;

use serde::Deserialize;

use super::common::{bool_from_int, number_or_string};
use super::ChanDecoder;
use crate::model::{
    BookmarkPost, ChanDescriptor, PostBuilder, PostImageBuilder, StickyThread, ThreadBookmarkInfo,
    ThreadDescriptor,
};
use crate::reader::ReadingProcessor;
use crate::site::{Board, Site};
use crate::Error;

const DEFAULT_POSTER_NAME: &str = "Аноним";

/// 2ch.hk.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Dvach;

#[derive(Debug, Deserialize)]
struct DvachError {
    code: i64,
}

impl DvachError {
    fn into_error(self, target: &ChanDescriptor) -> Option<Error> {
        let deleted = || match target {
            ChanDescriptor::Thread(t) => Error::AlreadyDeleted(t.clone()),
            ChanDescriptor::Catalog(_) => Error::NotFound,
        };
        match self.code {
            0 => None,
            -2 => Some(Error::NotFound),
            -3 | -41 | -42 => Some(deleted()),
            -4 => Some(Error::BadStatus(403)),
            -7 => Some(Error::parse("thread is closed")),
            code => Some(Error::parse(format!("unsupported 2ch error code {}", code))),
        }
    }
}

#[derive(Debug, Deserialize)]
struct ThreadEnvelope<P> {
    #[serde(default)]
    bump_limit: Option<u32>,
    #[serde(default, deserialize_with = "number_or_string")]
    unique_posters: Option<u64>,
    #[serde(default)]
    threads: Option<Vec<ThreadPosts<P>>>,
    #[serde(default)]
    error: Option<DvachError>,
}

#[derive(Debug, Deserialize)]
struct ThreadPosts<P> {
    posts: Vec<P>,
}

#[derive(Debug, Deserialize)]
struct CatalogEnvelope {
    #[serde(default)]
    threads: Option<Vec<DvachPost>>,
    #[serde(default)]
    error: Option<DvachError>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct DvachPost {
    #[serde(deserialize_with = "number_or_string")]
    num: Option<u64>,
    #[serde(deserialize_with = "number_or_string")]
    parent: Option<u64>,
    #[serde(deserialize_with = "bool_from_int")]
    closed: bool,
    #[serde(deserialize_with = "bool_from_int")]
    sticky: bool,
    #[serde(deserialize_with = "bool_from_int")]
    endless: bool,
    comment: String,
    subject: String,
    name: String,
    trip: String,
    timestamp: i64,
    lasthit: i64,
    posts_count: Option<u32>,
    files_count: Option<u32>,
    files: Option<Vec<DvachFile>>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct DvachFile {
    fullname: Option<String>,
    md5: Option<String>,
    name: Option<String>,
    path: Option<String>,
    size: u64,
    thumbnail: String,
    width: u32,
    height: u32,
}

fn split_extension(name: &str) -> (&str, Option<&str>) {
    match name.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() => (stem, Some(ext)),
        _ => (name, None),
    }
}

impl DvachFile {
    fn into_image(self) -> Option<PostImageBuilder> {
        let path = self.path?;
        if path.to_ascii_lowercase().contains("/stickers/") {
            return None;
        }
        let name = self.name?;
        let (server_filename, ext) = split_extension(&name);
        let filename = match self.fullname.as_deref() {
            Some(full) if !full.is_empty() => split_extension(full).0,
            _ => server_filename,
        };

        Some(
            PostImageBuilder {
                server_filename: Some(server_filename.to_string()),
                filename: Some(filename.to_string()),
                extension: ext.map(str::to_string),
                width: self.width,
                height: self.height,
                // reported in kB
                size: self.size.saturating_mul(1024),
                spoiler: false,
                file_hash: self.md5,
                args: Vec::with_capacity(2),
            }
            .arg("path", path)
            .arg("thumbnail", self.thumbnail),
        )
    }
}

fn process_posts(
    posts: Vec<DvachPost>,
    bump_limit: Option<u32>,
    unique_posters: Option<u64>,
    processor: &ReadingProcessor,
    site: &Site,
    board: &Board,
) -> Result<(), Error> {
    let mut builders = Vec::with_capacity(posts.len());
    for post in posts {
        let post_no = match post.num {
            Some(num) => num,
            None => {
                log::error!("Post on {} has no post number, skipping", board.descriptor());
                continue;
            }
        };
        let parent = post.parent.unwrap_or(0);

        let mut b = PostBuilder::new(board.descriptor().clone());
        b.post_no = Some(post_no);
        b.op = parent == 0;
        b.op_id = if parent != 0 { parent } else { post_no };
        b.last_modified = post.lasthit;
        b.timestamp = post.timestamp;

        if b.op {
            b.sticky = post.sticky;
            b.closed = post.closed;
            b.endless = post.endless;
            if post.endless {
                b.sticky_cap = bump_limit.or(board.bump_limit);
            }
            b.unique_ips = unique_posters.unwrap_or(0) as u32;
            b.replies = post.posts_count.unwrap_or(0);
            b.thread_images = post.files_count.unwrap_or(0);
        }

        if let Some(capcode) = post.trip.strip_prefix("!!%") {
            b.moderator_capcode = Some(capcode.trim_end_matches("%!!").to_string());
        } else if !post.trip.is_empty() {
            b.tripcode = Some(post.trip);
        }
        if post.name != DEFAULT_POSTER_NAME && !post.name.is_empty() {
            b.name = Some(post.name);
        }
        if !post.subject.is_empty() {
            b.subject = Some(post.subject);
        }
        b.comment = post.comment;

        let files = post.files.unwrap_or_default();
        let mut images = Vec::with_capacity(files.len());
        for file in files {
            if let Some(image) = file.into_image() {
                images.push(image.build(site, board)?);
            }
        }
        b.images = images;

        if b.op && !processor.is_catalog() {
            processor.set_op(b.thread_meta());
        }
        builders.push(b);
    }

    processor.add_many_posts(builders);
    Ok(())
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct DvachBookmarkPost {
    #[serde(deserialize_with = "number_or_string")]
    num: Option<u64>,
    #[serde(deserialize_with = "number_or_string")]
    parent: Option<u64>,
    #[serde(deserialize_with = "bool_from_int")]
    closed: bool,
    #[serde(deserialize_with = "bool_from_int")]
    sticky: bool,
    #[serde(deserialize_with = "bool_from_int")]
    endless: bool,
    comment: String,
    posts_count: Option<u32>,
}

impl ChanDecoder for Dvach {
    fn load_thread<R: Read>(
        &self,
        body: R,
        processor: &ReadingProcessor,
        site: &Site,
        board: &Board,
    ) -> Result<(), Error> {
        let envelope: ThreadEnvelope<DvachPost> = serde_json::from_reader(body)?;
        if let Some(err) = envelope
            .error
            .and_then(|e| e.into_error(processor.descriptor()))
        {
            return Err(err);
        }
        let posts = envelope
            .threads
            .and_then(|threads| threads.into_iter().next())
            .map(|thread| thread.posts)
            .ok_or_else(|| Error::parse(format!("no posts parsed for {}", processor.descriptor())))?;

        process_posts(
            posts,
            envelope.bump_limit,
            envelope.unique_posters,
            processor,
            site,
            board,
        )
    }

    fn load_catalog<R: Read>(
        &self,
        body: R,
        processor: &ReadingProcessor,
        site: &Site,
        board: &Board,
    ) -> Result<(), Error> {
        let envelope: CatalogEnvelope = serde_json::from_reader(body)?;
        if let Some(err) = envelope
            .error
            .and_then(|e| e.into_error(processor.descriptor()))
        {
            return Err(err);
        }
        let threads = envelope
            .threads
            .ok_or_else(|| Error::parse(format!("no posts parsed for {}", processor.descriptor())))?;

        process_posts(threads, None, None, processor, site, board)
    }

    fn read_bookmark_info<R: Read>(
        &self,
        thread: &ThreadDescriptor,
        expected_capacity: usize,
        body: R,
    ) -> Result<ThreadBookmarkInfo, Error> {
        let envelope: ThreadEnvelope<DvachBookmarkPost> = serde_json::from_reader(body)?;
        if let Some(err) = envelope
            .error
            .and_then(|e| e.into_error(&ChanDescriptor::Thread(thread.clone())))
        {
            return Err(err);
        }
        let bump_limit = envelope.bump_limit.filter(|limit| *limit > 0);
        let posts = envelope
            .threads
            .and_then(|threads| threads.into_iter().next())
            .map(|thread| thread.posts)
            .ok_or_else(|| Error::parse(format!("no posts parsed for {}", thread)))?;

        let mut out = Vec::with_capacity(expected_capacity.max(posts.len()));
        for post in posts {
            let post_no = match post.num {
                Some(num) => num,
                None => continue,
            };
            if post.parent.unwrap_or(0) == 0 {
                let sticky = StickyThread::create(
                    post.sticky,
                    if post.endless { bump_limit } else { None },
                );
                let reached = match (bump_limit, post.posts_count) {
                    (Some(limit), Some(count)) => count >= limit,
                    _ => false,
                };
                out.push(BookmarkPost::OriginalPost {
                    post_no,
                    closed: post.closed,
                    archived: false,
                    bump_limit: reached && !sticky.is_sticky(),
                    image_limit: false,
                    sticky,
                    comment: post.comment,
                });
            } else {
                out.push(BookmarkPost::RegularPost {
                    post_no,
                    comment: post.comment,
                });
            }
        }

        ThreadBookmarkInfo::new(thread.clone(), out)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::model::BoardDescriptor;
    use crate::reader::MemoryPostCache;
    use crate::site::{Dialect, SiteEndpoints};

    const THREAD: &str = r#"{
        "bump_limit": 500, "unique_posters": "3",
        "threads": [{"posts": [
            {"num": "1000", "parent": "0", "sticky": 1, "endless": 1, "closed": 0,
             "comment": "op", "subject": "", "name": "Аноним", "trip": "!!%mod%!!",
             "timestamp": 1600000000, "lasthit": 1600000500, "posts_count": 2,
             "files": [{"name": "16000.jpg", "fullname": "cat.jpg", "path": "/b/src/1000/16000.jpg",
                        "thumbnail": "/b/thumb/1000/16000s.jpg", "size": 10, "width": 5, "height": 6},
                       {"name": "sticker.png", "path": "/stickers/a/sticker.png", "thumbnail": "/x"}]},
            {"num": 1001, "parent": 1000, "comment": "reply", "subject": "", "name": "bob", "trip": "!abc",
             "timestamp": 1600000100}
        ]}]
    }"#;

    fn site() -> Site {
        Site::new(
            "2ch",
            Dialect::Dvach,
            SiteEndpoints::new("https://2ch.hk{thumbnail}", "https://2ch.hk{path}"),
        )
        .with_unknown_boards(true)
    }

    #[test]
    fn decodes_thread() {
        let site = site();
        let board = site.board(&BoardDescriptor::new("2ch", "b")).unwrap();
        let thread = ThreadDescriptor::new("2ch", "b", 1000);
        let processor = ReadingProcessor::new(thread.into(), Arc::new(MemoryPostCache::new()), 0);

        Dvach
            .load_thread(THREAD.as_bytes(), &processor, &site, &board)
            .unwrap();
        assert_eq!(processor.post_order(), vec![1000, 1001]);
        let meta = processor.op().unwrap();
        assert_eq!(meta.sticky, StickyThread::StickyWithCap(500));
        assert_eq!(meta.unique_ips, 3);

        let builders = processor.take_to_parse();
        let op = &builders[0];
        assert_eq!(op.moderator_capcode.as_deref(), Some("mod"));
        assert_eq!(op.name, None);
        assert_eq!(op.images.len(), 1);
        assert_eq!(op.images[0].filename(), "cat");
        assert_eq!(op.images[0].size(), Some(10 * 1024));
        assert_eq!(
            op.images[0].thumbnail_url().as_str(),
            "https://2ch.hk/b/thumb/1000/16000s.jpg"
        );
        assert_eq!(builders[1].tripcode.as_deref(), Some("!abc"));
        assert_eq!(builders[1].name.as_deref(), Some("bob"));
    }

    #[test]
    fn oversized_file_size_saturates() {
        let file: DvachFile = serde_json::from_str(
            r#"{"name": "1.png", "path": "/b/src/1/1.png", "size": 18446744073709551615}"#,
        )
        .unwrap();
        assert_eq!(file.into_image().unwrap().size, u64::MAX);
    }

    #[test]
    fn error_codes() {
        let site = site();
        let board = site.board(&BoardDescriptor::new("2ch", "b")).unwrap();
        let thread = ThreadDescriptor::new("2ch", "b", 1000);
        let processor = ReadingProcessor::new(thread.into(), Arc::new(MemoryPostCache::new()), 0);

        let err = Dvach
            .load_thread(r#"{"error": {"code": -3}}"#.as_bytes(), &processor, &site, &board)
            .unwrap_err();
        assert!(matches!(err, Error::AlreadyDeleted(_)));

        let err = Dvach
            .load_thread(r#"{"error": {"code": -2}}"#.as_bytes(), &processor, &site, &board)
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn bookmark_info() {
        let thread = ThreadDescriptor::new("2ch", "b", 1000);
        let info = Dvach.read_bookmark_info(&thread, 0, THREAD.as_bytes()).unwrap();
        assert_eq!(info.posts().len(), 2);
        match info.original_post() {
            BookmarkPost::OriginalPost { sticky, bump_limit, .. } => {
                assert_eq!(*sticky, StickyThread::StickyWithCap(500));
                assert!(!bump_limit);
            }
            other => panic!("unexpected post: {:?}", other),
        }
    }
}
