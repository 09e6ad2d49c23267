use std::io::Read;

use log::error;

use super::common::{ExtraFile, RawBookmarkPost, RawFile, RawPost};
use super::stream::{self, CATALOG_THREADS, THREAD_POSTS};
use super::ChanDecoder;
use crate::model::{BookmarkPost, HttpIcon, PostBuilder, ThreadBookmarkInfo, ThreadDescriptor};
use crate::reader::ReadingProcessor;
use crate::site::{Board, Site};
use crate::Error;

/// Minimum capacity reserved for bookmark posts.
const DEFAULT_POST_LIST_CAPACITY: usize = 16;

/// 4chan's JSON API.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Futaba;

/// Behaviour that differs between backends sharing the 4chan envelope.
pub(super) trait FutabaFamily {
    /// Whether a post with no `resto` field is an OP.
    const DEFAULT_OP: bool = false;

    /// Overrides the server-side name of `file`.
    fn server_filename(_file: &RawFile) -> Option<String> {
        None
    }

    fn comment(com: String) -> String {
        com
    }

    fn icons(
        raw: &mut RawPost,
        site: &Site,
        board: &Board,
        builder: &mut PostBuilder,
    ) -> Result<(), Error>;
}

impl FutabaFamily for Futaba {
    fn icons(
        raw: &mut RawPost,
        site: &Site,
        board: &Board,
        builder: &mut PostBuilder,
    ) -> Result<(), Error> {
        if let (Some(code), Some(name)) = (raw.country.take(), raw.country_name.take()) {
            let icon = HttpIcon::from_template(
                site,
                board,
                "country",
                format!("{}/{}", name, code),
                &[("country_code", code.to_ascii_lowercase())],
            )?;
            if let Some(icon) = icon {
                builder.add_http_icon(icon);
            }
        }

        if let (Some(code), Some(name)) = (raw.board_flag.take(), raw.flag_name.take()) {
            let icon = HttpIcon::from_template(
                site,
                board,
                "board_flag",
                format!("{}/t_{}", name, code),
                &[
                    ("board_flag_code", code.to_ascii_lowercase()),
                    ("board_code", board.code().to_string()),
                ],
            )?;
            if let Some(icon) = icon {
                builder.add_http_icon(icon);
            }
        }

        match raw.since4pass {
            Some(year) if year != 0 => {
                let icon =
                    HttpIcon::from_template(site, board, "since4pass", year.to_string(), &[])?;
                if let Some(icon) = icon {
                    builder.add_http_icon(icon);
                }
            }
            _ => (),
        }

        Ok(())
    }
}

pub(super) fn read_post<D: FutabaFamily>(
    mut raw: RawPost,
    processor: &ReadingProcessor,
    site: &Site,
    board: &Board,
) -> Result<(), Error> {
    let mut builder = match raw.take_builder(board.descriptor(), D::DEFAULT_OP) {
        Some(builder) => builder,
        None => return Ok(()),
    };
    if !builder.has_post_descriptor() {
        error!("Post {:?} on {} has no descriptor, skipping", builder.post_no, board.descriptor());
        return Ok(());
    }
    builder.comment = D::comment(std::mem::take(&mut builder.comment));

    let file = std::mem::take(&mut raw.file);
    let extra = std::mem::take(&mut raw.extra_files);
    let mut images = Vec::with_capacity(1 + extra.len());
    let files = std::iter::once(file)
        .filter(|_| !raw.filedeleted)
        .chain(extra.into_iter().filter_map(ExtraFile::into_file));
    for file in files {
        let server_filename = D::server_filename(&file);
        if let Some(image) = file.into_image(server_filename) {
            images.push(image.build(site, board)?);
        }
    }
    builder.images = images;

    D::icons(&mut raw, site, board, &mut builder)?;

    if builder.is_op() && !processor.is_catalog() {
        processor.set_op(builder.thread_meta());
    }
    processor.add_post(builder);
    Ok(())
}

pub(super) fn load_thread<D: FutabaFamily, R: Read>(
    body: R,
    processor: &ReadingProcessor,
    site: &Site,
    board: &Board,
) -> Result<(), Error> {
    stream::walk(body, THREAD_POSTS, |raw: RawPost| {
        read_post::<D>(raw, processor, site, board)
    })
}

pub(super) fn load_catalog<D: FutabaFamily, R: Read>(
    body: R,
    processor: &ReadingProcessor,
    site: &Site,
    board: &Board,
) -> Result<(), Error> {
    stream::walk(body, CATALOG_THREADS, |raw: RawPost| {
        read_post::<D>(raw, processor, site, board)
    })
}

pub(super) fn read_bookmark_info<R: Read>(
    thread: &ThreadDescriptor,
    expected_capacity: usize,
    body: R,
) -> Result<ThreadBookmarkInfo, Error> {
    let mut posts: Vec<BookmarkPost> =
        Vec::with_capacity(expected_capacity.max(DEFAULT_POST_LIST_CAPACITY));
    stream::walk(body, THREAD_POSTS, |raw: RawBookmarkPost| {
        if let Some(post) = raw.into_bookmark_post() {
            posts.push(post);
        }
        Ok(())
    })?;
    ThreadBookmarkInfo::new(thread.clone(), posts)
}

impl ChanDecoder for Futaba {
    fn load_thread<R: Read>(
        &self,
        body: R,
        processor: &ReadingProcessor,
        site: &Site,
        board: &Board,
    ) -> Result<(), Error> {
        load_thread::<Self, R>(body, processor, site, board)
    }

    fn load_catalog<R: Read>(
        &self,
        body: R,
        processor: &ReadingProcessor,
        site: &Site,
        board: &Board,
    ) -> Result<(), Error> {
        load_catalog::<Self, R>(body, processor, site, board)
    }

    fn read_bookmark_info<R: Read>(
        &self,
        thread: &ThreadDescriptor,
        expected_capacity: usize,
        body: R,
    ) -> Result<ThreadBookmarkInfo, Error> {
        read_bookmark_info(thread, expected_capacity, body)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::model::{BoardDescriptor, CatalogDescriptor};
    use crate::reader::MemoryPostCache;
    use crate::site::{Dialect, SiteEndpoints, SiteQuirks};

    const THREAD: &str = r#"{"posts": [
        {"no": 100, "resto": 0, "sticky": 1, "closed": 0, "time": 1600000000, "name": "Anonymous",
         "sub": "Thread", "com": "OP text", "tim": 1600000000123, "filename": "cat", "ext": ".jpg",
         "w": 800, "h": 600, "fsize": 12345, "md5": "abcd==", "replies": 2, "images": 1,
         "unique_ips": 2, "country": "US", "country_name": "United States", "since4pass": 2016},
        {"no": 101, "resto": 100, "time": 1600000100, "com": "&gt;&gt;100 reply",
         "tim": 1600000100456, "filename": "dog", "ext": ".png", "filedeleted": 1},
        {"no": 102, "resto": 100, "time": 1600000200, "com": "second",
         "extra_files": [{"tim": 1600000200001, "filename": "a", "ext": ".gif", "w": 1, "h": 1}]}
    ]}"#;

    fn site() -> Site {
        Site::new(
            "4chan",
            Dialect::Futaba,
            SiteEndpoints::new(
                "https://i.4cdn.org/{board}/{tim}s.jpg",
                "https://i.4cdn.org/{board}/{tim}.{ext}",
            )
            .with_icon("country", "https://s.4cdn.org/image/country/{country_code}.gif")
            .with_icon("since4pass", "https://s.4cdn.org/image/minileaf.gif"),
        )
        .with_quirks(SiteQuirks {
            accurate_file_sizes: true,
            trusted_file_hashes: true,
        })
        .with_board(Board::new(BoardDescriptor::new("4chan", "g")))
    }

    #[test]
    fn decodes_thread() {
        let site = site();
        let board = site.board(&BoardDescriptor::new("4chan", "g")).unwrap();
        let thread = ThreadDescriptor::new("4chan", "g", 100);
        let processor = ReadingProcessor::new(thread.into(), Arc::new(MemoryPostCache::new()), 0);

        Futaba
            .load_thread(THREAD.as_bytes(), &processor, &site, &board)
            .unwrap();

        assert_eq!(processor.post_order(), vec![100, 101, 102]);
        let op = processor.op().unwrap();
        assert_eq!(op.replies, 2);
        assert!(op.sticky.is_sticky());

        let builders = processor.take_to_parse();
        assert_eq!(builders.len(), 3);
        let op = &builders[0];
        assert_eq!(op.images.len(), 1);
        assert_eq!(
            op.images[0].image_url().as_str(),
            "https://i.4cdn.org/g/1600000000123.jpg"
        );
        assert_eq!(op.images[0].size(), Some(12345));
        assert_eq!(op.images[0].file_hash(), Some("abcd=="));
        assert_eq!(op.http_icons.len(), 2);
        assert_eq!(op.http_icons[0].name, "United States/US");
        assert_eq!(
            op.http_icons[0].url.as_str(),
            "https://s.4cdn.org/image/country/us.gif"
        );

        // deleted file is dropped, extra files are kept
        assert!(builders[1].images.is_empty());
        assert_eq!(builders[2].images.len(), 1);
        assert_eq!(builders[2].images[0].extension(), "gif");
    }

    #[test]
    fn decodes_catalog() {
        let site = site();
        let board = site.board(&BoardDescriptor::new("4chan", "g")).unwrap();
        let catalog = CatalogDescriptor::from(BoardDescriptor::new("4chan", "g"));
        let processor = ReadingProcessor::new(catalog.into(), Arc::new(MemoryPostCache::new()), 0);
        let body = r#"[
            {"page": 1, "threads": [{"no": 1, "resto": 0, "com": "a", "last_replies": [{"no": 3, "resto": 1}]},
                                    {"no": 2, "resto": 0, "com": "b"}]},
            {"page": 2, "threads": [{"no": 9, "resto": 0, "com": "c"}]}
        ]"#;

        Futaba
            .load_catalog(body.as_bytes(), &processor, &site, &board)
            .unwrap();
        assert_eq!(processor.post_order(), vec![1, 2, 9]);
        assert!(processor.op().is_none());
    }

    #[test]
    fn bookmark_info() {
        let thread = ThreadDescriptor::new("4chan", "g", 100);
        let info = Futaba
            .read_bookmark_info(&thread, 0, THREAD.as_bytes())
            .unwrap();
        assert_eq!(info.posts().len(), 3);
        match info.original_post() {
            BookmarkPost::OriginalPost { post_no, sticky, .. } => {
                assert_eq!(*post_no, 100);
                assert!(sticky.is_sticky());
            }
            other => panic!("unexpected post: {:?}", other),
        }

        let wrong = ThreadDescriptor::new("4chan", "g", 99);
        assert!(matches!(
            Futaba.read_bookmark_info(&wrong, 0, THREAD.as_bytes()),
            Err(Error::OriginalPostMismatch { expected: 99, actual: 100 })
        ));

        let no_op = r#"{"posts": [{"no": 101, "resto": 100}, {"no": 102, "resto": 100}]}"#;
        assert!(matches!(
            Futaba.read_bookmark_info(&thread, 0, no_op.as_bytes()),
            Err(Error::NoOriginalPost(_))
        ));
    }
}
