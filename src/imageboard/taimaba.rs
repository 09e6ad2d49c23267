use std::io::Read;

use lazy_static::lazy_static;
use regex::Regex;

use super::common::{RawFile, RawPost};
use super::futaba::{self, FutabaFamily};
use super::vichan::country_icons;
use super::ChanDecoder;
use crate::model::{PostBuilder, ThreadBookmarkInfo, ThreadDescriptor};
use crate::reader::ReadingProcessor;
use crate::site::{Board, Site};
use crate::Error;

/// Taimaba (lainchan). Comments are bbcode rather than HTML and files have
/// no `tim`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Taimaba;

/// Converts a taimaba comment into the HTML the comment parser expects.
pub(crate) fn markup_to_html(com: &str) -> String {
    lazy_static! {
        static ref QUOTE_LINE: Regex = Regex::new(r"^>>(\d+)\s*$").unwrap();
        static ref RE_PIPELINE: [(Regex, &'static str); 9] = [
            (Regex::new(r"(?i)\[b\](.*?)\[/b\]").unwrap(), "<b>$1</b>"),
            (Regex::new(r"(?i)\[\*\*\](.*?)\[/\*\*\]").unwrap(), "<b>$1</b>"),
            (Regex::new(r"(?i)\[i\](.*?)\[/i\]").unwrap(), "<i>$1</i>"),
            (Regex::new(r"(?i)\[\*\](.*?)\[/\*\]").unwrap(), "<i>$1</i>"),
            (Regex::new(r"(?i)\[spoiler\](.*?)\[/spoiler\]").unwrap(), "<span class=\"spoiler\">$1</span>"),
            (Regex::new(r"(?i)\[%\](.*?)\[/%\]").unwrap(), "<span class=\"spoiler\">$1</span>"),
            (Regex::new(r"(?i)\[s\](.*?)\[/s\]").unwrap(), "<strike>$1</strike>"),
            (Regex::new(r"(?i)\[pre\](.*?)\[/pre\]").unwrap(), "<pre>$1</pre>"),
            (Regex::new(r"(?i)\[sub\](.*?)\[/sub\]").unwrap(), "<pre>$1</pre>"),
        ];
    }

    let lines = com
        .lines()
        .map(|line| match QUOTE_LINE.captures(line) {
            Some(cap) => format!("<a href=\"#{0}\">&gt;&gt;{0}</a>", &cap[1]),
            None if line.starts_with('>') => {
                format!("<span class=\"quote\">&gt;{}</span>", &line[1..])
            }
            None => line.to_string(),
        })
        .collect::<Vec<_>>();

    let mut ret = lines.join("<br>");
    for (patt, repl) in RE_PIPELINE.iter() {
        if let std::borrow::Cow::Owned(s) = patt.replace_all(&ret, *repl) {
            ret = s;
        }
    }
    ret
}

impl FutabaFamily for Taimaba {
    /// The board index omits `resto` on OPs.
    const DEFAULT_OP: bool = true;

    fn server_filename(file: &RawFile) -> Option<String> {
        file.filename.clone()
    }

    fn comment(com: String) -> String {
        markup_to_html(&com)
    }

    fn icons(
        raw: &mut RawPost,
        site: &Site,
        board: &Board,
        builder: &mut PostBuilder,
    ) -> Result<(), Error> {
        country_icons(raw, site, board, builder)
    }
}

impl ChanDecoder for Taimaba {
    fn load_thread<R: Read>(
        &self,
        body: R,
        processor: &ReadingProcessor,
        site: &Site,
        board: &Board,
    ) -> Result<(), Error> {
        futaba::load_thread::<Self, R>(body, processor, site, board)
    }

    fn load_catalog<R: Read>(
        &self,
        body: R,
        processor: &ReadingProcessor,
        site: &Site,
        board: &Board,
    ) -> Result<(), Error> {
        futaba::load_catalog::<Self, R>(body, processor, site, board)
    }

    fn read_bookmark_info<R: Read>(
        &self,
        thread: &ThreadDescriptor,
        expected_capacity: usize,
        body: R,
    ) -> Result<ThreadBookmarkInfo, Error> {
        futaba::read_bookmark_info(thread, expected_capacity, body)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::model::BoardDescriptor;
    use crate::reader::MemoryPostCache;
    use crate::site::{Dialect, SiteEndpoints};

    #[test]
    fn translates_markup() {
        assert_eq!(
            markup_to_html(">>12\n>implying\n[b]bold[/b] and [%]hidden[/%]"),
            "<a href=\"#12\">&gt;&gt;12</a><br><span class=\"quote\">&gt;implying</span><br><b>bold</b> and <span class=\"spoiler\">hidden</span>"
        );
        assert_eq!(markup_to_html("[PRE]x[/pre]"), "<pre>x</pre>");
    }

    #[test]
    fn filename_is_server_name() {
        let site = Site::new(
            "lainchan",
            Dialect::Taimaba,
            SiteEndpoints::new(
                "https://lainchan.org/{board}/thumb/{tim}.{ext}",
                "https://lainchan.org/{board}/src/{tim}.{ext}",
            ),
        )
        .with_unknown_boards(true);
        let board = site.board(&BoardDescriptor::new("lainchan", "tech")).unwrap();
        let thread = ThreadDescriptor::new("lainchan", "tech", 7);
        let processor = ReadingProcessor::new(thread.into(), Arc::new(MemoryPostCache::new()), 0);
        let body = r#"{"posts": [{"no": 7, "com": "[i]hi[/i]", "filename": "1500", "ext": ".png"}]}"#;

        Taimaba
            .load_thread(body.as_bytes(), &processor, &site, &board)
            .unwrap();

        let builders = processor.take_to_parse();
        assert!(builders[0].is_op());
        assert_eq!(builders[0].comment, "<i>hi</i>");
        assert_eq!(
            builders[0].images[0].image_url().as_str(),
            "https://lainchan.org/tech/src/1500.png"
        );
    }
}
