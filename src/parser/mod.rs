//! Turns builders into immutable [`Post`]s: comment HTML is reduced to text
//! with quote, link and style ranges resolved against a frozen
//! [`ParseLookups`] snapshot.

mod comment;
mod links;

use std::collections::BTreeSet;
use std::ops::Range;
use std::sync::Arc;

use lazy_static::lazy_static;
use log::warn;
use percent_encoding::percent_decode_str;
use regex::Regex;

use crate::model::{
    BoardDescriptor, Post, PostBuilder, PostComment, PostFlags, PostParts, Quote, QuoteSpan,
    SpanKind, ThreadDescriptor,
};
use crate::reader::ParseLookups;
use crate::{Error, Result};

/// Decodes HTML entities, falling back to the handful of entities imageboards
/// actually emit when the text is not well formed.
pub fn unescape<T: AsRef<str>>(text: T) -> String {
    let text = text.as_ref();
    if !text.contains('&') {
        return text.to_string();
    }
    match htmlescape::decode_html(text) {
        Ok(text) => text,
        Err(err) => {
            log::trace!("falling back to simple unescape: {:?}", err);
            text.replace("&gt;", ">")
                .replace("&lt;", "<")
                .replace("&quot;", "\"")
                .replace("&#039;", "'")
                .replace("&#39;", "'")
                .replace("&amp;", "&")
        }
    }
}

#[derive(Clone)]
pub struct PostParser {
    lookups: Arc<ParseLookups>,
    is_catalog: bool,
}

impl PostParser {
    pub fn new(lookups: Arc<ParseLookups>, is_catalog: bool) -> Self {
        Self {
            lookups,
            is_catalog,
        }
    }

    pub fn lookups(&self) -> &ParseLookups {
        &self.lookups
    }

    /// Consumes a builder. Fails only when the builder has no usable post
    /// descriptor; anything odd inside the comment degrades to plain text.
    pub fn parse(&self, builder: PostBuilder) -> Result<Post> {
        let descriptor = builder
            .post_descriptor()
            .ok_or(Error::MissingField("no"))?;
        let comment = self.parse_comment(descriptor.thread(), &builder.comment);

        let replies_to = comment
            .quotes()
            .iter()
            .filter(|q| !q.dead && q.quote.is_in_thread(descriptor.thread()))
            .map(|q| q.quote.post_no())
            .filter(|no| *no != descriptor.post_no())
            .collect::<BTreeSet<_>>();

        let flags = PostFlags {
            op: builder.op,
            sticky: builder.sticky,
            closed: builder.closed,
            archived: builder.archived,
            endless: builder.endless,
            own: self.lookups.is_saved(&descriptor),
        };
        let filter = self.lookups.filter_outcome(&descriptor);

        Ok(PostParts {
            comment,
            raw_comment: builder.comment,
            subject: builder.subject.map(unescape).filter(|s| !s.is_empty()),
            name: builder.name.map(unescape).filter(|s| !s.is_empty()),
            tripcode: builder.tripcode,
            poster_id: builder.poster_id,
            moderator_capcode: builder.moderator_capcode,
            timestamp: builder.timestamp,
            images: builder.images,
            http_icons: builder.http_icons,
            replies_to,
            flags,
            filter,
            descriptor,
        }
        .into())
    }

    /// Parses comment HTML for a post living in `thread`.
    pub fn parse_comment(&self, thread: &ThreadDescriptor, html: &str) -> PostComment {
        let walked = comment::walk(html);
        let text = walked.text;

        let mut quotes = Vec::new();
        let mut link_ranges = Vec::new();
        let mut anchor_ranges = Vec::with_capacity(walked.anchors.len());
        for (range, href) in walked.anchors {
            anchor_ranges.push(range.clone());
            match self.classify_href(&href, thread) {
                Some(quote) => quotes.push(self.quote_span(range, quote, thread)),
                None => link_ranges.push((range, self.link_kind(href, thread))),
            }
        }
        for (range, post_no) in comment::text_quotes(&text, &anchor_ranges) {
            quotes.push(self.quote_span(range, Quote::Quote { post_no }, thread));
        }
        quotes.sort_by_key(|q| q.range.start);

        link_ranges.extend(
            links::find_urls(&text)
                .into_iter()
                .map(|(range, href)| (range, SpanKind::Link(href))),
        );
        let spans = links::cover(text.len(), link_ranges);

        let mut styles = walked.styles;
        styles.extend(comment::greentext_lines(&text));
        styles.sort_by_key(|s| (s.range.start, s.range.end));
        styles.dedup();

        debug_assert!(spans
            .iter()
            .all(|s| s.range.start < s.range.end && s.range.end <= text.len()));
        PostComment::new(text, spans, quotes, styles)
    }

    fn classify_href(&self, href: &str, thread: &ThreadDescriptor) -> Option<Quote> {
        lazy_static! {
            static ref FULL_QUOTE: Regex =
                Regex::new(r"^(?:(?:https?:)?//[^/]+)?/(\w+)/(?:res|thread)/(\d+)(?:\.html)?#p?(\d+)$")
                    .unwrap();
            static ref INTERNAL_QUOTE: Regex = Regex::new(r"^#p?(\d+)$").unwrap();
        }

        if let Some(cap) = INTERNAL_QUOTE.captures(href) {
            let post_no = cap[1].parse::<u64>().ok()?;
            return Some(Quote::Quote { post_no });
        }

        let cap = FULL_QUOTE.captures(href)?;
        let (thread_no, post_no) = match (cap[2].parse::<u64>(), cap[3].parse::<u64>()) {
            (Ok(t), Ok(p)) => (t, p),
            _ => {
                warn!("unparseable quote link '{}'", href);
                return None;
            }
        };
        let board = BoardDescriptor::from_site(thread.board().site().clone(), &cap[1]);
        if !self.is_catalog
            && &board == thread.board()
            && thread_no == thread.thread_no()
            && self.lookups.is_internal(post_no)
        {
            return Some(Quote::Quote { post_no });
        }
        Some(Quote::FullQuote {
            board,
            thread_no,
            post_no,
        })
    }

    /// Board index and catalog search links on the same site. Absolute links
    /// only count when they point at a `boards.` host.
    fn link_kind(&self, href: String, thread: &ThreadDescriptor) -> SpanKind {
        lazy_static! {
            static ref BOARD_LINK: Regex =
                Regex::new(r"^(?:(?:https?:)?//boards\.[^/]+)?/(\w+)/(?:index\.html)?$").unwrap();
            static ref BOARD_SEARCH: Regex =
                Regex::new(r"^(?:(?:https?:)?//boards\.[^/]+)?/(\w+)/catalog#s=(.*)$").unwrap();
        }

        let site = thread.board().site();
        if let Some(cap) = BOARD_LINK.captures(&href) {
            return SpanKind::BoardLink(BoardDescriptor::from_site(site.clone(), &cap[1]));
        }
        if let Some(cap) = BOARD_SEARCH.captures(&href) {
            let raw = cap[2].replace('+', " ");
            let query = percent_decode_str(&raw).decode_utf8_lossy().into_owned();
            return SpanKind::SearchLink {
                board: BoardDescriptor::from_site(site.clone(), &cap[1]),
                query,
            };
        }
        SpanKind::Link(href)
    }

    fn quote_span(&self, range: Range<usize>, quote: Quote, thread: &ThreadDescriptor) -> QuoteSpan {
        let target = match &quote {
            Quote::Quote { post_no } => thread.post(*post_no),
            Quote::FullQuote {
                board,
                thread_no,
                post_no,
            } => board.thread(*thread_no).post(*post_no),
        };
        let dead = !self.is_catalog
            && quote.is_in_thread(thread)
            && !self.lookups.is_internal(quote.post_no());

        QuoteSpan {
            range,
            targets_me: self.lookups.is_saved(&target),
            filter: self.lookups.filter_outcome(&target),
            dead,
            quote,
        }
    }
}
