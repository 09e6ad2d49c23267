use std::ops::Range;

use serde::Serialize;

use super::{BoardDescriptor, ThreadDescriptor};

/// A reference to another post extracted from comment text.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub enum Quote {
    Quote {
        post_no: u64,
    },
    FullQuote {
        board: BoardDescriptor,
        thread_no: u64,
        post_no: u64,
    },
}

impl Quote {
    pub fn post_no(&self) -> u64 {
        match self {
            Quote::Quote { post_no } => *post_no,
            Quote::FullQuote { post_no, .. } => *post_no,
        }
    }

    /// Whether this quote points at a post inside `thread`.
    pub fn is_in_thread(&self, thread: &ThreadDescriptor) -> bool {
        match self {
            Quote::Quote { .. } => true,
            Quote::FullQuote {
                board, thread_no, ..
            } => board == thread.board() && *thread_no == thread.thread_no(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum FilterOutcome {
    Hidden,
    Removed,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct QuoteSpan {
    pub range: Range<usize>,
    pub quote: Quote,
    /// The quoted post is one of the user's own posts.
    pub targets_me: bool,
    /// Same-thread quote to a post number this thread does not contain.
    pub dead: bool,
    pub filter: Option<FilterOutcome>,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub enum SpanKind {
    Text,
    Link(String),
    /// Link to a board's index page.
    BoardLink(BoardDescriptor),
    /// Link to a catalog search, with the query already decoded.
    SearchLink {
        board: BoardDescriptor,
        query: String,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct CommentSpan {
    pub range: Range<usize>,
    pub kind: SpanKind,
}

impl CommentSpan {
    pub fn is_link(&self) -> bool {
        !matches!(self.kind, SpanKind::Text)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Style {
    Bold,
    Italic,
    Strikethrough,
    Spoiler,
    Code,
    Greentext,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct StyleSpan {
    pub range: Range<usize>,
    pub style: Style,
}

/// A resolved comment: plain text plus ordered, non-overlapping text/link
/// spans covering all of it, and the quote and style ranges laid over it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize)]
pub struct PostComment {
    text: String,
    spans: Vec<CommentSpan>,
    quotes: Vec<QuoteSpan>,
    styles: Vec<StyleSpan>,
}

impl PostComment {
    pub(crate) fn new(
        text: String,
        spans: Vec<CommentSpan>,
        quotes: Vec<QuoteSpan>,
        styles: Vec<StyleSpan>,
    ) -> Self {
        Self {
            text,
            spans,
            quotes,
            styles,
        }
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn spans(&self) -> &[CommentSpan] {
        &self.spans
    }

    pub fn quotes(&self) -> &[QuoteSpan] {
        &self.quotes
    }

    pub fn styles(&self) -> &[StyleSpan] {
        &self.styles
    }

    pub fn links(&self) -> impl Iterator<Item = &CommentSpan> {
        self.spans.iter().filter(|s| s.is_link())
    }

    pub fn span_text(&self, span: &CommentSpan) -> &str {
        &self.text[span.range.clone()]
    }
}
