use std::ops::Range;

use lazy_static::lazy_static;
use regex::Regex;

use crate::model::{CommentSpan, SpanKind};

/// Finds bare URLs in plain text. Trailing punctuation that is more likely
/// to belong to the sentence than to the URL is left out of the span.
pub(crate) fn find_urls(text: &str) -> Vec<(Range<usize>, String)> {
    lazy_static! {
        static ref URL: Regex =
            Regex::new(r#"(?i)\b(?:https?://|ftp://|www\.)[^\s<>"]+"#).unwrap();
    }

    URL.find_iter(text)
        .filter_map(|m| {
            let url = trim_trailing(m.as_str());
            if url.is_empty() {
                return None;
            }
            let end = m.start() + url.len();
            let href = if url.len() >= 4 && url[..4].eq_ignore_ascii_case("www.") {
                format!("http://{}", url)
            } else {
                url.to_string()
            };
            Some((m.start()..end, href))
        })
        .collect()
}

fn trim_trailing(mut url: &str) -> &str {
    loop {
        let last = match url.chars().last() {
            Some(c) => c,
            None => return url,
        };
        let unbalanced = |open: char, close: char| {
            url.matches(close).count() > url.matches(open).count()
        };
        let trim = match last {
            '.' | ',' | ';' | ':' | '!' | '?' | '\'' | '*' => true,
            ')' => unbalanced('(', ')'),
            ']' => unbalanced('[', ']'),
            '}' => unbalanced('{', '}'),
            _ => false,
        };
        if !trim {
            return url;
        }
        url = &url[..url.len() - last.len_utf8()];
    }
}

/// Merges overlapping or touching link ranges and fills the gaps with text
/// spans so the result is ordered, non-overlapping, free of empty spans and
/// covers `[0, len)`.
pub(crate) fn cover(len: usize, mut links: Vec<(Range<usize>, SpanKind)>) -> Vec<CommentSpan> {
    links.retain(|(range, _)| range.start < range.end && range.end <= len);
    links.sort_by_key(|(range, _)| (range.start, range.end));

    let mut merged: Vec<(Range<usize>, SpanKind)> = Vec::with_capacity(links.len());
    for (range, kind) in links {
        if let Some(last) = merged.last_mut() {
            if range.start <= last.0.end {
                last.0.end = last.0.end.max(range.end);
                continue;
            }
        }
        merged.push((range, kind));
    }

    let mut spans = Vec::with_capacity(merged.len() * 2 + 1);
    let mut pos = 0;
    for (range, kind) in merged {
        if range.start > pos {
            spans.push(CommentSpan {
                range: pos..range.start,
                kind: SpanKind::Text,
            });
        }
        pos = range.end;
        spans.push(CommentSpan {
            range,
            kind,
        });
    }
    if pos < len {
        spans.push(CommentSpan {
            range: pos..len,
            kind: SpanKind::Text,
        });
    }
    spans
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ranges(spans: &[CommentSpan]) -> Vec<(Range<usize>, bool)> {
        spans.iter().map(|s| (s.range.clone(), s.is_link())).collect()
    }

    fn as_links(urls: Vec<(Range<usize>, String)>) -> Vec<(Range<usize>, SpanKind)> {
        urls.into_iter()
            .map(|(range, href)| (range, SpanKind::Link(href)))
            .collect()
    }

    #[test]
    fn single_link_in_the_middle() {
        let text = "see https://example.com/a for more";
        let links = find_urls(text);
        assert_eq!(links, vec![(4..25, String::from("https://example.com/a"))]);
        let spans = cover(text.len(), as_links(links));
        assert_eq!(
            ranges(&spans),
            vec![(0..4, false), (4..25, true), (25..text.len(), false)]
        );
    }

    #[test]
    fn link_at_both_edges() {
        let text = "https://example.com";
        let spans = cover(text.len(), as_links(find_urls(text)));
        assert_eq!(ranges(&spans), vec![(0..text.len(), true)]);

        let text = "go to www.example.com.";
        let links = find_urls(text);
        assert_eq!(links[0].1, "http://www.example.com");
        let spans = cover(text.len(), as_links(links));
        assert_eq!(
            ranges(&spans),
            vec![(0..6, false), (6..21, true), (21..22, false)]
        );
    }

    #[test]
    fn keeps_balanced_parens() {
        let text = "(https://en.wikipedia.org/wiki/Rust_(language))";
        let links = find_urls(text);
        assert_eq!(links[0].1, "https://en.wikipedia.org/wiki/Rust_(language)");
    }

    #[test]
    fn merges_overlapping_and_adjacent() {
        let spans = cover(
            20,
            as_links(vec![
                (5..10, String::from("a")),
                (8..12, String::from("b")),
                (12..14, String::from("c")),
                (3..3, String::from("empty")),
            ]),
        );
        assert_eq!(
            ranges(&spans),
            vec![(0..5, false), (5..14, true), (14..20, false)]
        );
    }

    #[test]
    fn no_links() {
        assert!(cover(0, vec![]).is_empty());
        assert_eq!(ranges(&cover(3, vec![])), vec![(0..3, false)]);
    }
}
