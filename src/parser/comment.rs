use std::ops::Range;

use lazy_static::lazy_static;
use regex::Regex;

use super::unescape;
use crate::model::{Style, StyleSpan};

/// A comment reduced to plain text with the anchors and styled regions found
/// along the way. All ranges are byte offsets into `text`.
#[derive(Debug, Default, PartialEq)]
pub(crate) struct WalkedComment {
    pub text: String,
    pub anchors: Vec<(Range<usize>, String)>,
    pub styles: Vec<StyleSpan>,
}

struct OpenTag {
    name: String,
    start: usize,
    href: Option<String>,
    style: Option<Style>,
}

fn class_style(class: &str) -> Option<Style> {
    let class = class.to_ascii_lowercase();
    if class.contains("spoiler") {
        Some(Style::Spoiler)
    } else if class.contains("quote") || class.contains("unkfunc") || class.contains("greentext")
    {
        Some(Style::Greentext)
    } else {
        None
    }
}

fn tag_style(name: &str, class: Option<&str>) -> Option<Style> {
    match name {
        "b" | "strong" => Some(Style::Bold),
        "i" | "em" => Some(Style::Italic),
        // 4chan marks spoilers with <s>
        "s" => Some(Style::Spoiler),
        "strike" | "del" => Some(Style::Strikethrough),
        "pre" | "code" => Some(Style::Code),
        "span" | "font" | "blockquote" | "div" | "p" => class.and_then(class_style),
        _ => None,
    }
}

/// Walks comment HTML. Text is entity-decoded, `<br>` becomes a newline,
/// `<wbr>` and unknown tags are dropped. Unbalanced closing tags are
/// ignored and tags left open are closed at the end of the text.
pub(crate) fn walk(html: &str) -> WalkedComment {
    lazy_static! {
        static ref TAG: Regex = Regex::new(r"<(/?)([a-zA-Z][a-zA-Z0-9]*)([^>]*)>").unwrap();
        static ref HREF: Regex = Regex::new(r#"(?i)\bhref\s*=\s*["']([^"']*)["']"#).unwrap();
        static ref CLASS: Regex = Regex::new(r#"(?i)\bclass\s*=\s*["']([^"']*)["']"#).unwrap();
    }

    let mut out = WalkedComment {
        text: String::with_capacity(html.len()),
        ..Default::default()
    };
    let mut stack: Vec<OpenTag> = Vec::new();
    let mut last = 0;

    for cap in TAG.captures_iter(html) {
        let whole = cap.get(0).unwrap();
        if whole.start() > last {
            out.text.push_str(&unescape(&html[last..whole.start()]));
        }
        last = whole.end();

        let closing = !cap[1].is_empty();
        let name = cap[2].to_ascii_lowercase();
        let attrs = &cap[3];

        match name.as_str() {
            "br" => {
                out.text.push('\n');
                continue;
            }
            "wbr" | "img" | "hr" => continue,
            _ => (),
        }

        if !closing {
            if attrs.trim_end().ends_with('/') {
                continue;
            }
            let class = CLASS.captures(attrs).map(|c| c[1].to_string());
            stack.push(OpenTag {
                style: tag_style(&name, class.as_deref()),
                href: if name == "a" {
                    HREF.captures(attrs).map(|c| unescape(&c[1]))
                } else {
                    None
                },
                name,
                start: out.text.len(),
            });
            continue;
        }

        if let Some(pos) = stack.iter().rposition(|t| t.name == name) {
            // Anything opened after the matching tag is implicitly closed.
            for tag in stack.drain(pos..).rev() {
                close(&mut out, tag);
            }
        }
    }
    if last < html.len() {
        out.text.push_str(&unescape(&html[last..]));
    }
    while let Some(tag) = stack.pop() {
        close(&mut out, tag);
    }

    out.anchors.sort_by_key(|(range, _)| range.start);
    out.styles.sort_by_key(|s| s.range.start);
    out
}

fn close(out: &mut WalkedComment, tag: OpenTag) {
    let range = tag.start..out.text.len();
    if range.start == range.end {
        return;
    }
    if let Some(href) = tag.href {
        out.anchors.push((range.clone(), href));
    }
    if let Some(style) = tag.style {
        out.styles.push(StyleSpan { range, style });
    }
}

/// Line ranges that start with `>` but are not a `>>123` quote.
pub(crate) fn greentext_lines(text: &str) -> Vec<StyleSpan> {
    lazy_static! {
        static ref QUOTE_PREFIX: Regex = Regex::new(r"^>>\d").unwrap();
    }

    let mut spans = Vec::new();
    let mut offset = 0;
    for line in text.split('\n') {
        if line.starts_with('>') && !QUOTE_PREFIX.is_match(line) {
            spans.push(StyleSpan {
                range: offset..offset + line.len(),
                style: Style::Greentext,
            });
        }
        offset += line.len() + 1;
    }
    spans
}

/// `>>123` references in plain text, skipping any that fall inside
/// `covered`.
pub(crate) fn text_quotes(text: &str, covered: &[Range<usize>]) -> Vec<(Range<usize>, u64)> {
    lazy_static! {
        static ref TEXT_QUOTE: Regex = Regex::new(r">>(\d+)").unwrap();
    }

    TEXT_QUOTE
        .captures_iter(text)
        .filter_map(|cap| {
            let m = cap.get(0)?;
            if text[..m.start()].ends_with('>') {
                return None;
            }
            if covered
                .iter()
                .any(|r| m.start() < r.end && r.start < m.end())
            {
                return None;
            }
            let post_no = cap[1].parse::<u64>().ok()?;
            Some((m.range(), post_no))
        })
        .collect()
}
