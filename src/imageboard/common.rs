use std::fmt;

use log::error;
use serde::de::{self, Deserializer, IgnoredAny, Visitor};
use serde::Deserialize;

use crate::model::{BookmarkPost, BoardDescriptor, PostBuilder, PostImageBuilder, StickyThread};

/// Accepts `0`/`1`, any other integer (non-zero is true), booleans and
/// `null`.
pub(crate) fn bool_from_int<'de, D: Deserializer<'de>>(deserializer: D) -> Result<bool, D::Error> {
    struct BoolVisitor;

    impl<'de> Visitor<'de> for BoolVisitor {
        type Value = bool;

        fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
            f.write_str("an integer or a boolean")
        }

        fn visit_bool<E: de::Error>(self, v: bool) -> Result<bool, E> {
            Ok(v)
        }

        fn visit_u64<E: de::Error>(self, v: u64) -> Result<bool, E> {
            Ok(v != 0)
        }

        fn visit_i64<E: de::Error>(self, v: i64) -> Result<bool, E> {
            Ok(v != 0)
        }

        fn visit_unit<E: de::Error>(self) -> Result<bool, E> {
            Ok(false)
        }
    }

    deserializer.deserialize_any(BoolVisitor)
}

/// Treats an explicit `null` the same as a missing key.
pub(crate) fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de> + Default,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Some backends send identifiers as numbers, others as strings.
pub(crate) fn string_or_number<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<Option<String>, D::Error> {
    struct StringVisitor;

    impl<'de> Visitor<'de> for StringVisitor {
        type Value = Option<String>;

        fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
            f.write_str("a string or a number")
        }

        fn visit_str<E: de::Error>(self, v: &str) -> Result<Self::Value, E> {
            Ok(Some(v.to_string()))
        }

        fn visit_string<E: de::Error>(self, v: String) -> Result<Self::Value, E> {
            Ok(Some(v))
        }

        fn visit_u64<E: de::Error>(self, v: u64) -> Result<Self::Value, E> {
            Ok(Some(v.to_string()))
        }

        fn visit_i64<E: de::Error>(self, v: i64) -> Result<Self::Value, E> {
            Ok(Some(v.to_string()))
        }

        fn visit_unit<E: de::Error>(self) -> Result<Self::Value, E> {
            Ok(None)
        }
    }

    deserializer.deserialize_any(StringVisitor)
}

/// The inverse of [`string_or_number`]: a post number that may arrive quoted.
pub(crate) fn number_or_string<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<Option<u64>, D::Error> {
    match string_or_number(deserializer)? {
        Some(s) if s.is_empty() => Ok(None),
        Some(s) => s
            .parse::<u64>()
            .map(Some)
            .map_err(|_| de::Error::invalid_value(de::Unexpected::Str(&s), &"a post number")),
        None => Ok(None),
    }
}

/// An attachment in the futaba family of APIs.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub(crate) struct RawFile {
    #[serde(deserialize_with = "string_or_number")]
    pub tim: Option<String>,
    pub filename: Option<String>,
    pub ext: Option<String>,
    pub fsize: u64,
    pub w: u32,
    pub h: u32,
    #[serde(deserialize_with = "bool_from_int")]
    pub spoiler: bool,
    pub md5: Option<String>,
}

impl RawFile {
    /// `None` unless the file has a server name, original name and
    /// extension. `server_filename` overrides `tim` for backends that key
    /// files by their original name.
    pub fn into_image(self, server_filename: Option<String>) -> Option<PostImageBuilder> {
        let server_filename = server_filename.or(self.tim)?;
        let filename = self.filename?;
        let ext = self.ext?.replace('.', "");

        Some(
            PostImageBuilder {
                server_filename: Some(server_filename.clone()),
                filename: Some(filename),
                extension: Some(ext.clone()),
                width: self.w,
                height: self.h,
                size: self.fsize,
                spoiler: self.spoiler,
                file_hash: self.md5,
                args: Vec::with_capacity(2),
            }
            .arg("tim", server_filename)
            .arg("ext", ext),
        )
    }
}

/// `extra_files` entries. Some vichan installs emit a stray `[]` in the
/// array; it is accepted and dropped.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub(crate) enum ExtraFile {
    Stray(Vec<IgnoredAny>),
    File(RawFile),
}

impl ExtraFile {
    pub fn into_file(self) -> Option<RawFile> {
        match self {
            ExtraFile::File(f) => Some(f),
            ExtraFile::Stray(_) => None,
        }
    }
}

/// A post in the futaba family of APIs (4chan, vichan, taimaba). Dialects
/// read the subset they understand.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub(crate) struct RawPost {
    pub no: Option<u64>,
    pub resto: Option<u64>,
    pub time: i64,
    pub name: Option<String>,
    pub trip: Option<String>,
    pub id: Option<String>,
    pub capcode: Option<String>,
    pub sub: Option<String>,
    pub com: Option<String>,

    #[serde(deserialize_with = "bool_from_int")]
    pub sticky: bool,
    pub sticky_cap: Option<u32>,
    #[serde(deserialize_with = "bool_from_int")]
    pub closed: bool,
    #[serde(deserialize_with = "bool_from_int")]
    pub archived: bool,
    pub replies: u32,
    pub images: u32,
    pub unique_ips: u32,
    pub last_modified: i64,

    #[serde(flatten)]
    pub file: RawFile,
    #[serde(deserialize_with = "bool_from_int")]
    pub filedeleted: bool,
    pub extra_files: Vec<ExtraFile>,

    pub country: Option<String>,
    pub country_name: Option<String>,
    pub troll_country: Option<String>,
    pub board_flag: Option<String>,
    pub flag_name: Option<String>,
    pub since4pass: Option<u32>,
}

impl RawPost {
    /// Moves the fields every futaba-like dialect shares into a builder.
    /// `None` (with an error logged) when the post has no number.
    pub fn take_builder(&mut self, board: &BoardDescriptor, default_op: bool) -> Option<PostBuilder> {
        let post_no = match self.no {
            Some(no) => no,
            None => {
                error!("Post on {} has no post number, skipping", board);
                return None;
            }
        };
        let op_id = self.resto.unwrap_or(0);
        let op = match self.resto {
            Some(resto) => resto == 0,
            None => default_op,
        };

        let mut b = PostBuilder::new(board.clone());
        b.post_no = Some(post_no);
        b.op = op;
        b.op_id = op_id;
        b.subject = self.sub.take();
        b.name = self.name.take();
        b.tripcode = self.trip.take();
        b.poster_id = self.id.take();
        b.moderator_capcode = self.capcode.take();
        b.timestamp = self.time;
        b.comment = self.com.take().unwrap_or_default();
        b.sticky = self.sticky;
        b.closed = self.closed;
        b.archived = self.archived;
        b.replies = self.replies;
        b.thread_images = self.images;
        b.unique_ips = self.unique_ips;
        b.last_modified = self.last_modified;
        if let Some(cap) = self.sticky_cap {
            b.endless = true;
            b.sticky_cap = Some(cap);
        }
        Some(b)
    }
}

/// The bookmark projection of a futaba-like post.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub(crate) struct RawBookmarkPost {
    pub no: Option<u64>,
    pub resto: Option<u64>,
    #[serde(deserialize_with = "bool_from_int")]
    pub closed: bool,
    #[serde(deserialize_with = "bool_from_int")]
    pub archived: bool,
    pub com: Option<String>,
    #[serde(deserialize_with = "bool_from_int")]
    pub bumplimit: bool,
    #[serde(deserialize_with = "bool_from_int")]
    pub imagelimit: bool,
    #[serde(deserialize_with = "bool_from_int")]
    pub sticky: bool,
    pub sticky_cap: Option<u32>,
}

impl RawBookmarkPost {
    pub fn into_bookmark_post(self) -> Option<BookmarkPost> {
        let post_no = match self.no {
            Some(no) => no,
            None => {
                error!("Error reading bookmark post, it has no post number");
                return None;
            }
        };
        let comment = self.com.unwrap_or_default();
        if self.resto.unwrap_or(0) == 0 {
            Some(BookmarkPost::OriginalPost {
                post_no,
                closed: self.closed,
                archived: self.archived,
                bump_limit: self.bumplimit,
                image_limit: self.imagelimit,
                sticky: StickyThread::create(self.sticky, self.sticky_cap),
                comment,
            })
        } else {
            Some(BookmarkPost::RegularPost { post_no, comment })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lenient_scalars() {
        #[derive(Deserialize)]
        struct T {
            #[serde(deserialize_with = "bool_from_int")]
            a: bool,
            #[serde(deserialize_with = "bool_from_int")]
            b: bool,
            #[serde(deserialize_with = "string_or_number")]
            tim: Option<String>,
            #[serde(deserialize_with = "number_or_string")]
            num: Option<u64>,
        }

        let t: T = serde_json::from_str(r#"{"a": 1, "b": true, "tim": 1600000000123, "num": "42"}"#)
            .unwrap();
        assert!(t.a && t.b);
        assert_eq!(t.tim.as_deref(), Some("1600000000123"));
        assert_eq!(t.num, Some(42));

        let t: T = serde_json::from_str(r#"{"a": 0, "b": null, "tim": "abc", "num": 7}"#).unwrap();
        assert!(!t.a && !t.b);
        assert_eq!(t.tim.as_deref(), Some("abc"));
        assert_eq!(t.num, Some(7));
    }

    #[test]
    fn stray_extra_file_is_skipped() {
        let post: RawPost = serde_json::from_str(
            r#"{"no": 2, "resto": 1, "extra_files": [[], {"tim": "99", "filename": "b", "ext": ".gif"}]}"#,
        )
        .unwrap();
        let files: Vec<_> = post
            .extra_files
            .into_iter()
            .filter_map(ExtraFile::into_file)
            .collect();
        assert_eq!(files.len(), 1);
        assert_eq!(files[0].tim.as_deref(), Some("99"));
    }

    #[test]
    fn missing_resto_defaults() {
        let board = BoardDescriptor::new("lainchan", "tech");
        let mut raw: RawPost = serde_json::from_str(r#"{"no": 5, "com": "hi"}"#).unwrap();
        let b = raw.take_builder(&board, true).unwrap();
        assert!(b.is_op());
        assert_eq!(b.comment, "hi");

        let mut raw: RawPost = serde_json::from_str(r#"{"com": "hi"}"#).unwrap();
        assert!(raw.take_builder(&board, true).is_none());
    }
}
