use thiserror::Error;

use crate::model::{BoardDescriptor, SiteDescriptor, ThreadDescriptor};

#[derive(Debug, Error)]
pub enum Error {
    #[error("io error: {}", .0)]
    IO(#[from] std::io::Error),
    #[error("resource was not found")]
    NotFound,
    #[error("server responded with bad status code: {}", .0)]
    BadStatus(u16),
    #[error("json error: {}", .0)]
    Json(#[from] serde_json::Error),
    #[error("failed to parse response: {}", .0)]
    Parse(String),
    #[error("thread {} has already been deleted", .0)]
    AlreadyDeleted(ThreadDescriptor),
    #[error("thread {} has no OP", .0)]
    NoOriginalPost(ThreadDescriptor),
    #[error("original post has incorrect postNo, expected: {}, actual: {}", .expected, .actual)]
    OriginalPostMismatch { expected: u64, actual: u64 },
    #[error("thread {} has more than one OP", .0)]
    MultipleOriginalPosts(ThreadDescriptor),
    #[error("no site is configured for {}", .0)]
    UnknownSite(SiteDescriptor),
    #[error("no board is configured for {}", .0)]
    UnknownBoard(BoardDescriptor),
    #[error("invalid url: {}", .0)]
    Url(#[from] url::ParseError),
    #[error("post is missing required field '{}'", .0)]
    MissingField(&'static str),
    #[error("worker failed: {}", .0)]
    Worker(String),
}

/// Coarse classification callers use to decide between retrying, giving up
/// and marking a thread as dead.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Transient,
    NotFound,
    BadStatus,
    Parse,
    AlreadyDeleted,
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::IO(_) | Error::Worker(_) => ErrorKind::Transient,
            Error::Json(err) if err.is_io() => ErrorKind::Transient,
            Error::NotFound => ErrorKind::NotFound,
            Error::BadStatus(_) => ErrorKind::BadStatus,
            Error::AlreadyDeleted(_) => ErrorKind::AlreadyDeleted,
            _ => ErrorKind::Parse,
        }
    }

    pub fn is_transient(&self) -> bool {
        self.kind() == ErrorKind::Transient
    }

    pub fn is_not_found(&self) -> bool {
        match self {
            Error::NotFound => true,
            Error::BadStatus(404) => true,
            _ => false,
        }
    }

    pub(crate) fn parse<T: std::fmt::Display>(msg: T) -> Self {
        Error::Parse(msg.to_string())
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_errors() {
        assert_eq!(Error::NotFound.kind(), ErrorKind::NotFound);
        assert_eq!(Error::BadStatus(503).kind(), ErrorKind::BadStatus);
        assert!(Error::BadStatus(404).is_not_found());
        assert!(Error::IO(std::io::Error::from(std::io::ErrorKind::ConnectionReset)).is_transient());
        assert_eq!(
            Error::OriginalPostMismatch {
                expected: 1,
                actual: 2
            }
            .kind(),
            ErrorKind::Parse
        );

        let thread = ThreadDescriptor::new("4chan", "g", 1);
        assert_eq!(
            Error::AlreadyDeleted(thread).kind(),
            ErrorKind::AlreadyDeleted
        );
    }

    #[test]
    fn json_syntax_errors_are_parse_failures() {
        let err = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        assert_eq!(Error::from(err).kind(), ErrorKind::Parse);
    }
}
