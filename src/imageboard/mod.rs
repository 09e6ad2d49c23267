use std::io::Read;

use crate::model::{ThreadBookmarkInfo, ThreadDescriptor};
use crate::reader::ReadingProcessor;
use crate::site::{Board, Dialect, Site};
use crate::Error;

mod common;
mod dvach;
mod futaba;
mod lynxchan;
mod stream;
mod taimaba;
mod vichan;

pub use dvach::Dvach;
pub use futaba::Futaba;
pub use lynxchan::Lynxchan;
pub use taimaba::Taimaba;
pub use vichan::Vichan;

/// Decodes one backend's wire format into builders fed to a
/// [`ReadingProcessor`].
pub trait ChanDecoder {
    /// Decodes a thread payload. Posts reach the processor in feed order.
    fn load_thread<R: Read>(
        &self,
        body: R,
        processor: &ReadingProcessor,
        site: &Site,
        board: &Board,
    ) -> Result<(), Error>;

    /// Decodes a catalog payload, one OP per thread.
    fn load_catalog<R: Read>(
        &self,
        body: R,
        processor: &ReadingProcessor,
        site: &Site,
        board: &Board,
    ) -> Result<(), Error>;

    /// Decodes only the fields needed for watch notifications.
    fn read_bookmark_info<R: Read>(
        &self,
        thread: &ThreadDescriptor,
        expected_capacity: usize,
        body: R,
    ) -> Result<ThreadBookmarkInfo, Error>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SiteDecoder {
    Futaba(Futaba),
    Vichan(Vichan),
    Taimaba(Taimaba),
    Lynxchan(Lynxchan),
    Dvach(Dvach),
}

impl From<Dialect> for SiteDecoder {
    fn from(dialect: Dialect) -> Self {
        match dialect {
            Dialect::Futaba => SiteDecoder::Futaba(Futaba),
            Dialect::Vichan => SiteDecoder::Vichan(Vichan),
            Dialect::Taimaba => SiteDecoder::Taimaba(Taimaba),
            Dialect::Lynxchan => SiteDecoder::Lynxchan(Lynxchan),
            Dialect::Dvach => SiteDecoder::Dvach(Dvach),
        }
    }
}

impl ChanDecoder for SiteDecoder {
    fn load_thread<R: Read>(
        &self,
        body: R,
        processor: &ReadingProcessor,
        site: &Site,
        board: &Board,
    ) -> Result<(), Error> {
        match self {
            SiteDecoder::Futaba(d) => d.load_thread(body, processor, site, board),
            SiteDecoder::Vichan(d) => d.load_thread(body, processor, site, board),
            SiteDecoder::Taimaba(d) => d.load_thread(body, processor, site, board),
            SiteDecoder::Lynxchan(d) => d.load_thread(body, processor, site, board),
            SiteDecoder::Dvach(d) => d.load_thread(body, processor, site, board),
        }
    }

    fn load_catalog<R: Read>(
        &self,
        body: R,
        processor: &ReadingProcessor,
        site: &Site,
        board: &Board,
    ) -> Result<(), Error> {
        match self {
            SiteDecoder::Futaba(d) => d.load_catalog(body, processor, site, board),
            SiteDecoder::Vichan(d) => d.load_catalog(body, processor, site, board),
            SiteDecoder::Taimaba(d) => d.load_catalog(body, processor, site, board),
            SiteDecoder::Lynxchan(d) => d.load_catalog(body, processor, site, board),
            SiteDecoder::Dvach(d) => d.load_catalog(body, processor, site, board),
        }
    }

    fn read_bookmark_info<R: Read>(
        &self,
        thread: &ThreadDescriptor,
        expected_capacity: usize,
        body: R,
    ) -> Result<ThreadBookmarkInfo, Error> {
        match self {
            SiteDecoder::Futaba(d) => d.read_bookmark_info(thread, expected_capacity, body),
            SiteDecoder::Vichan(d) => d.read_bookmark_info(thread, expected_capacity, body),
            SiteDecoder::Taimaba(d) => d.read_bookmark_info(thread, expected_capacity, body),
            SiteDecoder::Lynxchan(d) => d.read_bookmark_info(thread, expected_capacity, body),
            SiteDecoder::Dvach(d) => d.read_bookmark_info(thread, expected_capacity, body),
        }
    }
}
