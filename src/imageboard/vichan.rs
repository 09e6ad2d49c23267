use std::io::Read;

use super::common::RawPost;
use super::futaba::{self, FutabaFamily};
use super::ChanDecoder;
use crate::model::{HttpIcon, PostBuilder, ThreadBookmarkInfo, ThreadDescriptor};
use crate::reader::ReadingProcessor;
use crate::site::{Board, Site};
use crate::Error;

/// vichan and its forks. Shares the 4chan envelope; `tim` may be a string
/// and flags come as `country`/`troll_country`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Vichan;

pub(super) fn country_icons(
    raw: &mut RawPost,
    site: &Site,
    board: &Board,
    builder: &mut PostBuilder,
) -> Result<(), Error> {
    let name = match raw.country_name.take() {
        Some(name) => name,
        None => return Ok(()),
    };

    if let Some(code) = raw.country.take() {
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

    if let Some(code) = raw.troll_country.take() {
        let icon = HttpIcon::from_template(
            site,
            board,
            "troll_country",
            format!("{}/t_{}", name, code),
            &[("troll_country_code", code.to_ascii_lowercase())],
        )?;
        if let Some(icon) = icon {
            builder.add_http_icon(icon);
        }
    }

    Ok(())
}

impl FutabaFamily for Vichan {
    fn icons(
        raw: &mut RawPost,
        site: &Site,
        board: &Board,
        builder: &mut PostBuilder,
    ) -> Result<(), Error> {
        country_icons(raw, site, board, builder)
    }
}

impl ChanDecoder for Vichan {
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
