use std::sync::Arc;

use lazy_static::lazy_static;
use percent_encoding::{utf8_percent_encode, AsciiSet, CONTROLS};
use regex::Regex;
use rustc_hash::FxHashMap;
use serde::Deserialize;
use url::Url;

use crate::config;
use crate::model::{BoardDescriptor, SiteDescriptor};
use crate::Error;

/// Characters escaped when a value is substituted into a URL template. `/`
/// is kept so path-valued arguments (lynxchan, dvach) render as paths.
const TEMPLATE_VALUE: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'#')
    .add(b'%')
    .add(b'<')
    .add(b'>')
    .add(b'?')
    .add(b'`')
    .add(b'{')
    .add(b'}');

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Dialect {
    Futaba,
    Vichan,
    Taimaba,
    Lynxchan,
    Dvach,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SiteQuirks {
    /// The site reports byte-accurate file sizes.
    pub accurate_file_sizes: bool,
    /// File hashes sent by the site can be used to deduplicate media.
    pub trusted_file_hashes: bool,
}

impl Default for SiteQuirks {
    fn default() -> Self {
        Self {
            accurate_file_sizes: true,
            trusted_file_hashes: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Board {
    descriptor: BoardDescriptor,
    pub custom_spoilers: u32,
    pub bump_limit: Option<u32>,
    pub image_limit: Option<u32>,
}

impl Board {
    pub fn new(descriptor: BoardDescriptor) -> Self {
        Self {
            descriptor,
            custom_spoilers: 0,
            bump_limit: None,
            image_limit: None,
        }
    }

    pub fn descriptor(&self) -> &BoardDescriptor {
        &self.descriptor
    }

    pub fn code(&self) -> &str {
        self.descriptor.code()
    }
}

/// URL templates. `{board}` is always available; other placeholders are
/// filled from the arguments a decoder collects for an attachment or icon.
#[derive(Debug, Clone, Default)]
pub struct SiteEndpoints {
    thumbnail: String,
    spoiler_thumbnail: Option<String>,
    image: String,
    icons: FxHashMap<String, String>,
}

impl SiteEndpoints {
    pub fn new<T: Into<String>, U: Into<String>>(thumbnail: T, image: U) -> Self {
        Self {
            thumbnail: thumbnail.into(),
            image: image.into(),
            ..Default::default()
        }
    }

    pub fn with_spoiler_thumbnail<T: Into<String>>(mut self, template: T) -> Self {
        self.spoiler_thumbnail = Some(template.into());
        self
    }

    pub fn with_icon<T: Into<String>, U: Into<String>>(mut self, icon: T, template: U) -> Self {
        self.icons.insert(icon.into(), template.into());
        self
    }

    pub fn thumbnail_url(
        &self,
        board: &Board,
        spoiler: bool,
        args: &[(&'static str, String)],
    ) -> Result<Url, Error> {
        match (spoiler, &self.spoiler_thumbnail) {
            (true, Some(template)) => render(template, board, args),
            _ => render(&self.thumbnail, board, args),
        }
    }

    pub fn spoiler_thumbnail_url(
        &self,
        board: &Board,
        args: &[(&'static str, String)],
    ) -> Result<Option<Url>, Error> {
        self.spoiler_thumbnail
            .as_ref()
            .map(|template| render(template, board, args))
            .transpose()
    }

    pub fn image_url(&self, board: &Board, args: &[(&'static str, String)]) -> Result<Url, Error> {
        render(&self.image, board, args)
    }

    /// `Ok(None)` when the site has no template for `icon`.
    pub fn icon_url(
        &self,
        board: &Board,
        icon: &str,
        args: &[(&'static str, String)],
    ) -> Result<Option<Url>, Error> {
        self.icons
            .get(icon)
            .map(|template| render(template, board, args))
            .transpose()
    }
}

fn render(template: &str, board: &Board, args: &[(&'static str, String)]) -> Result<Url, Error> {
    lazy_static! {
        static ref PLACEHOLDER: Regex = Regex::new(r"\{(\w+)\}").unwrap();
    }

    let mut out = String::with_capacity(template.len() + 32);
    let mut last = 0;
    for cap in PLACEHOLDER.captures_iter(template) {
        let whole = cap.get(0).unwrap();
        let key = &cap[1];
        out.push_str(&template[last..whole.start()]);
        let value = match key {
            "board" => board.code().to_string(),
            "custom_spoiler" => {
                if board.custom_spoilers > 0 {
                    String::from("1")
                } else {
                    String::new()
                }
            }
            _ => args
                .iter()
                .find(|(k, _)| *k == key)
                .map(|(_, v)| v.clone())
                .ok_or_else(|| {
                    Error::parse(format!("url template argument '{}' is missing", key))
                })?,
        };
        out.extend(utf8_percent_encode(&value, TEMPLATE_VALUE));
        last = whole.end();
    }
    out.push_str(&template[last..]);

    Ok(Url::parse(&out)?)
}

#[derive(Debug, Clone)]
pub struct Site {
    descriptor: SiteDescriptor,
    dialect: Dialect,
    endpoints: SiteEndpoints,
    quirks: SiteQuirks,
    allow_unknown_boards: bool,
    boards: FxHashMap<BoardDescriptor, Board>,
}

impl Site {
    pub fn new<T: AsRef<str>>(name: T, dialect: Dialect, endpoints: SiteEndpoints) -> Self {
        Self {
            descriptor: SiteDescriptor::new(name),
            dialect,
            endpoints,
            quirks: SiteQuirks::default(),
            allow_unknown_boards: false,
            boards: FxHashMap::default(),
        }
    }

    pub fn with_quirks(mut self, quirks: SiteQuirks) -> Self {
        self.quirks = quirks;
        self
    }

    pub fn with_unknown_boards(mut self, allow: bool) -> Self {
        self.allow_unknown_boards = allow;
        self
    }

    pub fn with_board(mut self, board: Board) -> Self {
        self.boards.insert(board.descriptor.clone(), board);
        self
    }

    pub fn descriptor(&self) -> &SiteDescriptor {
        &self.descriptor
    }

    pub fn dialect(&self) -> Dialect {
        self.dialect
    }

    pub fn endpoints(&self) -> &SiteEndpoints {
        &self.endpoints
    }

    pub fn quirks(&self) -> SiteQuirks {
        self.quirks
    }

    /// Configured options for `board`, or blank options when the site
    /// accepts unconfigured boards.
    pub fn board(&self, board: &BoardDescriptor) -> Option<Board> {
        match self.boards.get(board) {
            Some(b) => Some(b.clone()),
            None if self.allow_unknown_boards && board.site() == &self.descriptor => {
                Some(Board::new(board.clone()))
            }
            None => None,
        }
    }

    fn from_config(name: &str, conf: &config::Site) -> Self {
        let endpoints = conf.icons.iter().fold(
            SiteEndpoints::new(conf.thumbnail.clone(), conf.image.clone()),
            |acc, (icon, template)| acc.with_icon(icon.clone(), template.clone()),
        );
        let endpoints = match conf.spoiler_thumbnail.as_ref() {
            Some(template) => endpoints.with_spoiler_thumbnail(template.clone()),
            None => endpoints,
        };
        let defaults = SiteQuirks::default();
        let quirks = SiteQuirks {
            accurate_file_sizes: conf
                .accurate_file_sizes
                .unwrap_or(defaults.accurate_file_sizes),
            trusted_file_hashes: conf
                .trusted_file_hashes
                .unwrap_or(defaults.trusted_file_hashes),
        };

        let defaults = &conf.boards;
        conf.boards.boards.iter().fold(
            Site::new(name, conf.dialect, endpoints)
                .with_quirks(quirks)
                .with_unknown_boards(conf.allow_unknown_boards.unwrap_or(false)),
            |site, (code, board)| {
                let descriptor = BoardDescriptor::new(name, code);
                site.with_board(Board {
                    descriptor,
                    custom_spoilers: board
                        .custom_spoilers
                        .or(defaults.custom_spoilers)
                        .unwrap_or(0),
                    bump_limit: board.bump_limit.or(defaults.bump_limit),
                    image_limit: board.image_limit.or(defaults.image_limit),
                })
            },
        )
    }
}

/// Resolves site and board configuration for the decoders.
pub trait SiteProvider: Send + Sync {
    fn site(&self, site: &SiteDescriptor) -> Option<Arc<Site>>;

    fn board(&self, board: &BoardDescriptor) -> Option<Board> {
        self.site(board.site()).and_then(|site| site.board(board))
    }
}

#[derive(Debug, Clone, Default)]
pub struct SiteRegistry {
    sites: FxHashMap<SiteDescriptor, Arc<Site>>,
}

impl SiteRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_site(mut self, site: Site) -> Self {
        self.sites.insert(site.descriptor.clone(), Arc::new(site));
        self
    }

    pub fn len(&self) -> usize {
        self.sites.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sites.is_empty()
    }
}

impl From<&config::Config> for SiteRegistry {
    fn from(config: &config::Config) -> Self {
        config
            .sites
            .iter()
            .fold(SiteRegistry::new(), |registry, (name, site)| {
                registry.with_site(Site::from_config(name, site))
            })
    }
}

impl SiteProvider for SiteRegistry {
    fn site(&self, site: &SiteDescriptor) -> Option<Arc<Site>> {
        self.sites.get(site).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn four_chan() -> Site {
        Site::new(
            "4chan",
            Dialect::Futaba,
            SiteEndpoints::new(
                "https://i.4cdn.org/{board}/{tim}s.jpg",
                "https://i.4cdn.org/{board}/{tim}.{ext}",
            )
            .with_spoiler_thumbnail("https://s.4cdn.org/image/spoiler-{board}{custom_spoiler}.png")
            .with_icon("country", "https://s.4cdn.org/image/country/{country_code}.gif"),
        )
        .with_board(Board::new(BoardDescriptor::new("4chan", "g")))
    }

    #[test]
    fn renders_templates() {
        let site = four_chan();
        let board = site.board(&BoardDescriptor::new("4chan", "g")).unwrap();
        let args = vec![("tim", String::from("1600000000000")), ("ext", String::from("png"))];
        let endpoints = site.endpoints();

        assert_eq!(
            endpoints.image_url(&board, &args).unwrap().as_str(),
            "https://i.4cdn.org/g/1600000000000.png"
        );
        assert_eq!(
            endpoints.thumbnail_url(&board, false, &args).unwrap().as_str(),
            "https://i.4cdn.org/g/1600000000000s.jpg"
        );
        assert_eq!(
            endpoints
                .spoiler_thumbnail_url(&board, &args)
                .unwrap()
                .unwrap()
                .as_str(),
            "https://s.4cdn.org/image/spoiler-g.png"
        );
        assert!(endpoints.icon_url(&board, "troll_country", &args).unwrap().is_none());
    }

    #[test]
    fn missing_argument_is_an_error() {
        let site = four_chan();
        let board = site.board(&BoardDescriptor::new("4chan", "g")).unwrap();
        assert!(site.endpoints().image_url(&board, &[]).is_err());
    }

    #[test]
    fn path_arguments_keep_slashes() {
        let site = Site::new(
            "endchan",
            Dialect::Lynxchan,
            SiteEndpoints::new("https://endchan.net/{thumb}", "https://endchan.net/{path}"),
        )
        .with_unknown_boards(true);
        let board = site.board(&BoardDescriptor::new("endchan", "b")).unwrap();
        let args = vec![("path", String::from(".media/ab cd.png"))];
        assert_eq!(
            site.endpoints().image_url(&board, &args).unwrap().as_str(),
            "https://endchan.net/.media/ab%20cd.png"
        );
    }

    #[test]
    fn unknown_boards() {
        let registry = SiteRegistry::new().with_site(four_chan());
        assert!(registry.board(&BoardDescriptor::new("4chan", "g")).is_some());
        assert!(registry.board(&BoardDescriptor::new("4chan", "v")).is_none());
        assert!(registry.site(&SiteDescriptor::new("8kun")).is_none());
    }
}
