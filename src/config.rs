use std::num::NonZeroUsize;
use std::time::Duration;

use rustc_hash::FxHashMap;
use serde::Deserialize;

use crate::site::Dialect;

#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct Config {
    pub parse_workers: Option<NonZeroUsize>,
    pub bookmark_batch_size: Option<NonZeroUsize>,
    #[serde(with = "humantime_serde")]
    pub fetch_timeout: Option<Duration>,
    pub sites: FxHashMap<String, Site>,
}

impl Config {
    pub fn parse_workers(&self) -> usize {
        self.parse_workers
            .map(|w| w.get())
            .unwrap_or_else(num_cpus::get)
    }

    pub fn bookmark_batch_size(&self) -> usize {
        self.bookmark_batch_size.map(|b| b.get()).unwrap_or(8)
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct Site {
    pub dialect: Dialect,
    pub thumbnail: String,
    #[serde(default)]
    pub spoiler_thumbnail: Option<String>,
    pub image: String,
    #[serde(default)]
    pub icons: FxHashMap<String, String>,
    #[serde(default)]
    pub accurate_file_sizes: Option<bool>,
    #[serde(default)]
    pub trusted_file_hashes: Option<bool>,
    /// Accept payloads for boards that have no table below.
    #[serde(default)]
    pub allow_unknown_boards: Option<bool>,
    #[serde(default)]
    pub boards: Board,
}

#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct Board {
    pub custom_spoilers: Option<u32>,
    pub bump_limit: Option<u32>,
    pub image_limit: Option<u32>,

    #[serde(flatten)]
    pub boards: FxHashMap<String, Board>,
}

#[cfg(test)]
mod tests {
    use super::*;

    const CONFIG: &str = r#"
parse_workers = 2
fetch_timeout = "15s"

[sites.4chan]
dialect = "futaba"
thumbnail = "https://i.4cdn.org/{board}/{tim}s.jpg"
image = "https://i.4cdn.org/{board}/{tim}.{ext}"
accurate_file_sizes = true

[sites.4chan.icons]
country = "https://s.4cdn.org/image/country/{country_code}.gif"

[sites.4chan.boards]
bump_limit = 300

[sites.4chan.boards.g]
custom_spoilers = 1

[sites.4chan.boards.v]
bump_limit = 500
"#;

    #[test]
    fn parses_nested_boards() {
        let config: Config = toml::from_str(CONFIG).unwrap();
        assert_eq!(config.parse_workers(), 2);
        assert_eq!(config.bookmark_batch_size(), 8);
        assert_eq!(config.fetch_timeout, Some(Duration::from_secs(15)));

        let site = &config.sites["4chan"];
        assert_eq!(site.dialect, Dialect::Futaba);
        assert_eq!(site.boards.bump_limit, Some(300));
        assert_eq!(site.boards.boards["g"].custom_spoilers, Some(1));
        assert_eq!(site.boards.boards["v"].bump_limit, Some(500));
        assert!(site.icons.contains_key("country"));
    }

    #[test]
    fn empty_config_uses_defaults() {
        let config: Config = toml::from_str("").unwrap();
        assert!(config.sites.is_empty());
        assert!(config.fetch_timeout.is_none());
        assert_eq!(config.bookmark_batch_size(), 8);
        assert!(config.parse_workers() >= 1);
    }
}
