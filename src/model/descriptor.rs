use std::fmt;
use std::sync::Arc;

use lazy_static::lazy_static;
use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use serde::Serialize;

lazy_static! {
    static ref SITES: Mutex<FxHashMap<Arc<str>, SiteDescriptor>> = Mutex::new(FxHashMap::default());
    static ref BOARDS: Mutex<FxHashMap<SiteDescriptor, FxHashMap<Arc<str>, BoardDescriptor>>> =
        Mutex::new(FxHashMap::default());
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct SiteDescriptor(Arc<str>);

impl SiteDescriptor {
    /// Returns the interned descriptor for `name`; every call with the same
    /// name shares one allocation.
    pub fn new<T: AsRef<str>>(name: T) -> Self {
        let mut sites = SITES.lock();
        if let Some(site) = sites.get(name.as_ref()) {
            return site.clone();
        }
        let site = SiteDescriptor(Arc::from(name.as_ref()));
        sites.insert(site.0.clone(), site.clone());
        site
    }

    pub fn name(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SiteDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct BoardDescriptor {
    site: SiteDescriptor,
    code: Arc<str>,
}

impl BoardDescriptor {
    pub fn new<T: AsRef<str>, U: AsRef<str>>(site: T, code: U) -> Self {
        Self::from_site(SiteDescriptor::new(site), code)
    }

    pub fn from_site<U: AsRef<str>>(site: SiteDescriptor, code: U) -> Self {
        let mut boards = BOARDS.lock();
        let site_boards = boards.entry(site.clone()).or_default();
        if let Some(board) = site_boards.get(code.as_ref()) {
            return board.clone();
        }
        let board = BoardDescriptor {
            site,
            code: Arc::from(code.as_ref()),
        };
        site_boards.insert(board.code.clone(), board.clone());
        board
    }

    pub fn site(&self) -> &SiteDescriptor {
        &self.site
    }

    pub fn code(&self) -> &str {
        &self.code
    }

    pub fn thread(&self, thread_no: u64) -> ThreadDescriptor {
        ThreadDescriptor {
            board: self.clone(),
            thread_no,
        }
    }
}

impl fmt::Display for BoardDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.site, self.code)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct ThreadDescriptor {
    board: BoardDescriptor,
    thread_no: u64,
}

impl ThreadDescriptor {
    pub fn new<T: AsRef<str>, U: AsRef<str>>(site: T, board: U, thread_no: u64) -> Self {
        BoardDescriptor::new(site, board).thread(thread_no)
    }

    pub fn board(&self) -> &BoardDescriptor {
        &self.board
    }

    pub fn thread_no(&self) -> u64 {
        self.thread_no
    }

    pub fn post(&self, post_no: u64) -> PostDescriptor {
        PostDescriptor {
            thread: self.clone(),
            post_no,
            post_sub_no: 0,
        }
    }
}

impl fmt::Display for ThreadDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.board, self.thread_no)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct CatalogDescriptor {
    board: BoardDescriptor,
}

impl CatalogDescriptor {
    pub fn new<T: AsRef<str>, U: AsRef<str>>(site: T, board: U) -> Self {
        Self {
            board: BoardDescriptor::new(site, board),
        }
    }

    pub fn board(&self) -> &BoardDescriptor {
        &self.board
    }
}

impl From<BoardDescriptor> for CatalogDescriptor {
    fn from(board: BoardDescriptor) -> Self {
        Self { board }
    }
}

impl fmt::Display for CatalogDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/catalog", self.board)
    }
}

/// Where the result of one fetch belongs.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub enum ChanDescriptor {
    Thread(ThreadDescriptor),
    Catalog(CatalogDescriptor),
}

impl ChanDescriptor {
    pub fn board(&self) -> &BoardDescriptor {
        match self {
            ChanDescriptor::Thread(t) => t.board(),
            ChanDescriptor::Catalog(c) => c.board(),
        }
    }

    pub fn site(&self) -> &SiteDescriptor {
        self.board().site()
    }

    pub fn is_catalog(&self) -> bool {
        matches!(self, ChanDescriptor::Catalog(_))
    }

    pub fn thread(&self) -> Option<&ThreadDescriptor> {
        match self {
            ChanDescriptor::Thread(t) => Some(t),
            ChanDescriptor::Catalog(_) => None,
        }
    }
}

impl From<ThreadDescriptor> for ChanDescriptor {
    fn from(thread: ThreadDescriptor) -> Self {
        ChanDescriptor::Thread(thread)
    }
}

impl From<CatalogDescriptor> for ChanDescriptor {
    fn from(catalog: CatalogDescriptor) -> Self {
        ChanDescriptor::Catalog(catalog)
    }
}

impl fmt::Display for ChanDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChanDescriptor::Thread(t) => t.fmt(f),
            ChanDescriptor::Catalog(c) => c.fmt(f),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct PostDescriptor {
    thread: ThreadDescriptor,
    post_no: u64,
    post_sub_no: u64,
}

impl PostDescriptor {
    pub fn new<T: AsRef<str>, U: AsRef<str>>(
        site: T,
        board: U,
        thread_no: u64,
        post_no: u64,
        post_sub_no: u64,
    ) -> Self {
        Self {
            thread: ThreadDescriptor::new(site, board, thread_no),
            post_no,
            post_sub_no,
        }
    }

    pub fn with_sub_no(mut self, post_sub_no: u64) -> Self {
        self.post_sub_no = post_sub_no;
        self
    }

    pub fn thread(&self) -> &ThreadDescriptor {
        &self.thread
    }

    pub fn board(&self) -> &BoardDescriptor {
        self.thread.board()
    }

    pub fn thread_no(&self) -> u64 {
        self.thread.thread_no
    }

    pub fn post_no(&self) -> u64 {
        self.post_no
    }

    pub fn post_sub_no(&self) -> u64 {
        self.post_sub_no
    }

    pub fn is_op(&self) -> bool {
        self.post_no == self.thread.thread_no
    }
}

impl fmt::Display for PostDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.post_sub_no > 0 {
            write!(f, "{}/{},{}", self.thread, self.post_no, self.post_sub_no)
        } else {
            write!(f, "{}/{}", self.thread, self.post_no)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn descriptors_are_interned() {
        let a = BoardDescriptor::new("4chan", "g");
        let b = BoardDescriptor::new("4chan", "g");
        assert_eq!(a, b);
        assert!(Arc::ptr_eq(&a.code, &b.code));
        assert!(Arc::ptr_eq(&a.site().0, &b.site().0));

        let c = BoardDescriptor::new("lainchan", "g");
        assert_ne!(a, c);
    }

    #[test]
    fn post_descriptor_equality_covers_all_fields() {
        let a = PostDescriptor::new("4chan", "g", 1, 2, 0);
        assert_eq!(a, PostDescriptor::new("4chan", "g", 1, 2, 0));
        assert_ne!(a, PostDescriptor::new("4chan", "g", 1, 2, 1));
        assert_ne!(a, PostDescriptor::new("4chan", "g", 3, 2, 0));
        assert_ne!(a, PostDescriptor::new("4chan", "v", 1, 2, 0));
        assert_eq!(a.to_string(), "4chan/g/1/2");
    }

    #[test]
    fn op_descriptor() {
        let thread = ThreadDescriptor::new("4chan", "g", 100);
        assert!(thread.post(100).is_op());
        assert!(!thread.post(101).is_op());
    }
}
