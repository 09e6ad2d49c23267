//! Decodes imageboard thread and catalog payloads from several backends into
//! one immutable post model, skipping the parse for posts that have not
//! changed since the previous fetch.

pub mod bookmark;
pub mod config;
mod error;
pub mod imageboard;
pub mod model;
pub mod parser;
pub mod reader;
pub mod site;

pub use error::{Error, ErrorKind, Result};
