//! Core library for exporting a wiki page store to a static file tree.
//!
//! The pipeline indexes the whole wiki once, then converts page by page:
//! titles run through a placement heuristic chain into directories, markup
//! pages are rendered to scrubbed HTML with relative cross-page links, and
//! everything else is copied verbatim.

pub mod config;
pub mod convert;
pub mod index;
pub mod parser;
pub mod placement;
pub mod render;
pub mod resolver;
pub mod scrub;
pub mod storage;
