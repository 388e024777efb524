//! Mapping titles to output paths and computing references between them.

use anyhow::Result;
use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, utf8_percent_encode};
use thiserror::Error;

use crate::config::{ConvertOptions, ExtensionPolicy};
use crate::index::BacklinkLookup;
use crate::placement::{PlacementContext, rewrite_title};
use crate::storage::{Storage, WIKI_MIME};

/// Characters left unescaped in output path segments besides alphanumerics.
const SEGMENT_KEEP: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b' ')
    .remove(b'_')
    .remove(b'-')
    .remove(b'.');

/// Fatal: a title produced zero usable path segments. Indicates a systemic
/// title-shape problem, so the whole run aborts rather than skipping a page.
#[derive(Debug, Error)]
#[error("no usable path segments in title '{title}'")]
pub struct TitleDecompositionError {
    pub title: String,
}

/// Map a (possibly hierarchical) title into a relative, `/`-joined path of
/// percent-encoded segments. Space, `_`, `-` and `.` stay unescaped.
pub fn encode_title(title: &str) -> Result<String, TitleDecompositionError> {
    let segments: Vec<&str> = title.split('/').filter(|s| !s.is_empty()).collect();
    if segments.is_empty() {
        return Err(TitleDecompositionError {
            title: title.to_string(),
        });
    }
    Ok(segments
        .iter()
        .map(|segment| utf8_percent_encode(segment, SEGMENT_KEEP).to_string())
        .collect::<Vec<_>>()
        .join("/"))
}

/// Whether a path is being computed for the physical output file or for a
/// cross-page reference. The two can differ in extension handling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PathUse {
    Output,
    Reference,
}

/// Composes the placement chain, the path encoder, page classification and
/// the run options into final output paths.
pub struct PathResolver<'a> {
    storage: &'a dyn Storage,
    backlinks: &'a dyn BacklinkLookup,
    front_page: &'a str,
    options: &'a ConvertOptions,
}

impl<'a> PathResolver<'a> {
    pub fn new(
        storage: &'a dyn Storage,
        backlinks: &'a dyn BacklinkLookup,
        front_page: &'a str,
        options: &'a ConvertOptions,
    ) -> Self {
        Self {
            storage,
            backlinks,
            front_page,
            options,
        }
    }

    /// Raw pages are copied verbatim; everything with the wiki markup MIME
    /// type is rendered. Classification uses the original title, before any
    /// placement rewriting.
    pub fn is_raw(&self, title: &str) -> bool {
        self.storage.page_mime(title) != WIKI_MIME
    }

    /// The relative output path for a title.
    pub fn out_subpath(&self, title: &str, path_use: PathUse) -> Result<String> {
        let raw = self.is_raw(title);
        let context = PlacementContext {
            front_page: self.front_page,
            backlinks: self.backlinks,
        };
        let mut placed = rewrite_title(title, &context);
        if raw && self.options.files_in_one_dir {
            placed = placed.replace('/', "_");
        }

        let mut subpath = encode_title(&placed)?;
        if raw {
            if let Some(prefix) = &self.options.file_prefix {
                subpath = format!("{prefix}/{subpath}");
            }
        } else if let Some(extension) = self.extension_for(path_use) {
            subpath.push_str(extension);
        } else if path_use == PathUse::Output {
            // Rendered pages always get a physical .html name unless the
            // extension policy already supplied one.
            subpath.push_str(".html");
        }
        Ok(subpath)
    }

    /// POSIX-style relative path from `from`'s directory to `to`'s output,
    /// both resolved with the reference extension policy.
    pub fn relative_reference(&self, from: &str, to: &str) -> Result<String> {
        let from_path = self.out_subpath(from, PathUse::Reference)?;
        let to_path = self.out_subpath(to, PathUse::Reference)?;
        Ok(relative_path(&from_path, &to_path))
    }

    fn extension_for(&self, path_use: PathUse) -> Option<&str> {
        let extension = self.options.link_extension.as_deref()?;
        let applies = match self.options.extension_policy {
            ExtensionPolicy::Both => true,
            ExtensionPolicy::Output => path_use == PathUse::Output,
            ExtensionPolicy::ReferencesOnly => path_use == PathUse::Reference,
        };
        applies.then_some(extension)
    }
}

/// Shortest relative path from the directory containing `from` to `to`.
fn relative_path(from: &str, to: &str) -> String {
    let mut from_dir: Vec<&str> = from.split('/').collect();
    from_dir.pop();
    let to_segments: Vec<&str> = to.split('/').collect();

    let common = from_dir
        .iter()
        .zip(&to_segments)
        .take_while(|(a, b)| a == b)
        .count();

    let mut parts: Vec<&str> = Vec::new();
    for _ in common..from_dir.len() {
        parts.push("..");
    }
    parts.extend(&to_segments[common..]);
    if parts.is_empty() {
        ".".to_string()
    } else {
        parts.join("/")
    }
}
