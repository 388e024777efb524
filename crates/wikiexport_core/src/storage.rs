use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, percent_decode_str, utf8_percent_encode};
use walkdir::WalkDir;

/// MIME type the wiki engine assigns to markup pages.
pub const WIKI_MIME: &str = "text/x-wiki";

/// Characters kept verbatim in page-store file names besides alphanumerics.
const FILE_NAME_KEEP: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'_')
    .remove(b'-')
    .remove(b'.');

/// Read access to the wiki's page set.
///
/// Titles are opaque keys; the conversion never creates or renames pages,
/// it only reads them and maps them to output paths.
pub trait Storage {
    fn page_exists(&self, title: &str) -> bool;
    /// MIME classification for a page, derived from the title.
    fn page_mime(&self, title: &str) -> String;
    /// Markup source of a page. Only meaningful for markup pages.
    fn page_text(&self, title: &str) -> Result<String>;
    /// Raw bytes of a page. Only meaningful for raw pages.
    fn page_bytes(&self, title: &str) -> Result<Vec<u8>>;
    /// Every title in the page set, one pass, finite.
    fn all_page_titles(&self) -> Vec<String>;
}

/// Guess a page's MIME type from its title. Titles without a recognized
/// file extension are wiki markup.
pub fn title_mime(title: &str) -> String {
    mime_guess::from_path(title)
        .first_raw()
        .map(str::to_string)
        .unwrap_or_else(|| WIKI_MIME.to_string())
}

/// A page store laid out as a single flat directory whose file names are
/// the percent-encoded page titles (the source wiki engine's layout).
#[derive(Debug)]
pub struct DirectoryStorage {
    root: PathBuf,
    titles: Vec<String>,
}

impl DirectoryStorage {
    /// Scan `root` once and decode every file name back into a page title.
    pub fn open(root: &Path) -> Result<Self> {
        let mut titles = Vec::new();
        for entry in WalkDir::new(root)
            .min_depth(1)
            .max_depth(1)
            .sort_by_file_name()
        {
            let entry =
                entry.with_context(|| format!("failed to scan page store {}", root.display()))?;
            if !entry.file_type().is_file() {
                continue;
            }
            let name = entry
                .file_name()
                .to_str()
                .with_context(|| format!("non-UTF-8 page file name in {}", root.display()))?;
            let title = percent_decode_str(name)
                .decode_utf8()
                .with_context(|| format!("page file name '{name}' does not decode to UTF-8"))?
                .into_owned();
            titles.push(title);
        }
        Ok(Self {
            root: root.to_path_buf(),
            titles,
        })
    }

    fn page_path(&self, title: &str) -> PathBuf {
        self.root
            .join(utf8_percent_encode(title, FILE_NAME_KEEP).to_string())
    }
}

impl Storage for DirectoryStorage {
    fn page_exists(&self, title: &str) -> bool {
        self.page_path(title).is_file()
    }

    fn page_mime(&self, title: &str) -> String {
        title_mime(title)
    }

    fn page_text(&self, title: &str) -> Result<String> {
        fs::read_to_string(self.page_path(title))
            .with_context(|| format!("failed to read page '{title}'"))
    }

    fn page_bytes(&self, title: &str) -> Result<Vec<u8>> {
        fs::read(self.page_path(title)).with_context(|| format!("failed to read page '{title}'"))
    }

    fn all_page_titles(&self) -> Vec<String> {
        self.titles.clone()
    }
}

/// In-memory page store. Used by embedders feeding pages from somewhere
/// other than a directory, and throughout the test suite.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    pages: BTreeMap<String, Vec<u8>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, title: &str, content: impl Into<Vec<u8>>) {
        self.pages.insert(title.to_string(), content.into());
    }
}

impl Storage for MemoryStorage {
    fn page_exists(&self, title: &str) -> bool {
        self.pages.contains_key(title)
    }

    fn page_mime(&self, title: &str) -> String {
        title_mime(title)
    }

    fn page_text(&self, title: &str) -> Result<String> {
        let bytes = self
            .pages
            .get(title)
            .with_context(|| format!("page '{title}' not found"))?;
        String::from_utf8(bytes.clone()).with_context(|| format!("page '{title}' is not UTF-8"))
    }

    fn page_bytes(&self, title: &str) -> Result<Vec<u8>> {
        self.pages
            .get(title)
            .cloned()
            .with_context(|| format!("page '{title}' not found"))
    }

    fn all_page_titles(&self) -> Vec<String> {
        self.pages.keys().cloned().collect()
    }
}
