//! Link graph built by parsing every markup page once per run.

use std::collections::{HashMap, HashSet};

use anyhow::{Context, Result};

use crate::parser::{MarkupCallbacks, parse_markup};
use crate::render::is_external_link;
use crate::storage::{Storage, WIKI_MIME};

/// Read-only backlink access. The returned set carries no ordering
/// guarantee; callers must not depend on enumeration order.
pub trait BacklinkLookup {
    fn backlinks_of(&self, title: &str) -> HashSet<String>;
}

/// Synthetic graphs for tests and embedders.
impl BacklinkLookup for HashMap<String, HashSet<String>> {
    fn backlinks_of(&self, title: &str) -> HashSet<String> {
        self.get(title).cloned().unwrap_or_default()
    }
}

/// Per-page outgoing links and the inverted backlink map.
#[derive(Debug, Default)]
pub struct LinkIndex {
    links: HashMap<String, Vec<(String, Option<String>)>>,
    backlinks: HashMap<String, HashSet<String>>,
}

impl LinkIndex {
    /// Parse every markup page and record its `(address, label)` pairs.
    /// Backlinks only track internal page targets; external URLs, aliases
    /// and in-page anchors are skipped, and fragments are stripped.
    pub fn build(storage: &dyn Storage) -> Result<Self> {
        let mut index = Self::default();
        for title in storage.all_page_titles() {
            if storage.page_mime(&title) != WIKI_MIME {
                continue;
            }
            let text = storage
                .page_text(&title)
                .with_context(|| format!("failed to index page '{title}'"))?;
            let links = extract_links(&text)?;
            for (addr, _) in &links {
                if let Some(target) = internal_target(addr) {
                    index
                        .backlinks
                        .entry(target.to_string())
                        .or_default()
                        .insert(title.clone());
                }
            }
            index.links.insert(title, links);
        }
        Ok(index)
    }

    pub fn links_and_labels(&self, title: &str) -> &[(String, Option<String>)] {
        self.links.get(title).map(Vec::as_slice).unwrap_or(&[])
    }
}

impl BacklinkLookup for LinkIndex {
    fn backlinks_of(&self, title: &str) -> HashSet<String> {
        self.backlinks.get(title).cloned().unwrap_or_default()
    }
}

fn internal_target(addr: &str) -> Option<&str> {
    if is_external_link(addr) || addr.starts_with(':') {
        return None;
    }
    let page = addr.split('#').next().unwrap_or(addr);
    (!page.is_empty()).then_some(page)
}

fn extract_links(text: &str) -> Result<Vec<(String, Option<String>)>> {
    let mut collector = LinkCollector::default();
    parse_markup(text, &mut collector)?;
    Ok(collector.links)
}

/// Callback sink that records addresses instead of rendering.
#[derive(Default)]
struct LinkCollector {
    links: Vec<(String, Option<String>)>,
}

impl MarkupCallbacks for LinkCollector {
    fn wiki_link(
        &mut self,
        addr: &str,
        label: Option<&str>,
        _class: Option<&str>,
        _image: Option<&str>,
    ) -> Result<String> {
        self.links.push((addr.to_string(), label.map(str::to_string)));
        Ok(String::new())
    }

    fn wiki_image(&mut self, addr: &str, alt: &str, _class: Option<&str>) -> Result<String> {
        let label = (!alt.is_empty()).then(|| alt.to_string());
        self.links.push((addr.to_string(), label));
        Ok(String::new())
    }

    fn wiki_math(&mut self, _text: &str, _display: bool) -> Result<String> {
        Ok(String::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStorage;

    #[test]
    fn backlinks_are_inverted_links() {
        let mut storage = MemoryStorage::new();
        storage.insert("COMP3620", "see [[Search (AI)]]");
        storage.insert("COMP3620Revision", "also [[Search (AI)|search]]");
        storage.insert("Search (AI)", "content");

        let index = LinkIndex::build(&storage).expect("build index");
        let backlinks = index.backlinks_of("Search (AI)");
        assert_eq!(
            backlinks,
            ["COMP3620".to_string(), "COMP3620Revision".to_string()]
                .into_iter()
                .collect()
        );
    }

    #[test]
    fn external_alias_and_anchor_targets_are_skipped() {
        let mut storage = MemoryStorage::new();
        storage.insert(
            "Page",
            "[[http://example.com|ext]] [[:wiki:Thing|alias]] [[#frag|anchor]]",
        );

        let index = LinkIndex::build(&storage).expect("build index");
        assert!(index.backlinks_of("http://example.com").is_empty());
        // The anchor's address is empty after stripping the fragment.
        assert!(index.backlinks_of("").is_empty());
        // Labels are still recorded for all three.
        assert_eq!(index.links_and_labels("Page").len(), 3);
    }

    #[test]
    fn fragments_are_stripped_from_targets() {
        let mut storage = MemoryStorage::new();
        storage.insert("Page", "[[Other#section]]");

        let index = LinkIndex::build(&storage).expect("build index");
        assert_eq!(
            index.backlinks_of("Other"),
            ["Page".to_string()].into_iter().collect()
        );
    }

    #[test]
    fn raw_pages_are_not_indexed() {
        let mut storage = MemoryStorage::new();
        storage.insert("photo.png", [0u8, 1, 2]);
        storage.insert("Page", "[[photo.png]]");

        let index = LinkIndex::build(&storage).expect("build index");
        assert_eq!(
            index.backlinks_of("photo.png"),
            ["Page".to_string()].into_iter().collect()
        );
        assert!(index.links_and_labels("photo.png").is_empty());
    }

    #[test]
    fn mime_classification_comes_from_the_storage_impl() {
        // A storage may classify titles differently than the extension
        // guess; indexing must honor its page_mime.
        struct MarkupEverything(MemoryStorage);

        impl Storage for MarkupEverything {
            fn page_exists(&self, title: &str) -> bool {
                self.0.page_exists(title)
            }
            fn page_mime(&self, _title: &str) -> String {
                WIKI_MIME.to_string()
            }
            fn page_text(&self, title: &str) -> Result<String> {
                self.0.page_text(title)
            }
            fn page_bytes(&self, title: &str) -> Result<Vec<u8>> {
                self.0.page_bytes(title)
            }
            fn all_page_titles(&self) -> Vec<String> {
                self.0.all_page_titles()
            }
        }

        let mut inner = MemoryStorage::new();
        inner.insert("notes.txt", "[[Other]]");
        let storage = MarkupEverything(inner);

        let index = LinkIndex::build(&storage).expect("build index");
        assert_eq!(
            index.backlinks_of("Other"),
            ["notes.txt".to_string()].into_iter().collect()
        );
    }

    #[test]
    fn image_addresses_count_as_links() {
        let mut storage = MemoryStorage::new();
        storage.insert("Page", "{{diagram.png|alt text}}");

        let index = LinkIndex::build(&storage).expect("build index");
        assert_eq!(
            index.links_and_labels("Page"),
            &[("diagram.png".to_string(), Some("alt text".to_string()))]
        );
        assert_eq!(
            index.backlinks_of("diagram.png"),
            ["Page".to_string()].into_iter().collect()
        );
    }
}
