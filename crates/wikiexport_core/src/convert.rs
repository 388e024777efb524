//! Whole-wiki conversion: walks every stored page and writes the output
//! tree, rendering markup pages to HTML and copying everything else.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use html_escape::encode_text;
use tracing::{debug, info};

use crate::config::{ConvertOptions, WikiConfig};
use crate::index::LinkIndex;
use crate::parser::parse_markup;
use crate::render::{AliasTable, LinkRenderer};
use crate::resolver::{PathResolver, PathUse};
use crate::scrub::scrub_html;
use crate::storage::Storage;

/// Counts reported after a conversion run.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ConvertReport {
    /// Markup pages rendered to HTML.
    pub pages: usize,
    /// Raw attachments copied verbatim.
    pub files: usize,
}

/// Convert every page in `storage` into a static file tree under `out_dir`.
///
/// The whole wiki is indexed up front so that backlink placement and alias
/// expansion see the full link graph before any page is written.
pub fn convert_wiki(
    storage: &dyn Storage,
    config: &WikiConfig,
    out_dir: &Path,
    options: &ConvertOptions,
) -> Result<ConvertReport> {
    let index = LinkIndex::build(storage)?;
    let aliases = AliasTable::from_index(&index, storage, config.alias_page());
    let resolver = PathResolver::new(storage, &index, config.front_page(), options);

    fs::create_dir_all(out_dir)
        .with_context(|| format!("failed to create {}", out_dir.display()))?;

    let mut report = ConvertReport::default();
    for title in storage.all_page_titles() {
        convert_page(storage, &resolver, &aliases, out_dir, &title, &mut report)
            .with_context(|| format!("failed to convert page '{title}'"))?;
    }
    info!(pages = report.pages, files = report.files, "conversion finished");
    Ok(report)
}

fn convert_page(
    storage: &dyn Storage,
    resolver: &PathResolver,
    aliases: &AliasTable,
    out_dir: &Path,
    title: &str,
    report: &mut ConvertReport,
) -> Result<()> {
    let subpath = resolver.out_subpath(title, PathUse::Output)?;
    let out_path = out_dir.join(&subpath);
    if let Some(parent) = out_path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }

    if resolver.is_raw(title) {
        let mime = storage.page_mime(title);
        debug!(%mime, %title, %subpath, "copying file");
        let bytes = storage.page_bytes(title)?;
        fs::write(&out_path, bytes)
            .with_context(|| format!("failed to write {}", out_path.display()))?;
        report.files += 1;
    } else {
        debug!(%title, %subpath, "rendering page");
        let html = render_page(storage, resolver, aliases, title)?;
        fs::write(&out_path, html)
            .with_context(|| format!("failed to write {}", out_path.display()))?;
        report.pages += 1;
    }
    Ok(())
}

/// Render one markup page to a complete, scrubbed HTML document.
fn render_page(
    storage: &dyn Storage,
    resolver: &PathResolver,
    aliases: &AliasTable,
    title: &str,
) -> Result<String> {
    let text = storage.page_text(title)?;
    let mut renderer = LinkRenderer::new(title, resolver, storage, aliases);
    let body = parse_markup(&text, &mut renderer)?.concat();
    let page = format!(
        "<!DOCTYPE html>\n\
         <html lang=\"en\"><head><meta charset=\"utf-8\" />\
         <title>{}</title></head>\
         <body>{body}</body></html>",
        encode_text(title)
    );
    scrub_html(&page)
}
