//! Rendering of links, images and math into HTML.
//!
//! The anchor markup is assembled by hand rather than through a builder so
//! that already-computed hrefs are not escaped a second time.

use anyhow::Result;
use html_escape::{encode_double_quoted_attribute, encode_text};
use percent_encoding::{AsciiSet, CONTROLS, utf8_percent_encode};

use crate::index::LinkIndex;
use crate::parser::MarkupCallbacks;
use crate::resolver::PathResolver;
use crate::storage::Storage;

const EXTERNAL_SCHEMES: [&str; 7] = [
    "http:", "https:", "ftp:", "mailto:", "file:", "news:", "irc:",
];

/// Characters percent-encoded when normalizing a URL for output.
const URL_UNSAFE: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'<')
    .add(b'>')
    .add(b'`')
    .add(b'{')
    .add(b'}')
    .add(b'|')
    .add(b'\\')
    .add(b'^');

pub fn is_external_link(addr: &str) -> bool {
    EXTERNAL_SCHEMES.iter().any(|scheme| addr.starts_with(scheme))
}

/// Percent-encode the characters that are never valid in a URL, leaving
/// reserved characters (`/`, `?`, `#`, `&`, ...) alone.
pub fn url_fix(url: &str) -> String {
    utf8_percent_encode(url, URL_UNSAFE).to_string()
}

/// Alias name → substitution pattern, defined by the links on a designated
/// wiki page: the link address names the alias, the label is the pattern.
/// Built once per run and read-only afterwards.
#[derive(Debug, Default)]
pub struct AliasTable {
    entries: std::collections::HashMap<String, String>,
    /// Fallback link used for unknown aliases and malformed addresses.
    default_link: String,
}

impl AliasTable {
    pub fn from_index(
        index: &LinkIndex,
        storage: &dyn Storage,
        alias_page: Option<&str>,
    ) -> Self {
        let default_link = alias_page.unwrap_or_default().to_string();
        let mut entries = std::collections::HashMap::new();
        if let Some(page) = alias_page
            && storage.page_exists(page)
        {
            for (addr, label) in index.links_and_labels(page) {
                if let Some(label) = label {
                    entries.insert(addr.clone(), label.clone());
                }
            }
        }
        Self {
            entries,
            default_link,
        }
    }

    /// Expand `name:target`. A `%s` in the pattern substitutes the target,
    /// otherwise the target is appended. Unknown names and addresses with
    /// no `:` fall back to the alias page link.
    pub fn expand(&self, addr: &str) -> String {
        let Some((name, target)) = addr.split_once(':') else {
            return self.default_link.clone();
        };
        let Some(pattern) = self.entries.get(name) else {
            return self.default_link.clone();
        };
        if pattern.contains("%s") {
            pattern.replacen("%s", target, 1)
        } else {
            format!("{pattern}{target}")
        }
    }
}

/// Per-page render state. Owned by a single page's render call and
/// discarded afterwards; everything it borrows is read-only.
pub struct LinkRenderer<'a> {
    page_title: &'a str,
    resolver: &'a PathResolver<'a>,
    storage: &'a dyn Storage,
    aliases: &'a AliasTable,
}

impl<'a> LinkRenderer<'a> {
    pub fn new(
        page_title: &'a str,
        resolver: &'a PathResolver<'a>,
        storage: &'a dyn Storage,
        aliases: &'a AliasTable,
    ) -> Self {
        Self {
            page_title,
            resolver,
            storage,
            aliases,
        }
    }
}

impl MarkupCallbacks for LinkRenderer<'_> {
    fn wiki_link(
        &mut self,
        addr: &str,
        label: Option<&str>,
        class: Option<&str>,
        image: Option<&str>,
    ) -> Result<String> {
        let mut addr = addr.trim().to_string();
        let mut text = encode_text(label.unwrap_or(&addr)).into_owned();
        let mut chunk = String::new();
        let mut classes: Vec<&str> = class.into_iter().collect();
        let href;

        if is_external_link(&addr) {
            classes.push("external");
            if addr.starts_with("mailto:") {
                // Obfuscate e-mail addresses a little bit.
                classes.push("mail");
                text = text.replace('@', "&#64;").replace('.', "&#46;");
                href = encode_double_quoted_attribute(&addr)
                    .replace('@', "%40")
                    .replace('.', "%2E");
            } else {
                href = encode_double_quoted_attribute(&url_fix(&addr)).into_owned();
            }
        } else {
            if let Some((page, fragment)) = addr.split_once('#') {
                chunk = format!("#{}", url_fix(fragment));
                addr = page.to_string();
            }
            if let Some(alias) = addr.strip_prefix(':') {
                let link = self.aliases.expand(alias);
                href = encode_double_quoted_attribute(&format!("{}{chunk}", url_fix(&link)))
                    .into_owned();
                classes.push("external");
                classes.push("alias");
            } else if addr.is_empty() {
                href = encode_double_quoted_attribute(&chunk).into_owned();
                classes.push("anchor");
            } else {
                classes.push("wiki");
                let reference = self.resolver.relative_reference(self.page_title, &addr)?;
                href = encode_double_quoted_attribute(&format!("{reference}{chunk}"))
                    .into_owned();
                if !self.storage.page_exists(&addr) {
                    classes.push("nonexistent");
                }
            }
        }

        let class_attr = encode_double_quoted_attribute(&classes.join(" ")).into_owned();
        let title_attr =
            encode_double_quoted_attribute(&format!("{addr}{chunk}")).into_owned();
        Ok(format!(
            "<a href=\"{href}\" class=\"{class_attr}\" title=\"{title_attr}\">{}</a>",
            image.unwrap_or(&text)
        ))
    }

    fn wiki_image(&mut self, addr: &str, alt: &str, class: Option<&str>) -> Result<String> {
        let mut addr = addr.trim().to_string();
        let class = class.unwrap_or("wiki");
        let alt_attr = encode_double_quoted_attribute(alt).into_owned();

        if is_external_link(&addr) {
            return Ok(format!(
                "<img src=\"{}\" class=\"external\" alt=\"{alt_attr}\" />",
                encode_double_quoted_attribute(&url_fix(&addr))
            ));
        }

        let mut chunk = String::new();
        if let Some((page, fragment)) = addr.split_once('#') {
            chunk = fragment.to_string();
            addr = page.to_string();
        }
        if addr.is_empty() {
            return Ok(format!(
                "<a name=\"{}\"></a>",
                encode_double_quoted_attribute(&chunk)
            ));
        }
        if let Some(alias) = addr.strip_prefix(':') {
            let chunk = if chunk.is_empty() {
                String::new()
            } else {
                format!("#{chunk}")
            };
            let href = url_fix(&format!("{}{chunk}", self.aliases.expand(alias)));
            return Ok(format!(
                "<img src=\"{}\" class=\"external alias\" alt=\"{alt_attr}\" />",
                encode_double_quoted_attribute(&href)
            ));
        }
        if self.storage.page_exists(&addr) {
            let reference = self.resolver.relative_reference(self.page_title, &addr)?;
            let reference = encode_double_quoted_attribute(&reference).into_owned();
            if self.storage.page_mime(&addr).starts_with("image/") {
                Ok(format!(
                    "<img src=\"{reference}\" class=\"{}\" alt=\"{alt_attr}\" />",
                    encode_double_quoted_attribute(class)
                ))
            } else {
                // An href on an img is how the original exporter rendered
                // non-image attachments; kept for output compatibility.
                Ok(format!("<img href=\"{reference}\" alt=\"{alt_attr}\" />"))
            }
        } else {
            let reference = self.resolver.relative_reference(self.page_title, &addr)?;
            Ok(format!(
                "<a href=\"{}\">{}</a>",
                encode_double_quoted_attribute(&reference),
                encode_text(alt)
            ))
        }
    }

    fn wiki_math(&mut self, text: &str, display: bool) -> Result<String> {
        // Passed through escaped for a downstream typesetting step.
        let wrapped = if display {
            format!("$$\n{text}\n$$")
        } else {
            format!("${text}$")
        };
        Ok(encode_text(&wrapped).into_owned())
    }
}
