//! Line-oriented parser for the source wiki's Creole-style markup.
//!
//! The parser does not build a document tree; it emits HTML fragment
//! strings as it goes and calls back into [`MarkupCallbacks`] for links,
//! images and math. Fragments may be chunked at any granularity; the only
//! guarantee is that concatenating them in order yields the page body.
//! Code blocks are emitted as plain `<pre>` text, syntax highlighting is
//! intentionally unsupported.

use std::sync::LazyLock;

use anyhow::Result;
use html_escape::encode_text;
use regex::Regex;

/// Callbacks the parser invokes for the constructs whose rendering depends
/// on conversion state (the current page, the alias table, the link graph).
pub trait MarkupCallbacks {
    fn wiki_link(
        &mut self,
        addr: &str,
        label: Option<&str>,
        class: Option<&str>,
        image: Option<&str>,
    ) -> Result<String>;
    fn wiki_image(&mut self, addr: &str, alt: &str, class: Option<&str>) -> Result<String>;
    fn wiki_math(&mut self, text: &str, display: bool) -> Result<String>;
}

static HEADING_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?P<level>=+)\s*(?P<text>.+?)\s*=*\s*$").expect("valid heading pattern")
});

static INLINE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(concat!(
        r"(?P<link>\[\[(?P<link_target>[^\]|]+)(?:\|(?P<link_label>[^\]]*))?\]\])",
        r"|(?P<image>\{\{(?P<image_target>[^}|]+)(?:\|(?P<image_alt>[^}]*))?\}\})",
        r"|(?P<math>\$(?P<math_text>[^$]+)\$)",
        r"|(?P<url>(?:https?|ftp)://[^\s<>\[\]{}|]+)",
        r"|(?P<bold>\*\*)",
        r"|(?P<break>\\\\)",
        r"|(?P<italic>//)",
    ))
    .expect("valid inline pattern")
});

static IMAGE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\{\{(?P<target>[^}|]+)(?:\|(?P<alt>[^}]*))?\}\}$").expect("valid image pattern")
});

/// Parse a page's markup into HTML fragments.
pub fn parse_markup(text: &str, callbacks: &mut dyn MarkupCallbacks) -> Result<Vec<String>> {
    let lines: Vec<&str> = text.lines().collect();
    let mut out = Vec::new();
    let mut i = 0;

    while i < lines.len() {
        let trimmed = lines[i].trim();
        if trimmed.is_empty() {
            i += 1;
            continue;
        }

        if trimmed == "{{{" {
            i += 1;
            out.push("<pre class=\"code\">".to_string());
            let mut first = true;
            while i < lines.len() && lines[i].trim_end() != "}}}" {
                if !first {
                    out.push("\n".to_string());
                }
                out.push(encode_text(lines[i]).into_owned());
                first = false;
                i += 1;
            }
            out.push("</pre>".to_string());
            i += 1;
            continue;
        }

        if trimmed == "$$" {
            i += 1;
            let start = i;
            while i < lines.len() && lines[i].trim() != "$$" {
                i += 1;
            }
            out.push(callbacks.wiki_math(&lines[start..i].join("\n"), true)?);
            i += 1;
            continue;
        }

        if trimmed.starts_with('=') {
            if let Some(captures) = HEADING_RE.captures(trimmed) {
                let level = captures["level"].len().min(6);
                let text = &captures["text"];
                out.push(format!("<h{level}>"));
                out.push(format!("<a name=\"head-{}\"></a>", heading_anchor(text)));
                out.push(encode_text(text).into_owned());
                out.push(format!("</h{level}>"));
                i += 1;
                continue;
            }
        }

        if trimmed.chars().all(|c| c == '-') && trimmed.len() >= 4 {
            out.push("<hr />".to_string());
            i += 1;
            continue;
        }

        if is_list_item(trimmed) {
            let marker = if trimmed.starts_with('*') { '*' } else { '#' };
            let tag = if marker == '*' { "ul" } else { "ol" };
            out.push(format!("<{tag}>"));
            while i < lines.len()
                && is_list_item(lines[i].trim_start())
                && lines[i].trim_start().starts_with(marker)
            {
                let item = lines[i].trim_start()[1..].trim();
                out.push("<li>".to_string());
                let mut state = InlineState::default();
                render_inline(item, callbacks, &mut state, &mut out)?;
                state.close(&mut out);
                out.push("</li>".to_string());
                i += 1;
            }
            out.push(format!("</{tag}>"));
            continue;
        }

        if trimmed.starts_with('|') {
            out.push("<table>".to_string());
            while i < lines.len() && lines[i].trim_start().starts_with('|') {
                out.push("<tr>".to_string());
                let row = lines[i].trim().trim_matches('|');
                for cell in split_cells(row) {
                    out.push("<td>".to_string());
                    let mut state = InlineState::default();
                    render_inline(cell.trim(), callbacks, &mut state, &mut out)?;
                    state.close(&mut out);
                    out.push("</td>".to_string());
                }
                out.push("</tr>".to_string());
                i += 1;
            }
            out.push("</table>".to_string());
            continue;
        }

        // Paragraph. The engine tagged each paragraph with the source line
        // of its first line; the scrubber strips these ids again.
        out.push(format!("<p id=\"line_{i}\">"));
        let mut state = InlineState::default();
        let mut first = true;
        while i < lines.len() && is_paragraph_line(lines[i]) {
            if !first {
                out.push("\n".to_string());
            }
            render_inline(lines[i].trim(), callbacks, &mut state, &mut out)?;
            first = false;
            i += 1;
        }
        state.close(&mut out);
        out.push("</p>".to_string());
    }

    Ok(out)
}

/// Split a table row on `|`, except inside `[[...]]` link and `{{...}}`
/// image spans, whose `|` separates the address from the label.
fn split_cells(row: &str) -> Vec<&str> {
    let bytes = row.as_bytes();
    let mut cells = Vec::new();
    let mut start = 0;
    let mut i = 0;
    let mut span_end: Option<&[u8]> = None;
    while i < bytes.len() {
        match span_end {
            Some(end) => {
                if bytes[i..].starts_with(end) {
                    span_end = None;
                    i += 2;
                } else {
                    i += 1;
                }
            }
            None if bytes[i..].starts_with(b"[[") => {
                span_end = Some(b"]]");
                i += 2;
            }
            None if bytes[i..].starts_with(b"{{") => {
                span_end = Some(b"}}");
                i += 2;
            }
            None if bytes[i] == b'|' => {
                cells.push(&row[start..i]);
                start = i + 1;
                i += 1;
            }
            None => i += 1,
        }
    }
    cells.push(&row[start..]);
    cells
}

/// A leading `*` opens a bullet item, but `**` is inline bold markup.
fn is_list_item(line: &str) -> bool {
    (line.starts_with('*') && !line.starts_with("**")) || line.starts_with('#')
}

fn is_paragraph_line(line: &str) -> bool {
    let trimmed = line.trim();
    !trimmed.is_empty()
        && !trimmed.starts_with('=')
        && !is_list_item(trimmed)
        && !trimmed.starts_with('|')
        && trimmed != "{{{"
        && trimmed != "$$"
        && !(trimmed.chars().all(|c| c == '-') && trimmed.len() >= 4)
}

fn heading_anchor(text: &str) -> String {
    text.chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '-' })
        .collect()
}

/// Bold/italic toggle state within one block element.
#[derive(Default)]
struct InlineState {
    bold: bool,
    italic: bool,
}

impl InlineState {
    fn close(&mut self, out: &mut Vec<String>) {
        if self.italic {
            out.push("</i>".to_string());
            self.italic = false;
        }
        if self.bold {
            out.push("</b>".to_string());
            self.bold = false;
        }
    }
}

fn render_inline(
    text: &str,
    callbacks: &mut dyn MarkupCallbacks,
    state: &mut InlineState,
    out: &mut Vec<String>,
) -> Result<()> {
    let mut last = 0;
    for captures in INLINE_RE.captures_iter(text) {
        let whole = captures.get(0).expect("group 0 always exists");
        if whole.start() > last {
            out.push(encode_text(&text[last..whole.start()]).into_owned());
        }

        if captures.name("link").is_some() {
            let target = captures
                .name("link_target")
                .map(|m| m.as_str().trim())
                .unwrap_or_default();
            let label = captures.name("link_label").map(|m| m.as_str().trim());
            // Creole allows an image as the link label.
            let image_html = match label.and_then(|l| IMAGE_RE.captures(l)) {
                Some(image) => {
                    let alt = image.name("alt").map(|m| m.as_str().trim()).unwrap_or("");
                    Some(callbacks.wiki_image(image["target"].trim(), alt, None)?)
                }
                None => None,
            };
            out.push(callbacks.wiki_link(target, label, None, image_html.as_deref())?);
        } else if captures.name("image").is_some() {
            let target = captures
                .name("image_target")
                .map(|m| m.as_str().trim())
                .unwrap_or_default();
            let alt = captures
                .name("image_alt")
                .map(|m| m.as_str().trim())
                .unwrap_or("");
            out.push(callbacks.wiki_image(target, alt, None)?);
        } else if let Some(math) = captures.name("math_text") {
            out.push(callbacks.wiki_math(math.as_str(), false)?);
        } else if let Some(url) = captures.name("url") {
            // Free-standing URLs are auto-linked; in particular their `//`
            // must not toggle italics.
            out.push(callbacks.wiki_link(url.as_str(), None, None, None)?);
        } else if captures.name("bold").is_some() {
            out.push(if state.bold { "</b>" } else { "<b>" }.to_string());
            state.bold = !state.bold;
        } else if captures.name("break").is_some() {
            out.push("<br />".to_string());
        } else if captures.name("italic").is_some() {
            out.push(if state.italic { "</i>" } else { "<i>" }.to_string());
            state.italic = !state.italic;
        }

        last = whole.end();
    }
    if last < text.len() {
        out.push(encode_text(&text[last..]).into_owned());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Records callback invocations and emits recognizable placeholders.
    #[derive(Default)]
    struct RecordingCallbacks {
        links: Vec<(String, Option<String>)>,
        images: Vec<String>,
        math: Vec<(String, bool)>,
    }

    impl MarkupCallbacks for RecordingCallbacks {
        fn wiki_link(
            &mut self,
            addr: &str,
            label: Option<&str>,
            _class: Option<&str>,
            image: Option<&str>,
        ) -> Result<String> {
            self.links
                .push((addr.to_string(), label.map(str::to_string)));
            Ok(format!("[link:{addr}:{}]", image.unwrap_or("")))
        }

        fn wiki_image(&mut self, addr: &str, alt: &str, _class: Option<&str>) -> Result<String> {
            self.images.push(addr.to_string());
            Ok(format!("[img:{addr}:{alt}]"))
        }

        fn wiki_math(&mut self, text: &str, display: bool) -> Result<String> {
            self.math.push((text.to_string(), display));
            Ok(format!("[math:{display}:{text}]"))
        }
    }

    fn render(text: &str) -> (String, RecordingCallbacks) {
        let mut callbacks = RecordingCallbacks::default();
        let fragments = parse_markup(text, &mut callbacks).expect("parse");
        (fragments.concat(), callbacks)
    }

    #[test]
    fn paragraph_with_line_id() {
        let (html, _) = render("hello world");
        assert_eq!(html, "<p id=\"line_0\">hello world</p>");
    }

    #[test]
    fn paragraph_lines_joined_with_newline() {
        let (html, _) = render("one\ntwo");
        assert_eq!(html, "<p id=\"line_0\">one\ntwo</p>");
    }

    #[test]
    fn heading_gets_anchor() {
        let (html, _) = render("== Search (AI) ==");
        assert_eq!(
            html,
            "<h2><a name=\"head-Search--AI-\"></a>Search (AI)</h2>"
        );
    }

    #[test]
    fn text_is_escaped() {
        let (html, _) = render("a < b & c");
        assert!(html.contains("a &lt; b &amp; c"));
    }

    #[test]
    fn link_callback_invoked() {
        let (html, callbacks) = render("see [[Other Page|label]] here");
        assert_eq!(
            callbacks.links,
            vec![("Other Page".to_string(), Some("label".to_string()))]
        );
        assert!(html.contains("[link:Other Page:]"));
    }

    #[test]
    fn image_callback_invoked() {
        let (_, callbacks) = render("{{diagram.png|a diagram}}");
        assert_eq!(callbacks.images, vec!["diagram.png".to_string()]);
    }

    #[test]
    fn image_inside_link_label() {
        let (html, callbacks) = render("[[Target|{{pic.png|alt}}]]");
        assert_eq!(callbacks.images, vec!["pic.png".to_string()]);
        assert!(html.contains("[link:Target:[img:pic.png:alt]]"));
    }

    #[test]
    fn inline_and_display_math() {
        let (_, callbacks) = render("inline $x^2$ here\n\n$$\n\\sum_i x_i\n$$");
        assert_eq!(
            callbacks.math,
            vec![
                ("x^2".to_string(), false),
                ("\\sum_i x_i".to_string(), true)
            ]
        );
    }

    #[test]
    fn bold_and_italic_toggle() {
        let (html, _) = render("**bold** and //italic//");
        assert_eq!(
            html,
            "<p id=\"line_0\"><b>bold</b> and <i>italic</i></p>"
        );
    }

    #[test]
    fn unclosed_emphasis_is_closed_at_block_end() {
        let (html, _) = render("**dangling");
        assert_eq!(html, "<p id=\"line_0\"><b>dangling</b></p>");
    }

    #[test]
    fn bullet_and_ordered_lists() {
        let (html, _) = render("* one\n* two");
        assert_eq!(html, "<ul><li>one</li><li>two</li></ul>");
        let (html, _) = render("# first\n# second");
        assert_eq!(html, "<ol><li>first</li><li>second</li></ol>");
    }

    #[test]
    fn preformatted_block_is_not_parsed() {
        let (html, callbacks) = render("{{{\n[[NotALink]]\n<raw>\n}}}");
        assert_eq!(
            html,
            "<pre class=\"code\">[[NotALink]]\n&lt;raw&gt;</pre>"
        );
        assert!(callbacks.links.is_empty());
    }

    #[test]
    fn bold_at_line_start_is_not_a_list() {
        let (html, _) = render("**bold** opener");
        assert_eq!(html, "<p id=\"line_0\"><b>bold</b> opener</p>");
    }

    #[test]
    fn list_ends_before_a_bold_paragraph() {
        let (html, _) = render("* one\n**bold** after");
        assert_eq!(
            html,
            "<ul><li>one</li></ul><p id=\"line_1\"><b>bold</b> after</p>"
        );
    }

    #[test]
    fn bare_url_is_autolinked_not_italicized() {
        let (html, callbacks) = render("see http://example.com/a here");
        assert_eq!(
            callbacks.links,
            vec![("http://example.com/a".to_string(), None)]
        );
        assert_eq!(
            html,
            "<p id=\"line_0\">see [link:http://example.com/a:] here</p>"
        );
    }

    #[test]
    fn table_rows_and_cells() {
        let (html, _) = render("|a|b|\n|c|d|");
        assert_eq!(
            html,
            "<table><tr><td>a</td><td>b</td></tr><tr><td>c</td><td>d</td></tr></table>"
        );
    }

    #[test]
    fn table_cells_keep_piped_links_whole() {
        let (html, callbacks) = render("|see [[Target|label]] here|x|");
        assert_eq!(
            callbacks.links,
            vec![("Target".to_string(), Some("label".to_string()))]
        );
        assert_eq!(
            html,
            "<table><tr><td>see [link:Target:] here</td><td>x</td></tr></table>"
        );
    }

    #[test]
    fn table_cells_keep_piped_images_whole() {
        let (html, callbacks) = render("|{{pic.png|alt text}}|");
        assert_eq!(callbacks.images, vec!["pic.png".to_string()]);
        assert_eq!(html, "<table><tr><td>[img:pic.png:alt text]</td></tr></table>");
    }

    #[test]
    fn horizontal_rule() {
        let (html, _) = render("----");
        assert_eq!(html, "<hr />");
    }

    #[test]
    fn line_break() {
        let (html, _) = render("a\\\\b");
        assert_eq!(html, "<p id=\"line_0\">a<br />b</p>");
    }

    #[test]
    fn fragments_are_chunked() {
        let mut callbacks = RecordingCallbacks::default();
        let fragments =
            parse_markup("= H =\n\ntext [[L]] more", &mut callbacks).expect("parse");
        // The body arrives as many small fragments, never one big string.
        assert!(fragments.len() > 4);
    }
}
