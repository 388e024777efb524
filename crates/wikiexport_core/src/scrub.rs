//! Post-render cleanup of generated HTML.
//!
//! Strips presentation-only artifacts the renderer emits for a live wiki:
//! `class` attributes, the per-line `id="line_*"` markers and empty heading
//! anchors. Runs over the already well-formed renderer output, so a parse
//! failure here means the renderer produced broken markup.

use anyhow::{Context, Result};
use quick_xml::events::{BytesStart, Event};
use quick_xml::reader::Reader;
use quick_xml::writer::Writer;

/// Rewrite `html` with scrub rules applied. Idempotent.
pub fn scrub_html(html: &str) -> Result<String> {
    let mut reader = Reader::from_str(html);
    reader.config_mut().check_end_names = false;
    let mut writer = Writer::new(Vec::new());

    // A heading anchor is held back one event so it can be dropped together
    // with its end tag when it turns out to be empty.
    let mut held: Option<BytesStart> = None;

    loop {
        let event = reader.read_event().context("failed to parse html")?;
        if let Some(start) = held.take() {
            if matches!(&event, Event::End(e) if e.name().as_ref() == b"a") {
                continue;
            }
            writer
                .write_event(Event::Start(start))
                .context("failed to write html")?;
        }
        match event {
            Event::Start(e) => {
                let filtered = filter_attributes(&e);
                if is_heading_anchor(&e) {
                    held = Some(filtered);
                } else {
                    writer
                        .write_event(Event::Start(filtered))
                        .context("failed to write html")?;
                }
            }
            Event::Empty(e) => {
                if is_heading_anchor(&e) {
                    continue;
                }
                writer
                    .write_event(Event::Empty(filter_attributes(&e)))
                    .context("failed to write html")?;
            }
            Event::Eof => break,
            other => writer
                .write_event(other)
                .context("failed to write html")?,
        }
    }

    String::from_utf8(writer.into_inner()).context("scrubbed html is not valid utf-8")
}

fn is_heading_anchor(e: &BytesStart) -> bool {
    e.name().as_ref() == b"a"
        && e.try_get_attribute("name")
            .ok()
            .flatten()
            .is_some_and(|attr| attr.value.starts_with(b"head-"))
}

/// Copy a start tag, dropping `class` attributes and generated line ids.
/// Attribute values are carried over in their raw, still-escaped form.
fn filter_attributes(e: &BytesStart) -> BytesStart<'static> {
    let name = String::from_utf8_lossy(e.name().as_ref()).into_owned();
    let mut out = BytesStart::new(name);
    for attr in e.attributes().flatten() {
        if attr.key.as_ref() == b"class" {
            continue;
        }
        if attr.key.as_ref() == b"id" && attr.value.starts_with(b"line_") {
            continue;
        }
        out.push_attribute(attr);
    }
    out
}
