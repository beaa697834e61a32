//! Streaming parsers for TAP XML documents.
//!
//! All parsers are built on a single pull loop over `quick-xml` events that
//! reports element openings (with attributes) and closings (with the trimmed
//! text content). Namespace prefixes are dropped from element and attribute
//! names, so `uws:job`, `vosi:tableset` or `esatapplus:flags` are matched by
//! their local names.
//!
//! # Parsers
//!
//! - [`tables`]: VOSI tableset (`tables` resource)
//! - [`jobs`]: UWS job descriptors and job lists
//! - [`sharing`]: TAP+ groups and shared items
//! - [`votable`]: VOTable inspection and error messages

pub mod jobs;
pub mod sharing;
pub mod tables;
pub mod votable;

#[cfg(test)]
mod jobs_tests;

pub use jobs::{parse_job, parse_job_list, parse_jobs};
pub use sharing::{parse_groups, parse_shared_items};
pub use tables::parse_tables;
pub use votable::{extract_error_message, parse_votable_summary};

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

use crate::error::{TapError, TapResult};

/// Element boundary reported by [`walk`].
pub(crate) enum Node<'a> {
    Open {
        name: &'a str,
        attrs: &'a Attrs,
    },
    Close {
        name: &'a str,
        text: &'a str,
    },
}

/// Attributes of an element, keyed by local name.
#[derive(Debug, Default)]
pub(crate) struct Attrs(Vec<(String, String)>);

impl Attrs {
    fn read(start: &BytesStart<'_>) -> TapResult<Self> {
        let mut attrs = Vec::new();
        for attr in start.attributes() {
            let attr = attr?;
            let key = String::from_utf8_lossy(attr.key.local_name().as_ref()).into_owned();
            let value = attr.unescape_value()?.into_owned();
            attrs.push((key, value));
        }
        Ok(Self(attrs))
    }

    pub(crate) fn get(&self, name: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub(crate) fn owned(&self, name: &str) -> Option<String> {
        self.get(name).map(str::to_string)
    }
}

fn local_name(start: &BytesStart<'_>) -> String {
    String::from_utf8_lossy(start.local_name().as_ref()).into_owned()
}

/// Pull every element of `data`, calling `visit` on openings and closings.
pub(crate) fn walk<F>(data: &[u8], mut visit: F) -> TapResult<()>
where
    F: FnMut(Node<'_>) -> TapResult<()>,
{
    let mut reader = Reader::from_reader(data);
    reader.config_mut().trim_text(true);

    let mut buf = Vec::new();
    let mut stack: Vec<String> = Vec::new();
    let mut text = String::new();

    loop {
        let event = reader.read_event_into(&mut buf).map_err(|e| {
            TapError::parse(format!(
                "Malformed XML at position {}: {}",
                reader.buffer_position(),
                e
            ))
        })?;
        match event {
            Event::Start(start) => {
                let name = local_name(&start);
                let attrs = Attrs::read(&start)?;
                text.clear();
                visit(Node::Open {
                    name: &name,
                    attrs: &attrs,
                })?;
                stack.push(name);
            }
            Event::Empty(start) => {
                let name = local_name(&start);
                let attrs = Attrs::read(&start)?;
                visit(Node::Open {
                    name: &name,
                    attrs: &attrs,
                })?;
                visit(Node::Close {
                    name: &name,
                    text: "",
                })?;
                text.clear();
            }
            Event::Text(t) => text.push_str(&t.unescape()?),
            Event::CData(c) => text.push_str(&String::from_utf8_lossy(&c.into_inner())),
            Event::End(_) => {
                let name = stack
                    .pop()
                    .ok_or_else(|| TapError::parse("Unbalanced XML: unexpected end tag"))?;
                visit(Node::Close {
                    name: &name,
                    text: text.trim(),
                })?;
                text.clear();
            }
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    if let Some(open) = stack.last() {
        return Err(TapError::parse(format!(
            "Unexpected end of document inside <{}>",
            open
        )));
    }
    Ok(())
}

/// `None` for empty strings.
pub(crate) fn non_empty(text: &str) -> Option<String> {
    let text = text.trim();
    if text.is_empty() {
        None
    } else {
        Some(text.to_string())
    }
}

/// Cheap check that a payload looks like an XML document.
pub(crate) fn looks_like_xml(data: &[u8]) -> bool {
    data.iter()
        .find(|b| !b.is_ascii_whitespace())
        .is_some_and(|b| *b == b'<')
}
