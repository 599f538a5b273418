// src/ingest/import.rs
//! Outline (OPML) feed lists and source seeding.

use std::fs;
use std::path::Path;

use anyhow::{anyhow, Context, Result};
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

use crate::ingest::parse::decode_text;
use crate::model::Source;
use crate::store::{Store, StoreError};

#[derive(Debug, Clone, PartialEq, Eq, serde::Deserialize)]
pub struct FeedDescriptor {
    pub title: String,
    pub url: String,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ImportSummary {
    pub created: usize,
    pub existing: usize,
}

fn outline_descriptor(e: &BytesStart<'_>) -> Option<FeedDescriptor> {
    let mut title = None;
    let mut text = None;
    let mut url = None;
    for a in e.attributes().flatten() {
        let value = decode_text(&a.value).trim().to_string();
        if value.is_empty() {
            continue;
        }
        match a.key.local_name().as_ref() {
            b"title" => title = Some(value),
            b"text" => text = Some(value),
            b"xmlUrl" => url = Some(value),
            _ => {}
        }
    }
    let url = url?;
    Some(FeedDescriptor {
        title: title.or(text).unwrap_or_else(|| url.clone()),
        url,
    })
}

/// Flattens every `outline` carrying an `xmlUrl`, at any nesting depth, in
/// document order. Nesting is tracked on an explicit stack.
pub fn parse_opml(xml: &str) -> Result<Vec<FeedDescriptor>> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut stack: Vec<Vec<u8>> = Vec::new();
    let mut saw_root = false;
    let mut feeds = Vec::new();

    loop {
        match reader.read_event().context("parsing opml")? {
            Event::Start(e) => {
                let name = e.local_name().as_ref().to_vec();
                if stack.is_empty() {
                    if name != b"opml" {
                        return Err(anyhow!("opml: unexpected root element"));
                    }
                    saw_root = true;
                }
                if name == b"outline" && stack.iter().any(|n| n == b"body") {
                    feeds.extend(outline_descriptor(&e));
                }
                stack.push(name);
            }
            Event::Empty(e) => {
                if e.local_name().as_ref() == b"outline" && stack.iter().any(|n| n == b"body") {
                    feeds.extend(outline_descriptor(&e));
                }
            }
            Event::End(_) => {
                stack.pop();
            }
            Event::Eof => break,
            _ => {}
        }
    }

    if !saw_root {
        return Err(anyhow!("opml: missing <opml> root"));
    }
    Ok(feeds)
}

pub fn load_opml_file(path: &Path) -> Result<Vec<FeedDescriptor>> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("reading opml from {}", path.display()))?;
    parse_opml(&content).with_context(|| format!("parsing opml {}", path.display()))
}

/// Creates a source per descriptor. URLs already known to the store are counted, not errors.
pub async fn import_sources(
    store: &dyn Store,
    feeds: &[FeedDescriptor],
) -> Result<ImportSummary, StoreError> {
    let mut summary = ImportSummary::default();
    for feed in feeds {
        match store
            .create_source(Source::new(feed.title.clone(), feed.url.clone()))
            .await
        {
            Ok(src) => {
                tracing::debug!(target: "ingest", source = %src.url, id = %src.id, "source registered");
                summary.created += 1;
            }
            Err(StoreError::DuplicateSourceUrl(_)) => summary.existing += 1,
            Err(e) => return Err(e),
        }
    }
    Ok(summary)
}
