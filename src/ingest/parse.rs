// src/ingest/parse.rs
//! Pull parser over RSS 2.0, RSS 1.0 (RDF) and Atom documents.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use quick_xml::events::{BytesEnd, BytesStart, Event};
use quick_xml::Reader;
use time::format_description::well_known::{Rfc2822, Rfc3339};
use time::OffsetDateTime;

use crate::ingest::fetcher::FetchError;
use crate::ingest::types::Candidate;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeedKind {
    Rss,
    Rdf,
    Atom,
}

impl FeedKind {
    fn from_root(name: &str) -> Option<Self> {
        match name {
            "rss" => Some(FeedKind::Rss),
            "RDF" => Some(FeedKind::Rdf),
            "feed" => Some(FeedKind::Atom),
            _ => None,
        }
    }

    fn entry_tag(&self) -> &'static str {
        match self {
            FeedKind::Rss | FeedKind::Rdf => "item",
            FeedKind::Atom => "entry",
        }
    }
}

/// Zone-less layouts seen in the wild, read as UTC.
const NAIVE_LAYOUTS: [&str; 2] = ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"];

/// RFC 2822 first (RSS `pubDate`), then RFC 3339 (Atom, `dc:date`), then
/// timestamps without an offset and bare dates, both taken as UTC.
pub fn parse_feed_date(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(odt) = OffsetDateTime::parse(raw, &Rfc2822).or_else(|_| OffsetDateTime::parse(raw, &Rfc3339)) {
        return DateTime::<Utc>::from_timestamp(odt.unix_timestamp(), odt.nanosecond());
    }
    NAIVE_LAYOUTS
        .iter()
        .find_map(|layout| NaiveDateTime::parse_from_str(raw, layout).ok())
        .or_else(|| {
            NaiveDate::parse_from_str(raw, "%Y-%m-%d")
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0))
        })
        .map(|naive| naive.and_utc())
}

/// Decodes character references one at a time, HTML named entities
/// included. Unknown references are kept literally.
pub(crate) fn decode_text(raw: &[u8]) -> String {
    let lossy = String::from_utf8_lossy(raw);
    html_escape::decode_html_entities(&lossy).into_owned()
}

/// Inner markup of an Atom `type="xhtml"` text construct, rebuilt from events.
#[derive(Debug, Default)]
struct Markup {
    depth: usize,
    buf: String,
}

impl Markup {
    fn open(&mut self, e: &BytesStart<'_>, empty: bool) {
        self.buf.push('<');
        self.buf.push_str(&String::from_utf8_lossy(e));
        self.buf.push_str(if empty { "/>" } else { ">" });
    }

    fn close(&mut self, e: &BytesEnd<'_>) {
        self.buf.push_str("</");
        self.buf.push_str(&String::from_utf8_lossy(e));
        self.buf.push('>');
    }

    fn raw(&mut self, bytes: &[u8]) {
        self.buf.push_str(&String::from_utf8_lossy(bytes));
    }
}

#[derive(Debug, Default)]
struct Entry {
    title: Option<String>,
    summary: Option<String>,
    body: Option<String>,
    link: Option<String>,
    alternate: Option<String>,
    other_link: Option<String>,
    guid: Option<String>,
    published: Option<DateTime<Utc>>,
    updated: Option<DateTime<Utc>>,
    author: Option<String>,
    author_name: Option<String>,
    categories: Vec<String>,
}

impl Entry {
    fn on_attrs(&mut self, name: &str, e: &BytesStart<'_>) {
        match name {
            "link" => {
                let Some(href) = attr(e, "href") else { return };
                let rel = attr(e, "rel");
                match rel.as_deref() {
                    None | Some("alternate") => {
                        self.alternate.get_or_insert(href);
                    }
                    _ => {
                        self.other_link.get_or_insert(href);
                    }
                }
            }
            "category" => {
                if let Some(term) = attr(e, "term") {
                    self.categories.push(term);
                }
            }
            _ => {}
        }
    }

    fn on_text(&mut self, name: &str, text: String) {
        let value = non_empty(text);
        match name {
            "title" => self.title = value,
            "description" | "summary" => self.summary = value,
            "encoded" | "content" => self.body = value,
            "link" => {
                if value.is_some() {
                    self.link = value;
                }
            }
            "guid" | "id" => self.guid = value,
            "pubDate" | "published" | "issued" => {
                self.published = value.as_deref().and_then(parse_feed_date)
            }
            "date" => {
                if self.published.is_none() {
                    self.published = value.as_deref().and_then(parse_feed_date);
                }
            }
            "updated" | "modified" => self.updated = value.as_deref().and_then(parse_feed_date),
            "author" | "creator" => self.author = self.author_name.take().or(value),
            "category" | "subject" => {
                if let Some(v) = value {
                    self.categories.push(v);
                }
            }
            _ => {}
        }
    }

    fn into_candidate(self) -> Candidate {
        let link = [self.link, self.alternate, self.other_link, self.guid]
            .into_iter()
            .flatten()
            .map(|l| l.trim().to_string())
            .find(|l| !l.is_empty());

        let mut categories: Vec<String> = Vec::with_capacity(self.categories.len());
        for tag in self.categories {
            let tag = tag.trim().to_string();
            if !tag.is_empty() && !categories.contains(&tag) {
                categories.push(tag);
            }
        }

        Candidate {
            title: self.title.unwrap_or_default(),
            summary: self.summary.unwrap_or_default(),
            body: self.body,
            link,
            published_at: self.published.or(self.updated),
            author: self.author,
            categories,
        }
    }
}

fn non_empty(s: String) -> Option<String> {
    let t = s.trim();
    if t.is_empty() {
        None
    } else {
        Some(t.to_string())
    }
}

fn local(e: &BytesStart<'_>) -> String {
    String::from_utf8_lossy(e.local_name().as_ref()).into_owned()
}

fn attr(e: &BytesStart<'_>, key: &str) -> Option<String> {
    e.attributes()
        .flatten()
        .find(|a| a.key.local_name().as_ref() == key.as_bytes())
        .map(|a| decode_text(&a.value))
        .and_then(non_empty)
}

fn push_text(buf: &mut String, piece: &str) {
    if !buf.is_empty() {
        buf.push(' ');
    }
    buf.push_str(piece);
}

/// Parses a feed document into candidates in document order.
///
/// Elements are matched by local name, so namespace prefixes
/// (`content:encoded`, `dc:creator`, `atom:link`) do not matter.
pub fn parse_feed(xml: &str) -> Result<Vec<Candidate>, FetchError> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut kind: Option<FeedKind> = None;
    let mut stack: Vec<String> = Vec::new();
    let mut entry: Option<Entry> = None;
    // Stack length while positioned directly inside the current entry.
    let mut entry_depth = 0usize;
    let mut text = String::new();
    let mut out = Vec::new();
    let mut xhtml: Option<Markup> = None;

    loop {
        let event = reader
            .read_event()
            .map_err(|e| FetchError::Malformed(e.to_string()))?;

        if let Some(markup) = xhtml.as_mut() {
            match &event {
                Event::Start(e) => {
                    markup.depth += 1;
                    markup.open(e, false);
                    continue;
                }
                Event::Empty(e) => {
                    markup.open(e, true);
                    continue;
                }
                Event::End(e) if markup.depth > 0 => {
                    markup.depth -= 1;
                    markup.close(e);
                    continue;
                }
                Event::Text(t) => {
                    markup.raw(t);
                    continue;
                }
                Event::CData(c) => {
                    markup.buf.push_str("<![CDATA[");
                    markup.raw(c);
                    markup.buf.push_str("]]>");
                    continue;
                }
                // Closes the construct itself: hand the markup over as its text.
                Event::End(_) => {
                    text = markup.buf.trim().to_string();
                    xhtml = None;
                    reader.config_mut().trim_text(true);
                }
                Event::Eof => {}
                _ => continue,
            }
        }

        match event {
            Event::Start(e) => {
                let name = local(&e);
                if kind.is_none() {
                    kind = Some(FeedKind::from_root(&name).ok_or_else(|| {
                        FetchError::Malformed(format!("unsupported root element <{name}>"))
                    })?);
                }
                let entry_tag = kind.map(|k| k.entry_tag()).unwrap_or_default();
                if entry.is_none() && name == entry_tag {
                    entry = Some(Entry {
                        guid: attr(&e, "about"),
                        ..Default::default()
                    });
                    entry_depth = stack.len() + 1;
                    text.clear();
                } else if let Some(cur) = entry.as_mut() {
                    if stack.len() == entry_depth {
                        text.clear();
                        cur.on_attrs(&name, &e);
                        if matches!(name.as_str(), "content" | "summary")
                            && attr(&e, "type").as_deref() == Some("xhtml")
                        {
                            xhtml = Some(Markup::default());
                            reader.config_mut().trim_text(false);
                        }
                    }
                }
                stack.push(name);
            }
            Event::Empty(e) => {
                let name = local(&e);
                if kind.is_none() {
                    kind = Some(FeedKind::from_root(&name).ok_or_else(|| {
                        FetchError::Malformed(format!("unsupported root element <{name}>"))
                    })?);
                    continue;
                }
                if let Some(cur) = entry.as_mut() {
                    if stack.len() == entry_depth {
                        cur.on_attrs(&name, &e);
                    }
                }
            }
            Event::Text(t) => {
                if entry.is_some() {
                    push_text(&mut text, &decode_text(&t));
                }
            }
            Event::CData(c) => {
                if entry.is_some() {
                    push_text(&mut text, &String::from_utf8_lossy(&c));
                }
            }
            Event::End(_) => {
                let Some(name) = stack.pop() else { continue };
                let Some(cur) = entry.as_mut() else { continue };
                if stack.len() + 1 == entry_depth {
                    if let Some(done) = entry.take() {
                        out.push(done.into_candidate());
                    }
                } else if stack.len() == entry_depth {
                    cur.on_text(&name, std::mem::take(&mut text));
                } else if name == "name" && stack.last().map(String::as_str) == Some("author") {
                    cur.author_name = non_empty(std::mem::take(&mut text));
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    if kind.is_none() {
        return Err(FetchError::Malformed("document has no root element".into()));
    }
    if let Some(open) = stack.last() {
        return Err(FetchError::Malformed(format!("document ends inside <{open}>")));
    }
    Ok(out)
}
