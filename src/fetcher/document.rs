use quick_xml::events::Event;
use quick_xml::Reader;
use serde::Serialize;

use super::FetchError;

/// A feed as published, before any normalization. Lives for one cycle.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RawFeedDocument {
    pub title: String,
    pub link: String,
    pub description: String,
    pub items: Vec<RawFeedItem>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RawFeedItem {
    pub title: String,
    pub link: String,
    pub description: String,
    pub pub_date: String,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Field {
    Title,
    Link,
    Description,
    PubDate,
}

impl Field {
    fn from_name(name: &[u8]) -> Option<Self> {
        match name {
            b"title" => Some(Field::Title),
            b"link" => Some(Field::Link),
            b"description" => Some(Field::Description),
            b"pubDate" => Some(Field::PubDate),
            _ => None,
        }
    }
}

impl RawFeedDocument {
    fn field_mut(&mut self, field: Field) -> Option<&mut String> {
        match field {
            Field::Title => Some(&mut self.title),
            Field::Link => Some(&mut self.link),
            Field::Description => Some(&mut self.description),
            Field::PubDate => None,
        }
    }
}

impl RawFeedItem {
    fn trim_fields(&mut self) {
        trim_in_place(&mut self.title);
        trim_in_place(&mut self.link);
        trim_in_place(&mut self.description);
        trim_in_place(&mut self.pub_date);
    }

    fn field_mut(&mut self, field: Field) -> Option<&mut String> {
        match field {
            Field::Title => Some(&mut self.title),
            Field::Link => Some(&mut self.link),
            Field::Description => Some(&mut self.description),
            Field::PubDate => Some(&mut self.pub_date),
        }
    }
}

/// Parse an RSS 2.0 document.
///
/// Only `<rss><channel>` and its direct `<item>` children are read; unknown
/// and namespaced elements (`atom:link`, `dc:creator`, ...) are skipped. Any
/// markup error fails the whole document.
pub fn parse_document(xml: &str) -> Result<RawFeedDocument, FetchError> {
    let mut reader = Reader::from_str(xml);

    let mut document = RawFeedDocument::default();
    let mut saw_channel = false;
    let mut item: Option<RawFeedItem> = None;
    // element names from the root down to the current element
    let mut path: Vec<Vec<u8>> = Vec::new();

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => {
                let name = e.name().as_ref().to_vec();
                if path.len() == 1 && name == b"channel" {
                    saw_channel = true;
                } else if path.len() == 2 && path[1] == b"channel" && name == b"item" {
                    item = Some(RawFeedItem::default());
                }
                path.push(name);
            }
            Ok(Event::End(_)) => {
                let closed = path.pop();
                let closes_item = closed.as_deref() == Some(&b"item"[..]);
                if closes_item && path.len() == 2 && path[1] == b"channel" {
                    if let Some(mut finished) = item.take() {
                        finished.trim_fields();
                        document.items.push(finished);
                    }
                }
            }
            Ok(Event::Text(e)) => {
                let text = decode_xml_entities(&String::from_utf8_lossy(&e));
                append_text(&path, &mut document, item.as_mut(), &text);
            }
            Ok(Event::CData(e)) => {
                let text = String::from_utf8_lossy(&e).into_owned();
                append_text(&path, &mut document, item.as_mut(), &text);
            }
            Ok(Event::Eof) => break,
            Err(e) => {
                return Err(FetchError::Markup(format!(
                    "{e} (near byte {})",
                    reader.buffer_position()
                )))
            }
            _ => {}
        }
    }

    if let Some(open) = path.last() {
        return Err(FetchError::Markup(format!(
            "document ended inside <{}>",
            String::from_utf8_lossy(open)
        )));
    }
    if !saw_channel {
        return Err(FetchError::Markup("missing <channel> element".to_string()));
    }

    // text and CDATA segments are joined as written; only the field edges are trimmed
    trim_in_place(&mut document.title);
    trim_in_place(&mut document.link);
    trim_in_place(&mut document.description);
    Ok(document)
}

/// Resolve the five predefined XML entities and numeric character references.
/// Any other `&name;` is kept verbatim for [`unescape_html`], so `&amp;amp;`
/// is decoded exactly once here.
fn decode_xml_entities(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut rest = raw;
    while let Some(start) = rest.find('&') {
        out.push_str(&rest[..start]);
        let after = &rest[start + 1..];
        let end = after.find(|c: char| c == ';' || c == '&' || c.is_whitespace());
        match end {
            Some(end) if after[end..].starts_with(';') => {
                let reference = &rest[start..start + end + 2];
                match quick_xml::escape::unescape(reference) {
                    Ok(decoded) => out.push_str(&decoded),
                    Err(_) => out.push_str(reference),
                }
                rest = &after[end + 1..];
            }
            _ => {
                out.push('&');
                rest = after;
            }
        }
    }
    out.push_str(rest);
    out
}

fn trim_in_place(text: &mut String) {
    let trimmed = text.trim();
    if trimmed.len() != text.len() {
        *text = trimmed.to_string();
    }
}

fn append_text(
    path: &[Vec<u8>],
    document: &mut RawFeedDocument,
    item: Option<&mut RawFeedItem>,
    text: &str,
) {
    let target = match path {
        [_, channel, name] if channel == b"channel" => {
            Field::from_name(name).and_then(|field| document.field_mut(field))
        }
        [_, channel, parent, name] if channel == b"channel" && parent == b"item" => {
            match (item, Field::from_name(name)) {
                (Some(item), Some(field)) => item.field_mut(field),
                _ => None,
            }
        }
        _ => None,
    };
    if let Some(target) = target {
        target.push_str(text);
    }
}

/// Decode HTML entities left in titles and descriptions. Providers often
/// double-encode, so `A &amp;amp; B` in the XML arrives here as `A &amp; B`.
pub fn unescape_html(document: &mut RawFeedDocument) {
    decode_in_place(&mut document.title);
    decode_in_place(&mut document.description);
    for item in &mut document.items {
        decode_in_place(&mut item.title);
        decode_in_place(&mut item.description);
    }
}

fn decode_in_place(text: &mut String) {
    let decoded = html_escape::decode_html_entities(text.as_str()).into_owned();
    *text = decoded;
}
