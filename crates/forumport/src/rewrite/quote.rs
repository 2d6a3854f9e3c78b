//! Quote markers: `[quote=name|legacy_post_id]`.

use std::collections::HashMap;
use std::sync::LazyLock;

use regex::{Captures, Regex};

static QUOTE_OPEN: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\[quote=([^\]]*)\]").unwrap());

/// A quote of one legacy post by another.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuoteReference {
    pub quoting_source_id: i64,
    pub quoted_source_id: i64,
    pub display_name: String,
}

/// Where a quoted post ended up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QuoteTarget {
    pub post_id: i64,
    pub post_number: i32,
    pub topic_id: i64,
}

/// Resolves legacy post ids for quote rewriting.
pub trait QuoteLookup {
    fn lookup(&self, source_id: i64) -> Option<QuoteTarget>;
}

impl QuoteLookup for HashMap<i64, QuoteTarget> {
    fn lookup(&self, source_id: i64) -> Option<QuoteTarget> {
        self.get(&source_id).copied()
    }
}

/// Nothing resolves. Used when no posts have been imported yet.
pub struct NoQuotes;

impl QuoteLookup for NoQuotes {
    fn lookup(&self, _source_id: i64) -> Option<QuoteTarget> {
        None
    }
}

#[derive(Debug, PartialEq)]
enum Payload {
    Empty,
    /// Not in `name|id` form; kept verbatim.
    Opaque,
    Reference { name: String, source_id: i64 },
}

fn parse_payload(payload: &str) -> Payload {
    if payload.trim().is_empty() {
        return Payload::Empty;
    }

    let mut fields = payload.split('|');
    let (Some(name), Some(id)) = (fields.next(), fields.next()) else {
        return Payload::Opaque;
    };

    match id.trim().parse::<i64>() {
        Ok(source_id) => Payload::Reference {
            name: name.trim().replace('"', "_"),
            source_id,
        },
        Err(_) => Payload::Opaque,
    }
}

/// Every resolvable quote marker in `text`, in order of appearance.
pub fn references(quoting_source_id: i64, text: &str) -> Vec<QuoteReference> {
    QUOTE_OPEN
        .captures_iter(text)
        .filter_map(|caps| match parse_payload(&caps[1]) {
            Payload::Reference { name, source_id } => Some(QuoteReference {
                quoting_source_id,
                quoted_source_id: source_id,
                display_name: name,
            }),
            _ => None,
        })
        .collect()
}

/// Rewrite quote markers into target quotes. Markers that cannot be
/// resolved stay exactly as written.
pub fn rewrite_quotes(text: &str, lookup: &dyn QuoteLookup) -> String {
    QUOTE_OPEN
        .replace_all(text, |caps: &Captures| {
            let marker = &caps[0];
            match parse_payload(&caps[1]) {
                Payload::Empty => "[quote]".to_string(),
                Payload::Opaque => {
                    if caps[1].contains('|') {
                        tracing::warn!("Cannot rewrite quote {}: malformed post id", marker);
                    }
                    marker.to_string()
                }
                Payload::Reference { name, source_id } => match lookup.lookup(source_id) {
                    Some(target) => format!(
                        "[quote=\"{}, id: {}, post:{}, topic:{}\"]",
                        name, target.post_id, target.post_number, target.topic_id
                    ),
                    None => {
                        tracing::warn!("Cannot rewrite quote {}: post {} not imported", marker, source_id);
                        marker.to_string()
                    }
                },
            }
        })
        .into_owned()
}
