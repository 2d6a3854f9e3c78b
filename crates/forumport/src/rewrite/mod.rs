//! Legacy PunBB markup to target markup.
//!
//! Rewriting is split in two so the caller can resolve quotes against the
//! identity mappings in between:
//!
//! - [`Rewriter::prepare`] runs the text-only stages.
//! - [`Rewriter::quote_references`] lists the posts the text quotes.
//! - [`Rewriter::finish`] rewrites quote markers from the resolved targets.

mod markdown;
mod markup;
mod quote;

pub use markdown::to_markdown;
pub use markup::entities as decode_entities;
pub use quote::{NoQuotes, QuoteLookup, QuoteReference, QuoteTarget};

/// Post body rewriter.
#[derive(Debug, Clone)]
pub struct Rewriter {
    spoiler_label: String,
}

impl Default for Rewriter {
    fn default() -> Self {
        Self::new("Spoiler")
    }
}

impl Rewriter {
    pub fn new(spoiler_label: impl Into<String>) -> Self {
        Self {
            spoiler_label: spoiler_label.into(),
        }
    }

    /// Every stage except quote rewriting, in order.
    pub fn prepare(&self, raw: &str) -> String {
        let s = markup::smileys(raw);
        let s = markup::magic_links(&s);
        let s = markup::tag_hashes(&s);
        let s = markup::video_tags(&s);
        let s = markup::entities(&s);
        let s = markup::truncated_links(&s);
        let s = markup::malformed_links(&s);
        let s = markup::plus_one(&s);
        let s = markup::code_tags(&s);
        markup::spoilers(&s, &self.spoiler_label)
    }

    /// Quotes in prepared text that name a legacy post.
    pub fn quote_references(&self, quoting_source_id: i64, prepared: &str) -> Vec<QuoteReference> {
        quote::references(quoting_source_id, prepared)
    }

    pub fn finish(&self, prepared: String, lookup: &dyn QuoteLookup) -> String {
        quote::rewrite_quotes(&prepared, lookup)
    }

    pub fn rewrite(&self, raw: &str, lookup: &dyn QuoteLookup) -> String {
        self.finish(self.prepare(raw), lookup)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_smiley_round_trip() {
        let raw = r#"<!-- s:) --><img src="{SMILIES_PATH}/icon_e_smile.gif" alt=":)" title="Smile" /><!-- s:) -->"#;
        assert_eq!(Rewriter::default().rewrite(raw, &NoQuotes), ":)");
    }

    #[test]
    fn test_hash_then_entities_then_quote() {
        // The uid suffix has to go before the post id parses.
        let raw = "[quote=alice|7:1qh1i7ky]Col &amp; pic[/quote:1qh1i7ky]";
        let lookup = HashMap::from([(
            7,
            QuoteTarget {
                post_id: 7,
                post_number: 2,
                topic_id: 3,
            },
        )]);
        assert_eq!(
            Rewriter::default().rewrite(raw, &lookup),
            "[quote=\"alice, id: 7, post:2, topic:3\"]Col & pic[/quote]"
        );
    }

    #[test]
    fn test_stage_order_entities_before_truncated_links() {
        // Encoded brackets only turn into a truncated link after decoding.
        let raw = "&#91;http://www.c2c.org/x ... y](http://www.c2c.org/x/y)";
        assert_eq!(
            Rewriter::default().prepare(raw),
            "[c2c.org/x ... y](http://www.c2c.org/x/y)"
        );
    }

    #[test]
    fn test_prepare_keeps_quote_markers() {
        let rewriter = Rewriter::new("Spoiler");
        let prepared = rewriter.prepare("[quote=bob|5]yes + 1[/quote] [c]x[/c] [spoiler]y[/spoiler]");
        assert_eq!(
            prepared,
            "[quote=bob|5]yes +1[/quote] [code]x[/code] [details=\"Spoiler\"]y[/details]"
        );
        assert_eq!(rewriter.quote_references(6, &prepared).len(), 1);
        assert_eq!(rewriter.finish(prepared.clone(), &NoQuotes), prepared);
    }

    #[test]
    fn test_plain_text_unchanged() {
        let raw = "Conditions were good on the north face.\nStart at 4am.";
        assert_eq!(Rewriter::default().rewrite(raw, &NoQuotes), raw);
    }
}
