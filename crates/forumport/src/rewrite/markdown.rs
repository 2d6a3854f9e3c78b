//! BBCode to Markdown, for previewing converted posts.
//!
//! Covers the tags legacy posts actually use. Unknown tags are left as they
//! are.

use regex::{Captures, Regex};
use std::sync::LazyLock;

static CODE_BLOCK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)\[code\](.*?)\[/code\]").unwrap());

static CODE_SLOT: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\x1a(\d+)\x1a").unwrap());

static STYLE_TAG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\[/?(?:color|size|font|u)(?:=[^\]]*)?\]").unwrap());

static BOLD: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?is)\[b\](.*?)\[/b\]").unwrap());

static ITALIC: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?is)\[i\](.*?)\[/i\]").unwrap());

static STRIKE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?is)\[s\](.*?)\[/s\]").unwrap());

static URL_NAMED: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)\[url=([^\]]+)\](.*?)\[/url\]").unwrap());

static URL_PLAIN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)\[url\](.*?)\[/url\]").unwrap());

static IMG_ALT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)\[img=([^\]]*)\](.*?)\[/img\]").unwrap());

static IMG: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?is)\[img\](.*?)\[/img\]").unwrap());

static LIST: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)\[list(=[^\]]*)?\](.*?)\[/list\]").unwrap());

static QUOTE_OPEN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\[quote(?:=([^\]]*))?\]").unwrap());

const QUOTE_CLOSE: &str = "[/quote]";

static BLANK_LINES: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\n{3,}").unwrap());

/// Render a post body as Markdown.
pub fn to_markdown(text: &str) -> String {
    let mut blocks = Vec::new();
    let text = CODE_BLOCK.replace_all(text, |caps: &Captures| {
        blocks.push(caps[1].trim_matches('\n').to_string());
        format!("\x1a{}\x1a", blocks.len() - 1)
    });

    let text = STYLE_TAG.replace_all(&text, "");
    let text = BOLD.replace_all(&text, "**${1}**");
    let text = ITALIC.replace_all(&text, "*${1}*");
    let text = STRIKE.replace_all(&text, "~~${1}~~");
    let text = URL_NAMED.replace_all(&text, "[${2}](${1})");
    let text = URL_PLAIN.replace_all(&text, "<${1}>");
    let text = IMG_ALT.replace_all(&text, "![${1}](${2})");
    let text = IMG.replace_all(&text, "![](${1})");
    let text = LIST.replace_all(&text, |caps: &Captures| list(caps.get(1).is_some(), &caps[2]));

    let text = CODE_SLOT.replace_all(&text, |caps: &Captures| {
        caps[1]
            .parse::<usize>()
            .ok()
            .and_then(|i| blocks.get(i))
            .map(|code| format!("\n```\n{}\n```\n", code))
            .unwrap_or_default()
    });

    let text = quotes(&text);
    BLANK_LINES.replace_all(&text, "\n\n").trim().to_string()
}

fn list(ordered: bool, body: &str) -> String {
    let marker = if ordered { "1." } else { "-" };
    let items: Vec<String> = body
        .split("[*]")
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(|item| format!("{} {}", marker, item))
        .collect();
    format!("\n{}\n", items.join("\n"))
}

/// Innermost quotes first, so nested quotes stack their `>` prefixes.
fn quotes(text: &str) -> String {
    let mut text = text.to_string();
    loop {
        let Some(open) = QUOTE_OPEN.captures_iter(&text).last() else {
            return text;
        };
        let whole = open.get(0).map_or(0..0, |m| m.range());
        let Some(close) = text[whole.end..].find(QUOTE_CLOSE) else {
            return text;
        };
        let close = whole.end + close;

        let mut block = String::from("\n");
        if let Some(author) = open.get(1).map(|m| quote_author(m.as_str())) {
            if !author.is_empty() {
                block.push_str(&format!("> **{} wrote:**\n>\n", author));
            }
        }
        for line in text[whole.end..close].trim_matches('\n').lines() {
            if line.is_empty() {
                block.push_str(">\n");
            } else {
                block.push_str(&format!("> {}\n", line));
            }
        }
        block.push('\n');

        text.replace_range(whole.start..close + QUOTE_CLOSE.len(), &block);
    }
}

/// Name part of a quote attribute: `alice|100` or `"alice, id: 7, ..."`.
fn quote_author(value: &str) -> String {
    value
        .trim_matches('"')
        .split(['|', ','])
        .next()
        .unwrap_or_default()
        .trim()
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_inline_tags() {
        assert_eq!(
            to_markdown("[b]bold[/b], [i]it[/i], [s]old[/s] and [u][color=red]plain[/color][/u]"),
            "**bold**, *it*, ~~old~~ and plain"
        );
    }

    #[test]
    fn test_links_and_images() {
        assert_eq!(
            to_markdown("[url=http://c2c.org]site[/url] [url]http://x.org[/url]"),
            "[site](http://c2c.org) <http://x.org>"
        );
        assert_eq!(
            to_markdown("[img]http://x.org/a.jpg[/img] [img=Summit]http://x.org/b.jpg[/img]"),
            "![](http://x.org/a.jpg) ![Summit](http://x.org/b.jpg)"
        );
    }

    #[test]
    fn test_code_is_fenced_and_untouched() {
        assert_eq!(
            to_markdown("see:\n[code]\nlet [b]x[/b] = 1;\n[/code]"),
            "see:\n\n```\nlet [b]x[/b] = 1;\n```"
        );
    }

    #[test]
    fn test_lists() {
        assert_eq!(
            to_markdown("Gear:[list][*]rope\n[*]helmet[/list]"),
            "Gear:\n- rope\n- helmet"
        );
        assert_eq!(to_markdown("[list=1][*]a[*]b[/list]"), "1. a\n1. b");
    }

    #[test]
    fn test_nested_quotes() {
        let raw = "[quote=alice|100]Top\n[quote=bob|99]inner[/quote][/quote]reply";
        assert_eq!(
            to_markdown(raw),
            "> **alice wrote:**\n>\n> Top\n>\n> > **bob wrote:**\n> >\n> > inner\n\nreply"
        );
    }

    #[test]
    fn test_resolved_quote_author() {
        assert_eq!(
            to_markdown("[quote=\"alice, id: 5, post:1, topic:2\"]hi[/quote]"),
            "> **alice wrote:**\n>\n> hi"
        );
        assert_eq!(to_markdown("[quote]hi[/quote]"), "> hi");
    }

    #[test]
    fn test_unclosed_quote_is_left() {
        assert_eq!(to_markdown("[quote]dangling"), "[quote]dangling");
    }
}
