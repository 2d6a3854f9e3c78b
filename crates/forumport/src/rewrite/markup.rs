//! Markup stages applied to every post body, in order.
//!
//! Every function here is total: a pattern that does not match leaves the
//! text as it was.

use regex::{Captures, Regex};
use std::sync::LazyLock;

static SMILEY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<!-- s(\S+) -->.*?<!-- s\S+ -->").unwrap());

static MAGIC_LINK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"<!-- \w --><a[^>]*?href="([^"]+)"[^>]*>(.*?)</a><!-- \w -->"#).unwrap()
});

static TAG_HASH: LazyLock<Regex> = LazyLock::new(|| Regex::new(r":\w{8}\]").unwrap());

static VIDEO_TAG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)(?:^\[video=.*?\])|(?:\[/video\]$)").unwrap());

static TRUNCATED_LINK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\[https?://(?:www\.)?").unwrap());

static URL_BLOCK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\[url\]([^\s\[\]]+)\[/url\]").unwrap());

static URL_ATTR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\[url=([^\s\[\]]+)\]").unwrap());

static IMG_ATTR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\[img=([^\]\s]+)\](\[/img\])?").unwrap());

const IMAGE_EXTENSIONS: [&str; 6] = ["jpg", "jpeg", "png", "gif", "webp", "svg"];

static PLUS_ONE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(^|\s)\+ 1\b").unwrap());

static CODE_TAG: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)\[(/?)c\]").unwrap());

static SPOILER_OPEN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\[spoiler(?:=([^\]]*))?\]").unwrap());

static SPOILER_CLOSE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\[/spoiler\]").unwrap());

/// `<!-- s:) --><img ... /><!-- s:) -->` becomes `:)`.
pub fn smileys(text: &str) -> String {
    SMILEY.replace_all(text, "${1}").into_owned()
}

/// Comment-wrapped anchors become `[text](url)`.
pub fn magic_links(text: &str) -> String {
    MAGIC_LINK.replace_all(text, "[$2]($1)").into_owned()
}

/// Drops the 8-character uid suffix on tags, `[/quote:1qh1i7ky]`.
pub fn tag_hashes(text: &str) -> String {
    TAG_HASH.replace_all(text, "]").into_owned()
}

pub fn video_tags(text: &str) -> String {
    VIDEO_TAG.replace_all(text, "").into_owned()
}

pub fn entities(text: &str) -> String {
    html_escape::decode_html_entities(text).into_owned()
}

/// Link text shortened by the legacy renderer (`[http://www.example.com/a ... b](...)`)
/// loses its scheme so it no longer parses as a nested link.
pub fn truncated_links(text: &str) -> String {
    TRUNCATED_LINK.replace_all(text, "[").into_owned()
}

fn has_scheme(token: &str) -> bool {
    token.contains("://")
        || token.starts_with("mailto:")
        || token.starts_with('/')
        || token.starts_with('#')
}

fn with_scheme(token: &str) -> String {
    if has_scheme(token) {
        token.to_string()
    } else {
        format!("http://{}", token)
    }
}

/// Whether an `[img=...]` value is an image location rather than alt text.
fn is_image_location(token: &str) -> bool {
    if token.contains("://") || token.starts_with('/') {
        return true;
    }
    if token.starts_with("./") || token.starts_with("../") {
        return true;
    }
    let path = token.split(['?', '#']).next().unwrap_or(token);
    path.rsplit_once('.').is_some_and(|(_, ext)| {
        IMAGE_EXTENSIONS
            .iter()
            .any(|known| ext.eq_ignore_ascii_case(known))
    })
}

/// Scheme-less `[url]` tags get `http://`.
///
/// `[img=LOCATION]` becomes `[img]LOCATION[/img]` when it is closed right
/// away or the value is a URL or image path, relative ones included. Other
/// values are alt text (`[img=alt]url[/img]`) and are left alone.
pub fn malformed_links(text: &str) -> String {
    let text = URL_BLOCK.replace_all(text, |caps: &Captures| {
        format!("[url]{}[/url]", with_scheme(&caps[1]))
    });
    let text = URL_ATTR.replace_all(&text, |caps: &Captures| {
        format!("[url={}]", with_scheme(&caps[1]))
    });
    IMG_ATTR
        .replace_all(&text, |caps: &Captures| {
            if caps.get(2).is_some() || is_image_location(&caps[1]) {
                format!("[img]{}[/img]", &caps[1])
            } else {
                caps[0].to_string()
            }
        })
        .into_owned()
}

pub fn plus_one(text: &str) -> String {
    PLUS_ONE.replace_all(text, "${1}+1").into_owned()
}

pub fn code_tags(text: &str) -> String {
    CODE_TAG.replace_all(text, "[${1}code]").into_owned()
}

/// `[spoiler=Title]` becomes `[details="Title"]`. Untitled spoilers use `label`.
pub fn spoilers(text: &str, label: &str) -> String {
    let text = SPOILER_OPEN.replace_all(text, |caps: &Captures| {
        let title = caps
            .get(1)
            .map(|m| m.as_str().trim().replace('"', ""))
            .filter(|t| !t.is_empty())
            .unwrap_or_else(|| label.to_string());
        format!("[details=\"{}\"]", title)
    });
    SPOILER_CLOSE.replace_all(&text, "[/details]").into_owned()
}
