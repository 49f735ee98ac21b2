//! Media type inference for textual response bodies.

pub const APPLICATION_JSON: &str = "application/json";
pub const APPLICATION_XML: &str = "application/xml";
pub const TEXT_HTML: &str = "text/html";
pub const TEXT_PLAIN: &str = "text/plain";

/// Standard HTML element names.
const HTML_TAGS: &[&str] = &[
    "a", "abbr", "address", "area", "article", "aside", "audio", "b", "base", "bdi", "bdo",
    "blockquote", "body", "br", "button", "canvas", "caption", "cite", "code", "col", "colgroup",
    "data", "datalist", "dd", "del", "details", "dfn", "dialog", "div", "dl", "dt", "em", "embed",
    "fieldset", "figcaption", "figure", "footer", "form", "h1", "h2", "h3", "h4", "h5", "h6",
    "head", "header", "hgroup", "hr", "html", "i", "iframe", "img", "input", "ins", "kbd",
    "label", "legend", "li", "link", "main", "map", "mark", "math", "menu", "menuitem", "meta",
    "meter", "nav", "noscript", "object", "ol", "optgroup", "option", "output", "p", "param",
    "picture", "pre", "progress", "q", "rb", "rp", "rt", "rtc", "ruby", "s", "samp", "script",
    "search", "section", "select", "slot", "small", "source", "span", "strong", "style", "sub",
    "summary", "sup", "svg", "table", "tbody", "td", "template", "textarea", "tfoot", "th",
    "thead", "time", "title", "tr", "track", "u", "ul", "var", "video", "wbr",
];

/// Guesses the media type of a textual body.
///
/// JSON-shaped text (`{…}` or `[…]`) is JSON. Markup ending in `>` is HTML when it starts with a
/// doctype or its first tag is a known HTML element, XML when it starts with an XML prolog or its
/// first tag is unknown or namespaced. Everything else is plain text.
pub fn sniff_text(body: &str) -> &'static str {
    let trimmed = body.trim();

    if (trimmed.starts_with('{') && trimmed.ends_with('}'))
        || (trimmed.starts_with('[') && trimmed.ends_with(']'))
    {
        return APPLICATION_JSON;
    }

    if !trimmed.ends_with('>') {
        return TEXT_PLAIN;
    }

    if starts_with_ignore_case(trimmed, "<!DOCTYPE ") {
        return TEXT_HTML;
    }
    if trimmed.starts_with("<?xml ") {
        return APPLICATION_XML;
    }

    match first_tag(trimmed) {
        Some(tag) if tag.contains(':') => APPLICATION_XML,
        Some(tag) if HTML_TAGS.contains(&tag) => TEXT_HTML,
        Some(_) => APPLICATION_XML,
        None => TEXT_PLAIN,
    }
}

/// Whether a media type is textual and should carry a charset parameter.
pub fn is_textual(media_type: &str) -> bool {
    let media_type = media_type.trim();
    media_type.starts_with("text/")
        || media_type.ends_with("json")
        || media_type.ends_with("xml")
        || media_type == "application/javascript"
}

fn starts_with_ignore_case(text: &str, prefix: &str) -> bool {
    text.get(..prefix.len())
        .is_some_and(|head| head.eq_ignore_ascii_case(prefix))
}

/// Name of the first `<tag`, made of ASCII alphanumerics, `-`, `:` and `_`.
fn first_tag(text: &str) -> Option<&str> {
    let is_tag_char = |c: char| c.is_ascii_alphanumeric() || matches!(c, '-' | ':' | '_');

    text.match_indices('<').find_map(|(index, _)| {
        let rest = &text[index + 1..];
        let end = rest.find(|c: char| !is_tag_char(c)).unwrap_or(rest.len());
        (end > 0).then(|| &rest[..end])
    })
}
