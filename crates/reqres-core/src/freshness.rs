//! Entity tags and conditional request evaluation.

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use sha1::{Digest, Sha1};

use crate::headers::parse_http_date;

/// Conditional request headers captured from the inbound request.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Validators {
    pub if_none_match: Option<String>,
    pub if_modified_since: Option<String>,
    pub cache_control: Option<String>,
}

/// Strong entity tag: hex body length and the first 27 characters of the base64 SHA-1 digest.
pub fn entity_tag(body: &[u8]) -> String {
    let digest = STANDARD.encode(Sha1::digest(body));
    format!("\"{:x}-{}\"", body.len(), &digest[..27])
}

/// Whether a cached representation described by `validators` is still current.
///
/// Requires at least one conditional header. A request `Cache-Control: no-cache` forces a
/// refetch. `If-None-Match` (other than `*`) must list the current tag, weak or strong.
/// `If-Modified-Since` requires a `Last-Modified` that is not later than it.
pub fn is_fresh(
    validators: &Validators,
    etag: Option<&str>,
    last_modified: Option<&str>,
) -> bool {
    let none_match = validators
        .if_none_match
        .as_deref()
        .map(str::trim)
        .filter(|value| !value.is_empty());
    let modified_since = validators
        .if_modified_since
        .as_deref()
        .map(str::trim)
        .filter(|value| !value.is_empty());

    if none_match.is_none() && modified_since.is_none() {
        return false;
    }

    if let Some(cache_control) = validators.cache_control.as_deref() {
        if cache_control
            .split(',')
            .any(|directive| directive.trim().eq_ignore_ascii_case("no-cache"))
        {
            return false;
        }
    }

    if let Some(none_match) = none_match {
        if none_match != "*" {
            let Some(etag) = etag else {
                return false;
            };
            let matched = none_match
                .split(',')
                .map(str::trim)
                .any(|candidate| tags_match(candidate, etag));
            if !matched {
                return false;
            }
        }
    }

    if let Some(modified_since) = modified_since {
        let since = parse_http_date(modified_since);
        let last = last_modified.and_then(parse_http_date);
        match (last, since) {
            (Some(last), Some(since)) if last <= since => {}
            _ => return false,
        }
    }

    true
}

fn tags_match(candidate: &str, etag: &str) -> bool {
    let strip = |tag: &str| tag.strip_prefix("W/").unwrap_or(tag).to_string();
    candidate == etag || strip(candidate) == strip(etag)
}
