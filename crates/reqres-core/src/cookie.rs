//! Cookie codec: `Cookie` header parsing and `Set-Cookie` serialization.
//!
//! Values carry a two character marker before signing: `j:` for JSON payloads and `s:` for plain
//! strings. Unmarked values are read back literally.

use std::collections::HashMap;
use std::fmt;

use chrono::{DateTime, TimeDelta, Utc};
use percent_encoding::{percent_decode_str, utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use serde::Serialize;
use serde_json::Value;

use crate::headers::format_http_date;
use crate::signature;

/// Characters left untouched by `encodeURIComponent`.
const COMPONENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'!')
    .remove(b'~')
    .remove(b'*')
    .remove(b'\'')
    .remove(b'(')
    .remove(b')');

const JSON_MARKER: &str = "j:";
const STRING_MARKER: &str = "s:";

/// A decoded cookie value.
#[derive(Clone, Debug, PartialEq)]
pub enum CookieValue {
    Text(String),
    Json(Value),
}

impl CookieValue {
    pub fn json<T>(value: &T) -> Result<Self, serde_json::Error>
    where
        T: Serialize,
    {
        serde_json::to_value(value).map(CookieValue::Json)
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            CookieValue::Text(text) => Some(text),
            CookieValue::Json(Value::String(text)) => Some(text),
            CookieValue::Json(_) => None,
        }
    }

    pub fn as_json(&self) -> Option<&Value> {
        match self {
            CookieValue::Json(value) => Some(value),
            CookieValue::Text(_) => None,
        }
    }

    /// Marker-prefixed form that is signed and sent on the wire.
    pub fn to_marked(&self) -> String {
        match self {
            CookieValue::Text(text) => format!("{STRING_MARKER}{text}"),
            CookieValue::Json(value) => format!("{JSON_MARKER}{value}"),
        }
    }

    /// Reverses [`CookieValue::to_marked`]; a `j:` payload that fails to parse stays text.
    pub fn from_marked(raw: &str) -> Self {
        if let Some(json) = raw.strip_prefix(JSON_MARKER) {
            match serde_json::from_str(json) {
                Ok(value) => CookieValue::Json(value),
                Err(_) => CookieValue::Text(json.to_string()),
            }
        } else if let Some(text) = raw.strip_prefix(STRING_MARKER) {
            CookieValue::Text(text.to_string())
        } else {
            CookieValue::Text(raw.to_string())
        }
    }
}

impl fmt::Display for CookieValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CookieValue::Text(text) => f.write_str(text),
            CookieValue::Json(value) => write!(f, "{value}"),
        }
    }
}

impl From<&str> for CookieValue {
    fn from(value: &str) -> Self {
        CookieValue::Text(value.to_string())
    }
}

impl From<String> for CookieValue {
    fn from(value: String) -> Self {
        CookieValue::Text(value)
    }
}

impl From<Value> for CookieValue {
    fn from(value: Value) -> Self {
        CookieValue::Json(value)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SameSite {
    Strict,
    Lax,
    None,
}

impl SameSite {
    pub fn as_str(&self) -> &'static str {
        match self {
            SameSite::Strict => "Strict",
            SameSite::Lax => "Lax",
            SameSite::None => "None",
        }
    }
}

/// Attributes attached to an outgoing cookie.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CookieOptions {
    /// Lifetime in seconds; also produces an `Expires` attribute.
    pub max_age: Option<i64>,
    pub expires: Option<DateTime<Utc>>,
    pub domain: Option<String>,
    pub path: Option<String>,
    pub http_only: bool,
    pub secure: bool,
    pub same_site: Option<SameSite>,
}

impl CookieOptions {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn max_age(mut self, seconds: i64) -> Self {
        self.max_age = Some(seconds);
        self
    }

    #[must_use]
    pub fn expires(mut self, at: DateTime<Utc>) -> Self {
        self.expires = Some(at);
        self
    }

    #[must_use]
    pub fn domain(mut self, domain: impl Into<String>) -> Self {
        self.domain = Some(domain.into());
        self
    }

    #[must_use]
    pub fn path(mut self, path: impl Into<String>) -> Self {
        self.path = Some(path.into());
        self
    }

    #[must_use]
    pub fn http_only(mut self, http_only: bool) -> Self {
        self.http_only = http_only;
        self
    }

    #[must_use]
    pub fn secure(mut self, secure: bool) -> Self {
        self.secure = secure;
        self
    }

    #[must_use]
    pub fn same_site(mut self, same_site: SameSite) -> Self {
        self.same_site = Some(same_site);
        self
    }
}

/// Renders one `Set-Cookie` line. `value == None` produces a deletion cookie: empty value and an
/// `Expires` at the epoch, with any `max_age`/`expires` option ignored.
pub fn serialize(
    name: &str,
    value: Option<&CookieValue>,
    options: &CookieOptions,
    secret: Option<&str>,
    now: DateTime<Utc>,
) -> String {
    let mut line = String::with_capacity(64);
    line.push_str(name);
    line.push('=');

    match value {
        Some(value) => {
            let marked = value.to_marked();
            let wire = match secret {
                Some(secret) if !marked.is_empty() => signature::sign(&marked, secret),
                _ => marked,
            };
            line.push_str(&utf8_percent_encode(&wire, COMPONENT).to_string());

            let expires = match options.max_age {
                Some(seconds) => {
                    line.push_str(&format!("; Max-Age={seconds}"));
                    TimeDelta::try_seconds(seconds)
                        .and_then(|delta| now.checked_add_signed(delta))
                        .or(options.expires)
                }
                None => options.expires,
            };
            if let Some(expires) = expires {
                line.push_str("; Expires=");
                line.push_str(&format_http_date(&expires));
            }
        }
        None => {
            line.push_str("; Expires=");
            line.push_str(&format_http_date(&DateTime::<Utc>::from(
                std::time::UNIX_EPOCH,
            )));
        }
    }

    if let Some(domain) = &options.domain {
        line.push_str("; Domain=");
        line.push_str(domain);
    }
    if let Some(path) = &options.path {
        line.push_str("; Path=");
        line.push_str(path);
    }
    if options.http_only {
        line.push_str("; HttpOnly");
    }
    if options.secure {
        line.push_str("; Secure");
    }
    if let Some(same_site) = options.same_site {
        line.push_str("; SameSite=");
        line.push_str(same_site.as_str());
    }

    line
}

/// A cookie write waiting for the response head to be flushed.
#[derive(Clone, Debug, PartialEq)]
pub enum PendingCookie {
    Set(CookieValue, CookieOptions),
    /// Expiring write that deletes the cookie client-side.
    Clear(CookieOptions),
}

impl PendingCookie {
    pub fn value(&self) -> Option<&CookieValue> {
        match self {
            PendingCookie::Set(value, _) => Some(value),
            PendingCookie::Clear(_) => None,
        }
    }

    pub fn options(&self) -> &CookieOptions {
        match self {
            PendingCookie::Set(_, options) | PendingCookie::Clear(options) => options,
        }
    }
}

/// Outgoing cookies in mutation order. Writing a name again moves it to the end.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct CookieJar {
    entries: Vec<(String, PendingCookie)>,
}

impl CookieJar {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str) -> Option<&PendingCookie> {
        self.entries
            .iter()
            .find(|(existing, _)| existing == name)
            .map(|(_, pending)| pending)
    }

    pub fn set(&mut self, name: &str, value: CookieValue, options: CookieOptions) {
        self.push(name, PendingCookie::Set(value, options));
    }

    pub fn clear(&mut self, name: &str, options: CookieOptions) {
        self.push(name, PendingCookie::Clear(options));
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &PendingCookie)> {
        self.entries
            .iter()
            .map(|(name, pending)| (name.as_str(), pending))
    }

    /// One `Set-Cookie` line per pending write.
    pub fn to_lines(&self, secret: Option<&str>, now: DateTime<Utc>) -> Vec<String> {
        self.iter()
            .map(|(name, pending)| serialize(name, pending.value(), pending.options(), secret, now))
            .collect()
    }

    fn push(&mut self, name: &str, pending: PendingCookie) {
        self.entries.retain(|(existing, _)| existing != name);
        self.entries.push((name.to_string(), pending));
    }
}

/// Parses a request `Cookie` header.
///
/// Pairs without `=` are skipped. Values are URL-decoded (falling back to the raw text), then
/// unsigned when a secret is configured (falling back to the value as received), then decoded
/// through their type marker.
pub fn parse_cookie_header(header: Option<&str>, secret: Option<&str>) -> HashMap<String, CookieValue> {
    let mut cookies = HashMap::new();
    let Some(header) = header else {
        return cookies;
    };

    for pair in header.split(';') {
        let Some((name, raw)) = pair.split_once('=') else {
            if !pair.trim().is_empty() {
                log::debug!("skipping cookie pair without value: {:?}", pair.trim());
            }
            continue;
        };
        let name = name.trim();
        if name.is_empty() {
            continue;
        }

        let raw = raw.trim();
        let decoded = match percent_decode_str(raw).decode_utf8() {
            Ok(decoded) => decoded.into_owned(),
            Err(_) => {
                log::debug!("cookie {name} is not valid percent-encoded UTF-8; keeping raw value");
                raw.to_string()
            }
        };

        let unsigned = match secret {
            Some(secret) => match signature::unsign(&decoded, secret) {
                Some(value) => value,
                None => {
                    log::debug!("cookie {name} failed signature verification; using raw value");
                    decoded.as_str()
                }
            },
            None => decoded.as_str(),
        };

        cookies.insert(name.to_string(), CookieValue::from_marked(unsigned));
    }

    cookies
}
