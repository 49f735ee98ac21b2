use std::fmt;

use chrono::{DateTime, Utc};

/// Format of an IMF-fixdate as used by `Date`, `Expires` and `Last-Modified`.
const HTTP_DATE_FORMAT: &str = "%a, %d %b %Y %H:%M:%S GMT";

/// Title-cases each dash separated segment of a header name (`x-powered-by` → `X-Powered-By`).
pub fn capitalize(name: &str) -> String {
    name.split('-')
        .map(|segment| {
            let mut chars = segment.chars();
            match chars.next() {
                Some(first) => {
                    let mut out = String::with_capacity(segment.len());
                    out.push(first.to_ascii_uppercase());
                    out.extend(chars.map(|c| c.to_ascii_lowercase()));
                    out
                }
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join("-")
}

pub fn format_http_date(date: &DateTime<Utc>) -> String {
    date.format(HTTP_DATE_FORMAT).to_string()
}

/// Parses an HTTP-date; only the IMF-fixdate/RFC 2822 shape is accepted.
pub fn parse_http_date(value: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc2822(value.trim())
        .ok()
        .map(|date| date.with_timezone(&Utc))
}

/// A header value as held by the response side: one line or several repeated lines.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum HeaderField {
    One(String),
    Many(Vec<String>),
}

impl HeaderField {
    pub fn values(&self) -> Vec<&str> {
        match self {
            HeaderField::One(value) => vec![value.as_str()],
            HeaderField::Many(values) => values.iter().map(String::as_str).collect(),
        }
    }

    /// First value, which is the only one for single-line fields.
    pub fn first(&self) -> Option<&str> {
        match self {
            HeaderField::One(value) => Some(value.as_str()),
            HeaderField::Many(values) => values.first().map(String::as_str),
        }
    }

    fn push(self, value: HeaderField) -> HeaderField {
        let mut values = match self {
            HeaderField::One(existing) => vec![existing],
            HeaderField::Many(existing) => existing,
        };
        match value {
            HeaderField::One(added) => values.push(added),
            HeaderField::Many(added) => values.extend(added),
        }
        HeaderField::Many(values)
    }
}

impl fmt::Display for HeaderField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HeaderField::One(value) => f.write_str(value),
            HeaderField::Many(values) => f.write_str(&values.join(", ")),
        }
    }
}

impl From<&str> for HeaderField {
    fn from(value: &str) -> Self {
        HeaderField::One(value.to_string())
    }
}

impl From<String> for HeaderField {
    fn from(value: String) -> Self {
        HeaderField::One(value)
    }
}

impl From<&String> for HeaderField {
    fn from(value: &String) -> Self {
        HeaderField::One(value.clone())
    }
}

impl From<Vec<String>> for HeaderField {
    fn from(values: Vec<String>) -> Self {
        HeaderField::Many(values)
    }
}

impl From<Vec<&str>> for HeaderField {
    fn from(values: Vec<&str>) -> Self {
        HeaderField::Many(values.into_iter().map(str::to_string).collect())
    }
}

impl From<DateTime<Utc>> for HeaderField {
    fn from(date: DateTime<Utc>) -> Self {
        HeaderField::One(format_http_date(&date))
    }
}

impl From<u64> for HeaderField {
    fn from(value: u64) -> Self {
        HeaderField::One(value.to_string())
    }
}

impl From<usize> for HeaderField {
    fn from(value: usize) -> Self {
        HeaderField::One(value.to_string())
    }
}

/// Ordered, case-insensitive header table. Names are stored lower-cased.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct HeaderTable {
    entries: Vec<(String, HeaderField)>,
}

impl HeaderTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str) -> Option<&HeaderField> {
        self.position(name).map(|index| &self.entries[index].1)
    }

    /// First value of a field, convenient for single-line fields.
    pub fn get_str(&self, name: &str) -> Option<&str> {
        self.get(name).and_then(HeaderField::first)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.position(name).is_some()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &HeaderField)> {
        self.entries
            .iter()
            .map(|(name, field)| (name.as_str(), field))
    }

    /// Replaces the field, keeping its original position when it already exists.
    pub fn insert(&mut self, name: &str, field: HeaderField) -> &HeaderField {
        let index = match self.position(name) {
            Some(index) => {
                self.entries[index].1 = field;
                index
            }
            None => {
                self.entries.push((name.to_ascii_lowercase(), field));
                self.entries.len() - 1
            }
        };
        &self.entries[index].1
    }

    /// Adds values after any existing ones and returns the combined field.
    pub fn append(&mut self, name: &str, field: HeaderField) -> &HeaderField {
        match self.position(name) {
            Some(index) => {
                let slot = &mut self.entries[index].1;
                let existing = std::mem::replace(slot, HeaderField::Many(Vec::new()));
                *slot = existing.push(field);
                &self.entries[index].1
            }
            None => {
                let field = match field {
                    HeaderField::One(value) => HeaderField::Many(vec![value]),
                    many => many,
                };
                self.insert(name, field)
            }
        }
    }

    pub fn remove(&mut self, name: &str) -> Option<HeaderField> {
        self.position(name)
            .map(|index| self.entries.remove(index).1)
    }

    fn position(&self, name: &str) -> Option<usize> {
        self.entries
            .iter()
            .position(|(existing, _)| existing.eq_ignore_ascii_case(name))
    }
}
