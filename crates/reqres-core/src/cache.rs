//! `Cache-Control` grammar shared by both sides of an exchange.

use std::fmt;

/// A parsed `Cache-Control` value. `no-cache` and an absent header are both represented by
/// `None` at the call sites.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CacheControl {
    MaxAge(u64),
    Other(String),
}

impl CacheControl {
    /// Parses a header value. `max-age=N` anywhere in the value wins over the raw text.
    pub fn parse(value: Option<&str>) -> Option<Self> {
        let value = value?.trim();
        if value.is_empty() || value.eq_ignore_ascii_case("no-cache") {
            return None;
        }

        match max_age(value) {
            Some(seconds) => Some(CacheControl::MaxAge(seconds)),
            None => Some(CacheControl::Other(value.to_string())),
        }
    }

    pub fn max_age(&self) -> Option<u64> {
        match self {
            CacheControl::MaxAge(seconds) => Some(*seconds),
            CacheControl::Other(_) => None,
        }
    }
}

impl fmt::Display for CacheControl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CacheControl::MaxAge(seconds) => write!(f, "max-age={seconds}"),
            CacheControl::Other(raw) => f.write_str(raw),
        }
    }
}

impl From<u64> for CacheControl {
    fn from(seconds: u64) -> Self {
        CacheControl::MaxAge(seconds)
    }
}

impl From<&str> for CacheControl {
    fn from(raw: &str) -> Self {
        match raw.trim().parse::<u64>() {
            Ok(seconds) => CacheControl::MaxAge(seconds),
            Err(_) => CacheControl::Other(raw.to_string()),
        }
    }
}

/// Wire value written for an optional directive; `None` means `no-cache`.
pub fn format_cache_control(value: Option<&CacheControl>) -> String {
    match value {
        Some(directive) => directive.to_string(),
        None => "no-cache".to_string(),
    }
}

fn max_age(value: &str) -> Option<u64> {
    value.split(',').find_map(|directive| {
        let (name, seconds) = directive.split_once('=')?;
        if !name.trim().eq_ignore_ascii_case("max-age") {
            return None;
        }
        let digits = seconds
            .trim()
            .chars()
            .take_while(char::is_ascii_digit)
            .collect::<String>();
        if digits.is_empty() {
            return None;
        }
        // Values too large for u64 saturate instead of degrading to the raw string.
        Some(digits.parse::<u64>().unwrap_or(u64::MAX))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_cache_and_absent_are_none() {
        assert_eq!(CacheControl::parse(None), None);
        assert_eq!(CacheControl::parse(Some("no-cache")), None);
        assert_eq!(CacheControl::parse(Some("No-Cache")), None);
        assert_eq!(CacheControl::parse(Some("")), None);
    }

    #[test]
    fn max_age_is_extracted() {
        assert_eq!(
            CacheControl::parse(Some("max-age=3600")),
            Some(CacheControl::MaxAge(3600))
        );
        assert_eq!(
            CacheControl::parse(Some("public, MAX-AGE=60")),
            Some(CacheControl::MaxAge(60))
        );
    }

    #[test]
    fn other_directives_stay_raw() {
        assert_eq!(
            CacheControl::parse(Some("no-store")),
            Some(CacheControl::Other("no-store".into()))
        );
        assert_eq!(
            CacheControl::parse(Some("max-age=soon")),
            Some(CacheControl::Other("max-age=soon".into()))
        );
    }

    #[test]
    fn formats_back_to_wire_grammar() {
        assert_eq!(format_cache_control(Some(&CacheControl::MaxAge(10))), "max-age=10");
        assert_eq!(format_cache_control(Some(&"private".into())), "private");
        assert_eq!(format_cache_control(Some(&"120".into())), "max-age=120");
        assert_eq!(format_cache_control(None), "no-cache");
    }
}
