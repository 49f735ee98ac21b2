use std::borrow::Cow;
use std::collections::HashMap;

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use chrono::{DateTime, Utc};
use once_cell::unsync::OnceCell;
use percent_encoding::percent_decode_str;
use serde::de::DeserializeOwned;
use url::{Position, Url};

use crate::cache::CacheControl;
use crate::config::ExchangeConfig;
use crate::cookie::{parse_cookie_header, CookieValue};
use crate::freshness::Validators;
use crate::http::Version;
use crate::mime;
use crate::negotiation::{parse_encodings, parse_negotiation};
use crate::transport::RawRequest;

/// What an upstream proxy declared through `X-Forwarded-*` headers.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ProxyInfo {
    pub protocol: Option<String>,
    pub host: Option<String>,
    pub ip: Option<String>,
    pub ips: Vec<String>,
}

impl ProxyInfo {
    /// `None` when none of `X-Forwarded-Proto`, `X-Forwarded-Host`, `X-Forwarded-For` is set.
    pub fn from_request(raw: &dyn RawRequest) -> Option<Self> {
        let protocol = first_listed(raw.header("x-forwarded-proto").as_deref());
        let host = first_listed(raw.header("x-forwarded-host").as_deref());
        let ips = raw
            .header("x-forwarded-for")
            .map(|value| {
                value
                    .split(',')
                    .map(str::trim)
                    .filter(|ip| !ip.is_empty())
                    .map(str::to_string)
                    .collect::<Vec<_>>()
            })
            .unwrap_or_default();

        if protocol.is_none() && host.is_none() && ips.is_empty() {
            return None;
        }

        Some(Self {
            protocol,
            host,
            ip: ips.first().cloned(),
            ips,
        })
    }
}

/// HTTP Basic credentials.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl Credentials {
    /// Decodes `Authorization: Basic <base64(user:pass)>`.
    pub fn from_basic_header(header: &str) -> Option<Self> {
        let (scheme, token) = header.trim().split_once(' ')?;
        if !scheme.eq_ignore_ascii_case("basic") {
            return None;
        }
        let decoded = STANDARD.decode(token.trim()).ok()?;
        let decoded = String::from_utf8(decoded).ok()?;
        let (username, password) = decoded.split_once(':')?;
        Some(Self {
            username: username.to_string(),
            password: password.to_string(),
        })
    }

    fn from_url(url: &Url) -> Option<Self> {
        if url.username().is_empty() {
            return None;
        }
        let decode = |raw: &str| {
            percent_decode_str(raw)
                .decode_utf8()
                .map(|value| value.into_owned())
                .unwrap_or_else(|_| raw.to_string())
        };
        Some(Self {
            username: decode(url.username()),
            password: url.password().map(decode).unwrap_or_default(),
        })
    }
}

/// Request fields the response side needs after the request context is handed to the caller.
#[derive(Clone, Debug)]
pub(crate) struct RequestSnapshot {
    pub method: String,
    pub version: Version,
    pub validators: Validators,
    pub referer: Option<String>,
}

/// Derived, read-only view over one inbound request.
///
/// Built once per exchange; never fails. Each malformed component falls back to its own default
/// while the rest of the context is still derived.
pub struct RequestContext<'r> {
    raw: &'r dyn RawRequest,
    time: DateTime<Utc>,
    proxy: Option<ProxyInfo>,
    protocol: String,
    host: Option<String>,
    url: Option<Url>,
    auth: Option<Credentials>,
    domain_name: Option<String>,
    subdomain: Option<String>,
    cookies: HashMap<String, CookieValue>,
    ips: Vec<String>,
    encodings: Vec<String>,
    query: HashMap<String, String>,
    accepts: OnceCell<Vec<String>>,
    langs: OnceCell<Vec<String>>,
    charsets: OnceCell<Vec<String>>,
    cache: OnceCell<Option<CacheControl>>,
}

impl<'r> RequestContext<'r> {
    pub fn build(config: &ExchangeConfig, raw: &'r dyn RawRequest) -> Self {
        let time = Utc::now();
        let proxy = ProxyInfo::from_request(raw);

        let ips = match &proxy {
            Some(proxy) if !proxy.ips.is_empty() => proxy.ips.clone(),
            _ => raw
                .peer_addr()
                .map(|addr| vec![addr.to_string()])
                .unwrap_or_default(),
        };

        let trusted = proxy.as_ref().filter(|_| config.use_proxy);

        let protocol = if raw.is_encrypted() {
            "https".to_string()
        } else {
            trusted
                .and_then(|proxy| proxy.protocol.as_deref())
                .map(str::to_ascii_lowercase)
                .unwrap_or_else(|| "http".to_string())
        };

        let host = trusted
            .and_then(|proxy| proxy.host.clone())
            .or_else(|| raw.header("host").map(Cow::into_owned))
            .or_else(|| raw.authority().map(str::to_string))
            .filter(|host| !host.trim().is_empty());

        let cookies = parse_cookie_header(raw.header("cookie").as_deref(), config.cookie_secret());

        let url = host.as_deref().and_then(|host| {
            let target = format!("{protocol}://{host}{}", raw.raw_path());
            match Url::parse(&target) {
                Ok(url) => Some(url),
                Err(err) => {
                    log::debug!("could not parse request url {target:?}: {err}");
                    None
                }
            }
        });

        let query = url
            .as_ref()
            .map(|url| url.query_pairs().into_owned().collect())
            .unwrap_or_default();

        let auth = raw
            .header("authorization")
            .as_deref()
            .and_then(Credentials::from_basic_header)
            .or_else(|| url.as_ref().and_then(Credentials::from_url));

        let (domain_name, subdomain) = url
            .as_ref()
            .and_then(Url::host_str)
            .and_then(|hostname| split_domain(hostname, &config.domain))
            .map_or((None, None), |(domain, sub)| (Some(domain), Some(sub)));

        Self {
            raw,
            time,
            proxy,
            protocol,
            host,
            url,
            auth,
            domain_name,
            subdomain,
            cookies,
            ips,
            encodings: parse_encodings(raw.header("accept-encoding").as_deref()),
            query,
            accepts: OnceCell::new(),
            langs: OnceCell::new(),
            charsets: OnceCell::new(),
            cache: OnceCell::new(),
        }
    }

    pub fn raw(&self) -> &'r dyn RawRequest {
        self.raw
    }

    pub fn time(&self) -> DateTime<Utc> {
        self.time
    }

    /// Case-insensitive request header lookup.
    pub fn get(&self, field: &str) -> Option<Cow<'r, str>> {
        self.raw.header(field)
    }

    pub fn method(&self) -> &'r str {
        self.raw.method()
    }

    pub fn version(&self) -> Version {
        self.raw.version()
    }

    pub fn proxy(&self) -> Option<&ProxyInfo> {
        self.proxy.as_ref()
    }

    pub fn protocol(&self) -> &str {
        &self.protocol
    }

    pub fn secure(&self) -> bool {
        self.protocol == "https"
    }

    pub fn host(&self) -> Option<&str> {
        self.host.as_deref()
    }

    /// The URL every path-shaped field below is derived from.
    pub fn url(&self) -> Option<&Url> {
        self.url.as_ref()
    }

    pub fn hostname(&self) -> Option<&str> {
        self.url.as_ref().and_then(Url::host_str)
    }

    pub fn port(&self) -> Option<u16> {
        self.url.as_ref().and_then(Url::port_or_known_default)
    }

    /// Path plus query string.
    pub fn path(&self) -> Option<&str> {
        self.url
            .as_ref()
            .map(|url| &url[Position::BeforePath..Position::AfterQuery])
    }

    pub fn pathname(&self) -> Option<&str> {
        self.url.as_ref().map(Url::path)
    }

    /// `?`-prefixed query string, empty when the URL has none.
    pub fn search(&self) -> Option<&str> {
        self.url
            .as_ref()
            .map(|url| &url[Position::AfterPath..Position::AfterQuery])
    }

    pub fn href(&self) -> Option<&str> {
        self.url.as_ref().map(Url::as_str)
    }

    /// Scheme, host and port of the request URL. The client's `Origin` header is available
    /// through [`RequestContext::get`].
    pub fn origin(&self) -> Option<String> {
        self.url
            .as_ref()
            .map(|url| url.origin().ascii_serialization())
    }

    pub fn query(&self) -> &HashMap<String, String> {
        &self.query
    }

    pub fn query_param(&self, name: &str) -> Option<&str> {
        self.query.get(name).map(String::as_str)
    }

    /// Deserializes the query string into `T`.
    pub fn query_as<T>(&self) -> Result<T, serde_urlencoded::de::Error>
    where
        T: DeserializeOwned,
    {
        let query = self.url.as_ref().and_then(Url::query).unwrap_or("");
        serde_urlencoded::from_str(query)
    }

    pub fn auth(&self) -> Option<&Credentials> {
        self.auth.as_ref()
    }

    pub fn domain_name(&self) -> Option<&str> {
        self.domain_name.as_deref()
    }

    pub fn subdomain(&self) -> Option<&str> {
        self.subdomain.as_deref()
    }

    pub fn cookies(&self) -> &HashMap<String, CookieValue> {
        &self.cookies
    }

    pub fn cookie(&self, name: &str) -> Option<&CookieValue> {
        self.cookies.get(name)
    }

    pub fn ips(&self) -> &[String] {
        &self.ips
    }

    pub fn ip(&self) -> Option<&str> {
        self.ips.first().map(String::as_str)
    }

    pub fn referer(&self) -> Option<Cow<'r, str>> {
        self.raw
            .header("referer")
            .or_else(|| self.raw.header("referrer"))
    }

    pub fn keep_alive(&self) -> bool {
        self.raw
            .header("connection")
            .is_some_and(|value| value.trim().eq_ignore_ascii_case("keep-alive"))
    }

    pub fn xhr(&self) -> bool {
        self.raw
            .header("x-requested-with")
            .is_some_and(|value| value.trim().eq_ignore_ascii_case("xmlhttprequest"))
    }

    /// Media type of the request body without parameters.
    pub fn content_type(&self) -> Option<String> {
        self.raw.header("content-type").and_then(|value| {
            value
                .split(';')
                .next()
                .map(str::trim)
                .filter(|media_type| !media_type.is_empty())
                .map(str::to_string)
        })
    }

    /// Charset of the request body, falling back to the most preferred response charset.
    pub fn charset(&self) -> Option<String> {
        self.raw
            .header("content-type")
            .and_then(|value| content_type_charset(&value).map(str::to_string))
            .or_else(|| self.charsets().first().cloned())
    }

    /// Declared body length; 0 when absent or malformed.
    pub fn length(&self) -> u64 {
        self.raw
            .header("content-length")
            .and_then(|value| value.trim().parse().ok())
            .unwrap_or(0)
    }

    pub fn accepts(&self) -> &[String] {
        self.accepts
            .get_or_init(|| parse_negotiation(self.raw.header("accept").as_deref()))
    }

    pub fn accept(&self) -> Option<&str> {
        self.accepts().first().map(String::as_str)
    }

    pub fn langs(&self) -> &[String] {
        self.langs
            .get_or_init(|| parse_negotiation(self.raw.header("accept-language").as_deref()))
    }

    pub fn lang(&self) -> Option<&str> {
        self.langs().first().map(String::as_str)
    }

    pub fn charsets(&self) -> &[String] {
        self.charsets
            .get_or_init(|| parse_negotiation(self.raw.header("accept-charset").as_deref()))
    }

    pub fn encodings(&self) -> &[String] {
        &self.encodings
    }

    pub fn encoding(&self) -> Option<&str> {
        self.encodings.first().map(String::as_str)
    }

    /// Request `Cache-Control`: `None` for `no-cache` or an absent header.
    pub fn cache(&self) -> Option<&CacheControl> {
        self.cache
            .get_or_init(|| CacheControl::parse(self.raw.header("cache-control").as_deref()))
            .as_ref()
    }

    /// Returns the first pattern matching the body media type.
    ///
    /// Patterns may be extensions (`json`), full types (`text/html`), wildcards
    /// (`application/*`) or suffixes (`+json`).
    pub fn is<'p>(&self, types: &[&'p str]) -> Option<&'p str> {
        let actual = self.content_type()?.to_ascii_lowercase();
        types
            .iter()
            .copied()
            .find(|pattern| normalize_type(pattern).is_some_and(|expected| type_matches(&expected, &actual)))
    }

    pub(crate) fn snapshot(&self) -> RequestSnapshot {
        RequestSnapshot {
            method: self.method().to_string(),
            version: self.version(),
            validators: Validators {
                if_none_match: self.raw.header("if-none-match").map(Cow::into_owned),
                if_modified_since: self.raw.header("if-modified-since").map(Cow::into_owned),
                cache_control: self.raw.header("cache-control").map(Cow::into_owned),
            },
            referer: self.referer().map(Cow::into_owned),
        }
    }
}

fn first_listed(value: Option<&str>) -> Option<String> {
    value
        .and_then(|value| value.split(',').next())
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
}

/// First configured domain equal to `hostname` or ending it on a dot boundary.
fn split_domain(hostname: &str, domains: &[String]) -> Option<(String, String)> {
    let hostname = hostname.to_ascii_lowercase();
    domains.iter().find_map(|domain| {
        let domain = domain.trim().to_ascii_lowercase();
        if hostname == domain {
            return Some((domain, String::new()));
        }
        let prefix = hostname.strip_suffix(domain.as_str())?.strip_suffix('.')?;
        (!prefix.is_empty()).then(|| (domain.clone(), prefix.to_string()))
    })
}

fn content_type_charset(value: &str) -> Option<&str> {
    value.split(';').skip(1).find_map(|param| {
        let (name, value) = param.split_once('=')?;
        name.trim()
            .eq_ignore_ascii_case("charset")
            .then(|| value.trim().trim_matches('"'))
    })
}

fn normalize_type(pattern: &str) -> Option<String> {
    let pattern = pattern.trim().to_ascii_lowercase();
    match pattern.as_str() {
        "urlencoded" => Some("application/x-www-form-urlencoded".to_string()),
        "multipart" => Some("multipart/*".to_string()),
        _ if pattern.starts_with('+') => Some(format!("*/*{pattern}")),
        _ if pattern.contains('/') => Some(pattern),
        _ => mime::lookup(&pattern).map(str::to_string),
    }
}

fn type_matches(expected: &str, actual: &str) -> bool {
    let (Some((expected_type, expected_sub)), Some((actual_type, actual_sub))) =
        (expected.split_once('/'), actual.split_once('/'))
    else {
        return false;
    };

    if expected_type != "*" && expected_type != actual_type {
        return false;
    }

    if let Some(suffix) = expected_sub.strip_prefix("*+") {
        return actual_sub.len() > suffix.len()
            && actual_sub.ends_with(suffix)
            && actual_sub[..actual_sub.len() - suffix.len()].ends_with('+');
    }

    expected_sub == "*" || expected_sub == actual_sub
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::{request_builder, Method};
    use crate::transport::ConnectionInfo;
    use http::Request;

    fn request(headers: &[(&str, &str)], uri: &str) -> Request<()> {
        let mut builder = request_builder().method(Method::GET).uri(uri);
        for (name, value) in headers {
            builder = builder.header(*name, *value);
        }
        let mut request = builder.body(()).expect("request");
        ConnectionInfo::insert(
            &mut request,
            ConnectionInfo {
                peer_addr: Some("192.0.2.10:51000".parse().unwrap()),
                encrypted: false,
            },
        );
        request
    }

    #[test]
    fn derives_url_fields_from_host_and_path() {
        let raw = request(&[("host", "example.com:8080")], "/docs/intro?lang=en&x=1");
        let ctx = RequestContext::build(&ExchangeConfig::default(), &raw);

        assert_eq!(ctx.protocol(), "http");
        assert!(!ctx.secure());
        assert_eq!(ctx.host(), Some("example.com:8080"));
        assert_eq!(ctx.hostname(), Some("example.com"));
        assert_eq!(ctx.port(), Some(8080));
        assert_eq!(ctx.pathname(), Some("/docs/intro"));
        assert_eq!(ctx.search(), Some("?lang=en&x=1"));
        assert_eq!(ctx.path(), Some("/docs/intro?lang=en&x=1"));
        assert_eq!(ctx.href(), Some("http://example.com:8080/docs/intro?lang=en&x=1"));
        assert_eq!(ctx.origin().as_deref(), Some("http://example.com:8080"));
        assert_eq!(ctx.query_param("lang"), Some("en"));
    }

    #[test]
    fn search_is_empty_without_query() {
        let raw = request(&[("host", "example.com")], "/");
        let ctx = RequestContext::build(&ExchangeConfig::default(), &raw);
        assert_eq!(ctx.search(), Some(""));
        assert_eq!(ctx.port(), Some(80));
        assert!(ctx.query().is_empty());
    }

    #[test]
    fn origin_follows_request_url_not_origin_header() {
        let raw = request(
            &[("host", "api.example.com"), ("origin", "https://app.example.com")],
            "/x",
        );
        let ctx = RequestContext::build(&ExchangeConfig::default(), &raw);
        assert_eq!(ctx.origin().as_deref(), Some("http://api.example.com"));
        assert_eq!(ctx.href(), Some("http://api.example.com/x"));
        assert_eq!(ctx.get("origin").as_deref(), Some("https://app.example.com"));
    }

    #[test]
    fn split_cookie_and_accept_fields_are_all_read() {
        let raw = request(
            &[
                ("host", "example.com"),
                ("cookie", "a=s%3A1"),
                ("cookie", "b=s%3A2"),
                ("accept", "text/html"),
                ("accept", "application/json;q=0.5"),
            ],
            "/",
        );
        let ctx = RequestContext::build(&ExchangeConfig::default(), &raw);
        assert_eq!(ctx.cookie("a"), Some(&CookieValue::from("1")));
        assert_eq!(ctx.cookie("b"), Some(&CookieValue::from("2")));
        assert_eq!(ctx.accepts(), ["text/html", "application/json"]);
    }

    #[test]
    fn non_ascii_cookie_pair_keeps_the_others() {
        let mut raw = request(&[("host", "example.com")], "/");
        raw.headers_mut().insert(
            "cookie",
            http::HeaderValue::from_bytes("a=s%3A1; b=Zoë".as_bytes()).expect("obs-text value"),
        );
        let ctx = RequestContext::build(&ExchangeConfig::default(), &raw);
        assert_eq!(ctx.cookie("a"), Some(&CookieValue::from("1")));
        assert_eq!(ctx.cookie("b"), Some(&CookieValue::from("Zoë")));
    }

    #[test]
    fn missing_host_degrades_url_fields_only() {
        let raw = request(&[("accept", "text/html")], "/path");
        let ctx = RequestContext::build(&ExchangeConfig::default(), &raw);
        assert_eq!(ctx.host(), None);
        assert_eq!(ctx.href(), None);
        assert_eq!(ctx.pathname(), None);
        assert_eq!(ctx.accepts(), ["text/html".to_string()]);
        assert_eq!(ctx.ip(), Some("192.0.2.10"));
    }

    #[test]
    fn malformed_host_degrades_url_fields_only() {
        let raw = request(&[("host", "exa mple.com"), ("cookie", "a=1")], "/");
        let ctx = RequestContext::build(&ExchangeConfig::default(), &raw);
        assert_eq!(ctx.host(), Some("exa mple.com"));
        assert!(ctx.url().is_none());
        assert_eq!(ctx.cookie("a"), Some(&CookieValue::Text("1".into())));
    }

    #[test]
    fn proxy_absent_without_forwarded_headers() {
        let raw = request(&[("host", "example.com")], "/");
        let ctx = RequestContext::build(&ExchangeConfig::default().with_use_proxy(true), &raw);
        assert!(ctx.proxy().is_none());
        assert_eq!(ctx.ips(), ["192.0.2.10".to_string()]);
    }

    #[test]
    fn trusted_proxy_overrides_protocol_and_host() {
        let raw = request(
            &[
                ("host", "internal:3000"),
                ("x-forwarded-proto", "https"),
                ("x-forwarded-host", "www.example.com"),
                ("x-forwarded-for", "203.0.113.5, 10.0.0.1"),
            ],
            "/login",
        );
        let ctx = RequestContext::build(&ExchangeConfig::default().with_use_proxy(true), &raw);

        let proxy = ctx.proxy().expect("proxy info");
        assert_eq!(proxy.ip.as_deref(), Some("203.0.113.5"));
        assert_eq!(ctx.protocol(), "https");
        assert!(ctx.secure());
        assert_eq!(ctx.host(), Some("www.example.com"));
        assert_eq!(ctx.href(), Some("https://www.example.com/login"));
        assert_eq!(ctx.ips(), ["203.0.113.5".to_string(), "10.0.0.1".to_string()]);
        assert_eq!(ctx.ip(), Some("203.0.113.5"));
    }

    #[test]
    fn untrusted_proxy_is_reported_but_not_used_for_origin() {
        let raw = request(
            &[
                ("host", "internal:3000"),
                ("x-forwarded-proto", "https"),
                ("x-forwarded-host", "www.example.com"),
            ],
            "/",
        );
        let ctx = RequestContext::build(&ExchangeConfig::default(), &raw);
        let proxy = ctx.proxy().expect("proxy info");
        assert_eq!(proxy.host.as_deref(), Some("www.example.com"));
        assert!(proxy.ips.is_empty());
        assert_eq!(ctx.protocol(), "http");
        assert_eq!(ctx.host(), Some("internal:3000"));
        assert_eq!(ctx.ip(), Some("192.0.2.10"));
    }

    #[test]
    fn encrypted_connection_is_https() {
        let mut raw = request(&[("host", "example.com"), ("x-forwarded-proto", "http")], "/");
        ConnectionInfo::insert(
            &mut raw,
            ConnectionInfo {
                peer_addr: None,
                encrypted: true,
            },
        );
        let ctx = RequestContext::build(&ExchangeConfig::default().with_use_proxy(true), &raw);
        assert_eq!(ctx.protocol(), "https");
        assert_eq!(ctx.port(), Some(443));
        assert!(ctx.ips().is_empty());
        assert_eq!(ctx.ip(), None);
    }

    #[test]
    fn authority_is_used_without_host_header() {
        let raw = request_builder()
            .uri("https://h2.example.com/stream")
            .version(Version::HTTP_2)
            .body(())
            .expect("request");
        let ctx = RequestContext::build(&ExchangeConfig::default(), &raw);
        assert_eq!(ctx.host(), Some("h2.example.com"));
        assert_eq!(ctx.pathname(), Some("/stream"));
    }

    #[test]
    fn basic_auth_is_decoded() {
        // dXNlcjpwYTpzcw== is "user:pa:ss"
        let raw = request(
            &[("host", "example.com"), ("authorization", "Basic dXNlcjpwYTpzcw==")],
            "/",
        );
        let ctx = RequestContext::build(&ExchangeConfig::default(), &raw);
        assert_eq!(
            ctx.auth(),
            Some(&Credentials {
                username: "user".into(),
                password: "pa:ss".into()
            })
        );
    }

    #[test]
    fn malformed_auth_is_absent() {
        for header in ["Basic !!!", "Bearer abc", "Basic dXNlcg=="] {
            let raw = request(&[("host", "example.com"), ("authorization", header)], "/");
            let ctx = RequestContext::build(&ExchangeConfig::default(), &raw);
            assert_eq!(ctx.auth(), None, "header {header}");
        }
    }

    #[test]
    fn url_userinfo_is_auth_fallback() {
        let raw = request(&[("host", "bob:s%40cret@example.com")], "/");
        let ctx = RequestContext::build(&ExchangeConfig::default(), &raw);
        let auth = ctx.auth().expect("credentials");
        assert_eq!(auth.username, "bob");
        assert_eq!(auth.password, "s@cret");
        assert_eq!(ctx.hostname(), Some("example.com"));
    }

    #[test]
    fn subdomain_from_first_matching_domain() {
        let config = ExchangeConfig::default()
            .with_domain("example.com")
            .with_domain("api.example.com");
        let raw = request(&[("host", "v1.api.example.com")], "/");
        let ctx = RequestContext::build(&config, &raw);
        assert_eq!(ctx.domain_name(), Some("example.com"));
        assert_eq!(ctx.subdomain(), Some("v1.api"));
    }

    #[test]
    fn exact_domain_has_empty_subdomain() {
        let config = ExchangeConfig::default().with_domain("example.com");
        let raw = request(&[("host", "example.com")], "/");
        let ctx = RequestContext::build(&config, &raw);
        assert_eq!(ctx.domain_name(), Some("example.com"));
        assert_eq!(ctx.subdomain(), Some(""));
    }

    #[test]
    fn domain_must_match_on_dot_boundary() {
        let config = ExchangeConfig::default().with_domain("example.com");
        let raw = request(&[("host", "badexample.com")], "/");
        let ctx = RequestContext::build(&config, &raw);
        assert_eq!(ctx.domain_name(), None);
        assert_eq!(ctx.subdomain(), None);
    }

    #[test]
    fn negotiation_lists_are_cached() {
        let raw = request(
            &[
                ("accept", "application/json, text/html;q=0.9, */*;q=0.5"),
                ("accept-language", "en-US, fr;q=0.4"),
                ("accept-charset", "utf-8, iso-8859-1;q=0.5"),
                ("accept-encoding", "gzip, br"),
            ],
            "/",
        );
        let ctx = RequestContext::build(&ExchangeConfig::default(), &raw);
        let first = ctx.accepts();
        let second = ctx.accepts();
        assert!(std::ptr::eq(first, second));
        assert_eq!(ctx.accept(), Some("application/json"));
        assert_eq!(ctx.lang(), Some("en-US"));
        assert_eq!(ctx.charsets()[1], "iso-8859-1");
        assert_eq!(ctx.encoding(), Some("gzip"));
        assert_eq!(ctx.encodings(), ["gzip".to_string(), "br".to_string()]);
    }

    #[test]
    fn cache_control_is_parsed() {
        let raw = request(&[("cache-control", "max-age=120")], "/");
        let ctx = RequestContext::build(&ExchangeConfig::default(), &raw);
        assert_eq!(ctx.cache(), Some(&CacheControl::MaxAge(120)));

        let raw = request(&[("cache-control", "no-cache")], "/");
        let ctx = RequestContext::build(&ExchangeConfig::default(), &raw);
        assert_eq!(ctx.cache(), None);
    }

    #[test]
    fn body_metadata_accessors() {
        let raw = request(
            &[
                ("content-type", "application/vnd.api+json; charset=latin1"),
                ("content-length", "42"),
                ("connection", "Keep-Alive"),
                ("x-requested-with", "XMLHttpRequest"),
                ("referer", "https://example.com/prev"),
            ],
            "/",
        );
        let ctx = RequestContext::build(&ExchangeConfig::default(), &raw);
        assert_eq!(ctx.content_type().as_deref(), Some("application/vnd.api+json"));
        assert_eq!(ctx.charset().as_deref(), Some("latin1"));
        assert_eq!(ctx.length(), 42);
        assert!(ctx.keep_alive());
        assert!(ctx.xhr());
        assert_eq!(ctx.referer().as_deref(), Some("https://example.com/prev"));
        assert_eq!(ctx.is(&["html", "+json"]), Some("+json"));
        assert_eq!(ctx.is(&["application/*"]), Some("application/*"));
        assert_eq!(ctx.is(&["json"]), None);
    }

    #[test]
    fn charset_falls_back_to_negotiated() {
        let raw = request(&[("accept-charset", "utf-8")], "/");
        let ctx = RequestContext::build(&ExchangeConfig::default(), &raw);
        assert_eq!(ctx.charset().as_deref(), Some("utf-8"));
        assert_eq!(ctx.length(), 0);
        assert!(!ctx.keep_alive());
        assert!(!ctx.xhr());
        assert_eq!(ctx.is(&["json"]), None);
    }

    #[test]
    fn query_deserializes_into_struct() {
        #[derive(Debug, serde::Deserialize, PartialEq)]
        struct Page {
            page: u32,
        }
        let raw = request(&[("host", "example.com")], "/items?page=3");
        let ctx = RequestContext::build(&ExchangeConfig::default(), &raw);
        assert_eq!(ctx.query_as::<Page>().expect("query"), Page { page: 3 });
    }

    #[test]
    fn signed_cookies_are_verified() {
        let signed = crate::signature::sign("s:alice", "k");
        let header = format!("user={}; plain=s%3Abob", signed.replace('+', "%2B").replace('/', "%2F"));
        let raw = request(&[("cookie", header.as_str())], "/");
        let ctx = RequestContext::build(&ExchangeConfig::default().with_cookie_secret("k"), &raw);
        assert_eq!(ctx.cookie("user"), Some(&CookieValue::Text("alice".into())));
        assert_eq!(ctx.cookie("plain"), Some(&CookieValue::Text("bob".into())));
    }
}
