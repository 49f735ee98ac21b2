use std::fs;
use std::path::Path;
use std::sync::Arc;

use bytes::Bytes;
use chrono::{DateTime, Utc};

use crate::cache::{format_cache_control, CacheControl};
use crate::config::ExchangeConfig;
use crate::cookie::{CookieJar, CookieOptions, CookieValue};
use crate::error::ExchangeError;
use crate::freshness::{entity_tag, is_fresh};
use crate::headers::{capitalize, parse_http_date, HeaderField, HeaderTable};
use crate::http::{is_multiplexed, reason_phrase, StatusCode};
use crate::mime;
use crate::payload::Payload;
use crate::request::RequestSnapshot;
use crate::sniff::{self, APPLICATION_JSON, TEXT_PLAIN};
use crate::transport::Transport;

const APPLICATION_JAVASCRIPT: &str = "application/javascript";
const APPLICATION_OCTET_STREAM: &str = "application/octet-stream";
const DEFAULT_CHARSET: &str = "UTF-8";
const DEFAULT_REALM: &str = "HTTP Authentication";

/// Mutable view over one outbound response.
///
/// Every header write lands in [`ResponseContext::headers`] and is mirrored to the borrowed
/// [`Transport`] at once. Cookies are queued and emitted as `Set-Cookie` lines when the response
/// is finalized.
pub struct ResponseContext<'t> {
    transport: &'t mut dyn Transport,
    config: Arc<ExchangeConfig>,
    request: RequestSnapshot,
    headers: HeaderTable,
    cookies: CookieJar,
    code: u16,
    message: Option<String>,
    charset_hint: Option<String>,
    jsonp: Option<String>,
    finished: bool,
}

impl<'t> ResponseContext<'t> {
    pub(crate) fn new(
        transport: &'t mut dyn Transport,
        config: Arc<ExchangeConfig>,
        request: RequestSnapshot,
    ) -> Self {
        Self {
            transport,
            config,
            request,
            headers: HeaderTable::new(),
            cookies: CookieJar::new(),
            code: StatusCode::OK.as_u16(),
            message: reason_phrase(200).map(str::to_string),
            charset_hint: None,
            jsonp: None,
            finished: false,
        }
    }

    pub fn headers(&self) -> &HeaderTable {
        &self.headers
    }

    pub fn get(&self, name: &str) -> Option<&HeaderField> {
        self.headers.get(name)
    }

    pub fn has(&self, name: &str) -> bool {
        self.headers.contains(name)
    }

    /// Replaces a header and mirrors it to the transport.
    pub fn set<V>(&mut self, name: &str, value: V)
    where
        V: Into<HeaderField>,
    {
        let wire = self.wire_name(name);
        let field = self.headers.insert(name, value.into());
        self.transport.set_header(&wire, field);
    }

    /// Adds values after the existing ones and mirrors the combined field.
    pub fn append<V>(&mut self, name: &str, value: V)
    where
        V: Into<HeaderField>,
    {
        let wire = self.wire_name(name);
        let field = self.headers.append(name, value.into());
        self.transport.set_header(&wire, field);
    }

    pub fn remove(&mut self, name: &str) -> Option<HeaderField> {
        let removed = self.headers.remove(name);
        if removed.is_some() {
            let wire = self.wire_name(name);
            self.transport.remove_header(&wire);
        }
        removed
    }

    pub fn cookies(&self) -> &CookieJar {
        &self.cookies
    }

    /// Queues a cookie with default attributes.
    pub fn cookie<V>(&mut self, name: &str, value: V)
    where
        V: Into<CookieValue>,
    {
        self.cookies.set(name, value.into(), CookieOptions::default());
    }

    /// Queues a cookie write; `None` queues a deletion.
    pub fn set_cookie(&mut self, name: &str, value: Option<CookieValue>, options: CookieOptions) {
        match value {
            Some(value) => self.cookies.set(name, value, options),
            None => self.cookies.clear(name, options),
        }
    }

    pub fn clear_cookie(&mut self, name: &str, options: CookieOptions) {
        self.cookies.clear(name, options);
    }

    pub fn code(&self) -> u16 {
        self.code
    }

    /// Reason phrase; always `None` over HTTP/2 and later.
    pub fn message(&self) -> Option<&str> {
        if is_multiplexed(self.request.version) {
            return None;
        }
        self.message.as_deref()
    }

    /// Status line as `"<code> <message>"`, or the bare code when there is no message.
    pub fn status(&self) -> String {
        match self.message() {
            Some(message) if !message.is_empty() => format!("{} {message}", self.code),
            _ => self.code.to_string(),
        }
    }

    /// Sets the code alone, keeping the current message.
    pub fn set_code(&mut self, code: u16) -> Result<(), ExchangeError> {
        self.code = validate_code(code)?;
        Ok(())
    }

    pub fn set_message(&mut self, message: impl Into<String>) {
        self.message = Some(message.into());
    }

    /// Sets the code together with its canonical reason phrase.
    pub fn set_status(&mut self, code: u16) -> Result<(), ExchangeError> {
        self.code = validate_code(code)?;
        self.message = reason_phrase(code).map(str::to_string);
        Ok(())
    }

    /// Parses `"404 Not Found"` or a bare `"404"`.
    pub fn set_status_line(&mut self, line: &str) -> Result<(), ExchangeError> {
        let line = line.trim();
        let (code, message) = match line.split_once(' ') {
            Some((code, message)) => (code, Some(message.trim())),
            None => (line, None),
        };
        let code = code
            .parse::<u16>()
            .map_err(|_| ExchangeError::invalid_status(line))?;
        self.code = validate_code(code)?;
        self.message = match message {
            Some(message) => Some(message.to_string()),
            None => reason_phrase(code).map(str::to_string),
        };
        Ok(())
    }

    /// Media type of `Content-Type` without parameters.
    pub fn content_type(&self) -> Option<&str> {
        self.headers
            .get_str("content-type")
            .and_then(|value| value.split(';').next())
            .map(str::trim)
            .filter(|value| !value.is_empty())
    }

    /// Sets the media type, keeping the current charset. Bare extensions such as `json` are
    /// resolved through the media type table.
    pub fn set_type(&mut self, value: &str) {
        let value = value.trim();
        if value.contains(';') {
            self.set("content-type", value);
            return;
        }
        let media_type = if value.contains('/') {
            value
        } else {
            mime::lookup(value).unwrap_or(APPLICATION_OCTET_STREAM)
        };
        let charset = self.charset().map(str::to_string);
        self.write_content_type(media_type, charset.as_deref());
    }

    pub fn charset(&self) -> Option<&str> {
        self.headers
            .get_str("content-type")
            .and_then(|value| {
                value.split(';').skip(1).find_map(|param| {
                    let (name, value) = param.split_once('=')?;
                    name.trim()
                        .eq_ignore_ascii_case("charset")
                        .then(|| value.trim().trim_matches('"'))
                })
            })
            .or(self.charset_hint.as_deref())
    }

    /// Sets or removes the charset, keeping the current media type. Without a media type the
    /// charset is held until one is set.
    pub fn set_charset(&mut self, charset: Option<&str>) {
        self.charset_hint = charset.map(str::to_string);
        if let Some(media_type) = self.content_type().map(str::to_string) {
            self.write_content_type(&media_type, charset);
        }
    }

    pub fn length(&self) -> Option<u64> {
        self.headers
            .get_str("content-length")
            .and_then(|value| value.trim().parse().ok())
    }

    pub fn set_length(&mut self, length: u64) {
        self.set("content-length", length);
    }

    pub fn encoding(&self) -> Option<&str> {
        self.headers.get_str("content-encoding")
    }

    pub fn set_encoding(&mut self, encoding: &str) {
        self.set("content-encoding", encoding);
    }

    pub fn date(&self) -> Option<DateTime<Utc>> {
        self.headers.get_str("date").and_then(parse_http_date)
    }

    pub fn set_date(&mut self, date: DateTime<Utc>) {
        self.set("date", date);
    }

    pub fn etag(&self) -> Option<&str> {
        self.headers.get_str("etag")
    }

    /// Sets `ETag`, quoting bare values.
    pub fn set_etag(&mut self, etag: &str) {
        let etag = etag.trim();
        if etag.starts_with('"') || etag.starts_with("W/\"") {
            self.set("etag", etag);
        } else {
            self.set("etag", format!("\"{etag}\""));
        }
    }

    pub fn last_modified(&self) -> Option<DateTime<Utc>> {
        self.headers
            .get_str("last-modified")
            .and_then(parse_http_date)
    }

    pub fn set_last_modified(&mut self, date: DateTime<Utc>) {
        self.set("last-modified", date);
    }

    pub fn location(&self) -> Option<&str> {
        self.headers.get_str("location")
    }

    pub fn set_location(&mut self, location: &str) {
        self.set("location", location);
    }

    pub fn refresh(&self) -> Option<&str> {
        self.headers.get_str("refresh")
    }

    /// Sets `Refresh` to a delay in seconds or a `"<seconds>; url=<target>"` value.
    pub fn set_refresh<V>(&mut self, value: V)
    where
        V: Into<HeaderField>,
    {
        self.set("refresh", value);
    }

    pub fn attachment(&self) -> Option<&str> {
        self.headers.get_str("content-disposition")
    }

    /// Marks the response as a download named `file_name` and types it from the extension.
    pub fn set_attachment(&mut self, file_name: &str) {
        if let Some(media_type) = mime::lookup(file_name) {
            self.set_type(media_type);
        }
        self.set("content-disposition", mime::content_disposition(file_name));
    }

    pub fn cache(&self) -> Option<CacheControl> {
        CacheControl::parse(self.headers.get_str("cache-control"))
    }

    /// `None` writes `no-cache`.
    pub fn set_cache(&mut self, cache: Option<CacheControl>) {
        self.set("cache-control", format_cache_control(cache.as_ref()));
    }

    pub fn vary(&self) -> Option<&HeaderField> {
        self.headers.get("vary")
    }

    pub fn set_vary<V>(&mut self, value: V)
    where
        V: Into<HeaderField>,
    {
        self.set("vary", value);
    }

    pub fn keep_alive(&self) -> bool {
        self.headers
            .get_str("connection")
            .is_some_and(|value| value.eq_ignore_ascii_case("keep-alive"))
    }

    pub fn set_keep_alive(&mut self, keep_alive: bool) {
        self.set("connection", if keep_alive { "keep-alive" } else { "close" });
    }

    pub fn jsonp(&self) -> Option<&str> {
        self.jsonp.as_deref()
    }

    /// Callback used to wrap JSON bodies; `None` turns wrapping off.
    pub fn set_jsonp(&mut self, callback: Option<String>) {
        self.jsonp = callback;
    }

    /// `false` only when a GET or HEAD request holds validators matching the current `ETag` or
    /// `Last-Modified` and the status is 2xx or 304.
    pub fn modified(&self) -> bool {
        if !matches!(self.request.method.as_str(), "GET" | "HEAD") {
            return true;
        }
        if (200..300).contains(&self.code) || self.code == 304 {
            return !is_fresh(
                &self.request.validators,
                self.etag(),
                self.headers.get_str("last-modified"),
            );
        }
        true
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Types, tags and finalizes the response with `payload`.
    pub fn send<P>(&mut self, payload: P) -> Result<(), ExchangeError>
    where
        P: Into<Payload>,
    {
        if self.finished {
            return Err(ExchangeError::Finalized);
        }

        let body = match payload.into() {
            _ if self.request.method == "HEAD" => return self.finish(None),
            Payload::Empty => return self.finish(None),
            Payload::Text(text) => {
                if self.content_type().is_none() {
                    self.set_type(sniff::sniff_text(&text));
                }
                self.default_charset();
                Bytes::from(text)
            }
            Payload::Binary(bytes) => {
                self.set("content-type", APPLICATION_OCTET_STREAM);
                bytes
            }
            Payload::Json(value) => {
                let json = serde_json::to_string(&value)?;
                let body = match self.jsonp.clone() {
                    Some(callback) => {
                        self.set_type(APPLICATION_JAVASCRIPT);
                        format!("{callback}({json});")
                    }
                    None => {
                        self.set_type(APPLICATION_JSON);
                        json
                    }
                };
                self.default_charset();
                Bytes::from(body)
            }
        };

        self.send_bytes(body)
    }

    /// Finalizes the response without a body.
    pub fn end(&mut self) -> Result<(), ExchangeError> {
        self.finish(None)
    }

    /// Sets `Location` and finalizes; `code` defaults to 302.
    pub fn redirect(&mut self, location: &str, code: Option<u16>) -> Result<(), ExchangeError> {
        self.set_status(code.unwrap_or(302))?;
        self.set_location(location);
        self.end()
    }

    /// Redirects to the request `Referer`, or `/` without one.
    pub fn redirect_back(&mut self, code: Option<u16>) -> Result<(), ExchangeError> {
        let location = self
            .request
            .referer
            .clone()
            .unwrap_or_else(|| "/".to_string());
        self.redirect(&location, code)
    }

    /// Answers 401 with a Basic challenge for `realm`.
    pub fn auth(&mut self, realm: Option<&str>) -> Result<(), ExchangeError> {
        let realm = realm.unwrap_or(DEFAULT_REALM);
        self.set_status(401)?;
        self.set("www-authenticate", format!("Basic realm=\"{realm}\""));
        self.end()
    }

    pub fn unauth(&mut self) -> Result<(), ExchangeError> {
        self.auth(None)
    }

    /// Sends a file from disk with `Last-Modified` taken from its metadata.
    ///
    /// When the file cannot be read the response is ended with 404 or 500 and the I/O error is
    /// returned.
    pub fn send_file<P>(&mut self, path: P) -> Result<(), ExchangeError>
    where
        P: AsRef<Path>,
    {
        let path = path.as_ref();
        if self.finished {
            return Err(ExchangeError::Finalized);
        }
        if self.content_type().is_none() {
            let media_type = path
                .file_name()
                .and_then(|name| name.to_str())
                .and_then(mime::lookup)
                .unwrap_or(TEXT_PLAIN);
            self.set_type(media_type);
        }

        let read = fs::metadata(path)
            .and_then(|metadata| metadata.modified())
            .and_then(|modified| fs::read(path).map(|contents| (contents, modified)));

        match read {
            Ok((contents, modified)) => {
                self.set_last_modified(DateTime::<Utc>::from(modified));
                self.send_bytes(Bytes::from(contents))
            }
            Err(source) => {
                log::warn!("failed to send file {}: {source}", path.display());
                let error = ExchangeError::file(path, source);
                self.remove("content-type");
                self.remove("content-disposition");
                self.set_status(error.status().as_u16())?;
                self.end()?;
                Err(error)
            }
        }
    }

    /// Sends a file as an attachment named `file_name`, or after the path when `None`.
    pub fn download<P>(&mut self, path: P, file_name: Option<&str>) -> Result<(), ExchangeError>
    where
        P: AsRef<Path>,
    {
        let path = path.as_ref();
        let name = file_name
            .map(str::to_string)
            .unwrap_or_else(|| path.to_string_lossy().into_owned());
        self.set_attachment(&name);
        self.send_file(path)
    }

    fn send_bytes(&mut self, body: Bytes) -> Result<(), ExchangeError> {
        self.set_length(body.len() as u64);
        self.set("etag", entity_tag(&body));

        if !self.modified() {
            self.set_status(304)?;
        }

        if self.code == 204 || self.code == 304 {
            self.remove("content-type");
            self.remove("content-length");
            self.remove("transfer-encoding");
            return self.finish(None);
        }

        if self.request.method == "HEAD" {
            return self.finish(None);
        }

        self.finish(Some(body))
    }

    fn finish(&mut self, body: Option<Bytes>) -> Result<(), ExchangeError> {
        if self.finished {
            return Err(ExchangeError::Finalized);
        }

        if !self.cookies.is_empty() {
            let lines = self
                .cookies
                .to_lines(self.config.cookie_secret(), Utc::now());
            self.append("set-cookie", lines);
        }

        let multiplexed = is_multiplexed(self.request.version);
        if multiplexed {
            self.remove("connection");
        }

        let message = if multiplexed {
            None
        } else {
            self.message.clone()
        };
        let charset = self.charset().map(str::to_string);

        self.transport.set_status(self.code, message.as_deref());
        let length = body.as_ref().map_or(0, Bytes::len);
        self.transport.finish(body, charset.as_deref());
        self.finished = true;

        tracing::debug!(
            status = self.code,
            bytes = length,
            cookies = self.cookies.len(),
            "response finalized"
        );
        Ok(())
    }

    fn default_charset(&mut self) {
        let textual = self.content_type().is_some_and(sniff::is_textual);
        if textual && self.charset().is_none() {
            self.set_charset(Some(DEFAULT_CHARSET));
        }
    }

    fn write_content_type(&mut self, media_type: &str, charset: Option<&str>) {
        match charset {
            Some(charset) => self.set("content-type", format!("{media_type}; charset={charset}")),
            None => self.set("content-type", media_type),
        }
    }

    fn wire_name(&self, name: &str) -> String {
        if self.config.capitalize {
            capitalize(name)
        } else {
            name.to_string()
        }
    }
}

fn validate_code(code: u16) -> Result<u16, ExchangeError> {
    StatusCode::from_u16(code)
        .map(|status| status.as_u16())
        .map_err(|_| ExchangeError::invalid_status(code.to_string()))
}
