//! Boundary with the transport that owns the connection.
//!
//! The core reads the inbound request through [`RawRequest`] and writes the outbound response
//! through [`Transport`]. Both are borrowed for the lifetime of one exchange.

use std::borrow::Cow;
use std::net::{IpAddr, SocketAddr};

use bytes::Bytes;

use crate::error::ExchangeError;
use crate::headers::{HeaderField, HeaderTable};
use crate::http::{self as core_http, HeaderName, HeaderValue, Version};

/// Read access to an inbound request.
pub trait RawRequest {
    /// Case-insensitive header lookup.
    ///
    /// Repeated fields are combined into one value: `Cookie` fields are joined with `"; "`, every
    /// other field with `", "`. Bytes that are not UTF-8 are replaced rather than dropping the
    /// header.
    fn header(&self, name: &str) -> Option<Cow<'_, str>>;

    fn method(&self) -> &str;

    /// Request target as received: path plus query string.
    fn raw_path(&self) -> &str;

    /// Whether the connection itself is TLS-encrypted.
    fn is_encrypted(&self) -> bool;

    fn peer_addr(&self) -> Option<IpAddr>;

    fn version(&self) -> Version;

    /// HTTP/2 `:authority`, used when there is no `Host` header.
    fn authority(&self) -> Option<&str> {
        None
    }
}

/// Write access to an outbound response.
pub trait Transport {
    /// Replaces every value of `name` with `field`.
    fn set_header(&mut self, name: &str, field: &HeaderField);

    fn remove_header(&mut self, name: &str);

    /// Sets the status line; `reason` is `None` when the protocol carries no reason phrase.
    fn set_status(&mut self, code: u16, reason: Option<&str>);

    /// Ends the response with an optional payload and the charset it was encoded with.
    fn finish(&mut self, body: Option<Bytes>, charset: Option<&str>);
}

/// Connection metadata attached to `http::Request` extensions by adapters.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ConnectionInfo {
    pub peer_addr: Option<SocketAddr>,
    pub encrypted: bool,
}

impl ConnectionInfo {
    pub fn insert<B>(request: &mut http::Request<B>, info: ConnectionInfo) {
        request.extensions_mut().insert(info);
    }

    pub fn get<B>(request: &http::Request<B>) -> Option<&ConnectionInfo> {
        request.extensions().get::<ConnectionInfo>()
    }
}

impl<B> RawRequest for http::Request<B> {
    fn header(&self, name: &str) -> Option<Cow<'_, str>> {
        let mut values = self.headers().get_all(name).iter();
        let mut combined = String::from_utf8_lossy(values.next()?.as_bytes());
        let separator = if name.eq_ignore_ascii_case("cookie") {
            "; "
        } else {
            ", "
        };
        for value in values {
            let buffer = combined.to_mut();
            buffer.push_str(separator);
            buffer.push_str(&String::from_utf8_lossy(value.as_bytes()));
        }
        Some(combined)
    }

    fn method(&self) -> &str {
        http::Request::method(self).as_str()
    }

    fn raw_path(&self) -> &str {
        self.uri()
            .path_and_query()
            .map(|path| path.as_str())
            .unwrap_or("/")
    }

    fn is_encrypted(&self) -> bool {
        ConnectionInfo::get(self).is_some_and(|info| info.encrypted)
    }

    fn peer_addr(&self) -> Option<IpAddr> {
        ConnectionInfo::get(self)
            .and_then(|info| info.peer_addr)
            .map(|addr| addr.ip())
    }

    fn version(&self) -> Version {
        http::Request::version(self)
    }

    fn authority(&self) -> Option<&str> {
        self.uri().authority().map(|authority| authority.as_str())
    }
}

/// In-memory transport that records the response and can render it.
///
/// Header names keep the case they were written with, so the capitalization setting is visible
/// in [`BufferedTransport::head`].
#[derive(Debug)]
pub struct BufferedTransport {
    code: u16,
    reason: Option<String>,
    headers: Vec<(String, HeaderField)>,
    body: Option<Bytes>,
    charset: Option<String>,
    finished: bool,
}

impl Default for BufferedTransport {
    fn default() -> Self {
        Self {
            code: 200,
            reason: core_http::reason_phrase(200).map(str::to_string),
            headers: Vec::new(),
            body: None,
            charset: None,
            finished: false,
        }
    }
}

impl BufferedTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn status(&self) -> u16 {
        self.code
    }

    pub fn reason(&self) -> Option<&str> {
        self.reason.as_deref()
    }

    pub fn header(&self, name: &str) -> Option<&HeaderField> {
        self.headers
            .iter()
            .find(|(existing, _)| existing.eq_ignore_ascii_case(name))
            .map(|(_, field)| field)
    }

    /// Header names exactly as written.
    pub fn header_names(&self) -> Vec<&str> {
        self.headers.iter().map(|(name, _)| name.as_str()).collect()
    }

    pub fn body(&self) -> Option<&Bytes> {
        self.body.as_ref()
    }

    pub fn charset(&self) -> Option<&str> {
        self.charset.as_deref()
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// HTTP/1.1 status line and header block, terminated by an empty line.
    pub fn head(&self) -> String {
        let mut head = format!("HTTP/1.1 {}", self.code);
        if let Some(reason) = &self.reason {
            head.push(' ');
            head.push_str(reason);
        }
        head.push_str("\r\n");
        for (name, field) in &self.headers {
            for value in field.values() {
                head.push_str(name);
                head.push_str(": ");
                head.push_str(value);
                head.push_str("\r\n");
            }
        }
        head.push_str("\r\n");
        head
    }

    /// Converts the recorded response into an `http::Response`.
    pub fn into_response(self) -> Result<http::Response<Bytes>, ExchangeError> {
        let mut response = http::Response::new(self.body.unwrap_or_default());
        *response.status_mut() = core_http::StatusCode::from_u16(self.code)
            .map_err(|_| ExchangeError::invalid_status(self.code.to_string()))?;

        let mut table = HeaderTable::new();
        for (name, field) in self.headers {
            table.insert(&name, field);
        }
        for (name, field) in table.iter() {
            let header_name = HeaderName::from_bytes(name.as_bytes())
                .map_err(|_| ExchangeError::invalid_header(name))?;
            for value in field.values() {
                let header_value = HeaderValue::from_str(value)
                    .map_err(|_| ExchangeError::invalid_header(name))?;
                response
                    .headers_mut()
                    .append(header_name.clone(), header_value);
            }
        }

        Ok(response)
    }
}

impl Transport for BufferedTransport {
    fn set_header(&mut self, name: &str, field: &HeaderField) {
        match self
            .headers
            .iter_mut()
            .find(|(existing, _)| existing.eq_ignore_ascii_case(name))
        {
            Some(slot) => *slot = (name.to_string(), field.clone()),
            None => self.headers.push((name.to_string(), field.clone())),
        }
    }

    fn remove_header(&mut self, name: &str) {
        self.headers
            .retain(|(existing, _)| !existing.eq_ignore_ascii_case(name));
    }

    fn set_status(&mut self, code: u16, reason: Option<&str>) {
        self.code = code;
        self.reason = reason.map(str::to_string);
    }

    fn finish(&mut self, body: Option<Bytes>, charset: Option<&str>) {
        self.body = body;
        self.charset = charset.map(str::to_string);
        self.finished = true;
    }
}
