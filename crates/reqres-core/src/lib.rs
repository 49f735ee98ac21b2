//! Per-exchange request and response contexts layered over a raw HTTP transport.

pub mod cache;
pub mod config;
pub mod cookie;
pub mod enhance;
pub mod error;
pub mod freshness;
pub mod headers;
pub mod http;
pub mod mime;
pub mod negotiation;
pub mod payload;
pub mod request;
pub mod response;
pub mod signature;
pub mod sniff;
pub mod transport;

pub use cache::CacheControl;
pub use config::{ConfigLoader, ExchangeConfig, Jsonp};
pub use cookie::{CookieJar, CookieOptions, CookieValue, SameSite};
pub use enhance::{Enhancer, Exchange};
pub use error::ExchangeError;
pub use headers::{HeaderField, HeaderTable};
pub use payload::Payload;
pub use request::{Credentials, ProxyInfo, RequestContext};
pub use response::ResponseContext;
pub use transport::{BufferedTransport, ConnectionInfo, RawRequest, Transport};
