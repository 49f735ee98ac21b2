use std::sync::Arc;

use crate::config::ExchangeConfig;
use crate::request::RequestContext;
use crate::response::ResponseContext;
use crate::transport::{RawRequest, Transport};

/// Builds the request and response contexts for each exchange from one shared configuration.
#[derive(Clone, Debug)]
pub struct Enhancer {
    config: Arc<ExchangeConfig>,
}

/// The pair of contexts for one request/response exchange.
pub struct Exchange<'r, 't> {
    pub req: RequestContext<'r>,
    pub res: ResponseContext<'t>,
}

impl Enhancer {
    pub fn new(config: ExchangeConfig) -> Self {
        Self::from_shared(Arc::new(config))
    }

    pub fn from_shared(config: Arc<ExchangeConfig>) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ExchangeConfig {
        &self.config
    }

    /// Derives the request context and installs the response mutation surface.
    ///
    /// When JSONP is enabled and the query carries a usable callback under the configured
    /// parameter, the response's callback is preset.
    pub fn enhance<'r, 't>(
        &self,
        raw: &'r dyn RawRequest,
        transport: &'t mut dyn Transport,
    ) -> Exchange<'r, 't> {
        let req = RequestContext::build(&self.config, raw);
        let mut res = ResponseContext::new(transport, Arc::clone(&self.config), req.snapshot());

        if let Some(param) = self.config.jsonp_param() {
            match req.query_param(param) {
                Some(callback) if is_callback_name(callback) => {
                    res.set_jsonp(Some(callback.to_string()));
                }
                Some(callback) => {
                    log::debug!("ignoring jsonp callback {callback:?}: unsupported characters");
                }
                None => {}
            }
        }

        tracing::trace!(method = req.method(), path = ?req.path(), "exchange enhanced");
        Exchange { req, res }
    }
}

impl Default for Enhancer {
    fn default() -> Self {
        Self::new(ExchangeConfig::default())
    }
}

/// JavaScript identifier-ish callback names: ASCII alphanumerics, `_`, `$` and `.`.
pub fn is_callback_name(name: &str) -> bool {
    !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '$' | '.'))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Jsonp;
    use crate::http::request_builder;
    use crate::transport::BufferedTransport;

    fn raw(uri: &str) -> http::Request<()> {
        request_builder()
            .uri(uri)
            .header("host", "example.com")
            .body(())
            .expect("request")
    }

    #[test]
    fn callback_names() {
        assert!(is_callback_name("cb"));
        assert!(is_callback_name("$.jQuery_123"));
        assert!(!is_callback_name(""));
        assert!(!is_callback_name("alert(1)"));
        assert!(!is_callback_name("a b"));
    }

    #[test]
    fn jsonp_is_preset_from_query() {
        let enhancer = Enhancer::new(ExchangeConfig::default().with_jsonp(Jsonp::enabled()));
        let request = raw("/data?jsonp=handle");
        let mut transport = BufferedTransport::new();
        let exchange = enhancer.enhance(&request, &mut transport);
        assert_eq!(exchange.res.jsonp(), Some("handle"));
    }

    #[test]
    fn custom_jsonp_param_is_honored() {
        let enhancer = Enhancer::new(
            ExchangeConfig::default().with_jsonp(Jsonp::Param("callback".into())),
        );
        let request = raw("/data?jsonp=wrong&callback=right");
        let mut transport = BufferedTransport::new();
        let exchange = enhancer.enhance(&request, &mut transport);
        assert_eq!(exchange.res.jsonp(), Some("right"));
    }

    #[test]
    fn unsafe_or_disabled_jsonp_is_ignored() {
        let request = raw("/data?jsonp=alert(document.cookie)");
        let mut transport = BufferedTransport::new();
        let enhancer = Enhancer::new(ExchangeConfig::default().with_jsonp(Jsonp::enabled()));
        let exchange = enhancer.enhance(&request, &mut transport);
        assert_eq!(exchange.res.jsonp(), None);

        let request = raw("/data?jsonp=handle");
        let mut transport = BufferedTransport::new();
        let exchange = Enhancer::default().enhance(&request, &mut transport);
        assert_eq!(exchange.res.jsonp(), None);
    }

    #[test]
    fn contexts_share_configuration() {
        let config = Arc::new(ExchangeConfig::default().with_domain("example.com"));
        let enhancer = Enhancer::from_shared(Arc::clone(&config));
        let request = raw("/");
        let mut transport = BufferedTransport::new();
        let exchange = enhancer.enhance(&request, &mut transport);
        assert_eq!(exchange.req.subdomain(), Some(""));
        assert_eq!(enhancer.config().domain, config.domain);
    }
}
