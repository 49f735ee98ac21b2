use std::convert::Infallible;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use axum::body::Body as AxumBody;
use axum::http::{Request, Response};
use bytes::Bytes;
use http::StatusCode;
use tower::Service;

use reqres_core::{BufferedTransport, Enhancer, ExchangeError, RequestContext, ResponseContext};

use crate::request::into_raw_request;
use crate::response::into_axum_response;

/// Application code run once per exchange.
///
/// A handler that returns without finalizing the response has it ended with whatever status and
/// headers it set.
pub trait ExchangeHandler: Send + Sync + 'static {
    fn handle(
        &self,
        req: &RequestContext<'_>,
        res: &mut ResponseContext<'_>,
        body: &Bytes,
    ) -> Result<(), ExchangeError>;
}

impl<F> ExchangeHandler for F
where
    F: Fn(&RequestContext<'_>, &mut ResponseContext<'_>, &Bytes) -> Result<(), ExchangeError>
        + Send
        + Sync
        + 'static,
{
    fn handle(
        &self,
        req: &RequestContext<'_>,
        res: &mut ResponseContext<'_>,
        body: &Bytes,
    ) -> Result<(), ExchangeError> {
        self(req, res, body)
    }
}

/// Runs `handler` against one buffered request and returns the recorded response.
pub fn dispatch<H>(enhancer: &Enhancer, handler: &H, raw: &Request<Bytes>) -> BufferedTransport
where
    H: ExchangeHandler + ?Sized,
{
    let mut transport = BufferedTransport::new();
    let mut exchange = enhancer.enhance(raw, &mut transport);

    if let Err(err) = handler.handle(&exchange.req, &mut exchange.res, raw.body()) {
        tracing::error!("handler failed: {err}");
        if !exchange.res.is_finished() {
            let reply = exchange
                .res
                .set_status(err.status().as_u16())
                .and_then(|()| exchange.res.send(err.to_string()));
            if let Err(err) = reply {
                tracing::error!("failed to send error response: {err}");
            }
        }
    }

    if !exchange.res.is_finished() {
        if let Err(err) = exchange.res.end() {
            tracing::error!("failed to finalize response: {err}");
        }
    }

    drop(exchange);
    transport
}

/// Tower service that runs an [`ExchangeHandler`] for every Axum/Hyper request.
pub struct ReqresAxumService<H> {
    enhancer: Enhancer,
    handler: Arc<H>,
}

impl<H> Clone for ReqresAxumService<H> {
    fn clone(&self) -> Self {
        Self {
            enhancer: self.enhancer.clone(),
            handler: Arc::clone(&self.handler),
        }
    }
}

impl<H> ReqresAxumService<H>
where
    H: ExchangeHandler,
{
    pub fn new(enhancer: Enhancer, handler: H) -> Self {
        Self {
            enhancer,
            handler: Arc::new(handler),
        }
    }

    pub fn enhancer(&self) -> &Enhancer {
        &self.enhancer
    }
}

impl<F> ReqresAxumService<F>
where
    F: Fn(&RequestContext<'_>, &mut ResponseContext<'_>, &Bytes) -> Result<(), ExchangeError>
        + Send
        + Sync
        + 'static,
{
    /// Wraps a closure; its argument types are inferred from this signature.
    pub fn from_fn(enhancer: Enhancer, handler: F) -> Self {
        Self::new(enhancer, handler)
    }
}

impl<H> Service<Request<AxumBody>> for ReqresAxumService<H>
where
    H: ExchangeHandler,
{
    type Response = Response<AxumBody>;
    type Error = Infallible;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, request: Request<AxumBody>) -> Self::Future {
        let enhancer = self.enhancer.clone();
        let handler = Arc::clone(&self.handler);
        Box::pin(async move {
            let raw = match into_raw_request(request).await {
                Ok(raw) => raw,
                Err(e) => {
                    let mut err_response = Response::new(AxumBody::from(e));
                    *err_response.status_mut() = StatusCode::INTERNAL_SERVER_ERROR;
                    return Ok(err_response);
                }
            };

            // Handlers may read files synchronously through `send_file`.
            let exchange =
                tokio::task::spawn_blocking(move || dispatch(&enhancer, handler.as_ref(), &raw));
            match exchange.await {
                Ok(transport) => Ok(into_axum_response(transport)),
                Err(err) => {
                    tracing::error!("exchange task failed: {err}");
                    let mut err_response = Response::new(AxumBody::from("exchange failed"));
                    *err_response.status_mut() = StatusCode::INTERNAL_SERVER_ERROR;
                    Ok(err_response)
                }
            }
        })
    }
}
