use axum::body::Body as AxumBody;
use axum::http::{HeaderValue, Response, StatusCode};
use tracing::error;

use reqres_core::BufferedTransport;

/// Converts a finalized [`BufferedTransport`] into a response Axum/Hyper can write.
///
/// A response whose recorded headers cannot be represented becomes a plain-text 500.
pub fn into_axum_response(transport: BufferedTransport) -> Response<AxumBody> {
    match transport.into_response() {
        Ok(response) => response.map(AxumBody::from),
        Err(err) => {
            error!("unrepresentable response: {err}");
            let mut response = Response::new(AxumBody::from("invalid response"));
            *response.status_mut() = StatusCode::INTERNAL_SERVER_ERROR;
            response.headers_mut().insert(
                axum::http::header::CONTENT_TYPE,
                HeaderValue::from_static("text/plain; charset=utf-8"),
            );
            response
        }
    }
}
