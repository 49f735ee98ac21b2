use std::net::SocketAddr;

use axum::body::Body as AxumBody;
use axum::extract::connect_info::ConnectInfo;
use axum::http::Request;
use bytes::Bytes;

use reqres_core::ConnectionInfo;

/// Buffers an Axum/Hyper request and records the peer address as [`ConnectionInfo`] so the core
/// can read it through `RawRequest`.
pub async fn into_raw_request(request: Request<AxumBody>) -> Result<Request<Bytes>, String> {
    let (parts, body) = request.into_parts();
    let bytes = axum::body::to_bytes(body, usize::MAX)
        .await
        .map_err(|e| format!("Failed to convert body into bytes: {e}"))?;

    let mut raw = Request::from_parts(parts, bytes);

    let peer_addr = raw
        .extensions_mut()
        .remove::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr);

    ConnectionInfo::insert(
        &mut raw,
        ConnectionInfo {
            peer_addr,
            encrypted: false,
        },
    );

    Ok(raw)
}
