//! Axum adapter that runs request/response exchanges behind a Hyper server.

mod dev_server;
mod request;
mod response;
mod service;

pub use dev_server::{run_app, AxumDevServer, AxumDevServerConfig};
pub use request::into_raw_request;
pub use response::into_axum_response;
pub use service::{dispatch, ExchangeHandler, ReqresAxumService};
