use std::net::{SocketAddr, TcpListener as StdTcpListener};

use anyhow::Context;
use axum::Router;
use simple_logger::SimpleLogger;
use tokio::runtime::Builder as RuntimeBuilder;
use tokio::signal;

use reqres_core::{ConfigLoader, Enhancer};

use crate::service::{ExchangeHandler, ReqresAxumService};

/// Configuration used when running the local server.
#[derive(Clone)]
pub struct AxumDevServerConfig {
    pub addr: SocketAddr,
    pub enable_ctrl_c: bool,
}

impl Default for AxumDevServerConfig {
    fn default() -> Self {
        Self {
            addr: SocketAddr::from(([127, 0, 0, 1], 8787)),
            enable_ctrl_c: true,
        }
    }
}

/// Blocking server runner that feeds every request through one [`ExchangeHandler`].
pub struct AxumDevServer<H> {
    service: ReqresAxumService<H>,
    config: AxumDevServerConfig,
}

impl<H> AxumDevServer<H>
where
    H: ExchangeHandler,
{
    pub fn new(service: ReqresAxumService<H>) -> Self {
        Self {
            service,
            config: AxumDevServerConfig::default(),
        }
    }

    pub fn with_config(service: ReqresAxumService<H>, config: AxumDevServerConfig) -> Self {
        Self { service, config }
    }

    pub fn run(self) -> anyhow::Result<()> {
        let runtime = RuntimeBuilder::new_multi_thread()
            .enable_all()
            .build()
            .context("failed to build tokio runtime")?;

        runtime.block_on(async move { self.run_async().await })
    }

    async fn run_async(self) -> anyhow::Result<()> {
        let AxumDevServer { service, config } = self;

        let listener = StdTcpListener::bind(config.addr)
            .with_context(|| format!("failed to bind server to {}", config.addr))?;
        listener
            .set_nonblocking(true)
            .context("failed to set listener to non-blocking")?;

        let listener = tokio::net::TcpListener::from_std(listener)
            .context("failed to adopt std listener into tokio")?;

        log::info!("listening on http://{}", config.addr);
        serve_with_listener(service, listener, config.enable_ctrl_c).await
    }

    #[cfg(test)]
    async fn run_with_listener(self, listener: tokio::net::TcpListener) -> anyhow::Result<()> {
        let AxumDevServer { service, config } = self;
        serve_with_listener(service, listener, config.enable_ctrl_c).await
    }
}

async fn serve_with_listener<H>(
    service: ReqresAxumService<H>,
    listener: tokio::net::TcpListener,
    enable_ctrl_c: bool,
) -> anyhow::Result<()>
where
    H: ExchangeHandler,
{
    let router = Router::new().fallback_service(service);
    let make_service = router.into_make_service_with_connect_info::<SocketAddr>();

    let server = axum::serve(listener, make_service);
    if enable_ctrl_c {
        let shutdown = async {
            let _ = signal::ctrl_c().await;
        };
        server
            .with_graceful_shutdown(shutdown)
            .await
            .context("axum server error")?;
    } else {
        server.await.context("axum server error")?;
    }

    Ok(())
}

/// Loads the TOML configuration, installs the logger it describes, and serves `handler`.
pub fn run_app<H>(config_src: &str, handler: H) -> anyhow::Result<()>
where
    H: ExchangeHandler,
{
    let loader = ConfigLoader::load_from_str(config_src).context("invalid configuration")?;
    let level = loader.config().logging.level_filter();

    SimpleLogger::new().with_level(level).init().ok();

    let service = ReqresAxumService::new(Enhancer::from_shared(loader.shared()), handler);
    AxumDevServer::new(service).run()
}


#[cfg(test)]
mod integration_tests {
    use super::*;
    use reqres_core::ExchangeConfig;
    use std::time::{Duration, Instant};
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpStream;

    struct TestServer {
        addr: SocketAddr,
        handle: tokio::task::JoinHandle<()>,
    }

    async fn start_test_server<H>(service: ReqresAxumService<H>) -> TestServer
    where
        H: ExchangeHandler,
    {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind test server");
        let addr = listener.local_addr().expect("local addr");
        let config = AxumDevServerConfig {
            addr,
            enable_ctrl_c: false,
        };
        let server = AxumDevServer::with_config(service, config);

        let handle = tokio::spawn(async move {
            let _ = server.run_with_listener(listener).await;
        });

        TestServer { addr, handle }
    }

    /// Sends a raw HTTP/1.1 request and returns the full response text.
    async fn send_with_retry(addr: SocketAddr, request: &str) -> String {
        let start = Instant::now();
        let timeout = Duration::from_secs(2);

        loop {
            match TcpStream::connect(addr).await {
                Ok(mut stream) => {
                    stream
                        .write_all(request.as_bytes())
                        .await
                        .expect("write request");
                    let mut response = Vec::new();
                    stream
                        .read_to_end(&mut response)
                        .await
                        .expect("read response");
                    return String::from_utf8_lossy(&response).into_owned();
                }
                Err(err) => {
                    if start.elapsed() >= timeout {
                        panic!("server did not respond before timeout: {}", err);
                    }
                }
            }

            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn server_reports_peer_address_and_cookies() {
        let enhancer = Enhancer::new(ExchangeConfig::default().with_domain("localhost"));
        let service = ReqresAxumService::from_fn(enhancer, |req, res, _body| {
            res.cookie("visited", "yes");
            res.send(format!(
                "ip={} subdomain={:?}",
                req.ip().unwrap_or("none"),
                req.subdomain()
            ))
        });
        let server = start_test_server(service).await;

        let response = send_with_retry(
            server.addr,
            "GET /who HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n",
        )
        .await;

        assert!(response.starts_with("HTTP/1.1 200 OK\r\n"), "{response}");
        assert!(response.to_ascii_lowercase().contains("set-cookie: visited=s%3ayes"));
        assert!(response.ends_with("ip=127.0.0.1 subdomain=Some(\"\")"), "{response}");

        server.handle.abort();
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn server_forwards_proxy_headers_when_trusted() {
        let enhancer = Enhancer::new(ExchangeConfig::default().with_use_proxy(true));
        let service = ReqresAxumService::from_fn(enhancer, |req, res, _body| {
            res.send(req.href().unwrap_or("none").to_string())
        });
        let server = start_test_server(service).await;

        let response = send_with_retry(
            server.addr,
            "GET /docs?page=2 HTTP/1.1\r\nHost: internal\r\nX-Forwarded-Proto: https\r\n\
             X-Forwarded-Host: www.example.com\r\nConnection: close\r\n\r\n",
        )
        .await;

        assert!(
            response.ends_with("https://www.example.com/docs?page=2"),
            "{response}"
        );

        server.handle.abort();
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn server_fails_to_bind_to_used_port() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").expect("bind first");
        let addr = listener.local_addr().expect("listener addr");

        let service = ReqresAxumService::from_fn(Enhancer::default(), |_req, res, _body| res.end());
        let config = AxumDevServerConfig {
            addr,
            enable_ctrl_c: false,
        };
        let server = AxumDevServer::with_config(service, config);

        let result = tokio::task::spawn_blocking(move || server.run()).await;

        match result {
            Ok(Err(e)) => {
                let err_str = e.to_string();
                assert!(
                    err_str.contains("bind") || err_str.contains("address"),
                    "expected bind error, got: {}",
                    err_str
                );
            }
            _ => panic!("expected bind error"),
        }

        drop(listener);
    }
}
