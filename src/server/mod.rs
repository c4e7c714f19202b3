pub mod bootstrap;
pub mod runtime;
mod state;

pub use state::GatewayState;

use crate::config::GatewayConfig;
use crate::proxy::envelope::{self, BoxBody};
use anyhow::Result;
use http_body_util::BodyExt;
use hyper::body::Incoming;
use hyper::service::service_fn;
use hyper::{Request, Response};
use hyper_util::rt::{TokioExecutor, TokioIo, TokioTimer};
use hyper_util::server::conn::auto;
use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::TcpListener;
use tracing::{error, info};

/// Per-request sequencing: admission first, dispatch second. A limiter
/// rejection is answered with the code-5000 envelope and never reaches
/// the router.
pub async fn handle(
    req: Request<BoxBody>,
    state: GatewayState,
    peer_addr: SocketAddr,
) -> Result<Response<BoxBody>, hyper::Error> {
    let client_ip = envelope::client_ip(req.headers(), peer_addr);

    if let Err(e) = state.limiter.admit(client_ip) {
        return Ok(envelope::json_error(&e.to_string()));
    }

    // admit() has already rejected a missing client IP.
    let Some(ip) = client_ip else {
        return Ok(envelope::json_error(
            &crate::error::GatewayError::ClientIpUnknown.to_string(),
        ));
    };

    Ok(state.dispatcher.serve(req, ip).await)
}

/// Accept loop: every path on the listener is served by the gateway
/// handler; each connection gets its own task.
pub async fn run(listen: SocketAddr, cfg: &GatewayConfig, state: GatewayState) -> Result<()> {
    let listener = TcpListener::bind(listen).await?;
    info!("server: gateway listening, addr={}", listen);

    let read_timeout = Duration::from_secs(cfg.read_timeout_secs);

    loop {
        let (stream, peer_addr) = match listener.accept().await {
            Ok(v) => v,
            Err(e) => {
                error!("server: accept failed, error={}", e);
                continue;
            }
        };

        let state = state.clone();
        tokio::spawn(async move {
            let io = TokioIo::new(stream);
            let state_inner = state.clone();
            let svc = service_fn(move |req: Request<Incoming>| {
                let state = state_inner.clone();
                async move { handle(req.map(BodyExt::boxed), state, peer_addr).await }
            });

            if let Err(e) = auto::Builder::new(TokioExecutor::new())
                .http1()
                .timer(TokioTimer::new())
                .header_read_timeout(read_timeout)
                .keep_alive(true)
                .http2()
                .timer(TokioTimer::new())
                .keep_alive_interval(Some(Duration::from_secs(20)))
                .serve_connection_with_upgrades(io, svc)
                .await
            {
                if !e.to_string().contains("connection closed") {
                    error!(
                        "server: connection error, peer={}, error={}",
                        peer_addr, e
                    );
                }
            }
        });
    }
}
