// src/proxy/server.rs

//! Front-door HTTP server and the per-request retry loop.

use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use http::header::{HeaderValue, CONTENT_TYPE};
use http::{Request, Response, StatusCode};
use http_body_util::combinators::BoxBody;
use http_body_util::{BodyExt, Full};
use hyper::body::Incoming;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper_util::rt::TokioIo;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{mpsc, oneshot};
use tokio::time::{sleep_until, timeout_at, Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::config::ProxySection;
use crate::engine::{RequestAck, RuntimeEvent};
use crate::errors::{RelaunchError, Result};
use crate::proxy::forward::{strip_hop_by_hop, BufferedRequest, Forwarded, Forwarder};
use crate::proxy::mode::{ModeReader, ProxyMode};

/// Body of every response the proxy writes.
pub type ProxyBody = BoxBody<Bytes, hyper::Error>;

/// Body of the 502 sent when the app never became reachable.
pub const TIMEOUT_BODY: &str = "Connection Refused";

/// Shared by every request handler.
#[derive(Debug)]
struct ProxyState {
    events: mpsc::Sender<RuntimeEvent>,
    modes: ModeReader,
    forwarder: Forwarder,
    timeout: Duration,
    poll_interval: Duration,
}

/// A bound, not yet serving, proxy listener.
#[derive(Debug)]
pub struct ProxyServer {
    listener: TcpListener,
    local_addr: SocketAddr,
    state: Arc<ProxyState>,
}

/// Bind the proxy socket. Nothing is served until [`ProxyServer::serve`].
pub async fn bind(
    proxy: &ProxySection,
    events: mpsc::Sender<RuntimeEvent>,
    modes: ModeReader,
) -> Result<ProxyServer> {
    let addr = resolve(&proxy.host, proxy.proxy_port).await?;
    let listener = TcpListener::bind(addr)
        .await
        .map_err(|source| RelaunchError::ListenError { addr, source })?;
    let local_addr = listener.local_addr()?;

    let state = Arc::new(ProxyState {
        events,
        modes,
        forwarder: Forwarder::new(&proxy.app_host, proxy.app_port),
        timeout: proxy.timeout(),
        poll_interval: proxy.poll_interval(),
    });

    info!(
        addr = %local_addr,
        app = %format!("{}:{}", proxy.app_host, proxy.app_port),
        "proxy listening"
    );

    Ok(ProxyServer {
        listener,
        local_addr,
        state,
    })
}

async fn resolve(host: &str, port: u16) -> Result<SocketAddr> {
    let mut addrs = tokio::net::lookup_host((host, port))
        .await
        .map_err(|e| RelaunchError::ConfigError(format!("cannot resolve proxy host '{host}': {e}")))?;
    addrs
        .next()
        .ok_or_else(|| RelaunchError::ConfigError(format!("proxy host '{host}' resolved to nothing")))
}

impl ProxyServer {
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Accept connections until the task is dropped or aborted.
    pub async fn serve(self) -> Result<()> {
        loop {
            match self.listener.accept().await {
                Ok((stream, peer)) => {
                    tokio::spawn(serve_connection(stream, peer, Arc::clone(&self.state)));
                }
                Err(e) => warn!(error = %e, "accept failed"),
            }
        }
    }
}

async fn serve_connection(stream: TcpStream, peer: SocketAddr, state: Arc<ProxyState>) {
    let io = TokioIo::new(stream);
    let service = service_fn(move |req: Request<Incoming>| handle_request(Arc::clone(&state), peer, req));

    // A client that disconnects mid-request drops the handler future here.
    if let Err(e) = http1::Builder::new().serve_connection(io, service).await {
        debug!(%peer, error = %e, "connection ended with error");
    }
}

async fn handle_request(
    state: Arc<ProxyState>,
    peer: SocketAddr,
    req: Request<Incoming>,
) -> std::result::Result<Response<ProxyBody>, Infallible> {
    let deadline = Instant::now() + state.timeout;
    let (parts, body) = req.into_parts();
    debug!(method = %parts.method, uri = %parts.uri, %peer, "request");

    let (ack_tx, ack_rx) = oneshot::channel();
    if state
        .events
        .send(RuntimeEvent::Requested(Some(RequestAck::new(ack_tx))))
        .await
        .is_err()
    {
        debug!("runtime gone; serving with the last known mode");
    }

    let body = match timeout_at(deadline, body.collect()).await {
        Ok(Ok(collected)) => collected.to_bytes(),
        Ok(Err(e)) => {
            debug!(error = %e, "failed to read request body");
            return Ok(text_response(StatusCode::BAD_REQUEST, "cannot read request body"));
        }
        Err(_) => return Ok(timeout_response()),
    };

    // The scan triggered above settles the mode before the first poll.
    let _ = timeout_at(deadline, ack_rx).await;

    let request = BufferedRequest {
        method: parts.method,
        path_and_query: parts
            .uri
            .path_and_query()
            .map(|pq| pq.as_str().to_string())
            .unwrap_or_else(|| "/".to_string()),
        headers: parts.headers,
        body,
        client_ip: Some(peer.ip()),
    };

    Ok(retry_until_ready(&state, &request, deadline).await)
}

/// Poll the mode until the request can be answered or the deadline passes.
async fn retry_until_ready(state: &ProxyState, request: &BufferedRequest, deadline: Instant) -> Response<ProxyBody> {
    let mut modes = state.modes.clone();
    let mut ticker = tokio::time::interval(state.poll_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut attempts = 0u32;

    loop {
        tokio::select! {
            _ = sleep_until(deadline) => {
                info!(path = %request.path_and_query, attempts, "app not reachable before timeout");
                return timeout_response();
            }
            _ = ticker.tick() => {}
        }

        let mode = modes.borrow_and_update().clone();
        match mode {
            ProxyMode::Paused => continue,
            ProxyMode::Errored(text) => return text_response(StatusCode::INTERNAL_SERVER_ERROR, &text),
            ProxyMode::Serving => {
                attempts += 1;
                match timeout_at(deadline, state.forwarder.forward(request)).await {
                    Ok(Forwarded::Response(response)) => return relay(response),
                    Ok(Forwarded::BadGateway(reason)) => {
                        debug!(attempts, %reason, "bad gateway; retrying");
                    }
                    Err(_) => return timeout_response(),
                }
            }
        }
    }
}

fn relay(response: Response<Incoming>) -> Response<ProxyBody> {
    let (mut parts, body) = response.into_parts();
    strip_hop_by_hop(&mut parts.headers);
    Response::from_parts(parts, body.boxed())
}

fn timeout_response() -> Response<ProxyBody> {
    text_response(StatusCode::BAD_GATEWAY, TIMEOUT_BODY)
}

fn text_response(status: StatusCode, text: &str) -> Response<ProxyBody> {
    let body = Full::new(Bytes::from(text.to_string()))
        .map_err(|never| match never {})
        .boxed();
    let mut response = Response::new(body);
    *response.status_mut() = status;
    response
        .headers_mut()
        .insert(CONTENT_TYPE, HeaderValue::from_static("text/plain; charset=utf-8"));
    response
}
