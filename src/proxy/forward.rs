// src/proxy/forward.rs

//! One forwarding attempt to the application.
//!
//! Anything that keeps the exchange from producing an upstream response
//! (refused connection, reset, malformed reply) comes back as
//! [`Forwarded::BadGateway`]. That value never leaves the proxy as a
//! response; the request loop treats it as "not ready yet".

use std::net::IpAddr;

use bytes::Bytes;
use http::header::{HeaderMap, HeaderName, HeaderValue, CONNECTION};
use http::{Request, Response, Uri, Version};
use http_body_util::Full;
use hyper::body::Incoming;
use hyper_util::client::legacy::connect::HttpConnector;
use hyper_util::client::legacy::Client;
use hyper_util::rt::TokioExecutor;
use tracing::debug;

/// Headers that describe one connection and must not be forwarded.
const HOP_BY_HOP: [&str; 8] = [
    "connection",
    "keep-alive",
    "proxy-authenticate",
    "proxy-authorization",
    "te",
    "trailer",
    "transfer-encoding",
    "upgrade",
];

const X_FORWARDED_FOR: &str = "x-forwarded-for";

/// The buffered parts of an inbound request, replayable on every attempt.
#[derive(Debug, Clone)]
pub struct BufferedRequest {
    pub method: http::Method,
    /// Path and query of the original URI.
    pub path_and_query: String,
    pub headers: HeaderMap,
    pub body: Bytes,
    pub client_ip: Option<IpAddr>,
}

/// Outcome of one attempt.
#[derive(Debug)]
pub enum Forwarded {
    /// A real upstream response, whatever its status.
    Response(Response<Incoming>),
    /// No upstream response could be obtained.
    BadGateway(String),
}

/// HTTP/1.1 client bound to the application's address.
#[derive(Debug, Clone)]
pub struct Forwarder {
    client: Client<HttpConnector, Full<Bytes>>,
    authority: String,
}

impl Forwarder {
    pub fn new(app_host: &str, app_port: u16) -> Self {
        let client = Client::builder(TokioExecutor::new()).build_http();
        Self {
            client,
            authority: format!("{app_host}:{app_port}"),
        }
    }

    /// Upstream URI for a path-and-query.
    pub fn target_uri(&self, path_and_query: &str) -> Result<Uri, http::Error> {
        let uri = format!("http://{}{}", self.authority, path_and_query)
            .parse::<Uri>()
            .map_err(http::Error::from)?;
        Ok(uri)
    }

    pub async fn forward(&self, request: &BufferedRequest) -> Forwarded {
        let upstream = match self.build_request(request) {
            Ok(upstream) => upstream,
            Err(e) => return Forwarded::BadGateway(format!("invalid upstream request: {e}")),
        };

        match self.client.request(upstream).await {
            Ok(response) => Forwarded::Response(response),
            Err(e) => {
                debug!(authority = %self.authority, error = %e, "upstream not ready");
                Forwarded::BadGateway(e.to_string())
            }
        }
    }

    fn build_request(&self, request: &BufferedRequest) -> Result<Request<Full<Bytes>>, http::Error> {
        let mut headers = request.headers.clone();
        strip_hop_by_hop(&mut headers);
        if let Some(ip) = request.client_ip {
            append_forwarded_for(&mut headers, ip);
        }

        let mut upstream = Request::builder()
            .method(request.method.clone())
            .uri(self.target_uri(&request.path_and_query)?)
            .version(Version::HTTP_11)
            .body(Full::new(request.body.clone()))?;
        *upstream.headers_mut() = headers;
        Ok(upstream)
    }
}

/// Remove hop-by-hop headers, including any named by `Connection`.
pub fn strip_hop_by_hop(headers: &mut HeaderMap) {
    let named: Vec<HeaderName> = headers
        .get_all(CONNECTION)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(','))
        .filter_map(|name| HeaderName::from_bytes(name.trim().as_bytes()).ok())
        .collect();

    for name in named {
        headers.remove(name);
    }
    for name in HOP_BY_HOP {
        headers.remove(name);
    }
}

fn append_forwarded_for(headers: &mut HeaderMap, ip: IpAddr) {
    let value = match headers.get(X_FORWARDED_FOR).and_then(|v| v.to_str().ok()) {
        Some(prior) if !prior.trim().is_empty() => format!("{prior}, {ip}"),
        _ => ip.to_string(),
    };
    if let Ok(value) = HeaderValue::from_str(&value) {
        headers.insert(X_FORWARDED_FOR, value);
    }
}
