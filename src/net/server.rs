use crate::{
    net::{DiscoveryRequest, RemoteFailure, CALL_QUERY, EXPOSE_QUERY},
    server::Exposer,
};
use bytes::Bytes;
use http_body_util::{BodyExt, Full, LengthLimitError, Limited};
use hyper::{
    body::Incoming, header, server::conn::http1, service::service_fn, Method, Request, Response,
    StatusCode,
};
use hyper_util::rt::TokioIo;
use std::{convert::Infallible, io, net::SocketAddr, sync::Arc};
use tokio::{
    net::{TcpListener, ToSocketAddrs},
    task,
};
use tracing::{debug, info, warn};

/// Largest request body accepted unless configured otherwise.
pub const DEFAULT_BODY_LIMIT: usize = 16 * 1024 * 1024;

/// Serves an [`Exposer`] over HTTP: `POST ?expose=true` for discovery pages,
/// `POST ?call=true` for invocations.
pub struct HttpServer {
    listener: TcpListener,
    body_limit: usize,
}

impl HttpServer {
    pub async fn bind(addr: impl ToSocketAddrs) -> io::Result<Self> {
        let listener = TcpListener::bind(addr).await?;
        Ok(Self {
            listener,
            body_limit: DEFAULT_BODY_LIMIT,
        })
    }

    /// Requests with a larger body are answered with 413.
    pub fn with_body_limit(mut self, bytes: usize) -> Self {
        self.body_limit = bytes;
        self
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// The URL a caller should use to reach this server.
    pub fn url(&self) -> io::Result<String> {
        Ok(format!("http://{}/", self.local_addr()?))
    }

    /// Accepts connections until an accept error occurs. Each connection gets
    /// its own task; the exposer is shared read-only.
    pub async fn serve(self, exposer: Exposer) -> io::Result<()> {
        let root_arc = Arc::new(exposer);
        let body_limit = self.body_limit;
        info!(addr = %self.local_addr()?, body_limit, "serving");
        loop {
            let arc_exposer = root_arc.clone();
            let (sock, addr) = self.listener.accept().await?;
            debug!(%addr, "accepted");

            task::spawn(async move {
                let service = service_fn(move |req| handle_request(arc_exposer.clone(), body_limit, req));
                if let Err(e) = http1::Builder::new()
                    .serve_connection(TokioIo::new(sock), service)
                    .await
                {
                    debug!("connection error: {e}");
                }
            });
        }
    }
}

async fn handle_request(
    exposer: Arc<Exposer>,
    body_limit: usize,
    req: Request<Incoming>,
) -> Result<Response<Full<Bytes>>, Infallible> {
    let (parts, body) = req.into_parts();
    let query = parts.uri.query().unwrap_or_default().to_owned();
    if parts.method != Method::POST {
        return Ok(plain(StatusCode::NOT_FOUND, "Not Found"));
    }
    let body = match Limited::new(body, body_limit).collect().await {
        Ok(collected) => collected.to_bytes(),
        Err(e) if e.is::<LengthLimitError>() => {
            warn!(body_limit, "request body too large");
            return Ok(plain(StatusCode::PAYLOAD_TOO_LARGE, "Payload Too Large"));
        }
        Err(e) => {
            warn!("reading request body: {e}");
            return Ok(plain(StatusCode::BAD_REQUEST, "Bad Request"));
        }
    };

    let has = |flag: &str| query.split('&').any(|q| q == flag);
    if has(EXPOSE_QUERY) {
        Ok(expose(&exposer, &body))
    } else if has(CALL_QUERY) {
        Ok(call(&exposer, &body).await)
    } else {
        Ok(plain(StatusCode::NOT_FOUND, "Not Found"))
    }
}

fn expose(exposer: &Exposer, body: &[u8]) -> Response<Full<Bytes>> {
    let page = match serde_json::from_slice::<DiscoveryRequest>(body) {
        Ok(DiscoveryRequest { page }) => page,
        Err(e) => {
            warn!("undecodable discovery request: {e}");
            return plain(StatusCode::BAD_REQUEST, "Bad Request");
        }
    };
    json(StatusCode::OK, &exposer.catalog().page_or_empty(page))
}

async fn call(exposer: &Exposer, body: &[u8]) -> Response<Full<Bytes>> {
    match exposer.receive(body).await {
        Ok(Some(result)) => json(StatusCode::OK, &result),
        Ok(None) => plain(StatusCode::NO_CONTENT, ""),
        Err(e) => json(
            StatusCode::INTERNAL_SERVER_ERROR,
            &RemoteFailure { error: e },
        ),
    }
}

fn json(status: StatusCode, body: &impl serde::Serialize) -> Response<Full<Bytes>> {
    match serde_json::to_vec(body) {
        Ok(bytes) => {
            let mut resp = Response::new(Full::new(Bytes::from(bytes)));
            *resp.status_mut() = status;
            resp.headers_mut().insert(
                header::CONTENT_TYPE,
                header::HeaderValue::from_static("application/json"),
            );
            resp
        }
        Err(e) => {
            warn!("encoding response: {e}");
            plain(StatusCode::INTERNAL_SERVER_ERROR, "")
        }
    }
}

fn plain(status: StatusCode, text: &'static str) -> Response<Full<Bytes>> {
    let mut resp = Response::new(Full::new(Bytes::from_static(text.as_bytes())));
    *resp.status_mut() = status;
    resp
}
