use super::{Transport, TransportError};
use bytes::Bytes;
use futures::future::BoxFuture;
use http_body_util::{BodyExt, Full};
use hyper::{header, Method, Request, StatusCode, Uri};
use hyper_util::rt::TokioIo;
use tokio::{net::TcpStream, task};
use tracing::debug;

/// HTTP/1.1 over a fresh TCP connection per request.
#[derive(Debug, Clone, Copy, Default)]
pub struct HttpTransport;

impl HttpTransport {
    pub fn new() -> Self {
        Self
    }

    async fn send_recv(&self, url: &str, body: Vec<u8>) -> Result<Vec<u8>, TransportError> {
        let uri: Uri = url
            .parse()
            .map_err(|_| TransportError::InvalidEndpoint(url.to_owned()))?;
        match uri.scheme_str() {
            Some("http") => {}
            _ => return Err(TransportError::UnsupportedScheme(url.to_owned())),
        }
        let host = connect_host(&uri).ok_or_else(|| TransportError::InvalidEndpoint(url.to_owned()))?;
        let port = uri.port_u16().unwrap_or(80);
        let authority = uri
            .authority()
            .map(|a| a.as_str().to_owned())
            .unwrap_or_else(|| host.to_owned());
        let path = uri
            .path_and_query()
            .map(|pq| pq.as_str().to_owned())
            .unwrap_or_else(|| "/".to_owned());

        let sock = TcpStream::connect((host, port)).await?;
        let (mut sender, conn) = hyper::client::conn::http1::handshake(TokioIo::new(sock)).await?;
        task::spawn(async move {
            if let Err(e) = conn.await {
                debug!("connection driver error: {e}");
            }
        });

        let req = Request::builder()
            .method(Method::POST)
            .uri(path)
            .header(header::HOST, authority)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Full::new(Bytes::from(body)))
            .map_err(|e| TransportError::InvalidEndpoint(e.to_string()))?;

        let resp = sender.send_request(req).await?;
        let status = resp.status();
        let bytes = resp.into_body().collect().await?.to_bytes();
        debug!(%status, len = bytes.len(), "response from {url}");

        // Invocation failures come back as 500 with a decodable body.
        if status.is_success() || (status == StatusCode::INTERNAL_SERVER_ERROR && !bytes.is_empty()) {
            Ok(bytes.to_vec())
        } else {
            Err(TransportError::Status(status.as_u16()))
        }
    }
}

/// The host of `uri` as the resolver expects it: IPv6 literals lose their brackets.
fn connect_host(uri: &Uri) -> Option<&str> {
    uri.host()
        .map(|host| host.trim_start_matches('[').trim_end_matches(']'))
}

impl Transport for HttpTransport {
    fn post<'a>(&'a self, url: &'a str, body: Vec<u8>) -> BoxFuture<'a, Result<Vec<u8>, TransportError>> {
        Box::pin(self.send_recv(url, body))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn rejects_non_http_endpoints() {
        let t = HttpTransport::new();
        assert!(matches!(
            t.post("https://example.com/rpc", vec![]).await,
            Err(TransportError::UnsupportedScheme(_))
        ));
        assert!(matches!(
            t.post("not a url", vec![]).await,
            Err(TransportError::InvalidEndpoint(_))
        ));
    }

    #[test]
    fn ipv6_literals_connect_without_brackets() {
        let uri: Uri = "http://[::1]:8080/rpc".parse().unwrap();
        assert_eq!(connect_host(&uri), Some("::1"));
        let uri: Uri = "http://localhost:8080/".parse().unwrap();
        assert_eq!(connect_host(&uri), Some("localhost"));
    }

    #[tokio::test]
    async fn unreachable_server_is_a_connect_error() {
        // bind then drop to get a port nobody listens on
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);
        let r = HttpTransport.post(&format!("http://127.0.0.1:{port}/"), vec![]).await;
        assert!(matches!(r, Err(TransportError::Connect(_))));
    }
}
