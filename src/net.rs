//! JSON envelopes exchanged over HTTP, and the transports that carry them.

pub mod client;
pub mod server;

use crate::{
    descriptor::CallableDescriptor, dispatcher::DispatchError, encoding::EncodedValue,
};
use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Query appended to the server URL for discovery requests.
pub const EXPOSE_QUERY: &str = "expose=true";
/// Query appended to the server URL for invocation requests.
pub const CALL_QUERY: &str = "call=true";

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct DiscoveryRequest {
    pub page: u64,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ExposurePage {
    pub page: u64,
    pub total_pages: u64,
    /// One descriptor for a page in range, none otherwise.
    pub elements: Vec<CallableDescriptor>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct InvocationRequest {
    pub class: Option<String>,
    /// Encoded receiver state; the nil sentinel when there is none.
    pub instance: EncodedValue,
    pub method: String,
    pub args: Vec<EncodedValue>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct InvocationResult {
    pub time: String,
    pub class: Option<String>,
    pub method: String,
    pub result: EncodedValue,
    /// Seconds.
    pub execution_time: f64,
    /// Resident memory change in bytes, best effort.
    pub memory_usage: i64,
}

/// The body sent back when an invocation request named no registered target
/// or the invoked callable failed.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct RemoteFailure {
    pub error: DispatchError,
}

/// Either reply to an invocation request.
#[derive(Deserialize, Debug)]
#[serde(untagged)]
pub(crate) enum CallReply {
    Done(InvocationResult),
    Failed(RemoteFailure),
}

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("invalid endpoint {0:?}")]
    InvalidEndpoint(String),

    #[error("unsupported scheme in {0:?}, only http is supported")]
    UnsupportedScheme(String),

    #[error("connecting: {0}")]
    Connect(#[from] std::io::Error),

    #[error("http: {0}")]
    Http(#[from] hyper::Error),

    #[error("server answered {0}")]
    Status(u16),

    #[error("malformed response: {0}")]
    MalformedResponse(String),
}

/// A reliable request/response channel: POST `body` to `url`, get the reply body.
///
/// Server-side failures that still carry a body (an invocation failure, for
/// example) are returned as `Ok` so the caller can decode them.
pub trait Transport: Send + Sync {
    fn post<'a>(&'a self, url: &'a str, body: Vec<u8>) -> BoxFuture<'a, Result<Vec<u8>, TransportError>>;
}

impl<T: Transport + ?Sized> Transport for &T {
    fn post<'a>(&'a self, url: &'a str, body: Vec<u8>) -> BoxFuture<'a, Result<Vec<u8>, TransportError>> {
        (**self).post(url, body)
    }
}

impl<T: Transport + ?Sized> Transport for std::sync::Arc<T> {
    fn post<'a>(&'a self, url: &'a str, body: Vec<u8>) -> BoxFuture<'a, Result<Vec<u8>, TransportError>> {
        (**self).post(url, body)
    }
}

/// `server` with `query` appended.
pub fn with_query(server: &str, query: &str) -> String {
    let sep = if server.contains('?') { '&' } else { '?' };
    format!("{server}{sep}{query}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encoding;
    use serde_json::json;

    #[test]
    fn query_is_appended() {
        assert_eq!(with_query("http://h:1/rpc", CALL_QUERY), "http://h:1/rpc?call=true");
        assert_eq!(
            with_query("http://h:1/rpc?v=2", EXPOSE_QUERY),
            "http://h:1/rpc?v=2&expose=true"
        );
    }

    #[test]
    fn invocation_request_wire_shape() {
        let req = InvocationRequest {
            class: None,
            instance: EncodedValue::nil(),
            method: "double".into(),
            args: vec![encoding::encode(&2.into())],
        };
        let json = serde_json::to_value(&req).unwrap();
        assert_eq!(json["class"], serde_json::Value::Null);
        assert_eq!(json["method"], "double");
        assert_eq!(json["args"].as_array().unwrap().len(), 1);
        assert!(json["instance"].is_string());
    }

    #[test]
    fn reply_distinguishes_failure() {
        let failed: CallReply =
            serde_json::from_value(json!({"error": {"Invocation": {"message": "nope"}}})).unwrap();
        assert!(matches!(
            failed,
            CallReply::Failed(RemoteFailure { error: DispatchError::Invocation(f) }) if f.message == "nope"
        ));

        let missing: CallReply =
            serde_json::from_value(json!({"error": {"NoSuchFunction": "gone"}})).unwrap();
        assert!(matches!(
            missing,
            CallReply::Failed(RemoteFailure { error: DispatchError::NoSuchFunction(name) }) if name == "gone"
        ));

        let done: CallReply = serde_json::from_value(json!({
            "time": "2024-01-01 00:00:00",
            "class": "Calculator",
            "method": "add",
            "result": encoding::encode(&5.into()),
            "executionTime": 0.001,
            "memoryUsage": 0
        }))
        .unwrap();
        assert!(matches!(done, CallReply::Done(r) if r.method == "add"));
    }

    #[test]
    fn exposure_page_uses_total_pages_key() {
        let page = ExposurePage {
            page: 1,
            total_pages: 0,
            elements: vec![],
        };
        assert_eq!(
            serde_json::to_value(page).unwrap(),
            json!({"page": 1, "totalPages": 0, "elements": []})
        );
    }
}
