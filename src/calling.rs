use crate::{
    dispatcher::{DispatchError, Failure},
    encoding::{self, EncodedValue},
    net::{
        client::HttpTransport, with_query, CallReply, InvocationRequest, RemoteFailure, Transport,
        TransportError, CALL_QUERY,
    },
    types::{Decode, TypeMismatch, Value},
};
use std::{fmt, time::Duration};
use thiserror::Error;
use tracing::debug;

/// Separates a class name from a method name in a call target.
pub const SEPARATOR: &str = "::";

/// What a call is aimed at: `Class::method` or a bare function name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Target<'a> {
    pub class: Option<&'a str>,
    pub method: &'a str,
}

impl<'a> Target<'a> {
    /// Splits on the first separator only.
    pub fn parse(target: &'a str) -> Self {
        match target.split_once(SEPARATOR) {
            Some((class, method)) => Target {
                class: Some(class),
                method,
            },
            None => Target {
                class: None,
                method: target,
            },
        }
    }
}

impl fmt::Display for Target<'_> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self.class {
            Some(class) => write!(f, "{class}{SEPARATOR}{}", self.method),
            None => f.write_str(self.method),
        }
    }
}

/// The decoded reply to a forwarded call.
#[derive(Debug, Clone, PartialEq)]
pub struct CallOutcome {
    pub time: String,
    pub class: Option<String>,
    pub method: String,
    pub result: Value,
    pub execution_time: Duration,
    pub memory_usage: i64,
}

#[derive(Debug, Error)]
pub enum CallError {
    #[error("no server configured")]
    Configuration,

    #[error("transport: {0}")]
    Transport(#[from] TransportError),

    #[error("remote invocation failed: {0}")]
    Invocation(Failure),

    /// The exposer has no such function, class or method.
    #[error("remote target not found: {0}")]
    NoSuchTarget(DispatchError),

    #[error("result type mismatch: {0}")]
    Result(#[from] TypeMismatch),
}

/// Forwards calls to a remote exposer.
///
/// The server URL must be set with [`Forwarder::set_server`] before calling.
#[derive(Debug, Default)]
pub struct Forwarder<T = HttpTransport> {
    server: Option<String>,
    transport: T,
}

impl Forwarder {
    pub fn new() -> Self {
        Self::default()
    }
}

impl<T: Transport> Forwarder<T> {
    pub fn with_transport(transport: T) -> Self {
        Self {
            server: None,
            transport,
        }
    }

    pub fn server(&self) -> Option<&str> {
        self.server.as_deref()
    }

    pub fn set_server(&mut self, server: impl Into<String>) {
        self.server = Some(server.into());
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Calls `target` (`"Class::method"` or `"function"`) with `args`, on
    /// `receiver` when given. Arguments and receiver travel by value.
    pub async fn call(
        &self,
        target: &str,
        args: Vec<Value>,
        receiver: Option<Value>,
    ) -> Result<CallOutcome, CallError> {
        let server = self.server.as_deref().ok_or(CallError::Configuration)?;
        let Target { class, method } = Target::parse(target);

        let request = InvocationRequest {
            class: class.map(str::to_owned),
            instance: receiver
                .as_ref()
                .map(encoding::encode)
                .unwrap_or_else(EncodedValue::nil),
            method: method.to_owned(),
            args: args.iter().map(encoding::encode).collect(),
        };
        let body = serde_json::to_vec(&request)
            .map_err(|e| TransportError::MalformedResponse(e.to_string()))?;

        debug!(%target, args = args.len(), "forwarding call to {server}");
        let reply = self.transport.post(&with_query(server, CALL_QUERY), body).await?;

        let reply: CallReply = serde_json::from_slice(&reply)
            .map_err(|e| TransportError::MalformedResponse(e.to_string()))?;
        let result = match reply {
            CallReply::Done(result) => result,
            CallReply::Failed(RemoteFailure {
                error: DispatchError::Invocation(failure),
            }) => return Err(CallError::Invocation(failure)),
            CallReply::Failed(RemoteFailure { error }) => return Err(CallError::NoSuchTarget(error)),
        };
        let value = encoding::decode(&result.result)
            .map_err(|e| TransportError::MalformedResponse(e.to_string()))?;

        Ok(CallOutcome {
            time: result.time,
            class: result.class,
            method: result.method,
            result: value,
            execution_time: Duration::try_from_secs_f64(result.execution_time).unwrap_or_default(),
            memory_usage: result.memory_usage,
        })
    }

    /// [`Forwarder::call`], with the result decoded into `R`.
    pub async fn call_as<R: Decode>(
        &self,
        target: &str,
        args: Vec<Value>,
        receiver: Option<Value>,
    ) -> Result<R, CallError> {
        let outcome = self.call(target, args, receiver).await?;
        Ok(R::decode(outcome.result)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::net::InvocationResult;
    use futures::future::BoxFuture;
    use std::sync::{
        atomic::{AtomicUsize, Ordering},
        Mutex,
    };

    /// Records requests and answers with a canned body.
    struct Canned {
        calls: AtomicUsize,
        last: Mutex<Option<(String, Vec<u8>)>>,
        reply: Vec<u8>,
    }

    impl Canned {
        fn new(reply: Vec<u8>) -> Self {
            Self {
                calls: AtomicUsize::new(0),
                last: Mutex::new(None),
                reply,
            }
        }
    }

    impl Transport for Canned {
        fn post<'a>(&'a self, url: &'a str, body: Vec<u8>) -> BoxFuture<'a, Result<Vec<u8>, TransportError>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            *self.last.lock().unwrap() = Some((url.to_owned(), body));
            let reply = self.reply.clone();
            Box::pin(async move { Ok(reply) })
        }
    }

    fn ok_reply(value: Value) -> Vec<u8> {
        serde_json::to_vec(&InvocationResult {
            time: "2024-05-01 12:00:00".into(),
            class: Some("Calculator".into()),
            method: "add".into(),
            result: encoding::encode(&value),
            execution_time: 0.25,
            memory_usage: 128,
        })
        .unwrap()
    }

    #[test]
    fn target_splits_on_first_separator() {
        assert_eq!(
            Target::parse("Calculator::add"),
            Target {
                class: Some("Calculator"),
                method: "add"
            }
        );
        assert_eq!(
            Target::parse("a::b::c"),
            Target {
                class: Some("a"),
                method: "b::c"
            }
        );
        assert_eq!(Target::parse("double").class, None);
        assert_eq!(Target::parse("Calculator::add").to_string(), "Calculator::add");
    }

    #[tokio::test]
    async fn unconfigured_forwarder_never_touches_the_network() {
        let f = Forwarder::with_transport(Canned::new(ok_reply(Value::Nil)));
        assert!(f.server().is_none());
        let err = f.call("double", vec![2.into()], None).await.unwrap_err();
        assert!(matches!(err, CallError::Configuration));
        assert_eq!(f.transport().calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn call_encodes_request_and_decodes_result() {
        let mut f = Forwarder::with_transport(Canned::new(ok_reply(Value::Int(5))));
        f.set_server("http://exposer.local/rpc");
        let receiver = Value::Object(crate::Object::new("Calculator"));

        let outcome = f
            .call("Calculator::add", vec![2.into(), 3.into()], Some(receiver.clone()))
            .await
            .unwrap();
        assert_eq!(outcome.result, Value::Int(5));
        assert_eq!(outcome.execution_time, Duration::from_millis(250));
        assert_eq!(outcome.memory_usage, 128);

        let (url, body) = f.transport().last.lock().unwrap().take().unwrap();
        assert_eq!(url, "http://exposer.local/rpc?call=true");
        let sent: InvocationRequest = serde_json::from_slice(&body).unwrap();
        assert_eq!(sent.class.as_deref(), Some("Calculator"));
        assert_eq!(sent.method, "add");
        assert_eq!(sent.args, vec![encoding::encode(&2.into()), encoding::encode(&3.into())]);
        assert_eq!(sent.instance.decode().unwrap(), receiver);
    }

    #[tokio::test]
    async fn missing_receiver_sends_nil_sentinel() {
        let mut f = Forwarder::with_transport(Canned::new(ok_reply(Value::Int(4))));
        f.set_server("http://exposer.local/");
        let doubled: i64 = f.call_as("double", vec![2.into()], None).await.unwrap();
        assert_eq!(doubled, 4);

        let (_, body) = f.transport().last.lock().unwrap().take().unwrap();
        let sent: InvocationRequest = serde_json::from_slice(&body).unwrap();
        assert_eq!(sent.class, None);
        assert_eq!(sent.instance, EncodedValue::nil());
    }

    #[tokio::test]
    async fn remote_failure_is_an_invocation_error() {
        let body = serde_json::to_vec(&RemoteFailure {
            error: DispatchError::Invocation(Failure::new("division by zero")),
        })
        .unwrap();
        let mut f = Forwarder::with_transport(Canned::new(body));
        f.set_server("http://exposer.local/");
        match f.call("Calculator::div", vec![], None).await {
            Err(CallError::Invocation(failure)) => assert_eq!(failure.message, "division by zero"),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[tokio::test]
    async fn missing_target_is_not_an_invocation_error() {
        let body = serde_json::to_vec(&RemoteFailure {
            error: DispatchError::NoSuchClass("Abacus".into()),
        })
        .unwrap();
        let mut f = Forwarder::with_transport(Canned::new(body));
        f.set_server("http://exposer.local/");
        match f.call("Abacus::add", vec![], None).await {
            Err(CallError::NoSuchTarget(DispatchError::NoSuchClass(class))) => assert_eq!(class, "Abacus"),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[tokio::test]
    async fn garbage_reply_is_a_transport_error() {
        let mut f = Forwarder::with_transport(Canned::new(b"<html>oops</html>".to_vec()));
        f.set_server("http://exposer.local/");
        assert!(matches!(
            f.call("double", vec![], None).await,
            Err(CallError::Transport(TransportError::MalformedResponse(_)))
        ));
    }
}
