//! Expose functions and classes to remote callers, discover them from the
//! other side, and forward calls to them.
//!
//! The exposer registers [`FunctionDef`]s and [`ClassDef`]s on an [`Exposer`]
//! and serves it with [`HttpServer`]. A caller pages through what is exposed
//! with [`Discovery`], renders proxies with [`generate::render`], and the
//! proxies forward their calls through a [`Forwarder`].

#[macro_use]
mod macros;

pub mod calling;
pub mod catalog;
pub mod descriptor;
pub mod discovery;
pub mod dispatcher;
pub mod encoding;
pub mod generate;
pub mod net;
pub mod server;
pub mod types;

/// Version of this library, as carried in `Cargo.toml`.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub use calling::{CallError, CallOutcome, Forwarder, Target};
pub use catalog::ExposureCatalog;
pub use descriptor::{
    CallableDescriptor, ClassDescriptor, FunctionDescriptor, MethodDescriptor, Modifiers,
    ParameterDescriptor, PropertyDescriptor, CONSTRUCTOR,
};
pub use discovery::{Discovery, DiscoveryError, DiscoveryStats};
pub use dispatcher::{
    arg, async_handler, ClassDef, DispatchError, Dispatcher, Failure, FunctionDef, Handler,
    HandlerResult, Resolve,
};
pub use encoding::{DecodingError, EncodedValue};
pub use generate::{RustTemplate, Template};
pub use net::{client::HttpTransport, server::HttpServer, Transport, TransportError};
pub use server::Exposer;
pub use types::{Decode, Encode, Object, Type, TypeMismatch, Value, MAX_DEPTH};
