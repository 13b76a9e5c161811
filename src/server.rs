use crate::{
    catalog::ExposureCatalog,
    dispatcher::{ClassDef, DispatchError, Dispatcher, FunctionDef},
    encoding::{self, DecodingError},
    net::{ExposurePage, InvocationRequest, InvocationResult},
    types::Value,
};
use std::time::Instant;
use tracing::{debug, warn};

/// The exposer side: what is advertised and what can be invoked.
///
/// Registering a definition makes it callable; [`Exposer::prepare`] (or the
/// `expose_*` shorthands) also lists it in the discovery catalog.
#[derive(Default)]
pub struct Exposer {
    dispatcher: Dispatcher,
    catalog: ExposureCatalog,
}

impl Exposer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_function(&mut self, def: FunctionDef) {
        self.dispatcher.register_function(def);
    }

    pub fn register_class(&mut self, def: ClassDef) {
        self.dispatcher.register_class(def);
    }

    /// Adds whatever `name` resolves to to the catalog; unknown names are ignored.
    pub fn prepare(&mut self, name: &str) -> bool {
        self.catalog.prepare(&self.dispatcher, name)
    }

    pub fn expose_function(&mut self, def: FunctionDef) {
        let name = def.descriptor().name.clone();
        self.register_function(def);
        self.prepare(&name);
    }

    pub fn expose_class(&mut self, def: ClassDef) {
        let name = def.descriptor().name.clone();
        self.register_class(def);
        self.prepare(&name);
    }

    pub fn catalog(&self) -> &ExposureCatalog {
        &self.catalog
    }

    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    pub fn clear(&mut self) {
        self.dispatcher.clear();
        self.catalog.clear();
    }

    pub fn serve_page(&self, page: u64) -> Option<ExposurePage> {
        self.catalog.serve_page(page)
    }

    /// Decodes and performs one invocation request.
    ///
    /// Input that does not decode is a no-op (`Ok(None)`). A failure raised by
    /// the invoked callable is returned as [`DispatchError::Invocation`]; a
    /// target that is not registered as one of the `NoSuch*` variants.
    pub async fn receive(&self, request: &[u8]) -> Result<Option<InvocationResult>, DispatchError> {
        let Ok(request) = serde_json::from_slice::<InvocationRequest>(request) else {
            debug!("ignoring undecodable invocation request");
            return Ok(None);
        };
        let (instance, args) = match decode_request(&request) {
            Ok(decoded) => decoded,
            Err(e) => {
                warn!(method = %request.method, "ignoring request with undecodable values: {e}");
                return Ok(None);
            }
        };

        // An object receiver names its own class.
        let class = match &instance {
            Some(Value::Object(obj)) => Some(obj.class.clone()),
            _ => request.class.clone(),
        };
        debug!(class = ?class, method = %request.method, args = args.len(), "invoking");

        let memory_start = resident_memory();
        let time_start = Instant::now();
        let result = self
            .dispatcher
            .invoke(class.as_deref(), &request.method, instance, args)
            .await?;
        let elapsed = time_start.elapsed();
        let memory_usage = match (memory_start, resident_memory()) {
            (Some(start), Some(end)) => end - start,
            _ => 0,
        };

        Ok(Some(InvocationResult {
            time: chrono::Utc::now().format("%Y-%m-%d %H:%M:%S").to_string(),
            class: request.class,
            method: request.method,
            result: encoding::encode(&result),
            execution_time: elapsed.as_secs_f64(),
            memory_usage,
        }))
    }
}

/// The decoded receiver (nil means none) and arguments.
fn decode_request(request: &InvocationRequest) -> Result<(Option<Value>, Vec<Value>), DecodingError> {
    let instance = Some(encoding::decode(&request.instance)?).filter(|v| !v.is_nil());
    let args = request
        .args
        .iter()
        .map(encoding::decode)
        .collect::<Result<_, _>>()?;
    Ok((instance, args))
}

/// Resident set size in bytes, where the platform exposes it.
#[cfg(target_os = "linux")]
fn resident_memory() -> Option<i64> {
    let statm = std::fs::read_to_string("/proc/self/statm").ok()?;
    let pages: i64 = statm.split_whitespace().nth(1)?.parse().ok()?;
    // SAFETY: sysconf has no preconditions and _SC_PAGESIZE is always a valid name
    let page_size = unsafe { libc::sysconf(libc::_SC_PAGESIZE) };
    (page_size > 0).then(|| pages * page_size as i64)
}

#[cfg(not(target_os = "linux"))]
fn resident_memory() -> Option<i64> {
    None
}
