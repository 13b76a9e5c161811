// Generated by rpcmirror. Every call is forwarded to the remote exposer.

pub mod remote {
    #[allow(unused_imports)]
    use rpcmirror::{CallError, Forwarder, Object, Value};

    /// Proxy for the remote class `Calculator`.
    pub struct Calculator<'m> {
        mirror: &'m Forwarder,
        /// Remote type `i64`.
        pub precision: Value,
    }

    impl<'m> Calculator<'m> {
        pub fn mirror_blank(mirror: &'m Forwarder) -> Self {
            Self {
                mirror,
                precision: Value::Int(2),
            }
        }

        pub fn mirror_state(&self) -> Value {
            Value::Object(Object::new("Calculator").with("precision", self.precision.clone()))
        }

        pub fn mirror_hydrate(&mut self, state: Value) {
            let Value::Object(state) = state else { return };
            if let Some(v) = state.get("precision") { self.precision = v.clone(); }
        }

        /// Remote `Calculator::new`.
        /// Modifiers: public.
        pub async fn new(mirror: &'m Forwarder, precision: Option<Value>) -> Result<Self, CallError> {
            let precision = precision.unwrap_or_else(|| Value::Int(2));
            let mut this = Self::mirror_blank(mirror);
            let outcome = mirror.call("Calculator::new", vec![precision], Some(this.mirror_state())).await?;
            this.mirror_hydrate(outcome.result);
            Ok(this)
        }

        /// Remote `Calculator::add`.
        /// Modifiers: public.
        /// Returns `i64`.
        pub async fn add(&self, a: Value, b: Value) -> Result<Value, CallError> {
            Ok(self.mirror.call("Calculator::add", vec![a, b], Some(self.mirror_state())).await?.result)
        }

        /// Remote `Calculator::scale`.
        /// Modifiers: public.
        /// Returns `i64`.
        pub async fn scale(&self, x: Value) -> Result<Value, CallError> {
            Ok(self.mirror.call("Calculator::scale", vec![x], Some(self.mirror_state())).await?.result)
        }

        /// Remote `Calculator::origin`.
        /// Modifiers: public static.
        pub async fn origin(mirror: &'m Forwarder) -> Result<Value, CallError> {
            Ok(mirror.call("Calculator::origin", vec![], None).await?.result)
        }
    }

    /// Remote function `double`.
    pub async fn double(mirror: &Forwarder, x: Value) -> Result<Value, CallError> {
        Ok(mirror.call("double", vec![x], None).await?.result)
    }
}
