use crate::{
    descriptor::{
        ClassDescriptor, FunctionDescriptor, MethodDescriptor, ParameterDescriptor,
        PropertyDescriptor, CONSTRUCTOR,
    },
    types::{Decode, Object, TypeMismatch, Value},
    CallableDescriptor,
};
use futures::future::{ready, BoxFuture};
use serde::{Deserialize, Serialize};
use std::{collections::BTreeMap, future::Future, sync::Arc};
use thiserror::Error;

/// A failure raised by an exposed callable. It reaches the remote caller verbatim.
#[derive(Serialize, Deserialize, Error, Debug, Clone, PartialEq)]
#[error("{message}")]
pub struct Failure {
    pub message: String,
}

impl Failure {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl From<TypeMismatch> for Failure {
    fn from(err: TypeMismatch) -> Self {
        Failure::new(err.to_string())
    }
}

pub type HandlerResult = Result<Value, Failure>;

/// The callable handle behind an exposed function or method.
///
/// `receiver` is the decoded instance state the call was made on, if any.
/// Plain closures `Fn(Option<Value>, Vec<Value>) -> HandlerResult` are handlers;
/// wrap async closures with [`async_handler`].
pub trait Handler: Send + Sync {
    fn invoke(&self, receiver: Option<Value>, args: Vec<Value>) -> BoxFuture<'_, HandlerResult>;
}

impl<F> Handler for F
where
    F: Fn(Option<Value>, Vec<Value>) -> HandlerResult + Send + Sync,
{
    fn invoke(&self, receiver: Option<Value>, args: Vec<Value>) -> BoxFuture<'_, HandlerResult> {
        Box::pin(ready(self(receiver, args)))
    }
}

pub struct AsyncHandler<F>(F);

pub fn async_handler<F, Fut>(f: F) -> AsyncHandler<F>
where
    F: Fn(Option<Value>, Vec<Value>) -> Fut + Send + Sync,
    Fut: Future<Output = HandlerResult> + Send + 'static,
{
    AsyncHandler(f)
}

impl<F, Fut> Handler for AsyncHandler<F>
where
    F: Fn(Option<Value>, Vec<Value>) -> Fut + Send + Sync,
    Fut: Future<Output = HandlerResult> + Send + 'static,
{
    fn invoke(&self, receiver: Option<Value>, args: Vec<Value>) -> BoxFuture<'_, HandlerResult> {
        Box::pin((self.0)(receiver, args))
    }
}

/// Decodes the positional argument `index`.
pub fn arg<T: Decode>(args: &[Value], index: usize) -> Result<T, Failure> {
    let value = args
        .get(index)
        .cloned()
        .ok_or_else(|| Failure::new(format!("missing argument #{index}")))?;
    Ok(T::decode(value)?)
}

/// A free function: its descriptor and its handle.
pub struct FunctionDef {
    descriptor: FunctionDescriptor,
    handler: Arc<dyn Handler>,
}

impl FunctionDef {
    pub fn new<F>(name: impl Into<String>, parameters: Vec<ParameterDescriptor>, f: F) -> Self
    where
        F: Fn(Vec<Value>) -> HandlerResult + Send + Sync + 'static,
    {
        Self::with_handler(name, parameters, move |_: Option<Value>, args: Vec<Value>| f(args))
    }

    pub fn with_handler(
        name: impl Into<String>,
        parameters: Vec<ParameterDescriptor>,
        handler: impl Handler + 'static,
    ) -> Self {
        Self {
            descriptor: FunctionDescriptor {
                name: name.into(),
                parameters,
            },
            handler: Arc::new(handler),
        }
    }

    pub fn descriptor(&self) -> &FunctionDescriptor {
        &self.descriptor
    }
}

/// A class: its properties, its methods and one handle per method.
pub struct ClassDef {
    descriptor: ClassDescriptor,
    handlers: BTreeMap<String, Arc<dyn Handler>>,
}

impl ClassDef {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            descriptor: ClassDescriptor {
                name: name.into(),
                properties: Vec::new(),
                methods: Vec::new(),
            },
            handlers: BTreeMap::new(),
        }
    }

    pub fn property(mut self, property: PropertyDescriptor) -> Self {
        let props = &mut self.descriptor.properties;
        match props.iter_mut().find(|p| p.name == property.name) {
            Some(slot) => *slot = property,
            None => props.push(property),
        }
        self
    }

    /// Declares a method. Redeclaring a name replaces it in place.
    pub fn method(mut self, method: MethodDescriptor, handler: impl Handler + 'static) -> Self {
        self.handlers.insert(method.name.clone(), Arc::new(handler));
        let methods = &mut self.descriptor.methods;
        match methods.iter_mut().find(|m| m.name == method.name) {
            Some(slot) => *slot = method,
            None => methods.push(method),
        }
        self
    }

    /// Declares the constructor. Its handler receives the blank instance and
    /// returns the constructed object.
    pub fn constructor(
        self,
        parameters: Vec<ParameterDescriptor>,
        handler: impl Handler + 'static,
    ) -> Self {
        self.method(MethodDescriptor::new(CONSTRUCTOR, parameters), handler)
    }

    pub fn descriptor(&self) -> &ClassDescriptor {
        &self.descriptor
    }

    /// Instance state with every non-static property at its default.
    pub fn blank_instance(&self) -> Object {
        let mut obj = Object::new(self.descriptor.name.clone());
        for prop in self.descriptor.properties.iter().filter(|p| !p.is_static()) {
            obj.set(prop.name.clone(), prop.default.decode().unwrap_or(Value::Nil));
        }
        obj
    }
}

/// The capability query standing in for runtime introspection.
pub trait Resolve {
    fn resolve_class(&self, name: &str) -> Option<ClassDescriptor>;
    fn resolve_function(&self, name: &str) -> Option<FunctionDescriptor>;

    fn resolve(&self, name: &str) -> Option<CallableDescriptor> {
        self.resolve_class(name)
            .map(CallableDescriptor::Class)
            .or_else(|| self.resolve_function(name).map(CallableDescriptor::Function))
    }
}

/// Maps function names and `(class, method)` pairs to their handles.
///
/// Definitions are added with [`Dispatcher::register_function`] and
/// [`Dispatcher::register_class`] and invoked with [`Dispatcher::invoke`].
#[derive(Default)]
pub struct Dispatcher {
    functions: BTreeMap<String, FunctionDef>,
    classes: BTreeMap<String, ClassDef>,
}

impl Dispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_function(&mut self, def: FunctionDef) {
        let name = def.descriptor.name.clone();
        self.functions.insert(name, def);
    }

    pub fn register_class(&mut self, def: ClassDef) {
        let name = def.descriptor.name.clone();
        self.classes.insert(name, def);
    }

    pub fn clear(&mut self) {
        self.functions.clear();
        self.classes.clear();
    }

    /// Calls `class::method` (or the free function `method` when `class` is
    /// `None`). Missing trailing arguments are filled from declared defaults.
    pub async fn invoke(
        &self,
        class: Option<&str>,
        method: &str,
        receiver: Option<Value>,
        mut args: Vec<Value>,
    ) -> Result<Value, DispatchError> {
        let Some(class) = class else {
            let def = self
                .functions
                .get(method)
                .ok_or_else(|| DispatchError::NoSuchFunction(method.to_owned()))?;
            fill_defaults(&def.descriptor.parameters, &mut args);
            return Ok(def.handler.invoke(None, args).await?);
        };

        let def = self
            .classes
            .get(class)
            .ok_or_else(|| DispatchError::NoSuchClass(class.to_owned()))?;
        let no_such_method = || DispatchError::NoSuchMethod {
            class: class.to_owned(),
            method: method.to_owned(),
        };
        let descriptor = def.descriptor.method(method).ok_or_else(no_such_method)?;
        let handler = def.handlers.get(method).ok_or_else(no_such_method)?;
        fill_defaults(&descriptor.parameters, &mut args);

        let receiver = if descriptor.is_static() {
            None
        } else if descriptor.is_constructor() {
            receiver.or_else(|| Some(Value::Object(def.blank_instance())))
        } else {
            receiver
        };
        Ok(handler.invoke(receiver, args).await?)
    }
}

impl Resolve for Dispatcher {
    fn resolve_class(&self, name: &str) -> Option<ClassDescriptor> {
        self.classes.get(name).map(|def| def.descriptor.clone())
    }

    fn resolve_function(&self, name: &str) -> Option<FunctionDescriptor> {
        self.functions.get(name).map(|def| def.descriptor.clone())
    }
}

fn fill_defaults(parameters: &[ParameterDescriptor], args: &mut Vec<Value>) {
    for param in parameters.iter().skip(args.len()) {
        match param.default.as_ref().and_then(|d| d.decode().ok()) {
            Some(value) => args.push(value),
            None => break,
        }
    }
}

/// Why an invocation did not produce a value. Travels back to the caller as is.
#[derive(Serialize, Deserialize, Debug, Error, Clone, PartialEq)]
pub enum DispatchError {
    #[error("no function named {0}")]
    NoSuchFunction(String),

    #[error("no class named {0}")]
    NoSuchClass(String),

    #[error("class {class} has no method {method}")]
    NoSuchMethod { class: String, method: String },

    #[error("invocation failed: {0}")]
    Invocation(#[from] Failure),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{fail, params, Value};

    fn calculator() -> ClassDef {
        ClassDef::new("Calculator")
            .property(PropertyDescriptor::new("precision").typed("i64").default_value(2i64))
            .property(
                PropertyDescriptor::new("instances")
                    .modifiers(["public", "static"])
                    .default_value(0i64),
            )
            .constructor(params![precision: "i64" = 2i64], |this: Option<Value>, args: Vec<Value>| -> HandlerResult {
                let Some(Value::Object(mut this)) = this else {
                    return fail!("constructor needs an instance");
                };
                this.set("precision", arg::<i64>(&args, 0)?);
                Ok(Value::Object(this))
            })
            .method(
                MethodDescriptor::new("add", params![a: "i64", b: "i64"]).returns("i64"),
                |_: Option<Value>, args: Vec<Value>| -> HandlerResult {
                    Ok(Value::Int(arg::<i64>(&args, 0)? + arg::<i64>(&args, 1)?))
                },
            )
            .method(
                MethodDescriptor::new("describe", params![]).modifiers(["public", "static"]),
                |this: Option<Value>, _: Vec<Value>| -> HandlerResult {
                    Ok(Value::Bool(this.is_none()))
                },
            )
    }

    #[test]
    fn class_descriptor_lists_members_in_declaration_order() {
        let def = calculator();
        let d = def.descriptor();
        assert_eq!(d.properties.len(), 2);
        let methods: Vec<_> = d.methods.iter().map(|m| m.name.as_str()).collect();
        assert_eq!(methods, [CONSTRUCTOR, "add", "describe"]);
        assert_eq!(d.methods[1].return_type.as_deref(), Some("i64"));
        assert!(d.methods[2].is_static());
    }

    #[test]
    fn blank_instance_skips_static_properties() {
        let obj = calculator().blank_instance();
        assert_eq!(obj.fields, vec![("precision".to_owned(), Value::Int(2))]);
    }

    #[test]
    fn resolve_is_silent_for_unknown_names() {
        let mut d = Dispatcher::new();
        d.register_class(calculator());
        assert!(matches!(d.resolve("Calculator"), Some(CallableDescriptor::Class(_))));
        assert!(d.resolve("Nope").is_none());
    }

    #[tokio::test]
    async fn invoke_dispatches_by_kind() {
        let mut d = Dispatcher::new();
        d.register_class(calculator());
        d.register_function(FunctionDef::new("double", params![x: "i64"], |args| {
            Ok(Value::Int(arg::<i64>(&args, 0)? * 2))
        }));

        let sum = d
            .invoke(Some("Calculator"), "add", None, vec![2.into(), 3.into()])
            .await
            .unwrap();
        assert_eq!(sum, Value::Int(5));

        let doubled = d.invoke(None, "double", None, vec![21.into()]).await.unwrap();
        assert_eq!(doubled, Value::Int(42));

        // static methods never see a receiver
        let receiver = Some(Value::Object(Object::new("Calculator")));
        let r = d.invoke(Some("Calculator"), "describe", receiver, vec![]).await;
        assert_eq!(r.unwrap(), Value::Bool(true));
    }

    #[tokio::test]
    async fn constructor_gets_blank_instance_and_defaults() {
        let mut d = Dispatcher::new();
        d.register_class(calculator());
        let built = d
            .invoke(Some("Calculator"), CONSTRUCTOR, None, vec![])
            .await
            .unwrap();
        let obj = built.as_object().unwrap();
        assert_eq!(obj.class, "Calculator");
        assert_eq!(obj.get("precision"), Some(&Value::Int(2)));
    }

    #[tokio::test]
    async fn invoke_reports_missing_targets_and_failures() {
        let mut d = Dispatcher::new();
        d.register_class(calculator());
        d.register_function(FunctionDef::new("boom", params![], |_| fail!("kaboom")));
        d.register_function(FunctionDef::with_handler(
            "later",
            params![],
            async_handler(|_, _| async { Ok::<_, Failure>(Value::from("done")) }),
        ));

        assert_eq!(
            d.invoke(None, "missing", None, vec![]).await,
            Err(DispatchError::NoSuchFunction("missing".into()))
        );
        assert!(matches!(
            d.invoke(Some("Calculator"), "sub", None, vec![]).await,
            Err(DispatchError::NoSuchMethod { .. })
        ));
        let err = d.invoke(None, "boom", None, vec![]).await.unwrap_err();
        assert_eq!(err, DispatchError::Invocation(Failure::new("kaboom")));
        assert_eq!(
            d.invoke(None, "later", None, vec![]).await.unwrap(),
            Value::from("done")
        );
    }
}
