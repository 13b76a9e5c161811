use super::Template;
use crate::{
    calling::SEPARATOR,
    descriptor::{
        ClassDescriptor, FunctionDescriptor, MethodDescriptor, Modifiers, ParameterDescriptor,
        PropertyDescriptor,
    },
    types::Value,
};
use std::fmt::{self, Write};

const KEYWORDS: &[&str] = &[
    "as", "async", "await", "break", "const", "continue", "dyn", "else", "enum", "extern", "false",
    "fn", "for", "if", "impl", "in", "let", "loop", "match", "mod", "move", "mut", "pub", "ref",
    "return", "static", "struct", "trait", "true", "type", "unsafe", "use", "where", "while",
    "abstract", "become", "box", "do", "final", "macro", "override", "priv", "try", "typeof",
    "unsized", "virtual", "yield",
];

/// Names the generated code uses for its own locals, fields and helpers.
const SCAFFOLDING: &[&str] = &[
    "mirror",
    "this",
    "outcome",
    "mirror_blank",
    "mirror_state",
    "mirror_hydrate",
];

/// Async Rust proxies over [`Forwarder`](crate::Forwarder).
///
/// Each class becomes a struct borrowing the forwarder, with one `Value` field
/// per instance property. Parameters with defaults become `Option<Value>`;
/// by-reference parameters become `&mut Value` but are still sent by value,
/// so remote mutations are not written back.
#[derive(Debug, Clone)]
pub struct RustTemplate {
    /// Path the generated code imports the runtime from.
    pub crate_path: String,
    /// Wraps everything in `pub mod <module>` when set.
    pub module: Option<String>,
}

impl Default for RustTemplate {
    fn default() -> Self {
        Self {
            crate_path: "rpcmirror".to_owned(),
            module: None,
        }
    }
}

impl RustTemplate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn in_module(mut self, module: impl Into<String>) -> Self {
        self.module = Some(module.into());
        self
    }

    fn indent(&self) -> &'static str {
        if self.module.is_some() {
            "    "
        } else {
            ""
        }
    }

    /// `(signature params, argument expressions, default-filling statements)`
    fn parameters(&self, params: &[ParameterDescriptor]) -> (Vec<String>, Vec<String>, Vec<String>) {
        let mut sig = Vec::new();
        let mut args = Vec::new();
        let mut fills = Vec::new();
        for p in params {
            let name = ident(&p.name);
            if p.by_reference {
                sig.push(format!("{name}: &mut Value"));
                args.push(format!("{name}.clone()"));
                continue;
            }
            let default = p.default.as_ref().and_then(|d| d.decode().ok());
            match default {
                Some(default) => {
                    sig.push(format!("{name}: Option<Value>"));
                    fills.push(format!(
                        "let {name} = {name}.unwrap_or_else(|| {});",
                        self.literal(&default)
                    ));
                }
                None => sig.push(format!("{name}: Value")),
            }
            args.push(name);
        }
        (sig, args, fills)
    }

    fn method(&self, class: &ClassDescriptor, method: &MethodDescriptor, out: &mut dyn Write) -> fmt::Result {
        let i = self.indent();
        let (mut sig, args, fills) = self.parameters(&method.parameters);
        let target = format!("{}{SEPARATOR}{}", class.name, method.name);
        let vis = self.modifiers(&method.modifiers);

        writeln!(out)?;
        writeln!(out, "{i}    /// Remote `{target}`.")?;
        if !method.modifiers.is_empty() {
            let names: Vec<_> = method.modifiers.iter().collect();
            writeln!(out, "{i}    /// Modifiers: {}.", names.join(" "))?;
        }
        if let Some(ret) = &method.return_type {
            writeln!(out, "{i}    /// Returns `{ret}`.")?;
        }

        if method.is_constructor() {
            sig.insert(0, "mirror: &'m Forwarder".to_owned());
            writeln!(
                out,
                "{i}    {vis}async fn {}({}) -> Result<Self, CallError> {{",
                ident(&method.name),
                sig.join(", ")
            )?;
            for fill in &fills {
                writeln!(out, "{i}        {fill}")?;
            }
            writeln!(out, "{i}        let mut this = Self::mirror_blank(mirror);")?;
            writeln!(
                out,
                "{i}        let outcome = mirror.call({target:?}, vec![{}], Some(this.mirror_state())).await?;",
                args.join(", ")
            )?;
            writeln!(out, "{i}        this.mirror_hydrate(outcome.result);")?;
            writeln!(out, "{i}        Ok(this)")?;
        } else if method.is_static() {
            sig.insert(0, "mirror: &'m Forwarder".to_owned());
            writeln!(
                out,
                "{i}    {vis}async fn {}({}) -> Result<Value, CallError> {{",
                ident(&method.name),
                sig.join(", ")
            )?;
            for fill in &fills {
                writeln!(out, "{i}        {fill}")?;
            }
            writeln!(
                out,
                "{i}        Ok(mirror.call({target:?}, vec![{}], None).await?.result)",
                args.join(", ")
            )?;
        } else {
            sig.insert(0, "&self".to_owned());
            writeln!(
                out,
                "{i}    {vis}async fn {}({}) -> Result<Value, CallError> {{",
                ident(&method.name),
                sig.join(", ")
            )?;
            for fill in &fills {
                writeln!(out, "{i}        {fill}")?;
            }
            writeln!(
                out,
                "{i}        Ok(self.mirror.call({target:?}, vec![{}], Some(self.mirror_state())).await?.result)",
                args.join(", ")
            )?;
        }
        writeln!(out, "{i}    }}")
    }
}

impl Template for RustTemplate {
    fn prelude(&self, out: &mut dyn Write) -> fmt::Result {
        writeln!(out, "// Generated by rpcmirror. Every call is forwarded to the remote exposer.")?;
        if let Some(module) = &self.module {
            writeln!(out)?;
            writeln!(out, "pub mod {} {{", ident(module))?;
        }
        let i = self.indent();
        writeln!(out, "{i}#[allow(unused_imports)]")?;
        writeln!(out, "{i}use {}::{{CallError, Forwarder, Object, Value}};", self.crate_path)
    }

    fn epilogue(&self, out: &mut dyn Write) -> fmt::Result {
        if self.module.is_some() {
            writeln!(out, "}}")?;
        }
        Ok(())
    }

    fn literal(&self, value: &Value) -> String {
        match value {
            Value::Nil => "Value::Nil".to_owned(),
            Value::Bool(b) => format!("Value::Bool({b})"),
            Value::Int(n) => format!("Value::Int({n})"),
            Value::Float(x) if x.is_nan() => "Value::Float(f64::NAN)".to_owned(),
            Value::Float(x) if x.is_infinite() && *x > 0.0 => "Value::Float(f64::INFINITY)".to_owned(),
            Value::Float(x) if x.is_infinite() => "Value::Float(f64::NEG_INFINITY)".to_owned(),
            Value::Float(x) => format!("Value::Float({x:?})"),
            Value::String(s) => format!("Value::String({s:?}.to_owned())"),
            Value::Bytes(b) => format!("Value::Bytes(vec!{b:?})"),
            Value::List(items) => {
                let items: Vec<_> = items.iter().map(|v| self.literal(v)).collect();
                format!("Value::List(vec![{}])", items.join(", "))
            }
            Value::Map(map) => {
                let entries: Vec<_> = map
                    .iter()
                    .map(|(k, v)| format!("({k:?}.to_owned(), {})", self.literal(v)))
                    .collect();
                format!("Value::Map([{}].into_iter().collect())", entries.join(", "))
            }
            Value::Object(obj) => {
                let mut expr = format!("Object::new({:?})", obj.class);
                for (name, v) in &obj.fields {
                    expr.push_str(&format!(".with({name:?}, {})", self.literal(v)));
                }
                format!("Value::Object({expr})")
            }
        }
    }

    fn modifiers(&self, modifiers: &Modifiers) -> String {
        if modifiers.contains("private") {
            String::new()
        } else if modifiers.contains("protected") {
            "pub(crate) ".to_owned()
        } else {
            "pub ".to_owned()
        }
    }

    fn class(&self, class: &ClassDescriptor, out: &mut dyn Write) -> fmt::Result {
        let i = self.indent();
        let name = ident(&class.name);
        let (statics, fields): (Vec<_>, Vec<_>) = class.properties.iter().partition(|p| p.is_static());
        let default_of = |p: &PropertyDescriptor| {
            self.literal(&p.default.decode().unwrap_or(Value::Nil))
        };

        writeln!(out, "{i}/// Proxy for the remote class `{}`.", class.name)?;
        writeln!(out, "{i}pub struct {name}<'m> {{")?;
        writeln!(out, "{i}    mirror: &'m Forwarder,")?;
        for p in &fields {
            if let Some(ty) = &p.ty {
                writeln!(out, "{i}    /// Remote type `{ty}`.")?;
            }
            writeln!(out, "{i}    {}{}: Value,", self.modifiers(&p.modifiers), ident(&p.name))?;
        }
        writeln!(out, "{i}}}")?;
        writeln!(out)?;
        writeln!(out, "{i}impl<'m> {name}<'m> {{")?;

        // local state helpers
        writeln!(out, "{i}    pub fn mirror_blank(mirror: &'m Forwarder) -> Self {{")?;
        writeln!(out, "{i}        Self {{")?;
        writeln!(out, "{i}            mirror,")?;
        for p in &fields {
            writeln!(out, "{i}            {}: {},", ident(&p.name), default_of(*p))?;
        }
        writeln!(out, "{i}        }}")?;
        writeln!(out, "{i}    }}")?;
        writeln!(out)?;
        writeln!(out, "{i}    pub fn mirror_state(&self) -> Value {{")?;
        write!(out, "{i}        Value::Object(Object::new({:?})", class.name)?;
        for p in &fields {
            write!(out, ".with({:?}, self.{}.clone())", p.name, ident(&p.name))?;
        }
        writeln!(out, ")")?;
        writeln!(out, "{i}    }}")?;
        writeln!(out)?;
        writeln!(out, "{i}    pub fn mirror_hydrate(&mut self, state: Value) {{")?;
        if fields.is_empty() {
            writeln!(out, "{i}        let _ = state;")?;
        } else {
            writeln!(out, "{i}        let Value::Object(state) = state else {{ return }};")?;
            for p in &fields {
                writeln!(
                    out,
                    "{i}        if let Some(v) = state.get({:?}) {{ self.{} = v.clone(); }}",
                    p.name,
                    ident(&p.name)
                )?;
            }
        }
        writeln!(out, "{i}    }}")?;

        for p in &statics {
            writeln!(out)?;
            writeln!(out, "{i}    /// Default of the remote static `{}`.", p.name)?;
            writeln!(
                out,
                "{i}    {}fn {}() -> Value {{",
                self.modifiers(&p.modifiers),
                ident(&p.name)
            )?;
            writeln!(out, "{i}        {}", default_of(*p))?;
            writeln!(out, "{i}    }}")?;
        }

        for method in &class.methods {
            self.method(class, method, out)?;
        }
        writeln!(out, "{i}}}")
    }

    fn function(&self, function: &FunctionDescriptor, out: &mut dyn Write) -> fmt::Result {
        let i = self.indent();
        let (mut sig, args, fills) = self.parameters(&function.parameters);
        sig.insert(0, "mirror: &Forwarder".to_owned());
        writeln!(out, "{i}/// Remote function `{}`.", function.name)?;
        writeln!(
            out,
            "{i}pub async fn {}({}) -> Result<Value, CallError> {{",
            ident(&function.name),
            sig.join(", ")
        )?;
        for fill in &fills {
            writeln!(out, "{i}    {fill}")?;
        }
        writeln!(
            out,
            "{i}    Ok(mirror.call({:?}, vec![{}], None).await?.result)",
            function.name,
            args.join(", ")
        )?;
        writeln!(out, "{i}}}")
    }
}

/// `name` as a usable Rust identifier.
fn ident(name: &str) -> String {
    match name {
        "self" | "Self" | "super" | "crate" | "_" => format!("{name}_"),
        _ if SCAFFOLDING.contains(&name) => format!("{name}_"),
        _ if KEYWORDS.contains(&name) => format!("r#{name}"),
        _ => name.to_owned(),
    }
}
