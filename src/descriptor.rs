//! Structural descriptions of exposed callables.
//!
//! A descriptor captures the shape of a function or class (names, parameters,
//! declared types, defaults, modifiers) without its implementation. Descriptors
//! are immutable values once built and travel as JSON during discovery.

use crate::{
    encoding::{self, EncodedValue},
    types::Value,
};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// Name of the method that constructs an instance of a class.
pub const CONSTRUCTOR: &str = "new";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "info", rename_all = "lowercase")]
pub enum CallableDescriptor {
    Function(FunctionDescriptor),
    Class(ClassDescriptor),
}

impl CallableDescriptor {
    pub fn name(&self) -> &str {
        match self {
            CallableDescriptor::Function(f) => &f.name,
            CallableDescriptor::Class(c) => &c.name,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionDescriptor {
    pub name: String,
    pub parameters: Vec<ParameterDescriptor>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassDescriptor {
    /// Unqualified class name.
    #[serde(rename = "class")]
    pub name: String,
    pub properties: Vec<PropertyDescriptor>,
    pub methods: Vec<MethodDescriptor>,
}

impl ClassDescriptor {
    pub fn method(&self, name: &str) -> Option<&MethodDescriptor> {
        self.methods.iter().find(|m| m.name == name)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParameterDescriptor {
    pub name: String,
    #[serde(rename = "type")]
    pub ty: Option<String>,
    /// `None` means the parameter has no default.
    pub default: Option<EncodedValue>,
    /// Recorded for proxy generation only: arguments always cross the wire by value.
    pub by_reference: bool,
}

impl ParameterDescriptor {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ty: None,
            default: None,
            by_reference: false,
        }
    }

    pub fn typed(mut self, ty: impl Into<String>) -> Self {
        self.ty = Some(ty.into());
        self
    }

    pub fn default_value(mut self, value: impl Into<Value>) -> Self {
        self.default = Some(encoding::encode(&value.into()));
        self
    }

    pub fn by_reference(mut self) -> Self {
        self.by_reference = true;
        self
    }

    pub fn has_default(&self) -> bool {
        self.default.is_some()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PropertyDescriptor {
    pub name: String,
    #[serde(rename = "type")]
    pub ty: Option<String>,
    /// The nil sentinel when the property has no explicit default.
    pub default: EncodedValue,
    pub modifiers: Modifiers,
}

impl PropertyDescriptor {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ty: None,
            default: EncodedValue::nil(),
            modifiers: Modifiers::from_iter(["public"]),
        }
    }

    pub fn typed(mut self, ty: impl Into<String>) -> Self {
        self.ty = Some(ty.into());
        self
    }

    pub fn default_value(mut self, value: impl Into<Value>) -> Self {
        self.default = encoding::encode(&value.into());
        self
    }

    /// Replaces the modifier set.
    pub fn modifiers<I, S>(mut self, modifiers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.modifiers = modifiers.into_iter().collect();
        self
    }

    pub fn is_static(&self) -> bool {
        self.modifiers.contains("static")
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MethodDescriptor {
    pub name: String,
    pub return_type: Option<String>,
    pub modifiers: Modifiers,
    pub parameters: Vec<ParameterDescriptor>,
}

impl MethodDescriptor {
    pub fn new(name: impl Into<String>, parameters: Vec<ParameterDescriptor>) -> Self {
        Self {
            name: name.into(),
            return_type: None,
            modifiers: Modifiers::from_iter(["public"]),
            parameters,
        }
    }

    pub fn returns(mut self, ty: impl Into<String>) -> Self {
        self.return_type = Some(ty.into());
        self
    }

    /// Replaces the modifier set.
    pub fn modifiers<I, S>(mut self, modifiers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.modifiers = modifiers.into_iter().collect();
        self
    }

    pub fn is_static(&self) -> bool {
        self.modifiers.contains("static")
    }

    pub fn is_constructor(&self) -> bool {
        self.name == CONSTRUCTOR
    }
}

/// Keywords in the order they are rendered. Anything else sorts after them.
const CANONICAL_ORDER: [&str; 7] = [
    "abstract",
    "final",
    "public",
    "protected",
    "private",
    "static",
    "readonly",
];

/// A duplicate-free set of modifier keywords kept in canonical order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Vec<String>", into = "Vec<String>")]
pub struct Modifiers(Vec<String>);

impl Modifiers {
    pub fn insert(&mut self, modifier: impl Into<String>) {
        let modifier = modifier.into();
        if let Err(at) = self.0.binary_search_by(|m| canonical_cmp(m, &modifier)) {
            self.0.insert(at, modifier);
        }
    }

    pub fn contains(&self, modifier: &str) -> bool {
        self.0.iter().any(|m| m == modifier)
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

fn canonical_cmp(a: &str, b: &str) -> Ordering {
    let rank = |m: &str| {
        CANONICAL_ORDER
            .iter()
            .position(|k| *k == m)
            .unwrap_or(CANONICAL_ORDER.len())
    };
    rank(a).cmp(&rank(b)).then_with(|| a.cmp(b))
}

impl<S: Into<String>> FromIterator<S> for Modifiers {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        let mut modifiers = Modifiers::default();
        for m in iter {
            modifiers.insert(m);
        }
        modifiers
    }
}

impl From<Vec<String>> for Modifiers {
    fn from(modifiers: Vec<String>) -> Self {
        modifiers.into_iter().collect()
    }
}

impl From<Modifiers> for Vec<String> {
    fn from(modifiers: Modifiers) -> Self {
        modifiers.0
    }
}
