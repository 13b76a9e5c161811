use serde::{Deserialize, Serialize};
use std::{collections::BTreeMap, error::Error, fmt};

mod de;

pub use de::MAX_DEPTH;

/// The tag of a [`Value`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
pub enum Type {
    Nil,
    Bool,
    Int,
    Float,
    String,
    Bytes,
    List,
    Map,
    Object,
}

impl Type {
    fn name(&self) -> &'static str {
        use Type::*;
        match self {
            Nil => "Nil",
            Bool => "Bool",
            Int => "Int",
            Float => "Float",
            String => "String",
            Bytes => "Bytes",
            List => "List",
            Map => "Map",
            Object => "Object",
        }
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A value that can cross the wire between a caller and an exposer.
///
/// Objects travel as data: a class name plus their fields in declaration order.
/// Decoding rejects values nested deeper than [`MAX_DEPTH`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum Value {
    Nil,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
    Bytes(Vec<u8>),
    List(Vec<Value>),
    Map(BTreeMap<String, Value>),
    Object(Object),
}

impl Value {
    pub fn rpc_type(&self) -> Type {
        match self {
            Value::Nil => Type::Nil,
            Value::Bool(_) => Type::Bool,
            Value::Int(_) => Type::Int,
            Value::Float(_) => Type::Float,
            Value::String(_) => Type::String,
            Value::Bytes(_) => Type::Bytes,
            Value::List(_) => Type::List,
            Value::Map(_) => Type::Map,
            Value::Object(_) => Type::Object,
        }
    }

    pub fn is_nil(&self) -> bool {
        matches!(self, Value::Nil)
    }

    pub fn as_object(&self) -> Option<&Object> {
        match self {
            Value::Object(obj) => Some(obj),
            _ => None,
        }
    }
}

/// The state of an instance: its class name and named fields.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Object {
    pub class: String,
    pub fields: Vec<(String, Value)>,
}

impl Object {
    pub fn new(class: impl Into<String>) -> Self {
        Self {
            class: class.into(),
            fields: Vec::new(),
        }
    }

    /// Builder-style [`Object::set`].
    pub fn with(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.set(name, value);
        self
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.fields.iter().find(|(n, _)| n == name).map(|(_, v)| v)
    }

    /// Overwrites the field if present, otherwise appends it.
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        let name = name.into();
        let value = value.into();
        match self.fields.iter_mut().find(|(n, _)| *n == name) {
            Some((_, slot)) => *slot = value,
            None => self.fields.push((name, value)),
        }
    }
}

pub trait Encode {
    fn encode(val: Self) -> Value;
}

pub trait Decode: Sized {
    fn decode(val: Value) -> Result<Self, TypeMismatch>;
}

macro_rules! impl_encode_decode {
    ($rust_type:ty, $rpc_type:expr, $encode_name:pat => $encode_expr:expr, $($from_rpc_arm:tt)*) => {
        impl Encode for $rust_type {
            fn encode($encode_name: $rust_type) -> Value {
                $encode_expr
            }
        }

        impl Decode for $rust_type {
            fn decode(val: Value) -> Result<Self, TypeMismatch> {
                Ok(match val {
                    $($from_rpc_arm)*,
                    _ => return Err(TypeMismatch::new(val, $rpc_type))
                })
            }
        }

        impl From<$rust_type> for Value {
            fn from(val: $rust_type) -> Value {
                <$rust_type as Encode>::encode(val)
            }
        }
    };
}

impl_encode_decode!((), Type::Nil, () => Value::Nil, Value::Nil => ());
impl_encode_decode!(bool, Type::Bool, b => Value::Bool(b), Value::Bool(b) => b);
impl_encode_decode!(i64, Type::Int, n => Value::Int(n), Value::Int(n) => n);
impl_encode_decode!(f64, Type::Float, x => Value::Float(x), Value::Float(x) => x);
impl_encode_decode!(String, Type::String, s => Value::String(s), Value::String(s) => s);
impl_encode_decode!(Object, Type::Object, o => Value::Object(o), Value::Object(o) => o);

impl Encode for i32 {
    fn encode(val: i32) -> Value {
        Value::Int(val.into())
    }
}

impl Decode for i32 {
    fn decode(val: Value) -> Result<Self, TypeMismatch> {
        match val {
            Value::Int(n) => i32::try_from(n).map_err(|_| TypeMismatch::new(val, Type::Int)),
            _ => Err(TypeMismatch::new(val, Type::Int)),
        }
    }
}

impl From<i32> for Value {
    fn from(val: i32) -> Value {
        i32::encode(val)
    }
}

impl Encode for u32 {
    fn encode(val: u32) -> Value {
        Value::Int(val.into())
    }
}

impl Decode for u32 {
    fn decode(val: Value) -> Result<Self, TypeMismatch> {
        match val {
            Value::Int(n) => u32::try_from(n).map_err(|_| TypeMismatch::new(val, Type::Int)),
            _ => Err(TypeMismatch::new(val, Type::Int)),
        }
    }
}

impl From<u32> for Value {
    fn from(val: u32) -> Value {
        u32::encode(val)
    }
}

impl Encode for &str {
    fn encode(val: Self) -> Value {
        Value::String(val.to_owned())
    }
}

impl From<&str> for Value {
    fn from(val: &str) -> Value {
        <&str>::encode(val)
    }
}

impl Encode for Value {
    fn encode(val: Value) -> Value {
        val
    }
}

impl Decode for Value {
    fn decode(val: Value) -> Result<Self, TypeMismatch> {
        Ok(val)
    }
}

impl<T: Encode> Encode for Vec<T> {
    fn encode(val: Vec<T>) -> Value {
        Value::List(val.into_iter().map(T::encode).collect())
    }
}

impl<T: Decode> Decode for Vec<T> {
    fn decode(val: Value) -> Result<Self, TypeMismatch> {
        match val {
            Value::List(items) => items.into_iter().map(T::decode).collect(),
            _ => Err(TypeMismatch::new(val, Type::List)),
        }
    }
}

impl<T: Encode> From<Vec<T>> for Value {
    fn from(val: Vec<T>) -> Value {
        Vec::<T>::encode(val)
    }
}

/// `None` is carried as [`Value::Nil`].
impl<T: Encode> Encode for Option<T> {
    fn encode(val: Option<T>) -> Value {
        val.map_or(Value::Nil, T::encode)
    }
}

impl<T: Decode> Decode for Option<T> {
    fn decode(val: Value) -> Result<Self, TypeMismatch> {
        match val {
            Value::Nil => Ok(None),
            other => T::decode(other).map(Some),
        }
    }
}

#[derive(Debug, Clone)]
pub struct TypeMismatch {
    value: Value,
    expected_type: Type,
}

impl TypeMismatch {
    pub fn new(value: Value, expected_type: Type) -> Self {
        Self {
            value,
            expected_type,
        }
    }

    pub fn expected_type(&self) -> Type {
        self.expected_type
    }
}

impl fmt::Display for TypeMismatch {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "Type error: {:?} :/: {}", self.value, self.expected_type)
    }
}

impl Error for TypeMismatch {}
