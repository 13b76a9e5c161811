//! `Deserialize` for [`Value`] and [`Object`] with a bound on nesting.
//!
//! The derived impls recurse once per level of nesting, so a short payload of
//! repeated list headers could exhaust the stack. These impls read the same
//! representation the derived `Serialize` writes and fail past [`MAX_DEPTH`].

use super::{Object, Value};
use serde::de::{
    self, DeserializeSeed, Deserializer, EnumAccess, IgnoredAny, MapAccess, SeqAccess,
    VariantAccess, Visitor,
};
use serde::Deserialize;
use std::{collections::BTreeMap, fmt};

/// Deepest nesting of lists, maps and objects a decoded value may have.
pub const MAX_DEPTH: usize = 128;

const VARIANTS: &[&str] = &[
    "Nil", "Bool", "Int", "Float", "String", "Bytes", "List", "Map", "Object",
];
const OBJECT_FIELDS: &[&str] = &["class", "fields"];

// Length prefixes are untrusted.
const MAX_PREALLOC: usize = 1024;

impl<'de> Deserialize<'de> for Value {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        ValueSeed { depth: 0 }.deserialize(deserializer)
    }
}

impl<'de> Deserialize<'de> for Object {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        ObjectSeed { depth: 0 }.deserialize(deserializer)
    }
}

enum Kind {
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

impl<'de> Deserialize<'de> for Kind {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_identifier(KindVisitor)
    }
}

struct KindVisitor;

impl<'de> Visitor<'de> for KindVisitor {
    type Value = Kind;

    fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("a value variant")
    }

    fn visit_u64<E: de::Error>(self, index: u64) -> Result<Kind, E> {
        Ok(match index {
            0 => Kind::Nil,
            1 => Kind::Bool,
            2 => Kind::Int,
            3 => Kind::Float,
            4 => Kind::String,
            5 => Kind::Bytes,
            6 => Kind::List,
            7 => Kind::Map,
            8 => Kind::Object,
            _ => return Err(E::invalid_value(de::Unexpected::Unsigned(index), &self)),
        })
    }

    fn visit_str<E: de::Error>(self, name: &str) -> Result<Kind, E> {
        Ok(match name {
            "Nil" => Kind::Nil,
            "Bool" => Kind::Bool,
            "Int" => Kind::Int,
            "Float" => Kind::Float,
            "String" => Kind::String,
            "Bytes" => Kind::Bytes,
            "List" => Kind::List,
            "Map" => Kind::Map,
            "Object" => Kind::Object,
            _ => return Err(E::unknown_variant(name, VARIANTS)),
        })
    }
}

#[derive(Clone, Copy)]
struct ValueSeed {
    depth: usize,
}

impl ValueSeed {
    /// The seed for the elements of a container at this depth.
    fn nested<E: de::Error>(self) -> Result<ValueSeed, E> {
        if self.depth >= MAX_DEPTH {
            return Err(E::custom(format_args!(
                "value nested deeper than {MAX_DEPTH} levels"
            )));
        }
        Ok(ValueSeed {
            depth: self.depth + 1,
        })
    }
}

impl<'de> DeserializeSeed<'de> for ValueSeed {
    type Value = Value;

    fn deserialize<D: Deserializer<'de>>(self, deserializer: D) -> Result<Value, D::Error> {
        deserializer.deserialize_enum("Value", VARIANTS, self)
    }
}

impl<'de> Visitor<'de> for ValueSeed {
    type Value = Value;

    fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("a value")
    }

    fn visit_enum<A: EnumAccess<'de>>(self, data: A) -> Result<Value, A::Error> {
        let (kind, variant) = data.variant::<Kind>()?;
        Ok(match kind {
            Kind::Nil => {
                variant.unit_variant()?;
                Value::Nil
            }
            Kind::Bool => Value::Bool(variant.newtype_variant()?),
            Kind::Int => Value::Int(variant.newtype_variant()?),
            Kind::Float => Value::Float(variant.newtype_variant()?),
            Kind::String => Value::String(variant.newtype_variant()?),
            Kind::Bytes => Value::Bytes(variant.newtype_variant()?),
            Kind::List => {
                let inner = self.nested::<A::Error>()?;
                Value::List(variant.newtype_variant_seed(ListSeed(inner))?)
            }
            Kind::Map => {
                let inner = self.nested::<A::Error>()?;
                Value::Map(variant.newtype_variant_seed(MapSeed(inner))?)
            }
            Kind::Object => {
                let inner = self.nested::<A::Error>()?;
                Value::Object(variant.newtype_variant_seed(ObjectSeed { depth: inner.depth })?)
            }
        })
    }
}

struct ListSeed(ValueSeed);

impl<'de> DeserializeSeed<'de> for ListSeed {
    type Value = Vec<Value>;

    fn deserialize<D: Deserializer<'de>>(self, deserializer: D) -> Result<Vec<Value>, D::Error> {
        deserializer.deserialize_seq(self)
    }
}

impl<'de> Visitor<'de> for ListSeed {
    type Value = Vec<Value>;

    fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("a list of values")
    }

    fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> Result<Vec<Value>, A::Error> {
        let mut items = Vec::with_capacity(seq.size_hint().unwrap_or(0).min(MAX_PREALLOC));
        while let Some(item) = seq.next_element_seed(self.0)? {
            items.push(item);
        }
        Ok(items)
    }
}

struct MapSeed(ValueSeed);

impl<'de> DeserializeSeed<'de> for MapSeed {
    type Value = BTreeMap<String, Value>;

    fn deserialize<D: Deserializer<'de>>(self, deserializer: D) -> Result<Self::Value, D::Error> {
        deserializer.deserialize_map(self)
    }
}

impl<'de> Visitor<'de> for MapSeed {
    type Value = BTreeMap<String, Value>;

    fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("a map of values")
    }

    fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<Self::Value, A::Error> {
        let mut entries = BTreeMap::new();
        while let Some(key) = map.next_key::<String>()? {
            let value = map.next_value_seed(self.0)?;
            entries.insert(key, value);
        }
        Ok(entries)
    }
}

/// `depth` is the depth of the object's field values.
#[derive(Clone, Copy)]
struct ObjectSeed {
    depth: usize,
}

impl<'de> DeserializeSeed<'de> for ObjectSeed {
    type Value = Object;

    fn deserialize<D: Deserializer<'de>>(self, deserializer: D) -> Result<Object, D::Error> {
        deserializer.deserialize_struct("Object", OBJECT_FIELDS, self)
    }
}

impl<'de> Visitor<'de> for ObjectSeed {
    type Value = Object;

    fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("an object")
    }

    fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> Result<Object, A::Error> {
        let class = seq
            .next_element::<String>()?
            .ok_or_else(|| <A::Error as de::Error>::invalid_length(0, &self))?;
        let fields = seq
            .next_element_seed(FieldsSeed(ValueSeed { depth: self.depth }))?
            .ok_or_else(|| <A::Error as de::Error>::invalid_length(1, &self))?;
        Ok(Object { class, fields })
    }

    fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<Object, A::Error> {
        let mut class = None;
        let mut fields = None;
        while let Some(key) = map.next_key::<String>()? {
            match key.as_str() {
                "class" => class = Some(map.next_value::<String>()?),
                "fields" => {
                    fields = Some(map.next_value_seed(FieldsSeed(ValueSeed { depth: self.depth }))?)
                }
                _ => {
                    map.next_value::<IgnoredAny>()?;
                }
            }
        }
        Ok(Object {
            class: class.ok_or_else(|| <A::Error as de::Error>::missing_field("class"))?,
            fields: fields.ok_or_else(|| <A::Error as de::Error>::missing_field("fields"))?,
        })
    }
}

struct FieldsSeed(ValueSeed);

impl<'de> DeserializeSeed<'de> for FieldsSeed {
    type Value = Vec<(String, Value)>;

    fn deserialize<D: Deserializer<'de>>(self, deserializer: D) -> Result<Self::Value, D::Error> {
        deserializer.deserialize_seq(self)
    }
}

impl<'de> Visitor<'de> for FieldsSeed {
    type Value = Vec<(String, Value)>;

    fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("a list of named fields")
    }

    fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> Result<Self::Value, A::Error> {
        let mut fields = Vec::with_capacity(seq.size_hint().unwrap_or(0).min(MAX_PREALLOC));
        while let Some(field) = seq.next_element_seed(FieldSeed(self.0))? {
            fields.push(field);
        }
        Ok(fields)
    }
}

struct FieldSeed(ValueSeed);

impl<'de> DeserializeSeed<'de> for FieldSeed {
    type Value = (String, Value);

    fn deserialize<D: Deserializer<'de>>(self, deserializer: D) -> Result<Self::Value, D::Error> {
        deserializer.deserialize_tuple(2, self)
    }
}

impl<'de> Visitor<'de> for FieldSeed {
    type Value = (String, Value);

    fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("a field name and value")
    }

    fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> Result<Self::Value, A::Error> {
        let name = seq
            .next_element::<String>()?
            .ok_or_else(|| <A::Error as de::Error>::invalid_length(0, &self))?;
        let value = seq
            .next_element_seed(self.0)?
            .ok_or_else(|| <A::Error as de::Error>::invalid_length(1, &self))?;
        Ok((name, value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn nested_list(depth: usize) -> Value {
        (0..depth).fold(Value::Nil, |inner, _| Value::List(vec![inner]))
    }

    #[test]
    fn nesting_up_to_the_limit_round_trips() {
        let value = Value::Object(
            Object::new("Deep")
                .with("list", nested_list(MAX_DEPTH - 1))
                .with("flat", 3i64),
        );
        let bytes = bincode::serialize(&value).unwrap();
        assert_eq!(bincode::deserialize::<Value>(&bytes).unwrap(), value);
    }

    #[test]
    fn nesting_past_the_limit_is_rejected() {
        let bytes = bincode::serialize(&nested_list(MAX_DEPTH + 1)).unwrap();
        let err = bincode::deserialize::<Value>(&bytes).unwrap_err();
        assert!(err.to_string().contains("nested deeper"));
    }

    #[test]
    fn list_headers_alone_do_not_recurse_unbounded() {
        // 6 is the List variant, followed by a one-element length prefix
        let mut bytes = Vec::new();
        for _ in 0..20_000 {
            bytes.extend(6u32.to_le_bytes());
            bytes.extend(1u64.to_le_bytes());
        }
        bytes.extend(0u32.to_le_bytes());
        assert!(bincode::deserialize::<Value>(&bytes).is_err());
    }

    #[test]
    fn self_describing_formats_agree_with_serialize() {
        let value = Value::List(vec![
            Value::Nil,
            Value::Bool(false),
            Value::Int(-9),
            Value::Float(0.5),
            Value::from("s"),
            Value::Bytes(vec![1, 2]),
            Value::Map(BTreeMap::from([("k".to_owned(), Value::Int(1))])),
            Value::Object(Object::new("P").with("x", 1i64)),
        ]);
        let json = serde_json::to_string(&value).unwrap();
        assert_eq!(serde_json::from_str::<Value>(&json).unwrap(), value);
    }

    #[test]
    fn unknown_variant_index_is_an_error() {
        assert!(bincode::deserialize::<Value>(&9u32.to_le_bytes()).is_err());
    }
}
