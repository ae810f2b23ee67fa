//! Weakly typed deserializer over the settings tree
//!
//! Setting values are strings, so scalars are coerced to whatever the target
//! field asks for:
//!
//! - `bool`: `true`/`false` (any case), `1`/`0`, empty string is `false`
//! - integers and floats: decimal text, empty string is `0`, `true`/`false` are `1`/`0`
//! - strings: numbers and booleans are rendered, JSON sections become JSON text
//! - sequences: arrays, sections keyed `0`, `1`, … and single values
//! - `null` (a setting without value) gives the type's zero value
//!
//! Struct fields are matched according to [`CasePolicy`]. Errors carry the
//! dotted path of the failing field.

use serde::de::DeserializeSeed;
use serde::de::EnumAccess;
use serde::de::Error as _;
use serde::de::IntoDeserializer;
use serde::de::MapAccess;
use serde::de::SeqAccess;
use serde::de::VariantAccess;
use serde::de::Visitor;
use serde_json::Map;
use serde_json::Number;
use serde_json::Value;

use super::CasePolicy;
use crate::error::BindError;

/// Deserializer for one node of the settings tree.
pub(crate) struct ValueDeserializer {
    value: Value,
    case: CasePolicy,
}

impl ValueDeserializer {
    pub(crate) fn new(value: Value, case: CasePolicy) -> Self {
        Self { value, case }
    }

    fn coerce_i64(&self) -> Result<i64, BindError> {
        match &self.value {
            Value::Null => Ok(0),
            Value::Bool(b) => Ok(i64::from(*b)),
            Value::Number(n) => n
                .as_i64()
                .or_else(|| {
                    whole_f64(n)
                        .filter(|f| *f >= i64::MIN as f64 && *f <= i64::MAX as f64)
                        .map(|f| f as i64)
                })
                .ok_or_else(|| BindError::coercion(n.to_string(), "a signed integer")),
            Value::String(s) => {
                let s = s.trim();
                if s.is_empty() {
                    return Ok(0);
                }
                s.parse::<i64>()
                    .map_err(|_| BindError::coercion(format!("\"{}\"", s), "a signed integer"))
            }
            other => Err(BindError::coercion(describe(other), "a signed integer")),
        }
    }

    fn coerce_u64(&self) -> Result<u64, BindError> {
        match &self.value {
            Value::Null => Ok(0),
            Value::Bool(b) => Ok(u64::from(*b)),
            Value::Number(n) => n
                .as_u64()
                .or_else(|| {
                    whole_f64(n)
                        .filter(|f| *f >= 0.0 && *f <= u64::MAX as f64)
                        .map(|f| f as u64)
                })
                .ok_or_else(|| BindError::coercion(n.to_string(), "an unsigned integer")),
            Value::String(s) => {
                let s = s.trim();
                if s.is_empty() {
                    return Ok(0);
                }
                s.parse::<u64>()
                    .map_err(|_| BindError::coercion(format!("\"{}\"", s), "an unsigned integer"))
            }
            other => Err(BindError::coercion(describe(other), "an unsigned integer")),
        }
    }

    fn coerce_f64(&self) -> Result<f64, BindError> {
        match &self.value {
            Value::Null => Ok(0.0),
            Value::Bool(b) => Ok(if *b { 1.0 } else { 0.0 }),
            Value::Number(n) => n
                .as_f64()
                .ok_or_else(|| BindError::coercion(n.to_string(), "a float")),
            Value::String(s) => {
                let s = s.trim();
                if s.is_empty() {
                    return Ok(0.0);
                }
                s.parse::<f64>()
                    .map_err(|_| BindError::coercion(format!("\"{}\"", s), "a float"))
            }
            other => Err(BindError::coercion(describe(other), "a float")),
        }
    }

    fn coerce_bool(&self) -> Result<bool, BindError> {
        match &self.value {
            Value::Null => Ok(false),
            Value::Bool(b) => Ok(*b),
            Value::Number(n) => Ok(n.as_f64().is_some_and(|f| f != 0.0)),
            Value::String(s) => match s.trim().to_ascii_lowercase().as_str() {
                "true" | "1" => Ok(true),
                "false" | "0" | "" => Ok(false),
                _ => Err(BindError::coercion(format!("\"{}\"", s), "a boolean")),
            },
            other => Err(BindError::coercion(describe(other), "a boolean")),
        }
    }

    fn into_string(self) -> String {
        match self.value {
            Value::Null => String::new(),
            Value::String(s) => s,
            Value::Bool(b) => b.to_string(),
            Value::Number(n) => n.to_string(),
            other => other.to_string(),
        }
    }

    fn into_seq(self) -> Result<Vec<Value>, BindError> {
        match self.value {
            Value::Null => Ok(Vec::new()),
            Value::Array(items) => Ok(items),
            Value::String(s) if s.is_empty() => Ok(Vec::new()),
            Value::Object(map) => indexed_items(map),
            scalar => Ok(vec![scalar]),
        }
    }
}

impl<'de> serde::Deserializer<'de> for ValueDeserializer {
    type Error = BindError;

    fn deserialize_any<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, BindError> {
        let case = self.case;
        match self.value {
            Value::Null => visitor.visit_unit(),
            Value::Bool(b) => visitor.visit_bool(b),
            Value::Number(n) => visit_number(n, visitor),
            Value::String(s) => visitor.visit_string(s),
            Value::Array(items) => visitor.visit_seq(SeqDeserializer::new(items, case)),
            Value::Object(map) => visitor.visit_map(MapDeserializer::new(map, case)),
        }
    }

    fn deserialize_bool<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, BindError> {
        visitor.visit_bool(self.coerce_bool()?)
    }

    fn deserialize_i8<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, BindError> {
        visitor.visit_i64(self.coerce_i64()?)
    }

    fn deserialize_i16<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, BindError> {
        visitor.visit_i64(self.coerce_i64()?)
    }

    fn deserialize_i32<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, BindError> {
        visitor.visit_i64(self.coerce_i64()?)
    }

    fn deserialize_i64<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, BindError> {
        visitor.visit_i64(self.coerce_i64()?)
    }

    fn deserialize_i128<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, BindError> {
        visitor.visit_i128(i128::from(self.coerce_i64()?))
    }

    fn deserialize_u8<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, BindError> {
        visitor.visit_u64(self.coerce_u64()?)
    }

    fn deserialize_u16<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, BindError> {
        visitor.visit_u64(self.coerce_u64()?)
    }

    fn deserialize_u32<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, BindError> {
        visitor.visit_u64(self.coerce_u64()?)
    }

    fn deserialize_u64<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, BindError> {
        visitor.visit_u64(self.coerce_u64()?)
    }

    fn deserialize_u128<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, BindError> {
        visitor.visit_u128(u128::from(self.coerce_u64()?))
    }

    fn deserialize_f32<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, BindError> {
        visitor.visit_f64(self.coerce_f64()?)
    }

    fn deserialize_f64<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, BindError> {
        visitor.visit_f64(self.coerce_f64()?)
    }

    fn deserialize_char<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, BindError> {
        let s = self.into_string();
        let mut chars = s.chars();
        match (chars.next(), chars.next()) {
            (Some(c), None) => visitor.visit_char(c),
            _ => Err(BindError::coercion(format!("\"{}\"", s), "a single character")),
        }
    }

    fn deserialize_str<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, BindError> {
        visitor.visit_string(self.into_string())
    }

    fn deserialize_string<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, BindError> {
        visitor.visit_string(self.into_string())
    }

    fn deserialize_bytes<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, BindError> {
        match self.value {
            Value::String(s) => visitor.visit_byte_buf(s.into_bytes()),
            _ => self.deserialize_seq(visitor),
        }
    }

    fn deserialize_byte_buf<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, BindError> {
        self.deserialize_bytes(visitor)
    }

    fn deserialize_option<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, BindError> {
        match self.value {
            Value::Null => visitor.visit_none(),
            _ => visitor.visit_some(self),
        }
    }

    fn deserialize_unit<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, BindError> {
        match &self.value {
            Value::Null => visitor.visit_unit(),
            Value::String(s) if s.is_empty() => visitor.visit_unit(),
            other => Err(BindError::coercion(describe(other), "nothing")),
        }
    }

    fn deserialize_unit_struct<V: Visitor<'de>>(
        self,
        _name: &'static str,
        visitor: V,
    ) -> Result<V::Value, BindError> {
        self.deserialize_unit(visitor)
    }

    fn deserialize_newtype_struct<V: Visitor<'de>>(
        self,
        _name: &'static str,
        visitor: V,
    ) -> Result<V::Value, BindError> {
        visitor.visit_newtype_struct(self)
    }

    fn deserialize_seq<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, BindError> {
        let case = self.case;
        let items = self.into_seq()?;
        visitor.visit_seq(SeqDeserializer::new(items, case))
    }

    fn deserialize_tuple<V: Visitor<'de>>(
        self,
        _len: usize,
        visitor: V,
    ) -> Result<V::Value, BindError> {
        self.deserialize_seq(visitor)
    }

    fn deserialize_tuple_struct<V: Visitor<'de>>(
        self,
        _name: &'static str,
        _len: usize,
        visitor: V,
    ) -> Result<V::Value, BindError> {
        self.deserialize_seq(visitor)
    }

    fn deserialize_map<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, BindError> {
        match self.value {
            Value::Object(map) => visitor.visit_map(MapDeserializer::new(map, self.case)),
            Value::Null => visitor.visit_map(MapDeserializer::new(Map::new(), self.case)),
            Value::Array(items) if items.is_empty() => {
                visitor.visit_map(MapDeserializer::new(Map::new(), self.case))
            }
            other => Err(BindError::coercion(describe(&other), "a section")),
        }
    }

    fn deserialize_struct<V: Visitor<'de>>(
        self,
        _name: &'static str,
        fields: &'static [&'static str],
        visitor: V,
    ) -> Result<V::Value, BindError> {
        match self.value {
            Value::Object(map) => {
                let map = match self.case {
                    CasePolicy::Sensitive => map,
                    CasePolicy::Insensitive => match_fields(map, fields),
                };
                visitor.visit_map(MapDeserializer::new(map, self.case))
            }
            Value::Null => visitor.visit_map(MapDeserializer::new(Map::new(), self.case)),
            other => Err(BindError::coercion(describe(&other), "a section")),
        }
    }

    fn deserialize_enum<V: Visitor<'de>>(
        self,
        _name: &'static str,
        variants: &'static [&'static str],
        visitor: V,
    ) -> Result<V::Value, BindError> {
        let case = self.case;
        let (variant, value) = match self.value {
            Value::String(s) => (s, None),
            Value::Object(map) if map.len() == 1 => match map.into_iter().next() {
                Some((variant, value)) => (variant, Some(value)),
                None => return Err(BindError::custom("empty enum section")),
            },
            other => {
                return Err(BindError::coercion(
                    describe(&other),
                    "a variant name or a section with one key",
                ));
            }
        };

        let variant = match case {
            CasePolicy::Sensitive => variant,
            CasePolicy::Insensitive => variants
                .iter()
                .find(|v| **v == variant)
                .or_else(|| variants.iter().find(|v| v.eq_ignore_ascii_case(&variant)))
                .map_or(variant, |v| v.to_string()),
        };

        visitor.visit_enum(EnumDeserializer {
            variant,
            value,
            case,
        })
    }

    fn deserialize_identifier<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, BindError> {
        self.deserialize_string(visitor)
    }

    fn deserialize_ignored_any<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, BindError> {
        visitor.visit_unit()
    }
}

// =============================================================================
// Access helpers
// =============================================================================

struct SeqDeserializer {
    iter: std::vec::IntoIter<Value>,
    index: usize,
    case: CasePolicy,
}

impl SeqDeserializer {
    fn new(items: Vec<Value>, case: CasePolicy) -> Self {
        Self {
            iter: items.into_iter(),
            index: 0,
            case,
        }
    }
}

impl<'de> SeqAccess<'de> for SeqDeserializer {
    type Error = BindError;

    fn next_element_seed<T: DeserializeSeed<'de>>(
        &mut self,
        seed: T,
    ) -> Result<Option<T::Value>, BindError> {
        let Some(value) = self.iter.next() else {
            return Ok(None);
        };

        let index = self.index;
        self.index += 1;
        seed.deserialize(ValueDeserializer::new(value, self.case))
            .map(Some)
            .map_err(|e| e.at(&index.to_string()))
    }

    fn size_hint(&self) -> Option<usize> {
        Some(self.iter.len())
    }
}

struct MapDeserializer {
    iter: serde_json::map::IntoIter,
    current: Option<(String, Value)>,
    case: CasePolicy,
}

impl MapDeserializer {
    fn new(map: Map<String, Value>, case: CasePolicy) -> Self {
        Self {
            iter: map.into_iter(),
            current: None,
            case,
        }
    }
}

impl<'de> MapAccess<'de> for MapDeserializer {
    type Error = BindError;

    fn next_key_seed<K: DeserializeSeed<'de>>(
        &mut self,
        seed: K,
    ) -> Result<Option<K::Value>, BindError> {
        let Some((key, value)) = self.iter.next() else {
            return Ok(None);
        };

        let parsed = seed
            .deserialize(ValueDeserializer::new(Value::String(key.clone()), self.case))
            .map_err(|e| e.at(&key))?;
        self.current = Some((key, value));
        Ok(Some(parsed))
    }

    fn next_value_seed<V: DeserializeSeed<'de>>(&mut self, seed: V) -> Result<V::Value, BindError> {
        match self.current.take() {
            Some((key, value)) => seed
                .deserialize(ValueDeserializer::new(value, self.case))
                .map_err(|e| e.at(&key)),
            None => Err(BindError::custom("value requested before key")),
        }
    }

    fn size_hint(&self) -> Option<usize> {
        Some(self.iter.len())
    }
}

struct EnumDeserializer {
    variant: String,
    value: Option<Value>,
    case: CasePolicy,
}

impl<'de> EnumAccess<'de> for EnumDeserializer {
    type Error = BindError;
    type Variant = VariantDeserializer;

    fn variant_seed<V: DeserializeSeed<'de>>(
        self,
        seed: V,
    ) -> Result<(V::Value, VariantDeserializer), BindError> {
        let variant = self.variant.clone();
        let tag = seed.deserialize(<String as IntoDeserializer<'de, BindError>>::into_deserializer(
            self.variant,
        ))?;
        Ok((tag, VariantDeserializer {
            variant,
            value: self.value,
            case: self.case,
        }))
    }
}

struct VariantDeserializer {
    variant: String,
    value: Option<Value>,
    case: CasePolicy,
}

impl VariantDeserializer {
    fn content(self) -> ValueDeserializer {
        ValueDeserializer::new(self.value.unwrap_or(Value::Null), self.case)
    }
}

impl<'de> VariantAccess<'de> for VariantDeserializer {
    type Error = BindError;

    fn unit_variant(self) -> Result<(), BindError> {
        match self.value {
            None | Some(Value::Null) => Ok(()),
            Some(other) => {
                Err(BindError::coercion(describe(&other), "a unit variant").at(&self.variant))
            }
        }
    }

    fn newtype_variant_seed<T: DeserializeSeed<'de>>(self, seed: T) -> Result<T::Value, BindError> {
        let variant = self.variant.clone();
        seed.deserialize(self.content()).map_err(|e| e.at(&variant))
    }

    fn tuple_variant<V: Visitor<'de>>(self, _len: usize, visitor: V) -> Result<V::Value, BindError> {
        let variant = self.variant.clone();
        serde::Deserializer::deserialize_seq(self.content(), visitor).map_err(|e| e.at(&variant))
    }

    fn struct_variant<V: Visitor<'de>>(
        self,
        fields: &'static [&'static str],
        visitor: V,
    ) -> Result<V::Value, BindError> {
        let variant = self.variant.clone();
        serde::Deserializer::deserialize_struct(self.content(), "", fields, visitor)
            .map_err(|e| e.at(&variant))
    }
}

// =============================================================================
// Helpers
// =============================================================================

/// Renames keys to the struct's field names, ignoring ASCII case. An exact
/// key wins over a case-insensitive one; unmatched keys are kept.
fn match_fields(map: Map<String, Value>, fields: &[&str]) -> Map<String, Value> {
    let mut matched = Map::new();
    let mut loose = Vec::new();

    for (key, value) in map {
        if fields.contains(&key.as_str()) {
            matched.insert(key, value);
        } else {
            loose.push((key, value));
        }
    }

    for (key, value) in loose {
        let target = fields
            .iter()
            .find(|f| f.eq_ignore_ascii_case(&key))
            .map_or_else(|| key.clone(), |f| f.to_string());

        if matched.contains_key(&target) {
            log::debug!("Ignoring '{}', field '{}' is already bound", key, target);
            continue;
        }
        matched.insert(target, value);
    }

    matched
}

/// Orders a section keyed `0`, `1`, … as a sequence.
fn indexed_items(map: Map<String, Value>) -> Result<Vec<Value>, BindError> {
    let mut items = Vec::with_capacity(map.len());
    for (key, value) in map {
        match key.parse::<usize>() {
            Ok(index) => items.push((index, value)),
            Err(_) => {
                return Err(BindError::coercion(
                    format!("section with key '{}'", key),
                    "a sequence",
                ));
            }
        }
    }

    items.sort_by_key(|(index, _)| *index);
    Ok(items.into_iter().map(|(_, value)| value).collect())
}

fn visit_number<'de, V: Visitor<'de>>(n: Number, visitor: V) -> Result<V::Value, BindError> {
    if let Some(u) = n.as_u64() {
        visitor.visit_u64(u)
    } else if let Some(i) = n.as_i64() {
        visitor.visit_i64(i)
    } else {
        match n.as_f64() {
            Some(f) => visitor.visit_f64(f),
            None => Err(BindError::coercion(n.to_string(), "a number")),
        }
    }
}

fn whole_f64(n: &Number) -> Option<f64> {
    n.as_f64().filter(|f| f.fract() == 0.0)
}

fn describe(value: &Value) -> String {
    match value {
        Value::Null => "null".to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        Value::String(s) => format!("\"{}\"", s),
        Value::Array(_) => "a sequence".to_string(),
        Value::Object(_) => "a section".to_string(),
    }
}
