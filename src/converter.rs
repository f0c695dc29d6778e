//! Type converters: coerce a produced value into the type the caller expected.

use num_traits::NumCast;

use crate::error::Error;
use crate::options::Options;
use crate::parse_scalars::{parse_bool, parse_int, parse_yaml12_float};
use crate::types::{PrimitiveKind, Shape, TypeRef};
use crate::value::{Mapping, Value};

/// Coerces a raw value produced by a node deserializer into the expected type.
pub trait TypeConverter: Send + Sync {
    fn change_type(&self, value: Value, target: &TypeRef) -> Result<Value, Error>;
}

/// Converter that returns every value unchanged.
#[derive(Clone, Copy, Debug, Default)]
pub struct NullTypeConverter;

impl TypeConverter for NullTypeConverter {
    fn change_type(&self, value: Value, _target: &TypeRef) -> Result<Value, Error> {
        Ok(value)
    }
}

/// Structural converter.
///
/// - `any` accepts everything.
/// - `null` is accepted by every reference-like type and rejected by value-like primitives.
/// - Numbers are narrowed with range checks; strings parse into numbers and booleans and
///   numbers or booleans format into strings.
/// - Containers are converted element by element.
/// - Objects are accepted where their type (or one of its bases) is expected.
#[derive(Clone, Copy, Debug, Default)]
pub struct DefaultTypeConverter {
    strict_booleans: bool,
    legacy_octal_numbers: bool,
}

impl DefaultTypeConverter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_options(options: &Options) -> Self {
        Self {
            strict_booleans: options.strict_booleans,
            legacy_octal_numbers: options.legacy_octal_numbers,
        }
    }

    fn convert_primitive(&self, value: Value, kind: PrimitiveKind, target: &TypeRef) -> Result<Value, Error> {
        let fail = |value: &Value, reason: &str| Error::conversion(value.describe(), target.name(), reason);
        match kind {
            PrimitiveKind::Bool => match value {
                Value::Bool(_) => Ok(value),
                Value::String(ref s) => parse_bool(s, self.strict_booleans)
                    .map(Value::Bool)
                    .map_err(|reason| fail(&value, &reason)),
                other => Err(fail(&other, "not a boolean")),
            },
            k if k.is_signed_int() => {
                let wide = self.to_i128(&value).ok_or_else(|| fail(&value, "not an integer"))?;
                let fits = match k {
                    PrimitiveKind::I8 => fits::<i8>(wide),
                    PrimitiveKind::I16 => fits::<i16>(wide),
                    PrimitiveKind::I32 => fits::<i32>(wide),
                    _ => fits::<i64>(wide),
                };
                if !fits {
                    return Err(fail(&value, "out of range"));
                }
                Ok(Value::Int(wide as i64))
            }
            k if k.is_unsigned_int() => {
                let wide = self.to_i128(&value).ok_or_else(|| fail(&value, "not an integer"))?;
                let fits = match k {
                    PrimitiveKind::U8 => fits::<u8>(wide),
                    PrimitiveKind::U16 => fits::<u16>(wide),
                    PrimitiveKind::U32 => fits::<u32>(wide),
                    _ => fits::<u64>(wide),
                };
                if !fits {
                    return Err(fail(&value, "out of range"));
                }
                Ok(Value::UInt(wide as u64))
            }
            k if k.is_float() => {
                let f = match &value {
                    Value::Float(f) => *f,
                    Value::Int(i) => *i as f64,
                    Value::UInt(u) => *u as f64,
                    Value::String(s) => parse_yaml12_float(s)
                        .or_else(|| parse_int(s, self.legacy_octal_numbers).and_then(<f64 as NumCast>::from))
                        .ok_or_else(|| fail(&value, "not a number"))?,
                    _ => return Err(fail(&value, "not a number")),
                };
                if k == PrimitiveKind::F32 && f.is_finite() && <f32 as NumCast>::from(f).is_none_or(f32::is_infinite) {
                    return Err(fail(&value, "out of range"));
                }
                Ok(Value::Float(f))
            }
            PrimitiveKind::Char => match value {
                Value::String(s) if s.chars().count() == 1 => Ok(Value::String(s)),
                other => Err(fail(&other, "expected a single character")),
            },
            PrimitiveKind::String => match value {
                Value::String(_) => Ok(value),
                Value::Bool(b) => Ok(Value::String(b.to_string())),
                Value::Int(i) => Ok(Value::String(i.to_string())),
                Value::UInt(u) => Ok(Value::String(u.to_string())),
                Value::Float(f) => Ok(Value::String(f.to_string())),
                other => Err(fail(&other, "not a scalar")),
            },
            PrimitiveKind::Bytes => match value {
                Value::Bytes(_) => Ok(value),
                Value::Sequence(items) => items
                    .iter()
                    .map(|item| {
                        self.to_i128(item)
                            .and_then(<u8 as NumCast>::from)
                            .ok_or_else(|| fail(item, "byte out of range"))
                    })
                    .collect::<Result<Vec<u8>, Error>>()
                    .map(Value::Bytes),
                other => Err(fail(&other, "not binary data")),
            },
            // Covered by the guards above.
            _ => Err(fail(&value, "unsupported primitive")),
        }
    }

    fn to_i128(&self, value: &Value) -> Option<i128> {
        match value {
            Value::Int(i) => Some(*i as i128),
            Value::UInt(u) => Some(*u as i128),
            Value::Float(f) if f.fract() == 0.0 => <i128 as NumCast>::from(*f),
            Value::String(s) => parse_int(s, self.legacy_octal_numbers),
            _ => None,
        }
    }
}

fn fits<T: NumCast>(wide: i128) -> bool {
    <T as NumCast>::from(wide).is_some()
}

impl TypeConverter for DefaultTypeConverter {
    fn change_type(&self, value: Value, target: &TypeRef) -> Result<Value, Error> {
        if value.is_null() {
            return if target.is_value_type() {
                Err(Error::conversion("null", target.name(), "type is not nullable"))
            } else {
                Ok(value)
            };
        }
        match target.shape() {
            Shape::Any => Ok(value),
            Shape::Optional(inner) => self.change_type(value, inner),
            Shape::Primitive(kind) => self.convert_primitive(value, *kind, target),
            Shape::Sequence(element) => match value {
                Value::Sequence(items) => items
                    .into_iter()
                    .map(|item| self.change_type(item, element))
                    .collect::<Result<Vec<_>, _>>()
                    .map(Value::Sequence),
                other => Err(Error::conversion(other.describe(), target.name(), "not a sequence")),
            },
            Shape::Mapping(key_ty, value_ty) => match value {
                Value::Mapping(m) => {
                    let mut out = Mapping::with_capacity(m.len());
                    for (k, v) in m {
                        out.insert(self.change_type(k, key_ty)?, self.change_type(v, value_ty)?);
                    }
                    Ok(Value::Mapping(out))
                }
                other => Err(Error::conversion(other.describe(), target.name(), "not a mapping")),
            },
            Shape::Object(_) | Shape::Abstract => match value {
                Value::Object(obj) if obj.ty.is_assignable_to(target) => Ok(Value::Object(obj)),
                other => Err(Error::conversion(
                    other.describe(),
                    target.name(),
                    "value is not assignable to this type",
                )),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ObjectDef, TypeDef};
    use crate::value::Object;

    #[test]
    fn narrows_integers_with_range_checks() {
        let c = DefaultTypeConverter::new();
        let u8_ty = TypeRef::primitive(PrimitiveKind::U8);
        assert_eq!(c.change_type(Value::Int(200), &u8_ty).unwrap(), Value::UInt(200));
        let err = c.change_type(Value::Int(300), &u8_ty).unwrap_err();
        assert!(matches!(err, Error::Conversion { .. }));
        assert!(c.change_type(Value::Int(-1), &TypeRef::u64()).is_err());
        assert_eq!(c.change_type(Value::Float(3.0), &TypeRef::i32()).unwrap(), Value::Int(3));
        assert!(c.change_type(Value::Float(3.5), &TypeRef::i32()).is_err());
    }

    #[test]
    fn strings_parse_and_format() {
        let c = DefaultTypeConverter::new();
        assert_eq!(c.change_type("0x10".into(), &TypeRef::i64()).unwrap(), Value::Int(16));
        assert_eq!(c.change_type("yes".into(), &TypeRef::bool()).unwrap(), Value::Bool(true));
        assert_eq!(c.change_type(Value::Int(7), &TypeRef::string()).unwrap(), Value::from("7"));
        assert_eq!(c.change_type(Value::Int(2), &TypeRef::f64()).unwrap(), Value::Float(2.0));
    }

    #[test]
    fn strict_booleans_reject_yaml11_forms() {
        let opts = crate::options! { strict_booleans: true };
        let c = DefaultTypeConverter::from_options(&opts);
        assert!(c.change_type("yes".into(), &TypeRef::bool()).is_err());
    }

    #[test]
    fn null_only_for_reference_types() {
        let c = DefaultTypeConverter::new();
        assert!(c.change_type(Value::Null, &TypeRef::i64()).is_err());
        assert_eq!(c.change_type(Value::Null, &TypeRef::string()).unwrap(), Value::Null);
        assert_eq!(
            c.change_type(Value::Null, &TypeRef::optional(TypeRef::i64())).unwrap(),
            Value::Null
        );
    }

    #[test]
    fn containers_convert_recursively() {
        let c = DefaultTypeConverter::new();
        let v = Value::Sequence(vec![Value::from("1"), Value::Int(2)]);
        let out = c.change_type(v, &TypeRef::sequence(TypeRef::i64())).unwrap();
        assert_eq!(out, Value::Sequence(vec![Value::Int(1), Value::Int(2)]));
    }

    #[test]
    fn objects_follow_assignability() {
        let c = DefaultTypeConverter::new();
        let base = TypeRef::abstract_type("Animal");
        let dog = TypeDef::new("Dog", Shape::Object(ObjectDef::new()))
            .with_base(base.clone())
            .into_ref();
        let rock = TypeRef::object("Rock", ObjectDef::new());
        let v = Value::Object(Object::new(dog));
        assert!(c.change_type(v, &base).is_ok());
        let r = Value::Object(Object::new(rock));
        assert!(c.change_type(r, &base).is_err());
    }
}
