//! Instance factory: allocates instances for runtime types and classifies containers.

use std::sync::Arc;

use ahash::AHashMap;

use crate::error::Error;
use crate::types::{KeyedEntries, PrimitiveKind, SequentialElements, Shape, TypeRef};
use crate::value::{Mapping, Object, Value};

/// Constructor registered for a named type.
pub type Constructor = Arc<dyn Fn(&TypeRef) -> Result<Value, Error> + Send + Sync>;

/// Creates instances of runtime types.
pub trait ObjectFactory: Send + Sync {
    /// Construct a new instance of a concrete type.
    ///
    /// Fails with [`Error::Unconstructible`] for abstract types and types without an
    /// accessible constructor.
    fn create(&self, ty: &TypeRef) -> Result<Value, Error>;

    /// Zero value for value-like types, `None` for reference-like ones.
    fn create_primitive(&self, ty: &TypeRef) -> Option<Value> {
        match ty.shape() {
            Shape::Primitive(kind) if kind.is_value_like() => Some(zero_value(*kind)),
            _ => None,
        }
    }

    /// If the value's type has keyed entries, expose them through a [`MappingView`].
    fn describe_mapping<'v>(&self, value: &'v mut Value, ty: &TypeRef) -> Option<MappingView<'v>> {
        let (key_type, value_type) = ty.entry_types()?;
        let entries = value.as_mapping_mut()?;
        Some(MappingView {
            key_type,
            value_type,
            entries,
        })
    }

    /// Element type of a sequence-shaped type, `any` when the type has no elements.
    fn element_type(&self, ty: &TypeRef) -> TypeRef {
        ty.element_type().unwrap_or_else(TypeRef::any)
    }
}

/// Key/value view over a mapping value that allows generic add and lookup without depending on
/// the container's specific key and value types.
#[derive(Debug)]
pub struct MappingView<'v> {
    pub key_type: TypeRef,
    pub value_type: TypeRef,
    entries: &'v mut Mapping,
}

impl MappingView<'_> {
    /// Insert or replace; returns the previous value for `key`.
    pub fn insert(&mut self, key: Value, value: Value) -> Option<Value> {
        self.entries.insert(key, value)
    }

    pub fn get(&self, key: &Value) -> Option<&Value> {
        self.entries.get(key)
    }

    pub fn contains_key(&self, key: &Value) -> bool {
        self.entries.contains_key(key)
    }
}

fn zero_value(kind: PrimitiveKind) -> Value {
    match kind {
        PrimitiveKind::Bool => Value::Bool(false),
        PrimitiveKind::I8 | PrimitiveKind::I16 | PrimitiveKind::I32 | PrimitiveKind::I64 => {
            Value::Int(0)
        }
        PrimitiveKind::U8 | PrimitiveKind::U16 | PrimitiveKind::U32 | PrimitiveKind::U64 => {
            Value::UInt(0)
        }
        PrimitiveKind::F32 | PrimitiveKind::F64 => Value::Float(0.0),
        PrimitiveKind::Char => Value::String("\0".to_owned()),
        PrimitiveKind::String => Value::String(String::new()),
        PrimitiveKind::Bytes => Value::Bytes(Vec::new()),
    }
}

/// Shape-driven factory with optional per-type constructors.
#[derive(Default, Clone)]
pub struct DefaultObjectFactory {
    constructors: AHashMap<String, Constructor>,
}

impl DefaultObjectFactory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a constructor for the type named `type_name`; it takes precedence over the
    /// shape-driven default.
    pub fn with_constructor<F>(mut self, type_name: impl Into<String>, ctor: F) -> Self
    where
        F: Fn(&TypeRef) -> Result<Value, Error> + Send + Sync + 'static,
    {
        self.constructors.insert(type_name.into(), Arc::new(ctor));
        self
    }
}

impl std::fmt::Debug for DefaultObjectFactory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DefaultObjectFactory")
            .field("constructors", &self.constructors.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl ObjectFactory for DefaultObjectFactory {
    fn create(&self, ty: &TypeRef) -> Result<Value, Error> {
        if let Some(ctor) = self.constructors.get(ty.name()) {
            return ctor(ty);
        }
        match ty.shape() {
            Shape::Primitive(kind) => Ok(zero_value(*kind)),
            Shape::Optional(_) => Ok(Value::Null),
            Shape::Sequence(_) => Ok(Value::Sequence(Vec::new())),
            Shape::Mapping(_, _) => Ok(Value::Mapping(Mapping::new())),
            Shape::Object(def) => {
                if !def.constructible {
                    return Err(Error::unconstructible(
                        ty.name(),
                        "type has no accessible constructor",
                    ));
                }
                let mut obj = Object::new(ty.clone());
                for field in &def.fields {
                    let initial = field
                        .default
                        .clone()
                        .or_else(|| self.create_primitive(&field.ty))
                        .unwrap_or(Value::Null);
                    obj.fields.push((field.name.clone(), initial));
                }
                Ok(Value::Object(obj))
            }
            Shape::Abstract => Err(Error::unconstructible(ty.name(), "type is abstract")),
            Shape::Any => Err(Error::unconstructible(
                ty.name(),
                "an unconstrained type has no concrete representation",
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{FieldDef, ObjectDef};

    #[test]
    fn primitive_defaults_only_for_value_types() {
        let f = DefaultObjectFactory::new();
        assert_eq!(f.create_primitive(&TypeRef::i64()), Some(Value::Int(0)));
        assert_eq!(f.create_primitive(&TypeRef::bool()), Some(Value::Bool(false)));
        assert_eq!(f.create_primitive(&TypeRef::string()), None);
        assert_eq!(f.create_primitive(&TypeRef::sequence(TypeRef::i64())), None);
    }

    #[test]
    fn objects_get_field_defaults() {
        let ty = TypeRef::object(
            "Point",
            ObjectDef::new()
                .field(FieldDef::new("x", TypeRef::i64()))
                .field(FieldDef::new("label", TypeRef::string()))
                .field(FieldDef::new("z", TypeRef::f64()).with_default(Value::Float(1.5))),
        );
        let v = DefaultObjectFactory::new().create(&ty).unwrap();
        let obj = v.as_object().unwrap();
        assert_eq!(obj.get("x"), Some(&Value::Int(0)));
        assert_eq!(obj.get("label"), Some(&Value::Null));
        assert_eq!(obj.get("z"), Some(&Value::Float(1.5)));
    }

    #[test]
    fn abstract_and_hidden_types_are_unconstructible() {
        let f = DefaultObjectFactory::new();
        let err = f.create(&TypeRef::abstract_type("Shape")).unwrap_err();
        assert!(matches!(err, Error::Unconstructible { .. }));
        let hidden = TypeRef::object("Hidden", ObjectDef::new().not_constructible());
        assert!(matches!(f.create(&hidden), Err(Error::Unconstructible { .. })));
    }

    #[test]
    fn registered_constructor_wins() {
        let f = DefaultObjectFactory::new()
            .with_constructor("Shape", |_ty: &TypeRef| Ok(Value::from("made")));
        assert_eq!(f.create(&TypeRef::abstract_type("Shape")).unwrap(), Value::from("made"));
    }

    #[test]
    fn mapping_view_exposes_entry_types() {
        let f = DefaultObjectFactory::new();
        let ty = TypeRef::mapping(TypeRef::string(), TypeRef::i64());
        let mut v = f.create(&ty).unwrap();
        {
            let mut view = f.describe_mapping(&mut v, &ty).expect("mapping");
            assert_eq!(view.key_type, TypeRef::string());
            assert_eq!(view.value_type, TypeRef::i64());
            assert_eq!(view.insert("a".into(), Value::Int(1)), None);
            assert!(view.contains_key(&"a".into()));
            assert_eq!(view.insert("a".into(), Value::Int(2)), Some(Value::Int(1)));
            assert_eq!(view.get(&"a".into()), Some(&Value::Int(2)));
            assert_eq!(view.get(&"b".into()), None);
        }
        assert_eq!(v.as_mapping().unwrap().len(), 1);

        let seq = TypeRef::sequence(TypeRef::bool());
        let mut s = f.create(&seq).unwrap();
        assert!(f.describe_mapping(&mut s, &seq).is_none());
        assert_eq!(f.element_type(&seq), TypeRef::bool());
        assert!(f.element_type(&TypeRef::string()).is_any());
    }
}
