//! Runtime type descriptors used to drive deserialization.
//!
//! A [`TypeRef`] is a cheap, shareable handle to a [`TypeDef`]: a name, a [`Shape`] and a
//! couple of capabilities (base types for assignability, an optional self-converting reader).
//! Container classification is answered statically from the shape through the
//! [`KeyedEntries`] and [`SequentialElements`] capability traits; no runtime reflection is
//! involved.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use smallvec::SmallVec;

use crate::error::Error;
use crate::events::EventStream;
use crate::value::Value;
use crate::value_deserializer::Nested;

/// Scalar-like leaf types.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum PrimitiveKind {
    Bool,
    I8,
    I16,
    I32,
    I64,
    U8,
    U16,
    U32,
    U64,
    F32,
    F64,
    Char,
    String,
    Bytes,
}

impl PrimitiveKind {
    pub fn name(self) -> &'static str {
        match self {
            PrimitiveKind::Bool => "bool",
            PrimitiveKind::I8 => "i8",
            PrimitiveKind::I16 => "i16",
            PrimitiveKind::I32 => "i32",
            PrimitiveKind::I64 => "i64",
            PrimitiveKind::U8 => "u8",
            PrimitiveKind::U16 => "u16",
            PrimitiveKind::U32 => "u32",
            PrimitiveKind::U64 => "u64",
            PrimitiveKind::F32 => "f32",
            PrimitiveKind::F64 => "f64",
            PrimitiveKind::Char => "char",
            PrimitiveKind::String => "string",
            PrimitiveKind::Bytes => "bytes",
        }
    }

    /// Value-like primitives have a zero value; string and bytes are reference-like.
    pub fn is_value_like(self) -> bool {
        !matches!(self, PrimitiveKind::String | PrimitiveKind::Bytes)
    }

    pub fn is_signed_int(self) -> bool {
        matches!(
            self,
            PrimitiveKind::I8 | PrimitiveKind::I16 | PrimitiveKind::I32 | PrimitiveKind::I64
        )
    }

    pub fn is_unsigned_int(self) -> bool {
        matches!(
            self,
            PrimitiveKind::U8 | PrimitiveKind::U16 | PrimitiveKind::U32 | PrimitiveKind::U64
        )
    }

    pub fn is_float(self) -> bool {
        matches!(self, PrimitiveKind::F32 | PrimitiveKind::F64)
    }
}

/// A named field of an object type.
#[derive(Clone, Debug)]
pub struct FieldDef {
    pub name: String,
    pub ty: TypeRef,
    /// Value assigned by the instance factory before any node populates the field.
    pub default: Option<Value>,
    /// Deserialization fails if the mapping does not mention this field.
    pub required: bool,
}

impl FieldDef {
    pub fn new(name: impl Into<String>, ty: TypeRef) -> Self {
        Self {
            name: name.into(),
            ty,
            default: None,
            required: false,
        }
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn with_default(mut self, value: Value) -> Self {
        self.default = Some(value);
        self
    }
}

/// Structure of an object type: ordered fields plus constructibility.
#[derive(Clone, Debug)]
pub struct ObjectDef {
    pub fields: Vec<FieldDef>,
    /// False for types without an accessible constructor.
    pub constructible: bool,
}

impl Default for ObjectDef {
    fn default() -> Self {
        Self {
            fields: Vec::new(),
            constructible: true,
        }
    }
}

impl ObjectDef {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn field(mut self, field: FieldDef) -> Self {
        self.fields.push(field);
        self
    }

    pub fn not_constructible(mut self) -> Self {
        self.constructible = false;
        self
    }

    pub fn get(&self, name: &str) -> Option<&FieldDef> {
        self.fields.iter().find(|f| f.name == name)
    }
}

/// Structural shape of a type.
#[derive(Clone, Debug)]
pub enum Shape {
    /// Unconstrained: accepts whatever the document contains.
    Any,
    Primitive(PrimitiveKind),
    /// A value that may be null.
    Optional(TypeRef),
    Sequence(TypeRef),
    Mapping(TypeRef, TypeRef),
    Object(ObjectDef),
    /// Polymorphic base; must be narrowed to a concrete type before it can be built.
    Abstract,
}

/// Capability of types that can read their own representation directly from the event stream.
///
/// Such types bypass the comment skipping the value deserializer performs before dispatch,
/// since they may want to see comment events themselves.
pub trait YamlConvertible: Send + Sync {
    fn read(
        &self,
        stream: &mut dyn EventStream,
        ty: &TypeRef,
        nested: &mut Nested<'_>,
    ) -> Result<Value, Error>;
}

/// Full description of a runtime type.
pub struct TypeDef {
    name: String,
    shape: Shape,
    bases: SmallVec<[TypeRef; 2]>,
    convertible: Option<Arc<dyn YamlConvertible>>,
}

impl TypeDef {
    pub fn new(name: impl Into<String>, shape: Shape) -> Self {
        Self {
            name: name.into(),
            shape,
            bases: SmallVec::new(),
            convertible: None,
        }
    }

    /// Declare that values of this type may stand in for `base`.
    pub fn with_base(mut self, base: TypeRef) -> Self {
        self.bases.push(base);
        self
    }

    /// Attach a self-converting reader.
    pub fn with_convertible(mut self, convertible: Arc<dyn YamlConvertible>) -> Self {
        self.convertible = Some(convertible);
        self
    }

    pub fn into_ref(self) -> TypeRef {
        TypeRef(Arc::new(self))
    }
}

impl fmt::Debug for TypeDef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TypeDef")
            .field("name", &self.name)
            .field("shape", &self.shape)
            .field(
                "bases",
                &self.bases.iter().map(TypeRef::name).collect::<Vec<_>>(),
            )
            .field("convertible", &self.convertible.is_some())
            .finish()
    }
}

/// Shared handle to a [`TypeDef`]. Equality and hashing go by name.
#[derive(Clone)]
pub struct TypeRef(Arc<TypeDef>);

impl TypeRef {
    pub fn any() -> Self {
        TypeDef::new("any", Shape::Any).into_ref()
    }

    pub fn primitive(kind: PrimitiveKind) -> Self {
        TypeDef::new(kind.name(), Shape::Primitive(kind)).into_ref()
    }

    pub fn bool() -> Self {
        Self::primitive(PrimitiveKind::Bool)
    }

    pub fn i32() -> Self {
        Self::primitive(PrimitiveKind::I32)
    }

    pub fn i64() -> Self {
        Self::primitive(PrimitiveKind::I64)
    }

    pub fn u64() -> Self {
        Self::primitive(PrimitiveKind::U64)
    }

    pub fn f64() -> Self {
        Self::primitive(PrimitiveKind::F64)
    }

    pub fn string() -> Self {
        Self::primitive(PrimitiveKind::String)
    }

    pub fn bytes() -> Self {
        Self::primitive(PrimitiveKind::Bytes)
    }

    pub fn optional(inner: TypeRef) -> Self {
        TypeDef::new(format!("option<{}>", inner.name()), Shape::Optional(inner)).into_ref()
    }

    pub fn sequence(element: TypeRef) -> Self {
        TypeDef::new(format!("seq<{}>", element.name()), Shape::Sequence(element)).into_ref()
    }

    pub fn mapping(key: TypeRef, value: TypeRef) -> Self {
        TypeDef::new(
            format!("map<{}, {}>", key.name(), value.name()),
            Shape::Mapping(key, value),
        )
        .into_ref()
    }

    pub fn object(name: impl Into<String>, def: ObjectDef) -> Self {
        TypeDef::new(name, Shape::Object(def)).into_ref()
    }

    pub fn abstract_type(name: impl Into<String>) -> Self {
        TypeDef::new(name, Shape::Abstract).into_ref()
    }

    pub fn name(&self) -> &str {
        &self.0.name
    }

    pub fn shape(&self) -> &Shape {
        &self.0.shape
    }

    pub fn bases(&self) -> &[TypeRef] {
        &self.0.bases
    }

    pub fn convertible(&self) -> Option<&Arc<dyn YamlConvertible>> {
        self.0.convertible.as_ref()
    }

    /// True if this type reads itself from the event stream.
    pub fn is_self_converting(&self) -> bool {
        self.0.convertible.is_some()
    }

    pub fn is_any(&self) -> bool {
        matches!(self.0.shape, Shape::Any)
    }

    pub fn as_primitive(&self) -> Option<PrimitiveKind> {
        match self.0.shape {
            Shape::Primitive(kind) => Some(kind),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<&ObjectDef> {
        match &self.0.shape {
            Shape::Object(def) => Some(def),
            _ => None,
        }
    }

    /// Value-like types have a zero value and cannot be null.
    pub fn is_value_type(&self) -> bool {
        matches!(self.0.shape, Shape::Primitive(kind) if kind.is_value_like())
    }

    /// True if a value of `self` may be used where `target` is expected.
    pub fn is_assignable_to(&self, target: &TypeRef) -> bool {
        if target.is_any() || self == target {
            return true;
        }
        self.bases().iter().any(|base| base.is_assignable_to(target))
    }
}

impl PartialEq for TypeRef {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0) || self.0.name == other.0.name
    }
}

impl Eq for TypeRef {}

impl Hash for TypeRef {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.0.name.hash(state);
    }
}

impl fmt::Debug for TypeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TypeRef({})", self.name())
    }
}

impl fmt::Display for TypeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Capability of "has keyed entries" types.
pub trait KeyedEntries {
    /// Key and value types, if the type is a keyed associative container.
    fn entry_types(&self) -> Option<(TypeRef, TypeRef)>;
}

/// Capability of "has sequential elements" types.
pub trait SequentialElements {
    /// Element type, if the type is a sequence.
    fn element_type(&self) -> Option<TypeRef>;
}

impl KeyedEntries for TypeRef {
    fn entry_types(&self) -> Option<(TypeRef, TypeRef)> {
        match self.shape() {
            Shape::Mapping(k, v) => Some((k.clone(), v.clone())),
            _ => None,
        }
    }
}

impl SequentialElements for TypeRef {
    fn element_type(&self) -> Option<TypeRef> {
        match self.shape() {
            Shape::Sequence(element) => Some(element.clone()),
            _ => None,
        }
    }
}

/// Static mapping from Rust types to their runtime descriptors.
///
/// ```
/// use std::collections::BTreeMap;
/// use saphyr_dispatch::types::{Describe, KeyedEntries};
///
/// let ty = <BTreeMap<String, i64>>::describe();
/// let (k, v) = ty.entry_types().unwrap();
/// assert_eq!(k.name(), "string");
/// assert_eq!(v.name(), "i64");
/// ```
pub trait Describe {
    fn describe() -> TypeRef;
}

macro_rules! describe_primitive {
    ($($t:ty => $kind:ident),* $(,)?) => {
        $(
            impl Describe for $t {
                fn describe() -> TypeRef {
                    TypeRef::primitive(PrimitiveKind::$kind)
                }
            }
        )*
    };
}

describe_primitive! {
    bool => Bool,
    i8 => I8,
    i16 => I16,
    i32 => I32,
    i64 => I64,
    u8 => U8,
    u16 => U16,
    u32 => U32,
    u64 => U64,
    f32 => F32,
    f64 => F64,
    char => Char,
    String => String,
}

impl Describe for Value {
    fn describe() -> TypeRef {
        TypeRef::any()
    }
}

impl<T: Describe> Describe for Option<T> {
    fn describe() -> TypeRef {
        TypeRef::optional(T::describe())
    }
}

impl<T: Describe> Describe for Vec<T> {
    fn describe() -> TypeRef {
        TypeRef::sequence(T::describe())
    }
}

impl<K: Describe, V: Describe> Describe for BTreeMap<K, V> {
    fn describe() -> TypeRef {
        TypeRef::mapping(K::describe(), V::describe())
    }
}

impl<K: Describe, V: Describe, S> Describe for HashMap<K, V, S> {
    fn describe() -> TypeRef {
        TypeRef::mapping(K::describe(), V::describe())
    }
}
