//! Type resolvers: narrow the expected type of a node before dispatch.
//!
//! A resolver may replace the current type and returns `true` to stop the chain.

use ahash::{AHashMap, AHashSet};

use crate::error::Error;
use crate::events::{NodeEvent, NodeKind};
use crate::tags::is_core_tag;
use crate::types::{Shape, TypeRef};

pub trait NodeTypeResolver: Send + Sync {
    /// Inspect the pending node (absent when no node event is pending) and possibly
    /// replace `ty`. Returns `true` when the type is final.
    fn resolve(&self, node: Option<&NodeEvent>, ty: &mut TypeRef) -> Result<bool, Error>;

    /// Name used in trace output.
    fn name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }
}

/// Replaces abstract (or otherwise registered) types with a concrete one by name.
#[derive(Clone, Debug, Default)]
pub struct TypeMappingResolver {
    mappings: AHashMap<String, TypeRef>,
}

impl TypeMappingResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_mapping(mut self, from: &TypeRef, to: TypeRef) -> Self {
        self.mappings.insert(from.name().to_owned(), to);
        self
    }

    pub fn insert(&mut self, from: &TypeRef, to: TypeRef) {
        self.mappings.insert(from.name().to_owned(), to);
    }
}

impl NodeTypeResolver for TypeMappingResolver {
    fn resolve(&self, _node: Option<&NodeEvent>, ty: &mut TypeRef) -> Result<bool, Error> {
        match self.mappings.get(ty.name()) {
            Some(concrete) => {
                *ty = concrete.clone();
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

/// Self-converting types are final: nothing later in the chain may replace them.
#[derive(Clone, Copy, Debug, Default)]
pub struct SelfConvertingTypeResolver;

impl NodeTypeResolver for SelfConvertingTypeResolver {
    fn resolve(&self, _node: Option<&NodeEvent>, ty: &mut TypeRef) -> Result<bool, Error> {
        Ok(ty.is_self_converting())
    }
}

/// Narrows the type from the node's tag.
///
/// A mapped tag applies when its type can stand in for the current one, or when the current
/// type is a primitive the converter can coerce into.
#[derive(Clone, Debug, Default)]
pub struct TagNodeTypeResolver {
    mappings: AHashMap<String, TypeRef>,
}

impl TagNodeTypeResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_mapping(mut self, tag: impl Into<String>, ty: TypeRef) -> Self {
        self.insert(tag, ty);
        self
    }

    pub fn insert(&mut self, tag: impl Into<String>, ty: TypeRef) {
        self.mappings.insert(tag.into(), ty);
    }

    pub fn tags(&self) -> impl Iterator<Item = &str> {
        self.mappings.keys().map(String::as_str)
    }
}

impl NodeTypeResolver for TagNodeTypeResolver {
    fn resolve(&self, node: Option<&NodeEvent>, ty: &mut TypeRef) -> Result<bool, Error> {
        let Some(mapped) = node.and_then(NodeEvent::tag).and_then(|t| self.mappings.get(t)) else {
            return Ok(false);
        };
        // The converter can only bring primitives and containers back to a primitive.
        let coercible = matches!(ty.shape(), Shape::Primitive(_))
            && matches!(
                mapped.shape(),
                Shape::Primitive(_) | Shape::Sequence(_) | Shape::Mapping(_, _)
            );
        if mapped.is_assignable_to(ty) || coercible {
            *ty = mapped.clone();
            return Ok(true);
        }
        Ok(false)
    }
}

/// Fails on tags that are neither core schema tags nor registered.
#[derive(Clone, Debug, Default)]
pub struct RejectUnknownTagsResolver {
    known: AHashSet<String>,
}

impl RejectUnknownTagsResolver {
    pub fn new<I, S>(known: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            known: known.into_iter().map(Into::into).collect(),
        }
    }
}

impl NodeTypeResolver for RejectUnknownTagsResolver {
    fn resolve(&self, node: Option<&NodeEvent>, _ty: &mut TypeRef) -> Result<bool, Error> {
        match node.and_then(NodeEvent::tag) {
            Some(tag) if !is_core_tag(tag) && !self.known.contains(tag) => {
                Err(Error::msg(format!("unknown tag `{tag}`")))
            }
            _ => Ok(false),
        }
    }
}

/// Gives unconstrained container nodes a container type: `seq<any>` or `map<any, any>`.
#[derive(Clone, Copy, Debug, Default)]
pub struct DefaultContainersResolver;

impl NodeTypeResolver for DefaultContainersResolver {
    fn resolve(&self, node: Option<&NodeEvent>, ty: &mut TypeRef) -> Result<bool, Error> {
        if !ty.is_any() {
            return Ok(false);
        }
        match node.map(|n| &n.kind) {
            Some(NodeKind::SequenceStart) => {
                *ty = TypeRef::sequence(TypeRef::any());
                Ok(true)
            }
            Some(NodeKind::MappingStart) => {
                *ty = TypeRef::mapping(TypeRef::any(), TypeRef::any());
                Ok(true)
            }
            _ => Ok(false),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::location::Mark;
    use crate::types::{ObjectDef, TypeDef};

    fn tagged(tag: &str) -> NodeEvent {
        NodeEvent::mapping_start(Mark::EMPTY, Mark::EMPTY).with_tag(tag)
    }

    #[test]
    fn tag_narrows_to_subtype() {
        let shape = TypeRef::abstract_type("Shape");
        let circle = TypeDef::new("Circle", Shape::Object(ObjectDef::new()))
            .with_base(shape.clone())
            .into_ref();
        let resolver = TagNodeTypeResolver::new().with_mapping("!circle", circle);
        let mut ty = shape.clone();
        assert!(resolver.resolve(Some(&tagged("!circle")), &mut ty).unwrap());
        assert_eq!(ty.name(), "Circle");

        let mut untouched = shape.clone();
        assert!(!resolver.resolve(Some(&tagged("!square")), &mut untouched).unwrap());
        assert!(!resolver.resolve(None, &mut untouched).unwrap());
        assert_eq!(untouched, shape);
    }

    #[test]
    fn tag_does_not_replace_unrelated_objects() {
        let point = TypeRef::object("Point", ObjectDef::new());
        let resolver = TagNodeTypeResolver::new()
            .with_mapping("!!map", TypeRef::mapping(TypeRef::any(), TypeRef::any()));
        let mut ty = point.clone();
        assert!(!resolver.resolve(Some(&tagged("!!map")), &mut ty).unwrap());
        assert_eq!(ty, point);
    }

    #[test]
    fn primitives_accept_only_coercible_tags() {
        let circle = TypeRef::object("Circle", ObjectDef::new());
        let resolver = TagNodeTypeResolver::new()
            .with_mapping("!circle", circle)
            .with_mapping("!!str", TypeRef::string());
        let mut ty = TypeRef::i64();
        assert!(!resolver.resolve(Some(&tagged("!circle")), &mut ty).unwrap());
        assert_eq!(ty, TypeRef::i64());
        assert!(resolver.resolve(Some(&tagged("!!str")), &mut ty).unwrap());
        assert_eq!(ty, TypeRef::string());
    }

    #[test]
    fn unknown_tags_are_rejected() {
        let resolver = RejectUnknownTagsResolver::new(["!circle"]);
        let mut ty = TypeRef::any();
        assert!(resolver.resolve(Some(&tagged("!circle")), &mut ty).is_ok());
        assert!(resolver.resolve(Some(&tagged("!!str")), &mut ty).is_ok());
        let err = resolver.resolve(Some(&tagged("!nope")), &mut ty).unwrap_err();
        assert!(err.to_string().contains("unknown tag `!nope`"));
    }

    #[test]
    fn default_containers_for_any() {
        let mut ty = TypeRef::any();
        let seq = NodeEvent::sequence_start(Mark::EMPTY, Mark::EMPTY);
        assert!(DefaultContainersResolver.resolve(Some(&seq), &mut ty).unwrap());
        assert_eq!(ty.name(), "seq<any>");

        let mut fixed = TypeRef::string();
        assert!(!DefaultContainersResolver.resolve(Some(&seq), &mut fixed).unwrap());
    }

    #[test]
    fn type_mapping_and_self_converting() {
        let animal = TypeRef::abstract_type("Animal");
        let dog = TypeRef::object("Dog", ObjectDef::new());
        let resolver = TypeMappingResolver::new().with_mapping(&animal, dog);
        let mut ty = animal;
        assert!(resolver.resolve(None, &mut ty).unwrap());
        assert_eq!(ty.name(), "Dog");

        let mut plain = TypeRef::i64();
        assert!(!SelfConvertingTypeResolver.resolve(None, &mut plain).unwrap());
    }
}
