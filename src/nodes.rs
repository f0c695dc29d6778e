//! Node deserializers: the strategies the value deserializer dispatches to.
//!
//! Every member sees the pending node (via the stream) and the resolved type, and either
//! declines without consuming input, produces a value, or fails.

use crate::error::Error;
use crate::events::EventStream;
use crate::types::TypeRef;
use crate::value::Value;
use crate::value_deserializer::Nested;

mod containers;
mod object;
mod scalar;

pub use containers::{MappingNodeDeserializer, SequenceNodeDeserializer};
pub use object::ObjectNodeDeserializer;
pub use scalar::{NullNodeDeserializer, ScalarNodeDeserializer};

/// Non-failing outcome of a node deserializer.
#[derive(Clone, Debug, PartialEq)]
pub enum NodeOutcome {
    /// Not applicable to this node/type; the next member is tried. No input was consumed.
    Declined,
    /// The node was consumed and produced this value.
    Deserialized(Value),
}

/// A pluggable node deserialization strategy.
pub trait NodeDeserializer: Send + Sync {
    fn deserialize(
        &self,
        stream: &mut dyn EventStream,
        ty: &TypeRef,
        nested: &mut Nested<'_>,
    ) -> Result<NodeOutcome, Error>;

    /// Name used in trace output.
    fn name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }
}

/// Hands self-converting types the stream so they can read themselves.
#[derive(Clone, Copy, Debug, Default)]
pub struct ConvertibleNodeDeserializer;

impl NodeDeserializer for ConvertibleNodeDeserializer {
    fn deserialize(
        &self,
        stream: &mut dyn EventStream,
        ty: &TypeRef,
        nested: &mut Nested<'_>,
    ) -> Result<NodeOutcome, Error> {
        match ty.convertible() {
            Some(reader) => reader.read(stream, ty, nested).map(NodeOutcome::Deserialized),
            None => Ok(NodeOutcome::Declined),
        }
    }
}

/// Unwraps `option<T>` and deserializes the node as `T`. Null is handled earlier in the chain.
#[derive(Clone, Copy, Debug, Default)]
pub struct OptionalNodeDeserializer;

impl NodeDeserializer for OptionalNodeDeserializer {
    fn deserialize(
        &self,
        stream: &mut dyn EventStream,
        ty: &TypeRef,
        nested: &mut Nested<'_>,
    ) -> Result<NodeOutcome, Error> {
        match ty.shape() {
            crate::types::Shape::Optional(inner) => {
                nested(stream, inner).map(NodeOutcome::Deserialized)
            }
            _ => Ok(NodeOutcome::Declined),
        }
    }
}

/// Skip comments at an item boundary unless the next item reads itself from the stream.
pub(crate) fn skip_comments_before(
    stream: &mut dyn EventStream,
    item: &TypeRef,
) -> Result<(), Error> {
    if !item.is_self_converting() {
        stream.skip_following_comments()?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::events::{Ev, EventBuffer, NodeEvent};
    use crate::location::Mark;
    use crate::types::{TypeDef, YamlConvertible};

    fn noop() -> impl FnMut(&mut dyn EventStream, &TypeRef) -> Result<Value, Error> {
        |_s: &mut dyn EventStream, _t: &TypeRef| Ok(Value::Null)
    }

    #[test]
    fn convertible_declines_plain_types() {
        let mut s = EventBuffer::new([Ev::Node(NodeEvent::scalar("x", Mark::EMPTY, Mark::EMPTY))]);
        let out = ConvertibleNodeDeserializer
            .deserialize(&mut s, &TypeRef::string(), &mut noop())
            .unwrap();
        assert_eq!(out, NodeOutcome::Declined);
        assert_eq!(s.remaining(), 1);
    }

    #[test]
    fn convertible_reads_itself() {
        struct Upper;
        impl YamlConvertible for Upper {
            fn read(
                &self,
                stream: &mut dyn EventStream,
                _ty: &TypeRef,
                _nested: &mut Nested<'_>,
            ) -> Result<Value, Error> {
                let node = stream.consume_node()?;
                let (text, _) = node.as_scalar().ok_or_else(|| Error::msg("expected scalar"))?;
                Ok(Value::String(text.to_uppercase()))
            }
        }
        let ty = TypeDef::new("Upper", crate::types::Shape::Any)
            .with_convertible(Arc::new(Upper))
            .into_ref();
        let mut s = EventBuffer::new([Ev::Node(NodeEvent::scalar("abc", Mark::EMPTY, Mark::EMPTY))]);
        let out = ConvertibleNodeDeserializer.deserialize(&mut s, &ty, &mut noop()).unwrap();
        assert_eq!(out, NodeOutcome::Deserialized(Value::from("ABC")));
    }

    #[test]
    fn optional_delegates_to_inner_type() {
        let mut seen = Vec::new();
        let mut nested = |_s: &mut dyn EventStream, t: &TypeRef| {
            seen.push(t.name().to_owned());
            Ok::<_, Error>(Value::Int(1))
        };
        let mut s = EventBuffer::new(Vec::new());
        let out = OptionalNodeDeserializer
            .deserialize(&mut s, &TypeRef::optional(TypeRef::i64()), &mut nested)
            .unwrap();
        assert_eq!(out, NodeOutcome::Deserialized(Value::Int(1)));
        assert_eq!(seen, ["i64"]);
    }
}
