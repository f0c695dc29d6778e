use std::sync::Arc;

use super::{NodeDeserializer, NodeOutcome, skip_comments_before};
use crate::error::Error;
use crate::events::{EventStream, NodeKind, eof};
use crate::factory::ObjectFactory;
use crate::location::Mark;
use crate::options::{DuplicateKeyPolicy, Options};
use crate::types::{KeyedEntries, SequentialElements, TypeRef};
use crate::value::Value;
use crate::value_deserializer::Nested;

/// Span of the pending node, or the last observed mark when nothing is pending.
pub(super) fn pending_span(stream: &mut dyn EventStream) -> Result<(Mark, Mark), Error> {
    Ok(match stream.accept_node()? {
        Some(node) => (node.start, node.end),
        None => (stream.last_mark(), stream.last_mark()),
    })
}

/// Sequences into any type with sequential elements.
pub struct SequenceNodeDeserializer {
    factory: Arc<dyn ObjectFactory>,
}

impl SequenceNodeDeserializer {
    pub fn new(factory: Arc<dyn ObjectFactory>) -> Self {
        Self { factory }
    }
}

impl NodeDeserializer for SequenceNodeDeserializer {
    fn deserialize(
        &self,
        stream: &mut dyn EventStream,
        ty: &TypeRef,
        nested: &mut Nested<'_>,
    ) -> Result<NodeOutcome, Error> {
        if ty.element_type().is_none() {
            return Ok(NodeOutcome::Declined);
        }
        match stream.accept_node()? {
            Some(node) if node.kind == NodeKind::SequenceStart => {}
            _ => return Ok(NodeOutcome::Declined),
        }

        let mut instance = self.factory.create(ty)?;
        let element = self.factory.element_type(ty);
        let Value::Sequence(items) = &mut instance else {
            return Err(Error::msg(format!(
                "object factory produced {} for sequence type {}",
                instance.describe(),
                ty.name()
            )));
        };

        stream.consume_node()?;
        loop {
            skip_comments_before(stream, &element)?;
            if stream.try_sequence_end()? {
                break;
            }
            if stream.peek()?.is_none() {
                return Err(eof(stream.last_mark()));
            }
            items.push(nested(stream, &element)?);
        }
        Ok(NodeOutcome::Deserialized(instance))
    }
}

/// Mappings into any type with keyed entries, honoring the duplicate key policy.
pub struct MappingNodeDeserializer {
    factory: Arc<dyn ObjectFactory>,
    duplicate_keys: DuplicateKeyPolicy,
}

impl MappingNodeDeserializer {
    pub fn new(factory: Arc<dyn ObjectFactory>, duplicate_keys: DuplicateKeyPolicy) -> Self {
        Self {
            factory,
            duplicate_keys,
        }
    }

    pub fn from_options(factory: Arc<dyn ObjectFactory>, options: &Options) -> Self {
        Self::new(factory, options.duplicate_keys)
    }
}

impl NodeDeserializer for MappingNodeDeserializer {
    fn deserialize(
        &self,
        stream: &mut dyn EventStream,
        ty: &TypeRef,
        nested: &mut Nested<'_>,
    ) -> Result<NodeOutcome, Error> {
        if ty.entry_types().is_none() {
            return Ok(NodeOutcome::Declined);
        }
        match stream.accept_node()? {
            Some(node) if node.kind == NodeKind::MappingStart => {}
            _ => return Ok(NodeOutcome::Declined),
        }

        let mut instance = self.factory.create(ty)?;
        let described = instance.describe();
        let Some(mut view) = self.factory.describe_mapping(&mut instance, ty) else {
            return Err(Error::msg(format!(
                "object factory produced {described} for mapping type {}",
                ty.name()
            )));
        };
        let key_type = view.key_type.clone();
        let value_type = view.value_type.clone();

        stream.consume_node()?;
        loop {
            skip_comments_before(stream, &key_type)?;
            if stream.try_mapping_end()? {
                break;
            }
            if stream.peek()?.is_none() {
                return Err(eof(stream.last_mark()));
            }
            let (key_start, key_end) = pending_span(stream)?;
            let key = nested(stream, &key_type)?;
            skip_comments_before(stream, &value_type)?;
            let value = nested(stream, &value_type)?;

            if view.contains_key(&key) {
                match self.duplicate_keys {
                    DuplicateKeyPolicy::Error => {
                        return Err(Error::at(
                            key_start,
                            key_end,
                            format!("duplicate mapping key: {key}"),
                        ));
                    }
                    DuplicateKeyPolicy::FirstWins => continue,
                    DuplicateKeyPolicy::LastWins => {}
                }
            }
            view.insert(key, value);
        }
        Ok(NodeOutcome::Deserialized(instance))
    }
}
