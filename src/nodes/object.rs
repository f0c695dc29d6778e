use std::sync::Arc;

use ahash::AHashSet;

use super::containers::pending_span;
use super::{NodeDeserializer, NodeOutcome, skip_comments_before};
use crate::error::Error;
use crate::events::{EventStream, NodeKind, eof};
use crate::factory::ObjectFactory;
use crate::options::{DuplicateKeyPolicy, Options};
use crate::types::TypeRef;
use crate::value::Value;
use crate::value_deserializer::Nested;

/// Mappings into object types: keys name fields, values are deserialized as the field type.
pub struct ObjectNodeDeserializer {
    factory: Arc<dyn ObjectFactory>,
    ignore_unmatched: bool,
    duplicate_keys: DuplicateKeyPolicy,
}

impl ObjectNodeDeserializer {
    pub fn new(factory: Arc<dyn ObjectFactory>) -> Self {
        Self {
            factory,
            ignore_unmatched: false,
            duplicate_keys: DuplicateKeyPolicy::Error,
        }
    }

    pub fn from_options(factory: Arc<dyn ObjectFactory>, options: &Options) -> Self {
        Self {
            factory,
            ignore_unmatched: options.ignore_unmatched,
            duplicate_keys: options.duplicate_keys,
        }
    }

    /// Skip mapping entries whose key names no field instead of failing.
    pub fn ignore_unmatched(mut self, ignore: bool) -> Self {
        self.ignore_unmatched = ignore;
        self
    }
}

impl NodeDeserializer for ObjectNodeDeserializer {
    fn deserialize(
        &self,
        stream: &mut dyn EventStream,
        ty: &TypeRef,
        nested: &mut Nested<'_>,
    ) -> Result<NodeOutcome, Error> {
        let Some(def) = ty.as_object() else {
            return Ok(NodeOutcome::Declined);
        };
        let (map_start, map_end) = match stream.accept_node()? {
            Some(node) if node.kind == NodeKind::MappingStart => (node.start, node.end),
            _ => return Ok(NodeOutcome::Declined),
        };

        let mut instance = self.factory.create(ty)?;
        let Value::Object(object) = &mut instance else {
            return Err(Error::msg(format!(
                "object factory produced {} for object type {}",
                instance.describe(),
                ty.name()
            )));
        };

        let key_type = TypeRef::string();
        let mut seen = AHashSet::new();
        stream.consume_node()?;
        loop {
            stream.skip_following_comments()?;
            if stream.try_mapping_end()? {
                break;
            }
            if stream.peek()?.is_none() {
                return Err(eof(stream.last_mark()));
            }
            let (key_start, key_end) = pending_span(stream)?;
            let key = nested(stream, &key_type)?;
            let Some(name) = key.as_str() else {
                return Err(Error::at(
                    key_start,
                    key_end,
                    format!("field names of {} must be strings, found {key}", ty.name()),
                ));
            };

            let Some(field) = def.get(name) else {
                if self.ignore_unmatched {
                    crate::trace!(field = name, ty = %ty, "skipping unmatched field");
                    stream.skip_following_comments()?;
                    stream.skip_node()?;
                    continue;
                }
                return Err(Error::at(
                    key_start,
                    key_end,
                    format!("unknown field `{name}` for type {}", ty.name()),
                ));
            };

            skip_comments_before(stream, &field.ty)?;
            let value = nested(stream, &field.ty)?;
            if !seen.insert(field.name.clone()) {
                match self.duplicate_keys {
                    DuplicateKeyPolicy::Error => {
                        return Err(Error::at(
                            key_start,
                            key_end,
                            format!("duplicate field `{name}`"),
                        ));
                    }
                    DuplicateKeyPolicy::FirstWins => continue,
                    DuplicateKeyPolicy::LastWins => {}
                }
            }
            object.set(name, value);
        }

        if let Some(missing) = def
            .fields
            .iter()
            .find(|f| f.required && !seen.contains(&f.name))
        {
            return Err(Error::at(
                map_start,
                map_end,
                format!("missing required field `{}` for type {}", missing.name, ty.name()),
            ));
        }
        Ok(NodeOutcome::Deserialized(instance))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::{Ev, EventBuffer, NodeEvent};
    use crate::factory::DefaultObjectFactory;
    use crate::location::Mark;
    use crate::types::{FieldDef, ObjectDef};

    fn m(i: u64) -> Mark {
        Mark::new(i, 1, i as u32 + 1)
    }

    fn sc(v: &str, at: u64) -> Ev {
        Ev::Node(NodeEvent::scalar(v, m(at), m(at + 1)))
    }

    fn reader(s: &mut dyn EventStream, _t: &TypeRef) -> Result<Value, Error> {
        if s.accept_node()?.is_some_and(|n| !n.is_scalar()) {
            s.skip_node()?;
            return Ok(Value::Null);
        }
        let node = s.consume_node()?;
        let (text, _) = node.as_scalar().ok_or_else(|| Error::msg("expected scalar"))?;
        Ok(Value::from(text))
    }

    fn point() -> TypeRef {
        TypeRef::object(
            "Point",
            ObjectDef::new()
                .field(FieldDef::new("x", TypeRef::string()).required())
                .field(FieldDef::new("label", TypeRef::string()).with_default(Value::from("origin"))),
        )
    }

    fn object_events(keys: &[(&str, &str)]) -> EventBuffer {
        let mut events = vec![Ev::Node(NodeEvent::mapping_start(m(0), m(1)))];
        for (i, (k, v)) in keys.iter().enumerate() {
            events.push(sc(k, 10 * i as u64 + 2));
            events.push(sc(v, 10 * i as u64 + 5));
        }
        events.push(Ev::MappingEnd { start: m(99), end: m(99) });
        EventBuffer::new(events)
    }

    #[test]
    fn fills_fields_and_keeps_defaults() {
        let d = ObjectNodeDeserializer::new(Arc::new(DefaultObjectFactory::new()));
        let mut s = object_events(&[("x", "3")]);
        let NodeOutcome::Deserialized(Value::Object(obj)) =
            d.deserialize(&mut s, &point(), &mut reader).unwrap()
        else {
            panic!("expected object");
        };
        assert_eq!(obj.get("x"), Some(&Value::from("3")));
        assert_eq!(obj.get("label"), Some(&Value::from("origin")));
        assert_eq!(obj.ty.name(), "Point");
    }

    #[test]
    fn unknown_fields_fail_unless_ignored() {
        let f: Arc<dyn ObjectFactory> = Arc::new(DefaultObjectFactory::new());
        let strict = ObjectNodeDeserializer::new(f.clone());
        let mut s = object_events(&[("x", "1"), ("z", "2")]);
        let err = strict.deserialize(&mut s, &point(), &mut reader).unwrap_err();
        assert!(err.to_string().contains("unknown field `z` for type Point"));
        assert_eq!(err.start(), Some(m(12)));

        let lenient = ObjectNodeDeserializer::new(f).ignore_unmatched(true);
        let mut s = object_events(&[("z", "2"), ("x", "1")]);
        assert!(matches!(
            lenient.deserialize(&mut s, &point(), &mut reader).unwrap(),
            NodeOutcome::Deserialized(Value::Object(_))
        ));
        assert_eq!(s.remaining(), 0);
    }

    #[test]
    fn missing_required_field_points_at_the_mapping() {
        let d = ObjectNodeDeserializer::new(Arc::new(DefaultObjectFactory::new()));
        let mut s = object_events(&[("label", "here")]);
        let err = d.deserialize(&mut s, &point(), &mut reader).unwrap_err();
        assert!(err.to_string().contains("missing required field `x`"));
        assert_eq!(err.start(), Some(m(0)));
    }

    #[test]
    fn declines_non_objects() {
        let d = ObjectNodeDeserializer::new(Arc::new(DefaultObjectFactory::new()));
        let mut s = object_events(&[]);
        assert_eq!(
            d.deserialize(&mut s, &TypeRef::any(), &mut reader).unwrap(),
            NodeOutcome::Declined
        );
    }
}
