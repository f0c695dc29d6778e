//! Builder and façade: wires the chains together and parses YAML text.

use std::sync::Arc;

use crate::converter::{DefaultTypeConverter, TypeConverter};
use crate::error::Error;
use crate::events::{Ev, EventStream, eof};
use crate::factory::{DefaultObjectFactory, ObjectFactory};
use crate::live_events::LiveEvents;
use crate::nodes::{
    ConvertibleNodeDeserializer, MappingNodeDeserializer, NodeDeserializer, NullNodeDeserializer,
    ObjectNodeDeserializer, OptionalNodeDeserializer, ScalarNodeDeserializer,
    SequenceNodeDeserializer,
};
use crate::options::Options;
use crate::parse_scalars::scalar_is_nullish;
use crate::resolvers::{
    DefaultContainersResolver, NodeTypeResolver, RejectUnknownTagsResolver,
    SelfConvertingTypeResolver, TagNodeTypeResolver, TypeMappingResolver,
};
use crate::tags::core_tag_mappings;
use crate::types::TypeRef;
use crate::value::Value;
use crate::value_deserializer::{
    DepthLimitedValueDeserializer, DeserializerState, NodeValueDeserializer, ValueDeserializer,
};

/// Configures and builds a [`Deserializer`].
///
/// Builtin chains, in order:
/// - resolvers: self-converting, tags, unknown-tag rejection (when enabled), type mappings,
///   default containers;
/// - node deserializers: self-converting, null, optional, scalar, sequence, mapping, object.
///
/// Custom members can be placed before or after the builtins.
///
/// ```
/// use saphyr_dispatch::DeserializerBuilder;
/// use saphyr_dispatch::types::{FieldDef, ObjectDef, TypeRef};
///
/// let point = TypeRef::object(
///     "Point",
///     ObjectDef::new()
///         .field(FieldDef::new("x", TypeRef::i64()))
///         .field(FieldDef::new("y", TypeRef::i64())),
/// );
/// let de = DeserializerBuilder::new().build();
/// let value = de.from_str("x: 1\ny: 2\n", &point).unwrap();
/// assert_eq!(value.as_object().and_then(|p| p.get("y")).and_then(|v| v.as_i64()), Some(2));
/// ```
pub struct DeserializerBuilder {
    options: Options,
    factory: Arc<dyn ObjectFactory>,
    converter: Option<Arc<dyn TypeConverter>>,
    deserializers_first: Vec<Arc<dyn NodeDeserializer>>,
    deserializers_last: Vec<Arc<dyn NodeDeserializer>>,
    resolvers_first: Vec<Arc<dyn NodeTypeResolver>>,
    resolvers_last: Vec<Arc<dyn NodeTypeResolver>>,
    tag_mappings: Vec<(String, TypeRef)>,
    type_mappings: TypeMappingResolver,
}

impl Default for DeserializerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl DeserializerBuilder {
    pub fn new() -> Self {
        Self {
            options: Options::default(),
            factory: Arc::new(DefaultObjectFactory::new()),
            converter: None,
            deserializers_first: Vec::new(),
            deserializers_last: Vec::new(),
            resolvers_first: Vec::new(),
            resolvers_last: Vec::new(),
            tag_mappings: Vec::new(),
            type_mappings: TypeMappingResolver::new(),
        }
    }

    pub fn with_options(mut self, options: Options) -> Self {
        self.options = options;
        self
    }

    /// Append a node deserializer after the builtins.
    pub fn with_node_deserializer(mut self, d: impl NodeDeserializer + 'static) -> Self {
        self.deserializers_last.push(Arc::new(d));
        self
    }

    /// Insert a node deserializer before the builtins.
    pub fn with_node_deserializer_first(mut self, d: impl NodeDeserializer + 'static) -> Self {
        self.deserializers_first.push(Arc::new(d));
        self
    }

    /// Append a type resolver after the builtins.
    pub fn with_type_resolver(mut self, r: impl NodeTypeResolver + 'static) -> Self {
        self.resolvers_last.push(Arc::new(r));
        self
    }

    /// Insert a type resolver before the builtins.
    pub fn with_type_resolver_first(mut self, r: impl NodeTypeResolver + 'static) -> Self {
        self.resolvers_first.push(Arc::new(r));
        self
    }

    /// Nodes tagged `tag` are deserialized as `ty` wherever `ty` can stand in for the
    /// expected type.
    pub fn with_tag_mapping(mut self, tag: impl Into<String>, ty: TypeRef) -> Self {
        self.tag_mappings.push((tag.into(), ty));
        self
    }

    /// Whenever `from` is expected (and no tag says otherwise), build `to` instead.
    pub fn with_type_mapping(mut self, from: &TypeRef, to: TypeRef) -> Self {
        self.type_mappings.insert(from, to);
        self
    }

    pub fn with_type_converter(mut self, converter: impl TypeConverter + 'static) -> Self {
        self.converter = Some(Arc::new(converter));
        self
    }

    pub fn with_object_factory(mut self, factory: impl ObjectFactory + 'static) -> Self {
        self.factory = Arc::new(factory);
        self
    }

    pub fn build(self) -> Deserializer {
        let options = self.options;
        let factory = self.factory;

        let mut deserializers = self.deserializers_first;
        deserializers.extend([
            Arc::new(ConvertibleNodeDeserializer) as Arc<dyn NodeDeserializer>,
            Arc::new(NullNodeDeserializer),
            Arc::new(OptionalNodeDeserializer),
            Arc::new(ScalarNodeDeserializer::from_options(&options)),
            Arc::new(SequenceNodeDeserializer::new(factory.clone())),
            Arc::new(MappingNodeDeserializer::from_options(factory.clone(), &options)),
            Arc::new(ObjectNodeDeserializer::from_options(factory, &options)),
        ]);
        deserializers.extend(self.deserializers_last);

        let mut tags = TagNodeTypeResolver::new();
        for (tag, ty) in core_tag_mappings() {
            tags.insert(tag, ty);
        }
        let user_tags: Vec<String> = self.tag_mappings.iter().map(|(t, _)| t.clone()).collect();
        for (tag, ty) in self.tag_mappings {
            tags.insert(tag, ty);
        }

        let mut resolvers = self.resolvers_first;
        resolvers.push(Arc::new(SelfConvertingTypeResolver));
        resolvers.push(Arc::new(tags));
        if options.reject_unknown_tags {
            resolvers.push(Arc::new(RejectUnknownTagsResolver::new(user_tags)));
        }
        resolvers.push(Arc::new(self.type_mappings));
        resolvers.push(Arc::new(DefaultContainersResolver));
        resolvers.extend(self.resolvers_last);

        let converter = self
            .converter
            .unwrap_or_else(|| Arc::new(DefaultTypeConverter::from_options(&options)));

        crate::debug!(
            deserializers = deserializers.len(),
            resolvers = resolvers.len(),
            "built deserializer"
        );
        Deserializer {
            value_deserializer: DepthLimitedValueDeserializer::new(
                NodeValueDeserializer::new(deserializers, resolvers, converter),
                options.max_depth,
            ),
            options,
        }
    }
}

/// A built deserializer. Immutable; share it across threads freely.
pub struct Deserializer {
    value_deserializer: DepthLimitedValueDeserializer<NodeValueDeserializer>,
    options: Options,
}

impl std::fmt::Debug for Deserializer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Deserializer")
            .field("value_deserializer", &self.value_deserializer)
            .field("options", &self.options)
            .finish()
    }
}

impl Deserializer {
    pub fn options(&self) -> &Options {
        &self.options
    }

    /// Deserialize one node from `stream` as `expected`.
    ///
    /// Document markers around the node are consumed when present.
    pub fn deserialize(
        &self,
        stream: &mut dyn EventStream,
        expected: &TypeRef,
    ) -> Result<Value, Error> {
        if matches!(stream.peek()?, Some(Ev::DocumentStart { .. })) {
            stream.next()?;
        }
        let value = self.document_body(stream, expected)?;
        if matches!(stream.peek()?, Some(Ev::DocumentEnd { .. })) {
            stream.next()?;
        }
        Ok(value)
    }

    fn document_body(
        &self,
        stream: &mut dyn EventStream,
        expected: &TypeRef,
    ) -> Result<Value, Error> {
        let mut state = DeserializerState::new();
        let value = self.value_deserializer.deserialize_value(
            stream,
            expected,
            &mut state,
            &self.value_deserializer,
        )?;
        crate::trace!(depth = state.max_depth_seen(), "document deserialized");
        Ok(value)
    }

    /// Parse a single-document YAML string as `expected`.
    ///
    /// An empty input yields `null` when the expected type can hold it.
    pub fn from_str(&self, input: &str, expected: &TypeRef) -> Result<Value, Error> {
        self.parse_single(input, expected)
            .map_err(|err| self.decorate(err, input))
    }

    /// Parse every non-empty document of a multi-document YAML string as `expected`.
    pub fn from_str_multiple(&self, input: &str, expected: &TypeRef) -> Result<Vec<Value>, Error> {
        self.parse_multiple(input, expected)
            .map_err(|err| self.decorate(err, input))
    }

    fn parse_single(&self, input: &str, expected: &TypeRef) -> Result<Value, Error> {
        let mut events = LiveEvents::new(input, self.options.alias_limits);
        let value = match events.next()? {
            None => {
                return if expected.is_value_type() {
                    Err(eof(events.last_mark()))
                } else {
                    Ok(Value::Null)
                };
            }
            Some(Ev::DocumentStart { .. }) => self.deserialize_document(&mut events, expected)?,
            Some(other) => {
                return Err(Error::at(
                    other.start(),
                    other.end(),
                    format!("unexpected {} before the first document", other.describe()),
                ));
            }
        };
        match events.next()? {
            None => Ok(value),
            Some(Ev::DocumentStart { start, end }) => Err(Error::at(
                start,
                end,
                "multiple YAML documents detected; use from_str_multiple",
            )),
            Some(other) => Err(Error::at(
                other.start(),
                other.end(),
                format!("unexpected {} after the document", other.describe()),
            )),
        }
    }

    fn parse_multiple(&self, input: &str, expected: &TypeRef) -> Result<Vec<Value>, Error> {
        let mut events = LiveEvents::new(input, self.options.alias_limits);
        let mut values = Vec::new();
        while let Some(ev) = events.next()? {
            match ev {
                Ev::DocumentStart { .. } => {
                    if Self::is_empty_document(&mut events)? {
                        events.skip_node()?;
                        Self::expect_document_end(&mut events)?;
                        continue;
                    }
                    values.push(self.deserialize_document(&mut events, expected)?);
                }
                other => {
                    return Err(Error::at(
                        other.start(),
                        other.end(),
                        format!("unexpected {} between documents", other.describe()),
                    ));
                }
            }
        }
        Ok(values)
    }

    /// Body plus closing marker of a document whose start was already consumed.
    fn deserialize_document(
        &self,
        events: &mut dyn EventStream,
        expected: &TypeRef,
    ) -> Result<Value, Error> {
        let value = self.document_body(events, expected)?;
        Self::expect_document_end(events)?;
        Ok(value)
    }

    fn expect_document_end(events: &mut dyn EventStream) -> Result<(), Error> {
        match events.next()? {
            Some(Ev::DocumentEnd { .. }) | None => Ok(()),
            Some(other) => Err(Error::at(
                other.start(),
                other.end(),
                format!("unexpected {} at the end of the document", other.describe()),
            )),
        }
    }

    /// A document is empty when its only node is an untagged null scalar; the parser reports
    /// a document with no content that way.
    fn is_empty_document(events: &mut dyn EventStream) -> Result<bool, Error> {
        Ok(events.accept_node()?.is_some_and(|node| {
            node.tag.is_none()
                && node.anchor == 0
                && node
                    .as_scalar()
                    .is_some_and(|(text, style)| scalar_is_nullish(text, style))
        }))
    }

    fn decorate(&self, err: Error, input: &str) -> Error {
        if self.options.with_snippet {
            err.with_snippet(input, self.options.crop_radius)
        } else {
            err
        }
    }
}
