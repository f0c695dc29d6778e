//! The value deserializer: orchestrates type resolution, node dispatch and conversion.
//!
//! One dispatch call runs these steps:
//! 1. Accept the pending node event, skipping standalone comments when the stream does not
//!    drop them itself (an inline comment means "no node yet").
//! 2. Run the type resolver chain; the first resolver that decides wins.
//! 3. Run the node deserializer chain; the first one that produces a value wins.
//! 4. Convert the produced value into the expected type.
//!
//! Failures from steps 2-4 that carry no position are wrapped once with the marks of the
//! node event. Nested values are produced by re-entering the `nested` value deserializer.

use std::sync::Arc;

use crate::converter::TypeConverter;
use crate::error::Error;
use crate::events::{EventStream, NodeEvent};
use crate::location::Mark;
use crate::nodes::{NodeDeserializer, NodeOutcome};
use crate::resolvers::NodeTypeResolver;
use crate::types::TypeRef;
use crate::value::Value;

/// Recursive deserialization callback handed to node deserializers.
pub type Nested<'a> = dyn FnMut(&mut dyn EventStream, &TypeRef) -> Result<Value, Error> + 'a;

/// Per-document dispatch state, threaded through every nested call.
#[derive(Debug, Default)]
pub struct DeserializerState {
    depth: usize,
    max_depth_seen: usize,
}

impl DeserializerState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current nesting depth (0 outside any dispatch call).
    pub fn depth(&self) -> usize {
        self.depth
    }

    /// Deepest nesting reached so far.
    pub fn max_depth_seen(&self) -> usize {
        self.max_depth_seen
    }

    fn enter(&mut self) {
        self.depth += 1;
        self.max_depth_seen = self.max_depth_seen.max(self.depth);
    }

    fn leave(&mut self) {
        self.depth = self.depth.saturating_sub(1);
    }
}

/// Produces a value of an expected type from an event stream.
pub trait ValueDeserializer: Send + Sync {
    /// Deserialize one node (and its children) as `expected`.
    ///
    /// `nested` is the deserializer used for child nodes; it is usually the outermost
    /// decorator so that every nesting level goes through the full stack.
    fn deserialize_value(
        &self,
        stream: &mut dyn EventStream,
        expected: &TypeRef,
        state: &mut DeserializerState,
        nested: &dyn ValueDeserializer,
    ) -> Result<Value, Error>;
}

/// Chain-driven value deserializer.
///
/// Chains and the converter are fixed at construction and only read during dispatch, so a
/// single instance can serve any number of independent streams.
pub struct NodeValueDeserializer {
    deserializers: Vec<Arc<dyn NodeDeserializer>>,
    resolvers: Vec<Arc<dyn NodeTypeResolver>>,
    converter: Arc<dyn TypeConverter>,
}

impl NodeValueDeserializer {
    pub fn new(
        deserializers: Vec<Arc<dyn NodeDeserializer>>,
        resolvers: Vec<Arc<dyn NodeTypeResolver>>,
        converter: Arc<dyn TypeConverter>,
    ) -> Self {
        Self {
            deserializers,
            resolvers,
            converter,
        }
    }

    /// Peek the next structural node event.
    ///
    /// Comments are only skipped when the stream keeps them, the expected type does not read
    /// itself from the stream, and the pending comment is not inline.
    fn node_event(
        stream: &mut dyn EventStream,
        expected: &TypeRef,
    ) -> Result<Option<NodeEvent>, Error> {
        let node = stream.accept_node()?;
        if node.is_none() && !stream.skips_comments() && !expected.is_self_converting() {
            if stream.pending_comment()?.is_some_and(|c| c.inline) {
                return Ok(None);
            }
            stream.skip_following_comments()?;
            return stream.accept_node();
        }
        Ok(node)
    }

    fn resolve_type(&self, node: Option<&NodeEvent>, expected: &TypeRef) -> Result<TypeRef, Error> {
        let mut current = expected.clone();
        for resolver in &self.resolvers {
            if resolver.resolve(node, &mut current)? {
                break;
            }
        }
        Ok(current)
    }
}

impl std::fmt::Debug for NodeValueDeserializer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NodeValueDeserializer")
            .field(
                "deserializers",
                &self.deserializers.iter().map(|d| d.name()).collect::<Vec<_>>(),
            )
            .field(
                "resolvers",
                &self.resolvers.iter().map(|r| r.name()).collect::<Vec<_>>(),
            )
            .finish_non_exhaustive()
    }
}

impl ValueDeserializer for NodeValueDeserializer {
    fn deserialize_value(
        &self,
        stream: &mut dyn EventStream,
        expected: &TypeRef,
        state: &mut DeserializerState,
        nested: &dyn ValueDeserializer,
    ) -> Result<Value, Error> {
        let node = Self::node_event(stream, expected)?;
        let (start, end) = node
            .as_ref()
            .map_or((Mark::EMPTY, Mark::EMPTY), |n| (n.start, n.end));

        let node_type = self
            .resolve_type(node.as_ref(), expected)
            .map_err(|err| err.wrap_at(start, end))?;
        crate::trace!(expected = %expected, resolved = %node_type, "resolved node type");

        let mut nested_fn =
            |s: &mut dyn EventStream, t: &TypeRef| nested.deserialize_value(s, t, state, nested);

        for deserializer in &self.deserializers {
            match deserializer.deserialize(stream, &node_type, &mut nested_fn) {
                Ok(NodeOutcome::Declined) => continue,
                Ok(NodeOutcome::Deserialized(value)) => {
                    crate::trace!(by = deserializer.name(), ty = %node_type, "node deserialized");
                    return self
                        .converter
                        .change_type(value, expected)
                        .map_err(|err| err.wrap_at(start, end));
                }
                Err(err) => {
                    crate::debug!(by = deserializer.name(), error = %err, "node deserializer failed");
                    return Err(err.wrap_at(start, end));
                }
            }
        }

        Err(Error::unresolved(node_type.name(), start, end))
    }
}

/// Decorator that bounds the nesting depth of dispatch calls.
#[derive(Debug)]
pub struct DepthLimitedValueDeserializer<V> {
    inner: V,
    max_depth: usize,
}

impl<V: ValueDeserializer> DepthLimitedValueDeserializer<V> {
    pub fn new(inner: V, max_depth: usize) -> Self {
        Self { inner, max_depth }
    }
}

impl<V: ValueDeserializer> ValueDeserializer for DepthLimitedValueDeserializer<V> {
    fn deserialize_value(
        &self,
        stream: &mut dyn EventStream,
        expected: &TypeRef,
        state: &mut DeserializerState,
        nested: &dyn ValueDeserializer,
    ) -> Result<Value, Error> {
        if state.depth() >= self.max_depth {
            let (start, end) = stream
                .accept_node()?
                .map_or((stream.last_mark(), stream.last_mark()), |n| (n.start, n.end));
            return Err(Error::at(
                start,
                end,
                format!("maximum nesting depth of {} exceeded", self.max_depth),
            ));
        }
        state.enter();
        let result = self.inner.deserialize_value(stream, expected, state, nested);
        state.leave();
        result
    }
}
