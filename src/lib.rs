//! Pluggable YAML value deserialization over `saphyr-parser` events.
//!
//! A [`Deserializer`] drives a chain of [`NodeTypeResolver`]s and [`NodeDeserializer`]s over
//! an [`EventStream`]. For every node, resolvers narrow the expected [`TypeRef`] (for example
//! from a tag), then deserializers are offered the node in order until one of them accepts
//! it. The produced [`Value`] is converted to the expected type and failures are reported
//! with the node's source position.
//!
//! ```rust
//! use saphyr_dispatch::{DeserializerBuilder, TypeRef, Value};
//!
//! let de = DeserializerBuilder::new().build();
//! let ty = TypeRef::mapping(TypeRef::string(), TypeRef::i64());
//! let value = de.from_str("a: 1\nb: 2\n", &ty).unwrap();
//! let map = value.as_mapping().unwrap();
//! assert_eq!(map.get_str("b"), Some(&Value::Int(2)));
//! ```

pub use builder::{Deserializer, DeserializerBuilder};
pub use converter::{DefaultTypeConverter, NullTypeConverter, TypeConverter};
pub use error::{Error, ErrorKind};
pub use events::{Comment, Ev, EventBuffer, EventStream, NodeEvent, NodeKind, ScalarStyle};
pub use factory::{DefaultObjectFactory, MappingView, ObjectFactory};
pub use live_events::LiveEvents;
pub use location::Mark;
pub use nodes::{NodeDeserializer, NodeOutcome};
pub use options::{AliasLimits, DuplicateKeyPolicy, Options};
pub use resolvers::NodeTypeResolver;
pub use types::{FieldDef, ObjectDef, PrimitiveKind, Shape, TypeDef, TypeRef, YamlConvertible};
pub use value::{Mapping, Object, Value};
pub use value_deserializer::{
    DepthLimitedValueDeserializer, DeserializerState, Nested, NodeValueDeserializer,
    ValueDeserializer,
};

pub mod builder;
pub mod converter;
pub mod error;
pub mod events;
pub mod factory;
pub mod live_events;
pub mod location;
mod macros;
#[cfg(feature = "miette")]
pub mod miette;
pub mod nodes;
pub mod options;
mod parse_scalars;
pub mod resolvers;
mod snippet;
mod tags;
pub mod types;
pub mod value;
pub mod value_deserializer;

#[cfg(feature = "tracing")]
#[allow(unused_imports)]
pub(crate) use tracing::{debug, trace};

#[cfg(not(feature = "tracing"))]
#[doc(hidden)]
#[macro_export]
macro_rules! trace {
    ($($tt:tt)*) => {};
}

#[cfg(not(feature = "tracing"))]
#[doc(hidden)]
#[macro_export]
macro_rules! debug {
    ($($tt:tt)*) => {};
}
