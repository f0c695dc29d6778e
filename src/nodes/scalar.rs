use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;

use super::{NodeDeserializer, NodeOutcome};
use crate::error::Error;
use crate::events::{EventStream, ScalarStyle};
use crate::options::Options;
use crate::parse_scalars::{
    infer_scalar, parse_bool, parse_int, parse_yaml12_float, scalar_is_nullish,
};
use crate::tags::{is_binary_tag, is_null_tag, is_str_tag};
use crate::types::{PrimitiveKind, Shape, TypeRef};
use crate::value::Value;
use crate::value_deserializer::Nested;

/// Produces `null` for null scalars (`~`, `null`, empty, or `!!null`-tagged) when the type
/// can hold it.
#[derive(Clone, Copy, Debug, Default)]
pub struct NullNodeDeserializer;

impl NodeDeserializer for NullNodeDeserializer {
    fn deserialize(
        &self,
        stream: &mut dyn EventStream,
        ty: &TypeRef,
        _nested: &mut Nested<'_>,
    ) -> Result<NodeOutcome, Error> {
        if ty.is_value_type() {
            return Ok(NodeOutcome::Declined);
        }
        let Some(node) = stream.accept_node()? else {
            return Ok(NodeOutcome::Declined);
        };
        let Some((text, style)) = node.as_scalar() else {
            return Ok(NodeOutcome::Declined);
        };
        let is_null = match node.tag() {
            Some(_) => is_null_tag(node.tag()),
            None => scalar_is_nullish(text, style),
        };
        if !is_null {
            return Ok(NodeOutcome::Declined);
        }
        stream.consume_node()?;
        Ok(NodeOutcome::Deserialized(Value::Null))
    }
}

/// Scalars into primitives, and into inferred values for `any`.
#[derive(Clone, Copy, Debug, Default)]
pub struct ScalarNodeDeserializer {
    strict_booleans: bool,
    legacy_octal_numbers: bool,
}

impl ScalarNodeDeserializer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_options(options: &Options) -> Self {
        Self {
            strict_booleans: options.strict_booleans,
            legacy_octal_numbers: options.legacy_octal_numbers,
        }
    }

    fn infer(&self, text: &str, style: ScalarStyle, tag: Option<&str>) -> Result<Value, Error> {
        if is_binary_tag(tag) {
            return decode_binary(text).map(Value::Bytes);
        }
        if is_str_tag(tag) {
            return Ok(Value::String(text.to_owned()));
        }
        Ok(infer_scalar(text, style, self.legacy_octal_numbers))
    }

    fn parse(
        &self,
        text: &str,
        kind: PrimitiveKind,
        ty: &TypeRef,
    ) -> Result<Value, Error> {
        let fail = |reason: &str| Error::conversion(format!("`{text}`"), ty.name(), reason);
        match kind {
            PrimitiveKind::Bool => parse_bool(text, self.strict_booleans)
                .map(Value::Bool)
                .map_err(|reason| fail(&reason)),
            k if k.is_signed_int() || k.is_unsigned_int() => {
                let wide = parse_int(text, self.legacy_octal_numbers)
                    .ok_or_else(|| fail("not an integer"))?;
                if let Ok(small) = i64::try_from(wide) {
                    Ok(Value::Int(small))
                } else if let Ok(big) = u64::try_from(wide) {
                    Ok(Value::UInt(big))
                } else {
                    Err(fail("out of range"))
                }
            }
            k if k.is_float() => parse_yaml12_float(text)
                .or_else(|| parse_int(text, self.legacy_octal_numbers).map(|i| i as f64))
                .map(Value::Float)
                .ok_or_else(|| fail("not a number")),
            PrimitiveKind::Bytes => decode_binary(text).map(Value::Bytes),
            PrimitiveKind::String | PrimitiveKind::Char => Ok(Value::String(text.to_owned())),
            _ => Err(fail("unsupported scalar target")),
        }
    }
}

/// Decode a `!!binary` scalar. YAML allows whitespace and line breaks inside the base64 text.
fn decode_binary(text: &str) -> Result<Vec<u8>, Error> {
    let cleaned: String = text.chars().filter(|c| !c.is_ascii_whitespace()).collect();
    STANDARD
        .decode(cleaned.as_bytes())
        .map_err(|err| Error::msg(format!("invalid !!binary base64: {err}")))
}

impl NodeDeserializer for ScalarNodeDeserializer {
    fn deserialize(
        &self,
        stream: &mut dyn EventStream,
        ty: &TypeRef,
        _nested: &mut Nested<'_>,
    ) -> Result<NodeOutcome, Error> {
        let target = match ty.shape() {
            Shape::Any => None,
            Shape::Primitive(kind) => Some(*kind),
            _ => return Ok(NodeOutcome::Declined),
        };
        let Some(node) = stream.accept_node()? else {
            return Ok(NodeOutcome::Declined);
        };
        let Some((text, style)) = node.as_scalar() else {
            return Ok(NodeOutcome::Declined);
        };
        let value = match target {
            None => self.infer(text, style, node.tag())?,
            Some(kind) => self.parse(text, kind, ty)?,
        };
        stream.consume_node()?;
        Ok(NodeOutcome::Deserialized(value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::{Ev, EventBuffer, NodeEvent};
    use crate::location::Mark;

    fn one(node: NodeEvent) -> EventBuffer {
        EventBuffer::new([Ev::Node(node)])
    }

    fn plain(text: &str) -> NodeEvent {
        NodeEvent::scalar(text, Mark::EMPTY, Mark::EMPTY)
    }

    fn run(d: &dyn NodeDeserializer, node: NodeEvent, ty: &TypeRef) -> Result<NodeOutcome, Error> {
        let mut nested = |_s: &mut dyn EventStream, _t: &TypeRef| Ok::<_, Error>(Value::Null);
        d.deserialize(&mut one(node), ty, &mut nested)
    }

    #[test]
    fn null_spellings_only_for_nullable_types() {
        for text in ["~", "null", "NULL", ""] {
            assert_eq!(
                run(&NullNodeDeserializer, plain(text), &TypeRef::string()).unwrap(),
                NodeOutcome::Deserialized(Value::Null)
            );
        }
        assert_eq!(
            run(&NullNodeDeserializer, plain("~"), &TypeRef::i64()).unwrap(),
            NodeOutcome::Declined
        );
        let quoted = plain("null").with_style(ScalarStyle::DoubleQuoted);
        assert_eq!(
            run(&NullNodeDeserializer, quoted, &TypeRef::any()).unwrap(),
            NodeOutcome::Declined
        );
        let tagged = plain("nothing").with_tag("!!null");
        assert_eq!(
            run(&NullNodeDeserializer, tagged, &TypeRef::any()).unwrap(),
            NodeOutcome::Deserialized(Value::Null)
        );
        let str_tagged = plain("~").with_tag("!!str");
        assert_eq!(
            run(&NullNodeDeserializer, str_tagged, &TypeRef::any()).unwrap(),
            NodeOutcome::Declined
        );
    }

    #[test]
    fn infers_untyped_scalars() {
        let d = ScalarNodeDeserializer::new();
        let cases = [
            ("42", Value::Int(42)),
            ("0x1F", Value::Int(31)),
            ("true", Value::Bool(true)),
            ("1.5", Value::Float(1.5)),
            ("hello", Value::from("hello")),
            ("18446744073709551615", Value::UInt(u64::MAX)),
        ];
        for (text, expected) in cases {
            assert_eq!(
                run(&d, plain(text), &TypeRef::any()).unwrap(),
                NodeOutcome::Deserialized(expected),
                "{text}"
            );
        }
        let quoted = plain("42").with_style(ScalarStyle::SingleQuoted);
        assert_eq!(
            run(&d, quoted, &TypeRef::any()).unwrap(),
            NodeOutcome::Deserialized(Value::from("42"))
        );
        let forced = plain("42").with_tag("!");
        assert_eq!(
            run(&d, forced, &TypeRef::any()).unwrap(),
            NodeOutcome::Deserialized(Value::from("42"))
        );
    }

    #[test]
    fn parses_typed_scalars() {
        let d = ScalarNodeDeserializer::new();
        assert_eq!(
            run(&d, plain("0o17"), &TypeRef::i64()).unwrap(),
            NodeOutcome::Deserialized(Value::Int(15))
        );
        assert_eq!(
            run(&d, plain(".inf"), &TypeRef::f64()).unwrap(),
            NodeOutcome::Deserialized(Value::Float(f64::INFINITY))
        );
        assert_eq!(
            run(&d, plain("off"), &TypeRef::bool()).unwrap(),
            NodeOutcome::Deserialized(Value::Bool(false))
        );
        let err = run(&d, plain("abc"), &TypeRef::i64()).unwrap_err();
        assert!(matches!(err, Error::Conversion { .. }));
        assert!(!err.is_positioned());
    }

    #[test]
    fn strict_booleans_reject_yaml11() {
        let d = ScalarNodeDeserializer::from_options(&crate::options! { strict_booleans: true });
        assert!(run(&d, plain("yes"), &TypeRef::bool()).is_err());
        assert_eq!(
            run(&d, plain("true"), &TypeRef::bool()).unwrap(),
            NodeOutcome::Deserialized(Value::Bool(true))
        );
    }

    #[test]
    fn decodes_binary() {
        let d = ScalarNodeDeserializer::new();
        let tagged = plain("aGVs\n bG8=").with_tag("!!binary");
        assert_eq!(
            run(&d, tagged, &TypeRef::any()).unwrap(),
            NodeOutcome::Deserialized(Value::Bytes(b"hello".to_vec()))
        );
        assert!(run(&d, plain("***"), &TypeRef::bytes()).is_err());
    }

    #[test]
    fn declines_containers_and_non_scalar_types() {
        let d = ScalarNodeDeserializer::new();
        let seq = NodeEvent::sequence_start(Mark::EMPTY, Mark::EMPTY);
        assert_eq!(run(&d, seq, &TypeRef::any()).unwrap(), NodeOutcome::Declined);
        assert_eq!(
            run(&d, plain("1"), &TypeRef::sequence(TypeRef::i64())).unwrap(),
            NodeOutcome::Declined
        );
    }
}
