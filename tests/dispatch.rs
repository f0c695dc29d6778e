use std::sync::{Arc, Mutex};

use indoc::indoc;
use saphyr_dispatch::types::{FieldDef, ObjectDef, PrimitiveKind, Shape, TypeDef, YamlConvertible};
use saphyr_dispatch::{
    Comment, DeserializerBuilder, Error, ErrorKind, Ev, EventBuffer, EventStream, Mark, Nested,
    NodeDeserializer, NodeEvent, NodeOutcome, NodeTypeResolver, TypeRef, Value,
};

/// Declines every node, remembering the type it was offered.
struct Recorder(Arc<Mutex<Vec<String>>>);

impl NodeDeserializer for Recorder {
    fn deserialize(
        &self,
        _stream: &mut dyn EventStream,
        ty: &TypeRef,
        _nested: &mut Nested<'_>,
    ) -> Result<NodeOutcome, Error> {
        self.0.lock().unwrap().push(ty.name().to_owned());
        Ok(NodeOutcome::Declined)
    }
}

fn shapes() -> (TypeRef, TypeRef, TypeRef) {
    let shape = TypeRef::abstract_type("Shape");
    let circle = TypeDef::new(
        "Circle",
        Shape::Object(ObjectDef::new().field(FieldDef::new("radius", TypeRef::f64()).required())),
    )
    .with_base(shape.clone())
    .into_ref();
    let square = TypeDef::new(
        "Square",
        Shape::Object(ObjectDef::new().field(FieldDef::new("side", TypeRef::f64()).required())),
    )
    .with_base(shape.clone())
    .into_ref();
    (shape, circle, square)
}

fn plain() -> DeserializerBuilder {
    DeserializerBuilder::new().with_options(saphyr_dispatch::options! { with_snippet: false })
}

#[test]
fn typed_mapping_keeps_document_order() {
    let de = plain().build();
    let ty = TypeRef::mapping(TypeRef::string(), TypeRef::i64());
    let value = de.from_str("{b: 2, a: 1}", &ty).unwrap();
    let map = value.as_mapping().unwrap();
    let keys: Vec<_> = map.keys().filter_map(Value::as_str).collect();
    assert_eq!(keys, ["b", "a"]);
    assert_eq!(map.get_str("a"), Some(&Value::Int(1)));
    assert_eq!(map.get_str("b"), Some(&Value::Int(2)));
}

#[test]
fn tags_select_concrete_types() {
    let (shape, circle, square) = shapes();
    let seen = Arc::new(Mutex::new(Vec::new()));
    let de = plain()
        .with_tag_mapping("!circle", circle)
        .with_tag_mapping("!square", square)
        .with_node_deserializer_first(Recorder(seen.clone()))
        .build();

    let yaml = indoc! {"
        - !circle {radius: 2}
        - !square
          side: 3
    "};
    let value = de.from_str(yaml, &TypeRef::sequence(shape)).unwrap();
    let items = value.as_sequence().unwrap();
    let first = items[0].as_object().unwrap();
    assert_eq!(first.ty.name(), "Circle");
    assert_eq!(first.get("radius"), Some(&Value::Float(2.0)));
    let second = items[1].as_object().unwrap();
    assert_eq!(second.ty.name(), "Square");
    assert_eq!(second.get("side"), Some(&Value::Float(3.0)));

    let seen = seen.lock().unwrap();
    assert!(seen.iter().any(|t| t == "Circle"));
    assert!(seen.iter().any(|t| t == "Square"));
    assert!(!seen.iter().any(|t| t == "Shape"), "{seen:?}");
}

#[test]
fn untagged_abstract_type_is_unresolved() {
    let (shape, circle, _) = shapes();
    let de = plain().with_tag_mapping("!circle", circle).build();
    let err = de.from_str("radius: 2\n", &shape).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::UnresolvedNode);
    assert!(err.to_string().contains("into type Shape"), "{err}");
    let at = err.location().unwrap();
    assert_eq!((at.line(), at.column()), (1, 1));
}

#[test]
fn type_mappings_build_the_registered_type() {
    let animal = TypeRef::abstract_type("Animal");
    let dog = TypeDef::new(
        "Dog",
        Shape::Object(ObjectDef::new().field(FieldDef::new("name", TypeRef::string()))),
    )
    .with_base(animal.clone())
    .into_ref();
    let de = plain().with_type_mapping(&animal, dog).build();
    let value = de.from_str("name: rex\n", &animal).unwrap();
    let obj = value.as_object().unwrap();
    assert_eq!(obj.ty.name(), "Dog");
    assert_eq!(obj.get("name"), Some(&Value::from("rex")));
}

#[test]
fn custom_resolvers_run_before_builtins() {
    struct Everything;
    impl NodeTypeResolver for Everything {
        fn resolve(&self, _node: Option<&NodeEvent>, ty: &mut TypeRef) -> Result<bool, Error> {
            if ty.as_primitive() == Some(PrimitiveKind::I64) {
                *ty = TypeRef::string();
                return Ok(true);
            }
            Ok(false)
        }
    }
    let de = plain().with_type_resolver_first(Everything).build();
    let ty = TypeRef::mapping(TypeRef::string(), TypeRef::i64());
    // Resolved as a string, then converted back to the expected integer.
    let value = de.from_str("a: 0x10\n", &ty).unwrap();
    assert_eq!(value.as_mapping().unwrap().get_str("a"), Some(&Value::Int(16)));
}

#[test]
fn self_converting_types_read_themselves() {
    struct Shout;
    impl YamlConvertible for Shout {
        fn read(
            &self,
            stream: &mut dyn EventStream,
            _ty: &TypeRef,
            _nested: &mut Nested<'_>,
        ) -> Result<Value, Error> {
            let node = stream.consume_node()?;
            let (text, _) = node.as_scalar().ok_or_else(|| Error::msg("expected a scalar"))?;
            Ok(Value::String(text.to_uppercase()))
        }
    }
    let shout = TypeDef::new("Shout", Shape::Primitive(PrimitiveKind::String))
        .with_convertible(Arc::new(Shout))
        .into_ref();
    let de = plain().build();
    let ty = TypeRef::mapping(TypeRef::string(), shout);
    let value = de.from_str("greeting: hello\n", &ty).unwrap();
    assert_eq!(
        value.as_mapping().unwrap().get_str("greeting"),
        Some(&Value::from("HELLO"))
    );
}

#[test]
fn comments_in_event_streams_are_skipped() {
    let m = |i: u64| Mark::new(i, 1, i as u32 + 1);
    let mut stream = EventBuffer::new([
        Ev::Comment(Comment::standalone(" header", m(0), m(8))),
        Ev::Node(NodeEvent::sequence_start(m(9), m(10))),
        Ev::Comment(Comment::standalone(" first", m(10), m(17))),
        Ev::Node(NodeEvent::scalar("1", m(18), m(19))),
        Ev::Comment(Comment::inline(" trailing", m(20), m(30))),
        Ev::Node(NodeEvent::scalar("2", m(31), m(32))),
        Ev::SequenceEnd { start: m(33), end: m(34) },
    ]);
    let de = plain().build();
    let value = de
        .deserialize(&mut stream, &TypeRef::sequence(TypeRef::i64()))
        .unwrap();
    assert_eq!(value, Value::Sequence(vec![Value::Int(1), Value::Int(2)]));
    assert_eq!(stream.remaining(), 0);
}

#[test]
fn one_deserializer_serves_many_threads() {
    let de = Arc::new(plain().build());
    std::thread::scope(|scope| {
        for i in 0..4 {
            let de = de.clone();
            scope.spawn(move || {
                let yaml = format!("[{i}, {}]", i + 1);
                let value = de.from_str(&yaml, &TypeRef::sequence(TypeRef::i64())).unwrap();
                assert_eq!(value, Value::Sequence(vec![Value::Int(i), Value::Int(i + 1)]));
            });
        }
    });
}
