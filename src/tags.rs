//! YAML core schema tags in their shorthand, local and canonical spellings.
use crate::types::{PrimitiveKind, TypeRef};

pub(crate) const TAG_STR: &[&str] = &["!!str", "!str", "tag:yaml.org,2002:str", "tag:yaml.org,2002:!str"];
pub(crate) const TAG_INT: &[&str] = &["!!int", "!int", "tag:yaml.org,2002:int", "tag:yaml.org,2002:!int"];
pub(crate) const TAG_FLOAT: &[&str] = &["!!float", "!float", "tag:yaml.org,2002:float", "tag:yaml.org,2002:!float"];
pub(crate) const TAG_BOOL: &[&str] = &["!!bool", "!bool", "tag:yaml.org,2002:bool", "tag:yaml.org,2002:!bool"];
pub(crate) const TAG_NULL: &[&str] = &["!!null", "!null", "tag:yaml.org,2002:null", "tag:yaml.org,2002:!null"];
pub(crate) const TAG_SEQ: &[&str] = &["!!seq", "!seq", "tag:yaml.org,2002:seq", "tag:yaml.org,2002:!seq"];
pub(crate) const TAG_MAP: &[&str] = &["!!map", "!map", "tag:yaml.org,2002:map", "tag:yaml.org,2002:!map"];
pub(crate) const TAG_BINARY: &[&str] = &["!!binary", "!binary", "tag:yaml.org,2002:binary", "tag:yaml.org,2002:!binary"];
pub(crate) const TAG_TIMESTAMP: &[&str] = &[
    "!!timestamp",
    "!timestamp",
    "tag:yaml.org,2002:timestamp",
    "tag:yaml.org,2002:!timestamp",
];

/// Non-specific tag `!`: forces string interpretation of a plain scalar.
pub(crate) const TAG_NON_SPECIFIC: &str = "!";

fn is_one_of(tag: Option<&str>, family: &[&str]) -> bool {
    tag.is_some_and(|t| family.contains(&t))
}

pub(crate) fn is_null_tag(tag: Option<&str>) -> bool {
    is_one_of(tag, TAG_NULL)
}

pub(crate) fn is_binary_tag(tag: Option<&str>) -> bool {
    is_one_of(tag, TAG_BINARY)
}

pub(crate) fn is_str_tag(tag: Option<&str>) -> bool {
    tag == Some(TAG_NON_SPECIFIC) || is_one_of(tag, TAG_STR)
}

/// True for tags defined by the YAML core/failsafe schemas (plus `!!binary`/`!!timestamp`).
pub(crate) fn is_core_tag(tag: &str) -> bool {
    tag == TAG_NON_SPECIFIC
        || [
            TAG_STR,
            TAG_INT,
            TAG_FLOAT,
            TAG_BOOL,
            TAG_NULL,
            TAG_SEQ,
            TAG_MAP,
            TAG_BINARY,
            TAG_TIMESTAMP,
        ]
        .iter()
        .any(|family| family.contains(&tag))
}

/// Default `(tag, type)` mappings for core tags.
pub(crate) fn core_tag_mappings() -> Vec<(&'static str, TypeRef)> {
    let mut out = Vec::new();
    let families: [(&[&str], fn() -> TypeRef); 7] = [
        (TAG_STR, TypeRef::string),
        (TAG_INT, TypeRef::i64),
        (TAG_FLOAT, TypeRef::f64),
        (TAG_BOOL, TypeRef::bool),
        (TAG_SEQ, || TypeRef::sequence(TypeRef::any())),
        (TAG_MAP, || TypeRef::mapping(TypeRef::any(), TypeRef::any())),
        (TAG_BINARY, || TypeRef::primitive(PrimitiveKind::Bytes)),
    ];
    for (family, make) in families {
        for tag in family {
            out.push((*tag, make()));
        }
    }
    out
}
