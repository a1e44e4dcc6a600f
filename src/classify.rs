use crate::model::DisplayType;
use once_cell::sync::Lazy;
use std::collections::HashMap;

static TYPE_TABLE: Lazy<HashMap<&'static str, DisplayType>> = Lazy::new(|| {
    use DisplayType::*;
    HashMap::from([
        ("varchar", String),
        ("char", String),
        ("character", String),
        ("character varying", String),
        ("text", String),
        ("mediumtext", String),
        ("longtext", String),
        ("uuid", String),
        ("enum", String),
        ("json", String),
        ("int", Number),
        ("integer", Number),
        ("int2", Number),
        ("int4", Number),
        ("int8", Number),
        ("tinyint", Number),
        ("smallint", Number),
        ("mediumint", Number),
        ("bigint", Number),
        ("decimal", Number),
        ("numeric", Number),
        ("float", Number),
        ("double", Number),
        ("double precision", Number),
        ("real", Number),
        ("serial", Number),
        ("bigserial", Number),
        ("bool", Boolean),
        ("boolean", Boolean),
        ("bit", Boolean),
        ("date", Date),
        ("time", Date),
        ("datetime", Date),
        ("timestamp", Date),
        ("timestamptz", Date),
        ("timestamp without time zone", Date),
        ("timestamp with time zone", Date),
    ])
});

/// Maps a physical column type name to the display taxonomy.
///
/// Lookup is case-insensitive and ignores a length suffix such as
/// `varchar(255)`. Unmapped types come back as `Unknown`; `Reference` is
/// never produced here, relation columns get it from the analyzer.
pub fn classify(type_name: &str) -> DisplayType {
    let lowered = type_name.trim().to_ascii_lowercase();
    let base = match lowered.find('(') {
        Some(pos) => lowered[..pos].trim_end(),
        None => lowered.as_str(),
    };
    TYPE_TABLE.get(base).copied().unwrap_or(DisplayType::Unknown)
}
