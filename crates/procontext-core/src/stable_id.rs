//! Deterministic ids for exported maps, layers and tables
//!
//! Ids are version-5 UUIDs over a canonical key string of the form
//! `kind|field=value|...`. They are stable only while their inputs are:
//! a layer or table that keeps its backing-store path keeps its id across
//! display-name edits, but moving the backing store changes the id.

use uuid::Uuid;

/// Fixed namespace for every id this tool derives
pub const NAMESPACE: Uuid = Uuid::from_bytes([
    0x2b, 0x62, 0xdd, 0x2f, 0x2b, 0x6e, 0x4f, 0x1a, 0x9a, 0x0d, 0xc1, 0xf7, 0xc5, 0x4f, 0xd0, 0xdb,
]);

/// Trim, collapse blank/absent to empty, use forward slashes
pub fn normalize(value: Option<&str>) -> String {
    match value {
        Some(v) if !v.trim().is_empty() => v.trim().replace('\\', "/"),
        _ => String::new(),
    }
}

/// Build the canonical key `kind|name=value|...`
pub fn canonical_key(kind: &str, fields: &[(&str, Option<&str>)]) -> String {
    let mut key = String::from(kind);
    for (name, value) in fields {
        key.push('|');
        key.push_str(name);
        key.push('=');
        key.push_str(&normalize(*value));
    }
    key
}

/// Derive the id for an entity kind and its identity fields
pub fn id(kind: &str, fields: &[(&str, Option<&str>)]) -> String {
    Uuid::new_v5(&NAMESPACE, canonical_key(kind, fields).as_bytes()).to_string()
}

/// Id of a map: project path, name, kind
pub fn for_map(project_path: Option<&str>, name: &str, map_type: &str) -> String {
    id(
        "map",
        &[("project", project_path), ("name", Some(name)), ("type", Some(map_type))],
    )
}

/// Id of a layer: project path, owning map, structural path, backing store, kind
pub fn for_layer(
    project_path: Option<&str>,
    map_name: &str,
    structural_path: &str,
    data_source_path: Option<&str>,
    layer_type: &str,
) -> String {
    id(
        "layer",
        &[
            ("project", project_path),
            ("map", Some(map_name)),
            ("path", Some(structural_path)),
            ("ds", data_source_path),
            ("type", Some(layer_type)),
        ],
    )
}

/// Id of a standalone table: project path, owning map, name, backing store path and type
pub fn for_table(
    project_path: Option<&str>,
    map_name: &str,
    name: &str,
    data_source_path: Option<&str>,
    data_source_type: Option<&str>,
) -> String {
    id(
        "table",
        &[
            ("project", project_path),
            ("map", Some(map_name)),
            ("name", Some(name)),
            ("ds", data_source_path),
            ("type", data_source_type),
        ],
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_namespace_literal() {
        assert_eq!(NAMESPACE.to_string(), "2b62dd2f-2b6e-4f1a-9a0d-c1f7c54fd0db");
    }

    #[test]
    fn test_normalize() {
        assert_eq!(normalize(None), "");
        assert_eq!(normalize(Some("   ")), "");
        assert_eq!(normalize(Some(" C:\\data\\roads.gdb ")), "C:/data/roads.gdb");
    }

    #[test]
    fn test_canonical_key() {
        let key = canonical_key("map", &[("project", Some("C:\\p.aprx")), ("name", None)]);
        assert_eq!(key, "map|project=C:/p.aprx|name=");
    }

    #[test]
    fn test_id_is_v5_and_deterministic() {
        let a = for_map(Some("C:/p.aprx"), "Main", "2D");
        let b = for_map(Some("C:/p.aprx"), "Main", "2D");
        assert_eq!(a, b);

        let parsed = Uuid::parse_str(&a).unwrap();
        assert_eq!(parsed.get_version_num(), 5);
        assert_eq!(parsed.get_variant(), uuid::Variant::RFC4122);
    }

    #[test]
    fn test_path_separator_agnostic() {
        let a = for_table(Some("C:\\p.aprx"), "Main", "Owners", Some("C:\\d.gdb"), Some("FileGDB"));
        let b = for_table(Some("C:/p.aprx"), "Main", "Owners", Some("C:/d.gdb"), Some("FileGDB"));
        assert_eq!(a, b);
    }

    #[test]
    fn test_distinct_inputs_distinct_ids() {
        let a = for_map(Some("C:/p.aprx"), "Main", "2D");
        let b = for_map(Some("C:/p.aprx"), "Main", "3D");
        assert_ne!(a, b);
    }

    #[test]
    fn test_known_vector() {
        // Computed independently with a reference UUIDv5 implementation
        assert_eq!(
            for_map(Some("C:\\projects\\parcels.aprx"), "Main", "2D"),
            "0cacd663-ac83-5358-9b78-4944bc1b8c2d"
        );
    }
}
