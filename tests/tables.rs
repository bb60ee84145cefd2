//! Document parsing tests: table scanning, definition building, parse-time errors.

use packspec::ast::{BaseType, ConstantKind, Endianness};
use packspec::{parse, parse_documents, parse_with, ParseError, ParseOptions};

// ==================== Well-formed documents ====================

#[test]
fn parse_empty_document() {
    let spec = parse("").expect("empty document can parse");
    assert!(spec.is_empty());
}

#[test]
fn parse_prose_only() {
    let spec = parse("# Title\n\nSome text.\n\n| a | b |\n|---|---|\n| 1 | 2 |\n").expect("parse");
    assert!(spec.is_empty());
}

#[test]
fn parse_bundled_eeprom_document() {
    let spec = parse(include_str!("../formats/eeprom.md")).expect("parse");
    assert_eq!(spec.structs.len(), 3);
    assert_eq!(spec.enums.len(), 1);
    assert_eq!(spec.constants.len(), 7);
    assert_eq!(spec.unions.len(), 1);

    let v3 = spec.get_struct("JEEPROMHeaderv3").expect("v3");
    assert_eq!(v3.total_size, 256);
    assert_eq!(v3.version, Some(3));
    assert_eq!(v3.crc_field.as_deref(), Some("crc32"));
    let coverage = v3.crc_coverage.expect("coverage");
    assert_eq!((coverage.start, coverage.end), (0, 251));
    assert_eq!(v3.fields.len(), 14);

    let ts = v3.field("timestamp").expect("timestamp");
    assert_eq!(ts.base_type, BaseType::I64);
    assert_eq!(ts.endianness, Endianness::Little);
    assert_eq!(ts.offset, 244);

    let reserved = v3.field("header_reserved").expect("reserved");
    assert_eq!(reserved.offset, 10);
    assert_eq!(reserved.offset_end, Some(11));
    assert_eq!(reserved.array_len, 2);
}

#[test]
fn parse_enum_metadata_and_annotations() {
    let spec = parse(include_str!("../formats/eeprom.md")).expect("parse");
    let e = &spec.enums[0];
    assert_eq!(e.name, "JEEFSSignatureAlgorithm");
    assert_eq!(e.c_prefix, "JEEFS_SIG");
    assert_eq!(e.class_name, "SignatureAlgorithm");
    assert_eq!(e.extra_columns, vec!["signature size".to_string()]);
    let values: Vec<i64> = e.members.iter().map(|m| m.value).collect();
    assert_eq!(values, vec![0, 1, 2]);
    assert_eq!(e.members[2].extra.get("signature size").map(String::as_str), Some("64"));
}

#[test]
fn parse_constant_kinds() {
    let spec = parse(include_str!("../formats/eeprom.md")).expect("parse");
    let kind = |name: &str| {
        spec.constants
            .iter()
            .find(|c| c.name == name)
            .map(|c| c.kind)
            .expect("constant")
    };
    assert_eq!(kind("MAGIC"), ConstantKind::String);
    assert_eq!(kind("EEPROM_EMPTYBYTE"), ConstantKind::Byte);
    assert_eq!(kind("EEPROM_PARTITION_SIZE"), ConstantKind::Integer);
}

#[test]
fn parse_bare_annotation_and_padding() {
    let src = r#"
<!-- CONSTANTS -->
| Name | Value | Type | Description |
|------|-------|------|-------------|
| A | 1 |
"#;
    let spec = parse(src).expect("parse");
    assert_eq!(spec.constants[0].kind, ConstantKind::Integer);
    assert_eq!(spec.constants[0].description, "");
}

#[test]
fn parse_table_ends_at_blank_line() {
    let src = r#"
<!-- UNION: U -->
| Member | Type |
|--------|------|
| a | uint8_t |

| b | uint16_t |
"#;
    let spec = parse(src).expect("parse");
    assert_eq!(spec.unions[0].members.len(), 1);
}

#[test]
fn parse_documents_concatenate_in_order() {
    let a = "<!-- CONSTANTS -->\n| Name | Value |\n|-|-|\n| A | 1 |\n";
    let b = "<!-- CONSTANTS -->\n| Name | Value |\n|-|-|\n| B | 2 |\n| C | 3 |\n";
    let spec = parse_documents([("a.md", a), ("b.md", b)], ParseOptions::default()).expect("parse");
    let names: Vec<&str> = spec.constants.iter().map(|c| c.name.as_str()).collect();
    assert_eq!(names, vec!["A", "B", "C"]);
}

#[test]
fn parse_files_from_disk() {
    let dir = tempfile::tempdir().expect("tempdir");
    let first = dir.path().join("first.md");
    let second = dir.path().join("second.md");
    std::fs::write(&first, "<!-- CONSTANTS -->\n| Name | Value |\n|-|-|\n| A | 1 |\n").expect("write");
    std::fs::write(&second, "<!-- UNION: U -->\n| Member | Type |\n|-|-|\n| a | uint8_t |\n").expect("write");
    let spec = packspec::parse_files(&[&first, &second], ParseOptions::default()).expect("parse");
    assert_eq!(spec.constants.len(), 1);
    assert_eq!(spec.unions.len(), 1);
}

// ==================== Orphan annotations ====================

#[test]
fn orphan_annotation_is_skipped_by_default() {
    let src = "<!-- STRUCT: Lost -->\n<!-- SIZE: 4 -->\n\nJust prose.\n";
    let spec = parse(src).expect("lenient parse");
    assert!(spec.is_empty());
}

#[test]
fn orphan_annotation_is_an_error_when_strict() {
    let src = "<!-- STRUCT: Lost -->\n<!-- SIZE: 4 -->\n\nJust prose.\n";
    let err = parse_with(src, ParseOptions { strict_annotations: true }).expect_err("strict parse");
    match err {
        ParseError::OrphanAnnotation { line, keys } => {
            assert_eq!(line, 1);
            assert_eq!(keys, vec!["STRUCT".to_string(), "SIZE".to_string()]);
        }
        other => panic!("unexpected error: {}", other),
    }
}

// ==================== Parse-time errors ====================

#[test]
fn error_missing_struct_columns() {
    let src = "<!-- STRUCT: S -->\n<!-- SIZE: 1 -->\n| Offset | Field |\n|-|-|\n| 0 | a |\n";
    let err = parse(src).expect_err("missing columns");
    let msg = err.to_string();
    assert!(msg.contains("'S'"), "{}", msg);
    assert!(msg.contains("size, type"), "{}", msg);
}

#[test]
fn error_unknown_base_type() {
    let src = "<!-- STRUCT: S -->\n<!-- SIZE: 4 -->\n| Offset | Size | Field | Type |\n|-|-|-|-|\n| 0 | 4 | f | float |\n";
    assert!(matches!(parse(src), Err(ParseError::UnknownType { .. })));
}

#[test]
fn error_bad_offset_and_type_syntax() {
    let bad_offset = "<!-- STRUCT: S -->\n<!-- SIZE: 1 -->\n| Offset | Size | Field | Type |\n|-|-|-|-|\n| x | 1 | a | uint8_t |\n";
    assert!(matches!(parse(bad_offset), Err(ParseError::InvalidOffset { .. })));
    let bad_type = "<!-- STRUCT: S -->\n<!-- SIZE: 1 -->\n| Offset | Size | Field | Type |\n|-|-|-|-|\n| 0 | 1 | a | uint8_t[ |\n";
    assert!(matches!(parse(bad_type), Err(ParseError::InvalidType { .. })));
}

#[test]
fn error_enum_and_constants_columns() {
    let bad_enum = "<!-- ENUM: E -->\n| Name |\n|-|\n| A |\n";
    assert!(matches!(parse(bad_enum), Err(ParseError::MissingColumns { kind: "enum", .. })));
    let bad_constants = "<!-- CONSTANTS -->\n| Name |\n|-|\n| A |\n";
    assert!(matches!(
        parse(bad_constants),
        Err(ParseError::MissingColumns { kind: "constants", .. })
    ));
}

#[test]
fn error_names_the_document() {
    let err = parse_documents(
        [("good.md", ""), ("broken.md", "<!-- ENUM: E -->\n| Name |\n|-|\n| A |\n")],
        ParseOptions::default(),
    )
    .expect_err("broken document");
    assert!(err.to_string().starts_with("broken.md: "), "{}", err);
}
