//! Python constants module: `IntEnum` classes, named constants and per-struct
//! offset tables.

use std::collections::BTreeMap;

use crate::ast::{ConstantDef, ConstantKind, Endianness, EnumDef, FormatSpec, StructDef, UnionDef};
use crate::config::Config;
use crate::naming::to_upper_snake;
use crate::parser::parse_int;

use super::{annotation_columns, commented_banner, escape_bytes, ColumnValues};

pub fn emit(spec: &FormatSpec, config: &Config) -> String {
    let mut lines = commented_banner(config, "#");
    lines.push("\"\"\"Binary format constants and layouts.\"\"\"".to_string());
    lines.push(String::new());
    lines.push("from __future__ import annotations".to_string());
    if !spec.enums.is_empty() {
        lines.push(String::new());
        lines.push("from enum import IntEnum".to_string());
    }

    let shared = shared_columns(&spec.enums);
    for e in &spec.enums {
        lines.push(String::new());
        lines.push(String::new());
        lines.extend(enumeration(e, config, &shared));
    }

    if !spec.constants.is_empty() {
        lines.push(String::new());
        lines.push(String::new());
        lines.push("# --- Named constants ---".to_string());
        lines.push(String::new());
        for c in &spec.constants {
            lines.push(constant(c, &config.python.constant_prefix));
        }
    }

    for s in python_order(&spec.structs) {
        lines.push(String::new());
        lines.push(String::new());
        lines.extend(structure(s, config));
    }

    for u in &spec.unions {
        lines.push(String::new());
        lines.push(String::new());
        lines.extend(union(u, config));
    }
    lines.push(String::new());
    lines.join("\n")
}

/// Versioned structs newest first, then unversioned ones in document order.
fn python_order(structs: &[StructDef]) -> Vec<&StructDef> {
    let mut versioned: Vec<&StructDef> = structs.iter().filter(|s| s.version.is_some()).collect();
    versioned.sort_by(|a, b| b.version.cmp(&a.version));
    versioned.extend(structs.iter().filter(|s| s.version.is_none()));
    versioned
}

fn stem(name: &str, config: &Config) -> String {
    to_upper_snake(&config.renames.type_name(name))
}

/// Column names that appear in more than one enum.
fn shared_columns(enums: &[EnumDef]) -> Vec<String> {
    let mut seen: BTreeMap<&str, usize> = BTreeMap::new();
    for e in enums {
        for column in annotation_columns(e) {
            *seen.entry(column.name).or_default() += 1;
        }
    }
    seen.into_iter()
        .filter(|(_, n)| *n > 1)
        .map(|(c, _)| c.to_string())
        .collect()
}

fn docstring(text: &str) -> String {
    text.replace('\\', "\\\\").replace('"', "\\\"")
}

fn trailing_comment(text: &str) -> String {
    if text.is_empty() {
        String::new()
    } else {
        format!("  # {}", text)
    }
}

fn enumeration(e: &EnumDef, config: &Config, shared: &[String]) -> Vec<String> {
    let class = config.renames.type_name(&e.class_name);
    let mut lines = vec![
        format!("class {}(IntEnum):", class),
        format!("    \"\"\"{}.\"\"\"", docstring(&e.name)),
        String::new(),
    ];
    for m in &e.members {
        lines.push(format!(
            "    {} = {}{}",
            m.name,
            m.value,
            trailing_comment(&m.description)
        ));
    }
    lines.push(String::new());
    lines.push("    @classmethod".to_string());
    lines.push(format!("    def from_int(cls, value: int) -> {}:", class));
    lines.push("        return cls(value)".to_string());

    for column in annotation_columns(e) {
        let mut table = format!("{}S", to_upper_snake(column.name));
        if shared.iter().any(|c| c == column.name) {
            table = format!("{}_{}", to_upper_snake(&class), table);
        }
        let (value_type, values): (&str, Vec<String>) = match &column.values {
            ColumnValues::Integers(v) => ("int", v.iter().map(|n| n.to_string()).collect()),
            ColumnValues::Text(v) => ("str", v.iter().map(|s| format!("\"{}\"", docstring(s))).collect()),
        };
        lines.push(String::new());
        lines.push(String::new());
        lines.push(format!("{}: dict[{}, {}] = {{", table, class, value_type));
        for (m, value) in e.members.iter().zip(&values) {
            lines.push(format!("    {}.{}: {},", class, m.name, value));
        }
        lines.push("}".to_string());
    }
    lines
}

fn constant(c: &ConstantDef, prefix: &str) -> String {
    let name = if c.name.starts_with(prefix) {
        c.name.clone()
    } else {
        format!("{}{}", prefix, c.name)
    };
    let value = c.unquoted();
    let literal = match c.kind {
        ConstantKind::String => format!("b\"{}\\x00\"", escape_bytes(value)),
        ConstantKind::Byte => match c.byte_value() {
            Some(b) => format!("0x{:02x}", b),
            None => value.to_string(),
        },
        ConstantKind::Integer => match parse_int(value) {
            Some(_) => value.trim().to_string(),
            None => format!("\"{}\"", docstring(value)),
        },
    };
    format!("{} = {}{}", name, literal, trailing_comment(&c.description))
}

fn structure(s: &StructDef, config: &Config) -> Vec<String> {
    let stem = stem(&s.name, config);
    let mut header = format!("# {}: {} bytes", s.name, s.total_size);
    if let Some(v) = s.version {
        header.push_str(&format!(", version {}", v));
    }
    let mut lines = vec![
        header,
        format!("{}_FIELDS: dict[str, tuple[int, int]] = {{", stem),
    ];
    for f in &s.fields {
        let mut comment = f.type_text();
        if f.endianness != Endianness::NotApplicable {
            comment.push(' ');
            comment.push_str(f.endianness.as_str());
        }
        lines.push(format!(
            "    \"{}\": ({}, {}),{}",
            f.name,
            f.offset,
            f.size,
            trailing_comment(&comment)
        ));
    }
    lines.push("}".to_string());
    lines.push(format!("{}_SIZE = {}", stem, s.total_size));
    if let Some(v) = s.version {
        lines.push(format!("{}_VERSION = {}", stem, v));
    }
    if let Some(crc) = &s.crc_field {
        lines.push(format!("{}_CRC_FIELD = \"{}\"", stem, crc));
    }
    if let Some(cov) = s.crc_coverage {
        lines.push(format!("{}_CRC_COVERAGE = ({}, {})", stem, cov.start, cov.end));
    }
    lines.push(format!(
        "assert sum(size for _, size in {stem}_FIELDS.values()) == {stem}_SIZE"
    ));
    lines
}

fn union(u: &UnionDef, config: &Config) -> Vec<String> {
    let stem = stem(&u.name, config);
    let mut lines = vec![
        format!("# {}", u.name),
        format!("{}_MEMBERS: dict[str, str] = {{", stem),
    ];
    for m in &u.members {
        lines.push(format!(
            "    \"{}\": \"{}\",{}",
            m.name,
            m.type_name,
            trailing_comment(&m.description)
        ));
    }
    lines.push("}".to_string());
    lines
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PythonConfig;
    use crate::parse;

    const SRC: &str = r#"
<!-- CONSTANTS -->
| Name | Value | Type | Description |
|------|-------|------|-------------|
| MAGIC | "JETHOME" | string | File magic |
| EEPROM_PARTITION_SIZE | 4096 | int | |
| EMPTYBYTE | 255 | byte | |

<!-- ENUM: JEEFSSignatureAlgorithm -->
<!-- PY_CLASS: SignatureAlgorithm -->
| Value | Name | Description | Signature Size |
|-------|------|-------------|----------------|
| 0 | NONE | No signature | 0 |
| 1 | SECP192R1 | | 48 |

<!-- ENUM: HashAlgorithm -->
| Value | Name | Signature Size |
|-------|------|----------------|
| 0 | SHA256 | 32 |

<!-- STRUCT: Headerv1 -->
<!-- SIZE: 8 -->
<!-- VERSION: 1 -->
<!-- CRC_FIELD: crc32 -->
<!-- CRC_COVERAGE: 0-3 -->
| Offset | Size | Field | Type | Endianness |
|--------|------|-------|------|------------|
| 0 | 4 | magic | char[4] | - |
| 4 | 4 | crc32 | uint32_t | little-endian |

<!-- STRUCT: Headerv2 -->
<!-- SIZE: 4 -->
<!-- VERSION: 2 -->
| Offset | Size | Field | Type | Endianness |
|--------|------|-------|------|------------|
| 0 | 4 | crc32 | uint32_t | little-endian |

<!-- STRUCT: Trailer -->
<!-- SIZE: 1 -->
| Offset | Size | Field | Type |
|--------|------|-------|------|
| 0 | 1 | end | uint8_t |
"#;

    fn render() -> String {
        let config = Config {
            python: PythonConfig {
                constant_prefix: "EEPROM_".to_string(),
            },
            ..Config::default()
        };
        emit(&parse(SRC).expect("parse"), &config)
    }

    #[test]
    fn banner_and_imports() {
        let out = render();
        assert!(out.starts_with("# DO NOT EDIT: generated by packspec"));
        assert!(out.contains("from __future__ import annotations\n\nfrom enum import IntEnum"));
    }

    #[test]
    fn enums_and_annotation_tables() {
        let out = render();
        assert!(out.contains("class SignatureAlgorithm(IntEnum):\n    \"\"\"JEEFSSignatureAlgorithm.\"\"\""));
        assert!(out.contains("    NONE = 0  # No signature\n    SECP192R1 = 1\n"));
        assert!(out.contains("    def from_int(cls, value: int) -> SignatureAlgorithm:"));
        assert!(out.contains("SIGNATURE_ALGORITHM_SIGNATURE_SIZES: dict[SignatureAlgorithm, int] = {"));
        assert!(out.contains("    SignatureAlgorithm.SECP192R1: 48,"));
        assert!(out.contains("HASH_ALGORITHM_SIGNATURE_SIZES: dict[HashAlgorithm, int] = {"));
    }

    #[test]
    fn constants_take_prefix_once() {
        let out = render();
        assert!(out.contains("EEPROM_MAGIC = b\"JETHOME\\x00\"  # File magic"));
        assert!(out.contains("EEPROM_PARTITION_SIZE = 4096\n"));
        assert!(!out.contains("EEPROM_EEPROM_"));
        assert!(out.contains("EEPROM_EMPTYBYTE = 0xff"));
    }

    #[test]
    fn struct_tables() {
        let out = render();
        assert!(out.contains("HEADER_V1_FIELDS: dict[str, tuple[int, int]] = {\n    \"magic\": (0, 4),  # char[4]\n    \"crc32\": (4, 4),  # uint32_t little-endian\n}"));
        assert!(out.contains("HEADER_V1_SIZE = 8\nHEADER_V1_VERSION = 1\nHEADER_V1_CRC_FIELD = \"crc32\"\nHEADER_V1_CRC_COVERAGE = (0, 3)\n"));
        assert!(out.contains("assert sum(size for _, size in HEADER_V1_FIELDS.values()) == HEADER_V1_SIZE"));
        let v2 = out.find("HEADER_V2_SIZE").expect("v2");
        let v1 = out.find("HEADER_V1_SIZE").expect("v1");
        let trailer = out.find("TRAILER_SIZE").expect("trailer");
        assert!(v2 < v1 && v1 < trailer);
    }

    #[test]
    fn no_enum_import_without_enums() {
        let spec = parse("<!-- CONSTANTS -->\n| Name | Value |\n|-|-|\n| A | 1 |\n").expect("parse");
        let out = emit(&spec, &Config::default());
        assert!(!out.contains("IntEnum"));
        assert!(out.contains("A = 1"));
    }
}
