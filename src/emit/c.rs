//! C header: packed typedefs plus static layout assertions.

use crate::ast::{ConstantDef, ConstantKind, EnumDef, FormatSpec, StructDef, UnionDef};
use crate::config::Config;

use super::{commented_banner, items, struct_order, Item};

pub fn emit(spec: &FormatSpec, config: &Config) -> String {
    let guard = &config.c.guard;
    let mut lines = commented_banner(config, "//");
    lines.push(String::new());
    lines.push(format!("#ifndef {}", guard));
    lines.push(format!("#define {}", guard));
    lines.push(String::new());
    lines.push("#include <stddef.h>".to_string());
    lines.push("#include <stdint.h>".to_string());
    lines.push(String::new());
    lines.push("#ifdef __cplusplus".to_string());
    lines.push("extern \"C\" {".to_string());
    lines.push("#endif".to_string());

    let mut constants_started = false;
    let mut packed = false;
    for item in items(spec) {
        match item {
            Item::Constant(c) => {
                if !constants_started {
                    lines.push(String::new());
                    lines.push("// --- Named constants ---".to_string());
                    lines.push(String::new());
                    constants_started = true;
                }
                lines.push(constant(c));
            }
            Item::Enum(e) => {
                lines.push(String::new());
                lines.extend(enumeration(e));
            }
            Item::Struct(s) => {
                open_pack(&mut lines, &mut packed);
                lines.push(String::new());
                lines.extend(structure(s));
            }
            Item::Union(u) => {
                open_pack(&mut lines, &mut packed);
                lines.push(String::new());
                lines.extend(union(u));
            }
        }
    }
    if packed {
        lines.push(String::new());
        lines.push("#pragma pack(pop)".to_string());
    }

    if !spec.structs.is_empty() {
        lines.push(String::new());
        lines.extend(assertions(spec, config));
    }

    lines.push(String::new());
    lines.push("#ifdef __cplusplus".to_string());
    lines.push("}".to_string());
    lines.push("#endif".to_string());
    lines.push(String::new());
    lines.push(format!("#endif // {}", guard));
    lines.push(String::new());
    lines.join("\n")
}

fn open_pack(lines: &mut Vec<String>, packed: &mut bool) {
    if !*packed {
        lines.push(String::new());
        lines.push("#pragma pack(push, 1)".to_string());
        *packed = true;
    }
}

fn constant(c: &ConstantDef) -> String {
    let value = c.unquoted();
    match c.kind {
        ConstantKind::String => format!("#define {} \"{}\"", c.name, escape_c(value)),
        ConstantKind::Byte => match c.byte_value() {
            Some(b) => format!("#define {} '\\x{:02x}'", c.name, b),
            None => format!("#define {} {}", c.name, value),
        },
        ConstantKind::Integer => format!("#define {} {}", c.name, value),
    }
}

/// C string literal body. Octal escapes, since `\x` would swallow following hex digits.
fn escape_c(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for b in s.bytes() {
        match b {
            b'"' => out.push_str("\\\""),
            b'\\' => out.push_str("\\\\"),
            0x20..=0x7e => out.push(b as char),
            _ => out.push_str(&format!("\\{:03o}", b)),
        }
    }
    out
}

fn trailing_comment(text: &str) -> String {
    if text.is_empty() {
        String::new()
    } else {
        format!("  // {}", text)
    }
}

fn enumeration(e: &EnumDef) -> Vec<String> {
    let mut lines = vec![format!("// {}", e.name), format!("enum {} {{", e.name)];
    for m in &e.members {
        lines.push(format!(
            "    {}_{} = {},{}",
            e.c_prefix,
            m.name,
            m.value,
            trailing_comment(&m.description)
        ));
    }
    lines.push("};".to_string());
    lines
}

fn structure(s: &StructDef) -> Vec<String> {
    let mut lines = vec![
        format!("// {} ({} bytes)", s.name, s.total_size),
        "typedef struct {".to_string(),
    ];
    for f in &s.fields {
        let mut comment = format!("{}B, offset {}", f.size, f.offset);
        if !f.description.is_empty() {
            comment.push_str(", ");
            comment.push_str(&f.description);
        }
        let decl = if f.is_array() {
            format!("{} {}[{}];", f.base_type.c_name(), f.name, f.array_len)
        } else {
            format!("{} {};", f.base_type.c_name(), f.name)
        };
        lines.push(format!("    {}{}", decl, trailing_comment(&comment)));
    }
    lines.push(format!("}} {};", s.name));
    lines
}

fn union(u: &UnionDef) -> Vec<String> {
    let mut lines = vec![format!("// {}", u.name), format!("union {} {{", u.name)];
    for m in &u.members {
        let decl = match m.type_name.split_once('[') {
            Some((base, rest)) => format!("{} {}[{};", base.trim(), m.name, rest.trim()),
            None => format!("{} {};", m.type_name, m.name),
        };
        lines.push(format!("    {}{}", decl, trailing_comment(&m.description)));
    }
    lines.push("};".to_string());
    lines
}

fn assertions(spec: &FormatSpec, config: &Config) -> Vec<String> {
    let assert = &config.c.assert_macro;
    let mut lines = vec![
        "// --- Layout assertions ---".to_string(),
        "#ifdef __cplusplus".to_string(),
        format!("#define {} static_assert", assert),
        "#else".to_string(),
        format!("#define {} _Static_assert", assert),
        "#endif".to_string(),
    ];
    for s in struct_order(&spec.structs) {
        lines.push(format!(
            "{}(sizeof({}) == {}, \"sizeof({}) must be {}\");",
            assert, s.name, s.total_size, s.name, s.total_size
        ));
        if config.offset_asserts {
            for f in &s.fields {
                lines.push(format!(
                    "{}(offsetof({}, {}) == {}, \"offsetof({}, {}) must be {}\");",
                    assert, s.name, f.name, f.offset, s.name, f.name, f.offset
                ));
            }
        }
    }
    lines.push(format!("#undef {}", assert));
    lines
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parse;

    const SRC: &str = r#"
<!-- CONSTANTS -->
| Name | Value | Type |
|------|-------|------|
| MAGIC | "JETHOME" | string |
| EMPTYBYTE | 0x00 | byte |
| PARTITION_SIZE | 4096 | int |

<!-- ENUM: JEEFSSignatureAlgorithm -->
<!-- C_PREFIX: JEEFS_SIG -->
| Value | Name | Description |
|-------|------|-------------|
| 0 | NONE | No signature |
| 1 | SECP192R1 | |

<!-- STRUCT: Filev1 -->
<!-- SIZE: 6 -->
| Offset | Size | Field | Type | Endianness | Description |
|--------|------|-------|------|------------|-------------|
| 0 | 2 | dataSize | uint16_t | little-endian | Payload size |
| 2 | 4 | crc32 | uint32_t | little-endian | |

<!-- UNION: Any -->
| Member | Type | Description |
|--------|------|-------------|
| file | Filev1 | File header |
| raw | uint8_t[6] | |
"#;

    #[test]
    fn renders_all_sections() {
        let spec = parse(SRC).expect("parse");
        let out = emit(&spec, &Config::default().with_prefix("jeefs"));
        assert!(out.starts_with("// DO NOT EDIT: generated by packspec"));
        assert!(out.contains("#ifndef JEEFS_GENERATED_H"));
        assert!(out.contains("#define MAGIC \"JETHOME\""));
        assert!(out.contains("#define EMPTYBYTE '\\x00'"));
        assert!(out.contains("#define PARTITION_SIZE 4096"));
        assert!(out.contains("    JEEFS_SIG_NONE = 0,  // No signature\n    JEEFS_SIG_SECP192R1 = 1,\n};"));
        assert!(out.contains("    uint16_t dataSize;  // 2B, offset 0, Payload size"));
        assert!(out.contains("} Filev1;"));
        assert!(out.contains("    uint8_t raw[6];"));
        assert!(out.contains("JEEFS_STATIC_ASSERT(sizeof(Filev1) == 6, \"sizeof(Filev1) must be 6\");"));
        assert!(out.contains("JEEFS_STATIC_ASSERT(offsetof(Filev1, crc32) == 2, \"offsetof(Filev1, crc32) must be 2\");"));
        let push = out.find("#pragma pack(push, 1)").expect("push");
        let union_at = out.find("union Any {").expect("union");
        let pop = out.find("#pragma pack(pop)").expect("pop");
        assert!(push < union_at && union_at < pop);
        assert!(out.ends_with("#endif // JEEFS_GENERATED_H\n"));
    }

    #[test]
    fn offset_asserts_can_be_disabled() {
        let spec = parse(SRC).expect("parse");
        let config = Config {
            offset_asserts: false,
            ..Config::default()
        };
        let out = emit(&spec, &config);
        assert!(out.contains("FORMAT_STATIC_ASSERT(sizeof(Filev1) == 6"));
        assert!(!out.contains("offsetof("));
    }

    #[test]
    fn no_pack_region_without_layouts() {
        let spec = parse("<!-- CONSTANTS -->\n| Name | Value |\n|-|-|\n| A | 1 |\n").expect("parse");
        let out = emit(&spec, &Config::default());
        assert!(!out.contains("#pragma pack"));
        assert!(!out.contains("Layout assertions"));
    }

    #[test]
    fn string_escapes_are_octal() {
        assert_eq!(escape_c("a\u{1}b"), "a\\001b");
    }
}
