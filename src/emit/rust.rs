//! Rust module: `repr(C, packed)` types with compile-time layout checks.
//!
//! Fields of packed structs are never borrowed; the generated `Debug` impls
//! copy each one into a temporary first (`&{ self.field }`).

use crate::ast::{BaseType, ConstantDef, ConstantKind, EnumDef, FormatSpec, StructDef, UnionDef};
use crate::config::Config;
use crate::naming::{rust_field_name, to_upper_camel, to_upper_snake};
use crate::parser::{parse_int, parse_type};

use super::{
    annotation_columns, commented_banner, escape_bytes, items, repr_for, struct_order, ColumnValues, Item,
};

pub fn emit(spec: &FormatSpec, config: &Config) -> String {
    let mut lines = commented_banner(config, "//");
    lines.push(String::new());
    lines.push("#![allow(non_camel_case_types, non_upper_case_globals, dead_code)]".to_string());

    let mut constants_started = false;
    for item in items(spec) {
        match item {
            Item::Constant(c) => {
                if !constants_started {
                    lines.push(String::new());
                    lines.push("// --- Named constants ---".to_string());
                    lines.push(String::new());
                    constants_started = true;
                }
                lines.extend(constant(c));
            }
            Item::Enum(e) => {
                lines.push(String::new());
                lines.extend(enumeration(e, config));
            }
            Item::Struct(s) => {
                lines.push(String::new());
                lines.extend(structure(s, config));
            }
            Item::Union(u) => {
                lines.push(String::new());
                lines.extend(union(u, spec, config));
            }
        }
    }

    let mapping = name_mapping(spec, config);
    if !mapping.is_empty() {
        lines.push(String::new());
        lines.push("// Name mapping:".to_string());
        lines.extend(mapping);
    }
    lines.push(String::new());
    lines.join("\n")
}

fn doc(lines: &mut Vec<String>, indent: &str, text: &str) {
    if !text.is_empty() {
        lines.push(format!("{}/// {}", indent, text));
    }
}

fn constant(c: &ConstantDef) -> Vec<String> {
    let mut lines = Vec::new();
    doc(&mut lines, "", &c.description);
    let value = c.unquoted();
    let decl = match c.kind {
        ConstantKind::String => format!(
            "pub const {}: &[u8; {}] = b\"{}\\0\";",
            c.name,
            value.len() + 1,
            escape_bytes(value)
        ),
        ConstantKind::Byte => match c.byte_value() {
            Some(b) => format!("pub const {}: u8 = 0x{:02x};", c.name, b),
            None => format!("pub const {}: u8 = {};", c.name, value),
        },
        ConstantKind::Integer => match parse_int(value) {
            Some(v) if v < 0 => format!("pub const {}: i64 = {};", c.name, value.trim()),
            Some(_) => format!("pub const {}: usize = {};", c.name, value.trim()),
            None => format!("pub const {}: &str = {:?};", c.name, value),
        },
    };
    lines.push(decl);
    lines
}

fn enumeration(e: &EnumDef, config: &Config) -> Vec<String> {
    let type_name = config.renames.type_name(&e.class_name);
    let repr = repr_for(e.members.iter().map(|m| m.value));
    let variants: Vec<String> = e.members.iter().map(|m| to_upper_camel(&m.name)).collect();

    let mut lines = vec![
        format!("/// {}", e.name),
        format!("#[repr({})]", repr),
        "#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]".to_string(),
        format!("pub enum {} {{", type_name),
    ];
    for (m, variant) in e.members.iter().zip(&variants) {
        doc(&mut lines, "    ", &m.description);
        lines.push(format!("    {} = {},", variant, m.value));
    }
    lines.push("}".to_string());
    lines.push(String::new());

    lines.push(format!("impl {} {{", type_name));
    lines.push(format!(
        "    pub fn from_{repr}(value: {repr}) -> Result<Self, {repr}> {{"
    ));
    lines.push("        match value {".to_string());
    for (m, variant) in e.members.iter().zip(&variants) {
        lines.push(format!("            {} => Ok(Self::{}),", m.value, variant));
    }
    lines.push("            other => Err(other),".to_string());
    lines.push("        }".to_string());
    lines.push("    }".to_string());

    for column in annotation_columns(e) {
        let (ret, arms): (&str, Vec<String>) = match &column.values {
            ColumnValues::Integers(values) => {
                let ret = if values.iter().any(|v| *v < 0) { "i64" } else { "usize" };
                (ret, values.iter().map(|v| v.to_string()).collect())
            }
            ColumnValues::Text(values) => (
                "&'static str",
                values.iter().map(|v| format!("{:?}", v)).collect(),
            ),
        };
        lines.push(String::new());
        lines.push(format!(
            "    pub fn {}(self) -> {} {{",
            rust_field_name(column.name),
            ret
        ));
        lines.push("        match self {".to_string());
        for (variant, value) in variants.iter().zip(&arms) {
            lines.push(format!("            Self::{} => {},", variant, value));
        }
        lines.push("        }".to_string());
        lines.push("    }".to_string());
    }
    lines.push("}".to_string());
    lines
}

fn field_type(base: BaseType, array_len: usize) -> String {
    if array_len > 0 {
        format!("[{}; {}]", base.rust_name(), array_len)
    } else {
        base.rust_name().to_string()
    }
}

fn structure(s: &StructDef, config: &Config) -> Vec<String> {
    let type_name = config.renames.type_name(&s.name);
    let fields: Vec<String> = s.fields.iter().map(|f| rust_field_name(&f.name)).collect();

    let mut lines = vec![format!("/// {} ({} bytes)", s.name, s.total_size)];
    if let Some(version) = s.version {
        lines.push("///".to_string());
        lines.push(format!("/// Layout version {}.", version));
    }
    lines.push("#[repr(C, packed)]".to_string());
    lines.push("#[derive(Clone, Copy)]".to_string());
    lines.push(format!("pub struct {} {{", type_name));
    for (f, name) in s.fields.iter().zip(&fields) {
        doc(&mut lines, "    ", &f.description);
        lines.push(format!(
            "    pub {}: {},",
            name,
            field_type(f.base_type, f.array_len)
        ));
    }
    lines.push("}".to_string());
    lines.push(String::new());

    lines.push(format!(
        "const _: () = assert!(core::mem::size_of::<{}>() == {});",
        type_name, s.total_size
    ));
    if config.offset_asserts {
        for (f, name) in s.fields.iter().zip(&fields) {
            lines.push(format!(
                "const _: () = assert!(core::mem::offset_of!({}, {}) == {});",
                type_name, name, f.offset
            ));
        }
    }
    lines.push(String::new());

    lines.push(format!("impl core::fmt::Debug for {} {{", type_name));
    lines.push("    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {".to_string());
    lines.push(format!("        f.debug_struct(\"{}\")", type_name));
    for name in &fields {
        lines.push(format!(
            "            .field(\"{}\", &{{ self.{} }})",
            name.trim_start_matches("r#"),
            name
        ));
    }
    lines.push("            .finish()".to_string());
    lines.push("    }".to_string());
    lines.push("}".to_string());
    lines
}

/// Rust type of a union member: a struct, a base type, or an array of one.
fn member_type(type_name: &str, spec: &FormatSpec, config: &Config) -> String {
    match parse_type(type_name) {
        Some((name, arity)) => match BaseType::from_c_name(&name) {
            Some(base) => field_type(base, arity),
            None if arity > 0 => format!("[{}; {}]", config.renames.type_name(&name), arity),
            None if spec.get_struct(&name).is_some() => config.renames.type_name(&name),
            None => name,
        },
        None => type_name.to_string(),
    }
}

fn union(u: &UnionDef, spec: &FormatSpec, config: &Config) -> Vec<String> {
    let type_name = config.renames.type_name(&u.name);
    let mut lines = vec![
        format!("/// {}", u.name),
        "#[repr(C, packed)]".to_string(),
        "#[derive(Clone, Copy)]".to_string(),
        format!("pub union {} {{", type_name),
    ];
    for m in &u.members {
        doc(&mut lines, "    ", &m.description);
        lines.push(format!(
            "    pub {}: {},",
            rust_field_name(&m.name),
            member_type(&m.type_name, spec, config)
        ));
    }
    lines.push("}".to_string());
    lines
}

/// `//   SOURCE -> Target` for every type whose name changed: structs in
/// emission order, then enums, then unions.
fn name_mapping(spec: &FormatSpec, config: &Config) -> Vec<String> {
    let sources = struct_order(&spec.structs)
        .into_iter()
        .map(|s| (s.name.as_str(), config.renames.type_name(&s.name)))
        .chain(spec.enums.iter().map(|e| (e.name.as_str(), config.renames.type_name(&e.class_name))))
        .chain(spec.unions.iter().map(|u| (u.name.as_str(), config.renames.type_name(&u.name))));
    let mut lines = Vec::new();
    for (source, target) in sources {
        if source != target {
            lines.push(format!("//   {} -> {} ({})", source, target, to_upper_snake(&target)));
        }
    }
    lines
}
