//! Text emitters, one per target language.
//!
//! Every emitter is a pure function of a *validated* [`FormatSpec`] and a
//! [`Config`]; calling one on a spec with diagnostics is a caller bug. Output
//! is deterministic so regenerated files can be diffed.

pub mod c;
pub mod python;
pub mod rust;

use std::fmt;
use std::str::FromStr;

use crate::ast::{ConstantDef, EnumDef, FormatSpec, StructDef, UnionDef};
use crate::config::Config;
use crate::parser::parse_int;

/// Target language of one artifact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Backend {
    /// Packed C typedefs with static assertions.
    C,
    /// Python constants module with offset tables.
    Python,
    /// Rust module with `repr(C, packed)` types.
    Rust,
}

impl Backend {
    pub const ALL: [Backend; 3] = [Backend::C, Backend::Python, Backend::Rust];

    pub fn name(self) -> &'static str {
        match self {
            Backend::C => "c",
            Backend::Python => "python",
            Backend::Rust => "rust",
        }
    }
}

impl fmt::Display for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Backend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "c" | "h" => Ok(Backend::C),
            "python" | "py" => Ok(Backend::Python),
            "rust" | "rs" => Ok(Backend::Rust),
            _ => Err(format!("unknown backend: {}", s)),
        }
    }
}

/// Render one backend.
pub fn emit(backend: Backend, spec: &FormatSpec, config: &Config) -> String {
    let text = match backend {
        Backend::C => c::emit(spec, config),
        Backend::Python => python::emit(spec, config),
        Backend::Rust => rust::emit(spec, config),
    };
    tracing::debug!(%backend, bytes = text.len(), "emitted artifact");
    text
}

/// One definition in emission order.
#[derive(Debug, Clone, Copy)]
pub enum Item<'a> {
    Constant(&'a ConstantDef),
    Enum(&'a EnumDef),
    Struct(&'a StructDef),
    Union(&'a UnionDef),
}

/// Constants, enums, structs in [`struct_order`], then unions.
pub fn items(spec: &FormatSpec) -> Vec<Item<'_>> {
    spec.constants
        .iter()
        .map(Item::Constant)
        .chain(spec.enums.iter().map(Item::Enum))
        .chain(struct_order(&spec.structs).into_iter().map(Item::Struct))
        .chain(spec.unions.iter().map(Item::Union))
        .collect()
}

/// A short header whose only job is to expose the version byte.
pub fn is_version_probe(s: &StructDef) -> bool {
    s.total_size <= 12 && s.name.to_ascii_lowercase().contains("version")
}

fn order_key(s: &StructDef) -> (u8, u32, &str) {
    if is_version_probe(s) {
        (0, 0, &s.name)
    } else if let Some(v) = s.version {
        (1, v, &s.name)
    } else {
        (2, 0, &s.name)
    }
}

/// Version probes first, then versioned structs by ascending version, then
/// everything else; ties broken by name.
pub fn struct_order(structs: &[StructDef]) -> Vec<&StructDef> {
    let mut sorted: Vec<&StructDef> = structs.iter().collect();
    sorted.sort_by(|a, b| order_key(a).cmp(&order_key(b)));
    sorted
}

/// Banner lines without comment markers.
pub(crate) fn banner(config: &Config) -> Vec<String> {
    let mut lines = vec!["DO NOT EDIT: generated by packspec from the format tables.".to_string()];
    if let Some(license) = &config.license {
        lines.push(format!("SPDX-License-Identifier: {}", license));
    }
    lines.push(String::new());
    lines.push("Regenerate with:".to_string());
    lines.push(format!("  {}", config.invocation));
    lines
}

/// Prefix each banner line with a comment marker.
pub(crate) fn commented_banner(config: &Config, marker: &str) -> Vec<String> {
    banner(config)
        .into_iter()
        .map(|l| {
            if l.is_empty() {
                marker.to_string()
            } else {
                format!("{} {}", marker, l)
            }
        })
        .collect()
}

/// Values of one enum annotation column, in member order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum ColumnValues<'a> {
    /// Every non-empty cell is an integer; empty cells read as 0.
    Integers(Vec<i64>),
    Text(Vec<&'a str>),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct AnnotationColumn<'a> {
    pub name: &'a str,
    pub values: ColumnValues<'a>,
}

/// Annotation columns that carry at least one value.
pub(crate) fn annotation_columns(e: &EnumDef) -> Vec<AnnotationColumn<'_>> {
    e.extra_columns
        .iter()
        .filter_map(|column| {
            let cells: Vec<&str> = e
                .members
                .iter()
                .map(|m| m.extra.get(column).map(String::as_str).unwrap_or(""))
                .collect();
            if cells.iter().all(|c| c.is_empty()) {
                return None;
            }
            let integers: Option<Vec<i64>> = cells
                .iter()
                .map(|c| if c.is_empty() { Some(0) } else { parse_int(c) })
                .collect();
            let values = match integers {
                Some(v) => ColumnValues::Integers(v),
                None => ColumnValues::Text(cells),
            };
            Some(AnnotationColumn {
                name: column.as_str(),
                values,
            })
        })
        .collect()
}

/// Body of a byte-string literal: printable ASCII kept, quotes and
/// backslashes escaped, everything else as `\xNN`.
pub(crate) fn escape_bytes(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for b in s.bytes() {
        match b {
            b'"' => out.push_str("\\\""),
            b'\\' => out.push_str("\\\\"),
            0x20..=0x7e => out.push(b as char),
            _ => out.push_str(&format!("\\x{:02x}", b)),
        }
    }
    out
}

/// Smallest unsigned (or signed, if any value is negative) integer type holding every value.
pub(crate) fn repr_for(values: impl IntoIterator<Item = i64>) -> &'static str {
    let (mut min, mut max) = (0i64, 0i64);
    for v in values {
        min = min.min(v);
        max = max.max(v);
    }
    if min >= 0 {
        match max {
            m if m <= u8::MAX as i64 => "u8",
            m if m <= u16::MAX as i64 => "u16",
            m if m <= u32::MAX as i64 => "u32",
            _ => "u64",
        }
    } else {
        let fits = |lo: i64, hi: i64| min >= lo && max <= hi;
        if fits(i8::MIN as i64, i8::MAX as i64) {
            "i8"
        } else if fits(i16::MIN as i64, i16::MAX as i64) {
            "i16"
        } else if fits(i32::MIN as i64, i32::MAX as i64) {
            "i32"
        } else {
            "i64"
        }
    }
}
