//! Build the format IR from scanned table sections.
//!
//! Each section is classified by its marker key (`STRUCT`, `ENUM`,
//! `CONSTANTS`, `UNION`) and typed here. Only local syntax is checked;
//! cross-definition rules live in [`crate::validate`].

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use pest::Parser;

use crate::ast::*;
use crate::table::{scan, RawSection, Row, Rule, TableGrammar};

const MARKERS: [&str; 4] = ["STRUCT", "ENUM", "CONSTANTS", "UNION"];

#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    #[error("{kind} table '{table}' (line {line}) missing columns: {}", .missing.join(", "))]
    MissingColumns {
        kind: &'static str,
        table: String,
        line: usize,
        missing: Vec<&'static str>,
    },
    #[error("{kind} table '{table}' (line {line}) missing {key} annotation")]
    MissingMetadata {
        kind: &'static str,
        table: String,
        line: usize,
        key: &'static str,
    },
    #[error("invalid offset '{value}' in struct '{table}' (line {line})")]
    InvalidOffset {
        table: String,
        line: usize,
        value: String,
    },
    #[error("invalid type '{value}' for field '{field}' in '{table}' (line {line})")]
    InvalidType {
        table: String,
        field: String,
        line: usize,
        value: String,
    },
    #[error("unknown base type '{type_name}' for field '{field}' in '{table}' (line {line})")]
    UnknownType {
        table: String,
        field: String,
        line: usize,
        type_name: String,
    },
    #[error("invalid {what} '{value}' in '{table}' (line {line})")]
    InvalidNumber {
        table: String,
        line: usize,
        what: &'static str,
        value: String,
    },
    #[error("invalid endianness '{value}' for field '{field}' in '{table}' (line {line})")]
    InvalidEndianness {
        table: String,
        field: String,
        line: usize,
        value: String,
    },
    #[error("unknown constant type '{value}' for '{name}' (line {line})")]
    UnknownConstantType {
        name: String,
        line: usize,
        value: String,
    },
    #[error("section at line {line} declares more than one of {}", .kinds.join(", "))]
    ConflictingKinds { line: usize, kinds: Vec<&'static str> },
    #[error("annotation block at line {line} ({}) is not followed by a table", .keys.join(", "))]
    OrphanAnnotation { line: usize, keys: Vec<String> },
    #[error("{document}: {source}")]
    Document {
        document: String,
        source: Box<ParseError>,
    },
    #[error("{}: {source}", .path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Builder switches.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ParseOptions {
    /// Reject annotation blocks that are not followed by a table instead of skipping them.
    pub strict_annotations: bool,
}

/// Parse one document with default options.
pub fn parse(source: &str) -> Result<FormatSpec, ParseError> {
    parse_with(source, ParseOptions::default())
}

/// Parse one document.
pub fn parse_with(source: &str, options: ParseOptions) -> Result<FormatSpec, ParseError> {
    let scanned = scan(source);
    if let Some(orphan) = scanned.orphans.first() {
        if options.strict_annotations {
            return Err(ParseError::OrphanAnnotation {
                line: orphan.line,
                keys: orphan.keys.clone(),
            });
        }
    }
    for orphan in &scanned.orphans {
        tracing::warn!(
            line = orphan.line,
            keys = %orphan.keys.join(","),
            "annotation block not followed by a table; skipped"
        );
    }

    let mut spec = FormatSpec::default();
    for section in &scanned.sections {
        if let Some(definition) = build_section(section)? {
            tracing::trace!(kind = definition.kind(), line = section.line, "built definition");
            spec.push(definition);
        }
    }
    Ok(spec)
}

/// Parse several named documents and concatenate their definitions in order.
pub fn parse_documents<I, N, S>(documents: I, options: ParseOptions) -> Result<FormatSpec, ParseError>
where
    I: IntoIterator<Item = (N, S)>,
    N: AsRef<str>,
    S: AsRef<str>,
{
    let mut merged = FormatSpec::default();
    for (name, source) in documents {
        let spec = parse_with(source.as_ref(), options).map_err(|e| ParseError::Document {
            document: name.as_ref().to_string(),
            source: Box::new(e),
        })?;
        tracing::debug!(document = name.as_ref(), summary = %spec, "parsed document");
        merged.merge(spec);
    }
    Ok(merged)
}

/// Read and parse files in the given order.
pub fn parse_files<P: AsRef<Path>>(paths: &[P], options: ParseOptions) -> Result<FormatSpec, ParseError> {
    let mut documents = Vec::with_capacity(paths.len());
    for path in paths {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ParseError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        documents.push((path.display().to_string(), text));
    }
    parse_documents(documents, options)
}

/// Type one section. `Ok(None)` when no marker key is present.
pub fn build_section(section: &RawSection) -> Result<Option<Definition>, ParseError> {
    let kinds: Vec<&'static str> = MARKERS
        .into_iter()
        .filter(|k| section.metadata.contains(k))
        .collect();
    match kinds.as_slice() {
        [] => {
            tracing::debug!(line = section.line, "annotated table without a kind marker; skipped");
            Ok(None)
        }
        ["STRUCT"] => build_struct(section).map(|s| Some(Definition::Struct(s))),
        ["ENUM"] => build_enum(section).map(|e| Some(Definition::Enum(e))),
        ["CONSTANTS"] => build_constants(section).map(|c| Some(Definition::Constants(c))),
        ["UNION"] => build_union(section).map(|u| Some(Definition::Union(u))),
        _ => Err(ParseError::ConflictingKinds {
            line: section.line,
            kinds,
        }),
    }
}

fn require_columns(
    section: &RawSection,
    kind: &'static str,
    table: &str,
    required: &[&'static str],
) -> Result<(), ParseError> {
    let missing: Vec<&'static str> = required
        .iter()
        .copied()
        .filter(|c| section.column(c).is_none())
        .collect();
    if missing.is_empty() {
        Ok(())
    } else {
        Err(ParseError::MissingColumns {
            kind,
            table: table.to_string(),
            line: section.line,
            missing,
        })
    }
}

fn cell<'a>(section: &RawSection, row: &'a Row, column: &str) -> &'a str {
    section
        .column(column)
        .and_then(|i| row.cells.get(i))
        .map(String::as_str)
        .unwrap_or("")
}

fn build_struct(section: &RawSection) -> Result<StructDef, ParseError> {
    let name = section.metadata.get("STRUCT").unwrap_or_default().to_string();
    let size_text = section.metadata.get("SIZE").ok_or_else(|| ParseError::MissingMetadata {
        kind: "struct",
        table: name.clone(),
        line: section.line,
        key: "SIZE",
    })?;
    let total_size = parse_usize(size_text, &name, section.line, "SIZE")?;
    let version = section
        .metadata
        .get("VERSION")
        .map(|v| {
            parse_int(v)
                .and_then(|n| u32::try_from(n).ok())
                .ok_or_else(|| ParseError::InvalidNumber {
                    table: name.clone(),
                    line: section.line,
                    what: "VERSION",
                    value: v.to_string(),
                })
        })
        .transpose()?;
    let crc_field = section
        .metadata
        .get("CRC_FIELD")
        .filter(|v| !v.is_empty())
        .map(str::to_string);
    let crc_coverage = section
        .metadata
        .get("CRC_COVERAGE")
        .map(|v| match parse_span(v) {
            Some((start, Some(end))) => Ok(ChecksumCoverage { start, end }),
            _ => Err(ParseError::InvalidNumber {
                table: name.clone(),
                line: section.line,
                what: "CRC_COVERAGE",
                value: v.to_string(),
            }),
        })
        .transpose()?;

    require_columns(section, "struct", &name, &["offset", "size", "field", "type"])?;

    let mut fields = Vec::with_capacity(section.rows.len());
    for row in &section.rows {
        fields.push(build_field(section, row, &name)?);
    }

    Ok(StructDef {
        name,
        total_size,
        version,
        crc_field,
        crc_coverage,
        fields,
    })
}

fn build_field(section: &RawSection, row: &Row, table: &str) -> Result<FieldDef, ParseError> {
    let field = cell(section, row, "field").to_string();
    let offset_text = cell(section, row, "offset");
    let (offset, offset_end) = parse_span(offset_text).ok_or_else(|| ParseError::InvalidOffset {
        table: table.to_string(),
        line: row.line,
        value: offset_text.to_string(),
    })?;
    let size = parse_usize(cell(section, row, "size"), table, row.line, "size")?;

    let type_text = cell(section, row, "type");
    let (type_name, array_len) = parse_type(type_text).ok_or_else(|| ParseError::InvalidType {
        table: table.to_string(),
        field: field.clone(),
        line: row.line,
        value: type_text.to_string(),
    })?;
    let base_type = BaseType::from_c_name(&type_name).ok_or_else(|| ParseError::UnknownType {
        table: table.to_string(),
        field: field.clone(),
        line: row.line,
        type_name: type_name.clone(),
    })?;

    let endianness_text = cell(section, row, "endianness");
    let endianness =
        Endianness::parse(endianness_text).ok_or_else(|| ParseError::InvalidEndianness {
            table: table.to_string(),
            field: field.clone(),
            line: row.line,
            value: endianness_text.to_string(),
        })?;

    Ok(FieldDef {
        name: field,
        offset,
        offset_end,
        size,
        base_type,
        array_len,
        endianness,
        description: cell(section, row, "description").to_string(),
    })
}

fn build_enum(section: &RawSection) -> Result<EnumDef, ParseError> {
    let name = section.metadata.get("ENUM").unwrap_or_default().to_string();
    let c_prefix = section
        .metadata
        .get("C_PREFIX")
        .filter(|v| !v.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| name.to_uppercase());
    let class_name = section
        .metadata
        .get("PY_CLASS")
        .filter(|v| !v.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| name.clone());

    require_columns(section, "enum", &name, &["value", "name"])?;

    let extra_columns: Vec<String> = section
        .columns
        .iter()
        .filter(|c| !matches!(c.as_str(), "value" | "name" | "description"))
        .cloned()
        .collect();

    let mut members = Vec::with_capacity(section.rows.len());
    for row in &section.rows {
        let value = parse_int(cell(section, row, "value")).ok_or_else(|| ParseError::InvalidNumber {
            table: name.clone(),
            line: row.line,
            what: "enum value",
            value: cell(section, row, "value").to_string(),
        })?;
        let extra: BTreeMap<String, String> = extra_columns
            .iter()
            .map(|c| (c.clone(), cell(section, row, c).to_string()))
            .collect();
        members.push(EnumMember {
            value,
            name: cell(section, row, "name").to_string(),
            description: cell(section, row, "description").to_string(),
            extra,
        });
    }

    Ok(EnumDef {
        name,
        c_prefix,
        class_name,
        extra_columns,
        members,
    })
}

fn build_constants(section: &RawSection) -> Result<Vec<ConstantDef>, ParseError> {
    require_columns(section, "constants", "CONSTANTS", &["name", "value"])?;
    section
        .rows
        .iter()
        .map(|row| {
            let name = cell(section, row, "name").to_string();
            let type_text = cell(section, row, "type");
            let kind = ConstantKind::parse(type_text).ok_or_else(|| ParseError::UnknownConstantType {
                name: name.clone(),
                line: row.line,
                value: type_text.to_string(),
            })?;
            let constant = ConstantDef {
                name,
                value: cell(section, row, "value").to_string(),
                kind,
                description: cell(section, row, "description").to_string(),
            };
            if kind == ConstantKind::Byte && constant.byte_value().is_none() {
                return Err(ParseError::InvalidNumber {
                    table: "CONSTANTS".to_string(),
                    line: row.line,
                    what: "byte constant",
                    value: constant.value,
                });
            }
            Ok(constant)
        })
        .collect()
}

fn build_union(section: &RawSection) -> Result<UnionDef, ParseError> {
    let name = section.metadata.get("UNION").unwrap_or_default().to_string();
    require_columns(section, "union", &name, &["member", "type"])?;
    let members = section
        .rows
        .iter()
        .map(|row| UnionMember {
            name: cell(section, row, "member").to_string(),
            type_name: cell(section, row, "type").to_string(),
            description: cell(section, row, "description").to_string(),
        })
        .collect();
    Ok(UnionDef { name, members })
}

// ==================== Typed cells ====================

/// `N` or `N-M` -> (N, Some(M)).
pub(crate) fn parse_span(s: &str) -> Option<(usize, Option<usize>)> {
    let pair = TableGrammar::parse(Rule::span, s).ok()?.next()?;
    let mut numbers = pair.into_inner().filter(|p| p.as_rule() == Rule::number);
    let start = numbers.next()?.as_str().parse().ok()?;
    let end = match numbers.next() {
        Some(p) => Some(p.as_str().parse().ok()?),
        None => None,
    };
    Some((start, end))
}

/// `base` or `base[N]` -> (base, N) with N = 0 for scalars.
pub(crate) fn parse_type(s: &str) -> Option<(String, usize)> {
    let pair = TableGrammar::parse(Rule::type_spec, s).ok()?.next()?;
    let mut name = None;
    let mut arity = 0;
    for inner in pair.into_inner() {
        match inner.as_rule() {
            Rule::type_name => name = Some(inner.as_str().to_string()),
            Rule::number => arity = inner.as_str().parse().ok()?,
            _ => {}
        }
    }
    name.map(|n| (n, arity))
}

/// Decimal or `0x` hex, optionally negative.
pub(crate) fn parse_int(s: &str) -> Option<i64> {
    let pair = TableGrammar::parse(Rule::integer, s).ok()?.next()?;
    let mut negative = false;
    let mut magnitude = None;
    for inner in pair.into_inner() {
        match inner.as_rule() {
            Rule::negative => negative = true,
            Rule::hex => magnitude = i64::from_str_radix(&inner.as_str()[2..], 16).ok(),
            Rule::number => magnitude = inner.as_str().parse::<i64>().ok(),
            _ => {}
        }
    }
    magnitude.map(|m| if negative { -m } else { m })
}

fn parse_usize(s: &str, table: &str, line: usize, what: &'static str) -> Result<usize, ParseError> {
    parse_int(s)
        .and_then(|v| usize::try_from(v).ok())
        .ok_or_else(|| ParseError::InvalidNumber {
            table: table.to_string(),
            line,
            what,
            value: s.to_string(),
        })
}
