//! Structural validation of a merged [`FormatSpec`].
//!
//! ## Rules
//!
//! Per struct, in this order:
//!
//! - **Size**: declared size equals base-type width times max(arity, 1).
//! - **Bounds**: every field lies inside `[0, SIZE)`; fields outside are left out of the next two checks.
//! - **Overlap**: no byte is claimed by two fields.
//! - **Gap**: every byte is claimed by some field.
//! - **Endianness**: multi-byte, non-character fields carry an explicit byte order.
//! - **Checksum**: `CRC_FIELD` names a field; `CRC_COVERAGE` ends right before it.
//! - **Offset range**: an `N-M` offset cell agrees with the declared size.
//!
//! Across definitions: enums have members with unique values, constant names are unique
//! across all documents, union members reference known types.
//!
//! Validation never stops early; every finding is returned.

use std::collections::{HashMap, HashSet};
use std::fmt;

use crate::ast::{BaseType, Endianness, FormatSpec, StructDef};
use crate::parser::parse_type;

/// Identifies which rule produced a diagnostic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Rule {
    /// Struct declares no fields at all.
    EmptyStruct,
    /// Enum declares no members.
    EmptyEnum,
    /// Field size disagrees with its type.
    SizeMismatch,
    /// Field extends past the struct's total size.
    OutOfBounds,
    /// Byte claimed by more than one field.
    Overlap,
    /// Byte claimed by no field.
    Gap,
    /// Multi-byte field without a byte order.
    MissingEndianness,
    /// `N-M` offset cell disagrees with the field size.
    OffsetRange,
    /// `CRC_FIELD` names no field of the struct.
    ChecksumFieldMissing,
    /// `CRC_COVERAGE` does not end right before the checksum field.
    ChecksumCoverage,
    DuplicateEnumValue,
    DuplicateConstant,
    /// Union member type is neither a struct nor a base type.
    UnknownUnionType,
}

impl Rule {
    /// Stable identifier used in reports.
    pub fn id(self) -> &'static str {
        match self {
            Rule::EmptyStruct => "empty-struct",
            Rule::EmptyEnum => "empty-enum",
            Rule::SizeMismatch => "size-mismatch",
            Rule::OutOfBounds => "out-of-bounds",
            Rule::Overlap => "overlap",
            Rule::Gap => "gap",
            Rule::MissingEndianness => "missing-endianness",
            Rule::OffsetRange => "offset-range",
            Rule::ChecksumFieldMissing => "crc-field-missing",
            Rule::ChecksumCoverage => "crc-coverage",
            Rule::DuplicateEnumValue => "duplicate-enum-value",
            Rule::DuplicateConstant => "duplicate-constant",
            Rule::UnknownUnionType => "unknown-union-type",
        }
    }
}

/// A single validation finding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    pub rule: Rule,
    /// Struct, enum, union or constant the finding is about.
    pub definition: String,
    pub field: Option<String>,
    pub message: String,
}

impl Diagnostic {
    fn new(rule: Rule, definition: &str, message: String) -> Self {
        Diagnostic {
            rule,
            definition: definition.to_string(),
            field: None,
            message,
        }
    }

    fn on_field(rule: Rule, definition: &str, field: &str, message: String) -> Self {
        Diagnostic {
            rule,
            definition: definition.to_string(),
            field: Some(field.to_string()),
            message,
        }
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.field {
            Some(field) => write!(f, "{}.{}: {}", self.definition, field, self.message),
            None => write!(f, "{}: {}", self.definition, self.message),
        }
    }
}

/// Validate the whole merged spec. An empty result means valid.
pub fn validate(spec: &FormatSpec) -> Vec<Diagnostic> {
    let mut out = Vec::new();

    for s in &spec.structs {
        out.extend(validate_struct(s));
    }

    for e in &spec.enums {
        if e.members.is_empty() {
            out.push(Diagnostic::new(
                Rule::EmptyEnum,
                &format!("Enum {}", e.name),
                "no members defined".to_string(),
            ));
        }
        let mut seen: HashMap<i64, &str> = HashMap::new();
        for m in &e.members {
            if let Some(first) = seen.insert(m.value, &m.name) {
                out.push(Diagnostic::new(
                    Rule::DuplicateEnumValue,
                    &format!("Enum {}", e.name),
                    format!("duplicate value {} ({} and {})", m.value, first, m.name),
                ));
            }
        }
    }

    let mut names: HashSet<&str> = HashSet::new();
    for c in &spec.constants {
        if !names.insert(&c.name) {
            out.push(Diagnostic::new(
                Rule::DuplicateConstant,
                &c.name,
                "duplicate constant name".to_string(),
            ));
        }
    }

    let struct_names: HashSet<&str> = spec.structs.iter().map(|s| s.name.as_str()).collect();
    for u in &spec.unions {
        for m in &u.members {
            if !is_known_type(&m.type_name, &struct_names) {
                out.push(Diagnostic::on_field(
                    Rule::UnknownUnionType,
                    &u.name,
                    &m.name,
                    format!("unknown member type '{}'", m.type_name),
                ));
            }
        }
    }

    tracing::debug!(diagnostics = out.len(), "validated spec");
    out
}

fn is_known_type(type_name: &str, structs: &HashSet<&str>) -> bool {
    if structs.contains(type_name) {
        return true;
    }
    parse_type(type_name).is_some_and(|(base, _)| BaseType::from_c_name(&base).is_some())
}

/// Validate one struct's layout.
pub fn validate_struct(s: &StructDef) -> Vec<Diagnostic> {
    let mut out = Vec::new();

    if s.fields.is_empty() {
        out.push(Diagnostic::new(
            Rule::EmptyStruct,
            &s.name,
            "no fields defined".to_string(),
        ));
        return out;
    }

    // Size
    for f in &s.fields {
        match f.type_size() {
            Some(expected) if expected == f.size => {}
            Some(expected) => out.push(Diagnostic::on_field(
                Rule::SizeMismatch,
                &s.name,
                &f.name,
                format!(
                    "size mismatch: declared {}B but type {} = {}B",
                    f.size,
                    f.type_text(),
                    expected
                ),
            )),
            None => out.push(Diagnostic::on_field(
                Rule::SizeMismatch,
                &s.name,
                &f.name,
                format!("type {} is too large to have a size", f.type_text()),
            )),
        }
    }

    // Bounds
    let mut in_bounds = Vec::with_capacity(s.fields.len());
    for f in &s.fields {
        if f.end().is_some_and(|end| end <= s.total_size) {
            in_bounds.push(f);
        } else {
            out.push(Diagnostic::on_field(
                Rule::OutOfBounds,
                &s.name,
                &f.name,
                format!(
                    "offset {}+{} exceeds total size {}",
                    f.offset, f.size, s.total_size
                ),
            ));
        }
    }

    // Overlap: a byte belongs to the first field that claims it.
    let mut claimed: Vec<(usize, usize, &str)> = Vec::with_capacity(in_bounds.len());
    for f in &in_bounds {
        let (start, end) = (f.offset, f.offset + f.size);
        let contested = claimed
            .iter()
            .filter(|(lo, hi, _)| *lo < end && start < *hi)
            .map(|(lo, _, _)| (*lo).max(start))
            .min()
            .and_then(|byte| {
                claimed
                    .iter()
                    .find(|(lo, hi, _)| *lo <= byte && byte < *hi)
                    .map(|(_, _, owner)| (byte, *owner))
            });
        if let Some((byte, other)) = contested {
            out.push(Diagnostic::on_field(
                Rule::Overlap,
                &s.name,
                &f.name,
                format!("byte {} already covered by field '{}'", byte, other),
            ));
        }
        claimed.push((start, end, f.name.as_str()));
    }

    // Gap
    let mut spans: Vec<(usize, usize)> = claimed.iter().map(|(lo, hi, _)| (*lo, *hi)).collect();
    spans.sort_unstable();
    let mut gaps = Vec::new();
    let mut cursor = 0;
    for (start, end) in spans {
        if start > cursor {
            gaps.push((cursor, start));
        }
        cursor = cursor.max(end);
    }
    if cursor < s.total_size {
        gaps.push((cursor, s.total_size));
    }
    for (start, end) in gaps {
        let message = if end - start == 1 {
            format!("byte {} not covered by any field (gap)", start)
        } else {
            format!("bytes {}-{} not covered by any field (gap)", start, end - 1)
        };
        out.push(Diagnostic::new(Rule::Gap, &s.name, message));
    }

    // Endianness
    for f in &s.fields {
        let width = f.base_type.width();
        if width > 1 && !f.base_type.is_char() && f.endianness == Endianness::NotApplicable {
            out.push(Diagnostic::on_field(
                Rule::MissingEndianness,
                &s.name,
                &f.name,
                format!(
                    "multi-byte type {} must have explicit endianness (not '-')",
                    f.base_type
                ),
            ));
        }
    }

    // Checksum
    if let Some(crc_name) = &s.crc_field {
        match s.field(crc_name) {
            None => out.push(Diagnostic::new(
                Rule::ChecksumFieldMissing,
                &s.name,
                format!("CRC field '{}' not found in fields", crc_name),
            )),
            Some(crc) => {
                if let Some(coverage) = s.crc_coverage {
                    let expected = crc.offset.checked_sub(1);
                    if expected != Some(coverage.end) {
                        let expected_text = expected
                            .map(|e| e.to_string())
                            .unwrap_or_else(|| "none, checksum at offset 0".to_string());
                        out.push(Diagnostic::new(
                            Rule::ChecksumCoverage,
                            &s.name,
                            format!(
                                "CRC coverage end {} != CRC field offset - 1 ({})",
                                coverage.end, expected_text
                            ),
                        ));
                    }
                }
            }
        }
    }

    // Offset range
    for f in &s.fields {
        if let Some(end) = f.offset_end {
            if f.size == 0 || f.end() != end.checked_add(1) {
                out.push(Diagnostic::on_field(
                    Rule::OffsetRange,
                    &s.name,
                    &f.name,
                    format!(
                        "offset range {}-{} does not match size {}B",
                        f.offset, end, f.size
                    ),
                ));
            }
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{ChecksumCoverage, FieldDef};

    fn field(name: &str, offset: usize, size: usize, base_type: BaseType, array_len: usize) -> FieldDef {
        let endianness = if base_type.width() > 1 {
            Endianness::Little
        } else {
            Endianness::NotApplicable
        };
        FieldDef {
            name: name.to_string(),
            offset,
            offset_end: None,
            size,
            base_type,
            array_len,
            endianness,
            description: String::new(),
        }
    }

    fn header(coverage_end: usize) -> StructDef {
        StructDef {
            name: "Header".to_string(),
            total_size: 256,
            version: Some(3),
            crc_field: Some("crc32".to_string()),
            crc_coverage: Some(ChecksumCoverage {
                start: 0,
                end: coverage_end,
            }),
            fields: vec![
                field("magic", 0, 8, BaseType::Char, 8),
                field("version", 8, 1, BaseType::U8, 0),
                field("reserved", 9, 243, BaseType::U8, 243),
                field("crc32", 252, 4, BaseType::U32, 0),
            ],
        }
    }

    fn rules(diags: &[Diagnostic]) -> Vec<Rule> {
        diags.iter().map(|d| d.rule).collect()
    }

    #[test]
    fn valid_header_passes() {
        assert!(validate_struct(&header(251)).is_empty());
    }

    #[test]
    fn checksum_coverage_reports_expected_end() {
        let diags = validate_struct(&header(200));
        assert_eq!(rules(&diags), vec![Rule::ChecksumCoverage]);
        assert!(diags[0].message.contains("(251)"), "{}", diags[0]);
        assert_eq!(
            diags[0].to_string(),
            "Header: CRC coverage end 200 != CRC field offset - 1 (251)"
        );
    }

    #[test]
    fn missing_checksum_field() {
        let mut s = header(251);
        s.crc_field = Some("crc".to_string());
        assert_eq!(rules(&validate_struct(&s)), vec![Rule::ChecksumFieldMissing]);
    }

    #[test]
    fn size_mismatch_is_flagged_not_coerced() {
        let mut s = header(251);
        s.fields[1].size = 2;
        let diags = validate_struct(&s);
        assert_eq!(diags[0].rule, Rule::SizeMismatch);
        assert_eq!(diags[0].field.as_deref(), Some("version"));
        // version now spills into reserved
        assert!(rules(&diags).contains(&Rule::Overlap));
    }

    #[test]
    fn gap_is_reported_as_a_run() {
        let mut s = header(251);
        s.fields[2] = field("reserved", 9, 240, BaseType::U8, 240);
        let diags = validate_struct(&s);
        assert_eq!(rules(&diags), vec![Rule::Gap]);
        assert_eq!(diags[0].message, "bytes 249-251 not covered by any field (gap)");
    }

    #[test]
    fn out_of_bounds_field_skips_overlap_bookkeeping() {
        let mut s = header(251);
        s.fields[3] = field("crc32", 254, 4, BaseType::U32, 0);
        let diags = validate_struct(&s);
        assert_eq!(
            rules(&diags),
            vec![Rule::OutOfBounds, Rule::Gap, Rule::ChecksumCoverage]
        );
        assert!(diags[1].message.starts_with("bytes 252-255"));
    }

    #[test]
    fn overlap_names_the_owner() {
        let mut s = header(251);
        s.fields.push(field("extra", 250, 2, BaseType::U8, 2));
        let diags = validate_struct(&s);
        assert_eq!(rules(&diags), vec![Rule::Overlap]);
        assert_eq!(diags[0].message, "byte 250 already covered by field 'reserved'");
    }

    #[test]
    fn multi_byte_fields_need_endianness() {
        let mut s = header(251);
        s.fields[3].endianness = Endianness::NotApplicable;
        let diags = validate_struct(&s);
        assert_eq!(rules(&diags), vec![Rule::MissingEndianness]);
        assert_eq!(diags[0].field.as_deref(), Some("crc32"));
    }

    #[test]
    fn char_arrays_need_no_endianness() {
        let s = header(251);
        assert_eq!(s.fields[0].endianness, Endianness::NotApplicable);
        assert!(validate_struct(&s).is_empty());
    }

    #[test]
    fn findings_are_batched() {
        let mut s = header(251);
        s.fields[2].size = 242;
        s.fields[2].array_len = 242;
        s.fields[3].endianness = Endianness::NotApplicable;
        let diags = validate_struct(&s);
        assert_eq!(rules(&diags), vec![Rule::Gap, Rule::MissingEndianness]);
    }

    #[test]
    fn offset_range_must_match_size() {
        let mut s = header(251);
        s.fields[3].offset_end = Some(255);
        assert!(validate_struct(&s).is_empty());
        s.fields[3].offset_end = Some(254);
        assert_eq!(rules(&validate_struct(&s)), vec![Rule::OffsetRange]);
    }

    #[test]
    fn empty_struct_is_reported_once() {
        let s = StructDef {
            name: "Nothing".to_string(),
            total_size: 16,
            version: None,
            crc_field: None,
            crc_coverage: None,
            fields: Vec::new(),
        };
        assert_eq!(rules(&validate_struct(&s)), vec![Rule::EmptyStruct]);
    }

    #[test]
    fn duplicate_enum_values() {
        let spec = crate::parse(
            "<!-- ENUM: Kind -->\n| Value | Name |\n|-|-|\n| 1 | A |\n| 1 | B |\n",
        )
        .expect("parse");
        let diags = validate(&spec);
        assert_eq!(rules(&diags), vec![Rule::DuplicateEnumValue]);
        assert_eq!(diags[0].to_string(), "Enum Kind: duplicate value 1 (A and B)");
    }

    #[test]
    fn union_member_types_must_resolve() {
        let spec = crate::parse(concat!(
            "<!-- UNION: U -->\n| Member | Type |\n|-|-|\n",
            "| raw | uint8_t[4] |\n| word | uint32_t |\n| hdr | Missing |\n",
        ))
        .expect("parse");
        let diags = validate(&spec);
        assert_eq!(rules(&diags), vec![Rule::UnknownUnionType]);
        assert_eq!(diags[0].field.as_deref(), Some("hdr"));
    }

    #[test]
    fn offset_near_usize_max_is_out_of_bounds() {
        let mut s = header(251);
        s.fields.push(field("far", usize::MAX, 1, BaseType::U8, 0));
        let diags = validate_struct(&s);
        assert_eq!(rules(&diags), vec![Rule::OutOfBounds]);
        assert_eq!(diags[0].field.as_deref(), Some("far"));
    }

    #[test]
    fn oversized_array_type_is_a_size_mismatch() {
        let mut s = header(251);
        s.fields[2].base_type = BaseType::U64;
        s.fields[2].array_len = usize::MAX / 4;
        let diags = validate_struct(&s);
        assert_eq!(diags[0].rule, Rule::SizeMismatch);
        assert!(diags[0].message.contains("too large"), "{}", diags[0]);
    }

    #[test]
    fn huge_total_size_reports_a_gap_without_allocating() {
        let mut s = header(251);
        s.total_size = 1_000_000_000_000;
        let diags = validate_struct(&s);
        assert_eq!(rules(&diags), vec![Rule::Gap]);
        assert_eq!(diags[0].message, "bytes 256-999999999999 not covered by any field (gap)");
    }

    #[test]
    fn enum_without_members() {
        let spec = crate::parse("<!-- ENUM: Kind -->\n| Value | Name |\n|-|-|\n").expect("parse");
        let diags = validate(&spec);
        assert_eq!(rules(&diags), vec![Rule::EmptyEnum]);
        assert_eq!(diags[0].to_string(), "Enum Kind: no members defined");
    }
}
