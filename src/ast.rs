//! Intermediate representation of a format specification.
//!
//! Nodes are built once by [`crate::parser`] and never mutated afterwards;
//! rebuilding always starts again from the source documents.

use std::collections::BTreeMap;
use std::fmt;

/// Fixed-width primitive a struct field is made of.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum BaseType {
    Char,
    U8,
    I8,
    U16,
    I16,
    U32,
    I32,
    U64,
    I64,
}

impl BaseType {
    pub const ALL: [BaseType; 9] = [
        BaseType::Char,
        BaseType::U8,
        BaseType::I8,
        BaseType::U16,
        BaseType::I16,
        BaseType::U32,
        BaseType::I32,
        BaseType::U64,
        BaseType::I64,
    ];

    /// Look up a C type name as written in a table (`uint16_t`, `char`, ...).
    pub fn from_c_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|t| t.c_name() == name)
    }

    pub fn c_name(self) -> &'static str {
        match self {
            BaseType::Char => "char",
            BaseType::U8 => "uint8_t",
            BaseType::I8 => "int8_t",
            BaseType::U16 => "uint16_t",
            BaseType::I16 => "int16_t",
            BaseType::U32 => "uint32_t",
            BaseType::I32 => "int32_t",
            BaseType::U64 => "uint64_t",
            BaseType::I64 => "int64_t",
        }
    }

    /// Rust primitive with the same width and signedness. `char` is a raw byte.
    pub fn rust_name(self) -> &'static str {
        match self {
            BaseType::Char | BaseType::U8 => "u8",
            BaseType::I8 => "i8",
            BaseType::U16 => "u16",
            BaseType::I16 => "i16",
            BaseType::U32 => "u32",
            BaseType::I32 => "i32",
            BaseType::U64 => "u64",
            BaseType::I64 => "i64",
        }
    }

    /// Width in bytes.
    pub fn width(self) -> usize {
        match self {
            BaseType::Char | BaseType::U8 | BaseType::I8 => 1,
            BaseType::U16 | BaseType::I16 => 2,
            BaseType::U32 | BaseType::I32 => 4,
            BaseType::U64 | BaseType::I64 => 8,
        }
    }

    pub fn is_char(self) -> bool {
        self == BaseType::Char
    }
}

impl fmt::Display for BaseType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.c_name())
    }
}

/// Byte order of a multi-byte field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Endianness {
    Little,
    Big,
    /// `-` in the table: single bytes, character data.
    NotApplicable,
}

impl Endianness {
    pub fn parse(cell: &str) -> Option<Self> {
        match cell.trim().to_ascii_lowercase().as_str() {
            "little-endian" | "little" | "le" => Some(Endianness::Little),
            "big-endian" | "big" | "be" => Some(Endianness::Big),
            "" | "-" | "n/a" => Some(Endianness::NotApplicable),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Endianness::Little => "little-endian",
            Endianness::Big => "big-endian",
            Endianness::NotApplicable => "-",
        }
    }
}

/// One field of a packed struct.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldDef {
    pub name: String,
    pub offset: usize,
    /// Upper bound when the offset cell is a range (`10-11`), inclusive.
    pub offset_end: Option<usize>,
    /// Declared size in bytes.
    pub size: usize,
    pub base_type: BaseType,
    /// 0 = scalar, >0 = array of this many elements.
    pub array_len: usize,
    pub endianness: Endianness,
    pub description: String,
}

impl FieldDef {
    /// Size implied by the type: width times max(arity, 1). `None` on overflow.
    pub fn type_size(&self) -> Option<usize> {
        self.base_type.width().checked_mul(self.array_len.max(1))
    }

    /// One past the last byte, as declared. `None` on overflow.
    pub fn end(&self) -> Option<usize> {
        self.offset.checked_add(self.size)
    }

    pub fn is_array(&self) -> bool {
        self.array_len > 0
    }

    /// Type as written in the table, e.g. `uint16_t[16]`.
    pub fn type_text(&self) -> String {
        if self.is_array() {
            format!("{}[{}]", self.base_type, self.array_len)
        } else {
            self.base_type.to_string()
        }
    }
}

/// Inclusive byte range a checksum is computed over.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChecksumCoverage {
    pub start: usize,
    pub end: usize,
}

/// A packed binary record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StructDef {
    pub name: String,
    pub total_size: usize,
    pub version: Option<u32>,
    pub crc_field: Option<String>,
    pub crc_coverage: Option<ChecksumCoverage>,
    pub fields: Vec<FieldDef>,
}

impl StructDef {
    pub fn field(&self, name: &str) -> Option<&FieldDef> {
        self.fields.iter().find(|f| f.name == name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnumMember {
    pub value: i64,
    pub name: String,
    pub description: String,
    /// Extra table columns (lower-cased name -> cell).
    pub extra: BTreeMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnumDef {
    pub name: String,
    /// Prefix of C enumerators (`C_PREFIX`).
    pub c_prefix: String,
    /// Class/type name for the Python and Rust backends (`PY_CLASS`).
    pub class_name: String,
    /// Extra column names in table order.
    pub extra_columns: Vec<String>,
    pub members: Vec<EnumMember>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConstantKind {
    String,
    Integer,
    Byte,
}

impl ConstantKind {
    pub fn parse(cell: &str) -> Option<Self> {
        match cell.trim().to_ascii_lowercase().as_str() {
            "string" | "str" => Some(ConstantKind::String),
            "" | "int" | "integer" => Some(ConstantKind::Integer),
            "byte" => Some(ConstantKind::Byte),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConstantDef {
    pub name: String,
    /// Literal as written in the table.
    pub value: String,
    pub kind: ConstantKind,
    pub description: String,
}

impl ConstantDef {
    /// Value with surrounding quotes removed.
    pub fn unquoted(&self) -> &str {
        self.value.trim_matches('"').trim_matches('\'')
    }

    /// Value of a byte constant: an integer in `0..=255` or a single ASCII character.
    pub fn byte_value(&self) -> Option<u8> {
        let text = self.unquoted();
        if let Some(v) = crate::parser::parse_int(text) {
            return u8::try_from(v).ok();
        }
        match text.as_bytes() {
            [b] if b.is_ascii() => Some(*b),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnionMember {
    pub name: String,
    /// A struct name, a base type, or `base[N]`.
    pub type_name: String,
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnionDef {
    pub name: String,
    pub members: Vec<UnionMember>,
}

/// What one annotated table defines.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Definition {
    Struct(StructDef),
    Enum(EnumDef),
    Constants(Vec<ConstantDef>),
    Union(UnionDef),
}

impl Definition {
    pub fn kind(&self) -> &'static str {
        match self {
            Definition::Struct(_) => "struct",
            Definition::Enum(_) => "enum",
            Definition::Constants(_) => "constants",
            Definition::Union(_) => "union",
        }
    }
}

/// All definitions of one or more documents, in document then table order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FormatSpec {
    pub structs: Vec<StructDef>,
    pub enums: Vec<EnumDef>,
    pub constants: Vec<ConstantDef>,
    pub unions: Vec<UnionDef>,
}

impl FormatSpec {
    pub fn push(&mut self, definition: Definition) {
        match definition {
            Definition::Struct(s) => self.structs.push(s),
            Definition::Enum(e) => self.enums.push(e),
            Definition::Constants(c) => self.constants.extend(c),
            Definition::Union(u) => self.unions.push(u),
        }
    }

    /// Append another document's definitions after this one's.
    pub fn merge(&mut self, other: FormatSpec) {
        self.structs.extend(other.structs);
        self.enums.extend(other.enums);
        self.constants.extend(other.constants);
        self.unions.extend(other.unions);
    }

    pub fn is_empty(&self) -> bool {
        self.structs.is_empty()
            && self.enums.is_empty()
            && self.constants.is_empty()
            && self.unions.is_empty()
    }

    pub fn get_struct(&self, name: &str) -> Option<&StructDef> {
        self.structs.iter().find(|s| s.name == name)
    }
}

impl fmt::Display for FormatSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} struct(s), {} enum(s), {} constant(s), {} union(s)",
            self.structs.len(),
            self.enums.len(),
            self.constants.len(),
            self.unions.len()
        )
    }
}
