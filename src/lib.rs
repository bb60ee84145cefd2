//! # packspec: packed binary format compiler
//!
//! Compiles annotated pipe tables describing packed binary records, enums,
//! named constants and unions into byte-identical type definitions for C,
//! Python and Rust.
//!
//! ## Pipeline
//!
//! - **Scan** ([`table`]): documents become raw sections of metadata, columns and rows
//! - **Build** ([`parser`]): sections become typed [`ast`] definitions; malformed input is a [`ParseError`]
//! - **Validate** ([`validate`]): every layout defect is collected as a [`Diagnostic`]
//! - **Emit** ([`emit`]): pure, deterministic text per [`Backend`], only for a valid spec
//!
//! ## Table kinds
//!
//! | Marker | Required columns | Optional metadata |
//! |---|---|---|
//! | `STRUCT: Name` | offset, size, field, type | `SIZE` (required), `VERSION`, `CRC_FIELD`, `CRC_COVERAGE` |
//! | `ENUM: Name` | value, name | `C_PREFIX`, `PY_CLASS` |
//! | `CONSTANTS` | name, value | |
//! | `UNION: Name` | member, type | |
//!
//! ## Example document
//!
//! ```text
//! <!-- STRUCT: JEEFSFileHeaderv1 -->
//! <!-- SIZE: 8 -->
//! <!-- VERSION: 1 -->
//! <!-- CRC_FIELD: crc32 -->
//! <!-- CRC_COVERAGE: 0-3 -->
//! | Offset | Size | Field    | Type     | Endianness    | Description   |
//! |--------|------|----------|----------|---------------|---------------|
//! | 0      | 4    | name     | char[4]  | -             | File name     |
//! | 4      | 4    | crc32    | uint32_t | little-endian | Header CRC    |
//! ```
//!
//! ## Usage
//!
//! ```no_run
//! use packspec::{compile_documents, Backend, Config, ParseOptions};
//!
//! let source = std::fs::read_to_string("format.md").expect("read");
//! let artifacts = compile_documents(
//!     [("format.md", source)],
//!     ParseOptions::default(),
//!     &[Backend::C, Backend::Rust],
//!     &Config::default(),
//! )
//! .expect("valid format");
//! for a in &artifacts {
//!     println!("{}: {} bytes", a.backend, a.text.len());
//! }
//! ```

pub mod ast;
pub mod compile;
pub mod config;
pub mod emit;
pub mod naming;
pub mod parser;
pub mod table;
pub mod validate;

pub use ast::{Definition, FormatSpec};
pub use compile::{compile_documents, generate, Artifact, CompileError};
pub use config::Config;
pub use emit::Backend;
pub use parser::{parse, parse_documents, parse_files, parse_with, ParseError, ParseOptions};
pub use validate::{validate, Diagnostic, Rule};
