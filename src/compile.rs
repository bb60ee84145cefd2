//! Validate-then-emit orchestration.
//!
//! Output is all-or-nothing: either every requested backend is rendered, or
//! nothing is and every diagnostic comes back.

use thiserror::Error;

use crate::ast::FormatSpec;
use crate::config::Config;
use crate::emit::{emit, Backend};
use crate::parser::{parse_documents, ParseError, ParseOptions};
use crate::validate::{validate, Diagnostic};

/// Rendered text for one backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Artifact {
    pub backend: Backend,
    pub text: String,
}

#[derive(Debug, Error)]
pub enum CompileError {
    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error("{} validation error(s)", .0.len())]
    Invalid(Vec<Diagnostic>),
}

impl CompileError {
    /// Diagnostics carried by a validation failure; empty for parse errors.
    pub fn diagnostics(&self) -> &[Diagnostic] {
        match self {
            CompileError::Invalid(d) => d,
            CompileError::Parse(_) => &[],
        }
    }
}

/// Validate `spec` and render each requested backend once, in the order given.
pub fn generate(spec: &FormatSpec, backends: &[Backend], config: &Config) -> Result<Vec<Artifact>, CompileError> {
    let diagnostics = validate(spec);
    if !diagnostics.is_empty() {
        tracing::info!(count = diagnostics.len(), "validation failed; nothing emitted");
        return Err(CompileError::Invalid(diagnostics));
    }

    let mut requested: Vec<Backend> = Vec::with_capacity(backends.len());
    for b in backends {
        if !requested.contains(b) {
            requested.push(*b);
        }
    }
    Ok(requested
        .into_iter()
        .map(|backend| Artifact {
            backend,
            text: emit(backend, spec, config),
        })
        .collect())
}

/// Parse named documents, merge them, then [`generate`].
pub fn compile_documents<I, N, S>(
    documents: I,
    options: ParseOptions,
    backends: &[Backend],
    config: &Config,
) -> Result<Vec<Artifact>, CompileError>
where
    I: IntoIterator<Item = (N, S)>,
    N: AsRef<str>,
    S: AsRef<str>,
{
    let spec = parse_documents(documents, options)?;
    tracing::info!(summary = %spec, "parsed documents");
    generate(&spec, backends, config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::validate::Rule;

    const GOOD: &str = "<!-- STRUCT: S -->\n<!-- SIZE: 2 -->\n| Offset | Size | Field | Type | Endianness |\n|-|-|-|-|-|\n| 0 | 2 | a | uint16_t | le |\n";
    const BAD: &str = "<!-- STRUCT: S -->\n<!-- SIZE: 4 -->\n| Offset | Size | Field | Type |\n|-|-|-|-|\n| 0 | 2 | a | uint16_t |\n";

    #[test]
    fn renders_each_backend_once() {
        let artifacts = compile_documents(
            [("a.md", GOOD)],
            ParseOptions::default(),
            &[Backend::Rust, Backend::C, Backend::Rust],
            &Config::default(),
        )
        .expect("compile");
        let backends: Vec<_> = artifacts.iter().map(|a| a.backend).collect();
        assert_eq!(backends, vec![Backend::Rust, Backend::C]);
    }

    #[test]
    fn invalid_spec_returns_all_diagnostics() {
        let err = compile_documents([("a.md", BAD)], ParseOptions::default(), &Backend::ALL, &Config::default())
            .expect_err("should fail");
        let rules: Vec<_> = err.diagnostics().iter().map(|d| d.rule).collect();
        assert_eq!(rules, vec![Rule::Gap, Rule::MissingEndianness]);
        assert_eq!(err.to_string(), "2 validation error(s)");
    }

    #[test]
    fn parse_errors_pass_through() {
        let err = compile_documents(
            [("bad.md", "<!-- STRUCT: S -->\n| Offset |\n|-|\n| 0 |\n")],
            ParseOptions::default(),
            &Backend::ALL,
            &Config::default(),
        )
        .expect_err("should fail");
        assert!(matches!(err, CompileError::Parse(ParseError::Document { .. })));
        assert!(err.diagnostics().is_empty());
    }
}
