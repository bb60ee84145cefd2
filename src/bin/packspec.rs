//! Compile format tables into C, Python and Rust sources.
//!
//! Usage:
//!   packspec --specs A.md B.md --c-output fmt.h --rs-output fmt.rs
//!   packspec --specs A.md --validate-only --format human
//!
//! Every diagnostic of the run is printed. If there is any, nothing is
//! written and the exit code is 1. Outputs are replaced atomically.

use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context};
use clap::{Parser, ValueEnum};
use packspec::{generate, parse_files, Backend, CompileError, Config, Diagnostic, ParseOptions};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "packspec")]
#[command(about = "Compile annotated format tables into packed type definitions", long_about = None)]
struct Args {
    /// Format documents, merged in the order given
    #[arg(long, value_name = "FILE", num_args = 1.., required = true)]
    specs: Vec<PathBuf>,

    /// Write the C header here
    #[arg(long, value_name = "FILE")]
    c_output: Option<PathBuf>,

    /// Write the Python module here
    #[arg(long, value_name = "FILE")]
    py_output: Option<PathBuf>,

    /// Write the Rust module here
    #[arg(long, value_name = "FILE")]
    rs_output: Option<PathBuf>,

    /// Parse and validate only
    #[arg(long)]
    validate_only: bool,

    /// Reject annotation blocks that are not followed by a table
    #[arg(long)]
    strict: bool,

    /// Prefix of the C include guard and static-assert macro
    #[arg(long, value_name = "NAME", default_value = "FORMAT")]
    prefix: String,

    /// Prefix for Python constant names, e.g. EEPROM_
    #[arg(long, value_name = "PREFIX", default_value = "")]
    py_constant_prefix: String,

    /// Type-name prefix rewrite, e.g. JEEPROM=Jeeprom (repeatable)
    #[arg(long, value_name = "FROM=TO")]
    rename: Vec<String>,

    /// SPDX license expression for the generated banners
    #[arg(long, value_name = "SPDX")]
    license: Option<String>,

    /// Only assert struct sizes, not every field offset
    #[arg(long)]
    no_offset_asserts: bool,

    /// Diagnostic output style
    #[arg(long, value_enum, default_value_t = OutputStyle::Compact)]
    format: OutputStyle,

    /// More log output (-v info, -vv debug)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum OutputStyle {
    Compact,
    Human,
}

fn print_diagnostic(d: &Diagnostic, style: OutputStyle) {
    match style {
        OutputStyle::Compact => {
            println!("{}: error: {} [{}]", d.definition, message(d), d.rule.id());
        }
        OutputStyle::Human => {
            println!("  {}", d);
            println!("    rule: {}", d.rule.id());
        }
    }
}

fn message(d: &Diagnostic) -> String {
    match &d.field {
        Some(field) => format!("{}: {}", field, d.message),
        None => d.message.clone(),
    }
}

fn init_logging(verbose: u8) {
    let default = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn build_config(args: &Args) -> anyhow::Result<Config> {
    let mut config = Config::default()
        .with_invocation(invocation())
        .with_prefix(&args.prefix);
    config.license = args.license.clone();
    config.offset_asserts = !args.no_offset_asserts;
    config.python.constant_prefix = args.py_constant_prefix.clone();
    for rule in &args.rename {
        if config.renames.push_spec(rule).is_none() {
            bail!("invalid --rename '{}': expected FROM=TO", rule);
        }
    }
    Ok(config)
}

/// Command line as recorded in the banners; file paths are kept as given.
fn invocation() -> String {
    let mut parts = vec!["packspec".to_string()];
    parts.extend(std::env::args().skip(1).filter(|a| !a.starts_with("-v") && a != "--verbose"));
    parts.join(" ")
}

/// Write to a temp file next to `path`, then rename over it.
fn write_atomic(path: &Path, text: &str) -> anyhow::Result<()> {
    let dir = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    let mut tmp = tempfile::NamedTempFile::new_in(dir)
        .with_context(|| format!("creating temp file in {}", dir.display()))?;
    tmp.write_all(text.as_bytes())
        .with_context(|| format!("writing {}", path.display()))?;
    tmp.persist(path)
        .with_context(|| format!("replacing {}", path.display()))?;
    Ok(())
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    init_logging(args.verbose);

    let config = build_config(&args)?;
    let options = ParseOptions {
        strict_annotations: args.strict,
    };
    let spec = parse_files(&args.specs, options).context("parsing format tables")?;
    tracing::info!(summary = %spec, "loaded {} document(s)", args.specs.len());

    let outputs: Vec<(Backend, &PathBuf)> = [
        (Backend::C, &args.c_output),
        (Backend::Python, &args.py_output),
        (Backend::Rust, &args.rs_output),
    ]
    .into_iter()
    .filter_map(|(b, p)| p.as_ref().map(|p| (b, p)))
    .collect();
    let backends: Vec<Backend> = if args.validate_only {
        Vec::new()
    } else {
        outputs.iter().map(|(b, _)| *b).collect()
    };

    let artifacts = match generate(&spec, &backends, &config) {
        Ok(artifacts) => artifacts,
        Err(CompileError::Invalid(diagnostics)) => {
            for d in &diagnostics {
                print_diagnostic(d, args.format);
            }
            eprintln!("packspec: {} error(s), nothing written", diagnostics.len());
            std::process::exit(1);
        }
        Err(e) => return Err(e.into()),
    };

    if args.validate_only {
        eprintln!("packspec: {} valid", spec);
        return Ok(());
    }
    if artifacts.is_empty() {
        eprintln!("packspec: {} valid; no outputs requested", spec);
        return Ok(());
    }
    for artifact in &artifacts {
        if let Some((_, path)) = outputs.iter().find(|(b, _)| *b == artifact.backend) {
            write_atomic(path, &artifact.text)?;
            tracing::info!(backend = %artifact.backend, path = %path.display(), "wrote artifact");
        }
    }
    Ok(())
}
