//! Identifier transforms used by the emitters.
//!
//! All functions are pure; the same input always gives the same name.

/// Ordered prefix rewrites applied to type names, e.g. `JEEPROM` -> `Jeeprom`.
///
/// When no rule matches, a leading all-caps acronym is folded to title case
/// (`JEEFSFileHeader` -> `JeefsFileHeader`). Afterwards a trailing `vN`
/// becomes `VN` and a trailing `version` becomes `Version`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RenameRules {
    prefixes: Vec<(String, String)>,
}

impl RenameRules {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a prefix rewrite; earlier rules win.
    pub fn with_prefix(mut self, from: impl Into<String>, to: impl Into<String>) -> Self {
        self.prefixes.push((from.into(), to.into()));
        self
    }

    /// Parse `FROM=TO`.
    pub fn push_spec(&mut self, spec: &str) -> Option<()> {
        let (from, to) = spec.split_once('=')?;
        if from.is_empty() {
            return None;
        }
        self.prefixes.push((from.to_string(), to.to_string()));
        Some(())
    }

    pub fn prefixes(&self) -> &[(String, String)] {
        &self.prefixes
    }

    /// Target-language type name for a source type name.
    pub fn type_name(&self, name: &str) -> String {
        let renamed = match self
            .prefixes
            .iter()
            .find(|(from, _)| name.starts_with(from.as_str()))
        {
            Some((from, to)) => format!("{}{}", to, &name[from.len()..]),
            None => fold_leading_acronym(name),
        };
        capitalize_version_suffix(&renamed)
    }
}

fn fold_leading_acronym(name: &str) -> String {
    let run = name.chars().take_while(|c| c.is_ascii_uppercase()).count();
    if run < 2 {
        return name.to_string();
    }
    let rest = &name[run..];
    // The last capital starts the next word ("JEEPROMHeader") unless what
    // follows is only a version suffix ("XMLv2").
    let acronym_len = match rest.chars().next() {
        Some(c) if c.is_ascii_lowercase() && !is_version_suffix(rest) => run - 1,
        _ => run,
    };
    format!("{}{}", title_case(&name[..acronym_len]), &name[acronym_len..])
}

fn is_version_suffix(s: &str) -> bool {
    s == "version"
        || s.strip_prefix('v')
            .is_some_and(|d| !d.is_empty() && d.chars().all(|c| c.is_ascii_digit()))
}

fn capitalize_version_suffix(name: &str) -> String {
    if let Some(stem) = name.strip_suffix("version") {
        return format!("{}Version", stem);
    }
    let digits = name.chars().rev().take_while(|c| c.is_ascii_digit()).count();
    let split = name.len() - digits;
    if digits > 0 && name[..split].ends_with('v') {
        return format!("{}V{}", &name[..split - 1], &name[split..]);
    }
    name.to_string()
}

fn title_case(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_ascii_uppercase().to_string() + &chars.as_str().to_ascii_lowercase(),
        None => String::new(),
    }
}

/// `dataSize` -> `data_size`, `signature size` -> `signature_size`.
pub fn to_snake_case(name: &str) -> String {
    let mut out = String::with_capacity(name.len() + 4);
    let mut prev: Option<char> = None;
    for c in name.chars() {
        if c == ' ' || c == '-' {
            if !out.ends_with('_') {
                out.push('_');
            }
            prev = Some('_');
            continue;
        }
        if c.is_ascii_uppercase()
            && prev.is_some_and(|p| p.is_ascii_lowercase() || p.is_ascii_digit())
        {
            out.push('_');
        }
        out.push(c.to_ascii_lowercase());
        prev = Some(c);
    }
    out
}

/// `JeepromHeaderV3` -> `JEEPROM_HEADER_V3`.
pub fn to_upper_snake(name: &str) -> String {
    to_snake_case(name).to_ascii_uppercase()
}

/// `SECP192R1` -> `Secp192r1`, `ECDSA_P256` -> `EcdsaP256`; used for enum variants.
pub fn to_upper_camel(name: &str) -> String {
    let camel: String = name
        .split(|c: char| c == '_' || c == ' ' || c == '-')
        .map(title_case)
        .collect();
    match camel.as_str() {
        "" => "_".to_string(),
        "Self" => "Self_".to_string(),
        s if s.starts_with(|c: char| c.is_ascii_digit()) => format!("V{}", s),
        _ => camel,
    }
}

const RUST_KEYWORDS: &[&str] = &[
    "as", "async", "await", "break", "const", "continue", "dyn", "else", "enum", "extern", "false",
    "fn", "for", "if", "impl", "in", "let", "loop", "match", "mod", "move", "mut", "pub", "ref",
    "return", "static", "struct", "trait", "true", "type", "unsafe", "use", "where", "while",
    "abstract", "become", "box", "do", "final", "gen", "macro", "override", "priv", "try",
    "typeof", "unsized", "virtual", "yield",
];

/// snake_case Rust field name; keywords become raw identifiers.
pub fn rust_field_name(name: &str) -> String {
    let snake = to_snake_case(name);
    match snake.as_str() {
        "self" | "super" | "crate" | "_" => format!("{}_", snake),
        s if RUST_KEYWORDS.contains(&s) => format!("r#{}", s),
        s if s.starts_with(|c: char| c.is_ascii_digit()) => format!("_{}", s),
        _ => snake,
    }
}
