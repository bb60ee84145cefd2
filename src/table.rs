//! Structural scan of annotated pipe-table documents.
//!
//! A section is a block of annotation lines (`<!-- KEY: VALUE -->` or bare
//! `<!-- KEY -->`) followed by a pipe table. The scan is purely structural:
//! cells stay strings and nothing is typed here (see [`crate::parser`]).

use pest::Parser;
use pest_derive::Parser as PestParser;

#[derive(PestParser)]
#[grammar = "table.pest"]
pub(crate) struct TableGrammar;

/// Annotation key/value pairs of one section, in document order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Metadata {
    entries: Vec<(String, String)>,
}

impl Metadata {
    /// Value of `key`; the last occurrence wins when a key repeats.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries
            .iter()
            .rev()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn contains(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(k, _)| k.as_str())
    }

    fn insert(&mut self, key: String, value: String) {
        self.entries.push((key, value));
    }
}

/// One data row with its 1-based source line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Row {
    pub line: usize,
    pub cells: Vec<String>,
}

/// Metadata, lower-cased column names and data rows of one annotated table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawSection {
    /// Line of the first annotation.
    pub line: usize,
    pub metadata: Metadata,
    pub columns: Vec<String>,
    pub rows: Vec<Row>,
}

impl RawSection {
    /// Index of a column by its lower-cased name.
    pub fn column(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }
}

/// Annotation block that was not followed by a table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrphanBlock {
    pub line: usize,
    pub keys: Vec<String>,
}

/// Result of scanning one document.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Scan {
    pub sections: Vec<RawSection>,
    pub orphans: Vec<OrphanBlock>,
}

#[derive(Debug, PartialEq, Eq)]
enum Line {
    Annotation(String, String),
    Separator,
    Row(Vec<String>),
    Blank,
    Text,
}

fn classify(line: &str) -> Line {
    let pair = match TableGrammar::parse(Rule::line, line)
        .ok()
        .and_then(|mut pairs| pairs.next())
    {
        Some(p) => p,
        None => return Line::Text,
    };
    match pair.as_rule() {
        Rule::annotation => {
            let mut key = String::new();
            let mut value = String::new();
            for inner in pair.into_inner() {
                match inner.as_rule() {
                    Rule::key => key = inner.as_str().to_string(),
                    Rule::value => value = inner.as_str().trim().to_string(),
                    _ => {}
                }
            }
            Line::Annotation(key, value)
        }
        Rule::separator => Line::Separator,
        Rule::row => {
            let mut cells: Vec<String> = pair
                .into_inner()
                .filter(|p| p.as_rule() == Rule::cell)
                .map(|p| p.as_str().trim().to_string())
                .collect();
            // closing pipe
            if cells.len() > 1 && cells.last().is_some_and(|c| c.is_empty()) {
                cells.pop();
            }
            Line::Row(cells)
        }
        Rule::blank => Line::Blank,
        _ => Line::Text,
    }
}

#[derive(Default)]
struct Pending {
    line: usize,
    metadata: Metadata,
    columns: Option<Vec<String>>,
    rows: Vec<Row>,
}

impl Pending {
    fn table_started(&self) -> bool {
        self.columns.is_some()
    }
}

/// Split one document into annotated table sections.
///
/// Tables without annotations are ignored. Annotation blocks that never
/// reach a table are reported in [`Scan::orphans`] and produce no section.
pub fn scan(source: &str) -> Scan {
    let mut out = Scan::default();
    let mut pending: Option<Pending> = None;

    for (i, text) in source.lines().enumerate() {
        let line_no = i + 1;
        match classify(text) {
            Line::Annotation(key, value) => {
                let mut block = match pending.take() {
                    Some(p) if !p.table_started() => p,
                    other => {
                        finish(&mut out, other);
                        Pending {
                            line: line_no,
                            ..Pending::default()
                        }
                    }
                };
                block.metadata.insert(key, value);
                pending = Some(block);
            }
            Line::Separator => {}
            Line::Row(cells) => {
                if let Some(p) = pending.as_mut() {
                    match &p.columns {
                        None => {
                            p.columns = Some(cells.iter().map(|c| c.to_lowercase()).collect());
                        }
                        Some(columns) => {
                            let mut cells = cells;
                            if cells.len() < columns.len() {
                                cells.resize(columns.len(), String::new());
                            }
                            p.rows.push(Row {
                                line: line_no,
                                cells,
                            });
                        }
                    }
                }
            }
            Line::Blank => {
                if pending.as_ref().is_some_and(Pending::table_started) {
                    finish(&mut out, pending.take());
                }
            }
            Line::Text => finish(&mut out, pending.take()),
        }
    }
    finish(&mut out, pending.take());

    tracing::debug!(
        sections = out.sections.len(),
        orphans = out.orphans.len(),
        "scanned document"
    );
    out
}

fn finish(out: &mut Scan, pending: Option<Pending>) {
    let Some(p) = pending else { return };
    match p.columns {
        Some(columns) => out.sections.push(RawSection {
            line: p.line,
            metadata: p.metadata,
            columns,
            rows: p.rows,
        }),
        None => out.orphans.push(OrphanBlock {
            line: p.line,
            keys: p.metadata.keys().map(str::to_string).collect(),
        }),
    }
}
