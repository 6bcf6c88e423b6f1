//! BibTeX reader for the bibliography a sync runs from.
//!
//! Handles the subset of BibTeX that reference managers export:
//! - `@string` macros, including `#` concatenation
//! - `@preamble` and `@comment` blocks (consumed, not kept)
//! - `%` line comments between entries
//! - braced, quoted, numeric and macro field values, with nested braces
//!
//! Field keys are lower-cased. A malformed entry is recorded as a
//! [`ParseIssue`] and parsing resumes at the next `@`.

use nom::{
    branch::alt,
    bytes::complete::{take_while, take_while1},
    character::complete::{char, multispace0},
    combinator::map,
    IResult,
};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Failure to obtain bibliography text at all.
#[derive(Debug, thiserror::Error)]
pub enum BibliographyError {
    #[error("failed to read bibliography {path:?}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// One bibliographic record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BibEntry {
    /// Citation key. `None` when the entry was written without one.
    pub id: Option<String>,
    /// Lower-cased entry type, e.g. `article`.
    pub entry_type: String,
    fields: Vec<(String, String)>,
}

impl BibEntry {
    pub fn new(id: Option<String>, entry_type: impl Into<String>) -> Self {
        Self {
            id: id.filter(|id| !id.is_empty()),
            entry_type: entry_type.into().to_lowercase(),
            fields: Vec::new(),
        }
    }

    pub fn add_field(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.fields.push((key.into().to_lowercase(), value.into()));
    }

    /// Builder form of [`add_field`](Self::add_field).
    pub fn with_field(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.add_field(key, value);
        self
    }

    /// Field value by key, case-insensitive. A repeated key resolves to its last value.
    pub fn field(&self, key: &str) -> Option<&str> {
        let key = key.to_lowercase();
        self.fields
            .iter()
            .rev()
            .find(|(k, _)| *k == key)
            .map(|(_, v)| v.as_str())
    }

    /// The raw attachment location (`file` field).
    pub fn file(&self) -> Option<&str> {
        self.field("file")
    }

    pub fn fields(&self) -> impl Iterator<Item = (&str, &str)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseIssue {
    pub line: u32,
    pub message: String,
}

/// Result of parsing a whole bibliography file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Bibliography {
    pub entries: Vec<BibEntry>,
    pub strings: HashMap<String, String>,
    pub issues: Vec<ParseIssue>,
}

/// Reads and parses the bibliography at `path`.
pub fn load_bibliography(path: &Path) -> Result<Bibliography, BibliographyError> {
    info!(path = %path.display(), "Loading bibliography");
    let text = std::fs::read_to_string(path).map_err(|source| BibliographyError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let bibliography = parse_bibliography(&text);
    for issue in &bibliography.issues {
        warn!(path = %path.display(), line = issue.line, message = %issue.message, "Skipped malformed bibliography entry");
    }
    info!(
        path = %path.display(),
        entries = bibliography.entries.len(),
        issues = bibliography.issues.len(),
        "Loaded bibliography"
    );
    Ok(bibliography)
}

/// Parses BibTeX text. Never fails; problems end up in [`Bibliography::issues`].
pub fn parse_bibliography(input: &str) -> Bibliography {
    let mut result = Bibliography::default();
    let mut remaining = input;

    loop {
        remaining = skip_whitespace_and_comments(remaining);
        if remaining.is_empty() {
            break;
        }

        if !remaining.starts_with('@') {
            match remaining.find('@') {
                Some(pos) => {
                    remaining = &remaining[pos..];
                    continue;
                }
                None => break,
            }
        }

        match parse_at_block(remaining, &result.strings) {
            Ok((rest, block)) => {
                match block {
                    AtBlock::Entry(entry) => {
                        debug!(id = ?entry.id, entry_type = %entry.entry_type, "Parsed entry");
                        result.entries.push(entry);
                    }
                    AtBlock::String(key, value) => {
                        result.strings.insert(key, value);
                    }
                    AtBlock::Ignored => {}
                }
                remaining = rest;
            }
            Err(_) => {
                result.issues.push(ParseIssue {
                    line: line_of(input, remaining),
                    message: "failed to parse entry".to_string(),
                });
                match remaining[1..].find('@') {
                    Some(pos) => remaining = &remaining[pos + 1..],
                    None => break,
                }
            }
        }
    }

    result
}

enum AtBlock {
    Entry(BibEntry),
    String(String, String),
    Ignored,
}

fn line_of(input: &str, remaining: &str) -> u32 {
    let offset = input.len() - remaining.len();
    input[..offset].matches('\n').count() as u32 + 1
}

fn skip_whitespace_and_comments(input: &str) -> &str {
    let mut rest = input;
    loop {
        rest = rest.trim_start();
        if rest.starts_with('%') {
            rest = rest.find('\n').map_or("", |pos| &rest[pos..]);
        } else {
            return rest;
        }
    }
}

fn parse_at_block<'a>(
    input: &'a str,
    strings: &HashMap<String, String>,
) -> IResult<&'a str, AtBlock> {
    let (rest, _) = char('@')(input)?;
    let (rest, _) = multispace0(rest)?;
    let (rest, block_type) = take_while1(|c: char| c.is_ascii_alphanumeric())(rest)?;

    match block_type.to_lowercase().as_str() {
        "string" => {
            let (rest, (key, value)) = parse_string_definition(rest, strings)?;
            Ok((rest, AtBlock::String(key, value)))
        }
        "preamble" => {
            let (rest, _) = multispace0(rest)?;
            let (rest, _) = parse_braced_content(rest)?;
            Ok((rest, AtBlock::Ignored))
        }
        "comment" => {
            let (rest, _) = multispace0(rest)?;
            if rest.starts_with('{') {
                let (rest, _) = parse_braced_content(rest)?;
                Ok((rest, AtBlock::Ignored))
            } else {
                let pos = rest.find('\n').unwrap_or(rest.len());
                Ok((&rest[pos..], AtBlock::Ignored))
            }
        }
        _ => {
            let (rest, entry) = parse_entry_body(rest, block_type, strings)?;
            Ok((rest, AtBlock::Entry(entry)))
        }
    }
}

fn parse_string_definition<'a>(
    input: &'a str,
    strings: &HashMap<String, String>,
) -> IResult<&'a str, (String, String)> {
    let (rest, _) = multispace0(input)?;
    let (rest, _) = char('{')(rest)?;
    let (rest, (key, value)) = parse_single_field(rest, strings)?;
    let (rest, _) = multispace0(rest)?;
    let (rest, _) = char('}')(rest)?;
    Ok((rest, (key, value)))
}

fn parse_entry_body<'a>(
    input: &'a str,
    entry_type: &str,
    strings: &HashMap<String, String>,
) -> IResult<&'a str, BibEntry> {
    let (rest, _) = multispace0(input)?;
    let (rest, _) = char('{')(rest)?;
    let (rest, _) = multispace0(rest)?;

    // May be empty: `@misc{, title = {...}}` is kept with no identifier.
    let (rest, cite_key) =
        take_while(|c: char| !c.is_whitespace() && c != ',' && c != '{' && c != '}')(rest)?;
    let (rest, _) = multispace0(rest)?;

    let mut entry = BibEntry::new(Some(cite_key.to_string()), entry_type);
    if let Some(rest) = rest.strip_prefix('}') {
        return Ok((rest, entry));
    }

    let (rest, _) = char(',')(rest)?;
    let (rest, fields) = parse_fields(rest, strings)?;
    let (rest, _) = multispace0(rest)?;
    let (rest, _) = char('}')(rest)?;

    for (key, value) in fields {
        entry.add_field(key, value);
    }
    Ok((rest, entry))
}

fn parse_fields<'a>(
    input: &'a str,
    strings: &HashMap<String, String>,
) -> IResult<&'a str, Vec<(String, String)>> {
    let mut fields = Vec::new();
    let mut remaining = input;

    loop {
        let (rest, _) = multispace0(remaining)?;
        if rest.starts_with('}') {
            return Ok((rest, fields));
        }

        match parse_single_field(rest, strings) {
            Ok((rest, field)) => {
                fields.push(field);
                let (rest, _) = multispace0(rest)?;
                remaining = rest.strip_prefix(',').unwrap_or(rest);
            }
            Err(_) => return Ok((remaining, fields)),
        }
    }
}

fn parse_single_field<'a>(
    input: &'a str,
    strings: &HashMap<String, String>,
) -> IResult<&'a str, (String, String)> {
    let (rest, _) = multispace0(input)?;
    let (rest, key) =
        take_while1(|c: char| c.is_ascii_alphanumeric() || "_-.:".contains(c))(rest)?;
    let (rest, _) = multispace0(rest)?;
    let (rest, _) = char('=')(rest)?;
    let (rest, _) = multispace0(rest)?;
    let (rest, value) = parse_field_value(rest, strings)?;
    Ok((rest, (key.to_lowercase(), value)))
}

/// A value is one or more `#`-joined parts: braced, quoted, number, or macro name.
fn parse_field_value<'a>(
    input: &'a str,
    strings: &HashMap<String, String>,
) -> IResult<&'a str, String> {
    let mut value = String::new();
    let mut remaining = input;

    loop {
        let (rest, _) = multispace0(remaining)?;
        let (rest, part) = alt((
            parse_braced_value,
            parse_quoted_value,
            map(take_while1(|c: char| c.is_ascii_digit()), str::to_string),
            map(
                take_while1(|c: char| c.is_ascii_alphanumeric() || c == '_' || c == '-'),
                // Macro names are case-insensitive; definitions are stored lower-cased.
                |name: &str| {
                    strings
                        .get(&name.to_lowercase())
                        .cloned()
                        .unwrap_or_else(|| name.to_string())
                },
            ),
        ))(rest)?;
        value.push_str(&part);

        let (rest, _) = multispace0(rest)?;
        match rest.strip_prefix('#') {
            Some(next) => remaining = next,
            None => return Ok((rest, value)),
        }
    }
}

fn parse_braced_value(input: &str) -> IResult<&str, String> {
    let (rest, content) = parse_braced_content(input)?;
    Ok((rest, content[1..content.len() - 1].to_string()))
}

/// Matches `{...}` with nesting; returns the slice including the outer braces.
fn parse_braced_content(input: &str) -> IResult<&str, &str> {
    if !input.starts_with('{') {
        return Err(nom_error(input));
    }

    let mut depth = 0usize;
    let mut escaped = false;
    for (pos, c) in input.char_indices() {
        if escaped {
            escaped = false;
            continue;
        }
        match c {
            '\\' => escaped = true,
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Ok((&input[pos + 1..], &input[..pos + 1]));
                }
            }
            _ => {}
        }
    }

    Err(nom_error(input))
}

fn parse_quoted_value(input: &str) -> IResult<&str, String> {
    if !input.starts_with('"') {
        return Err(nom_error(input));
    }

    let mut value = String::new();
    let mut depth = 0usize;
    let mut chars = input.char_indices().skip(1);
    while let Some((pos, c)) = chars.next() {
        match c {
            '"' if depth == 0 => return Ok((&input[pos + 1..], value)),
            '{' => {
                depth += 1;
                value.push(c);
            }
            '}' => {
                depth = depth.saturating_sub(1);
                value.push(c);
            }
            '\\' => {
                value.push(c);
                if let Some((_, next)) = chars.next() {
                    value.push(next);
                }
            }
            _ => value.push(c),
        }
    }

    Err(nom_error(input))
}

fn nom_error(input: &str) -> nom::Err<nom::error::Error<&str>> {
    nom::Err::Error(nom::error::Error::new(input, nom::error::ErrorKind::Char))
}
