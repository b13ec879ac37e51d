// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! Header parsing.
//!
//! The header is a sequence of namelist blocks. Each block is parsed with
//! a Pest grammar into a [`Namelist`]; [`read_header`] assembles the blocks
//! into a [`Schema`] and stops after the `&data` block, leaving the input
//! positioned at the first byte of page data.

mod header;

pub use header::{parse_header, read_header, Header};

use pest::error::LineColLocation;
use pest::Parser;
use pest_derive::Parser;

use crate::core::{Result, SddsError};

/// Pest parser for a single namelist block.
#[derive(Parser)]
#[grammar = "schema/parser/namelist.pest"] // Path relative to src/ directory
struct NamelistParser;

/// One parsed `&group key=value, ... &end` block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Namelist {
    /// Lowercased group name
    pub group: String,
    /// Assignments in source order, keys lowercased
    pub entries: Vec<(String, String)>,
}

impl Namelist {
    /// Value of the first assignment to `key`.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }
}

/// Parse one namelist block; `line` is where it starts in the header.
pub fn parse_namelist(text: &str, line: usize) -> Result<Namelist> {
    let mut pairs = NamelistParser::parse(Rule::namelist, text).map_err(|e| {
        let offset = match e.line_col {
            LineColLocation::Pos((l, _)) | LineColLocation::Span((l, _), _) => l,
        };
        SddsError::schema_syntax(line + offset - 1, e.variant.message().into_owned())
    })?;
    let root = pairs
        .next()
        .ok_or_else(|| SddsError::schema_syntax(line, "empty namelist"))?;

    let mut namelist = Namelist {
        group: String::new(),
        entries: Vec::new(),
    };
    for pair in root.into_inner() {
        match pair.as_rule() {
            Rule::group_name => namelist.group = pair.as_str().to_ascii_lowercase(),
            Rule::assignment => {
                let mut inner = pair.into_inner();
                let key = inner
                    .next()
                    .map(|k| k.as_str().to_ascii_lowercase())
                    .unwrap_or_default();
                let value = match inner.next() {
                    Some(v) if v.as_rule() == Rule::quoted => {
                        unescape(v.into_inner().next().map(|p| p.as_str()).unwrap_or(""))
                    }
                    Some(v) => v.as_str().to_string(),
                    None => String::new(),
                };
                namelist.entries.push((key, value));
            }
            _ => {}
        }
    }
    Ok(namelist)
}

/// Resolve `\"` and `\\`; other backslashes are kept literally.
fn unescape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut chars = text.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('"') => out.push('"'),
            Some('\\') => out.push('\\'),
            Some(other) => {
                out.push('\\');
                out.push(other);
            }
            None => out.push('\\'),
        }
    }
    out
}

/// Byte offset just past the `&end` closing the block at the start of
/// `text`, ignoring any `&end` inside quotes.
pub(crate) fn find_block_end(text: &str) -> Option<usize> {
    let bytes = text.as_bytes();
    let mut in_quote = false;
    let mut i = 1;
    while i < bytes.len() {
        match bytes[i] {
            b'\\' if in_quote => i += 1,
            b'"' => in_quote = !in_quote,
            b'&' if !in_quote && bytes[i..].starts_with(b"&end") => return Some(i + 4),
            _ => {}
        }
        i += 1;
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_simple_block() {
        let nl = parse_namelist("&column name=x, type=double, units=m, &end", 1).unwrap();
        assert_eq!(nl.group, "column");
        assert_eq!(nl.get("name"), Some("x"));
        assert_eq!(nl.get("type"), Some("double"));
        assert_eq!(nl.get("units"), Some("m"));
        assert_eq!(nl.get("symbol"), None);
    }

    #[test]
    fn test_parse_quoted_values() {
        let nl = parse_namelist(
            r#"&description text="A \"quoted\" title, with comma", contents="c:\\dir" &end"#,
            1,
        )
        .unwrap();
        assert_eq!(nl.get("text"), Some(r#"A "quoted" title, with comma"#));
        assert_eq!(nl.get("contents"), Some(r"c:\dir"));
    }

    #[test]
    fn test_parse_multiline_and_case() {
        let nl = parse_namelist("&Parameter\n  Name=p,\n  TYPE=short,\n&end", 4).unwrap();
        assert_eq!(nl.group, "parameter");
        assert_eq!(nl.get("name"), Some("p"));
        assert_eq!(nl.get("type"), Some("short"));
    }

    #[test]
    fn test_parse_empty_value() {
        let nl = parse_namelist("&column name=x, units=, type=long, &end", 1).unwrap();
        assert_eq!(nl.get("units"), Some(""));
        assert_eq!(nl.get("type"), Some("long"));
    }

    #[test]
    fn test_parse_errors() {
        let err = parse_namelist("&column name=x, type=double", 7).unwrap_err();
        assert!(matches!(err, SddsError::SchemaSyntax { line: 7, .. }));
        assert!(parse_namelist("column name=x &end", 1).is_err());
        assert!(parse_namelist("&column =x &end", 1).is_err());
    }

    #[test]
    fn test_find_block_end() {
        assert_eq!(find_block_end("&data mode=ascii, &end"), Some(22));
        assert_eq!(
            find_block_end(r#"&description text="has &end inside", &end rest"#),
            Some(41)
        );
        assert_eq!(find_block_end("&column name=x,"), None);
    }

    #[test]
    fn test_unescape_keeps_unknown_escapes() {
        assert_eq!(unescape(r"a\tb"), r"a\tb");
        assert_eq!(unescape(r#"\"x\""#), "\"x\"");
    }
}
