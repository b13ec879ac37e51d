// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! Common utilities for CLI commands.

use std::io::IsTerminal as _;
use std::path::Path;

use sdds::{find_by_pattern, DatasetConfig, FieldKind, Schema};
use tracing_subscriber::EnvFilter;

pub use anyhow::Result as CliResult;
pub type Result<T = ()> = CliResult<T>;

/// Install the stderr log subscriber. `RUST_LOG` applies unless `-v` was given.
pub fn init_logging(verbose: u8) {
    let filter = match verbose {
        0 => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        1 => EnvFilter::new("debug"),
        _ => EnvFilter::new("trace"),
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

/// Load the dataset configuration, or the defaults without `--config`.
pub fn load_config(path: Option<&Path>) -> Result<DatasetConfig> {
    match path {
        Some(path) => Ok(DatasetConfig::from_file(path)?),
        None => Ok(DatasetConfig::default()),
    }
}

/// Indices of the fields of `kind` kept by `retain` and then `delete`
/// wildcard lists, in declaration order. An empty `retain` keeps all.
pub fn select_fields(
    schema: &Schema,
    kind: FieldKind,
    retain: &[String],
    delete: &[String],
) -> Result<Vec<usize>> {
    let mut retained: Vec<&str> = Vec::new();
    for pattern in retain {
        retained.extend(find_by_pattern(schema, kind, pattern)?);
    }
    let mut deleted: Vec<&str> = Vec::new();
    for pattern in delete {
        deleted.extend(find_by_pattern(schema, kind, pattern)?);
    }
    Ok(schema
        .fields(kind)
        .iter()
        .enumerate()
        .filter(|(_, def)| retain.is_empty() || retained.contains(&def.name.as_str()))
        .filter(|(_, def)| !deleted.contains(&def.name.as_str()))
        .map(|(index, _)| index)
        .collect())
}

/// `--filter NAME=LOWER,UPPER`: keep rows whose value lies in the range.
#[derive(Debug, Clone, PartialEq)]
pub struct RangeFilter {
    pub column: String,
    pub lower: f64,
    pub upper: f64,
}

/// Parse `NAME=LOWER,UPPER`.
pub fn parse_range_filter(text: &str) -> std::result::Result<RangeFilter, String> {
    let (column, range) = split_assignment(text)?;
    let (lower, upper) = range
        .split_once(',')
        .ok_or_else(|| format!("expected NAME=LOWER,UPPER, got '{text}'"))?;
    let bound = |s: &str| {
        s.trim()
            .parse::<f64>()
            .map_err(|_| format!("'{s}' is not a number"))
    };
    let (lower, upper) = (bound(lower)?, bound(upper)?);
    if lower > upper {
        return Err(format!("lower bound {lower} is above upper bound {upper}"));
    }
    Ok(RangeFilter {
        column,
        lower,
        upper,
    })
}

/// `--match NAME=PATTERN`: keep rows whose string value matches.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PatternMatch {
    pub column: String,
    pub pattern: String,
}

/// Parse `NAME=PATTERN`.
pub fn parse_pattern_match(text: &str) -> std::result::Result<PatternMatch, String> {
    let (column, pattern) = split_assignment(text)?;
    Ok(PatternMatch {
        column,
        pattern: pattern.to_string(),
    })
}

fn split_assignment(text: &str) -> std::result::Result<(String, &str), String> {
    match text.split_once('=') {
        Some((name, rest)) if !name.trim().is_empty() => Ok((name.trim().to_string(), rest)),
        _ => Err(format!("expected NAME=..., got '{text}'")),
    }
}

/// Page counter shown on a terminal only.
pub struct Progress {
    inner: Option<indicatif::ProgressBar>,
}

impl Progress {
    /// Create a spinner with a prefix.
    pub fn spinner(prefix: impl Into<String>) -> Self {
        let inner = if std::io::stderr().is_terminal() {
            let pb = indicatif::ProgressBar::new_spinner();
            if let Ok(style) =
                indicatif::ProgressStyle::default_spinner().template("{spinner:.green} {prefix} {pos} pages {msg}")
            {
                pb.set_style(style);
            }
            pb.set_prefix(prefix.into());
            Some(pb)
        } else {
            None
        };
        Self { inner }
    }

    /// Count one page.
    pub fn inc(&self) {
        if let Some(pb) = &self.inner {
            pb.inc(1);
        }
    }

    /// Finish the progress bar with a message.
    pub fn finish_with_message(&self, msg: String) {
        if let Some(pb) = &self.inner {
            pb.finish_with_message(msg);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sdds::{FieldDef, SddsType};

    fn schema() -> Schema {
        let mut schema = Schema::new();
        for name in ["x1", "x2", "y1", "y2"] {
            schema
                .define_column(FieldDef::new(name, SddsType::Double))
                .unwrap();
        }
        schema
    }

    #[test]
    fn test_select_fields() {
        let schema = schema();
        let all = select_fields(&schema, FieldKind::Column, &[], &[]).unwrap();
        assert_eq!(all, vec![0, 1, 2, 3]);

        let retain = vec!["y*".to_string(), "x1".to_string()];
        let kept = select_fields(&schema, FieldKind::Column, &retain, &[]).unwrap();
        assert_eq!(kept, vec![0, 2, 3]);

        let delete = vec!["*2".to_string()];
        let kept = select_fields(&schema, FieldKind::Column, &retain, &delete).unwrap();
        assert_eq!(kept, vec![0, 2]);

        assert!(select_fields(&schema, FieldKind::Column, &["[".to_string()], &[]).is_err());
    }

    #[test]
    fn test_parse_row_selections() {
        assert_eq!(
            parse_range_filter("x=-1.5, 2").unwrap(),
            RangeFilter {
                column: "x".into(),
                lower: -1.5,
                upper: 2.0
            }
        );
        assert!(parse_range_filter("x=2,1").is_err());
        assert!(parse_range_filter("x=1").is_err());
        assert!(parse_range_filter("=1,2").is_err());
        assert!(parse_range_filter("x=a,2").is_err());

        let m = parse_pattern_match("name=bpm*").unwrap();
        assert_eq!(m.column, "name");
        assert_eq!(m.pattern, "bpm*");
        assert!(parse_pattern_match("bpm*").is_err());
    }

    #[test]
    fn test_load_config_default() {
        let config = load_config(None).unwrap();
        assert!(!config.recover);
    }
}
