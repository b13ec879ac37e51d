// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! Header reader: `SDDS<version>` line, comments and namelist blocks up to
//! and including `&data`.

use std::io::BufRead;

use tracing::{trace, warn};

use super::{find_block_end, parse_namelist, Namelist};
use crate::core::{ByteOrder, Encoding, MajorOrder, Result, SddsError, SddsType};
use crate::dataset::DatasetConfig;
use crate::schema::{DataMode, Description, FieldDef, FieldKind, Schema};

/// Highest file version this library writes.
pub const MAX_VERSION: u32 = 5;

/// A parsed header.
#[derive(Debug, Clone, PartialEq)]
pub struct Header {
    /// Version from the `SDDS<n>` line
    pub version: u32,
    /// Fields, description and data mode
    pub schema: Schema,
    /// Header lines consumed, including the `&data` line
    pub lines: usize,
}

/// Parse a complete header held in memory.
pub fn parse_header(text: &str, config: &DatasetConfig) -> Result<Header> {
    read_header(&mut text.as_bytes(), config)
}

/// Read a header from `input`, leaving it positioned after the `&data` line.
pub fn read_header<R: BufRead + ?Sized>(input: &mut R, config: &DatasetConfig) -> Result<Header> {
    let mut buf = Vec::new();
    let mut line_no = 0usize;

    let first = match next_line(input, &mut buf, &mut line_no)? {
        Some(line) => line,
        None => return Err(SddsError::schema_syntax(1, "empty input, no SDDS header")),
    };
    let version = parse_version(first.trim())?;
    if version > MAX_VERSION {
        warn!(version, "header declares a newer SDDS version than supported");
    }

    let mut builder = HeaderBuilder::new(config);
    let mut pending = String::new();
    let mut pending_line = 0usize;

    loop {
        let line = match next_line(input, &mut buf, &mut line_no)? {
            Some(line) => line,
            None => {
                let message = if pending.is_empty() {
                    "missing &data block"
                } else {
                    "unterminated namelist block"
                };
                return Err(SddsError::schema_syntax(line_no.max(1), message));
            }
        };

        if pending.is_empty() {
            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }
            if let Some(comment) = trimmed.strip_prefix('!') {
                builder.comment(comment);
                continue;
            }
            if !trimmed.starts_with('&') {
                return Err(SddsError::schema_syntax(
                    line_no,
                    format!("expected a namelist block, found '{trimmed}'"),
                ));
            }
            pending_line = line_no;
            pending.push_str(trimmed);
        } else {
            pending.push('\n');
            pending.push_str(&line);
        }

        while let Some(end) = find_block_end(&pending) {
            let namelist = parse_namelist(&pending[..end], pending_line)?;
            trace!(group = %namelist.group, line = pending_line, "header block");
            if builder.apply(namelist, pending_line)? {
                return Ok(builder.finish(version, line_no));
            }
            let rest = pending[end..].trim().to_string();
            if !rest.is_empty() && !rest.starts_with('&') {
                return Err(SddsError::schema_syntax(
                    line_no,
                    format!("unexpected text after &end: '{rest}'"),
                ));
            }
            pending = rest;
            pending_line = line_no;
        }
    }
}

fn next_line<R: BufRead + ?Sized>(
    input: &mut R,
    buf: &mut Vec<u8>,
    line_no: &mut usize,
) -> Result<Option<String>> {
    buf.clear();
    let n = input
        .read_until(b'\n', buf)
        .map_err(|e| SddsError::io("reading header", &e))?;
    if n == 0 {
        return Ok(None);
    }
    *line_no += 1;
    let line = String::from_utf8_lossy(buf);
    Ok(Some(line.trim_end_matches(['\n', '\r']).to_string()))
}

fn parse_version(line: &str) -> Result<u32> {
    let digits = line
        .strip_prefix("SDDS")
        .ok_or_else(|| SddsError::schema_syntax(1, "missing SDDS identifier"))?;
    digits
        .trim()
        .parse::<u32>()
        .map_err(|_| SddsError::schema_syntax(1, format!("invalid version '{digits}'")))
}

struct HeaderBuilder<'a> {
    config: &'a DatasetConfig,
    schema: Schema,
    hinted_order: Option<ByteOrder>,
}

impl<'a> HeaderBuilder<'a> {
    fn new(config: &'a DatasetConfig) -> Self {
        let mut schema = Schema::new();
        schema.set_allow_any_name(config.allow_any_name);
        Self {
            config,
            schema,
            hinted_order: None,
        }
    }

    fn comment(&mut self, comment: &str) {
        match comment.trim() {
            "# little-endian" => self.hinted_order = Some(ByteOrder::Little),
            "# big-endian" => self.hinted_order = Some(ByteOrder::Big),
            _ => {}
        }
    }

    fn unknown(&self, group: &str, keyword: &str) -> Result<()> {
        if self.config.strict_keywords {
            return Err(SddsError::unknown_keyword(group, keyword));
        }
        warn!(group, keyword, "ignoring unknown header keyword");
        Ok(())
    }

    /// Apply one block; returns true once `&data` has been applied.
    fn apply(&mut self, namelist: Namelist, line: usize) -> Result<bool> {
        match namelist.group.as_str() {
            "description" => {
                let mut description = Description::default();
                for (key, value) in &namelist.entries {
                    match key.as_str() {
                        "text" => description.text = Some(value.clone()),
                        "contents" => description.contents = Some(value.clone()),
                        other => self.unknown("description", other)?,
                    }
                }
                self.schema.set_description(description);
                Ok(false)
            }
            "parameter" => self.field(FieldKind::Parameter, &namelist, line).map(|_| false),
            "array" => self.field(FieldKind::Array, &namelist, line).map(|_| false),
            "column" => self.field(FieldKind::Column, &namelist, line).map(|_| false),
            "data" => {
                self.data(&namelist, line)?;
                Ok(true)
            }
            "associate" | "include" => {
                warn!(group = %namelist.group, line, "ignoring unsupported header block");
                Ok(false)
            }
            other => Err(SddsError::schema_syntax(
                line,
                format!("unknown namelist group '&{other}'"),
            )),
        }
    }

    fn field(&mut self, kind: FieldKind, namelist: &Namelist, line: usize) -> Result<()> {
        let group = kind.as_str();
        let name = namelist
            .get("name")
            .ok_or_else(|| SddsError::schema_syntax(line, format!("&{group} without a name")))?;
        let type_name = namelist.get("type").ok_or_else(|| {
            SddsError::schema_syntax(line, format!("&{group} '{name}' without a type"))
        })?;
        let ty: SddsType = type_name
            .parse()
            .map_err(|_| SddsError::invalid_attribute(name, "type", format!("unknown type '{type_name}'")))?;

        let mut def = FieldDef::new(name, ty);
        for (key, value) in &namelist.entries {
            let text = || (!value.is_empty()).then(|| value.clone());
            match (key.as_str(), kind) {
                ("name" | "type", _) => {}
                ("symbol", _) => def.symbol = text(),
                ("units", _) => def.units = text(),
                ("description", _) => def.description = text(),
                ("format_string", _) => def.format_string = text(),
                ("field_length", FieldKind::Array | FieldKind::Column) => {
                    def.field_length = value.trim().parse().map_err(|_| {
                        SddsError::invalid_attribute(name, "field_length", format!("'{value}' is not an integer"))
                    })?;
                }
                ("dimensions", FieldKind::Array) => {
                    def.dimensions = value.trim().parse().map_err(|_| {
                        SddsError::invalid_attribute(name, "dimensions", format!("'{value}' is not a count"))
                    })?;
                }
                ("group_name", FieldKind::Array) => def.group_name = text(),
                ("fixed_value", FieldKind::Parameter) => def.fixed_value = Some(value.clone()),
                (other, _) => self.unknown(group, other)?,
            }
        }
        self.schema.define(kind, def)?;
        Ok(())
    }

    fn data(&mut self, namelist: &Namelist, line: usize) -> Result<()> {
        let mut mode = DataMode::ascii();
        let mut declared_order = None;
        let flag = |key: &str, value: &str| -> Result<bool> {
            value.trim().parse::<i64>().map(|v| v != 0).map_err(|_| {
                SddsError::schema_syntax(line, format!("&data {key}='{value}' is not an integer"))
            })
        };
        let count = |key: &str, value: &str| -> Result<usize> {
            value.trim().parse::<usize>().map_err(|_| {
                SddsError::schema_syntax(line, format!("&data {key}='{value}' is not a count"))
            })
        };

        for (key, value) in &namelist.entries {
            match key.as_str() {
                "mode" => {
                    mode.encoding = value.parse::<Encoding>().map_err(|e| {
                        SddsError::schema_syntax(line, format!("&data mode='{value}': {e}"))
                    })?;
                }
                "endian" => {
                    declared_order = Some(value.parse::<ByteOrder>().map_err(|e| {
                        SddsError::schema_syntax(line, format!("&data endian='{value}': {e}"))
                    })?);
                }
                "column_major_order" => {
                    mode.major_order = if flag(key, value)? {
                        MajorOrder::Column
                    } else {
                        MajorOrder::Row
                    };
                }
                "no_row_counts" => mode.no_row_counts = flag(key, value)?,
                "lines_per_row" => mode.lines_per_row = count(key, value)?.max(1),
                "additional_header_lines" => mode.additional_header_lines = count(key, value)?,
                "delimiter" => mode.delimiter = parse_delimiter(value),
                // Row counts are never rewritten in place, so the padding hint is moot.
                "fixed_row_count" => {}
                other => self.unknown("data", other)?,
            }
        }
        mode.byte_order = declared_order
            .or(self.hinted_order)
            .unwrap_or_else(ByteOrder::native);
        *self.schema.data_mode_mut() = mode;
        Ok(())
    }

    fn finish(self, version: u32, lines: usize) -> Header {
        Header {
            version,
            schema: self.schema,
            lines,
        }
    }
}

fn parse_delimiter(value: &str) -> Option<char> {
    match value {
        "" => None,
        "\\t" => Some('\t'),
        other => other.chars().next(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const HEADER: &str = "SDDS5\n\
!# little-endian\n\
&description text=\"Demo data\", contents=\"demo\", &end\n\
&parameter name=shortParam, type=short, units=A, &end\n\
&parameter name=stringParam, type=string, &end\n\
&parameter name=constParam, type=long, fixed_value=42, &end\n\
&array name=grid, type=double, dimensions=2, group_name=g, &end\n\
&column name=shortCol, type=short, &end\n\
&column name=doubleCol,\n type=double, format_string=%10.4f, &end\n\
&data mode=binary, endian=big, column_major_order=1, &end\n";

    #[test]
    fn test_parse_full_header() {
        let header = parse_header(HEADER, &DatasetConfig::default()).unwrap();
        assert_eq!(header.version, 5);
        assert_eq!(header.lines, 11);
        let schema = &header.schema;
        assert_eq!(schema.description().text.as_deref(), Some("Demo data"));
        assert_eq!(schema.parameters().len(), 3);
        assert_eq!(schema.parameters()[0].units.as_deref(), Some("A"));
        assert_eq!(schema.parameters()[2].fixed_value.as_deref(), Some("42"));
        assert_eq!(schema.arrays()[0].dimensions, 2);
        assert_eq!(schema.arrays()[0].group_name.as_deref(), Some("g"));
        assert_eq!(schema.columns()[1].format_string.as_deref(), Some("%10.4f"));

        let mode = schema.data_mode();
        assert_eq!(mode.encoding, Encoding::Binary);
        // &data endian wins over the comment hint.
        assert_eq!(mode.byte_order, ByteOrder::Big);
        assert_eq!(mode.major_order, MajorOrder::Column);
    }

    #[test]
    fn test_reader_positioned_after_data_line() {
        let text = format!("{HEADER}BODY");
        let mut input = text.as_bytes();
        read_header(&mut input, &DatasetConfig::default()).unwrap();
        assert_eq!(input, b"BODY");
    }

    #[test]
    fn test_endian_hint_comment() {
        let text = "SDDS1\n!# big-endian\n&column name=x, type=double, &end\n&data mode=binary, &end\n";
        let header = parse_header(text, &DatasetConfig::default()).unwrap();
        assert_eq!(header.schema.data_mode().byte_order, ByteOrder::Big);
    }

    #[test]
    fn test_ascii_options() {
        let text = "SDDS1\n&column name=x, type=double, &end\n\
&data mode=ascii, no_row_counts=1, lines_per_row=2, additional_header_lines=1, delimiter=\",\", &end\n";
        let header = parse_header(text, &DatasetConfig::default()).unwrap();
        let mode = header.schema.data_mode();
        assert_eq!(mode.encoding, Encoding::Ascii);
        assert!(mode.no_row_counts);
        assert_eq!(mode.lines_per_row, 2);
        assert_eq!(mode.additional_header_lines, 1);
        assert_eq!(mode.delimiter, Some(','));
    }

    #[test]
    fn test_unknown_keyword_tolerant_and_strict() {
        let text = "SDDS1\n&column name=x, type=double, colour=red, &end\n&data mode=ascii, &end\n";
        let header = parse_header(text, &DatasetConfig::default()).unwrap();
        assert_eq!(header.schema.columns().len(), 1);

        let strict = DatasetConfig::default().with_strict_keywords(true);
        let err = parse_header(text, &strict).unwrap_err();
        assert!(matches!(err, SddsError::UnknownKeyword { .. }));
    }

    #[test]
    fn test_header_errors() {
        let config = DatasetConfig::default();
        let err = parse_header("not sdds\n", &config).unwrap_err();
        assert!(matches!(err, SddsError::SchemaSyntax { line: 1, .. }));

        let err = parse_header("SDDS1\n&column name=x, type=double, &end\n", &config).unwrap_err();
        assert!(err.to_string().contains("missing &data"));

        let err = parse_header("SDDS1\n&column name=x, type=cplx, &end\n&data mode=ascii, &end\n", &config)
            .unwrap_err();
        assert!(matches!(err, SddsError::InvalidAttribute { .. }));

        let err = parse_header(
            "SDDS1\n&column name=x, type=double, &end\n&column name=x, type=long, &end\n&data mode=ascii, &end\n",
            &config,
        )
        .unwrap_err();
        assert!(matches!(err, SddsError::DuplicateName { .. }));

        let err = parse_header("SDDS1\n&column type=double, &end\n&data mode=ascii, &end\n", &config)
            .unwrap_err();
        assert!(matches!(err, SddsError::SchemaSyntax { line: 2, .. }));

        let err = parse_header("SDDS1\n&bogus a=1, &end\n&data mode=ascii, &end\n", &config).unwrap_err();
        assert!(matches!(err, SddsError::SchemaSyntax { .. }));
    }

    #[test]
    fn test_ignored_blocks() {
        let text = "SDDS1\n&associate filename=x, &end\n&data mode=ascii, &end\n";
        let header = parse_header(text, &DatasetConfig::default()).unwrap();
        assert!(header.schema.columns().is_empty());
        assert_eq!(header.schema.data_mode().encoding, Encoding::Ascii);
    }
}
