// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! ASCII page encoding.
//!
//! A page is written as:
//!
//! ```text
//! ! page number 1
//! 10                      <- one line per non-fixed parameter
//! FirstPage
//! 2 3                     <- per array: extents, then the elements
//!  1.0 2.0 3.0 4.0 5.0 6.0
//! 5                       <- row count, unless no_row_counts=1
//! 1 1.0 "a b"             <- one row per line (or lines_per_row lines)
//! ```
//!
//! Lines starting with `!` are comments. Tokens are separated by
//! whitespace or by the declared delimiter and may be double-quoted.
//! Escapes `\"`, `\\` and `\ooo` (octal) are understood in every token.
//! Each row starts on a new line, but its tokens may continue onto the
//! following lines.

use std::io::{BufRead, Write};
use std::ops::Range;

use tracing::trace;

use super::{Fault, FaultResult, PageCodec, PageContext, PageRead};
use crate::core::value::text_from_bytes;
use crate::core::{ColumnData, FormatSpec, Result, SddsError, SddsType, Value};
use crate::dataset::page::element_count;
use crate::dataset::{ArrayData, Page};
use crate::schema::{DataMode, FieldDef, Schema};

/// Array elements written per line.
const ARRAY_VALUES_PER_LINE: usize = 8;

/// Width of a row count that may be rewritten later; fits any `u64`.
const ROW_COUNT_WIDTH: usize = 20;

/// Text codec for one data mode.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AsciiCodec {
    no_row_counts: bool,
    lines_per_row: usize,
    additional_header_lines: usize,
    delimiter: Option<char>,
}

impl AsciiCodec {
    /// Create a codec from the layout options of `mode`.
    pub fn new(mode: &DataMode) -> Self {
        Self {
            no_row_counts: mode.no_row_counts,
            lines_per_row: mode.lines_per_row.max(1),
            additional_header_lines: mode.additional_header_lines,
            delimiter: mode.delimiter,
        }
    }
}

impl PageCodec for AsciiCodec {
    fn read_page(&self, input: &mut dyn BufRead, schema: &Schema, ctx: &PageContext<'_>) -> PageRead {
        PageDecoder {
            codec: self,
            schema,
            ctx,
            src: TextSource::new(input, self.delimiter),
        }
        .decode()
    }

    fn write_page(&self, out: &mut dyn Write, schema: &Schema, page: &Page) -> Result<()> {
        page.validate(schema)?;
        // Rendered in full first so a rejected value leaves no partial page.
        let mut text = Vec::new();
        self.encode(&mut text, schema, page)?;
        out.write_all(&text)
            .map_err(|e| SddsError::io("writing ascii page", &e))
    }

    fn encode_head(
        &self,
        out: &mut Vec<u8>,
        schema: &Schema,
        page: &Page,
        patchable: bool,
    ) -> Result<Option<usize>> {
        self.head(out, schema, page, patchable)
    }

    fn encode_rows(
        &self,
        out: &mut Vec<u8>,
        schema: &Schema,
        page: &Page,
        range: Range<usize>,
    ) -> Result<()> {
        self.rows(out, schema, page, range)
    }

    fn encode_tail(&self, out: &mut Vec<u8>) -> Result<()> {
        self.tail(out)
    }

    fn row_count_field(&self, rows: usize) -> Result<Vec<u8>> {
        Ok(row_count_line(rows))
    }

    fn skip_preamble(&self, input: &mut dyn BufRead, _schema: &Schema) -> Result<()> {
        let mut buf = Vec::new();
        for _ in 0..self.additional_header_lines {
            buf.clear();
            let n = input
                .read_until(b'\n', &mut buf)
                .map_err(|e| SddsError::io("skipping additional header lines", &e))?;
            if n == 0 {
                break;
            }
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Decoding
// ---------------------------------------------------------------------------

fn is_comment(line: &str) -> bool {
    line.trim_start().starts_with('!')
}

/// Line and token source over one page.
struct TextSource<'a> {
    input: &'a mut dyn BufRead,
    buf: Vec<u8>,
    pending: Option<String>,
    line: String,
    pos: usize,
    delimiter: Option<char>,
}

impl<'a> TextSource<'a> {
    fn new(input: &'a mut dyn BufRead, delimiter: Option<char>) -> Self {
        Self {
            input,
            buf: Vec::new(),
            pending: None,
            line: String::new(),
            pos: 0,
            delimiter,
        }
    }

    fn read_line(&mut self) -> FaultResult<Option<String>> {
        if let Some(line) = self.pending.take() {
            return Ok(Some(line));
        }
        self.buf.clear();
        if self.input.read_until(b'\n', &mut self.buf)? == 0 {
            return Ok(None);
        }
        let text = text_from_bytes(std::mem::take(&mut self.buf)).map_err(Fault::Invalid)?;
        Ok(Some(text.trim_end_matches(['\n', '\r']).to_string()))
    }

    fn unread(&mut self, line: String) {
        self.pending = Some(line);
    }

    /// Next line that is not a comment; blank lines are skipped when asked.
    fn significant_line(&mut self, skip_blank: bool) -> FaultResult<Option<String>> {
        while let Some(line) = self.read_line()? {
            if is_comment(&line) || (skip_blank && line.trim().is_empty()) {
                continue;
            }
            return Ok(Some(line));
        }
        Ok(None)
    }

    /// Make `line` the current token line.
    fn start_line(&mut self, line: String) {
        self.line = line;
        self.pos = 0;
    }

    /// Discard the rest of the current line so the next token starts a new one.
    fn begin_record(&mut self) {
        self.line.clear();
        self.pos = 0;
    }

    fn skip_space(&mut self) {
        let delimiter = self.delimiter;
        let rest = &self.line[self.pos..];
        let trimmed = rest.trim_start_matches(|c: char| c.is_whitespace() && Some(c) != delimiter);
        self.pos += rest.len() - trimmed.len();
    }

    /// Consume the separator after a token: the delimiter (with any blanks
    /// before it) or a single blank.
    fn skip_separator(&mut self) {
        let rest = &self.line[self.pos..];
        match self.delimiter {
            Some(d) => {
                let after = rest.trim_start_matches(|c: char| c.is_whitespace() && c != d);
                if after.starts_with(d) {
                    self.pos += rest.len() - after.len() + d.len_utf8();
                }
            }
            None => {
                if let Some(c) = rest.chars().next().filter(|c| c.is_whitespace()) {
                    self.pos += c.len_utf8();
                }
            }
        }
    }

    /// Next raw (still escaped) token on the current line.
    ///
    /// A fixed-width field is exactly `width` characters starting at the
    /// current column, so leading blanks belong to the field.
    fn token(&mut self, width: Option<usize>) -> FaultResult<Option<String>> {
        if width.is_none() {
            self.skip_space();
        }
        let rest = &self.line[self.pos..];
        if rest.trim().is_empty() {
            self.pos = self.line.len();
            return Ok(None);
        }
        if width.is_none() && self.delimiter.is_none() && rest.starts_with('!') {
            self.pos = self.line.len();
            return Ok(None);
        }

        let (raw, used) = match width {
            Some(width) => {
                let end = rest.char_indices().nth(width).map_or(rest.len(), |(i, _)| i);
                let field = rest[..end].trim();
                let raw = if field.starts_with('"') {
                    quoted(field)?.0
                } else {
                    field.to_string()
                };
                (raw, end)
            }
            None if rest.starts_with('"') => quoted(rest)?,
            None => {
                let delimiter = self.delimiter;
                let end = rest
                    .find(|c: char| match delimiter {
                        Some(d) => c == d,
                        None => c.is_whitespace(),
                    })
                    .unwrap_or(rest.len());
                (rest[..end].trim().to_string(), end)
            }
        };
        self.pos += used;
        self.skip_separator();
        Ok(Some(raw))
    }

    /// Next token, continuing onto following lines; a blank line is an
    /// error when it would end the page.
    fn token_spanning(&mut self, width: Option<usize>, blank_ends_page: bool) -> FaultResult<String> {
        loop {
            if let Some(token) = self.token(width)? {
                return Ok(token);
            }
            match self.read_line()? {
                None => return Err(Fault::Eof),
                Some(line) if is_comment(&line) => continue,
                Some(line) if blank_ends_page && line.trim().is_empty() => {
                    return Err(Fault::Invalid("blank line inside a row".to_string()))
                }
                Some(line) => self.start_line(line),
            }
        }
    }
}

/// Split a leading double-quoted token into its raw inner text and the
/// number of bytes consumed.
fn quoted(text: &str) -> FaultResult<(String, usize)> {
    let bytes = text.as_bytes();
    let mut i = 1;
    while i < bytes.len() {
        match bytes[i] {
            b'\\' => i += 2,
            b'"' => return Ok((text[1..i].to_string(), i + 1)),
            _ => i += 1,
        }
    }
    Err(Fault::Invalid("unterminated quoted string".to_string()))
}

/// Resolve `\"`, `\\` and `\ooo`; other backslashes stay literal.
pub(crate) fn unescape_bytes(raw: &str) -> Vec<u8> {
    let bytes = raw.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'\\' && i + 1 < bytes.len() {
            let next = bytes[i + 1];
            if next == b'"' || next == b'\\' {
                out.push(next);
                i += 2;
                continue;
            }
            let digits = bytes[i + 1..]
                .iter()
                .take(3)
                .take_while(|d| (b'0'..=b'7').contains(*d))
                .count();
            if digits > 0 {
                let code = bytes[i + 1..i + 1 + digits]
                    .iter()
                    .fold(0u16, |acc, d| acc * 8 + u16::from(d - b'0'));
                if let Ok(byte) = u8::try_from(code) {
                    out.push(byte);
                    i += 1 + digits;
                    continue;
                }
            }
        }
        out.push(bytes[i]);
        i += 1;
    }
    out
}

fn parse_token(ty: SddsType, raw: &str) -> FaultResult<Value> {
    match ty {
        SddsType::String => text_from_bytes(unescape_bytes(raw))
            .map(Value::String)
            .map_err(Fault::Invalid),
        SddsType::Character => unescape_bytes(raw)
            .first()
            .map(|&c| Value::Character(c))
            .ok_or_else(|| Fault::Invalid("empty character value".to_string())),
        _ => Value::parse_as(ty, raw.trim()).map_err(Fault::Invalid),
    }
}

fn store(column: &mut ColumnData, value: Value) -> FaultResult<()> {
    column
        .push(value)
        .map_err(|v| Fault::Invalid(format!("cannot store a {} value", v.type_name())))
}

struct PageDecoder<'a, 'b> {
    codec: &'a AsciiCodec,
    schema: &'a Schema,
    ctx: &'a PageContext<'a>,
    src: TextSource<'b>,
}

impl PageDecoder<'_, '_> {
    fn decode(mut self) -> PageRead {
        let schema = self.schema;
        let mut page = Page::new(schema, self.ctx.number);
        let bare = schema.arrays().is_empty()
            && schema.parameters().iter().all(|p| p.fixed_value.is_some());

        // With no_row_counts and nothing before the rows, a blank first
        // line is an empty page rather than padding.
        let empty_page_marker = self.codec.no_row_counts && bare;
        match self.src.significant_line(!empty_page_marker) {
            Ok(None) => return PageRead::End,
            Ok(Some(line)) if empty_page_marker && line.trim().is_empty() => {
                return PageRead::Page(page)
            }
            Ok(Some(line)) => self.src.unread(line),
            Err(fault) => return PageRead::partial(page, 0, self.ctx.error("page start", 0, fault)),
        }

        for (i, def) in schema.parameters().iter().enumerate() {
            if def.fixed_value.is_some() {
                continue;
            }
            match self.parameter(def) {
                Ok(value) => page.parameters[i] = value,
                Err(fault) => return PageRead::partial(page, 0, self.ctx.error(&def.name, 0, fault)),
            }
        }

        for (i, def) in schema.arrays().iter().enumerate() {
            match self.array(def) {
                Ok(array) => page.arrays[i] = array,
                Err((element, fault)) => {
                    return PageRead::partial(page, 0, self.ctx.error(&def.name, element, fault))
                }
            }
        }

        let rows = if self.codec.no_row_counts {
            None
        } else {
            match self.row_count() {
                Ok(rows) => Some(rows),
                Err(fault) => return PageRead::partial(page, 0, self.ctx.error("row count", 0, fault)),
            }
        };
        trace!(page = self.ctx.number, ?rows, "ascii page");

        let columns = schema.columns();
        if columns.is_empty() {
            page.rows = rows.unwrap_or(0);
            return PageRead::Page(page);
        }

        let mut row = 0usize;
        loop {
            match rows {
                Some(rows) if row == rows => break,
                Some(_) => self.src.begin_record(),
                None => match self.src.significant_line(false) {
                    Ok(Some(line)) if !line.trim().is_empty() => self.src.start_line(line),
                    Ok(_) => break,
                    Err(fault) => {
                        let cause = self.ctx.error(&columns[0].name, row, fault);
                        return PageRead::partial(page, row, cause);
                    }
                },
            }
            for (j, def) in columns.iter().enumerate() {
                let result = self
                    .src
                    .token_spanning(def.fixed_width(), self.codec.no_row_counts)
                    .and_then(|raw| parse_token(def.ty, &raw))
                    .and_then(|value| store(&mut page.columns[j], value));
                if let Err(fault) = result {
                    let cause = self.ctx.error(&def.name, row, fault);
                    return PageRead::partial(page, row, cause);
                }
            }
            row += 1;
        }
        page.rows = row;
        PageRead::Page(page)
    }

    fn parameter(&mut self, def: &FieldDef) -> FaultResult<Value> {
        let line = self.src.significant_line(true)?.ok_or(Fault::Eof)?;
        let trimmed = line.trim();
        if def.ty == SddsType::String && !trimmed.starts_with('"') {
            return parse_token(def.ty, trimmed);
        }
        self.src.start_line(line);
        let raw = self
            .src
            .token(def.fixed_width())?
            .ok_or_else(|| Fault::Invalid("missing parameter value".to_string()))?;
        parse_token(def.ty, &raw)
    }

    fn array(&mut self, def: &FieldDef) -> std::result::Result<ArrayData, (usize, Fault)> {
        let line = self
            .src
            .significant_line(true)
            .map_err(|f| (0usize, f))?
            .ok_or((0usize, Fault::Eof))?;
        let delimiter = self.codec.delimiter;
        let dims = line
            .split(|c: char| c.is_whitespace() || Some(c) == delimiter)
            .filter(|t| !t.is_empty())
            .take(def.dimensions)
            .map(|t| {
                t.parse::<usize>()
                    .map_err(|_| (0usize, Fault::Invalid(format!("invalid array extent '{t}'"))))
            })
            .collect::<std::result::Result<Vec<_>, _>>()?;
        if dims.len() != def.dimensions {
            return Err((
                0,
                Fault::Invalid(format!(
                    "expected {} array extents, found {}",
                    def.dimensions,
                    dims.len()
                )),
            ));
        }
        let count = element_count(&dims)
            .ok_or_else(|| (0usize, Fault::Invalid(format!("array extents {dims:?} overflow"))))?;

        self.src.begin_record();
        let mut values = ColumnData::new(def.ty);
        for element in 0..count {
            self.src
                .token_spanning(def.fixed_width(), false)
                .and_then(|raw| parse_token(def.ty, &raw))
                .and_then(|value| store(&mut values, value))
                .map_err(|fault| (element, fault))?;
        }
        Ok(ArrayData::from_parts(dims, values))
    }

    fn row_count(&mut self) -> FaultResult<usize> {
        let line = self.src.significant_line(true)?.ok_or(Fault::Eof)?;
        self.src.start_line(line);
        let raw = self
            .src
            .token(None)?
            .ok_or_else(|| Fault::Invalid("missing row count".to_string()))?;
        raw.parse::<usize>()
            .map_err(|_| Fault::Invalid(format!("invalid row count '{raw}'")))
    }
}

// ---------------------------------------------------------------------------
// Encoding
// ---------------------------------------------------------------------------

/// Escape quotes, backslashes and control characters.
fn escape_text(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '"' => escaped.push_str("\\\""),
            '\\' => escaped.push_str("\\\\"),
            c if c.is_ascii_control() => escaped.push_str(&format!("\\{:03o}", c as u32)),
            c => escaped.push(c),
        }
    }
    escaped
}

/// Escape a string value and quote it when it would not survive as a bare token.
pub(crate) fn quote_string(text: &str, delimiter: Option<char>) -> String {
    let escaped = escape_text(text);
    let needs_quotes = escaped.is_empty()
        || escaped
            .chars()
            .any(|c| c.is_whitespace() || c == '!' || Some(c) == delimiter);
    if needs_quotes {
        format!("\"{escaped}\"")
    } else {
        escaped
    }
}

/// Render a character, octal-escaping anything that is not a plain graphic.
pub(crate) fn render_char(c: u8, delimiter: Option<char>) -> String {
    let plain = c.is_ascii_graphic()
        && !matches!(c, b'"' | b'\\' | b'!')
        && Some(c as char) != delimiter;
    if plain {
        (c as char).to_string()
    } else {
        format!("\\{c:03o}")
    }
}

struct FieldWriter<'a> {
    def: &'a FieldDef,
    spec: FormatSpec,
    delimiter: Option<char>,
}

impl<'a> FieldWriter<'a> {
    fn new(def: &'a FieldDef, delimiter: Option<char>) -> Result<Self> {
        let spec = FormatSpec::for_type(def.format(), def.ty)?;
        Ok(Self {
            def,
            spec,
            delimiter,
        })
    }

    /// Render one value; a value wider than `field_length` is an error.
    fn render(&self, value: &Value) -> Result<String> {
        let width = self.def.fixed_width();
        let text = match value {
            // The field width delimits fixed-width strings.
            Value::String(s) if width.is_some() && !s.is_empty() => escape_text(s),
            Value::String(s) => quote_string(s, self.delimiter),
            Value::Character(c) => render_char(*c, self.delimiter),
            other => self.spec.format(other).trim().to_string(),
        };
        match width {
            Some(width) if text.chars().count() > width => Err(SddsError::invalid_attribute(
                &self.def.name,
                "field_length",
                format!("'{text}' needs {} characters, only {width} allowed", text.chars().count()),
            )),
            Some(width) => Ok(format!("{text:<width$}")),
            None => Ok(text),
        }
    }
}

impl AsciiCodec {
    fn separator(&self) -> String {
        self.delimiter.unwrap_or(' ').to_string()
    }

    fn encode(&self, out: &mut Vec<u8>, schema: &Schema, page: &Page) -> Result<()> {
        self.head(out, schema, page, false)?;
        self.rows(out, schema, page, 0..page.rows)?;
        self.tail(out)
    }

    fn head(
        &self,
        out: &mut Vec<u8>,
        schema: &Schema,
        page: &Page,
        patchable: bool,
    ) -> Result<Option<usize>> {
        writeln!(out, "! page number {}", page.number)?;

        for (def, value) in schema.parameters().iter().zip(&page.parameters) {
            if def.fixed_value.is_some() {
                continue;
            }
            let text = match value {
                Value::String(s) => quote_string(s, None),
                other => FieldWriter::new(def, None)?.render(other)?,
            };
            writeln!(out, "{text}")?;
        }

        for (def, array) in schema.arrays().iter().zip(&page.arrays) {
            let dims: Vec<String> = array.dims().iter().map(|d| d.to_string()).collect();
            writeln!(out, "{}", dims.join(" "))?;
            let writer = FieldWriter::new(def, self.delimiter)?;
            let values = array
                .values()
                .values()
                .map(|v| writer.render(&v))
                .collect::<Result<Vec<_>>>()?;
            for chunk in values.chunks(ARRAY_VALUES_PER_LINE) {
                writeln!(out, "{}", chunk.join(self.separator().as_str()))?;
            }
        }

        if self.no_row_counts {
            return Ok(None);
        }
        if patchable {
            let at = out.len();
            out.extend_from_slice(&row_count_line(page.rows));
            Ok(Some(at))
        } else {
            writeln!(out, "{}", page.rows)?;
            Ok(None)
        }
    }

    fn rows(
        &self,
        out: &mut Vec<u8>,
        schema: &Schema,
        page: &Page,
        range: Range<usize>,
    ) -> Result<()> {
        let columns = schema.columns();
        if columns.is_empty() {
            return Ok(());
        }
        let writers = columns
            .iter()
            .map(|def| FieldWriter::new(def, self.delimiter))
            .collect::<Result<Vec<_>>>()?;
        let per_line = columns.len().div_ceil(self.lines_per_row);
        let separator = self.separator();
        let mut fields = Vec::with_capacity(columns.len());
        for row in range {
            fields.clear();
            for (writer, column) in writers.iter().zip(&page.columns) {
                let value = column.get(row).ok_or_else(|| {
                    SddsError::data_format(
                        "ascii output",
                        page.number,
                        &writer.def.name,
                        row,
                        "row index out of range",
                    )
                })?;
                fields.push(writer.render(&value)?);
            }
            for line in fields.chunks(per_line) {
                writeln!(out, "{}", line.join(separator.as_str()))?;
            }
        }
        Ok(())
    }

    fn tail(&self, out: &mut Vec<u8>) -> Result<()> {
        if self.no_row_counts {
            writeln!(out)?;
        }
        Ok(())
    }
}

/// Row count padded to a fixed width so it can be rewritten in place.
fn row_count_line(rows: usize) -> Vec<u8> {
    format!("{rows:>ROW_COUNT_WIDTH$}\n").into_bytes()
}
