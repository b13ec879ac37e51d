// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! Header serialization.

use std::fmt::Write as _;

use crate::core::{Encoding, MajorOrder};
use crate::schema::{FieldDef, FieldKind, Schema};

impl Schema {
    /// Smallest file version that covers the types and layout in use.
    pub fn required_version(&self) -> u32 {
        let types = FieldKind::ALL
            .iter()
            .flat_map(|&kind| self.fields(kind))
            .map(|f| f.ty.min_version())
            .max()
            .unwrap_or(1);
        let layout = match self.data_mode().major_order {
            MajorOrder::Column => 4,
            MajorOrder::Row => 1,
        };
        types.max(layout)
    }

    /// Render the textual header, ending with the `&data` line.
    pub fn serialize_header(&self) -> String {
        let mut out = String::new();
        let mode = self.data_mode();
        let _ = writeln!(out, "SDDS{}", self.required_version());
        if mode.encoding == Encoding::Binary {
            let _ = writeln!(out, "!# {}-endian", mode.byte_order.as_str());
        }

        let description = self.description();
        if !description.is_empty() {
            out.push_str("&description ");
            if let Some(text) = &description.text {
                let _ = write!(out, "text={}, ", quote(text));
            }
            if let Some(contents) = &description.contents {
                let _ = write!(out, "contents={}, ", quote(contents));
            }
            out.push_str("&end\n");
        }

        for kind in FieldKind::ALL {
            for field in self.fields(kind) {
                write_field(&mut out, kind, field);
            }
        }

        let _ = write!(out, "&data mode={}, ", mode.encoding.as_str());
        if mode.encoding == Encoding::Binary {
            let _ = write!(out, "endian={}, ", mode.byte_order.as_str());
            if mode.major_order == MajorOrder::Column {
                out.push_str("column_major_order=1, ");
            }
        } else {
            if mode.no_row_counts {
                out.push_str("no_row_counts=1, ");
            }
            if mode.lines_per_row > 1 {
                let _ = write!(out, "lines_per_row={}, ", mode.lines_per_row);
            }
            if mode.additional_header_lines > 0 {
                let _ = write!(
                    out,
                    "additional_header_lines={}, ",
                    mode.additional_header_lines
                );
            }
            if let Some(delimiter) = mode.delimiter {
                let text = if delimiter == '\t' {
                    "\\t".to_string()
                } else {
                    delimiter.to_string()
                };
                let _ = write!(out, "delimiter={}, ", quote(&text));
            }
        }
        out.push_str("&end\n");
        out
    }
}

fn write_field(out: &mut String, kind: FieldKind, field: &FieldDef) {
    let _ = write!(out, "&{} name={}, ", kind.as_str(), quote(&field.name));
    let optional = [
        ("symbol", &field.symbol),
        ("units", &field.units),
        ("description", &field.description),
        ("format_string", &field.format_string),
    ];
    for (key, value) in optional {
        if let Some(value) = value {
            let _ = write!(out, "{key}={}, ", quote(value));
        }
    }
    let _ = write!(out, "type={}, ", field.ty.as_str());
    match kind {
        FieldKind::Parameter => {
            if let Some(fixed) = &field.fixed_value {
                let _ = write!(out, "fixed_value={}, ", quote(fixed));
            }
        }
        FieldKind::Array => {
            if field.field_length != 0 {
                let _ = write!(out, "field_length={}, ", field.field_length);
            }
            if let Some(group) = &field.group_name {
                let _ = write!(out, "group_name={}, ", quote(group));
            }
            let _ = write!(out, "dimensions={}, ", field.dimensions);
        }
        FieldKind::Column => {
            if field.field_length != 0 {
                let _ = write!(out, "field_length={}, ", field.field_length);
            }
        }
    }
    out.push_str("&end\n");
}

/// Quote a namelist value when it would not survive as a bare token.
fn quote(value: &str) -> String {
    let needs_quotes = value.is_empty()
        || value
            .chars()
            .any(|c| c.is_whitespace() || matches!(c, ',' | '&' | '"' | '\\' | '=' | '!'));
    if !needs_quotes {
        return value.to_string();
    }
    let mut out = String::with_capacity(value.len() + 2);
    out.push('"');
    for c in value.chars() {
        if matches!(c, '"' | '\\') {
            out.push('\\');
        }
        out.push(c);
    }
    out.push('"');
    out
}
