// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! Query command - print the schema of a dataset.

use std::fmt::Write as _;

use clap::{Args, ValueEnum};
use serde::Serialize;

use crate::common::Result;
use sdds::{
    find_by_pattern, DataMode, DatasetConfig, Description, Encoding, FieldDef, FieldKind,
    ReaderBuilder, Schema, Target,
};

/// Field kinds selectable on the command line.
#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum KindArg {
    Parameter,
    Array,
    Column,
}

impl From<KindArg> for FieldKind {
    fn from(kind: KindArg) -> Self {
        match kind {
            KindArg::Parameter => FieldKind::Parameter,
            KindArg::Array => FieldKind::Array,
            KindArg::Column => FieldKind::Column,
        }
    }
}

/// Print description, fields and data mode.
#[derive(Args, Clone, Debug)]
pub struct QueryCmd {
    /// Input file, or - for stdin
    #[arg(value_name = "FILE")]
    input: String,

    /// Only list fields of these kinds
    #[arg(long, value_enum, value_delimiter = ',')]
    kind: Vec<KindArg>,

    /// Only list fields whose names match this wildcard
    #[arg(long = "match", value_name = "PATTERN", default_value = "*")]
    pattern: String,

    /// Print JSON instead of text
    #[arg(long)]
    json: bool,
}

#[derive(Serialize)]
struct Summary<'a> {
    version: u32,
    description: &'a Description,
    data_mode: &'a DataMode,
    parameters: Vec<&'a FieldDef>,
    arrays: Vec<&'a FieldDef>,
    columns: Vec<&'a FieldDef>,
}

impl QueryCmd {
    pub fn run(self, config: DatasetConfig) -> Result<()> {
        let reader = ReaderBuilder::new()
            .target(Target::parse(&self.input))
            .config(config)
            .build()?;
        let schema = reader.schema();
        let kinds: Vec<FieldKind> = if self.kind.is_empty() {
            FieldKind::ALL.to_vec()
        } else {
            self.kind.iter().copied().map(FieldKind::from).collect()
        };
        let summary = Summary {
            version: reader.version(),
            description: schema.description(),
            data_mode: schema.data_mode(),
            parameters: pick(schema, &kinds, FieldKind::Parameter, &self.pattern)?,
            arrays: pick(schema, &kinds, FieldKind::Array, &self.pattern)?,
            columns: pick(schema, &kinds, FieldKind::Column, &self.pattern)?,
        };

        if self.json {
            println!("{}", serde_json::to_string_pretty(&summary)?);
        } else {
            print!("{}", render_text(&self.input, schema, &summary));
        }
        Ok(())
    }
}

fn pick<'a>(
    schema: &'a Schema,
    kinds: &[FieldKind],
    kind: FieldKind,
    pattern: &str,
) -> Result<Vec<&'a FieldDef>> {
    if !kinds.contains(&kind) {
        return Ok(Vec::new());
    }
    let names = find_by_pattern(schema, kind, pattern)?;
    Ok(schema
        .fields(kind)
        .iter()
        .filter(|def| names.contains(&def.name.as_str()))
        .collect())
}

fn render_text(name: &str, schema: &Schema, summary: &Summary<'_>) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "file {name} is SDDS{}", summary.version);
    if let Some(text) = &summary.description.text {
        let _ = writeln!(out, "description: {text}");
    }
    if let Some(contents) = &summary.description.contents {
        let _ = writeln!(out, "contents: {contents}");
    }

    let mode = summary.data_mode;
    let _ = write!(out, "data mode: {}", mode.encoding);
    if mode.encoding == Encoding::Binary {
        let _ = write!(
            out,
            ", {}-endian, {}-major",
            mode.byte_order.as_str(),
            mode.major_order.as_str()
        );
    } else {
        if mode.no_row_counts {
            out.push_str(", no row counts");
        }
        if mode.lines_per_row > 1 {
            let _ = write!(out, ", {} lines per row", mode.lines_per_row);
        }
    }
    out.push('\n');

    let sections = [
        (FieldKind::Parameter, &summary.parameters),
        (FieldKind::Array, &summary.arrays),
        (FieldKind::Column, &summary.columns),
    ];
    for (kind, fields) in sections {
        let total = schema.fields(kind).len();
        if fields.is_empty() {
            continue;
        }
        let _ = writeln!(out, "\n{} of {total} {kind}s:", fields.len());
        let _ = writeln!(
            out,
            "{:<24} {:<12} {:<10} {:<14} description",
            "NAME", "TYPE", "UNITS", "FORMAT"
        );
        for def in fields {
            let mut ty = def.ty.as_str().to_string();
            if kind == FieldKind::Array {
                let _ = write!(ty, "[{}]", def.dimensions);
            }
            let _ = writeln!(
                out,
                "{:<24} {:<12} {:<10} {:<14} {}",
                def.name,
                ty,
                def.units.as_deref().unwrap_or(""),
                def.format(),
                def.description.as_deref().unwrap_or("")
            );
        }
    }
    out
}
