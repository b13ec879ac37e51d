// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! Convert command - re-encode a dataset, optionally selecting pages and fields.

use anyhow::bail;
use clap::Args;
use tracing::info;

use crate::common::{
    parse_pattern_match, parse_range_filter, select_fields, PatternMatch, Progress, RangeFilter,
    Result,
};
use sdds::{
    filter_rows, match_rows, ByteOrder, Compression, DatasetConfig, Description, Encoding,
    FieldKind, MajorOrder, ReadOutcome, ReaderBuilder, RowLogic, Target, WriterBuilder,
};

/// Re-encode a dataset.
#[derive(Args, Clone, Debug)]
pub struct ConvertCmd {
    /// Input file, or - for stdin
    #[arg(value_name = "INPUT")]
    input: String,

    /// Output file, or - for stdout
    #[arg(value_name = "OUTPUT")]
    output: String,

    /// Write ASCII pages
    #[arg(long, conflicts_with = "binary")]
    ascii: bool,

    /// Write binary pages
    #[arg(long)]
    binary: bool,

    /// Binary byte order (big, little)
    #[arg(long, value_name = "ORDER")]
    endian: Option<ByteOrder>,

    /// Binary column layout (row, column)
    #[arg(long, value_name = "ORDER")]
    major_order: Option<MajorOrder>,

    /// Output compression (none, gzip, xz); inferred from the name by default
    #[arg(long)]
    compression: Option<Compression>,

    /// Compression level 0-9
    #[arg(long)]
    level: Option<u32>,

    /// ASCII lines per row
    #[arg(long)]
    lines_per_row: Option<usize>,

    /// Omit ASCII row counts
    #[arg(long)]
    no_row_counts: bool,

    /// First page to copy (1-based)
    #[arg(long, default_value_t = 1)]
    from_page: usize,

    /// Last page to copy
    #[arg(long)]
    to_page: Option<usize>,

    /// Keep the readable rows of a damaged trailing page
    #[arg(long)]
    recover: bool,

    /// Keep every Nth row of each page
    #[arg(long, value_name = "N", conflicts_with = "last_rows")]
    sparse: Option<usize>,

    /// First row kept by --sparse
    #[arg(long, value_name = "ROW", default_value_t = 0, requires = "sparse")]
    sparse_offset: usize,

    /// Keep only the last N rows of each page
    #[arg(long, value_name = "N")]
    last_rows: Option<usize>,

    /// Keep rows whose column value lies in a range (repeatable)
    #[arg(long, value_name = "NAME=LOWER,UPPER", value_parser = parse_range_filter)]
    filter: Vec<RangeFilter>,

    /// Keep rows whose string column matches a wildcard (repeatable)
    #[arg(long = "match", value_name = "NAME=PATTERN", value_parser = parse_pattern_match)]
    matches: Vec<PatternMatch>,

    /// Keep only matching columns
    #[arg(long, value_delimiter = ',', value_name = "PATTERNS")]
    retain_columns: Vec<String>,

    /// Drop matching columns
    #[arg(long, value_delimiter = ',', value_name = "PATTERNS")]
    delete_columns: Vec<String>,

    /// Keep only matching parameters
    #[arg(long, value_delimiter = ',', value_name = "PATTERNS")]
    retain_parameters: Vec<String>,

    /// Drop matching parameters
    #[arg(long, value_delimiter = ',', value_name = "PATTERNS")]
    delete_parameters: Vec<String>,

    /// Keep only matching arrays
    #[arg(long, value_delimiter = ',', value_name = "PATTERNS")]
    retain_arrays: Vec<String>,

    /// Drop matching arrays
    #[arg(long, value_delimiter = ',', value_name = "PATTERNS")]
    delete_arrays: Vec<String>,

    /// Replace the description text
    #[arg(long)]
    description: Option<String>,

    /// Replace the description contents
    #[arg(long)]
    contents: Option<String>,
}

impl ConvertCmd {
    pub fn run(self, config: DatasetConfig) -> Result<()> {
        let input = Target::parse(&self.input);
        let output = Target::parse(&self.output);
        if !input.is_pipe() && input == output {
            bail!("input and output must be different files");
        }
        if self.to_page.is_some_and(|to| to < self.from_page) {
            bail!("--to-page must not be before --from-page");
        }

        let config = if self.recover {
            config.with_recover(true)
        } else {
            config
        };
        let mut reader_builder = ReaderBuilder::new().target(input).config(config.clone());
        if let Some(interval) = self.sparse {
            reader_builder = reader_builder.sparse(interval, self.sparse_offset);
        }
        if let Some(rows) = self.last_rows {
            reader_builder = reader_builder.last_rows(rows);
        }
        let mut reader = reader_builder.build()?;

        let mut schema = reader.schema().clone();
        let selections = [
            (FieldKind::Parameter, &self.retain_parameters, &self.delete_parameters),
            (FieldKind::Array, &self.retain_arrays, &self.delete_arrays),
            (FieldKind::Column, &self.retain_columns, &self.delete_columns),
        ]
        .into_iter()
        .map(|(kind, retain, delete)| {
            select_fields(reader.schema(), kind, retain, delete).map(|indices| (kind, indices))
        })
        .collect::<Result<Vec<_>>>()?;
        for (kind, indices) in &selections {
            schema = schema.select(*kind, indices);
        }
        if self.description.is_some() || self.contents.is_some() {
            let current = schema.description().clone();
            schema.set_description(Description {
                text: self.description.clone().or(current.text),
                contents: self.contents.clone().or(current.contents),
            });
        }

        let mut builder = WriterBuilder::new()
            .target(output)
            .schema(schema)
            .config(config);
        if self.ascii {
            builder = builder.encoding(Encoding::Ascii);
        }
        if self.binary {
            builder = builder.encoding(Encoding::Binary);
        }
        if let Some(order) = self.endian {
            builder = builder.byte_order(order);
        }
        if let Some(order) = self.major_order {
            builder = builder.major_order(order);
        }
        if let Some(compression) = self.compression {
            builder = builder.compression(compression);
        }
        if let Some(level) = self.level {
            builder = builder.compression_level(level);
        }
        if let Some(lines) = self.lines_per_row {
            builder = builder.lines_per_row(lines);
        }
        if self.no_row_counts {
            builder = builder.no_row_counts(true);
        }
        let mut writer = builder.build()?;
        writer.write_layout()?;

        let progress = Progress::spinner("converting");
        let mut copied = 0usize;
        loop {
            let number = match reader.read_next_page()? {
                ReadOutcome::End => break,
                ReadOutcome::Page(number) | ReadOutcome::Truncated(number) => number,
            };
            if number < self.from_page {
                continue;
            }
            if self.to_page.is_some_and(|to| number > to) {
                break;
            }
            let Some(mut page) = reader.take_page() else {
                continue;
            };
            for filter in &self.filter {
                filter_rows(
                    reader.schema(),
                    &mut page,
                    &filter.column,
                    filter.lower,
                    filter.upper,
                    RowLogic::And,
                    false,
                )?;
            }
            for m in &self.matches {
                match_rows(
                    reader.schema(),
                    &mut page,
                    &m.column,
                    &m.pattern,
                    RowLogic::And,
                    false,
                )?;
            }
            for (kind, indices) in &selections {
                page.retain(*kind, indices);
            }
            writer.write_page(page)?;
            copied += 1;
            progress.inc();
        }
        writer.close()?;
        progress.finish_with_message(format!("{copied} copied"));
        info!(input = %self.input, output = %self.output, pages = copied, "converted");
        Ok(())
    }
}
