// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! Builder pattern for opening readers and writers.
//!
//! ```rust,no_run
//! use sdds::{ByteOrder, Encoding, Schema, WriterBuilder};
//!
//! let writer = WriterBuilder::new()
//!     .target("out.sdds.xz")
//!     .schema(Schema::new())
//!     .encoding(Encoding::Binary)
//!     .byte_order(ByteOrder::Big)
//!     .build()?;
//! # Ok::<(), sdds::SddsError>(())
//! ```

use std::io::{Read, Write};

use super::{DatasetConfig, DatasetReader, DatasetWriter, RowSampling, WriteMode};
use crate::core::{ByteOrder, Encoding, MajorOrder, Result, SddsError};
use crate::io::{detect_from_extension, Compression, InputChannel, OutputChannel, Target};
use crate::schema::Schema;

/// Configuration for opening a reader.
#[derive(Debug, Clone, Default)]
pub struct ReaderConfig {
    /// File path or pipe
    pub target: Option<Target>,
    /// Shared behavior switches
    pub dataset: DatasetConfig,
    /// Rows kept from each page
    pub sampling: RowSampling,
}

/// Builder for [`DatasetReader`].
#[derive(Debug, Clone, Default)]
pub struct ReaderBuilder {
    config: ReaderConfig,
}

impl ReaderBuilder {
    /// Create a new builder with default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the file path, or `-` for stdin.
    pub fn target(mut self, target: impl Into<Target>) -> Self {
        self.config.target = Some(target.into());
        self
    }

    /// Replace the dataset configuration.
    pub fn config(mut self, config: DatasetConfig) -> Self {
        self.config.dataset = config;
        self
    }

    /// Enable or disable recover mode.
    pub fn recover(mut self, recover: bool) -> Self {
        self.config.dataset.recover = recover;
        self
    }

    /// Keep every `interval`-th row starting at `offset`.
    pub fn sparse(mut self, interval: usize, offset: usize) -> Self {
        self.config.sampling = RowSampling::Sparse { interval, offset };
        self
    }

    /// Keep only the last `n` rows of each page.
    pub fn last_rows(mut self, n: usize) -> Self {
        self.config.sampling = RowSampling::LastRows(n);
        self
    }

    /// Build the reader.
    pub fn build(self) -> Result<DatasetReader> {
        let target = self.config.target.ok_or_else(|| {
            SddsError::invalid_attribute("ReaderBuilder", "target", "target is not set")
        })?;
        let channel = InputChannel::open(&target, self.config.dataset.buffer_size)?;
        let mut reader = DatasetReader::from_channel(channel, self.config.dataset)?;
        reader.set_sampling(self.config.sampling)?;
        Ok(reader)
    }

    /// Build a reader over an arbitrary byte source, ignoring the target.
    pub fn build_from_reader<R>(self, name: impl Into<String>, reader: R) -> Result<DatasetReader>
    where
        R: Read + Send + 'static,
    {
        let mut reader = DatasetReader::from_reader(name, reader, self.config.dataset)?;
        reader.set_sampling(self.config.sampling)?;
        Ok(reader)
    }
}

/// Configuration for opening a writer.
///
/// Layout fields left as `None` keep the value from the schema's data mode.
#[derive(Debug, Clone, Default)]
pub struct WriterConfig {
    /// File path or pipe
    pub target: Option<Target>,
    /// Fields and description of the new dataset
    pub schema: Option<Schema>,
    /// Shared behavior switches
    pub dataset: DatasetConfig,
    /// Truncate or append
    pub mode: WriteMode,
    pub encoding: Option<Encoding>,
    pub byte_order: Option<ByteOrder>,
    pub major_order: Option<MajorOrder>,
    pub no_row_counts: Option<bool>,
    pub lines_per_row: Option<usize>,
    pub delimiter: Option<char>,
    /// Explicit compression; inferred from the file name when unset
    pub compression: Option<Compression>,
    /// Level applied to explicit or inferred compression
    pub compression_level: Option<u32>,
}

/// Builder for [`DatasetWriter`].
#[derive(Debug, Clone, Default)]
pub struct WriterBuilder {
    config: WriterConfig,
}

impl WriterBuilder {
    /// Create a new builder with default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the file path, or `-` for stdout.
    pub fn target(mut self, target: impl Into<Target>) -> Self {
        self.config.target = Some(target.into());
        self
    }

    /// Set the schema.
    pub fn schema(mut self, schema: Schema) -> Self {
        self.config.schema = Some(schema);
        self
    }

    /// Replace the dataset configuration.
    pub fn config(mut self, config: DatasetConfig) -> Self {
        self.config.dataset = config;
        self
    }

    /// Truncate (default), append pages or append to the last page.
    pub fn mode(mut self, mode: WriteMode) -> Self {
        self.config.mode = mode;
        self
    }

    /// Set the body encoding.
    pub fn encoding(mut self, encoding: Encoding) -> Self {
        self.config.encoding = Some(encoding);
        self
    }

    /// Set the binary byte order.
    pub fn byte_order(mut self, order: ByteOrder) -> Self {
        self.config.byte_order = Some(order);
        self
    }

    /// Set the binary column layout.
    pub fn major_order(mut self, order: MajorOrder) -> Self {
        self.config.major_order = Some(order);
        self
    }

    /// Omit ASCII row counts.
    pub fn no_row_counts(mut self, enabled: bool) -> Self {
        self.config.no_row_counts = Some(enabled);
        self
    }

    /// Spread each ASCII row over this many lines.
    pub fn lines_per_row(mut self, lines: usize) -> Self {
        self.config.lines_per_row = Some(lines.max(1));
        self
    }

    /// Separate ASCII fields with `delimiter`.
    pub fn delimiter(mut self, delimiter: char) -> Self {
        self.config.delimiter = Some(delimiter);
        self
    }

    /// Set the compression explicitly.
    pub fn compression(mut self, compression: Compression) -> Self {
        self.config.compression = Some(compression);
        self
    }

    /// Set the compression level (0-9).
    pub fn compression_level(mut self, level: u32) -> Self {
        self.config.compression_level = Some(level);
        self
    }

    /// Build the writer.
    pub fn build(self) -> Result<DatasetWriter> {
        let target = self.config.target.clone().ok_or_else(|| {
            SddsError::invalid_attribute("WriterBuilder", "target", "target is not set")
        })?;

        if self.config.mode.is_append() {
            let path = match target.path() {
                Some(path) => path,
                None => {
                    return Err(SddsError::append_not_supported(
                        target.to_string(),
                        "pipes cannot be appended to",
                    ))
                }
            };
            return DatasetWriter::open_append(
                path,
                self.config.schema.as_ref(),
                &self.config.dataset,
                self.config.mode,
            );
        }

        let compression = self.resolve_compression(&target)?;
        let buffer_size = self.config.dataset.buffer_size;
        let schema = self.layout_schema();
        let channel = OutputChannel::create(&target, compression, buffer_size)?;
        Ok(DatasetWriter::new(channel, schema))
    }

    /// Build a writer over an arbitrary byte sink, ignoring the target and
    /// write mode. Compression applies only when set explicitly.
    pub fn build_with_writer<W>(self, name: impl Into<String>, writer: W) -> Result<DatasetWriter>
    where
        W: Write + Send + 'static,
    {
        let mut compression = self.config.compression.unwrap_or_default();
        if let Some(level) = self.config.compression_level {
            compression = compression.with_level(level)?;
        }
        let buffer_size = self.config.dataset.buffer_size;
        let schema = self.layout_schema();
        let channel = OutputChannel::from_writer(name, writer, compression, buffer_size);
        Ok(DatasetWriter::new(channel, schema))
    }

    fn resolve_compression(&self, target: &Target) -> Result<Compression> {
        let config = &self.config;
        let inferred = || match target.path().map(detect_from_extension) {
            Some(Compression::Gzip { .. }) => Compression::Gzip {
                level: config.dataset.gzip_level,
            },
            Some(Compression::Xz { .. }) => Compression::Xz {
                level: config.dataset.xz_level,
            },
            _ => Compression::None,
        };
        let compression = config.compression.unwrap_or_else(inferred);
        match config.compression_level {
            Some(level) => compression.with_level(level),
            None => Ok(compression),
        }
    }

    fn layout_schema(&self) -> Schema {
        let config = &self.config;
        let mut schema = config.schema.clone().unwrap_or_default();
        let mode = schema.data_mode_mut();
        if let Some(encoding) = config.encoding {
            mode.encoding = encoding;
        }
        if let Some(order) = config.byte_order {
            mode.byte_order = order;
        }
        if let Some(order) = config.major_order {
            mode.major_order = order;
        }
        if let Some(enabled) = config.no_row_counts {
            mode.no_row_counts = enabled;
        }
        if let Some(lines) = config.lines_per_row {
            mode.lines_per_row = lines;
        }
        if config.delimiter.is_some() {
            mode.delimiter = config.delimiter;
        }
        if mode.encoding == Encoding::Ascii {
            mode.major_order = MajorOrder::Row;
        }
        schema
    }
}
