// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! # sdds
//!
//! Self-describing data sets: multi-page tables of typed parameters,
//! arrays and columns, stored as ASCII or binary, optionally gzip or xz
//! compressed, and streamable through pipes.
//!
//! ## Architecture
//!
//! - `core/` - Type catalog, dynamic values, formatting and errors
//! - `schema/` - Data dictionary plus namelist header parsing and writing
//! - `io/` - File, pipe and compressed byte channels
//! - `encoding/` - Binary and ASCII page codecs
//! - `dataset/` - Readers, writers, builders and configuration
//! - `query/` - Name and wildcard lookup, typed value extraction
//!
//! ## Example: Reading
//!
//! ```rust,no_run
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! use sdds::{DatasetReader, ReadOutcome};
//!
//! let mut reader = DatasetReader::open("run.sdds.gz")?;
//! while let ReadOutcome::Page(_) = reader.read_next_page()? {
//!     let view = reader.current().expect("page just read");
//!     let x: Vec<f64> = view.column_as("x")?;
//!     println!("page {}: {} rows, first x = {:?}", view.number(), view.rows(), x.first());
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## Example: Writing
//!
//! ```rust,no_run
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! use sdds::{DatasetWriter, FieldDef, Schema, SddsType};
//!
//! let mut schema = Schema::new().with_description("demo");
//! schema.define_parameter(FieldDef::new("step", SddsType::Long))?;
//! schema.define_column(FieldDef::new("x", SddsType::Double).with_units("m"))?;
//!
//! let mut writer = DatasetWriter::create("out.sdds", schema)?;
//! writer.start_page(3)?;
//! writer.set_parameter("step", 1)?;
//! writer.set_column("x", vec![0.0, 0.5, 1.0])?;
//! writer.end_page()?;
//! writer.close()?;
//! # Ok(())
//! # }
//! ```

// Core types
pub mod core;

pub use core::{
    ByteOrder, ColumnData, Encoding, FormatSpec, MajorOrder, Result, Scalar, SddsError, SddsType,
    Value,
};

// Schema model and header text
pub mod schema;

pub use schema::{CompareMode, DataMode, Description, FieldDef, FieldKind, Schema};

// Byte channels
pub mod io;

pub use io::{Compression, Target};

// Page codecs
pub mod encoding;

// Page engine
pub mod dataset;

pub use dataset::{
    ArrayData, DatasetConfig, DatasetReader, DatasetWriter, Page, ReadOutcome, ReaderBuilder,
    RowSampling, WriteMode, WriterBuilder,
};

// Lookup and extraction
pub mod query;

pub use query::{
    filter_rows, find_by_name, find_by_pattern, get_value, match_rows, PageView, RowLogic,
};
