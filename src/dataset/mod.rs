// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! Dataset engine.
//!
//! - [`reader`] - header parsing and sequential page reads with recovery
//! - [`writer`] - page lifecycle, flushing and append
//! - [`builder`] - fluent construction of readers and writers
//! - [`page`] - in-memory page contents
//! - [`config`] - per-handle behavior switches

pub mod builder;
pub mod config;
pub mod page;
pub mod reader;
pub mod writer;

pub use builder::{ReaderBuilder, ReaderConfig, WriterBuilder, WriterConfig};
pub use config::{DatasetConfig, DEFAULT_BUFFER_SIZE};
pub use page::{ArrayData, Page};
pub use reader::{DatasetReader, Pages, ReadOutcome, RowSampling};
pub use writer::{DatasetWriter, WriteMode};
