// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! Page body encodings.
//!
//! - [`binary`] - length-prefixed binary pages in either byte order and
//!   either major order
//! - [`ascii`] - line-oriented text pages
//! - [`longdouble`] - 80-bit extended precision slots
//!
//! Both codecs implement [`PageCodec`]; [`codec_for`] picks one from a
//! schema's data mode.

pub mod ascii;
pub mod binary;
pub mod longdouble;

use std::io::{self, BufRead, Write};
use std::ops::Range;

use crate::core::{Encoding, Result, SddsError};
use crate::dataset::Page;
use crate::schema::{DataMode, Schema};

pub use ascii::AsciiCodec;
pub use binary::BinaryCodec;

/// Result of decoding one page.
#[derive(Debug)]
pub enum PageRead {
    /// Clean end of data before any byte of a new page
    End,
    /// A complete page
    Page(Page),
    /// A page cut short; `page` holds every complete row before the failure
    Partial {
        /// Recovered contents
        page: Page,
        /// What stopped decoding
        cause: SddsError,
    },
}

impl PageRead {
    /// A partial page keeping the first `rows` rows.
    pub(crate) fn partial(mut page: Page, rows: usize, cause: SddsError) -> Self {
        page.truncate_rows(rows);
        page.rows = rows;
        PageRead::Partial { page, cause }
    }
}

/// Identifies the page being decoded in diagnostics.
#[derive(Debug, Clone)]
pub struct PageContext<'a> {
    /// Channel name
    pub file: &'a str,
    /// 1-based page number
    pub number: usize,
}

impl PageContext<'_> {
    pub(crate) fn error(&self, field: &str, element: usize, fault: Fault) -> SddsError {
        match fault {
            Fault::Eof => SddsError::data_format(
                self.file,
                self.number,
                field,
                element,
                "unexpected end of data",
            ),
            Fault::Invalid(message) => {
                SddsError::data_format(self.file, self.number, field, element, message)
            }
            Fault::Io(err) => SddsError::io(format!("reading {}", self.file), &err),
        }
    }
}

/// Low-level decoding failure, before field context is attached.
#[derive(Debug)]
pub(crate) enum Fault {
    Eof,
    Invalid(String),
    Io(io::Error),
}

impl From<io::Error> for Fault {
    fn from(err: io::Error) -> Self {
        if err.kind() == io::ErrorKind::UnexpectedEof {
            Fault::Eof
        } else {
            Fault::Io(err)
        }
    }
}

pub(crate) type FaultResult<T> = std::result::Result<T, Fault>;

/// A page body encoding.
pub trait PageCodec: Send {
    /// Decode the next page.
    fn read_page(&self, input: &mut dyn BufRead, schema: &Schema, ctx: &PageContext<'_>) -> PageRead;

    /// Encode one page.
    fn write_page(&self, out: &mut dyn Write, schema: &Schema, page: &Page) -> Result<()>;

    /// Encode everything before the first row of `page`.
    ///
    /// With `patchable` the row count goes into a [`row_count_field`]
    /// whose offset within `out` is returned, so it can be rewritten as
    /// rows are added. `None` means the layout carries no row count.
    ///
    /// [`row_count_field`]: PageCodec::row_count_field
    fn encode_head(
        &self,
        out: &mut Vec<u8>,
        schema: &Schema,
        page: &Page,
        patchable: bool,
    ) -> Result<Option<usize>>;

    /// Encode rows `range` of `page`, row by row.
    fn encode_rows(
        &self,
        out: &mut Vec<u8>,
        schema: &Schema,
        page: &Page,
        range: Range<usize>,
    ) -> Result<()>;

    /// Encode whatever follows the last row.
    fn encode_tail(&self, _out: &mut Vec<u8>) -> Result<()> {
        Ok(())
    }

    /// Fixed-size row count written by a patchable head.
    fn row_count_field(&self, rows: usize) -> Result<Vec<u8>>;

    /// Whether rows can be written in several batches.
    fn incremental(&self) -> bool {
        true
    }

    /// Consume text between the header and the first page.
    fn skip_preamble(&self, _input: &mut dyn BufRead, _schema: &Schema) -> Result<()> {
        Ok(())
    }
}

/// Codec for a data mode.
pub fn codec_for(mode: &DataMode) -> Box<dyn PageCodec> {
    match mode.encoding {
        Encoding::Binary => Box::new(BinaryCodec::new(mode.byte_order, mode.major_order)),
        Encoding::Ascii => Box::new(AsciiCodec::new(mode)),
    }
}
