// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! Sequential page reader.
//!
//! ```rust,no_run
//! use sdds::{DatasetReader, ReadOutcome};
//!
//! let mut reader = DatasetReader::open("run.sdds")?;
//! while let ReadOutcome::Page(number) = reader.read_next_page()? {
//!     let view = reader.current().expect("page just read");
//!     println!("page {number}: {} rows", view.rows());
//! }
//! # Ok::<(), sdds::SddsError>(())
//! ```

use std::io::Read;

use tracing::{debug, warn};

use super::builder::ReaderBuilder;
use super::{DatasetConfig, Page};
use crate::core::{Result, SddsError};
use crate::encoding::{codec_for, PageCodec, PageContext, PageRead};
use crate::io::{Capabilities, InputChannel, Target};
use crate::query::PageView;
use crate::schema::{read_header, Schema};

/// What [`DatasetReader::read_next_page`] produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadOutcome {
    /// Page `n` (1-based) was read completely.
    Page(usize),
    /// Page `n` was cut short; it holds the rows before the damage.
    /// Only reported in recover mode.
    Truncated(usize),
    /// No more pages.
    End,
}

/// Which rows of each page a reader keeps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RowSampling {
    /// Every row.
    #[default]
    All,
    /// Rows `offset`, `offset + interval`, `offset + 2 * interval`, ...
    Sparse { interval: usize, offset: usize },
    /// The last `n` rows.
    LastRows(usize),
}

impl RowSampling {
    /// Sparse sampling; an interval of zero is rejected.
    pub fn sparse(interval: usize, offset: usize) -> Result<Self> {
        if interval == 0 {
            return Err(SddsError::invalid_attribute(
                "sparse",
                "interval",
                "must be at least 1",
            ));
        }
        Ok(RowSampling::Sparse { interval, offset })
    }

    /// Mask of kept rows for a page of `rows` rows, `None` when all are kept.
    fn mask(self, rows: usize) -> Option<Vec<bool>> {
        match self {
            RowSampling::All => None,
            RowSampling::Sparse {
                interval: 1,
                offset: 0,
            } => None,
            RowSampling::Sparse { interval, offset } => Some(
                (0..rows)
                    .map(|row| row >= offset && (row - offset) % interval.max(1) == 0)
                    .collect(),
            ),
            RowSampling::LastRows(n) if n >= rows => None,
            RowSampling::LastRows(n) => Some((0..rows).map(|row| row >= rows - n).collect()),
        }
    }
}

/// Reads the header and then one page at a time.
pub struct DatasetReader {
    channel: InputChannel,
    version: u32,
    schema: Schema,
    codec: Box<dyn PageCodec>,
    config: DatasetConfig,
    sampling: RowSampling,
    page: Option<Page>,
    /// Number the next page read will get.
    next_number: usize,
    /// Byte offset of each page start seen so far; index 0 is page 1.
    offsets: Vec<u64>,
    finished: bool,
    truncated: bool,
}

impl std::fmt::Debug for DatasetReader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DatasetReader")
            .field("channel", &self.channel)
            .field("version", &self.version)
            .field("next_number", &self.next_number)
            .field("finished", &self.finished)
            .finish()
    }
}

impl DatasetReader {
    /// Open a file, or stdin for `-`, with the default configuration.
    pub fn open(target: impl Into<Target>) -> Result<Self> {
        ReaderBuilder::new().target(target).build()
    }

    /// Open with an explicit configuration.
    pub fn open_with_config(target: impl Into<Target>, config: DatasetConfig) -> Result<Self> {
        ReaderBuilder::new().target(target).config(config).build()
    }

    /// Read from any byte source, treated as a non-seekable stream.
    pub fn from_reader<R>(name: impl Into<String>, reader: R, config: DatasetConfig) -> Result<Self>
    where
        R: Read + Send + 'static,
    {
        let channel = InputChannel::from_reader(name, reader, config.buffer_size)?;
        Self::from_channel(channel, config)
    }

    pub(crate) fn from_channel(mut channel: InputChannel, config: DatasetConfig) -> Result<Self> {
        let header = read_header(&mut channel, &config).map_err(|e| channel.classify(e))?;
        let schema = header.schema;
        let codec = codec_for(schema.data_mode());
        codec
            .skip_preamble(&mut channel, &schema)
            .map_err(|e| channel.classify(e))?;
        debug!(
            file = channel.name(),
            version = header.version,
            encoding = schema.data_mode().encoding.as_str(),
            parameters = schema.parameters().len(),
            arrays = schema.arrays().len(),
            columns = schema.columns().len(),
            "opened dataset for reading"
        );
        let first_page = channel.position();
        Ok(Self {
            channel,
            version: header.version,
            schema,
            codec,
            config,
            sampling: RowSampling::All,
            page: None,
            next_number: 1,
            offsets: vec![first_page],
            finished: false,
            truncated: false,
        })
    }

    /// Channel name.
    pub fn name(&self) -> &str {
        self.channel.name()
    }

    /// Version from the header.
    pub fn version(&self) -> u32 {
        self.version
    }

    /// The parsed schema.
    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    /// The configuration in use.
    pub fn config(&self) -> &DatasetConfig {
        &self.config
    }

    /// Channel capabilities.
    pub fn capabilities(&self) -> Capabilities {
        self.channel.capabilities()
    }

    /// Uncompressed byte offset of the channel.
    pub(crate) fn position(&self) -> u64 {
        self.channel.position()
    }

    /// Row sampling applied to every page read from now on.
    pub fn sampling(&self) -> RowSampling {
        self.sampling
    }

    /// Change the row sampling for later reads.
    pub fn set_sampling(&mut self, sampling: RowSampling) -> Result<()> {
        if let RowSampling::Sparse { interval: 0, .. } = sampling {
            return Err(SddsError::invalid_attribute(
                "sparse",
                "interval",
                "must be at least 1",
            ));
        }
        self.sampling = sampling;
        Ok(())
    }

    /// Whether the last page read was truncated.
    pub fn truncated(&self) -> bool {
        self.truncated
    }

    /// Decode the next page.
    ///
    /// A damaged page is an error unless recover mode is on, in which
    /// case its complete rows are kept and [`ReadOutcome::Truncated`] is
    /// returned. Either way every later call returns [`ReadOutcome::End`].
    pub fn read_next_page(&mut self) -> Result<ReadOutcome> {
        self.page = None;
        self.truncated = false;
        if self.finished {
            return Ok(ReadOutcome::End);
        }

        let number = self.next_number;
        if self.offsets.len() < number {
            self.offsets.push(self.channel.position());
        }
        let name = self.channel.name().to_string();
        let ctx = PageContext {
            file: &name,
            number,
        };

        match self.codec.read_page(&mut self.channel, &self.schema, &ctx) {
            PageRead::End => {
                debug!(file = %name, pages = number - 1, "end of data");
                self.finished = true;
                Ok(ReadOutcome::End)
            }
            PageRead::Page(mut page) => {
                debug!(file = %name, page = number, rows = page.rows(), "read page");
                self.sample(&mut page);
                self.page = Some(page);
                self.next_number += 1;
                Ok(ReadOutcome::Page(number))
            }
            PageRead::Partial { mut page, cause } => {
                self.finished = true;
                let cause = self.channel.classify(cause);
                if !self.config.recover {
                    return Err(cause);
                }
                warn!(
                    file = %name,
                    page = number,
                    rows = page.rows(),
                    error = %cause,
                    "recovered truncated page"
                );
                self.sample(&mut page);
                self.page = Some(page);
                self.next_number += 1;
                self.truncated = true;
                Ok(ReadOutcome::Truncated(number))
            }
        }
    }

    fn sample(&self, page: &mut Page) {
        if let Some(keep) = self.sampling.mask(page.rows()) {
            page.retain_rows(&keep);
        }
    }

    /// Make page `number` (1-based) the current page.
    ///
    /// Seekable files jump back to any page already visited; later pages
    /// are reached by reading forward. Streams cannot move backward.
    pub fn goto_page(&mut self, number: usize) -> Result<ReadOutcome> {
        if number == 0 {
            return Err(SddsError::invalid_attribute(
                "page",
                "number",
                "pages are numbered from 1",
            ));
        }
        if self.page.as_ref().is_some_and(|p| p.number() == number) {
            return Ok(if self.truncated {
                ReadOutcome::Truncated(number)
            } else {
                ReadOutcome::Page(number)
            });
        }

        if number < self.next_number {
            if !self.channel.capabilities().seekable {
                return Err(SddsError::invalid_state(
                    format!("go back to page {number}"),
                    format!("reading the stream {}", self.channel.name()),
                ));
            }
            let offset = self.offsets[number - 1];
            self.channel.seek_to(offset)?;
            self.next_number = number;
            self.finished = false;
            debug!(file = self.channel.name(), page = number, offset, "seek to page");
            return self.read_next_page();
        }

        loop {
            let outcome = self.read_next_page()?;
            match outcome {
                ReadOutcome::Page(n) if n < number => continue,
                _ => return Ok(outcome),
            }
        }
    }

    /// The current page.
    pub fn page(&self) -> Option<&Page> {
        self.page.as_ref()
    }

    /// Take ownership of the current page.
    pub fn take_page(&mut self) -> Option<Page> {
        self.page.take()
    }

    /// Query view over the current page.
    pub fn current(&self) -> Option<PageView<'_>> {
        self.page.as_ref().map(|page| PageView::new(&self.schema, page))
    }

    /// Iterate over the remaining pages.
    pub fn pages(&mut self) -> Pages<'_> {
        Pages { reader: self }
    }
}

/// Iterator over successive pages; a truncated page is yielded and
/// ends the iteration.
pub struct Pages<'a> {
    reader: &'a mut DatasetReader,
}

impl Iterator for Pages<'_> {
    type Item = Result<Page>;

    fn next(&mut self) -> Option<Self::Item> {
        match self.reader.read_next_page() {
            Ok(ReadOutcome::End) => None,
            Ok(_) => self.reader.take_page().map(Ok),
            Err(e) => Some(Err(e)),
        }
    }
}
