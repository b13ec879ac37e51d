// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! Page-at-a-time dataset writer.
//!
//! A writer moves through `HeaderPending -> Ready <-> PageOpen -> Closed`.
//! The header is written by [`DatasetWriter::write_layout`] or implicitly
//! by the first [`DatasetWriter::start_page`]; the schema is frozen from
//! then on. Pages reach the channel when they end, or in batches of rows
//! through [`DatasetWriter::update_page`].

use std::borrow::Cow;
use std::fs::File;
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::Path;

use tracing::{debug, warn};

use super::builder::WriterBuilder;
use super::{ArrayData, DatasetConfig, DatasetReader, Page, ReadOutcome};
use crate::core::{ColumnData, Encoding, MajorOrder, Result, SddsError, Value};
use crate::encoding::{codec_for, PageCodec};
use crate::io::{check_appendable, OutputChannel, Target};
use crate::schema::{CompareMode, DataMode, FieldKind, Schema};

/// How an existing target is treated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WriteMode {
    /// Replace any existing contents.
    #[default]
    Truncate,
    /// Add pages after the last complete page of an existing file.
    Append,
    /// Reopen the last complete page of an existing file and add rows to it.
    AppendToPage,
}

impl WriteMode {
    /// Whether the target must already exist.
    pub fn is_append(self) -> bool {
        matches!(self, WriteMode::Append | WriteMode::AppendToPage)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    HeaderPending,
    Ready,
    PageOpen,
    Closed,
}

impl State {
    fn describe(self) -> &'static str {
        match self {
            State::HeaderPending => "the header is not written",
            State::Ready => "no page is open",
            State::PageOpen => "a page is open",
            State::Closed => "the dataset is closed",
        }
    }
}

/// Rows of the open page already on the channel.
#[derive(Debug, Clone, Copy)]
struct Flushed {
    rows: usize,
    /// Channel offset of the row count, if the layout has one
    row_count_at: Option<u64>,
}

/// Writes a header and then pages to an output channel.
pub struct DatasetWriter {
    channel: OutputChannel,
    schema: Schema,
    codec: Box<dyn PageCodec>,
    state: State,
    page: Option<Page>,
    flushed: Option<Flushed>,
    pages_written: usize,
}

impl std::fmt::Debug for DatasetWriter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DatasetWriter")
            .field("channel", &self.channel)
            .field("state", &self.state)
            .field("flushed", &self.flushed)
            .field("pages_written", &self.pages_written)
            .finish()
    }
}

impl DatasetWriter {
    /// Create (or replace) a dataset at a path, or on stdout for `-`.
    ///
    /// Compression is inferred from the file extension.
    pub fn create(target: impl Into<Target>, schema: Schema) -> Result<Self> {
        WriterBuilder::new().target(target).schema(schema).build()
    }

    /// Add pages to an existing uncompressed file.
    ///
    /// `schema` must have the same layout as the file's; the file's own
    /// schema and data mode are used for the new pages.
    pub fn append(path: impl AsRef<Path>, schema: &Schema) -> Result<Self> {
        Self::open_append(
            path.as_ref(),
            Some(schema),
            &DatasetConfig::default(),
            WriteMode::Append,
        )
    }

    /// Reopen the last page of an existing uncompressed file to add rows.
    ///
    /// The page comes back open with its parameters, arrays and rows;
    /// [`rows_in_page`](Self::rows_in_page) tells where new rows start. A
    /// file without pages leaves the writer ready for a first page.
    pub fn append_to_page(path: impl AsRef<Path>, schema: &Schema) -> Result<Self> {
        Self::open_append(
            path.as_ref(),
            Some(schema),
            &DatasetConfig::default(),
            WriteMode::AppendToPage,
        )
    }

    pub(crate) fn new(channel: OutputChannel, schema: Schema) -> Self {
        let codec = codec_for(schema.data_mode());
        Self {
            channel,
            schema,
            codec,
            state: State::HeaderPending,
            page: None,
            flushed: None,
            pages_written: 0,
        }
    }

    pub(crate) fn open_append(
        path: &Path,
        schema: Option<&Schema>,
        config: &DatasetConfig,
        mode: WriteMode,
    ) -> Result<Self> {
        let target = Target::Path(path.to_path_buf());
        check_appendable(&target)?;

        let mut reader =
            DatasetReader::open_with_config(target.clone(), config.clone().with_recover(true))?;
        if let Some(schema) = schema {
            schema.compare(reader.schema(), CompareMode::FormatOnly)?;
            check_data_mode(schema.data_mode(), reader.schema().data_mode())?;
        }

        let mut pages = 0;
        let mut keep = reader.position();
        // Start offset and contents of the last complete page.
        let mut last: Option<(u64, Page)> = None;
        loop {
            let start = reader.position();
            match reader.read_next_page()? {
                ReadOutcome::Page(number) => {
                    pages = number;
                    keep = reader.position();
                    if mode == WriteMode::AppendToPage {
                        last = reader.take_page().map(|page| (start, page));
                    }
                }
                ReadOutcome::Truncated(number) => {
                    warn!(
                        file = %path.display(),
                        page = number,
                        "dropping incomplete trailing page before append"
                    );
                    break;
                }
                ReadOutcome::End => break,
            }
        }
        let existing = reader.schema().clone();
        drop(reader);

        if let Some((start, _)) = &last {
            keep = *start;
        }
        let newline_needed =
            existing.data_mode().encoding == Encoding::Ascii && keep > 0 && !ends_line(path, keep)?;
        let channel = OutputChannel::append(path, keep, config.buffer_size)?;
        let mut writer = Self::new(channel, existing);
        writer.state = State::Ready;
        writer.pages_written = pages;
        if let Some((_, page)) = last {
            debug!(
                file = %path.display(),
                page = page.number(),
                rows = page.rows(),
                "reopened last page"
            );
            writer.pages_written = pages - 1;
            writer.page = Some(page);
            writer.state = State::PageOpen;
        }
        if newline_needed {
            writer
                .channel
                .write_all(b"\n")
                .map_err(|e| SddsError::io(format!("appending to {}", path.display()), &e))?;
        }
        debug!(file = %path.display(), pages, offset = keep, "opened dataset for append");
        Ok(writer)
    }

    /// Channel name.
    pub fn name(&self) -> &str {
        self.channel.name()
    }

    /// The schema being written.
    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    /// Mutable schema; only before the header is written.
    pub fn schema_mut(&mut self) -> Result<&mut Schema> {
        if self.state != State::HeaderPending {
            return Err(self.wrong_state("change the schema"));
        }
        Ok(&mut self.schema)
    }

    /// Number of pages flushed so far, including pre-existing pages when
    /// appending.
    pub fn pages_written(&self) -> usize {
        self.pages_written
    }

    /// Rows of the open page so far, counting rows already written by
    /// [`update_page`](Self::update_page). Zero when no page is open.
    pub fn rows_in_page(&self) -> usize {
        let in_memory = self.page.as_ref().map_or(0, |page| {
            page.columns.iter().map(ColumnData::len).max().unwrap_or(0)
        });
        self.flushed.map_or(0, |f| f.rows) + in_memory
    }

    /// Write the header and freeze the schema.
    pub fn write_layout(&mut self) -> Result<()> {
        if self.state != State::HeaderPending {
            return Err(self.wrong_state("write the layout"));
        }
        let mode = self.schema.data_mode_mut();
        if mode.encoding == Encoding::Ascii {
            mode.major_order = MajorOrder::Row;
        }
        self.codec = codec_for(self.schema.data_mode());

        let header = self.schema.serialize_header();
        self.channel
            .write_all(header.as_bytes())
            .map_err(|e| self.write_error(&e))?;
        let mode = self.schema.data_mode();
        if mode.encoding == Encoding::Ascii && mode.additional_header_lines > 0 {
            let preamble = "\n".repeat(mode.additional_header_lines);
            self.channel
                .write_all(preamble.as_bytes())
                .map_err(|e| self.write_error(&e))?;
        }
        self.state = State::Ready;
        debug!(
            file = self.channel.name(),
            version = self.schema.required_version(),
            encoding = self.schema.data_mode().encoding.as_str(),
            "wrote header"
        );
        Ok(())
    }

    /// Open a new page; `row_hint` pre-sizes the column buffers.
    pub fn start_page(&mut self, row_hint: usize) -> Result<()> {
        if self.state == State::HeaderPending {
            self.write_layout()?;
        }
        if self.state != State::Ready {
            return Err(self.wrong_state("start a page"));
        }
        let mut page = Page::new(&self.schema, self.pages_written + 1);
        for column in &mut page.columns {
            column.reserve(row_hint);
        }
        self.page = Some(page);
        self.flushed = None;
        self.state = State::PageOpen;
        Ok(())
    }

    /// Set a parameter of the open page, widening the value if needed.
    pub fn set_parameter(&mut self, name: &str, value: impl Into<Value>) -> Result<()> {
        self.head_editable("set a parameter")?;
        let value = value.into();
        let index = self.field_index(FieldKind::Parameter, name)?;
        let def = &self.schema.parameters()[index];
        if def.fixed_value.is_some() {
            return Err(SddsError::invalid_attribute(
                name,
                "fixed_value",
                "parameter has a fixed value and cannot be set",
            ));
        }
        let stored = value
            .widen_to(def.ty)
            .ok_or_else(|| SddsError::type_coercion(name, value.type_name(), def.ty.as_str()))?;
        self.open_page("set a parameter")?.parameters[index] = stored;
        Ok(())
    }

    /// Set an array of the open page.
    pub fn set_array(&mut self, name: &str, array: ArrayData) -> Result<()> {
        self.head_editable("set an array")?;
        let index = self.field_index(FieldKind::Array, name)?;
        let def = &self.schema.arrays()[index];
        if array.dims().len() != def.dimensions {
            return Err(SddsError::invalid_attribute(
                name,
                "dimensions",
                format!("declared {}, given {}", def.dimensions, array.dims().len()),
            ));
        }
        let from = array.values().sdds_type();
        let dims = array.dims().to_vec();
        let values = array
            .into_values()
            .widen_to(def.ty)
            .ok_or_else(|| SddsError::type_coercion(name, from.as_str(), def.ty.as_str()))?;
        self.open_page("set an array")?.arrays[index] = ArrayData::from_parts(dims, values);
        Ok(())
    }

    /// Replace a whole column of the open page.
    pub fn set_column(&mut self, name: &str, data: impl Into<ColumnData>) -> Result<()> {
        self.head_editable("set a column")?;
        let data = data.into();
        let index = self.field_index(FieldKind::Column, name)?;
        let ty = self.schema.columns()[index].ty;
        let data = data
            .widen_to(ty)
            .ok_or_else(|| SddsError::type_coercion(name, data.sdds_type().as_str(), ty.as_str()))?;
        self.open_page("set a column")?.columns[index] = data;
        Ok(())
    }

    /// Append one value per column, in declaration order.
    ///
    /// Nothing is stored unless every value fits its column.
    pub fn append_row(&mut self, values: &[Value]) -> Result<()> {
        let columns = self.schema.columns();
        if values.len() != columns.len() {
            return Err(SddsError::invalid_attribute(
                "row",
                "length",
                format!("{} values for {} columns", values.len(), columns.len()),
            ));
        }
        let row = columns
            .iter()
            .zip(values)
            .map(|(def, value)| {
                value.widen_to(def.ty).ok_or_else(|| {
                    SddsError::type_coercion(&def.name, value.type_name(), def.ty.as_str())
                })
            })
            .collect::<Result<Vec<_>>>()?;

        let (page, schema) = self.open_page_parts("append a row")?;
        let lengths: Vec<usize> = page.columns.iter().map(ColumnData::len).collect();
        let pushed = page
            .columns
            .iter_mut()
            .zip(row)
            .zip(schema.columns())
            .try_for_each(|((column, value), def)| {
                column.push(value).map_err(|value| {
                    SddsError::type_coercion(&def.name, value.type_name(), def.ty.as_str())
                })
            });
        if pushed.is_err() {
            for (column, len) in page.columns.iter_mut().zip(lengths) {
                column.truncate(len);
            }
        }
        pushed
    }

    /// Set named cells of row `row` (0-based within the page), growing
    /// columns with default values as needed. Rows already written by
    /// [`update_page`](Self::update_page) cannot be changed.
    pub fn set_row_values(&mut self, row: usize, values: &[(&str, Value)]) -> Result<()> {
        let cells = values
            .iter()
            .map(|(name, value)| {
                let index = self.field_index(FieldKind::Column, name)?;
                let ty = self.schema.columns()[index].ty;
                value
                    .widen_to(ty)
                    .map(|v| (index, v))
                    .ok_or_else(|| SddsError::type_coercion(*name, value.type_name(), ty.as_str()))
            })
            .collect::<Result<Vec<_>>>()?;

        let written = self.flushed.map_or(0, |f| f.rows);
        if row < written {
            return Err(SddsError::invalid_state(
                format!("set row {row}"),
                format!("the first {written} rows of the page are already written"),
            ));
        }
        let local = row - written;
        let (page, schema) = self.open_page_parts("set row values")?;
        for (index, value) in cells {
            let def = &schema.columns()[index];
            let column = &mut page.columns[index];
            if column.len() <= local {
                column.resize_default(local + 1);
            }
            column.set(local, value).map_err(|value| {
                SddsError::type_coercion(&def.name, value.type_name(), def.ty.as_str())
            })?;
        }
        Ok(())
    }

    /// Write the rows added since the last update and keep the page open.
    ///
    /// The first update writes the page head, after which parameters,
    /// arrays and whole columns are frozen. Each update rewrites the row
    /// count on disk so the file is readable between updates. That needs a
    /// seekable, uncompressed file unless the layout is ASCII without row
    /// counts. Column-major binary pages are always written whole.
    pub fn update_page(&mut self) -> Result<()> {
        if self.state != State::PageOpen {
            return Err(self.wrong_state("update a page"));
        }
        if !self.codec.incremental() {
            return Err(SddsError::invalid_state(
                "update a page",
                "column-major pages are written whole",
            ));
        }
        let mode = self.schema.data_mode();
        let counted = mode.encoding == Encoding::Binary || !mode.no_row_counts;
        if counted && !self.channel.capabilities().seekable {
            return Err(SddsError::invalid_state(
                "update a page",
                format!("{} cannot rewrite a row count", self.channel.name()),
            ));
        }
        let Some(mut page) = self.page.take() else {
            return Err(self.wrong_state("update a page"));
        };
        let result = self.write_open_rows(&mut page);
        self.page = Some(page);
        result
    }

    fn write_open_rows(&mut self, page: &mut Page) -> Result<()> {
        page.rows = self.settle_rows(page)?;
        let flushed = self.write_batch(page, self.flushed, false)?;
        page.truncate_rows(0);
        self.flushed = Some(flushed);
        debug!(
            file = self.channel.name(),
            page = page.number,
            rows = flushed.rows,
            "updated page"
        );
        Ok(())
    }

    /// Write the head (unless `flushed` says it is out) and the rows of
    /// `page`, then bring the row count on disk up to date.
    fn write_batch(&mut self, page: &Page, flushed: Option<Flushed>, last: bool) -> Result<Flushed> {
        let page = selected_rows(page);
        page.validate(&self.schema)?;
        let mut buf = Vec::new();
        let flushed = match flushed {
            Some(flushed) => flushed,
            None => {
                let at = self.codec.encode_head(&mut buf, &self.schema, &page, true)?;
                Flushed {
                    rows: 0,
                    row_count_at: at.map(|at| self.channel.position() + at as u64),
                }
            }
        };
        let total = flushed.rows + page.rows;
        let field = match flushed.row_count_at {
            Some(at) => Some((at, self.codec.row_count_field(total)?)),
            None => None,
        };
        self.codec
            .encode_rows(&mut buf, &self.schema, &page, 0..page.rows)?;
        if last {
            self.codec.encode_tail(&mut buf)?;
        }
        self.channel
            .write_all(&buf)
            .map_err(|e| self.write_error(&e))?;
        if let Some((at, field)) = field {
            self.channel.patch(at, &field)?;
        }
        self.channel.flush().map_err(|e| self.write_error(&e))?;
        Ok(Flushed {
            rows: total,
            ..flushed
        })
    }

    /// Finish the open page and flush it.
    ///
    /// The row count is the longest column; every other column must match it.
    pub fn end_page(&mut self) -> Result<()> {
        if self.state != State::PageOpen {
            return Err(self.wrong_state("end a page"));
        }
        let Some(mut page) = self.page.take() else {
            return Err(self.wrong_state("end a page"));
        };
        let flushed = self.flushed.take();
        self.state = State::Ready;

        page.rows = self.settle_rows(&page)?;
        let Some(flushed) = flushed else {
            return self.flush_page(&page);
        };
        let done = self.write_batch(&page, Some(flushed), true)?;
        self.pages_written += 1;
        debug!(
            file = self.channel.name(),
            page = page.number,
            rows = done.rows,
            "finished updated page"
        );
        Ok(())
    }

    /// Row count of an open page: the longest column, which every other
    /// column must match.
    fn settle_rows(&self, page: &Page) -> Result<usize> {
        let rows = page.columns.iter().map(ColumnData::len).max().unwrap_or(0);
        if let Some((index, column)) = page
            .columns
            .iter()
            .enumerate()
            .find(|(_, column)| column.len() != rows)
        {
            return Err(SddsError::data_format(
                self.channel.name(),
                page.number,
                &self.schema.columns()[index].name,
                column.len(),
                format!("column has {} rows, page has {rows}", column.len()),
            ));
        }
        Ok(rows)
    }

    /// Write a complete page; it is renumbered to follow the pages
    /// already written. Rows whose flag is unset are left out.
    pub fn write_page(&mut self, mut page: Page) -> Result<()> {
        if self.state == State::HeaderPending {
            self.write_layout()?;
        }
        if self.state != State::Ready {
            return Err(self.wrong_state("write a page"));
        }
        page.number = self.pages_written + 1;
        self.flush_page(&page)
    }

    fn flush_page(&mut self, page: &Page) -> Result<()> {
        let page = selected_rows(page);
        self.codec.write_page(&mut self.channel, &self.schema, &page)?;
        self.channel.flush().map_err(|e| self.write_error(&e))?;
        self.pages_written += 1;
        debug!(
            file = self.channel.name(),
            page = page.number,
            rows = page.rows,
            "flushed page"
        );
        Ok(())
    }

    /// Finish any open page, write the header if nothing was written yet,
    /// and finish the channel. Calling it again is a no-op.
    pub fn close(&mut self) -> Result<()> {
        if self.state == State::Closed {
            return Ok(());
        }
        let pending = match self.state {
            State::HeaderPending => self.write_layout(),
            State::PageOpen => self.end_page(),
            _ => Ok(()),
        };
        self.state = State::Closed;
        self.page = None;
        let finished = self.channel.finish();
        pending?;
        finished?;
        debug!(file = self.channel.name(), pages = self.pages_written, "closed dataset");
        Ok(())
    }

    fn field_index(&self, kind: FieldKind, name: &str) -> Result<usize> {
        self.schema
            .index_of(kind, name)
            .ok_or_else(|| SddsError::not_found(kind.as_str(), name))
    }

    fn open_page(&mut self, operation: &str) -> Result<&mut Page> {
        self.open_page_parts(operation).map(|(page, _)| page)
    }

    fn open_page_parts(&mut self, operation: &str) -> Result<(&mut Page, &Schema)> {
        if self.state != State::PageOpen {
            return Err(self.wrong_state(operation));
        }
        let state = self.state;
        match self.page.as_mut() {
            Some(page) => Ok((page, &self.schema)),
            None => Err(SddsError::invalid_state(operation, state.describe())),
        }
    }

    fn head_editable(&self, operation: &str) -> Result<()> {
        if self.flushed.is_some() {
            return Err(SddsError::invalid_state(
                operation,
                "rows of the page are already written",
            ));
        }
        Ok(())
    }

    fn wrong_state(&self, operation: &str) -> SddsError {
        SddsError::invalid_state(operation, self.state.describe())
    }

    fn write_error(&self, err: &std::io::Error) -> SddsError {
        SddsError::io(format!("writing {}", self.channel.name()), err)
    }
}

impl Drop for DatasetWriter {
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            warn!(file = self.channel.name(), error = %e, "failed to close dataset");
        }
    }
}

/// `page` without its deselected rows.
fn selected_rows(page: &Page) -> Cow<'_, Page> {
    if page.count_rows_of_interest() == page.rows() {
        Cow::Borrowed(page)
    } else {
        let mut page = page.clone();
        page.delete_unset_rows();
        Cow::Owned(page)
    }
}

/// Appended pages keep the file's layout; asking for another is an error.
fn check_data_mode(wanted: &DataMode, found: &DataMode) -> Result<()> {
    let differs = |what: &str, wanted: &str, found: &str| {
        SddsError::schema_mismatch(format!(
            "data mode {what} is {wanted}, the file uses {found}"
        ))
    };
    if wanted.encoding != found.encoding {
        return Err(differs(
            "encoding",
            wanted.encoding.as_str(),
            found.encoding.as_str(),
        ));
    }
    if found.encoding == Encoding::Binary {
        if wanted.byte_order != found.byte_order {
            return Err(differs(
                "byte order",
                wanted.byte_order.as_str(),
                found.byte_order.as_str(),
            ));
        }
        if wanted.major_order != found.major_order {
            return Err(differs(
                "major order",
                wanted.major_order.as_str(),
                found.major_order.as_str(),
            ));
        }
    }
    Ok(())
}

/// Whether the byte just before `offset` is a newline.
fn ends_line(path: &Path, offset: u64) -> Result<bool> {
    let context = || format!("reading {}", path.display());
    let mut file = File::open(path).map_err(|e| SddsError::io(context(), &e))?;
    file.seek(SeekFrom::Start(offset - 1))
        .map_err(|e| SddsError::io(context(), &e))?;
    let mut last = [0u8; 1];
    file.read_exact(&mut last)
        .map_err(|e| SddsError::io(context(), &e))?;
    Ok(last[0] == b'\n')
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{SddsType, Value};
    use crate::io::Compression;
    use crate::schema::{DataMode, FieldDef};

    fn schema(mode: DataMode) -> Schema {
        let mut schema = Schema::new().with_data_mode(mode);
        schema
            .define_parameter(FieldDef::new("step", SddsType::Long))
            .unwrap();
        schema
            .define_parameter(FieldDef::new("run", SddsType::String).with_fixed_value("R7"))
            .unwrap();
        schema
            .define_column(FieldDef::new("x", SddsType::Double))
            .unwrap();
        schema
            .define_column(FieldDef::new("n", SddsType::Short))
            .unwrap();
        schema
    }

    fn memory_writer(schema: Schema) -> DatasetWriter {
        let channel = OutputChannel::from_writer("mem", std::io::sink(), Compression::None, 1024);
        DatasetWriter::new(channel, schema)
    }

    fn read_all(path: &Path) -> Vec<Page> {
        DatasetReader::open(path)
            .unwrap()
            .pages()
            .collect::<Result<_>>()
            .unwrap()
    }

    #[test]
    fn test_row_by_row_and_set_row_values() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rows.sdds");
        let mut writer = DatasetWriter::create(&path, schema(DataMode::ascii())).unwrap();
        writer.start_page(2).unwrap();
        writer.set_parameter("step", 3i16).unwrap();
        writer
            .append_row(&[Value::Double(0.5), Value::Short(1)])
            .unwrap();
        writer
            .set_row_values(2, &[("x", Value::Float(2.5)), ("n", Value::Short(9))])
            .unwrap();
        writer.end_page().unwrap();
        writer.close().unwrap();
        writer.close().unwrap();

        let pages = read_all(&path);
        assert_eq!(pages.len(), 1);
        assert_eq!(pages[0].rows(), 3);
        assert_eq!(pages[0].parameters()[0], Value::Long(3));
        assert_eq!(pages[0].parameters()[1], Value::String("R7".into()));
        assert_eq!(pages[0].columns()[0], ColumnData::Double(vec![0.5, 0.0, 2.5]));
        assert_eq!(pages[0].columns()[1], ColumnData::Short(vec![1, 0, 9]));
    }

    #[test]
    fn test_state_errors() {
        let mut writer = memory_writer(schema(DataMode::binary()));
        assert!(matches!(
            writer.end_page().unwrap_err(),
            SddsError::InvalidState { .. }
        ));
        assert!(writer.set_parameter("step", 1).is_err());
        writer.schema_mut().unwrap();

        writer.start_page(0).unwrap();
        assert!(writer.schema_mut().is_err());
        assert!(matches!(
            writer.start_page(0).unwrap_err(),
            SddsError::InvalidState { .. }
        ));
        assert!(writer.write_layout().is_err());
        writer.end_page().unwrap();
        writer.close().unwrap();
        assert!(writer.start_page(0).is_err());
    }

    #[test]
    fn test_coercion_and_lookup_errors() {
        let mut writer = memory_writer(schema(DataMode::binary()));
        writer.start_page(0).unwrap();
        let err = writer.set_parameter("step", 1.5).unwrap_err();
        assert!(matches!(err, SddsError::TypeCoercion { .. }));
        let err = writer.set_parameter("run", "other").unwrap_err();
        assert!(matches!(err, SddsError::InvalidAttribute { .. }));
        let err = writer.set_parameter("missing", 1).unwrap_err();
        assert!(matches!(err, SddsError::NotFound { .. }));
        let err = writer.set_column("n", vec![1.0f64]).unwrap_err();
        assert!(matches!(err, SddsError::TypeCoercion { .. }));

        // A failed row leaves the page untouched.
        let err = writer
            .append_row(&[Value::Double(1.0), Value::Long(70000)])
            .unwrap_err();
        assert!(matches!(err, SddsError::TypeCoercion { .. }));
        writer.append_row(&[Value::Double(1.0), Value::Short(1)]).unwrap();
        writer.end_page().unwrap();
        assert_eq!(writer.pages_written(), 1);
    }

    #[test]
    fn test_ragged_columns_rejected() {
        let mut writer = memory_writer(schema(DataMode::binary()));
        writer.start_page(0).unwrap();
        writer.set_column("x", vec![1.0, 2.0]).unwrap();
        writer.set_column("n", vec![1i16]).unwrap();
        let err = writer.end_page().unwrap_err();
        assert!(matches!(err, SddsError::DataFormat { page: 1, .. }));
        assert_eq!(writer.pages_written(), 0);
    }

    #[test]
    fn test_close_writes_header_for_empty_dataset() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("empty.sdds");
        let writer = DatasetWriter::create(&path, schema(DataMode::binary())).unwrap();
        drop(writer);
        let mut reader = DatasetReader::open(&path).unwrap();
        assert_eq!(reader.schema().columns().len(), 2);
        assert_eq!(reader.read_next_page().unwrap(), ReadOutcome::End);
    }

    #[test]
    fn test_append_after_complete_pages() {
        for mode in [DataMode::ascii(), DataMode::binary()] {
            let dir = tempfile::tempdir().unwrap();
            let path = dir.path().join("append.sdds");
            let base = schema(mode);
            let mut writer = DatasetWriter::create(&path, base.clone()).unwrap();
            writer.start_page(1).unwrap();
            writer.set_parameter("step", 1).unwrap();
            writer.append_row(&[Value::Double(1.0), Value::Short(1)]).unwrap();
            writer.close().unwrap();

            let mut writer = DatasetWriter::append(&path, &base).unwrap();
            assert_eq!(writer.pages_written(), 1);
            writer.start_page(1).unwrap();
            writer.set_parameter("step", 2).unwrap();
            writer.append_row(&[Value::Double(2.0), Value::Short(2)]).unwrap();
            writer.close().unwrap();

            let pages = read_all(&path);
            assert_eq!(pages.len(), 2);
            assert_eq!(pages[1].number(), 2);
            assert_eq!(pages[1].parameters()[0], Value::Long(2));
        }
    }

    #[test]
    fn test_append_drops_truncated_page() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cut.sdds");
        let base = schema(DataMode::binary());
        let mut writer = DatasetWriter::create(&path, base.clone()).unwrap();
        for step in 1..=2 {
            writer.start_page(3).unwrap();
            writer.set_parameter("step", step).unwrap();
            writer.set_column("x", vec![1.0, 2.0, 3.0]).unwrap();
            writer.set_column("n", vec![1i16, 2, 3]).unwrap();
            writer.end_page().unwrap();
        }
        writer.close().unwrap();
        let len = std::fs::metadata(&path).unwrap().len();
        let file = std::fs::OpenOptions::new().write(true).open(&path).unwrap();
        file.set_len(len - 4).unwrap();
        drop(file);

        let mut writer = DatasetWriter::append(&path, &base).unwrap();
        assert_eq!(writer.pages_written(), 1);
        writer.start_page(0).unwrap();
        writer.set_parameter("step", 9).unwrap();
        writer.end_page().unwrap();
        writer.close().unwrap();

        let pages = read_all(&path);
        assert_eq!(pages.len(), 2);
        assert_eq!(pages[1].parameters()[0], Value::Long(9));
        assert_eq!(pages[1].rows(), 0);
    }

    #[test]
    fn test_append_rejects_mismatch_and_compression() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.sdds");
        DatasetWriter::create(&path, schema(DataMode::binary()))
            .unwrap()
            .close()
            .unwrap();
        let mut other = Schema::new();
        other
            .define_column(FieldDef::new("x", SddsType::Double))
            .unwrap();
        let err = DatasetWriter::append(&path, &other).unwrap_err();
        assert!(matches!(err, SddsError::SchemaMismatch { .. }));

        let gz = dir.path().join("a.sdds.gz");
        DatasetWriter::create(&gz, schema(DataMode::binary()))
            .unwrap()
            .close()
            .unwrap();
        let err = DatasetWriter::append(&gz, &schema(DataMode::binary())).unwrap_err();
        assert!(matches!(err, SddsError::AppendNotSupported { .. }));
    }

    #[test]
    fn test_append_rejects_other_data_mode() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("mode.sdds");
        let mut little = DataMode::binary();
        little.byte_order = crate::core::ByteOrder::Little;
        DatasetWriter::create(&path, schema(little.clone()))
            .unwrap()
            .close()
            .unwrap();

        let err = DatasetWriter::append(&path, &schema(DataMode::ascii())).unwrap_err();
        assert!(matches!(err, SddsError::SchemaMismatch { .. }));
        let mut big = little.clone();
        big.byte_order = crate::core::ByteOrder::Big;
        let err = DatasetWriter::append(&path, &schema(big)).unwrap_err();
        assert!(matches!(err, SddsError::SchemaMismatch { .. }));
        let mut column_major = little.clone();
        column_major.major_order = MajorOrder::Column;
        let err = DatasetWriter::append_to_page(&path, &schema(column_major)).unwrap_err();
        assert!(matches!(err, SddsError::SchemaMismatch { .. }));

        assert!(DatasetWriter::append(&path, &schema(little)).is_ok());
    }

    #[test]
    fn test_failed_cell_store_is_reported() {
        let mut writer = memory_writer(schema(DataMode::binary()));
        writer.start_page(0).unwrap();
        writer.append_row(&[Value::Double(1.0), Value::Short(1)]).unwrap();
        // A column whose buffer no longer matches its declared type.
        writer.page.as_mut().unwrap().columns[1] = ColumnData::Character(vec![b'a']);

        let err = writer
            .append_row(&[Value::Double(2.0), Value::Short(2)])
            .unwrap_err();
        assert!(matches!(err, SddsError::TypeCoercion { ref field, .. } if field == "n"));
        let page = writer.page.as_ref().unwrap();
        assert_eq!(page.columns[0], ColumnData::Double(vec![1.0]));
        assert_eq!(page.columns[1], ColumnData::Character(vec![b'a']));

        let err = writer
            .set_row_values(0, &[("n", Value::Short(5))])
            .unwrap_err();
        assert!(matches!(err, SddsError::TypeCoercion { ref field, .. } if field == "n"));
    }

    #[test]
    fn test_append_to_last_page() {
        for mode in [DataMode::ascii(), DataMode::binary()] {
            let dir = tempfile::tempdir().unwrap();
            let path = dir.path().join("grow.sdds");
            let base = schema(mode);
            let mut writer = DatasetWriter::create(&path, base.clone()).unwrap();
            for step in 1..=2 {
                writer.start_page(2).unwrap();
                writer.set_parameter("step", step).unwrap();
                writer.set_column("x", vec![1.0, 2.0]).unwrap();
                writer.set_column("n", vec![1i16, 2]).unwrap();
                writer.end_page().unwrap();
            }
            writer.close().unwrap();

            let mut writer = DatasetWriter::append_to_page(&path, &base).unwrap();
            assert_eq!(writer.pages_written(), 1);
            assert_eq!(writer.rows_in_page(), 2);
            writer.append_row(&[Value::Double(3.0), Value::Short(3)]).unwrap();
            writer
                .set_row_values(3, &[("x", Value::Double(4.0)), ("n", Value::Short(4))])
                .unwrap();
            assert_eq!(writer.rows_in_page(), 4);
            writer.close().unwrap();

            let pages = read_all(&path);
            assert_eq!(pages.len(), 2);
            assert_eq!(pages[0].rows(), 2);
            assert_eq!(pages[1].number(), 2);
            assert_eq!(pages[1].parameters()[0], Value::Long(2));
            assert_eq!(
                pages[1].columns()[0],
                ColumnData::Double(vec![1.0, 2.0, 3.0, 4.0])
            );
            assert_eq!(pages[1].columns()[1], ColumnData::Short(vec![1, 2, 3, 4]));
        }
    }

    #[test]
    fn test_append_to_page_without_pages() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("blank.sdds");
        let base = schema(DataMode::binary());
        DatasetWriter::create(&path, base.clone())
            .unwrap()
            .close()
            .unwrap();

        let mut writer = DatasetWriter::append_to_page(&path, &base).unwrap();
        assert_eq!(writer.rows_in_page(), 0);
        assert!(writer.append_row(&[Value::Double(1.0), Value::Short(1)]).is_err());
        writer.start_page(1).unwrap();
        writer.append_row(&[Value::Double(1.0), Value::Short(1)]).unwrap();
        writer.close().unwrap();
        assert_eq!(read_all(&path)[0].rows(), 1);
    }

    #[test]
    fn test_update_page_in_batches() {
        for mode in [DataMode::ascii(), DataMode::binary()] {
            let dir = tempfile::tempdir().unwrap();
            let path = dir.path().join("log.sdds");
            let mut writer = DatasetWriter::create(&path, schema(mode)).unwrap();
            writer.start_page(0).unwrap();
            writer.set_parameter("step", 5).unwrap();
            writer.append_row(&[Value::Double(0.5), Value::Short(1)]).unwrap();
            writer.append_row(&[Value::Double(1.5), Value::Short(2)]).unwrap();
            writer.update_page().unwrap();
            assert_eq!(writer.rows_in_page(), 2);

            // Readable between updates.
            let pages = read_all(&path);
            assert_eq!(pages.len(), 1);
            assert_eq!(pages[0].rows(), 2);
            assert_eq!(pages[0].parameters()[0], Value::Long(5));

            let err = writer.set_parameter("step", 6).unwrap_err();
            assert!(matches!(err, SddsError::InvalidState { .. }));
            let err = writer
                .set_row_values(1, &[("n", Value::Short(9))])
                .unwrap_err();
            assert!(matches!(err, SddsError::InvalidState { .. }));

            writer
                .set_row_values(2, &[("x", Value::Double(2.5)), ("n", Value::Short(3))])
                .unwrap();
            writer.update_page().unwrap();
            writer.update_page().unwrap();
            writer.append_row(&[Value::Double(3.5), Value::Short(4)]).unwrap();
            writer.end_page().unwrap();
            writer.start_page(0).unwrap();
            writer.set_parameter("step", 6).unwrap();
            writer.close().unwrap();

            let pages = read_all(&path);
            assert_eq!(pages.len(), 2);
            assert_eq!(pages[0].rows(), 4);
            assert_eq!(
                pages[0].columns()[0],
                ColumnData::Double(vec![0.5, 1.5, 2.5, 3.5])
            );
            assert_eq!(pages[0].columns()[1], ColumnData::Short(vec![1, 2, 3, 4]));
            assert_eq!(pages[1].parameters()[0], Value::Long(6));
            assert_eq!(pages[1].rows(), 0);
        }
    }

    #[test]
    fn test_update_page_limits() {
        let mut column_major = DataMode::binary();
        column_major.major_order = MajorOrder::Column;
        let mut writer = memory_writer(schema(column_major));
        assert!(writer.update_page().is_err());
        writer.start_page(0).unwrap();
        let err = writer.update_page().unwrap_err();
        assert!(matches!(err, SddsError::InvalidState { .. }));

        // A pipe cannot have its row count rewritten.
        let mut writer = memory_writer(schema(DataMode::binary()));
        writer.start_page(0).unwrap();
        let err = writer.update_page().unwrap_err();
        assert!(matches!(err, SddsError::InvalidState { .. }));

        let mut bare = DataMode::ascii();
        bare.no_row_counts = true;
        let mut writer = memory_writer(schema(bare));
        writer.start_page(0).unwrap();
        writer.append_row(&[Value::Double(1.0), Value::Short(1)]).unwrap();
        writer.update_page().unwrap();
        writer.append_row(&[Value::Double(2.0), Value::Short(2)]).unwrap();
        writer.end_page().unwrap();
        assert_eq!(writer.pages_written(), 1);
    }

    #[test]
    fn test_unset_rows_are_not_written() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("flags.sdds");
        let base = schema(DataMode::binary());
        let mut page = Page::new(&base, 1);
        page.columns = vec![
            ColumnData::Double(vec![1.0, 2.0, 3.0]),
            ColumnData::Short(vec![1, 2, 3]),
        ];
        page.rows = 3;
        page.set_row_flag(1, false).unwrap();

        let mut writer = DatasetWriter::create(&path, base).unwrap();
        writer.write_page(page).unwrap();
        writer.close().unwrap();

        let pages = read_all(&path);
        assert_eq!(pages[0].rows(), 2);
        assert_eq!(pages[0].columns()[1], ColumnData::Short(vec![1, 3]));
    }
}
