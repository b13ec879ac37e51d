// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! Binary page encoding.
//!
//! Page layout, every integer in the declared byte order:
//!
//! 1. row count as `i32`; larger counts are `i32::MIN` followed by an `i64`
//! 2. non-fixed parameters in declaration order
//! 3. per array: one `i32` extent per dimension, then the elements
//! 4. columns, row by row or column by column
//!
//! Strings are an `i32` byte length followed by the bytes.

use std::io::{self, BufRead, Read, Write};
use std::ops::Range;

use byteorder::{BigEndian, ByteOrder as Endianness, LittleEndian, ReadBytesExt, WriteBytesExt};
use tracing::trace;

use super::longdouble::{from_ext80, reorder, to_ext80, SLOT};
use super::{Fault, FaultResult, PageCodec, PageContext, PageRead};
use crate::core::value::text_from_bytes;
use crate::core::{ByteOrder, ColumnData, MajorOrder, Result, SddsError, SddsType, Value};
use crate::dataset::page::element_count;
use crate::dataset::{ArrayData, Page};
use crate::schema::{FieldDef, Schema};

/// Upper bound on buffer space reserved from a row count or extent read
/// from the file; larger pages grow as data actually arrives.
const MAX_PREALLOC: usize = 1 << 16;

/// Binary codec for one byte order and major order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BinaryCodec {
    order: ByteOrder,
    major: MajorOrder,
}

impl BinaryCodec {
    /// Create a codec.
    pub fn new(order: ByteOrder, major: MajorOrder) -> Self {
        Self { order, major }
    }
}

impl PageCodec for BinaryCodec {
    fn read_page(&self, input: &mut dyn BufRead, schema: &Schema, ctx: &PageContext<'_>) -> PageRead {
        match self.order {
            ByteOrder::Little => read_page_as::<LittleEndian>(input, schema, ctx, self.major),
            ByteOrder::Big => read_page_as::<BigEndian>(input, schema, ctx, self.major),
        }
    }

    fn write_page(&self, out: &mut dyn Write, schema: &Schema, page: &Page) -> Result<()> {
        page.validate(schema)?;
        match self.order {
            ByteOrder::Little => write_page_as::<LittleEndian>(out, schema, page, self.major),
            ByteOrder::Big => write_page_as::<BigEndian>(out, schema, page, self.major),
        }
        .map_err(|e| SddsError::io("writing binary page", &e))
    }

    fn encode_head(
        &self,
        out: &mut Vec<u8>,
        schema: &Schema,
        page: &Page,
        patchable: bool,
    ) -> Result<Option<usize>> {
        match self.order {
            ByteOrder::Little => write_head_as::<LittleEndian>(out, schema, page, patchable),
            ByteOrder::Big => write_head_as::<BigEndian>(out, schema, page, patchable),
        }
        .map_err(|e| SddsError::io("writing binary page", &e))
    }

    fn encode_rows(
        &self,
        out: &mut Vec<u8>,
        _schema: &Schema,
        page: &Page,
        range: Range<usize>,
    ) -> Result<()> {
        if self.major == MajorOrder::Column {
            return Err(SddsError::invalid_state(
                "write rows separately",
                "column-major pages are written whole",
            ));
        }
        if range.end > page.rows() || page.columns().iter().any(|c| c.len() < range.end) {
            return Err(SddsError::invalid_attribute(
                "rows",
                "range",
                format!("{range:?} is outside a page of {} rows", page.rows()),
            ));
        }
        match self.order {
            ByteOrder::Little => write_rows::<LittleEndian>(out, page, range),
            ByteOrder::Big => write_rows::<BigEndian>(out, page, range),
        }
        .map_err(|e| SddsError::io("writing binary page", &e))
    }

    fn row_count_field(&self, rows: usize) -> Result<Vec<u8>> {
        let rows = i32::try_from(rows).map_err(|_| {
            SddsError::invalid_attribute(
                "rows",
                "count",
                format!("{rows} rows do not fit a row count updated in place"),
            )
        })?;
        Ok(match self.order {
            ByteOrder::Little => rows.to_le_bytes(),
            ByteOrder::Big => rows.to_be_bytes(),
        }
        .to_vec())
    }

    fn incremental(&self) -> bool {
        self.major == MajorOrder::Row
    }
}

fn is_big<E: Endianness>() -> bool {
    E::read_u16(&[0, 1]) == 1
}

fn read_page_as<E: Endianness>(
    input: &mut dyn BufRead,
    schema: &Schema,
    ctx: &PageContext<'_>,
    major: MajorOrder,
) -> PageRead {
    let mut page = Page::new(schema, ctx.number);

    let rows = match read_row_count::<E>(input) {
        Ok(Some(rows)) => rows,
        Ok(None) => return PageRead::End,
        Err(fault) => return PageRead::partial(page, 0, ctx.error("row count", 0, fault)),
    };
    trace!(page = ctx.number, rows, "binary page");

    for (i, def) in schema.parameters().iter().enumerate() {
        if def.fixed_value.is_some() {
            continue;
        }
        match read_value::<E, _>(input, def.ty) {
            Ok(value) => page.parameters[i] = value,
            Err(fault) => return PageRead::partial(page, 0, ctx.error(&def.name, 0, fault)),
        }
    }

    for (i, def) in schema.arrays().iter().enumerate() {
        match read_array::<E, _>(input, def) {
            Ok(array) => page.arrays[i] = array,
            Err((element, fault)) => return PageRead::partial(page, 0, ctx.error(&def.name, element, fault)),
        }
    }

    let columns = schema.columns();
    for column in &mut page.columns {
        column.reserve(rows.min(MAX_PREALLOC));
    }
    match major {
        MajorOrder::Row => {
            for row in 0..rows {
                for (j, def) in columns.iter().enumerate() {
                    if let Err(fault) = read_element::<E, _>(input, &mut page.columns[j]) {
                        let cause = ctx.error(&def.name, row, fault);
                        return PageRead::partial(page, row, cause);
                    }
                }
            }
        }
        MajorOrder::Column => {
            for (j, def) in columns.iter().enumerate() {
                for row in 0..rows {
                    if let Err(fault) = read_element::<E, _>(input, &mut page.columns[j]) {
                        let cause = ctx.error(&def.name, row, fault);
                        return PageRead::partial(page, 0, cause);
                    }
                }
            }
        }
    }
    page.rows = rows;
    PageRead::Page(page)
}

fn read_row_count<E: Endianness>(input: &mut dyn BufRead) -> FaultResult<Option<usize>> {
    if input.fill_buf()?.is_empty() {
        return Ok(None);
    }
    let count = input.read_i32::<E>()?;
    let count = if count == i32::MIN {
        input.read_i64::<E>()?
    } else {
        i64::from(count)
    };
    usize::try_from(count)
        .map(Some)
        .map_err(|_| Fault::Invalid(format!("invalid row count {count}")))
}

fn read_array<E: Endianness, R: Read + ?Sized>(
    input: &mut R,
    def: &FieldDef,
) -> std::result::Result<ArrayData, (usize, Fault)> {
    let mut dims = Vec::with_capacity(def.dimensions);
    for _ in 0..def.dimensions {
        let extent = input.read_i32::<E>().map_err(|e| (0, Fault::from(e)))?;
        let extent = usize::try_from(extent)
            .map_err(|_| (0, Fault::Invalid(format!("negative array extent {extent}"))))?;
        dims.push(extent);
    }
    let count = element_count(&dims)
        .ok_or_else(|| (0, Fault::Invalid(format!("array extents {dims:?} overflow"))))?;
    let mut values = ColumnData::with_capacity(def.ty, count.min(MAX_PREALLOC));
    for element in 0..count {
        read_element::<E, _>(input, &mut values).map_err(|fault| (element, fault))?;
    }
    Ok(ArrayData::from_parts(dims, values))
}

fn read_value<E: Endianness, R: Read + ?Sized>(input: &mut R, ty: SddsType) -> FaultResult<Value> {
    let mut one = ColumnData::with_capacity(ty, 1);
    read_element::<E, _>(input, &mut one)?;
    one.get(0)
        .ok_or_else(|| Fault::Invalid("value vanished after decoding".to_string()))
}

/// Decode one element and append it to `column`.
fn read_element<E: Endianness, R: Read + ?Sized>(
    input: &mut R,
    column: &mut ColumnData,
) -> FaultResult<()> {
    match column {
        ColumnData::LongDouble(v) => {
            let mut slot = [0u8; SLOT];
            input.read_exact(&mut slot)?;
            v.push(from_ext80(&reorder(slot, is_big::<E>())));
        }
        ColumnData::Double(v) => v.push(input.read_f64::<E>()?),
        ColumnData::Float(v) => v.push(input.read_f32::<E>()?),
        ColumnData::Long64(v) => v.push(input.read_i64::<E>()?),
        ColumnData::ULong64(v) => v.push(input.read_u64::<E>()?),
        ColumnData::Long(v) => v.push(input.read_i32::<E>()?),
        ColumnData::ULong(v) => v.push(input.read_u32::<E>()?),
        ColumnData::Short(v) => v.push(input.read_i16::<E>()?),
        ColumnData::UShort(v) => v.push(input.read_u16::<E>()?),
        ColumnData::String(v) => v.push(read_string::<E, _>(input)?),
        ColumnData::Character(v) => v.push(input.read_u8()?),
    }
    Ok(())
}

fn read_string<E: Endianness, R: Read + ?Sized>(input: &mut R) -> FaultResult<String> {
    let len = input.read_i32::<E>()?;
    let len = usize::try_from(len)
        .map_err(|_| Fault::Invalid(format!("negative string length {len}")))?;
    let mut buf = Vec::with_capacity(len.min(MAX_PREALLOC));
    let got = Read::take(&mut *input, len as u64).read_to_end(&mut buf)?;
    if got < len {
        return Err(Fault::Eof);
    }
    text_from_bytes(buf).map_err(Fault::Invalid)
}

fn write_page_as<E: Endianness>(
    out: &mut dyn Write,
    schema: &Schema,
    page: &Page,
    major: MajorOrder,
) -> io::Result<()> {
    write_row_count::<E>(out, page.rows)?;
    write_head_fields::<E>(out, schema, page)?;

    match major {
        MajorOrder::Row => write_rows::<E>(out, page, 0..page.rows),
        MajorOrder::Column => {
            for column in &page.columns {
                write_range::<E>(out, column, 0..page.rows)?;
            }
            Ok(())
        }
    }
}

fn write_head_as<E: Endianness>(
    out: &mut Vec<u8>,
    schema: &Schema,
    page: &Page,
    patchable: bool,
) -> io::Result<Option<usize>> {
    let at = out.len();
    if patchable {
        out.write_i32::<E>(to_i32(page.rows, "row count")?)?;
    } else {
        write_row_count::<E>(out, page.rows)?;
    }
    write_head_fields::<E>(out, schema, page)?;
    Ok(patchable.then_some(at))
}

fn write_rows<E: Endianness>(
    out: &mut dyn Write,
    page: &Page,
    range: Range<usize>,
) -> io::Result<()> {
    for row in range {
        for column in &page.columns {
            write_range::<E>(out, column, row..row + 1)?;
        }
    }
    Ok(())
}

/// Non-fixed parameters, then arrays.
fn write_head_fields<E: Endianness>(
    out: &mut dyn Write,
    schema: &Schema,
    page: &Page,
) -> io::Result<()> {
    for (def, value) in schema.parameters().iter().zip(&page.parameters) {
        if def.fixed_value.is_none() {
            write_value::<E>(out, value)?;
        }
    }

    for array in &page.arrays {
        for &extent in array.dims() {
            out.write_i32::<E>(to_i32(extent, "array extent")?)?;
        }
        write_range::<E>(out, array.values(), 0..array.len())?;
    }
    Ok(())
}

fn to_i32(n: usize, what: &str) -> io::Result<i32> {
    i32::try_from(n).map_err(|_| {
        io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("{what} {n} does not fit in 32 bits"),
        )
    })
}

pub(crate) fn write_row_count<E: Endianness>(out: &mut dyn Write, rows: usize) -> io::Result<()> {
    match i32::try_from(rows) {
        Ok(rows) => out.write_i32::<E>(rows),
        Err(_) => {
            out.write_i32::<E>(i32::MIN)?;
            out.write_i64::<E>(rows as i64)
        }
    }
}

fn write_value<E: Endianness>(out: &mut dyn Write, value: &Value) -> io::Result<()> {
    match value {
        Value::LongDouble(v) => out.write_all(&reorder(to_ext80(*v), is_big::<E>())),
        Value::Double(v) => out.write_f64::<E>(*v),
        Value::Float(v) => out.write_f32::<E>(*v),
        Value::Long64(v) => out.write_i64::<E>(*v),
        Value::ULong64(v) => out.write_u64::<E>(*v),
        Value::Long(v) => out.write_i32::<E>(*v),
        Value::ULong(v) => out.write_u32::<E>(*v),
        Value::Short(v) => out.write_i16::<E>(*v),
        Value::UShort(v) => out.write_u16::<E>(*v),
        Value::String(s) => write_string::<E>(out, s),
        Value::Character(c) => out.write_u8(*c),
    }
}

fn write_string<E: Endianness>(out: &mut dyn Write, text: &str) -> io::Result<()> {
    out.write_i32::<E>(to_i32(text.len(), "string length")?)?;
    out.write_all(text.as_bytes())
}

/// Encode `column[range]`; the range is in bounds for validated pages.
fn write_range<E: Endianness>(
    out: &mut dyn Write,
    column: &ColumnData,
    range: Range<usize>,
) -> io::Result<()> {
    match column {
        ColumnData::LongDouble(v) => {
            let big = is_big::<E>();
            for &x in &v[range] {
                out.write_all(&reorder(to_ext80(x), big))?;
            }
        }
        ColumnData::Double(v) => {
            for &x in &v[range] {
                out.write_f64::<E>(x)?;
            }
        }
        ColumnData::Float(v) => {
            for &x in &v[range] {
                out.write_f32::<E>(x)?;
            }
        }
        ColumnData::Long64(v) => {
            for &x in &v[range] {
                out.write_i64::<E>(x)?;
            }
        }
        ColumnData::ULong64(v) => {
            for &x in &v[range] {
                out.write_u64::<E>(x)?;
            }
        }
        ColumnData::Long(v) => {
            for &x in &v[range] {
                out.write_i32::<E>(x)?;
            }
        }
        ColumnData::ULong(v) => {
            for &x in &v[range] {
                out.write_u32::<E>(x)?;
            }
        }
        ColumnData::Short(v) => {
            for &x in &v[range] {
                out.write_i16::<E>(x)?;
            }
        }
        ColumnData::UShort(v) => {
            for &x in &v[range] {
                out.write_u16::<E>(x)?;
            }
        }
        ColumnData::String(v) => {
            for s in &v[range] {
                write_string::<E>(out, s)?;
            }
        }
        ColumnData::Character(v) => out.write_all(&v[range])?,
    }
    Ok(())
}
