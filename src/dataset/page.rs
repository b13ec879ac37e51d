// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! In-memory page contents.

use crate::core::{ColumnData, Result, SddsError, SddsType, Value};
use crate::schema::{FieldKind, Schema};

/// One array value: extents plus the flattened (row-major) elements.
#[derive(Debug, Clone, PartialEq)]
pub struct ArrayData {
    dims: Vec<usize>,
    values: ColumnData,
}

impl ArrayData {
    /// Build an array, checking that the extents match the element count.
    pub fn new(dims: Vec<usize>, values: ColumnData) -> Result<Self> {
        let expected = element_count(&dims).ok_or_else(|| {
            SddsError::invalid_attribute("array", "dimensions", "element count overflows")
        })?;
        if expected != values.len() {
            return Err(SddsError::invalid_attribute(
                "array",
                "dimensions",
                format!(
                    "extents {dims:?} describe {expected} elements, {} given",
                    values.len()
                ),
            ));
        }
        Ok(Self { dims, values })
    }

    /// An array with all extents zero.
    pub fn empty(ty: SddsType, dimensions: usize) -> Self {
        Self {
            dims: vec![0; dimensions],
            values: ColumnData::new(ty),
        }
    }

    /// A one-dimensional array.
    pub fn from_values(values: impl Into<ColumnData>) -> Self {
        let values = values.into();
        Self {
            dims: vec![values.len()],
            values,
        }
    }

    pub(crate) fn from_parts(dims: Vec<usize>, values: ColumnData) -> Self {
        Self { dims, values }
    }

    /// Extent of each dimension.
    pub fn dims(&self) -> &[usize] {
        &self.dims
    }

    /// Flattened elements.
    pub fn values(&self) -> &ColumnData {
        &self.values
    }

    /// Number of elements.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Check if the array has no elements.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Element at a multi-dimensional index (last index varies fastest).
    pub fn get(&self, index: &[usize]) -> Option<Value> {
        if index.len() != self.dims.len() {
            return None;
        }
        let mut flat = 0usize;
        for (&i, &extent) in index.iter().zip(&self.dims) {
            if i >= extent {
                return None;
            }
            flat = flat * extent + i;
        }
        self.values.get(flat)
    }

    pub(crate) fn into_values(self) -> ColumnData {
        self.values
    }
}

/// Product of the extents, `None` on overflow.
pub(crate) fn element_count(dims: &[usize]) -> Option<usize> {
    dims.iter().try_fold(1usize, |acc, &d| acc.checked_mul(d))
}

/// One page: a value per parameter, per array and per column.
///
/// Each row also carries a flag marking it as "of interest". Rows start
/// out selected; writers skip unselected rows.
#[derive(Debug, Clone, PartialEq)]
pub struct Page {
    pub(crate) number: usize,
    pub(crate) rows: usize,
    pub(crate) parameters: Vec<Value>,
    pub(crate) arrays: Vec<ArrayData>,
    pub(crate) columns: Vec<ColumnData>,
    /// `None` while every row is selected.
    row_flags: Option<Vec<bool>>,
}

impl Page {
    /// Empty page shaped after `schema`; fixed parameters hold their values.
    pub fn new(schema: &Schema, number: usize) -> Self {
        let parameters = schema
            .parameters()
            .iter()
            .map(|def| match def.parsed_fixed_value() {
                Some(Ok(value)) => value,
                _ => Value::default_for(def.ty),
            })
            .collect();
        let arrays = schema
            .arrays()
            .iter()
            .map(|def| ArrayData::empty(def.ty, def.dimensions))
            .collect();
        let columns = schema
            .columns()
            .iter()
            .map(|def| ColumnData::new(def.ty))
            .collect();
        Self {
            number,
            rows: 0,
            parameters,
            arrays,
            columns,
            row_flags: None,
        }
    }

    /// 1-based page number.
    pub fn number(&self) -> usize {
        self.number
    }

    /// Row count.
    pub fn rows(&self) -> usize {
        self.rows
    }

    /// Parameter values in declaration order.
    pub fn parameters(&self) -> &[Value] {
        &self.parameters
    }

    /// Arrays in declaration order.
    pub fn arrays(&self) -> &[ArrayData] {
        &self.arrays
    }

    /// Columns in declaration order.
    pub fn columns(&self) -> &[ColumnData] {
        &self.columns
    }

    /// Number of values held for `kind`.
    pub fn field_count(&self, kind: FieldKind) -> usize {
        match kind {
            FieldKind::Parameter => self.parameters.len(),
            FieldKind::Array => self.arrays.len(),
            FieldKind::Column => self.columns.len(),
        }
    }

    /// Drop rows past `rows`, keeping parameters and arrays.
    pub(crate) fn truncate_rows(&mut self, rows: usize) {
        for column in &mut self.columns {
            column.truncate(rows);
        }
        if let Some(flags) = &mut self.row_flags {
            flags.truncate(rows);
        }
        self.rows = self.rows.min(rows);
    }

    /// Whether `row` is selected. Rows past the end are not.
    pub fn row_flag(&self, row: usize) -> bool {
        row < self.rows
            && self
                .row_flags
                .as_ref()
                .and_then(|flags| flags.get(row).copied())
                .unwrap_or(true)
    }

    /// Selection flag of every row.
    pub fn row_flags(&self) -> Vec<bool> {
        (0..self.rows).map(|row| self.row_flag(row)).collect()
    }

    /// Select or deselect every row.
    pub fn set_row_flags(&mut self, selected: bool) {
        self.row_flags = if selected {
            None
        } else {
            Some(vec![false; self.rows])
        };
    }

    /// Select or deselect one row.
    pub fn set_row_flag(&mut self, row: usize, selected: bool) -> Result<()> {
        if row >= self.rows {
            return Err(SddsError::invalid_attribute(
                "row",
                "index",
                format!("{row} is out of range for {} rows", self.rows),
            ));
        }
        let rows = self.rows;
        let flags = self.row_flags.get_or_insert_with(|| vec![true; rows]);
        flags.resize(rows, true);
        flags[row] = selected;
        Ok(())
    }

    /// Replace every flag at once; `flags` must hold one entry per row.
    pub fn assign_row_flags(&mut self, flags: Vec<bool>) -> Result<()> {
        if flags.len() != self.rows {
            return Err(SddsError::invalid_attribute(
                "row",
                "flags",
                format!("{} flags given for {} rows", flags.len(), self.rows),
            ));
        }
        self.row_flags = if flags.iter().all(|&f| f) {
            None
        } else {
            Some(flags)
        };
        Ok(())
    }

    /// Number of selected rows.
    pub fn count_rows_of_interest(&self) -> usize {
        match &self.row_flags {
            None => self.rows,
            Some(_) => (0..self.rows).filter(|&row| self.row_flag(row)).count(),
        }
    }

    /// Remove the deselected rows; the remaining rows are all selected.
    pub fn delete_unset_rows(&mut self) {
        if self.row_flags.is_some() {
            let keep = self.row_flags();
            self.retain_rows(&keep);
        }
    }

    /// Keep the rows whose entry in `keep` is true, dropping the others.
    pub(crate) fn retain_rows(&mut self, keep: &[bool]) {
        for column in &mut self.columns {
            column.retain_mask(keep);
        }
        self.rows = keep.iter().take(self.rows).filter(|&&k| k).count();
        self.row_flags = None;
    }

    /// Keep only the fields at `indices` (in that order) of `kind`.
    pub fn retain(&mut self, kind: FieldKind, indices: &[usize]) {
        fn pick<T: Clone>(items: &[T], indices: &[usize]) -> Vec<T> {
            indices.iter().filter_map(|&i| items.get(i).cloned()).collect()
        }
        match kind {
            FieldKind::Parameter => self.parameters = pick(&self.parameters, indices),
            FieldKind::Array => self.arrays = pick(&self.arrays, indices),
            FieldKind::Column => self.columns = pick(&self.columns, indices),
        }
    }

    /// Check the page against `schema`: field counts, types and column lengths.
    pub fn validate(&self, schema: &Schema) -> Result<()> {
        for kind in FieldKind::ALL {
            if self.field_count(kind) != schema.fields(kind).len() {
                return Err(SddsError::schema_mismatch(format!(
                    "page has {} {}s, schema has {}",
                    self.field_count(kind),
                    kind,
                    schema.fields(kind).len()
                )));
            }
        }
        let typed = |kind: FieldKind, index: usize, actual: SddsType| {
            let def = &schema.fields(kind)[index];
            if def.ty == actual {
                Ok(())
            } else {
                Err(SddsError::type_coercion(&def.name, actual.as_str(), def.ty.as_str()))
            }
        };
        for (i, value) in self.parameters.iter().enumerate() {
            typed(FieldKind::Parameter, i, value.sdds_type())?;
        }
        for (i, array) in self.arrays.iter().enumerate() {
            typed(FieldKind::Array, i, array.values.sdds_type())?;
            if array.dims.len() != schema.arrays()[i].dimensions {
                return Err(SddsError::invalid_attribute(
                    &schema.arrays()[i].name,
                    "dimensions",
                    format!(
                        "declared {}, page has {}",
                        schema.arrays()[i].dimensions,
                        array.dims.len()
                    ),
                ));
            }
        }
        for (i, column) in self.columns.iter().enumerate() {
            typed(FieldKind::Column, i, column.sdds_type())?;
            if column.len() != self.rows {
                return Err(SddsError::data_format(
                    "<page>",
                    self.number,
                    &schema.columns()[i].name,
                    column.len(),
                    format!("column has {} rows, page has {}", column.len(), self.rows),
                ));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::FieldDef;

    fn schema() -> Schema {
        let mut schema = Schema::new();
        schema
            .define_parameter(FieldDef::new("p", SddsType::Long).with_fixed_value("7"))
            .unwrap();
        schema
            .define_array(FieldDef::new("a", SddsType::Double).with_dimensions(2))
            .unwrap();
        schema.define_column(FieldDef::new("c", SddsType::Short)).unwrap();
        schema.define_column(FieldDef::new("d", SddsType::String)).unwrap();
        schema
    }

    #[test]
    fn test_new_page_shape() {
        let page = Page::new(&schema(), 3);
        assert_eq!(page.number(), 3);
        assert_eq!(page.rows(), 0);
        assert_eq!(page.parameters(), &[Value::Long(7)]);
        assert_eq!(page.arrays()[0].dims(), &[0, 0]);
        assert!(page.validate(&schema()).is_ok());
    }

    #[test]
    fn test_array_indexing() {
        let array = ArrayData::new(vec![2, 3], vec![0.0, 1.0, 2.0, 3.0, 4.0, 5.0].into()).unwrap();
        assert_eq!(array.get(&[1, 0]), Some(Value::Double(3.0)));
        assert_eq!(array.get(&[0, 2]), Some(Value::Double(2.0)));
        assert_eq!(array.get(&[2, 0]), None);
        assert_eq!(array.get(&[1]), None);
        assert!(ArrayData::new(vec![2, 2], vec![1.0].into()).is_err());
    }

    #[test]
    fn test_validate_column_lengths() {
        let schema = schema();
        let mut page = Page::new(&schema, 1);
        page.columns[0] = vec![1i16, 2].into();
        page.columns[1] = vec!["a".to_string()].into();
        page.rows = 2;
        let err = page.validate(&schema).unwrap_err();
        assert!(matches!(err, SddsError::DataFormat { ref field, .. } if field == "d"));

        page.truncate_rows(1);
        assert_eq!(page.rows(), 1);
        assert!(page.validate(&schema).is_ok());
    }

    #[test]
    fn test_row_flags() {
        let schema = schema();
        let mut page = Page::new(&schema, 1);
        page.columns[0] = vec![1i16, 2, 3, 4].into();
        page.columns[1] = vec!["a", "b", "c", "d"]
            .into_iter()
            .map(String::from)
            .collect::<Vec<_>>()
            .into();
        page.rows = 4;
        assert_eq!(page.count_rows_of_interest(), 4);
        assert!(!page.row_flag(4));

        page.set_row_flag(1, false).unwrap();
        page.set_row_flag(3, false).unwrap();
        assert_eq!(page.row_flags(), vec![true, false, true, false]);
        assert_eq!(page.count_rows_of_interest(), 2);
        assert!(page.set_row_flag(4, true).is_err());

        page.delete_unset_rows();
        assert_eq!(page.rows(), 2);
        assert_eq!(page.columns()[0], ColumnData::Short(vec![1, 3]));
        assert_eq!(
            page.columns()[1],
            ColumnData::String(vec!["a".into(), "c".into()])
        );
        assert_eq!(page.row_flags(), vec![true, true]);
        assert!(page.validate(&schema).is_ok());

        page.set_row_flags(false);
        assert_eq!(page.count_rows_of_interest(), 0);
        assert!(page.assign_row_flags(vec![true]).is_err());
        page.assign_row_flags(vec![true, true]).unwrap();
        assert_eq!(page.count_rows_of_interest(), 2);
    }

    #[test]
    fn test_retain_columns() {
        let schema = schema();
        let mut page = Page::new(&schema, 1);
        page.retain(FieldKind::Column, &[1]);
        assert_eq!(page.columns().len(), 1);
        assert_eq!(page.columns()[0].sdds_type(), SddsType::String);
    }
}
