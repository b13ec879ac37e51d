// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! Field lookup and typed value extraction.
//!
//! Lookups go through the schema: [`find_by_name`] for exact names and
//! [`find_by_pattern`] for shell-style wildcards. Values come out of a
//! [`PageView`], converted to the requested type when that conversion is
//! a widening one.
//!
//! ```rust,no_run
//! use sdds::{DatasetReader, FieldKind};
//!
//! let mut reader = DatasetReader::open("run.sdds")?;
//! let names: Vec<String> = sdds::query::find_by_pattern(reader.schema(), FieldKind::Column, "x*")?
//!     .into_iter()
//!     .map(str::to_string)
//!     .collect();
//! reader.read_next_page()?;
//! if let Some(view) = reader.current() {
//!     for name in &names {
//!         let values: Vec<f64> = view.column_as(name)?;
//!         println!("{name}: {values:?}");
//!     }
//! }
//! # Ok::<(), sdds::SddsError>(())
//! ```

use glob::Pattern;

use crate::core::{ColumnData, Result, Scalar, SddsError, SddsType, Value};
use crate::dataset::{ArrayData, Page};
use crate::schema::{FieldKind, Schema};

/// Index of `name` among the fields of `kind`.
pub fn find_by_name(schema: &Schema, kind: FieldKind, name: &str) -> Result<usize> {
    schema
        .index_of(kind, name)
        .ok_or_else(|| SddsError::not_found(kind.as_str(), name))
}

/// Names of the fields of `kind` matching a wildcard pattern (`*`, `?`,
/// `[...]`), in declaration order. No match is an empty list.
pub fn find_by_pattern<'a>(
    schema: &'a Schema,
    kind: FieldKind,
    pattern: &str,
) -> Result<Vec<&'a str>> {
    let compiled = Pattern::new(pattern)
        .map_err(|e| SddsError::invalid_attribute(pattern, "pattern", e.msg))?;
    Ok(schema
        .fields(kind)
        .iter()
        .filter(|def| compiled.matches(&def.name))
        .map(|def| def.name.as_str())
        .collect())
}

/// Element `index` of a field, converted to `target`.
///
/// `index` is the row for columns, the flattened element for arrays and
/// must be 0 for parameters.
pub fn get_value(
    schema: &Schema,
    page: &Page,
    kind: FieldKind,
    name: &str,
    index: usize,
    target: SddsType,
) -> Result<Value> {
    PageView::new(schema, page).get_value(kind, name, index, target)
}

/// A page paired with the schema that describes it.
#[derive(Debug, Clone, Copy)]
pub struct PageView<'a> {
    schema: &'a Schema,
    page: &'a Page,
}

impl<'a> PageView<'a> {
    pub fn new(schema: &'a Schema, page: &'a Page) -> Self {
        Self { schema, page }
    }

    pub fn schema(&self) -> &'a Schema {
        self.schema
    }

    pub fn page(&self) -> &'a Page {
        self.page
    }

    /// 1-based page number.
    pub fn number(&self) -> usize {
        self.page.number()
    }

    pub fn rows(&self) -> usize {
        self.page.rows()
    }

    /// Stored value of a parameter.
    pub fn parameter(&self, name: &str) -> Result<&'a Value> {
        let index = find_by_name(self.schema, FieldKind::Parameter, name)?;
        self.page
            .parameters()
            .get(index)
            .ok_or_else(|| SddsError::not_found("parameter", name))
    }

    /// Parameter converted to `T`.
    pub fn parameter_as<T: Scalar>(&self, name: &str) -> Result<T> {
        let value = self.parameter(name)?;
        value
            .widen_to(T::SDDS_TYPE)
            .as_ref()
            .and_then(T::from_value)
            .ok_or_else(|| coercion(name, value.sdds_type(), T::SDDS_TYPE))
    }

    /// Stored buffer of a column.
    pub fn column(&self, name: &str) -> Result<&'a ColumnData> {
        let index = find_by_name(self.schema, FieldKind::Column, name)?;
        self.page
            .columns()
            .get(index)
            .ok_or_else(|| SddsError::not_found("column", name))
    }

    /// Whole column converted to `T`.
    pub fn column_as<T: Scalar>(&self, name: &str) -> Result<Vec<T>> {
        extract(name, self.column(name)?)
    }

    /// Stored value of an array.
    pub fn array(&self, name: &str) -> Result<&'a ArrayData> {
        let index = find_by_name(self.schema, FieldKind::Array, name)?;
        self.page
            .arrays()
            .get(index)
            .ok_or_else(|| SddsError::not_found("array", name))
    }

    /// Flattened array elements converted to `T`.
    pub fn array_as<T: Scalar>(&self, name: &str) -> Result<Vec<T>> {
        extract(name, self.array(name)?.values())
    }

    /// One element of any field, converted to `target`.
    pub fn get_value(
        &self,
        kind: FieldKind,
        name: &str,
        index: usize,
        target: SddsType,
    ) -> Result<Value> {
        let value = match kind {
            FieldKind::Parameter if index == 0 => Some(self.parameter(name)?.clone()),
            FieldKind::Parameter => None,
            FieldKind::Array => self.array(name)?.values().get(index),
            FieldKind::Column => self.column(name)?.get(index),
        }
        .ok_or_else(|| {
            SddsError::invalid_attribute(name, "index", format!("{index} is out of range"))
        })?;
        value
            .widen_to(target)
            .ok_or_else(|| coercion(name, value.sdds_type(), target))
    }
}

/// How a row test combines with the flags already on the page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RowLogic {
    /// The test result replaces the flag.
    #[default]
    Replace,
    /// A row stays selected only if it was selected and passes.
    And,
    /// A row is selected if it was selected or passes.
    Or,
}

impl RowLogic {
    fn combine(self, current: bool, passed: bool) -> bool {
        match self {
            RowLogic::Replace => passed,
            RowLogic::And => current && passed,
            RowLogic::Or => current || passed,
        }
    }
}

/// Flag rows whose numeric column value lies in `lower..=upper`.
///
/// `negate` inverts the test before it is combined. Returns the number of
/// rows of interest afterwards.
pub fn filter_rows(
    schema: &Schema,
    page: &mut Page,
    name: &str,
    lower: f64,
    upper: f64,
    logic: RowLogic,
    negate: bool,
) -> Result<usize> {
    let column = PageView::new(schema, page).column(name)?;
    if !column.sdds_type().is_numeric() {
        return Err(coercion(name, column.sdds_type(), SddsType::Double));
    }
    let passed: Vec<bool> = (0..column.len())
        .map(|row| {
            let inside = column
                .get(row)
                .and_then(|v| v.as_f64())
                .is_some_and(|x| x >= lower && x <= upper);
            inside != negate
        })
        .collect();
    apply_test(page, &passed, logic)
}

/// Flag rows whose string column value matches a wildcard pattern.
pub fn match_rows(
    schema: &Schema,
    page: &mut Page,
    name: &str,
    pattern: &str,
    logic: RowLogic,
    negate: bool,
) -> Result<usize> {
    let compiled = Pattern::new(pattern)
        .map_err(|e| SddsError::invalid_attribute(name, "pattern", e.msg))?;
    let column = PageView::new(schema, page).column(name)?;
    let ColumnData::String(values) = column else {
        return Err(coercion(name, column.sdds_type(), SddsType::String));
    };
    let passed: Vec<bool> = values
        .iter()
        .map(|text| compiled.matches(text) != negate)
        .collect();
    apply_test(page, &passed, logic)
}

fn apply_test(page: &mut Page, passed: &[bool], logic: RowLogic) -> Result<usize> {
    let flags = page
        .row_flags()
        .into_iter()
        .zip(passed)
        .map(|(current, &ok)| logic.combine(current, ok))
        .collect();
    page.assign_row_flags(flags)?;
    Ok(page.count_rows_of_interest())
}

fn extract<T: Scalar>(name: &str, data: &ColumnData) -> Result<Vec<T>> {
    if let Some(values) = T::slice(data) {
        return Ok(values.to_vec());
    }
    data.widen_to(T::SDDS_TYPE)
        .as_ref()
        .and_then(T::slice)
        .map(<[T]>::to_vec)
        .ok_or_else(|| coercion(name, data.sdds_type(), T::SDDS_TYPE))
}

fn coercion(name: &str, from: SddsType, to: SddsType) -> SddsError {
    SddsError::type_coercion(name, from.as_str(), to.as_str())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::FieldDef;

    fn schema() -> Schema {
        let mut schema = Schema::new();
        for name in ["x1", "x2", "y1"] {
            schema
                .define_column(FieldDef::new(name, SddsType::Short))
                .unwrap();
        }
        schema
            .define_parameter(FieldDef::new("label", SddsType::Character))
            .unwrap();
        schema
            .define_parameter(FieldDef::new("energy", SddsType::LongDouble))
            .unwrap();
        schema
            .define_array(FieldDef::new("grid", SddsType::Float).with_dimensions(2))
            .unwrap();
        schema
    }

    fn page(schema: &Schema) -> Page {
        let mut page = Page::new(schema, 1);
        page.rows = 2;
        page.columns = vec![
            ColumnData::Short(vec![1, 2]),
            ColumnData::Short(vec![3, 4]),
            ColumnData::Short(vec![5, 6]),
        ];
        page.parameters = vec![Value::Character(b'k'), Value::LongDouble(2.5)];
        page.arrays = vec![ArrayData::new(
            vec![2, 2],
            ColumnData::Float(vec![0.5, 1.5, 2.5, 3.5]),
        )
        .unwrap()];
        page
    }

    #[test]
    fn test_find_by_name() {
        let schema = schema();
        assert_eq!(find_by_name(&schema, FieldKind::Column, "y1").unwrap(), 2);
        let err = find_by_name(&schema, FieldKind::Array, "x1").unwrap_err();
        assert!(matches!(err, SddsError::NotFound { .. }));
    }

    #[test]
    fn test_find_by_pattern() {
        let schema = schema();
        assert_eq!(
            find_by_pattern(&schema, FieldKind::Column, "x*").unwrap(),
            vec!["x1", "x2"]
        );
        assert_eq!(
            find_by_pattern(&schema, FieldKind::Column, "?1").unwrap(),
            vec!["x1", "y1"]
        );
        assert_eq!(
            find_by_pattern(&schema, FieldKind::Column, "[xy]2").unwrap(),
            vec!["x2"]
        );
        assert!(find_by_pattern(&schema, FieldKind::Column, "z*")
            .unwrap()
            .is_empty());
        let err = find_by_pattern(&schema, FieldKind::Column, "[x").unwrap_err();
        assert!(matches!(err, SddsError::InvalidAttribute { .. }));
    }

    #[test]
    fn test_widening_extraction() {
        let schema = schema();
        let page = page(&schema);
        let view = PageView::new(&schema, &page);

        assert_eq!(view.column_as::<i16>("x1").unwrap(), vec![1, 2]);
        assert_eq!(view.column_as::<i32>("x2").unwrap(), vec![3, 4]);
        assert_eq!(view.column_as::<f64>("y1").unwrap(), vec![5.0, 6.0]);
        assert_eq!(view.parameter_as::<String>("label").unwrap(), "k");
        assert_eq!(view.parameter_as::<f64>("energy").unwrap(), 2.5);
        assert_eq!(view.array_as::<f64>("grid").unwrap(), vec![0.5, 1.5, 2.5, 3.5]);
        assert_eq!(
            view.array("grid").unwrap().get(&[1, 0]),
            Some(Value::Float(2.5))
        );
    }

    #[test]
    fn test_narrowing_rejected() {
        let schema = schema();
        let page = page(&schema);
        let view = PageView::new(&schema, &page);

        let err = view.column_as::<u16>("x1").unwrap_err();
        assert!(matches!(err, SddsError::TypeCoercion { .. }));
        assert!(view.parameter_as::<f32>("energy").is_err());
        assert!(view.parameter_as::<f64>("label").is_err());
        assert!(view.array_as::<i64>("grid").is_err());
    }

    #[test]
    fn test_get_value() {
        let schema = schema();
        let page = page(&schema);
        let value = get_value(&schema, &page, FieldKind::Column, "x2", 1, SddsType::Long64).unwrap();
        assert_eq!(value, Value::Long64(4));
        let value = get_value(&schema, &page, FieldKind::Array, "grid", 3, SddsType::Double).unwrap();
        assert_eq!(value, Value::Double(3.5));
        let value =
            get_value(&schema, &page, FieldKind::Parameter, "label", 0, SddsType::String).unwrap();
        assert_eq!(value, Value::String("k".into()));

        let err = get_value(&schema, &page, FieldKind::Column, "x2", 2, SddsType::Short).unwrap_err();
        assert!(matches!(err, SddsError::InvalidAttribute { .. }));
        let err = get_value(&schema, &page, FieldKind::Parameter, "energy", 0, SddsType::Long)
            .unwrap_err();
        assert!(matches!(err, SddsError::TypeCoercion { .. }));
    }

    #[test]
    fn test_filter_and_match_rows() {
        let mut schema = Schema::new();
        schema
            .define_column(FieldDef::new("x", SddsType::Double))
            .unwrap();
        schema
            .define_column(FieldDef::new("tag", SddsType::String))
            .unwrap();
        let mut page = Page::new(&schema, 1);
        page.rows = 4;
        page.columns = vec![
            ColumnData::Double(vec![0.5, 1.5, 2.5, 3.5]),
            ColumnData::String(vec!["bpm1".into(), "q1".into(), "bpm2".into(), "q2".into()]),
        ];

        let n = filter_rows(&schema, &mut page, "x", 1.0, 3.0, RowLogic::Replace, false).unwrap();
        assert_eq!(n, 2);
        assert_eq!(page.row_flags(), vec![false, true, true, false]);

        let n = match_rows(&schema, &mut page, "tag", "bpm*", RowLogic::And, false).unwrap();
        assert_eq!(n, 1);
        assert_eq!(page.row_flags(), vec![false, false, true, false]);

        let n = match_rows(&schema, &mut page, "tag", "q?", RowLogic::Or, true).unwrap();
        assert_eq!(n, 2);
        assert_eq!(page.row_flags(), vec![true, false, true, false]);

        let n = filter_rows(&schema, &mut page, "x", 1.0, 3.0, RowLogic::Replace, true).unwrap();
        assert_eq!(n, 2);
        assert_eq!(page.row_flags(), vec![true, false, false, true]);

        let err = filter_rows(&schema, &mut page, "tag", 0.0, 1.0, RowLogic::And, false)
            .unwrap_err();
        assert!(matches!(err, SddsError::TypeCoercion { .. }));
        let err = match_rows(&schema, &mut page, "x", "*", RowLogic::And, false).unwrap_err();
        assert!(matches!(err, SddsError::TypeCoercion { .. }));
        let err = match_rows(&schema, &mut page, "tag", "[", RowLogic::And, false).unwrap_err();
        assert!(matches!(err, SddsError::InvalidAttribute { .. }));
    }
}
