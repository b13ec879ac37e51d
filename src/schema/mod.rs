// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! Schema model.
//!
//! A [`Schema`] is the data dictionary of a dataset: description text,
//! three independent ordered namespaces of [`FieldDef`]s (parameters,
//! arrays, columns) and the [`DataMode`] of the page bodies.
//!
//! - [`parser`] - Namelist grammar and header reading
//! - [`writer`] - Header serialization

pub mod parser;
pub mod writer;

use std::fmt;
use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::core::{
    ByteOrder, Encoding, FormatSpec, MajorOrder, Result, SddsError, SddsType, Value,
};

pub use parser::{parse_header, read_header, Header};

/// The three field namespaces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldKind {
    Parameter,
    Array,
    Column,
}

impl FieldKind {
    /// All kinds, in header order.
    pub const ALL: [FieldKind; 3] = [FieldKind::Parameter, FieldKind::Array, FieldKind::Column];

    /// Namelist group name of this kind.
    pub fn as_str(&self) -> &'static str {
        match self {
            FieldKind::Parameter => "parameter",
            FieldKind::Array => "array",
            FieldKind::Column => "column",
        }
    }
}

impl fmt::Display for FieldKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Definition of one parameter, array or column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldDef {
    pub name: String,
    #[serde(rename = "type")]
    pub ty: SddsType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub symbol: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub units: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub format_string: Option<String>,
    /// Fixed ASCII field width; 0 means whitespace separated.
    pub field_length: i32,
    /// Number of array dimensions; ignored for parameters and columns.
    pub dimensions: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub group_name: Option<String>,
    /// Parameter value carried in the header instead of each page.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fixed_value: Option<String>,
}

impl FieldDef {
    /// Create a definition with only a name and a type.
    pub fn new(name: impl Into<String>, ty: SddsType) -> Self {
        Self {
            name: name.into(),
            ty,
            symbol: None,
            units: None,
            description: None,
            format_string: None,
            field_length: 0,
            dimensions: 1,
            group_name: None,
            fixed_value: None,
        }
    }

    /// Set the symbol.
    pub fn with_symbol(mut self, symbol: impl Into<String>) -> Self {
        self.symbol = Some(symbol.into());
        self
    }

    /// Set the units.
    pub fn with_units(mut self, units: impl Into<String>) -> Self {
        self.units = Some(units.into());
        self
    }

    /// Set the description.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Set the printf-style ASCII format.
    pub fn with_format(mut self, format: impl Into<String>) -> Self {
        self.format_string = Some(format.into());
        self
    }

    /// Set a fixed ASCII field width.
    pub fn with_field_length(mut self, field_length: i32) -> Self {
        self.field_length = field_length;
        self
    }

    /// Set the number of array dimensions.
    pub fn with_dimensions(mut self, dimensions: usize) -> Self {
        self.dimensions = dimensions;
        self
    }

    /// Set the array group name.
    pub fn with_group(mut self, group_name: impl Into<String>) -> Self {
        self.group_name = Some(group_name.into());
        self
    }

    /// Make a parameter constant, stored in the header.
    pub fn with_fixed_value(mut self, fixed_value: impl Into<String>) -> Self {
        self.fixed_value = Some(fixed_value.into());
        self
    }

    /// Width of a fixed-width ASCII field, if any.
    pub fn fixed_width(&self) -> Option<usize> {
        match self.field_length.unsigned_abs() as usize {
            0 => None,
            n => Some(n),
        }
    }

    /// Format used for ASCII output.
    pub fn format(&self) -> &str {
        self.format_string
            .as_deref()
            .unwrap_or_else(|| self.ty.default_format())
    }

    /// The fixed value parsed to this field's type.
    pub fn parsed_fixed_value(&self) -> Option<Result<Value>> {
        self.fixed_value.as_ref().map(|text| {
            Value::parse_as(self.ty, text)
                .map_err(|reason| SddsError::invalid_attribute(&self.name, "fixed_value", reason))
        })
    }

    fn validate(&self, kind: FieldKind, allow_any_name: bool) -> Result<()> {
        if self.name.is_empty() {
            return Err(SddsError::invalid_attribute("", "name", "empty name"));
        }
        if !allow_any_name && !is_valid_name(&self.name) {
            return Err(SddsError::invalid_attribute(
                &self.name,
                "name",
                "must start with a letter, '.' or ':' and contain only letters, digits and @:#+%-._$&/[]",
            ));
        }
        if let Some(format) = &self.format_string {
            FormatSpec::for_type(format, self.ty).map_err(|err| match err {
                SddsError::InvalidAttribute { reason, .. } => {
                    SddsError::invalid_attribute(&self.name, "format_string", reason)
                }
                other => other,
            })?;
        }
        match kind {
            FieldKind::Array if self.dimensions == 0 => Err(SddsError::invalid_attribute(
                &self.name,
                "dimensions",
                "arrays need at least one dimension",
            )),
            FieldKind::Parameter => match self.parsed_fixed_value() {
                Some(Err(err)) => Err(err),
                _ => Ok(()),
            },
            _ if self.fixed_value.is_some() => Err(SddsError::invalid_attribute(
                &self.name,
                "fixed_value",
                "only parameters can have a fixed value",
            )),
            _ => Ok(()),
        }
    }
}

/// Check a field name against the naming rule.
pub fn is_valid_name(name: &str) -> bool {
    static NAME_RULE: OnceLock<Regex> = OnceLock::new();
    NAME_RULE
        .get_or_init(|| {
            Regex::new(r"^[A-Za-z.:][A-Za-z0-9@:#+%\-._$&/\[\]]*$").expect("valid name pattern")
        })
        .is_match(name)
}

/// Dataset description text.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Description {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub contents: Option<String>,
}

impl Description {
    /// Check if neither text nor contents is set.
    pub fn is_empty(&self) -> bool {
        self.text.is_none() && self.contents.is_none()
    }
}

/// How page bodies are laid out.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataMode {
    pub encoding: Encoding,
    pub byte_order: ByteOrder,
    pub major_order: MajorOrder,
    /// ASCII pages carry no row count and end at a blank line.
    pub no_row_counts: bool,
    /// ASCII lines written per row.
    pub lines_per_row: usize,
    /// Lines to skip after the header before the first ASCII page.
    pub additional_header_lines: usize,
    /// ASCII field separator instead of whitespace.
    pub delimiter: Option<char>,
}

impl Default for DataMode {
    fn default() -> Self {
        Self {
            encoding: Encoding::Binary,
            byte_order: ByteOrder::native(),
            major_order: MajorOrder::Row,
            no_row_counts: false,
            lines_per_row: 1,
            additional_header_lines: 0,
            delimiter: None,
        }
    }
}

impl DataMode {
    /// ASCII mode with defaults.
    pub fn ascii() -> Self {
        Self {
            encoding: Encoding::Ascii,
            ..Self::default()
        }
    }

    /// Binary mode with defaults.
    pub fn binary() -> Self {
        Self::default()
    }
}

/// How strictly two schemas must agree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CompareMode {
    /// Every attribute must match.
    Strict,
    /// Only names, types and array dimensionality, in order.
    #[default]
    FormatOnly,
}

/// The data dictionary of a dataset.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Schema {
    description: Description,
    parameters: Vec<FieldDef>,
    arrays: Vec<FieldDef>,
    columns: Vec<FieldDef>,
    data_mode: DataMode,
    #[serde(skip)]
    allow_any_name: bool,
}

impl Schema {
    /// Create an empty schema in binary mode.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the description text.
    pub fn with_description(mut self, text: impl Into<String>) -> Self {
        self.description.text = Some(text.into());
        self
    }

    /// Set the description contents.
    pub fn with_contents(mut self, contents: impl Into<String>) -> Self {
        self.description.contents = Some(contents.into());
        self
    }

    /// Set the data mode.
    pub fn with_data_mode(mut self, data_mode: DataMode) -> Self {
        self.data_mode = data_mode;
        self
    }

    /// Replace the description.
    pub fn set_description(&mut self, description: Description) {
        self.description = description;
    }

    /// Lift the naming rule for fields defined from now on.
    pub fn set_allow_any_name(&mut self, allow: bool) {
        self.allow_any_name = allow;
    }

    /// The description.
    pub fn description(&self) -> &Description {
        &self.description
    }

    /// The data mode.
    pub fn data_mode(&self) -> &DataMode {
        &self.data_mode
    }

    /// Mutable access to the data mode.
    pub fn data_mode_mut(&mut self) -> &mut DataMode {
        &mut self.data_mode
    }

    /// Define a field, returning its index within its namespace.
    pub fn define(&mut self, kind: FieldKind, def: FieldDef) -> Result<usize> {
        def.validate(kind, self.allow_any_name)?;
        if self.index_of(kind, &def.name).is_some() {
            return Err(SddsError::duplicate_name(kind.as_str(), &def.name));
        }
        let fields = self.fields_mut(kind);
        fields.push(def);
        Ok(fields.len() - 1)
    }

    /// Define a parameter.
    pub fn define_parameter(&mut self, def: FieldDef) -> Result<usize> {
        self.define(FieldKind::Parameter, def)
    }

    /// Define an array.
    pub fn define_array(&mut self, def: FieldDef) -> Result<usize> {
        self.define(FieldKind::Array, def)
    }

    /// Define a column.
    pub fn define_column(&mut self, def: FieldDef) -> Result<usize> {
        self.define(FieldKind::Column, def)
    }

    /// Fields of one kind, in declaration order.
    pub fn fields(&self, kind: FieldKind) -> &[FieldDef] {
        match kind {
            FieldKind::Parameter => &self.parameters,
            FieldKind::Array => &self.arrays,
            FieldKind::Column => &self.columns,
        }
    }

    fn fields_mut(&mut self, kind: FieldKind) -> &mut Vec<FieldDef> {
        match kind {
            FieldKind::Parameter => &mut self.parameters,
            FieldKind::Array => &mut self.arrays,
            FieldKind::Column => &mut self.columns,
        }
    }

    /// Parameter definitions.
    pub fn parameters(&self) -> &[FieldDef] {
        &self.parameters
    }

    /// Array definitions.
    pub fn arrays(&self) -> &[FieldDef] {
        &self.arrays
    }

    /// Column definitions.
    pub fn columns(&self) -> &[FieldDef] {
        &self.columns
    }

    /// Index of a named field.
    pub fn index_of(&self, kind: FieldKind, name: &str) -> Option<usize> {
        self.fields(kind).iter().position(|f| f.name == name)
    }

    /// Definition of a named field.
    pub fn lookup(&self, kind: FieldKind, name: &str) -> Result<&FieldDef> {
        self.fields(kind)
            .iter()
            .find(|f| f.name == name)
            .ok_or_else(|| SddsError::not_found(kind.as_str(), name))
    }

    /// A copy holding only the fields of `kind` at `indices`, in that order.
    pub fn select(&self, kind: FieldKind, indices: &[usize]) -> Schema {
        let mut selected = self.clone();
        let source = self.fields(kind);
        *selected.fields_mut(kind) = indices
            .iter()
            .filter_map(|&i| source.get(i).cloned())
            .collect();
        selected
    }

    /// Check that `other` describes the same layout.
    pub fn compare(&self, other: &Schema, mode: CompareMode) -> Result<()> {
        for kind in FieldKind::ALL {
            let ours = self.fields(kind);
            let theirs = other.fields(kind);
            if ours.len() != theirs.len() {
                return Err(SddsError::schema_mismatch(format!(
                    "{} {kind}s vs {}",
                    ours.len(),
                    theirs.len()
                )));
            }
            for (index, (a, b)) in ours.iter().zip(theirs).enumerate() {
                let differs = |what: &str| {
                    SddsError::schema_mismatch(format!(
                        "{kind} {index} ('{}'): {what} differs",
                        a.name
                    ))
                };
                if a.name != b.name {
                    return Err(differs("name"));
                }
                if a.ty != b.ty {
                    return Err(differs("type"));
                }
                if kind == FieldKind::Array && a.dimensions != b.dimensions {
                    return Err(differs("dimensions"));
                }
                if kind == FieldKind::Parameter && a.fixed_value.is_some() != b.fixed_value.is_some()
                {
                    return Err(differs("fixed_value"));
                }
                if mode == CompareMode::Strict {
                    if a.units != b.units {
                        return Err(differs("units"));
                    }
                    if a.symbol != b.symbol {
                        return Err(differs("symbol"));
                    }
                    if a.format_string != b.format_string {
                        return Err(differs("format_string"));
                    }
                    if a.description != b.description {
                        return Err(differs("description"));
                    }
                    if a.field_length != b.field_length {
                        return Err(differs("field_length"));
                    }
                    if a.group_name != b.group_name {
                        return Err(differs("group_name"));
                    }
                    if a.fixed_value != b.fixed_value {
                        return Err(differs("fixed_value"));
                    }
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Schema {
        let mut schema = Schema::new();
        schema
            .define_parameter(FieldDef::new("shortParam", SddsType::Short))
            .unwrap();
        schema
            .define_array(FieldDef::new("grid", SddsType::Double).with_dimensions(2))
            .unwrap();
        schema
            .define_column(FieldDef::new("x", SddsType::Double).with_units("m"))
            .unwrap();
        schema
    }

    #[test]
    fn test_define_and_lookup() {
        let schema = sample();
        assert_eq!(schema.index_of(FieldKind::Column, "x"), Some(0));
        assert_eq!(schema.lookup(FieldKind::Column, "x").unwrap().ty, SddsType::Double);
        let err = schema.lookup(FieldKind::Column, "y").unwrap_err();
        assert!(matches!(err, SddsError::NotFound { .. }));
    }

    #[test]
    fn test_duplicate_names_per_namespace() {
        let mut schema = sample();
        let err = schema
            .define_column(FieldDef::new("x", SddsType::Long))
            .unwrap_err();
        assert!(matches!(err, SddsError::DuplicateName { .. }));
        // Namespaces are independent.
        assert!(schema
            .define_parameter(FieldDef::new("x", SddsType::Long))
            .is_ok());
    }

    #[test]
    fn test_name_rule() {
        assert!(is_valid_name("shortParam"));
        assert!(is_valid_name(".hidden"));
        assert!(is_valid_name("a[1]/b:c$d"));
        assert!(!is_valid_name("1abc"));
        assert!(!is_valid_name("has space"));

        let mut schema = Schema::new();
        let err = schema
            .define_column(FieldDef::new("bad name", SddsType::Double))
            .unwrap_err();
        assert!(matches!(err, SddsError::InvalidAttribute { .. }));
        schema.set_allow_any_name(true);
        assert!(schema
            .define_column(FieldDef::new("bad name", SddsType::Double))
            .is_ok());
    }

    #[test]
    fn test_attribute_validation() {
        let mut schema = Schema::new();
        assert!(schema
            .define_column(FieldDef::new("x", SddsType::Long).with_format("%f"))
            .is_err());
        assert!(schema
            .define_array(FieldDef::new("a", SddsType::Long).with_dimensions(0))
            .is_err());
        assert!(schema
            .define_parameter(FieldDef::new("p", SddsType::Short).with_fixed_value("abc"))
            .is_err());
        assert!(schema
            .define_column(FieldDef::new("c", SddsType::Short).with_fixed_value("1"))
            .is_err());
        assert!(schema
            .define_parameter(FieldDef::new("p", SddsType::Short).with_fixed_value("12"))
            .is_ok());
    }

    #[test]
    fn test_compare_modes() {
        let a = sample();
        let mut b = Schema::new();
        b.define_parameter(FieldDef::new("shortParam", SddsType::Short))
            .unwrap();
        b.define_array(FieldDef::new("grid", SddsType::Double).with_dimensions(2))
            .unwrap();
        b.define_column(FieldDef::new("x", SddsType::Double).with_units("mm"))
            .unwrap();
        assert!(a.compare(&b, CompareMode::FormatOnly).is_ok());
        let err = a.compare(&b, CompareMode::Strict).unwrap_err();
        assert!(err.to_string().contains("units"));

        let mut c = sample();
        c.define_column(FieldDef::new("y", SddsType::Double)).unwrap();
        assert!(a.compare(&c, CompareMode::FormatOnly).is_err());
    }

    #[test]
    fn test_select() {
        let mut schema = sample();
        schema.define_column(FieldDef::new("y", SddsType::Long)).unwrap();
        let selected = schema.select(FieldKind::Column, &[1]);
        assert_eq!(selected.columns().len(), 1);
        assert_eq!(selected.columns()[0].name, "y");
        assert_eq!(selected.parameters().len(), 1);
    }

    #[test]
    fn test_field_format_default() {
        let def = FieldDef::new("x", SddsType::Double);
        assert_eq!(def.format(), "%21.15e");
        assert_eq!(def.fixed_width(), None);
        assert_eq!(def.clone().with_field_length(-8).fixed_width(), Some(8));
    }
}
