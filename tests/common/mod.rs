// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! Common utilities for integration tests.

#![allow(dead_code)]

use std::path::Path;

use sdds::{
    ColumnData, DataMode, DatasetReader, DatasetWriter, FieldDef, Page, Result, Schema, SddsType,
    Value, WriterBuilder,
};

// ============================================================================
// Demo Dataset
// ============================================================================

/// Parameter values per page: (shortParam, stringParam).
pub const DEMO_PARAMETERS: [(i16, &str); 2] = [(10, "FirstPage"), (11, "SecondPage")];

/// Short column per page.
pub fn demo_short_columns() -> Vec<Vec<i16>> {
    vec![vec![1, 2, 3, 4, 5], vec![-1, 0, 32767]]
}

/// Double column per page; every value is exact in ASCII.
pub fn demo_double_columns() -> Vec<Vec<f64>> {
    vec![
        vec![1.5, -2.25, 0.0, 1.0e3, 6.02e23],
        vec![-0.125, 3.0, 1.0e-10],
    ]
}

/// Schema of the demo dataset in the given data mode.
pub fn demo_schema(mode: DataMode) -> Schema {
    let mut schema = Schema::new()
        .with_description("Demo dataset")
        .with_contents("integration fixture")
        .with_data_mode(mode);
    schema
        .define_parameter(FieldDef::new("shortParam", SddsType::Short).with_units("A"))
        .unwrap();
    schema
        .define_parameter(FieldDef::new("stringParam", SddsType::String))
        .unwrap();
    schema
        .define_column(FieldDef::new("shortCol", SddsType::Short))
        .unwrap();
    schema
        .define_column(FieldDef::new("doubleCol", SddsType::Double).with_units("m"))
        .unwrap();
    schema
}

/// Write the two demo pages through an open writer.
pub fn fill_demo(writer: &mut DatasetWriter) -> Result<()> {
    let shorts = demo_short_columns();
    let doubles = demo_double_columns();
    for (page, (short_param, string_param)) in DEMO_PARAMETERS.iter().enumerate() {
        writer.start_page(shorts[page].len())?;
        writer.set_parameter("shortParam", *short_param)?;
        writer.set_parameter("stringParam", *string_param)?;
        writer.set_column("shortCol", shorts[page].clone())?;
        writer.set_column("doubleCol", doubles[page].clone())?;
        writer.end_page()?;
    }
    Ok(())
}

/// Write the demo dataset to `path`.
pub fn write_demo(path: &Path, mode: DataMode) {
    let mut writer = WriterBuilder::new()
        .target(path)
        .schema(demo_schema(mode))
        .build()
        .unwrap();
    fill_demo(&mut writer).unwrap();
    writer.close().unwrap();
}

/// Read every page of a dataset.
pub fn read_pages(path: &Path) -> Vec<Page> {
    DatasetReader::open(path)
        .unwrap()
        .pages()
        .collect::<Result<_>>()
        .unwrap()
}

/// Assert that `pages` hold exactly the demo values.
pub fn assert_demo(pages: &[Page]) {
    let shorts = demo_short_columns();
    let doubles = demo_double_columns();
    assert_eq!(pages.len(), 2);
    for (i, page) in pages.iter().enumerate() {
        assert_eq!(page.number(), i + 1);
        assert_eq!(page.rows(), shorts[i].len());
        assert_eq!(
            page.parameters(),
            &[
                Value::Short(DEMO_PARAMETERS[i].0),
                Value::String(DEMO_PARAMETERS[i].1.to_string())
            ]
        );
        assert_eq!(page.columns()[0], ColumnData::Short(shorts[i].clone()));
        assert_eq!(page.columns()[1], ColumnData::Double(doubles[i].clone()));
    }
}

// ============================================================================
// Every Type
// ============================================================================

/// Schema with one column of every type plus a 2-D array.
pub fn all_types_schema(mode: DataMode) -> Schema {
    let mut schema = Schema::new().with_data_mode(mode);
    for ty in SddsType::ALL {
        schema
            .define_column(FieldDef::new(format!("{ty}Col"), ty))
            .unwrap();
        schema
            .define_parameter(FieldDef::new(format!("{ty}Param"), ty))
            .unwrap();
    }
    schema
        .define_array(FieldDef::new("grid", SddsType::Long).with_dimensions(2))
        .unwrap();
    schema
}

/// Three sample values of a type, including extremes.
#[allow(overflowing_literals)]
pub fn samples(ty: SddsType) -> ColumnData {
    match ty {
        SddsType::LongDouble => ColumnData::LongDouble(vec![std::f64::consts::E, -1e300, 5e-324]),
        SddsType::Double => ColumnData::Double(vec![std::f64::consts::PI, f64::MAX, -0.0]),
        SddsType::Float => ColumnData::Float(vec![1.25, f32::MIN_POSITIVE, -3.5e38]),
        SddsType::Long64 => ColumnData::Long64(vec![i64::MIN, 0, i64::MAX]),
        SddsType::ULong64 => ColumnData::ULong64(vec![0, 1, u64::MAX]),
        SddsType::Long => ColumnData::Long(vec![i32::MIN, -1, i32::MAX]),
        SddsType::ULong => ColumnData::ULong(vec![0, 7, u32::MAX]),
        SddsType::Short => ColumnData::Short(vec![i16::MIN, 42, i16::MAX]),
        SddsType::UShort => ColumnData::UShort(vec![0, 1000, u16::MAX]),
        SddsType::String => ColumnData::String(vec![
            String::new(),
            "two words".to_string(),
            "quote \" and \\ and !".to_string(),
        ]),
        SddsType::Character => ColumnData::Character(vec![b'a', b' ', b'\n']),
    }
}

/// Write one page with [`samples`] in every column and parameter.
pub fn fill_all_types(writer: &mut DatasetWriter) -> Result<()> {
    writer.start_page(3)?;
    for ty in SddsType::ALL {
        let data = samples(ty);
        if let Some(first) = data.get(1) {
            writer.set_parameter(&format!("{ty}Param"), first)?;
        }
        writer.set_column(&format!("{ty}Col"), data)?;
    }
    let grid = sdds::ArrayData::new(vec![2, 3], ColumnData::Long(vec![1, 2, 3, 4, 5, 6]))?;
    writer.set_array("grid", grid)?;
    writer.end_page()
}
