// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! Recovery from damaged files and appending to existing ones.

mod common;

use std::io::Write as _;

use common::{assert_demo, demo_schema, fill_demo, read_pages, write_demo};
use sdds::{
    ColumnData, DataMode, DatasetConfig, DatasetReader, DatasetWriter, ReadOutcome, SddsError,
    Value, WriteMode, WriterBuilder,
};

fn truncate(path: &std::path::Path, remove: u64) {
    let len = std::fs::metadata(path).unwrap().len();
    let file = std::fs::OpenOptions::new().write(true).open(path).unwrap();
    file.set_len(len - remove).unwrap();
}

#[test]
fn test_truncated_binary_recovers_complete_pages() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("cut.sdds");
    write_demo(&path, DataMode::binary());
    // Last row of page 2 is a short plus a double.
    truncate(&path, 5);

    let mut strict = DatasetReader::open(&path).unwrap();
    assert_eq!(strict.read_next_page().unwrap(), ReadOutcome::Page(1));
    let err = strict.read_next_page().unwrap_err();
    match &err {
        SddsError::DataFormat {
            page, field, element, ..
        } => {
            assert_eq!(*page, 2);
            assert_eq!(field, "doubleCol");
            assert_eq!(*element, 2);
        }
        other => panic!("unexpected error {other:?}"),
    }
    assert_eq!(strict.read_next_page().unwrap(), ReadOutcome::End);

    let mut lenient =
        DatasetReader::open_with_config(&path, DatasetConfig::default().with_recover(true)).unwrap();
    assert_eq!(lenient.read_next_page().unwrap(), ReadOutcome::Page(1));
    assert_eq!(lenient.read_next_page().unwrap(), ReadOutcome::Truncated(2));
    assert!(lenient.truncated());
    let page = lenient.take_page().unwrap();
    assert_eq!(page.rows(), 2);
    assert_eq!(page.parameters()[1], Value::String("SecondPage".into()));
    assert_eq!(lenient.read_next_page().unwrap(), ReadOutcome::End);
}

#[test]
fn test_truncated_column_major_keeps_no_rows() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("cut.sdds");
    write_demo(
        &path,
        DataMode {
            major_order: sdds::MajorOrder::Column,
            ..DataMode::binary()
        },
    );
    truncate(&path, 1);

    let mut reader =
        DatasetReader::open_with_config(&path, DatasetConfig::default().with_recover(true)).unwrap();
    assert_eq!(reader.read_next_page().unwrap(), ReadOutcome::Page(1));
    assert_eq!(reader.read_next_page().unwrap(), ReadOutcome::Truncated(2));
    assert_eq!(reader.page().unwrap().rows(), 0);
}

#[test]
fn test_corrupt_gzip_stream() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("demo.sdds.gz");
    write_demo(&path, DataMode::binary());
    let mut bytes = std::fs::read(&path).unwrap();
    let middle = bytes.len() / 2;
    for byte in &mut bytes[middle..] {
        *byte = !*byte;
    }
    std::fs::write(&path, bytes).unwrap();

    let mut reader = match DatasetReader::open(&path) {
        Ok(reader) => reader,
        Err(err) => {
            assert!(
                matches!(err, SddsError::CorruptStream { .. }) || err.is_header_error(),
                "unexpected error {err:?}"
            );
            return;
        }
    };
    let mut failure = None;
    loop {
        match reader.read_next_page() {
            Ok(ReadOutcome::End) => break,
            Ok(_) => {}
            Err(err) => {
                failure = Some(err);
                break;
            }
        }
    }
    let err = failure.expect("corruption must be reported");
    assert!(
        matches!(err, SddsError::CorruptStream { .. } | SddsError::DataFormat { .. }),
        "unexpected error {err:?}"
    );
}

#[test]
fn test_append_pages() {
    let dir = tempfile::tempdir().unwrap();
    for mode in [DataMode::ascii(), DataMode::binary()] {
        let path = dir.path().join("append.sdds");
        let mut writer = DatasetWriter::create(&path, demo_schema(mode.clone())).unwrap();
        fill_demo(&mut writer).unwrap();
        writer.close().unwrap();

        let mut writer = WriterBuilder::new()
            .target(&path)
            .schema(demo_schema(mode))
            .mode(WriteMode::Append)
            .build()
            .unwrap();
        assert_eq!(writer.pages_written(), 2);
        fill_demo(&mut writer).unwrap();
        writer.close().unwrap();

        let pages = read_pages(&path);
        assert_eq!(pages.len(), 4);
        assert_demo(&pages[..2]);
        assert_eq!(pages[3].number(), 4);
        assert_eq!(pages[2].parameters(), pages[0].parameters());
        assert_eq!(pages[3].columns(), pages[1].columns());
    }
}

#[test]
fn test_append_after_damaged_ascii_page() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("damaged.sdds");
    write_demo(&path, DataMode::ascii());
    // A third page cut off mid-row, without a trailing newline.
    let mut file = std::fs::OpenOptions::new().append(true).open(&path).unwrap();
    file.write_all(b"! page number 3\n12\nThirdPage\n4\n1 1.0\n2").unwrap();
    drop(file);

    let mut writer = DatasetWriter::append(&path, &demo_schema(DataMode::ascii())).unwrap();
    assert_eq!(writer.pages_written(), 2);
    writer.start_page(1).unwrap();
    writer.set_parameter("shortParam", 13i16).unwrap();
    writer.set_parameter("stringParam", "Appended").unwrap();
    writer
        .append_row(&[Value::Short(7), Value::Double(0.5)])
        .unwrap();
    writer.end_page().unwrap();
    writer.close().unwrap();

    let pages = read_pages(&path);
    assert_eq!(pages.len(), 3);
    assert_demo(&pages[..2]);
    assert_eq!(pages[2].parameters()[1], Value::String("Appended".into()));
    assert_eq!(pages[2].rows(), 1);
}

#[test]
fn test_append_to_last_page_in_batches() {
    let dir = tempfile::tempdir().unwrap();
    for mode in [DataMode::ascii(), DataMode::binary()] {
        let path = dir.path().join("log.sdds");
        write_demo(&path, mode.clone());
        // Damage after the last complete page is dropped first.
        let mut file = std::fs::OpenOptions::new().append(true).open(&path).unwrap();
        file.write_all(&[0x02, 0x00]).unwrap();
        drop(file);

        let mut writer = WriterBuilder::new()
            .target(&path)
            .schema(demo_schema(mode))
            .mode(WriteMode::AppendToPage)
            .build()
            .unwrap();
        assert_eq!(writer.pages_written(), 1);
        let present = writer.rows_in_page();
        assert_eq!(present, 3);
        for (i, value) in [7i16, 8].into_iter().enumerate() {
            writer
                .set_row_values(
                    present + i,
                    &[
                        ("shortCol", Value::Short(value)),
                        ("doubleCol", Value::Double(f64::from(value))),
                    ],
                )
                .unwrap();
            writer.update_page().unwrap();
            let pages = read_pages(&path);
            assert_eq!(pages.len(), 2);
            assert_eq!(pages[1].rows(), present + i + 1);
        }
        writer.close().unwrap();

        let pages = read_pages(&path);
        assert_eq!(pages.len(), 2);
        assert_eq!(pages[0], read_demo_page(0));
        assert_eq!(
            pages[1].columns()[0],
            ColumnData::Short(vec![-1, 0, 32767, 7, 8])
        );
        assert_eq!(
            pages[1].parameters()[1],
            Value::String("SecondPage".into())
        );
    }
}

/// Page `index` of a freshly written demo dataset.
fn read_demo_page(index: usize) -> sdds::Page {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("fresh.sdds");
    write_demo(&path, DataMode::binary());
    read_pages(&path).swap_remove(index)
}

