//! # Transfer Format Serialization
//!
//! Renders a fetched row set into CSV: one header line, one line per row,
//! fields quoted per standard CSV rules so embedded delimiters, quotes, and
//! newlines survive. Cell values render via their natural text form
//! (`CellValue::render`).

use bridge_traits::source::RowSet;
use bytes::Bytes;

use crate::error::{ExportError, Result};

/// Serialize a row set to an in-memory CSV buffer.
///
/// The writer targets a `Vec<u8>`, so this cannot fail for any row
/// content; errors here indicate a bug, not bad data.
pub fn to_csv(rows: &RowSet) -> Result<Bytes> {
    let mut writer = csv::Writer::from_writer(Vec::new());

    writer
        .write_record(&rows.columns)
        .map_err(|e| ExportError::Serialize(e.to_string()))?;

    for row in &rows.rows {
        let record: Vec<String> = row.iter().map(|cell| cell.render()).collect();
        writer
            .write_record(&record)
            .map_err(|e| ExportError::Serialize(e.to_string()))?;
    }

    let buffer = writer
        .into_inner()
        .map_err(|e| ExportError::Serialize(e.to_string()))?;

    Ok(Bytes::from(buffer))
}

#[cfg(test)]
mod tests {
    use super::*;
    use bridge_traits::source::CellValue;

    fn row_set(columns: &[&str], rows: Vec<Vec<CellValue>>) -> RowSet {
        RowSet::new(columns.iter().map(|c| c.to_string()).collect(), rows)
    }

    #[test]
    fn test_comma_in_field_is_quoted() {
        let rows = row_set(
            &["id", "total"],
            vec![
                vec![CellValue::Integer(1), CellValue::Text("9.99".into())],
                vec![CellValue::Integer(2), CellValue::Text("5,00".into())],
            ],
        );

        let bytes = to_csv(&rows).unwrap();
        assert_eq!(&bytes[..], b"id,total\n1,9.99\n2,\"5,00\"\n");
    }

    #[test]
    fn test_null_renders_empty() {
        let rows = row_set(
            &["id", "note"],
            vec![vec![CellValue::Integer(1), CellValue::Null]],
        );

        let bytes = to_csv(&rows).unwrap();
        assert_eq!(&bytes[..], b"id,note\n1,\n");
    }

    #[test]
    fn test_round_trip() {
        let rows = row_set(
            &["id", "name", "note"],
            vec![
                vec![
                    CellValue::Integer(1),
                    CellValue::Text("plain".into()),
                    CellValue::Text("has \"quotes\"".into()),
                ],
                vec![
                    CellValue::Integer(2),
                    CellValue::Text("multi\nline".into()),
                    CellValue::Text("a,b,c".into()),
                ],
            ],
        );

        let bytes = to_csv(&rows).unwrap();

        let mut reader = csv::Reader::from_reader(&bytes[..]);
        let headers: Vec<String> = reader
            .headers()
            .unwrap()
            .iter()
            .map(|h| h.to_string())
            .collect();
        assert_eq!(headers, rows.columns);

        let parsed: Vec<Vec<String>> = reader
            .records()
            .map(|r| r.unwrap().iter().map(|f| f.to_string()).collect())
            .collect();

        let expected: Vec<Vec<String>> = rows
            .rows
            .iter()
            .map(|row| row.iter().map(|cell| cell.render()).collect())
            .collect();

        assert_eq!(parsed, expected);
    }

    #[test]
    fn test_header_only_set_serializes_header() {
        let rows = row_set(&["id", "total"], vec![]);
        let bytes = to_csv(&rows).unwrap();
        assert_eq!(&bytes[..], b"id,total\n");
    }
}
