//! Tabular rows as ordered column maps.
//!
//! Landmark tables and fixation logs are handled as [`Record`]s: one JSON
//! object per row, keyed by column name, in column order. Cells may hold
//! numbers, numeric strings, empty strings, a missing-value marker, or null.

use std::path::Path;

use serde_json::Value;

use crate::error::Result;

pub type Record = serde_json::Map<String, Value>;

/// Read a table stored as a JSON array of row objects.
pub fn read_records<P: AsRef<Path>>(path: P) -> Result<Vec<Record>> {
    let content = std::fs::read_to_string(path)?;
    Ok(serde_json::from_str(&content)?)
}

/// Write rows as a pretty-printed JSON array, keeping column order.
pub fn write_records<P: AsRef<Path>>(path: P, records: &[Record]) -> Result<()> {
    let content = serde_json::to_string_pretty(records)?;
    std::fs::write(path, content)?;
    Ok(())
}

/// Numeric value of a cell, or `None` if it is absent, empty, the missing
/// marker, unparsable, or NaN.
pub fn number_cell(record: &Record, column: &str, missing_marker: Option<&str>) -> Option<f64> {
    let value = match record.get(column)? {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => {
            let s = s.trim();
            if s.is_empty() || Some(s) == missing_marker {
                return None;
            }
            s.parse::<f64>().ok()?
        }
        Value::Bool(_) | Value::Null | Value::Array(_) | Value::Object(_) => return None,
    };
    if value.is_nan() {
        None
    } else {
        Some(value)
    }
}

/// Text of a cell; numbers are rendered the way they appear in the table.
pub fn text_cell(record: &Record, column: &str) -> Option<String> {
    match record.get(column)? {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(value: Value) -> Record {
        match value {
            Value::Object(map) => map,
            other => panic!("not an object: {other}"),
        }
    }

    #[test]
    fn numbers_and_numeric_strings() {
        let r = record(json!({"a": 1.5, "b": " 42 ", "c": ".", "d": "", "e": null, "f": "abc"}));
        assert_eq!(number_cell(&r, "a", None), Some(1.5));
        assert_eq!(number_cell(&r, "b", None), Some(42.0));
        assert_eq!(number_cell(&r, "c", Some(".")), None);
        assert_eq!(number_cell(&r, "d", None), None);
        assert_eq!(number_cell(&r, "e", None), None);
        assert_eq!(number_cell(&r, "f", None), None);
        assert_eq!(number_cell(&r, "missing", None), None);
    }

    #[test]
    fn nan_strings_are_missing() {
        let r = record(json!({"x": "NaN"}));
        assert_eq!(number_cell(&r, "x", None), None);
    }

    #[test]
    fn tables_keep_column_order_on_disk() {
        let path = std::env::temp_dir().join(format!("gaze-aoi-records-{}.json", std::process::id()));
        let rows = vec![record(json!({"z": 1, "a": "face.jpg", "m": "."}))];
        write_records(&path, &rows).unwrap();
        let back = read_records(&path).unwrap();
        std::fs::remove_file(&path).ok();

        let columns: Vec<&String> = back[0].keys().collect();
        assert_eq!(columns, ["z", "a", "m"]);
        assert_eq!(back, rows);
    }

    #[test]
    fn malformed_table_is_a_json_error() {
        let path = std::env::temp_dir().join(format!("gaze-aoi-bad-{}.json", std::process::id()));
        std::fs::write(&path, "{\"not\": \"an array\"}").unwrap();
        let err = read_records(&path).unwrap_err();
        std::fs::remove_file(&path).ok();
        assert!(matches!(err, crate::error::Error::Json(_)));

        let missing = read_records(std::env::temp_dir().join("gaze-aoi-no-such-table.json"));
        assert!(matches!(missing, Err(crate::error::Error::Io(_))));
    }

    #[test]
    fn text_cells() {
        let r = record(json!({"name": "face01.jpg", "frame": 12, "blank": "  "}));
        assert_eq!(text_cell(&r, "name").as_deref(), Some("face01.jpg"));
        assert_eq!(text_cell(&r, "frame").as_deref(), Some("12"));
        assert_eq!(text_cell(&r, "blank"), None);
    }
}
