//! Delimited-file I/O for datasets, shards, and the compiled output.
//!
//! Source files carry a header row. Shard and compiled files are keyed by a
//! leading `id` column holding the global row index.

use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;

use crate::dataset::{Dataset, Row, Value, ID_COLUMN};
use crate::error::{Result, RowfillError};

/// Buffer size for file-backed readers and writers.
pub const DEFAULT_BUFFER_SIZE: usize = 64 * 1024;

/// Read a headed CSV file into a dataset.
pub fn read_dataset(path: &Path) -> Result<Dataset> {
    let file = File::open(path).map_err(|e| RowfillError::Output {
        message: format!("opening {}", path.display()),
        source: e,
    })?;
    read_dataset_from(BufReader::with_capacity(DEFAULT_BUFFER_SIZE, file))
}

/// Read a headed CSV stream into a dataset.
pub fn read_dataset_from<R: Read>(reader: R) -> Result<Dataset> {
    let mut rdr = ::csv::ReaderBuilder::new().has_headers(true).from_reader(reader);
    let columns: Vec<String> = rdr
        .headers()
        .map_err(|e| RowfillError::Csv {
            message: "reading header".to_string(),
            source: e,
        })?
        .iter()
        .map(|h| h.to_string())
        .collect();

    let mut dataset = Dataset::new(columns);
    for (row_index, record) in rdr.records().enumerate() {
        let record = record.map_err(|e| RowfillError::Csv {
            message: format!("reading row {}", row_index),
            source: e,
        })?;
        let row: Row = dataset
            .columns
            .iter()
            .zip(record.iter())
            .map(|(col, cell)| (col.clone(), Value::from_cell(cell)))
            .collect();
        dataset.rows.push(row);
    }
    Ok(dataset)
}

/// Read a compiled file, validating and dropping the leading `id` column.
///
/// Fields are split by position: the first is the global index and the rest
/// map onto the remaining header names, so a source column that is itself
/// called `id` survives. Ids must run densely from 0 in file order; a gap or
/// repeat means shards were concatenated out of order or twice.
pub fn read_indexed_dataset(path: &Path) -> Result<Dataset> {
    let file = File::open(path).map_err(|e| RowfillError::Output {
        message: format!("opening {}", path.display()),
        source: e,
    })?;
    let mut rdr = ::csv::ReaderBuilder::new()
        .has_headers(true)
        .from_reader(BufReader::with_capacity(DEFAULT_BUFFER_SIZE, file));

    let header = rdr.headers().map_err(|e| RowfillError::Csv {
        message: format!("reading header of {}", path.display()),
        source: e,
    })?;
    if header.get(0) != Some(ID_COLUMN) {
        return Err(RowfillError::Data {
            message: format!(
                "{} does not start with an '{}' column",
                path.display(),
                ID_COLUMN
            ),
        });
    }

    let mut dataset = Dataset::new(header.iter().skip(1).map(str::to_string).collect());
    for (expected, record) in rdr.records().enumerate() {
        let record = record.map_err(|e| RowfillError::Csv {
            message: format!("reading {} at line {}", path.display(), expected + 2),
            source: e,
        })?;
        let id = record.get(0).and_then(|s| s.parse::<usize>().ok());
        if id != Some(expected) {
            return Err(RowfillError::Data {
                message: format!(
                    "{}: expected id {} at line {}, found {:?}",
                    path.display(),
                    expected,
                    expected + 2,
                    record.get(0)
                ),
            });
        }
        let row: Row = dataset
            .columns
            .iter()
            .zip(record.iter().skip(1))
            .map(|(col, cell)| (col.clone(), Value::from_cell(cell)))
            .collect();
        dataset.rows.push(row);
    }
    Ok(dataset)
}

/// Open a buffered CSV writer over a new file.
pub fn create_writer(path: &Path) -> Result<::csv::Writer<BufWriter<File>>> {
    let file = File::create(path).map_err(|e| RowfillError::Output {
        message: format!("creating {}", path.display()),
        source: e,
    })?;
    Ok(::csv::WriterBuilder::new()
        .has_headers(false)
        .from_writer(BufWriter::with_capacity(DEFAULT_BUFFER_SIZE, file)))
}

/// Write the `id` header followed by the dataset columns.
pub fn write_indexed_header<W: Write>(writer: &mut ::csv::Writer<W>, columns: &[String]) -> Result<()> {
    let header = std::iter::once(ID_COLUMN).chain(columns.iter().map(String::as_str));
    writer.write_record(header).map_err(|e| RowfillError::Csv {
        message: "writing header".to_string(),
        source: e,
    })
}

/// Write rows keyed by consecutive global indices starting at `start_index`.
///
/// Cells are emitted in `columns` order; a column absent from a row is
/// written empty.
pub fn write_indexed_rows<W: Write>(
    writer: &mut ::csv::Writer<W>,
    columns: &[String],
    start_index: usize,
    rows: &[Row],
) -> Result<()> {
    let mut record = Vec::with_capacity(columns.len() + 1);
    for (offset, row) in rows.iter().enumerate() {
        let index = start_index + offset;
        record.clear();
        record.push(index.to_string());
        record.extend(
            columns
                .iter()
                .map(|col| row.get(col).map(Value::to_csv_string).unwrap_or_default()),
        );
        writer.write_record(&record).map_err(|e| RowfillError::Csv {
            message: format!("writing row {}", index),
            source: e,
        })?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_dataset_from_keeps_header_order() {
        let data = "order_id,discount,customer\nCA-2014-10,0.2,\"Doe, Jane\"\n";
        let ds = read_dataset_from(data.as_bytes()).unwrap();
        assert_eq!(ds.columns, vec!["order_id", "discount", "customer"]);
        assert_eq!(ds.rows[0]["customer"].as_str(), Some("Doe, Jane"));
    }

    #[test]
    fn test_ragged_row_is_rejected() {
        let data = "a,b\n1,2\n3\n";
        assert!(read_dataset_from(data.as_bytes()).is_err());
    }

    #[test]
    fn test_indexed_write_then_read() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("compiled.csv");
        let columns = vec!["a".to_string(), "b".to_string()];
        let rows: Vec<Row> = (0..3)
            .map(|i| {
                let mut r = Row::new();
                r.insert("a".to_string(), Value::from_cell(&i.to_string()));
                r.insert("b".to_string(), Value::Float(0.5));
                r
            })
            .collect();

        let mut w = create_writer(&path).unwrap();
        write_indexed_header(&mut w, &columns).unwrap();
        write_indexed_rows(&mut w, &columns, 0, &rows).unwrap();
        w.flush().unwrap();
        drop(w);

        let ds = read_indexed_dataset(&path).unwrap();
        assert_eq!(ds.columns, columns);
        assert_eq!(ds.len(), 3);
        assert_eq!(ds.rows[2]["a"].as_str(), Some("2"));
    }

    #[test]
    fn test_indexed_read_rejects_gap() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("compiled.csv");
        std::fs::write(&path, "id,a\n0,x\n2,y\n").unwrap();
        let err = read_indexed_dataset(&path).unwrap_err();
        assert!(format!("{}", err).contains("expected id 1"));
    }

    #[test]
    fn test_indexed_read_keeps_source_id_column() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("compiled.csv");
        std::fs::write(&path, "id,id,a\n0,5000,x\n1,5001,y\n").unwrap();

        let ds = read_indexed_dataset(&path).unwrap();
        assert_eq!(ds.columns, vec!["id", "a"]);
        assert_eq!(ds.rows[0]["id"].as_str(), Some("5000"));
        assert_eq!(ds.rows[1]["id"].as_str(), Some("5001"));
        assert_eq!(ds.rows[1]["a"].as_str(), Some("y"));
    }
}
