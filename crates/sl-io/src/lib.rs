#![forbid(unsafe_code)]

//! Tabular ingestion/egress boundary.
//!
//! The core links and summarizes tables; it does not parse spreadsheet
//! file formats. Callers convert workbook sheets to CSV-shaped text (one
//! header row, comma separated) before entry, and take CSV text back out
//! for download buttons and exports.

use std::path::{Path, PathBuf};

use csv::{ReaderBuilder, WriterBuilder};
use sl_table::{Column, Table, TableError};
use sl_types::{infer_dtype, DType, NullKind, Scalar};
use thiserror::Error;

/// Minimum column count expected of an uploaded allotment table.
pub const CANDIDATE_MIN_COLUMNS: usize = 7;

#[derive(Debug, Error)]
pub enum IoError {
    #[error("csv input has no headers")]
    MissingHeaders,
    #[error("reference file '{}' is missing", path.display())]
    MissingReference { path: PathBuf },
    #[error("expected at least {expected} columns, found {found}")]
    TooFewColumns { found: usize, expected: usize },
    #[error(transparent)]
    Csv(#[from] csv::Error),
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Utf8(#[from] std::string::FromUtf8Error),
    #[error(transparent)]
    Table(#[from] TableError),
}

pub fn read_csv_str(input: &str) -> Result<Table, IoError> {
    let mut reader = ReaderBuilder::new()
        .has_headers(true)
        .from_reader(input.as_bytes());

    let headers = reader.headers().cloned().map_err(IoError::from)?;
    if headers.is_empty() {
        return Err(IoError::MissingHeaders);
    }

    let header_count = headers.len();
    let row_hint = input.len() / (header_count * 8).max(1);
    let mut columns: Vec<Vec<Scalar>> = (0..header_count)
        .map(|_| Vec::with_capacity(row_hint))
        .collect();

    for row in reader.records() {
        let record = row?;
        for (idx, column) in columns.iter_mut().enumerate() {
            let field = record.get(idx).unwrap_or_default();
            column.push(parse_scalar(field));
        }
    }

    let mut pairs = Vec::with_capacity(header_count);
    for (idx, values) in columns.into_iter().enumerate() {
        let name = headers.get(idx).unwrap_or_default().to_owned();
        pairs.push((name, column_from_cells(values)?));
    }
    Ok(Table::from_columns(pairs)?)
}

/// Build a column from independently-typed cells. Code columns routinely
/// mix digits and letters ("1101", "A12"); when no common numeric dtype
/// exists the column falls back to text, each cell in its canonical form.
fn column_from_cells(values: Vec<Scalar>) -> Result<Column, IoError> {
    match infer_dtype(&values) {
        Ok(dtype) => Ok(Column::new(dtype, values)?),
        Err(_) => {
            let text = values
                .into_iter()
                .map(|value| {
                    if value.is_missing() {
                        Scalar::Null(NullKind::Null)
                    } else {
                        Scalar::Utf8(value.render_key_part())
                    }
                })
                .collect();
            Ok(Column::new(DType::Utf8, text)?)
        }
    }
}

pub fn read_csv_path(path: impl AsRef<Path>) -> Result<Table, IoError> {
    let input = std::fs::read_to_string(path)?;
    read_csv_str(&input)
}

/// Load the reference table, reporting an absent file as its own error so
/// the pipeline can halt before linking with a message the user can act on.
pub fn load_reference_csv(path: impl AsRef<Path>) -> Result<Table, IoError> {
    let path = path.as_ref();
    if !path.exists() {
        return Err(IoError::MissingReference {
            path: path.to_path_buf(),
        });
    }
    read_csv_path(path)
}

/// Uploaded files below the expected width are malformed; halt before key
/// construction rather than failing later with a confusing missing-field
/// error.
pub fn require_min_columns(table: &Table, expected: usize) -> Result<(), IoError> {
    let found = table.column_count();
    if found < expected {
        return Err(IoError::TooFewColumns { found, expected });
    }
    Ok(())
}

pub fn write_csv_string(table: &Table) -> Result<String, IoError> {
    let mut writer = WriterBuilder::new().from_writer(Vec::new());

    writer.write_record(table.column_names())?;
    for row_idx in 0..table.len() {
        let row = table
            .column_names()
            .iter()
            .map(|name| {
                table
                    .column(name)
                    .and_then(|column| column.value(row_idx))
                    .map_or_else(String::new, scalar_to_csv)
            })
            .collect::<Vec<_>>();
        writer.write_record(&row)?;
    }

    let bytes = writer.into_inner().map_err(|err| err.into_error())?;
    Ok(String::from_utf8(bytes)?)
}

fn parse_scalar(field: &str) -> Scalar {
    let trimmed = field.trim();
    if trimmed.is_empty() {
        return Scalar::Null(NullKind::Null);
    }

    if let Ok(value) = trimmed.parse::<i64>() {
        return Scalar::Int64(value);
    }
    if let Ok(value) = trimmed.parse::<f64>() {
        return Scalar::Float64(value);
    }
    if let Ok(value) = trimmed.parse::<bool>() {
        return Scalar::Bool(value);
    }

    Scalar::Utf8(trimmed.to_owned())
}

fn scalar_to_csv(scalar: &Scalar) -> String {
    match scalar {
        Scalar::Null(_) => String::new(),
        Scalar::Bool(v) => v.to_string(),
        Scalar::Int64(v) => v.to_string(),
        Scalar::Float64(v) => {
            if v.is_nan() {
                String::new()
            } else {
                v.to_string()
            }
        }
        Scalar::Utf8(v) => v.clone(),
    }
}
