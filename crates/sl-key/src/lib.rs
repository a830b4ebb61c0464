#![forbid(unsafe_code)]

use serde::{Deserialize, Serialize};
use sl_table::{Column, Table, TableError};
use sl_types::{DType, NullKind, Scalar};
use thiserror::Error;

/// Separator between composite-key parts. Underscore does not occur in the
/// institution/course code vocabularies this library links on.
pub const KEY_SEPARATOR: char = '_';

/// Default name of the derived key column, following the source data
/// convention.
pub const DEFAULT_KEY_COLUMN: &str = "MAIN CODE";

#[derive(Debug, Error)]
pub enum KeyError {
    #[error("required column '{name}' is missing from the table")]
    MissingField { name: String },
    #[error("a composite key takes two or three fields, got {found}")]
    InvalidFieldCount { found: usize },
    #[error(transparent)]
    Table(#[from] TableError),
}

/// Normalize identifying text: strip surrounding whitespace, uppercase.
/// Idempotent — normalizing twice equals normalizing once.
#[must_use]
pub fn normalize_text(raw: &str) -> String {
    raw.trim().to_uppercase()
}

/// Normalize one cell the way key fields are normalized: text is trimmed
/// and uppercased, non-text renders to its canonical text form, missing
/// stays missing.
#[must_use]
pub fn normalize_scalar(value: &Scalar) -> Scalar {
    if value.is_missing() {
        return Scalar::Null(NullKind::Null);
    }
    match value {
        Scalar::Utf8(raw) => Scalar::Utf8(normalize_text(raw)),
        other => Scalar::Utf8(normalize_text(&other.render_key_part())),
    }
}

/// Apply `normalize_scalar` to each named column, converting it to a text
/// column. Both the reference and the candidate table must pass through
/// this with the same column set before keys are derived, or matches are
/// silently missed.
pub fn normalize_key_columns(mut table: Table, columns: &[String]) -> Result<Table, KeyError> {
    for name in columns {
        let column = table
            .column(name)
            .ok_or_else(|| KeyError::MissingField { name: name.clone() })?;
        let normalized: Vec<Scalar> = column.values().iter().map(normalize_scalar).collect();
        table.replace_column(name, Column::new(DType::Utf8, normalized)?)?;
    }
    Ok(table)
}

/// How a table's composite key is built: which fields, joined how, stored
/// where.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KeySpec {
    pub fields: Vec<String>,
    pub separator: char,
    pub key_column: String,
}

impl KeySpec {
    /// A spec over two or three source fields with the conventional
    /// separator and key-column name.
    pub fn new(fields: Vec<String>) -> Result<Self, KeyError> {
        if fields.len() < 2 || fields.len() > 3 {
            return Err(KeyError::InvalidFieldCount {
                found: fields.len(),
            });
        }
        Ok(Self {
            fields,
            separator: KEY_SEPARATOR,
            key_column: DEFAULT_KEY_COLUMN.to_owned(),
        })
    }

    #[must_use]
    pub fn with_key_column(mut self, name: impl Into<String>) -> Self {
        self.key_column = name.into();
        self
    }
}

/// Derive the composite key column and attach it to the table.
///
/// Every field is normalized before concatenation, so callers that skipped
/// `normalize_key_columns` still key consistently. A row whose fields are
/// all missing gets a missing key (it will surface as unmatched); a
/// partially missing field contributes an empty part. A field absent from
/// the table is a reported error.
pub fn derive_composite_key(table: Table, spec: &KeySpec) -> Result<Table, KeyError> {
    let mut field_columns = Vec::with_capacity(spec.fields.len());
    for name in &spec.fields {
        let column = table
            .column(name)
            .ok_or_else(|| KeyError::MissingField { name: name.clone() })?;
        field_columns.push(column.clone());
    }

    let mut keys = Vec::with_capacity(table.len());
    let mut separator_buf = [0_u8; 4];
    let separator: &str = spec.separator.encode_utf8(&mut separator_buf);
    for row in 0..table.len() {
        let mut all_missing = true;
        let mut parts = Vec::with_capacity(field_columns.len());
        for column in &field_columns {
            match column.value(row) {
                Some(value) if !value.is_missing() => {
                    all_missing = false;
                    parts.push(normalize_text(&value.render_key_part()));
                }
                _ => parts.push(String::new()),
            }
        }
        if all_missing {
            keys.push(Scalar::Null(NullKind::Null));
        } else {
            keys.push(Scalar::Utf8(parts.join(separator)));
        }
    }

    let key_column = Column::new(DType::Utf8, keys)?;
    let mut table = table;
    if table.column(&spec.key_column).is_some() {
        table.replace_column(&spec.key_column, key_column)?;
        Ok(table)
    } else {
        Ok(table.with_column(spec.key_column.clone(), key_column)?)
    }
}
