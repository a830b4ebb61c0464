#![forbid(unsafe_code)]

use std::cmp::Ordering;
use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use sl_types::{cast_scalar_owned, infer_dtype, DType, Scalar, TypeError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TableError {
    #[error("column '{name}' has length {column_len} but the table has {table_len} rows")]
    LengthMismatch {
        name: String,
        column_len: usize,
        table_len: usize,
    },
    #[error("column '{name}' not found")]
    ColumnNotFound { name: String },
    #[error("column '{name}' already exists")]
    DuplicateColumn { name: String },
    #[error("row position {position} out of bounds for length {len}")]
    RowOutOfBounds { position: usize, len: usize },
    #[error(transparent)]
    Type(#[from] TypeError),
}

/// A typed column: every value is cast to the inferred (or given) dtype at
/// construction, with missing values carrying the dtype's missing marker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Column {
    dtype: DType,
    values: Vec<Scalar>,
}

impl Column {
    pub fn new(dtype: DType, values: Vec<Scalar>) -> Result<Self, TableError> {
        let mut cast = Vec::with_capacity(values.len());
        for value in values {
            cast.push(cast_scalar_owned(value, dtype)?);
        }
        Ok(Self {
            dtype,
            values: cast,
        })
    }

    pub fn from_values(values: Vec<Scalar>) -> Result<Self, TableError> {
        let dtype = infer_dtype(&values)?;
        Self::new(dtype, values)
    }

    #[must_use]
    pub fn dtype(&self) -> DType {
        self.dtype
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    #[must_use]
    pub fn values(&self) -> &[Scalar] {
        &self.values
    }

    #[must_use]
    pub fn value(&self, idx: usize) -> Option<&Scalar> {
        self.values.get(idx)
    }

    /// Gather values by position; `None` positions produce the dtype's
    /// missing marker. This is how an unmatched join row gets its nulls.
    #[must_use]
    pub fn take_by_positions(&self, positions: &[Option<usize>]) -> Self {
        let values = positions
            .iter()
            .map(|position| match position {
                Some(idx) => self.values[*idx].clone(),
                None => Scalar::missing_for_dtype(self.dtype),
            })
            .collect();
        Self {
            dtype: self.dtype,
            values,
        }
    }

    #[must_use]
    pub fn semantic_eq(&self, other: &Self) -> bool {
        self.values.len() == other.values.len()
            && self
                .values
                .iter()
                .zip(other.values.iter())
                .all(|(a, b)| a.semantic_eq(b))
    }
}

/// Insertion-ordered named columns of equal length.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Table {
    columns: BTreeMap<String, Column>,
    column_order: Vec<String>,
    rows: usize,
}

impl Table {
    #[must_use]
    pub fn empty() -> Self {
        Self {
            columns: BTreeMap::new(),
            column_order: Vec::new(),
            rows: 0,
        }
    }

    /// Build a table from (name, column) pairs, preserving the given order.
    pub fn from_columns(pairs: Vec<(String, Column)>) -> Result<Self, TableError> {
        let mut table = Self::empty();
        let mut first = true;
        for (name, column) in pairs {
            if first {
                table.rows = column.len();
                first = false;
            }
            table.push_column(name, column)?;
        }
        Ok(table)
    }

    fn push_column(&mut self, name: String, column: Column) -> Result<(), TableError> {
        if self.columns.contains_key(&name) {
            return Err(TableError::DuplicateColumn { name });
        }
        if column.len() != self.rows {
            return Err(TableError::LengthMismatch {
                name,
                column_len: column.len(),
                table_len: self.rows,
            });
        }
        self.column_order.push(name.clone());
        self.columns.insert(name, column);
        Ok(())
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.rows
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows == 0
    }

    #[must_use]
    pub fn column_count(&self) -> usize {
        self.column_order.len()
    }

    /// Column names in insertion order.
    #[must_use]
    pub fn column_names(&self) -> &[String] {
        &self.column_order
    }

    #[must_use]
    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.get(name)
    }

    pub fn require_column(&self, name: &str) -> Result<&Column, TableError> {
        self.columns.get(name).ok_or_else(|| TableError::ColumnNotFound {
            name: name.to_owned(),
        })
    }

    pub fn require_columns(&self, names: &[String]) -> Result<(), TableError> {
        for name in names {
            if !self.columns.contains_key(name) {
                return Err(TableError::ColumnNotFound { name: name.clone() });
            }
        }
        Ok(())
    }

    /// Append a derived column. The name must be fresh.
    pub fn with_column(mut self, name: impl Into<String>, column: Column) -> Result<Self, TableError> {
        let name = name.into();
        if self.column_order.is_empty() {
            self.rows = column.len();
        }
        self.push_column(name, column)?;
        Ok(self)
    }

    /// Replace an existing column in place, keeping its order slot.
    pub fn replace_column(&mut self, name: &str, column: Column) -> Result<(), TableError> {
        if !self.columns.contains_key(name) {
            return Err(TableError::ColumnNotFound {
                name: name.to_owned(),
            });
        }
        if column.len() != self.rows {
            return Err(TableError::LengthMismatch {
                name: name.to_owned(),
                column_len: column.len(),
                table_len: self.rows,
            });
        }
        self.columns.insert(name.to_owned(), column);
        Ok(())
    }

    /// Rename columns by an old-name → new-name mapping. Uploaded files
    /// arrive with arbitrary headers; callers rename before validating the
    /// required set. Unknown old names report loudly, and a rename may not
    /// collide with a surviving column.
    pub fn rename_columns(mut self, mapping: &[(String, String)]) -> Result<Self, TableError> {
        for (old, new) in mapping {
            if old == new {
                continue;
            }
            let column = self
                .columns
                .remove(old)
                .ok_or_else(|| TableError::ColumnNotFound { name: old.clone() })?;
            if self.columns.contains_key(new) {
                return Err(TableError::DuplicateColumn { name: new.clone() });
            }
            self.columns.insert(new.clone(), column);
            for slot in &mut self.column_order {
                if slot == old {
                    *slot = new.clone();
                }
            }
        }
        Ok(self)
    }

    /// Gather rows by position into a new table (selection, filtering).
    pub fn take_rows(&self, positions: &[usize]) -> Result<Self, TableError> {
        for &position in positions {
            if position >= self.rows {
                return Err(TableError::RowOutOfBounds {
                    position,
                    len: self.rows,
                });
            }
        }
        let opt_positions: Vec<Option<usize>> = positions.iter().map(|&p| Some(p)).collect();
        let mut out = Self::empty();
        out.rows = positions.len();
        for name in &self.column_order {
            let column = self
                .columns
                .get(name)
                .expect("column name listed in order must exist");
            out.column_order.push(name.clone());
            out.columns
                .insert(name.clone(), column.take_by_positions(&opt_positions));
        }
        Ok(out)
    }

    /// One row as (name, value) pairs in column order.
    #[must_use]
    pub fn row(&self, position: usize) -> Vec<(&str, &Scalar)> {
        self.column_order
            .iter()
            .filter_map(|name| {
                let column = self.columns.get(name)?;
                column.value(position).map(|v| (name.as_str(), v))
            })
            .collect()
    }
}

// ── Declarative row predicates ─────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FilterOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    OneOf,
}

/// A single `{column, op, value}` filter. `OneOf` carries the value list of
/// a multi-select; the ordered comparisons carry one scalar.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Predicate {
    pub column: String,
    pub op: FilterOp,
    pub values: Vec<Scalar>,
}

impl Predicate {
    #[must_use]
    pub fn new(column: impl Into<String>, op: FilterOp, value: Scalar) -> Self {
        Self {
            column: column.into(),
            op,
            values: vec![value],
        }
    }

    #[must_use]
    pub fn one_of(column: impl Into<String>, values: Vec<Scalar>) -> Self {
        Self {
            column: column.into(),
            op: FilterOp::OneOf,
            values,
        }
    }
}

/// Loose scalar equality for filtering: numerics compare by value
/// (1 == 1.0), text compares exactly, missing never matches.
fn filter_eq(cell: &Scalar, target: &Scalar) -> bool {
    if cell.is_missing() || target.is_missing() {
        return false;
    }
    match (cell.to_f64(), target.to_f64()) {
        (Ok(a), Ok(b)) => a == b,
        _ => cell == target,
    }
}

/// Ordering for the ranged comparisons; `None` when the pair is unordered
/// (missing on either side, or text against number).
fn filter_cmp(cell: &Scalar, target: &Scalar) -> Option<Ordering> {
    if cell.is_missing() || target.is_missing() {
        return None;
    }
    match (cell, target) {
        (Scalar::Utf8(a), Scalar::Utf8(b)) => Some(a.cmp(b)),
        _ => match (cell.to_f64(), target.to_f64()) {
            (Ok(a), Ok(b)) => a.partial_cmp(&b),
            _ => None,
        },
    }
}

fn predicate_matches(predicate: &Predicate, cell: &Scalar) -> bool {
    match predicate.op {
        FilterOp::Eq => predicate
            .values
            .first()
            .is_some_and(|target| filter_eq(cell, target)),
        FilterOp::Ne => {
            !cell.is_missing()
                && predicate
                    .values
                    .first()
                    .is_some_and(|target| !target.is_missing() && !filter_eq(cell, target))
        }
        FilterOp::Lt => matches_ordering(predicate, cell, |o| o == Ordering::Less),
        FilterOp::Le => matches_ordering(predicate, cell, |o| o != Ordering::Greater),
        FilterOp::Gt => matches_ordering(predicate, cell, |o| o == Ordering::Greater),
        FilterOp::Ge => matches_ordering(predicate, cell, |o| o != Ordering::Less),
        FilterOp::OneOf => predicate.values.iter().any(|target| filter_eq(cell, target)),
    }
}

fn matches_ordering(
    predicate: &Predicate,
    cell: &Scalar,
    accept: impl Fn(Ordering) -> bool,
) -> bool {
    predicate
        .values
        .first()
        .and_then(|target| filter_cmp(cell, target))
        .is_some_and(accept)
}

/// Apply every predicate conjunctively and return the surviving rows.
///
/// A predicate naming an absent column is a reported error, not a panic;
/// rows whose cell is missing fail every comparison and drop out.
pub fn apply_predicates(table: &Table, predicates: &[Predicate]) -> Result<Table, TableError> {
    if predicates.is_empty() {
        return Ok(table.clone());
    }

    let mut columns = Vec::with_capacity(predicates.len());
    for predicate in predicates {
        columns.push(table.require_column(&predicate.column)?);
    }

    let mut keep = Vec::new();
    for row in 0..table.len() {
        let survives = predicates.iter().zip(columns.iter()).all(|(predicate, column)| {
            column
                .value(row)
                .is_some_and(|cell| predicate_matches(predicate, cell))
        });
        if survives {
            keep.push(row);
        }
    }

    table.take_rows(&keep)
}

#[cfg(test)]
mod tests {
    use sl_types::{NullKind, Scalar};

    use super::{apply_predicates, Column, FilterOp, Predicate, Table, TableError};

    fn utf8(v: &str) -> Scalar {
        Scalar::Utf8(v.to_owned())
    }

    fn sample_table() -> Table {
        Table::from_columns(vec![
            (
                "State".to_owned(),
                Column::from_values(vec![utf8("KERALA"), utf8("GOA"), utf8("KERALA")])
                    .expect("state column"),
            ),
            (
                "Rank".to_owned(),
                Column::from_values(vec![
                    Scalar::Int64(10),
                    Scalar::Int64(5),
                    Scalar::Null(NullKind::Null),
                ])
                .expect("rank column"),
            ),
        ])
        .expect("table")
    }

    #[test]
    fn column_construction_widens_mixed_numeric() {
        let column = Column::from_values(vec![Scalar::Int64(1), Scalar::Float64(2.5)])
            .expect("mixed numeric");
        assert_eq!(column.dtype(), sl_types::DType::Float64);
        assert_eq!(column.values()[0], Scalar::Float64(1.0));
    }

    #[test]
    fn table_preserves_insertion_order() {
        let table = sample_table();
        assert_eq!(table.column_names(), &["State", "Rank"]);
        assert_eq!(table.len(), 3);
    }

    #[test]
    fn missing_column_reports_name() {
        let table = sample_table();
        let err = table.require_column("Quota").expect_err("must fail");
        assert_eq!(err.to_string(), "column 'Quota' not found");
    }

    #[test]
    fn rename_rejects_unknown_and_colliding_names() {
        let table = sample_table();
        let err = table
            .clone()
            .rename_columns(&[("Nope".to_owned(), "X".to_owned())])
            .expect_err("unknown old name");
        assert!(matches!(err, TableError::ColumnNotFound { .. }));

        let err = table
            .rename_columns(&[("State".to_owned(), "Rank".to_owned())])
            .expect_err("collision");
        assert!(matches!(err, TableError::DuplicateColumn { .. }));
    }

    #[test]
    fn rename_keeps_order_slot() {
        let table = sample_table()
            .rename_columns(&[("State".to_owned(), "Region".to_owned())])
            .expect("rename");
        assert_eq!(table.column_names(), &["Region", "Rank"]);
    }

    #[test]
    fn take_rows_gathers_and_bounds_checks() {
        let table = sample_table();
        let picked = table.take_rows(&[2, 0]).expect("take");
        assert_eq!(picked.len(), 2);
        assert_eq!(
            picked.column("State").unwrap().values()[0],
            utf8("KERALA")
        );

        let err = table.take_rows(&[9]).expect_err("out of bounds");
        assert!(matches!(err, TableError::RowOutOfBounds { .. }));
    }

    #[test]
    fn one_of_predicate_matches_multiselect_values() {
        let table = sample_table();
        let kept = apply_predicates(
            &table,
            &[Predicate::one_of("State", vec![utf8("GOA")])],
        )
        .expect("filter");
        assert_eq!(kept.len(), 1);
        assert_eq!(kept.column("Rank").unwrap().values()[0], Scalar::Int64(5));
    }

    #[test]
    fn range_predicates_drop_missing_cells() {
        let table = sample_table();
        let kept = apply_predicates(
            &table,
            &[Predicate::new("Rank", FilterOp::Ge, Scalar::Int64(1))],
        )
        .expect("filter");
        // The null-rank row fails the comparison and drops.
        assert_eq!(kept.len(), 2);
    }

    #[test]
    fn predicates_apply_conjunctively() {
        let table = sample_table();
        let kept = apply_predicates(
            &table,
            &[
                Predicate::one_of("State", vec![utf8("KERALA")]),
                Predicate::new("Rank", FilterOp::Le, Scalar::Int64(10)),
            ],
        )
        .expect("filter");
        assert_eq!(kept.len(), 1);
    }

    #[test]
    fn predicate_on_absent_column_is_an_error() {
        let table = sample_table();
        let err = apply_predicates(
            &table,
            &[Predicate::new("Quota", FilterOp::Eq, utf8("AIQ"))],
        )
        .expect_err("absent column");
        assert_eq!(err.to_string(), "column 'Quota' not found");
    }

    #[test]
    fn numeric_equality_is_loose_across_int_and_float() {
        let table = Table::from_columns(vec![(
            "Fee".to_owned(),
            Column::from_values(vec![Scalar::Float64(5000.0), Scalar::Float64(7500.0)])
                .expect("fees"),
        )])
        .expect("table");
        let kept = apply_predicates(
            &table,
            &[Predicate::new("Fee", FilterOp::Eq, Scalar::Int64(5000))],
        )
        .expect("filter");
        assert_eq!(kept.len(), 1);
    }
}
