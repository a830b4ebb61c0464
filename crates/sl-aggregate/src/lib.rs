#![forbid(unsafe_code)]

use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};
use sl_ranges::compress_to_string;
use sl_table::{Column, Table, TableError};
use sl_types::{parse_ordinal, DType, NullKind, Scalar};
use thiserror::Error;

pub const COUNT_COLUMN: &str = "Count";
pub const DISTINCT_COLUMN: &str = "Distinct Codes";
pub const FIRST_ORDER_COLUMN: &str = "First Order";
pub const ORDER_RANGE_COLUMN: &str = "Order Range";
pub const SHARE_COLUMN: &str = "Share %";
pub const ORDER_NUMBER_COLUMN: &str = "Order Number";

#[derive(Debug, Error)]
pub enum AggregateError {
    #[error("summaries group by one to three columns, got {found}")]
    InvalidGroupColumnCount { found: usize },
    #[error("bin size must be at least 1, got {bin_size}")]
    InvalidBinSize { bin_size: i64 },
    #[error("column '{name}' is not numeric")]
    NonNumericColumn { name: String },
    #[error(transparent)]
    Table(#[from] TableError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AggregateOptions {
    /// Drop rows whose group key is missing. Off, they gather under a
    /// missing bucket instead.
    pub dropna: bool,
}

impl Default for AggregateOptions {
    fn default() -> Self {
        Self { dropna: true }
    }
}

/// One summary row: the grouping tuple plus what the group holds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupSummary {
    /// Values of the grouping columns, in group-column order.
    pub group: Vec<Scalar>,
    /// Distinct composite keys in the group.
    pub distinct_keys: usize,
    /// Linked rows in the group.
    pub rows: usize,
    /// Group share of all summarized rows, percent, two decimals.
    pub share_percent: f64,
    /// Minimum ordinal in the group; `None` when no ordinal parsed.
    pub first_ordinal: Option<i64>,
    /// The group's ordinals, ascending, range-compressed.
    pub ordinal_range: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SummaryReport {
    pub group_columns: Vec<String>,
    pub rows: Vec<GroupSummary>,
    /// Ordinal cells that were missing or unparseable and therefore sit in
    /// no range. Reported, never fatal.
    pub skipped_ordinals: usize,
}

impl SummaryReport {
    /// Plain tabular form for the presentation layer and CSV egress:
    /// the grouping columns followed by Count, Distinct Codes, First
    /// Order, Order Range, and Share %.
    pub fn to_table(&self) -> Result<Table, AggregateError> {
        let mut pairs = Vec::with_capacity(self.group_columns.len() + 5);
        for (slot, name) in self.group_columns.iter().enumerate() {
            let values: Vec<Scalar> = self
                .rows
                .iter()
                .map(|row| row.group[slot].clone())
                .collect();
            pairs.push((name.clone(), Column::from_values(values)?));
        }
        pairs.push((
            COUNT_COLUMN.to_owned(),
            Column::new(
                DType::Int64,
                self.rows
                    .iter()
                    .map(|row| Scalar::Int64(row.rows as i64))
                    .collect(),
            )?,
        ));
        pairs.push((
            DISTINCT_COLUMN.to_owned(),
            Column::new(
                DType::Int64,
                self.rows
                    .iter()
                    .map(|row| Scalar::Int64(row.distinct_keys as i64))
                    .collect(),
            )?,
        ));
        pairs.push((
            FIRST_ORDER_COLUMN.to_owned(),
            Column::new(
                DType::Int64,
                self.rows
                    .iter()
                    .map(|row| match row.first_ordinal {
                        Some(ordinal) => Scalar::Int64(ordinal),
                        None => Scalar::Null(NullKind::Null),
                    })
                    .collect(),
            )?,
        ));
        pairs.push((
            ORDER_RANGE_COLUMN.to_owned(),
            Column::new(
                DType::Utf8,
                self.rows
                    .iter()
                    .map(|row| Scalar::Utf8(row.ordinal_range.clone()))
                    .collect(),
            )?,
        ));
        pairs.push((
            SHARE_COLUMN.to_owned(),
            Column::new(
                DType::Float64,
                self.rows
                    .iter()
                    .map(|row| Scalar::Float64(row.share_percent))
                    .collect(),
            )?,
        ));
        Ok(Table::from_columns(pairs)?)
    }
}

/// Hashable borrowed view of a grouping cell. Float keys hash by bit
/// pattern with NaN collapsed to one representative.
#[derive(Debug, Clone, Hash, PartialEq, Eq)]
enum GroupKeyRef<'a> {
    Bool(bool),
    Int64(i64),
    FloatBits(u64),
    Utf8(&'a str),
    Null,
}

impl<'a> GroupKeyRef<'a> {
    fn from_scalar(key: &'a Scalar) -> Self {
        match key {
            Scalar::Bool(v) => Self::Bool(*v),
            Scalar::Int64(v) => Self::Int64(*v),
            Scalar::Float64(v) => Self::FloatBits(if v.is_nan() {
                f64::NAN.to_bits()
            } else {
                v.to_bits()
            }),
            Scalar::Utf8(v) => Self::Utf8(v.as_str()),
            Scalar::Null(_) => Self::Null,
        }
    }
}

struct GroupAccum<'a> {
    first_row: usize,
    rows: usize,
    distinct_keys: HashSet<&'a str>,
    ordinals: Vec<i64>,
}

/// Group linked rows by a 1–3 column tuple and summarize each group:
/// distinct-key count, minimum ordinal, compressed ordinal range, share of
/// rows. Groups come back ordered by first-occurrence ordinal ascending,
/// groups without any parseable ordinal last.
pub fn summarize(
    linked: &Table,
    group_columns: &[String],
    key_column: &str,
    ordinal_column: &str,
    options: AggregateOptions,
) -> Result<SummaryReport, AggregateError> {
    if group_columns.is_empty() || group_columns.len() > 3 {
        return Err(AggregateError::InvalidGroupColumnCount {
            found: group_columns.len(),
        });
    }

    let mut group_cols = Vec::with_capacity(group_columns.len());
    for name in group_columns {
        group_cols.push(linked.require_column(name)?);
    }
    let keys = linked.require_column(key_column)?;
    let ordinals = linked.require_column(ordinal_column)?;

    // First-seen ordering plus keyed slots, accumulated in one pass.
    let mut slots = HashMap::<Vec<GroupKeyRef<'_>>, usize>::new();
    let mut groups: Vec<GroupAccum<'_>> = Vec::new();
    let mut skipped_ordinals = 0_usize;
    let mut summarized_rows = 0_usize;

    for row in 0..linked.len() {
        let mut tuple = Vec::with_capacity(group_cols.len());
        let mut missing_key_part = false;
        for column in &group_cols {
            let cell = &column.values()[row];
            if cell.is_missing() {
                missing_key_part = true;
            }
            tuple.push(GroupKeyRef::from_scalar(cell));
        }
        if options.dropna && missing_key_part {
            continue;
        }
        summarized_rows += 1;

        let slot = match slots.get(&tuple) {
            Some(&slot) => slot,
            None => {
                groups.push(GroupAccum {
                    first_row: row,
                    rows: 0,
                    distinct_keys: HashSet::new(),
                    ordinals: Vec::new(),
                });
                let slot = groups.len() - 1;
                slots.insert(tuple, slot);
                slot
            }
        };
        let group = &mut groups[slot];
        group.rows += 1;

        if let Scalar::Utf8(key) = &keys.values()[row] {
            group.distinct_keys.insert(key.as_str());
        }

        match parse_ordinal(&ordinals.values()[row]) {
            Some(ordinal) => group.ordinals.push(ordinal),
            None => skipped_ordinals += 1,
        }
    }

    let mut rows: Vec<GroupSummary> = groups
        .into_iter()
        .map(|mut group| {
            group.ordinals.sort_unstable();
            let share = if summarized_rows == 0 {
                0.0
            } else {
                round2(group.rows as f64 * 100.0 / summarized_rows as f64)
            };
            GroupSummary {
                group: group_cols
                    .iter()
                    .map(|column| column.values()[group.first_row].clone())
                    .collect(),
                distinct_keys: group.distinct_keys.len(),
                rows: group.rows,
                share_percent: share,
                first_ordinal: group.ordinals.first().copied(),
                ordinal_range: compress_to_string(&group.ordinals),
            }
        })
        .collect();

    rows.sort_by_key(|row| row.first_ordinal.unwrap_or(i64::MAX));

    Ok(SummaryReport {
        group_columns: group_columns.to_vec(),
        rows,
        skipped_ordinals,
    })
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

// ── Rank-driven ordering ───────────────────────────────────────────────

/// A rank assignment over one or two columns: each listed tuple carries a
/// positive rank, everything else ranks 0 and is excluded from ordering.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankSpec {
    /// Name of the emitted rank column (e.g. "State Rank").
    pub name: String,
    /// Columns the rank tuple is read from.
    pub columns: Vec<String>,
    /// Tuple values → rank.
    pub ranks: Vec<(Vec<Scalar>, i64)>,
}

impl RankSpec {
    fn rank_for(&self, row: &[&Scalar]) -> i64 {
        for (tuple, rank) in &self.ranks {
            if tuple.len() == row.len()
                && tuple
                    .iter()
                    .zip(row.iter())
                    .all(|(want, have)| want.semantic_eq(have))
            {
                return *rank;
            }
        }
        0
    }
}

/// Order reference rows by two rank assignments: keep rows where both
/// ranks are positive, sort by (primary rank, secondary rank, input
/// position), attach both rank columns and a 1-based order number.
pub fn rank_order(
    table: &Table,
    primary: &RankSpec,
    secondary: &RankSpec,
) -> Result<Table, AggregateError> {
    let mut rank_columns = Vec::with_capacity(2);
    for spec in [primary, secondary] {
        let mut columns = Vec::with_capacity(spec.columns.len());
        for name in &spec.columns {
            columns.push(table.require_column(name)?);
        }
        rank_columns.push(columns);
    }

    let mut ranked = Vec::new();
    for row in 0..table.len() {
        let primary_rank = rank_for_row(primary, &rank_columns[0], row);
        let secondary_rank = rank_for_row(secondary, &rank_columns[1], row);
        if primary_rank > 0 && secondary_rank > 0 {
            ranked.push((primary_rank, secondary_rank, row));
        }
    }
    ranked.sort();

    let positions: Vec<usize> = ranked.iter().map(|&(_, _, row)| row).collect();
    let ordered = table.take_rows(&positions)?;

    let primary_values: Vec<Scalar> = ranked
        .iter()
        .map(|&(rank, _, _)| Scalar::Int64(rank))
        .collect();
    let secondary_values: Vec<Scalar> = ranked
        .iter()
        .map(|&(_, rank, _)| Scalar::Int64(rank))
        .collect();
    let order_numbers: Vec<Scalar> = (1..=ranked.len() as i64).map(Scalar::Int64).collect();

    let ordered = ordered
        .with_column(primary.name.clone(), Column::new(DType::Int64, primary_values)?)?
        .with_column(
            secondary.name.clone(),
            Column::new(DType::Int64, secondary_values)?,
        )?
        .with_column(
            ORDER_NUMBER_COLUMN,
            Column::new(DType::Int64, order_numbers)?,
        )?;
    Ok(ordered)
}

fn rank_for_row(spec: &RankSpec, columns: &[&Column], row: usize) -> i64 {
    let tuple: Vec<&Scalar> = columns.iter().map(|column| &column.values()[row]).collect();
    spec.rank_for(&tuple)
}

// ── Pivoted aggregation ────────────────────────────────────────────────

/// Aggregation applied to each pivot cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AggFunc {
    Sum,
    Mean,
    Count,
    Min,
    Max,
}

impl AggFunc {
    fn apply(self, values: &[f64]) -> Scalar {
        if values.is_empty() {
            // Absent combinations render as the fill value zero.
            return match self {
                Self::Count => Scalar::Int64(0),
                _ => Scalar::Float64(0.0),
            };
        }
        match self {
            Self::Sum => Scalar::Float64(values.iter().sum()),
            Self::Mean => Scalar::Float64(values.iter().sum::<f64>() / values.len() as f64),
            Self::Count => Scalar::Int64(values.len() as i64),
            Self::Min => Scalar::Float64(values.iter().copied().fold(f64::INFINITY, f64::min)),
            Self::Max => Scalar::Float64(values.iter().copied().fold(f64::NEG_INFINITY, f64::max)),
        }
    }
}

/// What a pivot computes: 1–3 row dimensions, an optional column dimension
/// spread across the output headers, and the value column the cells
/// aggregate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PivotSpec {
    pub row_columns: Vec<String>,
    pub column_dimension: Option<String>,
    pub value_column: String,
    pub func: AggFunc,
    /// Preferred leading order for the spread headers (category columns
    /// pin to a fixed display order); headers not listed here follow in
    /// first-seen order.
    pub column_order: Vec<String>,
}

/// Cross-tabulate: group by the row tuple, spread the column dimension
/// across the headers, aggregate the value column into each cell.
///
/// Rows come back sorted by their labels, absent combinations fill with
/// zero, and rows with a missing dimension value drop. Without a column
/// dimension the single output column keeps the value column's name.
pub fn pivot(table: &Table, spec: &PivotSpec) -> Result<Table, AggregateError> {
    if spec.row_columns.is_empty() || spec.row_columns.len() > 3 {
        return Err(AggregateError::InvalidGroupColumnCount {
            found: spec.row_columns.len(),
        });
    }

    let mut row_cols = Vec::with_capacity(spec.row_columns.len());
    for name in &spec.row_columns {
        row_cols.push(table.require_column(name)?);
    }
    let dimension_col = match &spec.column_dimension {
        Some(name) => Some(table.require_column(name)?),
        None => None,
    };
    let value_col = table.require_column(&spec.value_column)?;

    let mut slots = HashMap::<Vec<GroupKeyRef<'_>>, usize>::new();
    // First row of each group, in first-seen order.
    let mut groups: Vec<usize> = Vec::new();
    let mut headers: Vec<String> = Vec::new();
    let mut header_slots = HashMap::<String, usize>::new();
    let mut cells = HashMap::<(usize, usize), Vec<f64>>::new();

    for row in 0..table.len() {
        let mut tuple = Vec::with_capacity(row_cols.len());
        let mut missing = false;
        for column in &row_cols {
            let cell = &column.values()[row];
            if cell.is_missing() {
                missing = true;
            }
            tuple.push(GroupKeyRef::from_scalar(cell));
        }
        let header = match dimension_col {
            Some(column) => {
                let cell = &column.values()[row];
                if cell.is_missing() {
                    missing = true;
                }
                cell.render_key_part()
            }
            None => spec.value_column.clone(),
        };
        if missing {
            continue;
        }

        let row_slot = match slots.get(&tuple) {
            Some(&slot) => slot,
            None => {
                groups.push(row);
                let slot = groups.len() - 1;
                slots.insert(tuple, slot);
                slot
            }
        };
        let header_slot = match header_slots.get(&header) {
            Some(&slot) => slot,
            None => {
                headers.push(header.clone());
                let slot = headers.len() - 1;
                header_slots.insert(header, slot);
                slot
            }
        };

        let cell = &value_col.values()[row];
        if !cell.is_missing() {
            if let Ok(value) = cell.to_f64() {
                cells.entry((row_slot, header_slot)).or_default().push(value);
            }
        }
    }

    let mut row_order: Vec<usize> = (0..groups.len()).collect();
    row_order.sort_by(|&a, &b| {
        row_cols
            .iter()
            .map(|column| label_cmp(&column.values()[groups[a]], &column.values()[groups[b]]))
            .find(|ord| *ord != Ordering::Equal)
            .unwrap_or(Ordering::Equal)
    });

    let mut header_order: Vec<usize> = Vec::with_capacity(headers.len());
    for preferred in &spec.column_order {
        if let Some(&slot) = header_slots.get(preferred) {
            header_order.push(slot);
        }
    }
    for slot in 0..headers.len() {
        if !header_order.contains(&slot) {
            header_order.push(slot);
        }
    }

    let mut pairs = Vec::with_capacity(spec.row_columns.len() + header_order.len());
    for (idx, name) in spec.row_columns.iter().enumerate() {
        let values: Vec<Scalar> = row_order
            .iter()
            .map(|&slot| row_cols[idx].values()[groups[slot]].clone())
            .collect();
        pairs.push((name.clone(), Column::from_values(values)?));
    }
    for &header_slot in &header_order {
        let values: Vec<Scalar> = row_order
            .iter()
            .map(|&row_slot| {
                spec.func.apply(
                    cells
                        .get(&(row_slot, header_slot))
                        .map_or(&[][..], Vec::as_slice),
                )
            })
            .collect();
        pairs.push((headers[header_slot].clone(), Column::from_values(values)?));
    }
    Ok(Table::from_columns(pairs)?)
}

/// Numeric labels sort by value, text labels by string, mixed columns put
/// numbers first.
fn label_cmp(left: &Scalar, right: &Scalar) -> Ordering {
    match (left.to_f64(), right.to_f64()) {
        (Ok(a), Ok(b)) => a.partial_cmp(&b).unwrap_or(Ordering::Equal),
        (Ok(_), Err(_)) => Ordering::Less,
        (Err(_), Ok(_)) => Ordering::Greater,
        (Err(_), Err(_)) => left.render_key_part().cmp(&right.render_key_part()),
    }
}

// ── Binned grouping ────────────────────────────────────────────────────

/// Replace a numeric column with right-open, uniform-width interval labels
/// ("[4500, 5500)") so a continuous column can group like a category.
/// Bins anchor at the column minimum, floored; missing cells stay missing.
pub fn bin_numeric_column(
    table: &Table,
    column: &str,
    bin_size: i64,
) -> Result<Table, AggregateError> {
    if bin_size < 1 {
        return Err(AggregateError::InvalidBinSize { bin_size });
    }
    let source = table.require_column(column)?;
    if !matches!(source.dtype(), DType::Int64 | DType::Float64) {
        return Err(AggregateError::NonNumericColumn {
            name: column.to_owned(),
        });
    }

    let mut minimum = f64::INFINITY;
    for value in source.values() {
        if let Ok(v) = value.to_f64() {
            if !v.is_nan() {
                minimum = minimum.min(v);
            }
        }
    }
    let origin = minimum.floor();

    let labels: Vec<Scalar> = source
        .values()
        .iter()
        .map(|value| match value.to_f64() {
            Ok(v) if !v.is_nan() => {
                let start = origin as i64
                    + ((v - origin) / bin_size as f64).floor() as i64 * bin_size;
                Scalar::Utf8(format!("[{start}, {})", start + bin_size))
            }
            _ => Scalar::Null(NullKind::Null),
        })
        .collect();

    let mut out = table.clone();
    out.replace_column(column, Column::new(DType::Utf8, labels)?)?;
    Ok(out)
}

#[cfg(test)]
mod tests {
    use sl_table::{Column, Table};
    use sl_types::{NullKind, Scalar};

    use super::{
        bin_numeric_column, pivot, rank_order, summarize, AggFunc, AggregateError,
        AggregateOptions, PivotSpec, RankSpec, COUNT_COLUMN, ORDER_NUMBER_COLUMN,
        ORDER_RANGE_COLUMN,
    };

    fn utf8(v: &str) -> Scalar {
        Scalar::Utf8(v.to_owned())
    }

    fn table(pairs: Vec<(&str, Vec<Scalar>)>) -> Table {
        Table::from_columns(
            pairs
                .into_iter()
                .map(|(name, values)| {
                    (
                        name.to_owned(),
                        Column::from_values(values).expect("column"),
                    )
                })
                .collect(),
        )
        .expect("table")
    }

    fn linked_fixture() -> Table {
        table(vec![
            (
                "MAIN CODE",
                vec![
                    utf8("A1_C1"),
                    utf8("A1_C1"),
                    utf8("B2_C2"),
                    utf8("B2_C2"),
                ],
            ),
            (
                "State",
                vec![utf8("KERALA"), utf8("KERALA"), utf8("GOA"), utf8("GOA")],
            ),
            (
                "Student Order",
                vec![utf8("3"), utf8("4"), utf8("1"), utf8("junk")],
            ),
        ])
    }

    #[test]
    fn groups_summarize_counts_and_ranges() {
        let report = summarize(
            &linked_fixture(),
            &["MAIN CODE".to_owned()],
            "MAIN CODE",
            "Student Order",
            AggregateOptions::default(),
        )
        .expect("summarize");

        assert_eq!(report.rows.len(), 2);
        // B2_C2 holds ordinal 1, so it leads.
        assert_eq!(report.rows[0].group, vec![utf8("B2_C2")]);
        assert_eq!(report.rows[0].distinct_keys, 1);
        assert_eq!(report.rows[0].ordinal_range, "1");
        assert_eq!(report.rows[1].group, vec![utf8("A1_C1")]);
        assert_eq!(report.rows[1].distinct_keys, 1);
        assert_eq!(report.rows[1].ordinal_range, "3-4");
        assert_eq!(report.skipped_ordinals, 1);
    }

    #[test]
    fn share_percent_covers_all_rows() {
        let report = summarize(
            &linked_fixture(),
            &["State".to_owned()],
            "MAIN CODE",
            "Student Order",
            AggregateOptions::default(),
        )
        .expect("summarize");
        let total: f64 = report.rows.iter().map(|row| row.share_percent).sum();
        assert!((total - 100.0).abs() < 1e-9);
    }

    #[test]
    fn groups_without_ordinals_sort_last() {
        let linked = table(vec![
            ("MAIN CODE", vec![utf8("A"), utf8("B")]),
            ("TYPE", vec![utf8("GOVT"), utf8("PRIVATE")]),
            (
                "Student Order",
                vec![Scalar::Null(NullKind::Null), Scalar::Int64(2)],
            ),
        ]);
        let report = summarize(
            &linked,
            &["TYPE".to_owned()],
            "MAIN CODE",
            "Student Order",
            AggregateOptions::default(),
        )
        .expect("summarize");
        assert_eq!(report.rows[0].group, vec![utf8("PRIVATE")]);
        assert_eq!(report.rows[1].first_ordinal, None);
        assert_eq!(report.rows[1].ordinal_range, "");
    }

    #[test]
    fn missing_group_keys_drop_by_default_and_bucket_on_request() {
        let linked = table(vec![
            ("MAIN CODE", vec![utf8("A"), utf8("B")]),
            ("State", vec![utf8("GOA"), Scalar::Null(NullKind::Null)]),
            ("Student Order", vec![Scalar::Int64(1), Scalar::Int64(2)]),
        ]);
        let dropped = summarize(
            &linked,
            &["State".to_owned()],
            "MAIN CODE",
            "Student Order",
            AggregateOptions::default(),
        )
        .expect("summarize");
        assert_eq!(dropped.rows.len(), 1);

        let bucketed = summarize(
            &linked,
            &["State".to_owned()],
            "MAIN CODE",
            "Student Order",
            AggregateOptions { dropna: false },
        )
        .expect("summarize");
        assert_eq!(bucketed.rows.len(), 2);
    }

    #[test]
    fn absent_group_column_degrades_gracefully() {
        let err = summarize(
            &linked_fixture(),
            &["Quota".to_owned()],
            "MAIN CODE",
            "Student Order",
            AggregateOptions::default(),
        )
        .expect_err("absent column");
        assert_eq!(err.to_string(), "column 'Quota' not found");
    }

    #[test]
    fn group_column_count_is_bounded() {
        let names: Vec<String> = ["a", "b", "c", "d"].iter().map(|s| (*s).to_owned()).collect();
        let err = summarize(
            &linked_fixture(),
            &names,
            "MAIN CODE",
            "Student Order",
            AggregateOptions::default(),
        )
        .expect_err("too many");
        assert!(matches!(
            err,
            AggregateError::InvalidGroupColumnCount { found: 4 }
        ));
    }

    #[test]
    fn report_converts_to_plain_table() {
        let report = summarize(
            &linked_fixture(),
            &["MAIN CODE".to_owned()],
            "MAIN CODE",
            "Student Order",
            AggregateOptions::default(),
        )
        .expect("summarize");
        let out = report.to_table().expect("table");
        assert_eq!(out.len(), 2);
        assert_eq!(
            out.column(COUNT_COLUMN).unwrap().values()[0],
            Scalar::Int64(2)
        );
        assert_eq!(
            out.column(super::DISTINCT_COLUMN).unwrap().values()[0],
            Scalar::Int64(1)
        );
        assert_eq!(
            out.column(ORDER_RANGE_COLUMN).unwrap().values()[1],
            utf8("3-4")
        );
    }

    #[test]
    fn two_level_grouping_keys_on_the_tuple() {
        let linked = table(vec![
            ("MAIN CODE", vec![utf8("A"), utf8("B"), utf8("C")]),
            ("State", vec![utf8("GOA"), utf8("GOA"), utf8("KERALA")]),
            ("TYPE", vec![utf8("GOVT"), utf8("PVT"), utf8("GOVT")]),
            (
                "Student Order",
                vec![Scalar::Int64(1), Scalar::Int64(2), Scalar::Int64(3)],
            ),
        ]);
        let report = summarize(
            &linked,
            &["State".to_owned(), "TYPE".to_owned()],
            "MAIN CODE",
            "Student Order",
            AggregateOptions::default(),
        )
        .expect("summarize");
        assert_eq!(report.rows.len(), 3);
        assert_eq!(report.rows[0].group, vec![utf8("GOA"), utf8("GOVT")]);
    }

    fn allotment_fixture() -> Table {
        table(vec![
            (
                "Course",
                vec![utf8("MBBS"), utf8("MBBS"), utf8("BDS"), utf8("MBBS"), utf8("BDS")],
            ),
            (
                "Category",
                vec![utf8("Open"), utf8("EWS"), utf8("Open"), utf8("Open"), utf8("SC")],
            ),
            (
                "AIR",
                vec![
                    Scalar::Int64(120),
                    Scalar::Int64(450),
                    Scalar::Int64(300),
                    Scalar::Int64(95),
                    Scalar::Null(NullKind::Null),
                ],
            ),
        ])
    }

    #[test]
    fn pivot_spreads_max_by_course_and_category() {
        let out = pivot(
            &allotment_fixture(),
            &PivotSpec {
                row_columns: vec!["Course".to_owned()],
                column_dimension: Some("Category".to_owned()),
                value_column: "AIR".to_owned(),
                func: AggFunc::Max,
                column_order: vec!["Open".to_owned(), "EWS".to_owned(), "SC".to_owned()],
            },
        )
        .expect("pivot");

        assert_eq!(out.column_names(), &["Course", "Open", "EWS", "SC"]);
        // Rows sort by label: BDS before MBBS.
        assert_eq!(out.column("Course").unwrap().values()[0], utf8("BDS"));
        assert_eq!(
            out.column("Open").unwrap().values()[1],
            Scalar::Float64(120.0)
        );
        assert_eq!(
            out.column("EWS").unwrap().values()[1],
            Scalar::Float64(450.0)
        );
        // BDS has no EWS row; the absent cell fills with zero. The SC cell
        // exists but its only value is missing, so it fills too.
        assert_eq!(out.column("EWS").unwrap().values()[0], Scalar::Float64(0.0));
        assert_eq!(out.column("SC").unwrap().values()[0], Scalar::Float64(0.0));
    }

    #[test]
    fn pivot_without_dimension_keeps_the_value_column_name() {
        let out = pivot(
            &allotment_fixture(),
            &PivotSpec {
                row_columns: vec!["Course".to_owned()],
                column_dimension: None,
                value_column: "AIR".to_owned(),
                func: AggFunc::Count,
                column_order: Vec::new(),
            },
        )
        .expect("pivot");

        assert_eq!(out.column_names(), &["Course", "AIR"]);
        // BDS counts one parseable AIR; the missing one does not count.
        assert_eq!(out.column("AIR").unwrap().values()[0], Scalar::Int64(1));
        assert_eq!(out.column("AIR").unwrap().values()[1], Scalar::Int64(3));
    }

    #[test]
    fn pivot_mean_and_sum_agree_with_counts() {
        let spec = |func| PivotSpec {
            row_columns: vec!["Category".to_owned()],
            column_dimension: None,
            value_column: "AIR".to_owned(),
            func,
            column_order: Vec::new(),
        };
        let sums = pivot(&allotment_fixture(), &spec(AggFunc::Sum)).expect("sum");
        let means = pivot(&allotment_fixture(), &spec(AggFunc::Mean)).expect("mean");
        // Open holds 120, 300, 95.
        assert_eq!(
            sums.column("AIR").unwrap().values()[1],
            Scalar::Float64(515.0)
        );
        assert!(
            matches!(means.column("AIR").unwrap().values()[1], Scalar::Float64(v) if (v - 515.0 / 3.0).abs() < 1e-9)
        );
    }

    #[test]
    fn pivot_rejects_absent_columns() {
        let err = pivot(
            &allotment_fixture(),
            &PivotSpec {
                row_columns: vec!["Course".to_owned()],
                column_dimension: Some("Quota".to_owned()),
                value_column: "AIR".to_owned(),
                func: AggFunc::Max,
                column_order: Vec::new(),
            },
        )
        .expect_err("absent dimension");
        assert_eq!(err.to_string(), "column 'Quota' not found");
    }

    #[test]
    fn binning_buckets_anchor_at_the_column_minimum() {
        let binned =
            bin_numeric_column(&allotment_fixture(), "AIR", 100).expect("bin");
        let column = binned.column("AIR").unwrap();
        assert_eq!(column.values()[0], utf8("[95, 195)"));
        assert_eq!(column.values()[1], utf8("[395, 495)"));
        assert_eq!(column.values()[3], utf8("[95, 195)"));
        assert!(column.values()[4].is_missing());
    }

    #[test]
    fn binning_rejects_text_columns_and_zero_widths() {
        let err = bin_numeric_column(&allotment_fixture(), "Course", 10).expect_err("text");
        assert_eq!(err.to_string(), "column 'Course' is not numeric");

        let err = bin_numeric_column(&allotment_fixture(), "AIR", 0).expect_err("width");
        assert!(matches!(err, AggregateError::InvalidBinSize { bin_size: 0 }));
    }

    #[test]
    fn rank_order_sorts_and_numbers_rows() {
        let reference = table(vec![
            (
                "State",
                vec![utf8("KERALA"), utf8("GOA"), utf8("KERALA"), utf8("ASSAM")],
            ),
            (
                "Program",
                vec![utf8("MBBS"), utf8("MBBS"), utf8("BDS"), utf8("MBBS")],
            ),
            (
                "TYPE",
                vec![utf8("GOVT"), utf8("GOVT"), utf8("GOVT"), utf8("GOVT")],
            ),
        ]);
        let program_ranks = RankSpec {
            name: "Program Rank".to_owned(),
            columns: vec!["Program".to_owned(), "TYPE".to_owned()],
            ranks: vec![
                (vec![utf8("MBBS"), utf8("GOVT")], 1),
                (vec![utf8("BDS"), utf8("GOVT")], 2),
            ],
        };
        let state_ranks = RankSpec {
            name: "State Rank".to_owned(),
            columns: vec!["State".to_owned()],
            ranks: vec![(vec![utf8("GOA")], 1), (vec![utf8("KERALA")], 2)],
        };

        let ordered = rank_order(&reference, &program_ranks, &state_ranks).expect("rank order");
        // ASSAM has no state rank, so three rows survive.
        assert_eq!(ordered.len(), 3);
        let states = ordered.column("State").unwrap();
        assert_eq!(states.values()[0], utf8("GOA"));
        assert_eq!(states.values()[1], utf8("KERALA"));
        // BDS ranks after both MBBS rows.
        assert_eq!(
            ordered.column("Program").unwrap().values()[2],
            utf8("BDS")
        );
        let order_numbers = ordered.column(ORDER_NUMBER_COLUMN).unwrap();
        assert_eq!(order_numbers.values()[0], Scalar::Int64(1));
        assert_eq!(order_numbers.values()[2], Scalar::Int64(3));
    }
}
