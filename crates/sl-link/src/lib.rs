#![forbid(unsafe_code)]

use std::collections::{HashMap, HashSet};
use std::mem::size_of;

use bumpalo::{collections::Vec as BumpVec, Bump};
use serde::{Deserialize, Serialize};
use sl_table::{Table, TableError};
use sl_types::Scalar;
use thiserror::Error;

/// Suffix applied to reference-side columns whose name collides with a
/// candidate column in the linked output.
pub const REFERENCE_SUFFIX: &str = "_ref";

pub const DEFAULT_ARENA_BUDGET_BYTES: usize = 256 * 1024 * 1024;

#[derive(Debug, Error)]
pub enum LinkError {
    #[error("{side} table has no key column '{name}'")]
    KeyColumnMissing { side: &'static str, name: String },
    #[error(transparent)]
    Table(#[from] TableError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LinkExecutionOptions {
    pub use_arena: bool,
    pub arena_budget_bytes: usize,
}

impl Default for LinkExecutionOptions {
    fn default() -> Self {
        Self {
            use_arena: true,
            arena_budget_bytes: DEFAULT_ARENA_BUDGET_BYTES,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct LinkExecutionTrace {
    used_arena: bool,
    output_rows: usize,
    estimated_bytes: usize,
}

/// What the linker noticed while joining. Nothing here stops the join;
/// every condition is surfaced for the caller to act on.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkDiagnostics {
    /// Distinct candidate keys with no reference counterpart, first-seen order.
    pub candidate_only: Vec<String>,
    /// Distinct reference keys with no candidate counterpart, first-seen order.
    pub reference_only: Vec<String>,
    /// Keys occurring more than once in the candidate table.
    pub candidate_duplicates: Vec<String>,
    /// Keys occurring more than once in the reference table. Duplicates on
    /// either side cartesian-expand in the output; that expansion is the
    /// caller's to resolve once flagged.
    pub reference_duplicates: Vec<String>,
    /// Candidate rows whose key could not be formed at all.
    pub candidate_missing_key: usize,
}

impl LinkDiagnostics {
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.candidate_only.is_empty()
            && self.reference_only.is_empty()
            && self.candidate_duplicates.is_empty()
            && self.reference_duplicates.is_empty()
            && self.candidate_missing_key == 0
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Linked {
    pub table: Table,
    pub diagnostics: LinkDiagnostics,
}

pub fn link_tables(
    candidate: &Table,
    reference: &Table,
    key_column: &str,
) -> Result<Linked, LinkError> {
    link_tables_with_options(candidate, reference, key_column, LinkExecutionOptions::default())
}

pub fn link_tables_with_options(
    candidate: &Table,
    reference: &Table,
    key_column: &str,
    options: LinkExecutionOptions,
) -> Result<Linked, LinkError> {
    let (linked, _) = link_tables_with_trace(candidate, reference, key_column, options)?;
    Ok(linked)
}

fn link_tables_with_trace(
    candidate: &Table,
    reference: &Table,
    key_column: &str,
    options: LinkExecutionOptions,
) -> Result<(Linked, LinkExecutionTrace), LinkError> {
    let candidate_keys = candidate
        .column(key_column)
        .ok_or_else(|| LinkError::KeyColumnMissing {
            side: "candidate",
            name: key_column.to_owned(),
        })?;
    let reference_keys = reference
        .column(key_column)
        .ok_or_else(|| LinkError::KeyColumnMissing {
            side: "reference",
            name: key_column.to_owned(),
        })?;

    // Borrowed-key build phase over the reference side; missing reference
    // keys are unjoinable and only show up in diagnostics.
    let mut reference_map = HashMap::<&str, Vec<usize>>::new();
    for (pos, key) in reference_keys.values().iter().enumerate() {
        if let Scalar::Utf8(key) = key {
            reference_map.entry(key.as_str()).or_default().push(pos);
        }
    }

    let output_rows = estimate_output_rows(candidate_keys.values(), &reference_map);
    let estimated_bytes = estimate_intermediate_bytes(output_rows);
    let use_arena = options.use_arena && estimated_bytes <= options.arena_budget_bytes;

    let (left_positions, right_positions) = if use_arena {
        let arena = Bump::new();
        let mut left = BumpVec::with_capacity_in(output_rows, &arena);
        let mut right = BumpVec::with_capacity_in(output_rows, &arena);
        fill_positions(candidate_keys.values(), &reference_map, &mut left, &mut right);
        (left.to_vec(), right.to_vec())
    } else {
        let mut left = Vec::with_capacity(output_rows);
        let mut right = Vec::with_capacity(output_rows);
        fill_positions(candidate_keys.values(), &reference_map, &mut left, &mut right);
        (left, right)
    };

    let table = emit_linked_table(
        candidate,
        reference,
        key_column,
        &left_positions,
        &right_positions,
    )?;
    let diagnostics = collect_diagnostics(
        candidate_keys.values(),
        reference_keys.values(),
        &reference_map,
    );

    Ok((
        Linked { table, diagnostics },
        LinkExecutionTrace {
            used_arena: use_arena,
            output_rows,
            estimated_bytes,
        },
    ))
}

fn estimate_output_rows(
    candidate_keys: &[Scalar],
    reference_map: &HashMap<&str, Vec<usize>>,
) -> usize {
    candidate_keys
        .iter()
        .map(|key| match key {
            Scalar::Utf8(key) => reference_map.get(key.as_str()).map_or(1, Vec::len),
            _ => 1,
        })
        .sum()
}

fn estimate_intermediate_bytes(output_rows: usize) -> usize {
    output_rows.saturating_mul(size_of::<Option<usize>>().saturating_mul(2))
}

/// Left-join emit: every candidate row lands at least once; a matched key
/// fans out to every matching reference row, an unmatched (or missing) key
/// pairs with nothing.
fn fill_positions<L, R>(
    candidate_keys: &[Scalar],
    reference_map: &HashMap<&str, Vec<usize>>,
    left: &mut L,
    right: &mut R,
) where
    L: Extend<Option<usize>>,
    R: Extend<Option<usize>>,
{
    for (candidate_pos, key) in candidate_keys.iter().enumerate() {
        let matches = match key {
            Scalar::Utf8(key) => reference_map.get(key.as_str()),
            _ => None,
        };
        match matches {
            Some(reference_positions) => {
                for &reference_pos in reference_positions {
                    left.extend([Some(candidate_pos)]);
                    right.extend([Some(reference_pos)]);
                }
            }
            None => {
                left.extend([Some(candidate_pos)]);
                right.extend([None]);
            }
        }
    }
}

fn emit_linked_table(
    candidate: &Table,
    reference: &Table,
    key_column: &str,
    left_positions: &[Option<usize>],
    right_positions: &[Option<usize>],
) -> Result<Table, LinkError> {
    let mut pairs = Vec::with_capacity(candidate.column_count() + reference.column_count());

    for name in candidate.column_names() {
        let column = candidate
            .column(name)
            .expect("column name listed in order must exist");
        pairs.push((name.clone(), column.take_by_positions(left_positions)));
    }

    let candidate_names: HashSet<&str> =
        candidate.column_names().iter().map(String::as_str).collect();
    for name in reference.column_names() {
        if name == key_column {
            // The key is already present from the candidate side.
            continue;
        }
        let column = reference
            .column(name)
            .expect("column name listed in order must exist");
        let out_name = if candidate_names.contains(name.as_str()) {
            format!("{name}{REFERENCE_SUFFIX}")
        } else {
            name.clone()
        };
        pairs.push((out_name, column.take_by_positions(right_positions)));
    }

    Ok(Table::from_columns(pairs)?)
}

fn collect_diagnostics(
    candidate_keys: &[Scalar],
    reference_keys: &[Scalar],
    reference_map: &HashMap<&str, Vec<usize>>,
) -> LinkDiagnostics {
    let mut diagnostics = LinkDiagnostics::default();

    let mut candidate_counts = HashMap::<&str, usize>::new();
    let mut candidate_order = Vec::new();
    for key in candidate_keys {
        match key {
            Scalar::Utf8(key) => {
                let count = candidate_counts.entry(key.as_str()).or_insert(0);
                if *count == 0 {
                    candidate_order.push(key.as_str());
                }
                *count += 1;
            }
            _ => diagnostics.candidate_missing_key += 1,
        }
    }

    for &key in &candidate_order {
        if !reference_map.contains_key(key) {
            diagnostics.candidate_only.push(key.to_owned());
        }
        if candidate_counts[key] > 1 {
            diagnostics.candidate_duplicates.push(key.to_owned());
        }
    }

    let mut seen_reference = HashSet::<&str>::new();
    for key in reference_keys {
        if let Scalar::Utf8(key) = key {
            if !seen_reference.insert(key.as_str()) {
                continue;
            }
            if !candidate_counts.contains_key(key.as_str()) {
                diagnostics.reference_only.push(key.clone());
            }
            if reference_map[key.as_str()].len() > 1 {
                diagnostics.reference_duplicates.push(key.clone());
            }
        }
    }

    diagnostics
}

// ── Standalone key comparison ──────────────────────────────────────────

/// The two set differences of a key column across two tables, distinct
/// keys in first-seen order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyComparison {
    pub missing_in_right: Vec<String>,
    pub missing_in_left: Vec<String>,
}

pub fn compare_keys(
    left: &Table,
    right: &Table,
    key_column: &str,
) -> Result<KeyComparison, LinkError> {
    let left_keys = left
        .column(key_column)
        .ok_or_else(|| LinkError::KeyColumnMissing {
            side: "candidate",
            name: key_column.to_owned(),
        })?;
    let right_keys = right
        .column(key_column)
        .ok_or_else(|| LinkError::KeyColumnMissing {
            side: "reference",
            name: key_column.to_owned(),
        })?;

    let left_set: HashSet<&str> = text_keys(left_keys.values()).collect();
    let right_set: HashSet<&str> = text_keys(right_keys.values()).collect();

    let mut comparison = KeyComparison::default();
    let mut seen = HashSet::new();
    for key in text_keys(left_keys.values()) {
        if !right_set.contains(key) && seen.insert(key) {
            comparison.missing_in_right.push(key.to_owned());
        }
    }
    seen.clear();
    for key in text_keys(right_keys.values()) {
        if !left_set.contains(key) && seen.insert(key) {
            comparison.missing_in_left.push(key.to_owned());
        }
    }
    Ok(comparison)
}

fn text_keys(values: &[Scalar]) -> impl Iterator<Item = &str> {
    values.iter().filter_map(|value| match value {
        Scalar::Utf8(key) => Some(key.as_str()),
        _ => None,
    })
}
