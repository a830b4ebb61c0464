#![forbid(unsafe_code)]

//! The request/response pipeline: validate an uploaded candidate table,
//! key both sides the same way, link, filter, summarize. Holds no global
//! state; the only thing shared across requests is the read-only
//! [`Reference`] a session loads once.

use std::path::Path;

use log::{info, warn};
use serde::{Deserialize, Serialize};
use sl_aggregate::{summarize, AggregateError, AggregateOptions, SummaryReport};
use sl_io::{load_reference_csv, require_min_columns, IoError, CANDIDATE_MIN_COLUMNS};
use sl_key::{derive_composite_key, normalize_key_columns, KeyError, KeySpec, DEFAULT_KEY_COLUMN, KEY_SEPARATOR};
use sl_link::{link_tables_with_options, LinkDiagnostics, LinkError, LinkExecutionOptions};
use sl_table::{apply_predicates, Predicate, Table, TableError};
use thiserror::Error;

// Column conventions of the master workbook this library grew around.
pub const STATE_COLUMN: &str = "State";
pub const PROGRAM_COLUMN: &str = "Program";
pub const TYPE_COLUMN: &str = "TYPE";
pub const COLLEGE_CODE_COLUMN: &str = "MCC College Code";
pub const COURSE_CODE_COLUMN: &str = "COURSE CODE";
pub const STUDENT_ORDER_COLUMN: &str = "Student Order";

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("candidate keys on '{candidate}' but the reference keys on '{reference}'")]
    KeyColumnMismatch {
        candidate: String,
        reference: String,
    },
    #[error(transparent)]
    Io(#[from] IoError),
    #[error(transparent)]
    Key(#[from] KeyError),
    #[error(transparent)]
    Link(#[from] LinkError),
    #[error(transparent)]
    Aggregate(#[from] AggregateError),
    #[error(transparent)]
    Table(#[from] TableError),
}

/// How the reference table is prepared at load: which text columns get the
/// trim+uppercase treatment and how its composite key is built.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReferenceSpec {
    pub normalize_columns: Vec<String>,
    pub key_spec: KeySpec,
}

impl Default for ReferenceSpec {
    fn default() -> Self {
        Self {
            normalize_columns: vec![
                STATE_COLUMN.to_owned(),
                PROGRAM_COLUMN.to_owned(),
                TYPE_COLUMN.to_owned(),
            ],
            key_spec: KeySpec {
                fields: vec![COLLEGE_CODE_COLUMN.to_owned(), COURSE_CODE_COLUMN.to_owned()],
                separator: KEY_SEPARATOR,
                key_column: DEFAULT_KEY_COLUMN.to_owned(),
            },
        }
    }
}

/// The session's normalized, keyed, read-only reference table. Built once,
/// then only read; concurrent sessions may share it freely.
#[derive(Debug, Clone, PartialEq)]
pub struct Reference {
    table: Table,
    key_column: String,
}

impl Reference {
    pub fn from_table(raw: Table, spec: &ReferenceSpec) -> Result<Self, PipelineError> {
        let normalized = normalize_key_columns(raw, &spec.normalize_columns)?;
        let keyed = derive_composite_key(normalized, &spec.key_spec)?;
        info!(
            "reference ready: {} rows, keyed on '{}'",
            keyed.len(),
            spec.key_spec.key_column
        );
        Ok(Self {
            table: keyed,
            key_column: spec.key_spec.key_column.clone(),
        })
    }

    /// Load from a CSV-shaped file; an absent file reports before linking.
    pub fn load_csv(path: impl AsRef<Path>, spec: &ReferenceSpec) -> Result<Self, PipelineError> {
        let raw = load_reference_csv(path)?;
        Self::from_table(raw, spec)
    }

    #[must_use]
    pub fn table(&self) -> &Table {
        &self.table
    }

    #[must_use]
    pub fn key_column(&self) -> &str {
        &self.key_column
    }
}

/// Validation and keying rules for an uploaded candidate table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandidateSpec {
    /// Header renames applied before anything else; uploads arrive with
    /// arbitrary headers.
    pub rename: Vec<(String, String)>,
    /// Columns that must exist after renaming.
    pub required_columns: Vec<String>,
    /// Uploads narrower than this are malformed.
    pub min_columns: usize,
    pub key_spec: KeySpec,
    pub ordinal_column: String,
}

impl Default for CandidateSpec {
    fn default() -> Self {
        Self {
            rename: Vec::new(),
            required_columns: vec![
                COLLEGE_CODE_COLUMN.to_owned(),
                COURSE_CODE_COLUMN.to_owned(),
                STUDENT_ORDER_COLUMN.to_owned(),
            ],
            min_columns: CANDIDATE_MIN_COLUMNS,
            key_spec: KeySpec {
                fields: vec![COLLEGE_CODE_COLUMN.to_owned(), COURSE_CODE_COLUMN.to_owned()],
                separator: KEY_SEPARATOR,
                key_column: DEFAULT_KEY_COLUMN.to_owned(),
            },
            ordinal_column: STUDENT_ORDER_COLUMN.to_owned(),
        }
    }
}

/// Everything request-scoped: the user's filters and grouping choice.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinkRequest {
    pub filters: Vec<Predicate>,
    pub group_columns: Vec<String>,
    pub aggregate: AggregateOptions,
    #[serde(skip)]
    pub link: LinkExecutionOptions,
}

impl LinkRequest {
    #[must_use]
    pub fn grouped_by(group_columns: Vec<String>) -> Self {
        Self {
            filters: Vec::new(),
            group_columns,
            aggregate: AggregateOptions::default(),
            link: LinkExecutionOptions::default(),
        }
    }
}

impl Default for LinkRequest {
    fn default() -> Self {
        Self::grouped_by(vec![STATE_COLUMN.to_owned()])
    }
}

/// What a request hands back to the presentation layer: the full linked
/// table, the linker's diagnostics, and the grouped summary.
#[derive(Debug, Clone, PartialEq)]
pub struct LinkReport {
    pub linked: Table,
    pub diagnostics: LinkDiagnostics,
    pub summary: SummaryReport,
}

/// Validate, key, link, filter, summarize — in that order, halting at the
/// first stage whose input is unusable. Diagnostics never halt the run;
/// they ride along in the report.
pub fn run_link_report(
    reference: &Reference,
    candidate_raw: Table,
    candidate_spec: &CandidateSpec,
    request: &LinkRequest,
) -> Result<LinkReport, PipelineError> {
    if candidate_spec.key_spec.key_column != reference.key_column {
        return Err(PipelineError::KeyColumnMismatch {
            candidate: candidate_spec.key_spec.key_column.clone(),
            reference: reference.key_column.clone(),
        });
    }

    require_min_columns(&candidate_raw, candidate_spec.min_columns)?;
    let renamed = candidate_raw.rename_columns(&candidate_spec.rename)?;
    renamed.require_columns(&candidate_spec.required_columns)?;

    let candidate = derive_composite_key(renamed, &candidate_spec.key_spec)?;
    info!("candidate ready: {} rows", candidate.len());

    let linked = link_tables_with_options(
        &candidate,
        reference.table(),
        &reference.key_column,
        request.link,
    )?;
    report_diagnostics(&linked.diagnostics);

    let filtered = apply_predicates(&linked.table, &request.filters)?;
    if filtered.len() != linked.table.len() {
        info!(
            "filters kept {} of {} linked rows",
            filtered.len(),
            linked.table.len()
        );
    }

    let summary = summarize(
        &filtered,
        &request.group_columns,
        &reference.key_column,
        &candidate_spec.ordinal_column,
        request.aggregate,
    )?;
    if summary.skipped_ordinals > 0 {
        warn!(
            "{} ordinal cells were missing or unparseable",
            summary.skipped_ordinals
        );
    }
    info!("summary: {} groups", summary.rows.len());

    Ok(LinkReport {
        linked: linked.table,
        diagnostics: linked.diagnostics,
        summary,
    })
}

fn report_diagnostics(diagnostics: &LinkDiagnostics) {
    if diagnostics.is_clean() {
        return;
    }
    if !diagnostics.candidate_only.is_empty() {
        warn!(
            "{} candidate keys have no reference counterpart",
            diagnostics.candidate_only.len()
        );
    }
    if !diagnostics.reference_only.is_empty() {
        info!(
            "{} reference keys were not uploaded",
            diagnostics.reference_only.len()
        );
    }
    if !diagnostics.candidate_duplicates.is_empty() || !diagnostics.reference_duplicates.is_empty()
    {
        warn!(
            "duplicate keys: {} candidate, {} reference; matches expand pairwise",
            diagnostics.candidate_duplicates.len(),
            diagnostics.reference_duplicates.len()
        );
    }
    if diagnostics.candidate_missing_key > 0 {
        warn!(
            "{} candidate rows have no usable key",
            diagnostics.candidate_missing_key
        );
    }
}
