#![forbid(unsafe_code)]

use sl_io::{read_csv_path, write_csv_string};
use sl_pipeline::{run_link_report, CandidateSpec, LinkRequest, Reference, ReferenceSpec};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    let mut reference_path: Option<String> = None;
    let mut candidate_path: Option<String> = None;
    let mut group_columns: Vec<String> = Vec::new();
    let mut min_columns: Option<usize> = None;
    let mut summary_csv_path: Option<String> = None;

    let mut args = std::env::args().skip(1);
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--reference" => {
                let value = args.next().ok_or("--reference requires a file path")?;
                reference_path = Some(value);
            }
            "--candidate" => {
                let value = args.next().ok_or("--candidate requires a file path")?;
                candidate_path = Some(value);
            }
            "--group" => {
                let value = args.next().ok_or("--group requires a column name")?;
                group_columns.push(value);
            }
            "--min-columns" => {
                let value = args.next().ok_or("--min-columns requires a number")?;
                min_columns = Some(value.parse()?);
            }
            "--write-summary-csv" => {
                let value = args
                    .next()
                    .ok_or("--write-summary-csv requires a file path")?;
                summary_csv_path = Some(value);
            }
            "--help" | "-h" => {
                print_help();
                return Ok(());
            }
            other => {
                return Err(format!("unknown argument: {other}").into());
            }
        }
    }

    let reference_path = reference_path.ok_or("--reference is required")?;
    let candidate_path = candidate_path.ok_or("--candidate is required")?;

    let reference = Reference::load_csv(&reference_path, &ReferenceSpec::default())?;
    let candidate = read_csv_path(&candidate_path)?;

    let mut candidate_spec = CandidateSpec::default();
    if let Some(min_columns) = min_columns {
        candidate_spec.min_columns = min_columns;
    }
    let request = if group_columns.is_empty() {
        LinkRequest::default()
    } else {
        LinkRequest::grouped_by(group_columns)
    };

    let report = run_link_report(&reference, candidate, &candidate_spec, &request)?;

    println!(
        "linked rows={} groups={} skipped_ordinals={}",
        report.linked.len(),
        report.summary.rows.len(),
        report.summary.skipped_ordinals
    );
    for row in &report.summary.rows {
        let group = row
            .group
            .iter()
            .map(|value| value.render_key_part())
            .collect::<Vec<_>>()
            .join("/");
        println!(
            "group={} count={} distinct={} first={} range=\"{}\" share={}%",
            group,
            row.rows,
            row.distinct_keys,
            row.first_ordinal
                .map_or_else(|| "-".to_owned(), |ordinal| ordinal.to_string()),
            row.ordinal_range,
            row.share_percent
        );
    }

    let diagnostics = &report.diagnostics;
    println!(
        "diagnostics candidate_only={} reference_only={} dup_candidate={} dup_reference={} missing_key_rows={}",
        diagnostics.candidate_only.len(),
        diagnostics.reference_only.len(),
        diagnostics.candidate_duplicates.len(),
        diagnostics.reference_duplicates.len(),
        diagnostics.candidate_missing_key
    );
    for key in &diagnostics.candidate_only {
        println!("missing in reference: {key}");
    }
    for key in &diagnostics.reference_only {
        println!("missing in candidate: {key}");
    }

    if let Some(path) = summary_csv_path {
        let csv = write_csv_string(&report.summary.to_table()?)?;
        std::fs::write(&path, csv)?;
        println!("wrote summary_csv={path}");
    }

    Ok(())
}

fn print_help() {
    println!(
        "sl-report\n\
         Usage:\n\
         \tsl-report --reference master.csv --candidate upload.csv [--group State] [--group TYPE]\n\
         Options:\n\
         \t--reference <path>         Master table (CSV with headers)\n\
         \t--candidate <path>         Uploaded allotment table (CSV with headers)\n\
         \t--group <column>           Grouping column, repeatable (default: State)\n\
         \t--min-columns <n>          Override the candidate width check\n\
         \t--write-summary-csv <path> Write the summary table as CSV\n\
         \t-h, --help                 Show this help"
    );
}
