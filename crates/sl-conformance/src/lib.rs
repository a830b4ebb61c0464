#![forbid(unsafe_code)]

//! Shared fixtures for the end-to-end suites and the report harness: a
//! small master table and a matching allotment upload, shaped like the
//! real workbooks (same headers, same warts — stray case, padding, a
//! thousands separator, an unmatched code).

use sl_pipeline::{Reference, ReferenceSpec};
use sl_table::{Column, Table};
use sl_types::Scalar;

/// Master sheet: institution/course codes with state, program, type and
/// fee columns.
#[must_use]
pub fn reference_csv() -> &'static str {
    "MCC College Code,COURSE CODE,State,Program,TYPE,Quota,Fees\n\
     1101,MBBS, kerala ,mbbs,govt,AIQ,5000\n\
     1101,BDS,kerala,bds,govt,AIQ,4500\n\
     1102,MBBS,goa,MBBS,private,AIQ,7500\n\
     1103,MBBS,assam,mbbs,govt,AIQ,6200\n"
}

/// Allotment upload: seven columns, 1-based Student Order, one code the
/// master does not carry, one ordinal with a thousands separator, one
/// junk ordinal.
#[must_use]
pub fn candidate_csv() -> &'static str {
    "MCC College Code,COURSE CODE,Quota,Category,Round,Remarks,Student Order\n\
     1101,mbbs ,AIQ,OPEN,1,-,3\n\
     1101,MBBS,AIQ,EWS,1,-,4\n\
     1102,MBBS,AIQ,OPEN,1,-,1\n\
     9999,XXX,AIQ,OPEN,2,-,2\n\
     1103,MBBS,AIQ,OPEN,2,-,\"1,205\"\n\
     1101,BDS,AIQ,OPEN,2,-,n/a\n"
}

pub fn fixture_reference() -> Reference {
    let raw = sl_io::read_csv_str(reference_csv()).expect("reference fixture parses");
    Reference::from_table(raw, &ReferenceSpec::default()).expect("reference fixture keys")
}

pub fn fixture_candidate() -> Table {
    sl_io::read_csv_str(candidate_csv()).expect("candidate fixture parses")
}

/// Build a table from (name, values) pairs; fixture shorthand.
pub fn table_of(pairs: Vec<(&str, Vec<Scalar>)>) -> Table {
    Table::from_columns(
        pairs
            .into_iter()
            .map(|(name, values)| {
                (
                    name.to_owned(),
                    Column::from_values(values).expect("fixture column"),
                )
            })
            .collect(),
    )
    .expect("fixture table")
}

#[must_use]
pub fn utf8(value: &str) -> Scalar {
    Scalar::Utf8(value.to_owned())
}
