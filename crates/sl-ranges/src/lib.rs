#![forbid(unsafe_code)]

use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RangeError {
    #[error("malformed range token '{token}'")]
    MalformedToken { token: String },
    #[error("descending range '{start}-{end}'")]
    DescendingRange { start: i64, end: i64 },
}

/// Collapse a caller-sorted list of ordinals into maximal contiguous runs.
///
/// Single pass: a new run starts whenever the current value is not exactly
/// one greater than the previous. A run renders as `"start"` when it holds
/// one value, else `"start-end"`. The input is not sorted here; on unsorted
/// input every descent simply opens a new run.
#[must_use]
pub fn compress(sorted: &[i64]) -> Vec<String> {
    let mut out = Vec::new();
    let Some((&first, rest)) = sorted.split_first() else {
        return out;
    };

    let mut start = first;
    let mut end = first;
    for &value in rest {
        if value == end + 1 {
            end = value;
        } else {
            out.push(render_run(start, end));
            start = value;
            end = value;
        }
    }
    out.push(render_run(start, end));
    out
}

/// The display form the summary tables carry: runs joined with `", "`.
/// Empty input yields the empty string.
#[must_use]
pub fn compress_to_string(sorted: &[i64]) -> String {
    compress(sorted).join(", ")
}

fn render_run(start: i64, end: i64) -> String {
    if start == end {
        start.to_string()
    } else {
        format!("{start}-{end}")
    }
}

/// Parse the display form back to the ordinal list. Bounds are the
/// 1-based ordinals this library deals in; negative bounds do not occur.
pub fn expand(ranges: &str) -> Result<Vec<i64>, RangeError> {
    let mut out = Vec::new();
    for token in ranges.split(',') {
        let token = token.trim();
        if token.is_empty() {
            continue;
        }
        match token.split_once('-') {
            Some((start, end)) => {
                let start = parse_bound(start, token)?;
                let end = parse_bound(end, token)?;
                if start > end {
                    return Err(RangeError::DescendingRange { start, end });
                }
                out.extend(start..=end);
            }
            None => out.push(parse_bound(token, token)?),
        }
    }
    Ok(out)
}

fn parse_bound(raw: &str, token: &str) -> Result<i64, RangeError> {
    raw.trim().parse::<i64>().map_err(|_| RangeError::MalformedToken {
        token: token.to_owned(),
    })
}

#[cfg(test)]
mod tests {
    use super::{compress, compress_to_string, expand, RangeError};

    #[test]
    fn empty_input_compresses_to_nothing() {
        assert!(compress(&[]).is_empty());
        assert_eq!(compress_to_string(&[]), "");
    }

    #[test]
    fn single_value_prints_without_dash() {
        assert_eq!(compress_to_string(&[7]), "7");
    }

    #[test]
    fn contiguous_run_collapses() {
        assert_eq!(compress_to_string(&[3, 4]), "3-4");
        assert_eq!(compress_to_string(&[1, 2, 3, 7, 9, 10]), "1-3, 7, 9-10");
    }

    #[test]
    fn duplicates_each_open_their_own_run() {
        assert_eq!(compress_to_string(&[3, 3, 4]), "3, 3-4");
    }

    #[test]
    fn fully_scattered_input_keeps_every_value() {
        let values = [1, 3, 5, 9];
        let runs = compress(&values);
        assert_eq!(runs.len(), values.len());
    }

    #[test]
    fn expand_reverses_compress() {
        let values = vec![1, 2, 3, 7, 9, 10];
        let rendered = compress_to_string(&values);
        assert_eq!(expand(&rendered).expect("expand"), values);
    }

    #[test]
    fn expand_rejects_junk_tokens() {
        let err = expand("1-3, x").expect_err("junk");
        assert_eq!(err, RangeError::MalformedToken { token: "x".to_owned() });
    }

    #[test]
    fn expand_rejects_descending_ranges() {
        let err = expand("9-3").expect_err("descending");
        assert_eq!(err, RangeError::DescendingRange { start: 9, end: 3 });
    }

    #[test]
    fn expand_of_empty_string_is_empty() {
        assert!(expand("").expect("empty").is_empty());
    }
}
