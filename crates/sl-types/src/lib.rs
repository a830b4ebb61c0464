#![forbid(unsafe_code)]

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DType {
    Null,
    Bool,
    Int64,
    Float64,
    Utf8,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NullKind {
    Null,
    NaN,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum Scalar {
    Null(NullKind),
    Bool(bool),
    Int64(i64),
    Float64(f64),
    Utf8(String),
}

impl Scalar {
    #[must_use]
    pub fn dtype(&self) -> DType {
        match self {
            Self::Null(_) => DType::Null,
            Self::Bool(_) => DType::Bool,
            Self::Int64(_) => DType::Int64,
            Self::Float64(_) => DType::Float64,
            Self::Utf8(_) => DType::Utf8,
        }
    }

    #[must_use]
    pub fn is_missing(&self) -> bool {
        match self {
            Self::Null(_) => true,
            Self::Float64(v) => v.is_nan(),
            _ => false,
        }
    }

    #[must_use]
    pub fn missing_for_dtype(dtype: DType) -> Self {
        match dtype {
            DType::Float64 => Self::Null(NullKind::NaN),
            DType::Null | DType::Bool | DType::Int64 | DType::Utf8 => Self::Null(NullKind::Null),
        }
    }

    #[must_use]
    pub fn semantic_eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Float64(a), Self::Float64(b)) => (a.is_nan() && b.is_nan()) || (a == b),
            (Self::Null(NullKind::NaN), Self::Float64(v))
            | (Self::Float64(v), Self::Null(NullKind::NaN)) => v.is_nan(),
            (Self::Null(_), Self::Null(_)) => true,
            _ => self == other,
        }
    }

    pub fn to_f64(&self) -> Result<f64, TypeError> {
        match self {
            Self::Bool(v) => Ok(if *v { 1.0 } else { 0.0 }),
            Self::Int64(v) => Ok(*v as f64),
            Self::Float64(v) => Ok(*v),
            Self::Null(kind) => Err(TypeError::ValueIsMissing { kind: *kind }),
            Self::Utf8(v) => Err(TypeError::NonNumericValue {
                value: v.clone(),
                dtype: DType::Utf8,
            }),
        }
    }

    /// Render the scalar the way a key component should read: canonical
    /// decimal for numbers, the string itself for text, empty for missing.
    #[must_use]
    pub fn render_key_part(&self) -> String {
        match self {
            Self::Null(_) => String::new(),
            Self::Bool(v) => v.to_string(),
            Self::Int64(v) => v.to_string(),
            Self::Float64(v) => {
                if v.is_nan() {
                    String::new()
                } else if v.is_finite() && *v == v.trunc() {
                    // Code columns read from spreadsheets often arrive as
                    // floats; 1101.0 must key as "1101".
                    format!("{}", *v as i64)
                } else {
                    v.to_string()
                }
            }
            Self::Utf8(v) => v.clone(),
        }
    }
}

#[derive(Debug, Error, Clone, PartialEq)]
pub enum TypeError {
    #[error("dtype coercion from {left:?} to {right:?} has no compatible common type")]
    IncompatibleDtypes { left: DType, right: DType },
    #[error("cannot cast scalar of dtype {from:?} to {to:?}")]
    InvalidCast { from: DType, to: DType },
    #[error("cannot cast float {value} to int64 without loss")]
    LossyFloatToInt { value: f64 },
    #[error("value {value:?} has non-numeric dtype {dtype:?}")]
    NonNumericValue { value: String, dtype: DType },
    #[error("value is missing ({kind:?})")]
    ValueIsMissing { kind: NullKind },
}

pub fn common_dtype(left: DType, right: DType) -> Result<DType, TypeError> {
    use DType::{Bool, Float64, Int64, Null, Utf8};

    let out = match (left, right) {
        (a, b) if a == b => a,
        (Null, other) | (other, Null) => other,
        (Bool, Int64) | (Int64, Bool) => Int64,
        (Bool, Float64) | (Float64, Bool) => Float64,
        (Int64, Float64) | (Float64, Int64) => Float64,
        (Utf8, Utf8) => Utf8,
        _ => return Err(TypeError::IncompatibleDtypes { left, right }),
    };

    Ok(out)
}

pub fn infer_dtype(values: &[Scalar]) -> Result<DType, TypeError> {
    let mut current = DType::Null;
    for value in values {
        current = common_dtype(current, value.dtype())?;
    }
    Ok(current)
}

/// Cast a scalar to a target dtype, taking ownership so identity casts move
/// the value through unchanged.
pub fn cast_scalar_owned(value: Scalar, target: DType) -> Result<Scalar, TypeError> {
    let from = value.dtype();
    if matches!(value, Scalar::Null(_)) {
        return Ok(Scalar::missing_for_dtype(target));
    }
    if from == target {
        return Ok(value);
    }

    match target {
        DType::Null => Ok(Scalar::Null(NullKind::Null)),
        DType::Int64 => match &value {
            Scalar::Bool(v) => Ok(Scalar::Int64(i64::from(*v))),
            Scalar::Float64(v) => {
                if !v.is_finite() || *v != v.trunc() {
                    return Err(TypeError::LossyFloatToInt { value: *v });
                }
                if *v < i64::MIN as f64 || *v > i64::MAX as f64 {
                    return Err(TypeError::LossyFloatToInt { value: *v });
                }
                Ok(Scalar::Int64(*v as i64))
            }
            _ => Err(TypeError::InvalidCast { from, to: target }),
        },
        DType::Float64 => match &value {
            Scalar::Bool(v) => Ok(Scalar::Float64(if *v { 1.0 } else { 0.0 })),
            Scalar::Int64(v) => Ok(Scalar::Float64(*v as f64)),
            _ => Err(TypeError::InvalidCast { from, to: target }),
        },
        DType::Bool | DType::Utf8 => Err(TypeError::InvalidCast { from, to: target }),
    }
}

pub fn cast_scalar(value: &Scalar, target: DType) -> Result<Scalar, TypeError> {
    cast_scalar_owned(value.clone(), target)
}

// ── Missingness utilities ──────────────────────────────────────────────

pub fn isna(values: &[Scalar]) -> Vec<bool> {
    values.iter().map(Scalar::is_missing).collect()
}

pub fn count_na(values: &[Scalar]) -> usize {
    values.iter().filter(|v| v.is_missing()).count()
}

// ── Ordinal coercion ───────────────────────────────────────────────────

/// Coerce a cell to a preference-order number.
///
/// Accepts `Int64`, integral `Float64`, and digit strings with optional
/// thousands separators ("1,234"). Anything else — including non-integral
/// floats and free text — coerces to `None`, the missing marker; callers
/// count and report those rather than failing the aggregation.
#[must_use]
pub fn parse_ordinal(value: &Scalar) -> Option<i64> {
    match value {
        Scalar::Int64(v) => Some(*v),
        Scalar::Float64(v) => float_to_ordinal(*v),
        Scalar::Utf8(raw) => {
            let cleaned: String = raw.trim().chars().filter(|c| *c != ',').collect();
            if cleaned.is_empty() {
                return None;
            }
            if let Ok(v) = cleaned.parse::<i64>() {
                return Some(v);
            }
            cleaned.parse::<f64>().ok().and_then(float_to_ordinal)
        }
        Scalar::Null(_) | Scalar::Bool(_) => None,
    }
}

fn float_to_ordinal(v: f64) -> Option<i64> {
    if !v.is_finite() || v != v.trunc() {
        return None;
    }
    if v < i64::MIN as f64 || v > i64::MAX as f64 {
        return None;
    }
    Some(v as i64)
}

#[cfg(test)]
mod tests {
    use super::{
        cast_scalar, common_dtype, count_na, infer_dtype, parse_ordinal, DType, NullKind, Scalar,
    };

    #[test]
    fn dtype_inference_coerces_numeric_values() {
        let values = vec![Scalar::Bool(true), Scalar::Int64(7), Scalar::Float64(3.5)];
        assert_eq!(
            infer_dtype(&values).expect("dtype should infer"),
            DType::Float64
        );
    }

    #[test]
    fn missing_values_get_target_missing_marker() {
        let missing = Scalar::Null(NullKind::Null);
        let cast = cast_scalar(&missing, DType::Float64).expect("missing casts");
        assert_eq!(cast, Scalar::Null(NullKind::NaN));
    }

    #[test]
    fn semantic_eq_treats_nan_as_equal() {
        let left = Scalar::Float64(f64::NAN);
        let right = Scalar::Null(NullKind::NaN);
        assert!(left.semantic_eq(&right));
    }

    #[test]
    fn common_dtype_rejects_string_numeric_mix() {
        let err = common_dtype(DType::Utf8, DType::Int64).expect_err("must fail");
        assert_eq!(
            err.to_string(),
            "dtype coercion from Utf8 to Int64 has no compatible common type"
        );
    }

    #[test]
    fn count_na_counts_nulls_and_nans() {
        let vals = vec![
            Scalar::Int64(1),
            Scalar::Null(NullKind::Null),
            Scalar::Float64(f64::NAN),
        ];
        assert_eq!(count_na(&vals), 2);
        assert_eq!(super::isna(&vals), vec![false, true, true]);
    }

    // ── Ordinal coercion ───────────────────────────────────────────────

    #[test]
    fn parse_ordinal_accepts_plain_integers() {
        assert_eq!(parse_ordinal(&Scalar::Int64(42)), Some(42));
        assert_eq!(parse_ordinal(&Scalar::Float64(42.0)), Some(42));
    }

    #[test]
    fn parse_ordinal_strips_thousands_separators() {
        assert_eq!(
            parse_ordinal(&Scalar::Utf8("1,234".to_owned())),
            Some(1234)
        );
        assert_eq!(
            parse_ordinal(&Scalar::Utf8(" 12,34,567 ".to_owned())),
            Some(1_234_567)
        );
    }

    #[test]
    fn parse_ordinal_coerces_junk_to_missing() {
        assert_eq!(parse_ordinal(&Scalar::Utf8("N/A".to_owned())), None);
        assert_eq!(parse_ordinal(&Scalar::Utf8("-".to_owned())), None);
        assert_eq!(parse_ordinal(&Scalar::Float64(3.5)), None);
        assert_eq!(parse_ordinal(&Scalar::Null(NullKind::Null)), None);
    }

    #[test]
    fn parse_ordinal_accepts_integral_float_strings() {
        assert_eq!(parse_ordinal(&Scalar::Utf8("120.0".to_owned())), Some(120));
    }

    #[test]
    fn render_key_part_canonicalizes_numeric_codes() {
        assert_eq!(Scalar::Int64(1101).render_key_part(), "1101");
        assert_eq!(Scalar::Float64(1101.0).render_key_part(), "1101");
        assert_eq!(Scalar::Utf8("A1".to_owned()).render_key_part(), "A1");
        assert_eq!(Scalar::Null(NullKind::Null).render_key_part(), "");
    }
}
