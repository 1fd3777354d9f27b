//! Scalar values and the data-type tag (§3).
//!
//! The C union of six pointer flavors becomes a sum type here (DESIGN NOTES
//! "Tagged data arrays"): every traversal over [`Scalar`] or
//! [`crate::variable::VariableData`] is an exhaustive match instead of a
//! `switch` over an enum discriminant paired with an untyped union access.

use std::fmt::Display;

use crate::error::{HarpErrorKind, HarpResult};

/// The six element types a [`crate::variable::Variable`] may hold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::EnumIter, strum::Display)]
#[strum(serialize_all = "snake_case")]
pub enum DataType {
    Int8,
    Int16,
    Int32,
    Float32,
    Float64,
    String,
}

impl DataType {
    /// Fixed element size in bytes. String elements own a heap-allocated
    /// payload rather than being stored inline, so this is the size of the
    /// tag/pointer slot, not the string's length.
    pub fn element_size(&self) -> usize {
        match self {
            DataType::Int8 => 1,
            DataType::Int16 => 2,
            DataType::Int32 => 4,
            DataType::Float32 => 4,
            DataType::Float64 => 8,
            DataType::String => std::mem::size_of::<usize>(),
        }
    }

    pub fn is_numeric(&self) -> bool {
        !matches!(self, DataType::String)
    }

    pub fn is_floating(&self) -> bool {
        matches!(self, DataType::Float32 | DataType::Float64)
    }

    /// The type's representable extremes, used as the default
    /// `valid_min`/`valid_max` for a freshly created variable (§3: "never
    /// NaN").
    pub fn default_valid_range(&self) -> (Scalar, Scalar) {
        match self {
            DataType::Int8 => (Scalar::Int8(i8::MIN), Scalar::Int8(i8::MAX)),
            DataType::Int16 => (Scalar::Int16(i16::MIN), Scalar::Int16(i16::MAX)),
            DataType::Int32 => (Scalar::Int32(i32::MIN), Scalar::Int32(i32::MAX)),
            DataType::Float32 => (Scalar::Float32(f32::MIN), Scalar::Float32(f32::MAX)),
            DataType::Float64 => (Scalar::Float64(f64::MIN), Scalar::Float64(f64::MAX)),
            DataType::String => (Scalar::String(String::new()), Scalar::String(String::new())),
        }
    }
}

/// A tagged scalar value: the five numeric types plus an owned string (§3).
#[derive(Debug, Clone, PartialEq)]
pub enum Scalar {
    Int8(i8),
    Int16(i16),
    Int32(i32),
    Float32(f32),
    Float64(f64),
    String(String),
}

impl Scalar {
    pub fn data_type(&self) -> DataType {
        match self {
            Scalar::Int8(_) => DataType::Int8,
            Scalar::Int16(_) => DataType::Int16,
            Scalar::Int32(_) => DataType::Int32,
            Scalar::Float32(_) => DataType::Float32,
            Scalar::Float64(_) => DataType::Float64,
            Scalar::String(_) => DataType::String,
        }
    }

    /// Widen a numeric scalar to `f64`. Returns `None` for strings -- the
    /// invariant that string <-> numeric conversion is rejected (§4.A) is
    /// enforced by callers checking this before converting.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Scalar::Int8(v) => Some(*v as f64),
            Scalar::Int16(v) => Some(*v as f64),
            Scalar::Int32(v) => Some(*v as f64),
            Scalar::Float32(v) => Some(*v as f64),
            Scalar::Float64(v) => Some(*v),
            Scalar::String(_) => None,
        }
    }

    /// Narrow an `f64` into `data_type`, with C-truncation semantics for
    /// float-to-int and clamping to the target type's representable
    /// extremes on overflow (§4.A).
    pub fn from_f64_clamped(data_type: DataType, value: f64) -> Scalar {
        match data_type {
            DataType::Int8 => Scalar::Int8(clamp_to_int(value, i8::MIN as f64, i8::MAX as f64) as i8),
            DataType::Int16 => Scalar::Int16(clamp_to_int(value, i16::MIN as f64, i16::MAX as f64) as i16),
            DataType::Int32 => Scalar::Int32(clamp_to_int(value, i32::MIN as f64, i32::MAX as f64) as i32),
            DataType::Float32 => Scalar::Float32(value as f32),
            DataType::Float64 => Scalar::Float64(value),
            DataType::String => Scalar::String(String::new()),
        }
    }

    /// Convert this scalar into another numeric data type, rejecting
    /// string <-> numeric conversions (§4.A).
    pub fn convert(&self, target: DataType) -> HarpResult<Scalar> {
        if self.data_type() == DataType::String || target == DataType::String {
            if self.data_type() != target {
                return Err(error_stack::Report::new(HarpErrorKind::invalid_argument(
                    "cannot convert between string and numeric scalars",
                )));
            }
            return Ok(self.clone());
        }
        let v = self.as_f64().expect("non-string scalar always has an f64 view");
        Ok(Scalar::from_f64_clamped(target, v))
    }
}

fn clamp_to_int(value: f64, min: f64, max: f64) -> f64 {
    if value.is_nan() {
        return 0.0;
    }
    value.trunc().clamp(min, max)
}

impl Display for Scalar {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Scalar::Int8(v) => write!(f, "{v}"),
            Scalar::Int16(v) => write!(f, "{v}"),
            Scalar::Int32(v) => write!(f, "{v}"),
            Scalar::Float32(v) => write!(f, "{v}"),
            Scalar::Float64(v) => write!(f, "{v}"),
            Scalar::String(v) => write!(f, "{v}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn default_valid_range_is_never_nan() {
        let (min, max) = DataType::Float64.default_valid_range();
        assert!(!min.as_f64().unwrap().is_nan());
        assert!(!max.as_f64().unwrap().is_nan());
    }

    #[rstest]
    #[case(300.0, DataType::Int8, i8::MAX as f64)]
    #[case(-300.0, DataType::Int8, i8::MIN as f64)]
    #[case(10.9, DataType::Int32, 10.0)]
    #[case(-10.9, DataType::Int32, -10.0)]
    fn convert_truncates_and_clamps(#[case] input: f64, #[case] target: DataType, #[case] expected: f64) {
        let scalar = Scalar::Float64(input).convert(target).unwrap();
        assert_eq!(scalar.as_f64().unwrap(), expected);
    }

    #[test]
    fn string_numeric_conversion_rejected() {
        let scalar = Scalar::String("x".to_string());
        assert!(scalar.convert(DataType::Int32).is_err());
        let scalar = Scalar::Int32(1);
        assert!(scalar.convert(DataType::String).is_err());
    }
}
