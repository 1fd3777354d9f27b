//! Dimension type enumeration (§3).
//!
//! Six kinds of dimension. `Independent` carries no cross-variable identity
//! -- two independent dimensions of two variables match only by length, never
//! by type. The other five are "named": every variable in a product that
//! uses a named type must agree with every other variable on that type's
//! length, which is exactly what [`crate::product::Product`] enforces.

use std::fmt::Display;

/// A single axis kind. `Time` may appear at most once per variable and, when
/// present, must be the outermost (`axis == 0`) dimension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::EnumIter)]
pub enum DimensionType {
    Independent,
    Time,
    Latitude,
    Longitude,
    Vertical,
    Spectral,
}

impl DimensionType {
    /// All dimension types other than `Independent` carry cross-variable
    /// identity: two variables in the same product that both use a named
    /// type must agree on its length.
    pub fn is_named(&self) -> bool {
        !matches!(self, DimensionType::Independent)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            DimensionType::Independent => "independent",
            DimensionType::Time => "time",
            DimensionType::Latitude => "latitude",
            DimensionType::Longitude => "longitude",
            DimensionType::Vertical => "vertical",
            DimensionType::Spectral => "spectral",
        }
    }

    /// The five named dimension types, in the canonical order the
    /// [`crate::product::Product`] dimension-length table iterates over.
    pub fn named_types() -> [DimensionType; 5] {
        [
            DimensionType::Time,
            DimensionType::Latitude,
            DimensionType::Longitude,
            DimensionType::Vertical,
            DimensionType::Spectral,
        ]
    }
}

impl Display for DimensionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn independent_is_not_named() {
        assert!(!DimensionType::Independent.is_named());
        assert!(DimensionType::Time.is_named());
        assert!(DimensionType::Vertical.is_named());
    }

    #[test]
    fn named_types_excludes_independent() {
        assert!(!DimensionType::named_types().contains(&DimensionType::Independent));
        assert_eq!(DimensionType::named_types().len(), 5);
    }
}
