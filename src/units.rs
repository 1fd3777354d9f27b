//! The unit-system collaborator (§6).
//!
//! On-disk unit parsing/conversion is explicitly out of scope for this crate
//! (§1): production HARP consults UDUNITS-2 through exactly the four-method
//! interface reproduced below as [`UnitSystem`]. [`UdunitsLikeSystem`] is a
//! small built-in implementation covering the unit families this crate's
//! variables actually use (angles, a handful of SI-prefixed base units, and
//! the dimensionless "1"/""/"parts" family the teacher's `dmf_conv_factor`
//! already modeled) -- not a general UDUNITS-2 parser.

use std::cmp::Ordering;
use std::collections::HashMap;
use std::fmt::Display;

use crate::error::{HarpErrorKind, HarpResult};

#[derive(Debug)]
pub struct UnknownUnitError {
    pub unit: String,
}

impl UnknownUnitError {
    fn new<S: ToString>(unit: S) -> Self {
        Self {
            unit: unit.to_string(),
        }
    }
}

impl Display for UnknownUnitError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Unknown unit '{}'", self.unit)
    }
}

impl std::error::Error for UnknownUnitError {}

/// A parsed unit: which physical dimension it belongs to, and the
/// multiplicative factor that converts a value in this unit to that
/// dimension's base unit.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedUnit {
    pub dimension: &'static str,
    pub factor: f64,
}

/// The narrow interface the analytical core requires of a unit library (§6).
pub trait UnitSystem {
    fn parse(&self, unit: &str) -> HarpResult<ParsedUnit>;

    fn compatible(&self, unit_a: &str, unit_b: &str) -> bool {
        match (self.parse(unit_a), self.parse(unit_b)) {
            (Ok(a), Ok(b)) => a.dimension == b.dimension,
            _ => false,
        }
    }

    fn compare(&self, unit_a: &str, unit_b: &str) -> HarpResult<Ordering>;

    /// Build a converter closure from `from` to `to`. The empty string is
    /// equivalent to `"1"` (dimensionless), matching §6.
    fn converter(&self, from: &str, to: &str) -> HarpResult<Box<dyn Fn(f64) -> f64>>;
}

fn normalize(unit: &str) -> &str {
    if unit.is_empty() {
        "1"
    } else {
        unit
    }
}

/// A small built-in table-driven [`UnitSystem`], standing in for the
/// out-of-scope UDUNITS-2 collaborator.
pub struct UdunitsLikeSystem {
    table: HashMap<&'static str, ParsedUnit>,
}

impl UdunitsLikeSystem {
    pub fn new() -> Self {
        let mut table = HashMap::new();
        let mut reg = |names: &[&'static str], dimension: &'static str, factor: f64| {
            for name in names {
                table.insert(*name, ParsedUnit { dimension, factor });
            }
        };

        reg(&["1", "parts"], "dimensionless", 1.0);
        reg(&["ppm"], "dimensionless", 1e-6);
        reg(&["ppb"], "dimensionless", 1e-9);
        reg(&["ppt"], "dimensionless", 1e-12);

        reg(&["rad", "radian", "radians"], "angle", 1.0);
        reg(
            &["degree", "degrees", "deg"],
            "angle",
            std::f64::consts::PI / 180.0,
        );

        reg(&["m", "meter", "meters"], "length", 1.0);
        reg(&["km"], "length", 1000.0);
        reg(&["cm"], "length", 0.01);

        reg(&["Pa", "pascal"], "pressure", 1.0);
        reg(&["hPa", "mbar"], "pressure", 100.0);
        reg(&["atm"], "pressure", 101_325.0);

        reg(&["s", "second", "seconds"], "time", 1.0);
        reg(&["hour", "hours"], "time", 3600.0);
        reg(&["day", "days"], "time", 86_400.0);

        Self { table }
    }
}

impl Default for UdunitsLikeSystem {
    fn default() -> Self {
        Self::new()
    }
}

impl UnitSystem for UdunitsLikeSystem {
    fn parse(&self, unit: &str) -> HarpResult<ParsedUnit> {
        let unit = normalize(unit);
        self.table.get(unit).cloned().ok_or_else(|| {
            error_stack::Report::new(HarpErrorKind::UnitConversion(
                UnknownUnitError::new(unit).to_string(),
            ))
        })
    }

    fn compare(&self, unit_a: &str, unit_b: &str) -> HarpResult<Ordering> {
        let a = self.parse(unit_a)?;
        let b = self.parse(unit_b)?;
        if a.dimension != b.dimension {
            return Err(error_stack::Report::new(HarpErrorKind::UnitConversion(
                format!("'{unit_a}' and '{unit_b}' are not compatible units"),
            )));
        }
        a.factor.partial_cmp(&b.factor).ok_or_else(|| {
            error_stack::Report::new(HarpErrorKind::UnitConversion(
                "unit factors are not comparable (NaN)".to_string(),
            ))
        })
    }

    fn converter(&self, from: &str, to: &str) -> HarpResult<Box<dyn Fn(f64) -> f64>> {
        let from = self.parse(from)?;
        let to = self.parse(to)?;
        if from.dimension != to.dimension {
            return Err(error_stack::Report::new(HarpErrorKind::UnitConversion(
                format!(
                    "cannot convert from dimension '{}' to '{}'",
                    from.dimension, to.dimension
                ),
            )));
        }
        let scale = from.factor / to.factor;
        Ok(Box::new(move |value: f64| value * scale))
    }
}

/// Mole-fraction conversion factor between two dimensionless/ppm/ppb/ppt
/// units, mirroring the teacher crate's standalone `dmf_conv_factor` helper
/// for callers that only need this one family and not a full [`UnitSystem`].
pub fn dmf_conv_factor(old_unit: &str, new_unit: &str) -> Result<f64, UnknownUnitError> {
    let system = UdunitsLikeSystem::new();
    let from = system
        .table
        .get(normalize(old_unit))
        .cloned()
        .ok_or_else(|| UnknownUnitError::new(old_unit))?;
    let to = system
        .table
        .get(normalize(new_unit))
        .cloned()
        .ok_or_else(|| UnknownUnitError::new(new_unit))?;
    Ok(from.factor / to.factor)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn degree_to_radian_round_trips() {
        let system = UdunitsLikeSystem::new();
        let to_rad = system.converter("degree", "rad").unwrap();
        let to_deg = system.converter("rad", "degree").unwrap();
        assert_relative_eq!(to_deg(to_rad(90.0)), 90.0, epsilon = 1e-12);
        assert_relative_eq!(to_rad(180.0), std::f64::consts::PI, epsilon = 1e-12);
    }

    #[test]
    fn empty_string_is_dimensionless() {
        let system = UdunitsLikeSystem::new();
        assert!(system.compatible("", "1"));
        assert!(system.compatible("", "ppm"));
    }

    #[test]
    fn incompatible_units_error() {
        let system = UdunitsLikeSystem::new();
        assert!(system.converter("rad", "m").is_err());
    }

    #[test]
    fn dmf_ppm_to_ppb() {
        let factor = dmf_conv_factor("ppm", "ppb").unwrap();
        assert_relative_eq!(factor, 1000.0, epsilon = 1e-9);
    }
}
