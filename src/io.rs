//! Importer/exporter interface contracts for on-disk formats (§6).
//!
//! No HDF4/HDF5/netCDF-3 codec is implemented here -- real readers and
//! writers for those formats are out of scope (§1). This module only
//! defines the boundary a format-specific crate would implement against,
//! plus the `Conventions` attribute prefix every HARP-compatible file
//! carries. [`crate::product::ProductMetadata`] is the data type these
//! traits exchange; it lives in `product` rather than being duplicated here.

use crate::error::HarpResult;
use crate::product::Product;

/// The prefix every on-disk HARP product's `Conventions` global attribute
/// starts with, followed by a `<major>.<minor>` version (e.g. `HARP-1.0`).
pub const CONVENTIONS_PREFIX: &str = "HARP-";

/// Reads a `Product` from some on-disk or in-memory representation.
pub trait ProductImporter {
    fn import(&self) -> HarpResult<Product>;
}

/// Writes a `Product` to some on-disk or in-memory representation.
pub trait ProductExporter {
    fn export(&self, product: &Product) -> HarpResult<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn conventions_prefix_matches_expected_form() {
        let conventions = format!("{CONVENTIONS_PREFIX}1.0");
        assert_eq!(conventions, "HARP-1.0");
    }
}
