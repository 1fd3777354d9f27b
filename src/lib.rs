/// Error taxonomy and result alias shared across the crate
pub mod error;
/// Process-wide configuration (unit database path, climatology flags, regrid policy)
pub mod config;
/// Logging setup and the installable warning sink
pub mod logging;
/// Unit-system collaborator interface (§6)
pub mod units;
/// Climatology collaborator interfaces (§6)
pub mod climatology;
/// Importer/exporter interface contracts for on-disk formats (§6)
pub mod io;

/// Scalar value and data type tags (§3)
pub mod scalar;
/// Dimension type enumeration (§3)
pub mod dimension;
/// Variable data model and dimension operations (§4.A, §4.B)
pub mod variable;
/// Product data model and companion-variable lookup (§3, §4.A, DESIGN NOTES)
pub mod product;
/// Dimension mask algebra (§4.C)
pub mod dimension_mask;
/// Dimensional binning (§4.D)
pub mod binning;
/// Numeric interpolation kernels (§4.E.3)
pub mod interpolation;
/// Interval regridding, point regridding, and dimension clamping (§4.E)
pub mod regrid;
