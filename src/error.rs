//! The stable error taxonomy shared by every operation in the core (§7).
//!
//! Operations never unwind through intermediate layers: they return
//! `HarpResult<T>`, an [`error_stack::Result`] wrapping [`HarpErrorKind`], and
//! attach one-line contextual diagnostics (e.g. "(variable 'pressure')") with
//! `.change_context_lazy` as the call stack unwinds. Classifier-level
//! `remove` decisions are never represented here -- see [`crate::binning`] and
//! [`crate::regrid`] for those enums.

/// The finite, stable set of error kinds that cross any operation boundary in
/// the core.
#[derive(Debug, thiserror::Error)]
pub enum HarpErrorKind {
    #[error("out of memory")]
    OutOfMemory,
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    #[error("invalid index: {0}")]
    InvalidIndex(String),
    #[error("invalid name: {0}")]
    InvalidName(String),
    #[error("invalid format: {0}")]
    InvalidFormat(String),
    #[error("invalid datetime: {0}")]
    InvalidDatetime(String),
    #[error("invalid type: {0}")]
    InvalidType(String),
    #[error("invalid variable: {0}")]
    InvalidVariable(String),
    #[error("array dimensions mismatch: {0}")]
    ArrayDimsMismatch(String),
    #[error("array index out of bounds: {0}")]
    ArrayOutOfBounds(String),
    #[error("variable not found: {0}")]
    VariableNotFound(String),
    #[error("unit conversion error: {0}")]
    UnitConversion(String),
    #[error("operation error: {0}")]
    Operation(String),
    #[error("operation syntax error: {0}")]
    OperationSyntax(String),
    #[error("import error: {0}")]
    Import(String),
    #[error("export error: {0}")]
    Export(String),
    #[error("unsupported product: {0}")]
    UnsupportedProduct(String),
    #[error("no data: {0}")]
    NoData(String),
}

impl HarpErrorKind {
    pub fn invalid_argument<S: Into<String>>(msg: S) -> Self {
        Self::InvalidArgument(msg.into())
    }

    pub fn invalid_variable<S: Into<String>>(msg: S) -> Self {
        Self::InvalidVariable(msg.into())
    }

    pub fn invalid_index<S: Into<String>>(msg: S) -> Self {
        Self::InvalidIndex(msg.into())
    }

    pub fn invalid_type<S: Into<String>>(msg: S) -> Self {
        Self::InvalidType(msg.into())
    }

    pub fn array_dims_mismatch<S: Into<String>>(msg: S) -> Self {
        Self::ArrayDimsMismatch(msg.into())
    }

    pub fn no_data<S: Into<String>>(msg: S) -> Self {
        Self::NoData(msg.into())
    }

    pub fn operation<S: Into<String>>(msg: S) -> Self {
        Self::Operation(msg.into())
    }

    pub fn variable_not_found(name: &str) -> Self {
        Self::VariableNotFound(format!("no variable named '{name}'"))
    }
}

/// Standard result alias for fallible core operations.
///
/// Using [`error_stack::Report`] lets call sites compose a chain of "(variable
/// 'X')", "(bin N)"-style context without inventing a bespoke wrapper type per
/// module, matching how `collate_results` layers file-path context onto I/O
/// failures in the teacher crate.
pub type HarpResult<T> = error_stack::Result<T, HarpErrorKind>;
