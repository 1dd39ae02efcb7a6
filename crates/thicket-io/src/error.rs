//! I/O error types for thicket-io.

use std::path::PathBuf;

use thicket_trees::TreesError;

/// Errors from CSV parsing, table conversion, and model files.
#[derive(Debug, thiserror::Error)]
pub enum IoError {
    /// Returned when the input file does not exist or is unreadable.
    #[error("cannot open {path}")]
    FileNotFound {
        /// Path that was attempted.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// Returned when reading from an open file fails.
    #[error("cannot read {path}")]
    ReadFile {
        /// Path being read.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// Returned when a file cannot be written.
    #[error("cannot write {path}")]
    WriteFile {
        /// Path that was attempted.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// Returned when a table holds no data rows.
    #[error("empty table in {path}")]
    EmptyTable {
        /// Path to the offending file.
        path: PathBuf,
    },

    /// Returned when rows of a table differ in cell count.
    #[error("mismatched row lengths in {path}: row {row} has {got} cells, expected {expected}")]
    MismatchedRowLengths {
        /// Path to the offending file.
        path: PathBuf,
        /// Zero-based data row index.
        row: usize,
        /// Expected cell count.
        expected: usize,
        /// Actual cell count.
        got: usize,
    },

    /// Returned when a row is shorter than the declared column count
    /// during cell-to-value conversion.
    #[error("row {row} has {got} cells, expected {expected}")]
    RaggedRow {
        /// Zero-based row index.
        row: usize,
        /// Expected cell count.
        expected: usize,
        /// Actual cell count.
        got: usize,
    },

    /// Returned when a per-column vector does not match the column count.
    #[error("{what} has {got} entries, expected {expected}")]
    ShapeMismatch {
        /// Which vector is wrong.
        what: &'static str,
        /// The expected entry count.
        expected: usize,
        /// The actual entry count.
        got: usize,
    },

    /// Returned when a value-type name is not recognized.
    #[error("unknown value type \"{name}\"")]
    UnknownValueType {
        /// The unrecognized name.
        name: String,
    },

    /// Returned when an impute-option name is not recognized.
    #[error("unknown impute option \"{name}\"")]
    UnknownImputeOption {
        /// The unrecognized name.
        name: String,
    },

    /// Returned when a model file's next section is not the expected one.
    #[error("model file {path}: expected section \"{expected}\", found \"{found}\"")]
    ModelSection {
        /// Path to the model file.
        path: PathBuf,
        /// Section name the reader expected.
        expected: String,
        /// Section name actually present (empty at end of file).
        found: String,
    },

    /// Returned when a model file's contents are inconsistent.
    #[error("corrupt model file {path}: {detail}")]
    CorruptModel {
        /// Path to the model file.
        path: PathBuf,
        /// What was inconsistent.
        detail: String,
    },

    /// Returned when a deserialized model fails engine validation.
    #[error("invalid model in {path}")]
    InvalidModel {
        /// Path to the model file.
        path: PathBuf,
        /// The engine-side validation error.
        source: TreesError,
    },
}
