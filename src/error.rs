//! The error taxonomy shared by every fallible operation in this crate.

use thiserror::Error;

/// The primary error type for all operations in the `heptacore` crate.
///
/// Variants correspond to the abstract error kinds a compliant implementation
/// of this archive core is expected to surface: configuration misuse, resource
/// exhaustion, cooperative cancellation, I/O failure, codec failure, archive
/// assembly inconsistency, and unrecoverable batch failure.
#[derive(Debug, Error)]
pub enum ArchiverError {
    /// Null/empty inputs, an out-of-range configuration value, an item-count
    /// or solid-mode size ceiling exceeded, or arithmetic overflow while
    /// computing a size.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// An allocation needed to hold a compressed or solid-mode buffer failed.
    #[error("out of memory: {0}")]
    OutOfMemory(String),

    /// The caller's cancellation predicate requested that work stop.
    #[error("operation cancelled")]
    Cancelled,

    /// A read from an input handle or a write to the output sink failed.
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    /// The coder reported a failure while compressing, encrypting, or
    /// decrypting one job's bytes.
    #[error("coder error: {0}")]
    CoderError(String),

    /// The archive assembler detected an internal inconsistency (e.g. a
    /// pack-size that doesn't match the bytes actually written).
    #[error("archive assembly error: {0}")]
    AssemblyError(String),

    /// All jobs in a batch failed, or assembly failed outright; the caller
    /// should discard whatever output was produced.
    #[error("fatal: {0}")]
    Fatal(String),
}

impl ArchiverError {
    /// True for the variants a worker stores directly on a job's `status`
    /// rather than ever returning from a public entry point.
    pub fn is_job_local(&self) -> bool {
        matches!(
            self,
            ArchiverError::Cancelled | ArchiverError::CoderError(_) | ArchiverError::IoError(_)
        )
    }
}
