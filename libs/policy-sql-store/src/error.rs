//! Error taxonomy of the adapter.

/// Errors surfaced by the adapter and its data-access layer.
///
/// Nothing is retried internally and nothing is swallowed — every failure
/// carries the operation step it came from. The single deliberate exception
/// is the table-existence probe, which treats any execution error as "table
/// absent" (see `PolicyDao::is_table_exist`).
#[derive(Debug, thiserror::Error)]
pub enum AdapterError {
    /// Construction-time rejection: empty, unsupported or deliberately
    /// redirected driver identifier. No partial adapter is returned.
    #[error("adapter configuration: {0}")]
    Configuration(String),

    /// Reachability probe or statement execution failure, propagated
    /// verbatim from the driver. Retry policy belongs to the caller.
    #[error(transparent)]
    Database(#[from] sqlx::Error),

    /// Caller-supplied arguments do not fit the operation, e.g. old/new rule
    /// lists of different lengths in a batch update.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// A full save was attempted while the in-memory policy is a filtered
    /// view; saving would silently drop every row the filter excluded.
    #[error("policy was loaded with a filter; refusing to save a partial view as the full set")]
    FilteredStateConflict,

    /// A statement inside a batch transaction failed; the transaction was
    /// rolled back.
    #[error("{step} failed: {source}")]
    Transaction {
        step: &'static str,
        #[source]
        source: sqlx::Error,
    },

    /// A statement inside a batch transaction failed and the rollback failed
    /// too; both causes are preserved.
    #[error("{step} failed: {source}; rollback failed: {rollback}")]
    TransactionRollback {
        step: &'static str,
        #[source]
        source: sqlx::Error,
        rollback: sqlx::Error,
    },
}
