/// Result type alias for watch-pipeline operations.
pub type Result<T> = std::result::Result<T, WatchError>;

#[derive(Debug, thiserror::Error)]
pub enum WatchError {
    /// The trend or item source could not be fetched or parsed. Retried on
    /// the next scheduled tick; never interpreted as an empty result.
    #[error("Source unavailable: {0}")]
    SourceUnavailable(String),

    /// The location resolver failed for one item. The item is dropped and
    /// the rest of the batch continues.
    #[error("Location resolution failed: {0}")]
    ResolveFailure(String),

    /// A store write or delete failed. Upserts are retried on a later pass;
    /// purge failures keep the topic in the registry until the next reconcile.
    #[error("Store failure: {0}")]
    StoreFailure(String),
}
