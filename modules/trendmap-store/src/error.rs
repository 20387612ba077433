/// Result type alias for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Refusing to store invalid coordinates ({latitude}, {longitude}) for item {id}")]
    InvalidCoordinates {
        id: String,
        latitude: f64,
        longitude: f64,
    },

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}
