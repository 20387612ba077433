use thiserror::Error;

pub type Result<T> = std::result::Result<T, GeolocateError>;

#[derive(Debug, Error)]
pub enum GeolocateError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },
}

impl From<reqwest::Error> for GeolocateError {
    fn from(err: reqwest::Error) -> Self {
        GeolocateError::Network(err.to_string())
    }
}
