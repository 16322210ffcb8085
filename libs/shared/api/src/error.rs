use thiserror::Error;

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("network failure: {0}")]
    Network(String),

    #[error("server error: {0}")]
    Server(String),

    #[error("invalid response body: {0}")]
    Decode(String),
}

impl From<reqwest::Error> for ApiError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            ApiError::Decode(err.to_string())
        } else {
            // Connect/timeout/body transport failures all degrade the same way.
            ApiError::Network(err.to_string())
        }
    }
}
