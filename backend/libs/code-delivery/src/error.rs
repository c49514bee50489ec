use thiserror::Error;

pub type DeliveryResult<T> = std::result::Result<T, DeliveryError>;

#[derive(Debug, Error)]
pub enum DeliveryError {
    #[error("Delivery request failed: {0}")]
    Transport(String),

    #[error("Delivery provider rejected request ({status}): {body}")]
    Provider { status: u16, body: String },

    #[error("Unexpected delivery provider response: {0}")]
    InvalidResponse(String),
}

impl From<reqwest::Error> for DeliveryError {
    fn from(err: reqwest::Error) -> Self {
        DeliveryError::Transport(err.to_string())
    }
}
