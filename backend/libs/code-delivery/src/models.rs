use serde::Deserialize;

/// Response body for a verification start request.
#[derive(Debug, Deserialize)]
pub struct VerificationResponse {
    pub sid: String,
    pub status: String,
    pub to: Option<String>,
    pub channel: Option<String>,
}

/// Response body for a verification check request.
#[derive(Debug, Deserialize)]
pub struct VerificationCheckResponse {
    pub sid: Option<String>,
    pub status: String,
    pub to: Option<String>,
}
