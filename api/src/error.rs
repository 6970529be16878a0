use reqwest::StatusCode;
use url::Url;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("API request failed with {}: {}", status_code, message)]
    Api {
        status_code: StatusCode,
        message: String,
    },

    #[error("Invalid endpoint `{}`", endpoint)]
    BadEndpoint { endpoint: Url },

    #[error("Bad token: {}", token)]
    BadToken { token: String },

    #[error(
        "Expected projects/<project>/locations/<location>/environments/<name>, got: {}",
        path
    )]
    BadEnvironmentPath { path: String },

    #[error("Expected gs://<bucket>/<prefix>, got: {}", uri)]
    BadStorageUri { uri: String },

    #[error("Could not parse JSON response.")]
    BadJsonResponse(#[source] serde_json::Error),

    #[error("Failed to initialise the HTTP client")]
    BuildHttpClient(#[source] reqwest::Error),

    #[error("HTTP request error: {}", message)]
    ReqwestError {
        message: String,
        source: reqwest::Error,
    },
}

impl Error {
    /// Whether the API refused the request because of missing or insufficient credentials.
    pub fn is_credential_error(&self) -> bool {
        match self {
            Error::Api { status_code, .. } => {
                *status_code == StatusCode::UNAUTHORIZED || *status_code == StatusCode::FORBIDDEN
            }
            Error::BadToken { .. } => true,
            _ => false,
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::Api { status_code, .. } if *status_code == StatusCode::NOT_FOUND)
    }
}
