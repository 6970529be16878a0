use anyhow::Error;
use colored::Colorize;
use log::error;

/// Exit status used when Google Cloud refused our credentials.
pub const CREDENTIAL_ERROR_EXIT_CODE: i32 = 2;

#[derive(Debug, thiserror::Error)]
#[error("Credential error: {message}")]
pub struct CredentialError {
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SelectionError {
    #[error("Invalid choice `{choice}`, expected one of {expected}.")]
    InvalidChoice { choice: usize, expected: String },

    #[error("No {collection} is available. {hint}")]
    NoResources { collection: String, hint: String },
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error(
    "Missing required configuration: {}.\n\nYou need to either run `fuga environment init` or set {}.",
    keys.join(", "),
    variables.join(" and ")
)]
pub struct MissingConfig {
    pub keys: Vec<String>,
    pub variables: Vec<String>,
}

/// Convert API errors into anyhow errors, turning authorization failures into a
/// `CredentialError` so that `main` can tell the user how to fix them.
pub fn guard_credentials<T>(result: fuga_client::Result<T>) -> anyhow::Result<T> {
    result.map_err(|error| {
        if error.is_credential_error() {
            CredentialError {
                message: error.to_string(),
            }
            .into()
        } else {
            Error::from(error)
        }
    })
}

pub fn find_credential_error(error: &Error) -> Option<&CredentialError> {
    error
        .chain()
        .find_map(|cause| cause.downcast_ref::<CredentialError>())
}

pub fn report_credential_error(credential_error: &CredentialError) {
    error!(
        "{}",
        "fuga has encountered a credential related error during an API call to GCP.".bold()
    );
    error!("Please check your authentication settings.");
    error!(
        "hint: an explicit credential (`GOOGLE_APPLICATION_CREDENTIALS`) takes precedence over one configured with gcloud."
    );
    error!("(Original error message: {})", credential_error.message);
}
