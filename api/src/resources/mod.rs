pub mod bucket;
pub mod environment;
pub mod object;
pub mod project;

use crate::error::{Error, Result};
use reqwest::StatusCode;
use serde::Deserialize;

/// Google APIs return either the resource itself or an `{"error": {...}}` envelope.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub(crate) enum Response<SuccessT> {
    Error { error: GoogleApiError },
    Success(SuccessT),
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct GoogleApiError {
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    status: Option<String>,
}

impl GoogleApiError {
    fn into_error(self, status_code: StatusCode) -> Error {
        let message = match (self.status, self.message) {
            (Some(status), Some(message)) => format!("{status}: {message}"),
            (None, Some(message)) => message,
            (Some(status), None) => status,
            (None, None) => String::new(),
        };
        Error::Api {
            status_code,
            message,
        }
    }
}

impl<SuccessT> Response<SuccessT> {
    pub fn into_result(self, status_code: StatusCode) -> Result<SuccessT> {
        match self {
            Response::Success(success) if status_code.is_success() => Ok(success),
            Response::Success(_) => Err(Error::Api {
                status_code,
                message: String::new(),
            }),
            Response::Error { error } => Err(error.into_error(status_code)),
        }
    }
}

/// A single page of a list call, normalised across the three APIs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub next_page_token: Option<String>,
}

impl<T> Page<T> {
    pub(crate) fn new(items: Vec<T>, next_page_token: Option<String>) -> Self {
        Self {
            items,
            // Some APIs send an empty string on the last page.
            next_page_token: next_page_token.filter(|token| !token.is_empty()),
        }
    }
}
